//! Record codec.
//!
//! ## Record Layout
//!
//! ```text
//! +-----------+-----------+-----------+-----+-----------+-----------+
//! | body (u32)| len0 (u32)| payload 0 | ... | lenN (u32)| payload N |
//! +-----------+-----------+-----------+-----+-----------+-----------+
//! ```
//!
//! Fields appear in name order. The body length prefix makes an encoded
//! record self-delimiting, so trailing bytes after the body are ignored on
//! decode. All integers are big-endian.
//!
//! ## Key Payloads
//!
//! Payloads are order-preserving: comparing two payloads byte by byte gives
//! the same result as `Value::compare` on the decoded values. The same
//! payloads are used inside records and as radix tree key components.
//!
//! | Kind | Payload |
//! |------|---------|
//! | Binary | raw bytes |
//! | String | UTF-8 bytes |
//! | Boolean | one byte, 0 or 1 |
//! | Integer | 8 bytes, sign bit flipped |
//! | BigInt | 16 bytes, sign bit flipped |
//! | Number | 8 bytes, IEEE-754 total order transform |
//!
//! Nullable fields prefix the payload with `0x01`; null is the single byte `0x00`.

use crate::error::{Error, Result};
use crate::field::{Field, FieldKind, Fields};
use crate::record::Record;
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

const SIGN_64: u64 = 1 << 63;
const SIGN_128: u128 = 1 << 127;

/// Encodes and decodes records of one store.
#[derive(Debug, Clone)]
pub struct RecordManager {
    fields: Fields,
}

impl RecordManager {
    /// Create a codec for the given fields.
    pub fn new(fields: Fields) -> Self {
        RecordManager { fields }
    }

    /// Fields handled by this codec
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Record holding the default value of every field.
    pub fn default_record(&self) -> Record {
        self.fields
            .iter()
            .map(|(name, field)| (name.clone(), field.default_value().clone()))
            .collect()
    }

    fn field(&self, key: &str) -> Result<&Field> {
        self.fields
            .get(key)
            .ok_or_else(|| Error::Codec(format!("unknown field \"{}\"", key)))
    }

    /// Encode a complete record.
    pub fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        for (name, field) in self.fields.iter() {
            let value = record
                .get(name)
                .ok_or_else(|| Error::Codec(format!("missing field \"{}\"", name)))?;
            let payload = encode_payload(name, field, value)?;
            body.write_u32::<BigEndian>(payload.len() as u32)?;
            body.extend_from_slice(&payload);
        }
        let mut buffer = Vec::with_capacity(body.len() + 4);
        buffer.write_u32::<BigEndian>(body.len() as u32)?;
        buffer.extend_from_slice(&body);
        Ok(buffer)
    }

    /// Decode a record encoded by [`RecordManager::encode`].
    ///
    /// Bytes following the encoded body are ignored.
    pub fn decode(&self, buffer: &[u8]) -> Result<Record> {
        let mut cursor = Cursor::new(buffer);
        let body_length = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| Error::Codec("truncated record header".to_string()))?
            as usize;
        if buffer.len() < 4 + body_length {
            return Err(Error::Codec(format!(
                "expected record body of {} bytes, got {}",
                body_length,
                buffer.len() - 4
            )));
        }
        let mut cursor = Cursor::new(&buffer[4..4 + body_length]);
        let mut record = Record::new();
        for (name, field) in self.fields.iter() {
            let length = cursor
                .read_u32::<BigEndian>()
                .map_err(|_| Error::Codec(format!("truncated length of field \"{}\"", name)))?
                as usize;
            let mut payload = vec![0u8; length];
            cursor
                .read_exact(&mut payload)
                .map_err(|_| Error::Codec(format!("truncated payload of field \"{}\"", name)))?;
            record.set(name.clone(), decode_payload(name, field, &payload)?);
        }
        if cursor.position() as usize != body_length {
            return Err(Error::Codec(format!(
                "record body has {} unexpected trailing bytes",
                body_length - cursor.position() as usize
            )));
        }
        Ok(record)
    }

    /// Encode the named fields of `record`, one buffer per key.
    pub fn encode_keys<S: AsRef<str>>(&self, keys: &[S], record: &Record) -> Result<Vec<Vec<u8>>> {
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                let value = record
                    .get(key)
                    .ok_or_else(|| Error::Codec(format!("missing key field \"{}\"", key)))?;
                self.encode_value(key, value)
            })
            .collect()
    }

    /// Decode buffers produced by [`RecordManager::encode_keys`].
    pub fn decode_keys<S: AsRef<str>>(&self, keys: &[S], buffers: &[Vec<u8>]) -> Result<Record> {
        if keys.len() != buffers.len() {
            return Err(Error::Codec(format!(
                "expected {} key buffers, got {}",
                keys.len(),
                buffers.len()
            )));
        }
        let mut record = Record::new();
        for (key, buffer) in keys.iter().zip(buffers) {
            let key = key.as_ref();
            record.set(key, decode_payload(key, self.field(key)?, buffer)?);
        }
        Ok(record)
    }

    /// Encode a single value as the payload of field `key`.
    pub fn encode_value(&self, key: &str, value: &Value) -> Result<Vec<u8>> {
        encode_payload(key, self.field(key)?, value)
    }
}

/// Order-preserving payload of a single value, without a null marker.
///
/// Used directly for key components that are not backed by a field.
pub fn encode_key(value: &Value) -> Vec<u8> {
    match value {
        Value::Null => vec![0x00],
        Value::Binary(bytes) => bytes.clone(),
        Value::String(s) => s.as_bytes().to_vec(),
        Value::Boolean(b) => vec![*b as u8],
        Value::Integer(i) => {
            let mut buf = vec![0u8; 8];
            BigEndian::write_u64(&mut buf, (*i as u64) ^ SIGN_64);
            buf
        }
        Value::BigInt(i) => {
            let mut buf = vec![0u8; 16];
            BigEndian::write_u128(&mut buf, (*i as u128) ^ SIGN_128);
            buf
        }
        Value::Number(f) => {
            let bits = f.to_bits();
            let ordered = if bits & SIGN_64 != 0 { !bits } else { bits ^ SIGN_64 };
            let mut buf = vec![0u8; 8];
            BigEndian::write_u64(&mut buf, ordered);
            buf
        }
    }
}

fn encode_payload(name: &str, field: &Field, value: &Value) -> Result<Vec<u8>> {
    if !field.accepts(value) {
        return Err(Error::Codec(format!(
            "field \"{}\" does not accept {} value",
            name,
            value.type_name()
        )));
    }
    if value.is_null() {
        return Ok(vec![0x00]);
    }
    let raw = encode_key(value);
    if field.is_nullable() {
        let mut prefixed = Vec::with_capacity(raw.len() + 1);
        prefixed.push(0x01);
        prefixed.extend_from_slice(&raw);
        Ok(prefixed)
    } else {
        Ok(raw)
    }
}

fn decode_payload(name: &str, field: &Field, payload: &[u8]) -> Result<Value> {
    let raw = if field.is_nullable() {
        match payload.split_first() {
            Some((&0x00, [])) => return Ok(Value::Null),
            Some((&0x01, rest)) => rest,
            _ => {
                return Err(Error::Codec(format!(
                    "invalid null marker in field \"{}\"",
                    name
                )))
            }
        }
    } else {
        payload
    };
    let fixed = |width: usize| -> Result<()> {
        if raw.len() == width {
            Ok(())
        } else {
            Err(Error::Codec(format!(
                "field \"{}\" expected {} bytes, got {}",
                name,
                width,
                raw.len()
            )))
        }
    };
    let value = match field.kind() {
        FieldKind::Binary => Value::Binary(raw.to_vec()),
        FieldKind::String => Value::String(
            String::from_utf8(raw.to_vec())
                .map_err(|e| Error::Codec(format!("field \"{}\": {}", name, e)))?,
        ),
        FieldKind::Boolean => {
            fixed(1)?;
            match raw[0] {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                other => {
                    return Err(Error::Codec(format!(
                        "field \"{}\" has invalid boolean byte {}",
                        name, other
                    )))
                }
            }
        }
        FieldKind::Integer => {
            fixed(8)?;
            Value::Integer((BigEndian::read_u64(raw) ^ SIGN_64) as i64)
        }
        FieldKind::BigInt => {
            fixed(16)?;
            Value::BigInt((BigEndian::read_u128(raw) ^ SIGN_128) as i128)
        }
        FieldKind::Number => {
            fixed(8)?;
            let ordered = BigEndian::read_u64(raw);
            let bits = if ordered & SIGN_64 != 0 { ordered ^ SIGN_64 } else { !ordered };
            Value::Number(f64::from_bits(bits))
        }
    };
    Ok(value)
}
