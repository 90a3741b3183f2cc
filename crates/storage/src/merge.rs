//! Sorted merge over seekable streams
//!
//! A [`Seekable`] stream yields items in ascending collator order and can be
//! repositioned at the first item not below a boundary. Intersections and
//! unions of seekable streams are seekable themselves, so they nest.
//!
//! ```text
//! a: 1 3 5 7 9
//! b: 3 4 5 9        intersection -> 3 5 9
//! c: 2 3 5 8 9      union        -> 1 2 3 4 5 7 8 9
//! ```

use atlas_core::Result;
use std::cmp::Ordering;

/// Stream of ascending items that can jump forward.
pub trait Seekable {
    /// Item type
    type Item;

    /// Next item, or `None` when the stream is exhausted.
    fn next_item(&mut self) -> Result<Option<Self::Item>>;

    /// Reposition so that the next item is the first one not below `boundary`.
    fn seek(&mut self, boundary: &Self::Item) -> Result<()>;
}

impl<S: Seekable + ?Sized> Seekable for Box<S> {
    type Item = S::Item;

    fn next_item(&mut self) -> Result<Option<Self::Item>> {
        (**self).next_item()
    }

    fn seek(&mut self, boundary: &Self::Item) -> Result<()> {
        (**self).seek(boundary)
    }
}

// =============================================================================
// SortedCursor
// =============================================================================

/// Seekable cursor over an already sorted vector.
pub struct SortedCursor<T, C> {
    items: Vec<T>,
    position: usize,
    collator: C,
}

impl<T, C> SortedCursor<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    /// `items` must be sorted under `collator`.
    pub fn new(items: Vec<T>, collator: C) -> Self {
        SortedCursor {
            items,
            position: 0,
            collator,
        }
    }
}

impl<T: Clone, C> Seekable for SortedCursor<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    type Item = T;

    fn next_item(&mut self) -> Result<Option<T>> {
        let item = self.items.get(self.position).cloned();
        if item.is_some() {
            self.position += 1;
        }
        Ok(item)
    }

    fn seek(&mut self, boundary: &T) -> Result<()> {
        let collator = &self.collator;
        self.position = self
            .items
            .partition_point(|item| collator(item, boundary) == Ordering::Less);
        Ok(())
    }
}

// =============================================================================
// Intersection
// =============================================================================

/// Items present in every stream.
pub struct Intersection<S, C> {
    streams: Vec<S>,
    collator: C,
}

/// Intersect `streams`. No streams yield nothing.
pub fn intersection<S, C>(streams: Vec<S>, collator: C) -> Intersection<S, C>
where
    S: Seekable,
    C: Fn(&S::Item, &S::Item) -> Ordering,
{
    Intersection { streams, collator }
}

impl<S, C> Seekable for Intersection<S, C>
where
    S: Seekable,
    C: Fn(&S::Item, &S::Item) -> Ordering,
{
    type Item = S::Item;

    fn next_item(&mut self) -> Result<Option<S::Item>> {
        let count = self.streams.len();
        let Some(first) = self.streams.first_mut() else {
            return Ok(None);
        };
        let Some(mut candidate) = first.next_item()? else {
            return Ok(None);
        };
        // Leapfrog: every stream in turn catches up with the candidate.
        let mut agreeing = 1;
        let mut index = 0;
        while agreeing < count {
            index = (index + 1) % count;
            let stream = &mut self.streams[index];
            stream.seek(&candidate)?;
            let Some(item) = stream.next_item()? else {
                return Ok(None);
            };
            if (self.collator)(&item, &candidate) == Ordering::Equal {
                agreeing += 1;
            } else {
                candidate = item;
                agreeing = 1;
            }
        }
        Ok(Some(candidate))
    }

    fn seek(&mut self, boundary: &S::Item) -> Result<()> {
        for stream in &mut self.streams {
            stream.seek(boundary)?;
        }
        Ok(())
    }
}

// =============================================================================
// Union
// =============================================================================

/// Items present in any stream, each yielded once.
pub struct Union<S: Seekable, C> {
    streams: Vec<S>,
    heads: Vec<Option<S::Item>>,
    loaded: bool,
    collator: C,
}

/// Merge `streams`, collapsing items that collate equal.
pub fn union<S, C>(streams: Vec<S>, collator: C) -> Union<S, C>
where
    S: Seekable,
    C: Fn(&S::Item, &S::Item) -> Ordering,
{
    let heads = streams.iter().map(|_| None).collect();
    Union {
        streams,
        heads,
        loaded: false,
        collator,
    }
}

impl<S, C> Seekable for Union<S, C>
where
    S: Seekable,
    C: Fn(&S::Item, &S::Item) -> Ordering,
{
    type Item = S::Item;

    fn next_item(&mut self) -> Result<Option<S::Item>> {
        if !self.loaded {
            for (stream, head) in self.streams.iter_mut().zip(self.heads.iter_mut()) {
                *head = stream.next_item()?;
            }
            self.loaded = true;
        }
        let mut minimum: Option<usize> = None;
        for (index, head) in self.heads.iter().enumerate() {
            let Some(item) = head else { continue };
            minimum = match minimum.and_then(|m| self.heads[m].as_ref()) {
                Some(current) if (self.collator)(item, current) != Ordering::Less => minimum,
                _ => Some(index),
            };
        }
        let Some(minimum) = minimum else {
            return Ok(None);
        };
        let Some(item) = self.heads[minimum].take() else {
            return Ok(None);
        };
        self.heads[minimum] = self.streams[minimum].next_item()?;
        for index in 0..self.streams.len() {
            while let Some(head) = &self.heads[index] {
                if (self.collator)(head, &item) != Ordering::Equal {
                    break;
                }
                self.heads[index] = self.streams[index].next_item()?;
            }
        }
        Ok(Some(item))
    }

    fn seek(&mut self, boundary: &S::Item) -> Result<()> {
        for stream in &mut self.streams {
            stream.seek(boundary)?;
        }
        self.loaded = false;
        Ok(())
    }
}
