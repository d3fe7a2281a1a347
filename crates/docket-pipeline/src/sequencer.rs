//! Ordered delivery of out-of-order completions

use crate::error::SequencerError;
use std::collections::BTreeMap;

/// Reorder buffer that releases items strictly by position
///
/// Items arrive in completion order and leave in input order. Only the gap
/// between the release cursor and the furthest arrival is held in memory.
///
/// # Examples
///
/// ```
/// use docket_pipeline::Sequencer;
///
/// let mut sequencer = Sequencer::new(3);
/// sequencer.push(2, "c").unwrap();
/// sequencer.push(1, "b").unwrap();
/// assert_eq!(sequencer.drain().count(), 0);
///
/// sequencer.push(0, "a").unwrap();
/// assert_eq!(sequencer.drain().collect::<Vec<_>>(), vec!["a", "b", "c"]);
/// assert!(sequencer.is_complete());
/// ```
#[derive(Debug)]
pub struct Sequencer<T> {
    total: usize,
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> Sequencer<T> {
    /// Create a sequencer for a batch of `total` positions
    pub fn new(total: usize) -> Self {
        Self {
            total,
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Accept the item for a position
    ///
    /// # Errors
    ///
    /// - `Duplicate` if the position is buffered or already released
    /// - `OutOfRange` if the position is not part of the batch
    pub fn push(&mut self, position: usize, item: T) -> Result<(), SequencerError> {
        if position >= self.total {
            return Err(SequencerError::OutOfRange {
                position,
                total: self.total,
            });
        }
        if position < self.next || self.pending.contains_key(&position) {
            return Err(SequencerError::Duplicate(position));
        }
        self.pending.insert(position, item);
        Ok(())
    }

    /// Release every item that is ready, in position order
    ///
    /// Each item is yielded exactly once. The iterator stops at the first gap.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || {
            let item = self.pending.remove(&self.next)?;
            self.next += 1;
            Some(item)
        })
    }

    /// Next position to be released
    pub fn next_expected(&self) -> usize {
        self.next
    }

    /// Number of items waiting on a gap
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Whether every position has been released
    pub fn is_complete(&self) -> bool {
        self.next >= self.total
    }

    /// Positions that have neither been pushed nor released
    pub fn missing(&self) -> Vec<usize> {
        (self.next..self.total)
            .filter(|position| !self.pending.contains_key(position))
            .collect()
    }
}
