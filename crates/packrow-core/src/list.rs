//! Embedded circular lists
//!
//! A list field stores, for every record, the position of the next record of
//! its list. Lists are circular with no distinct head: walking `next` from
//! any element eventually returns to it. `previous` is not stored and costs
//! a full walk of the list.
//!
//! Every position must be initialized with `init` (or added to a list with
//! `add_next` / `add_previous`) before it is walked. Walking an
//! uninitialized position follows whatever the field holds.
//!
//! ```text
//!  0 -> 1 -> 2 -> 3        add_next(1, 7)       0 -> 1 -> 7 -> 2 -> 3
//!  ^______________|                             ^___________________|
//! ```

use crate::error::{StoreError, StoreResult};
use crate::field::BitField;

/// Next-pointer field forming disjoint circular lists over positions.
#[derive(Debug, Clone)]
pub struct ListEncoder {
    field: BitField,
    max_position: u64,
}

impl ListEncoder {
    pub(crate) fn new(field: BitField) -> Self {
        let max_position = (1u64 << field.bits_count()) - 1;
        Self {
            field,
            max_position,
        }
    }

    /// Largest position a list element may have.
    pub fn max_position(&self) -> u64 {
        self.max_position
    }

    /// Make `position` a one-element list.
    pub fn init(&self, position: u64) -> StoreResult<()> {
        self.set_next(position, position)
    }

    /// Position following `position` in its list.
    pub fn next(&self, position: u64) -> StoreResult<u64> {
        Ok(self.field.read_bits(position)? as u64)
    }

    /// Position preceding `position` in its list. Walks the whole list.
    pub fn previous(&self, position: u64) -> StoreResult<u64> {
        let mut previous = position;
        let mut current = self.next(position)?;
        while current != position {
            previous = current;
            current = self.next(current)?;
        }
        Ok(previous)
    }

    /// Insert `element` right after `list`. `element` must not belong to
    /// another list with more than one element.
    pub fn add_next(&self, list: u64, element: u64) -> StoreResult<()> {
        self.check_position(element)?;
        let next = self.next(list)?;

        self.set_next(list, element)?;
        self.set_next(element, next)
    }

    /// Insert `element` right before `list`. Walks the whole list.
    pub fn add_previous(&self, list: u64, element: u64) -> StoreResult<()> {
        self.check_position(list)?;
        let previous = self.previous(list)?;

        self.set_next(previous, element)?;
        self.set_next(element, list)
    }

    /// Take `position` out of its list, leaving it a one-element list.
    /// Removing a one-element list changes nothing.
    pub fn remove(&self, position: u64) -> StoreResult<()> {
        let next = self.next(position)?;
        let previous = self.previous(position)?;

        self.set_next(previous, next)?;
        self.set_next(position, position)
    }

    /// Join two disjoint lists: the second list is spliced in after
    /// `first`, starting with `second`.
    ///
    /// ```text
    ///  0 -> 1 -> 2,  3 -> 4     merge(1, 3)     0 -> 1 -> 3 -> 4 -> 2
    /// ```
    pub fn merge(&self, first: u64, second: u64) -> StoreResult<()> {
        let first_next = self.next(first)?;
        let second_previous = self.previous(second)?;

        self.set_next(first, second)?;
        self.set_next(second_previous, first_next)
    }

    /// Iterate the list once, starting at `start`.
    pub fn iter(&self, start: u64) -> ListIter<'_> {
        ListIter {
            list: self,
            start,
            current: None,
            next: start,
            failed: false,
        }
    }

    /// Number of elements in the list containing `start`.
    pub fn len(&self, start: u64) -> StoreResult<usize> {
        let mut len = 0;
        for position in self.iter(start) {
            position?;
            len += 1;
        }
        Ok(len)
    }

    /// Positions of the list in order, starting at `start`.
    pub fn collect_positions(&self, start: u64) -> StoreResult<Vec<u64>> {
        self.iter(start).collect()
    }

    /// Underlying field.
    pub fn field(&self) -> &BitField {
        &self.field
    }

    fn set_next(&self, position: u64, next: u64) -> StoreResult<()> {
        self.check_position(next)?;
        self.field.write_bits(position, next as u32)
    }

    fn check_position(&self, position: u64) -> StoreResult<()> {
        if position > self.max_position {
            return Err(StoreError::ValueOutOfRange {
                value: position as i64,
                min: 0,
                max: self.max_position as i64,
            });
        }
        Ok(())
    }
}

/// Single pass over a circular list.
///
/// Yields every element once, starting at the iterator's start position.
/// `remove_current` takes the last yielded element out of the list without
/// disturbing the walk.
#[derive(Debug)]
pub struct ListIter<'a> {
    list: &'a ListEncoder,
    start: u64,
    current: Option<u64>,
    next: u64,
    failed: bool,
}

impl<'a> ListIter<'a> {
    fn has_next(&self) -> bool {
        self.current.is_none() || self.next != self.start
    }

    /// Remove the last yielded element from its list.
    ///
    /// Removing the start element moves the start to the following element,
    /// so the walk still covers the rest of the list exactly once.
    pub fn remove_current(&mut self) -> StoreResult<()> {
        let current = self.current.ok_or(StoreError::NoCurrentElement)?;
        self.list.remove(current)?;

        if current == self.start && self.has_next() {
            self.start = self.next;
            self.current = None;
        }
        Ok(())
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = StoreResult<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.has_next() {
            return None;
        }

        let current = self.next;
        match self.list.next(current) {
            Ok(next) => {
                self.current = Some(current);
                self.next = next;
                Some(Ok(current))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
