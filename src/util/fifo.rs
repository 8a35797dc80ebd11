//! Date-ordered FIFO implemented using VecDeque
use chrono::{DateTime, Utc};
use std::collections::vec_deque::{IntoIter, Iter};
use std::collections::VecDeque;

/// Items that can be kept in acquisition-date order.
pub trait Dated {
    fn date(&self) -> DateTime<Utc>;
}

/// A queue that is always sorted by [`Dated::date`], oldest at the front.
///
/// Items with equal dates keep their insertion order. Inserting in chronological order is the
/// common case and lands at the back without shifting anything.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FIFO<A> {
    deq: VecDeque<A>,
}

impl<A> Default for FIFO<A> {
    fn default() -> Self {
        Self {
            deq: VecDeque::new(),
        }
    }
}

impl<A> FIFO<A> {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn iter(&self) -> Iter<'_, A> {
        self.deq.iter()
    }
    pub fn pop_front(&mut self) -> Option<A> {
        self.deq.pop_front()
    }
    pub fn peek_front(&self) -> Option<&A> {
        self.deq.front()
    }
    pub fn len(&self) -> usize {
        self.deq.len()
    }
    pub fn is_empty(&self) -> bool {
        self.deq.is_empty()
    }
}

impl<A: Dated> FIFO<A> {
    /// Insert in date order, after any items with the same date.
    pub fn push(&mut self, e: A) {
        let date = e.date();
        let index = match self.deq.back() {
            Some(last) if last.date() > date => self.deq.partition_point(|x| x.date() <= date),
            _ => self.deq.len(),
        };
        self.deq.insert(index, e);
    }

    /// Return the remainder of a split head back to the front.
    ///
    /// (intended sequence: pop; split -> (take, leave); consume take; push_front leave;)
    pub fn push_front(&mut self, e: A) {
        debug_assert!(self.deq.front().is_none_or(|head| e.date() <= head.date()));
        self.deq.push_front(e);
    }
}

impl<A: Dated> FromIterator<A> for FIFO<A> {
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        let mut fifo = FIFO::new();
        fifo.extend(iter);
        fifo
    }
}

impl<A> IntoIterator for FIFO<A> {
    type Item = A;
    type IntoIter = IntoIter<Self::Item>;
    fn into_iter(self) -> Self::IntoIter {
        self.deq.into_iter()
    }
}

impl<'a, A> IntoIterator for &'a FIFO<A> {
    type Item = &'a A;
    type IntoIter = Iter<'a, A>;
    fn into_iter(self) -> Self::IntoIter {
        self.deq.iter()
    }
}

impl<A: Dated> Extend<A> for FIFO<A> {
    fn extend<T: IntoIterator<Item = A>>(&mut self, iter: T) {
        for item in iter.into_iter() {
            self.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[derive(Debug, PartialEq)]
    struct Item(DateTime<Utc>, &'static str);

    impl Dated for Item {
        fn date(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_push_keeps_date_order() {
        let fifo: FIFO<_> = [
            Item(day(3), "c"),
            Item(day(1), "a"),
            Item(day(2), "b1"),
            Item(day(2), "b2"),
            Item(day(5), "e"),
            Item(day(4), "d"),
        ]
        .into_iter()
        .collect();

        let names: Vec<_> = fifo.iter().map(|item| item.1).collect();
        assert_eq!(names, ["a", "b1", "b2", "c", "d", "e"]);
    }

    #[test]
    fn test_equal_dates_after_existing() {
        let mut fifo = FIFO::new();
        fifo.push(Item(day(2), "first"));
        fifo.push(Item(day(3), "later"));
        fifo.push(Item(day(2), "second"));

        assert_eq!(fifo.pop_front(), Some(Item(day(2), "first")));
        assert_eq!(fifo.pop_front(), Some(Item(day(2), "second")));
        assert_eq!(fifo.pop_front(), Some(Item(day(3), "later")));
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_push_front_remainder() {
        let mut fifo: FIFO<_> = [Item(day(1), "a"), Item(day(2), "b")].into_iter().collect();

        let head = fifo.pop_front().unwrap();
        fifo.push_front(Item(head.0, "a-remainder"));

        assert_eq!(fifo.peek_front(), Some(&Item(day(1), "a-remainder")));
        assert_eq!(fifo.len(), 2);
    }
}
