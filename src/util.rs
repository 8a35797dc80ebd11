pub mod fifo;
pub mod year_ext;

/// The two halves of a split: the part being consumed and the remainder left in place.
pub struct HasSplit<A: Sized> {
    pub(crate) take: A,
    pub(crate) leave: A, // non-maybe.  consequence of split.
}
