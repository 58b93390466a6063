//! Time-ordered backlog abstraction.

/// Items that carry an eligibility stamp in scheduler milliseconds.
pub trait Stamped {
    /// Earliest scheduler time (ms) at which the item may start.
    fn stamp(&self) -> u64;
}

/// Min-ordered store of tasks that could not start immediately.
///
/// Implementations must return items in nondecreasing [`Stamped::stamp`]
/// order. How equal stamps are ordered is implementation-defined; the
/// in-memory backend keeps them FIFO.
pub trait Backlog<T: Stamped>: Send {
    /// Insert an item.
    fn insert(&mut self, item: T);
    /// Borrow the item with the smallest stamp.
    fn peek_min(&self) -> Option<&T>;
    /// Remove and return the item with the smallest stamp.
    fn extract_min(&mut self) -> Option<T>;
    /// Current depth.
    fn len(&self) -> usize;
    /// Whether nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
