//! Admission policies for a saturated gate.
//!
//! These decide what happens to a caller that arrives when every slot is in
//! use, and in which order queued callers are admitted once a slot frees.

/// What a saturated gate does with a new caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Queue the caller until a slot frees
    #[default]
    Queue,
    /// Reject the incoming caller with `Outcome::Dropped`
    DropNewest,
    /// Evict the oldest queued caller (it receives `Outcome::Dropped`) and
    /// queue the incoming one, so only the most recent waiters survive
    DropOldest,
}

impl DropPolicy {
    /// Translate the `drop` / `drop_last` configuration flags.
    ///
    /// # Example
    /// ```
    /// use task_throttle::DropPolicy;
    ///
    /// assert_eq!(DropPolicy::from_flags(false, true), DropPolicy::Queue);
    /// assert_eq!(DropPolicy::from_flags(true, true), DropPolicy::DropNewest);
    /// assert_eq!(DropPolicy::from_flags(true, false), DropPolicy::DropOldest);
    /// ```
    pub fn from_flags(drop: bool, drop_last: bool) -> Self {
        match (drop, drop_last) {
            (false, _) => DropPolicy::Queue,
            (true, true) => DropPolicy::DropNewest,
            (true, false) => DropPolicy::DropOldest,
        }
    }

    /// Check if this policy ever sheds callers.
    pub fn sheds(&self) -> bool {
        !matches!(self, DropPolicy::Queue)
    }
}

/// Order in which queued callers are admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueOrder {
    /// First queued, first admitted
    #[default]
    Fifo,
    /// Last queued, first admitted
    Lifo,
}
