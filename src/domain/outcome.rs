//! Result of a throttled call.

/// What happened to a call submitted to a gate.
///
/// `Dropped` is the sentinel for callers shed under backpressure (drop
/// policies, eviction, or explicit cancellation). It is deliberately not an
/// error: failures of the job itself travel inside `Completed`.
///
/// # Example
/// ```
/// use task_throttle::Outcome;
///
/// let done: Outcome<u32> = Outcome::Completed(7);
/// assert_eq!(done.completed(), Some(7));
///
/// let shed: Outcome<u32> = Outcome::Dropped;
/// assert!(shed.is_dropped());
/// assert_eq!(shed.map(|v| v * 2), Outcome::Dropped);
/// ```
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome<T> {
    /// The call was admitted and produced a value
    Completed(T),
    /// The call was shed without running
    Dropped,
}

impl<T> Outcome<T> {
    /// Check if the call completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    /// Check if the call was dropped.
    pub fn is_dropped(&self) -> bool {
        matches!(self, Outcome::Dropped)
    }

    /// Convert into the completed value, discarding the dropped marker.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Dropped => None,
        }
    }

    /// Map the completed value.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Dropped => Outcome::Dropped,
        }
    }

    /// Borrow the completed value.
    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(value),
            Outcome::Dropped => Outcome::Dropped,
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Outcome::Dropped, Outcome::Completed)
    }
}
