//! Change detection between the committed state and a candidate.
//!
//! The diff policy is the sole gate for whether a commit notifies state
//! subscribers. It never gates whether a mutation runs: mutations always
//! execute, only the notification is suppressed on a no-op.

/// Decides whether a candidate state counts as a change.
pub trait DiffPolicy<S>: Send {
    /// Returns true if `new` differs from `old` and should be committed
    /// and published.
    fn changed(&self, old: &S, new: &S) -> bool;
}

/// Any `Fn(&S, &S) -> bool` closure is a diff policy.
impl<S, F> DiffPolicy<S> for F
where
    F: Fn(&S, &S) -> bool + Send,
{
    fn changed(&self, old: &S, new: &S) -> bool {
        self(old, new)
    }
}

/// Default policy: exact structural equality.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralDiff;

impl<S: PartialEq> DiffPolicy<S> for StructuralDiff {
    fn changed(&self, old: &S, new: &S) -> bool {
        old != new
    }
}
