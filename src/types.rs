//! Core types for the state container.

/// A pending transform: consumes the current state, returns the next
/// candidate. Consumed exactly once, FIFO relative to other mutations.
pub type Mutation<S> = Box<dyn FnOnce(S) -> S + Send>;

/// A pending read: observes the committed state after all mutations
/// enqueued strictly before it. Consumed exactly once.
pub type Snapshot<S> = Box<dyn FnOnce(&S) + Send>;

/// A registered transform/side-effect applied to every candidate state,
/// in registration order. The return value becomes the next candidate.
pub type BoxMiddleware<S> = Box<dyn FnMut(S) -> S + Send>;

/// Unique identifier for a state or event subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// What the actor loop does when a user-supplied callback panics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure, skip the request, continue with the next one.
    /// This is the default.
    IsolateAndContinue,
    /// Terminate the actor loop. Every later call against the container
    /// reports [`ContainerError::ActorPoisoned`].
    ///
    /// [`ContainerError::ActorPoisoned`]: crate::ContainerError::ActorPoisoned
    FailFast,
}

/// Container configuration.
#[derive(Clone, Debug)]
pub struct ContainerConfig {
    /// Buffered states per subscriber before the oldest pending value is
    /// dropped. The actor loop never blocks on a slow subscriber.
    /// Default: 64
    pub state_buffer: usize,

    /// Failure containment for panicking callbacks.
    pub failure_policy: FailurePolicy,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            state_buffer: 64,
            failure_policy: FailurePolicy::IsolateAndContinue,
        }
    }
}
