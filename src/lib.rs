//! # unistate
//!
//! A sequential, in-process state container: many concurrent producers
//! request reads or mutations of a single shared value; one actor thread
//! per container applies them race-free, in order, with deterministic
//! middleware side-effects and a separate fire-and-forget event stream.
//!
//! ## Core Concepts
//!
//! - **Mutations**: `State -> State` transforms, FIFO, strict priority
//!   over reads
//! - **Snapshots**: read-only observations of the committed state
//! - **Middleware**: append-only transforms folded over every candidate
//!   state before commit
//! - **Diff policy**: the equality gate deciding whether a commit
//!   notifies state subscribers
//! - **Events**: one-shot notifications, no replay, newest replaces
//!   undelivered
//!
//! ## Example
//!
//! ```
//! use unistate::StateContainer;
//!
//! #[derive(Clone, PartialEq)]
//! struct AppState { counter: u64 }
//!
//! let container: StateContainer<AppState, String> =
//!     StateContainer::new(AppState { counter: 0 });
//!
//! let states = container.subscribe_state().unwrap();
//! container.mutate(|s| AppState { counter: s.counter + 1 }).unwrap();
//!
//! assert_eq!(states.recv().unwrap().counter, 0); // value at subscribe
//! assert_eq!(states.recv().unwrap().counter, 1); // the commit
//!
//! container.emit_event("saved".to_string()).unwrap();
//! ```
//!
//! ## Guarantees and hazards
//!
//! - `mutate` and `snapshot` never block the caller; queues are unbounded.
//! - Mutations have strict priority: a continuous mutation stream starves
//!   pending snapshots. Pace producers externally if a deployment cannot
//!   accept that.
//! - Event delivery is lossy per subscriber: at most one undelivered
//!   event is retained, and a newer one silently replaces it.
//! - Middleware runs on the actor thread and must not call back into the
//!   same container synchronously.

mod channel;
pub mod container;
pub mod diff;
pub mod error;
pub mod events;
mod middleware;
pub mod persist;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use container::{ContainerBuilder, StateContainer};
pub use diff::{DiffPolicy, StructuralDiff};
pub use error::{ContainerError, Result};
pub use events::EventSubscription;
pub use persist::{MemoryBackend, PersistedField, Persistence, StateBackend};
pub use subscriptions::StateSubscription;
pub use types::{ContainerConfig, FailurePolicy, SubscriptionId};
