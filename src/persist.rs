//! Persistence collaborator: the narrow boundary through which durable
//! state restoration plugs into a container.
//!
//! The container imposes no storage format. A collaborator supplies an
//! *initializer* (run exactly once, before the actor loop starts, to
//! compute the effective initial state from durable storage plus the
//! caller-supplied default) and a *middleware* (registered first, so it
//! sees every candidate state in commit order and writes selected fields
//! back out).
//!
//! Field selection is statically declared: a [`PersistedField`] pairs an
//! accessor that serializes one field with a mutator that restores it.
//! There is no runtime type inspection; the container stays fully generic
//! over an opaque state type.

use crate::types::BoxMiddleware;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Durable key-value storage supplied by the collaborator. Bytes in,
/// bytes out; the format is the collaborator's business.
pub trait StateBackend: Send + Sync {
    /// Load the stored bytes for a key, if any.
    fn load(&self, key: &str) -> Option<Vec<u8>>;

    /// Store bytes under a key, replacing any previous value.
    fn store(&self, key: &str, value: &[u8]);
}

/// In-process backend for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).cloned()
    }

    fn store(&self, key: &str, value: &[u8]) {
        self.entries.lock().insert(key.to_string(), value.to_vec());
    }
}

/// A statically declared accessor/mutator pair for one persisted field.
pub struct PersistedField<S> {
    key: String,
    save: Box<dyn Fn(&S) -> Vec<u8> + Send + Sync>,
    load: Box<dyn Fn(&mut S, &[u8]) + Send + Sync>,
}

impl<S> PersistedField<S> {
    /// Declare a persisted field. `save` serializes the field from a
    /// state value; `load` writes stored bytes back into one.
    pub fn new(
        key: impl Into<String>,
        save: impl Fn(&S) -> Vec<u8> + Send + Sync + 'static,
        load: impl Fn(&mut S, &[u8]) + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            save: Box::new(save),
            load: Box::new(load),
        }
    }
}

/// Initializer + middleware pair wiring a persistence collaborator into
/// a container at construction time.
pub struct Persistence<S> {
    pub(crate) initializer: Box<dyn FnOnce(S) -> S + Send>,
    pub(crate) middleware: BoxMiddleware<S>,
}

impl<S: 'static> Persistence<S> {
    /// Build from an explicit initializer and middleware.
    pub fn new(
        initializer: impl FnOnce(S) -> S + Send + 'static,
        middleware: impl FnMut(S) -> S + Send + 'static,
    ) -> Self {
        Self {
            initializer: Box::new(initializer),
            middleware: Box::new(middleware),
        }
    }

    /// Build from a backend and a declared field list.
    ///
    /// The initializer restores every field that has stored bytes; the
    /// middleware writes every declared field on each candidate it sees.
    pub fn from_fields(backend: Arc<dyn StateBackend>, fields: Vec<PersistedField<S>>) -> Self {
        let fields = Arc::new(fields);

        let init_fields = Arc::clone(&fields);
        let init_backend = Arc::clone(&backend);
        let initializer = move |mut state: S| {
            for field in init_fields.iter() {
                if let Some(bytes) = init_backend.load(&field.key) {
                    (field.load)(&mut state, &bytes);
                }
            }
            state
        };

        let middleware = move |state: S| {
            for field in fields.iter() {
                backend.store(&field.key, &(field.save)(&state));
            }
            state
        };

        Self {
            initializer: Box::new(initializer),
            middleware: Box::new(middleware),
        }
    }
}
