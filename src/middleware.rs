//! Middleware pipeline: an ordered, append-only list of transforms folded
//! over every candidate state before change detection.
//!
//! Middlewares may be pure transforms or side effects with an identity
//! return; the pipeline always uses the return value as the next candidate.
//! A middleware must not call back into `mutate`/`snapshot` on the same
//! container synchronously: it runs inside the actor loop, and the loop
//! cannot service new requests until it returns. Side effects that need to
//! enqueue work must do so from another thread.

use crate::types::BoxMiddleware;

/// Sequential fold of registered middlewares, in registration order.
/// Owned exclusively by the actor loop; no removal for the container's
/// lifetime.
pub(crate) struct MiddlewarePipeline<S> {
    middlewares: Vec<BoxMiddleware<S>>,
}

impl<S> MiddlewarePipeline<S> {
    pub(crate) fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Append a middleware. Effective for every subsequent candidate; not
    /// retroactive.
    pub(crate) fn register(&mut self, mw: BoxMiddleware<S>) {
        self.middlewares.push(mw);
    }

    /// Fold the candidate through every middleware in registration order.
    pub(crate) fn apply(&mut self, candidate: S) -> S {
        self.middlewares
            .iter_mut()
            .fold(candidate, |acc, mw| mw(acc))
    }

    pub(crate) fn len(&self) -> usize {
        self.middlewares.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_in_registration_order() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.register(Box::new(|s: String| s + "a"));
        pipeline.register(Box::new(|s: String| s + "b"));
        pipeline.register(Box::new(|s: String| s + "c"));

        assert_eq!(pipeline.apply("_".to_string()), "_abc");
        assert_eq!(pipeline.len(), 3);
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let mut pipeline: MiddlewarePipeline<u32> = MiddlewarePipeline::new();
        assert_eq!(pipeline.apply(7), 7);
    }

    #[test]
    fn impure_middleware_return_feeds_next() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.register(Box::new(|n: i64| n * 2));
        pipeline.register(Box::new(|n: i64| n + 1));

        // mw2(mw1(x))
        assert_eq!(pipeline.apply(10), 21);
    }
}
