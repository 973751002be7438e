//! The state container: a single sequential actor that owns the state
//! value and serializes all mutation and snapshot requests against it.
//!
//! Callers enqueue requests from any thread without blocking. One actor
//! thread per container dequeues with mutation priority, applies the
//! mutation, folds the result through the middleware pipeline, and
//! commits + publishes only when the diff policy reports a change.
//! A continuous stream of mutations can starve snapshots; that is the
//! documented priority contract, not a bug.

use crate::diff::{DiffPolicy, StructuralDiff};
use crate::error::{ContainerError, Result};
use crate::events::{EventBus, EventSubscription};
use crate::middleware::MiddlewarePipeline;
use crate::persist::Persistence;
use crate::subscriptions::{StateSubscription, StateSubscriptions};
use crate::types::{BoxMiddleware, ContainerConfig, FailurePolicy, Mutation, Snapshot};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Requests riding the mutation-priority queue. Middleware registration
/// travels here too, so the middleware list stays owned by the actor loop
/// and registration order relative to surrounding mutations holds.
enum Command<S> {
    Apply(Mutation<S>),
    Register(BoxMiddleware<S>),
}

/// Flags shared between the public handle and the actor thread.
struct Status {
    disposed: AtomicBool,
    poisoned: AtomicBool,
}

/// A shared state container generic over an opaque state type `S` and an
/// opaque event type `E`.
///
/// `mutate` and `snapshot` never block: requests land on unbounded queues
/// consumed by a dedicated actor thread, the only writer of the state.
/// One-shot events bypass the actor entirely; see
/// [`StateContainer::emit_event`] for their delivery semantics.
pub struct StateContainer<S, E = ()> {
    commands: Sender<Command<S>>,
    snapshots: Sender<Snapshot<S>>,
    stop: Sender<()>,
    status: Arc<Status>,
    state_subs: Arc<StateSubscriptions<S>>,
    events: Arc<EventBus<E>>,
    actor: Mutex<Option<JoinHandle<()>>>,
}

impl<S, E> StateContainer<S, E>
where
    S: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create a container with the default configuration and structural
    /// equality as the diff policy.
    pub fn new(initial: S) -> Self
    where
        S: PartialEq,
    {
        Self::builder(initial).build()
    }

    /// Start building a container with structural equality as the diff
    /// policy. Use [`ContainerBuilder::with_diff_policy`] for state types
    /// without a usable `PartialEq`.
    pub fn builder(initial: S) -> ContainerBuilder<S, E>
    where
        S: PartialEq,
    {
        ContainerBuilder::with_diff_policy(initial, StructuralDiff)
    }

    /// Enqueue a state transform. Never blocks; FIFO relative to other
    /// mutations; strict priority over snapshots. Under sustained
    /// mutation load, pending snapshots wait indefinitely.
    pub fn mutate(&self, f: impl FnOnce(S) -> S + Send + 'static) -> Result<()> {
        self.guard()?;
        self.commands
            .send(Command::Apply(Box::new(f)))
            .map_err(|_| self.send_failed())
    }

    /// Enqueue a read of the committed state. Never blocks. The callback
    /// observes the state after every mutation enqueued strictly before
    /// this call.
    pub fn snapshot(&self, f: impl FnOnce(&S) + Send + 'static) -> Result<()> {
        self.guard()?;
        self.snapshots
            .send(Box::new(f))
            .map_err(|_| self.send_failed())
    }

    /// Append a middleware. Effective for every mutation enqueued after
    /// this call; not retroactive. Middlewares must not call back into
    /// this container synchronously.
    pub fn register_middleware(&self, mw: impl FnMut(S) -> S + Send + 'static) -> Result<()> {
        self.guard()?;
        self.commands
            .send(Command::Register(Box::new(mw)))
            .map_err(|_| self.send_failed())
    }

    /// Append a read-only middleware: a side effect that observes every
    /// candidate state and returns it unchanged.
    pub fn register_pure_middleware(&self, f: impl Fn(&S) + Send + 'static) -> Result<()> {
        self.register_middleware(move |state| {
            f(&state);
            state
        })
    }

    /// Subscribe to committed state changes. The current value is
    /// delivered immediately, then every change that passes the diff
    /// policy. Slow subscribers lose their oldest pending values, never
    /// stalling the actor.
    pub fn subscribe_state(&self) -> Result<StateSubscription<S>> {
        self.guard()?;
        Ok(self.state_subs.subscribe())
    }

    /// Subscribe to one-shot events. No replay: only events emitted while
    /// attached are seen, and an undelivered event is replaced by the
    /// next one.
    pub fn subscribe_events(&self) -> Result<EventSubscription<E>> {
        self.guard()?;
        Ok(self.events.subscribe())
    }

    /// Publish a one-shot event to all current event subscribers,
    /// bypassing the request queues. Never blocks.
    pub fn emit_event(&self, event: E) -> Result<()> {
        self.guard()?;
        self.events.publish(event);
        Ok(())
    }

    /// Whether the container was disposed.
    pub fn is_disposed(&self) -> bool {
        self.status.disposed.load(Ordering::Acquire)
    }

    /// Stop the actor loop after any in-flight request. Queued but
    /// unprocessed requests are dropped without invocation. Idempotent;
    /// also runs on drop. Every later call against the container reports
    /// [`ContainerError::Disposed`].
    pub fn dispose(&self) {
        if self.status.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Wake the loop if it is suspended between requests.
        let _ = self.stop.try_send(());

        if let Some(handle) = self.actor.lock().take() {
            // A callback running on the actor thread may dispose its own
            // container; the loop exits via the flag, no join possible.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }

        self.state_subs.close();
        self.events.close();
        tracing::debug!("container disposed");
    }

    /// The request channel disconnected: the loop exited, either through
    /// a fail-fast panic or a concurrent disposal.
    fn send_failed(&self) -> ContainerError {
        if self.status.poisoned.load(Ordering::Acquire) {
            ContainerError::ActorPoisoned
        } else {
            ContainerError::Disposed
        }
    }

    fn guard(&self) -> Result<()> {
        if self.status.disposed.load(Ordering::Acquire) {
            return Err(ContainerError::Disposed);
        }
        if self.status.poisoned.load(Ordering::Acquire) {
            return Err(ContainerError::ActorPoisoned);
        }
        Ok(())
    }
}

impl<S, E> Drop for StateContainer<S, E> {
    fn drop(&mut self) {
        if self.status.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.stop.try_send(());
        if let Some(handle) = self.actor.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        self.state_subs.close();
        self.events.close();
    }
}

/// Builder for [`StateContainer`]: configuration, diff policy, initial
/// middlewares, and the optional persistence collaborator.
pub struct ContainerBuilder<S, E = ()> {
    initial: S,
    config: ContainerConfig,
    diff: Box<dyn DiffPolicy<S>>,
    middlewares: Vec<BoxMiddleware<S>>,
    persistence: Option<Persistence<S>>,
    _events: PhantomData<E>,
}

impl<S, E> ContainerBuilder<S, E>
where
    S: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Builder with an explicit diff policy, for state types without a
    /// usable structural equality.
    pub fn with_diff_policy(initial: S, policy: impl DiffPolicy<S> + 'static) -> Self {
        Self {
            initial,
            config: ContainerConfig::default(),
            diff: Box::new(policy),
            middlewares: Vec::new(),
            persistence: None,
            _events: PhantomData,
        }
    }

    /// Replace the container configuration.
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the diff policy.
    pub fn diff_policy(mut self, policy: impl DiffPolicy<S> + 'static) -> Self {
        self.diff = Box::new(policy);
        self
    }

    /// Register a middleware before the loop starts. Applied after the
    /// persistence middleware, in the order given.
    pub fn middleware(mut self, mw: impl FnMut(S) -> S + Send + 'static) -> Self {
        self.middlewares.push(Box::new(mw));
        self
    }

    /// Attach a persistence collaborator. Its initializer runs exactly
    /// once, before the actor loop starts; its middleware is registered
    /// first, so it sees every candidate state in order.
    pub fn persistence(mut self, persistence: Persistence<S>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Run the initializer (if any), spawn the actor thread, and return
    /// the live container.
    pub fn build(self) -> StateContainer<S, E> {
        let mut initial = self.initial;
        let mut pipeline = MiddlewarePipeline::new();

        if let Some(persistence) = self.persistence {
            initial = (persistence.initializer)(initial);
            pipeline.register(persistence.middleware);
        }
        for mw in self.middlewares {
            pipeline.register(mw);
        }

        let (commands_tx, commands_rx) = unbounded();
        let (snapshots_tx, snapshots_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded(1);

        let status = Arc::new(Status {
            disposed: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
        });
        let state_subs = Arc::new(StateSubscriptions::new(
            initial.clone(),
            self.config.state_buffer,
        ));
        let events = Arc::new(EventBus::new());

        let actor = Actor {
            commands: commands_rx,
            snapshots: snapshots_rx,
            stop: stop_rx,
            state: initial,
            pipeline,
            diff: self.diff,
            subs: Arc::clone(&state_subs),
            status: Arc::clone(&status),
            policy: self.config.failure_policy,
        };
        let handle = thread::spawn(move || actor.run());

        StateContainer {
            commands: commands_tx,
            snapshots: snapshots_tx,
            stop: stop_tx,
            status,
            state_subs,
            events,
            actor: Mutex::new(Some(handle)),
        }
    }
}

/// The sequential processing loop. Sole owner and writer of the state
/// value and the middleware list.
struct Actor<S> {
    commands: Receiver<Command<S>>,
    snapshots: Receiver<Snapshot<S>>,
    stop: Receiver<()>,
    state: S,
    pipeline: MiddlewarePipeline<S>,
    diff: Box<dyn DiffPolicy<S>>,
    subs: Arc<StateSubscriptions<S>>,
    status: Arc<Status>,
    policy: FailurePolicy,
}

impl<S: Clone> Actor<S> {
    fn run(mut self) {
        tracing::debug!("actor loop started");
        loop {
            if self.status.disposed.load(Ordering::Acquire) {
                break;
            }

            // Mutation queue has strict priority: drain it before ever
            // consulting the snapshot queue.
            match self.commands.try_recv() {
                Ok(cmd) => {
                    if !self.handle_command(cmd) {
                        break;
                    }
                    continue;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break,
            }

            match self.snapshots.try_recv() {
                Ok(snap) => {
                    if !self.service_snapshot(snap) {
                        break;
                    }
                    continue;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break,
            }

            // Both queues empty: suspend until a request or disposal.
            select! {
                recv(self.commands) -> cmd => match cmd {
                    Ok(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(self.snapshots) -> snap => match snap {
                    Ok(snap) => {
                        if !self.service_snapshot(snap) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(self.stop) -> _ => break,
            }
        }
        tracing::debug!("actor loop stopped");
    }

    fn handle_command(&mut self, cmd: Command<S>) -> bool {
        match cmd {
            Command::Apply(f) => self.apply_mutation(f),
            Command::Register(mw) => {
                self.pipeline.register(mw);
                tracing::trace!(count = self.pipeline.len(), "middleware registered");
                true
            }
        }
    }

    /// Run a snapshot, but only after draining any mutation that was
    /// enqueued before the snapshot landed. Sends within one producer
    /// thread are ordered across both channels, so the drain makes the
    /// mutation-first guarantee exact rather than best-effort.
    fn service_snapshot(&mut self, snap: Snapshot<S>) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(cmd) => {
                    if !self.handle_command(cmd) {
                        return false;
                    }
                }
                Err(_) => break,
            }
        }
        self.handle_snapshot(snap)
    }

    fn apply_mutation(&mut self, f: Mutation<S>) -> bool {
        let current = self.state.clone();
        let pipeline = &mut self.pipeline;
        let outcome = catch_unwind(AssertUnwindSafe(move || pipeline.apply(f(current))));

        match outcome {
            Ok(candidate) => {
                if self.diff.changed(&self.state, &candidate) {
                    self.state = candidate;
                    self.subs.publish(&self.state);
                    tracing::trace!("state committed");
                } else {
                    tracing::trace!("no-op mutation, notification suppressed");
                }
                true
            }
            Err(_) => self.contain_failure("mutation"),
        }
    }

    fn handle_snapshot(&mut self, f: Snapshot<S>) -> bool {
        match catch_unwind(AssertUnwindSafe(|| f(&self.state))) {
            Ok(()) => true,
            Err(_) => self.contain_failure("snapshot"),
        }
    }

    fn contain_failure(&self, kind: &str) -> bool {
        match self.policy {
            FailurePolicy::IsolateAndContinue => {
                tracing::error!(kind, "callback panicked, request skipped");
                true
            }
            FailurePolicy::FailFast => {
                tracing::error!(kind, "callback panicked, terminating actor loop");
                self.status.poisoned.store(true, Ordering::Release);
                false
            }
        }
    }
}
