#![forbid(unsafe_code)]

//! Async commands with enablement gating.
//!
//! # Design
//!
//! An [`AsyncCommand<I, O>`] wraps an async action `I -> Result<O, E>`.
//! Three streams describe it:
//!
//! - `can_execute`: effective enablement. For a non-concurrent command this
//!   is `enabled && !executing`; for a concurrent one it is the supplied
//!   enablement as-is.
//! - `is_executing`: `true` while at least one invocation is in flight;
//!   replayed to new subscribers, starting at `false`.
//! - `output`: results of successful invocations. An action failure is
//!   delivered here as the stream's error and ends it.
//!
//! The command subscribes to its own `can_execute` on the first `invoke`
//! and caches the latest value in a mutex-guarded gate. The lock is never
//! held while subscribing or while any stream is notified.
//!
//! # Invariants
//!
//! 1. A rejected invocation never runs the action and never touches
//!    `output`; it returns the default output.
//! 2. `is_executing` is `true` from just before the action starts until
//!    just after its result has been routed to `output`.
//! 3. A non-concurrent command never runs two actions at once: the first
//!    invocation flips `is_executing`, which closes the gate synchronously.
//! 4. Action errors never reach the caller of `invoke`.
//!
//! # Failure Modes
//!
//! - **Enablement never emits**: the command stays disabled.
//! - **Action never completes**: `is_executing` stays `true` and `invoke`
//!   never resolves; there is no timeout.
//! - **Invocation dropped mid-action**: the invocation ends there; nothing
//!   is emitted on `output` and the command accepts the next `invoke`.
//! - **Use after dispose**: `invoke` panics.

use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::LocalBoxFuture;
use futures::{FutureExt, TryFutureExt};
use propel_core::{
    BehaviorSubject, Disposable, SharedSource, Source, StreamError, Subject, Subscription,
    combine_latest, constant,
};
use tracing::{Instrument, debug, debug_span, warn};

use crate::config::CommandConfig;

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

type BoxedAction<I, O> = Box<dyn Fn(I) -> LocalBoxFuture<'static, Result<O, StreamError>>>;

#[derive(Debug, Default)]
struct Gate {
    subscribed: bool,
    allowed: bool,
}

fn lock(gate: &Mutex<Gate>) -> MutexGuard<'_, Gate> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

struct CommandInner<I, O> {
    id: u64,
    config: CommandConfig,
    action: BoxedAction<I, O>,
    can_execute: SharedSource<bool>,
    executing: BehaviorSubject<bool>,
    in_flight: Cell<usize>,
    gate: Rc<Mutex<Gate>>,
    gate_subscription: RefCell<Option<Subscription>>,
    output: RefCell<Option<Subject<O>>>,
    default_output: O,
    disposed: Cell<bool>,
}

impl<I, O: Clone + 'static> CommandInner<I, O> {
    fn allowed(&self) -> bool {
        {
            let mut gate = lock(&self.gate);
            if gate.subscribed {
                return gate.allowed;
            }
            gate.subscribed = true;
        }
        let gate = Rc::clone(&self.gate);
        let subscription = self
            .can_execute
            .subscribe(move |allowed: &bool| lock(&gate).allowed = *allowed);
        *self.gate_subscription.borrow_mut() = Some(subscription);
        lock(&self.gate).allowed
    }

    fn begin(&self) {
        self.in_flight.set(self.in_flight.get() + 1);
        self.executing.set(true);
    }

    fn end(&self) {
        let remaining = self.in_flight.get().saturating_sub(1);
        self.in_flight.set(remaining);
        if remaining == 0 {
            self.executing.set(false);
        }
    }

    fn output_subject(&self) -> Option<Subject<O>> {
        self.output.borrow().clone()
    }
}

/// Ends one invocation when dropped, including when the `invoke` future is
/// dropped before the action finishes.
struct InFlight<'a, I, O: Clone + 'static> {
    inner: &'a CommandInner<I, O>,
}

impl<'a, I, O: Clone + 'static> InFlight<'a, I, O> {
    fn begin(inner: &'a CommandInner<I, O>) -> Self {
        inner.begin();
        Self { inner }
    }
}

impl<I, O: Clone + 'static> Drop for InFlight<'_, I, O> {
    fn drop(&mut self) {
        self.inner.end();
    }
}

/// An async action with enablement, execution and output streams.
///
/// Cloning creates another handle to the **same** command.
pub struct AsyncCommand<I, O> {
    inner: Rc<CommandInner<I, O>>,
}

impl<I, O> Clone for AsyncCommand<I, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<I, O> fmt::Debug for AsyncCommand<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCommand")
            .field("id", &self.inner.id)
            .field("label", &self.inner.config.label)
            .field("in_flight", &self.inner.in_flight.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

impl<I: 'static, O: Clone + Default + 'static> AsyncCommand<I, O> {
    /// Start building a command around `action`.
    pub fn builder<F, Fut, E>(action: F) -> CommandBuilder<I, O>
    where
        F: Fn(I) -> Fut + 'static,
        Fut: Future<Output = Result<O, E>> + 'static,
        E: Error + 'static,
    {
        CommandBuilder {
            action: Box::new(move |input| action(input).map_err(StreamError::new).boxed_local()),
            can_execute: None,
            default_output: None,
            config: CommandConfig::default(),
        }
    }

    /// An always-enabled, non-concurrent command.
    pub fn new<F, Fut, E>(action: F) -> Self
    where
        F: Fn(I) -> Fut + 'static,
        Fut: Future<Output = Result<O, E>> + 'static,
        E: Error + 'static,
    {
        Self::builder(action).build()
    }

    /// Run the action if the command is enabled.
    ///
    /// Returns the action's output, or the default output when the command
    /// is disabled or the action fails. Failures are delivered on
    /// [`output`](Self::output) instead.
    ///
    /// # Panics
    ///
    /// When polled after [`dispose`](Self::dispose).
    pub async fn invoke(&self, input: I) -> O {
        let inner = Rc::clone(&self.inner);
        assert!(
            !inner.disposed.get(),
            "invoke on disposed command {:?}",
            inner.config.label
        );

        if !inner.allowed() {
            debug!(command = %inner.config.label, id = inner.id, "command.rejected");
            return inner.default_output.clone();
        }

        let in_flight = InFlight::begin(&inner);
        let span = debug_span!("command.invoke", command = %inner.config.label, id = inner.id);
        let result = (inner.action)(input).instrument(span).await;

        match result {
            Ok(output) => {
                if let Some(subject) = inner.output_subject() {
                    subject.next(output.clone());
                }
                drop(in_flight);
                output
            }
            Err(err) => {
                warn!(command = %inner.config.label, id = inner.id, error = %err, "command.failed");
                if let Some(subject) = inner.output_subject() {
                    subject.error(err);
                }
                drop(in_flight);
                inner.default_output.clone()
            }
        }
    }

    /// Effective enablement.
    #[must_use]
    pub fn can_execute(&self) -> SharedSource<bool> {
        Rc::clone(&self.inner.can_execute)
    }

    /// Whether an invocation is in flight; replays the current value.
    #[must_use]
    pub fn is_executing(&self) -> SharedSource<bool> {
        Rc::new(self.inner.executing.clone())
    }

    /// Whether an invocation is in flight right now. Unlike
    /// [`is_executing`](Self::is_executing) this keeps tracking after
    /// [`dispose`](Self::dispose).
    #[must_use]
    pub fn executing_now(&self) -> bool {
        self.inner.in_flight.get() > 0
    }

    /// Outputs of successful invocations. Only invocations that finish
    /// after the first call to this method are delivered.
    #[must_use]
    pub fn output(&self) -> SharedSource<O> {
        let subject = self
            .inner
            .output
            .borrow_mut()
            .get_or_insert_with(|| {
                if self.inner.disposed.get() {
                    Subject::completed()
                } else {
                    Subject::new()
                }
            })
            .clone();
        Rc::new(subject)
    }

    /// Span label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.config.label
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Drop the enablement subscription and complete the output and
    /// execution streams. Later calls do nothing. In-flight actions are not
    /// cancelled.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        debug!(command = %self.inner.config.label, id = self.inner.id, "command.dispose");
        drop(self.inner.gate_subscription.borrow_mut().take());
        if let Some(subject) = self.inner.output_subject() {
            subject.complete();
        }
        self.inner.executing.complete();
    }
}

impl<I: 'static, O: Clone + Default + 'static> Disposable for AsyncCommand<I, O> {
    fn dispose(&mut self) {
        AsyncCommand::dispose(self);
    }
}

/// Builder returned by [`AsyncCommand::builder`].
pub struct CommandBuilder<I, O> {
    action: BoxedAction<I, O>,
    can_execute: Option<SharedSource<bool>>,
    default_output: Option<O>,
    config: CommandConfig,
}

impl<I, O: fmt::Debug> fmt::Debug for CommandBuilder<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuilder")
            .field("has_can_execute", &self.can_execute.is_some())
            .field("default_output", &self.default_output)
            .field("config", &self.config)
            .finish()
    }
}

impl<I: 'static, O: Clone + Default + 'static> CommandBuilder<I, O> {
    /// Gate the command on `source`. The command stays disabled until the
    /// source produces its first value.
    #[must_use]
    pub fn can_execute(mut self, source: impl Source<bool> + 'static) -> Self {
        self.can_execute = Some(source.shared());
        self
    }

    /// Value returned by rejected or failed invocations. Defaults to
    /// `O::default()`.
    #[must_use]
    pub fn default_output(mut self, value: O) -> Self {
        self.default_output = Some(value);
        self
    }

    /// Allow overlapping invocations.
    #[must_use]
    pub fn allow_concurrent(mut self, allow: bool) -> Self {
        self.config.allow_concurrent = allow;
        self
    }

    /// Span label.
    #[must_use]
    pub fn label(mut self, label: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: CommandConfig) -> Self {
        self.config = config;
        self
    }

    /// Finish the command.
    #[must_use]
    pub fn build(self) -> AsyncCommand<I, O> {
        let executing = BehaviorSubject::new(false);
        let external = self
            .can_execute
            .unwrap_or_else(|| constant(true).shared());
        let can_execute = if self.config.allow_concurrent {
            external
        } else {
            combine_latest(external, executing.clone())
                .map(|(enabled, busy): &(bool, bool)| *enabled && !*busy)
                .distinct_until_changed()
                .shared()
        };
        let id = NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            command = %self.config.label,
            id,
            concurrent = self.config.allow_concurrent,
            "command.create"
        );

        AsyncCommand {
            inner: Rc::new(CommandInner {
                id,
                config: self.config,
                action: self.action,
                can_execute,
                executing,
                in_flight: Cell::new(0),
                gate: Rc::new(Mutex::new(Gate::default())),
                gate_subscription: RefCell::new(None),
                output: RefCell::new(None),
                default_output: self.default_output.unwrap_or_default(),
                disposed: Cell::new(false),
            }),
        }
    }
}
