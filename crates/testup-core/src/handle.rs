//! Case handlers and the completion handle
//!
//! A handler settles its case through the [`Test`] handle it receives. The
//! first of these wins:
//! - an explicit [`Test::end`] or [`Test::fail`]
//! - the handler returning an error or panicking
//! - the deadline elapsing (only when the context carries a timeout)
//!
//! A handler that returns `Ok` without signalling fails its case with
//! [`UnsignalledError`] when there is no deadline. With a deadline the case
//! keeps running, so work spawned by the handler can still signal.

use crate::context::Context;
use crate::fault::{ConsistencyError, Failure, PanicError, TimeoutError, UnsignalledError};
use futures_util::future::{self, FutureExt, LocalBoxFuture};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

type Step = LocalBoxFuture<'static, anyhow::Result<()>>;

/// Slot recording the first completion-protocol violation of a run.
pub(crate) type Violations = Rc<RefCell<Option<ConsistencyError>>>;

/// The body of a case.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(Test, Context) -> Step>);

impl Handler {
    /// Start the handler lazily, so a panic in its synchronous prefix happens
    /// while the returned future is polled.
    pub(crate) fn invoke(&self, test: Test, ctx: Context) -> Step {
        let inner = Rc::clone(&self.0);
        async move { inner(test, ctx).await }.boxed_local()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

/// Wrap an async function as a case [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Test, Context) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<()>> + 'static,
{
    Handler(Rc::new(move |test, ctx| f(test, ctx).boxed_local()))
}

#[derive(Debug, Clone)]
enum Phase {
    Running,
    Settled(Option<Failure>),
    Expired,
}

struct Liveness {
    label: String,
    limit: Option<Duration>,
    last_beat: Cell<Instant>,
    holds: Cell<usize>,
    released: Notify,
    phase: RefCell<Phase>,
    settled: Notify,
    violations: Violations,
}

/// Completion handle passed to a case handler. Cloning it is cheap; every
/// clone signals the same case.
#[derive(Clone)]
pub struct Test(Rc<Liveness>);

impl Test {
    pub(crate) fn new(label: impl Into<String>, limit: Option<Duration>, violations: Violations) -> Self {
        Self(Rc::new(Liveness {
            label: label.into(),
            limit,
            last_beat: Cell::new(Instant::now()),
            holds: Cell::new(0),
            released: Notify::new(),
            phase: RefCell::new(Phase::Running),
            settled: Notify::new(),
            violations,
        }))
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// Deadline inherited from the context, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.0.limit
    }

    pub fn is_settled(&self) -> bool {
        !matches!(*self.0.phase.borrow(), Phase::Running)
    }

    /// Signal success.
    pub fn end(&self) -> Result<(), ConsistencyError> {
        self.signal(None)
    }

    /// Signal failure with `error`.
    pub fn fail(&self, error: impl Into<anyhow::Error>) -> Result<(), ConsistencyError> {
        self.signal(Some(Failure::new(error)))
    }

    /// Restart the deadline from now.
    pub fn heartbeat(&self) {
        self.0.last_beat.set(Instant::now());
    }

    /// Sleep for `duration` without the time counting against the deadline.
    /// The deadline restarts once the delay is over.
    pub async fn delay(&self, duration: Duration) {
        let _hold = Hold::new(&self.0);
        tokio::time::sleep(duration).await;
    }

    fn signal(&self, failure: Option<Failure>) -> Result<(), ConsistencyError> {
        let violation = {
            let mut phase = self.0.phase.borrow_mut();
            match &*phase {
                Phase::Running => {
                    *phase = Phase::Settled(failure);
                    None
                }
                Phase::Settled(_) => Some(ConsistencyError::AlreadySignalled {
                    label: self.0.label.clone(),
                }),
                Phase::Expired => Some(ConsistencyError::SignalAfterTimeout {
                    label: self.0.label.clone(),
                }),
            }
        };

        match violation {
            None => {
                self.0.settled.notify_one();
                Ok(())
            }
            Some(err) => {
                tracing::error!(case = %self.0.label, "{err}");
                self.0
                    .violations
                    .borrow_mut()
                    .get_or_insert_with(|| err.clone());
                Err(err)
            }
        }
    }

    /// Drive `work` until the case settles and return its outcome.
    ///
    /// `work` is dropped as soon as the case settles, even if it has not
    /// finished.
    pub(crate) async fn settle(&self, work: Step) -> Option<Failure> {
        let mut work = AssertUnwindSafe(work).catch_unwind();
        let mut work_done = false;
        let expired = self.expired();
        tokio::pin!(expired);

        loop {
            tokio::select! {
                biased;

                failure = self.signalled() => return failure,

                outcome = &mut work, if !work_done => {
                    work_done = true;
                    let error = match outcome {
                        Ok(Ok(())) if self.0.limit.is_some() => continue,
                        Ok(Ok(())) => {
                            self.settle_unsignalled();
                            continue;
                        }
                        Ok(Err(error)) => error,
                        Err(payload) => PanicError::from_payload(payload).into(),
                    };
                    self.absorb(error);
                }

                failure = &mut expired => return Some(failure),
            }
        }
    }

    fn settle_unsignalled(&self) {
        let mut phase = self.0.phase.borrow_mut();
        if matches!(*phase, Phase::Running) {
            *phase = Phase::Settled(Some(Failure::new(UnsignalledError)));
        }
    }

    fn absorb(&self, error: anyhow::Error) {
        let mut phase = self.0.phase.borrow_mut();
        if matches!(*phase, Phase::Running) {
            *phase = Phase::Settled(Some(Failure::new(error)));
        } else {
            tracing::warn!(
                case = %self.0.label,
                error = %format!("{error:#}"),
                "handler failed after its case settled; keeping the first outcome"
            );
        }
    }

    async fn signalled(&self) -> Option<Failure> {
        loop {
            let notified = self.0.settled.notified();
            if let Phase::Settled(failure) = &*self.0.phase.borrow() {
                return failure.clone();
            }
            notified.await;
        }
    }

    async fn expired(&self) -> Failure {
        let Some(limit) = self.0.limit else {
            return future::pending().await;
        };

        loop {
            while self.0.holds.get() > 0 {
                self.0.released.notified().await;
            }

            let deadline = self.0.last_beat.get() + limit;
            if Instant::now() >= deadline {
                if matches!(*self.0.phase.borrow(), Phase::Running) {
                    *self.0.phase.borrow_mut() = Phase::Expired;
                    tracing::debug!(case = %self.0.label, ?limit, "deadline elapsed");
                    return Failure::new(TimeoutError { limit });
                }
                return future::pending().await;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("label", &self.0.label)
            .field("limit", &self.0.limit)
            .field("phase", &*self.0.phase.borrow())
            .finish()
    }
}

/// Suspends the deadline while alive.
struct Hold<'a>(&'a Liveness);

impl<'a> Hold<'a> {
    fn new(liveness: &'a Liveness) -> Self {
        liveness.holds.set(liveness.holds.get() + 1);
        Self(liveness)
    }
}

impl Drop for Hold<'_> {
    fn drop(&mut self) {
        let holds = self.0.holds.get().saturating_sub(1);
        self.0.holds.set(holds);
        self.0.last_beat.set(Instant::now());
        if holds == 0 {
            self.0.released.notify_one();
        }
    }
}
