//! Fault taxonomy
//!
//! Two families of errors flow through a run:
//! - **failures**: anything a test author causes through ordinary test code
//!   (a returned error, a panic, a missed deadline). They are absorbed into
//!   case state as a [`Failure`] and counted.
//! - **faults**: a misused or broken script, modifier or framework invariant.
//!   They halt the run and are routed to the dedicated reporter channels
//!   according to their [`FaultKind`].

use crate::unit::{CaseId, SuiteId, UnitId};
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

/// Discriminator of a [`Fault`], used by the runner to pick a reporter channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The script failed while building the tree
    Script,
    /// A case's own modifier chain failed
    Unit,
    /// A suite's own modifier chain failed
    Runtime,
    /// A framework invariant was violated
    Internal,
}

/// A framework-level error. Never counted as a test failure.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("broken script: {error:#}")]
    Script { error: anyhow::Error },

    #[error("broken unit {unit}: {error:#}")]
    Unit { unit: CaseId, error: anyhow::Error },

    #[error("runtime error in {suite}: {error:#}")]
    Runtime { suite: SuiteId, error: anyhow::Error },

    #[error("internal consistency violated: {0}")]
    Internal(#[from] ConsistencyError),
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::Script { .. } => FaultKind::Script,
            Fault::Unit { .. } => FaultKind::Unit,
            Fault::Runtime { .. } => FaultKind::Runtime,
            Fault::Internal(_) => FaultKind::Internal,
        }
    }

    /// The error that caused this fault, if it carries one.
    pub fn origin(&self) -> Option<&anyhow::Error> {
        match self {
            Fault::Script { error } | Fault::Unit { error, .. } | Fault::Runtime { error, .. } => {
                Some(error)
            }
            Fault::Internal(_) => None,
        }
    }
}

/// Violations of the tree and completion invariants. These indicate a bug in
/// the framework (or a misused completion handle) and are always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("{unit} is already completed")]
    AlreadyCompleted { unit: UnitId },

    #[error("invalid tests count in {suite}: {settled} of {total} cases already settled")]
    CountersSaturated {
        suite: SuiteId,
        settled: usize,
        total: usize,
    },

    #[error("completion of case '{label}' was signalled more than once")]
    AlreadySignalled { label: String },

    #[error("completion of case '{label}' was signalled after its timeout fired")]
    SignalAfterTimeout { label: String },
}

/// A modifier handed something other than a plain record to its continuation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Context should be a plain record (JSON object), got {found}")]
pub struct ContextTypeError {
    pub found: &'static str,
}

/// A case did not signal completion before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Timeout of {limit:?} exceeded")]
pub struct TimeoutError {
    pub limit: Duration,
}

/// A handler without a deadline returned without calling `end()` or `fail()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Case completed without end() call")]
pub struct UnsignalledError;

/// A handler, modifier or script panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PanicError {
    pub message: String,
}

impl PanicError {
    /// Recover the message from a caught panic payload.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panicked with a non-string payload".to_string()
        };
        Self { message }
    }
}

/// How a failed case failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The handler returned or signalled an error
    Error,
    /// The handler panicked (usually a failed assertion)
    Panic,
    /// The deadline elapsed
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error => write!(f, "error"),
            FailureKind::Panic => write!(f, "panic"),
            FailureKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// The failure payload stored on a case. Cheap to clone.
#[derive(Clone)]
pub struct Failure(Rc<anyhow::Error>);

impl Failure {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Rc::new(error.into()))
    }

    pub fn message(&self) -> String {
        self.0.to_string()
    }

    pub fn kind(&self) -> FailureKind {
        if self.0.is::<TimeoutError>() {
            FailureKind::Timeout
        } else if self.0.is::<PanicError>() {
            FailureKind::Panic
        } else {
            FailureKind::Error
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == FailureKind::Timeout
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind())
            .field("message", &self.message())
            .finish()
    }
}
