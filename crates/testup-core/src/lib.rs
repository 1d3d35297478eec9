//! Testup Core - test tree, builder and executor
//!
//! This library provides the engine behind testup:
//! - The unit tree (suites, cases, counters, paths)
//! - A declarative builder (`describe`, `using`, `it`, `each`)
//! - An asynchronous executor with modifier chains, context propagation and
//!   per-case deadlines
//! - The reporter port and fault taxonomy
//!
//! Everything runs on a single thread: futures are `!Send` and are meant to
//! be driven by a current-thread tokio runtime (inside a `LocalSet` when
//! handlers spawn local tasks).
//!
//! # Example
//!
//! ```ignore
//! use testup_core::{kit, NullReporter, Runner};
//! use std::rc::Rc;
//!
//! let tree = Runner::new()
//!     .run(
//!         |t| {
//!             t.using(kit::set("n", 42))?;
//!             t.it("sees n", |test, ctx| async move {
//!                 assert_eq!(ctx.value::<i64>("n"), Some(42));
//!                 test.end()?;
//!                 Ok(())
//!             });
//!             Ok(())
//!         },
//!         Rc::new(NullReporter),
//!     )
//!     .await?;
//! assert!(tree.root().is_ok());
//! ```

/// Testup version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod builder;
pub mod context;
pub mod executor;
pub mod fault;
pub mod handle;
pub mod kit;
pub mod modifier;
pub mod reporter;
pub mod runner;
pub mod unit;

pub use builder::{Batch, BuildError, Builder, Operation};
pub use context::{Context, Refinement};
pub use executor::Aborted;
pub use fault::{
    ConsistencyError, ContextTypeError, Failure, FailureKind, Fault, FaultKind, PanicError,
    TimeoutError, UnsignalledError,
};
pub use handle::{handler, Handler, Test};
pub use modifier::{modifier, Modifier, Next};
pub use reporter::{NullReporter, Reporter};
pub use runner::Runner;
pub use unit::{CaseId, CaseRef, SuiteId, SuiteRef, Tree, UnitId, UnitRef};
