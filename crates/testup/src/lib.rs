//! Testup - declarative asynchronous test scripts
//!
//! A script declares suites and cases with `describe`, `using`, `it` and
//! `each`; the executor runs them on a single-threaded tokio runtime and
//! streams the results to a reporter.
//!
//! This crate bundles the pieces a test binary needs:
//! - the engine from `testup-core`, re-exported at the top level
//! - the [`kit`] modifiers
//! - the TAP and console reporters
//! - a [`Harness`] that reads `testup.toml` and command-line flags
//!
//! # Example
//!
//! ```no_run
//! use testup::{kit, Harness};
//!
//! fn main() {
//!     Harness::new()
//!         .script("users", |t| {
//!             t.using(kit::set("name", "ada"))?;
//!             t.it("greets", |test, ctx| async move {
//!                 assert_eq!(ctx.value::<String>("name").as_deref(), Some("ada"));
//!                 test.end()?;
//!                 Ok(())
//!             });
//!             Ok(())
//!         })
//!         .main()
//! }
//! ```

pub mod harness;
pub mod logging;

pub use harness::{Harness, EXIT_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
pub use logging::init_logging;

pub use testup_core::*;

/// Configuration loading
pub use testup_config as config;

/// Bundled reporters
pub use testup_reporter as reporters;
pub use testup_reporter::{Capture, ConsoleReporter, TapReporter};
