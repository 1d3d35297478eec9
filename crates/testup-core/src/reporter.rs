//! Reporter port
//!
//! The executor drives a [`Reporter`] through a fixed callback protocol.
//! Every method is required.
//!
//! Order of calls for a run without faults:
//! - `start_suite(root)`
//! - for each child, depth-first in declaration order: `start_suite`/`end_suite`
//!   around a suite's children, `start_case`/`end_case` around a case
//! - `end_suite(root)`
//!
//! `end_case` is also called for a case whose modifiers skipped it; such a
//! case is not completed.

use crate::unit::{CaseRef, SuiteRef, UnitRef};

pub trait Reporter {
    fn start_suite(&self, suite: SuiteRef<'_>);

    /// Called once the suite's subtree settled. Counters are final.
    fn end_suite(&self, suite: SuiteRef<'_>);

    fn start_case(&self, case: CaseRef<'_>);

    fn end_case(&self, case: CaseRef<'_>);

    /// A case's modifier chain failed. The run stops after this call.
    fn report_broken_unit(&self, unit: UnitRef<'_>, error: &anyhow::Error);

    /// The script failed while declaring the tree. Nothing was executed.
    fn report_broken_script(&self, error: &anyhow::Error);

    /// A suite's modifier chain failed and the runner reports errors
    /// instead of returning them.
    fn report_error(&self, error: &anyhow::Error);
}

/// Reporter that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn start_suite(&self, _suite: SuiteRef<'_>) {}
    fn end_suite(&self, _suite: SuiteRef<'_>) {}
    fn start_case(&self, _case: CaseRef<'_>) {}
    fn end_case(&self, _case: CaseRef<'_>) {}
    fn report_broken_unit(&self, _unit: UnitRef<'_>, _error: &anyhow::Error) {}
    fn report_broken_script(&self, _error: &anyhow::Error) {}
    fn report_error(&self, _error: &anyhow::Error) {}
}
