//! Console reporter - indented tree with pass/fail marks

use crate::Output;
use colored::Colorize;
use std::cell::RefCell;
use std::io::Write;
use testup_core::{CaseRef, Reporter, SuiteRef, UnitRef};

/// A failed case remembered for the summary
#[derive(Debug, Clone)]
struct FailedCase {
    label: String,
    parents: Vec<String>,
    error: String,
}

/// Prints suites as `§ label` headers and cases as marked lines, then lists
/// every failure once the root suite ends.
pub struct ConsoleReporter {
    out: Output,
    errors: Output,
    indent: String,
    initial_indent: String,
    start_depth: usize,
    success_mark: String,
    failure_mark: String,
    color: bool,
    failed: RefCell<Vec<FailedCase>>,
}

impl ConsoleReporter {
    /// Report everything, faults included, to `out`.
    pub fn new(out: impl Write + 'static) -> Self {
        let out = Output::new(out);
        Self {
            errors: out.clone(),
            out,
            indent: "  ".to_string(),
            initial_indent: String::new(),
            start_depth: 0,
            success_mark: "✓".to_string(),
            failure_mark: "✖".to_string(),
            color: true,
            failed: RefCell::new(Vec::new()),
        }
    }

    /// Report to standard output, faults to standard error.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout()).with_error_output(std::io::stderr())
    }

    pub fn with_error_output(mut self, errors: impl Write + 'static) -> Self {
        self.errors = Output::new(errors);
        self
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    pub fn with_initial_indent(mut self, initial_indent: impl Into<String>) -> Self {
        self.initial_indent = initial_indent.into();
        self
    }

    /// Hide suites shallower than `depth` and shift the rest left.
    pub fn with_start_depth(mut self, depth: usize) -> Self {
        self.start_depth = depth;
        self
    }

    pub fn with_marks(mut self, success: impl Into<String>, failure: impl Into<String>) -> Self {
        self.success_mark = success.into();
        self.failure_mark = failure.into();
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn indentation(&self, level: usize) -> String {
        format!("{}{}", self.initial_indent, self.indent.repeat(level))
    }

    fn print_failures(&self) {
        for (i, case) in self.failed.borrow().iter().enumerate() {
            let mut heading = format!("{}) {}", i + 1, case.label);
            if !case.parents.is_empty() {
                heading.push_str(" < ");
                heading.push_str(&case.parents.join(" < "));
            }
            self.out.line("");
            if self.color {
                self.out.line(&heading.bold().to_string());
                self.out.line(&case.error.red().to_string());
            } else {
                self.out.line(&heading);
                self.out.line(&case.error);
            }
        }
    }
}

impl Reporter for ConsoleReporter {
    fn start_suite(&self, suite: SuiteRef<'_>) {
        let depth = suite.depth();
        if depth < self.start_depth || (suite.is_root() && suite.label().is_empty()) {
            return;
        }
        let indent = self.indentation(depth - self.start_depth);
        self.out.line(&format!("{indent}§ {}", suite.label()));
    }

    fn end_suite(&self, suite: SuiteRef<'_>) {
        if suite.is_root() {
            self.print_failures();
        }
    }

    fn start_case(&self, _case: CaseRef<'_>) {}

    fn end_case(&self, case: CaseRef<'_>) {
        let level = (case.depth() - 1).saturating_sub(self.start_depth);
        let indent = self.indentation(level);

        let mark = if !case.is_completed() {
            "-".dimmed()
        } else if case.is_ok() {
            self.success_mark.as_str().green()
        } else {
            self.failure_mark.as_str().red()
        };
        let mark = if self.color { mark } else { mark.clear() };
        self.out.line(&format!("{indent}{mark} {}", case.label()));

        if let Some(failure) = case.error() {
            let parents = case
                .parents()
                .iter()
                .filter(|suite| !suite.is_root())
                .map(|suite| suite.label().to_string())
                .collect();
            self.failed.borrow_mut().push(FailedCase {
                label: case.label().to_string(),
                parents,
                error: format!("{failure} ({})", failure.kind()),
            });
        }
    }

    fn report_broken_unit(&self, unit: UnitRef<'_>, error: &anyhow::Error) {
        self.errors
            .line(&format!("Invalid unit {}: {error:#}", unit.label()));
    }

    fn report_broken_script(&self, error: &anyhow::Error) {
        self.errors.line(&format!("Invalid test script: {error:#}"));
    }

    fn report_error(&self, error: &anyhow::Error) {
        self.errors.line(&format!("Unknown error: {error:#}"));
    }
}
