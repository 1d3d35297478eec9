//! TAP version 13 reporter

use crate::format::{word_wrap, yaml_like};
use crate::Output;
use colored::{ColoredString, Colorize};
use std::cell::Cell;
use std::io::Write;
use testup_core::{CaseRef, Reporter, SuiteRef, UnitRef};

/// Continuation prefix for wrapped lines
const WRAP_INDENT: &str = "  ";

/// Writes a TAP 13 stream.
///
/// Test points are numbered across the whole run. A failed case is followed
/// by a YAML diagnostic block; a case skipped by its modifiers is emitted
/// with a `# SKIP` directive so the plan still adds up.
pub struct TapReporter {
    out: Output,
    line_length: usize,
    color: bool,
    counter: Cell<usize>,
}

impl TapReporter {
    pub fn new(out: impl Write + 'static) -> Self {
        Self {
            out: Output::new(out),
            line_length: 80,
            color: true,
            counter: Cell::new(0),
        }
    }

    /// Report to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    pub fn with_line_length(mut self, line_length: usize) -> Self {
        self.line_length = line_length;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn bail_out(&self, headline: &str, error: &anyhow::Error) {
        self.out.line(&format!("Bail out! {headline}"));
        for line in format!("{error:#}").lines() {
            self.out.line(&format!("# {line}"));
        }
    }
}

impl Reporter for TapReporter {
    fn start_suite(&self, suite: SuiteRef<'_>) {
        if !suite.is_root() {
            return;
        }
        let total = suite.total();
        self.out.line("TAP version 13");
        self.out.line(&format!("{}..{}", total.min(1), total));
    }

    fn end_suite(&self, suite: SuiteRef<'_>) {
        if !suite.is_root() {
            return;
        }
        let total = suite.total();
        let rate = if total == 0 {
            0.0
        } else {
            suite.passed() as f64 / total as f64
        };

        self.out.line("");
        self.out
            .line(&format!("# test: {}", self.paint(&total.to_string(), |s| s.bold())));
        self.out.line(&format!(
            "# pass: {}",
            self.paint(&suite.passed().to_string(), |s| s.bold())
        ));
        self.out.line(&format!(
            "# fail: {}",
            self.paint(&suite.failed().to_string(), |s| s.bold())
        ));
        if suite.pending() > 0 {
            self.out.line(&format!(
                "# skip: {}",
                self.paint(&suite.pending().to_string(), |s| s.bold())
            ));
        }
        self.out.line(&format!(
            "# rate: {}%",
            self.paint(&format!("{:.2}", rate * 100.0), |s| s.bold())
        ));
    }

    fn start_case(&self, _case: CaseRef<'_>) {}

    fn end_case(&self, case: CaseRef<'_>) {
        let number = self.counter.get() + 1;
        self.counter.set(number);

        let label = if case.label().is_empty() {
            "case"
        } else {
            case.label()
        };
        let path = case.path();
        if !path.is_empty() {
            let comment = word_wrap(
                &format!("# {}", path.join(" :: ")),
                self.line_length,
                WRAP_INDENT,
            );
            self.out.line(&self.paint(&comment, |s| s.dimmed()));
        }

        let (status, directive) = match (case.is_completed(), case.error()) {
            (false, _) => ("ok", " # SKIP not run"),
            (true, None) => ("ok", ""),
            (true, Some(_)) => ("not ok", ""),
        };
        let point = word_wrap(
            &format!("{status} {number} - {label}{directive}"),
            self.line_length,
            WRAP_INDENT,
        );
        let painted = match case.error() {
            Some(_) => self.paint(status, |s| s.red().bold()),
            None => self.paint(status, |s| s.green().bold()),
        };
        self.out.line(&format!("{painted}{}", &point[status.len()..]));

        if let Some(failure) = case.error() {
            let block = yaml_like(
                &[
                    ("message", failure.to_string()),
                    ("kind", failure.kind().to_string()),
                ],
                WRAP_INDENT,
            );
            self.out.line(&format!("{WRAP_INDENT}---"));
            self.out.line(&block);
            self.out.line(&format!("{WRAP_INDENT}..."));
        }
    }

    fn report_broken_unit(&self, unit: UnitRef<'_>, error: &anyhow::Error) {
        let label = if unit.label().is_empty() {
            unit.type_name()
        } else {
            unit.label()
        };
        self.out.line("");
        self.bail_out(
            &format!("Unit error: {label} at {}", unit.path().join(" / ")),
            error,
        );
    }

    fn report_broken_script(&self, error: &anyhow::Error) {
        self.bail_out("Script failure", error);
    }

    fn report_error(&self, error: &anyhow::Error) {
        self.bail_out("Unexpected error", error);
    }
}
