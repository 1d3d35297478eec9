//! Shared test utilities for executor tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use testup_core::{Builder, CaseRef, Fault, Reporter, Runner, SuiteRef, Tree, UnitRef};

// Re-export testing utilities
pub use pretty_assertions::{assert_eq, assert_ne};

/// One reporter callback, flattened for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartSuite(String),
    EndSuite {
        label: String,
        total: usize,
        passed: usize,
        failed: usize,
    },
    StartCase(String),
    EndCase {
        label: String,
        ok: bool,
        error: Option<String>,
    },
    BrokenUnit {
        label: String,
        error: String,
    },
    BrokenScript(String),
    Error(String),
}

impl Event {
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Event::BrokenUnit { .. } | Event::BrokenScript(_) | Event::Error(_)
        )
    }
}

/// Reporter that records every callback it receives.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: RefCell<Vec<Event>>,
}

impl RecordingReporter {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn faults(&self) -> Vec<Event> {
        self.events().into_iter().filter(Event::is_fault).collect()
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn start_suite(&self, suite: SuiteRef<'_>) {
        self.push(Event::StartSuite(suite.label().to_string()));
    }

    fn end_suite(&self, suite: SuiteRef<'_>) {
        self.push(Event::EndSuite {
            label: suite.label().to_string(),
            total: suite.total(),
            passed: suite.passed(),
            failed: suite.failed(),
        });
    }

    fn start_case(&self, case: CaseRef<'_>) {
        self.push(Event::StartCase(case.label().to_string()));
    }

    fn end_case(&self, case: CaseRef<'_>) {
        self.push(Event::EndCase {
            label: case.label().to_string(),
            ok: case.is_ok(),
            error: case.error().map(|e| e.message()),
        });
    }

    fn report_broken_unit(&self, unit: UnitRef<'_>, error: &anyhow::Error) {
        self.push(Event::BrokenUnit {
            label: unit.label().to_string(),
            error: format!("{error:#}"),
        });
    }

    fn report_broken_script(&self, error: &anyhow::Error) {
        self.push(Event::BrokenScript(format!("{error:#}")));
    }

    fn report_error(&self, error: &anyhow::Error) {
        self.push(Event::Error(format!("{error:#}")));
    }
}

/// Run `script` with default settings and a fresh recording reporter.
pub async fn run<S>(script: S) -> (Result<Tree, Fault>, Rc<RecordingReporter>)
where
    S: FnOnce(&mut Builder<'_>) -> anyhow::Result<()>,
{
    run_with(Runner::new(), script).await
}

/// Run `script` with a configured runner and a fresh recording reporter.
pub async fn run_with<S>(runner: Runner, script: S) -> (Result<Tree, Fault>, Rc<RecordingReporter>)
where
    S: FnOnce(&mut Builder<'_>) -> anyhow::Result<()>,
{
    let reporter = RecordingReporter::new();
    let result = runner.run(script, reporter.clone()).await;
    (result, reporter)
}
