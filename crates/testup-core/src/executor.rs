//! Tree executor
//!
//! Walks a built [`Tree`] depth-first in declaration order, one unit at a
//! time. Each unit runs inside its composed modifier chain; cases settle
//! through their [`Test`] handle and are counted on every ancestor.
//!
//! The first fault of a run is kept in the session and every unit visited
//! afterwards unwinds with [`Aborted`], so a modifier that swallows the error
//! of its continuation cannot hide a fault raised below it.

use crate::context::Context;
use crate::fault::{Fault, PanicError};
use crate::handle::{Test, Violations};
use crate::modifier::{compose, Rejection};
use crate::reporter::Reporter;
use crate::unit::{CaseId, SuiteId, Tree, UnitId};
use futures_util::future::{FutureExt, LocalBoxFuture};
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, error, warn};

type Step = LocalBoxFuture<'static, anyhow::Result<()>>;

/// Returned through continuations once the run has a fault.
#[derive(Debug, Error)]
#[error("run aborted")]
pub struct Aborted;

pub(crate) struct Executor {
    tree: RefCell<Tree>,
    reporter: Rc<dyn Reporter>,
    fault: RefCell<Option<Fault>>,
    violations: Violations,
}

impl Executor {
    pub(crate) fn new(tree: Tree, reporter: Rc<dyn Reporter>) -> Rc<Self> {
        Rc::new(Self {
            tree: RefCell::new(tree),
            reporter,
            fault: RefCell::new(None),
            violations: Violations::default(),
        })
    }

    /// Execute the whole tree starting at the root with `ctx`.
    pub(crate) async fn execute(self: &Rc<Self>, ctx: Context) {
        // Faults are recorded in the session; the returned error only unwinds
        let _ = Rc::clone(self).visit_suite(SuiteId::ROOT, ctx).await;
        self.check_violations();
    }

    /// Hand back the tree together with the first fault of the run.
    pub(crate) fn finish(self: Rc<Self>) -> (Tree, Option<Fault>) {
        match Rc::try_unwrap(self) {
            Ok(executor) => (executor.tree.into_inner(), executor.fault.into_inner()),
            Err(shared) => {
                let tree = shared.tree.borrow().clone();
                let fault = shared.fault.borrow_mut().take();
                (tree, fault)
            }
        }
    }

    fn visit(self: Rc<Self>, unit: UnitId, ctx: Context) -> Step {
        match unit {
            UnitId::Suite(id) => self.visit_suite(id, ctx),
            UnitId::Case(id) => self.visit_case(id, ctx),
        }
    }

    fn visit_suite(self: Rc<Self>, id: SuiteId, ctx: Context) -> Step {
        async move {
            let modifiers = {
                let tree = self.tree.borrow();
                let suite = tree.suite(id);
                debug!(suite = %suite.label(), depth = suite.depth(), "entering suite");
                self.reporter.start_suite(suite);
                tree.suite_modifiers(id)
            };

            let rejected = Rejection::default();
            let this = Rc::clone(&self);
            let chain = compose(
                modifiers,
                ctx,
                move |ctx| this.visit_children(id, ctx),
                Rc::clone(&rejected),
            );
            let outcome = AssertUnwindSafe(chain).catch_unwind().await;

            if self.has_fault() {
                return Err(Aborted.into());
            }
            if let Some(error) = chain_error(outcome, &rejected) {
                self.raise(Fault::Runtime { suite: id, error });
                return Err(Aborted.into());
            }

            let completed = self.tree.borrow_mut().complete_suite(id);
            if let Err(err) = completed {
                self.raise(err.into());
                return Err(Aborted.into());
            }

            let tree = self.tree.borrow();
            let suite = tree.suite(id);
            debug!(
                suite = %suite.label(),
                total = suite.total(),
                passed = suite.passed(),
                failed = suite.failed(),
                "suite settled"
            );
            self.reporter.end_suite(suite);
            Ok(())
        }
        .boxed_local()
    }

    fn visit_children(self: Rc<Self>, id: SuiteId, ctx: Context) -> Step {
        async move {
            let children = self.tree.borrow().children(id);
            for child in children {
                if self.has_fault() {
                    return Err(Aborted.into());
                }
                Rc::clone(&self).visit(child, ctx.clone()).await?;
            }
            Ok(())
        }
        .boxed_local()
    }

    fn visit_case(self: Rc<Self>, id: CaseId, ctx: Context) -> Step {
        async move {
            let modifiers = {
                let tree = self.tree.borrow();
                let case = tree.case(id);
                debug!(case = %case.label(), index = case.index(), "entering case");
                self.reporter.start_case(case);
                tree.case_modifiers(id)
            };

            let rejected = Rejection::default();
            let this = Rc::clone(&self);
            let chain = compose(
                modifiers,
                ctx,
                move |ctx| this.settle_case(id, ctx),
                Rc::clone(&rejected),
            );
            let outcome = AssertUnwindSafe(chain).catch_unwind().await;

            if self.has_fault() {
                return Err(Aborted.into());
            }
            if let Some(error) = chain_error(outcome, &rejected) {
                self.raise(Fault::Unit { unit: id, error });
                return Err(Aborted.into());
            }

            let tree = self.tree.borrow();
            let case = tree.case(id);
            if !case.is_completed() {
                debug!(case = %case.label(), "case skipped by its modifiers");
            }
            self.reporter.end_case(case);
            Ok(())
        }
        .boxed_local()
    }

    fn settle_case(self: Rc<Self>, id: CaseId, ctx: Context) -> Step {
        async move {
            let (label, handler) = {
                let tree = self.tree.borrow();
                (tree.case(id).label().to_string(), tree.handler(id))
            };

            let test = Test::new(label, ctx.timeout(), Rc::clone(&self.violations));
            let work = handler.invoke(test.clone(), ctx);
            let failure = test.settle(work).await;
            match &failure {
                None => debug!(case = %test.label(), "case passed"),
                Some(failure) => debug!(case = %test.label(), kind = %failure.kind(), "case failed"),
            }

            let completed = self.tree.borrow_mut().complete_case(id, failure);
            if let Err(err) = completed {
                self.raise(err.into());
                return Err(Aborted.into());
            }
            if self.check_violations() {
                return Err(Aborted.into());
            }
            Ok(())
        }
        .boxed_local()
    }

    fn has_fault(&self) -> bool {
        self.fault.borrow().is_some()
    }

    /// Promote a recorded completion-protocol violation to a fault.
    fn check_violations(&self) -> bool {
        let violation = self.violations.borrow().clone();
        match violation {
            Some(err) => {
                self.raise(err.into());
                true
            }
            None => false,
        }
    }

    /// Record `fault` unless the run already has one.
    fn raise(&self, fault: Fault) {
        let mut slot = self.fault.borrow_mut();
        if slot.is_some() {
            debug!(%fault, "run already aborted; dropping fault");
            return;
        }
        match fault {
            Fault::Internal(_) => error!(kind = ?fault.kind(), "{fault}"),
            _ => warn!(kind = ?fault.kind(), "{fault}"),
        }
        *slot = Some(fault);
    }
}

type Outcome = Result<anyhow::Result<()>, Box<dyn std::any::Any + Send>>;

/// The error a chain failed with, if any. A rejected context counts even if
/// a modifier swallowed the error.
fn chain_error(outcome: Outcome, rejected: &Rejection) -> Option<anyhow::Error> {
    match outcome {
        Ok(Ok(())) => rejected.borrow_mut().take().map(anyhow::Error::from),
        Ok(Err(error)) => Some(error),
        Err(payload) => Some(PanicError::from_payload(payload).into()),
    }
}
