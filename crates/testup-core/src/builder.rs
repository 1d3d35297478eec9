//! Declarative tree construction
//!
//! A script receives a [`Builder`] and declares suites, modifiers and cases
//! synchronously:
//!
//! ```ignore
//! Tree::build("math", |t| {
//!     t.describe("addition", |t| {
//!         t.using(kit::set("lhs", 2))?;
//!         t.it("adds", |test, ctx| async move {
//!             assert_eq!(ctx.value::<i64>("lhs"), Some(2));
//!             test.end()?;
//!             Ok(())
//!         });
//!         Ok(())
//!     })
//! })
//! ```

use crate::context::Context;
use crate::handle::{handler, Handler, Test};
use crate::modifier::Modifier;
use crate::unit::{CaseId, SuiteId, Tree};
use std::fmt;
use std::future::Future;
use std::mem;
use thiserror::Error;

/// Builder operation that closes a suite's modifier list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Describe,
    It,
    Each,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Describe => write!(f, "describe"),
            Operation::It => write!(f, "it"),
            Operation::Each => write!(f, "each"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("use() after {operation}() in suite '{suite}'")]
    UseAfter { operation: Operation, suite: String },

    #[error("suite '{suite}' already has cases or suites defined")]
    ChildrenDefined { suite: String },
}

/// One `each` frame: a single modifier or an ordered sequence of them.
#[derive(Debug, Clone, Default)]
pub struct Batch(Vec<Modifier>);

impl From<Modifier> for Batch {
    fn from(modifier: Modifier) -> Self {
        Batch(vec![modifier])
    }
}

impl From<Vec<Modifier>> for Batch {
    fn from(modifiers: Vec<Modifier>) -> Self {
        Batch(modifiers)
    }
}

impl<const N: usize> From<[Modifier; N]> for Batch {
    fn from(modifiers: [Modifier; N]) -> Self {
        Batch(modifiers.into())
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    suite: SuiteId,
    sealed_by: Option<Operation>,
}

impl Frame {
    fn open(suite: SuiteId) -> Self {
        Self {
            suite,
            sealed_by: None,
        }
    }
}

pub struct Builder<'t> {
    tree: &'t mut Tree,
    frame: Frame,
    batches: Vec<Batch>,
}

impl<'t> Builder<'t> {
    pub(crate) fn new(tree: &'t mut Tree) -> Self {
        Self {
            tree,
            frame: Frame::open(SuiteId::ROOT),
            batches: Vec::new(),
        }
    }

    /// The suite new units are added to.
    pub fn current(&self) -> SuiteId {
        self.frame.suite
    }

    pub fn tree(&self) -> &Tree {
        &*self.tree
    }

    /// Declare a nested suite.
    ///
    /// Modifiers from enclosing `each` frames are attached to the new suite
    /// once and are not re-applied to the units declared inside `body`.
    pub fn describe<F>(&mut self, label: impl Into<String>, body: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Builder<'_>) -> anyhow::Result<()>,
    {
        self.seal(Operation::Describe);
        let label = label.into();
        tracing::trace!(suite = %label, "describe");

        let modifiers = self.active();
        let suite = self.tree.add_suite(self.frame.suite, label, modifiers);
        let outer = mem::replace(&mut self.frame, Frame::open(suite));
        let batches = mem::take(&mut self.batches);

        let result = body(&mut *self);

        self.frame = outer;
        self.batches = batches;
        result
    }

    /// Append a modifier to the current suite. Must come before any
    /// `describe`, `it` or `each` in that suite.
    pub fn using(&mut self, modifier: Modifier) -> Result<(), BuildError> {
        if let Some(operation) = self.frame.sealed_by {
            return Err(BuildError::UseAfter {
                operation,
                suite: self.tree.suite(self.frame.suite).label().to_string(),
            });
        }
        self.tree.add_modifier(self.frame.suite, modifier)
    }

    /// Declare a case.
    pub fn it<F, Fut>(&mut self, label: impl Into<String>, body: F) -> CaseId
    where
        F: Fn(Test, Context) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.register(label.into(), Vec::new(), handler(body))
    }

    /// Declare a case wrapped in its own modifiers, applied inside the
    /// active `each` modifiers.
    pub fn it_with<F, Fut>(
        &mut self,
        label: impl Into<String>,
        modifiers: impl IntoIterator<Item = Modifier>,
        body: F,
    ) -> CaseId
    where
        F: Fn(Test, Context) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.register(label.into(), modifiers.into_iter().collect(), handler(body))
    }

    /// Declare a case from a prepared [`Handler`].
    pub fn case(
        &mut self,
        label: impl Into<String>,
        modifiers: impl IntoIterator<Item = Modifier>,
        handler: Handler,
    ) -> CaseId {
        self.register(label.into(), modifiers.into_iter().collect(), handler)
    }

    /// Apply `batch` to every unit declared directly inside `body`.
    ///
    /// Nested frames stack: outer modifiers run before inner ones.
    pub fn each<F>(&mut self, batch: impl Into<Batch>, body: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Builder<'_>) -> anyhow::Result<()>,
    {
        self.seal(Operation::Each);
        self.batches.push(batch.into());
        let result = body(&mut *self);
        self.batches.pop();
        result
    }

    fn register(&mut self, label: String, own: Vec<Modifier>, handler: Handler) -> CaseId {
        self.seal(Operation::It);
        tracing::trace!(case = %label, "it");
        let mut modifiers = self.active();
        modifiers.extend(own);
        self.tree.add_case(self.frame.suite, label, modifiers, handler)
    }

    fn seal(&mut self, operation: Operation) {
        self.frame.sealed_by.get_or_insert(operation);
    }

    fn active(&self) -> Vec<Modifier> {
        self.batches
            .iter()
            .flat_map(|batch| batch.0.iter().cloned())
            .collect()
    }
}
