//! Run entry point

use crate::builder::Builder;
use crate::context::Context;
use crate::executor::Executor;
use crate::fault::Fault;
use crate::reporter::Reporter;
use crate::unit::Tree;
use std::rc::Rc;

/// Builds a tree from a script and executes it against a reporter.
///
/// ```ignore
/// let tree = Runner::new()
///     .with_label("math")
///     .with_report_errors(true)
///     .run(|t| { /* declare */ Ok(()) }, Rc::new(NullReporter))
///     .await?;
/// assert!(tree.root().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Runner {
    context: Context,
    report_errors: bool,
    label: String,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root context handed to the root suite's modifiers.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Report suite-level runtime faults through [`Reporter::report_error`]
    /// instead of returning them.
    pub fn with_report_errors(mut self, report_errors: bool) -> Self {
        self.report_errors = report_errors;
        self
    }

    /// Label of the root suite.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Build and execute `script`.
    ///
    /// Resolves to the tree for a completed run, a broken script, a broken
    /// case, or a reported runtime fault. Unreported runtime faults and
    /// internal consistency faults are returned as `Err`.
    pub async fn run<S>(self, script: S, reporter: Rc<dyn Reporter>) -> Result<Tree, Fault>
    where
        S: FnOnce(&mut Builder<'_>) -> anyhow::Result<()>,
    {
        let tree = match Tree::build(self.label.clone(), script) {
            Ok(tree) => tree,
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "script failed while declaring tests");
                reporter.report_broken_script(&error);
                return Ok(Tree::new(self.label));
            }
        };
        tracing::debug!(
            label = %self.label,
            cases = tree.root().total(),
            "tree built"
        );

        let executor = Executor::new(tree, Rc::clone(&reporter));
        executor.execute(self.context).await;
        let (tree, fault) = executor.finish();

        match fault {
            None => Ok(tree),
            Some(Fault::Unit { unit, error }) => {
                reporter.report_broken_unit(tree.unit(unit.into()), &error);
                Ok(tree)
            }
            Some(Fault::Runtime { error, .. }) if self.report_errors => {
                reporter.report_error(&error);
                Ok(tree)
            }
            Some(fault) => Err(fault),
        }
    }
}
