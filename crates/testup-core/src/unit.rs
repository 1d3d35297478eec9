//! Unit tree - suites, cases and their counters
//!
//! The tree is an arena: suites and cases live in two vectors and refer to
//! each other by typed ids. A unit knows its parent only by id, which is all
//! the path and depth queries need; children are owned by the arena.
//!
//! Reporters never see the arena directly. They get borrowed views
//! ([`SuiteRef`], [`CaseRef`], [`UnitRef`]) that expose the read-only side
//! of the model.

use crate::builder::{BuildError, Builder};
use crate::fault::{ConsistencyError, Failure, PanicError};
use crate::handle::Handler;
use crate::modifier::Modifier;
use std::fmt;
use std::iter;
use std::panic::{self, AssertUnwindSafe};

/// Id of a suite inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SuiteId(usize);

impl SuiteId {
    /// The root suite of every tree.
    pub const ROOT: SuiteId = SuiteId(0);
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "suite#{}", self.0)
    }
}

/// Id of a case inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseId(usize);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "case#{}", self.0)
    }
}

/// Id of any unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitId {
    Suite(SuiteId),
    Case(CaseId),
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Suite(id) => id.fmt(f),
            UnitId::Case(id) => id.fmt(f),
        }
    }
}

impl From<SuiteId> for UnitId {
    fn from(id: SuiteId) -> Self {
        UnitId::Suite(id)
    }
}

impl From<CaseId> for UnitId {
    fn from(id: CaseId) -> Self {
        UnitId::Case(id)
    }
}

#[derive(Clone)]
struct SuiteNode {
    parent: Option<SuiteId>,
    label: String,
    children: Vec<UnitId>,
    modifiers: Vec<Modifier>,
    total: usize,
    passed: usize,
    failed: usize,
    completed: bool,
}

#[derive(Clone)]
struct CaseNode {
    parent: SuiteId,
    label: String,
    modifiers: Vec<Modifier>,
    handler: Handler,
    index: usize,
    completed: bool,
    error: Option<Failure>,
}

/// A built test tree. Always has a root suite.
#[derive(Clone)]
pub struct Tree {
    suites: Vec<SuiteNode>,
    cases: Vec<CaseNode>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new("")
    }
}

impl Tree {
    /// Create a tree holding only a root suite with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            suites: vec![SuiteNode {
                parent: None,
                label: label.into(),
                children: Vec::new(),
                modifiers: Vec::new(),
                total: 0,
                passed: 0,
                failed: 0,
                completed: false,
            }],
            cases: Vec::new(),
        }
    }

    /// Build a tree by running `script` against a fresh [`Builder`].
    ///
    /// Errors returned by the script and panics raised inside it are both
    /// returned as `Err`; the partially built tree is discarded.
    pub fn build<S>(label: impl Into<String>, script: S) -> anyhow::Result<Tree>
    where
        S: FnOnce(&mut Builder<'_>) -> anyhow::Result<()>,
    {
        let mut tree = Tree::new(label);
        let outcome = {
            let mut builder = Builder::new(&mut tree);
            panic::catch_unwind(AssertUnwindSafe(|| script(&mut builder)))
        };
        match outcome {
            Ok(Ok(())) => Ok(tree),
            Ok(Err(error)) => Err(error),
            Err(payload) => Err(PanicError::from_payload(payload).into()),
        }
    }

    pub fn root(&self) -> SuiteRef<'_> {
        self.suite(SuiteId::ROOT)
    }

    pub fn suite(&self, id: SuiteId) -> SuiteRef<'_> {
        SuiteRef { tree: self, id }
    }

    pub fn case(&self, id: CaseId) -> CaseRef<'_> {
        CaseRef { tree: self, id }
    }

    pub fn unit(&self, id: UnitId) -> UnitRef<'_> {
        match id {
            UnitId::Suite(id) => UnitRef::Suite(self.suite(id)),
            UnitId::Case(id) => UnitRef::Case(self.case(id)),
        }
    }

    /// All cases in registration order.
    pub fn cases(&self) -> impl Iterator<Item = CaseRef<'_>> + '_ {
        (0..self.cases.len()).map(move |i| self.case(CaseId(i)))
    }

    /// All suites in registration order, root first.
    pub fn suites(&self) -> impl Iterator<Item = SuiteRef<'_>> + '_ {
        (0..self.suites.len()).map(move |i| self.suite(SuiteId(i)))
    }

    /// Ancestors starting at `start` and walking towards the root.
    fn lineage(&self, start: Option<SuiteId>) -> impl Iterator<Item = SuiteId> + '_ {
        iter::successors(start, move |id| self.suites[id.0].parent)
    }

    fn suite_path(&self, id: SuiteId) -> Vec<&str> {
        let mut path: Vec<&str> = self
            .lineage(Some(id))
            .filter(|id| self.suites[id.0].parent.is_some())
            .map(|id| self.suites[id.0].label.as_str())
            .collect();
        path.reverse();
        path
    }

    // ------------------------------------------------------------------
    // Construction (used by the builder)
    // ------------------------------------------------------------------

    pub(crate) fn add_suite(
        &mut self,
        parent: SuiteId,
        label: String,
        modifiers: Vec<Modifier>,
    ) -> SuiteId {
        let id = SuiteId(self.suites.len());
        self.suites.push(SuiteNode {
            parent: Some(parent),
            label,
            children: Vec::new(),
            modifiers,
            total: 0,
            passed: 0,
            failed: 0,
            completed: false,
        });
        self.suites[parent.0].children.push(id.into());
        id
    }

    pub(crate) fn add_case(
        &mut self,
        parent: SuiteId,
        label: String,
        modifiers: Vec<Modifier>,
        handler: Handler,
    ) -> CaseId {
        let id = CaseId(self.cases.len());
        let index = self.suites[parent.0].total + 1;
        self.cases.push(CaseNode {
            parent,
            label,
            modifiers,
            handler,
            index,
            completed: false,
            error: None,
        });
        self.suites[parent.0].children.push(id.into());

        let lineage: Vec<SuiteId> = self.lineage(Some(parent)).collect();
        for suite in lineage {
            self.suites[suite.0].total += 1;
        }
        id
    }

    pub(crate) fn add_modifier(
        &mut self,
        suite: SuiteId,
        modifier: Modifier,
    ) -> Result<(), BuildError> {
        let node = &mut self.suites[suite.0];
        if !node.children.is_empty() {
            return Err(BuildError::ChildrenDefined {
                suite: node.label.clone(),
            });
        }
        node.modifiers.push(modifier);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Execution (used by the executor)
    // ------------------------------------------------------------------

    pub(crate) fn suite_modifiers(&self, id: SuiteId) -> Vec<Modifier> {
        self.suites[id.0].modifiers.clone()
    }

    pub(crate) fn case_modifiers(&self, id: CaseId) -> Vec<Modifier> {
        self.cases[id.0].modifiers.clone()
    }

    pub(crate) fn handler(&self, id: CaseId) -> Handler {
        self.cases[id.0].handler.clone()
    }

    pub(crate) fn children(&self, id: SuiteId) -> Vec<UnitId> {
        self.suites[id.0].children.clone()
    }

    pub(crate) fn complete_suite(&mut self, id: SuiteId) -> Result<(), ConsistencyError> {
        let node = &mut self.suites[id.0];
        if node.completed {
            return Err(ConsistencyError::AlreadyCompleted { unit: id.into() });
        }
        node.completed = true;
        Ok(())
    }

    /// Settle a case and count it on every ancestor.
    ///
    /// Counters are checked on the whole lineage before anything changes, so
    /// a saturated ancestor leaves the tree untouched.
    pub(crate) fn complete_case(
        &mut self,
        id: CaseId,
        error: Option<Failure>,
    ) -> Result<(), ConsistencyError> {
        let case = &self.cases[id.0];
        if case.completed {
            return Err(ConsistencyError::AlreadyCompleted { unit: id.into() });
        }

        let lineage: Vec<SuiteId> = self.lineage(Some(case.parent)).collect();
        for suite in &lineage {
            let node = &self.suites[suite.0];
            if node.passed + node.failed >= node.total {
                return Err(ConsistencyError::CountersSaturated {
                    suite: *suite,
                    settled: node.passed + node.failed,
                    total: node.total,
                });
            }
        }

        let passed = error.is_none();
        let case = &mut self.cases[id.0];
        case.completed = true;
        case.error = error;

        for suite in lineage {
            let node = &mut self.suites[suite.0];
            if passed {
                node.passed += 1;
            } else {
                node.failed += 1;
            }
        }
        Ok(())
    }
}

/// Read-only view of a suite.
#[derive(Clone, Copy)]
pub struct SuiteRef<'t> {
    tree: &'t Tree,
    id: SuiteId,
}

impl<'t> SuiteRef<'t> {
    fn node(&self) -> &'t SuiteNode {
        &self.tree.suites[self.id.0]
    }

    pub fn id(&self) -> SuiteId {
        self.id
    }

    pub fn label(&self) -> &'t str {
        &self.node().label
    }

    /// Number of cases registered in this suite's subtree.
    pub fn total(&self) -> usize {
        self.node().total
    }

    pub fn passed(&self) -> usize {
        self.node().passed
    }

    pub fn failed(&self) -> usize {
        self.node().failed
    }

    /// Cases that have not settled (never run, or skipped by a modifier).
    pub fn pending(&self) -> usize {
        self.total() - self.passed() - self.failed()
    }

    pub fn has_children(&self) -> bool {
        !self.node().children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    pub fn is_completed(&self) -> bool {
        self.node().completed
    }

    pub fn is_ok(&self) -> bool {
        self.is_completed() && self.passed() == self.total()
    }

    pub fn parent(&self) -> Option<SuiteRef<'t>> {
        self.node().parent.map(|id| self.tree.suite(id))
    }

    pub fn depth(&self) -> usize {
        self.tree.lineage(self.node().parent).count()
    }

    /// Labels from the root down to and including this suite. The root's
    /// path is empty.
    pub fn path(&self) -> Vec<&'t str> {
        self.tree.suite_path(self.id)
    }

    /// Ancestors, nearest first.
    pub fn parents(&self) -> Vec<SuiteRef<'t>> {
        let tree = self.tree;
        tree.lineage(self.node().parent)
            .map(|id| tree.suite(id))
            .collect()
    }

    pub fn children(&self) -> impl Iterator<Item = UnitRef<'t>> + 't {
        let tree = self.tree;
        self.node().children.iter().map(move |id| tree.unit(*id))
    }

    pub fn unit(&self) -> UnitRef<'t> {
        UnitRef::Suite(*self)
    }
}

impl fmt::Debug for SuiteRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("id", &self.id)
            .field("label", &self.label())
            .field("total", &self.total())
            .field("passed", &self.passed())
            .field("failed", &self.failed())
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Read-only view of a case.
#[derive(Clone, Copy)]
pub struct CaseRef<'t> {
    tree: &'t Tree,
    id: CaseId,
}

impl<'t> CaseRef<'t> {
    fn node(&self) -> &'t CaseNode {
        &self.tree.cases[self.id.0]
    }

    pub fn id(&self) -> CaseId {
        self.id
    }

    pub fn label(&self) -> &'t str {
        &self.node().label
    }

    /// 1-based position, unique within the parent suite.
    pub fn index(&self) -> usize {
        self.node().index
    }

    pub fn is_completed(&self) -> bool {
        self.node().completed
    }

    pub fn error(&self) -> Option<&'t Failure> {
        self.node().error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.is_completed() && self.error().is_none()
    }

    pub fn parent(&self) -> SuiteRef<'t> {
        self.tree.suite(self.node().parent)
    }

    pub fn depth(&self) -> usize {
        self.tree.lineage(Some(self.node().parent)).count()
    }

    /// Labels of the enclosing suites, root excluded. The case's own label is
    /// not part of its path.
    pub fn path(&self) -> Vec<&'t str> {
        self.tree.suite_path(self.node().parent)
    }

    /// Ancestors, nearest first.
    pub fn parents(&self) -> Vec<SuiteRef<'t>> {
        let tree = self.tree;
        tree.lineage(Some(self.node().parent))
            .map(|id| tree.suite(id))
            .collect()
    }

    pub fn unit(&self) -> UnitRef<'t> {
        UnitRef::Case(*self)
    }
}

impl fmt::Debug for CaseRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Case")
            .field("id", &self.id)
            .field("label", &self.label())
            .field("index", &self.index())
            .field("completed", &self.is_completed())
            .field("error", &self.error())
            .finish()
    }
}

/// View of either kind of unit.
#[derive(Debug, Clone, Copy)]
pub enum UnitRef<'t> {
    Suite(SuiteRef<'t>),
    Case(CaseRef<'t>),
}

impl<'t> UnitRef<'t> {
    pub fn id(&self) -> UnitId {
        match self {
            UnitRef::Suite(s) => s.id().into(),
            UnitRef::Case(c) => c.id().into(),
        }
    }

    pub fn label(&self) -> &'t str {
        match self {
            UnitRef::Suite(s) => s.label(),
            UnitRef::Case(c) => c.label(),
        }
    }

    /// "suite" or "case"
    pub fn type_name(&self) -> &'static str {
        match self {
            UnitRef::Suite(_) => "suite",
            UnitRef::Case(_) => "case",
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            UnitRef::Suite(s) => s.depth(),
            UnitRef::Case(c) => c.depth(),
        }
    }

    pub fn path(&self) -> Vec<&'t str> {
        match self {
            UnitRef::Suite(s) => s.path(),
            UnitRef::Case(c) => c.path(),
        }
    }

    pub fn parents(&self) -> Vec<SuiteRef<'t>> {
        match self {
            UnitRef::Suite(s) => s.parents(),
            UnitRef::Case(c) => c.parents(),
        }
    }

    pub fn is_completed(&self) -> bool {
        match self {
            UnitRef::Suite(s) => s.is_completed(),
            UnitRef::Case(c) => c.is_completed(),
        }
    }

    pub fn is_ok(&self) -> bool {
        match self {
            UnitRef::Suite(s) => s.is_ok(),
            UnitRef::Case(c) => c.is_ok(),
        }
    }

    pub fn error(&self) -> Option<&'t Failure> {
        match self {
            UnitRef::Suite(_) => None,
            UnitRef::Case(c) => c.error(),
        }
    }

    pub fn as_suite(&self) -> Option<SuiteRef<'t>> {
        match self {
            UnitRef::Suite(s) => Some(*s),
            UnitRef::Case(_) => None,
        }
    }

    pub fn as_case(&self) -> Option<CaseRef<'t>> {
        match self {
            UnitRef::Suite(_) => None,
            UnitRef::Case(c) => Some(*c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::handler;
    use anyhow::anyhow;

    fn noop() -> Handler {
        handler(|test, _| async move {
            test.end()?;
            Ok(())
        })
    }

    fn sample() -> (Tree, SuiteId, SuiteId, CaseId, CaseId) {
        let mut tree = Tree::new("root");
        let outer = tree.add_suite(SuiteId::ROOT, "outer".into(), Vec::new());
        let inner = tree.add_suite(outer, "inner".into(), Vec::new());
        let first = tree.add_case(outer, "first".into(), Vec::new(), noop());
        let deep = tree.add_case(inner, "deep".into(), Vec::new(), noop());
        (tree, outer, inner, first, deep)
    }

    #[test]
    fn test_total_propagates_to_every_ancestor() {
        let (tree, outer, inner, _, _) = sample();
        assert_eq!(tree.root().total(), 2);
        assert_eq!(tree.suite(outer).total(), 2);
        assert_eq!(tree.suite(inner).total(), 1);
    }

    #[test]
    fn test_case_index_follows_parent_total() {
        let (tree, outer, _, first, deep) = sample();
        // "inner" already holds one case when "first" is registered under "outer"
        assert_eq!(tree.case(deep).index(), 1);
        assert_eq!(tree.case(first).index(), 1);
        let mut tree = tree;
        let second = tree.add_case(outer, "second".into(), Vec::new(), noop());
        assert_eq!(tree.case(second).index(), 3);
    }

    #[test]
    fn test_paths_and_depth() {
        let (tree, outer, inner, first, deep) = sample();
        assert!(tree.root().path().is_empty());
        assert_eq!(tree.root().depth(), 0);
        assert_eq!(tree.suite(outer).path(), vec!["outer"]);
        assert_eq!(tree.suite(inner).path(), vec!["outer", "inner"]);
        assert_eq!(tree.suite(inner).depth(), 2);
        assert_eq!(tree.case(first).path(), vec!["outer"]);
        assert_eq!(tree.case(deep).path(), vec!["outer", "inner"]);
        assert_eq!(tree.case(deep).depth(), 3);

        let parents: Vec<&str> = tree.case(deep).parents().iter().map(|s| s.label()).collect();
        assert_eq!(parents, vec!["inner", "outer", "root"]);
    }

    #[test]
    fn test_complete_case_counts_on_lineage() {
        let (mut tree, outer, inner, first, deep) = sample();
        tree.complete_case(first, None).unwrap();
        tree.complete_case(deep, Some(Failure::new(anyhow!("nope"))))
            .unwrap();

        assert_eq!(tree.root().passed(), 1);
        assert_eq!(tree.root().failed(), 1);
        assert_eq!(tree.suite(outer).passed(), 1);
        assert_eq!(tree.suite(inner).failed(), 1);
        assert!(tree.case(first).is_ok());
        assert!(!tree.case(deep).is_ok());
        assert_eq!(tree.case(deep).error().unwrap().message(), "nope");
    }

    #[test]
    fn test_second_completion_is_fatal() {
        let (mut tree, _, _, first, _) = sample();
        tree.complete_case(first, None).unwrap();
        let err = tree.complete_case(first, None).unwrap_err();
        assert_eq!(err, ConsistencyError::AlreadyCompleted { unit: first.into() });
        assert_eq!(tree.root().passed(), 1);

        tree.complete_suite(SuiteId::ROOT).unwrap();
        assert!(tree.complete_suite(SuiteId::ROOT).is_err());
    }

    #[test]
    fn test_saturated_counters_are_fatal_and_leave_tree_untouched() {
        let (mut tree, outer, _, first, _) = sample();
        // Force the nearest suite into saturation
        tree.suites[outer.0].passed = tree.suites[outer.0].total;
        let err = tree.complete_case(first, None).unwrap_err();
        assert!(matches!(err, ConsistencyError::CountersSaturated { suite, .. } if suite == outer));
        assert!(!tree.case(first).is_completed());
        assert_eq!(tree.root().passed(), 0);
    }

    #[test]
    fn test_modifier_rejected_once_suite_has_children() {
        let (mut tree, outer, _, _, _) = sample();
        let modifier = crate::modifier::modifier(|_, next| next.run(()));
        let err = tree.add_modifier(outer, modifier).unwrap_err();
        assert!(matches!(err, BuildError::ChildrenDefined { .. }));
    }

    #[test]
    fn test_suite_is_ok_requires_completion() {
        let (mut tree, _, _, first, deep) = sample();
        tree.complete_case(first, None).unwrap();
        tree.complete_case(deep, None).unwrap();
        assert!(!tree.root().is_ok());
        tree.complete_suite(SuiteId::ROOT).unwrap();
        assert!(tree.root().is_ok());
        assert_eq!(tree.root().pending(), 0);
    }

    #[test]
    fn test_build_reports_script_errors_and_panics() {
        let err = Tree::build("", |_| Err(anyhow!("test"))).err().unwrap();
        assert_eq!(err.to_string(), "test");

        let err = Tree::build("", |_| panic!("exploded")).err().unwrap();
        assert_eq!(err.to_string(), "exploded");
    }
}
