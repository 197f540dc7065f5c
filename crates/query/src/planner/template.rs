//! Compiled plan templates.

use super::binding::ResultTypeBinding;
use super::fingerprint::ShapeFingerprint;
use super::plan::PlanNode;
use crate::error::CompileError;
use std::collections::BTreeSet;

/// Output of the query compiler: a plan tree plus its result type binding.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    pub plan: PlanNode,
    pub binding: ResultTypeBinding,
}

impl CompiledQuery {
    pub fn new(plan: PlanNode, binding: ResultTypeBinding) -> Self {
        Self { plan, binding }
    }

    /// Takes the binding from a root `Projection`; other roots are untyped.
    pub fn from_plan(plan: PlanNode) -> Self {
        let binding = match &plan {
            PlanNode::Projection { binding, .. } => binding.clone(),
            _ => ResultTypeBinding::untyped(),
        };
        Self { plan, binding }
    }
}

/// The parser/optimizer collaborator. Must be deterministic: compiling the
/// same normalized text against an unchanged schema yields plans with equal
/// shape fingerprints.
pub trait QueryCompiler: Send + Sync {
    fn compile(&self, query: &str) -> Result<CompiledQuery, CompileError>;
}

impl<F> QueryCompiler for F
where
    F: Fn(&str) -> Result<CompiledQuery, CompileError> + Send + Sync,
{
    fn compile(&self, query: &str) -> Result<CompiledQuery, CompileError> {
        self(query)
    }
}

/// An immutable compiled plan, shared by every enumerator bound to it.
#[derive(Debug)]
pub struct PlanTemplate {
    query: String,
    plan: PlanNode,
    binding: ResultTypeBinding,
    fingerprint: ShapeFingerprint,
    node_count: usize,
    extents: BTreeSet<String>,
    indexes: BTreeSet<(String, String)>,
}

impl PlanTemplate {
    pub fn new(query: impl Into<String>, compiled: CompiledQuery) -> Self {
        let CompiledQuery { plan, binding } = compiled;
        let fingerprint = ShapeFingerprint::of(&plan);
        let node_count = plan.node_count();
        let extents = plan
            .preorder()
            .into_iter()
            .filter_map(|n| n.extent().map(String::from))
            .collect();
        let indexes = plan
            .indexes()
            .into_iter()
            .map(|(e, i)| (e.to_string(), i.to_string()))
            .collect();
        Self {
            query: query.into(),
            plan,
            binding,
            fingerprint,
            node_count,
            extents,
            indexes,
        }
    }

    /// Builds a template straight from a plan, outside any cache.
    pub fn from_plan(plan: PlanNode) -> Self {
        Self::new(String::new(), CompiledQuery::from_plan(plan))
    }

    #[inline]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[inline]
    pub fn plan(&self) -> &PlanNode {
        &self.plan
    }

    #[inline]
    pub fn binding(&self) -> &ResultTypeBinding {
        &self.binding
    }

    #[inline]
    pub fn fingerprint(&self) -> ShapeFingerprint {
        self.fingerprint
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Returns true when the plan reads `extent`.
    pub fn reads_extent(&self, extent: &str) -> bool {
        self.extents.contains(extent)
    }

    /// Returns true when the plan scans `index` of `extent`.
    pub fn uses_index(&self, extent: &str, index: &str) -> bool {
        self.indexes
            .iter()
            .any(|(e, i)| e == extent && i == index)
    }
}
