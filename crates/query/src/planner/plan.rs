//! Plan node model.
//!
//! A compiled plan is a strictly nested tree of `PlanNode`s. The tree is
//! immutable once compiled; execution state lives in the cursors built
//! over it, never in the nodes.

use super::binding::ResultTypeBinding;
use crate::ast::{AggregateFunc, Expr, SortOrder};
use crate::executor::{eval_expr, ExecContext, ResultRow};
use resumedb_core::Value;
use resumedb_storage::{KeyRange, ScanDirection};
use std::fmt;

/// Join kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    /// Emits a left row extended with NULLs when no right row matches.
    LeftOuter,
}

/// One end of an index range.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeBound {
    pub expr: Expr,
    pub inclusive: bool,
}

/// Index range whose bounds are evaluated when the scan opens, so the
/// range of an inner join side may depend on the current outer row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexRange {
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
}

impl IndexRange {
    /// The whole index.
    pub fn all() -> Self {
        Self::default()
    }

    /// Keys equal to `expr`.
    pub fn eq(expr: Expr) -> Self {
        Self::between(expr.clone(), expr)
    }

    /// Keys in `[low, high]`.
    pub fn between(low: Expr, high: Expr) -> Self {
        Self {
            lower: Some(RangeBound {
                expr: low,
                inclusive: true,
            }),
            upper: Some(RangeBound {
                expr: high,
                inclusive: true,
            }),
        }
    }

    pub fn at_least(expr: Expr) -> Self {
        Self::lower(expr, true)
    }

    pub fn above(expr: Expr) -> Self {
        Self::lower(expr, false)
    }

    pub fn at_most(expr: Expr) -> Self {
        Self::upper(expr, true)
    }

    pub fn below(expr: Expr) -> Self {
        Self::upper(expr, false)
    }

    fn lower(expr: Expr, inclusive: bool) -> Self {
        Self {
            lower: Some(RangeBound { expr, inclusive }),
            upper: None,
        }
    }

    fn upper(expr: Expr, inclusive: bool) -> Self {
        Self {
            lower: None,
            upper: Some(RangeBound { expr, inclusive }),
        }
    }

    /// Evaluates the bounds. `None` means the range is empty: a NULL bound
    /// matches no key.
    pub fn evaluate(&self, ctx: &ExecContext<'_>, outer: Option<&ResultRow>) -> Option<KeyRange<Value>> {
        let eval = |bound: &RangeBound| -> Option<(Value, bool)> {
            let value = eval_expr(&bound.expr, &ResultRow::empty(), outer, ctx);
            if value.is_null() {
                None
            } else {
                Some((value, !bound.inclusive))
            }
        };
        let lower = match &self.lower {
            Some(b) => Some(eval(b)?),
            None => None,
        };
        let upper = match &self.upper {
            Some(b) => Some(eval(b)?),
            None => None,
        };
        Some(match (lower, upper) {
            (None, None) => KeyRange::all(),
            (Some((lo, lo_ex)), None) => KeyRange::lower_bound(lo, lo_ex),
            (None, Some((hi, hi_ex))) => KeyRange::upper_bound(hi, hi_ex),
            (Some((lo, false)), Some((hi, false))) if lo == hi => KeyRange::only(lo),
            (Some((lo, lo_ex)), Some((hi, hi_ex))) => KeyRange::bound(lo, hi, lo_ex, hi_ex),
        })
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lower {
            Some(b) => write!(f, "{}{}", if b.inclusive { "[" } else { "(" }, b.expr)?,
            None => write!(f, "(-inf")?,
        }
        write!(f, ", ")?;
        match &self.upper {
            Some(b) => write!(f, "{}{}", b.expr, if b.inclusive { "]" } else { ")" }),
            None => write!(f, "+inf)"),
        }
    }
}

/// A sort key.
#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub expr: Expr,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            order: SortOrder::Desc,
        }
    }
}

/// An aggregate call. `arg: None` is `COUNT(*)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub func: AggregateFunc,
    pub arg: Option<Expr>,
}

impl Aggregate {
    pub fn count_star() -> Self {
        Self {
            func: AggregateFunc::Count,
            arg: None,
        }
    }

    pub fn new(func: AggregateFunc, arg: Expr) -> Self {
        Self {
            func,
            arg: Some(arg),
        }
    }
}

/// Plan node kinds. The tag value is part of the offset key wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeKind {
    FullTableScan = 1,
    IndexScan = 2,
    ObjectIdentityLookup = 3,
    ReferenceLookup = 4,
    Join = 5,
    Sort = 6,
    AggregateGroup = 7,
    FetchOffset = 8,
    Projection = 9,
}

impl NodeKind {
    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => NodeKind::FullTableScan,
            2 => NodeKind::IndexScan,
            3 => NodeKind::ObjectIdentityLookup,
            4 => NodeKind::ReferenceLookup,
            5 => NodeKind::Join,
            6 => NodeKind::Sort,
            7 => NodeKind::AggregateGroup,
            8 => NodeKind::FetchOffset,
            9 => NodeKind::Projection,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::FullTableScan => "FullTableScan",
            NodeKind::IndexScan => "IndexScan",
            NodeKind::ObjectIdentityLookup => "ObjectIdentityLookup",
            NodeKind::ReferenceLookup => "ReferenceLookup",
            NodeKind::Join => "Join",
            NodeKind::Sort => "Sort",
            NodeKind::AggregateGroup => "AggregateGroup",
            NodeKind::FetchOffset => "FetchOffset",
            NodeKind::Projection => "Projection",
        }
    }
}

/// Execution plan node.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanNode {
    /// Every record of an extent in storage (identity) order.
    FullTableScan { extent: String, filter: Option<Expr> },
    /// Records of an extent in index key order.
    IndexScan {
        extent: String,
        index: String,
        range: IndexRange,
        direction: ScanDirection,
        filter: Option<Expr>,
    },
    /// The single record whose identity `identity` evaluates to.
    ObjectIdentityLookup {
        extent: String,
        identity: Expr,
        filter: Option<Expr>,
    },
    /// The single record a reference value points at.
    ReferenceLookup {
        extent: String,
        reference: Expr,
        filter: Option<Expr>,
    },
    /// Nested-loop join: for each left row, every matching right row.
    Join {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        kind: JoinKind,
        predicate: Option<Expr>,
    },
    Sort {
        child: Box<PlanNode>,
        keys: Vec<SortKey>,
    },
    AggregateGroup {
        child: Box<PlanNode>,
        group_keys: Vec<Expr>,
        aggregates: Vec<Aggregate>,
    },
    FetchOffset {
        child: Box<PlanNode>,
        fetch: Option<u64>,
        offset: Option<u64>,
    },
    Projection {
        child: Box<PlanNode>,
        outputs: Vec<Expr>,
        binding: ResultTypeBinding,
    },
}

impl PlanNode {
    pub fn full_scan(extent: impl Into<String>) -> Self {
        PlanNode::FullTableScan {
            extent: extent.into(),
            filter: None,
        }
    }

    pub fn index_scan(
        extent: impl Into<String>,
        index: impl Into<String>,
        range: IndexRange,
        direction: ScanDirection,
    ) -> Self {
        PlanNode::IndexScan {
            extent: extent.into(),
            index: index.into(),
            range,
            direction,
            filter: None,
        }
    }

    pub fn identity_lookup(extent: impl Into<String>, identity: Expr) -> Self {
        PlanNode::ObjectIdentityLookup {
            extent: extent.into(),
            identity,
            filter: None,
        }
    }

    pub fn reference_lookup(extent: impl Into<String>, reference: Expr) -> Self {
        PlanNode::ReferenceLookup {
            extent: extent.into(),
            reference,
            filter: None,
        }
    }

    /// Attaches a post-filter to a scan or lookup node. Other nodes are
    /// returned unchanged.
    pub fn with_filter(mut self, condition: Expr) -> Self {
        match &mut self {
            PlanNode::FullTableScan { filter, .. }
            | PlanNode::IndexScan { filter, .. }
            | PlanNode::ObjectIdentityLookup { filter, .. }
            | PlanNode::ReferenceLookup { filter, .. } => {
                *filter = Some(match filter.take() {
                    Some(existing) => Expr::and(existing, condition),
                    None => condition,
                });
            }
            _ => {}
        }
        self
    }

    pub fn join(self, right: PlanNode, kind: JoinKind, predicate: Option<Expr>) -> Self {
        PlanNode::Join {
            left: Box::new(self),
            right: Box::new(right),
            kind,
            predicate,
        }
    }

    pub fn sort(self, keys: Vec<SortKey>) -> Self {
        PlanNode::Sort {
            child: Box::new(self),
            keys,
        }
    }

    pub fn aggregate(self, group_keys: Vec<Expr>, aggregates: Vec<Aggregate>) -> Self {
        PlanNode::AggregateGroup {
            child: Box::new(self),
            group_keys,
            aggregates,
        }
    }

    pub fn fetch_offset(self, fetch: Option<u64>, offset: Option<u64>) -> Self {
        PlanNode::FetchOffset {
            child: Box::new(self),
            fetch,
            offset,
        }
    }

    pub fn project(self, outputs: Vec<Expr>, binding: ResultTypeBinding) -> Self {
        PlanNode::Projection {
            child: Box::new(self),
            outputs,
            binding,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            PlanNode::FullTableScan { .. } => NodeKind::FullTableScan,
            PlanNode::IndexScan { .. } => NodeKind::IndexScan,
            PlanNode::ObjectIdentityLookup { .. } => NodeKind::ObjectIdentityLookup,
            PlanNode::ReferenceLookup { .. } => NodeKind::ReferenceLookup,
            PlanNode::Join { .. } => NodeKind::Join,
            PlanNode::Sort { .. } => NodeKind::Sort,
            PlanNode::AggregateGroup { .. } => NodeKind::AggregateGroup,
            PlanNode::FetchOffset { .. } => NodeKind::FetchOffset,
            PlanNode::Projection { .. } => NodeKind::Projection,
        }
    }

    /// Returns the extent a leaf node reads.
    pub fn extent(&self) -> Option<&str> {
        match self {
            PlanNode::FullTableScan { extent, .. }
            | PlanNode::IndexScan { extent, .. }
            | PlanNode::ObjectIdentityLookup { extent, .. }
            | PlanNode::ReferenceLookup { extent, .. } => Some(extent),
            _ => None,
        }
    }

    /// Returns the child nodes, left to right.
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::FullTableScan { .. }
            | PlanNode::IndexScan { .. }
            | PlanNode::ObjectIdentityLookup { .. }
            | PlanNode::ReferenceLookup { .. } => Vec::new(),
            PlanNode::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            PlanNode::Sort { child, .. }
            | PlanNode::AggregateGroup { child, .. }
            | PlanNode::FetchOffset { child, .. }
            | PlanNode::Projection { child, .. } => vec![child.as_ref()],
        }
    }

    /// Nodes in pre-order (node, then children left to right). This is the
    /// order node states appear in an offset key.
    pub fn preorder(&self) -> Vec<&PlanNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children().into_iter().rev());
        }
        out
    }

    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Number of object identities carried by each row this node yields.
    pub fn identity_arity(&self) -> usize {
        match self {
            PlanNode::FullTableScan { .. }
            | PlanNode::IndexScan { .. }
            | PlanNode::ObjectIdentityLookup { .. }
            | PlanNode::ReferenceLookup { .. } => 1,
            PlanNode::Join { left, right, .. } => left.identity_arity() + right.identity_arity(),
            PlanNode::AggregateGroup { .. } => 0,
            PlanNode::Sort { child, .. }
            | PlanNode::FetchOffset { child, .. }
            | PlanNode::Projection { child, .. } => child.identity_arity(),
        }
    }

    /// Returns the `(extent, index)` pairs the plan reads through.
    pub fn indexes(&self) -> Vec<(&str, &str)> {
        self.preorder()
            .into_iter()
            .filter_map(|node| match node {
                PlanNode::IndexScan { extent, index, .. } => Some((extent.as_str(), index.as_str())),
                _ => None,
            })
            .collect()
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}", "", indent = depth * 2)?;
        match self {
            PlanNode::FullTableScan { extent, filter } => {
                write!(f, "FullTableScan({})", extent)?;
                fmt_filter(f, filter)?;
            }
            PlanNode::IndexScan {
                extent,
                index,
                range,
                direction,
                filter,
            } => {
                write!(f, "IndexScan({}.{} {} {:?})", extent, index, range, direction)?;
                fmt_filter(f, filter)?;
            }
            PlanNode::ObjectIdentityLookup {
                extent,
                identity,
                filter,
            } => {
                write!(f, "ObjectIdentityLookup({} = {})", extent, identity)?;
                fmt_filter(f, filter)?;
            }
            PlanNode::ReferenceLookup {
                extent,
                reference,
                filter,
            } => {
                write!(f, "ReferenceLookup({} <- {})", extent, reference)?;
                fmt_filter(f, filter)?;
            }
            PlanNode::Join { kind, predicate, .. } => {
                write!(f, "Join({:?}", kind)?;
                if let Some(p) = predicate {
                    write!(f, " on {}", p)?;
                }
                write!(f, ")")?;
            }
            PlanNode::Sort { keys, .. } => {
                write!(f, "Sort(")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {:?}", key.expr, key.order)?;
                }
                write!(f, ")")?;
            }
            PlanNode::AggregateGroup {
                group_keys,
                aggregates,
                ..
            } => {
                write!(f, "AggregateGroup(keys: {}, aggs: [", group_keys.len())?;
                for (i, agg) in aggregates.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match &agg.arg {
                        Some(arg) => write!(f, "{}({})", agg.func.name(), arg)?,
                        None => write!(f, "{}(*)", agg.func.name())?,
                    }
                }
                write!(f, "])")?;
            }
            PlanNode::FetchOffset { fetch, offset, .. } => {
                write!(f, "FetchOffset(fetch: {:?}, offset: {:?})", fetch, offset)?;
            }
            PlanNode::Projection {
                outputs, binding, ..
            } => {
                write!(f, "Projection({} columns as {})", outputs.len(), binding.describe())?;
            }
        }
        writeln!(f)?;
        for child in self.children() {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

fn fmt_filter(f: &mut fmt::Formatter<'_>, filter: &Option<Expr>) -> fmt::Result {
    match filter {
        Some(cond) => write!(f, " where {}", cond),
        None => Ok(()),
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}
