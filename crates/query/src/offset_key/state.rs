//! Per-node cursor state and its wire form.
//!
//! Each node state starts with the node kind tag. The decoder walks the
//! target plan in pre-order and requires every tag to match the node at
//! the same position, so a state is never applied to the wrong node.

use super::wire::{KeyReader, KeyWriter};
use crate::error::OffsetKeyError;
use crate::planner::{NodeKind, PlanNode};
use resumedb_core::{RowId, Value};

/// Last row a scan delivered. `key` is set for index scans only.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanPosition {
    pub key: Option<Value>,
    pub identity: RowId,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanState {
    pub exhausted: bool,
    pub last: Option<ScanPosition>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LookupState {
    pub done: bool,
}

/// `left_row` holds the identities of the left row the join is positioned
/// under, or `None` when no left row is current.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinState {
    pub left_row: Option<Vec<Option<RowId>>>,
    pub matched: bool,
}

/// Total order position of a sorted row.
///
/// `values` is only filled for rows without any identity, such as
/// aggregate output; an identified row is placed by keys and identities.
#[derive(Clone, Debug, PartialEq)]
pub struct SortPosition {
    pub keys: Vec<Value>,
    pub identities: Vec<Option<RowId>>,
    pub values: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SortState {
    pub last: Option<SortPosition>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupState {
    pub last_group: Option<Vec<Value>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowState {
    pub skipped: u64,
    pub delivered: u64,
}

/// Resumable state of one plan node.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeState {
    FullTableScan(ScanState),
    IndexScan(ScanState),
    ObjectIdentityLookup(LookupState),
    ReferenceLookup(LookupState),
    Join(JoinState),
    Sort(SortState),
    AggregateGroup(GroupState),
    FetchOffset(WindowState),
    Projection,
}

impl NodeState {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeState::FullTableScan(_) => NodeKind::FullTableScan,
            NodeState::IndexScan(_) => NodeKind::IndexScan,
            NodeState::ObjectIdentityLookup(_) => NodeKind::ObjectIdentityLookup,
            NodeState::ReferenceLookup(_) => NodeKind::ReferenceLookup,
            NodeState::Join(_) => NodeKind::Join,
            NodeState::Sort(_) => NodeKind::Sort,
            NodeState::AggregateGroup(_) => NodeKind::AggregateGroup,
            NodeState::FetchOffset(_) => NodeKind::FetchOffset,
            NodeState::Projection => NodeKind::Projection,
        }
    }

    pub(crate) fn write(&self, w: &mut KeyWriter) {
        w.u8(self.kind().tag());
        match self {
            NodeState::FullTableScan(s) => {
                w.bool(s.exhausted);
                match &s.last {
                    Some(p) => {
                        w.bool(true);
                        w.u64(p.identity);
                    }
                    None => w.bool(false),
                }
            }
            NodeState::IndexScan(s) => {
                w.bool(s.exhausted);
                match &s.last {
                    Some(p) => {
                        w.bool(true);
                        w.framed_value(p.key.as_ref().unwrap_or(&Value::Null));
                        w.u64(p.identity);
                    }
                    None => w.bool(false),
                }
            }
            NodeState::ObjectIdentityLookup(s) | NodeState::ReferenceLookup(s) => w.bool(s.done),
            NodeState::Join(s) => {
                match &s.left_row {
                    Some(ids) => {
                        w.bool(true);
                        w.varint(ids.len() as u64);
                        for id in ids {
                            match id {
                                Some(id) => {
                                    w.bool(true);
                                    w.u64(*id);
                                }
                                None => w.bool(false),
                            }
                        }
                    }
                    None => w.bool(false),
                }
                w.bool(s.matched);
            }
            NodeState::Sort(s) => match &s.last {
                Some(p) => {
                    w.bool(true);
                    w.values(&p.keys);
                    w.varint(p.identities.len() as u64);
                    for id in &p.identities {
                        match id {
                            Some(id) => {
                                w.bool(true);
                                w.u64(*id);
                            }
                            None => w.bool(false),
                        }
                    }
                    w.values(&p.values);
                }
                None => w.bool(false),
            },
            NodeState::AggregateGroup(s) => match &s.last_group {
                Some(group) => {
                    w.bool(true);
                    w.values(group);
                }
                None => w.bool(false),
            },
            NodeState::FetchOffset(s) => {
                w.varint(s.skipped);
                w.varint(s.delivered);
            }
            NodeState::Projection => {}
        }
    }

    /// Reads the state of `node`, the plan node at pre-order `position`.
    pub(crate) fn read(
        r: &mut KeyReader<'_>,
        node: &PlanNode,
        position: usize,
    ) -> Result<NodeState, OffsetKeyError> {
        let expected = node.kind();
        let found = r.u8()?;
        if found != expected.tag() {
            return Err(OffsetKeyError::NodeKindMismatch {
                position,
                expected: expected.name(),
                found,
            });
        }
        Ok(match node {
            PlanNode::FullTableScan { .. } => {
                let exhausted = r.bool("exhausted")?;
                let last = if r.bool("scan position")? {
                    Some(ScanPosition {
                        key: None,
                        identity: r.u64()?,
                    })
                } else {
                    None
                };
                NodeState::FullTableScan(ScanState { exhausted, last })
            }
            PlanNode::IndexScan { .. } => {
                let exhausted = r.bool("exhausted")?;
                let last = if r.bool("scan position")? {
                    let key = r.framed_value()?;
                    Some(ScanPosition {
                        key: Some(key),
                        identity: r.u64()?,
                    })
                } else {
                    None
                };
                NodeState::IndexScan(ScanState { exhausted, last })
            }
            PlanNode::ObjectIdentityLookup { .. } => NodeState::ObjectIdentityLookup(LookupState {
                done: r.bool("lookup")?,
            }),
            PlanNode::ReferenceLookup { .. } => NodeState::ReferenceLookup(LookupState {
                done: r.bool("lookup")?,
            }),
            PlanNode::Join { left, .. } => {
                let left_row = if r.bool("join row")? {
                    let ids = read_identities(r)?;
                    if ids.len() != left.identity_arity() {
                        return Err(OffsetKeyError::MalformedField("join row"));
                    }
                    Some(ids)
                } else {
                    None
                };
                let matched = r.bool("join matched")?;
                NodeState::Join(JoinState { left_row, matched })
            }
            PlanNode::Sort { child, keys } => {
                let last = if r.bool("sort position")? {
                    let sort_keys = r.values()?;
                    let identities = read_identities(r)?;
                    let values = r.values()?;
                    if sort_keys.len() != keys.len() || identities.len() != child.identity_arity() {
                        return Err(OffsetKeyError::MalformedField("sort position"));
                    }
                    Some(SortPosition {
                        keys: sort_keys,
                        identities,
                        values,
                    })
                } else {
                    None
                };
                NodeState::Sort(SortState { last })
            }
            PlanNode::AggregateGroup { group_keys, .. } => {
                let last_group = if r.bool("group")? {
                    let group = r.values()?;
                    if group.len() != group_keys.len() {
                        return Err(OffsetKeyError::MalformedField("group"));
                    }
                    Some(group)
                } else {
                    None
                };
                NodeState::AggregateGroup(GroupState { last_group })
            }
            PlanNode::FetchOffset { .. } => {
                let skipped = r.varint()?;
                let delivered = r.varint()?;
                NodeState::FetchOffset(WindowState { skipped, delivered })
            }
            PlanNode::Projection { .. } => NodeState::Projection,
        })
    }
}

fn read_identities(r: &mut KeyReader<'_>) -> Result<Vec<Option<RowId>>, OffsetKeyError> {
    let n = r.count(1)?;
    let mut ids = Vec::with_capacity(n);
    for _ in 0..n {
        ids.push(if r.bool("identity")? { Some(r.u64()?) } else { None });
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::planner::{IndexRange, JoinKind, SortKey};
    use resumedb_storage::ScanDirection;

    fn read_back(state: &NodeState, node: &PlanNode) -> Result<NodeState, OffsetKeyError> {
        let mut w = KeyWriter::new();
        state.write(&mut w);
        let bytes = w.into_bytes();
        let mut r = KeyReader::new(&bytes);
        let out = NodeState::read(&mut r, node, 0)?;
        assert_eq!(r.remaining(), 0);
        Ok(out)
    }

    #[test]
    fn test_index_scan_state_layout() {
        let node = PlanNode::index_scan("Account", "idx_accountid", IndexRange::all(), ScanDirection::Forward);
        let state = NodeState::IndexScan(ScanState {
            exhausted: false,
            last: Some(ScanPosition {
                key: Some(Value::Int64(2)),
                identity: 12,
            }),
        });
        let mut w = KeyWriter::new();
        state.write(&mut w);
        let bytes = w.into_bytes();
        // tag, exhausted, has position, [len][Int64 tag + 8 bytes], identity
        assert_eq!(bytes.len(), 1 + 1 + 1 + 1 + 9 + 8);
        assert_eq!(bytes[0], NodeKind::IndexScan.tag());
        assert_eq!(read_back(&state, &node).unwrap(), state);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let state = NodeState::FullTableScan(ScanState::default());
        let node = PlanNode::index_scan("Account", "idx", IndexRange::all(), ScanDirection::Forward);
        assert_eq!(
            read_back(&state, &node),
            Err(OffsetKeyError::NodeKindMismatch {
                position: 0,
                expected: "IndexScan",
                found: NodeKind::FullTableScan.tag(),
            })
        );
    }

    #[test]
    fn test_join_identities_must_fit_left_side() {
        let node = PlanNode::full_scan("Account").join(PlanNode::full_scan("Transfer"), JoinKind::Inner, None);
        let good = NodeState::Join(JoinState {
            left_row: Some(vec![Some(4)]),
            matched: true,
        });
        assert_eq!(read_back(&good, &node).unwrap(), good);
        let bad = NodeState::Join(JoinState {
            left_row: Some(vec![Some(4), None]),
            matched: true,
        });
        assert_eq!(read_back(&bad, &node), Err(OffsetKeyError::MalformedField("join row")));
    }

    #[test]
    fn test_sort_and_group_shapes_are_checked() {
        let sort = PlanNode::full_scan("Account").sort(vec![SortKey::desc(Expr::column("Account", "balance", 1))]);
        let state = NodeState::Sort(SortState {
            last: Some(SortPosition {
                keys: vec![Value::Int64(5)],
                identities: vec![Some(3)],
                values: vec![Value::Int64(0), Value::Int64(5)],
            }),
        });
        assert_eq!(read_back(&state, &sort).unwrap(), state);
        let two_keys = NodeState::Sort(SortState {
            last: Some(SortPosition {
                keys: vec![Value::Int64(5), Value::Null],
                identities: vec![Some(3)],
                values: vec![],
            }),
        });
        assert!(read_back(&two_keys, &sort).is_err());

        let group = PlanNode::full_scan("Account").aggregate(vec![], vec![]);
        let state = NodeState::AggregateGroup(GroupState {
            last_group: Some(vec![]),
        });
        assert_eq!(read_back(&state, &group).unwrap(), state);
    }

    #[test]
    fn test_window_counters() {
        let node = PlanNode::full_scan("Account").fetch_offset(Some(3), Some(1));
        let state = NodeState::FetchOffset(WindowState {
            skipped: 1,
            delivered: 300,
        });
        assert_eq!(read_back(&state, &node).unwrap(), state);
    }
}
