//! Grouping and aggregate cursor.

use super::cursor::{NodeCursor, ResumeMode};
use super::eval::{eval_expr, ExecContext};
use super::row::{ResultRow, RowLayout};
use crate::ast::{AggregateFunc, Expr};
use crate::error::{EngineError, EngineResult};
use crate::offset_key::{GroupState, NodeState};
use crate::planner::{Aggregate, PlanNode};
use resumedb_core::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Groups the whole child output on first `advance` and yields one row per
/// group in group key order: the group key values followed by one value
/// per aggregate. Without group keys the input forms a single group, which
/// is emitted even when the input is empty.
#[derive(Clone, Debug)]
pub(crate) struct AggregateCursor {
    child: NodeCursor,
    layout: Arc<RowLayout>,
    groups: Option<Arc<Vec<(Vec<Value>, ResultRow)>>>,
    next: usize,
    last_group: Option<Vec<Value>>,
    seek: Option<(Vec<Value>, ResumeMode)>,
}

/// Inputs collected for one group.
struct GroupAcc {
    rows: usize,
    args: Vec<Vec<Value>>,
}

impl AggregateCursor {
    pub fn new(child: NodeCursor, width: usize) -> Self {
        Self {
            child,
            layout: Arc::new(RowLayout::anonymous(width, 0)),
            groups: None,
            next: 0,
            last_group: None,
            seek: None,
        }
    }

    #[inline]
    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    fn materialize(
        &mut self,
        child_node: &PlanNode,
        group_keys: &[Expr],
        aggregates: &[Aggregate],
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Arc<Vec<(Vec<Value>, ResultRow)>>> {
        let mut groups: BTreeMap<Vec<Value>, GroupAcc> = BTreeMap::new();
        while let Some(row) = self.child.advance(child_node, ctx, outer)? {
            let key: Vec<Value> = group_keys.iter().map(|k| eval_expr(k, &row, outer, ctx)).collect();
            let acc = groups.entry(key).or_insert_with(|| GroupAcc {
                rows: 0,
                args: vec![Vec::new(); aggregates.len()],
            });
            acc.rows += 1;
            for (values, agg) in acc.args.iter_mut().zip(aggregates) {
                if let Some(arg) = &agg.arg {
                    let v = eval_expr(arg, &row, outer, ctx);
                    if !v.is_null() {
                        values.push(v);
                    }
                }
            }
        }
        if group_keys.is_empty() && groups.is_empty() {
            groups.insert(
                Vec::new(),
                GroupAcc {
                    rows: 0,
                    args: vec![Vec::new(); aggregates.len()],
                },
            );
        }

        let out: Vec<(Vec<Value>, ResultRow)> = groups
            .into_iter()
            .map(|(key, acc)| {
                let mut values = key.clone();
                values.extend(
                    aggregates
                        .iter()
                        .zip(&acc.args)
                        .map(|(agg, args)| compute_aggregate(agg, acc.rows, args)),
                );
                let row = ResultRow::new(values, Vec::new(), Arc::clone(&self.layout));
                (key, row)
            })
            .collect();

        self.next = match self.seek.take() {
            Some((anchor, ResumeMode::Inclusive)) => out.partition_point(|(key, _)| *key < anchor),
            Some((anchor, _)) => out.partition_point(|(key, _)| *key <= anchor),
            None => 0,
        };
        Ok(Arc::new(out))
    }

    pub fn advance(
        &mut self,
        child_node: &PlanNode,
        group_keys: &[Expr],
        aggregates: &[Aggregate],
        ctx: &ExecContext<'_>,
        outer: Option<&ResultRow>,
    ) -> EngineResult<Option<ResultRow>> {
        let groups = match &self.groups {
            Some(groups) => Arc::clone(groups),
            None => {
                let groups = self.materialize(child_node, group_keys, aggregates, ctx, outer)?;
                self.groups = Some(Arc::clone(&groups));
                groups
            }
        };
        let Some((key, row)) = groups.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        self.last_group = Some(key.clone());
        Ok(Some(row.clone()))
    }

    pub fn rewind(&mut self) {
        self.child.rewind();
        self.groups = None;
        self.next = 0;
        self.last_group = None;
        self.seek = None;
    }

    pub fn save(&self, out: &mut Vec<NodeState>) {
        out.push(NodeState::AggregateGroup(GroupState {
            last_group: self.last_group.clone(),
        }));
        self.child.save(out);
    }

    pub fn restore(&mut self, states: &mut impl Iterator<Item = NodeState>, mode: ResumeMode) -> EngineResult<()> {
        let Some(NodeState::AggregateGroup(state)) = states.next() else {
            return Err(EngineError::InvalidState);
        };
        self.rewind();
        self.child.restore(states, ResumeMode::Fresh)?;
        if mode != ResumeMode::Fresh {
            self.seek = state.last_group.clone().map(|key| (key, mode));
            if mode == ResumeMode::Exclusive {
                self.last_group = state.last_group;
            }
        }
        Ok(())
    }
}

/// Computes one aggregate over the non-NULL argument values of a group.
fn compute_aggregate(agg: &Aggregate, rows: usize, values: &[Value]) -> Value {
    match agg.func {
        AggregateFunc::Count => match agg.arg {
            // COUNT(*) - count all rows
            None => Value::Int64(rows as i64),
            Some(_) => Value::Int64(values.len() as i64),
        },
        AggregateFunc::Sum => {
            let numbers: Vec<&Value> = values.iter().filter(|v| v.as_numeric().is_some()).collect();
            if numbers.is_empty() {
                return Value::Null;
            }
            if numbers.iter().all(|v| matches!(v, Value::Int32(_) | Value::Int64(_))) {
                let sum = numbers
                    .iter()
                    .filter_map(|v| v.as_i64().or_else(|| v.as_i32().map(i64::from)))
                    .fold(0i64, |acc, n| acc.wrapping_add(n));
                Value::Int64(sum)
            } else {
                Value::Float64(numbers.iter().filter_map(|v| v.as_numeric()).sum())
            }
        }
        AggregateFunc::Avg => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_numeric()).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                let sum: f64 = numbers.iter().sum();
                Value::Float64(sum / numbers.len() as f64)
            }
        }
        AggregateFunc::Min => values.iter().min().cloned().unwrap_or(Value::Null),
        AggregateFunc::Max => values.iter().max().cloned().unwrap_or(Value::Null),
    }
}
