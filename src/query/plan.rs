//! Executor DAG (THE CORE §4.9): `Go`, `Fetch`, `Insert`/`Update`, `Set` and
//! `Return` executors over a pipelined tree of [`PlanNode`]s. Sentences
//! arrive here already parsed (the lexer/parser is an external collaborator
//! per spec.md §1) — a caller builds a `PlanNode` tree directly, the way a
//! planner would after binding a sentence tree to the live schema registry.
//!
//! Replaces the promise/future `thenValue`/`thenError` chain with a plain
//! recursive `async fn`: each node awaits its input, then either produces
//! the next interim result or, for `Return`, decides whether to stop the
//! pipeline.

use crate::error::{Error, Result};
use crate::graph::{EdgeType, Rank, VertexId};
use crate::query::interim::InterimResult;
use crate::storage::{EdgeWrite, FilterExpr, GetNeighborsRequest, StorageService, UpdateItem, VertexWrite};
use std::collections::HashMap;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Bidirect,
}

#[derive(Clone)]
pub struct GoSpec {
    pub hops: u32,
    pub edge_types: Vec<EdgeType>,
    pub direction: Direction,
    pub filter: Option<FilterExpr>,
    pub sample_limit: Option<usize>,
    /// Column of the input interim result to read starting vids from.
    /// `None` means this is the DAG's leaf and `start_vids` is used.
    pub start_vids_column: Option<String>,
    pub start_vids: Vec<VertexId>,
}

#[derive(Clone)]
pub enum FetchTarget {
    Vertex { tag_id: u32 },
}

#[derive(Clone)]
pub struct FetchSpec {
    pub target: FetchTarget,
    pub ids_column: Option<String>,
    pub explicit_ids: Vec<VertexId>,
    pub yield_columns: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union { distinct: bool },
    Intersect,
    Minus,
}

pub enum PlanNode {
    Go { input: Option<Box<PlanNode>>, spec: GoSpec },
    Fetch { input: Option<Box<PlanNode>>, spec: FetchSpec },
    InsertVertex { items: Vec<VertexWrite>, overwrite: bool },
    InsertEdge { items: Vec<EdgeWrite>, overwrite: bool },
    UpdateVertex { vid: VertexId, tag_id: u32, updates: Vec<UpdateItem>, filter: Option<FilterExpr>, insertable: bool },
    UpdateEdge {
        src_vid: VertexId,
        edge_type: EdgeType,
        rank: Rank,
        dst_vid: VertexId,
        updates: Vec<UpdateItem>,
        filter: Option<FilterExpr>,
        insertable: bool,
    },
    Set { op: SetOp, left: Box<PlanNode>, right: Box<PlanNode> },
    /// Stops the pipeline and returns `gate_var`'s rows when non-empty;
    /// otherwise forwards `input`'s result (spec.md §4.9).
    Return { gate_var: Option<String>, input: Box<PlanNode> },
}

/// Named side-inputs a node can reference alongside its pipe input
/// (spec.md §4.9: "may have one logical input (pipe) plus named variables").
#[derive(Default)]
pub struct ExecContext {
    pub vars: HashMap<String, InterimResult>,
    pub space_id: u32,
    /// Set codes of storage partitions that reported a failure during this
    /// query, surfaced to the caller as warnings rather than aborting reads.
    pub warnings: Vec<String>,
}

pub fn execute<'a>(
    node: &'a PlanNode,
    storage: &'a StorageService,
    ctx: &'a mut ExecContext,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<InterimResult>> + Send + 'a>> {
    Box::pin(async move {
        match node {
            PlanNode::Go { input, spec } => {
                let upstream = match input {
                    Some(n) => Some(execute(n, storage, ctx).await?),
                    None => None,
                };
                execute_go(spec, upstream.as_ref(), storage, ctx).await
            }
            PlanNode::Fetch { input, spec } => {
                let upstream = match input {
                    Some(n) => Some(execute(n, storage, ctx).await?),
                    None => None,
                };
                execute_fetch(spec, upstream.as_ref(), storage, ctx).await
            }
            PlanNode::InsertVertex { items, overwrite } => {
                let outcome = storage
                    .add_vertices(ctx.space_id, clone_vertex_writes(items), *overwrite, false)
                    .await?;
                for (part, err) in &outcome.failed_parts {
                    ctx.warnings.push(format!("partition {part}: {err}"));
                }
                if !outcome.is_success() {
                    return Err(Error::PartialResult(outcome.failed_parts.len()));
                }
                Ok(InterimResult::empty(vec![]))
            }
            PlanNode::InsertEdge { items, overwrite } => {
                let outcome = storage
                    .add_edges(ctx.space_id, clone_edge_writes(items), *overwrite, false)
                    .await?;
                for (part, err) in &outcome.failed_parts {
                    ctx.warnings.push(format!("partition {part}: {err}"));
                }
                if !outcome.is_success() {
                    return Err(Error::PartialResult(outcome.failed_parts.len()));
                }
                Ok(InterimResult::empty(vec![]))
            }
            PlanNode::UpdateVertex { vid, tag_id, updates, filter, insertable } => {
                storage
                    .update_vertex(ctx.space_id, *vid, *tag_id, clone_update_items(updates), filter.clone(), *insertable)
                    .await?;
                Ok(InterimResult::empty(vec![]))
            }
            PlanNode::UpdateEdge { src_vid, edge_type, rank, dst_vid, updates, filter, insertable } => {
                storage
                    .update_edge(ctx.space_id, *src_vid, *edge_type, *rank, *dst_vid, clone_update_items(updates), filter.clone(), *insertable)
                    .await?;
                Ok(InterimResult::empty(vec![]))
            }
            PlanNode::Set { op, left, right } => {
                let left_result = execute(left, storage, ctx).await?;
                let right_result = execute(right, storage, ctx).await?;
                if !left_result.same_shape(&right_result) {
                    return Err(Error::Unsupported("Set operands must share the same column list".into()));
                }
                Ok(apply_set_op(*op, left_result, right_result))
            }
            PlanNode::Return { gate_var, input } => {
                if let Some(name) = gate_var {
                    if let Some(gate) = ctx.vars.get(name) {
                        if !gate.is_empty() {
                            return Ok(gate.clone());
                        }
                    }
                }
                execute(input, storage, ctx).await
            }
        }
    })
}

fn clone_vertex_writes(items: &[VertexWrite]) -> Vec<VertexWrite> {
    items
        .iter()
        .map(|v| VertexWrite { vid: v.vid, tag_id: v.tag_id, values: v.values.clone() })
        .collect()
}

fn clone_edge_writes(items: &[EdgeWrite]) -> Vec<EdgeWrite> {
    items
        .iter()
        .map(|e| EdgeWrite { src_vid: e.src_vid, edge_type: e.edge_type, rank: e.rank, dst_vid: e.dst_vid, values: e.values.clone() })
        .collect()
}

fn clone_update_items(items: &[UpdateItem]) -> Vec<UpdateItem> {
    items.iter().map(|i| UpdateItem { column: i.column.clone(), expr: i.expr.clone() }).collect()
}

async fn execute_go(
    spec: &GoSpec,
    upstream: Option<&InterimResult>,
    storage: &StorageService,
    ctx: &mut ExecContext,
) -> Result<InterimResult> {
    let mut frontier: Vec<VertexId> = match (&spec.start_vids_column, upstream) {
        (Some(column), Some(result)) => result.get_vids(column)?,
        _ => spec.start_vids.clone(),
    };
    // back-tracker: every frontier vid traced back to the root(s) it came from.
    let mut roots: HashMap<VertexId, Vec<VertexId>> = frontier.iter().map(|v| (*v, vec![*v])).collect();

    let directed_types = |direction: Direction, types: &[EdgeType]| -> Vec<EdgeType> {
        match direction {
            Direction::Forward => types.to_vec(),
            Direction::Backward => types.iter().map(|t| -t).collect(),
            Direction::Bidirect => types.iter().flat_map(|t| [*t, -t]).collect(),
        }
    };

    let mut last_hop_rows: Vec<Vec<crate::codec::value::Value>> = Vec::new();
    for _hop in 0..spec.hops.max(1) {
        if frontier.is_empty() {
            break;
        }
        let request = GetNeighborsRequest {
            space_id: ctx.space_id,
            vids: frontier.clone(),
            edge_types: directed_types(spec.direction, &spec.edge_types),
            filter: spec.filter.clone(),
            sample_limit: spec.sample_limit,
        };
        let result = storage.get_neighbors(request).await?;
        for (partition, err) in &result.failed_parts {
            ctx.warnings.push(format!("GetNeighbors partition {partition}: {err}"));
        }

        let mut next_roots: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
        let mut next_frontier_set: HashSet<VertexId> = HashSet::new();
        last_hop_rows.clear();

        for (vid, bucket) in &result.per_vid {
            let my_roots = roots.get(vid).cloned().unwrap_or_default();
            for edge in &bucket.edges {
                use crate::codec::value::Value;
                last_hop_rows.push(vec![
                    Value::Vid(*my_roots.first().unwrap_or(vid)),
                    Value::Vid(edge.src_vid),
                    Value::Int(edge.edge_type as i64),
                    Value::Int(edge.rank),
                    Value::Vid(edge.dst_vid),
                ]);
                next_frontier_set.insert(edge.dst_vid);
                let entry = next_roots.entry(edge.dst_vid).or_default();
                for root in &my_roots {
                    if !entry.contains(root) {
                        entry.push(*root);
                    }
                }
            }
        }
        roots = next_roots;
        frontier = next_frontier_set.into_iter().collect();
    }

    Ok(InterimResult::new(vec!["root".into(), "src".into(), "edge_type".into(), "rank".into(), "dst".into()], last_hop_rows))
}

async fn execute_fetch(
    spec: &FetchSpec,
    upstream: Option<&InterimResult>,
    storage: &StorageService,
    ctx: &mut ExecContext,
) -> Result<InterimResult> {
    let ids: Vec<VertexId> = match (&spec.ids_column, upstream) {
        (Some(column), Some(result)) => result.get_vids(column)?,
        _ => spec.explicit_ids.clone(),
    };

    let FetchTarget::Vertex { tag_id } = spec.target;
    let mut rows = Vec::new();
    for vid in ids {
        if let Some((schema, bytes)) = storage.get_props(ctx.space_id, vid, tag_id).await? {
            let reader = crate::codec::row::RowReader::new(schema, &bytes)?;
            let mut row = vec![crate::codec::value::Value::Vid(vid)];
            for col in &spec.yield_columns {
                row.push(reader.get_by_name(col)?);
            }
            rows.push(row);
        }
    }
    let mut columns = vec!["id".to_string()];
    columns.extend(spec.yield_columns.iter().cloned());
    Ok(InterimResult::new(columns, rows))
}

fn apply_set_op(op: SetOp, left: InterimResult, right: InterimResult) -> InterimResult {
    let columns = left.columns.clone();
    let mut rows = match op {
        SetOp::Union { distinct } => {
            let mut all = left.rows;
            all.extend(right.rows);
            if distinct {
                dedup_rows(all)
            } else {
                all
            }
        }
        SetOp::Intersect => {
            let right_index = right.build_index(&columns[0]).unwrap_or_default();
            left.rows
                .into_iter()
                .filter(|row| row_in_index(row, &right.rows, &right_index, &columns))
                .collect()
        }
        SetOp::Minus => {
            let right_index = right.build_index(&columns[0]).unwrap_or_default();
            left.rows
                .into_iter()
                .filter(|row| !row_in_index(row, &right.rows, &right_index, &columns))
                .collect()
        }
    };
    if matches!(op, SetOp::Intersect | SetOp::Minus) {
        rows = dedup_rows(rows);
    }
    InterimResult::new(columns, rows)
}

fn row_in_index(
    row: &[crate::codec::value::Value],
    right_rows: &[Vec<crate::codec::value::Value>],
    index: &HashMap<Vec<u8>, Vec<usize>>,
    columns: &[String],
) -> bool {
    let _ = columns;
    let key = row_key(row);
    index
        .values()
        .flatten()
        .any(|&idx| row_key(&right_rows[idx]) == key)
}

fn row_key(row: &[crate::codec::value::Value]) -> Vec<u8> {
    use crate::codec::value::Value;
    let mut out = Vec::new();
    for v in row {
        match v {
            Value::Bool(b) => out.push(*b as u8),
            Value::Int(i) | Value::Vid(i) | Value::Timestamp(i) => out.extend_from_slice(&i.to_be_bytes()),
            Value::Float(f) => out.extend_from_slice(&f.to_be_bytes()),
            Value::Double(d) => out.extend_from_slice(&d.to_be_bytes()),
            Value::String(s) => out.extend_from_slice(s),
            Value::Null => {}
        }
        out.push(0xFF);
    }
    out
}

fn dedup_rows(rows: Vec<Vec<crate::codec::value::Value>>) -> Vec<Vec<crate::codec::value::Value>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let key = row_key(&row);
        if seen.insert(key) {
            out.push(row);
        }
    }
    out
}
