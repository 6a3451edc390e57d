//! Analytic document store
//!
//! [`AnalyticStore`] is the seam to the document database holding the daily
//! analytic collection. [`InMemoryAnalyticStore`] evaluates the subset of
//! aggregation stages the billing reports use over documents loaded from
//! JSON Lines files.

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use voipbill_core::dates::parse_document_datetime;
use voipbill_core::error::{BillingError, Result};

/// A document store able to run aggregation pipelines
#[async_trait]
pub trait AnalyticStore: Send + Sync {
    /// Run `pipeline` over `collection` and return the resulting documents
    async fn aggregate(&self, collection: &str, pipeline: &[Value]) -> Result<Vec<Value>>;

    /// Number of documents in `collection`
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Store keeping every collection in memory
#[derive(Debug, Default)]
pub struct InMemoryAnalyticStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryAnalyticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append documents to a collection
    pub async fn insert(&self, collection: &str, docs: impl IntoIterator<Item = Value>) {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }

    /// Load a JSON Lines file into a collection, returning the number of
    /// documents added
    ///
    /// Blank lines are ignored. Lines that are not JSON objects are skipped
    /// with a warning.
    pub async fn load_jsonl(&self, collection: &str, path: &Path) -> Result<usize> {
        let file = tokio::fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut docs = Vec::new();
        let mut line_number = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(doc @ Value::Object(_)) => docs.push(doc),
                Ok(_) => warn!(
                    "Skipping non-object document at {}:{}",
                    path.display(),
                    line_number
                ),
                Err(e) => warn!(
                    "Skipping malformed document at {}:{}: {}",
                    path.display(),
                    line_number,
                    e
                ),
            }
        }

        let loaded = docs.len();
        self.insert(collection, docs).await;
        info!(
            "Loaded {} documents into '{}' from {}",
            loaded,
            collection,
            path.display()
        );
        Ok(loaded)
    }
}

#[async_trait]
impl AnalyticStore for InMemoryAnalyticStore {
    async fn aggregate(&self, collection: &str, pipeline: &[Value]) -> Result<Vec<Value>> {
        let docs = {
            let collections = self.collections.read().await;
            collections.get(collection).cloned().unwrap_or_default()
        };
        debug!(
            "Running {}-stage pipeline over {} documents in '{}'",
            pipeline.len(),
            docs.len(),
            collection
        );
        run_pipeline(docs, pipeline)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, Vec::len))
    }
}

/// Evaluate an aggregation pipeline over `docs`
pub fn run_pipeline(mut docs: Vec<Value>, pipeline: &[Value]) -> Result<Vec<Value>> {
    for stage in pipeline {
        let (name, body) = single_entry(stage)?;
        docs = match name {
            "$match" => {
                let cond = as_object(body, "$match")?;
                docs.into_iter().filter(|doc| matches(doc, cond)).collect()
            }
            "$group" => group(docs, as_object(body, "$group")?)?,
            "$project" => project(docs, as_object(body, "$project")?)?,
            "$sort" => sort(docs, as_object(body, "$sort")?)?,
            "$limit" => {
                let n = body.as_u64().ok_or_else(|| {
                    BillingError::InvalidDocument("$limit expects a non-negative integer".into())
                })?;
                docs.truncate(usize::try_from(n).unwrap_or(usize::MAX));
                docs
            }
            other => return Err(BillingError::UnsupportedStage(other.to_string())),
        };
    }
    Ok(docs)
}

fn single_entry(stage: &Value) -> Result<(&str, &Value)> {
    let map = stage
        .as_object()
        .filter(|m| m.len() == 1)
        .ok_or_else(|| {
            BillingError::InvalidDocument(format!("pipeline stage must have one key: {stage}"))
        })?;
    let (name, body) = map.iter().next().ok_or_else(|| {
        BillingError::InvalidDocument("empty pipeline stage".into())
    })?;
    Ok((name.as_str(), body))
}

fn as_object<'a>(value: &'a Value, stage: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| BillingError::InvalidDocument(format!("{stage} expects an object")))
}

/// Resolve a dotted path such as `metadata.date`
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, key| current.get(key))
}

fn matches(doc: &Value, cond: &Map<String, Value>) -> bool {
    cond.iter().all(|(path, expected)| {
        let field = lookup(doc, path);
        match expected {
            Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) && !ops.is_empty() => {
                ops.iter().all(|(op, operand)| apply_operator(field, op, operand))
            }
            _ => field.is_some_and(|v| values_equal(v, expected)),
        }
    })
}

fn apply_operator(field: Option<&Value>, op: &str, operand: &Value) -> bool {
    match op {
        "$eq" => field.is_some_and(|v| values_equal(v, operand)),
        "$ne" => !field.is_some_and(|v| values_equal(v, operand)),
        "$in" => operand
            .as_array()
            .is_some_and(|items| field.is_some_and(|v| items.iter().any(|i| values_equal(v, i)))),
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let Some(ordering) = field.and_then(|v| compare(v, operand)) else {
                return false;
            };
            match op {
                "$gt" => ordering == Ordering::Greater,
                "$gte" => ordering != Ordering::Less,
                "$lt" => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            }
        }
        other => {
            warn!("Unsupported match operator {}", other);
            false
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Order two scalar values; strings that both read as datetimes compare as
/// datetimes
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (parse_document_datetime(x), parse_document_datetime(y)) {
                (Some(dx), Some(dy)) => Some(dx.cmp(&dy)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Sort key ordering with missing and null values first
fn sort_compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
    }
}

/// Evaluate a group or project expression against a document
fn evaluate(expr: &Value, doc: &Value) -> Result<Value> {
    match expr {
        Value::String(s) if s.starts_with('$') => {
            Ok(lookup(doc, &s[1..]).cloned().unwrap_or(Value::Null))
        }
        Value::Object(map) if map.len() == 1 && map.contains_key("$substr") => {
            substr(&map["$substr"], doc)
        }
        other => Ok(other.clone()),
    }
}

fn substr(args: &Value, doc: &Value) -> Result<Value> {
    let bad = || BillingError::InvalidDocument(format!("$substr expects [expr, start, length]: {args}"));
    let args = args.as_array().filter(|a| a.len() == 3).ok_or_else(bad)?;
    let start = args[1].as_u64().ok_or_else(bad)? as usize;
    let len = args[2].as_u64().ok_or_else(bad)? as usize;

    let text = match evaluate(&args[0], doc)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Value::String(text.chars().skip(start).take(len).collect()))
}

enum Accumulator {
    Sum(f64),
    Push(Vec<Value>),
}

impl Accumulator {
    fn new(op: &str) -> Result<Self> {
        match op {
            "$sum" => Ok(Self::Sum(0.0)),
            "$push" => Ok(Self::Push(Vec::new())),
            other => Err(BillingError::UnsupportedStage(format!("$group accumulator {other}"))),
        }
    }

    fn add(&mut self, value: Value) {
        match self {
            // Non-numeric values do not contribute to a sum
            Self::Sum(total) => {
                if let Some(n) = value.as_f64() {
                    *total += n;
                }
            }
            Self::Push(items) => items.push(value),
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Sum(total) => Number::from_f64(total).map_or(Value::Null, Value::Number),
            Self::Push(items) => Value::Array(items),
        }
    }
}

fn group(docs: Vec<Value>, body: &Map<String, Value>) -> Result<Vec<Value>> {
    let id_expr = body
        .get("_id")
        .ok_or_else(|| BillingError::InvalidDocument("$group requires an _id".into()))?;

    let mut fields = Vec::new();
    for (name, acc) in body.iter().filter(|(name, _)| name.as_str() != "_id") {
        let (op, expr) = single_entry(acc)?;
        Accumulator::new(op)?;
        fields.push((name.clone(), op, expr));
    }

    // Groups keep first-seen order
    let mut groups: Vec<(Value, Vec<Accumulator>)> = Vec::new();
    for doc in &docs {
        let key = evaluate(id_expr, doc)?;
        let idx = match groups.iter().position(|(k, _)| *k == key) {
            Some(idx) => idx,
            None => {
                let accs = fields
                    .iter()
                    .map(|(_, op, _)| Accumulator::new(op))
                    .collect::<Result<Vec<_>>>()?;
                groups.push((key, accs));
                groups.len() - 1
            }
        };
        for ((_, _, expr), acc) in fields.iter().zip(groups[idx].1.iter_mut()) {
            acc.add(evaluate(expr, doc)?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accs)| {
            let mut out = Map::new();
            out.insert("_id".to_string(), key);
            for ((name, _, _), acc) in fields.iter().zip(accs) {
                out.insert(name.clone(), acc.finish());
            }
            Value::Object(out)
        })
        .collect())
}

fn project(docs: Vec<Value>, body: &Map<String, Value>) -> Result<Vec<Value>> {
    let keep_id = !matches!(body.get("_id"), Some(Value::Bool(false)))
        && body.get("_id").and_then(Value::as_i64) != Some(0);

    docs.iter()
        .map(|doc| {
            let mut out = Map::new();
            if keep_id {
                if let Some(id) = doc.get("_id") {
                    out.insert("_id".to_string(), id.clone());
                }
            }
            for (name, rule) in body.iter().filter(|(name, _)| name.as_str() != "_id") {
                let included = match rule {
                    Value::Bool(b) => *b,
                    Value::Number(n) => n.as_f64() != Some(0.0),
                    _ => {
                        out.insert(name.clone(), evaluate(rule, doc)?);
                        continue;
                    }
                };
                if included {
                    if let Some(v) = lookup(doc, name) {
                        out.insert(name.clone(), v.clone());
                    }
                }
            }
            Ok(Value::Object(out))
        })
        .collect()
}

fn sort(mut docs: Vec<Value>, body: &Map<String, Value>) -> Result<Vec<Value>> {
    let mut keys = Vec::with_capacity(body.len());
    for (path, direction) in body {
        let descending = match direction.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => {
                return Err(BillingError::InvalidDocument(format!(
                    "$sort direction for {path} must be 1 or -1"
                )));
            }
        };
        keys.push((path.as_str(), descending));
    }

    docs.sort_by(|a, b| {
        keys.iter()
            .map(|(path, descending)| {
                let ord = sort_compare(lookup(a, path), lookup(b, path));
                if *descending { ord.reverse() } else { ord }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(docs)
}
