// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Declarative aggregation pipelines over JSON documents.
//!
//! A pipeline is anchored on one collection by an equality match, then runs an
//! ordered list of stages:
//! - `Match` filters the current documents
//! - `Lookup` left-outer joins another collection, optionally running a nested
//!   pipeline over the joined documents
//! - `Set` adds derived fields
//! - `Project` keeps only the listed top-level fields
//!
//! Backends only need to answer "documents of `collection` whose `field` is one
//! of `values`" through [`DocumentSource`]; the stage semantics live here so
//! every backend behaves the same.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Minimal query capability a backend must provide to run pipelines.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Return every document in `collection` whose `field` equals one of `values`.
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Value>, AppError>;
}

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match { field: String, value: Value },
    Lookup(Lookup),
    Set(Vec<(String, Expr)>),
    Project(Vec<String>),
}

/// Left-outer equality join against another collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: String,
    /// Field on the current document; an array field joins every element
    pub local_field: String,
    pub foreign_field: String,
    /// Output field receiving the joined documents as an array
    pub as_field: String,
    /// Stages applied to the joined documents
    pub pipeline: Vec<Stage>,
}

impl Lookup {
    pub fn new(from: &str, local_field: &str, foreign_field: &str, as_field: &str) -> Self {
        Self {
            from: from.to_string(),
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            as_field: as_field.to_string(),
            pipeline: Vec::new(),
        }
    }

    /// Attach a nested pipeline run over the joined documents.
    pub fn with_pipeline(mut self, stages: Vec<Stage>) -> Self {
        self.pipeline = stages;
        self
    }
}

/// Derived-field expressions. Paths are dotted and traverse arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Number of values at the path (0 when missing)
    Size(String),
    /// First value at the path, or null
    First(String),
    /// Whether `value` appears among the values at the path
    In { value: Value, path: String },
}

impl Expr {
    pub fn evaluate(&self, doc: &Value) -> Value {
        match self {
            Expr::Size(path) => Value::from(field_values(doc, path).len() as u64),
            Expr::First(path) => field_values(doc, path)
                .first()
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
            Expr::In { value, path } => {
                Value::Bool(field_values(doc, path).iter().any(|v| *v == value))
            }
        }
    }
}

/// Anchored pipeline: an initial equality match on `collection` followed by stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub collection: String,
    pub field: String,
    pub value: Value,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn matching(collection: &str, field: &str, value: impl Into<Value>) -> Self {
        Self {
            collection: collection.to_string(),
            field: field.to_string(),
            value: value.into(),
            stages: Vec::new(),
        }
    }

    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.stages.push(Stage::Match {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn lookup(mut self, lookup: Lookup) -> Self {
        self.stages.push(Stage::Lookup(lookup));
        self
    }

    pub fn set<'a>(mut self, fields: impl IntoIterator<Item = (&'a str, Expr)>) -> Self {
        self.stages.push(Stage::Set(
            fields
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr))
                .collect(),
        ));
        self
    }

    pub fn project(mut self, fields: &[&str]) -> Self {
        self.stages.push(project(fields));
        self
    }
}

/// Build a projection stage (for nested lookup pipelines).
pub fn project(fields: &[&str]) -> Stage {
    Stage::Project(fields.iter().map(|f| f.to_string()).collect())
}

/// Run a pipeline against a document source.
pub async fn execute<S>(source: &S, pipeline: &Pipeline) -> Result<Vec<Value>, AppError>
where
    S: DocumentSource + ?Sized,
{
    let seed = source
        .find_by_field(
            &pipeline.collection,
            &pipeline.field,
            std::slice::from_ref(&pipeline.value),
        )
        .await?;

    apply_stages(source, seed, &pipeline.stages).await
}

fn apply_stages<'a, S>(
    source: &'a S,
    mut docs: Vec<Value>,
    stages: &'a [Stage],
) -> BoxFuture<'a, Result<Vec<Value>, AppError>>
where
    S: DocumentSource + ?Sized,
{
    async move {
        for stage in stages {
            docs = match stage {
                Stage::Match { field, value } => docs
                    .into_iter()
                    .filter(|doc| field_values(doc, field).iter().any(|v| *v == value))
                    .collect(),
                Stage::Lookup(lookup) => {
                    let mut joined_docs = Vec::with_capacity(docs.len());
                    for mut doc in docs {
                        let joined = join(source, &doc, lookup).await?;
                        set_field(&mut doc, &lookup.as_field, Value::Array(joined));
                        joined_docs.push(doc);
                    }
                    joined_docs
                }
                Stage::Set(fields) => docs
                    .into_iter()
                    .map(|mut doc| {
                        for (name, expr) in fields {
                            let value = expr.evaluate(&doc);
                            set_field(&mut doc, name, value);
                        }
                        doc
                    })
                    .collect(),
                Stage::Project(fields) => docs
                    .into_iter()
                    .map(|doc| project_fields(doc, fields))
                    .collect(),
            };
        }
        Ok(docs)
    }
    .boxed()
}

/// Join one document. Results follow the order of the local key values, so an
/// array of IDs yields its matches in array order, repeats included.
async fn join<S>(source: &S, doc: &Value, lookup: &Lookup) -> Result<Vec<Value>, AppError>
where
    S: DocumentSource + ?Sized,
{
    let keys: Vec<Value> = field_values(doc, &lookup.local_field)
        .into_iter()
        .cloned()
        .collect();
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut distinct: Vec<Value> = Vec::with_capacity(keys.len());
    for key in &keys {
        if !distinct.contains(key) {
            distinct.push(key.clone());
        }
    }

    let foreign = source
        .find_by_field(&lookup.from, &lookup.foreign_field, &distinct)
        .await?;

    let mut joined = Vec::new();
    for key in &keys {
        joined.extend(
            foreign
                .iter()
                .filter(|f| field_values(f, &lookup.foreign_field).contains(&key))
                .cloned(),
        );
    }

    apply_stages(source, joined, &lookup.pipeline).await
}

/// Resolve a dotted path, flattening arrays along the way and at the leaf.
/// Missing fields and nulls contribute nothing.
pub(crate) fn field_values<'v>(doc: &'v Value, path: &str) -> Vec<&'v Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        current = current
            .into_iter()
            .flat_map(|value| match value {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.get(segment))
                    .collect::<Vec<_>>(),
                other => other.get(segment).into_iter().collect::<Vec<_>>(),
            })
            .collect();
    }

    current
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            Value::Null => Vec::new(),
            other => vec![other],
        })
        .collect()
}

fn set_field(doc: &mut Value, name: &str, value: Value) {
    if let Value::Object(map) = doc {
        map.insert(name.to_string(), value);
    }
}

fn project_fields(doc: Value, fields: &[String]) -> Value {
    match doc {
        Value::Object(mut map) => {
            let mut projected = Map::with_capacity(fields.len());
            for field in fields {
                if let Some(value) = map.remove(field) {
                    projected.insert(field.clone(), value);
                }
            }
            Value::Object(projected)
        }
        other => other,
    }
}
