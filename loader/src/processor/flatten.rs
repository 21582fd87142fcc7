use super::extract::JsonPath;
use super::normalize::Normalizer;
use crate::models::{FlatTuple, Scalar};
use crate::schema::TableSpec;
use chrono::NaiveDateTime;
use common::{Error, Result};
use serde_json::Value;

/// Values captured once per input file, outside any record.
#[derive(Debug, Clone, PartialEq)]
pub struct FileParams {
    /// File stem, e.g. the user id for `12345.json`.
    pub file_key: String,
    /// `utc_timestamp` exactly as written in the file.
    pub collected_at: String,
    pub collected_ts: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    FileKey,
    CollectedAt,
    CollectedTs,
}

impl FileParams {
    pub fn get(&self, param: Param) -> Scalar {
        match param {
            Param::FileKey => Scalar::Text(self.file_key.clone()),
            Param::CollectedAt => Scalar::Text(self.collected_at.clone()),
            Param::CollectedTs => Scalar::Timestamp(self.collected_ts),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Path(JsonPath),
    /// Relative to the enclosing record when flattening a child element.
    Parent(JsonPath),
    Param(Param),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldExtraction {
    pub name: String,
    pub source: Source,
    pub normalizer: Normalizer,
}

/// Ordered `(field, source, normalizer)` entries, one per destination column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionPlan {
    entries: Vec<FieldExtraction>,
}

impl ExtractionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(self, name: &str, path: &str, normalizer: Normalizer) -> Self {
        self.push(name, Source::Path(JsonPath::parse(path)), normalizer)
    }

    /// The element itself, for sequences of scalars.
    pub fn element(self, name: &str, normalizer: Normalizer) -> Self {
        self.push(name, Source::Path(JsonPath::root()), normalizer)
    }

    pub fn parent(self, name: &str, path: &str, normalizer: Normalizer) -> Self {
        self.push(name, Source::Parent(JsonPath::parse(path)), normalizer)
    }

    pub fn param(self, name: &str, param: Param) -> Self {
        self.push(name, Source::Param(param), Normalizer::Identity)
    }

    fn push(mut self, name: &str, source: Source, normalizer: Normalizer) -> Self {
        self.entries.push(FieldExtraction {
            name: name.to_string(),
            source,
            normalizer,
        });
        self
    }

    /// Rejects a plan whose entries do not line up with the table's field order.
    pub fn check_against(&self, table: &TableSpec) -> Result<()> {
        if self.entries.len() != table.width() {
            return Err(Error::SchemaMismatch(format!(
                "Plan for {} has {} entries, table has {} fields",
                table.name(),
                self.entries.len(),
                table.width()
            )));
        }

        for (position, (entry, field)) in self.entries.iter().zip(table.fields()).enumerate() {
            if entry.name != field.name {
                return Err(Error::SchemaMismatch(format!(
                    "Plan for {} has {} at position {}, table has {}",
                    table.name(),
                    entry.name,
                    position,
                    field.name
                )));
            }
        }

        Ok(())
    }
}

pub fn flatten(record: &Value, plan: &ExtractionPlan, params: &FileParams) -> FlatTuple {
    flatten_child(record, record, plan, params)
}

/// Flattens `record` while `Source::Parent` entries read from `parent`.
pub fn flatten_child(
    record: &Value,
    parent: &Value,
    plan: &ExtractionPlan,
    params: &FileParams,
) -> FlatTuple {
    plan.entries
        .iter()
        .map(|entry| match &entry.source {
            Source::Path(path) => entry.normalizer.apply(path.resolve(record), &entry.name),
            Source::Parent(path) => entry.normalizer.apply(path.resolve(parent), &entry.name),
            Source::Param(param) => params.get(*param),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    Record,
    /// One row when the sub-object is present and not null.
    Optional(JsonPath),
    /// One row per element of the sequence; none when it is absent.
    Each(JsonPath),
}

#[derive(Debug, Clone)]
pub struct TableMapping {
    table: TableSpec,
    scope: Scope,
    plan: ExtractionPlan,
}

impl TableMapping {
    pub fn new(table: TableSpec, scope: Scope, plan: ExtractionPlan) -> Result<Self> {
        plan.check_against(&table)?;
        Ok(Self { table, scope, plan })
    }

    pub fn table(&self) -> &TableSpec {
        &self.table
    }

    pub fn rows(&self, record: &Value, params: &FileParams) -> Vec<FlatTuple> {
        match &self.scope {
            Scope::Record => vec![flatten(record, &self.plan, params)],
            Scope::Optional(path) => match path.resolve(record) {
                None | Some(Value::Null) => Vec::new(),
                Some(child) => vec![flatten_child(child, record, &self.plan, params)],
            },
            Scope::Each(path) => match path.resolve(record) {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| flatten_child(item, record, &self.plan, params))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}
