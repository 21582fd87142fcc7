mod followers;
mod timelines;
mod tweets;

use super::extract::JsonPath;
use super::flatten::{FileParams, TableMapping};
use super::loader::coerce;
use super::normalize::parse_timestamp;
use crate::models::FlatTuple;
use crate::schema::TableSpec;
use common::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::slice;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordSource {
    /// Every element of the sequence at this path is a record.
    Each(JsonPath),
    /// The document itself is the only record.
    Document,
}

/// Column whose distinct values name the files already loaded.
#[derive(Debug, Clone)]
struct ProcessedMarker {
    table: usize,
    column: String,
}

#[derive(Debug)]
pub struct TableBatch<'a> {
    pub table: &'a TableSpec,
    pub rows: Vec<FlatTuple>,
}

/// How one kind of input file becomes rows in a set of tables.
///
/// Mappings are kept in parent-first order: tables are created and loaded in
/// that order and dropped in reverse.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    records: RecordSource,
    dedup_by: Option<JsonPath>,
    mappings: Vec<TableMapping>,
    marker: Option<ProcessedMarker>,
}

impl Pipeline {
    pub fn new(name: &str, records: RecordSource, mappings: Vec<TableMapping>) -> Self {
        Self {
            name: name.to_string(),
            records,
            dedup_by: None,
            mappings,
            marker: None,
        }
    }

    /// Keeps only the first record for each value found at `path`.
    pub fn with_dedup(mut self, path: &str) -> Self {
        self.dedup_by = Some(JsonPath::parse(path));
        self
    }

    /// Marks files as loaded when their key appears in `table.column`.
    pub fn with_processed_marker(mut self, table: &str, column: &str) -> Result<Self> {
        let index = self
            .mappings
            .iter()
            .position(|mapping| mapping.table().name() == table)
            .ok_or_else(|| {
                Error::SchemaValidation(format!("Pipeline {} has no table {}", self.name, table))
            })?;

        if self.mappings[index].table().field(column).is_none() {
            return Err(Error::SchemaValidation(format!(
                "Table {} has no column {}",
                table, column
            )));
        }

        self.marker = Some(ProcessedMarker {
            table: index,
            column: column.to_string(),
        });
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mappings(&self) -> &[TableMapping] {
        &self.mappings
    }

    pub fn tables(&self) -> impl DoubleEndedIterator<Item = &TableSpec> {
        self.mappings.iter().map(TableMapping::table)
    }

    pub fn processed_marker(&self) -> Option<(&TableSpec, &str)> {
        self.marker
            .as_ref()
            .map(|marker| (self.mappings[marker.table].table(), marker.column.as_str()))
    }

    pub fn create_statements(&self) -> Vec<String> {
        self.tables().map(|table| table.create_statement(true)).collect()
    }

    pub fn drop_statements(&self) -> Vec<String> {
        self.tables()
            .rev()
            .map(|table| table.drop_statement(true))
            .collect()
    }

    /// Any error here is a parse fault.
    pub fn parse_file(&self, file_key: &str, content: &[u8]) -> Result<Vec<TableBatch<'_>>> {
        let document: Value = serde_json::from_slice(content)?;
        self.flatten_document(file_key, &document)
    }

    pub fn flatten_document(&self, file_key: &str, document: &Value) -> Result<Vec<TableBatch<'_>>> {
        let params = file_params(file_key, document)?;

        let records = match &self.records {
            RecordSource::Each(path) => match path.resolve(document) {
                Some(Value::Array(records)) => records.as_slice(),
                _ => {
                    return Err(Error::MalformedInput(format!(
                        "{} is missing the {} sequence",
                        file_key, path
                    )));
                }
            },
            RecordSource::Document => slice::from_ref(document),
        };

        let mut batches: Vec<TableBatch<'_>> = self
            .mappings
            .iter()
            .map(|mapping| TableBatch {
                table: mapping.table(),
                rows: Vec::new(),
            })
            .collect();

        let mut seen = HashSet::new();
        for record in records {
            if let Some(key) = self.dedup_key(record) {
                if !seen.insert(key) {
                    continue;
                }
            }

            for (mapping, batch) in self.mappings.iter().zip(batches.iter_mut()) {
                batch.rows.extend(mapping.rows(record, &params));
            }
        }

        Ok(batches)
    }

    /// Refuses batches that would not write `file_key` into the marker column.
    pub fn check_processed_marker(&self, file_key: &str, batches: &[TableBatch<'_>]) -> Result<()> {
        let Some(marker) = &self.marker else {
            return Ok(());
        };

        let table = self.mappings[marker.table].table();
        let (position, datatype) = table
            .fields()
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == marker.column)
            .map(|(position, field)| (position, field.datatype))
            .ok_or_else(|| {
                Error::SchemaValidation(format!("Table {} has no column {}", table.name(), marker.column))
            })?;

        let marked = batches
            .iter()
            .filter(|batch| batch.table.name() == table.name())
            .flat_map(|batch| &batch.rows)
            .filter_map(|row| row.get(position))
            .filter_map(|value| coerce(value, datatype))
            .any(|value| !value.is_null() && value.to_string() == file_key);

        if marked {
            Ok(())
        } else {
            Err(Error::MalformedInput(format!(
                "{} yields no {}.{} value equal to its key",
                file_key,
                table.name(),
                marker.column
            )))
        }
    }

    fn dedup_key(&self, record: &Value) -> Option<String> {
        match self.dedup_by.as_ref()?.resolve(record)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn file_params(file_key: &str, document: &Value) -> Result<FileParams> {
    let collected_at = document
        .get("utc_timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedInput(format!("{} has no utc_timestamp", file_key)))?;

    let collected_ts = parse_timestamp(collected_at).ok_or_else(|| {
        Error::InvalidTimestamp(format!("{}: utc_timestamp {:?}", file_key, collected_at))
    })?;

    Ok(FileParams {
        file_key: file_key.to_string(),
        collected_at: collected_at.to_string(),
        collected_ts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scalar;
    use serde_json::json;

    fn tweets() -> Pipeline {
        Pipeline::tweets("").unwrap()
    }

    fn rows<'a>(batches: &'a [TableBatch<'_>], table: &str) -> &'a [FlatTuple] {
        batches
            .iter()
            .find(|batch| batch.table.name() == table)
            .map(|batch| batch.rows.as_slice())
            .unwrap()
    }

    #[test]
    fn strips_nul_and_emits_one_hashtag_row() {
        let document = json!({
            "utc_timestamp": "2020-01-01 00:00:00",
            "historic_tweets": [
                {"id_str": "1", "text": "hi\u{0}", "entities": {"hashtags": [{"text": "x"}]}}
            ]
        });

        let pipeline = tweets();
        let batches = pipeline.flatten_document("42", &document).unwrap();

        let tweet = &rows(&batches, "Tweet")[0];
        let text = pipeline.mappings()[0].table().position("text").unwrap();
        assert_eq!(tweet[text], Scalar::Text("hi".into()));

        assert_eq!(
            rows(&batches, "TweetHashtag"),
            &[vec![Scalar::Text("1".into()), Scalar::Text("x".into())]]
        );
        assert!(rows(&batches, "TweetPlace").is_empty());
        assert!(rows(&batches, "TweetUrl").is_empty());
    }

    #[test]
    fn every_tuple_matches_its_table_width() {
        let document = json!({
            "utc_timestamp": "Wed Jan 01 00:00:00 +0000 2020",
            "historic_tweets": [
                {"id_str": "1"},
                {"id_str": "2", "user": null, "entities": null, "place": null},
                {
                    "id_str": "3",
                    "user": {"id_str": "9"},
                    "coordinates": {"coordinates": [10.5, -3.25]},
                    "place": {"id": "abc", "bounding_box": {"type": "Polygon"}},
                    "entities": {
                        "hashtags": [{"text": "a"}],
                        "user_mentions": [{"id_str": "5"}],
                        "urls": [{"url": "u"}]
                    }
                }
            ]
        });

        for pipeline in [tweets(), Pipeline::timelines("Timelines").unwrap()] {
            for batch in pipeline.flatten_document("9", &document).unwrap() {
                for row in &batch.rows {
                    assert_eq!(row.len(), batch.table.width(), "{}", batch.table.name());
                }
            }
        }
    }

    #[test]
    fn duplicate_records_are_flattened_once() {
        let document = json!({
            "utc_timestamp": "2020-01-01 00:00:00",
            "historic_tweets": [
                {"id_str": "1", "entities": {"hashtags": [{"text": "x"}]}},
                {"id_str": "1", "entities": {"hashtags": [{"text": "x"}]}},
                {"id_str": "2"}
            ]
        });
        let pipeline = tweets();
        let batches = pipeline.flatten_document("42", &document).unwrap();
        assert_eq!(rows(&batches, "Tweet").len(), 2);
        assert_eq!(rows(&batches, "TweetHashtag").len(), 1);
    }

    #[test]
    fn file_level_faults_are_parse_faults() {
        let pipeline = tweets();

        let missing = pipeline
            .flatten_document("1", &json!({"historic_tweets": []}))
            .unwrap_err();
        assert!(missing.is_parse_fault());

        let bad_ts = pipeline
            .flatten_document("1", &json!({"utc_timestamp": "soon", "historic_tweets": []}))
            .unwrap_err();
        assert!(bad_ts.is_parse_fault());

        let no_records = pipeline
            .flatten_document("1", &json!({"utc_timestamp": "2020-01-01 00:00:00"}))
            .unwrap_err();
        assert!(no_records.is_parse_fault());

        assert!(pipeline.parse_file("1", b"{not json").unwrap_err().is_parse_fault());
    }

    #[test]
    fn ddl_orders_parents_before_children() {
        let pipeline = Pipeline::tweets("Geo_").unwrap();
        let creates = pipeline.create_statements();
        let drops = pipeline.drop_statements();

        assert!(creates[0].starts_with("CREATE TABLE IF NOT EXISTS Geo_Tweet("));
        assert!(creates[1].contains("FOREIGN KEY (tweetId) REFERENCES Geo_Tweet (tweetId)"));
        assert_eq!(drops.last().map(String::as_str), Some("DROP TABLE IF EXISTS Geo_Tweet;"));
        assert_eq!(creates.len(), 6);
    }

    #[test]
    fn batches_must_carry_the_file_key_in_the_marker_column() {
        let pipeline = Pipeline::followers("Followers").unwrap();

        let keyed = json!({"user_id": 5, "utc_timestamp": "2020-01-01 00:00:00", "followers": [2]});
        let batches = pipeline.flatten_document("5", &keyed).unwrap();
        assert!(pipeline.check_processed_marker("5", &batches).is_ok());

        let unkeyed = json!({"utc_timestamp": "2020-01-01 00:00:00", "followers": [2, 3]});
        let batches = pipeline.flatten_document("5", &unkeyed).unwrap();
        let err = pipeline.check_processed_marker("5", &batches).unwrap_err();
        assert!(err.is_parse_fault());

        let other_user = json!({"user_id": 6, "utc_timestamp": "2020-01-01 00:00:00", "followers": []});
        let batches = pipeline.flatten_document("5", &other_user).unwrap();
        assert!(pipeline.check_processed_marker("5", &batches).is_err());

        let timelines = Pipeline::timelines("Timelines").unwrap();
        assert!(timelines.check_processed_marker("5", &[]).is_ok());
    }

    #[test]
    fn processed_marker_must_name_a_known_column() {
        let pipeline = tweets();
        let (table, column) = pipeline.processed_marker().unwrap();
        assert_eq!((table.name(), column), ("TweetUser", "userId"));

        assert!(tweets().with_processed_marker("Nope", "userId").is_err());
        assert!(tweets().with_processed_marker("TweetUser", "nope").is_err());
    }
}
