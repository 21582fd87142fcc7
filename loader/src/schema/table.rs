use super::field::{FieldSpec, ForeignKey};
use common::{Error, Result};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnConflict {
    #[default]
    Error,
    DoNothing,
}

/// Declarative description of a destination table.
///
/// Table and field names are trusted configuration: they are pasted into the
/// generated SQL as written, without quoting or escaping. A name that needs
/// quoting (a reserved word such as `user`) must carry its own quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    name: String,
    fields: Vec<FieldSpec>,
}

impl TableSpec {
    pub fn new(name: &str, fields: Vec<FieldSpec>) -> Result<Self> {
        Self::with_prefix(name, fields, "")
    }

    pub fn with_prefix(name: &str, fields: Vec<FieldSpec>, prefix: &str) -> Result<Self> {
        let name = format!("{}{}", prefix, name);

        if fields.is_empty() {
            return Err(Error::SchemaValidation(format!(
                "Table {} has no fields",
                name
            )));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::SchemaValidation(format!(
                    "Duplicate field {} in table {}",
                    field.name, name
                )));
            }
        }

        Ok(Self { name, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn reference(&self, field: &str) -> Result<ForeignKey> {
        self.field(field)
            .map(|f| ForeignKey::new(&self.name, &f.name))
            .ok_or_else(|| {
                Error::SchemaValidation(format!(
                    "Cannot reference unknown field {}.{}",
                    self.name, field
                ))
            })
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is_primary_key)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn create_statement(&self, if_not_exists: bool) -> String {
        let mut clauses: Vec<String> = self.fields.iter().map(FieldSpec::column_clause).collect();

        let primary_keys = self.primary_keys();
        if !primary_keys.is_empty() {
            clauses.push(format!("PRIMARY KEY ({})", primary_keys.join(",")));
        }

        clauses.extend(self.fields.iter().filter_map(FieldSpec::foreign_key_clause));

        format!(
            "CREATE TABLE{} {}({});",
            if if_not_exists { " IF NOT EXISTS" } else { "" },
            self.name,
            clauses.join(", ")
        )
    }

    pub fn drop_statement(&self, if_exists: bool) -> String {
        format!(
            "DROP TABLE{} {};",
            if if_exists { " IF EXISTS" } else { "" },
            self.name
        )
    }

    /// Parameterized insert of `rows` rows; placeholder `$n` binds field
    /// `(n - 1) % width` of row `(n - 1) / width`.
    pub fn insert_statement(&self, rows: usize, on_conflict: OnConflict) -> String {
        let columns: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();
        let width = self.fields.len();
        let values: Vec<String> = (0..rows.max(1))
            .map(|row| {
                let placeholders: Vec<String> =
                    (1..=width).map(|i| format!("${}", row * width + i)).collect();
                format!("({})", placeholders.join(","))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}{}",
            self.name,
            columns.join(","),
            values.join(","),
            match on_conflict {
                OnConflict::Error => "",
                OnConflict::DoNothing => " ON CONFLICT DO NOTHING",
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn tweet_table() -> TableSpec {
        TableSpec::new(
            "test",
            vec![
                FieldSpec::new("tweetId", DataType::BigInt).primary_key(),
                FieldSpec::new("truncated", DataType::Boolean),
                FieldSpec::new("isQuoteStatus", DataType::Boolean).primary_key(),
                FieldSpec::new("inReplyToStatusId", DataType::BigInt),
            ],
        )
        .unwrap()
    }

    #[test]
    fn create_statement_with_composite_primary_key() {
        assert_eq!(
            tweet_table().create_statement(false),
            "CREATE TABLE test(tweetId BIGINT, truncated BOOLEAN, isQuoteStatus BOOLEAN, \
             inReplyToStatusId BIGINT, PRIMARY KEY (tweetId,isQuoteStatus));"
        );
    }

    #[test]
    fn create_statement_with_foreign_key() {
        let parent = tweet_table();
        let child = TableSpec::new(
            "test2",
            vec![
                FieldSpec::new("tweetId", DataType::BigInt)
                    .primary_key()
                    .references(parent.reference("tweetId").unwrap()),
            ],
        )
        .unwrap();

        assert_eq!(
            child.create_statement(true),
            "CREATE TABLE IF NOT EXISTS test2(tweetId BIGINT, PRIMARY KEY (tweetId), \
             FOREIGN KEY (tweetId) REFERENCES test (tweetId));"
        );
    }

    #[test]
    fn clause_counts_follow_fields() {
        let parent = tweet_table();
        let fk = parent.reference("tweetId").unwrap();
        let child = TableSpec::with_prefix(
            "Child",
            vec![
                FieldSpec::new("a", DataType::BigInt).references(fk.clone()),
                FieldSpec::new("b", DataType::Text),
                FieldSpec::new("c", DataType::BigInt).references(fk),
            ],
            "Geo_",
        )
        .unwrap();

        let ddl = child.create_statement(false);
        assert_eq!(child.name(), "Geo_Child");
        assert_eq!(ddl.matches("PRIMARY KEY").count(), 0);
        assert_eq!(ddl.matches("FOREIGN KEY").count(), 2);
        assert_eq!(ddl.matches(" BIGINT").count() + ddl.matches(" TEXT").count(), 3);
    }

    #[test]
    fn drop_statement_honors_flag() {
        let table = tweet_table();
        assert_eq!(table.drop_statement(true), "DROP TABLE IF EXISTS test;");
        assert_eq!(table.drop_statement(false), "DROP TABLE test;");
    }

    #[test]
    fn insert_statement_numbers_placeholders_across_rows() {
        let table = tweet_table();
        assert_eq!(
            table.insert_statement(1, OnConflict::Error),
            "INSERT INTO test (tweetId,truncated,isQuoteStatus,inReplyToStatusId) VALUES ($1,$2,$3,$4)"
        );
        assert!(table
            .insert_statement(2, OnConflict::DoNothing)
            .ends_with("VALUES ($1,$2,$3,$4),($5,$6,$7,$8) ON CONFLICT DO NOTHING"));
    }

    #[test]
    fn rejects_duplicate_and_empty_field_lists() {
        let dup = TableSpec::new(
            "dup",
            vec![
                FieldSpec::new("id", DataType::BigInt),
                FieldSpec::new("id", DataType::Text),
            ],
        );
        assert!(matches!(dup, Err(Error::SchemaValidation(_))));
        assert!(TableSpec::new("empty", vec![]).is_err());
    }

    #[test]
    fn lookups() {
        let table = tweet_table();
        assert_eq!(table.position("isQuoteStatus"), Some(2));
        assert_eq!(table.field("truncated").unwrap().datatype, DataType::Boolean);
        assert!(table.reference("nope").is_err());
        assert_eq!(table.primary_keys(), vec!["tweetId", "isQuoteStatus"]);
    }
}
