use super::{Pipeline, RecordSource};
use crate::processor::extract::JsonPath;
use crate::processor::flatten::{ExtractionPlan, Param, Scope, TableMapping};
use crate::processor::normalize::Normalizer;
use crate::schema::{DataType, FieldSpec, TableSpec};
use common::Result;

impl Pipeline {
    /// One file per user: `{"user_id", "utc_timestamp", "followers": [..]}`.
    /// Writes an edge per follower into `table_name` and one summary row into
    /// `{table_name}_metadata`, which also marks the user as loaded.
    pub fn followers(table_name: &str) -> Result<Self> {
        let followers = TableSpec::new(
            table_name,
            vec![
                FieldSpec::new("user_id", DataType::BigInt),
                FieldSpec::new("follower_id", DataType::BigInt),
            ],
        )?;

        let followers_plan = ExtractionPlan::new()
            .parent("user_id", "user_id", Normalizer::Identity)
            .element("follower_id", Normalizer::Identity);

        let metadata = TableSpec::new(
            &format!("{}_metadata", table_name),
            vec![
                FieldSpec::new("user_id", DataType::BigInt),
                FieldSpec::new("user_timeline_collected_at", DataType::Varchar(64)),
                FieldSpec::new("user_timeline_collected_ts", DataType::Timestamp),
                FieldSpec::new("followers_collected", DataType::BigInt),
            ],
        )?;

        let metadata_plan = ExtractionPlan::new()
            .path("user_id", "user_id", Normalizer::Identity)
            .param("user_timeline_collected_at", Param::CollectedAt)
            .param("user_timeline_collected_ts", Param::CollectedTs)
            .path("followers_collected", "followers", Normalizer::Count);

        let metadata_table = metadata.name().to_string();
        Pipeline::new(
            "followers",
            RecordSource::Document,
            vec![
                TableMapping::new(
                    followers,
                    Scope::Each(JsonPath::parse("followers")),
                    followers_plan,
                )?,
                TableMapping::new(metadata, Scope::Record, metadata_plan)?,
            ],
        )
        .with_processed_marker(&metadata_table, "user_id")
    }
}
