pub mod models;
pub mod processor;
pub mod schema;
pub mod services;
pub mod storage;
pub mod utils;

use common::Result;
use common::config::Settings;
use processor::{BatchLoader, Pipeline};
use schema::OnConflict;
use services::{LoadSummary, LoaderService};
use std::path::Path;
use storage::{MemoryStore, PostgresStore, RelationalStore};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Tweets,
    Timelines,
    Followers,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub kind: PipelineKind,
    /// Prepended to every table name of the tweets pipeline.
    pub prefix: String,
    /// Overrides the table name of the timelines and followers pipelines.
    pub table: Option<String>,
    pub drop_existing: bool,
    /// Loads into an in-memory store instead of Postgres.
    pub dry_run: bool,
    pub ignore_duplicates: bool,
}

impl LoadOptions {
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            prefix: String::new(),
            table: None,
            drop_existing: false,
            dry_run: false,
            ignore_duplicates: false,
        }
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        match self.kind {
            PipelineKind::Tweets => Pipeline::tweets(&self.prefix),
            PipelineKind::Timelines => {
                Pipeline::timelines(self.table.as_deref().unwrap_or("Timelines"))
            }
            PipelineKind::Followers => {
                Pipeline::followers(self.table.as_deref().unwrap_or("Followers"))
            }
        }
    }

    fn loader(&self) -> BatchLoader {
        if self.ignore_duplicates {
            BatchLoader::with_on_conflict(OnConflict::DoNothing)
        } else {
            BatchLoader::new()
        }
    }
}

/// Runs the complete load: DDL, then every JSON file of `input_dir`.
pub async fn run_loader_pipeline(
    config_path: &str,
    input_dir: &Path,
    options: &LoadOptions,
) -> Result<LoadSummary> {
    let pipeline = options.pipeline()?;

    if options.dry_run {
        info!(pipeline = pipeline.name(), "Dry run, loading into memory");
        let mut service =
            LoaderService::new(MemoryStore::new(), pipeline).with_loader(options.loader());
        let summary = load(&mut service, input_dir, options.drop_existing).await?;
        info!(rows = ?service.store().row_counts(), "Dry run finished");
        return Ok(summary);
    }

    let settings = Settings::new(config_path)?;
    let store = PostgresStore::connect(&settings).await?;
    let mut service = LoaderService::new(store, pipeline).with_loader(options.loader());

    service.prepare_tables(options.drop_existing).await?;
    let tables = service.store().public_tables().await?;
    info!(tables = ?tables, "Public tables");

    service.load_directory(input_dir).await
}

async fn load<S: RelationalStore>(
    service: &mut LoaderService<S>,
    input_dir: &Path,
    drop_existing: bool,
) -> Result<LoadSummary> {
    service.prepare_tables(drop_existing).await?;
    service.load_directory(input_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn options_pick_table_names() {
        let mut options = LoadOptions::new(PipelineKind::Followers);
        assert_eq!(options.pipeline().unwrap().mappings()[0].table().name(), "Followers");

        options.table = Some("Edges".to_string());
        let pipeline = options.pipeline().unwrap();
        let names: Vec<&str> = pipeline.tables().map(|t| t.name()).collect();
        assert_eq!(names, ["Edges", "Edges_metadata"]);

        let mut options = LoadOptions::new(PipelineKind::Tweets);
        options.prefix = "Geo_".to_string();
        assert_eq!(options.pipeline().unwrap().mappings()[0].table().name(), "Geo_Tweet");
    }

    #[tokio::test]
    async fn dry_run_needs_no_config() {
        let dir = TempDir::new().unwrap();
        let document = json!({"user_id": 1, "utc_timestamp": "2020-01-01 00:00:00", "followers": [2, 3]});
        std::fs::write(dir.path().join("1.json"), document.to_string()).unwrap();

        let mut options = LoadOptions::new(PipelineKind::Followers);
        options.dry_run = true;

        let summary = run_loader_pipeline("does-not-exist.txt", dir.path(), &options)
            .await
            .unwrap();
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.rows["Followers"], 2);
        assert_eq!(summary.rows["Followers_metadata"], 1);
    }
}
