use crate::processor::{BatchLoader, Pipeline};
use crate::storage::RelationalStore;
use crate::utils::paths::{file_key, list_json_files};
use common::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{Instrument, error, info, info_span, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Loaded(BTreeMap<String, u64>),
    /// Its key was already present in the processed marker column.
    SkippedProcessed,
    SkippedParseError(String),
}

#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: u32,
    pub skipped_processed: u32,
    pub skipped_parse_error: u32,
    pub rows: BTreeMap<String, u64>,
    pub skipped_files: Vec<(String, String)>,
}

impl LoadSummary {
    fn record_outcome(&mut self, file: &str, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Loaded(counts) => {
                self.loaded += 1;
                for (table, count) in counts {
                    *self.rows.entry(table).or_default() += count;
                }
            }
            FileOutcome::SkippedProcessed => {
                self.skipped_processed += 1;
                self.skipped_files
                    .push((file.to_string(), "already processed".to_string()));
            }
            FileOutcome::SkippedParseError(reason) => {
                self.skipped_parse_error += 1;
                self.skipped_files.push((file.to_string(), reason));
            }
        }
    }

    pub fn total_rows(&self) -> u64 {
        self.rows.values().sum()
    }
}

/// Drives the files of one directory through a pipeline into a store, one
/// transaction per file.
pub struct LoaderService<S> {
    store: S,
    pipeline: Pipeline,
    loader: BatchLoader,
}

impl<S: RelationalStore> LoaderService<S> {
    pub fn new(store: S, pipeline: Pipeline) -> Self {
        Self {
            store,
            pipeline,
            loader: BatchLoader::new(),
        }
    }

    pub fn with_loader(mut self, loader: BatchLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn prepare_tables(&mut self, drop_existing: bool) -> Result<()> {
        if drop_existing {
            for statement in self.pipeline.drop_statements() {
                info!(statement = %statement, "Dropping table");
                self.store.execute(&statement).await?;
            }
        }

        for statement in self.pipeline.create_statements() {
            info!(statement = %statement, "Creating table");
            self.store.execute(&statement).await?;
        }
        Ok(())
    }

    pub async fn processed_keys(&mut self) -> Result<HashSet<String>> {
        match self.pipeline.processed_marker() {
            Some((table, column)) => self.store.distinct_values(table, column).await,
            None => Ok(HashSet::new()),
        }
    }

    /// Loads every `*.json` file of `dir` in name order.
    ///
    /// Parse faults skip the file. Any other error rolls back the current
    /// file and stops the run; files committed before it stay loaded.
    pub async fn load_directory(&mut self, dir: &Path) -> Result<LoadSummary> {
        let files = list_json_files(dir)?;
        let mut processed = self.processed_keys().await?;
        let mut summary = LoadSummary::default();

        info!(
            pipeline = self.pipeline.name(),
            files = files.len(),
            already_processed = processed.len(),
            "Starting load"
        );

        for path in files {
            let name = path.display().to_string();
            let outcome = self
                .load_file(&path, &mut processed)
                .instrument(info_span!("file", file = %name))
                .await?;
            summary.record_outcome(&name, outcome);
        }

        info!(
            pipeline = self.pipeline.name(),
            loaded = summary.loaded,
            skipped_processed = summary.skipped_processed,
            skipped_parse_error = summary.skipped_parse_error,
            rows = summary.total_rows(),
            "Load finished"
        );
        Ok(summary)
    }

    pub async fn load_file(
        &mut self,
        path: &Path,
        processed: &mut HashSet<String>,
    ) -> Result<FileOutcome> {
        let name = path.display().to_string();
        let key = file_key(path)
            .ok_or_else(|| Error::InvalidInput(format!("Cannot derive a key from {}", name)))?
            .to_string();

        if self.pipeline.processed_marker().is_some() && processed.contains(&key) {
            info!(file = %name, key = %key, "Skipping already processed file");
            return Ok(FileOutcome::SkippedProcessed);
        }

        let content = tokio::fs::read(path).await?;
        let parsed = self.pipeline.parse_file(&key, &content).and_then(|batches| {
            self.pipeline.check_processed_marker(&key, &batches)?;
            Ok(batches)
        });
        let batches = match parsed {
            Ok(batches) => batches,
            Err(e) if e.is_parse_fault() => {
                warn!(file = %name, error = %e, "Skipping unparseable file");
                return Ok(FileOutcome::SkippedParseError(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let mut tx = self.store.begin().await?;
        let mut counts = BTreeMap::new();
        for batch in &batches {
            match self.loader.load(tx.as_mut(), batch.table, &batch.rows).await {
                Ok(inserted) => {
                    counts.insert(batch.table.name().to_string(), inserted);
                }
                Err(e) => {
                    error!(
                        file = %name,
                        table = batch.table.name(),
                        error = %e,
                        "Load failed, rolling back file"
                    );
                    if let Err(rollback) = tx.rollback().await {
                        warn!(file = %name, error = %rollback, "Rollback failed");
                    }
                    return Err(e);
                }
            }
        }
        tx.commit().await?;

        info!(file = %name, rows = ?counts, "File loaded");
        processed.insert(key);
        Ok(FileOutcome::Loaded(counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    fn tweets_file(user_id: &str, tweet_ids: &[&str]) -> String {
        let tweets: Vec<_> = tweet_ids
            .iter()
            .map(|id| {
                json!({
                    "id_str": id,
                    "text": "hi",
                    "user": {"id_str": user_id},
                    "entities": {"hashtags": [{"text": "x"}]}
                })
            })
            .collect();
        json!({"utc_timestamp": "2020-01-01 00:00:00", "historic_tweets": tweets}).to_string()
    }

    fn service(store: MemoryStore) -> LoaderService<MemoryStore> {
        LoaderService::new(store, Pipeline::tweets("").unwrap())
    }

    #[tokio::test]
    async fn loads_files_and_skips_unparseable_ones() {
        let dir = TempDir::new().unwrap();
        write(&dir, "7.json", &tweets_file("7", &["1", "2"]));
        write(&dir, "8.json", "{not json");
        write(&dir, "9.json", r#"{"historic_tweets": []}"#);

        let mut service = service(MemoryStore::new());
        service.prepare_tables(false).await.unwrap();
        let summary = service.load_directory(dir.path()).await.unwrap();

        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.skipped_parse_error, 2);
        assert_eq!(summary.rows["Tweet"], 2);
        assert_eq!(summary.rows["TweetHashtag"], 2);
        assert_eq!(service.store().rows("TweetUser").len(), 2);
        assert_eq!(service.store().commits(), 1);
    }

    #[tokio::test]
    async fn guarded_rerun_inserts_nothing() {
        let dir = TempDir::new().unwrap();
        write(&dir, "7.json", &tweets_file("7", &["1"]));

        let mut service = service(MemoryStore::new());
        service.load_directory(dir.path()).await.unwrap();
        let before = service.store().row_counts();

        let summary = service.load_directory(dir.path()).await.unwrap();
        assert_eq!(summary.loaded, 0);
        assert_eq!(summary.skipped_processed, 1);
        assert_eq!(summary.total_rows(), 0);
        assert_eq!(service.store().row_counts(), before);
    }

    #[tokio::test]
    async fn store_fault_rolls_back_the_file_and_stops() {
        let dir = TempDir::new().unwrap();
        write(&dir, "7.json", &tweets_file("7", &["1"]));

        let mut service = service(MemoryStore::new().failing_inserts_into("TweetHashtag"));
        let err = service.load_directory(dir.path()).await.unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        assert!(service.store().rows("Tweet").is_empty());
        assert_eq!(service.store().commits(), 0);
    }

    #[tokio::test]
    async fn type_fault_keeps_earlier_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1.json", &tweets_file("1", &["10"]));
        write(&dir, "2.json", &tweets_file("2", &["not-a-number"]));
        write(&dir, "3.json", &tweets_file("3", &["30"]));

        let mut service = service(MemoryStore::new());
        let err = service.load_directory(dir.path()).await.unwrap_err();

        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(service.store().rows("Tweet").len(), 1);
    }

    #[tokio::test]
    async fn prepare_tables_drops_children_first() {
        let mut service = service(MemoryStore::new());
        service.prepare_tables(true).await.unwrap();

        let statements = service.store().statements();
        assert_eq!(statements.len(), 12);
        assert_eq!(statements[0], "DROP TABLE IF EXISTS TweetPlace;");
        assert_eq!(statements[5], "DROP TABLE IF EXISTS Tweet;");
        assert!(statements[6].starts_with("CREATE TABLE IF NOT EXISTS Tweet("));
    }

    #[tokio::test]
    async fn pipelines_without_marker_reload_everything() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "3.json",
            &json!({"utc_timestamp": "2020-01-01 00:00:00", "historic_tweets": [{"id": 5}]}).to_string(),
        );

        let mut service = LoaderService::new(MemoryStore::new(), Pipeline::timelines("Timelines").unwrap());
        service.load_directory(dir.path()).await.unwrap();
        service.load_directory(dir.path()).await.unwrap();
        assert_eq!(service.store().rows("Timelines").len(), 2);
    }

    #[tokio::test]
    async fn files_that_cannot_mark_themselves_are_skipped_on_every_run() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "5.json",
            r#"{"utc_timestamp": "2020-01-01 00:00:00", "followers": [2, 3]}"#,
        );
        write(&dir, "8.json", &tweets_file("9", &["1"]));

        let mut followers = LoaderService::new(MemoryStore::new(), Pipeline::followers("Followers").unwrap());
        let first = followers.load_directory(dir.path()).await.unwrap();
        let second = followers.load_directory(dir.path()).await.unwrap();

        assert_eq!(first.skipped_parse_error, 2);
        assert_eq!(first.total_rows(), 0);
        assert_eq!(second.skipped_parse_error, 2);
        assert_eq!(second.total_rows(), 0);
        assert!(followers.store().row_counts().values().all(|count| *count == 0));

        // 5.json has no tweets and 8.json belongs to user 9.
        let mut tweets = service(MemoryStore::new());
        let summary = tweets.load_directory(dir.path()).await.unwrap();
        assert_eq!(summary.skipped_parse_error, 2);
        assert!(tweets.store().rows("Tweet").is_empty());
    }

    #[tokio::test]
    async fn timestamp_warnings_name_the_file() {
        use std::io::Write;
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = TempDir::new().unwrap();
        let document = json!({
            "utc_timestamp": "2020-01-01 00:00:00",
            "historic_tweets": [{"id_str": "1", "created_at": "someday", "user": {"id_str": "7"}}]
        });
        write(&dir, "7.json", &document.to_string());

        let mut service = service(MemoryStore::new());
        service.load_directory(dir.path()).await.unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Unparseable timestamp"), "{}", output);
        assert!(output.contains("7.json"), "{}", output);
    }
}
