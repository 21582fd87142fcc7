use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Connection parameters read from a flat `key=value` file.
///
/// The keys are handed to the store untouched, so anything libpq understands
/// (`host`, `port`, `dbname`, `user`, `password`, `sslmode`, ...) can be set.
/// `LOADER_<KEY>` environment variables override the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    pub connection: BTreeMap<String, String>,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            // key=value lines without a section header parse as a sectionless INI file
            .add_source(File::new(path, FileFormat::Ini))
            .add_source(Environment::with_prefix("LOADER"));

        let settings: Settings = builder.build()?.try_deserialize()?;

        debug!(
            keys = ?settings.connection.keys().collect::<Vec<_>>(),
            "Loaded connection settings"
        );

        Ok(settings)
    }

    /// Renders the settings as a libpq-style `key='value'` connection string.
    pub fn connection_string(&self) -> String {
        self.connection
            .iter()
            .map(|(key, value)| {
                // psycopg accepts `database`, libpq only knows `dbname`
                let key = match key.as_str() {
                    "database" => "dbname",
                    other => other,
                };
                format!("{}='{}'", key, escape_value(value))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
