use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use loader::{LoadOptions, PipelineKind};
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn pipeline_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("config")
                .value_name("CONFIG")
                .required(true)
                .help("key=value file with the database connection settings"),
        )
        .arg(
            Arg::new("input")
                .value_name("INPUT_DIR")
                .required(true)
                .help("Directory of collected JSON files"),
        )
        .arg(
            Arg::new("drop-existing")
                .long("drop-existing")
                .action(ArgAction::SetTrue)
                .help("Drop the pipeline's tables before creating them"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Flatten and load into memory without touching the database"),
        )
        .arg(
            Arg::new("ignore-duplicates")
                .long("ignore-duplicates")
                .action(ArgAction::SetTrue)
                .help("Skip rows that collide with an existing primary key"),
        )
}

fn options(kind: PipelineKind, matches: &ArgMatches) -> LoadOptions {
    let mut options = LoadOptions::new(kind);
    if let Ok(Some(prefix)) = matches.try_get_one::<String>("prefix") {
        options.prefix = prefix.clone();
    }
    if let Ok(Some(table)) = matches.try_get_one::<String>("table") {
        options.table = Some(table.clone());
    }
    options.drop_existing = matches.get_flag("drop-existing");
    options.dry_run = matches.get_flag("dry-run");
    options.ignore_duplicates = matches.get_flag("ignore-duplicates");
    options
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("Timeline Loader")
        .version("1.0")
        .about("Flattens collected tweet and follower JSON files into Postgres tables")
        .subcommand_required(true)
        .subcommand(
            pipeline_command("tweets", "Load normalized tweet, user, entity and place tables")
                .arg(
                    Arg::new("prefix")
                        .long("prefix")
                        .value_name("PREFIX")
                        .help("Prepended to every table name"),
                ),
        )
        .subcommand(
            pipeline_command("timelines", "Load one wide timeline table").arg(
                Arg::new("table")
                    .long("table")
                    .value_name("NAME")
                    .default_value("Timelines"),
            ),
        )
        .subcommand(
            pipeline_command("followers", "Load follower edges and collection metadata").arg(
                Arg::new("table")
                    .long("table")
                    .value_name("NAME")
                    .default_value("Followers"),
            ),
        )
        .get_matches();

    let (kind, sub_matches) = match matches.subcommand() {
        Some(("tweets", m)) => (PipelineKind::Tweets, m),
        Some(("timelines", m)) => (PipelineKind::Timelines, m),
        Some(("followers", m)) => (PipelineKind::Followers, m),
        _ => anyhow::bail!("Please specify a valid subcommand"),
    };

    let options = options(kind, sub_matches);
    let config_path = sub_matches
        .get_one::<String>("config")
        .context("CONFIG is required")?;
    let input_dir = sub_matches
        .get_one::<String>("input")
        .context("INPUT_DIR is required")?;

    info!(config = %config_path, input = %input_dir, options = ?options, "Starting loader");

    match loader::run_loader_pipeline(config_path, Path::new(input_dir), &options).await {
        Ok(summary) => {
            for (file, reason) in &summary.skipped_files {
                info!(file = %file, reason = %reason, "Skipped");
            }
            info!(
                loaded = summary.loaded,
                skipped = summary.skipped_files.len(),
                rows = summary.total_rows(),
                "Done"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "Loader failed");
            Err(e).with_context(|| format!("Loading {} failed", input_dir))
        }
    }
}
