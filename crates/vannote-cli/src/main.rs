//! VanNote command-line interface.
//!
//! Headless access to the annotation data layer. Every command prints JSON on
//! stdout; logs and errors go to stderr.

mod commands;
mod error;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vannote_core::presets::seed_presets_on_first_run;
use vannote_core::settings::{default_data_dir, SettingsManager};
use vannote_core::Storage;

use crate::error::{parse_key_value, parse_time};

#[derive(Debug, Parser)]
#[command(name = "vannote", version, about = "Annotate videos with timestamped notes")]
struct Cli {
    /// Directory holding settings.json and the stored entity lists
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage videos
    #[command(subcommand)]
    Video(VideoCommand),
    /// Manage annotations
    #[command(subcommand)]
    Annotation(AnnotationCommand),
    /// Manage collections and their members
    #[command(subcommand)]
    Collection(CollectionCommand),
    /// Manage metadata templates
    #[command(subcommand)]
    Template(TemplateCommand),
    /// Export one video or the whole dataset
    #[command(subcommand)]
    Export(ExportCommand),
    /// Import JSON documents
    #[command(subcommand)]
    Import(ImportCommand),
}

#[derive(Debug, Subcommand)]
enum VideoCommand {
    /// Register a streaming-platform video or a local file
    Add {
        /// Platform URL or bare video id
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        youtube: Option<String>,
        /// Local video file (hashed to identify it)
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Duration in seconds
        #[arg(long, value_parser = parse_time)]
        duration: Option<f64>,
    },
    List,
    /// Show a video with its collections and annotations
    Show { id: String },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_time)]
        duration: Option<f64>,
    },
    /// Delete a video with all its annotations and collections
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum AnnotationCommand {
    /// Add a point marker, or a segment when --end is given
    Add {
        #[arg(long)]
        video: String,
        #[arg(long)]
        title: String,
        /// Start time: seconds or a URL carrying `t=<seconds>`
        #[arg(long, value_parser = parse_time)]
        start: f64,
        #[arg(long, value_parser = parse_time)]
        end: Option<f64>,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        #[arg(long)]
        video: String,
        /// Only annotations outside every collection
        #[arg(long)]
        unassigned: bool,
        /// Only point markers without an end time
        #[arg(long, conflicts_with = "unassigned")]
        open: bool,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_time)]
        start: Option<f64>,
        #[arg(long, value_parser = parse_time, conflicts_with = "clear_end")]
        end: Option<f64>,
        /// Turn a segment back into a point marker
        #[arg(long)]
        clear_end: bool,
    },
    /// Set the end time of an open annotation
    End {
        id: String,
        #[arg(long, value_parser = parse_time)]
        at: f64,
    },
    Delete { id: String },
    /// Case-insensitive search over titles and descriptions
    Search {
        #[arg(long)]
        video: String,
        term: String,
    },
}

#[derive(Debug, Subcommand)]
enum CollectionCommand {
    Add {
        #[arg(long)]
        video: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Metadata entry as key=value (repeatable)
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
        /// Template to apply after creation
        #[arg(long)]
        template: Option<String>,
    },
    List {
        #[arg(long)]
        video: String,
    },
    /// Append an annotation to a collection
    Assign { collection: String, annotation: String },
    /// Remove an annotation from a collection
    Unassign { collection: String, annotation: String },
    /// Replace the member order
    Reorder {
        collection: String,
        #[arg(required = true)]
        annotations: Vec<String>,
    },
    ApplyTemplate { collection: String, template: String },
    /// Delete a collection; its members become unassigned
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum TemplateCommand {
    Add {
        #[arg(long)]
        name: String,
        /// Metadata key (repeatable)
        #[arg(long = "key")]
        keys: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    Delete { id: String },
    /// Create the built-in templates that do not exist yet
    SeedPresets,
}

#[derive(Debug, Subcommand)]
enum ExportCommand {
    Json(ExportArgs),
    Csv(ExportArgs),
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// Export a single video instead of the whole dataset
    #[arg(long)]
    video: Option<String>,
    /// Output file, or a directory to receive the default file name
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum ImportCommand {
    /// Merge a whole-dataset export
    Dataset { file: PathBuf },
    /// Add annotations to one video
    Annotations {
        file: PathBuf,
        #[arg(long)]
        video: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let manager = SettingsManager::new(&data_dir);
    let settings = manager.load();
    let storage = Storage::from_settings(&settings.storage, &data_dir)
        .with_context(|| format!("Failed to open storage in {}", data_dir.display()))?;

    // Imports bring their own templates; `template seed-presets` seeds on demand.
    if !matches!(cli.command, Command::Import(_)) {
        match seed_presets_on_first_run(&storage, &manager).await {
            Ok(created) => debug!("Seeded {} preset template(s)", created),
            Err(e) => warn!("Skipping preset templates: {}", e),
        }
    }

    let app = commands::App {
        storage,
        pretty_json: settings.export.pretty_json,
    };

    match cli.command {
        Command::Video(cmd) => commands::video(&app, cmd).await,
        Command::Annotation(cmd) => commands::annotation(&app, cmd).await,
        Command::Collection(cmd) => commands::collection(&app, cmd).await,
        Command::Template(cmd) => commands::template(&app, cmd).await,
        Command::Export(cmd) => commands::export(&app, cmd).await,
        Command::Import(cmd) => commands::import(&app, cmd).await,
    }
}
