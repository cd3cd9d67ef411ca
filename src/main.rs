//! Main module for the Embedding Atlas CLI application (atlas).
//!
//! Parses the command line, loads the configuration and hands off to the
//! command handlers in [`embedding_atlas::app`].
//!
//! # Examples
//!
//! Creating the config file and an empty article database:
//!
//! ```sh
//! atlas init
//! ```
//!
//! Drawing the map for a random sample, then searching it:
//!
//! ```sh
//! atlas map --sample 2000 --out map.html
//! atlas search "history of the printing press" -k 5
//! atlas interactive --sample 2000
//! ```

use clap::Parser;
use once_cell::sync::OnceCell;
use std::{error::Error, io, path::Path};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use embedding_atlas::{
    app,
    commands::{Cli, Commands},
    config::{self, AtlasConfig},
    config_dir,
    encoder::SentenceEmbeddingsModel,
    pretty::print_error,
    session::Session,
    vector_store::ArticleStore,
};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() {
    dotenvy::dotenv().ok();
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .init();
    });

    if let Err(e) = run() {
        let _ = print_error(&e.to_string(), &mut io::stderr());
        std::process::exit(1);
    }
}

/// Loads configuration, parses arguments and runs the selected command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the store cannot be
/// opened, the encoder cannot be loaded, or the command itself fails.
fn run() -> Result<(), Box<dyn Error>> {
    let Cli {
        config,
        database_url,
        model,
        command,
    } = Cli::parse();
    let config_path = match config {
        Some(path) => path,
        None => config_dir()?.join("config.yaml"),
    };

    if let Commands::Init { force } = command {
        debug!("Initializing configuration");
        app::init(&config_path, force)?;
        return Ok(());
    }

    let mut atlas_config = load(&config_path, database_url.is_some())?;
    atlas_config.apply_overrides(database_url, model);
    debug!("Config loaded: {:?}", atlas_config);

    let mut store = ArticleStore::open(&atlas_config.database_url)?;
    info!("Loading sentence encoder {}", atlas_config.model_id);
    let encoder = SentenceEmbeddingsModel::load(&atlas_config.model_id, &atlas_config.model_revision)?;
    let mut out = io::stdout();

    match command {
        Commands::Map { mut options } => {
            options.sample = options.sample.or(atlas_config.sample_size);
            let mut session = Session::new(store, encoder, atlas_config.layout);
            app::map(&mut session, &options, &mut out)?;
        }
        Commands::Search { query, k, mut options } => {
            options.sample = options.sample.or(atlas_config.sample_size);
            let k = k.unwrap_or(atlas_config.neighbors);
            let mut session = Session::new(store, encoder, atlas_config.layout);
            app::search(&mut session, &query, k, &options, &mut out)?;
        }
        Commands::Interactive { k, mut options } => {
            options.sample = options.sample.or(atlas_config.sample_size);
            let k = k.unwrap_or(atlas_config.neighbors);
            let mut session = Session::new(store, encoder, atlas_config.layout);
            app::interactive_mode(&mut session, k, &options, io::stdin().lock(), &mut out)?;
        }
        Commands::Ingest { file } => {
            let added = app::ingest(&mut store, &encoder, &file)?;
            info!("added {} articles", added);
        }
        Commands::Reembed => {
            let updated = app::reembed(&mut store, &encoder)?;
            info!("re-embedded {} articles", updated);
        }
        Commands::Init { .. } => {}
    }

    Ok(())
}

/// Read `config.yaml`, or fall back to defaults when only `--database-url` is given.
fn load(path: &Path, have_database: bool) -> Result<AtlasConfig, Box<dyn Error>> {
    if !path.exists() && have_database {
        debug!("no config at {}, using defaults", path.display());
        return Ok(AtlasConfig::with_database(String::new()));
    }
    debug!("Loading config from: {}", path.display());
    Ok(config::load_config(&path.to_string_lossy())?)
}
