//! # App Module
//!
//! Runs the CLI commands on top of a [`Session`].
//!
//! Each function here is one user action: draw the map, answer a query, run
//! the interactive loop, or rewrite the store (`ingest`, `reembed`). Failures
//! end the current action only; in interactive mode the loop keeps going and
//! the user simply tries again.
//!
//! Output goes to a caller-supplied `Write`, and interactive input comes from
//! any `BufRead`, so the whole flow runs in tests against in-memory buffers.

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    error::Error,
    fs,
    io::{BufRead, Write},
    path::Path,
};
use tracing::{debug, info, warn};

use crate::commands::MapOptions;
use crate::config::{AtlasConfig, write_config};
use crate::encoder::TextEncoder;
use crate::error::AtlasError;
use crate::plot::Scene;
use crate::pretty::{print_error, print_ranked, print_scene, print_title, print_warning};
use crate::session::{FetchKey, Prepared, QueryResult, Session};
use crate::vector_store::ArticleStore;

const DEFAULT_MAP_SIZE: (usize, usize) = (100, 30);
const PROGRESS_LOG_EVERY: usize = 100;

/// Map size that fits the current terminal.
fn map_size() -> (usize, usize) {
    crossterm::terminal::size()
        .map(|(w, h)| ((w as usize).saturating_sub(2).max(20), (h as usize / 2).max(10)))
        .unwrap_or(DEFAULT_MAP_SIZE)
}

/// Draw the prepared map, with `result` overlaid when given, and export it if asked.
fn render<W: Write>(
    prepared: &Prepared,
    result: Option<&QueryResult>,
    options: &MapOptions,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let mut scene = Scene::from_layout(&prepared.layout, &prepared.corpus.titles());
    if let Some(result) = result {
        scene = scene.with_result(result);
    }

    if !options.no_map {
        let (w, h) = map_size();
        print_title(
            &format!("Article Vector Space ({} articles)", prepared.corpus.len()),
            out,
        )?;
        print_scene(&scene, w, h, out)?;
    }
    if let Some(result) = result {
        print_ranked(result, out)?;
    }
    if let Some(path) = &options.out {
        scene.export(path)?;
    }
    Ok(())
}

/// Report a pipeline error: warnings for recoverable states, errors otherwise.
fn report<W: Write>(err: &AtlasError, out: &mut W) -> Result<(), Box<dyn Error>> {
    match err {
        AtlasError::EmptyCorpus => print_warning(
            "No data found in the database. Please make sure the 'articles' table is populated.",
            out,
        ),
        AtlasError::BlankQuery => print_warning("Please enter a search query.", out),
        other => print_error(&other.to_string(), out),
    }
}

/// `atlas map`: fetch, fit and draw the corpus.
pub fn map<E: TextEncoder, W: Write>(
    session: &mut Session<E>,
    options: &MapOptions,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    match session.prepare(FetchKey::new(options.sample)) {
        Ok(prepared) => render(&prepared, None, options, out),
        Err(e) if e.is_warning() => report(&e, out),
        Err(e) => Err(e.into()),
    }
}

/// `atlas search`: one query, drawn on the map with its ranked neighbours.
pub fn search<E: TextEncoder, W: Write>(
    session: &mut Session<E>,
    query: &str,
    k: usize,
    options: &MapOptions,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let key = FetchKey::new(options.sample);
    match session.search(key, query, k) {
        Ok(result) => {
            let prepared = session.prepare(key)?;
            render(&prepared, Some(&result), options, out)
        }
        Err(e) if e.is_warning() => report(&e, out),
        Err(e) => Err(e.into()),
    }
}

/// Enters interactive search mode.
///
/// The map is fitted once up front and then reused for every query. Lines read
/// from `input`:
/// - `exit` / `quit` leaves the loop,
/// - `:sample N` or `:sample all` switches to another (cached) map,
/// - anything else is a query; blank lines only print a warning.
pub fn interactive_mode<E: TextEncoder, R: BufRead, W: Write>(
    session: &mut Session<E>,
    k: usize,
    options: &MapOptions,
    mut input: R,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let mut key = FetchKey::new(options.sample);

    match session.prepare(key) {
        Ok(prepared) => render(&prepared, None, options, out)?,
        Err(e) if e.is_warning() => return report(&e, out),
        Err(e) => return Err(e.into()),
    }

    loop {
        write!(out, "\nQuery: ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        if matches!(line.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        if let Some(arg) = line.strip_prefix(":sample") {
            match parse_sample(arg.trim()) {
                Some(limit) => {
                    let next = FetchKey::new(limit);
                    match session.prepare(next) {
                        Ok(prepared) => {
                            debug!(?next, "switched map");
                            key = next;
                            render(&prepared, None, options, out)?;
                        }
                        // a failed switch keeps the current map
                        Err(e) => report(&e, out)?,
                    }
                }
                None => print_warning("usage: :sample <N> | :sample all", out)?,
            }
            continue;
        }

        match session.search(key, line, k) {
            Ok(result) => {
                let prepared = session.prepare(key)?;
                render(&prepared, Some(&result), options, out)?;
            }
            Err(e) => report(&e, out)?,
        }
    }

    Ok(())
}

fn parse_sample(arg: &str) -> Option<Option<usize>> {
    if arg.eq_ignore_ascii_case("all") {
        return Some(None);
    }
    arg.parse::<usize>().ok().filter(|n| *n > 0).map(Some)
}

fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(message);
    bar
}

/// `atlas ingest`: embed each non-empty line of `file` and store it.
///
/// The encoder must produce vectors of the dimension already in the store.
/// All titles are encoded first and then inserted in one transaction, so a
/// failure leaves the table untouched.
pub fn ingest<E: TextEncoder>(
    store: &mut ArticleStore,
    encoder: &E,
    file: &Path,
) -> Result<usize, Box<dyn Error>> {
    let expected = encoder.dimension();
    if let Some(found) = store.dimension()? {
        if found != expected {
            return Err(AtlasError::DimensionMismatch { expected, found }.into());
        }
    }

    let content = fs::read_to_string(file)?;
    let titles: Vec<&str> = content.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    info!("ingesting {} titles from {}", titles.len(), file.display());

    let bar = progress_bar(titles.len(), "Embedding");
    let mut rows = Vec::with_capacity(titles.len());
    for title in &titles {
        let vector = encoder.encode(title)?;
        if vector.len() != expected {
            return Err(AtlasError::DimensionMismatch {
                expected,
                found: vector.len(),
            }
            .into());
        }
        rows.push((title.to_string(), vector));
        bar.inc(1);
    }
    bar.finish_and_clear();

    store.insert_articles(&rows)?;
    let total = store.count()?;
    info!("{} now holds {} articles", store.url(), total);

    Ok(rows.len())
}

/// `atlas reembed`: re-encode every stored title and rewrite the vectors in one transaction.
///
/// Run this after switching `model_id`, so stored vectors and queries share
/// one embedding space again.
pub fn reembed<E: TextEncoder>(store: &mut ArticleStore, encoder: &E) -> Result<usize, Box<dyn Error>> {
    let titles = store.titles()?;
    info!("Found {} articles to process.", titles.len());
    if titles.is_empty() {
        warn!("nothing to re-embed");
        return Ok(0);
    }

    let bar = progress_bar(titles.len(), "Embedding");
    let mut updates = Vec::with_capacity(titles.len());
    for (id, title) in &titles {
        updates.push((*id, encoder.encode(title)?));
        bar.inc(1);
    }
    bar.finish_and_clear();

    info!(
        "Generating {}-dimension embeddings done; updating database records",
        encoder.dimension()
    );
    let total = updates.len();
    let updated = store.update_vectors(&updates, |done| {
        if done % PROGRESS_LOG_EVERY == 0 {
            info!("Updated {}/{} articles...", done, total);
        }
    })?;
    info!("All articles now have {}-dimension vectors.", encoder.dimension());
    Ok(updated)
}

/// `atlas init`: write the default config (unless present) and create the database.
pub fn init(config_path: &Path, force: bool) -> Result<AtlasConfig, Box<dyn Error>> {
    let config = if config_path.exists() && !force {
        info!("keeping existing config {}", config_path.display());
        crate::config::load_config(&config_path.to_string_lossy())?
    } else {
        let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        let config = AtlasConfig::with_database(dir.join("atlas.db").to_string_lossy());
        info!("Creating config file: {}", config_path.display());
        write_config(config_path, &config)?;
        config
    };

    ArticleStore::create(&config.database_url)?;
    info!("database ready at {}", config.database_url);
    Ok(config)
}
