mod cli;
mod config;
mod domain;
mod error;
mod infra;
#[cfg(test)]
mod testing;
mod workflows;

use anyhow::{anyhow, bail, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use rustyline::DefaultEditor;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Command};
use config::Settings;
use domain::models::{SeriesDetail, SeriesRef, SeriesSummary};
use infra::apibay::ApiBaySearch;
use infra::cache::MetadataCache;
use infra::fs::LocalFileSystem;
use infra::transmission::TransmissionClient;
use infra::tvdb::TvdbClient;
use infra::{MetadataProvider, TorrentClient};
use workflows::batch;
use workflows::downloads::Downloads;
use workflows::library::LibraryCataloger;
use workflows::status::StatusResolver;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let settings_path = cli.settings.clone().unwrap_or_else(config::get_settings_path);

    if let Command::Init = cli.command {
        init_logging(cli.verbose);
        Settings::create_default(&settings_path)?;
        println!("Created default settings at {}", settings_path.display());
        return Ok(());
    }

    // Saved as-is by commands that persist; CLI overrides only apply to this run.
    let stored = Settings::load(&settings_path)?;
    init_logging(cli.verbose || stored.verbose);
    let cache_path = config::get_cache_path(&settings_path);

    match cli.command {
        Command::Init => Ok(()),
        Command::Set { key, value } => {
            let updated = stored.with_value(&key, &value)?;
            updated.save(&settings_path)?;
            println!("{key} = {value}");
            Ok(())
        }
        Command::AddSeries { title, first } => {
            add_series(stored, &settings_path, &cache_path, &title, first)
        }
        Command::RemoveSeries { id } => {
            let mut settings = stored;
            if !settings.remove_series(&id) {
                bail!("No subscribed series with id {id}");
            }
            settings.save(&settings_path)?;
            let mut cache = MetadataCache::load(&cache_path);
            cache.remove_series(&id);
            cache.save()?;
            println!("Removed series {id}");
            Ok(())
        }
        Command::List => {
            for series in &stored.series {
                println!("{:>8}  {}", series.id, series.name);
            }
            Ok(())
        }
        Command::Refresh => refresh(&stored, &cache_path),
        command => {
            let mut settings = stored;
            settings.verbose |= cli.verbose;
            settings.dry_run |= cli.dry_run;
            run_episode_command(command, &settings, &cache_path)
        }
    }
}

/// Commands that look at episodes on disk and at the collaborators.
fn run_episode_command(command: Command, settings: &Settings, cache_path: &Path) -> Result<()> {
    let today = Local::now().date_naive();
    let disk = LocalFileSystem::new(settings.dry_run, settings.verbose);
    let transmission = settings.transmission.as_ref().map(TransmissionClient::new);
    let torrent_client = transmission.as_ref().map(|c| c as &dyn TorrentClient);
    let library = LibraryCataloger::new(settings, &disk);
    let downloads = Downloads::new(settings, &disk, torrent_client);

    match command {
        Command::Catalog {
            file: Some(file), ..
        } => {
            if !file.exists() {
                bail!("Input path does not exist: {file:?}");
            }
            let action = batch::catalog_file(settings, &library, &file)?;
            println!("{}: {action}", file.display());
        }
        Command::Catalog { file: None, series } => {
            let selected = match series.as_deref() {
                Some(id) => settings.select_series(Some(id))?.into_iter().next(),
                None => None,
            };
            let report = batch::catalog_downloads(&downloads, &library, selected.as_ref())?;
            report.print();
        }
        Command::Status { series, tolerant } => {
            let magnets = ApiBaySearch::new(settings.high_def);
            let resolver =
                StatusResolver::new(&library, &downloads, &magnets, today).tolerant(tolerant);
            let mut report = batch::BatchReport::default();
            for (series, detail) in subscribed_details(settings, cache_path, series.as_deref())? {
                let resolution = resolver.resolve_series(&series, &detail.episodes)?;
                batch::print_statuses(&resolution.records);
                report.failures.extend(resolution.failures);
            }
            report.print();
        }
        Command::DownloadMissing { series, tolerant } => {
            let magnets = ApiBaySearch::new(settings.high_def);
            let resolver =
                StatusResolver::new(&library, &downloads, &magnets, today).tolerant(tolerant);
            let details = subscribed_details(settings, cache_path, series.as_deref())?;
            let resolution = batch::resolve_all(
                &resolver,
                details.iter().map(|(s, d)| (s, d.episodes.as_slice())),
            )?;
            let mut report = batch::download_missing(settings, &downloads, &resolution.records);
            report.failures.extend(resolution.failures);
            report.print();
        }
        Command::Init
        | Command::Set { .. }
        | Command::AddSeries { .. }
        | Command::RemoveSeries { .. }
        | Command::List
        | Command::Refresh => {}
    }
    Ok(())
}

fn metadata_provider(settings: &Settings) -> Result<TvdbClient> {
    Ok(TvdbClient::new(settings.tvdb_api_key()?))
}

/// Cached episode lists for the selected subscriptions, fetching any that
/// are missing. The API key is only needed when something must be fetched.
fn subscribed_details(
    settings: &Settings,
    cache_path: &Path,
    series_id: Option<&str>,
) -> Result<Vec<(SeriesRef, SeriesDetail)>> {
    let mut cache = MetadataCache::load(cache_path);
    let mut provider: Option<TvdbClient> = None;
    let mut fetched = false;
    let mut details = Vec::new();

    for series in settings.select_series(series_id)? {
        if cache.get_series(&series.id).is_none() {
            if provider.is_none() {
                provider = Some(metadata_provider(settings)?);
            }
            if let Some(provider) = provider.as_ref() {
                cache.series_or_fetch(provider, &series.id)?;
                fetched = true;
            }
        }
        let detail = cache
            .get_series(&series.id)
            .cloned()
            .ok_or_else(|| anyhow!("No episode metadata for {}", series.name))?;
        details.push((series, detail));
    }

    if fetched {
        cache.save()?;
    }
    Ok(details)
}

fn add_series(
    mut settings: Settings,
    settings_path: &Path,
    cache_path: &Path,
    title: &str,
    first: bool,
) -> Result<()> {
    let provider = metadata_provider(&settings)?;
    let results = provider.find_series(title)?;

    if results.is_empty() {
        bail!("No shows found matching '{title}'");
    }
    let chosen = if first || results.len() == 1 {
        &results[0]
    } else {
        choose_series(&results)?
    };

    let detail = provider.get_series_by_id(&chosen.id)?;
    println!(
        "Adding {} (ID: {}) with {} episode(s)",
        detail.name,
        detail.id,
        detail.episodes.len()
    );
    settings.add_series(detail.series_ref());
    settings.save(settings_path)?;

    let mut cache = MetadataCache::load(cache_path);
    cache.set_series(detail);
    cache.save()?;
    Ok(())
}

fn choose_series(results: &[SeriesSummary]) -> Result<&SeriesSummary> {
    println!("Multiple shows found. Please select one:");
    for (i, result) in results.iter().enumerate() {
        let aired = result
            .first_aired
            .map(|d: NaiveDate| d.to_string())
            .unwrap_or_default();
        println!("  {}: {} ({}) (ID: {})", i + 1, result.name, aired, result.id);
    }

    let mut rl = DefaultEditor::new()?;
    let input = rl.readline(&format!("Enter number (1-{}): ", results.len()))?;
    let choice: usize = input
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid selection"))?;

    if choice < 1 || choice > results.len() {
        bail!("Invalid selection");
    }

    Ok(&results[choice - 1])
}

fn refresh(settings: &Settings, cache_path: &Path) -> Result<()> {
    let provider = metadata_provider(settings)?;
    let mut cache = MetadataCache::load(cache_path);
    let today = Local::now().date_naive();

    for series in &settings.series {
        match cache.refresh_series(&provider, &series.id, today) {
            Ok(true) => println!("Refreshed {}", series.name),
            Ok(false) => println!("{} is up to date", series.name),
            Err(e) => eprintln!("Error refreshing {}: {e}", series.name),
        }
    }

    cache.save()?;
    Ok(())
}
