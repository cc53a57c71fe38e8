use alnproj_core::model::Workspace;
use alnproj_core::{copy_view, load_project, save_project, ArchiveSource, HeadlessHost, LoadReport};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

mod config;
mod error;

use config::Config;
use error::{format_error_with_suggestions, CliError};

#[derive(Parser)]
#[command(name = "alnproj")]
#[command(about = "alnproj - inspect and rewrite alignment project archives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to ./alnproj.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries and summarise the project held in an archive
    Inspect {
        archive: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load an archive and write all of its views to a new one
    Resave { input: PathBuf, output: PathBuf },

    /// Copy one archive entry out
    Extract {
        archive: PathBuf,

        /// Entry name as listed by `inspect`
        entry: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Duplicate a view as a new view over the same dataset and re-save
    CopyView {
        input: PathBuf,
        output: PathBuf,

        /// Title of the view to duplicate
        #[arg(long)]
        view: String,

        /// Title for the new view
        #[arg(long)]
        title: Option<String>,
    },
}

fn main() {
    if let Err(e) = run() {
        match e.downcast_ref::<CliError>() {
            Some(cli_error) => eprintln!("Error: {}", format_error_with_suggestions(cli_error)),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let log_level = if cli.verbose { "debug" } else { config.general.log_level.as_str() };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Inspect { archive, json } => cmd_inspect(&config, &archive, json),
        Commands::Resave { input, output } => cmd_resave(&config, &input, &output),
        Commands::Extract { archive, entry, output } => cmd_extract(&archive, &entry, output.as_deref()),
        Commands::CopyView {
            input,
            output,
            view,
            title,
        } => cmd_copy_view(&config, &input, &output, &view, title.as_deref()),
    }
}

#[derive(Debug, Serialize)]
struct ViewSummary {
    title: String,
    sequence_set_id: String,
    view_id: String,
    rows: usize,
    annotations: usize,
    groups: usize,
}

#[derive(Debug, Serialize)]
struct Summary {
    entries: Vec<String>,
    documents: usize,
    skipped: usize,
    views: Vec<ViewSummary>,
    datasets: usize,
    sequences: usize,
    viewers: usize,
    references_resolved: usize,
    references_unresolved: usize,
    references_failed: usize,
    error_message: Option<String>,
}

fn summarise(entries: Vec<String>, ws: &Workspace, report: &LoadReport) -> Summary {
    let views = report
        .views
        .iter()
        .filter_map(|v| ws.views.get(*v))
        .map(|v| ViewSummary {
            title: v.title.clone(),
            sequence_set_id: v.sequence_set_id.clone(),
            view_id: v.view_id.clone(),
            rows: v.alignment.sequences.len(),
            annotations: v.alignment.annotations.len(),
            groups: v.alignment.groups.len(),
        })
        .collect();
    Summary {
        entries,
        documents: report.documents,
        skipped: report.skipped,
        views,
        datasets: report.datasets.len(),
        sequences: ws.sequences.len(),
        viewers: ws.viewers.len(),
        references_resolved: report.resolution.resolved,
        references_unresolved: report.resolution.unresolved,
        references_failed: report.resolution.failed,
        error_message: report.error_message.clone(),
    }
}

fn require_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()).into());
    }
    Ok(())
}

fn load_fresh(config: &Config, path: &Path) -> Result<(Workspace, HeadlessHost, LoadReport)> {
    require_file(path)?;
    let mut ws = Workspace::new();
    let mut host = HeadlessHost::new();
    let report = load_project(&mut ws, &mut host, path, &config.load)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    if let Some(message) = &report.error_message {
        log::warn!("Problems while loading {}:\n{}", path.display(), message);
    }
    Ok((ws, host, report))
}

fn cmd_inspect(config: &Config, archive: &Path, json: bool) -> Result<()> {
    require_file(archive)?;
    let entries = ArchiveSource::open(archive)
        .and_then(|mut source| source.entry_names())
        .map_err(CliError::from)?;
    let (ws, _host, report) = load_fresh(config, archive)?;
    let summary = summarise(entries, &ws, &report);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Archive: {}", archive.display());
    println!("Entries: {}", summary.entries.len());
    for entry in &summary.entries {
        println!("  {}", entry);
    }
    println!("Documents: {} loaded, {} skipped", summary.documents, summary.skipped);
    println!("Views: {}", summary.views.len());
    for view in &summary.views {
        println!(
            "  {} [{} / {}]: {} rows, {} annotations, {} groups",
            view.title, view.sequence_set_id, view.view_id, view.rows, view.annotations, view.groups
        );
    }
    println!("Datasets: {}", summary.datasets);
    println!("Sequences: {}", summary.sequences);
    println!("Viewers: {}", summary.viewers);
    println!(
        "References: {} resolved, {} unresolved, {} failed",
        summary.references_resolved, summary.references_unresolved, summary.references_failed
    );
    if let Some(message) = &summary.error_message {
        println!("Problems:\n{}", message);
    }
    Ok(())
}

fn cmd_resave(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let (ws, mut host, _report) = load_fresh(config, input)?;
    let report = save_project(&ws, &mut host, output, &config.write)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    if let Some(message) = report.error_message {
        return Err(CliError::archive(message).into());
    }
    log::info!("Wrote {} entries to {}", report.entries.len(), output.display());
    Ok(())
}

fn cmd_extract(archive: &Path, entry: &str, output: Option<&Path>) -> Result<()> {
    require_file(archive)?;
    let mut source = ArchiveSource::open(archive).map_err(CliError::from)?;
    if !source.contains(entry) {
        return Err(CliError::missing_entry(archive.to_path_buf(), entry).into());
    }
    let bytes = source.read_entry(entry).map_err(CliError::from)?;

    match output {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Extracted {} ({} bytes) to {}", entry, bytes.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn cmd_copy_view(config: &Config, input: &Path, output: &Path, view: &str, title: Option<&str>) -> Result<()> {
    let (mut ws, mut host, _report) = load_fresh(config, input)?;
    let original = ws.find_view_by_title(view).ok_or_else(|| CliError::view_not_found(view))?;
    let copy = copy_view(&mut ws, &mut host, original, title).map_err(CliError::from)?;
    if let Some(v) = ws.views.get(copy) {
        log::info!("Created view '{}' from '{}'", v.title, view);
    }

    let report = save_project(&ws, &mut host, output, &config.write)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    if let Some(message) = report.error_message {
        return Err(CliError::archive(message).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alnproj_core::model::{Alignment, Sequence, View};
    use alnproj_core::WriteOptions;
    use tempfile::{NamedTempFile, TempDir};

    fn sample_archive() -> NamedTempFile {
        let mut ws = Workspace::new();
        let a = ws.add_sequence(Sequence::new("a", "AC-GT"));
        let b = ws.add_sequence(Sequence::new("b", "ACCGT"));
        let dataset = ws.create_dataset(&[a, b]);
        ws.add_view(View::new("sample.fa", "set1", Alignment::new(vec![a, b]).with_dataset(dataset)));

        let file = NamedTempFile::new().expect("temp archive");
        let mut host = HeadlessHost::new();
        save_project(&ws, &mut host, file.path(), &WriteOptions::default()).expect("save sample");
        file
    }

    #[test]
    fn test_cli_parses_copy_view() {
        let cli = Cli::try_parse_from(["alnproj", "-v", "copy-view", "in.zip", "out.zip", "--view", "first"])
            .expect("parse");
        assert!(cli.verbose);
        match cli.command {
            Commands::CopyView { view, title, .. } => {
                assert_eq!(view, "first");
                assert_eq!(title, None);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_summary_counts() -> Result<()> {
        let archive = sample_archive();
        let config = Config::default();
        let (ws, _host, report) = load_fresh(&config, archive.path())?;
        let entries = ArchiveSource::open(archive.path())?.entry_names()?;
        let summary = summarise(entries, &ws, &report);

        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.views.len(), 1);
        assert_eq!(summary.views[0].rows, 2);
        assert_eq!(summary.datasets, 1);
        assert_eq!(summary.error_message, None);
        Ok(())
    }

    #[test]
    fn test_resave_and_copy_view() -> Result<()> {
        let archive = sample_archive();
        let dir = TempDir::new()?;
        let config = Config::default();

        let resaved = dir.path().join("resaved.zip");
        cmd_resave(&config, archive.path(), &resaved)?;
        let copied = dir.path().join("copied.zip");
        cmd_copy_view(&config, &resaved, &copied, "sample.fa", Some("second look"))?;

        let (ws, _host, report) = load_fresh(&config, &copied)?;
        assert_eq!(report.views.len(), 2);
        assert!(ws.find_view_by_title("second look").is_some());
        Ok(())
    }

    #[test]
    fn test_extract_missing_entry() {
        let archive = sample_archive();
        let err = cmd_extract(archive.path(), "absent.xml", None).expect_err("missing entry");
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::MissingEntry { .. })));
    }

    #[test]
    fn test_extract_to_file() -> Result<()> {
        let archive = sample_archive();
        let out = NamedTempFile::new()?;
        cmd_extract(archive.path(), "sample.fa.xml", Some(out.path()))?;
        let text = std::fs::read_to_string(out.path())?;
        assert!(text.contains("sample.fa"));
        Ok(())
    }
}
