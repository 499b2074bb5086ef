//! EMR Insight - survey statistics for healthcare record-keeping
//!
//! A CLI tool that loads survey responses or facility registry records,
//! cross-tabulates them and writes reports with chart-ready series and
//! key insight narratives.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing input, bad config, malformed records, etc.)
//!   2 - No records loaded and --fail-on-empty was set

mod analysis;
mod cli;
mod config;
mod errors;
mod models;
mod report;
mod source;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat, RecordKind};
use config::{Config, CONFIG_FILE_NAME};
use models::{
    CompositeTable, CustomerInsight, Facility, FieldSource, NamedTable, Record, Report,
    ReportMetadata,
};
use source::{FileRecordSource, RecordSource, SourceConfig};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("EMR Insight v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .emr-insight.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize cross-tabulation pairs, tables, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete report workflow. Returns exit code (0 or 2).
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let input = args
        .input
        .clone()
        .context("An --input path is required")?;

    let mut config = load_config(&args, &input)?;
    config.merge_with_args(&args);

    let source = FileRecordSource::new(input.clone(), SourceConfig::from(&config.source))
        .with_progress(!args.quiet);

    if args.dry_run {
        return handle_dry_run(&source);
    }

    println!("📥 Loading {} records from: {}", args.kind.as_str(), input.display());

    let metadata = ReportMetadata {
        input: input.display().to_string(),
        record_kind: args.kind.as_str().to_string(),
        generated_at: Utc::now(),
        records_loaded: 0,
        duration_seconds: 0.0,
    };

    let mut report = match args.kind {
        RecordKind::Insight => {
            let records: Vec<CustomerInsight> = source.collect()?;
            build_report(&records, &config, args.kind, metadata)?
        }
        RecordKind::Facilities => {
            let records: Vec<Facility> = source.collect()?;
            build_report(&records, &config, args.kind, metadata)?
        }
        RecordKind::Generic => {
            let records: Vec<Record> = source.collect()?;
            build_report(&records, &config, args.kind, metadata)?
        }
    };

    let records_loaded = report.metadata.records_loaded;
    if records_loaded == 0 {
        warn!("No records found under {}", input.display());
    }

    report.metadata.duration_seconds = start_time.elapsed().as_secs_f64();

    // Generate and save the report
    println!("📝 Generating report...");
    let output_path = output_path(&args, &config);
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    print_summary(&report);
    println!("\n✅ Report saved to: {}", output_path.display());

    if args.fail_on_empty && records_loaded == 0 {
        eprintln!("\n⛔ No records were loaded. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Run the tabulations configured for a record kind.
fn build_report<R: FieldSource>(
    records: &[R],
    config: &Config,
    kind: RecordKind,
    mut metadata: ReportMetadata,
) -> Result<Report> {
    metadata.records_loaded = records.len();
    let mut report = Report::new(metadata);

    if matches!(kind, RecordKind::Insight | RecordKind::Generic) {
        let pairs = &config.insight.pairs;
        info!("Cross-tabulating {} field pairs", pairs.len());

        let bundle = analysis::build_insight_bundle(records, pairs)
            .context("Failed to build insight bundle")?;

        if config.report.include_insights {
            report.key_insights = analysis::key_insights(&bundle, pairs)
                .context("Failed to rank key insights")?;
        }
        report.bundle = Some(bundle);
    }

    if matches!(kind, RecordKind::Facilities | RecordKind::Generic) {
        for spec in &config.facilities.tables {
            let table = analysis::tabulate_field(records, &spec.field)
                .with_context(|| format!("Failed to tabulate '{}'", spec.label))?;
            debug!("{}: {} distinct values", spec.label, table.len());

            report.tables.push(NamedTable {
                label: spec.label.clone(),
                field: spec.field.clone(),
                table,
            });
        }

        for spec in &config.facilities.composites {
            let table =
                analysis::tabulate_composite(records, &spec.first, &spec.second, &spec.delimiter)
                    .with_context(|| format!("Failed to tabulate '{}'", spec.label))?;
            let rows = analysis::split_composite(&table, &spec.delimiter)
                .with_context(|| format!("Failed to pivot '{}'", spec.label))?;

            report.composites.push(CompositeTable {
                label: spec.label.clone(),
                fields: [spec.first.clone(), spec.second.clone()],
                delimiter: spec.delimiter.clone(),
                table,
                rows,
            });
        }
    }

    Ok(report)
}

/// Handle --dry-run: list record files, exit.
fn handle_dry_run(source: &FileRecordSource) -> Result<i32> {
    println!("\n🔍 Dry run: scanning record files...\n");

    let files = source.scan()?;

    if files.is_empty() {
        println!("   No matching record files found.");
    } else {
        println!("   Found {} files that would be read:\n", files.len());
        for file in &files {
            println!("     📄 {}", file.display());
        }
        println!("\n   Total: {} files", files.len());
    }

    println!("\n✅ Dry run complete. No reports were written.");
    Ok(0)
}

/// Print a console summary of the report.
fn print_summary(report: &Report) {
    println!("\n📊 Summary:");
    println!("   Records: {}", report.metadata.records_loaded);

    for table in &report.tables {
        println!("   {}: {} distinct values", table.label, table.table.len());
    }

    if let Some(ref bundle) = report.bundle {
        println!("   Cross tabulations: {}", bundle.len());
    }

    for insight in &report.key_insights {
        match insight.ranked {
            Some(ref ranked) => println!("   💡 {}", ranked.narrative),
            None => println!("   💡 {}: no data yet", insight.title),
        }
    }

    println!("   Duration: {:.2}s", report.metadata.duration_seconds);
}

/// Resolve the output path, switching the default extension for JSON.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    if let Some(ref output) = args.output {
        return output.clone();
    }

    let path = PathBuf::from(&config.general.output);
    match args.format {
        OutputFormat::Json => path.with_extension("json"),
        OutputFormat::Markdown => path,
    }
}

/// Load configuration from file or use defaults.
///
/// Lookup order: --config, the working directory, the input directory.
fn load_config(args: &Args, input: &Path) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    let input_dir = if input.is_dir() {
        Some(input)
    } else {
        input.parent().filter(|p| !p.as_os_str().is_empty())
    };

    let candidates = std::iter::once(Path::new(".")).chain(input_dir);
    for dir in candidates {
        if let Some(config) = Config::load_from_dir(dir)? {
            info!("Loaded config from {}", dir.join(CONFIG_FILE_NAME).display());
            return Ok(config);
        }
    }

    debug!("No config file found, using defaults");
    Ok(Config::default())
}
