use analytics::{AnalyticsLibrary, DatabaseReport, Distribution};
use anyhow::Context;
use cache::CacheStore;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use configuration::{Settings, load_config};
use core_types::{Limit, Params, RaceDate, ResultTable, Year, YearRange};
use database::PgExecutor;
use features::{Extractor, FeatureExtractor, extract_cached, to_dataframe, write_parquet};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// The main entry point for the keiba statistics tool.
fn main() -> anyhow::Result<()> {
    // A missing .env is fine; settings also come from config.toml and KEIBA__* variables.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = configuration::logging::init(&settings.logging).context("Failed to initialise logging")?;

    let cache = CacheStore::new(&settings.cache.dir);
    if let Commands::Cache(CacheArgs {
        command: CacheCommands::List,
    }) = cli.command
    {
        // Listing the cache needs no database connection.
        return print_output(cli.format, &cache.entries()?, |entries| {
            let mut table = new_table(&["key", "analysis", "size_bytes", "modified"]);
            for entry in entries {
                table.add_row(vec![
                    entry.key.clone(),
                    entry.analysis.clone(),
                    entry.size_bytes.to_string(),
                    entry.modified.map(|m| m.to_rfc3339()).unwrap_or_default(),
                ]);
            }
            table.to_string()
        });
    }

    let executor = PgExecutor::connect(&settings.database).context("Failed to connect to the database")?;
    let library = AnalyticsLibrary::new(executor, cache).with_force_refresh(cli.refresh);

    match cli.command {
        Commands::Schema(args) => handle_schema(&library, args, cli.format),
        Commands::Races(args) => handle_races(&library, &settings, args, cli.format),
        Commands::Jockey(args) => handle_jockey(&library, &settings, args, cli.format),
        Commands::Sire(args) => handle_sire(&library, &settings, args, cli.format),
        Commands::Horse(args) => handle_horse(&library, args, cli.format),
        Commands::Features(args) => handle_features(&library, &settings, args, cli.format),
        Commands::Cache(_) => Ok(()),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Analytical queries over the JV-Data horse-racing database.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./config.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ignore cached results and query the database again.
    #[arg(long, global = true)]
    refresh: bool,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the structure of every table, with sample rows.
    Schema(SchemaArgs),
    /// Run the race distribution analyses over a span of years.
    Races(YearArgs),
    /// Win rate and ROI of a jockey per venue, surface and distance band.
    Jockey(JockeyArgs),
    /// Offspring performance of sires per surface and track condition.
    Sire(SireArgs),
    /// Past starts of one horse.
    Horse(HorseArgs),
    /// Build a feature table from race and entrant data.
    Features(FeatureArgs),
    /// Inspect the on-disk result cache.
    Cache(CacheArgs),
}

#[derive(Parser)]
struct SchemaArgs {
    /// Sample rows shown per table.
    #[arg(long, default_value = "5")]
    sample: Limit,
}

#[derive(Parser)]
struct YearArgs {
    /// First meeting year (defaults to analysis.start_year).
    #[arg(long)]
    from: Option<Year>,

    /// Last meeting year, inclusive (defaults to analysis.end_year).
    #[arg(long)]
    to: Option<Year>,
}

#[derive(Parser)]
struct JockeyArgs {
    /// Five-character jockey code, e.g. "01126".
    code: String,

    /// How many years back to look.
    #[arg(long)]
    years: Option<u16>,

    #[arg(long)]
    min_races: Option<u32>,

    /// Year the window ends in. Defaults to the current year.
    #[arg(long)]
    reference_year: Option<Year>,
}

#[derive(Parser)]
struct SireArgs {
    /// Restrict to one sire's breeding registration number.
    #[arg(long)]
    sire: Option<String>,

    #[arg(long)]
    min_horses: Option<u32>,

    #[arg(long)]
    min_races: Option<u32>,
}

#[derive(Parser)]
struct HorseArgs {
    /// Ten-digit pedigree registration number (ketto_toroku_bango).
    horse_id: String,

    /// Only starts before this race day (format: YYYYMMDD).
    #[arg(long)]
    before: Option<RaceDate>,
}

#[derive(Parser)]
struct FeatureArgs {
    /// One of: entity_keys, odds, body_weight.
    #[arg(long, default_value = "odds")]
    extractor: String,

    #[command(flatten)]
    years: YearArgs,

    /// Cap on races and entrant rows loaded.
    #[arg(long)]
    limit: Option<Limit>,

    /// Also write the features to this parquet file.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommands,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached results.
    List,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_schema(
    library: &AnalyticsLibrary<PgExecutor>,
    args: SchemaArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = library
        .database_report(args.sample)
        .context("Failed to inspect the database")?;
    print_output(format, &report, render_report)
}

fn handle_races(
    library: &AnalyticsLibrary<PgExecutor>,
    settings: &Settings,
    args: YearArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let range = year_range(settings, &args)?;

    let progress_bar = ProgressBar::new(Distribution::ALL.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut results = Vec::with_capacity(Distribution::ALL.len());
    for kind in Distribution::ALL {
        progress_bar.set_message(kind.name());
        let table = library
            .distribution(kind, range)
            .with_context(|| format!("Failed to run {}", kind.name()))?;
        results.push(NamedTable {
            name: kind.name(),
            table,
        });
        progress_bar.inc(1);
    }
    progress_bar.finish_with_message("Distributions complete");

    print_output(format, &results, |results| {
        results
            .iter()
            .map(|r| format!("{}\n{}", r.name, render_table(&r.table)))
            .collect::<Vec<_>>()
            .join("\n\n")
    })
}

fn handle_jockey(
    library: &AnalyticsLibrary<PgExecutor>,
    settings: &Settings,
    args: JockeyArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let table = library
        .jockey_course_stats(
            &args.code,
            args.years.unwrap_or(settings.analysis.years_range),
            args.min_races.unwrap_or(settings.analysis.jockey_min_races),
            args.reference_year,
        )
        .with_context(|| format!("Failed to load course stats for jockey {}", args.code))?;
    print_output(format, &table, render_table)
}

fn handle_sire(
    library: &AnalyticsLibrary<PgExecutor>,
    settings: &Settings,
    args: SireArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let table = library
        .sire_condition_stats(
            args.sire.as_deref(),
            args.min_horses.unwrap_or(settings.analysis.sire_min_horses),
            args.min_races.unwrap_or(settings.analysis.sire_min_races),
        )
        .context("Failed to load sire condition stats")?;
    print_output(format, &table, render_table)
}

fn handle_horse(
    library: &AnalyticsLibrary<PgExecutor>,
    args: HorseArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let table = library
        .horse_history(&args.horse_id, args.before)
        .with_context(|| format!("Failed to load history for horse {}", args.horse_id))?;
    print_output(format, &table, render_table)
}

fn handle_features(
    library: &AnalyticsLibrary<PgExecutor>,
    settings: &Settings,
    args: FeatureArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let extractor: Extractor = args.extractor.parse()?;
    let range = year_range(settings, &args.years)?;

    let races = library
        .race_base(range, args.limit)
        .context("Failed to load races")?;
    let entries = library
        .race_entries(range, args.limit)
        .context("Failed to load race entries")?;

    let mut inputs = Params::new()
        .with("start_year", range.start().as_param())
        .with("end_year", range.end().as_param());
    if let Some(limit) = args.limit {
        inputs.insert("limit", limit.get());
    }
    let table = extract_cached(
        &extractor,
        library.cache(),
        &inputs,
        library.force_refresh(),
        &races,
        &entries,
    )
    .with_context(|| format!("Failed to extract {} features", extractor.name()))?;
    info!(extractor = extractor.name(), rows = table.len(), "Features ready");

    if let Some(path) = &args.output {
        let mut frame = to_dataframe(&table)?;
        write_parquet(&mut frame, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), shape = ?frame.shape(), "Wrote parquet file");
    }
    print_output(format, &table, render_table)
}

// ==============================================================================
// Output
// ==============================================================================

#[derive(Serialize)]
struct NamedTable {
    name: &'static str,
    table: ResultTable,
}

fn year_range(settings: &Settings, args: &YearArgs) -> anyhow::Result<YearRange> {
    let defaults = settings.analysis.year_range()?;
    let range = YearRange::new(
        args.from.unwrap_or(defaults.start()),
        args.to.unwrap_or(defaults.end()),
    )?;
    Ok(range)
}

/// Prints `value` as pretty JSON, or through `render` for the table format.
fn print_output<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    render: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => println!("{}", render(value)),
    }
    Ok(())
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn render_table(result: &ResultTable) -> String {
    if result.is_empty() {
        return "(no rows)".to_string();
    }
    let header: Vec<&str> = result.columns().iter().map(String::as_str).collect();
    let mut table = new_table(&header);
    for row in result.iter() {
        table.add_row(row.values().iter().map(|v| v.to_string()).collect::<Vec<_>>());
    }
    table.to_string()
}

fn render_report(report: &DatabaseReport) -> String {
    let mut sections = Vec::new();
    let mut overview = new_table(&["table", "columns", "rows"]);
    for table in &report.tables {
        overview.add_row(vec![
            table.name.clone(),
            table.columns.len().to_string(),
            table.row_count.to_string(),
        ]);
    }
    sections.push(overview.to_string());

    for table in &report.tables {
        let mut columns = new_table(&["column", "type", "nullable"]);
        for column in &table.columns {
            columns.add_row(vec![
                column.name.clone(),
                column.data_type.clone(),
                column.nullable.to_string(),
            ]);
        }
        sections.push(format!("{}\n{}", table.name, columns));
        if !table.sample.is_empty() {
            sections.push(render_table(&table.sample));
        }
    }
    if let Some(years) = &report.race_year_range {
        sections.push(format!("race years\n{}", render_table(years)));
    }
    if let Some(finishes) = &report.finish_position_distribution {
        sections.push(format!("finish positions\n{}", render_table(finishes)));
    }
    sections.join("\n\n")
}
