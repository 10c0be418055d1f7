use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand, Args, ValueEnum};
use claims_analytics::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "claimscli")]
#[command(about = "Claims Analytics CLI - cohorts, adherence, PMPM cost and episodes from claims extracts", long_about = None)]
struct Cli {
    /// Configuration file (TOML); CLAIMS_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log and skip malformed records instead of failing
    #[arg(long, global = true)]
    skip_invalid: bool,
    /// Hide progress bars
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a diagnosis cohort from medical claims
    Cohort(CohortArgs),
    /// Proportion of Days Covered from pharmacy fills
    Pdc(PdcArgs),
    /// Per-member-per-month cost over eligibility
    Pmpm(PmpmArgs),
    /// Segment members' claims into episodes of care
    Episodes(EpisodesArgs),
    /// Show summary statistics for the input files
    Stats(StatsArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Write all result rows to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output file format
    #[arg(long, value_enum, default_value_t = ExportFormatOpt::Csv)]
    format: ExportFormatOpt,
    /// Rows to print to the terminal
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Args)]
struct CohortArgs {
    /// Medical claims CSV
    #[arg(short, long)]
    medical: PathBuf,
    /// ICD-10 prefixes, comma separated (e.g. E11,E13)
    #[arg(long, value_delimiter = ',', required = true)]
    icd: Vec<String>,
    /// Diagnosis columns to search, comma separated
    #[arg(long, value_delimiter = ',')]
    dx_columns: Option<Vec<String>>,
    #[arg(long)]
    min_claims: Option<usize>,
    #[arg(long)]
    lookback_days: Option<u32>,
    /// Reference time for the lookback (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS); defaults to now
    #[arg(long, value_parser = parse_as_of)]
    as_of: Option<NaiveDateTime>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct PdcArgs {
    /// Pharmacy fills CSV
    #[arg(short, long)]
    pharmacy: PathBuf,
    /// Drug code prefixes that must all match, comma separated
    #[arg(long, value_delimiter = ',')]
    drug: Vec<String>,
    /// Members to evaluate, comma separated; defaults to every member with a fill
    #[arg(long, value_delimiter = ',')]
    members: Option<Vec<String>>,
    /// First day of the observation window (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,
    /// Last day of the observation window (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,
    #[arg(long)]
    code_column: Option<String>,
    /// Adherence threshold in percent
    #[arg(long)]
    threshold: Option<f64>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct PmpmArgs {
    /// Medical claims CSV
    #[arg(short, long)]
    medical: PathBuf,
    /// Eligibility spans CSV
    #[arg(short, long)]
    eligibility: PathBuf,
    #[arg(long)]
    start: NaiveDate,
    #[arg(long)]
    end: NaiveDate,
    #[arg(long)]
    cost_column: Option<String>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct EpisodesArgs {
    /// Medical claims CSV
    #[arg(short, long)]
    medical: PathBuf,
    /// Members to segment, comma separated; defaults to every member
    #[arg(long, value_delimiter = ',')]
    members: Option<Vec<String>>,
    #[arg(long)]
    gap_days: Option<u32>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct StatsArgs {
    /// Medical claims CSV
    #[arg(short, long)]
    medical: PathBuf,
    /// Pharmacy fills CSV
    #[arg(short, long)]
    pharmacy: Option<PathBuf>,
    /// Eligibility spans CSV
    #[arg(short, long)]
    eligibility: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ExportFormatOpt {
    Json,
    Jsonl,
    Csv,
}

impl From<ExportFormatOpt> for ExportFormat {
    fn from(opt: ExportFormatOpt) -> Self {
        match opt {
            ExportFormatOpt::Json => ExportFormat::Json,
            ExportFormatOpt::Jsonl => ExportFormat::JsonLines,
            ExportFormatOpt::Csv => ExportFormat::Csv,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::Cohort(args) => cmd_cohort(args, config),
        Commands::Pdc(args) => cmd_pdc(args, config),
        Commands::Pmpm(args) => cmd_pmpm(args, config),
        Commands::Episodes(args) => cmd_episodes(args, config),
        Commands::Stats(args) => cmd_stats(args, config),
    });

    if let Err(e) = result {
        match e.downcast_ref::<ClaimsError>() {
            Some(claims_error) => eprintln!("Error: {:#}\n\n{}", e, claims_error.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalyticsConfig> {
    let mut config = AnalyticsConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if cli.skip_invalid {
        config.reader.skip_invalid_records = true;
    }
    if cli.quiet {
        config.reader.show_progress = false;
    }
    Ok(config)
}

fn parse_as_of(value: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| format!("'{}' is not YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS", value))
}

fn reader(config: &AnalyticsConfig) -> ClaimsReader {
    let reader = ClaimsReader::new()
        .with_columns(config.columns.clone())
        .with_skip_invalid_records(config.reader.skip_invalid_records);
    #[cfg(feature = "progress")]
    let reader = reader.with_progress_bar(config.reader.show_progress);
    reader
}

fn write_output<T: serde::Serialize>(rows: &[T], output: &OutputArgs) -> anyhow::Result<()> {
    if let Some(path) = &output.output {
        export_rows(rows, path, output.format.into())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Exported {} rows to {}", rows.len(), path.display());
    }
    Ok(())
}

fn load_medical(path: &Path, config: &AnalyticsConfig) -> anyhow::Result<Vec<MedicalClaim>> {
    reader(config)
        .load_medical_claims(path)
        .with_context(|| format!("Error loading medical claims from {}", path.display()))
}

fn cmd_cohort(args: CohortArgs, config: AnalyticsConfig) -> anyhow::Result<()> {
    let mut builder = ConfigBuilder::from_config(config);
    if let Some(columns) = &args.dx_columns {
        builder = builder.dx_columns(columns.as_slice());
    }
    if let Some(min_claims) = args.min_claims {
        builder = builder.min_claims(min_claims);
    }
    if let Some(days) = args.lookback_days {
        builder = builder.lookback_days(days);
    }
    let config = builder.build()?;

    let claims = load_medical(&args.medical, &config)?;
    let as_of = args.as_of.unwrap_or_else(|| chrono::Local::now().naive_local());

    let cohort = ClaimsAnalytics::new(&claims, &config).cohort(args.icd.as_slice(), as_of)?;
    for entry in cohort.iter().take(args.output.limit) {
        println!("{} | index {} | {} claims", entry.member_id, entry.index_date, entry.claim_count);
    }
    println!("Cohort size: {} (prefixes {}, as of {})", cohort.len(), args.icd.join(","), as_of);

    write_output(&cohort, &args.output)
}

fn cmd_pdc(args: PdcArgs, config: AnalyticsConfig) -> anyhow::Result<()> {
    let mut builder = ConfigBuilder::from_config(config);
    if let Some(column) = &args.code_column {
        builder = builder.code_column(column);
    }
    if let Some(threshold) = args.threshold {
        builder = builder.adherence_threshold(threshold);
    }
    let config = builder.build()?;

    let fills = reader(&config)
        .load_pharmacy_fills(&args.pharmacy)
        .with_context(|| format!("Error loading pharmacy fills from {}", args.pharmacy.display()))?;

    let members: Vec<String> = match args.members {
        Some(members) => members,
        None => fills.iter()
            .map(|f| f.member_id.as_str().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let analytics = ClaimsAnalytics::new(&[], &config).with_pharmacy(&fills);
    let results = analytics.pdc_for_members(members.as_slice(), args.drug.as_slice(), args.start, args.end)?;

    for result in results.iter().take(args.output.limit) {
        match result.pdc {
            Some(pdc) => println!(
                "{} | PDC {:.1}% | {} | {}/{} days | {} fills",
                result.member_id,
                pdc,
                if result.adherent == Some(true) { "adherent" } else { "non-adherent" },
                result.days_covered,
                result.observation_days,
                result.fills
            ),
            None => println!("{} | no qualifying fills", result.member_id),
        }
    }

    let defined = results.iter().filter(|r| r.is_defined()).count();
    let adherent = results.iter().filter(|r| r.adherent == Some(true)).count();
    println!(
        "Members: {} ({} with fills, {} adherent at {:.1}%)",
        results.len(),
        defined,
        adherent,
        config.adherence.adherence_threshold
    );

    write_output(&results, &args.output)
}

fn cmd_pmpm(args: PmpmArgs, config: AnalyticsConfig) -> anyhow::Result<()> {
    let mut builder = ConfigBuilder::from_config(config);
    if let Some(column) = &args.cost_column {
        builder = builder.cost_column(column);
    }
    let config = builder.build()?;

    let claims = load_medical(&args.medical, &config)?;
    let eligibility = reader(&config)
        .load_eligibility(&args.eligibility)
        .with_context(|| format!("Error loading eligibility from {}", args.eligibility.display()))?;

    let results = ClaimsAnalytics::new(&claims, &config)
        .with_eligibility(&eligibility)
        .pmpm(args.start, args.end)?;

    for result in results.iter().take(args.output.limit) {
        println!(
            "{} | {} member months | total {:.2} | PMPM {:.2}",
            result.member_id, result.member_months, result.total_cost, result.pmpm
        );
    }
    println!(
        "Members: {} | population PMPM {:.2}",
        results.len(),
        claims_analytics::cookbook::population_pmpm(&results)
    );

    write_output(&results, &args.output)
}

fn cmd_episodes(args: EpisodesArgs, config: AnalyticsConfig) -> anyhow::Result<()> {
    let mut builder = ConfigBuilder::from_config(config);
    if let Some(days) = args.gap_days {
        builder = builder.gap_days(days);
    }
    let config = builder.build()?;

    let claims = load_medical(&args.medical, &config)?;
    let analytics = ClaimsAnalytics::new(&claims, &config);

    let members: Vec<String> = match args.members {
        Some(members) => members,
        None => analytics.member_ids().into_iter().map(str::to_string).collect(),
    };
    // Rows come back contiguous per member, so grouping is a single pass
    let tagged = analytics.episodes_for_members(members.as_slice())?;
    let episodes = group_episodes(&tagged);
    let member_count = members.iter().collect::<BTreeSet<_>>().len();

    for episode in episodes.iter().take(args.output.limit) {
        println!(
            "{} | episode {} | {} to {} | {} claims | paid {:.2}",
            episode.member_id,
            episode.episode_num,
            episode.start_date,
            episode.end_date,
            episode.claims.len(),
            episode.total_paid()
        );
    }
    println!("Episodes: {} across {} members (gap {} days)", episodes.len(), member_count, config.episodes.gap_days);

    let rows: Vec<EpisodeRow> = tagged.iter().map(EpisodeClaim::to_row).collect();
    write_output(&rows, &args.output)
}

fn cmd_stats(args: StatsArgs, config: AnalyticsConfig) -> anyhow::Result<()> {
    let mut builder = ClaimsDatasetBuilder::from_config(&config).medical_claims(&args.medical);
    if let Some(path) = &args.pharmacy {
        builder = builder.pharmacy_fills(path);
    }
    if let Some(path) = &args.eligibility {
        builder = builder.eligibility(path);
    }

    let dataset = builder.build().context("Error loading dataset")?;
    dataset.statistics().print_summary();
    Ok(())
}
