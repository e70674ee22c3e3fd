//! Command-line driver for the pedigree sex-ratio TDT engine.
//!
//! Each subcommand is a thin orchestration layer: parse flags, move data
//! through the library's in-memory pipeline, and write results. All
//! statistical behavior lives in the library modules.

use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;
use std::io::{BufRead, Write, stdin, stdout};
use std::path::PathBuf;
use std::process;

use tdtscan::families::{InheritanceMode, build_families};
use tdtscan::io::{
    open_maybe_gz, create_maybe_gz, parse_ped, parse_ped_safe, read_results_path, write_ped,
    write_result,
};
use tdtscan::monte::run_monte_carlo;
use tdtscan::outlier::{OutlierConfig, run_outlier};
use tdtscan::pedigree::{extract_family_auto, find_focals, has_father, uniq_records};
use tdtscan::rank::kolmogorov_smirnov_chi2;
use tdtscan::shuffle::{ShuffleColumn, write_shuffled_replicates};
use tdtscan::tdt::run_tdt;
use tdtscan::types::{PedigreeGraph, PedigreeRecord, TdtResult};

#[derive(Parser)]
#[clap(
    name = "tdtscan",
    version,
    about = "A pedigree transmission-disequilibrium engine for detecting sex-ratio distortion."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Y-lineage TDT for every male focal (or one chosen focal).
    Scan(ScanArgs),
    /// Run all four inheritance-mode TDTs for one focal individual.
    Test(TestArgs),
    /// Extract the autosomal family of a focal individual as pedigree lines.
    Extract(ExtractArgs),
    /// Monte Carlo significance of an actual result against a background.
    Monte(MonteArgs),
    /// Write sex- or phenotype-shuffled pedigree replicates.
    Shuffle(ShuffleArgs),
    /// Compare posterior-risk outliers against background tables.
    Outlier(OutlierArgs),
    /// Kolmogorov-Smirnov fit of observed chi-squared values to the null.
    Kolm(KolmArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Input .ped file (.gz accepted); malformed lines are logged and dropped
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output path for newline-delimited JSON results (.gz accepted)
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Focal individual ID (default: every male in the pedigree)
    #[arg(short = 'f', long)]
    focal: Option<String>,

    /// Replace individual IDs with sequential fake names in the output
    #[arg(short = 'n', long)]
    fake_names: bool,
}

#[derive(Args)]
struct TestArgs {
    /// Focal individual ID
    #[arg(short = 'f', long)]
    focal: String,

    /// Input .ped file (default: stdin); parsing is strict
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,
}

#[derive(Args)]
struct ExtractArgs {
    /// Focal individual ID
    #[arg(short = 'f', long)]
    focal: String,

    /// Input .ped file (default: stdin)
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,
}

#[derive(Args)]
struct MonteArgs {
    /// JSON file holding the actual result (first record is used)
    #[arg(short = 'a', long)]
    actual: PathBuf,

    /// JSON file holding the background results
    #[arg(short = 'b', long)]
    background: PathBuf,

    /// Random seed
    #[arg(short = 's', long, default_value_t = 0)]
    seed: u64,

    /// Number of simulated replicate sets
    #[arg(short = 'r', long, default_value_t = 1)]
    replicates: usize,
}

#[derive(Args)]
struct ShuffleArgs {
    /// Input .ped file (default: stdin)
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Output prefix; replicate i goes to {prefix}_{i}.ped.gz
    #[arg(short = 'o', long, default_value = "shuf_ped_out")]
    output_prefix: String,

    /// Number of shuffled replicates
    #[arg(short = 'r', long, default_value_t = 1)]
    replicates: usize,

    /// Random seed
    #[arg(short = 's', long, default_value_t = 0)]
    seed: u64,

    /// Shuffle the phenotype column instead of the sex column
    #[arg(short = 'p', long)]
    phenotypes: bool,
}

#[derive(Args)]
struct OutlierArgs {
    /// Posterior-risk table for the real data (.gz accepted)
    #[arg(short = 'r', long)]
    real: PathBuf,

    /// File listing background table paths, one per line
    #[arg(short = 'b', long)]
    background_list: PathBuf,

    /// Individual ID to run rank statistics on
    #[arg(short = 'c', long)]
    chosen: Option<String>,

    /// Average the top N posteriors instead of taking the single best
    #[arg(short = 't', long)]
    top_n: Option<usize>,

    /// The real table has a header line
    #[arg(long)]
    real_header: bool,

    /// The background tables have header lines
    #[arg(long)]
    background_header: bool,
}

#[derive(Args)]
struct KolmArgs {
    /// JSON result stream (default: stdin)
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Scan(args) => run_scan(args),
        Command::Test(args) => run_test(args),
        Command::Extract(args) => run_extract(args),
        Command::Monte(args) => run_monte(args),
        Command::Shuffle(args) => run_shuffle(args),
        Command::Outlier(args) => run_outlier_cmd(args),
        Command::Kolm(args) => run_kolm(args),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Reads a pedigree strictly from a file or stdin.
fn read_ped_strict(input: Option<&PathBuf>) -> Result<Vec<PedigreeRecord>, Box<dyn Error>> {
    match input {
        Some(path) => Ok(parse_ped(open_maybe_gz(path)?)?),
        None => Ok(parse_ped(stdin().lock())?),
    }
}

fn y_result(focal: &PedigreeRecord, graph: &PedigreeGraph, name: String, orphan: bool) -> Result<TdtResult, Box<dyn Error>> {
    let families = build_families(&focal.individual_id, graph, InheritanceMode::Y)?;
    let mut result = run_tdt(&families);
    result.name = name;
    result.orphan = orphan;
    Ok(result)
}

fn run_scan(args: ScanArgs) -> Result<(), Box<dyn Error>> {
    let records = parse_ped_safe(open_maybe_gz(&args.input)?)?;
    let graph = PedigreeGraph::build(&records);
    let mut writer = create_maybe_gz(&args.output)?;

    match &args.focal {
        Some(focal_id) => {
            let focal = graph
                .get(focal_id)
                .ok_or_else(|| format!("focal individual {focal_id} not found in pedigree"))?
                .record
                .clone();
            let name = if args.fake_names {
                "0".to_string()
            } else {
                focal_id.clone()
            };
            let orphan = !has_father(&focal, &graph);
            let result = y_result(&focal, &graph, name, orphan)?;
            write_result(&mut writer, &result)?;
        }
        None => {
            let (orphans, non_orphans) = find_focals(&graph);
            let mut index = 0usize;
            for (focals, orphan) in [(orphans, true), (non_orphans, false)] {
                for focal in focals {
                    let name = if args.fake_names {
                        index.to_string()
                    } else {
                        focal.individual_id.clone()
                    };
                    let result = y_result(&focal, &graph, name, orphan)?;
                    write_result(&mut writer, &result)?;
                    index += 1;
                }
            }
        }
    }
    writer.flush()?;
    Ok(())
}

fn run_test(args: TestArgs) -> Result<(), Box<dyn Error>> {
    let records = read_ped_strict(args.input.as_ref())?;
    let graph = PedigreeGraph::build(&records);
    let out = stdout();
    let mut writer = out.lock();

    let modes = [
        (InheritanceMode::FemaleX, "FemaleX"),
        (InheritanceMode::FemDescentFemaleX, "FemDescentFemaleX"),
        (InheritanceMode::Y, "Y"),
        (InheritanceMode::Auto, "Auto"),
    ];
    for (mode, name) in modes {
        let families = build_families(&args.focal, &graph, mode)?;
        let mut result = run_tdt(&families);
        result.name = name.to_string();
        write_result(&mut writer, &result)?;
    }
    writer.flush()?;
    Ok(())
}

fn run_extract(args: ExtractArgs) -> Result<(), Box<dyn Error>> {
    let records = read_ped_strict(args.input.as_ref())?;
    let family = extract_family_auto(&args.focal, &records)?;
    let out = stdout();
    let mut writer = out.lock();
    write_ped(&mut writer, &family)?;
    writer.flush()?;
    Ok(())
}

fn run_monte(args: MonteArgs) -> Result<(), Box<dyn Error>> {
    let actual_results = read_results_path(&args.actual)?;
    let actual = actual_results
        .first()
        .ok_or("actual result file is empty")?;
    let background = read_results_path(&args.background)?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let report = run_monte_carlo(&mut rng, args.replicates, actual, background);

    println!("most significant fraction: {}", report.most_significant);
    for (percentile, fraction) in tdtscan::monte::REPORT_PERCENTILES
        .iter()
        .zip(report.top_significant)
    {
        println!("top {percentile} fraction: {fraction}");
    }
    println!("pooled empirical p: {}", report.pooled_empirical_p);
    Ok(())
}

fn run_shuffle(args: ShuffleArgs) -> Result<(), Box<dyn Error>> {
    let records = match &args.input {
        Some(path) => parse_ped_safe(open_maybe_gz(path)?)?,
        None => parse_ped_safe(stdin().lock())?,
    };
    let mut records = uniq_records(&records);
    let column = if args.phenotypes {
        ShuffleColumn::Phenotype
    } else {
        ShuffleColumn::Sex
    };
    let mut rng = StdRng::seed_from_u64(args.seed);
    write_shuffled_replicates(
        &mut records,
        &mut rng,
        args.replicates,
        &args.output_prefix,
        column,
    )?;
    Ok(())
}

fn run_outlier_cmd(args: OutlierArgs) -> Result<(), Box<dyn Error>> {
    let background_paths: Vec<PathBuf> = open_maybe_gz(&args.background_list)?
        .lines()
        .collect::<Result<Vec<String>, _>>()?
        .into_iter()
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect();

    let config = OutlierConfig {
        real_path: args.real,
        real_header: args.real_header,
        background_paths,
        background_header: args.background_header,
        top_n: args.top_n,
        chosen: args.chosen,
    };
    let report = run_outlier(&config)?;

    println!("biggest outlier percentage: {}", report.outlier_percentage);
    println!("background biggest average: {}", report.background_mean);
    println!(
        "real best z {}; z rank percentile {}; higher {}; total {}",
        report.real_best_z,
        report.z_rank.percentile,
        report.z_rank.count_greater,
        report.z_rank.total
    );
    if let Some(stats) = report.rank_stats {
        let mean_background_rank = stats
            .background_ranks
            .iter()
            .map(|r| r.percentile)
            .sum::<f64>()
            / stats.background_ranks.len() as f64;
        println!(
            "chosen rank {}; chosen internal rank {}; mean background rank {}",
            stats.chosen_rank.percentile, stats.chosen_internal_rank.percentile, mean_background_rank
        );
    }
    Ok(())
}

fn run_kolm(args: KolmArgs) -> Result<(), Box<dyn Error>> {
    let results = match &args.input {
        Some(path) => read_results_path(path)?,
        None => tdtscan::io::read_results(stdin().lock())?,
    };
    let statistics: Vec<f64> = results.iter().map(|r| r.chi_squared).collect();
    let ks = kolmogorov_smirnov_chi2(&statistics)?;
    println!("D: {}; n: {}", ks.statistic, ks.n);
    println!("{:.20}", ks.p_value);
    Ok(())
}
