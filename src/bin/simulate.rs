use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use decisive_vote::classifier::ChamberVoteClassifier;
use decisive_vote::config::ElectionConfig;
use decisive_vote::country::{Chamber, Country};
use decisive_vote::scorer::ScoreTable;
use decisive_vote::simulate::{OutcomeSimulator, SimulationRun, simulate_many, simulate_run};
use decisive_vote::snapshot::ElectionSnapshot;

const DEFAULT_RUNS: usize = 100;
const DEFAULT_BIAS_SD: f64 = 0.01;
const DEFAULT_SEED: u64 = 2020;
const TOP_TIPPING_POINTS: usize = 10;

#[derive(Debug, Serialize)]
struct Report {
    generated_at: String,
    seed: u64,
    tipping_points: Vec<ChamberTippingPoints>,
    runs: Vec<SimulationRun>,
}

#[derive(Debug, Serialize)]
struct ChamberTippingPoints {
    chamber: Chamber,
    by_state: Vec<(String, f64)>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let snapshot_path = parse_positional_arg()
        .or_else(|| std::env::var("ELECTION_SNAPSHOT").ok().map(PathBuf::from))
        .context("pass a snapshot path or set ELECTION_SNAPSHOT")?;
    let config = match parse_path_arg("--config")
        .or_else(|| std::env::var("ELECTION_CONFIG").ok().map(PathBuf::from))
    {
        Some(path) => ElectionConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ElectionConfig::default(),
    };

    let seed = parse_u64_arg("--seed").unwrap_or(DEFAULT_SEED);
    let runs = parse_u64_arg("--runs").map(|r| r as usize).unwrap_or(DEFAULT_RUNS);
    let bias_sd = parse_f64_arg("--bias-sd")
        .unwrap_or(DEFAULT_BIAS_SD)
        .clamp(0.0, 0.5);
    let fixed_bias = parse_f64_arg("--bias");
    let as_json = has_flag("--json");

    let snapshot = ElectionSnapshot::load(&snapshot_path)
        .with_context(|| format!("loading snapshot {}", snapshot_path.display()))?;
    let scorer = ScoreTable::build(&snapshot.score_rows, &config.scorer);
    let country = Country::build(&snapshot, &scorer, &config).context("building races")?;
    let classifier = ChamberVoteClassifier::fit(&snapshot.roll_call, &scorer)
        .context("fitting reference roll-call classifier")?;
    let simulator = OutcomeSimulator::new(&classifier);

    let mut tipping_points = Vec::new();
    for chamber in Chamber::ALL {
        let mut by_state = country.tipping_points_by_state(chamber)?;
        by_state.sort_by(|a, b| b.1.total_cmp(&a.1));
        tipping_points.push(ChamberTippingPoints { chamber, by_state });
    }

    let runs = match fixed_bias {
        Some(bias) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            vec![simulate_run(&country, &simulator, 0, bias, &mut rng)?]
        }
        None => simulate_many(&country, &simulator, runs, bias_sd, seed)?,
    };
    if runs.is_empty() {
        return Err(anyhow!("no simulation runs requested"));
    }

    let report = Report {
        generated_at: chrono::Utc::now().to_rfc3339(),
        seed,
        tipping_points,
        runs,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &Report) {
    println!("generated_at={} seed={}", report.generated_at, report.seed);
    for chamber in &report.tipping_points {
        println!("\n{} tipping points", chamber.chamber);
        for (state, p) in chamber.by_state.iter().take(TOP_TIPPING_POINTS) {
            println!("  {state:<20} {p:.3e}");
        }
    }

    println!("\nrun   bias     EC R/D     House R/D  Senate R/D  bill");
    for run in &report.runs {
        let cell = |c: Chamber| {
            run.tally(c)
                .map(|t| format!("{}/{}", t.republican, t.democrat))
                .unwrap_or_default()
        };
        println!(
            "{:<5} {:+.4}  {:<10} {:<10} {:<11} {:+}",
            run.run,
            run.bias,
            cell(Chamber::ElectoralCollege),
            cell(Chamber::House),
            cell(Chamber::Senate),
            run.house_bill_margin
        );
    }

    let n = report.runs.len() as f64;
    for chamber in Chamber::ALL {
        let gop_wins = report
            .runs
            .iter()
            .filter_map(|r| r.tally(chamber))
            .filter(|t| t.republican > t.democrat)
            .count();
        println!("{chamber}: R majority in {:.1}% of runs", 100.0 * gop_wins as f64 / n);
    }
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|a| a == name)
}

fn flag_value(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

/// First argument that is neither a flag nor a flag's value.
fn parse_positional_arg() -> Option<PathBuf> {
    const VALUED: &[&str] = &["--config", "--seed", "--runs", "--bias-sd", "--bias"];
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut idx = 0;
    while idx < args.len() {
        let arg = &args[idx];
        if VALUED.contains(&arg.as_str()) {
            idx += 2;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(PathBuf::from(arg));
        }
        idx += 1;
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    flag_value(name).map(PathBuf::from)
}

fn parse_u64_arg(name: &str) -> Option<u64> {
    flag_value(name).and_then(|v| v.parse::<u64>().ok())
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    flag_value(name)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
