//! Landmark Traffic-Engineering Simulator
//!
//! Replays a demand sequence over a topology with a landmark selection
//! strategy, repeated over independent runs, and reports max link
//! utilization and mean hop count (mean ± 95% CI across runs).

use landmark_te::config::{RunInputs, SimulationConfig};
use landmark_te::graph::OversubscriptionPolicy;
use landmark_te::logging::{init_file_logging, init_logging};
use landmark_te::selection::{LandmarkSelector, Strategy};
use landmark_te::simulation::{self, RunSummary, SimulationReport};
use landmark_te::ShortestPathRouter;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunResult {
    run: usize,
    seed: u64,
    landmark: SimulationReport,
    baseline: Option<SimulationReport>,
    elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimulatorReport {
    timestamp: String,
    config: SimulationConfig,
    runs: Vec<RunResult>,
    summary: RunSummary,
    baseline_summary: Option<RunSummary>,
}

fn ensure_output_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}

fn run_once(
    config: &SimulationConfig,
    run: usize,
    with_baseline: bool,
) -> Result<RunResult, String> {
    let start = Instant::now();
    let RunInputs {
        graph,
        pool,
        demands,
    } = config.prepare_run(run).map_err(|e| e.to_string())?;

    let baseline = if with_baseline {
        let mut router = ShortestPathRouter::new();
        Some(simulation::run(graph.clone(), &mut router, &demands).map_err(|e| e.to_string())?)
    } else {
        None
    };

    let mut selector =
        LandmarkSelector::new(pool, config.run_selection(run)).map_err(|e| e.to_string())?;
    let landmark = simulation::run(graph, &mut selector, &demands).map_err(|e| e.to_string())?;

    Ok(RunResult {
        run,
        seed: config.run_seed(run),
        landmark,
        baseline,
        elapsed_ms: start.elapsed().as_millis(),
    })
}

fn print_usage() {
    println!("Usage: te_simulator [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config FILE          JSON configuration (default: built-in defaults)");
    println!("  -s, --strategy STRATEGY    single | fixed-split:C | combinatorial-subset |");
    println!("                             ecmp-average | random");
    println!("  -r, --runs NUM             Independent repetitions");
    println!("  -d, --demands NUM          Demands per run");
    println!("  -k, --pool-size NUM        Landmark pool size");
    println!("  --oversubscription POLICY  allow | clamp | reject");
    println!("  --seed NUM                 Base seed");
    println!("  --baseline                 Also run exact shortest-path routing");
    println!("  --log-dir DIR              Write JSON logs to DIR");
    println!("  -o, --output FILE          Output JSON file");
    println!("  -h, --help                 Show this help");
}

fn main() {
    println!("Landmark Traffic-Engineering Simulator");
    println!("======================================\n");

    let args: Vec<String> = std::env::args().collect();

    let mut config_file: Option<String> = None;
    let mut strategy: Option<Strategy> = None;
    let mut runs: Option<usize> = None;
    let mut demand_count: Option<usize> = None;
    let mut pool_size: Option<usize> = None;
    let mut oversubscription: Option<OversubscriptionPolicy> = None;
    let mut seed: Option<u64> = None;
    let mut with_baseline = false;
    let mut log_dir: Option<String> = None;
    let mut output_file = "results/te_simulator.json".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_file = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--strategy" | "-s" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse() {
                        Ok(parsed) => strategy = Some(parsed),
                        Err(e) => {
                            eprintln!("{}", e);
                            std::process::exit(2);
                        }
                    }
                    i += 1;
                }
            }
            "--runs" | "-r" => {
                if i + 1 < args.len() {
                    runs = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--demands" | "-d" => {
                if i + 1 < args.len() {
                    demand_count = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--pool-size" | "-k" => {
                if i + 1 < args.len() {
                    pool_size = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--oversubscription" => {
                if i + 1 < args.len() {
                    oversubscription = match args[i + 1].to_lowercase().as_str() {
                        "allow" => Some(OversubscriptionPolicy::Allow),
                        "clamp" => Some(OversubscriptionPolicy::Clamp),
                        "reject" => Some(OversubscriptionPolicy::Reject),
                        other => {
                            eprintln!("Unknown oversubscription policy: {}", other);
                            std::process::exit(2);
                        }
                    };
                    i += 1;
                }
            }
            "--seed" => {
                if i + 1 < args.len() {
                    seed = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--baseline" => with_baseline = true,
            "--log-dir" => {
                if i + 1 < args.len() {
                    log_dir = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    output_file = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            _ => {}
        }
        i += 1;
    }

    // keep the guard alive so buffered file logs flush on exit
    let _log_guard = match &log_dir {
        Some(dir) => Some(init_file_logging(dir, 7).expect("Failed to initialize file logging")),
        None => {
            init_logging("warn");
            None
        }
    };

    let mut config = match &config_file {
        Some(path) => SimulationConfig::from_json_file(path).unwrap_or_else(|e| {
            eprintln!("Failed to load {}: {}", path, e);
            std::process::exit(1);
        }),
        None => SimulationConfig::default(),
    };
    if let Some(strategy) = strategy {
        config.selection.strategy = strategy;
    }
    if let Some(runs) = runs {
        config.runs = runs;
    }
    if let Some(count) = demand_count {
        config.demands.count = count;
    }
    if let Some(size) = pool_size {
        config.pool.size = size;
    }
    if let Some(policy) = oversubscription {
        config.oversubscription = policy;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    println!("Configuration:");
    println!("  Topology:         {:?}", config.topology.kind);
    println!("  Pool:             {:?} (size {})", config.pool.method, config.pool.size);
    println!("  Demands:          {}", config.demands.count);
    println!("  Strategy:         {}", config.selection.strategy);
    println!("  Oversubscription: {:?}", config.oversubscription);
    println!("  Runs:             {}", config.runs);
    println!("  Seed:             {}", config.seed);
    println!("  Output file:      {}", output_file);
    println!();

    let start = Instant::now();
    let results: Result<Vec<RunResult>, String> = (0..config.runs)
        .into_par_iter()
        .map(|run| run_once(&config, run, with_baseline))
        .collect();
    let results = results.unwrap_or_else(|e| {
        eprintln!("Run failed: {}", e);
        std::process::exit(1);
    });

    println!(
        "{:>4} {:>8} {:>10} {:>10} {:>9} {:>10}",
        "Run", "Seed", "MaxUtil", "AvgHops", "Unrouted", "Time(ms)"
    );
    for result in &results {
        println!(
            "{:>4} {:>8} {:>10.4} {:>10.3} {:>9} {:>10}",
            result.run,
            result.seed,
            result.landmark.max_utilization,
            result.landmark.average_hop_count,
            result.landmark.unrouted,
            result.elapsed_ms
        );
    }

    let landmark_reports: Vec<SimulationReport> =
        results.iter().map(|r| r.landmark.clone()).collect();
    let summary = RunSummary::from_reports(&landmark_reports);
    let baseline_reports: Vec<SimulationReport> =
        results.iter().filter_map(|r| r.baseline.clone()).collect();
    let baseline_summary =
        (!baseline_reports.is_empty()).then(|| RunSummary::from_reports(&baseline_reports));

    println!();
    println!("Summary ({} runs, {:.1}s):", summary.runs, start.elapsed().as_secs_f64());
    println!(
        "  {:<24} max util {:.4} ± {:.4}, avg hops {:.3} ± {:.3}",
        summary.router,
        summary.max_utilization.mean,
        summary.max_utilization.ci95,
        summary.average_hop_count.mean,
        summary.average_hop_count.ci95
    );
    if let Some(baseline) = &baseline_summary {
        println!(
            "  {:<24} max util {:.4} ± {:.4}, avg hops {:.3} ± {:.3}",
            baseline.router,
            baseline.max_utilization.mean,
            baseline.max_utilization.ci95,
            baseline.average_hop_count.mean,
            baseline.average_hop_count.ci95
        );
    }

    let report = SimulatorReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        config,
        runs: results,
        summary,
        baseline_summary,
    };

    ensure_output_dir(&output_file);
    let json = serde_json::to_string_pretty(&report).expect("Failed to serialize results");
    let mut file = File::create(&output_file).expect("Failed to create output file");
    file.write_all(json.as_bytes())
        .expect("Failed to write results");

    println!("\nResults saved to {}", output_file);
}
