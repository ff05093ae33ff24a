//! DRAM controller simulator CLI.
//!
//! This binary drives the controller core with synthetic traffic. It performs:
//! 1. **Run:** Generate a workload, simulate until every request completes, print statistics.
//! 2. **Config:** Print the timing model derived from a configuration file (or the defaults).
//!
//! Logging goes through `tracing`; set `RUST_LOG` (e.g. `RUST_LOG=dramctl_core=debug`)
//! to see refresh and arbitration events.

use clap::{Parser, Subcommand};
use std::process;

use dramctl_core::config::Config;
use dramctl_core::sim::{Pattern, Simulator, Workload};
use dramctl_core::stats::STATS_SECTIONS;
use dramctl_core::timing::TimingModel;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dramsim",
    author,
    version,
    about = "Cycle-accurate SDRAM controller simulator",
    long_about = "Drive the controller scheduling core with a synthetic workload and report command and latency statistics.\n\nExamples:\n  dramsim run --pattern random --requests 10000\n  dramsim run --config ddr3.json --trace --max-cycles 500\n  dramsim config --config ddr3.json --json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate a synthetic workload until every request has completed.
    Run {
        /// JSON configuration file; defaults are used when omitted.
        #[arg(short, long)]
        config: Option<String>,

        /// Address pattern: sequential, random or thrash.
        #[arg(short, long, default_value = "sequential")]
        pattern: Pattern,

        /// Number of requests to generate.
        #[arg(short = 'n', long, default_value_t = 1000)]
        requests: u64,

        /// Percentage of writes in the stream.
        #[arg(short, long, default_value_t = 30)]
        writes: u8,

        /// Give up after this many cycles.
        #[arg(long, default_value_t = 10_000_000)]
        max_cycles: u64,

        /// Workload seed.
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Statistics sections to print (all when omitted).
        #[arg(long, value_parser = clap::builder::PossibleValuesParser::new(STATS_SECTIONS))]
        stats: Vec<String>,

        /// Print every command as it is issued.
        #[arg(long)]
        trace: bool,
    },

    /// Print the timing model derived from a configuration.
    Config {
        /// JSON configuration file; defaults are used when omitted.
        #[arg(short, long)]
        config: Option<String>,

        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            pattern,
            requests,
            writes,
            max_cycles,
            seed,
            stats,
            trace,
        } => cmd_run(
            &load_config(config.as_deref()),
            &RunOptions {
                pattern,
                requests,
                writes,
                max_cycles,
                seed,
                stats,
                trace,
            },
        ),
        Commands::Config { config, json } => cmd_config(&load_config(config.as_deref()), json),
    }
}

/// Loads the configuration file, or the defaults when no path is given. Exits on error.
fn load_config(path: Option<&str>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    Config::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading config {path}: {e}");
        process::exit(2);
    })
}

/// Derives the timing model. Exits on a configuration error.
fn timing_model(config: &Config) -> TimingModel {
    TimingModel::new(config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        process::exit(2);
    })
}

#[derive(Debug)]
struct RunOptions {
    pattern: Pattern,
    requests: u64,
    writes: u8,
    max_cycles: u64,
    seed: u64,
    stats: Vec<String>,
    trace: bool,
}

/// Runs the workload to completion and prints the report.
///
/// Exits with code 1 if the device model reported a timing violation or the
/// cycle limit was reached with requests still outstanding.
fn cmd_run(config: &Config, opts: &RunOptions) {
    let timing = timing_model(config);
    let mut sim = Simulator::new(config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        process::exit(2);
    });
    let mut workload = Workload::new(opts.pattern, opts.seed, opts.writes, &timing);

    info!(pattern = %opts.pattern, requests = opts.requests, seed = opts.seed, "starting run");
    println!(
        "[*] {} x{} on {} ({} banks, BL{}, policy {:?})",
        opts.pattern,
        opts.requests,
        timing.memtype(),
        timing.nbanks(),
        timing.burst_length(),
        timing.policy()
    );

    let mut next = None;
    let mut finished = false;
    for _ in 0..opts.max_cycles {
        if next.is_none() && workload.issued() < opts.requests {
            next = Some(workload.next_request());
        }
        if let Some(request) = next.take() {
            if sim.has_room(request.bank) {
                let _ = sim.submit(request);
            } else {
                next = Some(request);
            }
        }
        if next.is_none() && workload.issued() >= opts.requests && sim.is_idle() {
            finished = true;
            break;
        }

        let output = sim.tick();
        if opts.trace {
            if let Some(command) = output.command() {
                println!("{command}");
            }
        }
    }

    sim.stats().print_sections(&opts.stats);
    if let Some(bandwidth) = sim.controller().bandwidth() {
        println!(
            "bandwidth: reads={} writes={} commands={} (last period: {:?})",
            bandwidth.reads(),
            bandwidth.writes(),
            bandwidth.commands(),
            bandwidth.last_period()
        );
    }

    let violations = sim.violations();
    if !violations.is_empty() {
        eprintln!("\n[!] {} timing violation(s):", violations.len());
        for violation in violations.iter().take(10) {
            eprintln!("    {violation}");
        }
        process::exit(1);
    }
    if !finished {
        eprintln!(
            "\n[!] cycle limit {} reached with requests outstanding",
            opts.max_cycles
        );
        process::exit(1);
    }
}

/// Prints the derived timing model.
fn cmd_config(config: &Config, json: bool) {
    let t = timing_model(config);
    if json {
        let value = serde_json::json!({
            "memtype": t.memtype().to_string(),
            "nphases": t.nphases(),
            "burst_length": t.burst_length(),
            "address_align": t.address_align(),
            "address_width": t.address_width(),
            "nbanks": t.nbanks(),
            "read_latency": t.read_latency(),
            "write_latency": t.write_latency(),
            "t_rp": t.t_rp(),
            "t_rcd": t.t_rcd(),
            "t_ras": t.t_ras(),
            "t_wr": t.t_wr(),
            "t_wtr": t.t_wtr(),
            "t_rrd": t.t_rrd(),
            "t_ccd": t.t_ccd(),
            "t_refi": t.t_refi(),
            "t_rfc": t.t_rfc(),
            "refresh_lead": t.refresh_lead(),
            "refresh_period": t.refresh_period(),
            "policy": format!("{:?}", t.policy()),
        });
        match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error encoding timing model: {e}");
                process::exit(1);
            }
        }
        return;
    }

    println!("memory type        {}", t.memtype());
    println!(
        "burst              {} ({} phases, align {})",
        t.burst_length(),
        t.nphases(),
        t.address_align()
    );
    println!(
        "geometry           {} banks, {} row bits, {} col bits, {}-bit request address",
        t.nbanks(),
        t.rowbits(),
        t.colbits(),
        t.address_width()
    );
    println!(
        "latency            read {} / write {} cycles",
        t.read_latency(),
        t.write_latency()
    );
    println!(
        "timing             tRP={} tRCD={} tRAS={} tWR={} tWTR={} tRRD={} tCCD={}",
        t.t_rp(),
        t.t_rcd(),
        t.t_ras(),
        t.t_wr(),
        t.t_wtr(),
        t.t_rrd(),
        t.t_ccd()
    );
    println!(
        "refresh            tREFI={} tRFC={} lead={} period={} ({})",
        t.t_refi(),
        t.t_rfc(),
        t.refresh_lead(),
        t.refresh_period(),
        if t.with_refresh() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "arbitration        {:?} (read_time={} write_time={} bypass_limit={})",
        t.policy(),
        t.read_time(),
        t.write_time(),
        t.row_hit_bypass_limit()
    );
}
