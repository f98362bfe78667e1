use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use hue_restore::{
    config::{self, ConfigFile},
    cycle::{self, fetch, Outcome},
    models::{index_order, ColorMode, LightState},
    Bridge, Config, Error, HueBridge, Journal, Result, Storage,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Restores Hue bulb state after a power loss", long_about = None)]
struct Args {
    #[arg(short, long, global = true)]
    /// Echo the event log to stdout
    verbose: bool,

    #[arg(short, long, global = true)]
    /// Dump intermediate structures
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one check cycle (restore after a power loss, otherwise record changes)
    Check,

    /// Register with the bridge (press its link button first)
    #[command(alias = "reg")]
    Auth,

    /// Remove our credential from the bridge
    Unreg,

    /// Show the lights as the bridge reports them now
    Current,

    /// Show the last recorded snapshot of every light
    Previous,

    /// Show the full history of one light, by unique id, index or name
    Lookup {
        /// Unique id, bridge index, or name
        query: String,
    },

    /// Print the version
    Version,
}

fn describe_state(state: &LightState) -> String {
    let color = match &state.colormode {
        Some(ColorMode::Ct) => format!("ct={}", show(&state.ct)),
        Some(ColorMode::Xy) => match state.xy {
            Some(xy) => format!("xy={xy}"),
            None => "xy=-".to_string(),
        },
        Some(mode) => format!("{mode} hue={} sat={}", show(&state.hue), show(&state.sat)),
        None => "no color".to_string(),
    };
    format!(
        "{:<3} {} bri={}{}",
        if state.on { "on" } else { "off" },
        color,
        show(&state.bri),
        if state.reachable { "" } else { " (unreachable)" }
    )
}

fn show<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or("-".to_string())
}

fn check(args: &Args, config: &Config, journal: &mut Journal) -> Result<()> {
    let report = cycle::check(config, journal, Utc::now())?;

    if args.verbose {
        match &report.outcome {
            Outcome::Restored(r) => println!(
                "restored {} lights ({} unchanged, {} failed, {} without snapshot)",
                r.written, r.unchanged, r.failed, r.untracked
            ),
            Outcome::Snapshotted(s) => println!(
                "recorded {} new lights, {} metadata changes, {} state changes",
                s.new_lights, s.metadata_records, s.state_records
            ),
        }
    }
    Ok(())
}

fn auth(config: &Config, journal: &mut Journal) -> Result<()> {
    let bridge = journal.trace("failed to set up bridge client", HueBridge::new(config))?;
    let username = journal.trace(
        "registration failed",
        bridge.register_app(&config.device_type),
    )?;

    let saved = ConfigFile::read(&config.storage_dir).and_then(|file| {
        let mut file = file.unwrap_or_default();
        file.username = Some(username);
        file.write(&config.storage_dir)
    });
    journal.trace("failed to save credential", saved)?;

    journal.info(&format!("registered as {}", config.device_type));
    println!("Registered, credential saved in {:?}", config.storage_dir);
    Ok(())
}

fn unreg(config: &Config, journal: &mut Journal) -> Result<()> {
    let bridge = journal.trace("failed to set up bridge client", HueBridge::new(config))?;
    journal.trace("unregistering failed", bridge.unregister_app())?;

    let cleared = ConfigFile::read(&config.storage_dir).and_then(|file| match file {
        Some(mut file) => {
            file.username = None;
            file.write(&config.storage_dir)
        }
        None => Ok(()),
    });
    journal.trace("failed to clear credential", cleared)?;

    journal.info("unregistered from the bridge");
    println!("Unregistered");
    Ok(())
}

fn current(config: &Config, journal: &mut Journal) -> Result<()> {
    let bridge = journal.trace("failed to set up bridge client", HueBridge::new(config))?;
    let fetched = journal.trace("failed to fetch lights", fetch(&bridge))?;

    for light in &fetched.lights {
        println!(
            "{:>3} {:<24} {:<28} {}",
            light.index(),
            light.metadata.name,
            light.unique_id(),
            describe_state(&light.state)
        );
    }
    for e in &fetched.skipped {
        eprintln!("Skipped: {e}");
    }
    Ok(())
}

fn previous(config: &Config, journal: &mut Journal) -> Result<()> {
    let storage = journal.trace(
        "failed to open snapshot store",
        Storage::open(&config.storage_dir),
    )?;

    let mut snapshots: Vec<_> = storage.get_all_latest().into_values().collect();
    snapshots.sort_by(|a, b| index_order(&a.metadata.metadata.index, &b.metadata.metadata.index));

    for snapshot in &snapshots {
        println!(
            "{:>3} {:<24} {:<28} {} (since {})",
            snapshot.metadata.metadata.index,
            snapshot.metadata.metadata.name,
            snapshot.identity.unique_id,
            describe_state(&snapshot.state.state),
            snapshot.state.recorded_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn lookup(config: &Config, journal: &mut Journal, query: &str) -> Result<()> {
    let storage = journal.trace(
        "failed to open snapshot store",
        Storage::open(&config.storage_dir),
    )?;
    let history = journal.trace(&format!("lookup of {query:?} failed"), storage.find(query))?;
    let json = serde_json::to_string_pretty(&history).map_err(Error::JsonDump)?;
    println!("{json}");
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    if let Command::Version = args.command {
        println!("hue-restore {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut journal = Journal::open(&config::storage_dir(), args.verbose)?;
    let config = journal.trace("failed to load configuration", Config::load())?;

    match &args.command {
        Command::Check => check(args, &config, &mut journal),
        Command::Auth => auth(&config, &mut journal),
        Command::Unreg => unreg(&config, &mut journal),
        Command::Current => current(&config, &mut journal),
        Command::Previous => previous(&config, &mut journal),
        Command::Lookup { query } => lookup(&config, &mut journal, query),
        Command::Version => Ok(()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.debug { "debug" } else { "warn" }),
    )
    .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
