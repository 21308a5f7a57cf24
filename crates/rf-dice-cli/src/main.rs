//! Dice Lab command line
//!
//! Usage:
//!   rf-dice simulate --cycles 100      - Run headless roll cycles
//!   rf-dice costs --count 8            - Print unlock/upgrade cost curves
//!   rf-dice config --preset studio     - Print a preset configuration

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rf_dice_lab::{DiceConfig, DiceError, DiceSession, SessionStats};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "rf-dice", about = "Dice Lab headless simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run roll cycles without a presentation layer
    Simulate {
        /// Number of roll cycles
        #[arg(short, long, default_value_t = 100)]
        cycles: u64,
        /// RNG seed for a reproducible run
        #[arg(short, long)]
        seed: Option<u64>,
        /// Config file (.json, .yaml or .yml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// What to buy between cycles
        #[arg(long, value_enum, default_value_t = Strategy::None)]
        strategy: Strategy,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print unlock and upgrade costs
    Costs {
        /// Number of steps to print
        #[arg(short, long, default_value_t = 8)]
        count: usize,
        /// Config file (.json, .yaml or .yml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print a preset configuration
    Config {
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// classic, studio, high_roller or sum
        #[arg(short, long, default_value = "classic")]
        preset: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Only roll and collect
    None,
    /// Buy every unlock and upgrade the balance covers
    Greedy,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Serialize)]
struct Summary {
    config: String,
    cycles: u64,
    resets: u64,
    balance: i64,
    active_dice: usize,
    upgraded_dice: usize,
    stats: SessionStats,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            cycles,
            seed,
            config,
            strategy,
            json,
        } => simulate(load_config(config)?, cycles, seed, strategy, json),
        Commands::Costs { count, config } => print_costs(&load_config(config)?, count),
        Commands::Config { format, preset } => print_config(&preset, format),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<DiceConfig> {
    match path {
        Some(path) => DiceConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(DiceConfig::classic()),
    }
}

fn simulate(config: DiceConfig, cycles: u64, seed: Option<u64>, strategy: Strategy, json: bool) -> Result<()> {
    let name = config.name.clone();
    let mut session = match seed {
        Some(seed) => DiceSession::with_seed(config, seed),
        None => DiceSession::new(config),
    }
    .context("Invalid dice config")?;

    log::info!("Simulating {} cycles of '{}'", cycles, name);

    let mut resets = 0;
    for _ in 0..cycles {
        if !session.can_roll() {
            session.soft_reset();
            resets += 1;
        }
        session.roll_all().context("Roll failed")?;
        if session.settle_pending().is_none() {
            bail!("Cycle did not settle");
        }
        session.apply_last_payout();

        if strategy == Strategy::Greedy {
            buy_greedy(&mut session)?;
        }
    }

    let summary = Summary {
        config: name,
        cycles,
        resets,
        balance: session.balance(),
        active_dice: session.active_dice_count(),
        upgraded_dice: session.upgraded_count(),
        stats: session.stats().clone(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Config:        {}", summary.config);
        println!("Cycles:        {} ({} resets)", summary.cycles, summary.resets);
        println!("Balance:       {}", summary.balance);
        println!("Active dice:   {}", summary.active_dice);
        println!("Upgraded dice: {}", summary.upgraded_dice);
        println!("Best payout:   {}", summary.stats.best_payout);
        println!("Mean payout:   {:.2}", summary.stats.mean_payout());
        println!("Total spent:   {}", summary.stats.total_spent);
    }
    Ok(())
}

/// Unlock first, then upgrade the lowest-index die that is still plain
fn buy_greedy(session: &mut DiceSession) -> Result<()> {
    loop {
        match session.try_unlock_next_die() {
            Ok(_) => continue,
            Err(DiceError::InsufficientFunds { .. } | DiceError::NoInactiveSlot) => break,
            Err(err) => return Err(err).context("Unlock failed"),
        }
    }

    while let Some(index) = session.dice().iter().position(|d| !d.is_upgraded()) {
        match session.try_upgrade_die(index) {
            Ok(_) => {}
            Err(DiceError::InsufficientFunds { .. }) => break,
            Err(err) => return Err(err).context("Upgrade failed"),
        }
    }
    Ok(())
}

fn print_costs(config: &DiceConfig, count: usize) -> Result<()> {
    println!("{:>5}  {:>12}  {:>12}", "owned", "unlock", "upgrade");
    for owned in 0..count {
        println!(
            "{:>5}  {:>12}  {:>12}",
            owned,
            config.unlock.cost_at(owned),
            config.upgrade.cost.cost_at(owned)
        );
    }
    Ok(())
}

fn print_config(preset: &str, format: Format) -> Result<()> {
    let Some(config) = DiceConfig::preset(preset) else {
        bail!("Unknown preset '{preset}'");
    };
    let text = match format {
        Format::Json => config.to_json(),
        Format::Yaml => config.to_yaml(),
    }
    .context("Failed to serialize config")?;
    println!("{text}");
    Ok(())
}
