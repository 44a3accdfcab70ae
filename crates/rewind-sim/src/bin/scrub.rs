//! Scrub a simulated trace from the command line.
//!
//! ```bash
//! # Seek to frame 2400 of a 2500-frame trace, then run 20 rebuild ticks
//! scrub run --frames 2500 --seek 2400 --ticks 20
//!
//! # Edit an input at frame 500 and watch the cache repair itself
//! scrub run --seek 2400 --edit 500 --ticks 50
//!
//! # Show the effective configuration
//! scrub config
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rewind::{Frame, InputLog, RegionRole};
use rewind_config::{ConfigLoader, RewindConfig};
use rewind_sim::SimInput;
use tracing_subscriber::EnvFilter;

/// Scrub through a deterministic simulation backed by the rewind checkpoint cache.
#[derive(Parser)]
#[command(name = "scrub")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding rewind.toml.
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seek, optionally edit, and run rebuild ticks.
    Run {
        /// Input log length (overrides sim.frames).
        #[arg(long)]
        frames: Option<u64>,

        /// Frame to move the playhead to.
        #[arg(long, default_value = "0")]
        seek: u64,

        /// Rebuild ticks to run after the seek.
        #[arg(long, default_value = "10")]
        ticks: u32,

        /// Simulation seed (overrides sim.seed).
        #[arg(long)]
        seed: Option<u64>,

        /// Flip the input at this frame before ticking.
        #[arg(long)]
        edit: Option<u64>,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(project) = &cli.project {
        loader = loader.with_project_dir(project);
    }
    let config = loader.load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    match cli.command {
        Commands::Run {
            frames,
            seek,
            ticks,
            seed,
            edit,
        } => {
            let mut config = config;
            if let Some(frames) = frames {
                config.sim.frames = frames;
            }
            if let Some(seed) = seed {
                config.sim.seed = seed;
            }
            run(&config, Frame::new(seek), ticks, edit.map(Frame::new))
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn run(config: &RewindConfig, seek: Frame, ticks: u32, edit: Option<Frame>) -> Result<()> {
    let mut system = rewind_sim::build_system(config)?;
    println!(
        "trace: {} frames, {}-byte state, {} global / {} block slots",
        system.inputs().len(),
        config.sim.state_len,
        system.region(RegionRole::Global).len(),
        system.region(RegionRole::CurrentBlock).len(),
    );

    system
        .set_current_frame(seek)
        .with_context(|| format!("Failed to seek to frame {seek}"))?;
    println!("seek: playhead at {seek}, {:?}", system.stats());

    if let Some(frame) = edit {
        let current = system
            .inputs()
            .get(frame)
            .copied()
            .with_context(|| format!("No input at frame {frame}"))?;
        let flipped = SimInput {
            buttons: !current.buttons,
            ..current
        };
        system.set_input(frame, flipped)?;
        println!(
            "edit: input at {frame} flipped, last valid frame now {}",
            display(system.last_valid_frame())
        );
    }

    for tick in 1..=ticks {
        let report = system.tick()?;
        println!(
            "tick {tick:>3}: rebuilt {:>3} slots in {:>6} steps, progress {:>5.1}%{}",
            report.rebuilt_slots,
            report.steps,
            report.progress * 100.0,
            if report.budget_exhausted { " (budget)" } else { "" },
        );
    }

    let playhead = system.current_frame();
    match system.frame_summary(playhead) {
        Some(summary) => println!(
            "frame {playhead}: x={} y={} digest={:016x}",
            summary.x, summary.y, summary.digest
        ),
        None => println!("frame {playhead}: summary stale"),
    }
    let nearest = system.find_nearest_checkpoint(playhead);
    println!(
        "nearest checkpoint before {playhead}: {nearest:?} at {}",
        display(system.checkpoint_frame(nearest)),
    );
    println!("stats: {:?}", system.stats());
    Ok(())
}

fn display(frame: Option<Frame>) -> String {
    frame.map_or_else(|| "none".to_string(), |frame| frame.to_string())
}
