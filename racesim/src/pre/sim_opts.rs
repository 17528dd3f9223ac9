use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "tortoise-rush",
    about = "A terminal tortoise race animation driven by a time-discrete race simulator"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug printing (headless mode) resp. frame statistics (TUI mode)
    #[clap(short, long)]
    pub debug: bool,

    /// Run without the TUI - the race is simulated at full speed and only the results are printed
    #[clap(long)]
    pub headless: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set the number of racers in the race
    #[clap(short, long, default_value = "5")]
    pub no_racers: usize,

    /// Set path to the simulation parameter file (OPTIONAL: built-in defaults are used if not set)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set real-time factor (only relevant in TUI mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set simulation timestep size in seconds, should be in the range [0.001, 1.0]
    #[clap(short, long, default_value = "0.1")]
    pub timestep_size: f64,

    /// Seed the random number generator for reproducible races
    #[clap(short, long)]
    pub seed: Option<u64>,
}
