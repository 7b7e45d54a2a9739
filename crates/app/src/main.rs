use std::path::PathBuf;

use bendulum_core::{
    correct_interval, AppConfig, Bendulum, BendulumError, EngineStatus, RunMode,
    SimulatedResonator,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_RUNNING_BEATS: u64 = 20;

fn main() -> bendulum_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => run_simulate(args),
        Commands::Correct { raw_us, bias } => run_correct(raw_us, bias),
    }
}

fn run_simulate(args: SimulateArgs) -> bendulum_core::Result<()> {
    let config = args.resolve_config()?;
    tracing::info!(
        settle = config.engine.settle_cycles,
        scale = config.engine.scale_cycles,
        smoothing = config.engine.smoothing_pairs,
        bias = config.engine.bias,
        mode = %config.engine.initial_mode,
        "starting simulated bendulum"
    );

    let resonator = SimulatedResonator::new(config.simulation.clone());
    let mut bendulum = Bendulum::with_config(resonator, &config);

    // Starting out calibrated there is no mode change to wait for.
    let limit = args.beats.or_else(|| {
        (config.engine.initial_mode == RunMode::Running).then_some(DEFAULT_RUNNING_BEATS)
    });

    let mut displayed_us: i64 = 0;
    let mut beats: u64 = 0;
    let mut clock_start: Option<(i64, u64)> = None;
    loop {
        match limit {
            Some(limit) if beats >= limit => break,
            None if bendulum.engine().mode() == RunMode::Running && beats > 0 => break,
            _ => {}
        }

        let before = bendulum.engine().mode();
        displayed_us += bendulum.beat()?;
        beats += 1;

        let after = bendulum.engine().mode();
        if before != after {
            let status = bendulum.engine().status();
            tracing::info!(
                beat = beats,
                from = %before,
                to = %after,
                beat_duration_us = status.beat_duration_us,
                peak_scale = status.peak_scale,
                "mode change"
            );
        }
        if after == RunMode::Running && clock_start.is_none() {
            clock_start = Some((displayed_us, bendulum.hardware().true_now_us()));
        }
    }

    let status = bendulum.engine().status();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    print_status(beats, &status);
    if let Some((displayed_at_start, true_at_start)) = clock_start {
        let displayed = displayed_us - displayed_at_start;
        let elapsed = (bendulum.hardware().true_now_us() - true_at_start) as i64;
        println!(
            "clock while running: displayed {:.3} s, true {:.3} s, error {} us",
            displayed as f64 / 1e6,
            elapsed as f64 / 1e6,
            displayed - elapsed
        );
    }
    Ok(())
}

fn print_status(beats: u64, status: &EngineStatus) {
    let counter = status
        .cycle_counter
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("beats: {beats}");
    println!("mode: {} (counter {counter})", status.mode);
    println!(
        "beat duration: {} us, tick avg {} us, tock avg {} us",
        status.beat_duration_us, status.tick_avg_us, status.tock_avg_us
    );
    println!(
        "avg bpm {:.4}, current bpm {:.4}, tick/tock {:.5}",
        status.avg_bpm, status.cur_bpm, status.delta
    );
    println!("bias {} (0.1 s/day), peak scale {}", status.bias, status.peak_scale);
}

fn run_correct(raw_us: i64, bias: i32) -> bendulum_core::Result<()> {
    if raw_us < 0 {
        return Err(BendulumError::InvalidInput("raw interval cannot be negative"));
    }
    let corrected = correct_interval(raw_us, i64::from(bias));
    tracing::debug!(raw_us, bias, corrected, "bias correction");
    println!("{corrected}");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive and calibrate a bendulum", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the beat engine against a simulated bendulum.
    Simulate(SimulateArgs),
    /// Print a raw interval with the clock bias correction applied.
    Correct {
        /// Raw interval in microseconds.
        raw_us: i64,
        /// Clock correction in tenths of a second per day.
        #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
        bias: i32,
    },
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// JSON configuration file. Command line options override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Number of beats to run. By default runs until calibration completes.
    #[arg(short = 'n', long)]
    beats: Option<u64>,
    /// Starting run mode.
    #[arg(long)]
    mode: Option<RunMode>,
    /// Clock correction in tenths of a second per day.
    #[arg(long, allow_hyphen_values = true)]
    bias: Option<i32>,
    /// Cycles to spend settling.
    #[arg(long)]
    settle: Option<u32>,
    /// Cycles to spend scaling.
    #[arg(long)]
    scale: Option<u32>,
    /// Tick/tock pairs to average while calibrating.
    #[arg(long)]
    smoothing: Option<u32>,
    /// Known beat duration in microseconds.
    #[arg(long)]
    beat_duration: Option<i64>,
    /// Simulated tick duration in microseconds.
    #[arg(long)]
    tick_us: Option<u64>,
    /// Simulated tock duration in microseconds.
    #[arg(long)]
    tock_us: Option<u64>,
    /// How slow the simulated board clock runs, in tenths of a second per day.
    #[arg(long, allow_hyphen_values = true)]
    clock_error: Option<i64>,
    /// Give up on a beat after this many milliseconds without a passage.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Print the final status as JSON.
    #[arg(long)]
    json: bool,
}

impl SimulateArgs {
    fn resolve_config(&self) -> bendulum_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        let engine = &mut config.engine;
        if let Some(mode) = self.mode {
            engine.initial_mode = mode;
        }
        if let Some(bias) = self.bias {
            engine.bias = bias;
        }
        if let Some(settle) = self.settle {
            engine.settle_cycles = settle;
        }
        if let Some(scale) = self.scale {
            engine.scale_cycles = scale;
        }
        if let Some(smoothing) = self.smoothing {
            engine.smoothing_pairs = smoothing;
        }
        if let Some(beat) = self.beat_duration {
            engine.beat_duration_us = Some(beat);
        }

        let simulation = &mut config.simulation;
        if let Some(tick) = self.tick_us {
            simulation.tick_us = tick;
        }
        if let Some(tock) = self.tock_us {
            simulation.tock_us = tock;
        }
        if let Some(error) = self.clock_error {
            simulation.clock_error = error;
        }
        if self.timeout_ms.is_some() {
            config.detector.timeout_ms = self.timeout_ms;
        }

        let engine = &config.engine;
        if engine.initial_mode == RunMode::Running && engine.beat_duration_us.is_none() {
            return Err(BendulumError::msg(
                "starting in running mode needs a known beat duration (--beat-duration)",
            ));
        }

        config.validate()?;
        Ok(config)
    }
}
