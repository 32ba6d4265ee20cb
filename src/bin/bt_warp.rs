/// bt_warp: warp trials stored in safetensors to brain time.
///
/// Input keys:
///   trial_N       [C, T]  trial data (N = 0, 1, …)
///   time          [T]     shared time vector (s)
///   sfreq         [1]     sampling rate (Hz)
///   label         [N]     I32 class labels            (optional)
///   ch_names      U8      newline-separated names      (optional)
///   phase_N       [T]     carrier phase per trial
///   ged_phase_N   [T]     GED carrier phase per trial  (optional)
///   waveshape     [L]     average carrier waveshape    (optional)
///
/// Output keys: see `braintime::io::save_warped`.
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use braintime::io::{load_rows, load_trials, save_warped, StReader};
use braintime::logging::init_tracing;
use braintime::{
    clock_to_brain_with_reporter, CutMethod, LogReporter, PhaseMethod, SourceOrigin, WarpConfig,
    WarpMethod, WarpingSource,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    Stationary,
    Waveshape,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Cut {
    Consistent,
    Cutartefact,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Phase {
    Fft,
    Ged,
}

#[derive(Parser, Debug)]
#[command(name = "bt_warp", about = "Clock-to-brain time warping")]
struct Args {
    /// Trials + carrier phase (safetensors).
    #[arg(long)]
    input: PathBuf,

    /// Warped output (safetensors).
    #[arg(long)]
    output: PathBuf,

    /// Carrier frequency (Hz).
    #[arg(long)]
    freq: f64,

    /// Start of the analysis window (s).
    #[arg(long)]
    t0: f64,

    /// End of the analysis window (s).
    #[arg(long)]
    t1: f64,

    /// Output sampling rate (default: the data's).
    #[arg(long)]
    bts_rate: Option<f64>,

    #[arg(long, value_enum, default_value_t = Method::Stationary)]
    method: Method,

    #[arg(long, value_enum, default_value_t = Cut::Consistent)]
    cut: Cut,

    #[arg(long, value_enum, default_value_t = Phase::Fft)]
    phase: Phase,

    /// Name of the channel the carrier was taken from.
    #[arg(long, default_value = "carrier")]
    carrier: String,

    /// Log every trial's warping path.
    #[arg(long)]
    visual_check: bool,

    /// Worker threads (default: all cores).
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();

    let r = StReader::open(&args.input)?;
    let trials = load_trials(&r)?;
    let phase = load_rows(&r, "phase_")?.context("input has no phase_0 tensor")?;
    let ged_phase = load_rows(&r, "ged_phase_")?;
    let waveshape = if r.contains("waveshape") { Some(r.vec("waveshape")?) } else { None };
    info!(
        trials = trials.len(),
        channels = trials.n_channels(),
        sfreq = trials.sfreq,
        "loaded {}",
        args.input.display()
    );

    let source = WarpingSource {
        phase,
        ged_phase,
        freq: args.freq,
        time_window: (args.t0, args.t1),
        cut: match args.cut {
            Cut::Consistent => CutMethod::ConsistentTime,
            Cut::Cutartefact => CutMethod::CutArtefact,
        },
        waveshape,
        origin: SourceOrigin::Channel(args.carrier),
    };
    let cfg = WarpConfig {
        method: match args.method {
            Method::Stationary => WarpMethod::Stationary,
            Method::Waveshape => WarpMethod::Waveshape,
        },
        phase_method: match args.phase {
            Phase::Fft => PhaseMethod::Fft,
            Phase::Ged => PhaseMethod::Ged,
        },
        visual_check: args.visual_check,
        bts_rate: args.bts_rate,
        workers: args.workers,
        ..WarpConfig::default()
    };

    let warped = clock_to_brain_with_reporter(&trials, &source, &cfg, &LogReporter)?;
    save_warped(&warped, &args.output)?;
    info!(
        samples = warped.n_samples(),
        cycles = warped.n_cycles,
        warnings = warped.diagnostics.warnings().len(),
        "written {}",
        args.output.display()
    );
    Ok(())
}
