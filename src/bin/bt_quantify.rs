/// bt_quantify: AC map and spectral peaks of a TGM stored in safetensors.
///
/// Input keys:
///   tgm   [n, n]   time-generalization matrix
///
/// Output keys: see `braintime::io::save_quantification`.
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use braintime::io::{save_quantification, StReader};
use braintime::logging::init_tracing;
use braintime::{quantify_tgm_with_reporter, LogReporter, QuantifyConfig, RefDimension};

#[derive(Parser, Debug)]
#[command(name = "bt_quantify", about = "TGM recurrence quantification")]
struct Args {
    /// TGM input (safetensors, key `tgm`).
    #[arg(long)]
    input: PathBuf,

    /// Quantification output (safetensors).
    #[arg(long)]
    output: PathBuf,

    /// TGM samples per second(-equivalent).
    #[arg(long, default_value_t = 128.0)]
    sample_rate: f64,

    /// Carrier frequency: express frequencies per cycle (brain time).
    #[arg(long)]
    braintime: Option<f64>,

    /// Lower edge of the peak search range in Hz.
    #[arg(long, requires = "foi_hi")]
    foi_lo: Option<f64>,

    /// Upper edge of the peak search range in Hz.
    #[arg(long, requires = "foi_lo")]
    foi_hi: Option<f64>,

    /// Log the AC map summary.
    #[arg(long)]
    figure: bool,
}

fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();

    let tgm = StReader::open(&args.input)?.array2("tgm")?;
    let cfg = QuantifyConfig {
        ref_dimension: match args.braintime {
            Some(carrier_freq) => RefDimension::BrainTime { carrier_freq },
            None => RefDimension::ClockTime,
        },
        sample_rate: args.sample_rate,
        foi: args.foi_lo.zip(args.foi_hi),
        figure: args.figure,
    };

    let quant = quantify_tgm_with_reporter(tgm.view(), &cfg, &LogReporter)?;
    save_quantification(&quant, &args.output)?;
    info!(
        side = tgm.nrows(),
        dominant = quant.dominant().map(|p| p.freq),
        "written {}",
        args.output.display()
    );
    Ok(())
}
