use anyhow::{bail, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use eegcond::io::{Signal, SignalFile, StWriter};
use eegcond::{ChannelLayout, ConditionReport, ConditionerConfig, EdgePadding, FilterConfig, SignalConditioner};

#[derive(Parser)]
#[command(name = "eegcond", about = "Prune, band-pass and z-score a multi-channel EEG recording")]
struct Args {
    /// safetensors file with a `data` tensor [channels, samples] (F32 or F64)
    #[arg(long)]
    input: PathBuf,

    /// Output safetensors path
    #[arg(long)]
    output: PathBuf,

    /// JSON conditioner config; the flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sampling rate in Hz (default: the file's `sfreq`, then the config, then 1000)
    #[arg(long)]
    sfreq: Option<f64>,

    /// Pass-band lower edge in Hz (default: 0.5)
    #[arg(long)]
    low_cut: Option<f64>,

    /// Pass-band upper edge in Hz (default: 49)
    #[arg(long)]
    high_cut: Option<f64>,

    /// Butterworth prototype order (default: 4)
    #[arg(long)]
    order: Option<usize>,

    /// Channel indices to drop, comma-separated, 0-based (e.g. 32,42,59,63)
    #[arg(long, value_delimiter = ',', num_args = 0..)]
    prune: Option<Vec<usize>>,

    /// Edge padding for the zero-phase filter: odd, even or constant
    #[arg(long)]
    padding: Option<EdgePadding>,

    /// Treat channels with raw range or post-filter std at or below this as flat
    #[arg(long)]
    zero_variance_tolerance: Option<f64>,

    /// Process channels on one thread
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let file = SignalFile::load(&args.input)?;
    let (n_ch, n_t) = file.data.dim();
    info!("Loaded {n_ch} ch × {n_t} samples ({})", file.data.dtype());

    let cfg = resolve_config(&args, file.sfreq)?;
    info!(
        "Band-pass {}–{} Hz, order {}, fs {} Hz; dropping {:?} ({})",
        cfg.filter.low_cut_hz(),
        cfg.filter.high_cut_hz(),
        cfg.filter.order(),
        cfg.filter.sampling_rate_hz(),
        cfg.layout.pruned,
        cfg.layout.name
    );
    let conditioner = SignalConditioner::new(cfg)?;

    let mut w = StWriter::new();
    let report = match &file.data {
        Signal::F32(raw) => {
            let out = conditioner.condition(raw.view())?;
            w.add_f32_arr2("cleaned", &out.data);
            out.report
        }
        Signal::F64(raw) => {
            let out = conditioner.condition(raw.view())?;
            w.add_f64_arr2("cleaned", &out.data);
            out.report
        }
    };
    summarize(&report);

    w.add_indices("kept_channels", &report.kept_channels);
    w.add_indices("degraded_channels", &report.degraded_channels());
    w.add_f64("sfreq", &[conditioner.config().filter.sampling_rate_hz()], &[1]);
    w.write(&args.output)?;
    info!("Written → {}", args.output.display());

    Ok(())
}

fn resolve_config(args: &Args, file_sfreq: Option<f64>) -> Result<ConditionerConfig> {
    let base = args
        .config
        .as_deref()
        .map(ConditionerConfig::from_json_file)
        .transpose()?;
    let defaults = base.as_ref().map(|c| c.filter).unwrap_or_default();

    if let (Some(file_fs), Some(cfg)) = (file_sfreq, base.as_ref()) {
        if args.sfreq.is_none() && (file_fs - cfg.filter.sampling_rate_hz()).abs() > 1e-6 {
            warn!(
                "config says {} Hz but the recording says {file_fs} Hz; using the recording",
                cfg.filter.sampling_rate_hz()
            );
        }
    }

    let filter = FilterConfig::new(
        args.sfreq.or(file_sfreq).unwrap_or(defaults.sampling_rate_hz()),
        args.low_cut.unwrap_or(defaults.low_cut_hz()),
        args.high_cut.unwrap_or(defaults.high_cut_hz()),
        args.order.unwrap_or(defaults.order()),
    )?;

    let layout = match (&args.prune, &base) {
        (Some(indices), _) => ChannelLayout::new("cli", indices.iter().copied()),
        (None, Some(cfg)) => cfg.layout.clone(),
        (None, None) => bail!("no channel layout: pass --prune (possibly empty) or a --config with a layout"),
    };

    let mut cfg = base.unwrap_or_else(|| ConditionerConfig::new(filter, layout.clone()));
    cfg.filter = filter;
    cfg.layout = layout;
    if let Some(padding) = args.padding {
        cfg.padding = padding;
    }
    if let Some(tol) = args.zero_variance_tolerance {
        cfg.zero_variance_tolerance = tol;
    }
    if args.sequential {
        cfg.parallel = false;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn summarize(report: &ConditionReport) {
    let t = &report.timings;
    info!(
        "Kept {} channels in {:.3} ms (prune {:.3} · filter {:.3} · z-score {:.3})",
        report.kept_channels.len(),
        t.total().as_secs_f64() * 1e3,
        t.prune.as_secs_f64() * 1e3,
        t.filter.as_secs_f64() * 1e3,
        t.normalize.as_secs_f64() * 1e3,
    );
    let degraded = report.degraded_channels();
    if !degraded.is_empty() {
        warn!("{} flat channel(s) left unscaled: {degraded:?}", degraded.len());
    }
}
