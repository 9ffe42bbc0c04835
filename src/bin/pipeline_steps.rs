/// pipeline_steps: read a recording, run each conditioning stage separately,
/// and write every intermediate array to a safetensors file for inspection
/// or comparison with another toolchain.
///
/// Output keys:
///   raw        [C, T]       f64  input (cast from the file dtype)
///   pruned     [C', T]      f64  after channel removal
///   filtered   [C', T]      f64  after zero-phase band-pass
///   cleaned    [C', T]      f64  after per-channel z-score
///   sos        [N, 6]       f64  band-pass second-order sections
///   b, a       [2N+1]       f64  expanded band-pass coefficients
///   ch_mean    [C']         f64  per-channel mean before z-score
///   ch_std     [C']         f64  per-channel std before z-score
///   kept       [C']         i32  original channel index of each row
use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use ndarray::Array2;
use std::path::PathBuf;
use std::time::Instant;

use eegcond::{
    filter::{apply_zero_phase_inplace, design_bandpass, design_bandpass_sos},
    io::{Signal, SignalFile, StWriter},
    normalize::{flat_channels, zscore_channels_inplace},
    prune::{kept_channels, prune_channels},
    EdgePadding, FilterConfig,
};

#[derive(Parser, Debug)]
#[command(name = "pipeline_steps")]
struct Args {
    /// Input safetensors file with a `data` tensor.
    #[arg(long)]
    input: PathBuf,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// Sampling rate (Hz); falls back to the file's `sfreq`.
    #[arg(long)]
    sfreq: Option<f64>,

    /// Pass-band lower edge (Hz).
    #[arg(long, default_value_t = 0.5)]
    low_cut: f64,

    /// Pass-band upper edge (Hz).
    #[arg(long, default_value_t = 49.0)]
    high_cut: f64,

    /// Butterworth prototype order.
    #[arg(long, default_value_t = 4)]
    order: usize,

    /// Channel indices to drop, comma-separated. Required; pass it empty to
    /// keep every channel.
    #[arg(long, value_delimiter = ',', num_args = 0..)]
    prune: Option<Vec<usize>>,

    /// Edge padding: odd, even or constant.
    #[arg(long, default_value = "odd")]
    padding: EdgePadding,
}

fn pruned_indices(args: &Args) -> Result<&[usize]> {
    match &args.prune {
        Some(idx) => Ok(idx.as_slice()),
        None => bail!("no channel layout: pass --prune (possibly empty)"),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let prune = pruned_indices(&args)?;

    let file = SignalFile::load(&args.input)?;
    let raw: Array2<f64> = match file.data {
        Signal::F32(a) => a.mapv(f64::from),
        Signal::F64(a) => a,
    };
    let sfreq = args.sfreq.or(file.sfreq).unwrap_or(1000.0);
    let filter_cfg = FilterConfig::new(sfreq, args.low_cut, args.high_cut, args.order)?;

    // ── 1. Prune ───────────────────────────────────────────────────────────
    let t_pr = Instant::now();
    let pruned = prune_channels(raw.view(), prune)?;
    let kept = kept_channels(raw.nrows(), &prune.iter().copied().collect())?;
    let ms_pr = t_pr.elapsed().as_secs_f64() * 1000.0;

    // ── 2. Band-pass ───────────────────────────────────────────────────────
    let t_bp = Instant::now();
    let sos = design_bandpass_sos(&filter_cfg)?;
    let coeffs = design_bandpass(&filter_cfg)?;
    let mut filtered = pruned.clone();
    apply_zero_phase_inplace(&mut filtered, &sos, args.padding, true)?;
    let flat = flat_channels(pruned.view(), 0.0);
    for (mut row, &is_flat) in filtered.rows_mut().into_iter().zip(&flat) {
        if is_flat {
            row.fill(0.0);
        }
    }
    let ms_bp = t_bp.elapsed().as_secs_f64() * 1000.0;

    // ── 3. Z-score ─────────────────────────────────────────────────────────
    let t_z = Instant::now();
    let mut cleaned = filtered.clone();
    let stats = zscore_channels_inplace(&mut cleaned, 0.0, true);
    let ms_z = t_z.elapsed().as_secs_f64() * 1000.0;

    // Format: "TIMING prune=Xms bandpass=Xms zscore=Xms"
    eprintln!("TIMING prune={ms_pr:.4}ms bandpass={ms_bp:.4}ms zscore={ms_z:.4}ms");
    info!(
        "{} → {} ch × {} samples @ {sfreq} Hz, {} sections",
        raw.nrows(),
        cleaned.nrows(),
        cleaned.ncols(),
        sos.n_sections()
    );

    // ── 4. Write output ────────────────────────────────────────────────────
    info!("Writing → {}", args.output.display());
    let mut w = StWriter::new();
    w.add_signal("raw", &Signal::F64(raw));
    w.add_f64_arr2("pruned", &pruned);
    w.add_f64_arr2("filtered", &filtered);
    w.add_f64_arr2("cleaned", &cleaned);
    let flat_sos: Vec<f64> = sos.sections.iter().flatten().copied().collect();
    w.add_f64("sos", &flat_sos, &[sos.n_sections(), 6]);
    w.add_f64("b", &coeffs.b, &[coeffs.b.len()]);
    w.add_f64("a", &coeffs.a, &[coeffs.a.len()]);

    let means: Vec<f64> = stats.iter().map(|s| s.mean).collect();
    let stds: Vec<f64> = stats.iter().map(|s| s.std).collect();
    w.add_f64("ch_mean", &means, &[means.len()]);
    w.add_f64("ch_std", &stds, &[stds.len()]);
    w.add_indices("kept", &kept);
    w.write(&args.output)?;

    info!("Done.");
    Ok(())
}
