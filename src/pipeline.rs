//! The conditioning pipeline: prune → band-pass → z-score.
use std::time::{Duration, Instant};

use log::{debug, warn};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::config::ConditionerConfig;
use crate::error::{ConditionError, Result};
use crate::filter::{
    apply_zero_phase_inplace, design_bandpass, design_bandpass_sos, FilterCoefficients, SecondOrderSections,
};
use crate::normalize::{flat_channels, zscore_channels_inplace, ChannelStats};
use crate::prune::{kept_channels, prune_channel_set};

/// Element types accepted at the pipeline boundary. Arithmetic is always f64.
pub trait Sample: Copy + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
}

impl Sample for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
}

impl Sample for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

/// Wall-clock time spent in each stage of one call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub prune: Duration,
    pub filter: Duration,
    pub normalize: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.prune + self.filter + self.normalize
    }
}

/// Diagnostics for one [`SignalConditioner::condition`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionReport {
    /// Original row index of every output row.
    pub kept_channels: Vec<usize>,
    /// Pre-normalisation statistics of every output row (post-filter).
    pub stats: Vec<ChannelStats>,
    pub timings: StageTimings,
}

impl ConditionReport {
    /// Original indices of channels that hit the zero-variance guard. A
    /// non-empty list usually means a disconnected or saturated electrode.
    pub fn degraded_channels(&self) -> Vec<usize> {
        self.kept_channels
            .iter()
            .zip(&self.stats)
            .filter(|(_, s)| s.degraded)
            .map(|(&ch, _)| ch)
            .collect()
    }

    pub fn has_degradation(&self) -> bool {
        self.stats.iter().any(|s| s.degraded)
    }
}

/// Output of the pipeline: the cleaned `[C − pruned, T]` signal and its report.
#[derive(Debug, Clone)]
pub struct Conditioned<A> {
    pub data: Array2<A>,
    pub report: ConditionReport,
}

/// Immutable conditioning pipeline.
///
/// Holds a validated [`ConditionerConfig`] and the band-pass designed from
/// it, both as second-order sections (used for filtering) and as expanded
/// coefficients (for reporting). Calls share no mutable state, so one conditioner can be
/// used from many threads.
///
/// ```
/// use eegcond::{ChannelLayout, ConditionerConfig, FilterConfig, SignalConditioner};
/// use ndarray::Array2;
///
/// let cfg = ConditionerConfig::new(FilterConfig::default(), ChannelLayout::sixty_four_channel());
/// let conditioner = SignalConditioner::new(cfg).unwrap();
///
/// let raw = Array2::from_shape_fn((64, 1000), |(c, t)| ((c + 1) as f64 * t as f64 * 0.01).sin());
/// let out = conditioner.condition(raw.view()).unwrap();
/// assert_eq!(out.data.dim(), (60, 1000));
/// ```
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    config: ConditionerConfig,
    sections: SecondOrderSections,
    coeffs: FilterCoefficients,
}

impl SignalConditioner {
    pub fn new(config: ConditionerConfig) -> Result<Self> {
        config.validate()?;
        let sections = design_bandpass_sos(&config.filter)?;
        let coeffs = design_bandpass(&config.filter)?;
        debug!(
            "conditioner ready: layout '{}' drops {:?}, padding {:?}, parallel={}",
            config.layout.name, config.layout.pruned, config.padding, config.parallel
        );
        Ok(Self { config, sections, coeffs })
    }

    pub fn config(&self) -> &ConditionerConfig {
        &self.config
    }

    pub fn sections(&self) -> &SecondOrderSections {
        &self.sections
    }

    /// Expanded `(b, a)` form of the band-pass. Filtering never uses it.
    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coeffs
    }

    /// Shortest time axis the filter stage accepts.
    pub fn min_samples(&self) -> usize {
        self.sections.pad_len() + 1
    }

    /// Run the full pipeline on `raw` (`[C, T]`).
    ///
    /// # Errors
    ///
    /// * [`ConditionError::ChannelCountMismatch`] if the layout declares a
    ///   channel count and `raw` has a different one.
    /// * [`ConditionError::ChannelIndexOutOfRange`] if a pruned index does not
    ///   exist in `raw`.
    /// * [`ConditionError::EmptySignal`] if `raw` has no samples or every
    ///   channel is pruned.
    /// * [`ConditionError::SignalTooShort`] if `T < self.min_samples()`.
    ///
    /// Zero-variance channels are not errors; see [`ConditionReport::degraded_channels`].
    /// A channel whose raw range is within `zero_variance_tolerance` comes out
    /// all zeros and flagged, whatever residue the filter leaves on it.
    pub fn condition<A: Sample>(&self, raw: ArrayView2<A>) -> Result<Conditioned<A>> {
        let layout = &self.config.layout;
        let (n_ch, n_t) = raw.dim();

        if let Some(expected) = layout.n_channels {
            if expected != n_ch {
                return Err(ConditionError::ChannelCountMismatch { expected, actual: n_ch });
            }
        }
        if n_t == 0 {
            return Err(ConditionError::EmptySignal("no samples on the time axis"));
        }

        // 1. Prune.
        let t = Instant::now();
        let kept = kept_channels(n_ch, &layout.pruned)?;
        if kept.is_empty() {
            return Err(ConditionError::EmptySignal("every channel is pruned"));
        }
        let mut data: Array2<f64> = prune_channel_set(raw, &layout.pruned)?.mapv(A::to_f64);
        let prune = t.elapsed();

        // 2. Zero-phase band-pass. Raw-flat rows are cleared afterwards.
        let t = Instant::now();
        let flat = flat_channels(data.view(), self.config.zero_variance_tolerance);
        apply_zero_phase_inplace(&mut data, &self.sections, self.config.padding, self.config.parallel)?;
        for (mut row, &is_flat) in data.rows_mut().into_iter().zip(&flat) {
            if is_flat {
                row.fill(0.0);
            }
        }
        let filter = t.elapsed();

        // 3. Per-channel z-score.
        let t = Instant::now();
        let stats = zscore_channels_inplace(&mut data, self.config.zero_variance_tolerance, self.config.parallel);
        let normalize = t.elapsed();

        for ((&ch, s), &raw_flat) in kept.iter().zip(&stats).zip(&flat) {
            if raw_flat {
                warn!("channel {ch} of layout '{}' is flat in the raw signal; output zeroed", layout.name);
            } else if s.degraded {
                warn!(
                    "channel {ch} of layout '{}' is flat after filtering (std = {:.3e}); left unscaled",
                    layout.name, s.std
                );
            }
        }

        let report = ConditionReport {
            kept_channels: kept,
            stats,
            timings: StageTimings { prune, filter, normalize },
        };
        debug!(
            "conditioned {n_ch}×{n_t} → {}×{n_t} in {:?}",
            report.kept_channels.len(),
            report.timings.total()
        );

        Ok(Conditioned { data: data.mapv(A::from_f64), report })
    }

    /// Condition several trials (e.g. epochs of one session) with the same
    /// settings, one rayon task per trial. Results keep the input order. If
    /// any trial fails, one of the failures is returned.
    pub fn condition_batch<A: Sample>(&self, trials: &[ArrayView2<A>]) -> Result<Vec<Conditioned<A>>> {
        trials.par_iter().map(|trial| self.condition(trial.view())).collect()
    }
}
