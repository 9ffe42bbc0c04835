//! # eegcond — EEG signal conditioning for BCI classifiers
//!
//! `eegcond` turns a raw multi-channel EEG recording into the cleaned,
//! per-channel-normalised array a classifier or exported model consumes.
//! The DSP matches SciPy's `butter` + `filtfilt` and NumPy's axis-wise z-score.
//!
//! ## Pipeline overview
//!
//! ```text
//! raw [C, T]  (f32 or f64)
//!   │
//!   ├─ prune        drop layout-specific non-EEG rows (e.g. 32, 42, 59, 63)
//!   ├─ band-pass    Butterworth, forward–backward (zero phase), odd padding
//!   └─ z-score      per channel: (x − μ_c) / σ_c, σ_c = 0 → divisor 1
//!        │
//!        └─→ [C − pruned, T]  same dtype, plus a ConditionReport
//! ```
//!
//! ## Quick start
//!
//! ```
//! use eegcond::{ChannelLayout, ConditionerConfig, FilterConfig, SignalConditioner};
//! use ndarray::Array2;
//!
//! // 1 kHz · 0.5–49 Hz · order 4, on the 64-channel cap.
//! let cfg = ConditionerConfig::new(FilterConfig::default(), ChannelLayout::sixty_four_channel());
//! let conditioner = SignalConditioner::new(cfg).unwrap();
//!
//! let raw: Array2<f32> = Array2::from_shape_fn((64, 500), |(c, t)| ((c * t) as f32 * 0.01).sin());
//! let out = conditioner.condition(raw.view()).unwrap();
//!
//! assert_eq!(out.data.dim(), (60, 500));
//! for ch in out.report.degraded_channels() {
//!     eprintln!("channel {ch} looks disconnected");
//! }
//! ```
//!
//! ## Running individual steps
//!
//! Each stage is also exposed as a standalone function:
//!
//! ```
//! use eegcond::filter::{apply_zero_phase_inplace, design_bandpass_sos};
//! use eegcond::normalize::zscore_channels_inplace;
//! use eegcond::prune::prune_channels;
//! use eegcond::{EdgePadding, FilterConfig};
//! use ndarray::Array2;
//!
//! let raw: Array2<f64> = Array2::from_shape_fn((8, 1000), |(c, t)| (c as f64 + t as f64 * 0.02).sin());
//!
//! let mut data = prune_channels(raw.view(), &[7]).unwrap();
//! let sos = design_bandpass_sos(&FilterConfig::new(250.0, 1.0, 40.0, 4).unwrap()).unwrap();
//! apply_zero_phase_inplace(&mut data, &sos, EdgePadding::Odd, true).unwrap();
//! let stats = zscore_channels_inplace(&mut data, 0.0, true);
//! assert_eq!(stats.len(), 7);
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod inference;
pub mod io;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod prune;

use ndarray::ArrayView2;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{ChannelLayout, ConditionerConfig, EdgePadding, FilterConfig};

// error
pub use error::{ConditionError, Result};

// filter — design + zero-phase application
pub use filter::{
    apply_zero_phase_inplace, design_bandpass, design_bandpass_sos, filtfilt, sosfiltfilt, FilterCoefficients,
    SecondOrderSections,
};

// normalize
pub use normalize::{zscore_channels, zscore_channels_inplace, ChannelStats};

// prune
pub use prune::{kept_channels, prune_channels};

// pipeline
pub use pipeline::{ConditionReport, Conditioned, Sample, SignalConditioner, StageTimings};

// collaborators
pub use inference::{InferenceSession, ShapeChecked};
pub use metrics::{Evaluator, Metrics};

/// Run the **full conditioning pipeline** once.
///
/// Designs the filter from `config`, then prunes, band-passes and z-scores
/// `raw` (`[C, T]`). Build a [`SignalConditioner`] instead when conditioning
/// many recordings with one configuration, so the filter is designed once.
///
/// # Errors
///
/// Any configuration error from [`SignalConditioner::new`] and any per-call
/// error from [`SignalConditioner::condition`].
pub fn condition<A: Sample>(raw: ArrayView2<A>, config: &ConditionerConfig) -> Result<Conditioned<A>> {
    SignalConditioner::new(config.clone())?.condition(raw)
}
