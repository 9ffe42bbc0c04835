//! Conditioning configuration.
//!
//! [`FilterConfig`] holds the band-pass parameters and is validated when it is
//! built, so a value of that type is always a designable filter.
//! [`ChannelLayout`] names the channels to discard for one electrode montage.
//! [`ConditionerConfig`] bundles both with the remaining knobs of the pipeline.
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{ConditionError, Result};

/// Band-pass filter parameters.
///
/// Invariant: `0 < low_cut_hz < high_cut_hz < sampling_rate_hz / 2` and
/// `order >= 1`. Fields are private; the only ways to obtain a value are
/// [`FilterConfig::new`], [`FilterConfig::default`] and deserialization, and
/// all three enforce the invariant.
///
/// ```
/// use eegcond::FilterConfig;
///
/// let cfg = FilterConfig::new(250.0, 1.0, 40.0, 4).unwrap();
/// assert_eq!(cfg.nyquist_hz(), 125.0);
///
/// // low >= high is rejected up front.
/// assert!(FilterConfig::new(1000.0, 60.0, 49.0, 4).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FilterConfigFields", into = "FilterConfigFields")]
pub struct FilterConfig {
    sampling_rate_hz: f64,
    low_cut_hz: f64,
    high_cut_hz: f64,
    order: usize,
}

impl FilterConfig {
    pub fn new(sampling_rate_hz: f64, low_cut_hz: f64, high_cut_hz: f64, order: usize) -> Result<Self> {
        validate_band(sampling_rate_hz, low_cut_hz, high_cut_hz, order)?;
        Ok(Self { sampling_rate_hz, low_cut_hz, high_cut_hz, order })
    }

    pub fn sampling_rate_hz(&self) -> f64 {
        self.sampling_rate_hz
    }

    pub fn low_cut_hz(&self) -> f64 {
        self.low_cut_hz
    }

    pub fn high_cut_hz(&self) -> f64 {
        self.high_cut_hz
    }

    /// Order of the analog low-pass prototype. The band-pass filter built from
    /// it has `2 * order` poles.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn nyquist_hz(&self) -> f64 {
        self.sampling_rate_hz / 2.0
    }

    /// Band edges divided by Nyquist, both in `(0, 1)`.
    pub fn normalized_band(&self) -> (f64, f64) {
        let nyq = self.nyquist_hz();
        (self.low_cut_hz / nyq, self.high_cut_hz / nyq)
    }

    pub(crate) fn check(&self) -> Result<()> {
        validate_band(self.sampling_rate_hz, self.low_cut_hz, self.high_cut_hz, self.order)
    }
}

impl Default for FilterConfig {
    /// 1000 Hz sampling, 0.5–49 Hz pass band, 4th-order prototype.
    fn default() -> Self {
        Self {
            sampling_rate_hz: 1000.0,
            low_cut_hz: 0.5,
            high_cut_hz: 49.0,
            order: 4,
        }
    }
}

fn validate_band(fs: f64, low: f64, high: f64, order: usize) -> Result<()> {
    let invalid = |msg: String| Err(ConditionError::InvalidFilterConfig(msg));

    if !(fs.is_finite() && low.is_finite() && high.is_finite()) {
        return invalid(format!("non-finite parameter (fs={fs}, low={low}, high={high})"));
    }
    if fs <= 0.0 {
        return invalid(format!("sampling rate must be positive, got {fs} Hz"));
    }
    if order < 1 {
        return invalid("filter order must be at least 1".into());
    }
    let nyq = fs / 2.0;
    let (lo, hi) = (low / nyq, high / nyq);
    if lo <= 0.0 || lo >= 1.0 || hi <= 0.0 || hi >= 1.0 {
        return invalid(format!(
            "band edges must lie strictly between 0 and Nyquist ({nyq} Hz), got {low}–{high} Hz"
        ));
    }
    if lo >= hi {
        return invalid(format!("low cut {low} Hz must be below high cut {high} Hz"));
    }
    Ok(())
}

/// Serialized shape of [`FilterConfig`]; missing keys take the defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
struct FilterConfigFields {
    sampling_rate_hz: f64,
    low_cut_hz: f64,
    high_cut_hz: f64,
    order: usize,
}

impl Default for FilterConfigFields {
    fn default() -> Self {
        FilterConfig::default().into()
    }
}

impl TryFrom<FilterConfigFields> for FilterConfig {
    type Error = ConditionError;

    fn try_from(f: FilterConfigFields) -> Result<Self> {
        FilterConfig::new(f.sampling_rate_hz, f.low_cut_hz, f.high_cut_hz, f.order)
    }
}

impl From<FilterConfig> for FilterConfigFields {
    fn from(c: FilterConfig) -> Self {
        Self {
            sampling_rate_hz: c.sampling_rate_hz,
            low_cut_hz: c.low_cut_hz,
            high_cut_hz: c.high_cut_hz,
            order: c.order,
        }
    }
}

/// Channels to discard for one electrode montage.
///
/// Indices are 0-based and kept as an ordered set, so duplicates collapse and
/// the order they were given in is irrelevant. No `Default`: the set is
/// montage-specific and must be chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLayout {
    /// Free-form montage name, used in log lines.
    pub name: String,

    /// Channel rows removed before filtering.
    pub pruned: BTreeSet<usize>,

    /// Channel count the montage is defined for. When set, signals with a
    /// different number of rows are rejected instead of silently pruning the
    /// wrong electrodes.
    #[serde(default)]
    pub n_channels: Option<usize>,
}

impl ChannelLayout {
    pub fn new(name: impl Into<String>, pruned: impl IntoIterator<Item = usize>) -> Self {
        Self {
            name: name.into(),
            pruned: pruned.into_iter().collect(),
            n_channels: None,
        }
    }

    pub fn with_channel_count(mut self, n_channels: usize) -> Self {
        self.n_channels = Some(n_channels);
        self
    }

    /// 64-electrode cap whose rows 32, 42, 59 and 63 carry reference and EOG
    /// leads rather than scalp EEG.
    pub fn sixty_four_channel() -> Self {
        Self::new("64ch", [32, 42, 59, 63]).with_channel_count(64)
    }

    pub fn n_pruned(&self) -> usize {
        self.pruned.len()
    }
}

/// How the signal is extended past its ends before the forward/backward pass.
///
/// The extension length is `3 * max(len(a), len(b))` samples per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePadding {
    /// Point reflection about the end sample: `2*x[0] - x[i]`.
    #[default]
    Odd,
    /// Mirror reflection: `x[i]`.
    Even,
    /// Repeat the end sample.
    Constant,
}

impl FromStr for EdgePadding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "odd" => Ok(Self::Odd),
            "even" => Ok(Self::Even),
            "constant" => Ok(Self::Constant),
            other => Err(format!("unknown padding '{other}' (expected odd, even or constant)")),
        }
    }
}

/// Everything [`crate::SignalConditioner`] needs.
///
/// ```
/// use eegcond::{ChannelLayout, ConditionerConfig, EdgePadding, FilterConfig};
///
/// let cfg = ConditionerConfig {
///     padding: EdgePadding::Even,
///     parallel: false,
///     ..ConditionerConfig::new(FilterConfig::default(), ChannelLayout::sixty_four_channel())
/// };
/// assert_eq!(cfg.layout.n_pruned(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionerConfig {
    /// Band-pass design parameters.
    ///
    /// Default: 1000 Hz · 0.5–49 Hz · order 4.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Channels to drop. Required; there is no montage-independent default.
    pub layout: ChannelLayout,

    /// Edge extension used by the zero-phase filter.
    ///
    /// Default: [`EdgePadding::Odd`].
    #[serde(default)]
    pub padding: EdgePadding,

    /// A channel is treated as flat, and reported as degraded, when its raw
    /// peak-to-peak range or its post-filter standard deviation is `<=` this
    /// value. Raw-flat channels come out as zeros; otherwise the divisor is
    /// forced to 1.
    ///
    /// Default: `0.0` (only an exactly constant channel qualifies).
    #[serde(default)]
    pub zero_variance_tolerance: f64,

    /// Process channels on the rayon pool. Output is bit-identical either way.
    ///
    /// Default: `true`.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl ConditionerConfig {
    pub fn new(filter: FilterConfig, layout: ChannelLayout) -> Self {
        Self {
            filter,
            layout,
            padding: EdgePadding::default(),
            zero_variance_tolerance: 0.0,
            parallel: default_parallel(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.filter.check()?;
        if !(self.zero_variance_tolerance.is_finite() && self.zero_variance_tolerance >= 0.0) {
            return Err(ConditionError::InvalidConfig(format!(
                "zero_variance_tolerance must be finite and >= 0, got {}",
                self.zero_variance_tolerance
            )));
        }
        if let (Some(n), Some(&max)) = (self.layout.n_channels, self.layout.pruned.last()) {
            if max >= n {
                return Err(ConditionError::ChannelIndexOutOfRange { index: max, n_channels: n });
            }
        }
        Ok(())
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
