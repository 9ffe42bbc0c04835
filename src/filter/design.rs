//! Butterworth band-pass design, matching `scipy.signal.butter(N, [lo, hi], btype='band')`.
//!
//! For a prototype order `N` and band edges `lo < hi` normalised to Nyquist:
//!   • analog prototype poles  p_m = −exp(iπm / 2N),  m = −N+1, −N+3, …, N−1
//!   • pre-warp                ω = 2·fs·tan(π·w / fs)   with fs = 2
//!   • low-pass → band-pass    p ↦ p·bw/2 ± √((p·bw/2)² − ω₀²),  N zeros at s = 0
//!   • bilinear transform      z = (2fs + s) / (2fs − s),  N extra zeros at z = −1
//!   • expand to (b, a)        2N + 1 taps each, a[0] = 1
//!
//! The expanded polynomial loses precision fast as the order grows (poles
//! cluster near z = 1 for low cut-offs), so filtering runs on
//! [`SecondOrderSections`] split straight from the zpk form. `(b, a)` is kept
//! for reporting and for parity with transfer-function tools.
use std::f64::consts::PI;

use log::debug;
use num_complex::Complex64;

use crate::config::FilterConfig;
use crate::error::{ConditionError, Result};

/// Sampling rate used for the internal bilinear transform on normalised
/// frequencies (Nyquist = 1).
const BILINEAR_FS: f64 = 2.0;

/// Transfer-function coefficients `H(z) = B(z) / A(z)`, highest power first.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    /// Feed-forward (numerator) coefficients.
    pub b: Vec<f64>,
    /// Feedback (denominator) coefficients, `a[0] == 1`.
    pub a: Vec<f64>,
}

impl FilterCoefficients {
    /// Number of taps of the longer coefficient vector.
    pub fn n_taps(&self) -> usize {
        self.a.len().max(self.b.len())
    }

    /// Samples of edge extension the zero-phase filter adds on each side.
    pub fn pad_len(&self) -> usize {
        3 * self.n_taps()
    }
}

/// One biquad `[b0, b1, b2, a0, a1, a2]` with `a0 == 1` (SciPy's `sos` row).
pub type Biquad = [f64; 6];

/// Cascade of biquads; the filter is their product.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondOrderSections {
    pub sections: Vec<Biquad>,
}

impl SecondOrderSections {
    pub fn n_sections(&self) -> usize {
        self.sections.len()
    }

    /// Edge extension of the zero-phase filter, `3 * (2 * n_sections + 1)`.
    /// Equals [`FilterCoefficients::pad_len`] of the expanded filter.
    pub fn pad_len(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Multiply the sections out into one transfer function.
    pub fn to_coefficients(&self) -> FilterCoefficients {
        let (mut b, mut a) = (vec![1.0], vec![1.0]);
        for s in &self.sections {
            b = convolve(&b, &s[..3]);
            a = convolve(&a, &s[3..]);
        }
        FilterCoefficients { b, a }
    }

    /// Complex response of the cascade at `freq_hz` for sampling rate `fs`.
    pub fn frequency_response(&self, freq_hz: f64, fs: f64) -> Complex64 {
        let z_inv = Complex64::from_polar(1.0, -2.0 * PI * freq_hz / fs);
        let quad = |c: &[f64]| c[0] + z_inv * (c[1] + z_inv * c[2]);
        self.sections
            .iter()
            .map(|s| quad(&s[..3]) / quad(&s[3..]))
            .product()
    }
}

/// Zero/pole/gain form of a filter, analog or digital depending on context.
#[derive(Debug, Clone, PartialEq)]
pub struct Zpk {
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
    pub gain: f64,
}

impl Zpk {
    /// Expand into polynomial form. Imaginary residue from conjugate pairs is
    /// dropped.
    pub fn to_coefficients(&self) -> FilterCoefficients {
        let b = poly(&self.zeros).iter().map(|c| self.gain * c.re).collect();
        let a = poly(&self.poles).iter().map(|c| c.re).collect();
        FilterCoefficients { b, a }
    }

    /// Split into second-order sections.
    ///
    /// Poles are grouped into conjugate pairs (or pairs of real poles). Working
    /// from the pair nearest the unit circle outwards, each section takes the
    /// two remaining zeros closest to its pole; sections are then ordered so
    /// the sharpest resonance comes last and the overall gain goes into the
    /// first numerator. Zeros must be real, as they are for every band-pass
    /// this module designs.
    pub fn to_sos(&self) -> Result<SecondOrderSections> {
        const TOL: f64 = 1e-9;
        let invalid = |msg: &str| ConditionError::InvalidFilterConfig(format!("cannot split into sections: {msg}"));

        // (pole representing the pair, [1, a1, a2])
        let mut dens: Vec<(Complex64, [f64; 3])> = self
            .poles
            .iter()
            .filter(|p| p.im > TOL)
            .map(|p| (*p, [1.0, -2.0 * p.re, p.norm_sqr()]))
            .collect();
        let n_lower = self.poles.iter().filter(|p| p.im < -TOL).count();
        if n_lower != dens.len() {
            return Err(invalid("complex poles without conjugates"));
        }

        let mut real: Vec<f64> = self.poles.iter().filter(|p| p.im.abs() <= TOL).map(|p| p.re).collect();
        if real.len() % 2 != 0 {
            return Err(invalid("odd number of real poles"));
        }
        real.sort_by(f64::total_cmp);
        for pair in real.chunks_exact(2) {
            let (p, q) = (pair[0], pair[1]);
            let outer = if p.abs() > q.abs() { p } else { q };
            dens.push((Complex64::new(outer, 0.0), [1.0, -(p + q), p * q]));
        }

        if self.zeros.iter().any(|z| z.im.abs() > TOL) {
            return Err(invalid("complex zeros"));
        }
        if self.zeros.len() > self.poles.len() {
            return Err(invalid("more zeros than poles"));
        }
        // Missing zeros sit at the origin.
        let mut zeros: Vec<f64> = self.zeros.iter().map(|z| z.re).collect();
        zeros.resize(self.poles.len(), 0.0);

        dens.sort_by(|x, y| (1.0 - x.0.norm()).total_cmp(&(1.0 - y.0.norm())));
        let mut sections = Vec::with_capacity(dens.len());
        for (pole, a) in dens {
            zeros.sort_by(|x, y| (pole - *x).norm().total_cmp(&(pole - *y).norm()));
            let (z1, z2) = (zeros[0], zeros[1]);
            zeros.drain(..2);
            sections.push([1.0, -(z1 + z2), z1 * z2, a[0], a[1], a[2]]);
        }
        sections.reverse();

        if let Some(first) = sections.first_mut() {
            for c in &mut first[..3] {
                *c *= self.gain;
            }
        }
        Ok(SecondOrderSections { sections })
    }
}

/// Design the band-pass filter described by `config`.
pub fn design_bandpass(config: &FilterConfig) -> Result<FilterCoefficients> {
    let coeffs = design_bandpass_zpk(config)?.to_coefficients();
    debug!(
        "designed order-{} Butterworth band-pass {}–{} Hz @ {} Hz: {} taps",
        config.order(),
        config.low_cut_hz(),
        config.high_cut_hz(),
        config.sampling_rate_hz(),
        coeffs.n_taps()
    );
    Ok(coeffs)
}

/// Second-order sections of the band-pass filter described by `config`.
pub fn design_bandpass_sos(config: &FilterConfig) -> Result<SecondOrderSections> {
    let sos = design_bandpass_zpk(config)?.to_sos()?;
    debug!(
        "designed order-{} Butterworth band-pass {}–{} Hz @ {} Hz: {} sections",
        config.order(),
        config.low_cut_hz(),
        config.high_cut_hz(),
        config.sampling_rate_hz(),
        sos.n_sections()
    );
    Ok(sos)
}

/// Digital zeros, poles and gain of the band-pass filter described by `config`.
pub fn design_bandpass_zpk(config: &FilterConfig) -> Result<Zpk> {
    config.check()?;
    let (lo, hi) = config.normalized_band();

    let prototype = butter_prototype(config.order());
    let analog = lowpass_to_bandpass(&prototype, prewarp(lo), prewarp(hi));
    Ok(bilinear(&analog))
}

/// Poles of the analog Butterworth low-pass prototype with unit cutoff.
pub fn butter_prototype(order: usize) -> Vec<Complex64> {
    let n = order as f64;
    (0..order)
        .map(|k| {
            let m = 2.0 * k as f64 - (n - 1.0);
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect()
}

/// Map a normalised digital frequency to the analog frequency the bilinear
/// transform sends back onto it.
fn prewarp(w: f64) -> f64 {
    2.0 * BILINEAR_FS * (PI * w / BILINEAR_FS).tan()
}

/// Analog low-pass prototype (no zeros, unit gain) → band-pass between
/// `wl` and `wh` rad/s.
fn lowpass_to_bandpass(poles: &[Complex64], wl: f64, wh: f64) -> Zpk {
    let bw = wh - wl;
    let w0_sq = Complex64::new(wl * wh, 0.0);
    let order = poles.len();

    let scaled: Vec<Complex64> = poles.iter().map(|&p| p * (bw / 2.0)).collect();
    let root = |p: Complex64| (p * p - w0_sq).sqrt();

    let mut bp_poles = Vec::with_capacity(2 * order);
    bp_poles.extend(scaled.iter().map(|&p| p + root(p)));
    bp_poles.extend(scaled.iter().map(|&p| p - root(p)));

    Zpk {
        zeros: vec![Complex64::new(0.0, 0.0); order],
        poles: bp_poles,
        gain: bw.powi(order as i32),
    }
}

/// Bilinear transform of an analog zpk filter with `fs = BILINEAR_FS`.
fn bilinear(analog: &Zpk) -> Zpk {
    let fs2 = Complex64::new(2.0 * BILINEAR_FS, 0.0);
    let map = |s: Complex64| (fs2 + s) / (fs2 - s);

    // Zeros at infinity land on Nyquist.
    let degree = analog.poles.len() - analog.zeros.len();
    let mut zeros: Vec<Complex64> = analog.zeros.iter().map(|&z| map(z)).collect();
    zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));

    let poles = analog.poles.iter().map(|&p| map(p)).collect();

    let num: Complex64 = analog.zeros.iter().map(|&z| fs2 - z).product();
    let den: Complex64 = analog.poles.iter().map(|&p| fs2 - p).product();
    let gain = analog.gain * (num / den).re;

    Zpk { zeros, poles, gain }
}

/// Monic polynomial with the given roots, highest power first.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut c = vec![Complex64::new(1.0, 0.0)];
    for &r in roots {
        c.push(Complex64::new(0.0, 0.0));
        for i in (1..c.len()).rev() {
            let prev = c[i - 1];
            c[i] -= prev * r;
        }
    }
    c
}

fn convolve(x: &[f64], y: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; x.len() + y.len() - 1];
    for (i, &u) in x.iter().enumerate() {
        for (j, &v) in y.iter().enumerate() {
            out[i + j] += u * v;
        }
    }
    out
}

/// Complex response `H(e^{jω})` of `coeffs` at `freq_hz` for sampling rate `fs`.
pub fn frequency_response(coeffs: &FilterCoefficients, freq_hz: f64, fs: f64) -> Complex64 {
    let z_inv = Complex64::from_polar(1.0, -2.0 * PI * freq_hz / fs);
    let eval = |c: &[f64]| {
        c.iter()
            .rev()
            .fold(Complex64::new(0.0, 0.0), |acc, &v| acc * z_inv + v)
    };
    eval(&coeffs.b) / eval(&coeffs.a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_coeffs() -> FilterCoefficients {
        design_bandpass(&FilterConfig::default()).unwrap()
    }

    #[test]
    fn tap_count_is_twice_order_plus_one() {
        for order in 1..=6 {
            let cfg = FilterConfig::new(1000.0, 0.5, 49.0, order).unwrap();
            let c = design_bandpass(&cfg).unwrap();
            assert_eq!(c.b.len(), 2 * order + 1);
            assert_eq!(c.a.len(), 2 * order + 1);
        }
    }

    #[test]
    fn denominator_is_monic() {
        approx::assert_abs_diff_eq!(default_coeffs().a[0], 1.0, epsilon = 1e-15);
    }

    #[test]
    fn numerator_is_scaled_z2_minus_1_to_the_n() {
        // (z² − 1)⁴ = z⁸ − 4z⁶ + 6z⁴ − 4z² + 1
        let c = default_coeffs();
        let pattern = [1.0, 0.0, -4.0, 0.0, 6.0, 0.0, -4.0, 0.0, 1.0];
        let k = c.b[0];
        assert!(k > 0.0);
        for (got, want) in c.b.iter().zip(pattern) {
            approx::assert_abs_diff_eq!(got / k, want, epsilon = 1e-9);
        }
    }

    #[test]
    fn reference_gain_and_denominator() {
        // Order 4, 0.5–49 Hz at 1 kHz (normalised band 0.001–0.098).
        let c = default_coeffs();
        approx::assert_relative_eq!(c.b[0], 3.727_138_692e-4, max_relative = 1e-6);
        let a_ref = [
            1.0,
            -7.201_620_770_6,
            22.717_814_579_6,
            -41.007_646_935_3,
            46.334_259_155_8,
            -33.560_080_275_8,
            15.217_972_943_7,
            -3.950_049_089_6,
            0.449_350_392_2,
        ];
        for (got, want) in c.a.iter().zip(a_ref) {
            approx::assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn poles_inside_unit_circle() {
        for order in [1, 2, 4, 8] {
            let cfg = FilterConfig::new(1000.0, 0.5, 49.0, order).unwrap();
            let zpk = design_bandpass_zpk(&cfg).unwrap();
            assert_eq!(zpk.poles.len(), 2 * order);
            for p in &zpk.poles {
                assert!(p.norm() < 1.0, "order {order}: unstable pole {p}");
            }
        }
    }

    #[test]
    fn minus_3db_at_band_edges() {
        let cfg = FilterConfig::new(250.0, 4.0, 30.0, 4).unwrap();
        let c = design_bandpass(&cfg).unwrap();
        let edge = std::f64::consts::FRAC_1_SQRT_2;
        approx::assert_abs_diff_eq!(frequency_response(&c, 4.0, 250.0).norm(), edge, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(frequency_response(&c, 30.0, 250.0).norm(), edge, epsilon = 1e-6);
    }

    #[test]
    fn unity_gain_at_band_centre_and_zero_at_dc() {
        let c = default_coeffs();
        let centre = (0.5_f64 * 49.0).sqrt();
        approx::assert_abs_diff_eq!(frequency_response(&c, centre, 1000.0).norm(), 1.0, epsilon = 1e-4);
        // A(1) is ~6e-13 for this band, so DC only cancels to rounding level.
        assert!(frequency_response(&c, 0.0, 1000.0).norm() < 1e-5);
        assert!(frequency_response(&c, 500.0, 1000.0).norm() < 1e-9);
    }

    #[test]
    fn prototype_poles_on_unit_circle_left_half_plane() {
        for p in butter_prototype(5) {
            approx::assert_abs_diff_eq!(p.norm(), 1.0, epsilon = 1e-12);
            assert!(p.re < 0.0);
        }
    }

    #[test]
    fn sections_match_expanded_filter() {
        let cfg = FilterConfig::new(250.0, 4.0, 30.0, 4).unwrap();
        let sos = design_bandpass_sos(&cfg).unwrap();
        assert_eq!(sos.n_sections(), 4);
        assert_eq!(sos.pad_len(), 27);

        let tf = design_bandpass(&cfg).unwrap();
        let merged = sos.to_coefficients();
        assert_eq!(merged.n_taps(), tf.n_taps());
        for (got, want) in merged.b.iter().zip(&tf.b) {
            approx::assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
        }
        for (got, want) in merged.a.iter().zip(&tf.a) {
            approx::assert_abs_diff_eq!(*got, *want, epsilon = 1e-9);
        }
    }

    #[test]
    fn sections_are_monic_and_stable() {
        for order in 1..=12 {
            let cfg = FilterConfig::new(1000.0, 0.5, 49.0, order).unwrap();
            let sos = design_bandpass_sos(&cfg).unwrap();
            assert_eq!(sos.n_sections(), order);
            for s in &sos.sections {
                assert_eq!(s[3], 1.0);
                // Both roots of 1 + a1 z⁻¹ + a2 z⁻² inside the unit circle.
                assert!(s[5].abs() < 1.0 && s[4].abs() < 1.0 + s[5], "order {order}: {s:?}");
            }
        }
    }

    #[test]
    fn sections_keep_exact_band_edges_where_polynomial_drifts() {
        let cfg = FilterConfig::default();
        let sos = design_bandpass_sos(&cfg).unwrap();
        let edge = std::f64::consts::FRAC_1_SQRT_2;
        approx::assert_abs_diff_eq!(sos.frequency_response(0.5, 1000.0).norm(), edge, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(sos.frequency_response(49.0, 1000.0).norm(), edge, epsilon = 1e-9);
        assert_eq!(sos.frequency_response(0.0, 1000.0).norm(), 0.0);
    }
}
