//! Zero-phase IIR filtering, matching `scipy.signal.sosfiltfilt(sos, x)` and
//! `scipy.signal.filtfilt(b, a, x)` with their default odd padding.
//!
//! Zero phase comes from running the filter forward, then again over the
//! time-reversed output, so the two phase responses cancel and the magnitude
//! response is squared. Edge transients are suppressed by extending the signal
//! by `3 * n_taps` samples (`3 * (2 * n_sections + 1)` for a cascade) on each
//! side and by starting each pass from the filter's steady-state initial
//! conditions scaled to the first sample.
//!
//! Multi-channel filtering always runs the second-order-section cascade; the
//! transfer-function path is kept for single signals and low orders.
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis};

use crate::config::EdgePadding;
use crate::error::{ConditionError, Result};
use crate::filter::design::{Biquad, FilterCoefficients, SecondOrderSections};

/// Filter each channel (row) of `data` ([C, T]) in place with the cascade
/// `sos`.
///
/// With `parallel` set, rows are distributed over the rayon pool. Every row
/// still runs the same sequential arithmetic, so the result is identical to
/// the single-threaded path.
pub fn apply_zero_phase_inplace(
    data: &mut Array2<f64>,
    sos: &SecondOrderSections,
    padding: EdgePadding,
    parallel: bool,
) -> Result<()> {
    let pad_len = sos.pad_len();
    check_len(data.ncols(), pad_len)?;

    let zi = sosfilt_zi(&sos.sections);
    let filter_row = |mut row: ArrayViewMut1<f64>| {
        let x = row.to_vec();
        let y = zero_phase(&x, pad_len, padding, |s, x0| sosfilt(&sos.sections, s, &scale_sections(&zi, x0)));
        row.assign(&ArrayView1::from(&y));
    };

    if parallel {
        data.axis_iter_mut(Axis(0)).into_par_iter().for_each(filter_row);
    } else {
        data.axis_iter_mut(Axis(0)).for_each(filter_row);
    }
    Ok(())
}

/// Zero-phase filter a single 1-D signal with the cascade `sos`. Returns a
/// vector of the same length.
pub fn sosfiltfilt(x: &[f64], sos: &SecondOrderSections, padding: EdgePadding) -> Result<Vec<f64>> {
    let pad_len = sos.pad_len();
    check_len(x.len(), pad_len)?;

    let zi = sosfilt_zi(&sos.sections);
    Ok(zero_phase(x, pad_len, padding, |s, x0| sosfilt(&sos.sections, s, &scale_sections(&zi, x0))))
}

/// Zero-phase filter a single 1-D signal with the transfer function
/// `coeffs`. Returns a vector of the same length.
///
/// Precision degrades with order; prefer [`sosfiltfilt`] above order 4 or
/// for very low cut-offs.
pub fn filtfilt(x: &[f64], coeffs: &FilterCoefficients, padding: EdgePadding) -> Result<Vec<f64>> {
    let pad_len = coeffs.pad_len();
    check_len(x.len(), pad_len)?;

    let (b, a) = normalized(coeffs);
    let zi = lfilter_zi(&b, &a);
    Ok(zero_phase(x, pad_len, padding, |s, x0| {
        let zi: Vec<f64> = zi.iter().map(|&z| z * x0).collect();
        lfilter(&b, &a, s, &zi)
    }))
}

/// Single causal pass through a biquad cascade, each section in direct form
/// II transposed. `zi[k]` holds the two delay values of section `k`.
pub fn sosfilt(sections: &[Biquad], x: &[f64], zi: &[[f64; 2]]) -> Vec<f64> {
    let mut z = zi.to_vec();
    x.iter()
        .map(|&v| {
            sections.iter().zip(z.iter_mut()).fold(v, |v, (s, z)| {
                let out = s[0] * v + z[0];
                z[0] = s[1] * v - s[4] * out + z[1];
                z[1] = s[2] * v - s[5] * out;
                out
            })
        })
        .collect()
}

/// Steady-state initial conditions of a cascade for a unit step.
///
/// Each section's `lfilter_zi` is scaled by the DC gain of the sections
/// before it; after a band-pass section that gain is zero.
pub fn sosfilt_zi(sections: &[Biquad]) -> Vec<[f64; 2]> {
    let mut scale = 1.0;
    sections
        .iter()
        .map(|s| {
            let (b, a) = (&s[..3], &s[3..]);
            let zi = lfilter_zi(b, a);
            let dc_den: f64 = a.iter().sum();
            let out = [scale * zi[0], scale * zi[1]];
            scale *= if dc_den == 0.0 { 0.0 } else { b.iter().sum::<f64>() / dc_den };
            out
        })
        .collect()
}

/// Single causal pass in direct form II transposed.
///
/// `b` and `a` must have equal length with `a[0] == 1`; `zi` holds the
/// `len - 1` initial delay values.
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64], zi: &[f64]) -> Vec<f64> {
    let n = a.len();
    let mut z = zi.to_vec();
    let mut y = Vec::with_capacity(x.len());

    for &v in x {
        let out = b[0] * v + z.first().copied().unwrap_or(0.0);
        for i in 0..n.saturating_sub(2) {
            z[i] = b[i + 1] * v - a[i + 1] * out + z[i + 1];
        }
        if n >= 2 {
            z[n - 2] = b[n - 1] * v - a[n - 1] * out;
        }
        y.push(out);
    }
    y
}

/// Steady-state initial conditions for a unit step, i.e. the delay values that
/// make `lfilter(b, a, ones, zi)` constant from the first sample.
///
/// Solves `(I − Aᵀ)·zi = b[1:] − a[1:]·b[0]` with `A` the companion matrix of
/// `a`.
pub fn lfilter_zi(b: &[f64], a: &[f64]) -> Vec<f64> {
    let m = a.len().saturating_sub(1);
    if m == 0 {
        return vec![];
    }

    // Row i of (I − Aᵀ): Aᵀ has −a[1..] down its first column and ones on the
    // superdiagonal.
    let mut lhs = vec![vec![0.0_f64; m]; m];
    for (i, row) in lhs.iter_mut().enumerate() {
        row[i] = 1.0;
        row[0] += a[i + 1];
        if i + 1 < m {
            row[i + 1] -= 1.0;
        }
    }
    let rhs: Vec<f64> = (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();

    solve(lhs, rhs).unwrap_or_else(|| {
        log::debug!("singular steady-state system, starting from rest");
        vec![0.0; m]
    })
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn check_len(len: usize, pad_len: usize) -> Result<()> {
    if len <= pad_len {
        return Err(ConditionError::SignalTooShort { len, required: pad_len });
    }
    Ok(())
}

/// Equal-length copies of `b` and `a`, scaled so that `a[0] == 1`.
fn normalized(coeffs: &FilterCoefficients) -> (Vec<f64>, Vec<f64>) {
    let n = coeffs.n_taps();
    let a0 = coeffs.a.first().copied().unwrap_or(1.0);
    let scale = |v: &[f64]| -> Vec<f64> {
        let mut out: Vec<f64> = v.iter().map(|&c| c / a0).collect();
        out.resize(n, 0.0);
        out
    };
    (scale(&coeffs.b), scale(&coeffs.a))
}

fn scale_sections(zi: &[[f64; 2]], x0: f64) -> Vec<[f64; 2]> {
    zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect()
}

/// Extend, run `pass` forward, run it again over the reversed output, and
/// strip the extension. `pass` gets the signal and its first sample, which
/// scales the steady-state initial conditions.
fn zero_phase(x: &[f64], pad_len: usize, padding: EdgePadding, pass: impl Fn(&[f64], f64) -> Vec<f64>) -> Vec<f64> {
    let n = x.len();
    let ext = extend(x, pad_len, padding);

    let mut y = pass(&ext, ext[0]);
    y.reverse();
    let mut y = pass(&y, y[0]);
    y.reverse();

    y[pad_len..pad_len + n].to_vec()
}

/// Extend `x` by `n_pad` samples on both sides. Requires `x.len() > n_pad`.
///
/// Odd:      left `2*x[0] - x[i]`,  right `2*x[-1] - x[-(i+1)]`, i = 1..=n_pad
/// Even:     left `x[i]`,           right `x[-(i+1)]`
/// Constant: `x[0]` / `x[-1]` repeated
fn extend(x: &[f64], n_pad: usize, padding: EdgePadding) -> Vec<f64> {
    let n = x.len();
    let (first, last) = (x[0], x[n - 1]);
    let mut out = Vec::with_capacity(n + 2 * n_pad);

    let left = (1..=n_pad).rev();
    match padding {
        EdgePadding::Odd => out.extend(left.map(|i| 2.0 * first - x[i])),
        EdgePadding::Even => out.extend(left.map(|i| x[i])),
        EdgePadding::Constant => out.extend(left.map(|_| first)),
    }

    out.extend_from_slice(x);

    let right = 1..=n_pad;
    match padding {
        EdgePadding::Odd => out.extend(right.map(|i| 2.0 * last - x[n - 1 - i])),
        EdgePadding::Even => out.extend(right.map(|i| x[n - 1 - i])),
        EdgePadding::Constant => out.extend(right.map(|_| last)),
    }

    out
}

/// Gaussian elimination with partial pivoting. `None` if the system is singular.
fn solve(mut lhs: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let m = rhs.len();
    for col in 0..m {
        let pivot = (col..m).max_by(|&r, &s| lhs[r][col].abs().total_cmp(&lhs[s][col].abs()))?;
        if lhs[pivot][col] == 0.0 {
            return None;
        }
        lhs.swap(col, pivot);
        rhs.swap(col, pivot);

        for r in col + 1..m {
            let f = lhs[r][col] / lhs[col][col];
            if f == 0.0 {
                continue;
            }
            for k in col..m {
                lhs[r][k] -= f * lhs[col][k];
            }
            rhs[r] -= f * rhs[col];
        }
    }

    let mut x = vec![0.0; m];
    for r in (0..m).rev() {
        let tail: f64 = (r + 1..m).map(|k| lhs[r][k] * x[k]).sum();
        x[r] = (rhs[r] - tail) / lhs[r][r];
    }
    Some(x)
}
