//! Per-channel z-score normalisation.
//!
//! For every row `c` of a `[C, T]` array, independently of all other rows:
//!   μ_c = mean(x[c, :]),  σ_c = std(x[c, :])  (ddof = 0)
//!   x[c, :] = (x[c, :] − μ_c) / d_c,  with d_c = 1 when σ_c ≤ tol, else σ_c
//!
//! The divisor guard keeps a flat channel finite: an exactly constant row
//! comes out all zeros instead of NaN. Guarded rows are flagged in the
//! returned [`ChannelStats`].
//!
//! A band-pass leaves rounding residue on a flat input, so a channel that is
//! constant before filtering is not exactly constant after it.
//! [`flat_channels`] finds those rows on the raw signal.
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};

/// Statistics of one channel before normalisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: f64,
    /// Population standard deviation after mean removal.
    pub std: f64,
    /// `std` was at or below the tolerance, so the channel was only
    /// mean-removed.
    pub degraded: bool,
}

/// Z-score every row of `data` in place and return the per-row statistics.
///
/// `tolerance = 0.0` guards only rows whose standard deviation is exactly
/// zero. With `parallel` set, rows are spread over the rayon pool; each row is
/// reduced by the same sequential code, so results do not depend on it.
pub fn zscore_channels_inplace(data: &mut Array2<f64>, tolerance: f64, parallel: bool) -> Vec<ChannelStats> {
    if data.ncols() == 0 {
        return vec![ChannelStats { mean: 0.0, std: 0.0, degraded: true }; data.nrows()];
    }

    let rows = data.axis_iter_mut(Axis(0));
    if parallel {
        rows.into_par_iter().map(|row| zscore_row(row, tolerance)).collect()
    } else {
        rows.map(|row| zscore_row(row, tolerance)).collect()
    }
}

/// Allocating variant of [`zscore_channels_inplace`].
pub fn zscore_channels(data: ArrayView2<f64>, tolerance: f64, parallel: bool) -> (Array2<f64>, Vec<ChannelStats>) {
    let mut out = data.to_owned();
    let stats = zscore_channels_inplace(&mut out, tolerance, parallel);
    (out, stats)
}

/// Rows of `data` whose peak-to-peak range is at or below `tolerance`.
///
/// With `tolerance = 0.0` only exactly constant rows are reported.
pub fn flat_channels(data: ArrayView2<f64>, tolerance: f64) -> Vec<bool> {
    data.rows()
        .into_iter()
        .map(|row| {
            let (lo, hi) = row
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            hi - lo <= tolerance
        })
        .collect()
}

fn zscore_row(mut row: ArrayViewMut1<f64>, tolerance: f64) -> ChannelStats {
    let mean = row.mean().unwrap_or(0.0);
    row -= mean;

    let std = row.std(0.0);
    let degraded = std <= tolerance;
    let divisor = if degraded { 1.0 } else { std };
    row /= divisor;

    ChannelStats { mean, std, degraded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn row_mean_std(data: &Array2<f64>, ch: usize) -> (f64, f64) {
        let row = data.row(ch);
        (row.mean().unwrap(), row.std(0.0))
    }

    #[test]
    fn zscore_mean_zero_std_one_per_channel() {
        let mut data = Array2::from_shape_fn((8, 512), |(c, t)| {
            (c as f64 * 3.7 + t as f64 * 0.1).sin() * 50.0 + c as f64 * 100.0
        });
        let stats = zscore_channels_inplace(&mut data, 0.0, false);

        for ch in 0..8 {
            let (m, s) = row_mean_std(&data, ch);
            approx::assert_abs_diff_eq!(m, 0.0, epsilon = 1e-12);
            approx::assert_abs_diff_eq!(s, 1.0, epsilon = 1e-12);
            assert!(!stats[ch].degraded);
        }
        // Returned stats describe the input, not the output.
        assert!(stats[7].mean > 600.0);
        assert!(stats[0].std > 1.0);
    }

    #[test]
    fn constant_channel_becomes_zeros_not_nan() {
        let mut data = Array2::from_elem((1, 128), 5.0);
        let stats = zscore_channels_inplace(&mut data, 0.0, false);
        assert!(stats[0].degraded);
        assert_eq!(stats[0].mean, 5.0);
        assert_eq!(stats[0].std, 0.0);
        for &v in data.iter() {
            assert!(v.is_finite());
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn flat_channel_does_not_disturb_neighbours() {
        let mut data = Array2::from_shape_fn((3, 256), |(c, t)| match c {
            1 => -2.5,
            _ => ((t * (c + 1)) as f64 * 0.07).sin(),
        });
        let expected_row0 = zscore_channels(data.slice(ndarray::s![0..1, ..]), 0.0, false).0;

        let stats = zscore_channels_inplace(&mut data, 0.0, true);
        assert_eq!(stats.iter().map(|s| s.degraded).collect::<Vec<_>>(), vec![false, true, false]);
        assert!(data.row(1).iter().all(|&v| v == 0.0));
        assert_eq!(data.row(0), expected_row0.row(0));
    }

    #[test]
    fn tolerance_guards_near_flat_rows() {
        let mut data = Array2::from_shape_fn((2, 100), |(c, t)| {
            let wiggle = if t % 2 == 0 { 1e-10 } else { -1e-10 };
            if c == 0 { 3.0 + wiggle } else { wiggle * 1e12 }
        });
        let stats = zscore_channels_inplace(&mut data, 1e-6, false);
        assert!(stats[0].degraded);
        assert!(!stats[1].degraded);
        // Guarded row is only mean-removed, so its residue stays tiny.
        assert!(data.row(0).iter().all(|v| v.abs() < 1e-9));
        approx::assert_abs_diff_eq!(data.row(1).std(0.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_rows_are_found_by_range() {
        let mut data = Array2::from_shape_fn((4, 50), |(c, t)| (t as f64 * 0.3 + c as f64).sin());
        data.row_mut(1).fill(5.0);
        data.row_mut(3).fill(-1.0);
        data[[3, 20]] = -1.0 + 1e-7;

        assert_eq!(flat_channels(data.view(), 0.0), vec![false, true, false, false]);
        assert_eq!(flat_channels(data.view(), 1e-6), vec![false, true, false, true]);
    }

    #[test]
    fn parallel_matches_sequential_bitwise() {
        let data = Array2::from_shape_fn((32, 333), |(c, t)| ((c * 13 + t) as f64).sqrt().sin() * (c + 1) as f64);
        let (seq, s_stats) = zscore_channels(data.view(), 0.0, false);
        let (par, p_stats) = zscore_channels(data.view(), 0.0, true);
        assert_eq!(seq, par);
        assert_eq!(s_stats, p_stats);
    }

    #[test]
    fn empty_time_axis_is_flagged() {
        let mut data = Array2::<f64>::zeros((4, 0));
        let stats = zscore_channels_inplace(&mut data, 0.0, false);
        assert_eq!(stats.len(), 4);
        assert!(stats.iter().all(|s| s.degraded));
    }
}
