//! Channel pruning: drop a fixed set of rows from a `[C, T]` array.
//!
//! All requested rows are removed in one `select` over the complement of the
//! index set, so the result does not depend on the order (or repetition) of
//! the indices and there is no index shifting between removals.
use std::collections::BTreeSet;

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{ConditionError, Result};

/// Remove the rows listed in `indices`, keeping the others in their original
/// order.
///
/// ```
/// use eegcond::prune::prune_channels;
/// use ndarray::array;
///
/// let x = array![[0.0], [1.0], [2.0], [3.0]];
/// let y = prune_channels(x.view(), &[3, 1]).unwrap();
/// assert_eq!(y, array![[0.0], [2.0]]);
/// ```
pub fn prune_channels<A: Clone>(signal: ArrayView2<A>, indices: &[usize]) -> Result<Array2<A>> {
    let set: BTreeSet<usize> = indices.iter().copied().collect();
    prune_channel_set(signal, &set)
}

/// [`prune_channels`] for an index set that is already de-duplicated.
pub fn prune_channel_set<A: Clone>(signal: ArrayView2<A>, indices: &BTreeSet<usize>) -> Result<Array2<A>> {
    let keep = kept_channels(signal.nrows(), indices)?;
    Ok(signal.select(Axis(0), &keep))
}

/// Original indices of the rows that survive pruning, in ascending order.
///
/// Fails on the smallest index that does not exist.
pub fn kept_channels(n_channels: usize, indices: &BTreeSet<usize>) -> Result<Vec<usize>> {
    if let Some(&index) = indices.range(n_channels..).next() {
        return Err(ConditionError::ChannelIndexOutOfRange { index, n_channels });
    }
    Ok((0..n_channels).filter(|c| !indices.contains(c)).collect())
}
