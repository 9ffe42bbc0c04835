//! Boundary to an exported model.
//!
//! A model runtime is opaque: a fixed-shape array goes in, a fixed-shape array
//! comes out, and both shapes are frozen when the model is exported.
//! [`ShapeChecked`] enforces that contract around any [`InferenceSession`],
//! and [`batch_time_major`] lays conditioned epochs out the way exported
//! models take them (`[batch, time, channel]`).
use ndarray::{Array3, ArrayD, ArrayView2, ArrayViewD, Axis};

use crate::error::ConditionError;

pub trait InferenceSession {
    fn input_shape(&self) -> &[usize];
    fn output_shape(&self) -> &[usize];
    fn run(&mut self, input: ArrayViewD<f32>) -> anyhow::Result<ArrayD<f32>>;
}

/// Wraps a session and rejects inputs or outputs that break its declared
/// shapes.
#[derive(Debug, Clone)]
pub struct ShapeChecked<S> {
    inner: S,
}

impl<S: InferenceSession> ShapeChecked<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: InferenceSession> InferenceSession for ShapeChecked<S> {
    fn input_shape(&self) -> &[usize] {
        self.inner.input_shape()
    }

    fn output_shape(&self) -> &[usize] {
        self.inner.output_shape()
    }

    fn run(&mut self, input: ArrayViewD<f32>) -> anyhow::Result<ArrayD<f32>> {
        check_shape(self.inner.input_shape(), input.shape())?;
        let output = self.inner.run(input)?;
        check_shape(self.inner.output_shape(), output.shape())?;
        Ok(output)
    }
}

fn check_shape(expected: &[usize], actual: &[usize]) -> Result<(), ConditionError> {
    if expected != actual {
        return Err(ConditionError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

/// Stack `[C, T]` epochs into one `[N, T, C]` f32 batch.
///
/// All epochs must share one shape.
pub fn batch_time_major(epochs: &[ArrayView2<f64>]) -> Result<Array3<f32>, ConditionError> {
    let Some(first) = epochs.first() else {
        return Err(ConditionError::EmptySignal("no epochs to batch"));
    };
    let (n_ch, n_t) = first.dim();

    let mut batch = Array3::<f32>::zeros((epochs.len(), n_t, n_ch));
    for (mut slot, epoch) in batch.axis_iter_mut(Axis(0)).zip(epochs) {
        if epoch.dim() != (n_ch, n_t) {
            return Err(ConditionError::ShapeMismatch {
                expected: vec![n_ch, n_t],
                actual: epoch.shape().to_vec(),
            });
        }
        slot.assign(&epoch.t().mapv(|v| v as f32));
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, IxDyn};

    /// Sums over the last axis, optionally producing a wrong shape.
    struct SumLast {
        input: Vec<usize>,
        output: Vec<usize>,
        lie: bool,
    }

    impl InferenceSession for SumLast {
        fn input_shape(&self) -> &[usize] {
            &self.input
        }
        fn output_shape(&self) -> &[usize] {
            &self.output
        }
        fn run(&mut self, input: ArrayViewD<f32>) -> anyhow::Result<ArrayD<f32>> {
            if self.lie {
                return Ok(ArrayD::zeros(IxDyn(&[1])));
            }
            let last = Axis(input.ndim() - 1);
            Ok(input.sum_axis(last))
        }
    }

    fn session(lie: bool) -> ShapeChecked<SumLast> {
        ShapeChecked::new(SumLast { input: vec![2, 3], output: vec![2], lie })
    }

    #[test]
    fn passes_conforming_shapes() {
        let x = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let y = session(false).run(x.view()).unwrap();
        assert_eq!(y.as_slice().unwrap(), &[6.0, 15.0]);
    }

    #[test]
    fn rejects_wrong_input_shape() {
        let x = ArrayD::<f32>::zeros(IxDyn(&[3, 2]));
        let err = session(false).run(x.view()).unwrap_err();
        let err = err.downcast::<ConditionError>().unwrap();
        assert_eq!(err, ConditionError::ShapeMismatch { expected: vec![2, 3], actual: vec![3, 2] });
    }

    #[test]
    fn rejects_wrong_output_shape() {
        let x = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));
        assert!(session(true).run(x.view()).is_err());
    }

    #[test]
    fn batch_is_time_major() {
        let a = Array2::from_shape_fn((2, 3), |(c, t)| (10 * c + t) as f64);
        let b = a.mapv(|v| -v);
        let batch = batch_time_major(&[a.view(), b.view()]).unwrap();
        assert_eq!(batch.dim(), (2, 3, 2));
        assert_eq!(batch[[0, 2, 1]], 12.0);
        assert_eq!(batch[[1, 1, 0]], -1.0);
    }

    #[test]
    fn batch_rejects_ragged_epochs() {
        let a = Array2::<f64>::zeros((2, 3));
        let b = Array2::<f64>::zeros((2, 4));
        assert!(batch_time_major(&[a.view(), b.view()]).is_err());
        assert!(batch_time_major(&[]).is_err());
    }
}
