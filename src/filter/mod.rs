//! IIR band-pass design and zero-phase application.
//!
//! - [`design`]: Butterworth band-pass in zpk form, split into second-order
//!   sections or expanded to `(b, a)`, matching
//!   `scipy.signal.butter(..., btype='band')`.
//! - [`apply`]: forward–backward filtering with edge extension and
//!   steady-state initial conditions, matching `scipy.signal.sosfiltfilt`
//!   and `scipy.signal.filtfilt`.

pub mod apply;
pub mod design;

pub use apply::{apply_zero_phase_inplace, filtfilt, lfilter, lfilter_zi, sosfilt, sosfilt_zi, sosfiltfilt};
pub use design::{
    butter_prototype, design_bandpass, design_bandpass_sos, design_bandpass_zpk, frequency_response, Biquad,
    FilterCoefficients, SecondOrderSections, Zpk,
};
