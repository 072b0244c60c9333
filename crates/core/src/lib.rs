//! neurofilt core - DSP primitives for multichannel biosignals
//!
//! This crate provides edge padding, window functions, FFT backends,
//! overlap-add FIR application, recursive IIR application, row-wise
//! parallel dispatch and the reporting sink used by the higher-level
//! design and filtering crates.

pub mod detrend;
pub mod error;
pub mod fft;
pub mod lfilter;
pub mod overlap;
pub mod pad;
pub mod parallel;
pub mod param;
pub mod report;
pub mod signal;
pub mod window;

pub use error::{CoreError, ErrorKind, Result};
pub use rustfft::num_complex::Complex64;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        error::{CoreError, ErrorKind, Result},
        fft::{FftBackend, CpuFft},
        overlap::{OverlapAdd, Phase},
        pad::PadMode,
        parallel::NJobs,
        param::ParamValue,
        report::{MemoryReporter, PrecisionWarning, Reporter, TracingReporter},
        window::WindowKind,
        Complex64,
    };
}
