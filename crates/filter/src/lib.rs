//! neurofilt - filtering and resampling of multichannel biosignals
//!
//! The entry points work on `ndarray` arrays of `f64` with time on the last
//! axis (resampling takes any axis):
//!
//! * [`create_filter`] designs an FIR or IIR filter from band edges and
//!   describes it through a [`Reporter`](neurofilt_core::report::Reporter),
//! * [`filter_data`] designs and applies it row by row, optionally to a
//!   subset of channels and on several threads,
//! * [`notch_filter`] removes line noise, either with narrow band-stops or
//!   by regressing sinusoids out,
//! * [`resample`] and [`resample_stim_channels`] change the sampling rate.
//!
//! Options live in plain structs ([`FilterOptions`], [`NotchOptions`],
//! [`ResampleOptions`]) that can be loaded from TOML via
//! [`FilterSettings`].

pub mod apply;
pub mod config;
pub mod create;
pub mod error;
pub mod notch;
pub mod params;
pub mod report;
pub mod resample;
mod spectrum_fit;

pub use apply::{apply_filter, filter_data, filter_data_in_place};
pub use config::FilterSettings;
pub use create::{create_band_filter, create_filter, Band, Filter};
pub use error::{FilterError, Result};
pub use notch::{notch_filter, notch_filter_in_place};
pub use params::{
    FilterLength, FilterOptions, Method, NotchOptions, Npad, ResampleMethod, ResampleOptions,
    TransBandwidth,
};
pub use resample::{resample, resample_stim_channels};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        create_filter, filter_data, filter_data_in_place, notch_filter, resample,
        resample_stim_channels, Band, Filter, FilterError, FilterLength, FilterOptions,
        FilterSettings, Method, NotchOptions, Npad, ResampleMethod, ResampleOptions, Result,
        TransBandwidth,
    };
    pub use neurofilt_core::prelude::{
        ErrorKind, MemoryReporter, NJobs, PadMode, Phase, PrecisionWarning, Reporter,
        TracingReporter, WindowKind,
    };
    pub use neurofilt_design::prelude::{FirDesign, FirWindow, IirFilter, IirParams, IirSystem};
}
