//! neurofilt design - FIR and IIR filter construction
//!
//! Window-method FIR designs (with minimum-phase conversion), classical IIR
//! families via analog prototypes and the bilinear transform, and the
//! helpers both need: polynomial roots, frequency responses, elliptic
//! functions and impulse-response length estimation.

pub mod error;
pub mod fir;
pub mod iir;
pub mod poly;
pub mod ringing;
pub mod special;

pub use error::{DesignError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        error::{DesignError, Result},
        fir::{construct_fir_filter, design_mne_c_filter, FirDesign, FirWindow},
        iir::{
            construct_iir_filter, BandType, IirFamily, IirFilter, IirOutput, IirParams, IirSystem,
        },
        ringing::estimate_ringing_samples,
    };
}
