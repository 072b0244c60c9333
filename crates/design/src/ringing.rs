//! Impulse-response length of IIR filters

use crate::iir::IirSystem;
use crate::Result;
use neurofilt_core::lfilter::{lfilter, sosfilt, Section};
use neurofilt_core::report::{PrecisionWarning, Reporter};

const N_PER_CHUNK: usize = 1000;

/// Default simulation budget in samples
pub const DEFAULT_MAX_TRY: usize = 100_000;

enum Simulation<'a> {
    Ba {
        b: &'a [f64],
        a: &'a [f64],
        zi: Vec<f64>,
    },
    Sos {
        sos: &'a [Section],
        zi: Vec<[f64; 2]>,
    },
}

impl<'a> Simulation<'a> {
    fn new(system: &'a IirSystem) -> Self {
        match system {
            IirSystem::Ba { b, a } => Simulation::Ba {
                b,
                a,
                zi: vec![0.0; b.len().max(a.len()).saturating_sub(1)],
            },
            IirSystem::Sos(sos) => Simulation::Sos {
                sos,
                zi: vec![[0.0; 2]; sos.len()],
            },
        }
    }

    fn step(&mut self, x: &[f64]) -> Result<Vec<f64>> {
        match self {
            Simulation::Ba { b, a, zi } => {
                let (h, zf) = lfilter(&b[..], &a[..], x, Some(&zi[..]))?;
                *zi = zf;
                Ok(h)
            }
            Simulation::Sos { sos, zi } => {
                let (h, zf) = sosfilt(&sos[..], x, Some(&zi[..]))?;
                *zi = zf;
                Ok(h)
            }
        }
    }
}

/// Number of samples until the impulse response of `system` stays below
/// 0.1 % of its running peak.
///
/// The response is simulated in chunks with the filter state carried
/// across. If it has not decayed within `max_try` samples a
/// [`PrecisionWarning::RingingNotResolved`] is reported and `max_try` is
/// returned.
pub fn estimate_ringing_samples(
    system: &IirSystem,
    max_try: usize,
    reporter: &dyn Reporter,
) -> Result<usize> {
    let n_chunks_max = max_try.div_ceil(N_PER_CHUNK);
    let mut sim = Simulation::new(system);
    let mut x = vec![0.0; N_PER_CHUNK];
    x[0] = 1.0;
    let mut last_good = N_PER_CHUNK;
    let mut thresh = 0.0f64;

    for ii in 0..n_chunks_max {
        let h = sim.step(&x)?;
        x[0] = 0.0;
        let peak = h.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        thresh = thresh.max(0.001 * peak);
        match h.iter().rposition(|v| v.abs() > thresh) {
            Some(idx) => last_good = idx,
            None => {
                let n = (ii as isize - 1) * N_PER_CHUNK as isize + last_good as isize;
                tracing::debug!("Impulse response settled after {} chunks", ii + 1);
                return Ok(n.max(0) as usize);
            }
        }
    }
    reporter.warn(&PrecisionWarning::RingingNotResolved { max_try });
    Ok(max_try)
}
