//! Overlap-add FFT convolution
//!
//! Applies an FIR filter of any length to a row of samples in blocks of
//! `n_fft - len(h) + 1`, with the edges extended by [`crate::pad`] so that
//! the transient stays outside the returned samples.

use crate::fft::{cpu_backend, next_fast_len, FftBackend};
use crate::pad::{pad, PadMode};
use crate::report::Reporter;
use crate::{CoreError, Result};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Phase handling of a filter application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Phase {
    /// Delay-compensated single pass with a symmetric filter
    #[default]
    Zero,
    /// Filter forward and backward (squares the magnitude response)
    ZeroDouble,
    /// Causal single pass, no compensation
    Forward,
    /// Causal minimum-phase filter
    Minimum,
    /// Minimum phase from a filter of half the length
    MinimumHalf,
}

const PHASE_NAMES: &[&str] = &["zero", "zero-double", "forward", "minimum", "minimum-half"];

impl Phase {
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Zero | Self::ZeroDouble)
    }

    pub fn is_minimum(&self) -> bool {
        matches!(self, Self::Minimum | Self::MinimumHalf)
    }
}

impl FromStr for Phase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zero" => Ok(Self::Zero),
            "zero-double" => Ok(Self::ZeroDouble),
            "forward" | "linear" => Ok(Self::Forward),
            "minimum" => Ok(Self::Minimum),
            "minimum-half" => Ok(Self::MinimumHalf),
            other => Err(CoreError::invalid_choice("phase", PHASE_NAMES, other)),
        }
    }
}

impl TryFrom<String> for Phase {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.to_string()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Zero => "zero",
            Self::ZeroDouble => "zero-double",
            Self::Forward => "forward",
            Self::Minimum => "minimum",
            Self::MinimumHalf => "minimum-half",
        };
        f.write_str(name)
    }
}

/// Validate a filter length for the requested phase.
///
/// Even lengths cannot be zero-phase. For `zero-double` with unit gain at
/// Nyquist the length is bumped to the next odd number instead.
pub fn check_zero_phase_length(n: usize, phase: Phase, gain_nyq: f64) -> Result<usize> {
    if n % 2 == 0 {
        match phase {
            Phase::Zero => {
                return Err(CoreError::argument(format!(
                    "filter_length must be odd if phase=\"zero\", got {}",
                    n
                )))
            }
            Phase::ZeroDouble if gain_nyq == 1.0 => return Ok(n + 1),
            _ => {}
        }
    }
    Ok(n)
}

/// Full linear convolution
pub fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &av) in a.iter().enumerate() {
        for (j, &bv) in b.iter().enumerate() {
            out[i + j] += av * bv;
        }
    }
    out
}

/// A filter prepared for repeated application to rows of equal length.
pub struct OverlapAdd {
    kernel: Kernel,
    n_edge: usize,
    pad: PadMode,
}

enum Kernel {
    /// Single-tap filters reduce to a gain
    Gain(f64),
    Blocks {
        n_h: usize,
        n_fft: usize,
        shift: usize,
        h_fft: Vec<Complex64>,
        backend: Arc<dyn FftBackend>,
    },
}

impl OverlapAdd {
    /// Prepare `h` for rows of `n_x` samples.
    ///
    /// When `n_fft` is `None` the block length minimizing the estimated
    /// multiply count is chosen.
    pub fn new(
        h: &[f64],
        n_x: usize,
        n_fft: Option<usize>,
        phase: Phase,
        pad: PadMode,
        backend: Arc<dyn FftBackend>,
        reporter: &dyn Reporter,
    ) -> Result<Self> {
        if h.is_empty() {
            return Err(CoreError::value("Filter must have at least one coefficient"));
        }
        check_zero_phase_length(h.len(), phase, 0.0)?;
        if h.len() == 1 {
            let gain = if phase == Phase::ZeroDouble {
                h[0] * h[0]
            } else {
                h[0]
            };
            return Ok(Self {
                kernel: Kernel::Gain(gain),
                n_edge: 0,
                pad,
            });
        }

        let n_edge = h.len().min(n_x).saturating_sub(1);
        reporter.debug(&format!("Smart-padding with:  {} samples on each edge", n_edge));
        let n_x_pad = n_x + 2 * n_edge;

        let h_eff = if phase == Phase::ZeroDouble {
            let reversed: Vec<f64> = h.iter().rev().copied().collect();
            convolve(h, &reversed)
        } else {
            h.to_vec()
        };
        let n_h = h_eff.len();
        let min_fft = 2 * n_h - 1;
        let n_fft = match n_fft {
            Some(n) => n,
            None => optimal_fft_length(n_h, n_x_pad),
        };
        reporter.debug(&format!("FFT block length:   {}", n_fft));
        if n_fft < min_fft {
            return Err(CoreError::value(format!(
                "n_fft is too short, has to be at least 2 * len(h) - 1 ({}), got {}",
                min_fft, n_fft
            )));
        }

        let shift = if phase.is_zero() { (n_h - 1) / 2 } else { 0 } + n_edge;
        let h_fft = backend.rfft(&h_eff, n_fft)?;
        Ok(Self {
            kernel: Kernel::Blocks {
                n_h,
                n_fft,
                shift,
                h_fft,
                backend,
            },
            n_edge,
            pad,
        })
    }

    /// Block length in use, `None` for single-tap filters
    pub fn n_fft(&self) -> Option<usize> {
        match &self.kernel {
            Kernel::Gain(_) => None,
            Kernel::Blocks { n_fft, .. } => Some(*n_fft),
        }
    }

    /// Filter one row. The output has the same length as `x`.
    pub fn apply(&self, x: &[f64]) -> Result<Vec<f64>> {
        let (n_h, n_fft, shift, h_fft, backend) = match &self.kernel {
            Kernel::Gain(g) => return Ok(x.iter().map(|v| v * g).collect()),
            Kernel::Blocks {
                n_h,
                n_fft,
                shift,
                h_fft,
                backend,
            } => (*n_h, *n_fft, *shift, h_fft, backend),
        };
        let n_x = x.len();
        if n_x == 0 {
            return Ok(Vec::new());
        }
        let n_edge = self.n_edge.min(n_x - 1);
        let padded = pad(x, (n_edge, n_edge), self.pad);
        let n_x_pad = padded.len();
        let shift = shift - self.n_edge + n_edge;

        let n_seg = n_fft - n_h + 1;
        let mut filtered = vec![0.0; n_x_pad];
        let mut start = 0;
        while start < n_x_pad {
            let stop = (start + n_seg).min(n_x_pad);
            let mut spectrum = backend.rfft(&padded[start..stop], n_fft)?;
            for (s, h) in spectrum.iter_mut().zip(h_fft.iter()) {
                *s *= h;
            }
            let prod = backend.irfft(&spectrum, n_fft)?;

            let offset = start as isize - shift as isize;
            let start_filt = offset.max(0) as usize;
            let stop_filt = (offset + n_fft as isize).min(n_x_pad as isize);
            if stop_filt > start_filt as isize {
                let start_prod = (shift as isize - start as isize).max(0) as usize;
                let count = stop_filt as usize - start_filt;
                for (dst, src) in filtered[start_filt..start_filt + count]
                    .iter_mut()
                    .zip(&prod[start_prod..start_prod + count])
                {
                    *dst += src;
                }
            }
            start += n_seg;
        }
        filtered.truncate(n_x);
        Ok(filtered)
    }
}

/// Block length minimizing `ceil(n_x / (N - n_h + 1)) * N * (log2 N + 1)`
/// plus a penalty on long transforms, over powers of two.
fn optimal_fft_length(n_h: usize, n_x: usize) -> usize {
    let min_fft = 2 * n_h - 1;
    if n_x < min_fft {
        return next_fast_len(min_fft);
    }
    let lo = min_fft.next_power_of_two().trailing_zeros();
    let hi = n_x.next_power_of_two().trailing_zeros();
    let mut best = (f64::INFINITY, 1usize << lo);
    for exp in lo..=hi {
        let n = 1usize << exp;
        let blocks = (n_x as f64 / (n - n_h + 1) as f64).ceil();
        let cost = blocks * n as f64 * (exp as f64 + 1.0) + 4e-5 * n as f64 * n_x as f64;
        if cost < best.0 {
            best = (cost, n);
        }
    }
    best.1
}

/// Filter a single row on the CPU backend.
pub fn overlap_add_filter(
    x: &[f64],
    h: &[f64],
    n_fft: Option<usize>,
    phase: Phase,
    pad: PadMode,
    reporter: &dyn Reporter,
) -> Result<Vec<f64>> {
    OverlapAdd::new(h, x.len(), n_fft, phase, pad, cpu_backend(), reporter)?.apply(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::report::MemoryReporter;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random(rng: &mut StdRng, n: usize) -> Vec<f64> {
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    /// Filter the slow way: pad, convolve, compensate delay, trim.
    fn direct(x: &[f64], h: &[f64], phase: Phase) -> Vec<f64> {
        let n_pad = h.len();
        let x_pad = pad(x, (n_pad, n_pad), PadMode::ReflectLimited);
        let (kernel, shift) = match phase {
            Phase::Zero => (h.to_vec(), (h.len() - 1) / 2),
            Phase::ZeroDouble => {
                let reversed: Vec<f64> = h.iter().rev().copied().collect();
                (convolve(h, &reversed), h.len() - 1)
            }
            _ => (h.to_vec(), 0),
        };
        let full = convolve(&x_pad, &kernel);
        full[shift + n_pad..shift + n_pad + x.len()].to_vec()
    }

    #[test]
    fn test_matches_direct_convolution() {
        let reporter = MemoryReporter::new();
        let mut rng = StdRng::seed_from_u64(0);
        for &n_signal in &[1usize, 2, 3, 5, 10, 20, 40] {
            let x = random(&mut rng, n_signal);
            for &n_filter in &[1usize, 2, 3, 5, 10, 11, 20, 21, 40, 41, 100, 101] {
                let h = random(&mut rng, n_filter);
                for phase in [Phase::Zero, Phase::Forward, Phase::ZeroDouble] {
                    if phase == Phase::Zero && n_filter % 2 == 0 {
                        let err = overlap_add_filter(&x, &h, None, phase, PadMode::ReflectLimited, &reporter)
                            .unwrap_err();
                        assert_eq!(err.kind(), ErrorKind::Argument);
                        continue;
                    }
                    let expected = direct(&x, &h, phase);
                    let scale = expected.iter().fold(1.0f64, |m, v| m.max(v.abs()));
                    let min_fft = match phase {
                        Phase::ZeroDouble => 4 * n_filter - 3,
                        _ => 2 * n_filter - 1,
                    };
                    for n_fft in [None, Some(32), Some(128), Some(129), Some(1023), Some(1024), Some(2048)] {
                        let result =
                            overlap_add_filter(&x, &h, n_fft, phase, PadMode::ReflectLimited, &reporter);
                        match n_fft {
                            Some(n) if n < min_fft && n_filter > 1 => {
                                assert_eq!(result.unwrap_err().kind(), ErrorKind::Value);
                            }
                            _ => {
                                let got = result.unwrap();
                                assert_eq!(got.len(), x.len());
                                for (a, b) in got.iter().zip(expected.iter()) {
                                    assert!(
                                        (a - b).abs() <= 1e-13 * scale,
                                        "n_signal={} n_filter={} phase={} n_fft={:?}: {} vs {}",
                                        n_signal, n_filter, phase, n_fft, a, b
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_identity_filter() {
        let reporter = MemoryReporter::new();
        let x: Vec<f64> = (0..50).map(|i| (i as f64 * 0.3).cos()).collect();
        let mut h = vec![0.0; 11];
        h[5] = 1.0;
        let y = overlap_add_filter(&x, &h, None, Phase::Zero, PadMode::ReflectLimited, &reporter).unwrap();
        for (a, b) in x.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-13);
        }
    }

    #[test]
    fn test_n_fft_too_short_message() {
        let reporter = MemoryReporter::new();
        let err = overlap_add_filter(&[0.0; 100], &[0.1; 11], Some(16), Phase::Zero, PadMode::Zero, &reporter)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "n_fft is too short, has to be at least 2 * len(h) - 1 (21), got 16"
        );
    }

    #[test]
    fn test_optimal_fft_length() {
        // short signal: a single block of fast length
        assert_eq!(optimal_fft_length(101, 150), next_fast_len(201));
        let n = optimal_fft_length(101, 100_000);
        assert!(n.is_power_of_two());
        assert!(n >= 201);
    }

    #[test]
    fn test_check_zero_phase_length() {
        assert!(check_zero_phase_length(10, Phase::Zero, 0.0).is_err());
        assert_eq!(check_zero_phase_length(10, Phase::ZeroDouble, 1.0).unwrap(), 11);
        assert_eq!(check_zero_phase_length(10, Phase::ZeroDouble, 0.0).unwrap(), 10);
        assert_eq!(check_zero_phase_length(10, Phase::Forward, 1.0).unwrap(), 10);
    }

    #[test]
    fn test_parse_phase() {
        assert_eq!("linear".parse::<Phase>().unwrap(), Phase::Forward);
        assert_eq!("zero-double".parse::<Phase>().unwrap(), Phase::ZeroDouble);
        assert!("blah".parse::<Phase>().is_err());
    }
}
