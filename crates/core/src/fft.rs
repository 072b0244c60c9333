//! FFT backends
//!
//! All spectral work in the crate goes through [`FftBackend`], which only
//! needs real-input transforms. The CPU implementation wraps `realfft`.
//! An accelerated implementation can be registered once per process with
//! [`install_accelerator`]; it is resolved on first use and reused.

use crate::report::Reporter;
use crate::{CoreError, Result};
use realfft::RealFftPlanner;
use rustfft::num_complex::Complex64;
use std::sync::{Arc, Mutex, OnceLock};

/// Real-input FFT provider
pub trait FftBackend: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Forward transform of `input`, zero-padded or truncated to `n`.
    /// Returns `n / 2 + 1` bins.
    fn rfft(&self, input: &[f64], n: usize) -> Result<Vec<Complex64>>;

    /// Inverse of [`FftBackend::rfft`] producing `n` samples, normalized by `1/n`.
    /// Missing bins are treated as zero, extra bins are ignored.
    fn irfft(&self, spectrum: &[Complex64], n: usize) -> Result<Vec<f64>>;
}

/// `realfft`-based backend. Plans are cached by the planner.
pub struct CpuFft {
    planner: Mutex<RealFftPlanner<f64>>,
}

impl CpuFft {
    pub fn new() -> Self {
        Self {
            planner: Mutex::new(RealFftPlanner::new()),
        }
    }
}

impl Default for CpuFft {
    fn default() -> Self {
        Self::new()
    }
}

impl FftBackend for CpuFft {
    fn name(&self) -> &str {
        "cpu"
    }

    fn rfft(&self, input: &[f64], n: usize) -> Result<Vec<Complex64>> {
        if n == 0 {
            return Err(CoreError::FftError {
                msg: "FFT length must be positive".to_string(),
            });
        }
        let mut buffer = vec![0.0; n];
        let take = input.len().min(n);
        buffer[..take].copy_from_slice(&input[..take]);
        if n == 1 {
            return Ok(vec![Complex64::new(buffer[0], 0.0)]);
        }

        let r2c = {
            let mut planner = self.planner.lock().unwrap_or_else(|e| e.into_inner());
            planner.plan_fft_forward(n)
        };
        let mut spectrum = r2c.make_output_vec();
        r2c.process(&mut buffer, &mut spectrum)?;
        Ok(spectrum)
    }

    fn irfft(&self, spectrum: &[Complex64], n: usize) -> Result<Vec<f64>> {
        if n == 0 {
            return Err(CoreError::FftError {
                msg: "FFT length must be positive".to_string(),
            });
        }
        let n_bins = n / 2 + 1;
        let mut bins = vec![Complex64::new(0.0, 0.0); n_bins];
        let take = spectrum.len().min(n_bins);
        bins[..take].copy_from_slice(&spectrum[..take]);
        // DC and (for even n) Nyquist must be real
        bins[0].im = 0.0;
        if n % 2 == 0 {
            bins[n_bins - 1].im = 0.0;
        }
        if n == 1 {
            return Ok(vec![bins[0].re]);
        }

        let c2r = {
            let mut planner = self.planner.lock().unwrap_or_else(|e| e.into_inner());
            planner.plan_fft_inverse(n)
        };
        let mut output = c2r.make_output_vec();
        c2r.process(&mut bins, &mut output)?;
        let scale = 1.0 / n as f64;
        for v in output.iter_mut() {
            *v *= scale;
        }
        Ok(output)
    }
}

static CPU_BACKEND: OnceLock<Arc<CpuFft>> = OnceLock::new();
static ACCELERATOR_CANDIDATE: Mutex<Option<Arc<dyn FftBackend>>> = Mutex::new(None);
static ACCELERATOR: OnceLock<Option<Arc<dyn FftBackend>>> = OnceLock::new();

/// Shared CPU backend
pub fn cpu_backend() -> Arc<dyn FftBackend> {
    CPU_BACKEND.get_or_init(|| Arc::new(CpuFft::new())).clone()
}

/// Register an accelerated backend. Must happen before the first
/// accelerated request; returns `false` once the choice has been resolved.
pub fn install_accelerator(backend: Arc<dyn FftBackend>) -> bool {
    if ACCELERATOR.get().is_some() {
        return false;
    }
    let mut candidate = ACCELERATOR_CANDIDATE
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    *candidate = Some(backend);
    true
}

/// The process-wide accelerator, probed once.
pub fn accelerator() -> Option<Arc<dyn FftBackend>> {
    ACCELERATOR
        .get_or_init(|| {
            ACCELERATOR_CANDIDATE
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take()
        })
        .clone()
}

/// Pick the backend for one call. `accelerated` requests the registered
/// accelerator; if none is available the CPU backend is used instead.
pub fn select_backend(
    accelerated: bool,
    purpose: &str,
    reporter: &dyn Reporter,
) -> Arc<dyn FftBackend> {
    if accelerated {
        match accelerator() {
            Some(backend) => {
                reporter.info(&format!("Using CUDA for {}", purpose));
                return backend;
            }
            None => reporter.debug("CUDA not available, falling back to n_jobs=1"),
        }
    }
    cpu_backend()
}

/// Smallest `2^a 3^b 5^c` that is at least `target`.
pub fn next_fast_len(target: usize) -> usize {
    if target <= 6 {
        return target.max(1);
    }
    let mut n = target;
    loop {
        let mut m = n;
        for p in [2, 3, 5] {
            while m % p == 0 {
                m /= p;
            }
        }
        if m == 1 {
            return n;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rfft_impulse() {
        let fft = CpuFft::new();
        let spectrum = fft.rfft(&[1.0], 8).unwrap();
        assert_eq!(spectrum.len(), 5);
        for bin in spectrum {
            assert_abs_diff_eq!(bin.re, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(bin.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_roundtrip_odd_and_even() {
        let fft = CpuFft::new();
        for n in [1usize, 2, 7, 8, 15] {
            let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() + 0.3).collect();
            let spectrum = fft.rfft(&x, n).unwrap();
            let y = fft.irfft(&spectrum, n).unwrap();
            for (a, b) in x.iter().zip(y.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_irfft_ignores_invalid_imaginary_parts() {
        let fft = CpuFft::new();
        let spectrum = vec![Complex64::new(4.0, 1.0), Complex64::new(0.0, 0.0), Complex64::new(0.0, 3.0)];
        let y = fft.irfft(&spectrum, 4).unwrap();
        for v in y {
            assert_abs_diff_eq!(v, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_next_fast_len() {
        assert_eq!(next_fast_len(1), 1);
        assert_eq!(next_fast_len(7), 8);
        assert_eq!(next_fast_len(11), 12);
        assert_eq!(next_fast_len(97), 100);
        assert_eq!(next_fast_len(1025), 1080);
    }

    #[test]
    fn test_select_backend_falls_back() {
        let reporter = MemoryReporter::new();
        let backend = select_backend(false, "FFT FIR filtering", &reporter);
        assert_eq!(backend.name(), "cpu");
        assert!(!reporter.info_text().contains("CUDA"));
    }
}
