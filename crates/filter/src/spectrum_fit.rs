//! Sinusoid regression for line-noise removal
//!
//! Each row is cut into non-overlapping windows. In every window the line
//! components are estimated by least squares and subtracted, which removes
//! the interference without carving a hole in the spectrum. Without
//! explicit frequencies, lines are detected as spectral peaks that stand
//! out from the median noise floor.

use crate::params::FilterLength;
use crate::Result;
use nalgebra::{DMatrix, DVector};
use ndarray::{ArrayBase, Axis, DataMut, Dimension};
use neurofilt_core::fft::{select_backend, FftBackend};
use neurofilt_core::parallel::NJobs;
use neurofilt_core::report::Reporter;
use neurofilt_core::signal::{map_lanes_in_place, rows_for_picks};
use neurofilt_core::window::{get_window, WindowKind};
use neurofilt_core::CoreError;
use std::collections::BTreeMap;
use std::f64::consts::{LN_2, PI};
use std::sync::{Arc, Mutex};

/// Regress sinusoids out of the selected rows of `data` (time last).
///
/// `lines` holds `(freq, width)` pairs; `None` switches to detection.
/// `window` is the block length, `None` meaning the whole row.
#[allow(clippy::too_many_arguments)]
pub(crate) fn remove_lines<S, D>(
    data: &mut ArrayBase<S, D>,
    sfreq: f64,
    lines: Option<&[(f64, f64)]>,
    window: Option<FilterLength>,
    p_value: f64,
    picks: Option<&[usize]>,
    n_jobs: NJobs,
    reporter: &dyn Reporter,
) -> Result<()>
where
    S: DataMut<Elem = f64>,
    D: Dimension,
{
    if !(p_value > 0.0 && p_value < 1.0) {
        return Err(CoreError::value(format!("p_value must be in (0, 1), got {}", p_value)).into());
    }
    if data.ndim() == 0 {
        return Err(CoreError::value("Data to be filtered must have at least one dimension").into());
    }
    let rows = rows_for_picks(data.shape(), picks)?;
    let axis = Axis(data.ndim() - 1);
    let n_times = data.len_of(axis);
    if n_times == 0 || rows.is_empty() {
        return Ok(());
    }
    let block = match window {
        None => n_times,
        Some(length) => length
            .to_samples(sfreq)
            .unwrap_or_else(|| (10.0 * sfreq).ceil() as usize),
    }
    .clamp(1, n_times);
    reporter.debug(&format!(
        "Fitting line components in windows of {} samples ({:.3} s)",
        block,
        block as f64 / sfreq
    ));

    let fit = LineFit {
        sfreq,
        lines: lines.map(<[_]>::to_vec),
        p_value,
        backend: select_backend(n_jobs.is_cuda(), "spectrum fitting", reporter),
    };
    let counts = Mutex::new(BTreeMap::<i64, usize>::new());
    map_lanes_in_place(data, axis, &rows, n_jobs, |row| {
        let mut out = Vec::with_capacity(row.len());
        for (start, stop) in blocks(row.len(), block) {
            let (cleaned, found) = fit.clean(&row[start..stop])?;
            out.extend(cleaned);
            let mut counts = counts.lock().unwrap_or_else(|e| e.into_inner());
            let mut seen: Vec<i64> = found.iter().map(|f| f.round() as i64).collect();
            seen.dedup();
            for f in seen {
                *counts.entry(f).or_insert(0) += 1;
            }
        }
        Ok(out)
    })?;

    let counts = counts.into_inner().unwrap_or_else(|e| e.into_inner());
    reporter.info(if lines.is_some() {
        "Removed notch frequencies:"
    } else {
        "Detected notch frequencies:"
    });
    if counts.is_empty() {
        reporter.info("    None");
    } else {
        let summary: Vec<String> = counts
            .iter()
            .map(|(freq, n)| {
                format!(
                    "    {:6.2} : {:4} window{}",
                    *freq as f64,
                    n,
                    if *n == 1 { "" } else { "s" }
                )
            })
            .collect();
        reporter.info_lines(&summary);
    }
    Ok(())
}

/// `[start, stop)` of non-overlapping windows; the remainder joins the
/// last window.
fn blocks(n: usize, block: usize) -> Vec<(usize, usize)> {
    let n_blocks = (n / block).max(1);
    (0..n_blocks)
        .map(|k| {
            let stop = if k + 1 == n_blocks { n } else { (k + 1) * block };
            (k * block, stop)
        })
        .collect()
}

struct LineFit {
    sfreq: f64,
    lines: Option<Vec<(f64, f64)>>,
    p_value: f64,
    backend: Arc<dyn FftBackend>,
}

impl LineFit {
    /// Cleaned block and the frequencies that were regressed out.
    fn clean(&self, x: &[f64]) -> neurofilt_core::Result<(Vec<f64>, Vec<f64>)> {
        let n = x.len();
        if n < 4 {
            return Ok((x.to_vec(), Vec::new()));
        }
        let df = self.sfreq / n as f64;
        let freqs = match &self.lines {
            Some(lines) => {
                let nyq = self.sfreq / 2.0;
                let mut freqs = Vec::new();
                for &(f, w) in lines {
                    if f <= 0.0 || f >= nyq {
                        continue;
                    }
                    freqs.push(f);
                    let lo = ((f - w / 2.0) / df).ceil().max(1.0) as usize;
                    let hi = ((f + w / 2.0) / df).floor() as usize;
                    for k in lo..=hi.min(n / 2) {
                        let fk = k as f64 * df;
                        if (fk - f).abs() > df / 2.0 && (fk - f).abs() < w / 2.0 && fk < nyq {
                            freqs.push(fk);
                        }
                    }
                }
                freqs
            }
            None => self.detect(x)?,
        };
        if freqs.is_empty() {
            return Ok((x.to_vec(), Vec::new()));
        }
        let cleaned = regress_out(x, &freqs, self.sfreq)?;
        let reported = match &self.lines {
            Some(lines) => lines
                .iter()
                .map(|&(f, _)| f)
                .filter(|&f| f > 0.0 && f < self.sfreq / 2.0)
                .collect(),
            None => freqs,
        };
        Ok((cleaned, reported))
    }

    /// Peaks whose Hann-tapered power exceeds the noise floor at the
    /// Bonferroni-corrected `p_value`.
    fn detect(&self, x: &[f64]) -> neurofilt_core::Result<Vec<f64>> {
        let n = x.len();
        let taper = get_window(WindowKind::Hann, n, false);
        let mean = x.iter().sum::<f64>() / n as f64;
        let tapered: Vec<f64> = x.iter().zip(&taper).map(|(v, w)| (v - mean) * w).collect();
        let power: Vec<f64> = self
            .backend
            .rfft(&tapered, n)?
            .iter()
            .map(|c| c.norm_sqr())
            .collect();
        // DC and Nyquist are never lines
        let last = if n % 2 == 0 { power.len() - 1 } else { power.len() };
        if last <= 2 {
            return Ok(Vec::new());
        }
        let interior = &power[1..last];
        let Some(median) = median(interior) else {
            return Ok(Vec::new());
        };
        if median <= 0.0 {
            return Ok(Vec::new());
        }
        let threshold = median / LN_2 * (interior.len() as f64 / self.p_value).ln();
        let df = self.sfreq / n as f64;

        let mut found = Vec::new();
        for k in 1..last {
            let p = power[k];
            let next = power.get(k + 1).copied().unwrap_or(0.0);
            if p <= threshold || p < power[k - 1] || p <= next {
                continue;
            }
            let (a, b, c) = (power[k - 1].ln(), p.ln(), next.ln());
            let denom = a - 2.0 * b + c;
            let delta = if denom.is_finite() && denom < 0.0 {
                (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
            } else {
                0.0
            };
            found.push((k as f64 + delta) * df);
        }
        Ok(found)
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Least-squares fit of a cosine and a sine per frequency, subtracted
/// from `x`. Time restarts at zero in every block.
fn regress_out(x: &[f64], freqs: &[f64], sfreq: f64) -> neurofilt_core::Result<Vec<f64>> {
    let n = x.len();
    let design = DMatrix::from_fn(n, 2 * freqs.len(), |t, j| {
        let phase = 2.0 * PI * freqs[j / 2] * t as f64 / sfreq;
        if j % 2 == 0 {
            phase.cos()
        } else {
            phase.sin()
        }
    });
    let y = DVector::from_column_slice(x);
    let coef = design
        .clone()
        .svd(true, true)
        .solve(&y, 1e-10)
        .map_err(|e| CoreError::value(format!("Line fit failed: {}", e)))?;
    let residual = y - design * coef;
    Ok(residual.iter().copied().collect())
}
