//! Sample-rate conversion

use crate::params::{Npad, ResampleMethod, ResampleOptions};
use crate::Result;
use ndarray::{Array, Array2, ArrayBase, Axis, Data, Dimension};
use neurofilt_core::fft::select_backend;
use neurofilt_core::pad::{pad, PadMode};
use neurofilt_core::report::{PrecisionWarning, Reporter};
use neurofilt_core::signal::{map_lanes_resized, resolve_axis};
use neurofilt_core::window::{get_window, WindowKind};
use neurofilt_core::CoreError;
use neurofilt_design::fir::firwin;

/// Resample `x` along `options.axis` by the rational factor `up / down`.
///
/// The output has `max(round(n * up / down), 1)` samples along the axis,
/// rounding half to even. Empty input is returned unchanged with a
/// warning. The polyphase method pads with odd reflection by default,
/// see `polyphase_resample`.
pub fn resample<S, D>(
    x: &ArrayBase<S, D>,
    up: f64,
    down: f64,
    options: &ResampleOptions,
    reporter: &dyn Reporter,
) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if !(up > 0.0 && up.is_finite() && down > 0.0 && down.is_finite()) {
        return Err(CoreError::value(format!(
            "up and down must be positive and finite, got up={} and down={}",
            up, down
        ))
        .into());
    }
    let axis = resolve_axis(x.ndim(), options.axis)?;
    let n = x.len_of(axis);
    if n == 0 {
        reporter.warn(&PrecisionWarning::EmptySignal);
        return Ok(x.to_owned());
    }
    let final_len = scaled_len(n, up, down);
    match options.method {
        ResampleMethod::Fft => fft_resample(x, axis, up / down, final_len, options, reporter),
        ResampleMethod::Polyphase => polyphase_resample(x, axis, final_len, options, reporter),
    }
}

fn scaled_len(n: usize, up: f64, down: f64) -> usize {
    ((n as f64 * up / down).round_ties_even() as usize).max(1)
}

fn fft_resample<S, D>(
    x: &ArrayBase<S, D>,
    axis: Axis,
    ratio: f64,
    final_len: usize,
    options: &ResampleOptions,
    reporter: &dyn Reporter,
) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let n = x.len_of(axis);
    let (pre, post) = match options.npad {
        Npad::Samples(k) => (k, k),
        Npad::Auto => {
            let min_add = (n / 8).min(100) * 2;
            let total = (n + min_add).next_power_of_two() - n;
            (total / 2, total - total / 2)
        }
    };
    let orig_len = n + pre + post;
    let new_len = ((ratio * orig_len as f64).round_ties_even() as usize).max(1);
    let skip = (ratio * pre as f64).round_ties_even() as usize;
    let pad_mode = options.pad.unwrap_or(PadMode::ReflectLimited);
    reporter.debug(&format!(
        "Resampling {} samples (padded to {}) to {}",
        n, orig_len, new_len
    ));

    // spectral window, centered on DC and folded onto the one-sided grid
    let window = get_window(options.window.unwrap_or(WindowKind::Boxcar), orig_len, false);
    let scale = new_len as f64 / orig_len as f64;
    let shifted: Vec<f64> = (0..orig_len)
        .map(|i| window[(i + orig_len / 2) % orig_len] * scale)
        .collect();
    let weights: Vec<f64> = (0..orig_len / 2 + 1)
        .map(|k| {
            if k == 0 {
                shifted[0]
            } else {
                (shifted[k] + shifted[orig_len - k]) / 2.0
            }
        })
        .collect();

    let use_len = new_len.min(orig_len);
    let nyquist_fix = (use_len % 2 == 0).then(|| {
        let factor = if new_len < orig_len { 2.0 } else { 0.5 };
        (use_len / 2, factor)
    });

    let backend = select_backend(options.n_jobs.is_cuda(), "FFT resampling", reporter);
    map_lanes_resized(x, axis, final_len, options.n_jobs, |row| {
        let padded = pad(row, (pre, post), pad_mode);
        let mut spectrum = backend.rfft(&padded, orig_len)?;
        if let Some((bin, factor)) = nyquist_fix {
            if let Some(v) = spectrum.get_mut(bin) {
                *v *= factor;
            }
        }
        for (v, w) in spectrum.iter_mut().zip(&weights) {
            *v *= *w;
        }
        let y = backend.irfft(&spectrum, new_len)?;
        let mut out: Vec<f64> = y.iter().skip(skip).take(final_len).copied().collect();
        out.resize(final_len, 0.0);
        Ok(out)
    })
    .map_err(Into::into)
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Windowed-sinc interpolation by the reduced integer pair
/// `final_len / n`, computing only the output samples that are kept.
///
/// Without an explicit `pad` the edges are extended by odd reflection
/// ([`PadMode::Reflect`], `2 * x[0] - x[k]`), not by plain mirroring
/// (`x[k]`). A trend running into the edge continues instead of folding
/// back, so the first and last few outputs differ from a mirror-padded
/// polyphase resampler.
fn polyphase_resample<S, D>(
    x: &ArrayBase<S, D>,
    axis: Axis,
    final_len: usize,
    options: &ResampleOptions,
    reporter: &dyn Reporter,
) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let n = x.len_of(axis);
    let g = gcd(final_len, n);
    let (up, down) = (final_len / g, n / g);
    if up == 1 && down == 1 {
        return Ok(x.to_owned());
    }
    let max_rate = up.max(down);
    let half_len = 10 * max_rate;
    let window = options.window.unwrap_or(WindowKind::Kaiser(5.0));
    let h = firwin(2 * half_len + 1, 1.0 / max_rate as f64, window)?;

    let neighborhood = half_len.div_ceil(up);
    reporter.info(&format!(
        "Polyphase resampling neighborhood: ±{} input sample{}",
        neighborhood,
        if neighborhood == 1 { "" } else { "s" }
    ));

    let n_pre_pad = down - half_len % down;
    let n_pre_remove = (half_len + n_pre_pad) / down;
    let mut taps = vec![0.0; n_pre_pad];
    taps.extend(h.iter().map(|v| v * up as f64));
    let n_edge = taps.len() / up + 2;
    let pad_mode = options.pad.unwrap_or(PadMode::Reflect);

    map_lanes_resized(x, axis, final_len, options.n_jobs, |row| {
        let xp = pad(row, (n_edge, n_edge), pad_mode);
        let out: Vec<f64> = (0..final_len)
            .map(|i| {
                let t = (n_pre_remove + i) * down + n_edge * up;
                let (j, k0) = (t / up, t % up);
                taps[k0..]
                    .iter()
                    .step_by(up)
                    .enumerate()
                    .take_while(|(m, _)| *m <= j)
                    .filter_map(|(m, tap)| xp.get(j - m).map(|v| tap * v))
                    .sum::<f64>()
            })
            .collect();
        Ok(out)
    })
    .map_err(Into::into)
}

/// Resample stimulus channels without inventing or smearing events.
///
/// Each output sample takes the first non-zero value in its source
/// window, or the value at the window start when there is none. `data` is
/// one channel (1-D) or `(n_channels, n_times)`.
pub fn resample_stim_channels<S, D>(data: &ArrayBase<S, D>, up: f64, down: f64) -> Result<Array2<f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if !(up > 0.0 && up.is_finite() && down > 0.0 && down.is_finite()) {
        return Err(CoreError::value(format!(
            "up and down must be positive and finite, got up={} and down={}",
            up, down
        ))
        .into());
    }
    let rows: Vec<Vec<f64>> = match data.ndim() {
        1 => vec![data.iter().copied().collect()],
        2 => data.lanes(Axis(1)).into_iter().map(|l| l.to_vec()).collect(),
        ndim => {
            return Err(CoreError::value(format!(
                "Stim data must be 1- or 2-dimensional, got {} dimensions",
                ndim
            ))
            .into())
        }
    };
    let n = rows.first().map_or(0, Vec::len);
    if n == 0 {
        return Ok(Array2::zeros((rows.len(), 0)));
    }
    let n_out = scaled_len(n, up, down);
    let picks: Vec<usize> = (0..n_out)
        .map(|i| ((i as f64 * down / up).floor() as usize).min(n - 1))
        .collect();

    let mut out = Array2::zeros((rows.len(), n_out));
    for (mut dst, stim) in out.rows_mut().into_iter().zip(&rows) {
        for (i, &start) in picks.iter().enumerate() {
            let stop = picks.get(i + 1).copied().unwrap_or(n).max(start);
            dst[i] = stim[start..stop]
                .iter()
                .copied()
                .find(|v| *v != 0.0)
                .unwrap_or(stim[start]);
        }
    }
    Ok(out)
}
