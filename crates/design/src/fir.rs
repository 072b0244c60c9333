//! FIR filter design
//!
//! Linear-phase designs by the window method, either summing windowed-sinc
//! lowpasses in the time domain (`firwin`) or sampling a piecewise-linear
//! gain in the frequency domain (`firwin2`), with optional conversion to
//! minimum phase.

use crate::poly::freqz;
use crate::Result;
use neurofilt_core::fft::cpu_backend;
use neurofilt_core::overlap::{check_zero_phase_length, Phase};
use neurofilt_core::report::{PrecisionWarning, Reporter};
use neurofilt_core::window::{get_window, WindowKind};
use neurofilt_core::{Complex64, CoreError};
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Windows allowed for FIR design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FirWindow {
    Hann,
    #[default]
    Hamming,
    Blackman,
}

const FIR_WINDOW_NAMES: &[&str] = &["hann", "hamming", "blackman"];

impl FirWindow {
    /// Passband ripple of the window method
    pub fn ripple(&self) -> f64 {
        match self {
            Self::Hann => 0.0546,
            Self::Hamming => 0.0194,
            Self::Blackman => 0.0017,
        }
    }

    /// Stop-band attenuation in dB
    pub fn attenuation_db(&self) -> u32 {
        match self {
            Self::Hann => 44,
            Self::Hamming => 53,
            Self::Blackman => 74,
        }
    }

    /// Filter length per unit of normalized transition bandwidth
    pub fn length_factor(&self) -> f64 {
        match self {
            Self::Hann => 3.1,
            Self::Hamming => 3.3,
            Self::Blackman => 5.0,
        }
    }

    pub fn kind(&self) -> WindowKind {
        match self {
            Self::Hann => WindowKind::Hann,
            Self::Hamming => WindowKind::Hamming,
            Self::Blackman => WindowKind::Blackman,
        }
    }

    /// Capitalized name used in reports
    pub fn title(&self) -> &'static str {
        match self {
            Self::Hann => "Hann",
            Self::Hamming => "Hamming",
            Self::Blackman => "Blackman",
        }
    }
}

impl FromStr for FirWindow {
    type Err = CoreError;

    fn from_str(s: &str) -> neurofilt_core::Result<Self> {
        match s {
            "hann" => Ok(Self::Hann),
            "hamming" => Ok(Self::Hamming),
            "blackman" => Ok(Self::Blackman),
            other => Err(CoreError::invalid_choice("fir_window", FIR_WINDOW_NAMES, other)),
        }
    }
}

impl TryFrom<String> for FirWindow {
    type Error = CoreError;

    fn try_from(value: String) -> neurofilt_core::Result<Self> {
        value.parse()
    }
}

impl From<FirWindow> for String {
    fn from(window: FirWindow) -> Self {
        window.to_string()
    }
}

impl fmt::Display for FirWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title().to_ascii_lowercase())
    }
}

/// FIR design method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FirDesign {
    /// Time-domain sum of windowed-sinc lowpasses
    #[default]
    Firwin,
    /// Frequency sampling
    Firwin2,
}

impl FromStr for FirDesign {
    type Err = CoreError;

    fn from_str(s: &str) -> neurofilt_core::Result<Self> {
        match s {
            "firwin" => Ok(Self::Firwin),
            "firwin2" => Ok(Self::Firwin2),
            other => Err(CoreError::invalid_choice(
                "fir_design",
                &["firwin", "firwin2"],
                other,
            )),
        }
    }
}

impl TryFrom<String> for FirDesign {
    type Error = CoreError;

    fn try_from(value: String) -> neurofilt_core::Result<Self> {
        value.parse()
    }
}

impl From<FirDesign> for String {
    fn from(design: FirDesign) -> Self {
        design.to_string()
    }
}

impl fmt::Display for FirDesign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firwin => f.write_str("firwin"),
            Self::Firwin2 => f.write_str("firwin2"),
        }
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Windowed-sinc lowpass with `cutoff` relative to Nyquist, normalized to
/// unit gain at DC.
pub fn firwin(numtaps: usize, cutoff: f64, window: WindowKind) -> Result<Vec<f64>> {
    if numtaps == 0 {
        return Err(CoreError::value("At least one filter tap is required").into());
    }
    if !(cutoff > 0.0 && cutoff < 1.0) {
        return Err(CoreError::value(format!(
            "Cutoff must be strictly between 0 and Nyquist, got {}",
            cutoff
        ))
        .into());
    }
    let alpha = 0.5 * (numtaps - 1) as f64;
    let win = get_window(window, numtaps, true);
    let mut h: Vec<f64> = win
        .iter()
        .enumerate()
        .map(|(k, w)| cutoff * sinc(cutoff * (k as f64 - alpha)) * w)
        .collect();
    let total: f64 = h.iter().sum();
    for v in h.iter_mut() {
        *v /= total;
    }
    Ok(h)
}

/// Piecewise-linear interpolation; `xp` must be increasing.
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let last = xp.len() - 1;
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    let hi = xp.partition_point(|&v| v <= x).min(last);
    let lo = hi - 1;
    let t = (x - xp[lo]) / (xp[hi] - xp[lo]);
    fp[lo] + t * (fp[hi] - fp[lo])
}

/// Frequency-sampling design. `freq` runs from 0 to 1 (Nyquist) and may
/// repeat a value once to describe a step.
pub fn firwin2(numtaps: usize, freq: &[f64], gain: &[f64], window: WindowKind) -> Result<Vec<f64>> {
    if freq.len() != gain.len() || freq.len() < 2 {
        return Err(CoreError::value("freq and gain must be of the same length").into());
    }
    if numtaps == 0 {
        return Err(CoreError::value("At least one filter tap is required").into());
    }
    let last = freq.len() - 1;
    if freq[0] != 0.0 || freq[last] != 1.0 {
        return Err(CoreError::value("freq must start with 0 and end with fs/2").into());
    }
    if freq.windows(2).any(|w| w[1] < w[0]) {
        return Err(CoreError::value("The values in freq must be nondecreasing.").into());
    }
    if freq.windows(3).any(|w| w[0] == w[2]) {
        return Err(CoreError::value("A value in freq must not occur more than twice.").into());
    }
    if freq[1] == 0.0 {
        return Err(CoreError::value("Value 0 must not be repeated in freq").into());
    }
    if freq[last - 1] == 1.0 {
        return Err(CoreError::value("Value fs/2 must not be repeated in freq").into());
    }
    if numtaps % 2 == 0 && gain[last] != 0.0 {
        return Err(CoreError::value(
            "A filter with an even number of coefficients must have zero gain at the Nyquist frequency.",
        )
        .into());
    }

    let mut freq = freq.to_vec();
    for k in 0..last {
        if freq[k] == freq[k + 1] {
            freq[k] -= f64::EPSILON;
            freq[k + 1] += f64::EPSILON;
        }
    }
    if freq.windows(2).any(|w| w[1] <= w[0]) {
        return Err(CoreError::value("freq cannot contain numbers that are too close to a repeated value").into());
    }

    let nfreqs = 1 + (numtaps as f64).log2().ceil().max(0.0).exp2() as usize;
    let delay = (numtaps - 1) as f64 / 2.0;
    let spectrum: Vec<Complex64> = (0..nfreqs)
        .map(|i| {
            let x = i as f64 / (nfreqs - 1) as f64;
            interp(x, &freq, gain) * Complex64::from_polar(1.0, -delay * PI * x)
        })
        .collect();
    let full = cpu_backend().irfft(&spectrum, 2 * (nfreqs - 1))?;
    let win = get_window(window, numtaps, true);
    Ok(full.iter().zip(win.iter()).map(|(h, w)| h * w).collect())
}

/// Sum of windowed-sinc lowpasses, one per gain step, each sized for its
/// own transition band. `freq` is relative to Nyquist; gains are 0 or 1.
pub fn firwin_design(
    n: usize,
    freq: &[f64],
    gain: &[f64],
    window: FirWindow,
    sfreq: f64,
) -> Result<Vec<f64>> {
    let mut h = vec![0.0; n];
    let (mut prev_freq, mut prev_gain) = match (freq.last(), gain.last()) {
        (Some(&f), Some(&g)) => (f, g),
        _ => return Err(CoreError::value("freq and gain must not be empty").into()),
    };
    if prev_gain == 1.0 {
        h[n / 2] = 1.0;
    }
    for (&this_freq, &this_gain) in freq.iter().zip(gain).rev().skip(1) {
        if this_gain != prev_gain {
            let transition = (prev_freq - this_freq) / 2.0;
            let mut this_n = (window.length_factor() / transition).round() as usize;
            this_n += 1 - this_n % 2;
            if this_n > n {
                return Err(crate::DesignError::FilterTooShort {
                    length: n,
                    transition: transition * sfreq / 2.0,
                    required: this_n,
                });
            }
            let this_h = firwin(this_n, (prev_freq + this_freq) / 2.0, window.kind())?;
            let offset = (n - this_n) / 2;
            let sign = if this_gain == 0.0 { -1.0 } else { 1.0 };
            for (dst, src) in h[offset..offset + this_n].iter_mut().zip(&this_h) {
                *dst += sign * src;
            }
        }
        prev_gain = this_gain;
        prev_freq = this_freq;
    }
    Ok(h)
}

fn complex_fft(buf: &mut [Complex64], inverse: bool) {
    let mut planner = FftPlanner::<f64>::new();
    if inverse {
        planner.plan_fft_inverse(buf.len()).process(buf);
        let scale = 1.0 / buf.len() as f64;
        for v in buf.iter_mut() {
            *v *= scale;
        }
    } else {
        planner.plan_fft_forward(buf.len()).process(buf);
    }
}

/// Convert a linear-phase filter to minimum phase by the homomorphic
/// (real cepstrum) method.
///
/// With `half` the magnitude response is the square root of the original
/// and the result has about half the taps; otherwise the magnitude is
/// preserved and so is the length.
pub fn minimum_phase(h: &[f64], half: bool) -> Result<Vec<f64>> {
    if h.len() <= 2 {
        return Err(CoreError::value("h must be of length greater than 2").into());
    }
    let target = 2.0 * (h.len() - 1) as f64 / 0.01;
    let n_fft = target.log2().ceil().exp2() as usize;

    let mut buf: Vec<Complex64> = h.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    buf.resize(n_fft, Complex64::new(0.0, 0.0));
    complex_fft(&mut buf, false);
    let mut mag: Vec<f64> = buf.iter().map(|c| c.norm()).collect();
    let floor = mag
        .iter()
        .copied()
        .filter(|&v| v > 0.0)
        .fold(f64::INFINITY, f64::min);
    if !floor.is_finite() {
        return Err(CoreError::value("Cannot compute the minimum phase of an all-zero filter").into());
    }
    let scale = if half { 0.5 } else { 1.0 };
    for v in mag.iter_mut() {
        *v = scale * (*v + 1e-7 * floor).ln();
    }

    let mut cep: Vec<Complex64> = mag.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    complex_fft(&mut cep, true);
    let stop = n_fft / 2;
    for (i, c) in cep.iter_mut().enumerate() {
        let w = if i == 0 {
            1.0
        } else if i < stop {
            2.0
        } else if i == stop && n_fft % 2 == 1 {
            1.0
        } else {
            0.0
        };
        *c = Complex64::new(c.re * w, 0.0);
    }
    complex_fft(&mut cep, false);
    for c in cep.iter_mut() {
        *c = c.exp();
    }
    complex_fft(&mut cep, true);

    let n_out = if half {
        h.len() / 2 + h.len() % 2
    } else {
        h.len()
    };
    Ok(cep.iter().take(n_out).map(|c| c.re).collect())
}

/// Worst stop-band attenuation of `h` in dB and the (normalized)
/// frequency where it occurs.
pub fn filter_attenuation(h: &[f64], freq: &[f64], gain: &[f64]) -> (f64, f64) {
    let w: Vec<f64> = freq.iter().map(|f| PI * f).collect();
    let resp = freqz(h, &[1.0], &w);
    let (idx, worst) = resp
        .iter()
        .zip(gain)
        .map(|(r, &g)| if g == 1.0 { 0.0 } else { r.norm() })
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        });
    (-20.0 * worst.max(1e-20).log10(), freq[idx])
}

/// Build an FIR filter of `filter_length` taps for the piecewise gain
/// `gain` at frequencies `freq` (Hz, from 0 to Nyquist).
#[allow(clippy::too_many_arguments)]
pub fn construct_fir_filter(
    sfreq: f64,
    freq: &[f64],
    gain: &[f64],
    filter_length: usize,
    phase: Phase,
    window: FirWindow,
    design: FirDesign,
    reporter: &dyn Reporter,
) -> Result<Vec<f64>> {
    let min_att_db = if phase == Phase::MinimumHalf { 12.0 } else { 20.0 };
    let nyq = sfreq / 2.0;
    let freq: Vec<f64> = freq.iter().map(|f| f / nyq).collect();
    if freq.first() != Some(&0.0) || freq.last() != Some(&1.0) {
        return Err(CoreError::value(format!(
            "freq must start at 0 and end an Nyquist ({}), got {:?}",
            nyq,
            freq.iter().map(|f| f * nyq).collect::<Vec<_>>()
        ))
        .into());
    }
    let gain_nyq = gain.last().copied().unwrap_or(0.0);
    let n = check_zero_phase_length(filter_length, phase, gain_nyq)?;

    let run = |taps: usize| -> Result<Vec<f64>> {
        match design {
            FirDesign::Firwin => firwin_design(taps, &freq, gain, window, sfreq),
            FirDesign::Firwin2 => firwin2(taps, &freq, gain, window.kind()),
        }
    };
    let h = match phase {
        Phase::MinimumHalf => minimum_phase(&run(2 * n - 1)?, true)?,
        Phase::Minimum => minimum_phase(&run(n)?, false)?,
        _ => run(n)?,
    };

    let (mut att_db, att_freq) = filter_attenuation(&h, &freq, gain);
    if phase == Phase::ZeroDouble {
        att_db += 6.0;
    }
    if att_db < min_att_db {
        reporter.warn(&PrecisionWarning::LowAttenuation {
            freq: att_freq * nyq,
            attenuation_db: att_db,
        });
    }
    Ok(h)
}

/// Cosine-squared frequency-domain design of the legacy C tools, always
/// 8193 taps centred on sample 4096.
pub fn design_mne_c_filter(
    sfreq: f64,
    l_freq: Option<f64>,
    h_freq: Option<f64>,
    l_trans_bandwidth: Option<f64>,
    h_trans_bandwidth: f64,
    reporter: &dyn Reporter,
) -> Result<Vec<f64>> {
    const N_FREQS: usize = (4096 + 2 * 2048) / 2 + 1;
    let bins = (N_FREQS - 1) as f64;
    let half_fs = 0.5 * sfreq;
    let mut resp = vec![1.0; N_FREQS];

    let l_freq = l_freq.unwrap_or(0.0);
    let l_width = match l_trans_bandwidth {
        None => 3,
        Some(tb) => ((bins * tb / half_fs) as i64 + 1) / 2,
    };
    let l_start = (bins * l_freq / half_fs) as i64;
    let h_freq = h_freq.unwrap_or(half_fs);
    let h_width = ((bins * h_trans_bandwidth / half_fs) as i64 + 1) / 2;
    let h_start = (bins * h_freq / half_fs) as i64;
    reporter.info(&format!(
        "filter : {:7.3} ... {:6.1} Hz   bins : {} ... {} of {} hpw : {} lpw : {}",
        l_freq, h_freq, l_start, h_start, N_FREQS, l_width, h_width
    ));

    let ramp = |width: i64, offset: f64| -> Vec<f64> {
        (-width + 1..width)
            .map(|k| (PI / 4.0 * (k as f64 / width as f64 + offset)).cos().powi(2))
            .collect()
    };
    if l_freq > 0.0 {
        let start = l_start - l_width + 1;
        let stop = start + 2 * l_width - 1;
        if start < 0 || stop >= N_FREQS as i64 {
            return Err(CoreError::value("l_freq too low or l_trans_bandwidth too large").into());
        }
        let (start, stop) = (start as usize, stop as usize);
        resp[..start].iter_mut().for_each(|v| *v = 0.0);
        // a zero-width ramp leaves only the hard edge
        if stop > start {
            resp[start..stop].copy_from_slice(&ramp(l_width, 3.0));
        }
    }
    if h_freq < half_fs {
        let start = h_start - h_width + 1;
        let stop = start + 2 * h_width - 1;
        if start < 0 || stop >= N_FREQS as i64 {
            return Err(CoreError::value("h_freq too high or h_trans_bandwidth too large").into());
        }
        let (start, stop) = (start as usize, stop as usize);
        if stop > start {
            for (dst, r) in resp[start..stop].iter_mut().zip(ramp(h_width, 1.0)) {
                *dst *= r;
            }
        }
        resp[stop..].iter_mut().for_each(|v| *v = 0.0);
    }

    let spectrum: Vec<Complex64> = resp.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    let mut h = cpu_backend().irfft(&spectrum, 2 * N_FREQS - 1)?;
    h.rotate_right(N_FREQS - 1);
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DesignError;
    use approx::assert_abs_diff_eq;
    use neurofilt_core::report::MemoryReporter;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    fn response_at(h: &[f64], f_norm: f64) -> f64 {
        freqz(h, &[1.0], &[PI * f_norm])[0].norm()
    }

    #[test]
    fn test_firwin_is_symmetric_with_unit_dc() {
        let h = firwin(51, 0.3, WindowKind::Hamming).unwrap();
        assert_eq!(h.len(), 51);
        assert_abs_diff_eq!(h.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for k in 0..25 {
            assert_abs_diff_eq!(h[k], h[50 - k], epsilon = 1e-15);
        }
        assert!(firwin(11, 1.0, WindowKind::Hamming).is_err());
    }

    #[quickcheck]
    fn prop_firwin_linear_phase(half: u8, cutoff: u8) -> TestResult {
        let cutoff = cutoff as f64 / 256.0;
        if cutoff == 0.0 {
            return TestResult::discard();
        }
        let n = 2 * half as usize + 1;
        let h = firwin(n, cutoff, WindowKind::Hann).unwrap();
        let symmetric = (0..n / 2).all(|k| (h[k] - h[n - 1 - k]).abs() < 1e-12);
        let unit_dc = (h.iter().sum::<f64>() - 1.0).abs() < 1e-9;
        TestResult::from_bool(symmetric && unit_dc)
    }

    #[test]
    fn test_firwin_design_lowpass() {
        // 40 Hz lowpass, 10 Hz transition at 1 kHz
        let freq = [0.0, 40.0 / 500.0, 50.0 / 500.0, 1.0];
        let gain = [1.0, 1.0, 0.0, 0.0];
        let h = firwin_design(331, &freq, &gain, FirWindow::Hamming, 1000.0).unwrap();
        assert_eq!(h.len(), 331);
        assert_abs_diff_eq!(response_at(&h, 20.0 / 500.0), 1.0, epsilon = 0.02);
        assert!(response_at(&h, 60.0 / 500.0) < 0.01);
    }

    #[test]
    fn test_firwin_design_too_short() {
        let freq = [0.0, 40.0 / 500.0, 50.0 / 500.0, 1.0];
        let gain = [1.0, 1.0, 0.0, 0.0];
        let err = firwin_design(101, &freq, &gain, FirWindow::Hamming, 1000.0).unwrap_err();
        match err {
            DesignError::FilterTooShort {
                length, required, ..
            } => {
                assert_eq!(length, 101);
                assert_eq!(required, 331);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_firwin2_highpass_and_even_length() {
        let freq = [0.0, 0.1, 0.2, 1.0];
        let gain = [0.0, 0.0, 1.0, 1.0];
        let h = firwin2(101, &freq, &gain, WindowKind::Hamming).unwrap();
        assert_eq!(h.len(), 101);
        assert!(response_at(&h, 0.0) < 0.02);
        assert_abs_diff_eq!(response_at(&h, 0.6), 1.0, epsilon = 0.02);

        let err = firwin2(100, &freq, &gain, WindowKind::Hamming).unwrap_err();
        assert!(err.to_string().contains("even number of coefficients"));
        assert!(firwin2(101, &[0.0, 0.5, 0.5, 0.5, 1.0], &[1.0; 5], WindowKind::Hamming).is_err());
    }

    #[test]
    fn test_minimum_phase_preserves_magnitude() {
        let freq = [0.0, 0.2, 0.3, 1.0];
        let gain = [1.0, 1.0, 0.0, 0.0];
        let h = firwin_design(101, &freq, &gain, FirWindow::Hamming, 2.0).unwrap();
        let hm = minimum_phase(&h, false).unwrap();
        assert_eq!(hm.len(), 101);
        for &f in &[0.0, 0.1, 0.5] {
            assert_abs_diff_eq!(response_at(&hm, f), response_at(&h, f), epsilon = 1e-3);
        }
        // energy moves to the start
        let energy = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>();
        assert!(energy(&hm[..20]) > 0.5 * energy(&hm));
        assert!(energy(&h[..20]) < 0.01 * energy(&h));

        let half = minimum_phase(&h, true).unwrap();
        assert_eq!(half.len(), 51);
    }

    #[test]
    fn test_construct_warns_on_low_attenuation() {
        let reporter = MemoryReporter::new();
        let freq = [0.0, 40.0, 41.0, 500.0];
        let gain = [1.0, 1.0, 0.0, 0.0];
        let h = construct_fir_filter(
            1000.0,
            &freq,
            &gain,
            11,
            Phase::Zero,
            FirWindow::Hamming,
            FirDesign::Firwin2,
            &reporter,
        )
        .unwrap();
        assert_eq!(h.len(), 11);
        assert!(matches!(
            reporter.warnings().as_slice(),
            [PrecisionWarning::LowAttenuation { .. }]
        ));
        assert!(reporter.info_text().contains("Increase filter_length"));
    }

    #[test]
    fn test_construct_zero_phase_even_length() {
        let reporter = MemoryReporter::new();
        let freq = [0.0, 40.0, 50.0, 500.0];
        let gain = [1.0, 1.0, 0.0, 0.0];
        let err = construct_fir_filter(
            1000.0,
            &freq,
            &gain,
            332,
            Phase::Zero,
            FirWindow::Hamming,
            FirDesign::Firwin,
            &reporter,
        )
        .unwrap_err();
        assert_eq!(err.kind(), neurofilt_core::ErrorKind::Argument);
    }

    #[test]
    fn test_construct_minimum_half_length() {
        let reporter = MemoryReporter::new();
        let freq = [0.0, 40.0, 50.0, 500.0];
        let gain = [1.0, 1.0, 0.0, 0.0];
        let h = construct_fir_filter(
            1000.0,
            &freq,
            &gain,
            331,
            Phase::MinimumHalf,
            FirWindow::Hamming,
            FirDesign::Firwin,
            &reporter,
        )
        .unwrap();
        assert_eq!(h.len(), 331);
    }

    #[test]
    fn test_mne_c_filter() {
        let reporter = MemoryReporter::new();
        let h = design_mne_c_filter(1000.0, None, Some(40.0), None, 5.0, &reporter).unwrap();
        assert_eq!(h.len(), 8193);
        assert_abs_diff_eq!(h.iter().sum::<f64>(), 1.0, epsilon = 1e-10);
        let peak = h
            .iter()
            .enumerate()
            .fold((0, 0.0f64), |b, (i, &v)| if v > b.1 { (i, v) } else { b });
        assert_eq!(peak.0, 4096);
        assert!(reporter.info_text().starts_with("filter :   0.000 ...   40.0 Hz"));

        let err = design_mne_c_filter(1000.0, None, Some(499.0), None, 5.0, &reporter).unwrap_err();
        assert!(err.to_string().contains("h_freq too high"));
    }

    #[test]
    fn test_mne_c_filter_narrow_transitions() {
        let reporter = MemoryReporter::new();
        // 0.01 Hz at 1000 Hz is less than one bin, so both ramps vanish
        let h = design_mne_c_filter(1000.0, Some(10.0), Some(40.0), Some(0.01), 5.0, &reporter)
            .unwrap();
        assert_eq!(h.len(), 8193);
        assert_abs_diff_eq!(h.iter().sum::<f64>(), 0.0, epsilon = 1e-10);
        assert!(reporter.info_text().contains("hpw : 0 lpw : 41"));

        let reporter = MemoryReporter::new();
        let h = design_mne_c_filter(1000.0, None, Some(40.0), None, 0.01, &reporter).unwrap();
        assert_eq!(h.len(), 8193);
        assert_abs_diff_eq!(h.iter().sum::<f64>(), 1.0, epsilon = 1e-10);
        assert!(reporter.info_text().contains("lpw : 0"));
        let gain_at = |f: f64| -> f64 {
            let w = 2.0 * PI * f / 1000.0;
            h.iter()
                .enumerate()
                .map(|(k, &v)| Complex64::from_polar(v, -w * k as f64))
                .sum::<Complex64>()
                .norm()
        };
        assert!(gain_at(20.0) > 0.99);
        assert!(gain_at(60.0) < 0.01);
    }
}
