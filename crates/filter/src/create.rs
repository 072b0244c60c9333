//! Filter construction from band edges
//!
//! Band edges and transition widths are validated and completed here, then
//! handed to the FIR or IIR designer.

use crate::params::{FilterLength, FilterOptions, Method};
use crate::report::{setup_line, EdgeReport, FirReport};
use crate::Result;
use ndarray::{ArrayViewD, Axis};
use neurofilt_core::overlap::Phase;
use neurofilt_core::report::{PrecisionWarning, Reporter};
use neurofilt_core::CoreError;
use neurofilt_design::fir::{construct_fir_filter, FirDesign};
use neurofilt_design::iir::{construct_iir_filter, BandType, IirFilter, IirSystem};

/// Pass and stop regions of a filter, in Hz
#[derive(Debug, Clone, PartialEq)]
pub enum Band {
    AllPass,
    Lowpass(f64),
    Highpass(f64),
    Bandpass(f64, f64),
    /// One `(lower pass edge, upper pass edge)` pair per stop band
    Bandstop(Vec<(f64, f64)>),
}

impl Band {
    /// Interpret a high-pass edge `l_freq` and a low-pass edge `h_freq`.
    ///
    /// A zero `l_freq` counts as absent. With `l_freq > h_freq` the band
    /// between them is stopped.
    pub fn from_edges(l_freq: Option<f64>, h_freq: Option<f64>) -> Self {
        match (l_freq.filter(|&l| l != 0.0), h_freq) {
            (None, None) => Self::AllPass,
            (None, Some(h)) => Self::Lowpass(h),
            (Some(l), None) => Self::Highpass(l),
            (Some(l), Some(h)) if l < h => Self::Bandpass(l, h),
            (Some(l), Some(h)) => Self::Bandstop(vec![(h, l)]),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AllPass => "allpass",
            Self::Lowpass(_) => "lowpass",
            Self::Highpass(_) => "highpass",
            Self::Bandpass(..) => "bandpass",
            Self::Bandstop(_) => "bandstop",
        }
    }

    fn check(&self, sfreq: f64) -> Result<()> {
        if !(sfreq > 0.0 && sfreq.is_finite()) {
            return Err(CoreError::value(format!("sfreq must be positive, got {}", sfreq)).into());
        }
        let nyq = sfreq / 2.0;
        let check_l = |l: f64| -> Result<()> {
            if !(l > 0.0) {
                return Err(CoreError::value(format!("l_freq must be positive, got {}", l)).into());
            }
            if l >= nyq {
                return Err(CoreError::value(format!(
                    "l_freq ({}) must be less than the Nyquist frequency {}",
                    l, nyq
                ))
                .into());
            }
            Ok(())
        };
        let check_h = |h: f64| -> Result<()> {
            if !(h > 0.0) {
                return Err(CoreError::value(format!("h_freq must be positive, got {}", h)).into());
            }
            if h >= nyq {
                return Err(CoreError::value(format!(
                    "h_freq ({}) must be less than the Nyquist frequency {}",
                    h, nyq
                ))
                .into());
            }
            Ok(())
        };
        match self {
            Self::AllPass => Ok(()),
            Self::Lowpass(h) => check_h(*h),
            Self::Highpass(l) => check_l(*l),
            Self::Bandpass(l, h) => {
                check_l(*l)?;
                check_h(*h)
            }
            Self::Bandstop(stops) => {
                if stops.is_empty() {
                    return Err(CoreError::value("At least one stop band is required").into());
                }
                for &(lo, hi) in stops {
                    check_h(lo)?;
                    check_l(hi)?;
                }
                Ok(())
            }
        }
    }
}

/// A designed filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// FIR coefficients
    Fir(Vec<f64>),
    Iir(IirFilter),
}

impl Filter {
    pub fn as_fir(&self) -> Option<&[f64]> {
        match self {
            Self::Fir(h) => Some(h),
            Self::Iir(_) => None,
        }
    }

    pub fn as_iir(&self) -> Option<&IirFilter> {
        match self {
            Self::Fir(_) => None,
            Self::Iir(f) => Some(f),
        }
    }
}

/// A pass edge with its transition band. `stop` lies on the attenuated
/// side of `pass`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    pass: f64,
    trans: f64,
    stop: f64,
}

/// Transition bands of every edge in `band`. `lower` holds the edges
/// reported as "Lower", `upper` those reported as "Upper".
#[derive(Debug, Default)]
struct Edges {
    lower: Vec<Edge>,
    upper: Vec<Edge>,
}

impl Edges {
    fn min_trans(&self) -> f64 {
        self.lower
            .iter()
            .chain(&self.upper)
            .map(|e| e.trans)
            .fold(f64::INFINITY, f64::min)
    }
}

fn positive(name: &str, trans: f64) -> Result<f64> {
    if !(trans > 0.0) {
        return Err(CoreError::value(format!("{} must be positive, got {}", name, trans)).into());
    }
    Ok(trans)
}

/// Default width below a high-pass edge
fn auto_lower(f: f64) -> f64 {
    (0.25 * f).max(2.0).min(f)
}

/// Default width above a low-pass edge
fn auto_upper(f: f64, nyq: f64) -> f64 {
    (0.25 * f).max(2.0).min(nyq - f)
}

fn high_pass_edge(l: f64, options: &FilterOptions) -> Result<Edge> {
    let trans = positive(
        "l_trans_bandwidth",
        options.l_trans_bandwidth.resolve(|| auto_lower(l)),
    )?;
    let stop = l - trans;
    if stop < 0.0 {
        return Err(CoreError::value(format!(
            "Filter specification invalid: Lower stop frequency negative ({:.2} Hz). \
             Increase pass frequency or reduce the transition bandwidth (l_trans_bandwidth)",
            -stop
        ))
        .into());
    }
    Ok(Edge { pass: l, trans, stop })
}

fn low_pass_edge(h: f64, nyq: f64, options: &FilterOptions) -> Result<Edge> {
    let trans = positive(
        "h_trans_bandwidth",
        options.h_trans_bandwidth.resolve(|| auto_upper(h, nyq)),
    )?;
    let stop = h + trans;
    if stop > nyq {
        return Err(CoreError::value(format!(
            "Effective band-stop frequency ({}) is too high (maximum based on Nyquist is {})",
            stop, nyq
        ))
        .into());
    }
    Ok(Edge { pass: h, trans, stop })
}

fn band_edges(band: &Band, nyq: f64, options: &FilterOptions) -> Result<Edges> {
    let mut edges = Edges::default();
    match band {
        Band::AllPass => {}
        Band::Lowpass(h) => edges.upper.push(low_pass_edge(*h, nyq, options)?),
        Band::Highpass(l) => edges.lower.push(high_pass_edge(*l, options)?),
        Band::Bandpass(l, h) => {
            edges.lower.push(high_pass_edge(*l, options)?);
            edges.upper.push(low_pass_edge(*h, nyq, options)?);
        }
        Band::Bandstop(stops) => {
            // the lower edge of a stop band is a low-pass edge and takes
            // h_trans_bandwidth, the upper edge takes l_trans_bandwidth
            for &(lo, hi) in stops {
                let lo_trans = positive(
                    "h_trans_bandwidth",
                    options.h_trans_bandwidth.resolve(|| auto_lower(lo)),
                )?;
                let hi_trans = positive(
                    "l_trans_bandwidth",
                    options.l_trans_bandwidth.resolve(|| auto_upper(hi, nyq)),
                )?;
                edges.lower.push(Edge {
                    pass: lo,
                    trans: lo_trans,
                    stop: lo + lo_trans,
                });
                edges.upper.push(Edge {
                    pass: hi,
                    trans: hi_trans,
                    stop: hi - hi_trans,
                });
            }
        }
    }
    Ok(edges)
}

/// Piecewise-linear gain of the FIR design, from 0 Hz to Nyquist
fn gain_points(band: &Band, edges: &Edges, nyq: f64) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut points: Vec<(f64, f64)> = match band {
        Band::AllPass => vec![(0.0, 1.0), (nyq, 1.0)],
        Band::Lowpass(_) => {
            let e = edges.upper[0];
            vec![(0.0, 1.0), (e.pass, 1.0), (e.stop, 0.0), (nyq, 0.0)]
        }
        Band::Highpass(_) => {
            let e = edges.lower[0];
            vec![(0.0, 0.0), (e.stop, 0.0), (e.pass, 1.0), (nyq, 1.0)]
        }
        Band::Bandpass(..) => {
            let (lo, hi) = (edges.lower[0], edges.upper[0]);
            vec![
                (0.0, 0.0),
                (lo.stop, 0.0),
                (lo.pass, 1.0),
                (hi.pass, 1.0),
                (hi.stop, 0.0),
                (nyq, 0.0),
            ]
        }
        Band::Bandstop(_) => {
            let mut points = vec![(0.0, 1.0)];
            for (lo, hi) in edges.lower.iter().zip(&edges.upper) {
                points.extend([(lo.pass, 1.0), (lo.stop, 0.0), (hi.stop, 0.0), (hi.pass, 1.0)]);
            }
            points.push((nyq, 1.0));
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            let gains: Vec<f64> = points.iter().map(|p| p.1).collect();
            if gains.windows(3).any(|w| (w[0] - 2.0 * w[1] + w[2]).abs() > 1.0) {
                return Err(CoreError::value("Stop bands are not sufficiently separated.").into());
            }
            points
        }
    };
    // a stop edge exactly at 0 Hz or Nyquist coincides with the end point
    if points.len() > 2 && points[1].0 == 0.0 {
        points.remove(0);
    }
    let n = points.len();
    if n > 2 && points[n - 2].0 == nyq {
        points.remove(n - 1);
    }
    Ok(points.into_iter().unzip())
}

/// Number of FIR taps for the requested length.
fn fir_length(options: &FilterOptions, sfreq: f64, min_trans: f64) -> usize {
    let firwin = options.fir_design == FirDesign::Firwin;
    let make_odd = |n: usize| if n % 2 == 0 { n + 1 } else { n };
    let odd_for_design = |n: usize| {
        if firwin || options.phase == Phase::Zero {
            make_odd(n)
        } else {
            n
        }
    };
    match options.filter_length {
        FilterLength::Auto => {
            let mult = if firwin { 1.0 } else { 2.0 };
            let seconds = options.fir_window.length_factor() * mult / min_trans;
            odd_for_design(((seconds * sfreq).ceil() as usize).max(1))
        }
        FilterLength::Seconds(s) => {
            let mut n = odd_for_design(((s * sfreq).ceil() as usize).max(1));
            if options.phase == Phase::ZeroDouble {
                n = odd_for_design(n.next_power_of_two());
            }
            n
        }
        FilterLength::Samples(n) if firwin => make_odd(n),
        FilterLength::Samples(n) => n,
    }
}

/// Build the filter described by `l_freq`, `h_freq` and `options`.
///
/// `data` is only used to warn when an FIR filter is longer than the
/// signal (time on the last axis).
pub fn create_filter(
    data: Option<ArrayViewD<'_, f64>>,
    sfreq: f64,
    l_freq: Option<f64>,
    h_freq: Option<f64>,
    options: &FilterOptions,
    reporter: &dyn Reporter,
) -> Result<Filter> {
    let n_times = data.map(|d| {
        if d.ndim() == 0 {
            1
        } else {
            d.len_of(Axis(d.ndim() - 1))
        }
    });
    create_band_filter(
        n_times,
        sfreq,
        &Band::from_edges(l_freq, h_freq),
        options,
        reporter,
    )
}

/// [`create_filter`] for an explicit [`Band`], e.g. several stop bands.
pub fn create_band_filter(
    n_times: Option<usize>,
    sfreq: f64,
    band: &Band,
    options: &FilterOptions,
    reporter: &dyn Reporter,
) -> Result<Filter> {
    band.check(sfreq)?;
    match options.method {
        Method::Fir if options.iir_params.is_some() => {
            return Err(CoreError::value("iir_params must be None when method is 'fir'").into())
        }
        Method::SpectrumFit => {
            return Err(CoreError::invalid_choice(
                "method",
                &["fir", "iir"],
                &options.method.to_string(),
            )
            .into())
        }
        _ => {}
    }
    if n_times.is_none() {
        reporter.info(
            "No data specified. Sanity checks related to the length of the signal \
             relative to the filter order will be skipped.",
        );
    }
    if let Some(line) = setup_line(band) {
        reporter.info(&line);
    }

    let nyq = sfreq / 2.0;
    let edges = band_edges(band, nyq, options)?;
    match options.method {
        Method::Iir => design_iir(band, &edges, sfreq, options, reporter).map(Filter::Iir),
        _ => design_fir(n_times, band, &edges, sfreq, options, reporter).map(Filter::Fir),
    }
}

fn design_fir(
    n_times: Option<usize>,
    band: &Band,
    edges: &Edges,
    sfreq: f64,
    options: &FilterOptions,
    reporter: &dyn Reporter,
) -> Result<Vec<f64>> {
    let nyq = sfreq / 2.0;
    let (freq, gain) = gain_points(band, edges, nyq)?;
    let length = fir_length(options, sfreq, edges.min_trans());

    let single = !matches!(band, Band::Bandstop(_));
    let half_amplitude = |side: &[Edge], sign: f64| -> Option<Vec<f64>> {
        (single && options.phase.is_zero())
            .then(|| side.iter().map(|e| e.pass + sign * e.trans / 2.0).collect())
    };
    let side = |side: &[Edge], sign: f64| -> Option<EdgeReport> {
        (!side.is_empty()).then(|| EdgeReport {
            pass: side.iter().map(|e| e.pass).collect(),
            trans: side.iter().map(|e| e.trans).collect(),
            cutoff: half_amplitude(side, sign),
        })
    };
    let report = FirReport {
        band,
        phase: options.phase,
        window: options.fir_window,
        design: options.fir_design,
        lower: side(&edges.lower, -1.0),
        upper: side(&edges.upper, 1.0),
        length,
        sfreq,
    };
    reporter.info_lines(&report.lines());

    if let Some(n) = n_times {
        if length > n {
            reporter.warn(&PrecisionWarning::FilterLongerThanSignal {
                filter_length: length,
                signal_length: n,
            });
        }
    }
    Ok(construct_fir_filter(
        sfreq,
        &freq,
        &gain,
        length,
        options.phase,
        options.fir_window,
        options.fir_design,
        reporter,
    )?)
}

fn design_iir(
    band: &Band,
    edges: &Edges,
    sfreq: f64,
    options: &FilterOptions,
    reporter: &dyn Reporter,
) -> Result<IirFilter> {
    let params = options
        .iir_params
        .clone()
        .unwrap_or_default()
        .or_default_design();
    let (btype, f_pass, f_stop) = match band {
        Band::AllPass => {
            return Ok(IirFilter {
                system: IirSystem::Ba {
                    b: vec![1.0],
                    a: vec![1.0],
                },
                padlen: 0,
            })
        }
        Band::Bandstop(stops) if stops.len() > 1 => {
            return Err(CoreError::value(
                "IIR band-stop filters support a single stop band, filter one band at a time",
            )
            .into())
        }
        Band::Lowpass(_) => (BandType::Lowpass, edges.upper.clone(), Vec::new()),
        Band::Highpass(_) => (BandType::Highpass, edges.lower.clone(), Vec::new()),
        Band::Bandpass(..) => (BandType::Bandpass, edges.lower.clone(), edges.upper.clone()),
        Band::Bandstop(_) => (BandType::Bandstop, edges.lower.clone(), edges.upper.clone()),
    };
    let all: Vec<Edge> = f_pass.into_iter().chain(f_stop).collect();
    let pass: Vec<f64> = all.iter().map(|e| e.pass).collect();
    let stop: Vec<f64> = all.iter().map(|e| e.stop).collect();
    Ok(construct_iir_filter(
        &params,
        &pass,
        Some(&stop),
        sfreq,
        btype,
        options.phase,
        reporter,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TransBandwidth;
    use approx::assert_abs_diff_eq;
    use neurofilt_core::report::MemoryReporter;
    use neurofilt_core::ErrorKind;
    use neurofilt_design::fir::FirWindow;
    use neurofilt_design::iir::IirParams;

    fn lowpass_length(phase: Phase, length: FilterLength) -> usize {
        let options = FilterOptions {
            h_trans_bandwidth: TransBandwidth::Hz(0.5),
            filter_length: length,
            phase,
            fir_window: FirWindow::Hamming,
            ..Default::default()
        };
        fir_length(&options, 1000.0, 0.5)
    }

    #[test]
    fn test_band_from_edges() {
        assert_eq!(Band::from_edges(None, None), Band::AllPass);
        assert_eq!(Band::from_edges(Some(0.0), Some(40.0)), Band::Lowpass(40.0));
        assert_eq!(Band::from_edges(Some(1.0), None), Band::Highpass(1.0));
        assert_eq!(Band::from_edges(Some(1.0), Some(40.0)), Band::Bandpass(1.0, 40.0));
        assert_eq!(
            Band::from_edges(Some(61.0), Some(59.0)),
            Band::Bandstop(vec![(59.0, 61.0)])
        );
    }

    #[test]
    fn test_auto_lengths() {
        assert_eq!(lowpass_length(Phase::Zero, FilterLength::Auto), 6601);
        assert_eq!(lowpass_length(Phase::ZeroDouble, FilterLength::Auto), 6601);
        assert_eq!(lowpass_length(Phase::Zero, FilterLength::Seconds(7.0)), 7001);
        assert_eq!(lowpass_length(Phase::ZeroDouble, FilterLength::Seconds(7.0)), 8193);
        assert_eq!(lowpass_length(Phase::Zero, FilterLength::Samples(2048)), 2049);
    }

    #[test]
    fn test_auto_transition_bandwidths() {
        let options = FilterOptions::default();
        let edges = band_edges(&Band::Bandpass(1.0, 40.0), 500.0, &options).unwrap();
        assert_abs_diff_eq!(edges.lower[0].trans, 1.0);
        assert_abs_diff_eq!(edges.lower[0].stop, 0.0);
        assert_abs_diff_eq!(edges.upper[0].trans, 10.0);
        assert_abs_diff_eq!(edges.upper[0].stop, 50.0);
        let edges = band_edges(&Band::Lowpass(495.0), 500.0, &options).unwrap();
        assert_abs_diff_eq!(edges.upper[0].trans, 5.0);
    }

    #[test]
    fn test_gain_points_drop_degenerate_edges() {
        let options = FilterOptions::default();
        let band = Band::Highpass(1.0);
        let edges = band_edges(&band, 500.0, &options).unwrap();
        let (freq, gain) = gain_points(&band, &edges, 500.0).unwrap();
        assert_eq!(freq, vec![0.0, 1.0, 500.0]);
        assert_eq!(gain, vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_stop_bands_must_be_separated() {
        let options = FilterOptions {
            l_trans_bandwidth: TransBandwidth::Hz(1.0),
            h_trans_bandwidth: TransBandwidth::Hz(1.0),
            ..Default::default()
        };
        let band = Band::Bandstop(vec![(10.0, 14.0), (12.0, 16.0)]);
        let edges = band_edges(&band, 500.0, &options).unwrap();
        let err = gain_points(&band, &edges, 500.0).unwrap_err();
        assert!(err.to_string().contains("not sufficiently separated"));

        let band = Band::Bandstop(vec![(10.0, 14.0), (20.0, 24.0)]);
        let edges = band_edges(&band, 500.0, &options).unwrap();
        let (freq, gain) = gain_points(&band, &edges, 500.0).unwrap();
        assert_eq!(freq, vec![0.0, 10.0, 11.0, 13.0, 14.0, 20.0, 21.0, 23.0, 24.0, 500.0]);
        assert_eq!(gain, vec![1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_invalid_frequencies() {
        let reporter = MemoryReporter::new();
        let options = FilterOptions::default();
        let err = create_filter(None, -1000.0, Some(1.0), Some(10.0), &options, &reporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = create_filter(None, 100.0, Some(1.0), Some(75.0), &options, &reporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(err.to_string().contains("Nyquist"));
        let err = create_filter(None, 100.0, Some(-1.0), None, &options, &reporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        let options = FilterOptions {
            l_trans_bandwidth: TransBandwidth::Hz(2.0),
            ..Default::default()
        };
        let err = create_filter(None, 100.0, Some(1.0), None, &options, &reporter).unwrap_err();
        assert!(err.to_string().contains("Lower stop frequency negative"));
        let options = FilterOptions {
            h_trans_bandwidth: TransBandwidth::Hz(0.0),
            ..Default::default()
        };
        let err = create_filter(None, 100.0, None, Some(10.0), &options, &reporter).unwrap_err();
        assert!(err.to_string().contains("h_trans_bandwidth must be positive"));
    }

    #[test]
    fn test_iir_params_require_iir_method() {
        let reporter = MemoryReporter::new();
        let options = FilterOptions {
            iir_params: Some(IirParams::butterworth(4)),
            ..Default::default()
        };
        let err = create_filter(None, 1000.0, None, Some(40.0), &options, &reporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn test_allpass_is_identity() {
        let reporter = MemoryReporter::new();
        let fir = create_filter(None, 1000.0, None, None, &FilterOptions::default(), &reporter)
            .unwrap();
        assert_eq!(fir.as_fir().unwrap(), &[1.0]);
        let iir = create_filter(
            None,
            1000.0,
            None,
            None,
            &FilterOptions::iir(IirParams::default()),
            &reporter,
        )
        .unwrap();
        assert_eq!(iir.as_iir().unwrap().padlen, 0);
    }

    #[test]
    fn test_filter_longer_than_signal_warns() {
        let reporter = MemoryReporter::new();
        let data = ndarray::Array1::<f64>::zeros(100).into_dyn();
        create_filter(
            Some(data.view()),
            1000.0,
            None,
            Some(40.0),
            &FilterOptions::default(),
            &reporter,
        )
        .unwrap();
        assert_eq!(
            reporter.warnings(),
            vec![PrecisionWarning::FilterLongerThanSignal {
                filter_length: 331,
                signal_length: 100,
            }]
        );
    }
}
