//! Line-noise removal

use crate::apply::filter_band_in_place;
use crate::create::Band;
use crate::params::{FilterLength, Method, NotchOptions};
use crate::spectrum_fit::remove_lines;
use crate::Result;
use ndarray::{Array, ArrayBase, Data, DataMut, Dimension};
use neurofilt_core::report::Reporter;
use neurofilt_core::CoreError;

/// Remove narrow bands around `freqs` (Hz) from `data`, time on the last
/// axis.
///
/// FIR and IIR methods stop `freq ± (width / 2 + trans_bandwidth / 2)`.
/// The spectrum-fit method regresses sinusoids out instead and, with
/// `freqs` set to `None`, detects the line frequencies itself.
pub fn notch_filter<S, D>(
    data: &ArrayBase<S, D>,
    sfreq: f64,
    freqs: Option<&[f64]>,
    options: &NotchOptions,
    reporter: &dyn Reporter,
) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let mut out = data.to_owned();
    notch_filter_in_place(&mut out, sfreq, freqs, options, reporter)?;
    Ok(out)
}

/// [`notch_filter`] writing into `data`.
pub fn notch_filter_in_place<S, D>(
    data: &mut ArrayBase<S, D>,
    sfreq: f64,
    freqs: Option<&[f64]>,
    options: &NotchOptions,
    reporter: &dyn Reporter,
) -> Result<()>
where
    S: DataMut<Elem = f64>,
    D: Dimension,
{
    if !(sfreq > 0.0 && sfreq.is_finite()) {
        return Err(CoreError::value(format!("sfreq must be positive, got {}", sfreq)).into());
    }
    if freqs.is_none() && options.method != Method::SpectrumFit {
        return Err(CoreError::config("freqs=None can only be used with method spectrum_fit").into());
    }
    let lines = match freqs {
        Some(freqs) => {
            let widths = notch_widths(freqs, options.notch_widths.as_deref())?;
            Some(freqs.iter().copied().zip(widths).collect::<Vec<_>>())
        }
        None => None,
    };

    match options.method {
        Method::SpectrumFit => {
            let window = match options.filter_length {
                None => None,
                Some(FilterLength::Auto) => Some(FilterLength::Seconds(10.0)),
                Some(length) => Some(length),
            };
            remove_lines(
                data,
                sfreq,
                lines.as_deref(),
                window,
                options.p_value,
                options.picks.as_deref(),
                options.n_jobs,
                reporter,
            )
        }
        Method::Fir | Method::Iir => {
            let lines = lines.unwrap_or_default();
            if lines.is_empty() {
                return Ok(());
            }
            let half = options.trans_bandwidth / 2.0;
            let stops: Vec<(f64, f64)> = lines
                .iter()
                .map(|&(f, w)| (f - w / 2.0 - half, f + w / 2.0 + half))
                .collect();
            let band_options = options.band_stop_options();
            if options.method == Method::Fir {
                filter_band_in_place(data, sfreq, &Band::Bandstop(stops), &band_options, reporter)
            } else {
                // validate every band before touching the data
                let mut scratch = data.to_owned();
                for stop in stops {
                    filter_band_in_place(
                        &mut scratch,
                        sfreq,
                        &Band::Bandstop(vec![stop]),
                        &band_options,
                        reporter,
                    )?;
                }
                data.assign(&scratch);
                Ok(())
            }
        }
    }
}

/// One width per frequency: `freq / 200` by default, a single width is
/// shared by all.
fn notch_widths(freqs: &[f64], widths: Option<&[f64]>) -> Result<Vec<f64>> {
    match widths {
        None => Ok(freqs.iter().map(|f| f / 200.0).collect()),
        Some(widths) if widths.iter().any(|&w| w < 0.0) => {
            Err(CoreError::value("notch_widths must be >= 0").into())
        }
        Some([width]) => Ok(vec![*width; freqs.len()]),
        Some(widths) if widths.len() == freqs.len() => Ok(widths.to_vec()),
        Some(_) => Err(CoreError::value(
            "notch_widths must be None, scalar, or the same length as freqs",
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;
    use neurofilt_core::report::MemoryReporter;
    use neurofilt_core::ErrorKind;
    use neurofilt_design::iir::IirParams;
    use std::f64::consts::PI;

    fn tone_plus_line(sfreq: f64, n: usize) -> (Array1<f64>, Array1<f64>) {
        let clean = Array1::from_shape_fn(n, |t| (2.0 * PI * 7.0 * t as f64 / sfreq).sin());
        let noisy = Array1::from_shape_fn(n, |t| {
            clean[t] + 0.5 * (2.0 * PI * 50.0 * t as f64 / sfreq).sin()
        });
        (clean, noisy)
    }

    #[test]
    fn test_freqs_required_for_band_methods() {
        let reporter = MemoryReporter::new();
        let x = Array1::<f64>::zeros(100);
        for method in [Method::Fir, Method::Iir] {
            let options = NotchOptions {
                method,
                ..Default::default()
            };
            let err = notch_filter(&x, 1000.0, None, &options, &reporter).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
            assert!(err.to_string().contains("freqs=None can only be used wi"));
        }
    }

    #[test]
    fn test_notch_width_validation() {
        assert_eq!(notch_widths(&[60.0, 120.0], None).unwrap(), vec![0.3, 0.6]);
        assert_eq!(notch_widths(&[60.0, 120.0], Some(&[2.0][..])).unwrap(), vec![2.0, 2.0]);
        assert_eq!(
            notch_widths(&[60.0], Some(&[-1.0][..])).unwrap_err().kind(),
            ErrorKind::Value
        );
        assert_eq!(
            notch_widths(&[60.0, 120.0, 180.0], Some(&[1.0, 2.0][..])).unwrap_err().kind(),
            ErrorKind::Value
        );
    }

    #[test]
    fn test_fir_notch_removes_line() {
        let reporter = MemoryReporter::new();
        let sfreq = 500.0;
        let (clean, noisy) = tone_plus_line(sfreq, 10_000);
        let y = notch_filter(&noisy, sfreq, Some(&[50.0][..]), &NotchOptions::default(), &reporter)
            .unwrap();
        for t in 3000..7000 {
            assert_abs_diff_eq!(y[t], clean[t], epsilon = 2e-2);
        }
        assert!(reporter.info_text().contains("Setting up band-stop filter from 49 - 51 Hz"));
    }

    #[test]
    fn test_iir_notch_removes_line() {
        let reporter = MemoryReporter::new();
        let sfreq = 500.0;
        let (clean, noisy) = tone_plus_line(sfreq, 10_000);
        let options = NotchOptions {
            method: Method::Iir,
            notch_widths: Some(vec![2.0]),
            iir_params: Some(IirParams::butterworth(4).with_output("sos")),
            ..Default::default()
        };
        let y = notch_filter(&noisy, sfreq, Some(&[50.0][..]), &options, &reporter).unwrap();
        for t in 3000..7000 {
            assert_abs_diff_eq!(y[t], clean[t], epsilon = 2e-2);
        }
    }
}
