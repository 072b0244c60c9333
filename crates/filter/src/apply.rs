//! Applying filters to every selected row of an array

use crate::create::{create_band_filter, Band, Filter};
use crate::params::FilterOptions;
use crate::Result;
use ndarray::{Array, ArrayBase, Axis, Data, DataMut, Dimension};
use neurofilt_core::fft::select_backend;
use neurofilt_core::overlap::{OverlapAdd, Phase};
use neurofilt_core::pad::PadMode;
use neurofilt_core::parallel::NJobs;
use neurofilt_core::report::Reporter;
use neurofilt_core::signal::{map_lanes_in_place, rows_for_picks};
use neurofilt_core::CoreError;
use neurofilt_design::DesignError;

/// Filter `data` along its last axis and return the result; `data` is left
/// untouched.
///
/// See [`crate::create_filter`] for the meaning of `l_freq` and `h_freq`.
pub fn filter_data<S, D>(
    data: &ArrayBase<S, D>,
    sfreq: f64,
    l_freq: Option<f64>,
    h_freq: Option<f64>,
    options: &FilterOptions,
    reporter: &dyn Reporter,
) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let mut out = data.to_owned();
    filter_data_in_place(&mut out, sfreq, l_freq, h_freq, options, reporter)?;
    Ok(out)
}

/// [`filter_data`] writing into `data`. Nothing is written unless every
/// row was filtered successfully.
pub fn filter_data_in_place<S, D>(
    data: &mut ArrayBase<S, D>,
    sfreq: f64,
    l_freq: Option<f64>,
    h_freq: Option<f64>,
    options: &FilterOptions,
    reporter: &dyn Reporter,
) -> Result<()>
where
    S: DataMut<Elem = f64>,
    D: Dimension,
{
    filter_band_in_place(data, sfreq, &Band::from_edges(l_freq, h_freq), options, reporter)
}

pub(crate) fn filter_band_in_place<S, D>(
    data: &mut ArrayBase<S, D>,
    sfreq: f64,
    band: &Band,
    options: &FilterOptions,
    reporter: &dyn Reporter,
) -> Result<()>
where
    S: DataMut<Elem = f64>,
    D: Dimension,
{
    if data.ndim() == 0 {
        return Err(CoreError::value("Data to be filtered must have at least one dimension").into());
    }
    let rows = rows_for_picks(data.shape(), options.picks.as_deref())?;
    let n_times = data.len_of(Axis(data.ndim() - 1));
    let filter = create_band_filter(Some(n_times), sfreq, band, options, reporter)?;
    apply_filter(
        data,
        &filter,
        &rows,
        options.phase,
        options.pad,
        options.n_jobs,
        reporter,
    )
}

fn design_to_core(err: DesignError) -> CoreError {
    match err {
        DesignError::Core(e) => e,
        other => CoreError::value(other.to_string()),
    }
}

/// Run `filter` over the given rows of `data` (time on the last axis).
///
/// FIR filters go through overlap-add; with [`NJobs::Cuda`] the FFTs run
/// on the registered accelerator when there is one, serially either way.
pub fn apply_filter<S, D>(
    data: &mut ArrayBase<S, D>,
    filter: &Filter,
    rows: &[usize],
    phase: Phase,
    pad: PadMode,
    n_jobs: NJobs,
    reporter: &dyn Reporter,
) -> Result<()>
where
    S: DataMut<Elem = f64>,
    D: Dimension,
{
    if data.ndim() == 0 || rows.is_empty() {
        return Ok(());
    }
    let axis = Axis(data.ndim() - 1);
    let n_times = data.len_of(axis);
    match filter {
        Filter::Fir(h) => {
            let backend = select_backend(n_jobs.is_cuda(), "FFT FIR filtering", reporter);
            let ola = OverlapAdd::new(h, n_times, None, phase, pad, backend, reporter)?;
            map_lanes_in_place(data, axis, rows, n_jobs, |row| ola.apply(row))?;
        }
        Filter::Iir(iir) => {
            map_lanes_in_place(data, axis, rows, n_jobs, |row| {
                iir.apply(row, phase).map_err(design_to_core)
            })?;
        }
    }
    Ok(())
}
