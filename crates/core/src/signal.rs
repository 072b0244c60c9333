//! Row views over N-dimensional signals
//!
//! Filtering treats an array as a stack of 1-D rows along one axis. Rows
//! are numbered in logical (row-major) order over the remaining axes, so
//! for a `(epochs, channels, times)` array row `e * n_channels + c` is
//! channel `c` of epoch `e`.

use crate::parallel::{map_rows, NJobs};
use crate::{CoreError, Result};
use ndarray::{Array, ArrayBase, Axis, Data, DataMut, Dimension};

/// Resolve a possibly negative axis index.
pub fn resolve_axis(ndim: usize, axis: isize) -> Result<Axis> {
    let resolved = if axis < 0 { ndim as isize + axis } else { axis };
    if ndim == 0 || resolved < 0 || resolved >= ndim as isize {
        return Err(CoreError::value(format!(
            "axis {} is out of bounds for array of dimension {}",
            axis, ndim
        )));
    }
    Ok(Axis(resolved as usize))
}

/// Row indices selected by `picks` for data of the given shape, time last.
///
/// Picks index the channel axis (second to last); for 3-D data they are
/// repeated for every epoch. `None` selects every row.
pub fn rows_for_picks(shape: &[usize], picks: Option<&[usize]>) -> Result<Vec<usize>> {
    if shape.is_empty() {
        return Err(CoreError::value("Data must have at least one dimension"));
    }
    let n_rows: usize = shape[..shape.len() - 1].iter().product();
    let picks = match picks {
        None => return Ok((0..n_rows).collect()),
        Some(picks) => picks,
    };
    if shape.len() > 3 {
        return Err(CoreError::value(format!(
            "picks can only be used with 1-, 2- or 3-dimensional data, got {} dimensions",
            shape.len()
        )));
    }
    let n_channels = if shape.len() == 1 { 1 } else { shape[shape.len() - 2] };
    if let Some(&bad) = picks.iter().find(|&&p| p >= n_channels) {
        return Err(CoreError::value(format!(
            "picks must be < n_channels ({}), got {}",
            n_channels, bad
        )));
    }
    let mut picks = picks.to_vec();
    picks.sort_unstable();
    picks.dedup();
    let n_epochs = if shape.len() == 3 { shape[0] } else { 1 };
    Ok((0..n_epochs)
        .flat_map(|e| picks.iter().map(move |&p| e * n_channels + p))
        .collect())
}

/// Replace the selected rows along `axis` with `f(row)`, in place.
///
/// All rows are computed before any is written, so an error leaves `data`
/// untouched. `f` must return a row of the same length.
pub fn map_lanes_in_place<S, D, F>(
    data: &mut ArrayBase<S, D>,
    axis: Axis,
    rows: &[usize],
    n_jobs: NJobs,
    f: F,
) -> Result<()>
where
    S: DataMut<Elem = f64>,
    D: Dimension,
    F: Fn(&[f64]) -> Result<Vec<f64>> + Send + Sync,
{
    let n_times = data.len_of(axis);
    let mut selected = vec![false; data.len() / n_times.max(1)];
    for &r in rows {
        if let Some(flag) = selected.get_mut(r) {
            *flag = true;
        }
    }
    let inputs: Vec<Vec<f64>> = data
        .lanes(axis)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| selected.get(*i).copied().unwrap_or(false))
        .map(|(_, lane)| lane.to_vec())
        .collect();

    let outputs = map_rows(inputs.len(), n_jobs, |i| f(&inputs[i]))?;
    if let Some(bad) = outputs.iter().find(|o| o.len() != n_times) {
        return Err(CoreError::value(format!(
            "Row length changed from {} to {}",
            n_times,
            bad.len()
        )));
    }

    let lanes = data
        .lanes_mut(axis)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| selected.get(*i).copied().unwrap_or(false));
    for ((_, mut lane), out) in lanes.zip(outputs.iter()) {
        for (dst, src) in lane.iter_mut().zip(out) {
            *dst = *src;
        }
    }
    Ok(())
}

/// Build a new array whose `axis` has length `new_len`, filling every row
/// with `f(row)`.
pub fn map_lanes_resized<S, D, F>(
    data: &ArrayBase<S, D>,
    axis: Axis,
    new_len: usize,
    n_jobs: NJobs,
    f: F,
) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
    F: Fn(&[f64]) -> Result<Vec<f64>> + Send + Sync,
{
    let inputs: Vec<Vec<f64>> = data.lanes(axis).into_iter().map(|l| l.to_vec()).collect();
    let outputs = map_rows(inputs.len(), n_jobs, |i| f(&inputs[i]))?;

    let mut dim = data.raw_dim();
    dim[axis.index()] = new_len;
    let mut out = Array::<f64, D>::zeros(dim);
    for (mut lane, row) in out.lanes_mut(axis).into_iter().zip(outputs.iter()) {
        if row.len() != new_len {
            return Err(CoreError::value(format!(
                "Row length {} does not match the requested {}",
                row.len(),
                new_len
            )));
        }
        for (dst, src) in lane.iter_mut().zip(row) {
            *dst = *src;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ndarray::{array, Array3};

    #[test]
    fn test_rows_for_picks() {
        assert_eq!(rows_for_picks(&[3, 10], None).unwrap(), vec![0, 1, 2]);
        assert_eq!(rows_for_picks(&[3, 10], Some(&[2, 0])).unwrap(), vec![0, 2]);
        assert_eq!(
            rows_for_picks(&[2, 3, 10], Some(&[1])).unwrap(),
            vec![1, 4]
        );
        assert_eq!(rows_for_picks(&[10], Some(&[0])).unwrap(), vec![0]);
        let err = rows_for_picks(&[3, 10], Some(&[3])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = rows_for_picks(&[1, 2, 3, 10], Some(&[0])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn test_resolve_axis() {
        assert_eq!(resolve_axis(3, -1).unwrap(), Axis(2));
        assert_eq!(resolve_axis(3, 0).unwrap(), Axis(0));
        assert!(resolve_axis(2, 2).is_err());
        assert!(resolve_axis(2, -3).is_err());
    }

    #[test]
    fn test_map_lanes_in_place_only_touches_selected_rows() {
        let mut data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        map_lanes_in_place(&mut data, Axis(1), &[1], NJobs::Serial, |row| {
            Ok(row.iter().map(|v| v * 10.0).collect())
        })
        .unwrap();
        assert_eq!(data, array![[1.0, 2.0], [30.0, 40.0], [5.0, 6.0]]);
    }

    #[test]
    fn test_map_lanes_in_place_error_leaves_data() {
        let mut data = array![[1.0, 2.0], [3.0, 4.0]];
        let result = map_lanes_in_place(&mut data, Axis(1), &[0, 1], NJobs::Threads(2), |row| {
            if row[0] > 2.0 {
                Err(CoreError::value("boom"))
            } else {
                Ok(vec![0.0, 0.0])
            }
        });
        assert!(result.is_err());
        assert_eq!(data, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_map_lanes_resized_along_middle_axis() {
        let data = Array3::<f64>::ones((2, 3, 4));
        let out = map_lanes_resized(&data, Axis(1), 6, NJobs::Serial, |row| {
            Ok(row.iter().chain(row.iter()).copied().collect())
        })
        .unwrap();
        assert_eq!(out.shape(), &[2, 6, 4]);
        assert!(out.iter().all(|&v| v == 1.0));
    }
}
