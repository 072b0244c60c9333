//! Polynomial detrending

use crate::signal::{map_lanes_in_place, resolve_axis};
use crate::parallel::NJobs;
use crate::{CoreError, Result};
use ndarray::{ArrayBase, DataMut, Dimension};

/// Remove the mean (`order = 0`) or the least-squares line (`order = 1`).
pub fn detrend(x: &[f64], order: usize) -> Result<Vec<f64>> {
    let n = x.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    match order {
        0 => {
            let mean = x.iter().sum::<f64>() / n as f64;
            Ok(x.iter().map(|v| v - mean).collect())
        }
        1 => {
            let nf = n as f64;
            let t_mean = (nf - 1.0) / 2.0;
            let x_mean = x.iter().sum::<f64>() / nf;
            let (mut sxy, mut sxx) = (0.0, 0.0);
            for (i, &v) in x.iter().enumerate() {
                let dt = i as f64 - t_mean;
                sxy += dt * (v - x_mean);
                sxx += dt * dt;
            }
            let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
            Ok(x
                .iter()
                .enumerate()
                .map(|(i, &v)| v - (x_mean + slope * (i as f64 - t_mean)))
                .collect())
        }
        other => Err(CoreError::value(format!(
            "order must be 0 or 1, got {}",
            other
        ))),
    }
}

/// Detrend every row of `data` along `axis`, in place.
pub fn detrend_array<S, D>(data: &mut ArrayBase<S, D>, order: usize, axis: isize) -> Result<()>
where
    S: DataMut<Elem = f64>,
    D: Dimension,
{
    if order > 1 {
        return Err(CoreError::value(format!(
            "order must be 0 or 1, got {}",
            order
        )));
    }
    let axis = resolve_axis(data.ndim(), axis)?;
    let n_rows = data.len() / data.len_of(axis).max(1);
    let rows: Vec<usize> = (0..n_rows).collect();
    map_lanes_in_place(data, axis, &rows, NJobs::Serial, |row| detrend(row, order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_linear_ramp_detrends_to_zero() {
        let x: Vec<f64> = (0..100).map(|i| 3.0 * i as f64 - 7.0).collect();
        let y = detrend(&x, 1).unwrap();
        assert!(y.iter().all(|v| v.abs() < 1e-10));
    }

    #[test]
    fn test_constant_detrends_to_zero() {
        let y = detrend(&[4.5; 20], 0).unwrap();
        assert!(y.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_bad_order() {
        assert!(detrend(&[1.0, 2.0], 2).is_err());
    }

    #[test]
    fn test_detrend_array_rows() {
        let mut data = Array2::from_shape_fn((3, 50), |(r, t)| r as f64 * t as f64 + 1.0);
        detrend_array(&mut data, 1, -1).unwrap();
        assert!(data.iter().all(|v| v.abs() < 1e-10));
    }
}
