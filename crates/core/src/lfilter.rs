//! Recursive (IIR) filtering
//!
//! Direct form II transposed for transfer functions and cascades of
//! second-order sections, plus forward-backward variants with
//! steady-state initial conditions.

use crate::pad::{pad, PadMode};
use crate::{CoreError, Result};
use nalgebra::{DMatrix, DVector};

/// One second-order section: `[b0, b1, b2, a0, a1, a2]`
pub type Section = [f64; 6];

fn normalize(b: &[f64], a: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    let a0 = match a.first() {
        Some(&a0) if a0 != 0.0 => a0,
        _ => {
            return Err(CoreError::value(
                "First denominator coefficient (a[0]) must be non-zero",
            ))
        }
    };
    if b.is_empty() {
        return Err(CoreError::value("Numerator must have at least one coefficient"));
    }
    let n = a.len().max(b.len());
    let mut bn = vec![0.0; n];
    let mut an = vec![0.0; n];
    for (dst, src) in bn.iter_mut().zip(b) {
        *dst = src / a0;
    }
    for (dst, src) in an.iter_mut().zip(a) {
        *dst = src / a0;
    }
    Ok((bn, an))
}

/// Filter `x` with the rational transfer function `b / a`.
///
/// Returns the output and the final filter state (`max(len(a), len(b)) - 1`
/// values). `zi` defaults to rest.
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64], zi: Option<&[f64]>) -> Result<(Vec<f64>, Vec<f64>)> {
    let (b, a) = normalize(b, a)?;
    let order = b.len() - 1;
    let mut z = vec![0.0; order];
    if let Some(zi) = zi {
        if zi.len() != order {
            return Err(CoreError::value(format!(
                "Initial conditions must have length {}, got {}",
                order,
                zi.len()
            )));
        }
        z.copy_from_slice(zi);
    }

    let mut y = Vec::with_capacity(x.len());
    for &xn in x {
        let yn = b[0] * xn + z.first().copied().unwrap_or(0.0);
        for k in 0..order {
            let next = if k + 1 < order { z[k + 1] } else { 0.0 };
            z[k] = b[k + 1] * xn - a[k + 1] * yn + next;
        }
        y.push(yn);
    }
    Ok((y, z))
}

/// Steady-state initial conditions for a step response of `lfilter`.
pub fn lfilter_zi(b: &[f64], a: &[f64]) -> Result<Vec<f64>> {
    let (b, a) = normalize(b, a)?;
    let n = b.len() - 1;
    if n == 0 {
        return Ok(Vec::new());
    }
    // (I - A^T) zi = b[1:] - a[1:] * b[0], A the companion matrix of a
    let mut m = DMatrix::<f64>::identity(n, n);
    for i in 0..n {
        m[(i, 0)] += a[i + 1];
        if i + 1 < n {
            m[(i, i + 1)] -= 1.0;
        }
    }
    let rhs = DVector::from_iterator(n, (0..n).map(|i| b[i + 1] - a[i + 1] * b[0]));
    let zi = m.lu().solve(&rhs).ok_or_else(|| {
        CoreError::value("Cannot compute initial conditions: the filter has a pole at z = 1")
    })?;
    Ok(zi.iter().copied().collect())
}

/// Filter `x` through a cascade of second-order sections.
pub fn sosfilt(sos: &[Section], x: &[f64], zi: Option<&[[f64; 2]]>) -> Result<(Vec<f64>, Vec<[f64; 2]>)> {
    if let Some(zi) = zi {
        if zi.len() != sos.len() {
            return Err(CoreError::value(format!(
                "Initial conditions must have {} sections, got {}",
                sos.len(),
                zi.len()
            )));
        }
    }
    let mut y = x.to_vec();
    let mut states = Vec::with_capacity(sos.len());
    for (i, section) in sos.iter().enumerate() {
        let z = zi.map(|zi| &zi[i][..]);
        let (out, zf) = lfilter(&section[..3], &section[3..], &y, z)?;
        y = out;
        states.push([zf[0], zf[1]]);
    }
    Ok((y, states))
}

/// Steady-state initial conditions for [`sosfilt`].
pub fn sosfilt_zi(sos: &[Section]) -> Result<Vec<[f64; 2]>> {
    let mut scale = 1.0;
    let mut out = Vec::with_capacity(sos.len());
    for section in sos {
        let (b, a) = (&section[..3], &section[3..]);
        let zi = lfilter_zi(b, a)?;
        out.push([scale * zi[0], scale * zi[1]]);
        scale *= b.iter().sum::<f64>() / a.iter().sum::<f64>();
    }
    Ok(out)
}

/// Extend `x` by an odd reflection of `padlen` samples on each side.
/// `padlen` is clamped to `len(x) - 1`.
fn extend(x: &[f64], padlen: usize) -> (Vec<f64>, usize) {
    let padlen = padlen.min(x.len().saturating_sub(1));
    (pad(x, (padlen, padlen), PadMode::ReflectLimited), padlen)
}

/// Zero-phase forward-backward filtering with a transfer function.
pub fn filtfilt(b: &[f64], a: &[f64], x: &[f64], padlen: usize) -> Result<Vec<f64>> {
    if x.is_empty() {
        return Ok(Vec::new());
    }
    let (ext, padlen) = extend(x, padlen);
    let zi = lfilter_zi(b, a)?;

    let z0: Vec<f64> = zi.iter().map(|z| z * ext[0]).collect();
    let (mut y, _) = lfilter(b, a, &ext, Some(&z0[..]))?;
    y.reverse();
    let z0: Vec<f64> = zi.iter().map(|z| z * y[0]).collect();
    let (mut y, _) = lfilter(b, a, &y, Some(&z0[..]))?;
    y.reverse();
    Ok(y[padlen..padlen + x.len()].to_vec())
}

/// Zero-phase forward-backward filtering with second-order sections.
pub fn sosfiltfilt(sos: &[Section], x: &[f64], padlen: usize) -> Result<Vec<f64>> {
    if x.is_empty() {
        return Ok(Vec::new());
    }
    let (ext, padlen) = extend(x, padlen);
    let zi = sosfilt_zi(sos)?;

    let scaled = |v: f64| -> Vec<[f64; 2]> { zi.iter().map(|z| [z[0] * v, z[1] * v]).collect() };
    let (mut y, _) = sosfilt(sos, &ext, Some(&scaled(ext[0])[..]))?;
    y.reverse();
    let (mut y, _) = sosfilt(sos, &y, Some(&scaled(y[0])[..]))?;
    y.reverse();
    Ok(y[padlen..padlen + x.len()].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // 2nd-order Butterworth lowpass at 0.2 * Nyquist
    const B: [f64; 3] = [0.06745527, 0.13491055, 0.06745527];
    const A: [f64; 3] = [1.0, -1.1429805, 0.4128016];

    #[test]
    fn test_lfilter_first_order() {
        let (y, zf) = lfilter(&[0.5], &[1.0, -0.5], &[1.0, 0.0, 0.0, 0.0], None).unwrap();
        assert_eq!(y, vec![0.5, 0.25, 0.125, 0.0625]);
        assert_eq!(zf.len(), 1);
    }

    #[test]
    fn test_lfilter_chunks_carry_state() {
        let x: Vec<f64> = (0..40).map(|i| (i as f64 * 0.4).sin()).collect();
        let (whole, _) = lfilter(&B, &A, &x, None).unwrap();
        let (first, z) = lfilter(&B, &A, &x[..17], None).unwrap();
        let (second, _) = lfilter(&B, &A, &x[17..], Some(&z[..])).unwrap();
        for (a, b) in whole.iter().zip(first.iter().chain(second.iter())) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_lfilter_zi_is_steady_state() {
        let zi = lfilter_zi(&B, &A).unwrap();
        let (y, _) = lfilter(&B, &A, &[1.0; 20], Some(&zi[..])).unwrap();
        let dc = B.iter().sum::<f64>() / A.iter().sum::<f64>();
        for v in y {
            assert_abs_diff_eq!(v, dc, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sosfilt_matches_lfilter() {
        let section = [B[0], B[1], B[2], A[0], A[1], A[2]];
        let x: Vec<f64> = (0..30).map(|i| ((i * 7) % 5) as f64 - 2.0).collect();
        let (y1, _) = lfilter(&B, &A, &x, None).unwrap();
        let (y2, _) = sosfilt(&[section], &x, None).unwrap();
        for (a, b) in y1.iter().zip(y2.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_filtfilt_constant_passes_through() {
        let dc = B.iter().sum::<f64>() / A.iter().sum::<f64>();
        let x = vec![3.0; 50];
        let y = filtfilt(&B, &A, &x, 20).unwrap();
        for v in &y {
            assert_abs_diff_eq!(*v, 3.0 * dc * dc, epsilon = 1e-9);
        }
        let section = [B[0], B[1], B[2], A[0], A[1], A[2]];
        let y = sosfiltfilt(&[section, section], &x, 20).unwrap();
        for v in &y {
            assert_abs_diff_eq!(*v, 3.0 * dc.powi(4), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_filtfilt_is_zero_phase() {
        // a symmetric pulse stays symmetric
        let mut x = vec![0.0; 201];
        x[100] = 1.0;
        let y = filtfilt(&B, &A, &x, 0).unwrap();
        for k in 1..40 {
            assert_abs_diff_eq!(y[100 - k], y[100 + k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_padlen_clamped_for_short_input() {
        let y = filtfilt(&B, &A, &[1.0, 2.0], 100).unwrap();
        assert_eq!(y.len(), 2);
        let y = filtfilt(&B, &A, &[1.0], 100).unwrap();
        assert_eq!(y.len(), 1);
    }
}
