//! Polynomial helpers and frequency responses
//!
//! Polynomials are stored highest power first, the way transfer-function
//! coefficients are written in powers of `z^-1`.

use nalgebra::DMatrix;
use neurofilt_core::lfilter::Section;
use neurofilt_core::Complex64;

/// Monic polynomial with the given roots. Imaginary parts of the
/// coefficients are dropped (roots are expected in conjugate pairs).
pub fn poly(roots: &[Complex64]) -> Vec<f64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &r in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * r;
        }
        coeffs = next;
    }
    coeffs.into_iter().map(|c| c.re).collect()
}

/// Roots of a real polynomial via eigenvalues of its companion matrix.
pub fn roots(coeffs: &[f64]) -> Vec<Complex64> {
    let start = match coeffs.iter().position(|&c| c != 0.0) {
        Some(s) => s,
        None => return Vec::new(),
    };
    let trimmed = &coeffs[start..];
    let trailing = trimmed.iter().rev().take_while(|&&c| c == 0.0).count();
    let core = &trimmed[..trimmed.len() - trailing];
    let mut out = vec![Complex64::new(0.0, 0.0); trailing];

    let degree = core.len().saturating_sub(1);
    if degree == 0 {
        return out;
    }
    let mut companion = DMatrix::<f64>::zeros(degree, degree);
    for j in 0..degree {
        companion[(0, j)] = -core[j + 1] / core[0];
    }
    for i in 1..degree {
        companion[(i, i - 1)] = 1.0;
    }
    out.extend(
        companion
            .complex_eigenvalues()
            .iter()
            .map(|c| Complex64::new(c.re, c.im)),
    );
    out
}

/// Evaluate `b(e^{jw}) / a(e^{jw})` at each angular frequency in `w`
/// (radians per sample).
pub fn freqz(b: &[f64], a: &[f64], w: &[f64]) -> Vec<Complex64> {
    w.iter()
        .map(|&wk| {
            let z1 = Complex64::from_polar(1.0, -wk);
            eval_in_z1(b, z1) / eval_in_z1(a, z1)
        })
        .collect()
}

/// Frequency response of a cascade of second-order sections.
pub fn sosfreqz(sos: &[Section], w: &[f64]) -> Vec<Complex64> {
    let mut h = vec![Complex64::new(1.0, 0.0); w.len()];
    for section in sos {
        let hs = freqz(&section[..3], &section[3..], w);
        for (acc, v) in h.iter_mut().zip(hs) {
            *acc *= v;
        }
    }
    h
}

/// `sum c[k] z1^k` by Horner's rule
fn eval_in_z1(c: &[f64], z1: Complex64) -> Complex64 {
    c.iter()
        .rev()
        .fold(Complex64::new(0.0, 0.0), |acc, &ck| acc * z1 + ck)
}

/// `n` evenly spaced frequencies in `[0, pi)`, as used for response plots.
pub fn worn(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| std::f64::consts::PI * i as f64 / n as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_poly_from_roots() {
        let c = poly(&[Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0)]);
        assert_eq!(c, vec![1.0, -3.0, 2.0]);
        let c = poly(&[Complex64::new(0.0, 1.0), Complex64::new(0.0, -1.0)]);
        assert_abs_diff_eq!(c[0], 1.0);
        assert_abs_diff_eq!(c[1], 0.0);
        assert_abs_diff_eq!(c[2], 1.0);
    }

    #[test]
    fn test_roots_quadratic() {
        let mut r = roots(&[1.0, -3.0, 2.0]);
        r.sort_by(|a, b| a.re.total_cmp(&b.re));
        assert_abs_diff_eq!(r[0].re, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r[1].re, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_roots_trailing_zeros() {
        let r = roots(&[0.0, 1.0, -1.0, 0.0]);
        assert_eq!(r.len(), 2);
        assert!(r.iter().any(|z| z.norm() < 1e-15));
        assert!(r.iter().any(|z| (z.re - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_freqz_moving_average() {
        let w = [0.0, std::f64::consts::PI];
        let h = freqz(&[0.5, 0.5], &[1.0], &w);
        assert_abs_diff_eq!(h[0].norm(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(h[1].norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sosfreqz_matches_freqz() {
        let section = [0.5, 0.5, 0.0, 1.0, -0.3, 0.0];
        let w = worn(16);
        let a = sosfreqz(&[section, section], &w);
        let b = freqz(&[0.25, 0.5, 0.25], &[1.0, -0.6, 0.09], &w);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x.re, y.re, epsilon = 1e-12);
            assert_abs_diff_eq!(x.im, y.im, epsilon = 1e-12);
        }
    }
}
