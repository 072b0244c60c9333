//! Elliptic integrals and Jacobi elliptic functions
//!
//! All functions take the parameter `m = k^2`, not the modulus `k`.

use crate::{DesignError, Result};
use neurofilt_core::Complex64;
use std::f64::consts::PI;

const MACHEP: f64 = 1.110_223_024_625_156_5e-16;
const ELLIPDEG_MMAX: i32 = 7;
const ARC_JAC_SN_MAXITER: usize = 10;

fn agm(mut a: f64, mut b: f64) -> f64 {
    for _ in 0..64 {
        if (a - b).abs() <= MACHEP * a.abs() {
            break;
        }
        let next = 0.5 * (a + b);
        b = (a * b).sqrt();
        a = next;
    }
    0.5 * (a + b)
}

/// Complete elliptic integral of the first kind, `K(m)`.
pub fn ellipk(m: f64) -> f64 {
    if m >= 1.0 {
        return f64::INFINITY;
    }
    PI / (2.0 * agm(1.0, (1.0 - m).sqrt()))
}

/// `K(1 - p)`, accurate for small `p`.
pub fn ellipkm1(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::INFINITY;
    }
    PI / (2.0 * agm(1.0, p.sqrt()))
}

/// Jacobi elliptic functions `(sn, cn, dn, phi)` of `u` with parameter `m`.
pub fn ellipj(u: f64, m: f64) -> (f64, f64, f64, f64) {
    if !(0.0..=1.0).contains(&m) {
        return (f64::NAN, f64::NAN, f64::NAN, f64::NAN);
    }
    if m < 1.0e-9 {
        let t = u.sin();
        let b = u.cos();
        let ai = 0.25 * m * (u - t * b);
        return (t - ai * b, b + ai * t, 1.0 - 0.5 * m * t * t, u - ai);
    }
    if m >= 0.999_999_999_9 {
        let mut ai = 0.25 * (1.0 - m);
        let b = u.cosh();
        let t = u.tanh();
        let phi = 1.0 / b;
        let twon = b * u.sinh();
        let sn = t + ai * (twon - u) / (b * b);
        let ph = 2.0 * u.exp().atan() - PI / 2.0 + ai * (twon - u) / b;
        ai *= t * phi;
        return (sn, phi - ai * (twon - u), phi + ai * (twon + u), ph);
    }

    // arithmetic-geometric mean, then back-substitution
    let mut a = [0.0f64; 9];
    let mut c = [0.0f64; 9];
    a[0] = 1.0;
    let mut b = (1.0 - m).sqrt();
    c[0] = m.sqrt();
    let mut twon = 1.0;
    let mut i = 0;
    while (c[i] / a[i]).abs() > MACHEP {
        if i > 7 {
            break;
        }
        let ai = a[i];
        i += 1;
        c[i] = (ai - b) / 2.0;
        let t = (ai * b).sqrt();
        a[i] = (ai + b) / 2.0;
        b = t;
        twon *= 2.0;
    }

    let mut phi = twon * a[i] * u;
    let mut prev = phi;
    while i > 0 {
        let t = c[i] * phi.sin() / a[i];
        prev = phi;
        phi = (t.asin() + phi) / 2.0;
        i -= 1;
    }
    let t = phi.cos();
    (phi.sin(), t, t / (phi - prev).cos(), phi)
}

/// Solve the degree equation: the parameter `m` of an order-`n` elliptic
/// filter whose complementary selectivity parameter is `m1`.
pub fn ellipdeg(n: usize, m1: f64) -> f64 {
    let k1 = ellipk(m1);
    let k1p = ellipkm1(m1);
    let q1 = (-PI * k1p / k1).exp();
    let q = q1.powf(1.0 / n as f64);
    let num: f64 = (0..=ELLIPDEG_MMAX).map(|m| q.powi(m * (m + 1))).sum();
    let den: f64 = 1.0 + 2.0 * (1..=ELLIPDEG_MMAX + 1).map(|m| q.powi(m * m)).sum::<f64>();
    16.0 * q * (num / den).powi(4)
}

fn complement(kx: Complex64) -> Complex64 {
    ((1.0 - kx) * (1.0 + kx)).sqrt()
}

/// Inverse Jacobian elliptic `sn` for complex argument, by descending
/// Landen transformations.
pub fn arc_jac_sn(w: Complex64, m: f64) -> Result<Complex64> {
    let k = m.sqrt();
    if k > 1.0 {
        return Ok(Complex64::new(f64::NAN, f64::NAN));
    }
    if k == 1.0 {
        return Ok(w.atanh());
    }

    let mut ks = vec![k];
    while let Some(&last) = ks.last() {
        if last == 0.0 {
            break;
        }
        if ks.len() > ARC_JAC_SN_MAXITER {
            return Err(DesignError::NotConverging);
        }
        let kp = complement(Complex64::new(last, 0.0)).re;
        ks.push((1.0 - kp) / (1.0 + kp));
    }

    let big_k = ks[1..].iter().map(|kn| 1.0 + kn).product::<f64>() * PI / 2.0;
    let mut wn = w;
    for pair in ks.windows(2) {
        let (kn, knext) = (pair[0], pair[1]);
        wn = 2.0 * wn / ((1.0 + knext) * (1.0 + complement(kn * wn)));
    }
    let u = 2.0 / PI * wn.asin();
    Ok(big_k * u)
}

/// Real inverse Jacobian elliptic `sc` with complementary parameter.
pub fn arc_jac_sc1(w: f64, m: f64) -> Result<f64> {
    let z = arc_jac_sn(Complex64::new(0.0, w), m)?;
    if z.re.abs() > 1e-14 {
        return Err(DesignError::NotConverging);
    }
    Ok(z.im)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ellipk_known_values() {
        assert_abs_diff_eq!(ellipk(0.0), PI / 2.0, epsilon = 1e-15);
        assert_abs_diff_eq!(ellipk(0.5), 1.854_074_677_301_372, epsilon = 1e-13);
        assert_abs_diff_eq!(ellipkm1(0.5), ellipk(0.5), epsilon = 1e-13);
        assert!(ellipk(1.0).is_infinite());
    }

    #[test]
    fn test_ellipj_limits() {
        let (sn, cn, dn, _) = ellipj(0.3, 0.0);
        assert_abs_diff_eq!(sn, 0.3f64.sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(cn, 0.3f64.cos(), epsilon = 1e-12);
        assert_abs_diff_eq!(dn, 1.0, epsilon = 1e-12);
        let (sn, cn, _, _) = ellipj(0.3, 1.0);
        assert_abs_diff_eq!(sn, 0.3f64.tanh(), epsilon = 1e-12);
        assert_abs_diff_eq!(cn, 1.0 / 0.3f64.cosh(), epsilon = 1e-12);
    }

    #[test]
    fn test_ellipj_identities() {
        for &m in &[0.1, 0.5, 0.9] {
            for &u in &[0.2, 0.7, 1.3] {
                let (sn, cn, dn, _) = ellipj(u, m);
                assert_abs_diff_eq!(sn * sn + cn * cn, 1.0, epsilon = 1e-12);
                assert_abs_diff_eq!(dn * dn + m * sn * sn, 1.0, epsilon = 1e-12);
            }
        }
        // sn(K) = 1
        let m = 0.7;
        let (sn, _, _, _) = ellipj(ellipk(m), m);
        assert_abs_diff_eq!(sn, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_arc_jac_sn_inverts_sn() {
        let m = 0.6;
        let u = 0.8;
        let (sn, _, _, _) = ellipj(u, m);
        let z = arc_jac_sn(Complex64::new(sn, 0.0), m).unwrap();
        assert_abs_diff_eq!(z.re, u, epsilon = 1e-10);
        assert_abs_diff_eq!(z.im, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_ellipdeg_is_small_parameter() {
        let m = ellipdeg(4, 1e-4);
        assert!(m > 0.0 && m < 1.0);
    }
}
