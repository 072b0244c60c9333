//! Window functions
//!
//! Symmetric windows are used for filter design, periodic ones for
//! spectral weighting (resampling, tapering).

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Window shapes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WindowKind {
    Boxcar,
    Hann,
    Hamming,
    Blackman,
    Triang,
    Kaiser(f64),
}

const WINDOW_NAMES: &[&str] = &[
    "boxcar", "hann", "hamming", "blackman", "triang", "kaiser:<beta>",
];

impl FromStr for WindowKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let kind = match lower.as_str() {
            "boxcar" | "rect" | "rectangular" => Self::Boxcar,
            "hann" | "hanning" => Self::Hann,
            "hamming" => Self::Hamming,
            "blackman" => Self::Blackman,
            "triang" | "triangle" => Self::Triang,
            "kaiser" => Self::Kaiser(5.0),
            other => match other.strip_prefix("kaiser:") {
                Some(beta) => {
                    let beta: f64 = beta
                        .trim()
                        .parse()
                        .map_err(|_| CoreError::invalid_choice("window", WINDOW_NAMES, s))?;
                    if !beta.is_finite() || beta < 0.0 {
                        return Err(CoreError::value(format!(
                            "Kaiser beta must be non-negative, got {}",
                            beta
                        )));
                    }
                    Self::Kaiser(beta)
                }
                None => return Err(CoreError::invalid_choice("window", WINDOW_NAMES, s)),
            },
        };
        Ok(kind)
    }
}

impl TryFrom<String> for WindowKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<WindowKind> for String {
    fn from(kind: WindowKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boxcar => write!(f, "boxcar"),
            Self::Hann => write!(f, "hann"),
            Self::Hamming => write!(f, "hamming"),
            Self::Blackman => write!(f, "blackman"),
            Self::Triang => write!(f, "triang"),
            Self::Kaiser(beta) => write!(f, "kaiser:{}", beta),
        }
    }
}

/// Build a window of `n` samples.
///
/// `symmetric` windows end on the same value they start with (filter
/// design). Periodic windows are the first `n` samples of an `n + 1`
/// symmetric window (spectral analysis).
pub fn get_window(kind: WindowKind, n: usize, symmetric: bool) -> Vec<f64> {
    match n {
        0 => return Vec::new(),
        1 => return vec![1.0],
        _ => {}
    }
    if symmetric {
        symmetric_window(kind, n)
    } else {
        let mut w = symmetric_window(kind, n + 1);
        w.truncate(n);
        w
    }
}

fn symmetric_window(kind: WindowKind, n: usize) -> Vec<f64> {
    let denom = (n - 1) as f64;
    match kind {
        WindowKind::Boxcar => vec![1.0; n],
        WindowKind::Hann => general_cosine(n, &[0.5, 0.5]),
        WindowKind::Hamming => general_cosine(n, &[0.54, 0.46]),
        WindowKind::Blackman => general_cosine(n, &[0.42, 0.5, 0.08]),
        WindowKind::Triang => {
            let half = (n + 1) / 2;
            let mut w: Vec<f64> = if n % 2 == 1 {
                (1..=half).map(|k| 2.0 * k as f64 / (n as f64 + 1.0)).collect()
            } else {
                (1..=half)
                    .map(|k| (2.0 * k as f64 - 1.0) / n as f64)
                    .collect()
            };
            let mirror: Vec<f64> = if n % 2 == 1 {
                w[..half - 1].iter().rev().copied().collect()
            } else {
                w.iter().rev().copied().collect()
            };
            w.extend(mirror);
            w
        }
        WindowKind::Kaiser(beta) => {
            let norm = bessel_i0(beta);
            (0..n)
                .map(|k| {
                    let r = 2.0 * k as f64 / denom - 1.0;
                    bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / norm
                })
                .collect()
        }
    }
}

/// Sum of cosines with alternating signs: `a0 - a1 cos(x) + a2 cos(2x) ...`
fn general_cosine(n: usize, coeffs: &[f64]) -> Vec<f64> {
    let denom = (n - 1) as f64;
    (0..n)
        .map(|k| {
            let phase = 2.0 * PI * k as f64 / denom;
            coeffs
                .iter()
                .enumerate()
                .map(|(i, &a)| {
                    let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                    sign * a * (i as f64 * phase).cos()
                })
                .sum()
        })
        .collect()
}

/// Modified Bessel function of the first kind, order zero (power series).
pub fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    let mut k = 1.0;
    loop {
        term *= (half / k) * (half / k);
        sum += term;
        if term < sum * 1e-17 {
            break;
        }
        k += 1.0;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_symmetric_hamming_endpoints() {
        let w = get_window(WindowKind::Hamming, 11, true);
        assert_eq!(w.len(), 11);
        assert_abs_diff_eq!(w[0], 0.08, epsilon = 1e-12);
        assert_abs_diff_eq!(w[10], 0.08, epsilon = 1e-12);
        assert_abs_diff_eq!(w[5], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_periodic_hann() {
        let w = get_window(WindowKind::Hann, 4, false);
        let expected = [0.0, 0.5, 1.0, 0.5];
        for (a, b) in w.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_triang() {
        let odd = get_window(WindowKind::Triang, 5, true);
        let expected = [1.0 / 3.0, 2.0 / 3.0, 1.0, 2.0 / 3.0, 1.0 / 3.0];
        for (a, b) in odd.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
        let even = get_window(WindowKind::Triang, 4, true);
        let expected = [0.25, 0.75, 0.75, 0.25];
        for (a, b) in even.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_kaiser_zero_beta_is_boxcar() {
        let w = get_window(WindowKind::Kaiser(0.0), 7, true);
        assert!(w.iter().all(|&v| (v - 1.0).abs() < 1e-12));
        let w = get_window(WindowKind::Kaiser(5.0), 9, true);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-12);
        assert!(w[0] < 0.1);
    }

    #[test]
    fn test_bessel_i0() {
        assert_abs_diff_eq!(bessel_i0(0.0), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(bessel_i0(1.0), 1.2660658777520082, epsilon = 1e-12);
        assert_abs_diff_eq!(bessel_i0(5.0), 27.239871823604442, epsilon = 1e-9);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Hann".parse::<WindowKind>().unwrap(), WindowKind::Hann);
        assert_eq!(
            "kaiser:8.6".parse::<WindowKind>().unwrap(),
            WindowKind::Kaiser(8.6)
        );
        assert!("flattop".parse::<WindowKind>().is_err());
        assert_eq!(get_window(WindowKind::Blackman, 1, true), vec![1.0]);
        assert!(get_window(WindowKind::Blackman, 0, true).is_empty());
    }
}
