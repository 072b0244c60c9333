//! Edge extension for finite-length convolution

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How samples beyond the ends of a signal are synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PadMode {
    /// Zero fill
    Zero,
    /// Replicate the end samples
    Edge,
    /// Odd reflection about the end samples, wrapping as often as needed
    Reflect,
    /// Odd reflection of at most one period, then zeros
    #[default]
    ReflectLimited,
}

const PAD_NAMES: &[&str] = &["zero", "edge", "reflect", "reflect_limited"];

impl FromStr for PadMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zero" | "constant" => Ok(Self::Zero),
            "edge" => Ok(Self::Edge),
            "reflect" => Ok(Self::Reflect),
            "reflect_limited" => Ok(Self::ReflectLimited),
            other => Err(CoreError::invalid_choice("pad", PAD_NAMES, other)),
        }
    }
}

impl TryFrom<String> for PadMode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PadMode> for String {
    fn from(mode: PadMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for PadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Zero => "zero",
            Self::Edge => "edge",
            Self::Reflect => "reflect",
            Self::ReflectLimited => "reflect_limited",
        };
        f.write_str(name)
    }
}

/// Extend `x` by `left` samples before and `right` samples after.
///
/// The output always has `left + x.len() + right` samples.
pub fn pad(x: &[f64], (left, right): (usize, usize), mode: PadMode) -> Vec<f64> {
    if left == 0 && right == 0 {
        return x.to_vec();
    }
    let n = x.len();
    if n == 0 {
        return vec![0.0; left + right];
    }
    let mut out = Vec::with_capacity(left + n + right);
    match mode {
        PadMode::Zero => {
            out.resize(left, 0.0);
            out.extend_from_slice(x);
            out.resize(left + n + right, 0.0);
        }
        PadMode::Edge => {
            out.resize(left, x[0]);
            out.extend_from_slice(x);
            out.resize(left + n + right, x[n - 1]);
        }
        PadMode::ReflectLimited => {
            let first = x[0];
            let last = x[n - 1];
            let n_left = left.min(n - 1);
            let n_right = right.min(n - 1);
            out.resize(left - n_left, 0.0);
            out.extend((1..=n_left).rev().map(|k| 2.0 * first - x[k]));
            out.extend_from_slice(x);
            out.extend((1..=n_right).map(|k| 2.0 * last - x[n - 1 - k]));
            out.resize(left + n + right, 0.0);
        }
        PadMode::Reflect => {
            out = reflect_odd(x, left, right);
        }
    }
    out
}

/// Odd reflection with repeated wraps. Each wrap mirrors about the current
/// outermost sample, taking at most the filled length minus one, rounded
/// down to a whole number of signal periods (`n - 1`).
fn reflect_odd(x: &[f64], left: usize, right: usize) -> Vec<f64> {
    let n = x.len();
    if n == 1 {
        return vec![x[0]; left + 1 + right];
    }
    let mut buf = vec![0.0; left + n + right];
    buf[left..left + n].copy_from_slice(x);
    let mut lo = left;
    let mut hi = left + n;
    let mut left_remaining = left;
    let mut right_remaining = right;
    while left_remaining > 0 || right_remaining > 0 {
        let period = (hi - lo - 1) / (n - 1) * (n - 1);
        if left_remaining > 0 {
            let chunk = period.min(left_remaining);
            let edge = buf[lo];
            for k in 1..=chunk {
                buf[lo - k] = 2.0 * edge - buf[lo + k];
            }
            lo -= chunk;
            left_remaining -= chunk;
        }
        if right_remaining > 0 {
            let chunk = period.min(right_remaining);
            let edge = buf[hi - 1];
            for k in 1..=chunk {
                buf[hi - 1 + k] = 2.0 * edge - buf[hi - 1 - k];
            }
            hi += chunk;
            right_remaining -= chunk;
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_reflect_limited_short_pad() {
        let x = [1.0, 2.0, 4.0];
        let out = pad(&x, (2, 1), PadMode::ReflectLimited);
        assert_eq!(out, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_reflect_limited_long_pad_zero_fills() {
        let x = [1.0, 2.0];
        let out = pad(&x, (4, 3), PadMode::ReflectLimited);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_reflect_wraps() {
        let x = [0.0, 1.0, 3.0];
        let out = pad(&x, (5, 0), PadMode::Reflect);
        // first wrap about 0 gives [-3, -1], the second about -3 gives [-7, -6, -5]
        assert_eq!(out, vec![-7.0, -6.0, -5.0, -3.0, -1.0, 0.0, 1.0, 3.0]);
    }

    #[test]
    fn test_reflect_uneven_wraps() {
        let out = pad(&[1.0, 2.0, 3.0], (7, 2), PadMode::Reflect);
        let expected: Vec<f64> = (-6..=5).map(f64::from).collect();
        assert_eq!(out, expected);

        // the second wrap has 10 samples to mirror but only reuses 8
        let x = [6.0, 3.0, -2.0, -6.0, 1.0];
        let out = pad(&x, (22, 2), PadMode::Reflect);
        let expected = [
            28.0, 24.0, 31.0, 38.0, 34.0, 29.0, 26.0, 23.0, 18.0, 14.0, 21.0, 28.0, 24.0, 19.0,
            16.0, 13.0, 8.0, 4.0, 11.0, 18.0, 14.0, 9.0, 6.0, 3.0, -2.0, -6.0, 1.0, 8.0, 4.0,
        ];
        assert_eq!(out, expected.to_vec());
    }

    #[test]
    fn test_reflect_single_sample() {
        let out = pad(&[2.5], (3, 2), PadMode::Reflect);
        assert_eq!(out, vec![2.5; 6]);
    }

    #[test]
    fn test_edge_and_zero() {
        let x = [1.0, 2.0];
        assert_eq!(
            pad(&x, (2, 1), PadMode::Edge),
            vec![1.0, 1.0, 1.0, 2.0, 2.0]
        );
        assert_eq!(
            pad(&x, (1, 2), PadMode::Zero),
            vec![0.0, 1.0, 2.0, 0.0, 0.0]
        );
        assert_eq!(pad(&[], (1, 2), PadMode::Reflect), vec![0.0; 3]);
    }

    #[test]
    fn test_parse_pad_mode() {
        assert_eq!("reflect_limited".parse::<PadMode>().unwrap(), PadMode::ReflectLimited);
        assert_eq!("constant".parse::<PadMode>().unwrap(), PadMode::Zero);
        let err = "mirror".parse::<PadMode>().unwrap_err();
        assert!(err.to_string().contains("'pad' parameter"));
    }

    #[quickcheck]
    fn prop_pad_length(x: Vec<f64>, left: u8, right: u8) -> bool {
        let (left, right) = (left as usize, right as usize);
        [PadMode::Zero, PadMode::Edge, PadMode::Reflect, PadMode::ReflectLimited]
            .iter()
            .all(|&mode| pad(&x, (left, right), mode).len() == left + x.len() + right)
    }

    #[quickcheck]
    fn prop_pad_keeps_signal(x: Vec<f64>, left: u8, right: u8) -> bool {
        let (left, right) = (left as usize, right as usize);
        let x: Vec<f64> = x.into_iter().filter(|v| v.is_finite()).collect();
        [PadMode::Zero, PadMode::Edge, PadMode::Reflect, PadMode::ReflectLimited]
            .iter()
            .all(|&mode| pad(&x, (left, right), mode)[left..left + x.len()] == x[..])
    }
}
