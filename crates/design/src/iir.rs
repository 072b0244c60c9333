//! IIR filter design
//!
//! Digital filters are built from an analog lowpass prototype in
//! zero-pole-gain form, moved to the requested band by a frequency
//! transformation, mapped to the z-plane with the bilinear transform and
//! returned either as a transfer function or as second-order sections.

use crate::poly::{freqz, poly, roots, sosfreqz};
use crate::ringing::{estimate_ringing_samples, DEFAULT_MAX_TRY};
use crate::special::{arc_jac_sc1, ellipdeg, ellipj, ellipk, ellipkm1};
use crate::{DesignError, Result};
use neurofilt_core::lfilter::{filtfilt, lfilter, sosfilt, sosfiltfilt, Section};
use neurofilt_core::overlap::Phase;
use neurofilt_core::report::Reporter;
use neurofilt_core::{Complex64, CoreError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

const ELLIP_EPSILON: f64 = 2e-16;

/// Band of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BandType {
    Lowpass,
    Highpass,
    Bandpass,
    Bandstop,
}

impl BandType {
    /// Number of critical frequencies
    pub fn n_edges(&self) -> usize {
        match self {
            Self::Lowpass | Self::Highpass => 1,
            Self::Bandpass | Self::Bandstop => 2,
        }
    }
}

impl FromStr for BandType {
    type Err = CoreError;

    fn from_str(s: &str) -> neurofilt_core::Result<Self> {
        match s {
            "lowpass" | "low" => Ok(Self::Lowpass),
            "highpass" | "high" => Ok(Self::Highpass),
            "bandpass" | "band" | "pass" => Ok(Self::Bandpass),
            "bandstop" | "stop" => Ok(Self::Bandstop),
            other => Err(CoreError::invalid_choice(
                "btype",
                &["lowpass", "highpass", "bandpass", "bandstop"],
                other,
            )),
        }
    }
}

impl TryFrom<String> for BandType {
    type Error = CoreError;

    fn try_from(value: String) -> neurofilt_core::Result<Self> {
        value.parse()
    }
}

impl From<BandType> for String {
    fn from(btype: BandType) -> Self {
        btype.to_string()
    }
}

impl fmt::Display for BandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lowpass => "lowpass",
            Self::Highpass => "highpass",
            Self::Bandpass => "bandpass",
            Self::Bandstop => "bandstop",
        };
        f.write_str(name)
    }
}

/// Classical IIR families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IirFamily {
    Butterworth,
    ChebyshevI,
    ChebyshevII,
    Elliptic,
    Bessel,
}

const FTYPE_NAMES: &str = "butter, cheby1, cheby2, ellip, bessel";

impl IirFamily {
    /// Name used in reports
    pub fn title(&self) -> &'static str {
        match self {
            Self::Butterworth => "Butterworth",
            Self::ChebyshevI => "Chebyshev I",
            Self::ChebyshevII => "Chebyshev II",
            Self::Elliptic => "Cauer (elliptic)",
            Self::Bessel => "Bessel",
        }
    }
}

impl FromStr for IirFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> neurofilt_core::Result<Self> {
        match s {
            "butter" | "butterworth" => Ok(Self::Butterworth),
            "cheby1" | "chebyshev1" | "chebyshevi" => Ok(Self::ChebyshevI),
            "cheby2" | "chebyshev2" | "chebyshevii" => Ok(Self::ChebyshevII),
            "ellip" | "elliptic" | "cauer" => Ok(Self::Elliptic),
            "bessel" => Ok(Self::Bessel),
            other => Err(CoreError::config(format!(
                "ftype must be one of {}, got '{}'",
                FTYPE_NAMES, other
            ))),
        }
    }
}

/// A family together with the ripple parameters it needs for a
/// fixed-order design.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FamilySpec {
    Butterworth,
    ChebyshevI { rp: f64 },
    ChebyshevII { rs: f64 },
    Elliptic { rp: f64, rs: f64 },
    Bessel,
}

impl FamilySpec {
    pub fn family(&self) -> IirFamily {
        match self {
            Self::Butterworth => IirFamily::Butterworth,
            Self::ChebyshevI { .. } => IirFamily::ChebyshevI,
            Self::ChebyshevII { .. } => IirFamily::ChebyshevII,
            Self::Elliptic { .. } => IirFamily::Elliptic,
            Self::Bessel => IirFamily::Bessel,
        }
    }

    fn with_ripple(family: IirFamily, rp: Option<f64>, rs: Option<f64>) -> Result<Self> {
        let need = |v: Option<f64>, what: &str| -> Result<f64> {
            v.ok_or_else(|| {
                CoreError::config(format!(
                    "{} must be provided to design a {} filter.",
                    what,
                    family.title()
                ))
                .into()
            })
        };
        Ok(match family {
            IirFamily::Butterworth => Self::Butterworth,
            IirFamily::ChebyshevI => Self::ChebyshevI {
                rp: need(rp, "passband ripple (rp)")?,
            },
            IirFamily::ChebyshevII => Self::ChebyshevII {
                rs: need(rs, "stopband attenuation (rs)")?,
            },
            IirFamily::Elliptic => Self::Elliptic {
                rp: need(rp, "passband ripple (rp)")?,
                rs: need(rs, "stopband attenuation (rs)")?,
            },
            IirFamily::Bessel => Self::Bessel,
        })
    }
}

/// Coefficient layout of a designed filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IirOutput {
    #[default]
    Ba,
    Sos,
}

impl FromStr for IirOutput {
    type Err = CoreError;

    fn from_str(s: &str) -> neurofilt_core::Result<Self> {
        match s {
            "ba" => Ok(Self::Ba),
            "sos" => Ok(Self::Sos),
            other => Err(CoreError::invalid_choice("output", &["ba", "sos"], other)),
        }
    }
}

impl fmt::Display for IirOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ba => f.write_str("ba"),
            Self::Sos => f.write_str("sos"),
        }
    }
}

/// User-facing IIR parameters, as read from configuration.
///
/// Use [`IirParams::validate`] to turn them into an [`IirDesign`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IirParams {
    pub ftype: Option<String>,
    pub order: Option<usize>,
    pub rp: Option<f64>,
    pub rs: Option<f64>,
    pub gpass: Option<f64>,
    pub gstop: Option<f64>,
    pub output: Option<String>,
    pub padlen: Option<usize>,
    pub b: Option<Vec<f64>>,
    pub a: Option<Vec<f64>>,
    pub sos: Option<Vec<Section>>,
}

/// How the coefficients are obtained
#[derive(Debug, Clone, PartialEq)]
pub enum IirDesign {
    FixedOrder { family: FamilySpec, order: usize },
    MinimumOrder { family: IirFamily, gpass: f64, gstop: f64 },
    Coefficients(IirSystem),
}

/// Validated IIR parameters
#[derive(Debug, Clone, PartialEq)]
pub struct IirSpec {
    pub design: IirDesign,
    pub output: IirOutput,
    pub padlen: Option<usize>,
}

impl IirParams {
    pub fn butterworth(order: usize) -> Self {
        Self {
            ftype: Some("butter".into()),
            order: Some(order),
            ..Default::default()
        }
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Parameters with nothing but (optionally) `output` set become a
    /// 4th-order Butterworth, as second-order sections unless told otherwise.
    pub fn or_default_design(self) -> Self {
        let only_output = Self {
            output: self.output.clone(),
            ..Default::default()
        };
        if self == only_output {
            let output = self.output.unwrap_or_else(|| "sos".into());
            Self::butterworth(4).with_output(&output)
        } else {
            self
        }
    }

    pub fn validate(&self) -> Result<IirSpec> {
        if let Some(sos) = &self.sos {
            return Ok(IirSpec {
                design: IirDesign::Coefficients(IirSystem::Sos(sos.clone())),
                output: IirOutput::Sos,
                padlen: self.padlen,
            });
        }
        if let (Some(b), Some(a)) = (&self.b, &self.a) {
            return Ok(IirSpec {
                design: IirDesign::Coefficients(IirSystem::Ba {
                    b: b.clone(),
                    a: a.clone(),
                }),
                output: IirOutput::Ba,
                padlen: self.padlen,
            });
        }

        let output = match &self.output {
            Some(o) => o.parse()?,
            None => IirOutput::Ba,
        };
        let family: IirFamily = self
            .ftype
            .as_deref()
            .ok_or_else(|| {
                CoreError::config("ftype must be an entry in iir_params if 'b' and 'a' are not specified")
            })?
            .parse()?;

        let design = match self.order {
            Some(0) => return Err(CoreError::value("IIR filter order must be at least 1").into()),
            Some(order) => IirDesign::FixedOrder {
                family: FamilySpec::with_ripple(family, self.rp, self.rs)?,
                order,
            },
            None => match (self.gpass, self.gstop) {
                (Some(gpass), Some(gstop)) => {
                    if family == IirFamily::Bessel {
                        return Err(CoreError::config(
                            "Bessel filters have no minimum-order design, 'order' must be given",
                        )
                        .into());
                    }
                    IirDesign::MinimumOrder {
                        family,
                        gpass,
                        gstop,
                    }
                }
                _ => {
                    return Err(CoreError::config(
                        "iir_params must have at least 'gstop' and 'gpass' (or 'order') entries",
                    )
                    .into())
                }
            },
        };
        Ok(IirSpec {
            design,
            output,
            padlen: self.padlen,
        })
    }
}

/// Digital IIR coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IirSystem {
    Ba { b: Vec<f64>, a: Vec<f64> },
    Sos(Vec<Section>),
}

impl IirSystem {
    /// Poles of the system. For transfer functions these are the roots of
    /// the denominator, so round-off in high-order designs shows up here.
    pub fn poles(&self) -> Vec<Complex64> {
        match self {
            Self::Ba { a, .. } => roots(a),
            Self::Sos(sos) => sos.iter().flat_map(|s| roots(&s[3..])).collect(),
        }
    }

    pub fn check_stability(&self) -> Result<()> {
        if self.poles().iter().any(|p| p.norm() >= 1.0) {
            return Err(DesignError::Unstable);
        }
        Ok(())
    }

    /// Complex response at angular frequencies `w` (radians per sample).
    pub fn freqz(&self, w: &[f64]) -> Vec<Complex64> {
        match self {
            Self::Ba { b, a } => freqz(b, a, w),
            Self::Sos(sos) => sosfreqz(sos, w),
        }
    }

    pub fn output(&self) -> IirOutput {
        match self {
            Self::Ba { .. } => IirOutput::Ba,
            Self::Sos(_) => IirOutput::Sos,
        }
    }
}

/// A designed IIR filter and the edge padding used for zero-phase
/// application.
#[derive(Debug, Clone, PartialEq)]
pub struct IirFilter {
    pub system: IirSystem,
    pub padlen: usize,
}

impl IirFilter {
    /// Filter one row. Zero phases run forward and backward; every other
    /// phase is a single causal pass from rest.
    pub fn apply(&self, x: &[f64], phase: Phase) -> Result<Vec<f64>> {
        let y = match (&self.system, phase.is_zero()) {
            (IirSystem::Ba { b, a }, true) => filtfilt(b, a, x, self.padlen)?,
            (IirSystem::Sos(sos), true) => sosfiltfilt(sos, x, self.padlen)?,
            (IirSystem::Ba { b, a }, false) => lfilter(b, a, x, None)?.0,
            (IirSystem::Sos(sos), false) => sosfilt(sos, x, None)?.0,
        };
        Ok(y)
    }
}

/// Zeros, poles and gain
#[derive(Debug, Clone, PartialEq)]
pub struct Zpk {
    pub z: Vec<Complex64>,
    pub p: Vec<Complex64>,
    pub k: f64,
}

fn c(re: f64) -> Complex64 {
    Complex64::new(re, 0.0)
}

fn prod_neg(v: &[Complex64]) -> Complex64 {
    v.iter().fold(c(1.0), |acc, x| acc * -x)
}

/// Analog Butterworth prototype with cutoff 1 rad/s.
pub fn buttap(n: usize) -> Zpk {
    let p = (0..n)
        .map(|i| {
            let m = -(n as f64) + 1.0 + 2.0 * i as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n as f64))
        })
        .collect();
    Zpk {
        z: Vec::new(),
        p,
        k: 1.0,
    }
}

/// Analog Chebyshev type I prototype with `rp` dB passband ripple.
pub fn cheb1ap(n: usize, rp: f64) -> Zpk {
    let eps = (10f64.powf(0.1 * rp) - 1.0).sqrt();
    let mu = (1.0 / eps).asinh() / n as f64;
    let p: Vec<Complex64> = (0..n)
        .map(|i| {
            let m = -(n as f64) + 1.0 + 2.0 * i as f64;
            let theta = PI * m / (2.0 * n as f64);
            -Complex64::new(mu, theta).sinh()
        })
        .collect();
    let mut k = prod_neg(&p).re;
    if n % 2 == 0 {
        k /= (1.0 + eps * eps).sqrt();
    }
    Zpk { z: Vec::new(), p, k }
}

/// Analog Chebyshev type II prototype with `rs` dB stopband attenuation.
pub fn cheb2ap(n: usize, rs: f64) -> Zpk {
    let de = 1.0 / (10f64.powf(0.1 * rs) - 1.0).sqrt();
    let mu = (1.0 / de).asinh() / n as f64;
    let nf = n as f64;
    let m: Vec<f64> = (0..n)
        .map(|i| -nf + 1.0 + 2.0 * i as f64)
        .filter(|&m| n % 2 == 0 || m != 0.0)
        .collect();
    let z: Vec<Complex64> = m
        .iter()
        .map(|&m| -(Complex64::new(0.0, 1.0) / (m * PI / (2.0 * nf)).sin()).conj())
        .collect();
    let p: Vec<Complex64> = (0..n)
        .map(|i| {
            let m = -nf + 1.0 + 2.0 * i as f64;
            let b = -Complex64::from_polar(1.0, PI * m / (2.0 * nf));
            1.0 / Complex64::new(mu.sinh() * b.re, mu.cosh() * b.im)
        })
        .collect();
    let k = (prod_neg(&p) / prod_neg(&z)).re;
    Zpk { z, p, k }
}

/// Analog elliptic prototype with `rp` dB ripple and `rs` dB attenuation.
pub fn ellipap(n: usize, rp: f64, rs: f64) -> Result<Zpk> {
    if n == 1 {
        let p = -(1.0 / (10f64.powf(0.1 * rp) - 1.0)).sqrt();
        return Ok(Zpk {
            z: Vec::new(),
            p: vec![c(p)],
            k: -p,
        });
    }
    let eps_sq = 10f64.powf(0.1 * rp) - 1.0;
    let eps = eps_sq.sqrt();
    let ck1_sq = eps_sq / (10f64.powf(0.1 * rs) - 1.0);
    if ck1_sq == 0.0 {
        return Err(CoreError::value("Cannot design a filter with given rp and rs specifications.").into());
    }
    let val0 = ellipk(ck1_sq);
    let m = ellipdeg(n, ck1_sq);
    let capk = ellipk(m);

    let js: Vec<f64> = ((1 - n % 2)..n).step_by(2).map(|j| j as f64).collect();
    let jac: Vec<(f64, f64, f64)> = js
        .iter()
        .map(|&j| {
            let (s, cn, d, _) = ellipj(j * capk / n as f64, m);
            (s, cn, d)
        })
        .collect();

    let mut z: Vec<Complex64> = jac
        .iter()
        .filter(|(s, _, _)| s.abs() > ELLIP_EPSILON)
        .map(|(s, _, _)| Complex64::new(0.0, 1.0 / (m.sqrt() * s)))
        .collect();
    let conj: Vec<Complex64> = z.iter().map(|v| v.conj()).collect();
    z.extend(conj);

    let r = arc_jac_sc1(1.0 / eps, ck1_sq)?;
    let v0 = capk * r / (n as f64 * val0);
    let (sv, cv, dv, _) = ellipj(v0, 1.0 - m);
    let mut p: Vec<Complex64> = jac
        .iter()
        .map(|&(s, cn, d)| {
            Complex64::new(cn * d * sv * cv, s * dv) / (1.0 - (d * sv).powi(2)) * -1.0
        })
        .collect();
    let conj: Vec<Complex64> = if n % 2 == 1 {
        p.iter()
            .filter(|v| v.im.abs() > ELLIP_EPSILON * v.norm())
            .map(|v| v.conj())
            .collect()
    } else {
        p.iter().map(|v| v.conj()).collect()
    };
    p.extend(conj);

    let mut k = (prod_neg(&p) / prod_neg(&z)).re;
    if n % 2 == 0 {
        k /= (1.0 + eps_sq).sqrt();
    }
    Ok(Zpk { z, p, k })
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|v| v as f64).product()
}

/// Analog Bessel prototype, normalized so the phase response matches the
/// Butterworth asymptotes.
pub fn besselap(n: usize) -> Zpk {
    // reverse Bessel polynomial, highest power first
    let coeffs: Vec<f64> = (0..=n)
        .rev()
        .map(|k| factorial(2 * n - k) / (2f64.powi((n - k) as i32) * factorial(k) * factorial(n - k)))
        .collect();
    let a0 = coeffs[n];
    let scale = 10f64.powf(-a0.log10() / n as f64);
    let p = roots(&coeffs).into_iter().map(|r| r * scale).collect();
    Zpk {
        z: Vec::new(),
        p,
        k: 1.0,
    }
}

fn degree(zpk: &Zpk) -> usize {
    zpk.p.len().saturating_sub(zpk.z.len())
}

pub fn lp2lp_zpk(zpk: Zpk, wo: f64) -> Zpk {
    let deg = degree(&zpk) as i32;
    Zpk {
        z: zpk.z.iter().map(|z| z * wo).collect(),
        p: zpk.p.iter().map(|p| p * wo).collect(),
        k: zpk.k * wo.powi(deg),
    }
}

pub fn lp2hp_zpk(zpk: Zpk, wo: f64) -> Zpk {
    let deg = degree(&zpk);
    let mut z: Vec<Complex64> = zpk.z.iter().map(|z| wo / z).collect();
    z.extend(std::iter::repeat(c(0.0)).take(deg));
    Zpk {
        z,
        p: zpk.p.iter().map(|p| wo / p).collect(),
        k: zpk.k * (prod_neg(&zpk.z) / prod_neg(&zpk.p)).re,
    }
}

fn split_band(roots: &[Complex64], wo: f64) -> Vec<Complex64> {
    let plus = roots.iter().map(|r| r + (r * r - wo * wo).sqrt());
    let minus = roots.iter().map(|r| r - (r * r - wo * wo).sqrt());
    plus.chain(minus).collect()
}

pub fn lp2bp_zpk(zpk: Zpk, wo: f64, bw: f64) -> Zpk {
    let deg = degree(&zpk);
    let z_lp: Vec<Complex64> = zpk.z.iter().map(|z| z * bw / 2.0).collect();
    let p_lp: Vec<Complex64> = zpk.p.iter().map(|p| p * bw / 2.0).collect();
    let mut z = split_band(&z_lp, wo);
    z.extend(std::iter::repeat(c(0.0)).take(deg));
    Zpk {
        z,
        p: split_band(&p_lp, wo),
        k: zpk.k * bw.powi(deg as i32),
    }
}

pub fn lp2bs_zpk(zpk: Zpk, wo: f64, bw: f64) -> Zpk {
    let deg = degree(&zpk);
    let z_hp: Vec<Complex64> = zpk.z.iter().map(|z| (bw / 2.0) / z).collect();
    let p_hp: Vec<Complex64> = zpk.p.iter().map(|p| (bw / 2.0) / p).collect();
    let mut z = split_band(&z_hp, wo);
    z.extend(std::iter::repeat(Complex64::new(0.0, wo)).take(deg));
    z.extend(std::iter::repeat(Complex64::new(0.0, -wo)).take(deg));
    Zpk {
        z,
        p: split_band(&p_hp, wo),
        k: zpk.k * (prod_neg(&zpk.z) / prod_neg(&zpk.p)).re,
    }
}

/// Bilinear transform with sampling frequency `fs`.
pub fn bilinear_zpk(zpk: Zpk, fs: f64) -> Zpk {
    let deg = degree(&zpk);
    let fs2 = 2.0 * fs;
    let mut z: Vec<Complex64> = zpk.z.iter().map(|z| (fs2 + z) / (fs2 - z)).collect();
    z.extend(std::iter::repeat(c(-1.0)).take(deg));
    let num = zpk.z.iter().fold(c(1.0), |acc, z| acc * (fs2 - z));
    let den = zpk.p.iter().fold(c(1.0), |acc, p| acc * (fs2 - p));
    Zpk {
        z,
        p: zpk.p.iter().map(|p| (fs2 + p) / (fs2 - p)).collect(),
        k: zpk.k * (num / den).re,
    }
}

pub fn zpk2tf(zpk: &Zpk) -> (Vec<f64>, Vec<f64>) {
    let b = poly(&zpk.z).into_iter().map(|v| v * zpk.k).collect();
    (b, poly(&zpk.p))
}

fn is_real(v: &Complex64) -> bool {
    v.im == 0.0
}

/// One representative per conjugate pair (positive imaginary part),
/// followed by the real values.
fn cplxreal(values: &[Complex64]) -> Result<Vec<Complex64>> {
    let tol = 100.0 * f64::EPSILON;
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| {
        a.re.total_cmp(&b.re)
            .then_with(|| a.im.abs().total_cmp(&b.im.abs()))
    });
    let (mut reals, mut pos, mut neg) = (Vec::new(), Vec::new(), Vec::new());
    for v in sorted {
        if v.im.abs() <= tol * v.norm() {
            reals.push(c(v.re));
        } else if v.im > 0.0 {
            pos.push(v);
        } else {
            neg.push(v);
        }
    }
    if pos.len() != neg.len() {
        return Err(CoreError::value("Array contains complex value with no matching conjugate.").into());
    }
    let mut out: Vec<Complex64> = pos
        .iter()
        .zip(&neg)
        .map(|(p, n)| (p + n.conj()) / 2.0)
        .collect();
    out.extend(reals);
    Ok(out)
}

fn idx_worst(p: &[Complex64], candidates: impl Iterator<Item = usize>) -> Option<usize> {
    candidates.fold(None, |best: Option<usize>, i| match best {
        Some(b) if (1.0 - p[b].norm()).abs() <= (1.0 - p[i].norm()).abs() => Some(b),
        _ => Some(i),
    })
}

#[derive(Clone, Copy, PartialEq)]
enum Which {
    Real,
    Complex,
    Any,
}

fn nearest(from: &[Complex64], to: Complex64, which: Which) -> Result<usize> {
    let mut order: Vec<usize> = (0..from.len()).collect();
    order.sort_by(|&a, &b| (from[a] - to).norm().total_cmp(&(from[b] - to).norm()));
    order
        .into_iter()
        .find(|&i| match which {
            Which::Real => is_real(&from[i]),
            Which::Complex => !is_real(&from[i]),
            Which::Any => true,
        })
        .ok_or_else(|| CoreError::value("No zero left to pair with a pole").into())
}

fn single_section(z: &[Complex64], p: &[Complex64]) -> Section {
    let mut sos = [0.0; 6];
    let b = poly(z);
    let a = poly(p);
    sos[3 - b.len()..3].copy_from_slice(&b);
    sos[6 - a.len()..6].copy_from_slice(&a);
    sos
}

/// Second-order sections from zeros, poles and gain, pairing every pole
/// with its nearest zero. Poles closest to the unit circle end up in the
/// last section; the gain goes into the first.
pub fn zpk2sos(zpk: &Zpk) -> Result<Vec<Section>> {
    if zpk.z.is_empty() && zpk.p.is_empty() {
        return Ok(vec![[zpk.k, 0.0, 0.0, 1.0, 0.0, 0.0]]);
    }
    let (mut z, mut p) = (zpk.z.clone(), zpk.p.clone());
    let len = z.len().max(p.len());
    z.resize(len, c(0.0));
    p.resize(len, c(0.0));
    let n_sections = (len + 1) / 2;
    if len % 2 == 1 {
        z.push(c(0.0));
        p.push(c(0.0));
    }
    let mut z = cplxreal(&z)?;
    let mut p = cplxreal(&p)?;

    let mut sos = vec![[0.0; 6]; n_sections];
    for si in (0..n_sections).rev() {
        let p1_idx = idx_worst(&p, 0..p.len())
            .ok_or_else(|| CoreError::value("Ran out of poles while pairing sections"))?;
        let p1 = p.remove(p1_idx);
        let n_real_p = p.iter().filter(|v| is_real(v)).count();
        let n_real_z = z.iter().filter(|v| is_real(v)).count();

        sos[si] = if is_real(&p1) && n_real_p == 0 {
            let z1 = z.remove(nearest(&z, p1, Which::Real)?);
            single_section(&[z1, c(0.0)], &[p1, c(0.0)])
        } else if p.len() + 1 == z.len() && !is_real(&p1) && n_real_p == 1 && n_real_z == 1 {
            let z1 = z.remove(nearest(&z, p1, Which::Complex)?);
            single_section(&[z1, z1.conj()], &[p1, p1.conj()])
        } else {
            let p2 = if is_real(&p1) {
                let real_idx = (0..p.len()).filter(|&i| is_real(&p[i]));
                let p2_idx = idx_worst(&p, real_idx)
                    .ok_or_else(|| CoreError::value("Ran out of poles while pairing sections"))?;
                p.remove(p2_idx)
            } else {
                p1.conj()
            };
            if z.is_empty() {
                single_section(&[], &[p1, p2])
            } else {
                let z1 = z.remove(nearest(&z, p1, Which::Any)?);
                if !is_real(&z1) {
                    single_section(&[z1, z1.conj()], &[p1, p2])
                } else if !z.is_empty() {
                    let z2 = z.remove(nearest(&z, p1, Which::Real)?);
                    single_section(&[z1, z2], &[p1, p2])
                } else {
                    single_section(&[z1], &[p1, p2])
                }
            }
        };
    }
    for v in sos[0][..3].iter_mut() {
        *v *= zpk.k;
    }
    Ok(sos)
}

/// Design a digital filter of the given order. `wn` holds the critical
/// frequencies relative to Nyquist.
pub fn iirfilter(
    order: usize,
    wn: &[f64],
    family: FamilySpec,
    btype: BandType,
    output: IirOutput,
) -> Result<IirSystem> {
    if wn.len() != btype.n_edges() {
        return Err(CoreError::value(format!(
            "A {} filter needs {} critical frequencies, got {}",
            btype,
            btype.n_edges(),
            wn.len()
        ))
        .into());
    }
    if wn.iter().any(|&w| w <= 0.0 || w >= 1.0) {
        return Err(CoreError::value("Digital filter critical frequencies must be 0 < Wn < 1").into());
    }

    let proto = match family {
        FamilySpec::Butterworth => buttap(order),
        FamilySpec::ChebyshevI { rp } => cheb1ap(order, rp),
        FamilySpec::ChebyshevII { rs } => cheb2ap(order, rs),
        FamilySpec::Elliptic { rp, rs } => ellipap(order, rp, rs)?,
        FamilySpec::Bessel => besselap(order),
    };

    let fs = 2.0;
    let warped: Vec<f64> = wn.iter().map(|w| 2.0 * fs * (PI * w / fs).tan()).collect();
    let analog = match btype {
        BandType::Lowpass => lp2lp_zpk(proto, warped[0]),
        BandType::Highpass => lp2hp_zpk(proto, warped[0]),
        BandType::Bandpass | BandType::Bandstop => {
            let bw = warped[1] - warped[0];
            let wo = (warped[0] * warped[1]).sqrt();
            if btype == BandType::Bandpass {
                lp2bp_zpk(proto, wo, bw)
            } else {
                lp2bs_zpk(proto, wo, bw)
            }
        }
    };
    let digital = bilinear_zpk(analog, fs);

    Ok(match output {
        IirOutput::Ba => {
            let (b, a) = zpk2tf(&digital);
            IirSystem::Ba { b, a }
        }
        IirOutput::Sos => IirSystem::Sos(zpk2sos(&digital)?),
    })
}

/// Butterworth shorthand
pub fn butter(order: usize, wn: &[f64], btype: BandType, output: IirOutput) -> Result<IirSystem> {
    iirfilter(order, wn, FamilySpec::Butterworth, btype, output)
}

/// Natural-frequency ratio of the lowpass prototype for the requested
/// band edges (already pre-warped).
fn natural_frequency(passb: &[f64], stopb: &[f64], btype: BandType) -> f64 {
    let nat: Vec<f64> = match btype {
        BandType::Lowpass => vec![stopb[0] / passb[0]],
        BandType::Highpass => vec![passb[0] / stopb[0]],
        BandType::Bandstop => stopb
            .iter()
            .map(|s| s * (passb[0] - passb[1]) / (s * s - passb[0] * passb[1]))
            .collect(),
        BandType::Bandpass => stopb
            .iter()
            .map(|s| (s * s - passb[0] * passb[1]) / (s * (passb[0] - passb[1])))
            .collect(),
    };
    nat.iter().map(|v| v.abs()).fold(f64::INFINITY, f64::min)
}

fn check_band_edges(wp: &[f64], ws: &[f64], btype: BandType) -> Result<()> {
    if wp.len() != btype.n_edges() || ws.len() != wp.len() {
        return Err(CoreError::value(format!(
            "A {} filter needs {} pass and stop edges",
            btype,
            btype.n_edges()
        ))
        .into());
    }
    if wp.iter().chain(ws).any(|&w| w <= 0.0 || w >= 1.0) {
        return Err(CoreError::value("Values for wp, ws must be greater than 0 and less than 1").into());
    }
    let ordered = match btype {
        BandType::Lowpass => wp[0] < ws[0],
        BandType::Highpass => wp[0] > ws[0],
        BandType::Bandpass => ws[0] < wp[0] && wp[1] < ws[1],
        BandType::Bandstop => wp[0] < ws[0] && ws[1] < wp[1],
    };
    if !ordered {
        return Err(CoreError::value(format!(
            "Stop edges {:?} are inconsistent with a {} filter with pass edges {:?}",
            ws, btype, wp
        ))
        .into());
    }
    Ok(())
}

/// Lowest order meeting `gpass` dB ripple in the passband and `gstop` dB
/// attenuation in the stopband, with the matching critical frequencies.
///
/// Band-stop edges are not optimized, which can overestimate the order.
pub fn min_order(
    family: IirFamily,
    wp: &[f64],
    ws: &[f64],
    gpass: f64,
    gstop: f64,
    btype: BandType,
) -> Result<(usize, Vec<f64>)> {
    if gpass <= 0.0 {
        return Err(CoreError::value("gpass should be larger than 0.0").into());
    }
    if gstop <= 0.0 {
        return Err(CoreError::value("gstop should be larger than 0.0").into());
    }
    if gpass > gstop {
        return Err(CoreError::value("gpass should be smaller than gstop").into());
    }
    check_band_edges(wp, ws, btype)?;

    let passb: Vec<f64> = wp.iter().map(|w| (PI * w / 2.0).tan()).collect();
    let stopb: Vec<f64> = ws.iter().map(|w| (PI * w / 2.0).tan()).collect();
    let nat = natural_frequency(&passb, &stopb, btype);
    let g_stop = 10f64.powf(0.1 * gstop);
    let g_pass = 10f64.powf(0.1 * gpass);
    let unwarp = |v: &[f64]| -> Vec<f64> { v.iter().map(|x| 2.0 / PI * x.atan()).collect() };

    let (order, wn) = match family {
        IirFamily::Butterworth => {
            let order = (((g_stop - 1.0) / (g_pass - 1.0)).log10() / (2.0 * nat.log10()))
                .ceil()
                .max(1.0) as usize;
            let w0 = (g_pass - 1.0).powf(-1.0 / (2.0 * order as f64));
            let wn = match btype {
                BandType::Lowpass => vec![w0 * passb[0]],
                BandType::Highpass => vec![passb[0] / w0],
                BandType::Bandstop => {
                    let d = passb[1] - passb[0];
                    let discr = (d * d + 4.0 * w0 * w0 * passb[0] * passb[1]).sqrt();
                    let mut wn = vec![((d + discr) / (2.0 * w0)).abs(), ((d - discr) / (2.0 * w0)).abs()];
                    wn.sort_by(f64::total_cmp);
                    wn
                }
                BandType::Bandpass => {
                    let d = passb[1] - passb[0];
                    let mut wn: Vec<f64> = [-w0, w0]
                        .iter()
                        .map(|w| {
                            (-w * d / 2.0 + (w * w / 4.0 * d * d + passb[0] * passb[1]).sqrt()).abs()
                        })
                        .collect();
                    wn.sort_by(f64::total_cmp);
                    wn
                }
            };
            (order, unwarp(&wn))
        }
        IirFamily::ChebyshevI => {
            let order = cheb_order(g_pass, g_stop, nat);
            (order, unwarp(&passb))
        }
        IirFamily::ChebyshevII => {
            let order = cheb_order(g_pass, g_stop, nat);
            let new_freq = 1.0
                / ((1.0 / order as f64) * ((g_stop - 1.0) / (g_pass - 1.0)).sqrt().acosh()).cosh();
            let nat = match btype {
                BandType::Lowpass => vec![passb[0] / new_freq],
                BandType::Highpass => vec![passb[0] * new_freq],
                BandType::Bandstop => {
                    let n0 = new_freq / 2.0 * (passb[0] - passb[1])
                        + (new_freq * new_freq * (passb[1] - passb[0]).powi(2) / 4.0
                            + passb[1] * passb[0])
                            .sqrt();
                    vec![n0, passb[1] * passb[0] / n0]
                }
                BandType::Bandpass => {
                    let n0 = 1.0 / (2.0 * new_freq) * (passb[0] - passb[1])
                        + ((passb[1] - passb[0]).powi(2) / (4.0 * new_freq * new_freq)
                            + passb[1] * passb[0])
                            .sqrt();
                    vec![n0, passb[0] * passb[1] / n0]
                }
            };
            (order, unwarp(&nat))
        }
        IirFamily::Elliptic => {
            let arg1_sq = (g_pass - 1.0) / (g_stop - 1.0);
            let arg0_sq = (1.0 / nat).powi(2);
            let order = (ellipk(arg0_sq) * ellipkm1(arg1_sq) / (ellipkm1(arg0_sq) * ellipk(arg1_sq)))
                .ceil()
                .max(1.0) as usize;
            (order, unwarp(&passb))
        }
        IirFamily::Bessel => {
            return Err(CoreError::config(
                "Bessel filters have no minimum-order design, 'order' must be given",
            )
            .into())
        }
    };
    Ok((order, wn))
}

fn cheb_order(g_pass: f64, g_stop: f64, nat: f64) -> usize {
    (((g_stop - 1.0) / (g_pass - 1.0)).sqrt().acosh() / nat.acosh())
        .ceil()
        .max(1.0) as usize
}

/// Design (or take) an IIR filter, check its stability and report it.
///
/// `f_pass` and `f_stop` are in Hz; `f_stop` is only used for
/// minimum-order designs. The ringing estimate becomes the padding
/// length unless `padlen` is given.
pub fn construct_iir_filter(
    params: &IirParams,
    f_pass: &[f64],
    f_stop: Option<&[f64]>,
    sfreq: f64,
    btype: BandType,
    phase: Phase,
    reporter: &dyn Reporter,
) -> Result<IirFilter> {
    if phase.is_minimum() {
        return Err(CoreError::invalid_choice(
            "phase",
            &["zero", "zero-double", "forward"],
            &phase.to_string(),
        )
        .into());
    }
    let spec = params.validate()?;
    let nyq = sfreq / 2.0;
    let wp: Vec<f64> = f_pass.iter().map(|f| f / nyq).collect();
    let (pmul, ptype) = if phase.is_zero() {
        (2, "zero-phase (two-pass forward and reverse) non-causal")
    } else {
        (1, "non-linear phase (one-pass forward) causal")
    };
    let order_line = |order: usize| -> String {
        let effective = pmul * order * wp.len();
        if phase.is_zero() {
            format!("- Filter order {} (effective, after forward-backward)", effective)
        } else {
            format!("- Filter order {}", effective)
        }
    };

    let (system, designed) = match spec.design {
        IirDesign::Coefficients(system) => (system, false),
        IirDesign::FixedOrder { family, order } => {
            reporter.info_lines(&[
                String::new(),
                "IIR filter parameters".into(),
                "---------------------".into(),
                format!("{} {} {} filter:", family.family().title(), btype, ptype),
            ]);
            let system = iirfilter(order, &wp, family, btype, spec.output)?;
            reporter.info(&order_line(order));
            (system, true)
        }
        IirDesign::MinimumOrder {
            family,
            gpass,
            gstop,
        } => {
            reporter.info_lines(&[
                String::new(),
                "IIR filter parameters".into(),
                "---------------------".into(),
                format!("{} {} {} filter:", family.title(), btype, ptype),
            ]);
            let f_stop = f_stop.ok_or_else(|| {
                CoreError::config("A stop-band edge is required for a minimum-order design")
            })?;
            let ws: Vec<f64> = f_stop.iter().map(|f| f / nyq).collect();
            let (order, wn) = min_order(family, &wp, &ws, gpass, gstop, btype)?;
            let spec_family = FamilySpec::with_ripple(family, Some(gpass), Some(gstop))?;
            let system = iirfilter(order, &wn, spec_family, btype, spec.output)?;
            reporter.info(&order_line(order));
            (system, true)
        }
    };

    system.check_stability()?;

    if designed {
        let w: Vec<f64> = wp.iter().map(|w| PI * w).collect();
        let gains: Vec<String> = system
            .freqz(&w)
            .iter()
            .map(|h| format!("{:.2}", pmul as f64 * 20.0 * h.norm().log10()))
            .collect();
        let edges: Vec<String> = f_pass.iter().map(|f| format!("{:.2}", f)).collect();
        let plural = if f_pass.len() > 1 { "s" } else { "" };
        reporter.info(&format!(
            "- Cutoff{} at {} Hz: {} dB",
            plural,
            edges.join(", "),
            gains.join(", ")
        ));
    }

    let padlen = match spec.padlen {
        Some(padlen) => padlen,
        None => estimate_ringing_samples(&system, DEFAULT_MAX_TRY, reporter)?,
    };
    Ok(IirFilter { system, padlen })
}
