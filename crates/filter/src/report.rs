//! Human-readable filter descriptions

use crate::create::Band;
use neurofilt_core::overlap::Phase;
use neurofilt_design::fir::{FirDesign, FirWindow};

/// Format like C's `%.{precision}g`: `precision` significant digits,
/// trailing zeros dropped, scientific notation for very large or small
/// magnitudes.
pub fn format_g(x: f64, precision: usize) -> String {
    if x == 0.0 {
        return "0".into();
    }
    if !x.is_finite() {
        return x.to_string();
    }
    let p = precision.max(1);
    let sci = format!("{:.*e}", p - 1, x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= p as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{:.*}", decimals, x))
    }
}

fn strip_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

fn join_fixed(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:.2}", v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The first line of every filter set-up
pub(crate) fn setup_line(band: &Band) -> Option<String> {
    match band {
        Band::AllPass => None,
        Band::Lowpass(h) => Some(format!("Setting up low-pass filter at {} Hz", format_g(*h, 2))),
        Band::Highpass(l) => Some(format!("Setting up high-pass filter at {} Hz", format_g(*l, 2))),
        Band::Bandpass(l, h) => Some(format!(
            "Setting up band-pass filter from {} - {} Hz",
            format_g(*l, 2),
            format_g(*h, 2)
        )),
        Band::Bandstop(stops) => match stops.as_slice() {
            [(lo, hi)] => Some(format!(
                "Setting up band-stop filter from {} - {} Hz",
                format_g(*lo, 2),
                format_g(*hi, 2)
            )),
            _ => Some("Setting up band-stop filter".into()),
        },
    }
}

/// One side of the pass band as it appears in the report
pub(crate) struct EdgeReport {
    pub pass: Vec<f64>,
    pub trans: Vec<f64>,
    /// Half-amplitude frequencies, only known for single zero-phase bands
    pub cutoff: Option<Vec<f64>>,
}

/// Description of a windowed FIR design
pub(crate) struct FirReport<'a> {
    pub band: &'a Band,
    pub phase: Phase,
    pub window: FirWindow,
    pub design: FirDesign,
    pub lower: Option<EdgeReport>,
    pub upper: Option<EdgeReport>,
    pub length: usize,
    pub sfreq: f64,
}

impl FirReport<'_> {
    pub fn lines(&self) -> Vec<String> {
        let (passes, kind, causal) = match self.phase {
            Phase::Zero => ("one-pass", "zero-phase", "non-causal"),
            Phase::ZeroDouble => ("two-pass forward and reverse", "zero-phase", "non-causal"),
            Phase::Forward => ("one-pass", "linear phase", "causal"),
            Phase::Minimum | Phase::MinimumHalf => ("one-pass", "non-linear phase", "causal"),
        };
        let mut lines = vec![
            String::new(),
            "FIR filter parameters".to_string(),
            "---------------------".to_string(),
            format!(
                "Designing a {}, {}, {} {} filter:",
                passes,
                kind,
                causal,
                self.band.kind()
            ),
        ];
        lines.push(match self.design {
            FirDesign::Firwin => "- Windowed time-domain design (firwin) method".to_string(),
            FirDesign::Firwin2 => "- Windowed frequency-domain design (firwin2) method".to_string(),
        });
        lines.push(match self.design {
            FirDesign::Firwin => format!(
                "- {} window with {:.4} passband ripple and {} dB stopband attenuation",
                self.window.title(),
                self.window.ripple(),
                self.window.attenuation_db()
            ),
            FirDesign::Firwin2 => format!("- {} window", self.window.title()),
        });

        let db = if self.phase == Phase::ZeroDouble { "-12 dB" } else { "-6 dB" };
        for (name, edge) in [("Lower", &self.lower), ("Upper", &self.upper)] {
            let Some(edge) = edge else { continue };
            lines.push(format!("- {} passband edge: {} Hz", name, join_fixed(&edge.pass)));
            let mut trans = format!(
                "- {} transition bandwidth: {} Hz",
                name,
                join_fixed(&edge.trans)
            );
            if let Some(cutoff) = &edge.cutoff {
                trans.push_str(&format!(
                    " ({} cutoff frequency: {} Hz)",
                    db,
                    join_fixed(cutoff)
                ));
            }
            lines.push(trans);
        }
        lines.push(format!(
            "- Filter length: {} samples ({:.3} s)",
            self.length,
            self.length as f64 / self.sfreq
        ));
        lines.push(String::new());
        lines
    }
}
