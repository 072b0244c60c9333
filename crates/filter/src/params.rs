//! Typed filtering parameters
//!
//! Every option that arrives as a loose string or number in a settings
//! file is parsed into a closed enumeration here, so the filtering code
//! only ever sees valid values.

use neurofilt_core::overlap::Phase;
use neurofilt_core::pad::PadMode;
use neurofilt_core::parallel::NJobs;
use neurofilt_core::param::ParamValue;
use neurofilt_core::window::WindowKind;
use neurofilt_core::{CoreError, Result};
use neurofilt_design::fir::{FirDesign, FirWindow};
use neurofilt_design::iir::IirParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of an FIR filter or of a spectrum-fit window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "ParamValue", into = "ParamValue")]
pub enum FilterLength {
    /// Derived from the narrowest transition band
    #[default]
    Auto,
    /// An exact number of samples
    Samples(usize),
    /// A duration, converted with the sampling rate
    Seconds(f64),
}

impl FilterLength {
    /// Number of samples for a duration at `sfreq`, at least one.
    /// `None` for [`FilterLength::Auto`].
    pub fn to_samples(&self, sfreq: f64) -> Option<usize> {
        match *self {
            Self::Auto => None,
            Self::Samples(n) => Some(n),
            Self::Seconds(s) => Some(((s * sfreq).ceil() as usize).max(1)),
        }
    }
}

fn duration_error(s: &str) -> CoreError {
    CoreError::value(format!(
        "filter_length, if a string, must be a human-readable time, e.g. \"10s\", or \"auto\", not \"{}\"",
        s
    ))
}

impl FromStr for FilterLength {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "auto" {
            return Ok(Self::Auto);
        }
        let (number, mult) = if let Some(n) = lower.strip_suffix("ms") {
            (n, 1e-3)
        } else if let Some(n) = lower.strip_suffix('s') {
            (n, 1.0)
        } else {
            return Err(duration_error(s));
        };
        let value: f64 = number.trim().parse().map_err(|_| duration_error(s))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(CoreError::value(format!(
                "filter_length must be positive, got \"{}\"",
                s
            )));
        }
        Ok(Self::Seconds(value * mult))
    }
}

impl TryFrom<ParamValue> for FilterLength {
    type Error = CoreError;

    fn try_from(value: ParamValue) -> Result<Self> {
        match value {
            ParamValue::Int(n) if n >= 1 => Ok(Self::Samples(n as usize)),
            ParamValue::Int(n) => Err(CoreError::value(format!(
                "filter_length must be positive, got {}",
                n
            ))),
            ParamValue::Str(s) => s.parse(),
            other => Err(CoreError::type_error(format!(
                "filter_length must be an int or str, got {} ({})",
                other.type_name(),
                other
            ))),
        }
    }
}

impl From<FilterLength> for ParamValue {
    fn from(length: FilterLength) -> Self {
        match length {
            FilterLength::Samples(n) => ParamValue::Int(n as i64),
            other => ParamValue::Str(other.to_string()),
        }
    }
}

impl fmt::Display for FilterLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Samples(n) => write!(f, "{}", n),
            Self::Seconds(s) => write!(f, "{}s", s),
        }
    }
}

/// Width of a transition band in Hz
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "ParamValue", into = "ParamValue")]
pub enum TransBandwidth {
    /// A quarter of the edge frequency, at least 2 Hz, clipped to the
    /// available room below the edge or above it up to Nyquist
    #[default]
    Auto,
    Hz(f64),
}

impl TransBandwidth {
    pub(crate) fn resolve(&self, auto: impl FnOnce() -> f64) -> f64 {
        match *self {
            Self::Auto => auto(),
            Self::Hz(hz) => hz,
        }
    }
}

impl FromStr for TransBandwidth {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.trim().parse::<f64>().map(Self::Hz).map_err(|_| {
            CoreError::value(format!(
                "trans_bandwidth must be \"auto\" if string, got \"{}\"",
                s
            ))
        })
    }
}

impl TryFrom<ParamValue> for TransBandwidth {
    type Error = CoreError;

    fn try_from(value: ParamValue) -> Result<Self> {
        match value {
            ParamValue::Int(n) => Ok(Self::Hz(n as f64)),
            ParamValue::Float(hz) => Ok(Self::Hz(hz)),
            ParamValue::Str(s) => s.parse(),
            ParamValue::Bool(b) => Err(CoreError::type_error(format!(
                "trans_bandwidth must be a number or \"auto\", got bool ({})",
                b
            ))),
        }
    }
}

impl From<TransBandwidth> for ParamValue {
    fn from(tb: TransBandwidth) -> Self {
        match tb {
            TransBandwidth::Auto => ParamValue::Str("auto".into()),
            TransBandwidth::Hz(hz) => ParamValue::Float(hz),
        }
    }
}

/// Filtering method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    /// Overlap-add FFT convolution with a windowed design
    #[default]
    Fir,
    /// Recursive filtering
    Iir,
    /// Sinusoid regression, line-noise removal only
    SpectrumFit,
}

const METHOD_NAMES: &[&str] = &["fir", "iir", "spectrum_fit"];

impl FromStr for Method {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fir" | "fft" => Ok(Self::Fir),
            "iir" => Ok(Self::Iir),
            "spectrum_fit" => Ok(Self::SpectrumFit),
            _ => Err(CoreError::invalid_choice("method", METHOD_NAMES, s)),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.to_string()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fir => "fir",
            Self::Iir => "iir",
            Self::SpectrumFit => "spectrum_fit",
        };
        f.write_str(name)
    }
}

/// Options for [`crate::create_filter`] and [`crate::filter_data`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterOptions {
    pub filter_length: FilterLength,
    pub l_trans_bandwidth: TransBandwidth,
    pub h_trans_bandwidth: TransBandwidth,
    pub method: Method,
    pub phase: Phase,
    pub fir_window: FirWindow,
    pub fir_design: FirDesign,
    pub pad: PadMode,
    pub n_jobs: NJobs,
    /// Channel rows to filter, all when `None`
    #[serde(skip)]
    pub picks: Option<Vec<usize>>,
    /// Only valid with [`Method::Iir`]; empty parameters design a
    /// 4th-order Butterworth
    pub iir_params: Option<IirParams>,
}

impl FilterOptions {
    /// Recursive filtering with the given design
    pub fn iir(params: IirParams) -> Self {
        Self {
            method: Method::Iir,
            iir_params: Some(params),
            ..Default::default()
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: NJobs) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_picks(mut self, picks: &[usize]) -> Self {
        self.picks = Some(picks.to_vec());
        self
    }
}

/// Options for [`crate::notch_filter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotchOptions {
    /// FIR length, or the spectrum-fit window (`None` fits the whole
    /// signal at once, `auto` uses 10 s windows)
    pub filter_length: Option<FilterLength>,
    /// Stop-band width per frequency, or one width for all. Defaults to
    /// `freq / 200`.
    pub notch_widths: Option<Vec<f64>>,
    pub trans_bandwidth: f64,
    pub method: Method,
    /// Family-wise false-positive rate of line detection
    pub p_value: f64,
    pub phase: Phase,
    pub fir_window: FirWindow,
    pub fir_design: FirDesign,
    pub pad: PadMode,
    pub n_jobs: NJobs,
    #[serde(skip)]
    pub picks: Option<Vec<usize>>,
    pub iir_params: Option<IirParams>,
}

impl Default for NotchOptions {
    fn default() -> Self {
        Self {
            filter_length: Some(FilterLength::Auto),
            notch_widths: None,
            trans_bandwidth: 1.0,
            method: Method::Fir,
            p_value: 0.05,
            phase: Phase::Zero,
            fir_window: FirWindow::Hamming,
            fir_design: FirDesign::Firwin,
            pad: PadMode::ReflectLimited,
            n_jobs: NJobs::Serial,
            picks: None,
            iir_params: None,
        }
    }
}

impl NotchOptions {
    pub fn spectrum_fit() -> Self {
        Self {
            method: Method::SpectrumFit,
            ..Default::default()
        }
    }

    /// The band-stop options equivalent to this notch
    pub(crate) fn band_stop_options(&self) -> FilterOptions {
        let half = TransBandwidth::Hz(self.trans_bandwidth / 2.0);
        FilterOptions {
            filter_length: self.filter_length.unwrap_or_default(),
            l_trans_bandwidth: half,
            h_trans_bandwidth: half,
            method: self.method,
            phase: self.phase,
            fir_window: self.fir_window,
            fir_design: self.fir_design,
            pad: self.pad,
            n_jobs: self.n_jobs,
            picks: self.picks.clone(),
            iir_params: self.iir_params.clone(),
        }
    }
}

/// Resampling algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResampleMethod {
    /// Spectrum truncation or zero-extension
    #[default]
    Fft,
    /// Windowed-sinc interpolation evaluated at the kept samples only
    Polyphase,
}

impl FromStr for ResampleMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fft" => Ok(Self::Fft),
            "polyphase" => Ok(Self::Polyphase),
            _ => Err(CoreError::invalid_choice("method", &["fft", "polyphase"], s)),
        }
    }
}

impl TryFrom<String> for ResampleMethod {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResampleMethod> for String {
    fn from(method: ResampleMethod) -> Self {
        method.to_string()
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fft => write!(f, "fft"),
            Self::Polyphase => write!(f, "polyphase"),
        }
    }
}

/// Padding added before FFT resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ParamValue", into = "ParamValue")]
pub enum Npad {
    /// Pad up to the next power of two
    Auto,
    /// This many samples on each side
    Samples(usize),
}

impl Default for Npad {
    fn default() -> Self {
        Self::Samples(100)
    }
}

impl TryFrom<ParamValue> for Npad {
    type Error = CoreError;

    fn try_from(value: ParamValue) -> Result<Self> {
        match value {
            ParamValue::Int(n) if n >= 0 => Ok(Self::Samples(n as usize)),
            ParamValue::Int(n) => Err(CoreError::value(format!(
                "npad must be non-negative, got {}",
                n
            ))),
            ParamValue::Str(s) if s == "auto" => Ok(Self::Auto),
            ParamValue::Str(s) => Err(CoreError::value(format!(
                "npad must be \"auto\" if string, got \"{}\"",
                s
            ))),
            other => Err(CoreError::type_error(format!(
                "npad must be an int or \"auto\", got {} ({})",
                other.type_name(),
                other
            ))),
        }
    }
}

impl From<Npad> for ParamValue {
    fn from(npad: Npad) -> Self {
        match npad {
            Npad::Auto => ParamValue::Str("auto".into()),
            Npad::Samples(n) => ParamValue::Int(n as i64),
        }
    }
}

/// Options for [`crate::resample`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResampleOptions {
    /// Axis to resample, negative values count from the end
    pub axis: isize,
    pub npad: Npad,
    /// Spectral window for `fft` (boxcar when unset), interpolation window
    /// for `polyphase` (Kaiser with beta 5 when unset)
    pub window: Option<WindowKind>,
    /// Edge extension, `reflect_limited` for `fft` and `reflect` for
    /// `polyphase` when unset
    pub pad: Option<PadMode>,
    pub method: ResampleMethod,
    pub n_jobs: NJobs,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            axis: -1,
            npad: Npad::default(),
            window: None,
            pad: None,
            method: ResampleMethod::Fft,
            n_jobs: NJobs::Serial,
        }
    }
}

impl ResampleOptions {
    pub fn polyphase() -> Self {
        Self {
            method: ResampleMethod::Polyphase,
            ..Default::default()
        }
    }
}
