//! Reporting sink for filter parameters and precision warnings
//!
//! Every operation that produces human-readable output takes a
//! `&dyn Reporter`. The default [`TracingReporter`] forwards to `tracing`;
//! [`MemoryReporter`] records lines so callers can inspect them.

use std::fmt;
use std::sync::Mutex;

/// Non-fatal numerical caveats. These never abort an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PrecisionWarning {
    /// The impulse response did not decay within the simulation budget.
    RingingNotResolved { max_try: usize },
    /// Stop-band attenuation below the design threshold.
    LowAttenuation { freq: f64, attenuation_db: f64 },
    /// The FIR filter is longer than the data it is applied to.
    FilterLongerThanSignal {
        filter_length: usize,
        signal_length: usize,
    },
    /// Nothing to resample along the requested axis.
    EmptySignal,
}

impl fmt::Display for PrecisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingingNotResolved { .. } => {
                write!(f, "Could not properly estimate number of samples for filter")
            }
            Self::LowAttenuation {
                freq,
                attenuation_db,
            } => write!(
                f,
                "Attenuation at stop frequency {:.2} Hz is only {:.2} dB. \
                 Increase filter_length for higher attenuation.",
                freq, attenuation_db
            ),
            Self::FilterLongerThanSignal {
                filter_length,
                signal_length,
            } => write!(
                f,
                "filter_length ({}) is longer than the signal ({}), distortion is likely. \
                 Reduce filter length or filter a longer signal.",
                filter_length, signal_length
            ),
            Self::EmptySignal => write!(f, "Signal has zero samples along the requested axis"),
        }
    }
}

/// Severity of a recorded line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
}

/// Logging collaborator
pub trait Reporter: Send + Sync {
    fn info(&self, line: &str);

    fn debug(&self, line: &str);

    fn warn(&self, warning: &PrecisionWarning);

    /// Emit several lines at info level.
    fn info_lines(&self, lines: &[String]) {
        for line in lines {
            self.info(line);
        }
    }
}

/// Forwards everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&self, line: &str) {
        tracing::info!("{}", line);
    }

    fn debug(&self, line: &str) {
        tracing::debug!("{}", line);
    }

    fn warn(&self, warning: &PrecisionWarning) {
        tracing::warn!("{}", warning);
    }
}

/// Records everything it is given.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<(Level, String)>>,
    warnings: Mutex<Vec<PrecisionWarning>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded lines at the given level or above, newline-joined.
    pub fn text(&self, min_level: Level) -> String {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines
            .iter()
            .filter(|(level, _)| match min_level {
                Level::Debug => true,
                Level::Info => *level != Level::Debug,
                Level::Warn => *level == Level::Warn,
            })
            .map(|(_, line)| line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Info and warning text, the way a user would see it at default verbosity.
    pub fn info_text(&self) -> String {
        self.text(Level::Info)
    }

    pub fn warnings(&self) -> Vec<PrecisionWarning> {
        self.warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn push(&self, level: Level, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((level, line));
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, line: &str) {
        self.push(Level::Info, line.to_string());
    }

    fn debug(&self, line: &str) {
        self.push(Level::Debug, line.to_string());
    }

    fn warn(&self, warning: &PrecisionWarning) {
        self.push(Level::Warn, warning.to_string());
        self.warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(warning.clone());
    }
}
