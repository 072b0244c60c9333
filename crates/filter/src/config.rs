//! Processing settings stored as TOML

use crate::params::{FilterOptions, NotchOptions, ResampleOptions};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A complete preprocessing setup: band edges, line frequencies and the
/// options of each stage.
///
/// ```toml
/// l_freq = 1.0
/// h_freq = 40.0
/// line_freqs = [50.0, 100.0]
///
/// [filter]
/// filter_length = "10s"
/// fir_window = "hann"
///
/// [notch]
/// method = "spectrum_fit"
///
/// [resample]
/// method = "polyphase"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSettings {
    pub l_freq: Option<f64>,
    pub h_freq: Option<f64>,
    pub line_freqs: Option<Vec<f64>>,
    pub filter: FilterOptions,
    pub notch: NotchOptions,
    pub resample: ResampleOptions,
}

impl FilterSettings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded filter settings from {}", path.display());
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save settings to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{FilterLength, Method, Npad, ResampleMethod, TransBandwidth};
    use neurofilt_core::parallel::NJobs;
    use neurofilt_core::window::WindowKind;
    use neurofilt_core::ErrorKind;
    use neurofilt_design::fir::FirWindow;
    use neurofilt_design::iir::IirParams;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_settings() {
        let settings = FilterSettings::from_toml_str(
            r#"
            l_freq = 1.0
            h_freq = 40.0
            line_freqs = [50.0, 100.0]

            [filter]
            filter_length = "500ms"
            h_trans_bandwidth = 5.0
            fir_window = "hann"
            n_jobs = 2

            [notch]
            method = "spectrum_fit"
            p_value = 0.01

            [resample]
            method = "polyphase"
            npad = "auto"
            window = "kaiser:8"
            "#,
        )
        .unwrap();
        assert_eq!(settings.l_freq, Some(1.0));
        assert_eq!(settings.line_freqs, Some(vec![50.0, 100.0]));
        assert_eq!(settings.filter.filter_length, FilterLength::Seconds(0.5));
        assert_eq!(settings.filter.l_trans_bandwidth, TransBandwidth::Auto);
        assert_eq!(settings.filter.h_trans_bandwidth, TransBandwidth::Hz(5.0));
        assert_eq!(settings.filter.fir_window, FirWindow::Hann);
        assert_eq!(settings.filter.n_jobs, NJobs::Threads(2));
        assert_eq!(settings.notch.method, Method::SpectrumFit);
        assert_eq!(settings.notch.p_value, 0.01);
        assert_eq!(settings.resample.method, ResampleMethod::Polyphase);
        assert_eq!(settings.resample.npad, Npad::Auto);
        assert_eq!(settings.resample.window, Some(WindowKind::Kaiser(8.0)));
    }

    #[test]
    fn test_empty_settings_are_defaults() {
        let settings = FilterSettings::from_toml_str("").unwrap();
        assert_eq!(settings, FilterSettings::default());
        assert_eq!(settings.notch.filter_length, Some(FilterLength::Auto));
    }

    #[test]
    fn test_bad_values_are_configuration_errors() {
        let err = FilterSettings::from_toml_str("[filter]\nfilter_length = 2.5\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("filter_length must be an int or str"));

        let err = FilterSettings::from_toml_str("[filter]\nwindow = \"hann\"\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = FilterSettings::from_toml_str("[filter]\nmethod = \"fancy\"\n").unwrap_err();
        assert!(err.to_string().contains("method"));
    }

    #[test]
    fn test_file_round_trip() {
        let settings = FilterSettings {
            l_freq: Some(0.5),
            h_freq: None,
            line_freqs: Some(vec![60.0]),
            filter: FilterOptions::iir(IirParams::butterworth(2).with_output("sos")),
            notch: NotchOptions::spectrum_fit(),
            resample: ResampleOptions::polyphase(),
        };
        let file = NamedTempFile::new().unwrap();
        settings.save_to_file(file.path()).unwrap();
        let loaded = FilterSettings::from_file(file.path()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file() {
        let err = FilterSettings::from_file("/nonexistent/neurofilt.toml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
