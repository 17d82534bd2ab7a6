//! Per-run analysis parameters.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use twombli_core::density::DensityParams;
use twombli_core::FusionParams;

/// Every knob of the per-image pipeline. Field names are camelCase in JSON
/// and every field falls back to its default when absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TwombliParams {
    pub minimum_line_width: u32,
    pub maximum_line_width: u32,
    pub dark_lines: bool,
    pub minimum_branch_length: u32,
    /// Settings file handed to the morphometric analyzer as is.
    pub anamorf_properties_file: Option<PathBuf>,
    pub minimum_curvature_window: u32,
    pub curvature_window_step_size: u32,
    pub maximum_curvature_window: u32,
    #[serde(rename = "maximumDisplayHDM")]
    pub maximum_display_hdm: u32,
    /// Percent of saturated pixels for contrast enhancement.
    pub contrast_saturation: f64,
    pub perform_gap_analysis: bool,
    pub minimum_gap_diameter: u32,
}

impl Default for TwombliParams {
    fn default() -> Self {
        Self {
            minimum_line_width: 5,
            maximum_line_width: 20,
            dark_lines: false,
            minimum_branch_length: 10,
            anamorf_properties_file: None,
            minimum_curvature_window: 40,
            curvature_window_step_size: 10,
            maximum_curvature_window: 40,
            maximum_display_hdm: 200,
            contrast_saturation: 0.35,
            perform_gap_analysis: true,
            minimum_gap_diameter: 0,
        }
    }
}

impl TwombliParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_line_width == 0 {
            return Err(ConfigError::ZeroLineWidth);
        }
        if self.maximum_line_width < self.minimum_line_width {
            return Err(ConfigError::LineWidthRange {
                min: self.minimum_line_width,
                max: self.maximum_line_width,
            });
        }
        if self.curvature_window_step_size == 0 {
            return Err(ConfigError::ZeroCurvatureStep);
        }
        if self.maximum_curvature_window < self.minimum_curvature_window {
            return Err(ConfigError::CurvatureWindowRange {
                min: self.minimum_curvature_window,
                max: self.maximum_curvature_window,
            });
        }
        if self.maximum_display_hdm > u8::MAX as u32 {
            return Err(ConfigError::DisplayRange(self.maximum_display_hdm));
        }
        if !self.contrast_saturation.is_finite()
            || !(0.0..100.0).contains(&self.contrast_saturation)
        {
            return Err(ConfigError::ContrastSaturation(self.contrast_saturation));
        }
        if let Some(path) = &self.anamorf_properties_file {
            if !path.is_file() {
                return Err(ConfigError::MissingPropertiesFile(path.clone()));
            }
        }
        Ok(())
    }

    pub fn fusion_params(&self) -> FusionParams {
        FusionParams {
            minimum_line_width: self.minimum_line_width,
            maximum_line_width: self.maximum_line_width,
            minimum_branch_length: self.minimum_branch_length,
            dark_lines: self.dark_lines,
        }
    }

    pub fn density_params(&self) -> DensityParams {
        DensityParams {
            dark_lines: self.dark_lines,
            maximum_display_value: self.maximum_display_hdm.min(u8::MAX as u32) as u8,
            contrast_saturation: self.contrast_saturation,
        }
    }

    /// Curvature windows of the morphometric passes: the minimum first, then
    /// every step up to and including the maximum.
    pub fn curvature_windows(&self) -> Vec<u32> {
        let step = self.curvature_window_step_size.max(1) as usize;
        (self.minimum_curvature_window..=self.maximum_curvature_window.max(self.minimum_curvature_window))
            .step_by(step)
            .collect()
    }

    pub fn apply_overrides(&mut self, o: &ParamOverrides) {
        if let Some(v) = o.minimum_line_width {
            self.minimum_line_width = v;
        }
        if let Some(v) = o.maximum_line_width {
            self.maximum_line_width = v;
        }
        if let Some(v) = o.dark_lines {
            self.dark_lines = v;
        }
        if let Some(v) = o.minimum_branch_length {
            self.minimum_branch_length = v;
        }
        if let Some(v) = &o.anamorf_properties_file {
            self.anamorf_properties_file = Some(v.clone());
        }
        if let Some(v) = o.minimum_curvature_window {
            self.minimum_curvature_window = v;
        }
        if let Some(v) = o.curvature_window_step_size {
            self.curvature_window_step_size = v;
        }
        if let Some(v) = o.maximum_curvature_window {
            self.maximum_curvature_window = v;
        }
        if let Some(v) = o.maximum_display_hdm {
            self.maximum_display_hdm = v;
        }
        if let Some(v) = o.contrast_saturation {
            self.contrast_saturation = v;
        }
        if let Some(v) = o.perform_gap_analysis {
            self.perform_gap_analysis = v;
        }
        if let Some(v) = o.minimum_gap_diameter {
            self.minimum_gap_diameter = v;
        }
    }
}

/// Field-by-field overrides, typically from command-line flags.
#[derive(Clone, Debug, Default)]
pub struct ParamOverrides {
    pub minimum_line_width: Option<u32>,
    pub maximum_line_width: Option<u32>,
    pub dark_lines: Option<bool>,
    pub minimum_branch_length: Option<u32>,
    pub anamorf_properties_file: Option<PathBuf>,
    pub minimum_curvature_window: Option<u32>,
    pub curvature_window_step_size: Option<u32>,
    pub maximum_curvature_window: Option<u32>,
    pub maximum_display_hdm: Option<u32>,
    pub contrast_saturation: Option<f64>,
    pub perform_gap_analysis: Option<bool>,
    pub minimum_gap_diameter: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let p = TwombliParams::default();
        assert_eq!((p.minimum_line_width, p.maximum_line_width), (5, 20));
        assert_eq!(p.minimum_branch_length, 10);
        assert_eq!(p.curvature_windows(), vec![40]);
        assert_eq!(p.maximum_display_hdm, 200);
        assert_eq!(p.contrast_saturation, 0.35);
        assert!(p.perform_gap_analysis);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let p: TwombliParams = serde_json::from_str(
            r#"{ "minimumLineWidth": 3, "darkLines": true, "maximumDisplayHDM": 180 }"#,
        )
        .unwrap();
        assert_eq!(p.minimum_line_width, 3);
        assert_eq!(p.maximum_line_width, 20);
        assert!(p.dark_lines);
        assert_eq!(p.maximum_display_hdm, 180);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let p = TwombliParams {
            minimum_line_width: 8,
            maximum_line_width: 4,
            ..TwombliParams::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ConfigError::LineWidthRange { min: 8, max: 4 })
        ));

        let p = TwombliParams {
            minimum_line_width: 0,
            ..TwombliParams::default()
        };
        assert!(matches!(p.validate(), Err(ConfigError::ZeroLineWidth)));

        let p = TwombliParams {
            contrast_saturation: f64::NAN,
            ..TwombliParams::default()
        };
        assert!(matches!(p.validate(), Err(ConfigError::ContrastSaturation(_))));

        let p = TwombliParams {
            anamorf_properties_file: Some("/definitely/not/here.xml".into()),
            ..TwombliParams::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ConfigError::MissingPropertiesFile(_))
        ));
    }

    #[test]
    fn curvature_windows_step_to_maximum() {
        let p = TwombliParams {
            minimum_curvature_window: 20,
            curvature_window_step_size: 15,
            maximum_curvature_window: 60,
            ..TwombliParams::default()
        };
        assert_eq!(p.curvature_windows(), vec![20, 35, 50]);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut p = TwombliParams::default();
        p.apply_overrides(&ParamOverrides {
            maximum_line_width: Some(12),
            perform_gap_analysis: Some(false),
            ..ParamOverrides::default()
        });
        assert_eq!(p.minimum_line_width, 5);
        assert_eq!(p.maximum_line_width, 12);
        assert!(!p.perform_gap_analysis);
        assert!(!p.dark_lines);
    }

    #[test]
    fn boolean_overrides_work_in_both_directions() {
        let mut p: TwombliParams =
            serde_json::from_str(r#"{ "darkLines": true, "performGapAnalysis": false }"#).unwrap();
        p.apply_overrides(&ParamOverrides::default());
        assert!(p.dark_lines);
        assert!(!p.perform_gap_analysis);

        p.apply_overrides(&ParamOverrides {
            dark_lines: Some(false),
            perform_gap_analysis: Some(true),
            ..ParamOverrides::default()
        });
        assert!(!p.dark_lines);
        assert!(p.perform_gap_analysis);
    }
}
