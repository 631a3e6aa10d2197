use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// The four pathology classes the classifier distinguishes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClassLabel {
    Covid,
    ViralPneumonia,
    LungOpacity,
    Normal,
}

impl ClassLabel {
    pub fn all() -> Vec<ClassLabel> {
        ClassLabel::iter().collect()
    }

    /// `VIRAL_PNEUMONIA` style, as reported in `dominant_class`.
    pub fn upper(&self) -> String {
        self.as_ref().to_uppercase()
    }

    /// `Viral Pneumonia` style, for human-facing documents.
    pub fn title(&self) -> String {
        self.as_ref()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Serde adapter writing a label in its uppercase form.
pub mod upper_label {
    use super::ClassLabel;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(label: &ClassLabel, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&label.upper())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ClassLabel, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ClassLabel::from_str(&raw.to_lowercase()).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub glcm_value: f64,
    pub opacity_level: f64,
    pub lobe_pixel_dist: f64,
}

impl FeatureVector {
    pub fn named(&self) -> [(&'static str, f64); 3] {
        [
            ("glcm_value", self.glcm_value),
            ("opacity_level", self.opacity_level),
            ("lobe_pixel_dist", self.lobe_pixel_dist),
        ]
    }
}

/// Allowed drift of the probability sum from 1.0, for clients that round.
pub const PROBABILITY_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResultValidationError {
    #[error("file_name must not be empty")]
    EmptyFileName,
    #[error("probability for {label} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { label: ClassLabel, value: f64 },
    #[error("probabilities must sum to 1, got {0}")]
    ProbabilitySum(f64),
    #[error("dominant_class {stated} is not the most likely class ({expected})")]
    DominantMismatch { stated: ClassLabel, expected: ClassLabel },
    #[error("feature {name} must be within [0, 1], got {value}")]
    FeatureOutOfRange { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub file_name: String,
    pub model: String,
    pub probabilities: BTreeMap<ClassLabel, f64>,
    pub features: FeatureVector,
    #[serde(with = "upper_label")]
    pub dominant_class: ClassLabel,
}

impl ClassificationResult {
    pub fn probability(&self, label: ClassLabel) -> f64 {
        self.probabilities.get(&label).copied().unwrap_or(0.0)
    }

    /// Probabilities ordered from most to least likely.
    pub fn ranked(&self) -> Vec<(ClassLabel, f64)> {
        let mut ranked: Vec<(ClassLabel, f64)> =
            self.probabilities.iter().map(|(l, p)| (*l, *p)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Checks a result received from a client: probabilities form a
    /// distribution, `dominant_class` is a most likely class, and features
    /// lie in the unit interval. Missing classes count as 0.
    pub fn validate(&self) -> Result<(), ResultValidationError> {
        if self.file_name.trim().is_empty() {
            return Err(ResultValidationError::EmptyFileName);
        }
        for (label, value) in &self.probabilities {
            if !(0.0..=1.0).contains(value) {
                return Err(ResultValidationError::ProbabilityOutOfRange {
                    label: *label,
                    value: *value,
                });
            }
        }
        let total: f64 = self.probabilities.values().sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ResultValidationError::ProbabilitySum(total));
        }
        if let Some((expected, best)) = self.ranked().first().copied() {
            if self.probability(self.dominant_class) < best {
                return Err(ResultValidationError::DominantMismatch {
                    stated: self.dominant_class,
                    expected,
                });
            }
        }
        for (name, value) in self.features.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ResultValidationError::FeatureOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub status: String,
    pub file: String,
    pub model: String,
    pub probabilities: BTreeMap<ClassLabel, f64>,
    pub features: FeatureVector,
    #[serde(with = "upper_label")]
    pub dominant_class: ClassLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_xray_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_mask_url: Option<String>,
}

impl From<ClassificationResult> for ClassifyResponse {
    fn from(result: ClassificationResult) -> Self {
        Self {
            status: "classified".into(),
            file: result.file_name,
            model: result.model,
            probabilities: result.probabilities,
            features: result.features,
            dominant_class: result.dominant_class,
            temp_xray_url: None,
            temp_mask_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_images: usize,
    pub analyzed_count: usize,
    pub unanalyzed_count: usize,
    pub class_counts: BTreeMap<ClassLabel, usize>,
}
