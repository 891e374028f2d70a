use crate::{config::FeatureConfig, error::ScoringError, types::RawLineItem};
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 8;

/// Column order of [`FeatureVector::to_array`]; model artifacts are validated against it.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "hours",
    "rate",
    "line_total",
    "rate_ratio",
    "hours_roundness",
    "log_amount",
    "keyword_flag",
    "round_hours_flag",
];

/// Which numeric inputs were absent, and which were filled in by derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMask {
    pub hours: bool,
    pub rate: bool,
    pub line_total: bool,
}

impl FieldMask {
    pub fn all(&self) -> bool {
        self.hours && self.rate && self.line_total
    }

    pub fn any(&self) -> bool {
        self.hours || self.rate || self.line_total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub hours: f64,
    pub rate: f64,
    pub line_total: f64,
    pub rate_ratio: f64,
    pub hours_roundness: f64,
    pub log_amount: f64,
    pub keyword_flag: bool,
    pub round_hours_flag: bool,
    pub matched_keywords: Vec<String>,
    /// Inputs absent after derivation; their numeric slots hold 0.
    pub missing: FieldMask,
    pub derived: FieldMask,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.hours,
            self.rate,
            self.line_total,
            self.rate_ratio,
            self.hours_roundness,
            self.log_amount,
            flag(self.keyword_flag),
            flag(self.round_hours_flag),
        ]
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        let idx = feature_index(name)?;
        Some(self.to_array()[idx])
    }

    /// True when hours, rate and line total were all absent.
    pub fn insufficient_data(&self) -> bool {
        self.missing.all()
    }

    pub fn has_rate(&self) -> bool {
        !self.missing.rate
    }

    pub fn has_line_total(&self) -> bool {
        !self.missing.line_total
    }

    /// Whether column `index` of [`to_array`](Self::to_array) is a placeholder for an absent input.
    /// The keyword and round-hours flags are always real values.
    pub fn column_missing(&self, index: usize) -> bool {
        match FEATURE_NAMES.get(index).copied() {
            Some("hours") | Some("hours_roundness") => self.missing.hours,
            Some("rate") | Some("rate_ratio") => self.missing.rate,
            Some("line_total") | Some("log_amount") => self.missing.line_total,
            _ => false,
        }
    }
}

pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| *n == name)
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Rows of one extraction call, index-aligned with the input lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureVector>,
}

impl FeatureTable {
    pub fn from_rows(rows: Vec<FeatureVector>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureVector> {
        self.rows.iter()
    }

    /// Every numeric cell must be finite.
    pub fn validate(&self) -> Result<(), ScoringError> {
        for (index, row) in self.rows.iter().enumerate() {
            for (feature, value) in FEATURE_NAMES.iter().zip(row.to_array()) {
                if !value.is_finite() {
                    return Err(ScoringError::MalformedFeature {
                        index,
                        feature: *feature,
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

pub struct FeatureExtractor {
    config: FeatureConfig,
    keywords: Vec<String>,
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig) -> Self {
        let keywords = config
            .suspicious_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            config: config.clone(),
            keywords,
        }
    }

    pub fn extract(&self, lines: &[RawLineItem]) -> FeatureTable {
        FeatureTable::from_rows(lines.iter().map(|line| self.extract_line(line)).collect())
    }

    pub fn extract_line(&self, line: &RawLineItem) -> FeatureVector {
        let hours = sanitize(line.hours);
        let mut rate = sanitize(line.rate);
        let mut line_total = sanitize(line.line_total);
        let mut derived = FieldMask::default();

        if line_total.is_none() {
            if let (Some(h), Some(r)) = (hours, rate) {
                line_total = sanitize(Some(h * r));
                derived.line_total = line_total.is_some();
            }
        }

        if rate.is_none() {
            if let (Some(h), Some(t)) = (hours, line_total) {
                if h > 0.0 {
                    rate = sanitize(Some(t / h));
                    derived.rate = rate.is_some();
                }
            }
        }

        let missing = FieldMask {
            hours: hours.is_none(),
            rate: rate.is_none(),
            line_total: line_total.is_none(),
        };

        let hours_v = hours.unwrap_or(0.0);
        let rate_v = rate.unwrap_or(0.0);
        let total_v = line_total.unwrap_or(0.0);

        let rate_ratio = if self.config.benchmark_rate > 0.0 {
            rate_v / self.config.benchmark_rate
        } else {
            0.0
        };

        let round_hours_flag = hours
            .map(|h| is_whole(h) && h >= self.config.round_hours_threshold)
            .unwrap_or(false);

        let matched_keywords = self.match_keywords(line.description.as_deref().unwrap_or(""));

        FeatureVector {
            hours: hours_v,
            rate: rate_v,
            line_total: total_v,
            rate_ratio,
            hours_roundness: hours.map(roundness).unwrap_or(0.0),
            log_amount: total_v.ln_1p(),
            keyword_flag: !matched_keywords.is_empty(),
            round_hours_flag,
            matched_keywords,
            missing,
            derived,
        }
    }

    fn match_keywords(&self, description: &str) -> Vec<String> {
        if description.is_empty() {
            return Vec::new();
        }
        let lowered = description.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .cloned()
            .collect()
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

/// Negative and non-finite values carry no information and count as absent.
fn sanitize(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn is_whole(v: f64) -> bool {
    v.fract() == 0.0
}

/// 1.0 for whole hours, 0.5 for half hours, 0.0 otherwise.
fn roundness(hours: f64) -> f64 {
    if hours <= 0.0 {
        0.0
    } else if is_whole(hours) {
        1.0
    } else if is_whole(hours * 2.0) {
        0.5
    } else {
        0.0
    }
}
