//! Data model for raw category records and curated assets.

use crate::filter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Year substituted when no acquisition year can be extracted from a record.
pub const DEFAULT_YEAR: u32 = 2020;

/// Birth year assumed for subjects without a preset profile.
pub const DEFAULT_BIRTH_YEAR: u32 = 1950;

/// Source label recorded on every curated asset.
pub const SOURCE_LABEL: &str = "Wikimedia Commons";

static TITLE_SANITIZER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("invalid title sanitizer regex"));

const TITLE_STEM_LIMIT: usize = 40;

/// A raw media record as returned by the category metadata API.
/// Immutable once fetched; discarded after filtering and bucketing.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub title: String,
    pub page_id: u64,
    pub url: String,
    pub thumb_url: Option<String>,
    pub width: u32,
    pub height: u32,
    pub thumb_width: Option<u32>,
    pub thumb_height: Option<u32>,
    pub timestamp: Option<String>,
    /// Free-form license/attribution metadata, key to text value.
    pub metadata: HashMap<String, String>,
}

impl ImageRecord {
    /// URL to download: the pre-scaled thumbnail when the API provided one.
    pub fn download_url(&self) -> &str {
        self.thumb_url.as_deref().unwrap_or(&self.url)
    }

    /// Pixel dimensions of the variant that `download_url` points at.
    pub fn download_dimensions(&self) -> (u32, u32) {
        match (self.thumb_url.as_ref(), self.thumb_width, self.thumb_height) {
            (Some(_), Some(width), Some(height)) => (width, height),
            _ => (self.width, self.height),
        }
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Age bracket of the subject at acquisition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeBracket {
    Young,
    Middle,
    Old,
    Unknown,
}

impl std::fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Young => "young",
            Self::Middle => "middle",
            Self::Old => "old",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Quality tier estimated from pixel area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{}", label)
    }
}

/// A curated image with assembled metadata, appended to the run log once its
/// candidate passes validation. Never deleted, only filtered before persisting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratedAsset {
    pub url: String,
    pub filename: String,
    pub subject: String,
    pub year: Option<u32>,
    pub age_bracket: AgeBracket,
    pub source: String,
    pub license: String,
    pub title: String,
    pub context: String,
    pub quality: QualityTier,
    pub width: u32,
    pub height: u32,
    pub is_negative: bool,
}

impl CuratedAsset {
    /// Assembles asset metadata from a raw record. `year` is the extracted
    /// acquisition year when one was found; the default year stands in for
    /// the filename and age bracket otherwise.
    pub fn from_record(
        record: &ImageRecord,
        subject: &str,
        birth_year: u32,
        year: Option<u32>,
        is_negative: bool,
    ) -> Self {
        let (width, height) = record.download_dimensions();
        let effective_year = year.unwrap_or(DEFAULT_YEAR);
        Self {
            url: record.download_url().to_owned(),
            filename: asset_filename(subject, effective_year, &record.title),
            subject: subject.to_owned(),
            year,
            age_bracket: filter::age_bracket(effective_year, birth_year),
            source: SOURCE_LABEL.to_owned(),
            license: record
                .metadata_value("LicenseShortName")
                .unwrap_or("Unknown")
                .to_owned(),
            title: record.title.clone(),
            context: "portrait".to_owned(),
            quality: filter::quality_tier(width, height),
            width,
            height,
            is_negative,
        }
    }
}

/// Lower-cased, underscore-joined subject name used in filenames.
pub fn subject_snake(subject: &str) -> String {
    subject.replace(' ', "_").replace('.', "").to_lowercase()
}

/// Destination filename for a curated asset:
/// `{subject}_{year}_{sanitized title, 40 chars max}.jpg`.
pub fn asset_filename(subject: &str, year: u32, title: &str) -> String {
    let joined = title.replace(' ', "_");
    let sanitized = TITLE_SANITIZER.replace_all(&joined, "");
    let stem: String = sanitized.chars().take(TITLE_STEM_LIMIT).collect();
    format!("{}_{}_{}.jpg", subject_snake(subject), year, stem)
}

/// Category and birth year used to curate one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectProfile {
    pub name: String,
    pub category: String,
    pub birth_year: u32,
}

/// Known subjects with dedicated portrait categories. Anything else falls
/// back to the subject name with spaces replaced by underscores.
const SUBJECT_PRESETS: &[(&str, &str, u32)] = &[
    ("Donald Trump", "Portraits_of_Donald_Trump", 1946),
    ("Joe Biden", "Joe_Biden", 1942),
    ("Barack Obama", "Barack_Obama", 1961),
    ("Mike Pence", "Mike_Pence", 1959),
    ("Bill Clinton", "Bill_Clinton", 1946),
    ("George W Bush", "George_W._Bush", 1946),
];

/// Resolves the category and birth year for a subject name.
pub fn subject_profile(name: &str) -> SubjectProfile {
    for (preset, category, birth_year) in SUBJECT_PRESETS {
        if *preset == name {
            return SubjectProfile {
                name: name.to_owned(),
                category: (*category).to_owned(),
                birth_year: *birth_year,
            };
        }
    }
    SubjectProfile {
        name: name.to_owned(),
        category: name.replace(' ', "_"),
        birth_year: DEFAULT_BIRTH_YEAR,
    }
}
