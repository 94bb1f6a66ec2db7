//! Pure, order-independent classification over a single raw record: license
//! admissibility, year extraction, age bracketing, quality tiers and the
//! portrait-likelihood heuristic.

use crate::record::{AgeBracket, ImageRecord, QualityTier};
use once_cell::sync::Lazy;
use regex::Regex;

/// Metadata fields whose concatenated text decides license admissibility.
const LICENSE_FIELDS: &[&str] = &[
    "LicenseShortName",
    "LicenseUrl",
    "UsageTerms",
    "Copyrighted",
    "License",
];

/// Substrings accepting a record as public domain.
const PUBLIC_DOMAIN_INDICATORS: &[&str] = &["public domain", "cc0", "pd-", "government work"];

/// Substrings accepting a record as attribution-licensed Creative Commons.
const ATTRIBUTION_INDICATORS: &[&str] = &["cc-by", "cc by"];

/// Title substrings that mark a record as likely not a portrait. The broad
/// tail ("with", "and") often indicates group photos; kept as-is.
pub const NON_PORTRAIT_KEYWORDS: &[&str] = &[
    "document",
    "logo",
    "signature",
    "seal",
    "emblem",
    "coat of arms",
    "architectural",
    "building",
    "house",
    "office",
    "tower",
    "helmet",
    "shoes",
    "backpack",
    "memo",
    "letter",
    "certificate",
    "icon",
    "speaker",
    "diagram",
    "chart",
    "graph",
    "accepting",
    "receiving",
    "award ceremony",
    "with",
    "and",
];

static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("invalid year regex"));
static TITLE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(19|20)\d{2}").expect("invalid title year regex"));

/// Accepts records whose license metadata contains a public-domain or
/// CC-attribution indicator. Missing or unrecognized metadata rejects.
pub fn is_admissible_license(record: &ImageRecord) -> bool {
    let mut combined = String::new();
    for field in LICENSE_FIELDS {
        if let Some(value) = record.metadata_value(field) {
            combined.push_str(value);
            combined.push(' ');
        }
    }
    let combined = combined.to_lowercase();

    PUBLIC_DOMAIN_INDICATORS
        .iter()
        .chain(ATTRIBUTION_INDICATORS)
        .any(|indicator| combined.contains(indicator))
}

/// Extracts the acquisition year, trying in order: a 4-digit year in the
/// structured original-date field, the leading 4 digits of the timestamp,
/// then a 1900-2099 year in the title. First match wins.
pub fn extract_year(record: &ImageRecord) -> Option<u32> {
    if let Some(original_date) = record.metadata_value("DateTimeOriginal") {
        if let Some(found) = FOUR_DIGITS.find(original_date) {
            if let Ok(year) = found.as_str().parse() {
                return Some(year);
            }
        }
    }

    // The timestamp is remote input; `get` avoids slicing inside a
    // multi-byte character.
    if let Some(prefix) = record.timestamp.as_deref().and_then(|t| t.get(..4)) {
        if let Ok(year) = prefix.parse() {
            return Some(year);
        }
    }

    TITLE_YEAR
        .find(&record.title)
        .and_then(|found| found.as_str().parse().ok())
}

/// Decade containing `year`, as a multiple of ten.
pub fn decade_of(year: u32) -> u32 {
    year / 10 * 10
}

/// Age bracket of a subject born in `birth_year` at `year`. Years before
/// birth are unknown rather than negative ages.
pub fn age_bracket(year: u32, birth_year: u32) -> AgeBracket {
    if year < birth_year {
        return AgeBracket::Unknown;
    }
    let age = year - birth_year;
    if age < 45 {
        AgeBracket::Young
    } else if age < 65 {
        AgeBracket::Middle
    } else {
        AgeBracket::Old
    }
}

/// Quality tier from pixel area: over a megapixel is high, over 300k medium.
pub fn quality_tier(width: u32, height: u32) -> QualityTier {
    let pixels = width as u64 * height as u64;
    if pixels > 1_000_000 {
        QualityTier::High
    } else if pixels > 300_000 {
        QualityTier::Medium
    } else {
        QualityTier::Low
    }
}

/// Strategy seam for portrait-likelihood classification, so a stricter
/// classifier can replace the keyword heuristic without touching the pipeline.
pub trait PortraitClassifier {
    fn is_likely_portrait(&self, record: &ImageRecord) -> bool;
}

/// Default classifier: reject when the lower-cased title contains a blocklist
/// keyword, accept otherwise.
#[derive(Debug, Clone)]
pub struct TitleKeywordClassifier {
    blocklist: &'static [&'static str],
}

impl Default for TitleKeywordClassifier {
    fn default() -> Self {
        Self {
            blocklist: NON_PORTRAIT_KEYWORDS,
        }
    }
}

impl PortraitClassifier for TitleKeywordClassifier {
    fn is_likely_portrait(&self, record: &ImageRecord) -> bool {
        let title = record.title.to_lowercase();
        !self
            .blocklist
            .iter()
            .any(|keyword| title.contains(keyword))
    }
}
