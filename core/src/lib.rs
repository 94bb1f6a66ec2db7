//! Core curation engine for Portra.
//!
//! This crate fetches candidate portrait images from a category-organized
//! media API, filters them by license and portrait likelihood, stratifies
//! them across decades, validates downloads for duplicates and face
//! presence, and synthesizes deterministic lighting and quality variants.
//! The CLI drives the `Curator` orchestrator; every stage is also usable on
//! its own.

pub mod cache;
pub mod category;
pub mod curator;
pub mod detector;
pub mod faces;
pub mod filter;
pub mod progress;
pub mod record;
pub mod report;
pub mod sampler;
pub mod variations;

pub use cache::{DownloadCache, DownloadError};
pub use category::{
    build_client, CategoryClient, CategoryError, MemberQuery, QueryOutcome, DEFAULT_API_URL,
};
pub use curator::{
    CurationDirs, Curator, CuratorConfig, RunReport, SetupError, ValidationStats,
    NEGATIVES_PER_SUBJECT,
};
pub use detector::{
    average_hash, hamming_distance, DuplicateDetector, Fingerprint,
    DEFAULT_SIMILARITY_THRESHOLD, HASH_SIZE,
};
pub use faces::{
    FaceDetector, FaceError, FaceRegion, FaceValidator, SeetaDetector, DEFAULT_MIN_FACE_AREA,
};
pub use filter::{
    age_bracket, decade_of, extract_year, is_admissible_license, quality_tier,
    PortraitClassifier, TitleKeywordClassifier,
};
pub use record::{
    subject_profile, AgeBracket, CuratedAsset, ImageRecord, QualityTier, SubjectProfile,
};
pub use report::{write_metadata, write_summary, ReportError};
pub use sampler::{bucket_by_decade, select_stratified, Candidate};
pub use variations::VariationError;
