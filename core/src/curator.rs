//! Pipeline orchestrator: fetch category members, filter, stratify by
//! decade, download through the cache, validate, then synthesize variants
//! and negative examples.

use crate::cache::{DownloadCache, DownloadError};
use crate::category::{self, CategoryClient, QueryOutcome};
use crate::detector::DuplicateDetector;
use crate::faces::{FaceDetector, FaceValidator};
use crate::filter::{self, PortraitClassifier, TitleKeywordClassifier};
use crate::progress;
use crate::record::{self, CuratedAsset, ImageRecord, SubjectProfile};
use crate::report::{self, ReportError};
use crate::sampler::{self, Candidate};
use crate::variations;
use indicatif::ProgressBar;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// Below this many primary-category portraits the subcategory fallback kicks in.
const MIN_PRIMARY_RESULTS: usize = 10;

/// How many subcategories the fallback probes.
const SUBCATEGORY_PROBE_LIMIT: usize = 5;

/// Members fetched per probed subcategory.
const SUBCATEGORY_MEMBER_LIMIT: usize = 20;

/// How many approved images seed the variation synthesis.
const VARIATION_REPRESENTATIVES: usize = 5;

/// Negative examples collected per distractor subject.
pub const NEGATIVES_PER_SUBJECT: usize = 10;

const RAW_JPEG_QUALITY: u8 = 95;
const VARIANT_JPEG_QUALITY: u8 = 90;

/// Output directory layout, created up front so every later write is a
/// plain file operation.
#[derive(Debug, Clone)]
pub struct CurationDirs {
    pub root: PathBuf,
    pub raw: PathBuf,
    pub pending_review: PathBuf,
    pub source_images: PathBuf,
    pub lighting_variations: PathBuf,
    pub quality_variations: PathBuf,
    pub false_positives: PathBuf,
}

impl CurationDirs {
    pub fn bootstrap(root: &Path) -> Result<Self, SetupError> {
        let dirs = Self {
            root: root.to_path_buf(),
            raw: root.join("raw"),
            pending_review: root.join("pending_review"),
            source_images: root.join("source_images"),
            lighting_variations: root.join("lighting_variations"),
            quality_variations: root.join("quality_variations"),
            false_positives: root.join("false_positives"),
        };
        for dir in [
            &dirs.root,
            &dirs.raw,
            &dirs.pending_review,
            &dirs.source_images,
            &dirs.lighting_variations,
            &dirs.quality_variations,
            &dirs.false_positives,
        ] {
            fs::create_dir_all(dir).map_err(|source| SetupError::Directory {
                source,
                path: dir.clone(),
            })?;
        }
        Ok(dirs)
    }
}

/// Counters over the download-and-validate stage of one run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ValidationStats {
    pub downloaded: usize,
    pub duplicate: usize,
    pub no_face: usize,
    pub non_portrait: usize,
    pub passed: usize,
}

#[derive(Debug, Clone)]
pub struct CuratorConfig {
    pub subject: String,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub max_images: usize,
    /// Overrides the default API endpoint, mainly for tests.
    pub api_url: Option<String>,
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub stats: ValidationStats,
    pub approved: usize,
    pub variants: usize,
    pub negatives: usize,
}

pub struct Curator {
    profile: SubjectProfile,
    max_images: usize,
    dirs: CurationDirs,
    client: CategoryClient,
    cache: DownloadCache,
    duplicates: DuplicateDetector,
    validator: FaceValidator,
    classifier: TitleKeywordClassifier,
    stats: ValidationStats,
    log: Vec<CuratedAsset>,
}

impl Curator {
    pub fn new(config: CuratorConfig, detector: Box<dyn FaceDetector>) -> Result<Self, SetupError> {
        let http = category::build_client().map_err(SetupError::Client)?;
        let mut client = CategoryClient::new(http.clone());
        if let Some(api_url) = config.api_url.clone() {
            client = client.with_api_url(api_url);
        }
        let dirs = CurationDirs::bootstrap(&config.output_dir)?;
        let cache = DownloadCache::new(config.cache_dir, http).map_err(SetupError::Cache)?;

        Ok(Self {
            profile: record::subject_profile(&config.subject),
            max_images: config.max_images,
            dirs,
            client,
            cache,
            duplicates: DuplicateDetector::default(),
            validator: FaceValidator::new(detector),
            classifier: TitleKeywordClassifier::default(),
            stats: ValidationStats::default(),
            log: Vec::new(),
        })
    }

    /// Runs the full pipeline: curate the target subject, synthesize
    /// variations from representatives, collect negative examples, then
    /// persist the metadata log and summary.
    pub fn run(&mut self, negative_subjects: &[String]) -> Result<RunReport, ReportError> {
        let approved = self.curate_target();
        let variants = self.synthesize_variations(&approved);
        let negatives = self.curate_negatives(negative_subjects, NEGATIVES_PER_SUBJECT);
        self.write_reports()?;
        Ok(RunReport {
            stats: self.stats,
            approved: approved.len(),
            variants,
            negatives,
        })
    }

    /// Curates the target subject: fetch, filter, stratify, download,
    /// validate. Returns the assets that passed every check.
    pub fn curate_target(&mut self) -> Vec<CuratedAsset> {
        let query = self
            .client
            .fetch_category_members(&self.profile.category, self.max_images * 3);
        if let QueryOutcome::Failed(reason) = &query.outcome {
            eprintln!(
                "category fetch for {} ended early: {}",
                self.profile.category, reason
            );
        }

        let mut portraits = Vec::new();
        for record in query.records {
            if !filter::is_admissible_license(&record) {
                continue;
            }
            if !self.classifier.is_likely_portrait(&record) {
                self.stats.non_portrait += 1;
                continue;
            }
            portraits.push(record);
        }

        // The 2x cap belongs to the fallback only; a healthy primary
        // category feeds everything admissible into bucketing.
        if portraits.len() < MIN_PRIMARY_RESULTS {
            self.extend_from_subcategories(&mut portraits);
            portraits.truncate(self.max_images * 2);
        }

        let buckets = sampler::bucket_by_decade(portraits);
        let selected = sampler::select_stratified(buckets, self.max_images);
        self.download_and_validate(selected)
    }

    /// Subcategory fallback for sparse primary categories. Probes a handful
    /// of subcategories and admits any licensed member; the portrait
    /// heuristic is skipped because subcategory names are already scoped to
    /// the subject.
    fn extend_from_subcategories(&self, portraits: &mut Vec<ImageRecord>) {
        let subcategories = match self.client.fetch_subcategories(&self.profile.category) {
            Ok(subcategories) => subcategories,
            Err(error) => {
                eprintln!("subcategory listing failed: {}", error);
                return;
            }
        };

        for subcategory in subcategories.into_iter().take(SUBCATEGORY_PROBE_LIMIT) {
            if portraits.len() >= self.max_images {
                break;
            }
            let query = self
                .client
                .fetch_category_members(&subcategory, SUBCATEGORY_MEMBER_LIMIT);
            portraits.extend(
                query
                    .records
                    .into_iter()
                    .filter(filter::is_admissible_license),
            );
        }
    }

    /// Downloads each candidate through the cache and runs the validation
    /// gauntlet: duplicate check, then face check. Survivors move from the
    /// raw directory to pending review and join the run log.
    pub fn download_and_validate(&mut self, candidates: Vec<Candidate>) -> Vec<CuratedAsset> {
        let bar = ProgressBar::new(candidates.len() as u64);
        bar.set_style(progress::default_style());

        let mut approved = Vec::new();
        for candidate in candidates {
            bar.set_message(candidate.record.title.clone());
            bar.inc(1);

            let asset = CuratedAsset::from_record(
                &candidate.record,
                &self.profile.name,
                self.profile.birth_year,
                candidate.year,
                false,
            );
            let url = candidate.record.download_url();

            let image = match self.cache.fetch(url) {
                Ok(image) => image,
                Err(error) => {
                    bar.println(format!("skipping {}: {}", asset.filename, error));
                    continue;
                }
            };
            self.stats.downloaded += 1;

            let raw_path = self.dirs.raw.join(&asset.filename);
            if let Err(error) = variations::save_jpeg(&image, &raw_path, RAW_JPEG_QUALITY) {
                bar.println(format!("skipping {}: {}", asset.filename, error));
                continue;
            }

            if self.duplicates.is_duplicate(&raw_path, url) {
                self.stats.duplicate += 1;
                let _ = fs::remove_file(&raw_path);
                continue;
            }

            if !self.validator.has_valid_face(&raw_path) {
                self.stats.no_face += 1;
                let _ = fs::remove_file(&raw_path);
                continue;
            }

            let review_path = self.dirs.pending_review.join(&asset.filename);
            if let Err(error) = fs::rename(&raw_path, &review_path) {
                bar.println(format!("could not stage {}: {}", asset.filename, error));
                continue;
            }

            self.stats.passed += 1;
            self.log.push(asset.clone());
            approved.push(asset);
        }

        bar.finish_with_message(format!("{} approved", approved.len()));
        approved
    }

    /// Synthesizes lighting and quality variants from the first few assets
    /// whose originals the review step has placed in source_images; assets
    /// not yet approved are skipped. A failed variant is reported and
    /// skipped; the rest proceed.
    pub fn synthesize_variations(&mut self, assets: &[CuratedAsset]) -> usize {
        let mut written = 0;
        for asset in assets
            .iter()
            .filter(|asset| !asset.is_negative)
            .take(VARIATION_REPRESENTATIVES)
        {
            let source_path = self.dirs.source_images.join(&asset.filename);
            let image = match image::open(&source_path) {
                Ok(image) => image.to_rgb8(),
                Err(_) => continue,
            };
            let stem = asset
                .filename
                .strip_suffix(".jpg")
                .unwrap_or(&asset.filename);

            let lighting = [
                ("backlit", variations::backlight(&image)),
                ("lowlight", variations::low_light(&image)),
                ("bright", variations::bright(&image)),
                ("shadows", variations::directional_shadow(&image)),
            ];
            for (label, variant) in &lighting {
                let path = self
                    .dirs
                    .lighting_variations
                    .join(format!("{}_{}.jpg", stem, label));
                match variations::save_jpeg(variant, &path, VARIANT_JPEG_QUALITY) {
                    Ok(()) => written += 1,
                    Err(error) => eprintln!("variant failed: {}", error),
                }
            }

            let quality = [
                (
                    "small",
                    variations::small_with_canvas(&image),
                    VARIANT_JPEG_QUALITY,
                ),
                ("compressed", image.clone(), variations::COMPRESSED_QUALITY),
                ("cropped", variations::cropped(&image), VARIANT_JPEG_QUALITY),
            ];
            for (label, variant, jpeg_quality) in &quality {
                let path = self
                    .dirs
                    .quality_variations
                    .join(format!("{}_{}.jpg", stem, label));
                match variations::save_jpeg(variant, &path, *jpeg_quality) {
                    Ok(()) => written += 1,
                    Err(error) => eprintln!("variant failed: {}", error),
                }
            }
        }
        written
    }

    /// Collects licensed images of distractor subjects as negative examples.
    /// Negatives skip the portrait and face checks: a non-face image of the
    /// wrong person is still a useful distractor.
    pub fn curate_negatives(&mut self, subjects: &[String], per_subject: usize) -> usize {
        let bar = ProgressBar::new(subjects.len() as u64);
        bar.set_style(progress::default_style());

        let mut collected = 0;
        for subject in subjects {
            bar.set_message(subject.clone());
            bar.inc(1);

            let profile = record::subject_profile(subject);
            let query = self
                .client
                .fetch_category_members(&profile.category, per_subject * 2);
            let licensed: Vec<_> = query
                .records
                .into_iter()
                .filter(filter::is_admissible_license)
                .take(per_subject)
                .collect();

            for (index, record) in licensed.iter().enumerate() {
                let year = filter::extract_year(record);
                let mut asset =
                    CuratedAsset::from_record(record, &profile.name, profile.birth_year, year, true);
                asset.filename = format!("{}_{:03}.jpg", record::subject_snake(subject), index + 1);

                let image = match self.cache.fetch(record.download_url()) {
                    Ok(image) => image,
                    Err(error) => {
                        bar.println(format!("skipping {}: {}", asset.filename, error));
                        continue;
                    }
                };

                let path = self.dirs.false_positives.join(&asset.filename);
                if let Err(error) = variations::save_jpeg(&image, &path, VARIANT_JPEG_QUALITY) {
                    bar.println(format!("skipping {}: {}", asset.filename, error));
                    continue;
                }

                self.log.push(asset);
                collected += 1;
            }
        }

        bar.finish_with_message(format!("{} negatives", collected));
        collected
    }

    /// Writes the metadata log and markdown summary into the output root.
    pub fn write_reports(&self) -> Result<(), ReportError> {
        report::write_metadata(&self.log, &self.dirs.root.join("image_metadata.json"))?;
        report::write_summary(
            &self.profile.name,
            &self.log,
            &self.dirs.root.join("CURATION_SUMMARY.md"),
        )
    }

    pub fn stats(&self) -> ValidationStats {
        self.stats
    }

    pub fn log(&self) -> &[CuratedAsset] {
        &self.log
    }

    pub fn dirs(&self) -> &CurationDirs {
        &self.dirs
    }
}

#[derive(Debug)]
pub enum SetupError {
    Client(reqwest::Error),
    Directory {
        source: std::io::Error,
        path: PathBuf,
    },
    Cache(DownloadError),
}

impl Display for SetupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(error) => write!(f, "failed to build http client: {}", error),
            Self::Directory { source, path } => {
                write!(f, "failed to create {}: {}", path.display(), source)
            }
            Self::Cache(error) => write!(f, "failed to initialize cache: {}", error),
        }
    }
}

impl Error for SetupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Client(error) => Some(error),
            Self::Directory { source, .. } => Some(source),
            Self::Cache(error) => Some(error),
        }
    }
}
