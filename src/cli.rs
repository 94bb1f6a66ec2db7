use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_TARGET: &str = "Donald Trump";
const DEFAULT_OUTPUT_DIR: &str = "test_images";
const DEFAULT_CACHE_DIR: &str = ".image_cache";
const DEFAULT_MAX_IMAGES: usize = 50;
const DEFAULT_NEGATIVES: &str = "Joe Biden,Mike Pence,Barack Obama,Bill Clinton";
const DEFAULT_FACE_MODEL: &str = "seeta_fd_frontal_v1.0.bin";

#[derive(Debug, PartialEq, Eq)]
pub struct CliConfig {
    pub target: String,
    pub negative_subjects: Vec<String>,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub max_images: usize,
    pub face_model: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliError {
    InvalidFlag(String),
    InvalidCount(String),
    Help,
    Version,
}

impl CliConfig {
    pub fn from_env() -> Result<Self, CliError> {
        Self::from_iter(env::args().skip(1))
    }

    pub fn from_iter<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut target: Option<String> = None;
        let mut negatives = split_subjects(DEFAULT_NEGATIVES);
        let mut output_dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
        let mut cache_dir = PathBuf::from(DEFAULT_CACHE_DIR);
        let mut max_images = DEFAULT_MAX_IMAGES;
        let mut face_model = PathBuf::from(DEFAULT_FACE_MODEL);

        for arg in args {
            if arg.starts_with("--") {
                if arg == "--help" {
                    return Err(CliError::Help);
                }
                if arg == "--version" {
                    return Err(CliError::Version);
                }
                if let Some(value) = arg.strip_prefix("--target=") {
                    target = Some(value.to_owned());
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--negative-examples=") {
                    negatives = split_subjects(value);
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--output-dir=") {
                    output_dir = PathBuf::from(value);
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--cache-dir=") {
                    cache_dir = PathBuf::from(value);
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--max-images=") {
                    max_images = value
                        .parse()
                        .map_err(|_| CliError::InvalidCount(value.to_owned()))?;
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--face-model=") {
                    face_model = PathBuf::from(value);
                    continue;
                }
                return Err(CliError::InvalidFlag(arg));
            }

            if target.is_none() {
                target = Some(arg);
                continue;
            }

            return Err(CliError::InvalidFlag(arg));
        }

        Ok(Self {
            target: target.unwrap_or_else(|| DEFAULT_TARGET.to_owned()),
            negative_subjects: negatives,
            output_dir,
            cache_dir,
            max_images,
            face_model,
        })
    }
}

fn split_subjects(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFlag(flag) => write!(f, "unrecognized argument: {}", flag),
            Self::InvalidCount(value) => write!(f, "invalid image count: {}", value),
            Self::Help => write!(
                f,
                "usage: portra [TARGET] [--target=NAME] [--negative-examples=A,B] \
                 [--output-dir=DIR] [--cache-dir=DIR] [--max-images=N] [--face-model=PATH]"
            ),
            Self::Version => write!(f, "portra {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Error for CliError {}
