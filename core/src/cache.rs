//! Content-addressed download cache. Cache keys are a stable hash of the
//! source URL; a present entry is trusted without re-validation.

use image::RgbImage;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use twox_hash::XxHash64;

/// Local cache that downloads on miss and decodes to a 3-channel image.
pub struct DownloadCache {
    root: PathBuf,
    http: reqwest::blocking::Client,
}

impl DownloadCache {
    /// Creates the cache directory if needed. The client supplies timeouts
    /// and the identifying user agent.
    pub fn new(root: PathBuf, http: reqwest::blocking::Client) -> Result<Self, DownloadError> {
        fs::create_dir_all(&root).map_err(|source| DownloadError::Io {
            source,
            path: root.clone(),
        })?;
        Ok(Self { root, http })
    }

    /// Stable cache file name for a URL. The same URL always maps to the
    /// same key.
    pub fn cache_key(url: &str) -> String {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(url.as_bytes());
        format!("{:016x}.jpg", hasher.finish())
    }

    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.root.join(Self::cache_key(url))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the decoded image for `url`, downloading on cache miss.
    ///
    /// A present cache entry is decoded directly with no re-fetch; this is a
    /// deliberate trust boundary. On miss the response body is streamed to a
    /// temporary sibling and renamed into place only once the transfer
    /// completes, so an interrupted download never occupies the cache key.
    pub fn fetch(&self, url: &str) -> Result<RgbImage, DownloadError> {
        let path = self.cache_path(url);
        if path.exists() {
            return decode(&path);
        }

        let mut response = self
            .http
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(DownloadError::Http)?;

        let partial = path.with_extension("part");
        let mut file = File::create(&partial).map_err(|source| DownloadError::Io {
            source,
            path: partial.clone(),
        })?;
        if let Err(error) = response.copy_to(&mut file) {
            drop(file);
            let _ = fs::remove_file(&partial);
            return Err(DownloadError::Http(error));
        }
        drop(file);
        fs::rename(&partial, &path).map_err(|source| DownloadError::Io {
            source,
            path: path.clone(),
        })?;

        decode(&path)
    }
}

fn decode(path: &Path) -> Result<RgbImage, DownloadError> {
    image::open(path)
        .map(|image| image.to_rgb8())
        .map_err(|source| DownloadError::Decode {
            source,
            path: path.to_path_buf(),
        })
}

#[derive(Debug)]
pub enum DownloadError {
    Http(reqwest::Error),
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Decode {
        source: image::ImageError,
        path: PathBuf,
    },
}

impl Display for DownloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(error) => write!(f, "download failed: {}", error),
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
            Self::Decode { source, path } => {
                write!(f, "failed to decode {}: {}", path.display(), source)
            }
        }
    }
}

impl Error for DownloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(error) => Some(error),
            Self::Io { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
        }
    }
}
