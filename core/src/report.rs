//! Run outputs: the machine-readable asset log and a human-readable
//! curation summary.

use crate::record::{AgeBracket, CuratedAsset};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter, Write as _};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Writes the full asset log as pretty-printed JSON.
pub fn write_metadata(log: &[CuratedAsset], path: &Path) -> Result<(), ReportError> {
    let file = File::create(path).map_err(|source| ReportError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log).map_err(ReportError::Serialization)
}

/// Writes the markdown summary: totals, age and decade distributions, and
/// the negative-example breakdown.
pub fn write_summary(subject: &str, log: &[CuratedAsset], path: &Path) -> Result<(), ReportError> {
    let body = render_summary(subject, log);
    let file = File::create(path).map_err(|source| ReportError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(body.as_bytes())
        .map_err(|source| ReportError::Io {
            source,
            path: path.to_path_buf(),
        })
}

fn render_summary(subject: &str, log: &[CuratedAsset]) -> String {
    let generated = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_owned());

    let positives: Vec<&CuratedAsset> = log.iter().filter(|asset| !asset.is_negative).collect();
    let negatives: Vec<&CuratedAsset> = log.iter().filter(|asset| asset.is_negative).collect();

    let bracket_count = |bracket: AgeBracket| {
        positives
            .iter()
            .filter(|asset| asset.age_bracket == bracket)
            .count()
    };

    let mut decades: BTreeMap<u32, usize> = BTreeMap::new();
    for asset in &positives {
        if let Some(year) = asset.year {
            *decades.entry(year / 10 * 10).or_default() += 1;
        }
    }

    let mut per_subject: BTreeMap<&str, usize> = BTreeMap::new();
    for asset in &negatives {
        *per_subject.entry(asset.subject.as_str()).or_default() += 1;
    }

    let mut body = String::new();
    let _ = writeln!(body, "# Curation Summary");
    let _ = writeln!(body);
    let _ = writeln!(body, "- Target subject: {}", subject);
    let _ = writeln!(body, "- Generated: {}", generated);
    let _ = writeln!(body, "- Total curated images: {}", positives.len());
    let _ = writeln!(body);
    let _ = writeln!(body, "## Age distribution");
    let _ = writeln!(body);
    let _ = writeln!(body, "- Young: {}", bracket_count(AgeBracket::Young));
    let _ = writeln!(body, "- Middle: {}", bracket_count(AgeBracket::Middle));
    let _ = writeln!(body, "- Old: {}", bracket_count(AgeBracket::Old));
    let _ = writeln!(body);
    let _ = writeln!(body, "## Decade distribution");
    let _ = writeln!(body);
    if decades.is_empty() {
        let _ = writeln!(body, "- No dated images");
    } else {
        for (decade, count) in &decades {
            let _ = writeln!(body, "- {}s: {}", decade, count);
        }
    }
    let _ = writeln!(body);
    let _ = writeln!(body, "## Negative examples");
    let _ = writeln!(body);
    let _ = writeln!(body, "- Total: {}", negatives.len());
    for (name, count) in &per_subject {
        let _ = writeln!(body, "- {}: {}", name, count);
    }
    body
}

#[derive(Debug)]
pub enum ReportError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Serialization(serde_json::Error),
}

impl Display for ReportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
            Self::Serialization(error) => write!(f, "failed to serialize report: {}", error),
        }
    }
}

impl Error for ReportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization(error) => Some(error),
        }
    }
}
