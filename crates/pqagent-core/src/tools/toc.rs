//! Table-of-contents extraction for simulator result files.
//!
//! Two header shapes are recognized:
//!
//! - an inline header, `----Saturation indices----`, labelled on its own line
//! - a dash-only separator line followed by the first non-empty line, which
//!   becomes the label (trailing periods stripped)

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// 1-based line number of the header label.
    pub line: usize,
    pub section: String,
}

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-{3,}$").expect("separator regex must compile"));

static INLINE_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-{3,}\s*([A-Za-z].+?)\s*-{3,}\s*$").expect("inline header regex must compile")
});

pub fn parse_toc(text: &str) -> Vec<TocEntry> {
    let mut toc = Vec::new();
    let mut after_separator = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if SEPARATOR_RE.is_match(line) {
            after_separator = true;
            continue;
        }

        if let Some(caps) = INLINE_HEADER_RE.captures(line) {
            toc.push(TocEntry {
                line: idx + 1,
                section: caps[1].to_string(),
            });
            after_separator = false;
            continue;
        }

        if after_separator {
            let label = line.trim_end_matches('.').trim_end();
            if !label.is_empty() {
                toc.push(TocEntry {
                    line: idx + 1,
                    section: label.to_string(),
                });
            }
            after_separator = false;
        }
    }

    toc
}

/// TOC of the file at `path`. Invalid UTF-8 is replaced, not rejected.
pub async fn build_toc(path: &Path) -> std::io::Result<Vec<TocEntry>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(parse_toc(&String::from_utf8_lossy(&bytes)))
}
