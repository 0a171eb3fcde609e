// Progress line classifier for yt-dlp `--newline` output
//
// Only the handful of line shapes needed for live progress are recognised;
// everything else is Unclassified and dropped by the caller.

use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    // [download]  42.3% of  280.89MiB at  389.41KiB/s ETA 10:14
    // [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)
    static ref PROGRESS_RE: Regex = Regex::new(
        r"\[download\]\s+(\d+(?:\.\d+)?)%.*?\bat\s+(\d+(?:\.\d+)?\s*\S+/s).*?\bETA\s+(\S+)"
    ).unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s*(.+)").unwrap();
    static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]|Merging formats|\bffmpeg\b").unwrap();
}

/// Progress extracted from one `[download] NN.N% ... at X/s ETA T` line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub percent: f64,
    pub speed: String,
    pub eta: String,
}

/// Classification of a single worker output line
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    Progress(ProgressEvent),
    /// Output file announced; holds the final path segment only
    Destination { filename: String },
    MergeNotice,
    Unclassified,
}

impl LineEvent {
    pub fn is_progress(&self) -> bool {
        matches!(self, Self::Progress(_))
    }
}

/// Classify one output line. Pure; never fails.
pub fn classify(line: &str) -> LineEvent {
    if let Some(caps) = PROGRESS_RE.captures(line) {
        // Malformed numbers fall through to the other shapes instead of aborting
        if let Some(percent) = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|p| p.is_finite())
        {
            return LineEvent::Progress(ProgressEvent {
                percent,
                speed: caps[2].to_string(),
                eta: caps[3].to_string(),
            });
        }
    }

    if let Some(caps) = DEST_RE.captures(line) {
        let path = caps[1].trim();
        if let Some(filename) = final_segment(path) {
            return LineEvent::Destination { filename };
        }
    }

    if MERGE_RE.is_match(line) {
        return LineEvent::MergeNotice;
    }

    LineEvent::Unclassified
}

/// Last component of a path, accepting both `/` and `\` separators.
fn final_segment(path: &str) -> Option<String> {
    path.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
