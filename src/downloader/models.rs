// Common data models for downloader

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DownloadError;

/// Video metadata returned by the `/info` query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail: String,
    pub duration: String,
    pub uploader: String,
    pub id: String,
    /// Label of the credential source that produced this result
    pub credential: String,
}

/// Requested video quality.
///
/// The fixed set maps to yt-dlp format selectors; anything else is handed to
/// yt-dlp verbatim as a custom selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quality {
    Best,
    P2160,
    P1440,
    P1080,
    P720,
    P480,
    P360,
    Custom(String),
}

impl Quality {
    /// Parse a user-supplied selector. Empty input means `best`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "best" => Self::Best,
            "4k" | "2160" | "2160p" => Self::P2160,
            "1440" | "1440p" => Self::P1440,
            "1080" | "1080p" => Self::P1080,
            "720" | "720p" => Self::P720,
            "480" | "480p" => Self::P480,
            "360" | "360p" => Self::P360,
            _ => Self::Custom(value.trim().to_string()),
        }
    }

    pub fn max_height(&self) -> Option<u32> {
        match self {
            Self::P2160 => Some(2160),
            Self::P1440 => Some(1440),
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
            Self::Best | Self::Custom(_) => None,
        }
    }

    /// yt-dlp `--format` value for this quality
    pub fn format_selector(&self) -> String {
        match (self, self.max_height()) {
            (Self::Custom(selector), _) => selector.clone(),
            (_, Some(h)) => format!("bestvideo[height<={}]+bestaudio/best", h),
            _ => "bestvideo+bestaudio/best".to_string(),
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::Best
    }
}

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Muxed video + audio
    #[default]
    Mp4,
    /// Audio-only extraction
    Mp3,
}

impl OutputFormat {
    /// Anything other than `mp3` is treated as video
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("mp3") {
            Self::Mp3
        } else {
            Self::Mp4
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Mp3)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp4 => write!(f, "MP4"),
            Self::Mp3 => write!(f, "MP3"),
        }
    }
}

/// One download session's input
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub quality: Quality,
    pub format: OutputFormat,
}

impl DownloadRequest {
    /// Build a request from raw query values. Only `url` is validated.
    pub fn new(
        url: Option<&str>,
        quality: Option<&str>,
        format: Option<&str>,
    ) -> Result<Self, DownloadError> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(DownloadError::MissingUrl)?;

        Ok(Self {
            url: url.to_string(),
            quality: quality.map(Quality::parse).unwrap_or_default(),
            format: format.map(OutputFormat::parse).unwrap_or_default(),
        })
    }
}
