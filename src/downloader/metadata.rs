// Metadata fallback: `--dump-json` against each credential source in turn

use std::time::Duration;

use super::credentials::CredentialSource;
use super::errors::DownloadError;
use super::models::VideoMetadata;
use super::runner::{AttemptOutcome, AttemptRunner, RunMode};

/// Query metadata, trying `sources` in order.
///
/// Stops at the first success or the first fatal failure. Auth failures and
/// unavailable binaries move on to the next source; running out of sources is
/// `AuthFailed`.
pub async fn fetch_metadata(
    runner: &dyn AttemptRunner,
    sources: &[CredentialSource],
    args: &[String],
    timeout: Duration,
) -> Result<VideoMetadata, DownloadError> {
    for (i, source) in sources.iter().enumerate() {
        tracing::info!("[info] Attempt {}/{} via {}", i + 1, sources.len(), source);

        match runner.run(source, args, RunMode::Capture { timeout }).await {
            AttemptOutcome::Success { output } => {
                let metadata = parse_video_info(&output, &source.label())?;
                tracing::info!("[info] Got \"{}\" via {}", metadata.title, source);
                return Ok(metadata);
            }
            AttemptOutcome::AuthFailure { detail } => {
                tracing::info!("[info] {} rejected: {}", source, detail);
            }
            AttemptOutcome::BinaryUnavailable { detail } => {
                tracing::warn!("[info] {} unavailable: {}", source, detail);
            }
            AttemptOutcome::FatalFailure { detail } => {
                tracing::warn!("[info] Failed via {}: {}", source, detail);
                return Err(DownloadError::Worker(detail));
            }
            AttemptOutcome::Cancelled => return Err(DownloadError::Cancelled),
        }
    }

    tracing::warn!("[info] All {} credential sources failed", sources.len());
    Err(DownloadError::AuthFailed {
        attempts: sources.len(),
    })
}

/// Parse yt-dlp `--dump-json` output. Only `title` is required.
pub fn parse_video_info(stdout: &str, credential: &str) -> Result<VideoMetadata, DownloadError> {
    let json: serde_json::Value = serde_json::from_str(stdout.trim())
        .map_err(|e| DownloadError::MalformedOutput(format!("Invalid JSON: {}", e)))?;

    let title = json["title"]
        .as_str()
        .ok_or_else(|| DownloadError::MalformedOutput("No title in JSON".to_string()))?;

    let duration = match json["duration_string"].as_str() {
        Some(d) => d.to_string(),
        None => json["duration"].as_f64().map(format_duration).unwrap_or_default(),
    };

    Ok(VideoMetadata {
        title: title.to_string(),
        thumbnail: json["thumbnail"].as_str().unwrap_or("").to_string(),
        duration,
        uploader: json["uploader"].as_str().unwrap_or("").to_string(),
        id: json["id"].as_str().unwrap_or("").to_string(),
        credential: credential.to_string(),
    })
}

/// 75 -> "1:15", 3725 -> "1:02:05"
fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);

    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::runner::testing::{auth, fatal, missing, success, Script, ScriptedRunner};
    use std::path::PathBuf;

    const INFO: &str = r#"{"id":"abc123","title":"My Video","thumbnail":"https://i.ytimg.com/vi/abc123/hq.jpg","duration":754,"duration_string":"12:34","uploader":"Someone"}"#;

    fn browsers() -> Vec<CredentialSource> {
        ["chrome", "firefox", "edge", "brave", "safari"]
            .iter()
            .map(|b| CredentialSource::Browser { name: b.to_string() })
            .collect()
    }

    async fn fetch(runner: &ScriptedRunner, sources: &[CredentialSource]) -> Result<VideoMetadata, DownloadError> {
        fetch_metadata(runner, sources, &[], Duration::from_secs(5)).await
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let runner = ScriptedRunner::new(vec![
            Script::outcome(auth()),
            Script::outcome(missing()),
            Script::outcome(success(INFO)),
            Script::outcome(success(INFO)),
        ]);

        let metadata = fetch(&runner, &browsers()).await.unwrap();
        assert_eq!(metadata.title, "My Video");
        assert_eq!(metadata.credential, "Edge");
        assert_eq!(runner.calls(), vec!["Chrome", "Firefox", "Edge"]);
    }

    #[tokio::test]
    async fn test_exhaustion_tries_every_source_once() {
        let runner = ScriptedRunner::new(vec![Script::outcome(auth()); 5]);

        let err = fetch(&runner, &browsers()).await.unwrap_err();
        assert!(matches!(err, DownloadError::AuthFailed { attempts: 5 }));
        assert_eq!(runner.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_all_binaries_missing_is_still_auth_failed() {
        let runner = ScriptedRunner::new(vec![Script::outcome(missing()); 5]);

        let err = fetch(&runner, &browsers()).await.unwrap_err();
        assert_eq!(err.code(), "AUTH_FAILED");
    }

    #[tokio::test]
    async fn test_fatal_stops_retries() {
        let runner = ScriptedRunner::new(vec![
            Script::outcome(auth()),
            Script::outcome(fatal("ERROR: Unsupported URL")),
            Script::outcome(success(INFO)),
        ]);

        let err = fetch(&runner, &browsers()).await.unwrap_err();
        assert_eq!(err.to_string(), "ERROR: Unsupported URL");
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_output_is_not_retried() {
        let runner = ScriptedRunner::new(vec![
            Script::outcome(success("WARNING: not json")),
            Script::outcome(success(INFO)),
        ]);

        let err = fetch(&runner, &browsers()).await.unwrap_err();
        assert_eq!(err.code(), "MALFORMED_OUTPUT");
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cookie_file_only_source() {
        let runner = ScriptedRunner::new(vec![Script::outcome(auth())]);
        let sources = vec![CredentialSource::CookieFile { path: PathBuf::from("/data/cookies.txt") }];

        let err = fetch(&runner, &sources).await.unwrap_err();
        assert!(matches!(err, DownloadError::AuthFailed { attempts: 1 }));
        assert_eq!(runner.calls(), vec!["cookies.txt"]);
    }

    #[test]
    fn test_parse_video_info() {
        let metadata = parse_video_info(INFO, "Chrome").unwrap();
        assert_eq!(
            metadata,
            VideoMetadata {
                title: "My Video".to_string(),
                thumbnail: "https://i.ytimg.com/vi/abc123/hq.jpg".to_string(),
                duration: "12:34".to_string(),
                uploader: "Someone".to_string(),
                id: "abc123".to_string(),
                credential: "Chrome".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_derives_duration_and_defaults() {
        let metadata = parse_video_info(r#"{"title":"T","duration":3725.4}"#, "x").unwrap();
        assert_eq!(metadata.duration, "1:02:05");
        assert_eq!(metadata.uploader, "");
        assert_eq!(metadata.thumbnail, "");

        let metadata = parse_video_info(r#"{"title":"T"}"#, "x").unwrap();
        assert_eq!(metadata.duration, "");
    }

    #[test]
    fn test_parse_requires_title() {
        let err = parse_video_info(r#"{"id":"abc"}"#, "x").unwrap_err();
        assert!(matches!(err, DownloadError::MalformedOutput(_)));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(75.0), "1:15");
        assert_eq!(format_duration(-3.0), "0:00");
    }
}
