use std::path::Path;
use std::process::Command as StdCommand;

use crate::config::NetworkConfig;
use crate::downloader::models::DownloadRequest;

/// Output template relative to the download directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

// Find yt-dlp executable in common paths
pub fn find_ytdlp() -> String {
    let common_paths = [
        "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
        "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac
        "/usr/bin/yt-dlp",          // System installation
    ];

    for path in common_paths {
        if Path::new(path).exists() {
            return path.to_string();
        }
    }

    if let Ok(output) = StdCommand::new("which").arg("yt-dlp").output() {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let trimmed = path.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    // Last resort: hope it's in PATH at spawn time
    "yt-dlp".to_string()
}

/// `--socket-timeout` / `--proxy` shared by every invocation
pub fn network_args(network: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(timeout) = network.socket_timeout {
        args.push("--socket-timeout".to_string());
        args.push(timeout.to_string());
    }

    if let Some(proxy) = &network.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

/// Arguments for a metadata (`--dump-json`) query
pub fn info_args(url: &str, network: &NetworkConfig) -> Vec<String> {
    let mut args = vec!["--dump-json".to_string(), "--no-playlist".to_string()];
    args.extend(network_args(network));
    args.push(url.to_string());
    args
}

/// Arguments for a download with `--newline` progress output
pub fn download_args(
    request: &DownloadRequest,
    download_dir: &Path,
    network: &NetworkConfig,
) -> Vec<String> {
    let mut args = vec!["--no-playlist".to_string()];

    if request.format.is_audio() {
        // Best audio, converted to mp3 by ffmpeg; 0 = best VBR quality
        args.extend([
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            "0".to_string(),
        ]);
    } else {
        args.extend([
            "--format".to_string(),
            request.quality.format_selector(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
        ]);
    }

    args.extend([
        "--output".to_string(),
        download_dir.join(OUTPUT_TEMPLATE).to_string_lossy().to_string(),
        "--windows-filenames".to_string(),
        "--newline".to_string(),
    ]);
    args.extend(network_args(network));
    args.push(request.url.clone());
    args
}
