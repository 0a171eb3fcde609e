//! Runtime configuration read from the environment.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::downloader::credentials::DEFAULT_BROWSERS;
use crate::ytdlp::find_ytdlp;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Network options passed to every yt-dlp invocation
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g. "socks5h://127.0.0.1:1080")
    pub proxy: Option<String>,
    /// `--socket-timeout` in seconds
    pub socket_timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            socket_timeout: Some(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub ytdlp_bin: String,
    /// When set, yt-dlp is run as `<python> -m yt_dlp` instead of `ytdlp_bin`
    pub ytdlp_python: Option<String>,
    pub download_dir: PathBuf,
    /// Where an uploaded cookies.txt is stored. Existence is checked per request.
    pub cookies_file: PathBuf,
    /// Browser cookie stores to try, highest priority first
    pub browsers: Vec<String>,
    pub network: NetworkConfig,
    /// Wall-clock limit for one metadata attempt
    pub info_timeout: Duration,
    /// Optional directory of static assets served at `/`
    pub static_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            ytdlp_bin: "yt-dlp".to_string(),
            ytdlp_python: None,
            download_dir: default_download_dir(),
            cookies_file: default_cookies_file(),
            browsers: DEFAULT_BROWSERS.iter().map(|b| b.to_string()).collect(),
            network: NetworkConfig::default(),
            info_timeout: Duration::from_secs(60),
            static_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let addr = match var("YTDLP_WEB_ADDR") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "YTDLP_WEB_ADDR",
                value: v,
            })?,
            None => defaults.addr,
        };

        let socket_timeout = match var("YTDLP_SOCKET_TIMEOUT") {
            Some(v) => Some(parse_number("YTDLP_SOCKET_TIMEOUT", v)?),
            None => defaults.network.socket_timeout,
        };

        let info_timeout = match var("YTDLP_INFO_TIMEOUT") {
            Some(v) => Duration::from_secs(parse_number::<u64>("YTDLP_INFO_TIMEOUT", v)?),
            None => defaults.info_timeout,
        };

        let browsers = var("YTDLP_COOKIE_BROWSERS")
            .map(|v| parse_browsers(&v))
            .unwrap_or(defaults.browsers);

        Ok(Self {
            addr,
            ytdlp_bin: var("YTDLP_BIN").unwrap_or_else(find_ytdlp),
            ytdlp_python: var("YTDLP_PYTHON"),
            download_dir: var("YTDLP_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            cookies_file: var("YTDLP_COOKIES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.cookies_file),
            browsers,
            network: NetworkConfig {
                proxy: var("YTDLP_PROXY"),
                socket_timeout,
            },
            info_timeout,
            static_dir: var("YTDLP_STATIC_DIR").map(PathBuf::from),
        })
    }
}

/// Non-empty environment variable
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

/// "Chrome, firefox,,edge" -> ["chrome", "firefox", "edge"]
fn parse_browsers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|b| b.trim().to_lowercase())
        .filter(|b| !b.is_empty())
        .collect()
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_cookies_file() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("ytdlp-web").join("cookies.txt"))
        .unwrap_or_else(|| PathBuf::from("cookies.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_browsers() {
        assert_eq!(parse_browsers("Chrome, firefox,,edge "), vec!["chrome", "firefox", "edge"]);
        assert!(parse_browsers(" , ").is_empty());
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        assert_eq!(parse_number::<u32>("X", " 15 ".to_string()).unwrap(), 15);
        let err = parse_number::<u32>("YTDLP_SOCKET_TIMEOUT", "soon".to_string()).unwrap_err();
        assert!(err.to_string().contains("YTDLP_SOCKET_TIMEOUT"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.browsers[0], "chrome");
        assert_eq!(config.network.socket_timeout, Some(30));
        assert!(config.cookies_file.ends_with("cookies.txt"));
    }
}
