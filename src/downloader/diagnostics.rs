// Auth diagnostics - decides whether a failed attempt was a credential problem
//
// yt-dlp reports credential rejection in free-form stderr text. Every marker
// that counts as "try the next credential source" lives in this file; any
// other failure is treated as fatal by the runner.

use serde::{Deserialize, Serialize};

/// Reasons a credential source is considered rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMarker {
    /// "Sign in to confirm ..." / "please sign in"
    SignInRequired,

    /// Bot detection notice
    BotDetection,

    /// HTTP 403 Forbidden
    Http403,

    /// Browser cookie store exists but could not be read
    CookieStorePermissionDenied,

    /// Browser (or its cookie store) is not installed
    CookieStoreNotFound,

    /// Generic cookies database failure (locked, corrupt, undecryptable)
    CookieDatabase,
}

impl AuthMarker {
    pub const ALL: [AuthMarker; 6] = [
        Self::SignInRequired,
        Self::BotDetection,
        Self::Http403,
        Self::CookieStorePermissionDenied,
        Self::CookieStoreNotFound,
        Self::CookieDatabase,
    ];

    /// Check a single lowercased stderr line against this marker
    fn matches(&self, line: &str) -> bool {
        match self {
            Self::SignInRequired => {
                line.contains("sign in to confirm")
                    || line.contains("please sign in")
                    || line.contains("use --cookies")
            }
            Self::BotDetection => line.contains("not a bot") || line.contains("bot detection"),
            Self::Http403 => line.contains("http error 403") || line.contains("403: forbidden"),
            Self::CookieStorePermissionDenied => {
                line.contains("permission denied") && line.contains("cookie")
            }
            Self::CookieStoreNotFound => line.contains("could not find"),
            Self::CookieDatabase => line.contains("cookies database"),
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::SignInRequired => "Sign-in required",
            Self::BotDetection => "Bot detection triggered",
            Self::Http403 => "Access denied (HTTP 403)",
            Self::CookieStorePermissionDenied => "Cookie store permission denied",
            Self::CookieStoreNotFound => "Cookie store not found",
            Self::CookieDatabase => "Cookies database error",
        }
    }
}

/// Return the first auth-failure marker found in worker stderr
pub fn diagnose_error(stderr: &str) -> Option<AuthMarker> {
    stderr.lines().find_map(|line| {
        let lower = line.to_lowercase();
        AuthMarker::ALL.into_iter().find(|m| m.matches(&lower))
    })
}

/// True when stderr says the credential was rejected
pub fn is_auth_error(stderr: &str) -> bool {
    diagnose_error(stderr).is_some()
}

/// Short, user-facing summary of a failed worker's stderr.
///
/// Prefers yt-dlp's `ERROR:` lines; falls back to the last non-blank line.
pub fn summarize_stderr(stderr: &str) -> Option<String> {
    let important: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .take(2)
        .collect();

    if !important.is_empty() {
        return Some(important.join(" | "));
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.chars().take(300).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_detection() {
        let error = "ERROR: [youtube] abc: Sign in to confirm you're not a bot. Use --cookies-from-browser";
        assert_eq!(diagnose_error(error), Some(AuthMarker::SignInRequired));
    }

    #[test]
    fn test_bot_detection() {
        let error = "WARNING: Bot detection triggered for this client";
        assert_eq!(diagnose_error(error), Some(AuthMarker::BotDetection));
    }

    #[test]
    fn test_403_detection() {
        let error = "ERROR: unable to download video data: HTTP Error 403: Forbidden";
        assert_eq!(diagnose_error(error), Some(AuthMarker::Http403));
    }

    #[test]
    fn test_cookie_store_permission_denied() {
        let error = "PermissionError: [Errno 13] Permission denied: '/Users/u/Library/Cookies/Cookies.binarycookies'";
        assert_eq!(diagnose_error(error), Some(AuthMarker::CookieStorePermissionDenied));
    }

    #[test]
    fn test_permission_denied_elsewhere_is_not_auth() {
        let error = "ERROR: unable to open for writing: [Errno 13] Permission denied: '/root/Downloads/x.mp4'";
        assert!(!is_auth_error(error));
    }

    #[test]
    fn test_missing_browser_detection() {
        let error = "FileNotFoundError: could not find firefox cookies database in \"/home/u/.mozilla\"";
        assert!(is_auth_error(error));
        assert_eq!(diagnose_error(error), Some(AuthMarker::CookieStoreNotFound));
    }

    #[test]
    fn test_cookies_database_detection() {
        let error = "ERROR: Failed to decrypt cookies database";
        assert_eq!(diagnose_error(error), Some(AuthMarker::CookieDatabase));
    }

    #[test]
    fn test_ordinary_failure_is_not_auth() {
        assert!(!is_auth_error("ERROR: [generic] Unsupported URL: https://example.com"));
        assert!(!is_auth_error("ERROR: unable to download video data: <urlopen error timed out>"));
        assert!(!is_auth_error(""));
    }

    #[test]
    fn test_summarize_prefers_error_lines() {
        let stderr = "[youtube] abc: Downloading webpage\nERROR: first\nnoise\nERROR: second\nERROR: third";
        assert_eq!(summarize_stderr(stderr).as_deref(), Some("ERROR: first | ERROR: second"));
    }

    #[test]
    fn test_summarize_falls_back_to_last_line() {
        assert_eq!(summarize_stderr("one\ntwo\n\n").as_deref(), Some("two"));
        assert_eq!(summarize_stderr("  \n"), None);
    }
}
