// Credential sources for yt-dlp
//
// An uploaded cookies.txt always wins: when it exists it is the only source
// tried. Otherwise installed browsers are tried in a fixed priority order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Distinguishes concurrent uploads' temp files within one process
static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Browsers whose cookie stores yt-dlp can read, in default priority order
pub const DEFAULT_BROWSERS: &[&str] = &["chrome", "firefox", "edge", "brave", "safari"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    FileBacked,
    BrowserBacked,
}

/// One way of handing authentication material to yt-dlp
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Netscape-format cookies file (`--cookies`)
    CookieFile { path: PathBuf },
    /// Cookie store of an installed browser (`--cookies-from-browser`)
    Browser { name: String },
}

impl CredentialSource {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::CookieFile { .. } => CredentialKind::FileBacked,
            Self::Browser { .. } => CredentialKind::BrowserBacked,
        }
    }

    /// Display name, e.g. "cookies.txt" or "Chrome"
    pub fn label(&self) -> String {
        match self {
            Self::CookieFile { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "cookies file".to_string()),
            Self::Browser { name } => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }

    /// Arguments placed in front of the operation arguments
    pub fn ytdlp_args(&self) -> Vec<String> {
        match self {
            Self::CookieFile { path } => {
                vec!["--cookies".to_string(), path.to_string_lossy().to_string()]
            }
            Self::Browser { name } => vec!["--cookies-from-browser".to_string(), name.clone()],
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Persisted cookies file: store and existence check only
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checked on every call; never cached
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replace the stored cookies file.
    ///
    /// Writes to a sibling temp file unique to this call, then renames it
    /// into place, so readers only ever see a complete file.
    pub async fn save(&self, contents: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(format!(
            ".{}.{}.part",
            std::process::id(),
            SAVE_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let tmp = PathBuf::from(tmp);

        let written = match tokio::fs::write(&tmp, contents).await {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        tracing::info!(path = %self.path.display(), bytes = contents.len(), "Stored cookies file");
        Ok(())
    }
}

/// Ordered credential sources, re-evaluated on every call
#[derive(Debug, Clone)]
pub struct CredentialRegistry {
    cookies: CookieStore,
    browsers: Vec<String>,
}

impl CredentialRegistry {
    pub fn new(cookies: CookieStore, browsers: Vec<String>) -> Self {
        Self { cookies, browsers }
    }

    pub fn with_default_browsers(cookies: CookieStore) -> Self {
        Self::new(cookies, DEFAULT_BROWSERS.iter().map(|b| b.to_string()).collect())
    }

    pub fn cookie_store(&self) -> &CookieStore {
        &self.cookies
    }

    /// Sources to try, in order.
    ///
    /// A present cookies file is returned alone; browsers are only listed
    /// when it is absent.
    pub fn effective_sources(&self) -> Vec<CredentialSource> {
        if self.cookies.exists() {
            return vec![CredentialSource::CookieFile {
                path: self.cookies.path().to_path_buf(),
            }];
        }

        self.browsers
            .iter()
            .map(|name| CredentialSource::Browser { name: name.clone() })
            .collect()
    }
}
