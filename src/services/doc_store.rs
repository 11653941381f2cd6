use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::token_service;

const FILE_PREFIX: &str = "jot_";
const FILE_SUFFIX: &str = ".txt";

/// File-backed document store: one `jot_<token>.txt` per document.
///
/// Nothing is cached; every read goes back to disk, and the directory listing
/// is the only index of which documents exist.
#[derive(Clone, Debug)]
pub struct DocStore {
    dir: Arc<PathBuf>,
}

impl DocStore {
    /// Open the store, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir: Arc::new(dir) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{token}{FILE_SUFFIX}"))
    }

    /// Extract the token from a document path; other files in the directory,
    /// including in-flight temporary files, yield `None`.
    pub fn token_from_path(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let token = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
        token_service::is_well_formed(token).then(|| token.to_string())
    }

    pub async fn read(&self, token: &str) -> io::Result<String> {
        tokio::fs::read_to_string(self.path_for(token)).await
    }

    pub async fn exists(&self, token: &str) -> io::Result<bool> {
        match tokio::fs::metadata(self.path_for(token)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Replace the whole document.
    ///
    /// The content goes to a hidden temporary file first and is then renamed
    /// over the document, so concurrent readers see either the old or the new
    /// content in full.
    pub async fn write(&self, token: &str, content: &str) -> io::Result<()> {
        let target = self.path_for(token);
        let tmp = self.dir.join(format!(".{FILE_PREFIX}{token}.{}.tmp", Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&tmp, content.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            warn!("Failed to move jot into place for token {}: {}", token, e);
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        debug!("Wrote {} bytes for token {}", content.len(), token);
        Ok(())
    }

    /// Write the welcome text for a freshly minted token
    pub async fn create_default(&self, token: &str, base_url: &str) -> io::Result<()> {
        self.write(token, &welcome_text(base_url, token, None)).await
    }

    /// Write the welcome text for a token minted from `origin` via `/new`
    pub async fn create_derived(&self, token: &str, origin: &str, base_url: &str) -> io::Result<()> {
        self.write(token, &welcome_text(base_url, token, Some(origin))).await
    }

    /// Whether any document exists at all
    pub async fn has_any_document(&self) -> io::Result<bool> {
        let mut entries = match tokio::fs::read_dir(self.dir.as_path()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            if Self::token_from_path(&entry.path()).is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub fn welcome_text(base_url: &str, token: &str, origin: Option<&str>) -> String {
    let back_reference = origin
        .map(|origin| format!("This jot was created from: {base_url}/{origin}\n\n"))
        .unwrap_or_default();

    format!(
        "Welcome to jotter!

{back_reference}Make sure to save the link below, it's the only way to access this jot:

{base_url}/{token}

To create a new jot, visit:

{base_url}/new

*CAUTION*: Creating a new jot in the same browser will switch to the new jot session. Make sure you save the token!

If you want to \"log out\" of jotter, simply clear your browser's cookies."
    )
}
