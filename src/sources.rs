//! Document acquisition. A [`DocumentSource`] produces the [`Document`]s fed
//! to the indexer; [`LocalFiles`] is the filesystem implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::types::{Document, RagError};

/// Extensions [`LocalFiles`] picks up by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["txt", "md", "html"];

/// Anything that can yield a batch of documents for indexing.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn load_documents(&self, path: &Path) -> Result<Vec<Document>, RagError>;
}

/// Reads plain-text documents from a directory tree.
///
/// Files that fail to read (permissions, invalid UTF-8) are logged and
/// skipped; only a missing or unreadable root is an error.
#[derive(Clone, Debug)]
pub struct LocalFiles {
    extensions: Vec<String>,
}

impl Default for LocalFiles {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

impl LocalFiles {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|ext| ext.to_lowercase()).collect();
        self
    }

    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|wanted| *wanted == ext)
            })
            .unwrap_or(false)
    }

    /// Iterative directory walk; recursion depth of user trees is unbounded.
    async fn collect_paths(&self, root: &Path) -> Result<Vec<PathBuf>, RagError> {
        let mut pending = vec![root.to_path_buf()];
        let mut files = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|err| {
                RagError::Load {
                    path: dir.display().to_string(),
                    reason: err.to_string(),
                }
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|err| {
                RagError::Load {
                    path: dir.display().to_string(),
                    reason: err.to_string(),
                }
            })? {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if self.wants(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl DocumentSource for LocalFiles {
    async fn load_documents(&self, path: &Path) -> Result<Vec<Document>, RagError> {
        if !path.is_dir() {
            return Err(RagError::Load {
                path: path.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let mut documents = Vec::new();
        for file in self.collect_paths(path).await? {
            match tokio::fs::read_to_string(&file).await {
                Ok(text) => {
                    debug!(file = %file.display(), bytes = text.len(), "loaded document");
                    documents.push(Document::new(file.display().to_string(), text));
                }
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "skipping unreadable file");
                }
            }
        }
        Ok(documents)
    }
}
