use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use flowrun_core::error::{ExternalCallError, Result};
use flowrun_core::loader::ContentLoader;
use tracing::debug;

const SERVICE: &str = "content_loader";

/// Loads text files below a root directory.
///
/// Sources are relative paths; absolute paths and `..` components are
/// rejected so a flow cannot read outside the root.
#[derive(Debug, Clone)]
pub struct FsContentLoader {
    root: PathBuf,
}

impl FsContentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, source: &str) -> Result<PathBuf> {
        let relative = Path::new(source.trim());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if source.trim().is_empty() || escapes {
            return Err(ExternalCallError::rejected(SERVICE, format!("invalid source '{source}'")).into());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentLoader for FsContentLoader {
    async fn load(&self, source: &str) -> Result<String> {
        let path = self.resolve(source)?;
        debug!(path = %path.display(), "loading content");
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ExternalCallError::transport(SERVICE, format!("{source}: {e}")).into())
    }
}
