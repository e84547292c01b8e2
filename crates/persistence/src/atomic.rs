//! Whole-file atomic replace
//!
//! Contents are written and synced to a uniquely named sibling file, which
//! is then renamed over the target. Readers observe either the previous
//! file or the new one, never a partial write.

use qkv_core::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// A fully written temporary file waiting to replace its target
#[derive(Debug)]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
}

/// Sibling path in the target's directory so the rename stays on one filesystem
fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Write `contents` next to `target` without touching `target` itself.
pub async fn stage(target: &Path, contents: &[u8]) -> Result<StagedFile> {
    let temp = temp_path(target);

    let written = async {
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(contents).await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        remove_quietly(&temp).await;
        return Err(e.into());
    }

    Ok(StagedFile {
        temp,
        target: target.to_path_buf(),
    })
}

impl StagedFile {
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Rename the staged file over the target.
    pub async fn commit(self) -> Result<()> {
        if let Err(e) = tokio::fs::rename(&self.temp, &self.target).await {
            remove_quietly(&self.temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Drop the staged file, leaving the target untouched.
    pub async fn discard(self) -> Result<()> {
        tokio::fs::remove_file(&self.temp).await?;
        Ok(())
    }
}

async fn remove_quietly(temp: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove staged file {:?}: {}", temp, e);
        }
    }
}

/// Atomically replace `target` with `contents`.
pub async fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    stage(target, contents).await?.commit().await
}

/// Blocking variant used while a store is being constructed.
pub fn write_atomic_sync(target: &Path, contents: &[u8]) -> Result<()> {
    let temp = temp_path(target);

    let result = (|| {
        let mut file = std::fs::File::create(&temp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        std::fs::rename(&temp, target)
    })();

    if let Err(e) = result {
        if let Err(cleanup) = std::fs::remove_file(&temp) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staged file {:?}: {}", temp, cleanup);
            }
        }
        return Err(e.into());
    }
    Ok(())
}
