use crate::error::AppError;
use crate::types::RegistrySnapshot;

use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, error};

/// Read a registry snapshot.  A missing file is not an error; there is simply nothing to restore.
pub async fn load_snapshot(path: &Path) -> Result<Option<RegistrySnapshot>, AppError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Write the snapshot next to its destination and rename it into place, so readers never see a
/// partial file.
pub async fn save_snapshot(path: &Path, snapshot: &RegistrySnapshot) -> Result<(), AppError> {
    let json = serde_json::to_vec_pretty(snapshot)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), "saved call snapshot");
    Ok(())
}

/// Save if a snapshot path is configured, logging instead of failing.
pub async fn save_if_configured(path: Option<&Path>, snapshot: RegistrySnapshot) {
    if let Some(path) = path {
        if let Err(e) = save_snapshot(path, &snapshot).await {
            error!(error=%e, path = %path.display(), "failed to save call snapshot");
        }
    }
}
