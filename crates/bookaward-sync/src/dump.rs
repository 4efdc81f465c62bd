//! JSON data dump of the records normalized during a run.

use std::path::Path;

use anyhow::{Context, Result};
use bookaward_core::NormalizedRecord;

use crate::write_atomic;

pub async fn write_dump(path: &Path, records: &[NormalizedRecord]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(records).context("serializing data dump")?;
    write_atomic(path, &bytes).await
}

/// Missing dump files read as empty.
pub async fn read_dump(path: &Path) -> Result<Vec<NormalizedRecord>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("reading data dump {}", path.display()))
        }
    };
    serde_json::from_slice(&bytes).with_context(|| format!("parsing data dump {}", path.display()))
}
