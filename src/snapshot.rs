//! Local gateway snapshot - a [`MemoryGateway`] persisted as JSON

use anyhow::{Context, Result};
use reconcile::MemoryGateway;
use std::fs;
use std::path::Path;

/// Load a snapshot, or an empty gateway if the file doesn't exist
pub fn load(path: &Path) -> Result<MemoryGateway> {
    if !path.exists() {
        log::debug!("Snapshot {} does not exist, starting empty", path.display());
        return Ok(MemoryGateway::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    let gateway: MemoryGateway = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;

    log::debug!(
        "Loaded snapshot from {} ({} entities)",
        path.display(),
        gateway.len()
    );
    Ok(gateway)
}

/// Write a snapshot, creating parent directories as needed
pub fn save(path: &Path, gateway: &MemoryGateway) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let content =
        serde_json::to_string_pretty(gateway).context("Failed to serialize snapshot")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;

    log::debug!("Saved snapshot to {}", path.display());
    Ok(())
}
