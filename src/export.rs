use crate::builder::CaptureFileBuilder;
use crate::error::{Error, Result};
use crate::hosts::HostPool;
use crate::structs::*;

use rand_core::*;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Temporary file next to `path`, so that the final rename stays on the same
/// filesystem
fn stage(path: &Path) -> Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(NamedTempFile::new_in(dir)?)
}

/// Write an assembled capture to `path`.
///
/// The bytes go to a temporary file that is renamed over `path` once
/// everything is on disk. On failure, `path` is left as it was.
pub fn write_capture(path: &Path, capture: &Capture) -> Result<()> {
    let mut staged = stage(path)?;
    staged.write_all(&capture.bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path)?;
    log::debug!(
        "Saved {} packets into {}",
        capture.packet_count,
        path.display()
    );
    Ok(())
}

/// Build a capture straight into a file, without holding it in memory.
/// Same guarantee as `write_capture`: the file only appears if the build
/// succeeds. Returns the number of packets.
pub fn build_to_file(
    path: &Path,
    builder: &CaptureFileBuilder,
    request: &CaptureRequest,
    hosts: &HostPool,
    rng: &mut impl RngCore,
) -> Result<u64> {
    let mut writer = BufWriter::new(stage(path)?);
    let packet_count = builder.build_into(request, hosts, rng, &mut writer)?;
    let staged = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    staged.as_file().sync_all()?;
    staged.persist(path)?;
    log::debug!("Saved {packet_count} packets into {}", path.display());
    Ok(packet_count)
}
