use crate::error::{Error, Result};
use crate::structs::*;
use crate::temporal;

use chrono::FixedOffset;
use rand_core::*;
use std::path::{Path, PathBuf};

/// Placeholder replaced by the file index in an output pattern
pub const INDEX_PLACEHOLDER: &str = "{}";

/// One file of a series, with everything a worker needs to build it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlan {
    pub index: usize,
    pub path: PathBuf,
    pub start: u64,
    pub duration: u64,
    /// Seed of the random generator of this file only
    pub seed: u64,
}

impl FilePlan {
    pub fn request(&self, max_size: u64) -> CaptureRequest {
        CaptureRequest {
            start: self.start,
            duration: self.duration,
            max_size,
        }
    }
}

/// Name of the file `index` out of `count`.
///
/// `{}` in the pattern is replaced by the zero-padded index. Otherwise the
/// index is appended to the file stem ("out.pcap" gives "out_07.pcap"), unless
/// the series holds a single file.
pub fn file_path(pattern: &str, index: usize, count: usize) -> PathBuf {
    let width = count.saturating_sub(1).to_string().len();
    let index = format!("{index:0width$}");
    if pattern.contains(INDEX_PLACEHOLDER) {
        return PathBuf::from(pattern.replace(INDEX_PLACEHOLDER, &index));
    }
    if count <= 1 {
        return PathBuf::from(pattern);
    }
    let path = Path::new(pattern);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{index}"),
    };
    path.with_file_name(name)
}

/// Duration of a file starting at `start`: quiet hours give long files
pub fn modulated_duration(
    start: u64,
    min_duration: u64,
    max_duration: u64,
    offset: FixedOffset,
) -> Result<u64> {
    let scalar = temporal::duration_scalar_at(start, offset)?;
    Ok(min_duration + ((max_duration - min_duration) as f64 * scalar).round() as u64)
}

/// Plan `count` consecutive files, the first one starting at `start`. Each
/// file starts where the previous one ends.
pub fn plan_series(
    start: u64,
    count: usize,
    min_duration: u64,
    max_duration: u64,
    pattern: &str,
    offset: FixedOffset,
    rng: &mut impl RngCore,
) -> Result<Vec<FilePlan>> {
    if count == 0 {
        return Err(Error::Configuration("file count must be positive".into()));
    }
    if min_duration == 0 {
        return Err(Error::Configuration(
            "minimum duration must be at least one second".into(),
        ));
    }
    if min_duration > max_duration {
        return Err(Error::Configuration(format!(
            "minimum duration ({min_duration}s) exceeds maximum duration ({max_duration}s)"
        )));
    }

    let mut plans = Vec::with_capacity(count);
    let mut file_start = start;
    for index in 0..count {
        let duration = modulated_duration(file_start, min_duration, max_duration, offset)?;
        let plan = FilePlan {
            index,
            path: file_path(pattern, index, count),
            start: file_start,
            duration,
            seed: rng.next_u64(),
        };
        log::trace!("{plan:?}");
        file_start = file_start.checked_add(duration).ok_or_else(|| {
            Error::Configuration(format!("file {index} ends after the end of time"))
        })?;
        plans.push(plan);
    }
    Ok(plans)
}
