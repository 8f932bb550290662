use std::io;
use std::path::{Path, PathBuf};

/// Error that occurs when reading a sysfs/cgroup attribute fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to read `{path}`: {source}")]
pub struct FileReadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Reads the file at the given path and strips surrounding whitespace.
///
/// Kernel attribute files end with a newline, which callers never want.
///
/// # Errors
///
/// Returns a [`FileReadError`] if the file cannot be read or is not valid UTF-8.
///
/// # Example
/// ```no_run
/// # use resource_topology_exporter::fsutil;
/// let cpus = fsutil::read_trimmed("/sys/devices/system/node/node0/cpulist")?;
/// # Ok::<(), fsutil::FileReadError>(())
/// ```
pub fn read_trimmed(path: impl AsRef<Path>) -> Result<String, FileReadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| FileReadError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content.trim().to_owned())
}

/// Returns the final path component of a symlink's target.
///
/// `physfn -> ../0000:01:00.0` yields `0000:01:00.0`.
///
/// # Errors
///
/// Returns a [`FileReadError`] if the link cannot be read.
pub fn read_link_name(path: impl AsRef<Path>) -> Result<String, FileReadError> {
    let path = path.as_ref();
    let target = std::fs::read_link(path).map_err(|source| FileReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let name = match target.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => target.to_string_lossy().into_owned(),
    };
    Ok(name)
}
