use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::fsutil;
use crate::resources::CpuId;
use crate::topology::{CpuListError, parse_cpu_list};

#[derive(Debug, thiserror::Error)]
pub enum CpusetError {
    #[error("failed to read assigned CPUs: {0}")]
    Read(#[from] fsutil::FileReadError),
    #[error("failed to parse `{path}` as cpu set: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: CpuListError,
    },
}

/// Reads the CPUs assigned to a cgroup from its `cpuset.cpus` file.
///
/// # Errors
///
/// - [`CpusetError::Read`] if the file cannot be read.
/// - [`CpusetError::Parse`] if the content is not a valid CPU list.
pub fn read_cpuset(path: impl AsRef<Path>) -> Result<BTreeSet<CpuId>, CpusetError> {
    let path = path.as_ref();
    let content = fsutil::read_trimmed(path)?;
    parse_cpu_list(&content).map_err(|source| CpusetError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
