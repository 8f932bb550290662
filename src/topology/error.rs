use std::path::PathBuf;

use crate::fsutil;

use super::cpulist::CpuListError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    FileRead(#[from] fsutil::FileReadError),
    #[error("failed to list directory `{path}`: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no NUMA nodes found below `{path}`")]
    NoNumaNodes { path: PathBuf },
    #[error("invalid cpu list in `{path}`: {source}")]
    CpuList {
        path: PathBuf,
        #[source]
        source: CpuListError,
    },
    #[error("invalid value `{value}` in `{path}`")]
    InvalidAttribute { path: PathBuf, value: String },
    #[error("invalid PCI address `{0}`")]
    InvalidPciAddress(String),
}

pub type Result<T> = std::result::Result<T, Error>;
