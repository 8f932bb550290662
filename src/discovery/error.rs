use crate::cgroup::CpusetError;

/// Failure that abandons a whole scan cycle.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to list ready pod sandboxes: {0}")]
    ListSandboxes(#[source] Box<tonic::Status>),
}

/// Why a pod or container was left out of a scan cycle.
#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    #[error("namespace is not watched")]
    NamespaceFiltered,
    #[error("failed to list running containers: {0}")]
    ListContainers(#[source] Box<tonic::Status>),
    #[error("failed to query container status: {0}")]
    Status(#[source] Box<tonic::Status>),
    #[error("runtime returned no container status")]
    MissingStatus,
    #[error("verbose status carries no `info` blob")]
    MissingInfo,
    #[error("failed to decode container info: {0}")]
    DecodeInfo(#[source] serde_json::Error),
    #[error("runtime spec has no linux resources")]
    MissingLinuxResources,
    #[error("no environment variables in runtime spec or container config")]
    MissingEnvironment,
    #[error("runtime spec has no cgroup path")]
    MissingCgroupPath,
    #[error(transparent)]
    Cpuset(#[from] CpusetError),
}

/// A pod, or one container of it, omitted from a scan.
#[derive(Debug)]
pub struct Skipped {
    pub pod: String,
    pub namespace: String,
    /// `None` when the whole pod was skipped.
    pub container: Option<String>,
    pub reason: SkipReason,
}
