//! Locating and reading the cpuset a container is confined to.
//!
//! Containers report their cgroup path through the runtime's verbose status.
//! The path convention differs per runtime, so a [`RuntimeFlavor`] picked once
//! at startup turns it into the absolute location of the cgroup v1
//! `cpuset.cpus` control file below the configured sysfs root:
//!
//! - containerd: `<sysfs>/fs/cgroup/cpuset/<cgroupPath>/cpuset.cpus`
//! - CRI-O: `<sysfs>/fs/cgroup/cpuset/<parent>.slice/crio-<id>.scope/cpuset.cpus`
mod cpuset;
mod flavor;

pub use cpuset::{CpusetError, read_cpuset};
pub use flavor::{CPUSET_FILE, CPUSET_PREFIX, CpusetLocator, RuntimeFlavor, UnknownRuntimeFlavor};
