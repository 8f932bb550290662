use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Fixed location of the cpuset controller relative to the sysfs root.
pub const CPUSET_PREFIX: &str = "fs/cgroup/cpuset";
/// Control file listing the CPUs a cgroup may run on.
pub const CPUSET_FILE: &str = "cpuset.cpus";

const CRIO_MARKER: &str = "slice:crio:";
const CRIO_REPLACEMENT: &str = "slice/crio-";

#[derive(Debug, thiserror::Error)]
#[error("unsupported container runtime `{0}`, expected `containerd` or `cri-o`")]
pub struct UnknownRuntimeFlavor(pub String);

/// Container runtime whose cgroup path convention is used to locate
/// `cpuset.cpus` files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuntimeFlavor {
    /// cgroup paths are relative cpuset directories, joined unchanged.
    #[default]
    Containerd,
    /// systemd-style `<parent>.slice:crio:<id>` paths, mapped to
    /// `<parent>.slice/crio-<id>.scope`.
    CriO,
}

impl RuntimeFlavor {
    /// Rewrites a runtime-reported cgroup path into a path relative to the
    /// cpuset hierarchy.
    pub fn cgroup_dir(&self, cgroup_path: &str) -> String {
        let relative = cgroup_path.trim().trim_start_matches('/');
        match self {
            RuntimeFlavor::Containerd => relative.to_owned(),
            RuntimeFlavor::CriO => {
                format!("{}.scope", relative.replacen(CRIO_MARKER, CRIO_REPLACEMENT, 1))
            }
        }
    }
}

impl FromStr for RuntimeFlavor {
    type Err = UnknownRuntimeFlavor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "containerd" => Ok(RuntimeFlavor::Containerd),
            "cri-o" | "crio" => Ok(RuntimeFlavor::CriO),
            _ => Err(UnknownRuntimeFlavor(s.to_owned())),
        }
    }
}

impl fmt::Display for RuntimeFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeFlavor::Containerd => f.write_str("containerd"),
            RuntimeFlavor::CriO => f.write_str("cri-o"),
        }
    }
}

/// Resolves container cgroup paths to absolute `cpuset.cpus` files.
///
/// The flavor is fixed when the locator is built so an unsupported runtime is
/// rejected at startup rather than on every scan.
#[derive(Debug, Clone)]
pub struct CpusetLocator {
    sysfs_root: PathBuf,
    flavor: RuntimeFlavor,
}

impl CpusetLocator {
    pub fn new(sysfs_root: impl Into<PathBuf>, flavor: RuntimeFlavor) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            flavor,
        }
    }

    /// `<sysfs>/fs/cgroup/cpuset/<translated cgroup path>/cpuset.cpus`
    ///
    /// # Examples
    ///
    /// ```
    /// # use resource_topology_exporter::cgroup::{CpusetLocator, RuntimeFlavor};
    /// # use std::path::Path;
    /// let locator = CpusetLocator::new("/host-sys", RuntimeFlavor::CriO);
    /// assert_eq!(
    ///     locator.cpuset_file("kubepods-pod1.slice:crio:abc"),
    ///     Path::new("/host-sys/fs/cgroup/cpuset/kubepods-pod1.slice/crio-abc.scope/cpuset.cpus")
    /// );
    /// ```
    pub fn cpuset_file(&self, cgroup_path: &str) -> PathBuf {
        self.sysfs_root
            .join(CPUSET_PREFIX)
            .join(self.flavor.cgroup_dir(cgroup_path))
            .join(CPUSET_FILE)
    }
}
