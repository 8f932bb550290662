//! Fake sysfs trees and container runtimes for tests.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::cri::runtime::v1::{
    Container, ContainerMetadata, ContainerStatus, ContainerStatusResponse, PodSandbox,
    PodSandboxMetadata,
};
use crate::discovery::RuntimeService;
use crate::discovery::info::INFO_KEY;

pub enum FakeDevice<'a> {
    Plain,
    PhysicalFunction(u32),
    VirtualFunction(&'a str),
}

/// A temporary directory laid out like the subset of `/sys` the exporter reads.
pub struct FakeSysfs {
    dir: TempDir,
}

impl Default for FakeSysfs {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSysfs {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create fake sysfs root"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn dir(&self, rel: impl AsRef<Path>) -> &Self {
        std::fs::create_dir_all(self.root().join(rel)).unwrap();
        self
    }

    pub fn file(&self, rel: impl AsRef<Path>, content: &str) -> &Self {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("{content}\n")).unwrap();
        self
    }

    pub fn numa_node(&self, id: u32, cpulist: &str) -> &Self {
        self.file(format!("devices/system/node/node{id}/cpulist"), cpulist)
    }

    pub fn pci_device(&self, address: &str, numa_node: i32, kind: FakeDevice<'_>) -> &Self {
        let base = PathBuf::from("bus/pci/devices").join(address);
        self.file(base.join("vendor"), "0x8086")
            .file(base.join("device"), "0x154c")
            .file(base.join("class"), "0x020000")
            .file(base.join("numa_node"), &numa_node.to_string());
        match kind {
            FakeDevice::Plain => {}
            FakeDevice::PhysicalFunction(total_vfs) => {
                self.file(base.join("sriov_totalvfs"), &total_vfs.to_string());
            }
            FakeDevice::VirtualFunction(parent) => {
                std::os::unix::fs::symlink(
                    format!("../{parent}"),
                    self.root().join(base).join("physfn"),
                )
                .unwrap();
            }
        }
        self
    }

    /// Overrides the vendor and device ids of an existing fake device.
    pub fn pci_ids(&self, address: &str, vendor: &str, device: &str) -> &Self {
        let base = PathBuf::from("bus/pci/devices").join(address);
        self.file(base.join("vendor"), &format!("0x{vendor}"))
            .file(base.join("device"), &format!("0x{device}"))
    }

    /// Writes `cpuset.cpus` below `fs/cgroup/cpuset/<dir>`.
    pub fn cpuset(&self, dir: &str, cpus: &str) -> &Self {
        let dir = dir.trim_start_matches('/');
        self.file(
            PathBuf::from("fs/cgroup/cpuset").join(dir).join("cpuset.cpus"),
            cpus,
        )
    }
}

/// In-memory runtime serving canned sandboxes, containers and statuses.
#[derive(Default)]
pub struct FakeRuntime {
    pub sandboxes: Vec<PodSandbox>,
    pub containers: Vec<Container>,
    pub statuses: HashMap<String, ContainerStatusResponse>,
    pub fail_sandboxes: bool,
    pub fail_containers: bool,
}

impl FakeRuntime {
    pub fn pod(mut self, id: &str, name: &str, namespace: &str) -> Self {
        self.sandboxes.push(PodSandbox {
            id: id.to_owned(),
            metadata: Some(PodSandboxMetadata {
                name: name.to_owned(),
                namespace: namespace.to_owned(),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    pub fn container(mut self, id: &str, sandbox: &str, name: &str, info: Option<&str>) -> Self {
        self.containers.push(Container {
            id: id.to_owned(),
            pod_sandbox_id: sandbox.to_owned(),
            metadata: Some(ContainerMetadata {
                name: name.to_owned(),
                attempt: 0,
            }),
            ..Default::default()
        });
        let info = info
            .map(|blob| HashMap::from([(INFO_KEY.to_owned(), blob.to_owned())]))
            .unwrap_or_default();
        self.statuses.insert(
            id.to_owned(),
            ContainerStatusResponse {
                status: Some(ContainerStatus {
                    id: id.to_owned(),
                    metadata: Some(ContainerMetadata {
                        name: name.to_owned(),
                        attempt: 0,
                    }),
                    ..Default::default()
                }),
                info,
            },
        );
        self
    }
}

impl RuntimeService for FakeRuntime {
    async fn ready_sandboxes(&self) -> Result<Vec<PodSandbox>, tonic::Status> {
        if self.fail_sandboxes {
            return Err(tonic::Status::unavailable("runtime is down"));
        }
        Ok(self.sandboxes.clone())
    }

    async fn running_containers(&self) -> Result<Vec<Container>, tonic::Status> {
        if self.fail_containers {
            return Err(tonic::Status::internal("listing failed"));
        }
        Ok(self.containers.clone())
    }

    async fn verbose_status(
        &self,
        container_id: &str,
    ) -> Result<ContainerStatusResponse, tonic::Status> {
        self.statuses
            .get(container_id)
            .cloned()
            .ok_or_else(|| tonic::Status::not_found(container_id.to_owned()))
    }
}

/// Minimal verbose info blob with linux resources, a cgroup path and a
/// process environment.
pub fn info_blob(cgroup_path: &str, env: &[&str]) -> String {
    serde_json::json!({
        "sandboxID": "unused",
        "pid": 1,
        "runtimeSpec": {
            "process": {"env": env},
            "linux": {
                "resources": {"cpu": {"shares": 1024}},
                "cgroupsPath": cgroup_path
            }
        }
    })
    .to_string()
}
