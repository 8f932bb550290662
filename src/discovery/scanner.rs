use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::cgroup::{CpusetLocator, read_cpuset};
use crate::cri::runtime::v1::{Container, PodSandbox};
use crate::resources::{ContainerResources, CpuId, PodResources, ResourceInfo, ResourceName};
use crate::topology::Topology;

use super::info::{ContainerInfo, INFO_KEY};
use super::{RuntimeService, ScanError, SkipReason, Skipped};

/// Prefix of the variables device plugins inject with allocated PCI addresses.
pub const PCI_DEVICE_ENV_PREFIX: &str = "PCIDEVICE_";

/// Result of one scan cycle.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Watchable ready pods with the containers that could be accounted.
    pub pods: Vec<PodResources>,
    pub skipped: Vec<Skipped>,
}

/// Recovers which CPUs and PCI devices every running container holds.
pub struct Scanner<R> {
    runtime: R,
    topology: Arc<Topology>,
    locator: CpusetLocator,
    namespace: Option<String>,
}

impl<R: RuntimeService> Scanner<R> {
    /// `namespace` restricts the scan to a single pod namespace; `None` or an
    /// empty string watches every namespace.
    pub fn new(
        runtime: R,
        topology: Arc<Topology>,
        locator: CpusetLocator,
        namespace: Option<String>,
    ) -> Self {
        Self {
            runtime,
            topology,
            locator,
            namespace: namespace.filter(|ns| !ns.is_empty()),
        }
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    fn is_watchable(&self, namespace: &str) -> bool {
        self.namespace.as_deref().is_none_or(|watched| watched == namespace)
    }

    /// Runs one scan over the runtime's ready sandboxes.
    ///
    /// # Errors
    ///
    /// Only a failure to list the sandboxes aborts the scan. Everything below
    /// that level is recorded in [`ScanReport::skipped`].
    pub async fn scan(&self) -> Result<ScanReport, ScanError> {
        let sandboxes = self
            .runtime
            .ready_sandboxes()
            .await
            .map_err(|status| ScanError::ListSandboxes(Box::new(status)))?;
        log::debug!("found {} ready pod sandboxes", sandboxes.len());

        let mut report = ScanReport::default();
        for sandbox in &sandboxes {
            let (name, namespace) = sandbox
                .metadata
                .as_ref()
                .map(|meta| (meta.name.clone(), meta.namespace.clone()))
                .unwrap_or_default();

            if !self.is_watchable(&namespace) {
                log::debug!("skipping pod {namespace}/{name}: namespace is not watched");
                report.skipped.push(Skipped {
                    pod: name,
                    namespace,
                    container: None,
                    reason: SkipReason::NamespaceFiltered,
                });
                continue;
            }

            match self.scan_pod(sandbox, &name, &namespace, &mut report.skipped).await {
                Ok(containers) => report.pods.push(PodResources {
                    name,
                    namespace,
                    containers,
                }),
                Err(reason) => {
                    log::warn!("skipping pod {namespace}/{name}: {reason}");
                    report.skipped.push(Skipped {
                        pod: name,
                        namespace,
                        container: None,
                        reason,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn scan_pod(
        &self,
        sandbox: &PodSandbox,
        pod: &str,
        namespace: &str,
        skipped: &mut Vec<Skipped>,
    ) -> Result<Vec<ContainerResources>, SkipReason> {
        let containers = self
            .runtime
            .running_containers()
            .await
            .map_err(|status| SkipReason::ListContainers(Box::new(status)))?;

        let mut out = Vec::new();
        for container in containers
            .iter()
            .filter(|container| container.pod_sandbox_id == sandbox.id)
        {
            match self.scan_container(container).await {
                Ok(resources) => {
                    log::trace!(
                        "pod {namespace}/{pod} container {} holds {:?}",
                        resources.name,
                        resources.resources
                    );
                    out.push(resources);
                }
                Err(reason) => {
                    let name = container_name(container);
                    log::warn!("skipping container {name} of pod {namespace}/{pod}: {reason}");
                    skipped.push(Skipped {
                        pod: pod.to_owned(),
                        namespace: namespace.to_owned(),
                        container: Some(name),
                        reason,
                    });
                }
            }
        }

        Ok(out)
    }

    async fn scan_container(&self, container: &Container) -> Result<ContainerResources, SkipReason> {
        let response = self
            .runtime
            .verbose_status(&container.id)
            .await
            .map_err(|status| SkipReason::Status(Box::new(status)))?;
        let status = response.status.as_ref().ok_or(SkipReason::MissingStatus)?;
        let name = status
            .metadata
            .as_ref()
            .map(|meta| meta.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| container_name(container));

        let raw = response.info.get(INFO_KEY).ok_or(SkipReason::MissingInfo)?;
        let info = ContainerInfo::from_json(raw).map_err(SkipReason::DecodeInfo)?;
        info.linux_resources()
            .ok_or(SkipReason::MissingLinuxResources)?;
        let env = info.environment().ok_or(SkipReason::MissingEnvironment)?;
        let cgroup_path = info.cgroups_path().ok_or(SkipReason::MissingCgroupPath)?;

        let cpuset_file = self.locator.cpuset_file(cgroup_path);
        log::trace!("container {name}: reading cpuset from `{}`", cpuset_file.display());
        let cpus = read_cpuset(&cpuset_file)?;

        let mut resources = vec![cpu_resource(&cpus)];
        resources.extend(pci_device_resources(&env, &self.topology));

        Ok(ContainerResources { name, resources })
    }
}

fn container_name(container: &Container) -> String {
    container
        .metadata
        .as_ref()
        .map(|meta| meta.name.clone())
        .unwrap_or_else(|| container.id.clone())
}

/// `cpu` allocation with the CPU ids rendered as strings.
pub fn cpu_resource(cpus: &BTreeSet<CpuId>) -> ResourceInfo {
    ResourceInfo::new(
        ResourceName::cpu(),
        cpus.iter().map(ToString::to_string).collect(),
    )
}

/// Allocations announced through `PCIDEVICE_*` variables, in key order.
///
/// The resource name is taken from the first address of each variable; a
/// variable whose first address is not a bound virtual function is dropped.
pub fn pci_device_resources(
    env: &BTreeMap<String, String>,
    topology: &Topology,
) -> Vec<ResourceInfo> {
    env.iter()
        .filter(|(key, _)| key.starts_with(PCI_DEVICE_ENV_PREFIX))
        .filter_map(|(key, value)| {
            let addresses: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|address| !address.is_empty())
                .map(str::to_owned)
                .collect();
            let first = addresses.first()?;
            match topology.resource_for_pci(first) {
                Some(resource) => Some(ResourceInfo::new(resource.clone(), addresses)),
                None => {
                    log::debug!("{key}: `{first}` is not a tracked virtual function");
                    None
                }
            }
        })
        .collect()
}
