//! Resource Topology Exporter: reports, per NUMA node, how many CPUs and
//! SR-IOV virtual functions are still free.
//!
//! The hardware topology is discovered once from sysfs. Every cycle the CRI
//! runtime is asked which containers are running, their cpusets and
//! device-plugin allocations are recovered, and the remainder is published.
use std::sync::Arc;

use cgroup::CpusetLocator;
use config::Config;
use discovery::{CriClient, RuntimeService, Scanner};
use error::{Error, ResultOkLogExt};
use exporter::{ApiServer, Exporter, SnapshotStore};
use pcimap::PciResourceConfig;
use resources::NumaNodeResource;
use topology::Topology;

pub mod aggregator;
pub mod cgroup;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exporter;
pub mod fsutil;
pub mod grpc;
pub mod pcimap;
pub mod resources;
pub mod topology;

#[cfg(test)]
mod testutil;

pub mod cri {
    pub mod runtime {
        pub mod v1 {
            tonic::include_proto!("runtime.v1");
        }
    }
}

/// Runs the exporter until a snapshot cannot be published.
///
/// # Errors
///
/// Startup fails if the PCI map cannot be loaded, the topology cannot be
/// discovered, the runtime cannot be reached or the API cannot bind. After
/// startup only a failed export ends the loop; failed scans are logged and
/// retried after the sleep interval.
pub async fn run(config: Config) -> error::Result<()> {
    let topology = Arc::new(load_topology(&config)?);
    let node_name = config.node_name()?;
    log::debug!("Node name: {node_name}");

    let client = CriClient::connect(&config.cri_path, grpc::DEFAULT_DIAL_TIMEOUT).await?;
    if let Some(version) = client.version().await.ok_log() {
        log::info!(
            "connected to {} {} (CRI {})",
            version.runtime_name,
            version.runtime_version,
            version.runtime_api_version
        );
    }

    let store = SnapshotStore::new(
        &node_name,
        &config.topology_policy,
        topology.capacity().clone(),
    );
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .map_err(|source| Error::Bind {
            addr: config.listen,
            source,
        })?;
    {
        let api = ApiServer::new(store.clone());
        tokio::spawn(async move {
            if let Err(err) = api.serve(listener).await {
                log::error!("API server stopped: {err}");
            }
        });
    }

    let scanner = Scanner::new(
        client,
        topology,
        CpusetLocator::new(&config.sysfs, config.container_runtime),
        config.namespace_filter(),
    );
    log::info!(
        "scanning {} every {:?}",
        config.namespace_filter().as_deref().unwrap_or("all namespaces"),
        config.sleep_interval
    );

    loop {
        run_cycle(&scanner, &store).await?;
        tokio::time::sleep(config.sleep_interval).await;
    }
}

/// Builds the capacity model from sysfs and the configured PCI map.
///
/// With `--sriovdp-config` set the map is derived by matching the device
/// plugin's selectors against the discovered PCI devices; otherwise the flat
/// `--pci-to-resource-map` file is read.
///
/// # Errors
///
/// The map cannot be loaded or the sysfs trees cannot be read.
pub fn load_topology(config: &Config) -> error::Result<Topology> {
    let Some(sriovdp) = &config.sriovdp_config else {
        let pci_config = PciResourceConfig::load(&config.pci_to_resource_map)?;
        log_pci_config(&pci_config);
        return Ok(Topology::discover(&config.sysfs, &pci_config)?);
    };

    let devices = topology::discover_pci_devices(&config.sysfs)?;
    let pci_config = PciResourceConfig::load_sriovdp(sriovdp, &devices)?;
    log_pci_config(&pci_config);
    let nodes = topology::discover_numa_nodes(&config.sysfs)?;
    log::info!(
        "discovered {} NUMA nodes and {} PCI devices below `{}`",
        nodes.len(),
        devices.len(),
        config.sysfs.display()
    );

    Ok(Topology::new(nodes, &devices, &pci_config))
}

fn log_pci_config(pci_config: &PciResourceConfig) {
    if pci_config.is_empty() {
        log::warn!("no PCI physical function is mapped to a resource");
    }
    for (parent, name) in pci_config.iter() {
        log::info!("PCI physical function {parent} provides resource {name}");
    }
}

/// One scan, aggregate and export pass.
///
/// Returns `Ok(None)` when the scan itself failed and nothing was exported.
///
/// # Errors
///
/// Only export failures are returned.
pub async fn run_cycle<R, E>(
    scanner: &Scanner<R>,
    exporter: &E,
) -> std::result::Result<Option<Vec<NumaNodeResource>>, exporter::Error>
where
    R: RuntimeService,
    E: Exporter,
{
    let report = match scanner.scan().await {
        Ok(report) => report,
        Err(err) => {
            log::error!("scan failed, skipping cycle: {err}");
            return Ok(None);
        }
    };
    if !report.skipped.is_empty() {
        log::debug!("{} pods or containers were skipped", report.skipped.len());
    }

    let nodes = aggregator::aggregate(scanner.topology(), &report.pods);
    exporter.export(&nodes).await?;
    log::trace!("exported {nodes:?}");

    Ok(Some(nodes))
}
