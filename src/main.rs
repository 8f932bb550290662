use clap::Parser;

use resource_topology_exporter::config::Config;

/// Entry point of the resource topology exporter.
///
/// Discovers the NUMA topology of the host, then periodically scans the
/// container runtime and publishes the remaining per-NUMA capacity over HTTP.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=info resource-topology-exporter --sysfs /host-sys \
///     --cri-path /host-run/containerd/containerd.sock --pci-to-resource-map pcimap.json
/// ```
#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let config = Config::parse();
    resource_topology_exporter::run(config).await?;
    Ok(())
}
