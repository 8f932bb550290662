use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::cgroup::RuntimeFlavor;
use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid duration `{0}`, expected e.g. `500ms`, `1.5s`, `1m30s` or bare seconds")]
    InvalidDuration(String),
    #[error("failed to determine node name: {0}")]
    NodeName(#[source] fsutil::FileReadError),
}

/// Reports the free CPU and SR-IOV device capacity of every NUMA node.
#[derive(Debug, Clone, Parser)]
#[command(name = "resource-topology-exporter", version, about)]
pub struct Config {
    /// CRI runtime endpoint (unix socket path, optionally `unix://` prefixed).
    #[arg(
        long,
        env = "RTE_CRI_PATH",
        default_value = "/host-run/containerd/containerd.sock"
    )]
    pub cri_path: String,

    /// Pause between two scan cycles.
    #[arg(long, env = "RTE_SLEEP_INTERVAL", default_value = "3s", value_parser = parse_duration)]
    pub sleep_interval: Duration,

    /// Only account pods of this namespace; empty watches all namespaces.
    #[arg(long, env = "RTE_WATCH_NAMESPACE", default_value = "")]
    pub watch_namespace: String,

    /// Mount point of the host's sysfs.
    #[arg(long, env = "RTE_SYSFS", default_value = "/host-sys")]
    pub sysfs: PathBuf,

    /// JSON file mapping SR-IOV physical function addresses to resource names.
    #[arg(long, env = "RTE_PCI_TO_RESOURCE_MAP", default_value = "pcimap.json")]
    pub pci_to_resource_map: PathBuf,

    /// SR-IOV device plugin config; when set, the PCI to resource map is
    /// derived from its selectors and `--pci-to-resource-map` is ignored.
    #[arg(long, env = "RTE_SRIOVDP_CONFIG")]
    pub sriovdp_config: Option<PathBuf>,

    /// Container runtime whose cgroup layout is on the host (`containerd` or `cri-o`).
    #[arg(long, env = "RTE_CONTAINER_RUNTIME", default_value = "containerd")]
    pub container_runtime: RuntimeFlavor,

    /// Address the HTTP API listens on.
    #[arg(long, env = "RTE_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Name the snapshot is published under; defaults to the host name.
    #[arg(long, env = "NODE_NAME")]
    pub node_name: Option<String>,

    /// Topology manager policy reported alongside the zones.
    #[arg(long, env = "RTE_TOPOLOGY_POLICY", default_value = "none")]
    pub topology_policy: String,
}

impl Config {
    pub fn namespace_filter(&self) -> Option<String> {
        Some(self.watch_namespace.trim())
            .filter(|ns| !ns.is_empty())
            .map(str::to_owned)
    }

    /// Configured node name, or the host name from `/etc/hostname` and then
    /// `/proc/sys/kernel/hostname`.
    pub fn node_name(&self) -> Result<String, Error> {
        if let Some(name) = self.node_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return Ok(name.to_owned());
        }
        hostname(Path::new("/etc/hostname"), Path::new("/proc/sys/kernel/hostname"))
    }
}

fn hostname(primary: &Path, fallback: &Path) -> Result<String, Error> {
    fsutil::read_trimmed(primary)
        .ok()
        .filter(|name| !name.is_empty())
        .map_or_else(|| fsutil::read_trimmed(fallback), Ok)
        .map_err(Error::NodeName)
}

/// Parses a duration such as `500ms`, `1m30s`, `1h`, `1.5s` or a bare
/// number of seconds.
pub fn parse_duration(src: &str) -> Result<Duration, Error> {
    let src = src.trim();
    let invalid = || Error::InvalidDuration(src.to_owned());

    if let Ok(secs) = src.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|_| invalid());
    }
    if let Ok(duration) = humantime::parse_duration(src) {
        return Ok(duration);
    }

    // humantime has no fractions; accept a single fractional component
    let idx = src
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(invalid)?;
    let (value, unit) = src.split_at(idx);
    let value: f64 = value.parse().map_err(|_| invalid())?;
    let scale = match unit {
        "ms" => 1e-3,
        "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return Err(invalid()),
    };
    Duration::try_from_secs_f64(value * scale).map_err(|_| invalid())
}
