use std::borrow::Borrow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::fsutil;
use crate::resources::NumaId;

use super::{Error, Result};

/// Location of the PCI device links relative to the sysfs root.
pub const PCI_DEVICES_DIR: &str = "bus/pci/devices";

/// A PCI bus address in canonical `DDDD:BB:DD.F` form, stored lowercase.
///
/// # Examples
///
/// ```
/// # use resource_topology_exporter::topology::PciAddress;
/// let addr: PciAddress = "0000:3B:02.1".parse().unwrap();
/// assert_eq!(addr.as_ref(), "0000:3b:02.1");
/// assert!("3b:02.1".parse::<PciAddress>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PciAddress(Arc<str>);

impl PciAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PciAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidPciAddress(s.to_owned());
        let (domain, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (bus, rest) = rest.split_once(':').ok_or_else(invalid)?;
        let (device, function) = rest.split_once('.').ok_or_else(invalid)?;

        let is_hex = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_hexdigit())
        };
        if !is_hex(domain, 4) || !is_hex(bus, 2) || !is_hex(device, 2) {
            return Err(invalid());
        }
        if !matches!(function.as_bytes(), [b'0'..=b'7']) {
            return Err(invalid());
        }

        Ok(Self(s.to_ascii_lowercase().into()))
    }
}

impl AsRef<str> for PciAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PciAddress {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What role a device plays with respect to SR-IOV, decided once at discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PciDeviceKind {
    /// Not SR-IOV capable.
    Plain,
    /// SR-IOV physical function able to expose `total_vfs` virtual functions.
    PhysicalFunction { total_vfs: u32 },
    /// SR-IOV virtual function spawned by the physical function at `parent`.
    VirtualFunction { parent: PciAddress },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciDevice {
    pub address: PciAddress,
    /// `None` when the kernel reports no affinity (`numa_node` is `-1`).
    pub numa_node: Option<NumaId>,
    pub vendor: String,
    pub device: String,
    pub class: String,
    pub kind: PciDeviceKind,
}

impl PciDevice {
    pub fn parent_function(&self) -> Option<&PciAddress> {
        match &self.kind {
            PciDeviceKind::VirtualFunction { parent } => Some(parent),
            _ => None,
        }
    }
}

impl fmt::Display for PciDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vendor={} device={} class={} numa_node=",
            self.address, self.vendor, self.device, self.class
        )?;
        match self.numa_node {
            Some(node) => write!(f, "{node}")?,
            None => f.write_str("none")?,
        }
        match &self.kind {
            PciDeviceKind::Plain => Ok(()),
            PciDeviceKind::PhysicalFunction { total_vfs } => write!(f, " sriov_pf vfs={total_vfs}"),
            PciDeviceKind::VirtualFunction { parent } => write!(f, " sriov_vf parent={parent}"),
        }
    }
}

/// Enumerates every PCI device below `<sysfs>/bus/pci/devices`, sorted by address.
///
/// Entries whose names are not canonical PCI addresses are ignored.
///
/// # Errors
///
/// Returns an error if the device directory cannot be listed or a device
/// attribute cannot be read or parsed.
pub fn discover_pci_devices(sysfs_root: impl AsRef<Path>) -> Result<Vec<PciDevice>> {
    let dir = sysfs_root.as_ref().join(PCI_DEVICES_DIR);
    let entries = std::fs::read_dir(&dir).map_err(|source| Error::ReadDir {
        path: dir.clone(),
        source,
    })?;

    let mut devices = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::ReadDir {
            path: dir.clone(),
            source,
        })?;
        let Some(address) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<PciAddress>().ok())
        else {
            continue;
        };

        let device = read_device(&entry.path(), address)?;
        log::debug!("detected system PCI device = {device}");
        devices.push(device);
    }
    devices.sort_by(|a, b| a.address.cmp(&b.address));

    Ok(devices)
}

fn read_device(path: &Path, address: PciAddress) -> Result<PciDevice> {
    let vendor = read_hex_attribute(path, "vendor")?;
    let device = read_hex_attribute(path, "device")?;
    let class = read_hex_attribute(path, "class")?;
    let numa_node = read_numa_node(path)?;

    let physfn = path.join("physfn");
    let totalvfs = path.join("sriov_totalvfs");
    let kind = if physfn.symlink_metadata().is_ok() {
        let parent = fsutil::read_link_name(&physfn)?;
        PciDeviceKind::VirtualFunction {
            parent: parent.parse()?,
        }
    } else if totalvfs.exists() {
        let value = fsutil::read_trimmed(&totalvfs)?;
        let total_vfs = value.parse().map_err(|_| Error::InvalidAttribute {
            path: totalvfs,
            value,
        })?;
        PciDeviceKind::PhysicalFunction { total_vfs }
    } else {
        PciDeviceKind::Plain
    };

    Ok(PciDevice {
        address,
        numa_node,
        vendor,
        device,
        class,
        kind,
    })
}

fn read_hex_attribute(dir: &Path, name: &str) -> Result<String> {
    let value = fsutil::read_trimmed(dir.join(name))?;
    Ok(value
        .strip_prefix("0x")
        .unwrap_or(value.as_str())
        .to_ascii_lowercase())
}

fn read_numa_node(dir: &Path) -> Result<Option<NumaId>> {
    let path = dir.join("numa_node");
    if !path.exists() {
        return Ok(None);
    }
    let value = fsutil::read_trimmed(&path)?;
    match value.parse::<i64>() {
        Ok(node) if node < 0 => Ok(None),
        Ok(node) => NumaId::try_from(node)
            .map(Some)
            .map_err(|_| Error::InvalidAttribute { path, value }),
        Err(_) => Err(Error::InvalidAttribute { path, value }),
    }
}
