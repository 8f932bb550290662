//! Operator-supplied mapping from SR-IOV physical function address to the
//! resource name its virtual functions are accounted under.
//!
//! The file is a flat JSON object:
//!
//! ```json
//! { "0000:01:00.0": "intel.com/sriov_netdevice", "0000:81:00.0": "intel.com/qat" }
//! ```
//!
//! Alternatively the mapping is derived from an SR-IOV device plugin config
//! by matching each `resourceList` entry's selectors against the discovered
//! PCI devices; see [`PciResourceConfig::from_sriovdp`].
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::resources::{self, ResourceName};
use crate::topology::{self, PciAddress, PciDevice, PciDeviceKind};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read PCI to resource map `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode PCI to resource map: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("invalid physical function address in PCI to resource map: {0}")]
    Address(#[source] topology::Error),
    #[error("invalid resource name for `{address}` in PCI to resource map: {source}")]
    ResourceName {
        address: String,
        #[source]
        source: resources::Error,
    },
    #[error("resource name `{name}` for `{address}` is reserved for CPU accounting")]
    ReservedResourceName { address: String, name: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PciResourceConfig {
    resources: HashMap<PciAddress, ResourceName>,
}

impl PciResourceConfig {
    /// Loads the mapping from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not a JSON object of strings, or
    /// contains a malformed address or resource name.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&data)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self> {
        // BTreeMap keeps validation errors deterministic
        let raw: BTreeMap<String, String> = serde_json::from_slice(data).map_err(Error::Decode)?;

        let mut resources = HashMap::with_capacity(raw.len());
        for (address, name) in raw {
            let parsed = address.parse::<PciAddress>().map_err(Error::Address)?;
            resources.insert(parsed, resource_name(&address, &name)?);
        }

        Ok(Self { resources })
    }

    /// Loads an SR-IOV device plugin config and matches it against `devices`.
    ///
    /// # Errors
    ///
    /// Same as [`PciResourceConfig::load`], plus malformed `rootDevices`.
    pub fn load_sriovdp(path: impl AsRef<Path>, devices: &[PciDevice]) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_sriovdp(&data, devices)
    }

    /// Builds the mapping from an SR-IOV device plugin `resourceList`.
    ///
    /// Every device that is not a virtual function is offered to the resource
    /// pools in config order and claimed by the first pool whose selectors all
    /// match. An empty selector list matches any device. Only the `vendors`,
    /// `devices` and `rootDevices` selectors are evaluated.
    pub fn from_sriovdp(data: &[u8], devices: &[PciDevice]) -> Result<Self> {
        let config: SriovDpConfig = serde_json::from_slice(data).map_err(Error::Decode)?;
        let pools = config
            .resource_list
            .iter()
            .map(ResourcePool::new)
            .collect::<Result<Vec<_>>>()?;

        let mut resources = HashMap::new();
        for device in devices {
            if matches!(device.kind, PciDeviceKind::VirtualFunction { .. }) {
                continue;
            }
            if let Some(pool) = pools.iter().find(|pool| pool.matches(device)) {
                log::debug!("device {} selected by pool {}", device.address, pool.name);
                resources.insert(device.address.clone(), pool.name.clone());
            }
        }

        Ok(Self { resources })
    }

    pub fn resource_for(&self, parent: &PciAddress) -> Option<&ResourceName> {
        self.resources.get(parent)
    }

    /// Entries in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&PciAddress, &ResourceName)> {
        let mut entries: Vec<_> = self.resources.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn resource_name(address: &str, name: &str) -> Result<ResourceName> {
    let parsed = ResourceName::new(name).map_err(|source| Error::ResourceName {
        address: address.to_owned(),
        source,
    })?;
    if parsed.is_cpu() {
        return Err(Error::ReservedResourceName {
            address: address.to_owned(),
            name: name.to_owned(),
        });
    }
    Ok(parsed)
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SriovDpConfig {
    #[serde(default)]
    resource_list: Vec<SriovDpResource>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SriovDpResource {
    resource_name: String,
    #[serde(default)]
    selectors: SriovDpSelectors,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SriovDpSelectors {
    #[serde(default)]
    vendors: Vec<String>,
    #[serde(default)]
    devices: Vec<String>,
    #[serde(default)]
    root_devices: Vec<String>,
}

/// A `resourceList` entry with its selectors normalised for matching.
struct ResourcePool {
    name: ResourceName,
    vendors: Vec<String>,
    devices: Vec<String>,
    root_devices: Vec<PciAddress>,
}

impl ResourcePool {
    fn new(resource: &SriovDpResource) -> Result<Self> {
        let selectors = &resource.selectors;
        let root_devices = selectors
            .root_devices
            .iter()
            .map(|addr| {
                let addr = addr.trim();
                // the device plugin accepts `BB:DD.F` with an implicit domain
                let full = if addr.matches(':').count() == 1 {
                    format!("0000:{addr}")
                } else {
                    addr.to_owned()
                };
                full.parse::<PciAddress>().map_err(Error::Address)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: resource_name("resourceList", &resource.resource_name)?,
            vendors: selectors.vendors.iter().map(|id| hex_id(id)).collect(),
            devices: selectors.devices.iter().map(|id| hex_id(id)).collect(),
            root_devices,
        })
    }

    fn matches(&self, device: &PciDevice) -> bool {
        (self.vendors.is_empty() || self.vendors.contains(&device.vendor))
            && (self.devices.is_empty() || self.devices.contains(&device.device))
            && (self.root_devices.is_empty() || self.root_devices.contains(&device.address))
    }
}

fn hex_id(id: &str) -> String {
    let id = id.trim();
    id.strip_prefix("0x")
        .unwrap_or(id)
        .to_ascii_lowercase()
}

impl FromIterator<(PciAddress, ResourceName)> for PciResourceConfig {
    fn from_iter<T: IntoIterator<Item = (PciAddress, ResourceName)>>(iter: T) -> Self {
        Self {
            resources: iter.into_iter().collect(),
        }
    }
}
