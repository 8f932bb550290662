//! Resource accounting records exchanged between the scanner, the aggregator
//! and the exporter.
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// The maximum allowed length for a [`ResourceName`].
const RESOURCE_NAME_MAX_LEN: usize = 253;

/// Identifier of a NUMA node as exported by the kernel (`nodeN`).
pub type NumaId = u32;

/// Logical CPU identifier.
pub type CpuId = u32;

/// Remaining quantity per resource name. Signed: over-subscription shows up as
/// a negative value instead of being hidden.
pub type ResourceQuantities = BTreeMap<ResourceName, i64>;

/// A validated, trackable resource name such as `cpu` or `intel.com/sriov_net`.
///
/// # Examples
///
/// ```
/// # use resource_topology_exporter::resources::ResourceName;
/// let name = ResourceName::new("intel.com/sriov_net").unwrap();
/// assert_eq!(name.as_ref(), "intel.com/sriov_net");
/// assert!(!name.is_cpu());
/// assert!(ResourceName::cpu().is_cpu());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceName(Arc<str>);

impl ResourceName {
    /// Name under which CPU cores are accounted.
    pub const CPU: &'static str = "cpu";

    /// Creates a new `ResourceName`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResourceName`] if the name is empty, longer than
    /// [`RESOURCE_NAME_MAX_LEN`] or contains whitespace.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty()
            || src.len() > RESOURCE_NAME_MAX_LEN
            || src.chars().any(char::is_whitespace)
        {
            return Err(Error::InvalidResourceName(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    pub fn cpu() -> Self {
        Self(Self::CPU.into())
    }

    pub fn is_cpu(&self) -> bool {
        &*self.0 == Self::CPU
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ResourceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ResourceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for ResourceName {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// Concrete units of one resource held by a container: CPU ids rendered as
/// strings, or PCI addresses.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResourceInfo {
    pub name: ResourceName,
    pub data: Vec<String>,
}

impl ResourceInfo {
    pub fn new(name: ResourceName, data: Vec<String>) -> Self {
        Self { name, data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContainerResources {
    pub name: String,
    pub resources: Vec<ResourceInfo>,
}

/// Allocations recovered for one watchable pod during a single scan cycle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PodResources {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ContainerResources>,
}

/// Remaining quantities of every tracked resource on one NUMA node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NumaNodeResource {
    #[serde(rename = "numaID")]
    pub numa_id: NumaId,
    pub resources: ResourceQuantities,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name_validation() {
        assert!(ResourceName::new("openshift.io/dpdk_nic").is_ok());
        assert!(matches!(
            ResourceName::new(""),
            Err(Error::InvalidResourceName(_))
        ));
        assert!(matches!(
            ResourceName::new("net dev"),
            Err(Error::InvalidResourceName(_))
        ));
        assert!(ResourceName::new("x".repeat(RESOURCE_NAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn test_cpu_resource_name() {
        let cpu: ResourceName = "cpu".parse().unwrap();
        assert!(cpu.is_cpu());
        assert_eq!(cpu, ResourceName::cpu());
    }

    #[test]
    fn test_quantities_lookup_by_str() {
        let mut quantities = ResourceQuantities::new();
        quantities.insert(ResourceName::cpu(), 4);
        assert_eq!(quantities.get("cpu"), Some(&4));
    }

    #[test]
    fn test_numa_node_resource_serialization() {
        let mut resources = ResourceQuantities::new();
        resources.insert(ResourceName::cpu(), 2);
        resources.insert(ResourceName::new("net-dev").unwrap(), -1);
        let node = NumaNodeResource {
            numa_id: 1,
            resources,
        };

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"numaID": 1, "resources": {"cpu": 2, "net-dev": -1}})
        );
    }
}
