//! Binds SR-IOV virtual functions to operator-configured resource names.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::pcimap::PciResourceConfig;
use crate::resources::{NumaId, ResourceName};

use super::pci::{PciAddress, PciDevice};

/// Device capacity and lookup indices derived from the bound virtual functions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Binding {
    pub pci_to_resource: HashMap<PciAddress, ResourceName>,
    pub pci_to_numa: HashMap<PciAddress, NumaId>,
    pub per_node: BTreeMap<NumaId, BTreeMap<ResourceName, i64>>,
}

/// Binds every virtual function whose parent function is configured.
///
/// Only virtual functions attached to one of `nodes` take part. Plain devices,
/// physical functions, VFs without NUMA affinity and VFs whose parent is not
/// in `config` are left out of the binding entirely.
pub fn bind_virtual_functions(
    nodes: &BTreeSet<NumaId>,
    devices: &[PciDevice],
    config: &PciResourceConfig,
) -> Binding {
    let mut binding = Binding::default();

    for device in devices {
        let Some(parent) = device.parent_function() else {
            continue;
        };
        let Some(node) = device.numa_node.filter(|node| nodes.contains(node)) else {
            log::debug!(
                "VF {} has no affinity to a known NUMA node, not tracked",
                device.address
            );
            continue;
        };
        let Some(resource) = config.resource_for(parent) else {
            log::debug!(
                "VF {} parent {} is not mapped to a resource, not tracked",
                device.address,
                parent
            );
            continue;
        };

        log::info!(
            "binding VF {} (parent {}) to resource {} on NUMA node {}",
            device.address,
            parent,
            resource,
            node
        );
        binding
            .pci_to_resource
            .insert(device.address.clone(), resource.clone());
        binding.pci_to_numa.insert(device.address.clone(), node);
        *binding
            .per_node
            .entry(node)
            .or_default()
            .entry(resource.clone())
            .or_insert(0) += 1;
    }

    binding
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::PciDeviceKind;

    fn addr(s: &str) -> PciAddress {
        s.parse().unwrap()
    }

    fn device(address: &str, numa_node: Option<NumaId>, kind: PciDeviceKind) -> PciDevice {
        PciDevice {
            address: addr(address),
            numa_node,
            vendor: "8086".to_owned(),
            device: "154c".to_owned(),
            class: "020000".to_owned(),
            kind,
        }
    }

    fn vf(address: &str, numa_node: Option<NumaId>, parent: &str) -> PciDevice {
        device(
            address,
            numa_node,
            PciDeviceKind::VirtualFunction {
                parent: addr(parent),
            },
        )
    }

    fn config() -> PciResourceConfig {
        PciResourceConfig::from_iter([
            (addr("0000:01:00.0"), ResourceName::new("net-dev").unwrap()),
            (addr("0000:81:00.0"), ResourceName::new("accel").unwrap()),
        ])
    }

    #[test]
    fn test_counts_vfs_per_node_and_resource() {
        let nodes = BTreeSet::from([0, 1]);
        let devices = vec![
            device(
                "0000:01:00.0",
                Some(0),
                PciDeviceKind::PhysicalFunction { total_vfs: 8 },
            ),
            vf("0000:01:00.2", Some(0), "0000:01:00.0"),
            vf("0000:01:00.3", Some(0), "0000:01:00.0"),
            vf("0000:81:00.1", Some(1), "0000:81:00.0"),
        ];

        let binding = bind_virtual_functions(&nodes, &devices, &config());

        assert_eq!(binding.pci_to_resource.len(), 3);
        assert_eq!(binding.pci_to_resource["0000:01:00.2"].as_str(), "net-dev");
        assert_eq!(binding.pci_to_numa["0000:81:00.1"], 1);
        assert_eq!(binding.per_node[&0]["net-dev"], 2);
        assert_eq!(binding.per_node[&1]["accel"], 1);
        assert!(!binding.per_node[&0].contains_key("accel"));
        // the PF itself is not a trackable unit
        assert!(!binding.pci_to_resource.contains_key("0000:01:00.0"));
    }

    #[test]
    fn test_vf_with_unmapped_parent_is_excluded() {
        let nodes = BTreeSet::from([0]);
        let devices = vec![vf("0000:02:00.1", Some(0), "0000:02:00.0")];

        let binding = bind_virtual_functions(&nodes, &devices, &config());
        assert_eq!(binding, Binding::default());
    }

    #[test]
    fn test_vf_without_known_node_is_excluded() {
        let nodes = BTreeSet::from([0]);
        let devices = vec![
            vf("0000:01:00.2", None, "0000:01:00.0"),
            vf("0000:01:00.3", Some(3), "0000:01:00.0"),
        ];

        let binding = bind_virtual_functions(&nodes, &devices, &config());
        assert!(binding.pci_to_resource.is_empty());
        assert!(binding.per_node.is_empty());
    }

    #[test]
    fn test_plain_device_at_mapped_address_is_excluded() {
        let nodes = BTreeSet::from([0]);
        let devices = vec![device("0000:01:00.0", Some(0), PciDeviceKind::Plain)];

        let binding = bind_virtual_functions(&nodes, &devices, &config());
        assert!(binding.pci_to_resource.is_empty());
    }
}
