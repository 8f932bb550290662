//! One-time discovery of the machine's NUMA, CPU and PCI topology and the
//! resulting per-node capacity model.
//!
//! The sysfs tree is scanned once at startup; hardware topology is assumed to
//! stay fixed for the lifetime of the process. The resulting [`Topology`] is
//! immutable and can be shared freely between the scanner and the aggregator.
//!
//! # Layout read below the configured sysfs root
//!
//! - `devices/system/node/nodeN/cpulist`
//! - `bus/pci/devices/<addr>/{vendor,device,class,numa_node}`
//! - `bus/pci/devices/<addr>/physfn` (virtual functions)
//! - `bus/pci/devices/<addr>/sriov_totalvfs` (physical functions)
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

mod binder;
mod cpulist;
mod error;
mod node;
mod pci;

pub use binder::{Binding, bind_virtual_functions};
pub use cpulist::{CpuListError, parse_cpu_list};
pub use error::{Error, Result};
pub use node::discover_numa_nodes;
pub use pci::{PciAddress, PciDevice, PciDeviceKind, discover_pci_devices};

use crate::pcimap::PciResourceConfig;
use crate::resources::{CpuId, NumaId, ResourceName, ResourceQuantities};

/// Full capacity per NUMA node; every node carries a `cpu` entry.
pub type CapacityTable = BTreeMap<NumaId, ResourceQuantities>;

/// Immutable capacity model plus the lookup indices used to attribute
/// allocations to NUMA nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    capacity: CapacityTable,
    cpu_to_numa: HashMap<CpuId, NumaId>,
    pci_to_numa: HashMap<PciAddress, NumaId>,
    pci_to_resource: HashMap<PciAddress, ResourceName>,
}

impl Topology {
    /// Scans the sysfs tree rooted at `sysfs_root` and builds the capacity model.
    ///
    /// # Errors
    ///
    /// Any failure to read or parse the NUMA node or PCI device trees. These are
    /// fatal: without a capacity baseline nothing can be accounted.
    pub fn discover(sysfs_root: impl AsRef<Path>, config: &PciResourceConfig) -> Result<Self> {
        let sysfs_root = sysfs_root.as_ref();
        let nodes = discover_numa_nodes(sysfs_root)?;
        let devices = discover_pci_devices(sysfs_root)?;
        log::info!(
            "discovered {} NUMA nodes and {} PCI devices below `{}`",
            nodes.len(),
            devices.len(),
            sysfs_root.display()
        );

        Ok(Self::new(nodes, &devices, config))
    }

    /// Builds the capacity model from already discovered hardware.
    pub fn new(
        nodes: BTreeMap<NumaId, BTreeSet<CpuId>>,
        devices: &[PciDevice],
        config: &PciResourceConfig,
    ) -> Self {
        let node_ids: BTreeSet<NumaId> = nodes.keys().copied().collect();
        let binding = bind_virtual_functions(&node_ids, devices, config);

        let mut cpu_to_numa = HashMap::new();
        let mut capacity = CapacityTable::new();
        for (node, cpus) in &nodes {
            for cpu in cpus {
                cpu_to_numa.insert(*cpu, *node);
            }

            let mut quantities = binding.per_node.get(node).cloned().unwrap_or_default();
            quantities.insert(ResourceName::cpu(), cpus.len() as i64);
            capacity.insert(*node, quantities);
        }

        Self {
            capacity,
            cpu_to_numa,
            pci_to_numa: binding.pci_to_numa,
            pci_to_resource: binding.pci_to_resource,
        }
    }

    pub fn capacity(&self) -> &CapacityTable {
        &self.capacity
    }

    pub fn numa_ids(&self) -> impl Iterator<Item = NumaId> + '_ {
        self.capacity.keys().copied()
    }

    pub fn numa_for_cpu(&self, cpu: CpuId) -> Option<NumaId> {
        self.cpu_to_numa.get(&cpu).copied()
    }

    /// NUMA node owning a bound virtual function. Non-canonical or unbound
    /// addresses yield `None`.
    pub fn numa_for_pci(&self, address: &str) -> Option<NumaId> {
        let address = address.trim().parse::<PciAddress>().ok()?;
        self.pci_to_numa.get(&address).copied()
    }

    /// Resource name a bound virtual function is accounted under.
    pub fn resource_for_pci(&self, address: &str) -> Option<&ResourceName> {
        let address = address.trim().parse::<PciAddress>().ok()?;
        self.pci_to_resource.get(&address)
    }

    pub fn pci_to_resource(&self) -> &HashMap<PciAddress, ResourceName> {
        &self.pci_to_resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeDevice, FakeSysfs};

    fn config() -> PciResourceConfig {
        PciResourceConfig::from_iter([(
            "0000:01:00.0".parse().unwrap(),
            ResourceName::new("net-dev").unwrap(),
        )])
    }

    fn fake_machine() -> FakeSysfs {
        let sysfs = FakeSysfs::new();
        sysfs
            .numa_node(0, "0-3")
            .numa_node(1, "4-7")
            .pci_device("0000:01:00.0", 0, FakeDevice::PhysicalFunction(2))
            .pci_device("0000:01:00.1", 0, FakeDevice::VirtualFunction("0000:01:00.0"))
            .pci_device("0000:02:00.0", 1, FakeDevice::PhysicalFunction(2))
            .pci_device("0000:02:00.1", 1, FakeDevice::VirtualFunction("0000:02:00.0"))
            .pci_device("0000:00:1f.0", -1, FakeDevice::Plain);
        sysfs
    }

    #[test]
    fn test_discover_capacity() {
        let sysfs = fake_machine();
        let topology = Topology::discover(sysfs.root(), &config()).unwrap();

        let capacity = topology.capacity();
        assert_eq!(capacity.len(), 2);
        assert_eq!(capacity[&0]["cpu"], 4);
        assert_eq!(capacity[&0]["net-dev"], 1);
        assert_eq!(capacity[&1]["cpu"], 4);
        assert_eq!(capacity[&1].len(), 1);
        assert_eq!(topology.numa_ids().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_lookup_indices() {
        let sysfs = fake_machine();
        let topology = Topology::discover(sysfs.root(), &config()).unwrap();

        assert_eq!(topology.numa_for_cpu(5), Some(1));
        assert_eq!(topology.numa_for_cpu(64), None);
        assert_eq!(topology.numa_for_pci("0000:01:00.1"), Some(0));
        assert_eq!(topology.numa_for_pci("0000:01:00.1\n"), Some(0));
        assert_eq!(topology.numa_for_pci("0000:02:00.1"), None);
        assert_eq!(topology.numa_for_pci("garbage"), None);
        assert_eq!(
            topology.resource_for_pci("0000:01:00.1").map(ResourceName::as_str),
            Some("net-dev")
        );
        assert_eq!(topology.pci_to_resource().len(), 1);
    }

    #[test]
    fn test_unmapped_vf_contributes_no_capacity() {
        let sysfs = fake_machine();
        let topology = Topology::discover(sysfs.root(), &PciResourceConfig::default()).unwrap();

        for quantities in topology.capacity().values() {
            assert_eq!(quantities.len(), 1);
            assert!(quantities.contains_key("cpu"));
        }
        assert!(topology.pci_to_resource().is_empty());
    }

    #[test]
    fn test_discover_fails_without_pci_tree() {
        let sysfs = FakeSysfs::new();
        sysfs.numa_node(0, "0-1");
        let err = Topology::discover(sysfs.root(), &config()).unwrap_err();
        assert!(matches!(err, Error::ReadDir { .. }));
    }
}
