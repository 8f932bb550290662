//! Reconciles live allocations against the static capacity model.
use crate::resources::{CpuId, NumaNodeResource, PodResources};
use crate::topology::{CapacityTable, Topology};

/// Computes the remaining quantity of every resource on every NUMA node.
///
/// Starts from a copy of the full capacity and takes off one unit for every
/// allocated CPU or PCI address that can be attributed to a node. Units the
/// topology does not know are ignored. Results are not clamped at zero: a
/// negative quantity means the same unit was reported more than once.
pub fn aggregate(topology: &Topology, pods: &[PodResources]) -> Vec<NumaNodeResource> {
    let mut remaining: CapacityTable = topology.capacity().clone();

    let allocations = pods
        .iter()
        .flat_map(|pod| &pod.containers)
        .flat_map(|container| &container.resources);
    for info in allocations {
        if info.name.is_cpu() {
            for cpu in &info.data {
                let Some(node) = cpu
                    .trim()
                    .parse::<CpuId>()
                    .ok()
                    .and_then(|cpu| topology.numa_for_cpu(cpu))
                else {
                    log::trace!("ignoring unknown CPU `{cpu}`");
                    continue;
                };
                *remaining
                    .entry(node)
                    .or_default()
                    .entry(info.name.clone())
                    .or_default() -= 1;
            }
        } else {
            for address in &info.data {
                let Some(node) = topology.numa_for_pci(address) else {
                    log::trace!("ignoring unknown {} device `{address}`", info.name);
                    continue;
                };
                *remaining
                    .entry(node)
                    .or_default()
                    .entry(info.name.clone())
                    .or_default() -= 1;
            }
        }
    }

    remaining
        .into_iter()
        .map(|(numa_id, resources)| {
            for (name, quantity) in &resources {
                if *quantity < 0 {
                    log::warn!(
                        "NUMA node {numa_id}: {name} is oversubscribed (remaining {quantity})"
                    );
                }
            }
            NumaNodeResource { numa_id, resources }
        })
        .collect()
}
