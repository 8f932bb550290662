use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::fsutil;
use crate::resources::{CpuId, NumaId};

use super::cpulist::parse_cpu_list;
use super::{Error, Result};

/// Location of the NUMA node directories relative to the sysfs root.
pub const NODE_DIR: &str = "devices/system/node";

/// Enumerates `<sysfs>/devices/system/node/nodeN` and the CPUs attached to
/// each node.
///
/// # Errors
///
/// - [`Error::ReadDir`] if the node directory cannot be listed.
/// - [`Error::FileRead`] / [`Error::CpuList`] if a node's `cpulist` cannot be read or parsed.
/// - [`Error::NoNumaNodes`] if no `nodeN` entry exists.
pub fn discover_numa_nodes(
    sysfs_root: impl AsRef<Path>,
) -> Result<BTreeMap<NumaId, BTreeSet<CpuId>>> {
    let dir = sysfs_root.as_ref().join(NODE_DIR);
    let entries = std::fs::read_dir(&dir).map_err(|source| Error::ReadDir {
        path: dir.clone(),
        source,
    })?;

    let mut nodes = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::ReadDir {
            path: dir.clone(),
            source,
        })?;
        let file_name = entry.file_name();
        let Some(node_id) = file_name
            .to_str()
            .and_then(|name| name.strip_prefix("node"))
            .and_then(|id| id.parse::<NumaId>().ok())
        else {
            continue;
        };

        let cpulist_path = entry.path().join("cpulist");
        let cpulist = fsutil::read_trimmed(&cpulist_path)?;
        let cpus = parse_cpu_list(&cpulist).map_err(|source| Error::CpuList {
            path: cpulist_path,
            source,
        })?;
        log::info!("detected system CPU: NUMA cell {node_id} cpus = {cpus:?}");
        nodes.insert(node_id, cpus);
    }

    if nodes.is_empty() {
        return Err(Error::NoNumaNodes { path: dir });
    }

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeSysfs;

    #[test]
    fn test_discover_two_nodes() {
        let sysfs = FakeSysfs::new();
        sysfs.numa_node(0, "0-3").numa_node(1, "4-7");
        // siblings of nodeN that must be ignored
        sysfs.file("devices/system/node/online", "0-1");
        sysfs.file("devices/system/node/possible", "0-1");

        let nodes = discover_numa_nodes(sysfs.root()).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[&0], BTreeSet::from([0, 1, 2, 3]));
        assert_eq!(nodes[&1], BTreeSet::from([4, 5, 6, 7]));
    }

    #[test]
    fn test_memory_only_node_has_no_cpus() {
        let sysfs = FakeSysfs::new();
        sysfs.numa_node(0, "0-1").numa_node(1, "");

        let nodes = discover_numa_nodes(sysfs.root()).unwrap();
        assert!(nodes[&1].is_empty());
    }

    #[test]
    fn test_missing_node_dir() {
        let sysfs = FakeSysfs::new();
        let err = discover_numa_nodes(sysfs.root()).unwrap_err();
        assert!(matches!(err, Error::ReadDir { .. }));
    }

    #[test]
    fn test_no_nodes() {
        let sysfs = FakeSysfs::new();
        sysfs.file("devices/system/node/online", "");
        let err = discover_numa_nodes(sysfs.root()).unwrap_err();
        assert!(matches!(err, Error::NoNumaNodes { .. }));
    }

    #[test]
    fn test_invalid_cpulist() {
        let sysfs = FakeSysfs::new();
        sysfs.numa_node(0, "zero");
        let err = discover_numa_nodes(sysfs.root()).unwrap_err();
        assert!(matches!(err, Error::CpuList { .. }));
    }

    #[test]
    fn test_missing_cpulist() {
        let sysfs = FakeSysfs::new();
        sysfs.dir("devices/system/node/node0");
        let err = discover_numa_nodes(sysfs.root()).unwrap_err();
        assert!(matches!(err, Error::FileRead(_)));
    }
}
