use std::sync::Arc;

use dashmap::DashMap;

use crate::resources::NumaNodeResource;
use crate::topology::CapacityTable;

use super::models::{DEFAULT_NAMESPACE, NodeResourceTopology, ObjectMeta, Zone};
use super::{Error, Exporter, Result};

/// In-process store of the latest published document per node.
///
/// Cloning is cheap and every clone sees the same documents, so one handle
/// goes to the driver and one to the HTTP API.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    node_name: Arc<str>,
    topology_policy: Arc<str>,
    capacity: Arc<CapacityTable>,
    documents: Arc<DashMap<String, NodeResourceTopology>>,
}

impl SnapshotStore {
    pub fn new(node_name: &str, topology_policy: &str, capacity: CapacityTable) -> Self {
        Self {
            node_name: Arc::from(node_name),
            topology_policy: Arc::from(topology_policy),
            capacity: Arc::new(capacity),
            documents: Arc::default(),
        }
    }

    /// Document of the local node, `None` until the first export.
    pub fn latest(&self) -> Option<NodeResourceTopology> {
        self.get(&self.node_name)
    }

    pub fn get(&self, node_name: &str) -> Option<NodeResourceTopology> {
        self.documents.get(node_name).map(|doc| doc.value().clone())
    }

    fn document(&self, nodes: &[NumaNodeResource]) -> NodeResourceTopology {
        let mut zones: Vec<Zone> = nodes
            .iter()
            .map(|node| Zone::new(node, self.capacity.get(&node.numa_id)))
            .collect();
        zones.sort_by(|a, b| a.name.cmp(&b.name));

        NodeResourceTopology {
            metadata: ObjectMeta {
                name: self.node_name.to_string(),
                namespace: DEFAULT_NAMESPACE.to_owned(),
            },
            topology_policies: vec![self.topology_policy.to_string()],
            zones,
        }
    }
}

impl Exporter for SnapshotStore {
    async fn export(&self, nodes: &[NumaNodeResource]) -> Result<()> {
        if nodes.is_empty() {
            return Err(Error::EmptySnapshot);
        }
        let document = self.document(nodes);
        log::debug!(
            "publishing {} zones for node {}",
            document.zones.len(),
            self.node_name
        );
        self.documents.insert(self.node_name.to_string(), document);
        Ok(())
    }
}
