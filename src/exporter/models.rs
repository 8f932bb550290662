use crate::resources::{NumaId, NumaNodeResource, ResourceName, ResourceQuantities};

/// Namespace the node document is published under.
pub const DEFAULT_NAMESPACE: &str = "default";
/// Zone type of a NUMA node.
pub const ZONE_TYPE_NODE: &str = "Node";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
}

/// Per-node document listing what every NUMA zone can still offer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResourceTopology {
    pub metadata: ObjectMeta,
    pub topology_policies: Vec<String>,
    pub zones: Vec<Zone>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Zone {
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: String,
    pub resources: Vec<ZoneResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ZoneResource {
    pub name: ResourceName,
    pub capacity: i64,
    pub available: i64,
}

pub fn zone_name(numa_id: NumaId) -> String {
    format!("node-{numa_id}")
}

impl Zone {
    /// Builds a zone from the remaining quantities of one node. Resources
    /// without a capacity entry report a capacity of zero.
    pub fn new(node: &NumaNodeResource, capacity: Option<&ResourceQuantities>) -> Self {
        let resources = node
            .resources
            .iter()
            .map(|(name, available)| ZoneResource {
                name: name.clone(),
                capacity: capacity
                    .and_then(|capacity| capacity.get(name))
                    .copied()
                    .unwrap_or_default(),
                available: *available,
            })
            .collect();

        Self {
            name: zone_name(node.numa_id),
            zone_type: ZONE_TYPE_NODE.to_owned(),
            resources,
        }
    }
}
