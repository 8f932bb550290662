//! Publishing of the per-NUMA snapshot computed each cycle.
mod api;
pub mod models;
mod store;

pub use api::ApiServer;
pub use models::NodeResourceTopology;
pub use store::SnapshotStore;

use crate::resources::NumaNodeResource;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("refusing to publish a snapshot without NUMA nodes")]
    EmptySnapshot,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Destination of every computed snapshot. A failed export is fatal to the
/// caller.
pub trait Exporter {
    fn export(
        &self,
        nodes: &[NumaNodeResource],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
