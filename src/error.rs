/// Failures that stop the exporter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    PciMap(#[from] crate::pcimap::Error),
    #[error("failed to discover hardware topology: {0}")]
    Topology(#[from] crate::topology::Error),
    #[error("failed to connect to container runtime: {0}")]
    Connect(#[from] crate::grpc::Error),
    #[error(transparent)]
    Config(#[from] crate::config::Error),
    #[error("failed to bind API listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to export snapshot: {0}")]
    Export(#[from] crate::exporter::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait ResultOkLogExt<T, E> {
    /// Logs the error at `warn` and discards it.
    fn ok_log(self) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::warn!("{err}");
                None
            }
        }
    }
}
