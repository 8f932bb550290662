use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{pin, task};

use hyper_util::rt::TokioIo;
use tonic::transport::{Channel, Endpoint};

/// Upper bound for establishing the runtime connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

const UNIX_SCHEME: &str = "unix://";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to socket `{path}`: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("timed out after {timeout:?} connecting to socket `{path}`")]
    Timeout { path: PathBuf, timeout: Duration },
}

#[derive(Debug, Clone)]
struct UnixConnector {
    path: PathBuf,
}

impl tower::Service<hyper::Uri> for UnixConnector {
    type Response = TokioIo<tokio::net::UnixStream>;

    type Error = std::io::Error;

    type Future = pin::Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: hyper::Uri) -> Self::Future {
        let path = self.path.clone();
        Box::pin(async move {
            let stream = tokio::net::UnixStream::connect(path).await?;

            Ok(TokioIo::new(stream))
        })
    }
}

/// Strips an optional `unix://` scheme from a runtime endpoint.
pub fn socket_path(endpoint: &str) -> &Path {
    Path::new(endpoint.strip_prefix(UNIX_SCHEME).unwrap_or(endpoint))
}

/// Dials the unix socket behind `endpoint`, giving up after `timeout`.
pub async fn channel_for_endpoint(endpoint: &str, timeout: Duration) -> Result<Channel, Error> {
    let path = socket_path(endpoint);
    log::debug!("Connecting to {}...", path.display());
    let connector = UnixConnector {
        path: path.to_path_buf(),
    };
    // the authority is ignored by the connector, tonic only needs a valid uri
    let grpc_endpoint = Endpoint::from_static("http://[::]:50051");
    let connect = grpc_endpoint.connect_with_connector(connector);
    let channel = tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| Error::Timeout {
            path: path.to_path_buf(),
            timeout,
        })?
        .map_err(|source| Error::Connect {
            path: path.to_path_buf(),
            source,
        })?;
    log::debug!("Created channel for {}.", path.display());

    Ok(channel)
}
