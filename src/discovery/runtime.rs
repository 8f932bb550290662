use std::time::Duration;

use tonic::transport::Channel;

use crate::cri::runtime::v1::runtime_service_client::RuntimeServiceClient;
use crate::cri::runtime::v1::{
    Container, ContainerFilter, ContainerState, ContainerStateValue, ContainerStatusRequest,
    ContainerStatusResponse, ListContainersRequest, ListPodSandboxRequest, PodSandbox,
    PodSandboxFilter, PodSandboxState, PodSandboxStateValue, VersionRequest, VersionResponse,
};
use crate::grpc;

/// The subset of the CRI runtime service the scanner depends on.
pub trait RuntimeService {
    /// Pod sandboxes in the ready state.
    fn ready_sandboxes(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<PodSandbox>, tonic::Status>> + Send;

    /// Running containers across all sandboxes.
    fn running_containers(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Container>, tonic::Status>> + Send;

    /// Verbose status of one container, including the runtime `info` map.
    fn verbose_status(
        &self,
        container_id: &str,
    ) -> impl std::future::Future<Output = Result<ContainerStatusResponse, tonic::Status>> + Send;
}

/// gRPC client for a CRI runtime reachable over a unix socket.
#[derive(Debug, Clone)]
pub struct CriClient {
    client: RuntimeServiceClient<Channel>,
}

impl CriClient {
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, grpc::Error> {
        let channel = grpc::channel_for_endpoint(endpoint, timeout).await?;
        Ok(Self::new(channel))
    }

    pub fn new(channel: Channel) -> Self {
        Self {
            client: RuntimeServiceClient::new(channel),
        }
    }

    pub async fn version(&self) -> Result<VersionResponse, tonic::Status> {
        let response = self
            .client
            .clone()
            .version(VersionRequest::default())
            .await?;
        Ok(response.into_inner())
    }
}

impl RuntimeService for CriClient {
    async fn ready_sandboxes(&self) -> Result<Vec<PodSandbox>, tonic::Status> {
        let request = ListPodSandboxRequest {
            filter: Some(PodSandboxFilter {
                state: Some(PodSandboxStateValue {
                    state: PodSandboxState::SandboxReady.into(),
                }),
                ..Default::default()
            }),
        };
        let response = self.client.clone().list_pod_sandbox(request).await?;
        Ok(response.into_inner().items)
    }

    async fn running_containers(&self) -> Result<Vec<Container>, tonic::Status> {
        let request = ListContainersRequest {
            filter: Some(ContainerFilter {
                state: Some(ContainerStateValue {
                    state: ContainerState::ContainerRunning.into(),
                }),
                ..Default::default()
            }),
        };
        let response = self.client.clone().list_containers(request).await?;
        Ok(response.into_inner().containers)
    }

    async fn verbose_status(
        &self,
        container_id: &str,
    ) -> Result<ContainerStatusResponse, tonic::Status> {
        let request = ContainerStatusRequest {
            container_id: container_id.to_owned(),
            verbose: true,
        };
        let response = self.client.clone().container_status(request).await?;
        Ok(response.into_inner())
    }
}
