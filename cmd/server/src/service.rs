use crate::transform;

use gantry_orchestrator::ContainerOrchestrator;
use gantry_proto as pb;
use gantry_proto::container_maker_server::ContainerMaker;

use tonic::{Request, Response, Status};
use tracing::info;

/// The request façade: one handler per RPC, each a transform → dispatch →
/// transform chain with the error taxonomy mapped to status codes.
pub struct ContainerMakerService {
    orchestrator: ContainerOrchestrator,
}

impl ContainerMakerService {
    pub fn new(orchestrator: ContainerOrchestrator) -> Self {
        Self { orchestrator }
    }
}

#[tonic::async_trait]
impl ContainerMaker for ContainerMakerService {
    async fn create_container(
        &self,
        request: Request<pb::CreateContainerRequest>,
    ) -> Result<Response<pb::ContainerResponse>, Status> {
        let command = transform::create_command(request.into_inner());
        info!(container = %command.name, network = %command.network, msg = "createContainer");
        let container = self
            .orchestrator
            .create(&command)
            .await
            .map_err(transform::status_from_error)?;
        Ok(Response::new(transform::container_response(&container)))
    }

    async fn list_container(
        &self,
        request: Request<pb::ListContainerRequest>,
    ) -> Result<Response<pb::ListContainerResponse>, Status> {
        let request = request.into_inner();
        info!(network = %request.network_name, msg = "listContainer");
        let containers = self
            .orchestrator
            .list(&request.network_name)
            .await
            .map_err(transform::status_from_error)?;
        Ok(Response::new(pb::ListContainerResponse {
            containers: containers.iter().map(transform::container_response).collect(),
        }))
    }

    async fn get_container(
        &self,
        request: Request<pb::GetContainerRequest>,
    ) -> Result<Response<pb::ContainerResponse>, Status> {
        let request = request.into_inner();
        info!(container_id = %request.container_id, network = %request.network_name, msg = "getContainer");
        let container = self
            .orchestrator
            .get(&request.container_id, &request.network_name)
            .await
            .map_err(transform::status_from_error)?
            .ok_or_else(|| {
                Status::invalid_argument(format!(
                    "network {} does not exist",
                    request.network_name
                ))
            })?;
        Ok(Response::new(transform::container_response(&container)))
    }

    async fn delete_container(
        &self,
        request: Request<pb::DeleteContainerRequest>,
    ) -> Result<Response<pb::DeleteContainerResponse>, Status> {
        let request = request.into_inner();
        info!(container_id = %request.container_id, network = %request.network_name, msg = "deleteContainer");
        let outcome = self
            .orchestrator
            .delete(&request.container_id, &request.network_name)
            .await
            .map_err(transform::status_from_error)?;
        Ok(Response::new(pb::DeleteContainerResponse {
            container_id: outcome.container_id,
            status: outcome.status,
        }))
    }

    async fn save_container(
        &self,
        request: Request<pb::SaveContainerRequest>,
    ) -> Result<Response<pb::SaveContainerResponse>, Status> {
        let request = request.into_inner();
        info!(container_id = %request.container_id, network = %request.network_name, msg = "saveContainer");
        let saved = self
            .orchestrator
            .save(&request.container_id, &request.network_name)
            .await
            .map_err(transform::status_from_error)?;
        Ok(Response::new(pb::SaveContainerResponse {
            saved_pods: saved.iter().map(transform::saved_pod_response).collect(),
        }))
    }
}
