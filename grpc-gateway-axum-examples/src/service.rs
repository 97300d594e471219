//! The Discover service.
//!
//! [`DiscoverService`] is the RPC contract; [`Discover`] validates input and
//! simulates failures for a handful of sentinel ids so every error path of the
//! gateway can be exercised from the outside.

use std::future::Future;

use grpc_gateway_axum::metadata::CUSTOM_HEADER_ID;
use tonic::{Request, Response, Status};

use crate::pb::{
    GetParamInBodyRequest, GetParamInHeaderRequest, PostUnstructuredDataRequest,
    PostUnstructuredDataResponse, Response as ContentResponse,
};

/// RPC methods of `discover.v1.DiscoverService`.
pub trait DiscoverService: Send + Sync + 'static {
    fn get_param_in_body(
        &self,
        request: Request<GetParamInBodyRequest>,
    ) -> impl Future<Output = Result<Response<ContentResponse>, Status>> + Send;

    /// The id comes from the `x-custom-header-id` metadata entry.
    fn get_param_in_header(
        &self,
        request: Request<GetParamInHeaderRequest>,
    ) -> impl Future<Output = Result<Response<ContentResponse>, Status>> + Send;

    fn post_unstructured_data(
        &self,
        request: Request<PostUnstructuredDataRequest>,
    ) -> impl Future<Output = Result<Response<PostUnstructuredDataResponse>, Status>> + Send;
}

/// Validating implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Discover;

impl DiscoverService for Discover {
    async fn get_param_in_body(
        &self,
        request: Request<GetParamInBodyRequest>,
    ) -> Result<Response<ContentResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!(id = %req.id, content = %req.content, "GetParamInBody called");

        if req.id.is_empty() {
            return Err(Status::invalid_argument("id is required"));
        }
        if req.content.is_empty() {
            return Err(Status::invalid_argument("content is required"));
        }

        match req.id.as_str() {
            "not-found" => Err(Status::not_found(format!(
                "resource with id '{}' not found",
                req.id
            ))),
            "unauthorized" => Err(Status::permission_denied(format!(
                "access denied for id '{}'",
                req.id
            ))),
            "error" => Err(Status::internal("internal server error occurred")),
            _ => Ok(Response::new(ContentResponse {
                new_content: format!("Processed ID: {}, Content: {}", req.id, req.content),
            })),
        }
    }

    async fn get_param_in_header(
        &self,
        request: Request<GetParamInHeaderRequest>,
    ) -> Result<Response<ContentResponse>, Status> {
        let header_id = request
            .metadata()
            .get(CUSTOM_HEADER_ID)
            .and_then(|v| std::str::from_utf8(v.as_encoded_bytes()).ok())
            .map(str::to_owned);

        let mut req = request.into_inner();
        match header_id {
            Some(id) => {
                tracing::debug!(id = %id, "found x-custom-header-id");
                req.id = id;
            }
            None => tracing::debug!("no x-custom-header-id in metadata"),
        }

        if req.id.is_empty() {
            return Err(Status::invalid_argument("x-custom-header-id header is required"));
        }
        if req.id == "invalid-token" {
            return Err(Status::unauthenticated("invalid authentication token"));
        }

        Ok(Response::new(ContentResponse {
            new_content: format!("Header processed - ID: {}, Content: {}", req.id, req.content),
        }))
    }

    async fn post_unstructured_data(
        &self,
        request: Request<PostUnstructuredDataRequest>,
    ) -> Result<Response<PostUnstructuredDataResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!(id = %req.id, "PostUnstructuredData called");

        if req.id.is_empty() {
            return Err(Status::invalid_argument("id is required"));
        }
        let Some(data) = req.data else {
            return Err(Status::invalid_argument("data is required"));
        };

        match req.id.as_str() {
            "duplicate" => Err(Status::already_exists(format!(
                "resource with id '{}' already exists",
                req.id
            ))),
            "rate-limit" => Err(Status::resource_exhausted("rate limit exceeded")),
            _ => Ok(Response::new(PostUnstructuredDataResponse {
                id: req.id,
                data: Some(data),
            })),
        }
    }
}
