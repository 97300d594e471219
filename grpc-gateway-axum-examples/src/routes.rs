//! HTTP bindings of the Discover service.
//!
//! | Method | Path                          | Binding                                        |
//! |--------|-------------------------------|------------------------------------------------|
//! | GET    | `/v1/get-param-in-body/{id}`  | `id` from the path, `content` from JSON body    |
//! | GET    | `/v1/get-param-in-header`     | `id` from `X-Custom-Header-Id`, `content` query |
//! | POST   | `/v1/post/unstructured-data`  | JSON body, `data` base64                       |
//!
//! Unknown paths answer with a not-found status, known paths with the wrong
//! method with 405. Both use the JSON error body.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use grpc_gateway_axum::prelude::*;
use serde::Deserialize;

use crate::pb::{
    GetParamInBodyRequest, GetParamInHeaderRequest, PostUnstructuredDataRequest,
    PostUnstructuredDataResponse, Response,
};
use crate::service::DiscoverService;

pub const GET_PARAM_IN_BODY: &str = "/v1/get-param-in-body/{id}";
pub const GET_PARAM_IN_HEADER: &str = "/v1/get-param-in-header";
pub const POST_UNSTRUCTURED_DATA: &str = "/v1/post/unstructured-data";

/// Routes for `service`, without middleware.
pub fn routes<S: DiscoverService>(service: Arc<S>) -> Router {
    Router::new()
        .route(GET_PARAM_IN_BODY, get(get_param_in_body::<S>))
        .route(GET_PARAM_IN_HEADER, get(get_param_in_header::<S>))
        .route(POST_UNSTRUCTURED_DATA, post(post_unstructured_data::<S>))
        .fallback(unknown_route)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(service)
}

/// Routes for `service` with header propagation and error handling from `config`.
pub fn gateway<S: DiscoverService>(service: Arc<S>, config: &GatewayConfig) -> Router {
    config.apply(routes(service))
}

#[derive(Debug, Default, Deserialize)]
struct ContentQuery {
    #[serde(default)]
    content: String,
}

async fn get_param_in_body<S: DiscoverService>(
    State(service): State<Arc<S>>,
    path: Result<Path<String>, PathRejection>,
    md: CallMetadata,
    JsonBody(mut message): JsonBody<GetParamInBodyRequest>,
) -> Result<Json<Response>, RpcFailure> {
    let Path(id) =
        path.map_err(|rejection| HttpStatusError::new(rejection.status(), rejection.body_text()))?;
    message.id = id;
    let response = service.get_param_in_body(md.into_request(message)).await?;
    Ok(reply(response))
}

async fn get_param_in_header<S: DiscoverService>(
    State(service): State<Arc<S>>,
    md: CallMetadata,
    query: Result<Query<ContentQuery>, QueryRejection>,
) -> Result<Json<Response>, RpcFailure> {
    let Query(query) =
        query.map_err(|rejection| HttpStatusError::new(rejection.status(), rejection.body_text()))?;
    required_metadata(&md, CUSTOM_HEADER_ID)?;

    let message = GetParamInHeaderRequest {
        id: String::new(),
        content: query.content,
    };
    let response = service.get_param_in_header(md.into_request(message)).await?;
    Ok(reply(response))
}

async fn post_unstructured_data<S: DiscoverService>(
    State(service): State<Arc<S>>,
    md: CallMetadata,
    JsonBody(message): JsonBody<PostUnstructuredDataRequest>,
) -> Result<Json<PostUnstructuredDataResponse>, RpcFailure> {
    let response = service.post_unstructured_data(md.into_request(message)).await?;
    Ok(reply(response))
}

async fn unknown_route() -> RpcFailure {
    tonic::Status::not_found("Not Found").into()
}

async fn method_not_allowed() -> RpcFailure {
    HttpStatusError::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into()
}
