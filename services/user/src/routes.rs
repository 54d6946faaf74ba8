//! User service routes
//!
//! Every RPC is a `POST /rpc/UserService/<Method>` carrying a JSON request
//! message and answering with a JSON response message.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::{error, info};

use crate::endpoint::{
    ChangePasswordRequest, CreateUserRequest, CredentialsRequest, EndpointResult, IdRequest,
    ListUsersRequest, LoginResponse, SearchByEmailRequest, SearchByUsernameRequest,
    SuccessResponse, UpdateUserRequest, UserResponse, UserServiceEndpoint, UsersResponse,
    ValidateResponse,
};

/// Create the router for the user service
pub fn create_router(endpoint: UserServiceEndpoint) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/rpc/UserService/CreateUser", post(create_user))
        .route("/rpc/UserService/GetUser", post(get_user))
        .route("/rpc/UserService/UpdateUser", post(update_user))
        .route("/rpc/UserService/DeleteUser", post(delete_user))
        .route("/rpc/UserService/ListUsers", post(list_users))
        .route("/rpc/UserService/SearchByEmail", post(search_by_email))
        .route("/rpc/UserService/SearchByUsername", post(search_by_username))
        .route("/rpc/UserService/Login", post(login))
        .route("/rpc/UserService/Validate", post(validate))
        .route("/rpc/UserService/ChangePassword", post(change_password))
        .route("/rpc/UserService/DeactivateUser", post(deactivate_user))
        .with_state(endpoint)
}

/// Health check endpoint
pub async fn health_check(State(endpoint): State<UserServiceEndpoint>) -> impl IntoResponse {
    let database = match endpoint.service().health_check().await {
        Ok(true) => "ok",
        Ok(false) => "unreachable",
        Err(e) => {
            error!("Health check failed: {}", e);
            "error"
        }
    };
    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "user-service",
            "database": database,
        })),
    )
}

async fn create_user(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> EndpointResult<Json<UserResponse>> {
    let Json(req) = payload?;
    info!(username = %req.username, "create_user_request");
    endpoint.create_user(req).await.map(Json)
}

async fn get_user(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<IdRequest>, JsonRejection>,
) -> EndpointResult<Json<UserResponse>> {
    let Json(req) = payload?;
    endpoint.get_user(req).await.map(Json)
}

async fn update_user(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> EndpointResult<Json<UserResponse>> {
    let Json(req) = payload?;
    endpoint.update_user(req).await.map(Json)
}

async fn delete_user(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<IdRequest>, JsonRejection>,
) -> EndpointResult<Json<SuccessResponse>> {
    let Json(req) = payload?;
    endpoint.delete_user(req).await.map(Json)
}

async fn list_users(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<ListUsersRequest>, JsonRejection>,
) -> EndpointResult<Json<UsersResponse>> {
    let Json(req) = payload?;
    endpoint.list_users(req).await.map(Json)
}

async fn search_by_email(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<SearchByEmailRequest>, JsonRejection>,
) -> EndpointResult<Json<UserResponse>> {
    let Json(req) = payload?;
    endpoint.search_by_email(req).await.map(Json)
}

async fn search_by_username(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<SearchByUsernameRequest>, JsonRejection>,
) -> EndpointResult<Json<UsersResponse>> {
    let Json(req) = payload?;
    endpoint.search_by_username(req).await.map(Json)
}

async fn login(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> EndpointResult<Json<LoginResponse>> {
    let Json(req) = payload?;
    info!(email = %req.email, "login_request");
    endpoint.login(req).await.map(Json)
}

async fn validate(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> EndpointResult<Json<ValidateResponse>> {
    let Json(req) = payload?;
    endpoint.validate(req).await.map(Json)
}

async fn change_password(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> EndpointResult<Json<SuccessResponse>> {
    let Json(req) = payload?;
    endpoint.change_password(req).await.map(Json)
}

async fn deactivate_user(
    State(endpoint): State<UserServiceEndpoint>,
    payload: Result<Json<IdRequest>, JsonRejection>,
) -> EndpointResult<Json<SuccessResponse>> {
    let Json(req) = payload?;
    endpoint.deactivate_user(req).await.map(Json)
}
