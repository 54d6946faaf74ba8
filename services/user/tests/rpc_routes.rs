//! End-to-end tests of the RPC routes over the in-memory store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use user::endpoint::UserServiceEndpoint;
use user::error::UserResult;
use user::models::{Credential, NewUser, UpdateUser, User};
use user::password::{HashCost, PasswordHasher};
use user::repositories::{InMemoryUserStore, UserStore};
use user::routes::create_router;
use user::service::UserService;
use user::token::{PLACEHOLDER_TOKEN, PlaceholderTokenIssuer};

fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::new(HashCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("valid test hash cost")
}

fn app_with(store: Arc<dyn UserStore>, deadline: Duration) -> Router {
    let service = UserService::new(store, cheap_hasher());
    let endpoint = UserServiceEndpoint::new(Arc::new(service), Arc::new(PlaceholderTokenIssuer))
        .with_deadline(Some(deadline));
    create_router(endpoint)
}

fn app() -> Router {
    app_with(Arc::new(InMemoryUserStore::new()), Duration::from_secs(5))
}

async fn call(app: &Router, method: &str, body: Value) -> (StatusCode, Value) {
    call_raw(app, method, body.to_string()).await
}

async fn call_raw(app: &Router, method: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/rpc/UserService/{}", method))
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_alice(app: &Router) -> Value {
    let (status, body) = call(
        app,
        "CreateUser",
        json!({
            "username": "alice",
            "email": "a@x.com",
            "full_name": "Alice",
            "password": "s3cret"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["user"].clone()
}

#[tokio::test]
async fn create_and_get_user() {
    let app = app();
    let user = create_alice(&app).await;

    assert_eq!(user["username"], "alice");
    assert_eq!(user["website"], "");
    assert_eq!(user["location"], "");
    assert_eq!(user["created_at"], user["updated_at"]);
    assert!(user.get("password_hash").is_none());

    let (status, body) = call(&app, "GetUser", json!({ "id": user["id"] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@x.com");
}

#[tokio::test]
async fn malformed_id_is_rejected_before_the_service() {
    let app = app();

    for method in ["GetUser", "DeleteUser", "DeactivateUser"] {
        let (status, body) = call(&app, method, json!({ "id": "nope" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", method);
        assert!(body["error"].as_str().unwrap().contains("invalid user id"));
    }

    let (status, _) = call(
        &app,
        "ChangePassword",
        json!({ "id": "nope", "new_password": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let app = app();
    let id = uuid::Uuid::new_v4().to_string();

    let (status, _) = call(&app, "GetUser", json!({ "id": id })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "SearchByEmail", json!({ "email": "ghost@x.com" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let app = app();

    let (status, body) = call(&app, "CreateUser", json!({ "username": "alice" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let (status, _) = call(&app, "ListUsers", json!({ "limit": -1, "offset": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_flow_over_rpc() {
    let app = app();
    let user = create_alice(&app).await;

    let (status, body) = call(
        &app,
        "Login",
        json!({ "email": "a@x.com", "password": "s3cret" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user["id"]);
    assert_eq!(body["token"], PLACEHOLDER_TOKEN);

    let (status, body) = call(
        &app,
        "Login",
        json!({ "email": "a@x.com", "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!body.to_string().contains("argon2"));

    let (status, body) = call(
        &app,
        "Validate",
        json!({ "email": "a@x.com", "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);

    let (_, body) = call(
        &app,
        "ChangePassword",
        json!({ "id": user["id"], "new_password": "n3w" }),
    )
    .await;
    assert_eq!(body["success"], true);

    let (_, body) = call(
        &app,
        "Validate",
        json!({ "email": "a@x.com", "password": "n3w" }),
    )
    .await;
    assert_eq!(body["valid"], true);

    let (_, body) = call(&app, "DeactivateUser", json!({ "id": user["id"] })).await;
    assert_eq!(body["success"], true);

    let (status, _) = call(
        &app,
        "Login",
        json!({ "email": "a@x.com", "password": "n3w" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_list_search_and_delete() {
    let app = app();
    let user = create_alice(&app).await;

    let (status, body) = call(
        &app,
        "UpdateUser",
        json!({ "id": user["id"], "full_name": "Alice A", "bio": "hi" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["full_name"], "Alice A");
    assert_eq!(body["user"]["bio"], "hi");
    assert_ne!(body["user"]["updated_at"], body["user"]["created_at"]);

    let (_, body) = call(&app, "ListUsers", json!({ "limit": 10, "offset": 0 })).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 1);

    let (_, body) = call(
        &app,
        "SearchByUsername",
        json!({ "username": "LIC", "limit": 10, "offset": 0 }),
    )
    .await;
    assert_eq!(body["users"][0]["id"], user["id"]);

    let (_, body) = call(&app, "DeleteUser", json!({ "id": user["id"] })).await;
    assert_eq!(body["success"], true);

    let (_, body) = call(&app, "DeleteUser", json!({ "id": user["id"] })).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn duplicate_user_is_an_internal_error() {
    let app = app();
    create_alice(&app).await;

    let (status, body) = call(
        &app,
        "CreateUser",
        json!({ "username": "alice", "email": "other@x.com", "password": "pw" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("constraint violation"));
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["service"], "user-service");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn undecodable_bodies_are_bad_requests() {
    let app = app();

    let (status, body) = call(&app, "ListUsers", json!({ "limit": "ten", "offset": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().starts_with("malformed request"));

    let (status, body) = call_raw(&app, "GetUser", "not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn unicode_usernames_and_long_passwords_are_accepted() {
    let app = app();
    let password = "p".repeat(200);

    for (username, email) in [("josé", "j@x.com"), ("alice+bob", "ab@x.com")] {
        let (status, body) = call(
            &app,
            "CreateUser",
            json!({ "username": username, "email": email, "password": password }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", username);
        assert_eq!(body["user"]["username"], username);
    }

    let (_, body) = call(
        &app,
        "Validate",
        json!({ "email": "j@x.com", "password": password }),
    )
    .await;
    assert_eq!(body["valid"], true);
}

/// Store whose user creation stalls long enough to outlive any call deadline
struct StallingStore {
    inner: Arc<InMemoryUserStore>,
    stall: Duration,
}

#[async_trait]
impl UserStore for StallingStore {
    async fn insert_user(&self, new_user: &NewUser) -> UserResult<User> {
        self.inner.insert_user(new_user).await
    }

    async fn find_user_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> UserResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_users_by_username(
        &self,
        pattern: &str,
        limit: i64,
        offset: i64,
    ) -> UserResult<Vec<User>> {
        self.inner.find_users_by_username(pattern, limit, offset).await
    }

    async fn list_users(&self, limit: i64, offset: i64) -> UserResult<Vec<User>> {
        self.inner.list_users(limit, offset).await
    }

    async fn update_user(&self, update: &UpdateUser) -> UserResult<Option<User>> {
        self.inner.update_user(update).await
    }

    async fn delete_user(&self, id: Uuid) -> UserResult<bool> {
        self.inner.delete_user(id).await
    }

    async fn insert_credential(&self, credential: &Credential) -> UserResult<()> {
        self.inner.insert_credential(credential).await
    }

    async fn get_credential(&self, user_id: Uuid) -> UserResult<Option<Credential>> {
        self.inner.get_credential(user_id).await
    }

    async fn update_credential(&self, credential: &Credential) -> UserResult<bool> {
        self.inner.update_credential(credential).await
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> UserResult<bool> {
        self.inner.record_login(user_id, at).await
    }

    async fn create_user_with_credential(
        &self,
        new_user: &NewUser,
        password_hash: &str,
    ) -> UserResult<User> {
        tokio::time::sleep(self.stall).await;
        self.inner
            .create_user_with_credential(new_user, password_hash)
            .await
    }
}

#[tokio::test]
async fn expired_deadline_cancels_without_writing() {
    let inner = Arc::new(InMemoryUserStore::new());
    let store = StallingStore {
        inner: inner.clone(),
        stall: Duration::from_secs(10),
    };
    let app = app_with(Arc::new(store), Duration::from_millis(50));

    let (status, body) = call(
        &app,
        "CreateUser",
        json!({ "username": "alice", "email": "a@x.com", "password": "s3cret" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "operation canceled");

    assert!(inner.list_users(100, 0).await.unwrap().is_empty());
    assert_eq!(inner.credential_count().await, 0);
}
