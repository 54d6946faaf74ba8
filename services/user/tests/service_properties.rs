//! Behavioural tests for the user service over the in-memory store

use std::collections::HashSet;
use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};
use user::error::UserError;
use user::models::{CreateUserInput, LoginCredentials, UpdateUser};
use user::password::{HashCost, PasswordHasher};
use user::repositories::{InMemoryUserStore, UserStore};
use user::service::UserService;

fn setup() -> (UserService, Arc<InMemoryUserStore>) {
    let store = Arc::new(InMemoryUserStore::new());
    let hasher = PasswordHasher::new(HashCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("valid test hash cost");
    (UserService::new(store.clone(), hasher), store)
}

fn create_input(username: &str, email: &str, password: &str) -> CreateUserInput {
    CreateUserInput {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        ..Default::default()
    }
}

fn login(email: &str, password: &str) -> LoginCredentials {
    LoginCredentials {
        email: email.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn created_user_can_be_fetched_by_id() {
    let (service, _) = setup();

    let created = service
        .create_user(create_input("testuser", "test@example.com", "password123"))
        .await
        .unwrap();
    assert!(!created.id.is_nil());

    let found = service.get_user_by_id(created.id).await.unwrap();
    assert_eq!(found.username, "testuser");
    assert_eq!(found.email, "test@example.com");
}

#[tokio::test]
async fn stored_hash_is_never_the_plaintext() {
    let (service, store) = setup();

    let user = service
        .create_user(create_input("hashme", "hash@site.com", "s3cret"))
        .await
        .unwrap();

    let credential = store.get_credential(user.id).await.unwrap().unwrap();
    assert_ne!(credential.password_hash, "s3cret");
    assert!(credential.password_hash.starts_with("$argon2id$v=19$"));
    assert_eq!(credential.password_hash.split('$').count(), 6);
    assert!(credential.is_active);
    assert!(credential.last_login.is_none());
}

#[tokio::test]
async fn login_accepts_the_right_password_only() {
    let (service, _) = setup();
    service
        .create_user(create_input("loginuser", "login@site.com", "securepass"))
        .await
        .unwrap();

    let user = service
        .login(login("login@site.com", "securepass"))
        .await
        .unwrap();
    assert_eq!(user.email, "login@site.com");

    let err = service
        .login(login("login@site.com", "wrongpass"))
        .await
        .unwrap_err();
    assert_eq!(err, UserError::Unauthorized);
    assert!(!service.validate(login("login@site.com", "wrongpass")).await);
    assert!(!service.validate(login("ghost@site.com", "securepass")).await);
}

#[tokio::test]
async fn changed_password_replaces_the_old_one() {
    let (service, _) = setup();
    let user = service
        .create_user(create_input("changepass", "change@site.com", "oldpass"))
        .await
        .unwrap();

    assert!(service.change_password(user.id, "newpass").await.unwrap());

    assert_ok!(service.login(login("change@site.com", "newpass")).await);
    assert_eq!(
        service
            .login(login("change@site.com", "oldpass"))
            .await
            .unwrap_err(),
        UserError::Unauthorized
    );
}

#[tokio::test]
async fn deactivated_account_cannot_authenticate() {
    let (service, store) = setup();
    let user = service
        .create_user(create_input("inactive", "inactive@site.com", "pass"))
        .await
        .unwrap();

    assert!(service.deactivate_user(user.id).await.unwrap());

    let credential = store.get_credential(user.id).await.unwrap().unwrap();
    assert!(!credential.is_active);

    assert_eq!(
        service
            .login(login("inactive@site.com", "pass"))
            .await
            .unwrap_err(),
        UserError::Unauthorized
    );
    assert!(!service.validate(login("inactive@site.com", "pass")).await);

    let credential = store.get_credential(user.id).await.unwrap().unwrap();
    assert!(credential.last_login.is_none());
}

#[tokio::test]
async fn delete_removes_user_and_credential() {
    let (service, store) = setup();
    let user = service
        .create_user(create_input("delete_me", "delete@site.com", "pass"))
        .await
        .unwrap();

    assert!(service.delete_user(user.id).await.unwrap());

    assert_eq!(
        service.get_user_by_id(user.id).await.unwrap_err(),
        UserError::NotFound
    );
    assert!(store.get_credential(user.id).await.unwrap().is_none());
    assert_eq!(store.credential_count().await, 0);
}

#[tokio::test]
async fn list_returns_every_created_user_once() {
    let (service, _) = setup();

    let mut created = HashSet::new();
    for i in 0..5 {
        let user = service
            .create_user(create_input(
                &format!("user{}", i),
                &format!("user{}@test.com", i),
                "pass",
            ))
            .await
            .unwrap();
        created.insert(user.id);
    }

    let listed = service.list_users(10, 0).await.unwrap();
    assert!(listed.len() >= 5);
    for id in &created {
        assert_eq!(listed.iter().filter(|u| u.id == *id).count(), 1);
    }

    let first = service.list_users(3, 0).await.unwrap();
    let second = service.list_users(3, 3).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 2);
    let pages: HashSet<_> = first.iter().chain(second.iter()).map(|u| u.id).collect();
    assert_eq!(pages, created);
}

#[tokio::test]
async fn alice_update_moves_updated_at_forward() {
    let (service, _) = setup();

    let alice = service
        .create_user(create_input("alice", "a@x.com", "s3cret"))
        .await
        .unwrap();
    assert_eq!(alice.username, "alice");
    assert_eq!(alice.email, "a@x.com");
    assert!(!alice.id.is_nil());
    assert_eq!(alice.created_at, alice.updated_at);

    let updated = service
        .update_user(UpdateUser {
            id: alice.id,
            full_name: "Alice A".to_string(),
            profile_picture_url: String::new(),
            bio: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(updated.full_name, "Alice A");
    assert_eq!(updated.username, "alice");
    assert_eq!(updated.created_at, alice.created_at);
    assert!(updated.updated_at > updated.created_at);
}

#[tokio::test]
async fn update_of_unknown_user_is_not_found() {
    let (service, _) = setup();

    let err = assert_err!(
        service
            .update_user(UpdateUser {
                id: uuid::Uuid::new_v4(),
                full_name: "Nobody".to_string(),
                profile_picture_url: String::new(),
                bio: String::new(),
            })
            .await
    );
    assert_eq!(err, UserError::NotFound);
}

#[tokio::test]
async fn search_by_email_and_username() {
    let (service, _) = setup();
    for (name, email) in [("Alice", "alice@x.com"), ("malice", "m@x.com"), ("bob", "b@x.com")] {
        service
            .create_user(create_input(name, email, "pass"))
            .await
            .unwrap();
    }

    let bob = service.search_by_email("b@x.com").await.unwrap();
    assert_eq!(bob.username, "bob");
    assert_eq!(
        service.search_by_email("nobody@x.com").await.unwrap_err(),
        UserError::NotFound
    );

    let found = service.search_by_username("ALI", 10, 0).await.unwrap();
    let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["Alice", "malice"]);
    assert!(service.search_by_username("ali", 0, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_creates_keep_pairing_invariant() {
    let (service, store) = setup();
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .create_user(CreateUserInput {
                    username: format!("racer{}", i % 4),
                    email: format!("racer{}@x.com", i % 4),
                    password: "pass".to_string(),
                    ..Default::default()
                })
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(matches!(err, UserError::ConstraintViolation(_))),
        }
    }

    assert_eq!(succeeded, 4);
    assert_eq!(store.list_users(100, 0).await.unwrap().len(), 4);
    assert_eq!(store.credential_count().await, 4);
}
