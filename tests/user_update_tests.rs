use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http_body_util::BodyExt;
use mugshot::config::Config;
use mugshot::db::NewUser;
use std::sync::Arc;
use tower::ServiceExt;

const TWO_MIB: usize = 2 * 1024 * 1024;

async fn spawn_app() -> (Arc<mugshot::api::AppState>, Router) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.uploads.upload_path = std::env::temp_dir()
        .join(format!("mugshot-update-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string();
    // A single pooled connection keeps the in-memory database shared
    // across every query in the test.
    config.general.max_db_connections = 1;
    config.observability.metrics_enabled = false;

    let state = mugshot::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    let router = mugshot::api::router(state.clone()).await;
    (state, router)
}

async fn add_user(
    state: &mugshot::api::AppState,
    username: &str,
    email: &str,
    inactive: bool,
) -> i32 {
    state
        .store()
        .create_user(
            NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password: "P4ssword".to_string(),
                inactive,
            },
            None,
        )
        .await
        .expect("failed to create user")
        .id
}

async fn login_token(app: &Router, email: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/1.0/auth")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": email, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

enum Auth {
    None,
    Basic(&'static str, &'static str),
    Token(String),
}

async fn put_user(
    app: &Router,
    id: i32,
    body: Option<serde_json::Value>,
    auth: Auth,
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(format!("/api/1.0/users/{id}"));

    match auth {
        Auth::None => {}
        Auth::Basic(email, password) => {
            let encoded = BASE64.encode(format!("{email}:{password}"));
            builder = builder.header("Authorization", format!("Basic {encoded}"));
        }
        Auth::Token(token) => {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
    }

    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn jpeg_base64(total_len: usize) -> String {
    let mut bytes = vec![0u8; total_len];
    bytes[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    BASE64.encode(&bytes)
}

fn png_base64() -> String {
    let mut bytes = vec![0u8; 256];
    bytes[..8].copy_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    BASE64.encode(&bytes)
}

fn gif_base64() -> String {
    let mut bytes = vec![0u8; 256];
    bytes[..6].copy_from_slice(b"GIF89a");
    BASE64.encode(&bytes)
}

fn pdf_base64() -> String {
    let mut bytes = vec![0u8; 256];
    bytes[..5].copy_from_slice(b"%PDF-");
    BASE64.encode(&bytes)
}

fn text_base64() -> String {
    BASE64.encode(b"this is clearly not an image")
}

#[tokio::test]
async fn returns_403_when_request_sent_without_authorization() {
    let (_state, app) = spawn_app().await;

    let response = put_user(&app, 5, None, Auth::None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn forbidden_body_has_message_path_and_timestamp() {
    let (_state, app) = spawn_app().await;
    let before = chrono::Utc::now().timestamp_millis();

    let response = put_user(&app, 5, None, Auth::None).await;
    let body = body_json(response).await;

    assert_eq!(body["message"], "You are not authorized to update user");
    assert_eq!(body["path"], "/api/1.0/users/5");
    assert!(body["timestamp"].as_i64().unwrap() >= before);
}

#[tokio::test]
async fn returns_403_with_incorrect_email_in_basic_authorization() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;

    let response = put_user(
        &app,
        id,
        None,
        Auth::Basic("wronguser@mail.com", "P4ssword"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn returns_403_with_incorrect_password_in_basic_authorization() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;

    let response = put_user(
        &app,
        id,
        None,
        Auth::Basic("user1@mail.com", "wrongpassword"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn returns_403_when_credentials_are_correct_but_target_is_another_user() {
    let (state, app) = spawn_app().await;
    add_user(&state, "user1", "user1@mail.com", false).await;
    let other_id = add_user(&state, "user2", "user2@mail.com", false).await;

    let response = put_user(
        &app,
        other_id,
        None,
        Auth::Basic("user1@mail.com", "P4ssword"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let other = state.store().find_user_by_id(other_id).await.unwrap().unwrap();
    assert_eq!(other.username, "user2");
}

#[tokio::test]
async fn returns_403_when_inactive_user_targets_their_own_profile() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", true).await;

    let response = put_user(&app, id, None, Auth::Basic("user1@mail.com", "P4ssword")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn returns_403_when_token_is_not_valid() {
    let (_state, app) = spawn_app().await;

    let response = put_user(&app, 5, None, Auth::Token("wrong-token".to_string())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn token_bound_to_one_user_cannot_update_another() {
    let (state, app) = spawn_app().await;
    let first_id = add_user(&state, "user1", "user1@mail.com", false).await;
    add_user(&state, "user2", "user2@mail.com", false).await;

    let second_token = login_token(&app, "user2@mail.com", "P4ssword").await;

    let response = put_user(
        &app,
        first_id,
        Some(serde_json::json!({ "username": "hijacked" })),
        Auth::Token(second_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let first = state.store().find_user_by_id(first_id).await.unwrap().unwrap();
    assert_eq!(first.username, "user1");
}

#[tokio::test]
async fn updates_username_in_database_for_authorized_request() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let response = put_user(
        &app,
        id,
        Some(serde_json::json!({ "username": "user1-updated" })),
        Auth::Token(token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let user = state.store().find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.username, "user1-updated");
}

#[tokio::test]
async fn basic_authorization_also_authorizes_an_update() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;

    let response = put_user(
        &app,
        id,
        Some(serde_json::json!({ "username": "user1-updated" })),
        Auth::Basic("user1@mail.com", "P4ssword"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn success_body_has_only_id_username_email_and_image() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let response = put_user(
        &app,
        id,
        Some(serde_json::json!({ "username": "user1-updated", "image": jpeg_base64(256) })),
        Auth::Token(token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let mut keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["email", "id", "image", "username"]);
}

#[tokio::test]
async fn saves_image_to_profile_folder_and_stores_filename() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let response = put_user(
        &app,
        id,
        Some(serde_json::json!({ "username": "user1-updated", "image": jpeg_base64(256) })),
        Auth::Token(token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let user = state.store().find_user_by_id(id).await.unwrap().unwrap();
    let filename = user.image.expect("image reference not stored");
    assert!(state.images().profile_folder().join(&filename).exists());
}

#[tokio::test]
async fn removes_old_image_after_a_new_one_is_committed() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let first = body_json(
        put_user(
            &app,
            id,
            Some(serde_json::json!({ "image": jpeg_base64(256) })),
            Auth::Token(token.clone()),
        )
        .await,
    )
    .await;
    let first_image = first["image"].as_str().unwrap().to_string();

    let second = body_json(
        put_user(
            &app,
            id,
            Some(serde_json::json!({ "image": png_base64() })),
            Auth::Token(token),
        )
        .await,
    )
    .await;
    let second_image = second["image"].as_str().unwrap().to_string();

    let folder = state.images().profile_folder();
    assert!(!folder.join(&first_image).exists());
    assert!(folder.join(&second_image).exists());
    assert_ne!(first_image, second_image);
}

#[tokio::test]
async fn keeps_the_old_image_when_update_has_no_image_field() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let first = body_json(
        put_user(
            &app,
            id,
            Some(serde_json::json!({ "image": jpeg_base64(256) })),
            Auth::Token(token.clone()),
        )
        .await,
    )
    .await;
    let first_image = first["image"].as_str().unwrap().to_string();

    let response = put_user(
        &app,
        id,
        Some(serde_json::json!({ "username": "user1-updated-twice" })),
        Auth::Token(token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(state.images().profile_folder().join(&first_image).exists());
    let user = state.store().find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.image.as_deref(), Some(first_image.as_str()));
}

#[tokio::test]
async fn accepts_an_image_of_exactly_two_mib_decoded() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let response = put_user(
        &app,
        id,
        Some(serde_json::json!({ "image": jpeg_base64(TWO_MIB) })),
        Auth::Token(token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rejects_an_image_one_byte_over_two_mib() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let response = put_user(
        &app,
        id,
        Some(serde_json::json!({ "image": jpeg_base64(TWO_MIB + 1) })),
        Auth::Token(token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(
        body["validationErrors"]["image"],
        "Your profile image cannot be bigger than 2MB"
    );
}

#[tokio::test]
async fn oversize_image_aborts_the_whole_update() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let response = put_user(
        &app,
        id,
        Some(serde_json::json!({
            "username": "should-not-stick",
            "image": jpeg_base64(TWO_MIB + 1)
        })),
        Auth::Token(token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let user = state.store().find_user_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.username, "user1");
    assert!(user.image.is_none());
}

#[tokio::test]
async fn sniffs_content_type_and_enforces_the_allow_list() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let cases = [
        (gif_base64(), StatusCode::BAD_REQUEST),
        (pdf_base64(), StatusCode::BAD_REQUEST),
        (text_base64(), StatusCode::BAD_REQUEST),
        (jpeg_base64(256), StatusCode::OK),
        (png_base64(), StatusCode::OK),
    ];

    for (payload, expected) in cases {
        let response = put_user(
            &app,
            id,
            Some(serde_json::json!({ "image": payload })),
            Auth::Token(token.clone()),
        )
        .await;
        assert_eq!(response.status(), expected);

        if expected == StatusCode::BAD_REQUEST {
            let body = body_json(response).await;
            assert_eq!(
                body["validationErrors"]["image"],
                "Only JPEG or PNG files are allowed"
            );
        }
    }
}

#[tokio::test]
async fn field_violations_accumulate_in_one_response() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let response = put_user(
        &app,
        id,
        Some(serde_json::json!({ "username": "usr", "email": "not-an-email" })),
        Auth::Token(token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(
        body["validationErrors"]["username"],
        "Must have min 4 and max 32 characters"
    );
    assert_eq!(body["validationErrors"]["email"], "E-mail is not valid");
}

#[tokio::test]
async fn registration_creates_an_active_account_that_can_login() {
    let (_state, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/1.0/users")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": "user1",
                        "email": "user1@mail.com",
                        "password": "P4ssword"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["username"], "user1");
    assert!(body["id"].as_i64().is_some());

    let token = login_token(&app, "user1@mail.com", "P4ssword").await;
    assert!(!token.is_empty());
}

#[tokio::test]
async fn registration_accumulates_violations_for_all_fields() {
    let (_state, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/1.0/users")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": "usr",
                        "email": "bad-email",
                        "password": "short"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let errors = body["validationErrors"].as_object().unwrap();
    assert_eq!(errors.len(), 3);
    assert!(errors.contains_key("username"));
    assert!(errors.contains_key("email"));
    assert!(errors.contains_key("password"));
}

#[tokio::test]
async fn registration_rejects_an_email_already_in_use() {
    let (state, app) = spawn_app().await;
    add_user(&state, "user1", "user1@mail.com", false).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/1.0/users")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": "someone-else",
                        "email": "user1@mail.com",
                        "password": "P4ssword"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["validationErrors"]["email"], "E-mail already in use");
}

#[tokio::test]
async fn stored_images_are_served_with_a_one_year_cache() {
    let (state, app) = spawn_app().await;
    let id = add_user(&state, "user1", "user1@mail.com", false).await;
    let token = login_token(&app, "user1@mail.com", "P4ssword").await;

    let body = body_json(
        put_user(
            &app,
            id,
            Some(serde_json::json!({ "image": jpeg_base64(256) })),
            Auth::Token(token),
        )
        .await,
    )
    .await;
    let filename = body["image"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/images/{filename}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cache_control = response
        .headers()
        .get("cache-control")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cache_control.contains("max-age=31536000"));

    let missing = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/images/does-not-exist.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
