//! End-to-end tests of the HTTP API, driven through the router without a
//! listening socket.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use mindpop::api::{ApiState, build_router};
use mindpop::config::Config;
use mindpop::llm::providers::{build_images, build_llm};
use mindpop::speech::Transcriber;
use mindpop::store::Store;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@mindpop.test";

fn app() -> (TempDir, Router) {
    app_with(|_| {})
}

fn app_with(adjust: impl FnOnce(&mut Config)) -> (TempDir, Router) {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::local_default(tmp.path(), "test-secret");
    config.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
    adjust(&mut config);
    let store = Store::open(&config.db_path()).unwrap();
    let llm = build_llm(&config.llm, Some("test-key".into())).unwrap();
    let images = build_images(&config.images, None).unwrap();
    let transcriber = Transcriber::new(&config.dyslexia);
    let router = build_router(ApiState::new(config, store, llm, images, transcriber));
    (tmp, router)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        json_req(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "username": "player",
                "email": email,
                "password": "secret123",
                "name": "Player One",
                "age": 9,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_ok() {
    let (_tmp, app) = app();
    let (status, body) = send(&app, get("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn duplicate_registration_rejected() {
    let (_tmp, app) = app();
    register(&app, "kid@mindpop.test").await;

    let (status, body) = send(
        &app,
        json_req(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "username": "other",
                "email": "KID@mindpop.test",
                "password": "secret123",
                "name": "Other",
                "age": 10,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User already exists");
}

#[tokio::test]
async fn registration_reports_field_errors() {
    let (_tmp, app) = app();
    let (status, body) = send(
        &app,
        json_req("POST", "/api/auth/register", None, json!({ "username": "ab", "email": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<_> = body["errors"].as_array().unwrap().iter().map(|e| e["field"].clone()).collect();
    assert!(fields.contains(&json!("username")));
    assert!(fields.contains(&json!("email")));
    assert!(fields.contains(&json!("age")));
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let (_tmp, app) = app();
    register(&app, "login@mindpop.test").await;

    let (status, body) = send(
        &app,
        json_req("POST", "/api/auth/login", None, json!({ "email": "login@mindpop.test", "password": "wrong!!" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = send(
        &app,
        json_req("POST", "/api/auth/login", None, json!({ "email": "ghost@mindpop.test", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        json_req("POST", "/api/auth/login", None, json!({ "email": "login@mindpop.test", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn protected_routes_check_tokens() {
    let (_tmp, app) = app();

    let (status, body) = send(&app, get("/api/users/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authorized, no token provided");

    let (status, body) = send(&app, get("/api/users/me", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authorized, token failed");

    let token = register(&app, "me@mindpop.test").await;
    let (status, body) = send(&app, get("/api/users/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "me@mindpop.test");
    assert_eq!(body["data"]["privacySettings"]["receiveEmails"], true);
}

#[tokio::test]
async fn logout_all_revokes_every_session() {
    let (_tmp, app) = app();
    let first = register(&app, "multi@mindpop.test").await;
    let (_, body) = send(
        &app,
        json_req("POST", "/api/auth/login", None, json!({ "email": "multi@mindpop.test", "password": "secret123" })),
    )
    .await;
    let second = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(&app, json_req("POST", "/api/auth/logout-all", Some(&first), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    for token in [&first, &second] {
        let (status, body) = send(&app, get("/api/users/me", Some(token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Not authorized, token failed");
    }
}

#[tokio::test]
async fn summary_reports_improvement_and_rounded_averages() {
    let (_tmp, app) = app();
    let token = register(&app, "games@mindpop.test").await;

    for time in [100.0, 90.0, 80.0, 70.0, 60.0, 50.5] {
        let (status, _) = send(
            &app,
            json_req("POST", "/api/progress", Some(&token), json!({ "gameType": "seguin", "completionTime": time })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get("/api/progress?game=all&timeFrame=week", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    // first three average 90, last three 60.17
    assert_eq!(body["improvementMetrics"]["seguin"], 33);
    assert_eq!(body["averageCompletionTimes"]["seguin"], 75.1);
    assert_eq!(body["totalSessions"], 6);
    assert_eq!(body["gameDistribution"]["seguin"], 100);

    let (status, body) = send(&app, get("/api/progress?game=chess", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid game type");
}

#[tokio::test]
async fn stats_without_sessions_returns_empty_state() {
    let (_tmp, app) = app();
    let token = register(&app, "empty@mindpop.test").await;
    let (status, body) = send(&app, get("/api/progress/stats/monkey", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalSessions"], 0);
    assert!(body["data"]["bestTime"].is_null());
}

#[tokio::test]
async fn owner_reply_reopens_closed_ticket() {
    let (_tmp, app) = app();
    let owner = register(&app, "help@mindpop.test").await;
    let admin = register(&app, ADMIN_EMAIL).await;

    let (status, body) = send(
        &app,
        json_req("POST", "/api/support/ticket", Some(&owner), json!({ "subject": "Stuck", "message": "Level 3 froze" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["ticketId"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        json_req("PUT", &format!("/api/support/ticket/{id}/status"), Some(&owner), json!({ "status": "closed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admin access required");

    let (status, body) = send(
        &app,
        json_req("PUT", &format!("/api/support/ticket/{id}/status"), Some(&admin), json!({ "status": "closed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["status"], "closed");

    let (status, body) = send(
        &app,
        json_req("POST", &format!("/api/support/ticket/{id}/respond"), Some(&owner), json!({ "message": "Still broken" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["status"], "open");
    assert_eq!(body["ticket"]["responses"][0]["isAdmin"], false);

    let (status, _) = send(&app, get(&format!("/api/support/ticket/{id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn analysis_is_private_to_its_owner() {
    let (_tmp, app) = app();
    let owner = register(&app, "video@mindpop.test").await;
    let other = register(&app, "nosy@mindpop.test").await;

    let (status, body) = send(
        &app,
        json_req(
            "POST",
            "/api/analysis/save",
            Some(&owner),
            json!({
                "originalFilename": "clip.mp4",
                "results": { "overallScore": 0.2, "behaviors": { "spinning": { "detected": true, "confidence": 0.8 } } },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["_id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, get(&format!("/api/analysis/{id}"), Some(&owner))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, get(&format!("/api/analysis/{id}"), Some(&other))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");
}

fn profile_multipart(boundary: &str, name: &str, image: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n").as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"profilePicture\"; filename=\"me.png\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn profile_request(token: &str, name: &str, image: &[u8]) -> Request<Body> {
    let boundary = "mindpop-boundary";
    Request::builder()
        .method("PUT")
        .uri("/api/users/profile")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(profile_multipart(boundary, name, image)))
        .unwrap()
}

#[tokio::test]
async fn new_profile_picture_replaces_old_file() {
    let (tmp, app) = app();
    let token = register(&app, "pic@mindpop.test").await;
    let profiles = tmp.path().join("uploads").join("profiles");

    let (status, body) = send(&app, profile_request(&token, "First Pic", b"\x89PNG one")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let first = body["data"]["profilePicture"].as_str().unwrap().to_string();
    let first_file = profiles.join(first.rsplit('/').next().unwrap());
    assert!(first_file.exists());

    let res = app.clone().oneshot(get(&first, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");

    let (status, body) = send(&app, profile_request(&token, "Second Pic", b"\x89PNG two")).await;
    assert_eq!(status, StatusCode::OK);
    let second = body["data"]["profilePicture"].as_str().unwrap().to_string();
    assert_ne!(first, second);
    assert_eq!(body["data"]["name"], "Second Pic");
    assert!(!first_file.exists());
    assert!(profiles.join(second.rsplit('/').next().unwrap()).exists());
}

#[tokio::test]
async fn typing_text_uses_provider_reply() {
    let (_tmp, app) = app();
    let (status, body) = send(
        &app,
        json_req("POST", "/api/typing/text", None, json!({ "ageGroup": "8-10", "level": "poems" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], "poems");
    assert!(!body["text"].as_str().unwrap().is_empty());

    let (status, _) = send(&app, json_req("POST", "/api/typing/text", None, json!({ "ageGroup": "3-4" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn typing_text_falls_back_when_provider_unreachable() {
    let (_tmp, app) = app_with(|config| {
        config.llm.provider = "openai".into();
        config.llm.openai.api_base_url = "http://127.0.0.1:1/v1/chat/completions".into();
        config.llm.openai.timeout_seconds = 2;
    });
    let (status, body) = send(
        &app,
        json_req("POST", "/api/typing/text", None, json!({ "ageGroup": "8-10", "level": "poems" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "fallback");
    assert_eq!(body["level"], "poems");
    assert!(!body["text"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn typing_score_advances_timer() {
    let (_tmp, app) = app();
    let text = "the quick brown fox jumps over the lazy dog and runs far away now";
    let (status, body) = send(
        &app,
        json_req(
            "POST",
            "/api/typing/score",
            None,
            json!({ "ageGroup": "8-10", "typed": text, "expected": text, "seconds": 30, "timeLeft": 100 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["errors"], 0);
    assert_eq!(body["accuracy"], 100.0);
    assert_eq!(body["timeLeft"], 98);
    assert_eq!(body["initialTimer"], 120);
}

fn reading_request(audio: Option<(&str, &str)>, sentence: Option<&str>) -> Request<Body> {
    let boundary = "reading-boundary";
    let mut body = Vec::new();
    if let Some(sentence) = sentence {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"sentence\"\r\n\r\n{sentence}\r\n")
                .as_bytes(),
        );
    }
    if let Some((file_name, content_type)) = audio {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"{file_name}\"\r\n\
                 Content-Type: {content_type}\r\n\r\nRIFF....WAVEfmt \r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri("/api/dyslexia/run")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn dyslexia_run_scores_transcript_and_cleans_up() {
    let (tmp, app) = app_with(|config| {
        config.dyslexia.transcriber = vec!["sh".into(), "-c".into(), "echo the cat sat".into()];
    });
    let audio_dir = tmp.path().join("uploads").join("audio");

    let (status, body) =
        send(&app, reading_request(Some(("take.wav", "audio/wav")), Some("The cat sat"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["accuracy"], 100);
    assert_eq!(body["status"], "success");
    assert_eq!(body["userSpeech"], "the cat sat");
    let left = std::fs::read_dir(&audio_dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(left, 0);

    let (status, body) = send(&app, reading_request(None, Some("The cat sat"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No audio file uploaded");

    let (status, body) = send(&app, reading_request(Some(("take.wav", "audio/wav")), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No sentence provided");

    let (status, body) =
        send(&app, reading_request(Some(("take.mp3", "audio/mpeg")), Some("The cat sat"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only WAV files are allowed");
}

#[tokio::test]
async fn image_prompt_must_be_long_enough() {
    let (_tmp, app) = app();
    let (status, body) = send(&app, json_req("POST", "/api/generate-image", None, json!({ "prompt": "cat" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Prompt must be at least 10 characters long");

    let (status, body) = send(
        &app,
        json_req("POST", "/api/generate-image", None, json!({ "prompt": "a friendly dragon in a meadow" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["output"].as_str().unwrap().starts_with("http"));
}

#[tokio::test]
async fn uploads_reject_traversal() {
    let (_tmp, app) = app();
    let res = app.clone().oneshot(get("/uploads/profiles/missing.png", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = app.clone().oneshot(get("/uploads/../mindpop.db", None)).await.unwrap();
    assert_ne!(res.status(), StatusCode::OK);
}
