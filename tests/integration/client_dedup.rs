//! Integration tests for the API client's request deduplication
//!
//! Runs a real server on an ephemeral port and counts the requests that
//! actually reach it.

use super::common::app::{PASSWORD, STUDENT, TEACHER};
use super::common::server::TestServer;
use examroom::ApiClient;
use serde_json::json;

async fn logged_in_client(server: &TestServer, username: &str) -> ApiClient {
    let mut client = ApiClient::new(server.base_url());
    client
        .login(username, PASSWORD)
        .await
        .expect("login failed");
    client
}

#[tokio::test]
async fn test_concurrent_gets_share_one_request() {
    let server = TestServer::start().await;
    server.app.create_math_exam().await;
    let client = logged_in_client(&server, STUDENT).await;
    let before = server.hits();

    let (a, b, c) = tokio::join!(
        client.get("exams", None),
        client.get("exams", None),
        client.get("/exams", None),
    );
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
    assert_eq!(a["exams"].as_array().unwrap().len(), 1);
    assert_eq!(server.hits() - before, 1);

    // Served from the cache
    let again = client.get("exams", None).await.unwrap();
    assert_eq!(again, a);
    assert_eq!(server.hits() - before, 1);

    let stats = client.deduplicator().stats();
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.cached, 1);
}

#[tokio::test]
async fn test_params_are_part_of_the_key() {
    let server = TestServer::start().await;
    server.app.create_math_exam().await;
    let client = logged_in_client(&server, STUDENT).await;
    let before = server.hits();

    let math = client
        .get("exams", Some(&json!({"test_type": "math"})))
        .await
        .unwrap();
    let reading = client
        .get("exams", Some(&json!({"test_type": "reading"})))
        .await
        .unwrap();
    assert_eq!(math["exams"].as_array().unwrap().len(), 1);
    assert!(reading["exams"].as_array().unwrap().is_empty());
    assert_eq!(server.hits() - before, 2);

    let url = format!("{}/api/exams", server.base_url());
    assert!(client
        .deduplicator()
        .cached_result("get", &url, Some(&json!({"test_type": "math"})))
        .is_some());
}

#[tokio::test]
async fn test_posts_are_never_deduplicated() {
    let server = TestServer::start().await;
    let client = ApiClient::new(server.base_url());
    let body = json!({"username": TEACHER, "password": PASSWORD});

    let (a, b) = tokio::join!(client.post("auth/login", &body), client.post("auth/login", &body));
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_failures_are_shared_and_not_cached() {
    let server = TestServer::start().await;
    let client = ApiClient::new(server.base_url());

    let (a, b) = tokio::join!(client.get("auth/me", None), client.get("auth/me", None));
    assert_eq!(a.unwrap_err().status(), Some(401));
    assert_eq!(b.unwrap_err().status(), Some(401));
    assert_eq!(server.hits(), 1);

    let c = client.get("auth/me", None).await;
    assert_eq!(c.unwrap_err().status(), Some(401));
    assert_eq!(server.hits(), 2);
    assert_eq!(client.deduplicator().stats().cached, 0);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let server = TestServer::start().await;
    let mut client = ApiClient::new(server.base_url());

    let err = client.login(STUDENT, "wrong").await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(client.token().is_none());
}

#[tokio::test]
async fn test_switching_token_does_not_reuse_cached_reads() {
    let server = TestServer::start().await;
    let teacher = logged_in_client(&server, TEACHER).await;
    let student = logged_in_client(&server, STUDENT).await;
    let params = json!({"role": "student"});

    let users = teacher.get("users", Some(&params)).await.unwrap();
    assert_eq!(users["success"], true);

    // A clone under the student's token must ask the server itself
    let student_token = student.token().unwrap().to_string();
    let impersonated = teacher.clone().with_token(student_token);
    let err = impersonated.get("users", Some(&params)).await.unwrap_err();
    assert_eq!(err.status(), Some(403));

    // The teacher's own cache is untouched
    assert!(teacher
        .deduplicator()
        .cached_result("GET", &format!("{}/api/users", server.base_url()), Some(&params))
        .is_some());
}

#[tokio::test]
async fn test_login_without_token_is_an_error() {
    use axum::routing::post;
    use axum::{Json, Router};
    use examroom::ClientError;

    let router = Router::new().route(
        "/api/auth/login",
        post(|| async { Json(json!({"success": true})) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let mut client = ApiClient::new(format!("http://{}", addr));
    let err = client.login(STUDENT, PASSWORD).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingToken { .. }));
    assert!(client.token().is_none());

    handle.abort();
}
