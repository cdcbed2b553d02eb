//! In-process app fixture
//!
//! Drives the router with `tower::ServiceExt::oneshot`. Trackers read time
//! from a [`ManualClock`] so hidden intervals can be simulated instantly.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use examroom::data::{Database, Role, User};
use examroom::tracker::ManualClock;
use examroom::{build_router, Config, WebAppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const TEACHER: &str = "ms-frizzle";
pub const STUDENT: &str = "arnold";
pub const PASSWORD: &str = "magic-school-bus";

/// Fixed start time for the manual clock (2023-11-14T22:13:20Z)
pub const CLOCK_START_MILLIS: i64 = 1_700_000_000_000;

pub struct TestApp {
    pub state: WebAppState,
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub teacher: User,
    pub student: User,
    pub teacher_token: String,
    pub student_token: String,
}

impl TestApp {
    /// App over a fresh in-memory database
    pub fn new() -> Self {
        Self::with_database(Database::open_in_memory().expect("Failed to open database"))
    }

    /// App over an existing database, seeding the two accounts if missing
    pub fn with_database(db: Database) -> Self {
        let config = Config::default().with_token_secret("integration-test-secret");
        let clock = Arc::new(ManualClock::new(CLOCK_START_MILLIS));
        let state = WebAppState::with_clock(config, db, clock.clone());

        let teacher = seed_user(&state, TEACHER, Role::Teacher);
        let student = seed_user(&state, STUDENT, Role::Student);
        let teacher_token = state.signer().issue(&teacher).expect("Failed to issue token");
        let student_token = state.signer().issue(&student).expect("Failed to issue token");

        Self {
            router: build_router(state.clone(), true),
            state,
            clock,
            teacher,
            student,
            teacher_token,
            student_token,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response is not JSON")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Create a three-question "math" exam as the teacher and return it
    /// (correct answers included).
    pub async fn create_math_exam(&self) -> Value {
        let (status, json) = self
            .post(
                "/api/exams",
                &self.teacher_token,
                json!({
                    "test_type": "math",
                    "title": "Fractions",
                    "description": "Unit 3 check-in",
                    "time_limit_minutes": 20,
                    "questions": [
                        {"prompt": "1/2 + 1/2", "options": ["1", "2", "1/4"], "correct_option": 0},
                        {"prompt": "1/2 of 8", "options": ["2", "4", "16"], "correct_option": 1},
                        {"prompt": "3/4 - 1/4", "options": ["1/2", "1", "0"], "correct_option": 0}
                    ]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create exam failed: {}", json);
        json["exam"].clone()
    }

    /// Report hidden, let `millis` pass, then report visible.
    pub async fn hide_for(&self, exam_id: &str, millis: i64) -> Value {
        let uri = format!("/api/exams/{}/tracking/visibility", exam_id);
        let (status, _) = self
            .post(&uri, &self.student_token, json!({"state": "hidden"}))
            .await;
        assert_eq!(status, StatusCode::OK);

        self.clock.advance_millis(millis);

        let (status, json) = self
            .post(&uri, &self.student_token, json!({"state": "visible"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        json
    }
}

fn seed_user(state: &WebAppState, username: &str, role: Role) -> User {
    if let Some(user) = state
        .users()
        .get_by_username(username)
        .expect("Failed to query users")
    {
        return user;
    }
    let user = User::new(username, username, role, PASSWORD);
    state.users().create(&user).expect("Failed to seed user");
    user
}

/// Question ids of an exam response, in order
pub fn question_ids(exam: &Value) -> Vec<String> {
    exam["questions"]
        .as_array()
        .expect("exam has questions")
        .iter()
        .map(|q| q["id"].as_str().expect("question id").to_string())
        .collect()
}
