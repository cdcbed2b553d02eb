//! Integration tests for tracker persistence across server restarts
//!
//! Counted tab switches are written to the database, so a student who
//! reloads (or a server that restarts) does not get a clean slate.

use super::common::app::{question_ids, TestApp};
use axum::http::StatusCode;
use examroom::data::Database;
use serde_json::json;
use tempfile::TempDir;

fn open_db(dir: &TempDir) -> Database {
    Database::open(dir.path().join("examroom.db")).expect("Failed to open database")
}

#[tokio::test]
async fn test_counts_survive_restart() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let exam_id = {
        let app = TestApp::with_database(open_db(&dir));
        let exam = app.create_math_exam().await;
        let exam_id = exam["id"].as_str().unwrap().to_string();

        app.post(
            &format!("/api/exams/{}/tracking/start", exam_id),
            &app.student_token,
            json!({}),
        )
        .await;
        let json = app.hide_for(&exam_id, 11_000).await;
        assert_eq!(json["tracking"]["visibility_change_count"], 1);
        exam_id
    };

    // Fresh state over the same file: nothing in memory yet
    let app = TestApp::with_database(open_db(&dir));

    let (status, json) = app
        .post(
            &format!("/api/exams/{}/tracking/start", exam_id),
            &app.student_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tracking"]["visibility_change_count"], 1);
    assert_eq!(json["tracking"]["is_cheating"], false);

    let json = app.hide_for(&exam_id, 10_000).await;
    assert_eq!(json["tracking"]["visibility_change_count"], 2);
    assert_eq!(json["tracking"]["is_cheating"], true);
}

#[tokio::test]
async fn test_submission_after_restart_uses_persisted_record() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let (exam_id, questions) = {
        let app = TestApp::with_database(open_db(&dir));
        let exam = app.create_math_exam().await;
        let exam_id = exam["id"].as_str().unwrap().to_string();

        app.post(
            &format!("/api/exams/{}/tracking/start", exam_id),
            &app.student_token,
            json!({}),
        )
        .await;
        app.hide_for(&exam_id, 30_000).await;
        app.hide_for(&exam_id, 30_000).await;
        (exam_id, question_ids(&exam))
    };

    let app = TestApp::with_database(open_db(&dir));
    let mut answers = serde_json::Map::new();
    answers.insert(questions[0].clone(), json!(0));

    let (status, json) = app
        .post(
            &format!("/api/exams/{}/submissions", exam_id),
            &app.student_token,
            json!({ "answers": answers }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    assert_eq!(json["submission"]["visibility_change_times"], 2);
    assert_eq!(json["submission"]["caught_cheating"], true);
    assert_eq!(json["submission"]["percentage"], 33.33);
}

#[tokio::test]
async fn test_records_are_per_student() {
    let app = TestApp::new();
    let exam = app.create_math_exam().await;
    let exam_id = exam["id"].as_str().unwrap().to_string();

    app.post(
        &format!("/api/exams/{}/tracking/start", exam_id),
        &app.student_token,
        json!({}),
    )
    .await;
    app.hide_for(&exam_id, 10_000).await;

    // A second student starting the same exam begins from zero
    let (status, json) = app
        .post(
            "/api/users",
            &app.teacher_token,
            json!({"username": "wanda", "password": "pw", "role": "student"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let wanda = app
        .state
        .users()
        .get_by_id(json["user"]["id"].as_str().unwrap().parse().unwrap())
        .unwrap()
        .unwrap();
    let wanda_token = app.state.signer().issue(&wanda).unwrap();

    let (status, json) = app
        .post(
            &format!("/api/exams/{}/tracking/start", exam_id),
            &wanda_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tracking"]["visibility_change_count"], 0);
}
