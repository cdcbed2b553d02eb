//! Integration tests for taking an exam
//!
//! Covers the path from exam creation through tracking to a scored
//! submission, and the role checks along the way.

use super::common::app::{question_ids, TestApp};
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_full_exam_flow_with_cheating() {
    let app = TestApp::new();
    let exam = app.create_math_exam().await;
    let exam_id = exam["id"].as_str().unwrap().to_string();
    let questions = question_ids(&exam);

    // Student sees the exam without answers
    let (status, json) = app
        .get(&format!("/api/exams/{}", exam_id), &app.student_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["exam"]["question_count"], 3);
    assert!(json["exam"]["questions"][0].get("correct_option").is_none());

    let (status, json) = app
        .post(
            &format!("/api/exams/{}/tracking/start", exam_id),
            &app.student_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tracking"]["is_test_active"], true);

    // A quick glance away does not count
    let json = app.hide_for(&exam_id, 3_000).await;
    assert_eq!(json["outcome"], "returned_quickly");
    assert_eq!(json["tracking"]["visibility_change_count"], 0);

    let json = app.hide_for(&exam_id, 12_000).await;
    assert_eq!(json["outcome"], "counted");
    assert_eq!(json["hidden_ms"], 12_000);
    assert_eq!(json["tracking"]["is_cheating"], false);

    let json = app.hide_for(&exam_id, 15_000).await;
    assert_eq!(json["tracking"]["visibility_change_count"], 2);
    assert_eq!(json["tracking"]["is_cheating"], true);

    // Two of three correct
    let mut answers = serde_json::Map::new();
    answers.insert(questions[0].clone(), json!(0));
    answers.insert(questions[1].clone(), json!(1));
    answers.insert(questions[2].clone(), json!(2));
    let (status, json) = app
        .post(
            &format!("/api/exams/{}/submissions", exam_id),
            &app.student_token,
            json!({ "answers": answers }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    let submission = &json["submission"];
    assert_eq!(submission["earned_points"], 2);
    assert_eq!(submission["possible_points"], 3);
    assert_eq!(submission["percentage"], 66.67);
    assert_eq!(submission["visibility_change_times"], 2);
    assert_eq!(submission["caught_cheating"], true);

    // Submitting stopped the tracker
    let (_, json) = app
        .get(&format!("/api/exams/{}/tracking", exam_id), &app.student_token)
        .await;
    assert_eq!(json["tracking"]["is_test_active"], false);

    // Only one submission per exam
    let (status, json) = app
        .post(
            &format!("/api/exams/{}/submissions", exam_id),
            &app.student_token,
            json!({ "answers": {} }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);

    // Teacher sees the submission with the student's name
    let (status, json) = app
        .get(&format!("/api/exams/{}/submissions", exam_id), &app.teacher_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let submissions = json["submissions"].as_array().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["username"], "arnold");

    let (status, json) = app.get("/api/me/submissions", &app.student_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["submissions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_teacher_sees_persisted_tracking_records() {
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

    let (status, json) = app
        .get(
            &format!("/api/users/{}/tracking", app.student.id),
            &app.teacher_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let records = json["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["visibility_change_times"], 1);
    assert_eq!(records[0]["caught_cheating"], false);
    assert_eq!(records[0]["test_type"], "math");
    assert_eq!(records[0]["test_id"], exam_id.as_str());

    // Students cannot look at anyone's records
    let (status, _) = app
        .get(
            &format!("/api/users/{}/tracking", app.student.id),
            &app.student_token,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_clear_tracking_resets_attempt() {
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
    app.hide_for(&exam_id, 10_000).await;

    let (status, json) = app
        .delete(&format!("/api/exams/{}/tracking", exam_id), &app.student_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["tracking"],
        json!({"visibility_change_count": 0, "is_cheating": false, "is_test_active": false})
    );

    // Events are ignored until tracking starts again
    let json = app.hide_for(&exam_id, 20_000).await;
    assert_eq!(json["outcome"], "ignored");

    let (_, json) = app
        .get(
            &format!("/api/users/{}/tracking", app.student.id),
            &app.teacher_token,
        )
        .await;
    assert!(json["records"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_visibility_requires_state() {
    let app = TestApp::new();
    let exam = app.create_math_exam().await;
    let exam_id = exam["id"].as_str().unwrap();

    let (status, json) = app
        .post(
            &format!("/api/exams/{}/tracking/visibility", exam_id),
            &app.student_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "bad_request");
}

#[tokio::test]
async fn test_role_checks() {
    let app = TestApp::new();
    let exam = app.create_math_exam().await;
    let exam_id = exam["id"].as_str().unwrap();

    // Teachers do not take exams
    let (status, _) = app
        .post(
            &format!("/api/exams/{}/tracking/start", exam_id),
            &app.teacher_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Students do not manage exams
    let (status, json) = app
        .delete(&format!("/api/exams/{}", exam_id), &app.student_token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "forbidden");

    let (status, _) = app
        .delete(&format!("/api/exams/{}", exam_id), &app.teacher_token)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .delete(&format!("/api/exams/{}", exam_id), &app.teacher_token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_question_is_rejected() {
    let app = TestApp::new();
    let exam = app.create_math_exam().await;
    let exam_id = exam["id"].as_str().unwrap();

    let (status, json) = app
        .post(
            &format!("/api/exams/{}/submissions", exam_id),
            &app.student_token,
            json!({"answers": {"00000000-0000-0000-0000-000000000000": 0}}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    // Nothing was recorded, so a corrected submission still goes through
    let (status, _) = app
        .post(
            &format!("/api/exams/{}/submissions", exam_id),
            &app.student_token,
            json!({"answers": {}}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_list_exams_filters_by_test_type() {
    let app = TestApp::new();
    app.create_math_exam().await;
    let (status, _) = app
        .post(
            "/api/exams",
            &app.teacher_token,
            json!({
                "test_type": "reading",
                "title": "Chapter 1",
                "questions": [{"prompt": "Who?", "options": ["A", "B"], "correct_option": 0, "points": 2}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, json) = app.get("/api/exams", &app.student_token).await;
    assert_eq!(json["exams"].as_array().unwrap().len(), 2);

    let (_, json) = app
        .get("/api/exams?test_type=reading", &app.student_token)
        .await;
    let exams = json["exams"].as_array().unwrap();
    assert_eq!(exams.len(), 1);
    assert_eq!(exams[0]["title"], "Chapter 1");
    assert_eq!(exams[0]["possible_points"], 2);
}

#[tokio::test]
async fn test_submission_releases_the_tracker() {
    let app = TestApp::new();
    let exam = app.create_math_exam().await;
    let exam_id = exam["id"].as_str().unwrap().to_string();

    app.post(
        &format!("/api/exams/{}/tracking/start", exam_id),
        &app.student_token,
        json!({}),
    )
    .await;
    app.hide_for(&exam_id, 12_000).await;
    assert_eq!(app.state.trackers().len(), 1);

    let (status, json) = app
        .post(
            &format!("/api/exams/{}/submissions", exam_id),
            &app.student_token,
            json!({"answers": {}}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["submission"]["visibility_change_times"], 1);
    assert!(app.state.trackers().is_empty());
}

#[tokio::test]
async fn test_deleting_exam_drops_its_tracking_records() {
    let app = TestApp::new();
    let kept = app.create_math_exam().await;
    let kept_id = kept["id"].as_str().unwrap().to_string();
    let doomed = app.create_math_exam().await;
    let doomed_id = doomed["id"].as_str().unwrap().to_string();

    for exam_id in [&kept_id, &doomed_id] {
        app.post(
            &format!("/api/exams/{}/tracking/start", exam_id),
            &app.student_token,
            json!({}),
        )
        .await;
        app.hide_for(exam_id, 11_000).await;
    }
    assert_eq!(app.state.trackers().len(), 2);

    let (status, _) = app
        .delete(&format!("/api/exams/{}", doomed_id), &app.teacher_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.trackers().len(), 1);

    let (_, json) = app
        .get(
            &format!("/api/users/{}/tracking", app.student.id),
            &app.teacher_token,
        )
        .await;
    let records = json["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["test_id"], kept_id.as_str());
}
