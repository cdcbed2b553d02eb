//! Score computation for submitted answers

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::data::Exam;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoringError {
    #[error("Question {0} is not part of this exam")]
    UnknownQuestion(Uuid),
    #[error("Question {question_id} has no option {option}")]
    OptionOutOfRange { question_id: Uuid, option: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub earned_points: u32,
    pub possible_points: u32,
    /// Rounded to two decimals
    pub percentage: f64,
    pub correct_count: usize,
    pub question_count: usize,
}

/// Score `answers` (question id → chosen option) against `exam`.
///
/// Unanswered questions earn nothing. Answers to questions outside the exam,
/// or naming an option the question does not have, are rejected.
pub fn score_answers(exam: &Exam, answers: &BTreeMap<Uuid, u32>) -> Result<Score, ScoringError> {
    for (&question_id, &option) in answers {
        let question = exam
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(ScoringError::UnknownQuestion(question_id))?;
        if option as usize >= question.options.len() {
            return Err(ScoringError::OptionOutOfRange {
                question_id,
                option,
            });
        }
    }

    let mut earned_points: u32 = 0;
    let mut correct_count = 0;
    for question in &exam.questions {
        if answers.get(&question.id) == Some(&question.correct_option) {
            earned_points = earned_points.saturating_add(question.points);
            correct_count += 1;
        }
    }
    let possible_points = exam.possible_points();

    Ok(Score {
        earned_points,
        possible_points,
        percentage: percentage(earned_points, possible_points),
        correct_count,
        question_count: exam.questions.len(),
    })
}

/// `earned / possible` as a percentage rounded to two decimals; 0 when
/// nothing is possible.
pub fn percentage(earned: u32, possible: u32) -> f64 {
    if possible == 0 {
        return 0.0;
    }
    let raw = f64::from(earned) * 100.0 / f64::from(possible);
    (raw * 100.0).round() / 100.0
}
