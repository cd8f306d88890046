// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::{Validate, ValidationError};

use super::not_blank;

pub const QUIZ_COLUMNS: &str = "id, title, questions, created_at, updated_at";

/// A multiple-choice question. `correct_answer` is a zero-based index into `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

/// Represents the 'quizzes' table. Questions are stored as a JSON array.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub questions: Json<Vec<QuizQuestion>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200), custom(function = not_blank))]
    pub title: String,
    #[serde(default)]
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<QuizQuestion>,
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200), custom(function = not_blank))]
    pub title: Option<String>,
    #[validate(custom(function = validate_questions))]
    pub questions: Option<Vec<QuizQuestion>>,
}

/// Every question needs text, at least one option, and an in-bounds answer index.
fn validate_questions(questions: &[QuizQuestion]) -> Result<(), ValidationError> {
    for question in questions {
        if question.question_text.trim().is_empty() {
            return Err(ValidationError::new("question_text_required"));
        }
        if question.options.is_empty() {
            return Err(ValidationError::new("options_cannot_be_empty"));
        }
        if question.options.iter().any(|opt| opt.trim().is_empty()) {
            return Err(ValidationError::new("option_cannot_be_blank"));
        }
        if question.correct_answer >= question.options.len() {
            return Err(ValidationError::new("correct_answer_out_of_bounds"));
        }
    }
    Ok(())
}

/// DTO for submitting a quiz attempt.
/// `answers[i]` is the chosen option index for question `i`; `null` means unanswered.
/// Indices are signed so that a negative choice is graded rather than refused.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    #[serde(default)]
    pub answers: Vec<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
    pub percentage: f64,
    /// Per-question correctness, in question order.
    pub results: Vec<bool>,
}

/// Grades a submission.
///
/// One point per question whose submitted index equals the correct index.
/// Unanswered and out-of-range (including negative) answers count as wrong,
/// and answers past the last question are ignored. There is no partial credit
/// and no negative marking.
pub fn grade(questions: &[QuizQuestion], answers: &[Option<i64>]) -> QuizResult {
    let results: Vec<bool> = questions
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            answers
                .get(idx)
                .copied()
                .flatten()
                .and_then(|choice| usize::try_from(choice).ok())
                == Some(question.correct_answer)
        })
        .collect();

    let score = results.iter().filter(|correct| **correct).count();
    let total = questions.len();
    let percentage = if total == 0 {
        0.0
    } else {
        (score as f64 / total as f64) * 100.0
    };

    QuizResult {
        score,
        total,
        percentage,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz_with_answers(correct: &[usize]) -> Vec<QuizQuestion> {
        correct
            .iter()
            .enumerate()
            .map(|(i, &answer)| QuizQuestion {
                question_text: format!("Question {}", i + 1),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_answer: answer,
            })
            .collect()
    }

    #[test]
    fn three_of_four_is_seventy_five_percent() {
        let questions = quiz_with_answers(&[0, 1, 2, 3]);
        let result = grade(&questions, &[Some(0), Some(1), Some(0), Some(3)]);
        assert_eq!(result.score, 3);
        assert_eq!(result.total, 4);
        assert_eq!(result.percentage, 75.0);
        assert_eq!(result.results, vec![true, true, false, true]);
    }

    #[test]
    fn all_correct_and_none_correct() {
        let questions = quiz_with_answers(&[2, 2, 1]);
        assert_eq!(grade(&questions, &[Some(2), Some(2), Some(1)]).percentage, 100.0);
        assert_eq!(grade(&questions, &[Some(0), Some(0), Some(0)]).percentage, 0.0);
    }

    #[test]
    fn unanswered_and_missing_count_as_wrong() {
        let questions = quiz_with_answers(&[0, 1]);
        let result = grade(&questions, &[None]);
        assert_eq!(result.score, 0);
        assert_eq!(result.results, vec![false, false]);
    }

    #[test]
    fn extra_answers_are_ignored() {
        let questions = quiz_with_answers(&[1]);
        let result = grade(&questions, &[Some(1), Some(3), Some(0)]);
        assert_eq!(result.score, 1);
        assert_eq!(result.total, 1);
    }

    #[test]
    fn negative_and_out_of_range_answers_are_wrong() {
        let questions = quiz_with_answers(&[0, 1, 2]);
        let result = grade(&questions, &[Some(0), Some(-1), Some(99)]);
        assert_eq!(result.score, 1);
        assert_eq!(result.results, vec![true, false, false]);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        let result = grade(&[], &[Some(0)]);
        assert_eq!(result.total, 0);
        assert_eq!(result.percentage, 0.0);
    }

    #[test]
    fn out_of_bounds_correct_answer_fails_validation() {
        let req = CreateQuizRequest {
            title: "Bad".to_string(),
            questions: vec![QuizQuestion {
                question_text: "Pick one".to_string(),
                options: vec!["A".into(), "B".into()],
                correct_answer: 2,
            }],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn question_without_options_fails_validation() {
        let req = CreateQuizRequest {
            title: "Empty".to_string(),
            questions: vec![QuizQuestion {
                question_text: "Nothing to pick".to_string(),
                options: vec![],
                correct_answer: 0,
            }],
        };
        assert!(req.validate().is_err());
    }
}
