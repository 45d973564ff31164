// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

pub const OPTION_COUNT: usize = 4;
pub const DIFFICULTIES: [&str; 3] = ["Easy", "Medium", "Hard"];

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The text content of the question.
    pub question: String,

    /// The four answer options, stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// Index of the correct option, always within 0..=3.
    pub correct_answer: i64,

    pub category: String,

    /// 'Easy', 'Medium' or 'Hard'.
    pub difficulty: String,

    /// Inactive questions are excluded from sampling and from
    /// submission validation.
    pub is_active: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a question to a quiz taker (excludes the answer key).
#[derive(Debug, Serialize, FromRow)]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    pub options: Json<Vec<String>>,
    pub category: String,
    pub difficulty: String,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000, message = "Question text is required."))]
    pub question: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(range(min = 0, max = 3, message = "Correct answer must be 0-3."))]
    pub correct_answer: i64,
    pub category: Option<String>,
    #[validate(custom(function = validate_difficulty))]
    pub difficulty: Option<String>,
}

/// DTO for updating a question. Fields are optional; the merged result
/// is re-validated by the handler under the same constraints.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<i64>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub is_active: Option<bool>,
}

/// Query parameters for the admin question listing.
#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub search: Option<String>,
}

pub fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() != OPTION_COUNT {
        return Err(validator::ValidationError::new("exactly_4_options_required"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length_invalid"));
        }
    }
    Ok(())
}

pub fn validate_difficulty(difficulty: &str) -> Result<(), validator::ValidationError> {
    if !DIFFICULTIES.contains(&difficulty) {
        return Err(validator::ValidationError::new("invalid_difficulty"));
    }
    Ok(())
}
