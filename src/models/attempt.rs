// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};

use crate::error::AppError;

/// Selected-option value denoting a question the user left unanswered.
pub const UNANSWERED: i64 = -1;

/// Represents the 'quiz_attempts' table in the database.
/// One immutable scored record of a user completing a quiz; no update
/// path exists once a row is written.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    /// Integer percentage, 0..=100.
    pub score: i64,
    /// Seconds.
    pub time_spent: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// One answer within a submission, as sent by the client.
#[derive(Debug, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    /// 0..=3, or -1 for unanswered.
    pub selected_option: i64,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: Vec<SubmittedAnswer>,
    /// Seconds. Defaults to 0 if omitted.
    pub time_spent: Option<i64>,
}

/// Scoring summary returned right after a submission.
#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub score: i64,
    pub time_spent: i64,
}

/// One row of the attempt detail view: the stored answer joined with
/// the question it referenced. Question fields are null if the
/// question was deleted after the attempt; the stored is_correct flag
/// stays authoritative either way.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptAnswerDetail {
    pub question_id: i64,
    pub selected_option: i64,
    pub is_correct: bool,
    pub question: Option<String>,
    pub options: Option<Json<Vec<String>>>,
    pub correct_answer: Option<i64>,
}

/// Full attempt detail, answer key included. Only ever disclosed to
/// the attempt's owner, after submission.
#[derive(Debug, Serialize)]
pub struct AttemptDetail {
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub answers: Vec<AttemptAnswerDetail>,
}

/// Attempt row joined with its owner's username, for admin listings.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptWithUser {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub score: i64,
    pub time_spent: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Query parameters for paginated attempt listings.
#[derive(Debug, Deserialize)]
pub struct AttemptListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub user_id: Option<i64>,
}

/// Integer percentage with round-half-up semantics.
/// `total` must be positive; callers reject empty submissions first.
pub fn percentage(correct: i64, total: i64) -> i64 {
    ((correct as f64 / total as f64) * 100.0).round() as i64
}

impl QuizAttempt {
    /// Recomputes a user's statistics summary (total attempts, best
    /// score, average score) by scanning their full attempt history,
    /// then writes the three values onto the user row.
    ///
    /// Deliberately not incremental: recomputing from the authoritative
    /// attempt log keeps the summary immune to drift. Called once per
    /// successful submission.
    pub async fn recompute_user_stats(pool: &SqlitePool, user_id: i64) -> Result<(), AppError> {
        let scores: Vec<i64> =
            sqlx::query_scalar("SELECT score FROM quiz_attempts WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to load attempt scores for user {}: {:?}", user_id, e);
                    AppError::InternalServerError(e.to_string())
                })?;

        let (total_attempts, best_score, average_score) = summarize_scores(&scores);

        sqlx::query(
            "UPDATE users SET total_attempts = ?, best_score = ?, average_score = ? WHERE id = ?",
        )
        .bind(total_attempts)
        .bind(best_score)
        .bind(average_score)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update stats for user {}: {:?}", user_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(())
    }
}

/// (total attempts, best score, rounded average score) over a score
/// history. All three are 0 for an empty history.
pub fn summarize_scores(scores: &[i64]) -> (i64, i64, i64) {
    let total = scores.len() as i64;
    let best = scores.iter().copied().max().unwrap_or(0);
    let average = if total > 0 {
        (scores.iter().sum::<i64>() as f64 / total as f64).round() as i64
    } else {
        0
    };
    (total, best, average)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(3, 4), 75);
        assert_eq!(percentage(1, 8), 13); // 12.5 rounds up
        assert_eq!(percentage(2, 3), 67); // 66.67 rounds up
        assert_eq!(percentage(1, 3), 33); // 33.33 rounds down
        assert_eq!(percentage(0, 5), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn summarize_empty_history_is_all_zero() {
        assert_eq!(summarize_scores(&[]), (0, 0, 0));
    }

    #[test]
    fn summarize_matches_worked_example() {
        // Prior scores [60, 80, 100] plus a new 40.
        assert_eq!(summarize_scores(&[60, 80, 100, 40]), (4, 100, 70));
    }

    #[test]
    fn summarize_average_rounds_half_up() {
        // (50 + 75) / 2 = 62.5
        assert_eq!(summarize_scores(&[50, 75]), (2, 75, 63));
    }
}
