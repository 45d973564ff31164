// src/handlers/user.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{attempt::QuizAttempt, user::UserSummary},
    utils::jwt::Claims,
};

/// Current user's dashboard: statistics summary plus the five most
/// recent attempts (summary-only).
pub async fn dashboard(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, username, role, total_attempts, best_score, average_score, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let recent_attempts = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, user_id, total_questions, correct_answers, wrong_answers,
               score, time_spent, completed_at
        FROM quiz_attempts
        WHERE user_id = ?
        ORDER BY completed_at DESC
        LIMIT 5
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch recent attempts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(serde_json::json!({
        "stats": {
            "total_attempts": user.total_attempts,
            "best_score": user.best_score,
            "average_score": user.average_score
        },
        "recent_attempts": recent_attempts
    })))
}
