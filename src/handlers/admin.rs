// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptListParams, AttemptWithUser},
        question::{
            CreateQuestionRequest, Question, QuestionListParams, UpdateQuestionRequest,
            validate_difficulty, validate_options,
        },
        user::UserSummary,
    },
};

#[derive(Debug, serde::Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Admin dashboard: bank/user/attempt totals, global average score,
/// and the ten most recent attempts with usernames.
pub async fn dashboard(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let total_questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'user'")
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let total_attempts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts")
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let average_score: Option<f64> = sqlx::query_scalar("SELECT AVG(score) FROM quiz_attempts")
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let recent_attempts = sqlx::query_as::<_, AttemptWithUser>(
        r#"
        SELECT a.id, a.user_id, u.username, a.total_questions, a.correct_answers,
               a.wrong_answers, a.score, a.time_spent, a.completed_at
        FROM quiz_attempts a
        JOIN users u ON a.user_id = u.id
        ORDER BY a.completed_at DESC
        LIMIT 10
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch recent attempts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(serde_json::json!({
        "stats": {
            "total_questions": total_questions,
            "total_users": total_users,
            "total_attempts": total_attempts,
            "average_score": average_score.unwrap_or(0.0)
        },
        "recent_attempts": recent_attempts
    })))
}

/// Lists questions with optional category/difficulty/text filters,
/// newest first, paginated.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, question, options, correct_answer, category, difficulty, is_active, created_at
         FROM questions WHERE 1 = 1",
    );
    push_question_filters(&mut builder, &params);
    builder.push(" ORDER BY created_at DESC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind((page - 1) * limit);

    let questions: Vec<Question> = builder
        .build_query_as()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let mut count_builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM questions WHERE 1 = 1");
    push_question_filters(&mut count_builder, &params);

    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "questions": questions,
        "pagination": {
            "current_page": page,
            "total_pages": (total + limit - 1) / limit,
            "total_questions": total
        }
    })))
}

fn push_question_filters(builder: &mut QueryBuilder<Sqlite>, params: &QuestionListParams) {
    if let Some(category) = &params.category {
        builder.push(" AND category = ");
        builder.push_bind(category.clone());
    }
    if let Some(difficulty) = &params.difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty.clone());
    }
    if let Some(search) = &params.search {
        builder.push(" AND question LIKE ");
        builder.push_bind(format!("%{}%", search));
    }
}

/// Creates a new quiz question.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let options_json = serde_json::to_string(&payload.options)?;
    let category = payload.category.unwrap_or_else(|| "General".to_string());
    let difficulty = payload.difficulty.unwrap_or_else(|| "Medium".to_string());

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (question, options, correct_answer, category, difficulty, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, question, options, correct_answer, category, difficulty, is_active, created_at
        "#,
    )
    .bind(&payload.question)
    .bind(&options_json)
    .bind(payload.correct_answer)
    .bind(&category)
    .bind(&difficulty)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Fetches a single question by ID, answer key included.
pub async fn get_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, question, options, correct_answer, category, difficulty, is_active, created_at
        FROM questions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(question))
}

/// Applies a partial update to a question.
///
/// The merged result is re-validated under the same constraints as
/// creation (exactly 4 options, correct answer within 0..=3, known
/// difficulty) before anything is written.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let existing = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, question, options, correct_answer, category, difficulty, is_active, created_at
        FROM questions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let question = payload.question.unwrap_or(existing.question);
    let options = payload.options.unwrap_or(existing.options.0);
    let correct_answer = payload.correct_answer.unwrap_or(existing.correct_answer);
    let category = payload.category.unwrap_or(existing.category);
    let difficulty = payload.difficulty.unwrap_or(existing.difficulty);
    let is_active = payload.is_active.unwrap_or(existing.is_active);

    if question.is_empty() {
        return Err(AppError::BadRequest("Question text is required.".to_string()));
    }
    if validate_options(&options).is_err() {
        return Err(AppError::BadRequest("Exactly 4 options required.".to_string()));
    }
    if !(0..=3).contains(&correct_answer) {
        return Err(AppError::BadRequest("Correct answer must be 0-3.".to_string()));
    }
    if validate_difficulty(&difficulty).is_err() {
        return Err(AppError::BadRequest("Invalid difficulty.".to_string()));
    }

    let options_json = serde_json::to_string(&options)?;

    let updated = sqlx::query_as::<_, Question>(
        r#"
        UPDATE questions
        SET question = ?, options = ?, correct_answer = ?,
            category = ?, difficulty = ?, is_active = ?
        WHERE id = ?
        RETURNING id, question, options, correct_answer, category, difficulty, is_active, created_at
        "#,
    )
    .bind(&question)
    .bind(&options_json)
    .bind(correct_answer)
    .bind(&category)
    .bind(&difficulty)
    .bind(is_active)
    .bind(id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(updated))
}

/// Deletes a quiz question by ID.
/// Deleting an already-gone ID is 404 again, never a silent success.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists non-admin users, newest first, paginated. Password hashes
/// never leave the database.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, username, role, total_attempts, best_score, average_score, created_at
        FROM users
        WHERE role = 'user'
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'user'")
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "users": users,
        "pagination": {
            "current_page": page,
            "total_pages": (total + limit - 1) / limit,
            "total_users": total
        }
    })))
}

/// Lists quiz attempts across all users (optionally filtered to one),
/// newest first, paginated.
pub async fn list_attempts(
    State(pool): State<SqlitePool>,
    Query(params): Query<AttemptListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT a.id, a.user_id, u.username, a.total_questions, a.correct_answers,
                a.wrong_answers, a.score, a.time_spent, a.completed_at
         FROM quiz_attempts a
         JOIN users u ON a.user_id = u.id
         WHERE 1 = 1",
    );
    if let Some(user_id) = params.user_id {
        builder.push(" AND a.user_id = ");
        builder.push_bind(user_id);
    }
    builder.push(" ORDER BY a.completed_at DESC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind((page - 1) * limit);

    let attempts: Vec<AttemptWithUser> = builder
        .build_query_as()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list attempts: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let mut count_builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM quiz_attempts WHERE 1 = 1");
    if let Some(user_id) = params.user_id {
        count_builder.push(" AND user_id = ");
        count_builder.push_bind(user_id);
    }

    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "attempts": attempts,
        "pagination": {
            "current_page": page,
            "total_pages": (total + limit - 1) / limit,
            "total_attempts": total
        }
    })))
}
