// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::{
        attempt::{
            AttemptAnswerDetail, AttemptDetail, AttemptListParams, AttemptResult, QuizAttempt,
            SubmitAttemptRequest, UNANSWERED, percentage,
        },
        question::PublicQuestion,
    },
    utils::jwt::Claims,
};

/// How many questions a quiz draws from the bank.
const QUIZ_SIZE: i64 = 10;

/// Generates a quiz paper: up to 10 active questions drawn uniformly
/// at random without replacement, answer key withheld.
///
/// A short sample (bank smaller than 10) is returned as-is; only an
/// empty bank is an error.
pub async fn get_quiz(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, PublicQuestion>(
        r#"
        SELECT id, question, options, category, difficulty
        FROM questions
        WHERE is_active = 1
        ORDER BY RANDOM()
        LIMIT ?
        "#,
    )
    .bind(QUIZ_SIZE)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to sample questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if questions.is_empty() {
        return Err(AppError::NotFound("No questions available".to_string()));
    }

    Ok(Json(serde_json::json!({ "questions": questions })))
}

/// Helper struct for fetching answer keys from the database.
#[derive(sqlx::FromRow)]
struct AnswerKey {
    id: i64,
    correct_answer: i64,
}

/// Scores and persists a quiz submission.
///
/// * Drops answers left at the unanswered sentinel (-1); scoring runs
///   only over attempted questions.
/// * Resolves the remaining question ids against active questions in
///   one pass. Any unknown, inactive or duplicate id fails the whole
///   submission; nothing is persisted.
/// * Persists the attempt and its per-answer correctness rows in one
///   transaction, then recomputes the user's statistics summary
///   before responding.
pub async fn submit_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let valid_answers: Vec<_> = req
        .answers
        .iter()
        .filter(|a| a.selected_option != UNANSWERED)
        .collect();

    if valid_answers.is_empty() {
        return Err(AppError::InvalidSubmission("No answers provided".to_string()));
    }

    // Anything past the sentinel must be a real option index; a value
    // outside 0..=3 must never reach attempt_answers.
    if valid_answers.iter().any(|a| !(0..=3).contains(&a.selected_option)) {
        return Err(AppError::BadRequest(
            "Selected option must be between 0 and 3".to_string(),
        ));
    }

    // Use QueryBuilder for dynamic IN clause
    let mut query_builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, correct_answer FROM questions WHERE is_active = 1 AND id IN (",
    );

    let mut separated = query_builder.separated(",");
    for answer in &valid_answers {
        separated.push_bind(answer.question_id);
    }
    separated.push_unseparated(")");

    let keys: Vec<AnswerKey> = query_builder
        .build_query_as()
        .fetch_all(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    // One row per distinct active id. A duplicate id in the submission
    // resolves to a single row and is rejected here rather than
    // double-counted.
    if keys.len() != valid_answers.len() {
        return Err(AppError::InvalidSubmission("Invalid question IDs".to_string()));
    }

    let key_map: HashMap<i64, i64> = keys.into_iter().map(|k| (k.id, k.correct_answer)).collect();

    let mut correct_answers: i64 = 0;
    let mut wrong_answers: i64 = 0;
    let mut scored = Vec::with_capacity(valid_answers.len());

    for answer in &valid_answers {
        let is_correct = key_map.get(&answer.question_id) == Some(&answer.selected_option);
        if is_correct {
            correct_answers += 1;
        } else {
            wrong_answers += 1;
        }
        scored.push((answer.question_id, answer.selected_option, is_correct));
    }

    let total_questions = valid_answers.len() as i64;
    let score = percentage(correct_answers, total_questions);
    let time_spent = req.time_spent.unwrap_or(0).max(0);
    let completed_at = chrono::Utc::now();

    // Attempt row and answer rows land together or not at all.
    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!("Failed to open transaction: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let attempt_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO quiz_attempts
        (user_id, total_questions, correct_answers, wrong_answers, score, time_spent, completed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(total_questions)
    .bind(correct_answers)
    .bind(wrong_answers)
    .bind(score)
    .bind(time_spent)
    .bind(completed_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for (question_id, selected_option, is_correct) in &scored {
        sqlx::query(
            r#"
            INSERT INTO attempt_answers (attempt_id, question_id, selected_option, is_correct)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(selected_option)
        .bind(is_correct)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert attempt answer: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    QuizAttempt::recompute_user_stats(&pool, user_id).await?;

    Ok(Json(serde_json::json!({
        "attempt_id": attempt_id,
        "result": AttemptResult {
            total_questions,
            correct_answers,
            wrong_answers,
            score,
            time_spent,
        }
    })))
}

/// Returns the full detail of one attempt, answer key included.
///
/// The answer key is only ever disclosed post-submission, and only to
/// the attempt's owner.
pub async fn get_attempt_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, user_id, total_questions, correct_answers, wrong_answers,
               score, time_spent, completed_at
        FROM quiz_attempts
        WHERE id = ?
        "#,
    )
    .bind(attempt_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("Quiz attempt not found".to_string()))?;

    if attempt.user_id != claims.user_id()? {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    // LEFT JOIN: a question deleted after the attempt resolves to
    // nulls while the stored correctness flag stays intact.
    let answers = sqlx::query_as::<_, AttemptAnswerDetail>(
        r#"
        SELECT a.question_id, a.selected_option, a.is_correct,
               q.question, q.options, q.correct_answer
        FROM attempt_answers a
        LEFT JOIN questions q ON q.id = a.question_id
        WHERE a.attempt_id = ?
        ORDER BY a.id
        "#,
    )
    .bind(attempt_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch attempt answers: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(AttemptDetail { attempt, answers }))
}

/// Lists the requesting user's attempt history, newest first.
/// Summary-only projection: per-answer rows are omitted.
pub async fn list_history(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AttemptListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let attempts = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, user_id, total_questions, correct_answers, wrong_answers,
               score, time_spent, completed_at
        FROM quiz_attempts
        WHERE user_id = ?
        ORDER BY completed_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch history: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts WHERE user_id = ?")
        .bind(user_id)
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
