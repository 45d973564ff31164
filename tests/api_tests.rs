// tests/api_tests.rs

use quiz_backend::{config::Config, routes, state::AppState};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Each test gets its own in-memory SQLite database, so tests are
/// fully isolated from each other.
async fn spawn_app() -> (String, SqlitePool) {
    // A single connection keeps every query on the same in-memory DB.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

/// Registers a user through the API and returns a login token.
async fn register_and_login(client: &reqwest::Client, address: &str, username: &str) -> String {
    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

/// Registers a user, promotes it to admin, and returns a fresh token
/// carrying the admin role.
async fn admin_token(
    client: &reqwest::Client,
    address: &str,
    pool: &SqlitePool,
    username: &str,
) -> String {
    register_and_login(client, address, username).await;

    sqlx::query("UPDATE users SET role = 'admin' WHERE username = ?")
        .bind(username)
        .execute(pool)
        .await
        .expect("Failed to promote user");

    // Log in again so the token carries the admin role.
    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

#[tokio::test]
async fn health_check_works() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/health", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "alice",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "user");
    // Fresh users start with a zeroed statistics summary.
    assert_eq!(body["total_attempts"], 0);
    assert_eq!(body["best_score"], 0);
    assert_eq!(body["average_score"], 0);
    // The password hash must never be serialized.
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_duplicate_username_conflicts() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register_and_login(&client, &address, "bob").await;

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "bob",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register_and_login(&client, &address, "carol").await;

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": "carol",
            "password": "not-the-password"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let token = register_and_login(&client, &address, "dave").await;

    let response = client
        .get(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 403);

    // And without any token at all: 401.
    let response = client
        .get(format!("{}/api/admin/questions", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn create_question_validates_shape() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &address, &pool, "admin1").await;

    // Only 3 options: rejected.
    let response = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question": "Pick one",
            "options": ["A", "B", "C"],
            "correct_answer": 0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Correct answer out of range: rejected.
    let response = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question": "Pick one",
            "options": ["A", "B", "C", "D"],
            "correct_answer": 5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Unknown difficulty: rejected.
    let response = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question": "Pick one",
            "options": ["A", "B", "C", "D"],
            "correct_answer": 1,
            "difficulty": "Brutal"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Well-formed: created with defaults applied.
    let response = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question": "Pick one",
            "options": ["A", "B", "C", "D"],
            "correct_answer": 1
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["category"], "General");
    assert_eq!(body["difficulty"], "Medium");
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn update_question_revalidates_merged_result() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &address, &pool, "admin2").await;

    let created: serde_json::Value = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question": "Original text",
            "options": ["A", "B", "C", "D"],
            "correct_answer": 0,
            "difficulty": "Easy"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_i64().unwrap();

    // Partial update of a single field keeps the rest.
    let response = client
        .put(format!("{}/api/admin/questions/{}", address, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "correct_answer": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["question"], "Original text");
    assert_eq!(body["correct_answer"], 3);
    assert_eq!(body["difficulty"], "Easy");

    // A merged result violating the constraints is rejected.
    let response = client
        .put(format!("{}/api/admin/questions/{}", address, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "options": ["A", "B"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .put(format!("{}/api/admin/questions/{}", address, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "correct_answer": 9 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Unknown id: 404.
    let response = client
        .put(format!("{}/api/admin/questions/999999", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "question": "Does not exist" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn delete_question_is_404_when_gone() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &address, &pool, "admin3").await;

    let created: serde_json::Value = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question": "Ephemeral",
            "options": ["A", "B", "C", "D"],
            "correct_answer": 2
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_i64().unwrap();

    let response = client
        .delete(format!("{}/api/admin/questions/{}", address, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    // Deleting again is NotFound, not a silent success.
    let response = client
        .delete(format!("{}/api/admin/questions/{}", address, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn list_questions_filters_and_paginates() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &address, &pool, "admin4").await;

    for i in 0..15 {
        let difficulty = if i % 2 == 0 { "Easy" } else { "Hard" };
        let category = if i < 5 { "History" } else { "Science" };
        let resp = client
            .post(format!("{}/api/admin/questions", address))
            .header("Authorization", format!("Bearer {}", token))
            .json(&serde_json::json!({
                "question": format!("Question number {}", i),
                "options": ["A", "B", "C", "D"],
                "correct_answer": 0,
                "category": category,
                "difficulty": difficulty
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);
    }

    // Default page size is 10, second page holds the remainder.
    let body: serde_json::Value = client
        .get(format!("{}/api/admin/questions?page=2", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["questions"].as_array().unwrap().len(), 5);
    assert_eq!(body["pagination"]["total_questions"], 15);
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["pagination"]["current_page"], 2);

    // Category filter.
    let body: serde_json::Value = client
        .get(format!("{}/api/admin/questions?category=History", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["pagination"]["total_questions"], 5);

    // Text search.
    let body: serde_json::Value = client
        .get(format!("{}/api/admin/questions?search=number 3", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["pagination"]["total_questions"], 1);

    // Difficulty filter combined with pagination metadata.
    let body: serde_json::Value = client
        .get(format!("{}/api/admin/questions?difficulty=Hard", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["pagination"]["total_questions"], 7);
}

#[tokio::test]
async fn admin_dashboard_aggregates() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &address, &pool, "admin5").await;
    register_and_login(&client, &address, "plainuser").await;

    let body: serde_json::Value = client
        .get(format!("{}/api/admin/dashboard", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["stats"]["total_questions"], 0);
    assert_eq!(body["stats"]["total_users"], 1); // admins not counted
    assert_eq!(body["stats"]["total_attempts"], 0);
    assert_eq!(body["stats"]["average_score"], 0.0);
    assert_eq!(body["recent_attempts"].as_array().unwrap().len(), 0);
}
