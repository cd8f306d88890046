// tests/common/mod.rs

#![allow(dead_code)]

use std::str::FromStr;

use lms_backend::{
    config::Config,
    db,
    models::user::{Role, User},
    routes,
    state::AppState,
    utils::hash::hash_password,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port backed by a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    // One long-lived connection: an in-memory database lives and dies with it.
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory SQLite");

    serve(pool, test_config("sqlite::memory:".to_string())).await
}

/// Spawns the app on a database file opened through the production pool, so
/// requests run on separate connections.
pub async fn spawn_app_with_file_db() -> TestApp {
    let path = std::env::temp_dir().join(format!("lms_test_{}.db", uuid::Uuid::new_v4().simple()));
    let config = test_config(format!("sqlite://{}", path.display()));
    let pool = db::connect(&config)
        .await
        .expect("Failed to open SQLite file");

    serve(pool, config).await
}

fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        log_dir: "logs".to_string(),
        admin_name: None,
        admin_password: None,
    }
}

async fn serve(pool: SqlitePool, config: Config) -> TestApp {
    db::migrate(&pool).await.expect("Failed to migrate database");

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

    TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
    }
}

/// Short unique name suitable for the name part of a username.
pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    fn with_token(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        Self::with_token(self.client.get(self.url(path)), token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Response {
        Self::with_token(self.client.post(self.url(path)), token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> Response {
        Self::with_token(self.client.patch(self.url(path)), token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Response {
        Self::with_token(self.client.delete(self.url(path)), token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Inserts an account directly, bypassing the HTTP surface.
    pub async fn create_user(&self, name: &str, role: Role) -> User {
        let hash = hash_password(PASSWORD).unwrap();
        db::insert_user(&self.pool, name, role, &hash).await.unwrap()
    }

    /// Logs in and returns the token, asserting success.
    pub async fn login(&self, username: &str) -> String {
        let response = self
            .post(
                "/api/auth/login",
                None,
                serde_json::json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed for {}", username);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().expect("token in login response").to_string()
    }

    /// Creates an account of `role` and returns it with a fresh token.
    pub async fn user_with_token(&self, prefix: &str, role: Role) -> (User, String) {
        let user = self.create_user(&unique_name(prefix), role).await;
        let token = self.login(&user.username()).await;
        (user, token)
    }
}
