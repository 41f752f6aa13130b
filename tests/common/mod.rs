#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use catalog_api::create_app;

pub const TEST_SECRET: &str = "test-secret";
pub const PASSWORD: &str = "S3cureP@ssw0rd";

/// A migrated database in a temp dir plus the router built on it.
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = catalog_api::db::tune(
        SqliteConnectOptions::new()
            .filename(db_path.as_path())
            .create_if_missing(true)
            .foreign_keys(true),
    );
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", TEST_SECRET);
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    /// Sends one request and returns the status and the parsed body (`Null` when empty).
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }

        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send("POST", uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send("PUT", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send("DELETE", uri, Some(token), None).await
    }

    /// Registers and logs in a user, returning `(xid, token)`.
    pub async fn register_and_login(&self, email: &str) -> Result<(String, String)> {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "name": "Test User", "email": email, "password": PASSWORD })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let xid = body["data"]["xid"].as_str().unwrap_or_default().to_string();

        let token = self.login(email, PASSWORD).await?;
        Ok((xid, token))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        Ok(body["data"]["access_token"].as_str().unwrap_or_default().to_string())
    }

    /// A logged-in user holding the `admin` role.
    pub async fn admin(&self) -> Result<(String, String)> {
        let (xid, token) = self.register_and_login("admin@example.com").await?;
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id)
             SELECT u.id, r.id FROM users u, roles r WHERE u.xid = ? AND r.name = 'admin'",
        )
        .bind(&xid)
        .execute(&self.pool)
        .await?;
        Ok((xid, token))
    }

    pub async fn program_id(&self, code: &str) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT id FROM lkp_product_program WHERE code = ?")
            .bind(code)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Seeds one company, brand category and brand; returns `(company_id, brand_id)`.
    pub async fn seed_brand(&self) -> Result<(i64, i64)> {
        let company_id = sqlx::query("INSERT INTO companies (name, slug) VALUES ('Acme', 'acme')")
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        let category_id = sqlx::query("INSERT INTO brand_categories (name, slug) VALUES ('Paint', 'paint')")
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        let brand_id = sqlx::query(
            "INSERT INTO brands (company_id, brand_category_id, name, slug) VALUES (?, ?, 'Acme Paints', 'acme-paints')",
        )
        .bind(company_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok((company_id, brand_id))
    }

    pub async fn seed_product(&self, company_id: i64, brand_id: i64, program: &str, name: &str, slug: &str) -> Result<i64> {
        let program_id = self.program_id(program).await?;
        Ok(sqlx::query(
            "INSERT INTO products (company_id, brand_id, program_id, name, slug) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(company_id)
        .bind(brand_id)
        .bind(program_id)
        .bind(name)
        .bind(slug)
        .execute(&self.pool)
        .await?
        .last_insert_rowid())
    }

    pub async fn seed_certification(&self, program: &str, name: &str) -> Result<i64> {
        let program_id = self.program_id(program).await?;
        Ok(sqlx::query("INSERT INTO certifications (program_id, name) VALUES (?, ?)")
            .bind(program_id)
            .bind(name)
            .execute(&self.pool)
            .await?
            .last_insert_rowid())
    }
}
