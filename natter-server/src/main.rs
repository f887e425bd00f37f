use std::{net::SocketAddr, str::FromStr};

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use natter_api::{AuthToken, Uuid};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower_http::trace::TraceLayer;

mod db;
mod error;
mod extractors;
mod fuzz;
mod handlers;

use error::Error;
use extractors::*;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(structopt::StructOpt)]
struct Opt {
    /// Address to listen on
    #[structopt(short, long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
}

pub async fn create_sqlx_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parsing database url {:?}", db_url))?
        .create_if_missing(true)
        .foreign_keys(true);
    Ok(SqlitePool::new(
        SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("opening database {:?}", db_url))?,
    ))
}

pub fn app(db: SqlitePool, admin_token: Option<AuthToken>) -> Router {
    Router::new()
        .route("/api/auth", post(handlers::auth))
        .route("/api/unauth", post(handlers::unauth))
        .route("/api/whoami", get(handlers::whoami))
        .route("/api/posts", get(handlers::list_posts))
        .route("/api/posts/:post_id", get(handlers::get_post))
        .route(
            "/api/posts/:post_id/comments",
            post(handlers::create_comment),
        )
        .route(
            "/api/posts/:post_id/comments/:comment_id",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
        .route(
            "/api/posts/:post_id/comments/:comment_id/toggle-like",
            post(handlers::toggle_like),
        )
        .route("/api/admin/create-user", post(handlers::admin_create_user))
        .route("/api/admin/create-post", post(handlers::admin_create_post))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { db, admin_token })
}

fn admin_token() -> anyhow::Result<Option<AuthToken>> {
    match std::env::var("ADMIN_TOKEN") {
        Err(std::env::VarError::NotPresent) => Ok(None),
        tok => {
            let tok = tok.context("retrieving ADMIN_TOKEN environment variable")?;
            let tok = Uuid::try_parse(&tok).context("parsing ADMIN_TOKEN as an auth token")?;
            Ok(Some(AuthToken(tok)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = create_sqlx_pool(&db_url).await?;
    MIGRATOR
        .run(&mut *db.acquire().await?)
        .await
        .context("applying migrations")?;

    let admin_token = admin_token()?;
    if admin_token.is_none() {
        tracing::warn!("no ADMIN_TOKEN set, admin endpoints will reject every request");
    }

    tracing::info!("listening on {}", opt.listen);
    axum::Server::bind(&opt.listen)
        .serve(app(db, admin_token).into_make_service())
        .await
        .context("serving axum webserver")
}
