use std::time::Duration;

use anyhow::Context;
use secrecy::ExposeSecret;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use relock::{config::Config, routes::create_router, state::AppState};

const MAX_DB_CONNECTIONS: u32 = 5;
const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = ?e, "relock を起動できませんでした");
        return Err(e);
    }

    tracing::info!("サーバー終了");
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load().context("設定の読み込みに失敗")?;
    let addr = config.socket_addr().context("HOST / PORT が不正")?;

    tracing::info!(
        addr = %addr,
        policy = ?config.reset_request_policy,
        origin = ?config.app_origin,
        "設定読み込み完了"
    );

    let db_pool = connect_pool(&config).await?;
    let state = AppState::new(db_pool, config).context("AppState の構築に失敗")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("{addr} にバインドできません"))?;
    tracing::info!(addr = %addr, "サーバー起動");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("サーバーエラー")
}

/// データベース接続プールを作成
async fn connect_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .acquire_timeout(DB_ACQUIRE_TIMEOUT)
        .connect(config.database_url.expose_secret())
        .await
        .context("データベース接続に失敗")?;

    tracing::info!(max_connections = MAX_DB_CONNECTIONS, "データベース接続完了");
    Ok(pool)
}

/// tracing の初期化（JSON形式、RUST_LOG でレベル制御）
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,relock=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Ctrl+C または SIGTERM を待つ
async fn shutdown_signal() {
    let signal = tokio::select! {
        _ = ctrl_c() => "SIGINT",
        _ = terminate() => "SIGTERM",
    };

    tracing::info!(signal, "シャットダウン開始");
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "Ctrl+C ハンドラーのインストールに失敗");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::error!(error = ?e, "SIGTERM ハンドラーのインストールに失敗");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
