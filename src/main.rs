use assessment_backend::{
    config::{get_config, init_config},
    database::pool::{create_pool, run_migrations},
    routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();
    init_config()?;
    let config = get_config();

    let pool = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; sessions and results are kept in memory");
            None
        }
    };

    let app_state = AppState::new(config, pool)?;

    {
        let state = app_state.clone();
        let every = Duration::from_secs(config.deadline_sweep_secs.max(1));
        let idle = chrono::Duration::seconds(config.session_idle_secs as i64);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let submitted = state.sessions.expire_overdue().await;
                if submitted > 0 {
                    info!(submitted, "submitted sessions past their time limit");
                }
                let evicted = state.sessions.evict_finished(chrono::Duration::hours(1));
                if evicted > 0 {
                    tracing::debug!(evicted, "evicted finished sessions");
                }
                state.sessions.evict_idle(idle).await;
                state.quizzes.cache().purge_expired();
            }
        });
    }

    let app = routes::build_router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
