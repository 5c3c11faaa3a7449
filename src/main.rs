use std::process;
use std::sync::Arc;

use clap::Parser;
use hireboard::application::repos::{ContactsRepo, LedgerStore};
use hireboard::application::{TrustedHeaderVerifier, UnlockService};
use hireboard::cache::{
    CacheState, InvalidationCoordinator, MemoryEdgeCache, TieredCacheStore,
};
use hireboard::config::{CliArgs, Settings};
use hireboard::infra::{
    telemetry, InfraError, MemoryContactsRepo, MemoryLedgerStore, PostgresRepositories,
};
use hireboard::presentation::{router, AppState};
use tracing::{dispatcher, error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        if dispatcher::has_been_set() {
            error!(error = %err, "startup failed");
        } else {
            eprintln!("startup failed: {err}");
        }
        process::exit(1);
    }
}

async fn run() -> Result<(), InfraError> {
    let args = CliArgs::parse();
    let settings = Settings::load(&args)
        .map_err(|err| InfraError::configuration(err.to_string()))?;

    telemetry::init(&settings.logging)?;

    let (contacts, ledger_store, db): (
        Arc<dyn ContactsRepo>,
        Arc<dyn LedgerStore>,
        Option<PostgresRepositories>,
    ) = match &settings.database.url {
        Some(url) => {
            let pool =
                PostgresRepositories::connect(url, settings.database.max_connections())
                    .await
                    .map_err(|err| InfraError::database(err.to_string()))?;
            PostgresRepositories::run_migrations(&pool)
                .await
                .map_err(|err| InfraError::database(err.to_string()))?;
            let repos = PostgresRepositories::new(pool);
            info!("connected to postgres");
            (
                Arc::new(repos.clone()),
                Arc::new(repos.clone()),
                Some(repos),
            )
        }
        None => {
            info!("no database configured, serving from in-memory stores");
            (
                Arc::new(MemoryContactsRepo::default()),
                Arc::new(MemoryLedgerStore::new()),
                None,
            )
        }
    };

    // One cache handle per process, injected everywhere; no global state.
    let cache = Arc::new(TieredCacheStore::new(
        Box::new(MemoryEdgeCache::new(settings.cache.capacity)),
        &settings.cache,
    ));
    let coordinator = Arc::new(InvalidationCoordinator::new(cache.clone()));
    let unlock = Arc::new(UnlockService::new(
        contacts,
        ledger_store,
        coordinator,
        cache.clone(),
    ));

    let state = AppState {
        unlock,
        verifier: Arc::new(TrustedHeaderVerifier),
        db,
    };
    let cache_state = CacheState::new(cache, settings.cache.enabled);
    let app = router(state, cache_state);

    let listener = tokio::net::TcpListener::bind(settings.server.listen).await?;
    info!(listen = %settings.server.listen, "hireboard listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(());
            }
            Err(err) => {
                // Keep serving; dropping the sender would trigger an
                // immediate shutdown.
                error!(error = %err, "failed to install shutdown handler");
                std::future::pending::<()>().await;
            }
        }
    });

    let mut serve_rx = shutdown_rx.clone();
    let mut drain_rx = shutdown_rx;
    let drain = settings.server.graceful_shutdown();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = serve_rx.changed().await;
    });

    // Bound the drain: after the shutdown signal, in-flight connections
    // get the configured window before the process exits anyway.
    tokio::select! {
        result = server => result?,
        _ = async {
            let _ = drain_rx.changed().await;
            tokio::time::sleep(drain).await;
        } => {
            warn!(drain_secs = drain.as_secs(), "drain window elapsed before connections closed");
        }
    }
    Ok(())
}
