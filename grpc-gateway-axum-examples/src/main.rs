//! Discover gateway
//!
//! Serves the Discover service over HTTP/JSON on port 8080 and its API
//! documentation on port 8081.
//!
//! Run with: cargo run --bin discover-gateway
//! Test with:
//!   curl http://localhost:8080/v1/get-param-in-body/42 -d '{"content": "hello"}' -X GET
//!   curl http://localhost:8080/v1/get-param-in-header?content=hi -H 'X-Custom-Header-Id: abc'
//!   curl -X POST http://localhost:8080/v1/post/unstructured-data \
//!     -H 'Content-Type: application/json' \
//!     -d '{"id": "blob", "data": "aGVsbG8="}'

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use grpc_gateway_axum::GatewayConfig;
use grpc_gateway_axum_examples::{Discover, docs, docs_addr, routes, server_addr};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long in-flight requests get after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "grpc_gateway_axum=debug,grpc_gateway_axum_examples=debug,tower_http=debug,info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::default();
    let gateway = routes::gateway(Arc::new(Discover), &config).layer(TraceLayer::new_for_http());
    let docs = docs::routes().layer(TraceLayer::new_for_http());

    let gateway_listener = TcpListener::bind(server_addr()?).await?;
    let docs_listener = TcpListener::bind(docs_addr()?).await?;
    let gateway_addr = gateway_listener.local_addr()?;
    let docs_local = docs_listener.local_addr()?;

    tracing::info!(address = %gateway_addr, "Starting HTTP server");
    tracing::info!("API endpoints:");
    tracing::info!("  GET  {}", routes::GET_PARAM_IN_BODY);
    tracing::info!("  GET  {}", routes::GET_PARAM_IN_HEADER);
    tracing::info!("  POST {}", routes::POST_UNSTRUCTURED_DATA);
    tracing::info!(
        "  Swagger UI: http://localhost:{}/swagger-ui/",
        docs_local.port()
    );
    tracing::info!(address = %docs_local, "Starting Swagger UI server");

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut gateway_task = tokio::spawn(serve(gateway_listener, gateway, stop_rx.clone()));
    let mut docs_task = tokio::spawn(serve(docs_listener, docs, stop_rx));

    tokio::select! {
        () = shutdown_signal() => {}
        result = &mut gateway_task => return server_exited("gateway", result),
        result = &mut docs_task => return server_exited("docs", result),
    }

    tracing::info!("Shutting down servers...");
    // Both receivers are alive until their server returns.
    let _ = stop_tx.send(true);

    let drain = async {
        let (gateway, docs) = tokio::join!(gateway_task, docs_task);
        gateway??;
        docs??;
        anyhow::Ok(())
    };
    match tokio::time::timeout(SHUTDOWN_GRACE, drain).await {
        Ok(result) => {
            result?;
            tracing::info!("Servers stopped gracefully");
        }
        Err(_) => {
            tracing::warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "shutdown grace period elapsed, dropping remaining connections"
            );
        }
    }
    Ok(())
}

async fn serve(
    listener: TcpListener,
    app: Router,
    mut stop: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stop.wait_for(|stop| *stop).await;
        })
        .await
}

fn server_exited(
    name: &str,
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> anyhow::Result<()> {
    tracing::error!(server = name, "server exited before shutdown signal");
    result??;
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
