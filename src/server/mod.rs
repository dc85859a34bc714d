//! HTTP control surface
//!
//! Thin mapping from the five protocol endpoints onto the dispatcher. The
//! handlers hold no state of their own.

mod handlers;

use crate::plugin::api::Dispatcher;
use axum::routing::{get, post};
use axum::Router;
use log::info;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

pub type SharedDispatcher = Arc<Dispatcher>;

/// Build the control router
pub fn router(dispatcher: SharedDispatcher) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metadata", get(handlers::metadata))
        .route("/status", get(handlers::status))
        .route("/config", post(handlers::configure))
        .route("/stop", post(handlers::stop))
        .with_state(dispatcher)
}

/// Serve the control surface on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    dispatcher: SharedDispatcher,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Control surface listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Control surface stopped");
    Ok(())
}
