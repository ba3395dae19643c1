use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, patch, post},
};
use std::{collections::BTreeMap, future::Future, sync::Arc};

use api_types::versions::VersionsResponse;
use engine::{Engine, Locale, ResultEngine};

use crate::{ServerError, balance, documents, import, tags, transactions};

/// Request bodies carry base64 attachments and CSV files.
const BODY_LIMIT: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    /// Used for every formatted amount in responses.
    pub locale: Locale,
}

impl ServerState {
    pub fn new(engine: Engine, locale: Locale) -> Self {
        Self {
            engine: Arc::new(engine),
            locale,
        }
    }

    /// Runs a mutation on its own task so a dropped connection does not
    /// cancel it halfway.
    pub(crate) async fn mutate<T, F, Fut>(&self, op: F) -> Result<T, ServerError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Engine>) -> Fut,
        Fut: Future<Output = ResultEngine<T>> + Send + 'static,
    {
        let task = tokio::spawn(op(self.engine.clone()));
        match task.await {
            Ok(result) => result.map_err(ServerError::from),
            Err(err) => Err(ServerError::Internal(err.to_string())),
        }
    }
}

async fn versions(State(state): State<ServerState>) -> Json<VersionsResponse> {
    let versions: BTreeMap<String, u64> = state
        .engine
        .events()
        .snapshot()
        .into_iter()
        .map(|(topic, version)| (topic.as_str().to_string(), version))
        .collect();
    Json(VersionsResponse { versions })
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route(
            "/transactions",
            get(transactions::list).post(transactions::create),
        )
        .route(
            "/transactions/{id}",
            get(transactions::get)
                .patch(transactions::update)
                .delete(transactions::delete),
        )
        .route("/transactions/{id}/tags", post(transactions::add_tag))
        .route(
            "/transactions/{id}/tags/{tag_id}",
            axum::routing::delete(transactions::remove_tag),
        )
        .route("/transactions/{id}/split", post(transactions::split))
        .route("/transactions/{id}/documents", post(documents::attach))
        .route(
            "/documents/{id}",
            get(documents::download).delete(documents::detach),
        )
        .route("/tag-groups", get(tags::list_groups).post(tags::create_group))
        .route(
            "/tag-groups/{id}",
            patch(tags::rename_group).delete(tags::delete_group),
        )
        .route("/tags", get(tags::list).post(tags::create))
        .route("/tags/{id}", patch(tags::update).delete(tags::delete))
        .route(
            "/settings/initial_balance",
            get(balance::initial_balance).post(balance::set_initial_balance),
        )
        .route("/balance", get(balance::sheet))
        .route("/import/preview", post(import::preview))
        .route("/import", post(import::commit))
        .route("/versions", get(versions))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

pub async fn run(state: ServerState, addr: &str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(state, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
