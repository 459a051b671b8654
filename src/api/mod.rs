//! # HTTP API
//!
//! JSON endpoints in front of the directory and vote services.
//!
//! | Route      | GET                  | POST            |
//! |------------|----------------------|-----------------|
//! | `/servers` | ranked listing       | register server |
//! | `/vote`    | cooldown status      | cast vote       |
//!
//! `OPTIONS` never reaches a handler: the CORS layer answers it with an empty
//! 200. Any other unsupported method gets a 405 envelope. Every JSON body is
//! wrapped in an [`Envelope`].
//!
//! Services do blocking file I/O, so handlers hop onto the blocking pool
//! before calling them.

pub mod envelope;
pub mod routes;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::clock::Clock;
use crate::directory::DirectoryService;
use crate::identity::IdentityResolver;
use crate::store::DocumentStore;
use crate::votes::VoteService;

pub use envelope::Envelope;

/// Everything the handlers need, shared across requests.
pub struct AppState {
    pub directory: DirectoryService,
    pub votes: VoteService,
    pub identity: IdentityResolver,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, identity: IdentityResolver) -> Self {
        Self {
            directory: DirectoryService::new(Arc::clone(&store), Arc::clone(&clock)),
            votes: VoteService::new(store, clock),
            identity,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route(
            "/servers",
            get(routes::list_servers)
                .post(routes::register_server)
                .fallback(routes::method_not_allowed),
        )
        .route(
            "/vote",
            get(routes::vote_status)
                .post(routes::cast_vote)
                .fallback(routes::method_not_allowed),
        )
        .route("/health", get(routes::health_check))
        .fallback(routes::not_found)
        .layer(cors)
        .with_state(state)
}
