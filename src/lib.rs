use anyhow::Result;
use axum::{middleware, routing::get, Router};
use axum_login::{login_required, AuthManagerLayerBuilder};
use axum_messages::MessagesManagerLayer;
use base64::prelude::*;
use std::time::Duration;
use tokio::{signal, task::AbortHandle};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{
    cookie::{self, Key},
    Expiry, SessionManagerLayer,
};
use tower_sessions_core::ExpiredDeletion as _;
use tracing::{info, warn};

pub mod auth;
pub mod cli;
pub mod config;
pub mod context;
mod controller;
pub mod database;
pub mod error;
pub mod model;
pub mod registration;
mod schema;
pub mod session_store;
pub mod team;
#[cfg(test)]
mod test_support;
pub mod view;

pub use {
    auth::{AuthSession, Backend},
    config::Config,
    context::{create_context, AppContext},
    error::{AppError, AppResult},
    session_store::SqliteSessionStore,
};

#[derive(Clone)]
pub struct PixelClutch {
    config: Config,
    context: AppContext,
}

impl PixelClutch {
    pub async fn boot(config: Config) -> Result<Self> {
        let context = create_context(&config).await?;

        Ok(Self { config, context })
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    fn session_key(&self) -> Result<Key> {
        match self.config.session_key.as_deref() {
            Some(session_key) => {
                let session_key = BASE64_STANDARD.decode(session_key)?;
                Ok(Key::try_from(session_key.as_slice())?)
            }
            None => {
                warn!("No session_key configured. Falling back to a generated key. This will invalidate any sessions when the server is stopped.");
                Ok(Key::generate())
            }
        }
    }

    pub async fn serve(self) -> Result<()> {
        let session_store = SqliteSessionStore::new(self.context.database().clone());
        session_store.migrate().await?;

        let deletion_task = tokio::task::spawn(
            session_store
                .clone()
                .continuously_delete_expired(Duration::from_secs(60)),
        );

        let session_layer = SessionManagerLayer::new(session_store)
            .with_secure(!cfg!(debug_assertions))
            .with_expiry(Expiry::OnInactivity(cookie::time::Duration::days(1)))
            .with_signed(self.session_key()?);

        let backend = Backend::new(self.context.database().clone());
        let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

        let router = routes()
            .layer(auth_layer)
            .layer(TraceLayer::new_for_http());

        // Enable livereload for debug builds.
        #[cfg(debug_assertions)]
        let (router, _watcher) = livereload(router)?;

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        info!("listening on {}", listener.local_addr()?);

        axum::serve(
            listener,
            router.with_state(self.context).into_make_service(),
        )
        .with_graceful_shutdown(shutdown_signal(Some(deletion_task.abort_handle())))
        .await?;

        match deletion_task.await {
            Ok(result) => result?,
            Err(e) if e.is_cancelled() => {}
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }
}

/// Every page and endpoint, rendered through the layout. Expects the auth layer on top.
pub fn routes() -> Router<AppContext> {
    Router::new()
        // Hub routes require authentication.
        .nest(
            "/hub",
            controller::hub::routes()
                .route_layer(login_required!(Backend, login_url = "/auth/signin")),
        )
        .nest_service("/static", ServeDir::new("static"))
        .route("/", get(controller::landing))
        .nest("/auth", controller::auth::routes())
        .nest("/api", controller::api::routes())
        .fallback(not_found)
        .layer(middleware::map_response(view::render_view))
        .layer(MessagesManagerLayer)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

pub async fn shutdown_signal(abort_handle: Option<AbortHandle>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    if let Some(abort_handle) = abort_handle {
        abort_handle.abort();
    }
}

#[cfg(debug_assertions)]
fn not_event_stream_predicate<T>(req: &axum::extract::Request<T>) -> bool {
    !req.uri().path().ends_with("/events")
}

#[cfg(debug_assertions)]
fn livereload(
    router: Router<AppContext>,
) -> Result<(Router<AppContext>, notify::RecommendedWatcher)> {
    use notify::Watcher;

    let livereload = tower_livereload::LiveReloadLayer::new();
    let reloader = livereload.reloader();

    let router = router.layer(livereload.request_predicate(not_event_stream_predicate));

    let mut watcher = notify::recommended_watcher(move |_| reloader.reload())?;
    watcher.watch(
        std::path::Path::new("static"),
        notify::RecursiveMode::Recursive,
    )?;

    Ok((router, watcher))
}
