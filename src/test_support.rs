//! Fixtures shared by the handler tests.

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use axum_login::AuthManagerLayerBuilder;
use deadpool_diesel::sqlite::Pool;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tower::ServiceExt as _;
use tower_sessions::SessionManagerLayer;

use crate::{
    database,
    registration::{AccountService, HttpAccountService},
    team::{self, TeamRandomizer},
    AppContext, Backend, SqliteSessionStore,
};

/// A migrated sqlite file of its own. In-memory databases lose the schema with the first
/// connection that closes.
pub async fn database() -> Pool {
    static NEXT: AtomicU64 = AtomicU64::new(0);

    let path = std::env::temp_dir().join(format!(
        "pixelclutch-test-{}-{}.sqlite3",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_file(&path);
    let url = path.to_string_lossy().into_owned();

    database::migrate(&url).await.unwrap();
    database::create_pool(&url, 4).unwrap()
}

fn randomizer() -> TeamRandomizer {
    TeamRandomizer::new(&team::Config {
        api_url: "http://127.0.0.1:1".into(),
        api_key: None,
        model: "openai/gpt-4o".into(),
    })
}

pub async fn context() -> AppContext {
    let accounts = Arc::new(HttpAccountService::new("http://127.0.0.1:1/api/register"));

    context_with(database().await, accounts)
}

pub fn context_with(database: Pool, accounts: Arc<dyn AccountService>) -> AppContext {
    AppContext::new(database, accounts, randomizer())
}

/// Every route behind session and auth layers, the way `serve` stacks them.
pub async fn app(context: &AppContext) -> Router {
    let store = SqliteSessionStore::new(context.database().clone());
    store.migrate().await.unwrap();

    let session_layer = SessionManagerLayer::new(store).with_secure(false);
    let backend = Backend::new(context.database().clone());
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    crate::routes()
        .layer(auth_layer)
        .with_state(context.clone())
}

/// Sends requests through the app and carries the session cookie between them.
pub struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    pub fn new(app: Router) -> Self {
        Self { app, cookie: None }
    }

    pub fn get_request(&self, uri: &str) -> Request<Body> {
        self.with_cookie(Request::get(uri))
            .body(Body::empty())
            .unwrap()
    }

    pub fn post_request(&self, uri: &str, form: &[(&str, &str)]) -> Request<Body> {
        self.with_cookie(Request::post(uri))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(serde_urlencoded::to_string(form).unwrap()))
            .unwrap()
    }

    fn with_cookie(&self, builder: axum::http::request::Builder) -> axum::http::request::Builder {
        match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    pub async fn get(&mut self, uri: &str) -> Response {
        let request = self.get_request(uri);
        self.send(request).await
    }

    pub async fn post(&mut self, uri: &str, form: &[(&str, &str)]) -> Response {
        let request = self.post_request(uri, form);
        self.send(request).await
    }

    pub async fn send(&mut self, request: Request<Body>) -> Response {
        let response = self.app.clone().oneshot(request).await.unwrap();

        if let Some(cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
        {
            self.cookie = Some(cookie.to_string());
        }

        response
    }

    /// A handle for firing requests without waiting on them.
    pub fn app(&self) -> Router {
        self.app.clone()
    }
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

pub async fn body(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    String::from_utf8(bytes.to_vec()).unwrap()
}
