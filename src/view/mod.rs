mod auth;
mod error;
mod home;
mod hub;
mod layout;

pub(crate) use auth::*;
pub(crate) use error::*;
pub(crate) use home::*;
pub(crate) use hub::*;
pub(crate) use layout::*;

use axum::{
    body::Body,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_messages::Messages;
use rinja::Template;
use std::collections::BTreeMap;

use crate::{auth::AuthSession, error::ErrorWrapper};

pub fn version_string() -> String {
    option_env!("VERGEN_GIT_SHA")
        .unwrap_or(env!("CARGO_PKG_VERSION"))
        .to_string()
}

/// Wraps rendered page bodies in the layout once the handler has produced them.
pub async fn render_view(
    AuthSession { user, .. }: AuthSession,
    messages: Messages,
    response: Response,
) -> Response {
    let status = response.status();
    let error = response.extensions().get::<ErrorWrapper>().cloned();
    let rendered = response.extensions().get::<RenderedTemplate>().cloned();

    let (content, title) = match (rendered, error) {
        (Some(RenderedTemplate(content)), _) => {
            let title = response
                .extensions()
                .get::<ViewData>()
                .and_then(|data| data.get("title").cloned())
                .unwrap_or_default();
            (content, title)
        }
        (None, Some(ErrorWrapper(error))) => {
            let page = ErrorPage {
                code: error.status().as_u16(),
                message: error.to_string(),
            };
            match page.render() {
                Ok(content) => (content, "Error".to_string()),
                Err(e) => return render_failure(e),
            }
        }
        (None, None) => return response,
    };

    let layout = Layout {
        title,
        content,
        flashes: messages.into_iter().map(Flash::from).collect(),
        user,
        version_string: version_string(),
    };

    match layout.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => render_failure(e),
    }
}

fn render_failure(error: rinja::Error) -> Response {
    tracing::error!("failed to render template: {error}");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

#[derive(Clone, Default)]
pub struct ViewData(pub BTreeMap<String, String>);

impl ViewData {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }
}

impl std::ops::DerefMut for ViewData {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl std::ops::Deref for ViewData {
    type Target = BTreeMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[macro_export]
macro_rules! view_data {
    ($($key:expr => $value:expr, )*) => {
        {
            let mut _data = $crate::view::ViewData::new();
        $(
            let _ = _data.insert($key.to_string(), $value.to_string());
        )*
            _data
        }
    }
}

#[macro_export(local_inner_macros)]
macro_rules! page {
    ($template:expr , { $($data:tt)* }) => {
        $crate::view::ViewWithData($template, view_data! { $($data)* })
    };
    ($template:expr, $data:expr) => {
        $crate::view::ViewWithData($template, $data)
    };
    ($template:expr) => {
        $crate::view::View($template)
    };
}

#[derive(Clone)]
pub struct View<T: Template>(pub T);

#[derive(Clone)]
pub struct ViewWithData<T: Template>(pub T, pub ViewData);

#[derive(Clone)]
struct RenderedTemplate(String);

fn rendered_response(template: &impl Template) -> Response {
    match template.render() {
        Ok(body) => {
            let mut response = Response::new(Body::empty());
            response.extensions_mut().insert(RenderedTemplate(body));
            response
        }
        Err(e) => render_failure(e),
    }
}

impl<T: Template> IntoResponse for View<T> {
    fn into_response(self) -> Response {
        rendered_response(&self.0)
    }
}

impl<T: Template> IntoResponse for ViewWithData<T> {
    fn into_response(self) -> Response {
        let mut response = rendered_response(&self.0);
        response.extensions_mut().insert(self.1);
        response
    }
}
