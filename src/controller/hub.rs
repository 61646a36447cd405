use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_messages::Messages;
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::AuthSession,
    context::AppContext,
    database,
    error::{AppError, AppResult},
    model::{Notification, User},
    page,
    team::TeamAssignment,
    view::{Hub, HubChrome, NotificationItem, TeamCreate},
};

const NOTIFICATION_LIMIT: i64 = 20;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(hub))
        .route("/events", get(super::events))
        .route("/create", get(create_form).post(create))
        .route("/notifications/:id/read", post(mark_read))
}

#[derive(Debug, Default, Deserialize)]
pub struct MenuQuery {
    menu: Option<String>,
}

impl MenuQuery {
    fn is_open(&self) -> bool {
        self.menu.as_deref() == Some("open")
    }
}

#[derive(Debug, Deserialize)]
pub struct TeamInput {
    text: String,
}

fn current_user(auth_session: AuthSession) -> AppResult<User> {
    auth_session.user.ok_or(AppError::Unauthorized)
}

async fn chrome(
    context: &AppContext,
    user: User,
    menu_open: bool,
    current: &'static str,
) -> AppResult<HubChrome> {
    let user_id = user.id;
    let notifications = database::interact(context.database(), move |conn| {
        Notification::unread_for_user(user_id, NOTIFICATION_LIMIT, conn)
    })
    .await
    .map_err(AppError::internal)?;

    Ok(HubChrome {
        username: user.username,
        notifications: notifications.into_iter().map(NotificationItem::from).collect(),
        menu_open,
        current,
    })
}

pub async fn hub(
    State(context): State<AppContext>,
    auth_session: AuthSession,
    Query(menu): Query<MenuQuery>,
) -> AppResult<Response> {
    let user = current_user(auth_session)?;
    let chrome = chrome(&context, user, menu.is_open(), "/hub").await?;

    Ok(page!(Hub { chrome }, {
        "title" => "Hub",
    })
    .into_response())
}

pub async fn mark_read(
    State(context): State<AppContext>,
    auth_session: AuthSession,
    Path(id): Path<i32>,
) -> AppResult<Redirect> {
    let user = current_user(auth_session)?;
    let user_id = user.id;

    database::interact(context.database(), move |conn| {
        Notification::mark_read(id, user_id, conn)
    })
    .await
    .map_err(AppError::internal)?
    .ok_or(AppError::NotFound)?;

    Ok(Redirect::to("/hub"))
}

pub async fn create_form(
    State(context): State<AppContext>,
    auth_session: AuthSession,
    Query(menu): Query<MenuQuery>,
) -> AppResult<Response> {
    let user = current_user(auth_session)?;
    let chrome = chrome(&context, user, menu.is_open(), "/hub/create").await?;

    let view = TeamCreate {
        chrome,
        text: String::new(),
        teams: vec![],
        fallback: None,
        error: None,
    };

    Ok(page!(view, {
        "title" => "Create",
    })
    .into_response())
}

pub async fn create(
    State(context): State<AppContext>,
    auth_session: AuthSession,
    messages: Messages,
    Form(TeamInput { text }): Form<TeamInput>,
) -> AppResult<Response> {
    let user = current_user(auth_session)?;
    let username = user.username.clone();
    let chrome = chrome(&context, user, false, "/hub/create").await?;

    let mut view = TeamCreate {
        chrome,
        text,
        teams: vec![],
        fallback: None,
        error: None,
    };

    if view.text.trim().is_empty() {
        messages.error("Describe the players to split into teams");
        return Ok(Redirect::to("/hub/create").into_response());
    }

    match context.randomizer.randomize(&view.text).await {
        Ok(reply) => match TeamAssignment::parse(&reply) {
            Some(assignment) => {
                info!("randomized {} teams for {username}", assignment.teams.len());
                view.teams = assignment.teams;
            }
            None => view.fallback = Some(reply),
        },
        Err(e) => view.error = Some(e.to_string()),
    }

    Ok(page!(view, {
        "title" => "Create",
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_opens_only_on_request() {
        assert!(MenuQuery {
            menu: Some("open".into())
        }
        .is_open());
        assert!(!MenuQuery {
            menu: Some("closed".into())
        }
        .is_open());
        assert!(!MenuQuery::default().is_open());
    }
}
