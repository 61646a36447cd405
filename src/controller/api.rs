use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use diesel::result::{DatabaseErrorKind, Error::DatabaseError};
use rinja::Template as _;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    context::{AppContext, UserEvent},
    database,
    model::{NewNotification, NewUser, User},
    registration::{validate, FieldErrors, RegistrationPayload},
    view::{NotificationComponent, NotificationItem},
};

pub const USERNAME_TAKEN: &str = "Username already taken";
pub const EMAIL_TAKEN: &str = "Email already registered";

pub fn routes() -> Router<AppContext> {
    Router::new().route("/register", post(register))
}

#[derive(Debug, Serialize)]
pub struct Registered {
    pub id: i32,
    pub username: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("validation failed")]
    Invalid(FieldErrors),

    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    message,
                    errors: None,
                },
            ),
            ApiError::Invalid(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    message: errors
                        .first_message()
                        .unwrap_or("Invalid registration")
                        .to_string(),
                    errors: Some(errors),
                },
            ),
            ApiError::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    message: message.to_string(),
                    errors: None,
                },
            ),
            ApiError::Internal(e) => {
                error!("registration endpoint failed: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        message: "Registration failed".to_string(),
                        errors: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<database::Error> for ApiError {
    fn from(error: database::Error) -> Self {
        match error {
            database::Error::Diesel(DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                if info.message().contains("email") {
                    ApiError::Conflict(EMAIL_TAKEN)
                } else {
                    ApiError::Conflict(USERNAME_TAKEN)
                }
            }
            error => ApiError::Internal(error.into()),
        }
    }
}

pub async fn register(
    State(context): State<AppContext>,
    payload: Result<Json<RegistrationPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Registered>), ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let errors = validate(&payload);
    if !errors.is_empty() {
        return Err(ApiError::Invalid(errors));
    }

    let (username, email) = (payload.username.clone(), payload.email.clone());
    let conflict = database::interact(context.database(), move |conn| {
        if User::username_exists(&username, conn)? {
            return Ok(Some(USERNAME_TAKEN));
        }
        if User::email_exists(&email, conn)? {
            return Ok(Some(EMAIL_TAKEN));
        }
        Ok(None)
    })
    .await?;
    if let Some(message) = conflict {
        info!("rejected registration for {}: {message}", payload.username);
        return Err(ApiError::Conflict(message));
    }

    let RegistrationPayload {
        username,
        email,
        password,
        main_game,
    } = payload;
    let hash = tokio::task::spawn_blocking(move || password_auth::generate_hash(password))
        .await
        .map_err(anyhow::Error::from)?;

    let user = database::interact(context.database(), move |conn| {
        NewUser::new(username, email, hash, main_game).create(conn)
    })
    .await?;
    info!("created user {} ({})", user.username, user.id);

    welcome(&context, &user).await;

    Ok((
        StatusCode::CREATED,
        Json(Registered {
            id: user.id,
            username: user.username,
        }),
    ))
}

/// Post the welcome notification. The account exists either way.
async fn welcome(context: &AppContext, user: &User) {
    let notification = NewNotification::new(
        user.id,
        format!("Welcome to PixelClutch, {}!", user.username),
    );
    let notification =
        match database::interact(context.database(), move |conn| notification.create(conn)).await
        {
            Ok(notification) => notification,
            Err(e) => {
                warn!("could not create welcome notification for {}: {e}", user.username);
                return;
            }
        };

    match (NotificationComponent {
        notification: NotificationItem::from(notification),
    })
    .render()
    {
        Ok(data) => context.publish(UserEvent {
            user_id: user.id,
            name: "notification",
            data,
        }),
        Err(e) => warn!("could not render notification event: {e}"),
    }
}
