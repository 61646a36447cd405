use async_trait::async_trait;
use axum_login::{AuthUser, AuthnBackend, UserId};
use deadpool_diesel::sqlite::Pool;
use derive_masked::DebugMasked;
use password_auth::verify_password;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    database,
    model::User,
    registration::{SessionGateway, SignInCredentials},
};

pub type AuthSession = axum_login::AuthSession<Backend>;
type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] database::Error),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum SignInError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Session(#[from] axum_login::Error<Backend>),
}

impl AuthUser for User {
    type Id = i32;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn session_auth_hash(&self) -> &[u8] {
        // Changing the password invalidates existing sessions.
        self.password.as_bytes()
    }
}

#[derive(Validate, Clone, Serialize, Deserialize, DebugMasked, Default)]
pub struct Credentials {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,

    #[masked]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    pub next: Option<String>,
}

impl From<SignInCredentials> for Credentials {
    fn from(credentials: SignInCredentials) -> Self {
        Self {
            email: credentials.email,
            password: credentials.password,
            next: None,
        }
    }
}

/// Checks email and password against the local user table.
#[derive(Clone)]
pub struct Backend {
    database: Pool,
}

impl Backend {
    pub fn new(database: Pool) -> Self {
        Self { database }
    }
}

#[async_trait]
impl AuthnBackend for Backend {
    type User = User;
    type Credentials = Credentials;
    type Error = Error;

    async fn authenticate(&self, credentials: Self::Credentials) -> Result<Option<Self::User>> {
        let email = credentials.email.clone();
        let Some(user) =
            database::interact(&self.database, move |conn| User::find_by_email(&email, conn))
                .await?
        else {
            return Ok(None);
        };

        // Hash verification is slow on purpose, keep it off the runtime threads.
        Ok(tokio::task::spawn_blocking(move || {
            verify_password(credentials.password, &user.password)
                .is_ok()
                .then_some(user)
        })
        .await?)
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>> {
        let user_id = *user_id;
        Ok(database::interact(&self.database, move |conn| User::find(user_id, conn)).await?)
    }
}

/// Signs in through axum-login and records where the request should be redirected.
pub struct AuthSessionGateway {
    auth_session: AuthSession,
    redirect: Option<String>,
}

impl AuthSessionGateway {
    pub fn new(auth_session: AuthSession) -> Self {
        Self {
            auth_session,
            redirect: None,
        }
    }

    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }
}

#[async_trait]
impl SessionGateway for AuthSessionGateway {
    type Error = SignInError;

    async fn sign_in(
        &mut self,
        credentials: SignInCredentials,
    ) -> std::result::Result<(), SignInError> {
        let user = self
            .auth_session
            .authenticate(credentials.into())
            .await?
            .ok_or(SignInError::InvalidCredentials)?;

        self.auth_session.login(&user).await?;
        tracing::info!("signed in {} after registration", user.username);

        Ok(())
    }

    fn navigate(&mut self, path: &str) {
        self.redirect = Some(path.to_string());
    }
}
