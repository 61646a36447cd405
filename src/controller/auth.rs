use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_messages::Messages;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    auth::{AuthSession, AuthSessionGateway, Credentials},
    context::AppContext,
    error::{AppError, AppResult},
    page,
    registration::{
        validate, AccountService, Field, FieldErrors, FieldVisibility, FormEcho,
        RegistrationController, RegistrationInput, RegistrationPayload, SubmissionState, HUB_PATH,
        SIGN_IN_PATH,
    },
    view::{SignIn, SignUp},
};

const SIGN_UP_PATH: &str = "/auth/signup";
const REGISTRATION_FORM_KEY: &str = "auth.registration_form";
const SUBMISSION_STATE_KEY: &str = "auth.submission_state";
const FIELD_VISIBILITY_KEY: &str = "auth.field_visibility";
const SIGN_IN_EMAIL_KEY: &str = "auth.sign_in_email";
const TERMS_REQUIRED: &str = "You must accept the Terms of Service";

type SignUpController = RegistrationController<Arc<dyn AccountService>, AuthSessionGateway>;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/signup", get(signup_form).post(signup))
        .route("/signup/visibility", post(toggle_visibility))
        .route("/signin", get(signin_form).post(signin))
        .route("/signout", get(signout))
}

/// What survives the redirect after a rejected sign-up. Never holds passwords.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StashedForm {
    form: FormEcho,
    errors: FieldErrors,
    root_error: Option<String>,
}

/// The posted sign-up page: the registration fields plus the terms checkbox.
#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    #[serde(flatten)]
    input: RegistrationInput,
    #[serde(default)]
    terms: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextUrl {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityToggle {
    field: Field,
}

/// Only same-site absolute paths are followed.
fn local_path(next: Option<&str>) -> Option<&str> {
    next.filter(|next| next.starts_with('/') && !next.starts_with("//"))
}

/// An unchecked checkbox is simply missing from the body.
fn accepted(terms: Option<&str>) -> bool {
    terms.is_some_and(|value| !value.is_empty())
}

async fn submission_state(session: &Session) -> AppResult<SubmissionState> {
    Ok(session
        .get::<SubmissionState>(SUBMISSION_STATE_KEY)
        .await
        .map_err(AppError::internal)?
        .unwrap_or_default())
}

pub async fn signup_form(
    AuthSession { user, .. }: AuthSession,
    session: Session,
) -> AppResult<Response> {
    if user.is_some() {
        return Ok(Redirect::to(HUB_PATH).into_response());
    }

    let StashedForm {
        form,
        errors,
        root_error,
    } = session
        .remove(REGISTRATION_FORM_KEY)
        .await
        .map_err(AppError::internal)?
        .unwrap_or_default();
    let visibility = session
        .get::<FieldVisibility>(FIELD_VISIBILITY_KEY)
        .await
        .map_err(AppError::internal)?
        .unwrap_or_default();
    let state = submission_state(&session).await?;

    let view = SignUp::new(form)
        .with_errors(errors, root_error)
        .with_visibility(visibility)
        .submitting(state == SubmissionState::Submitting);

    Ok(page!(view, {
        "title" => "Sign Up",
    })
    .into_response())
}

pub async fn signup(
    State(context): State<AppContext>,
    auth_session: AuthSession,
    session: Session,
    Form(SignUpForm { input, terms }): Form<SignUpForm>,
) -> AppResult<Response> {
    if auth_session.user.is_some() {
        return Ok(Redirect::to(HUB_PATH).into_response());
    }

    let state = submission_state(&session).await?;
    // A submit while one is in flight leaves the session untouched.
    if state == SubmissionState::Submitting {
        debug!("ignoring sign-up for {}: already submitting", input.username);
        return Ok(Redirect::to(SIGN_UP_PATH).into_response());
    }

    if !accepted(terms.as_deref()) {
        let mut errors = validate(&input);
        errors.insert(Field::Terms, TERMS_REQUIRED);
        stash_form(&session, &input, &errors, None).await?;
        return Ok(Redirect::to(SIGN_UP_PATH).into_response());
    }

    let mut controller =
        RegistrationController::new(context.accounts.clone(), AuthSessionGateway::new(auth_session))
            .with_state(state);

    let Some(payload) = controller.begin(&input) else {
        stash_form(&session, &input, controller.field_errors(), None).await?;
        return Ok(Redirect::to(SIGN_UP_PATH).into_response());
    };

    // Persist before the outbound call so a duplicate submit from this session is ignored.
    session
        .insert(SUBMISSION_STATE_KEY, SubmissionState::Submitting)
        .await
        .map_err(AppError::internal)?;
    session.save().await.map_err(AppError::internal)?;

    // Settled on its own task so a dropped request cannot leave the session submitting.
    let target = tokio::spawn(settle(controller, input, payload, session))
        .await
        .map_err(AppError::internal)??;

    Ok(Redirect::to(&target).into_response())
}

/// Sends the registration and writes the outcome back to the session store.
async fn settle(
    mut controller: SignUpController,
    input: RegistrationInput,
    payload: RegistrationPayload,
    session: Session,
) -> AppResult<String> {
    let state = controller.dispatch(&input, payload).await;
    session
        .insert(SUBMISSION_STATE_KEY, state)
        .await
        .map_err(AppError::internal)?;

    let target = if state == SubmissionState::Succeeded {
        session
            .remove_value(FIELD_VISIBILITY_KEY)
            .await
            .map_err(AppError::internal)?;
        let gateway = controller.into_gateway();
        gateway.redirect().unwrap_or(SIGN_IN_PATH).to_string()
    } else {
        stash_form(
            &session,
            &input,
            controller.field_errors(),
            controller.root_error().map(str::to_string),
        )
        .await?;
        SIGN_UP_PATH.to_string()
    };

    session.save().await.map_err(AppError::internal)?;

    Ok(target)
}

async fn stash_form(
    session: &Session,
    input: &RegistrationInput,
    errors: &FieldErrors,
    root_error: Option<String>,
) -> AppResult<()> {
    let stash = StashedForm {
        form: input.echo(),
        errors: errors.clone(),
        root_error,
    };

    session
        .insert(REGISTRATION_FORM_KEY, stash)
        .await
        .map_err(AppError::internal)
}

pub async fn toggle_visibility(
    session: Session,
    Query(VisibilityToggle { field }): Query<VisibilityToggle>,
    Form(SignUpForm { input, terms }): Form<SignUpForm>,
) -> AppResult<Response> {
    let mut visibility = session
        .get::<FieldVisibility>(FIELD_VISIBILITY_KEY)
        .await
        .map_err(AppError::internal)?
        .unwrap_or_default();
    visibility.toggle(field);
    session
        .insert(FIELD_VISIBILITY_KEY, visibility)
        .await
        .map_err(AppError::internal)?;

    let state = submission_state(&session).await?;
    let view = SignUp::new(input.echo())
        .with_visibility(visibility)
        .with_passwords(input.password, input.confirm_password)
        .accepting_terms(accepted(terms.as_deref()))
        .submitting(state == SubmissionState::Submitting);

    Ok(page!(view, {
        "title" => "Sign Up",
    })
    .into_response())
}

pub async fn signin_form(
    AuthSession { user, .. }: AuthSession,
    session: Session,
    Query(NextUrl { next }): Query<NextUrl>,
) -> AppResult<Response> {
    if user.is_some() {
        return Ok(Redirect::to(HUB_PATH).into_response());
    }

    let email = session
        .remove::<String>(SIGN_IN_EMAIL_KEY)
        .await
        .map_err(AppError::internal)?
        .unwrap_or_default();

    Ok(page!(SignIn { email, next }, {
        "title" => "Sign In",
    })
    .into_response())
}

pub async fn signin(
    mut auth_session: AuthSession,
    session: Session,
    mut messages: Messages,
    Form(input): Form<Credentials>,
) -> AppResult<Response> {
    let retry_url = match local_path(input.next.as_deref()) {
        Some(next) => format!("{SIGN_IN_PATH}?next={next}"),
        None => SIGN_IN_PATH.to_string(),
    };

    session
        .insert(SIGN_IN_EMAIL_KEY, input.email.clone())
        .await
        .map_err(AppError::internal)?;

    if let Err(validation) = input.validate() {
        for message in FieldErrors::from(validation).iter().map(|(_, m)| m.to_string()) {
            messages = messages.error(message);
        }
        return Ok(Redirect::to(&retry_url).into_response());
    }

    let next = input.next.clone();
    let user = match auth_session.authenticate(input).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            messages.error("Invalid credentials");
            return Ok(Redirect::to(&retry_url).into_response());
        }
        Err(e) => return Err(AppError::internal(e)),
    };

    auth_session.login(&user).await.map_err(AppError::internal)?;
    session
        .remove_value(SIGN_IN_EMAIL_KEY)
        .await
        .map_err(AppError::internal)?;

    info!("{} signed in", user.username);
    messages.success(format!("Signed in as {}", user.username));

    let target = local_path(next.as_deref()).unwrap_or(HUB_PATH);
    Ok(Redirect::to(target).into_response())
}

pub async fn signout(mut auth_session: AuthSession) -> AppResult<Response> {
    match auth_session.logout().await {
        Ok(Some(user)) => info!("{} signed out", user.username),
        Ok(None) => {}
        Err(e) => {
            warn!("Error signing out: {e}");
            return Err(AppError::internal(e));
        }
    }

    Ok(Redirect::to("/").into_response())
}
