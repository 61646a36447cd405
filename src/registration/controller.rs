use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    account::{self, AccountService},
    form::{RegistrationInput, RegistrationPayload},
    validation::{self, FieldErrors},
};

pub const HUB_PATH: &str = "/hub";
pub const SIGN_IN_PATH: &str = "/auth/signin";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Clone, derive_masked::DebugMasked)]
pub struct SignInCredentials {
    pub email: String,
    #[masked]
    pub password: String,
}

/// Session capabilities the controller calls into after a successful registration.
#[async_trait]
pub trait SessionGateway: Send {
    type Error: std::fmt::Display + Send;

    async fn sign_in(&mut self, credentials: SignInCredentials) -> Result<(), Self::Error>;

    fn navigate(&mut self, path: &str);
}

pub struct RegistrationController<S, G> {
    service: S,
    gateway: G,
    state: SubmissionState,
    field_errors: FieldErrors,
    root_error: Option<String>,
}

impl<S: AccountService, G: SessionGateway> RegistrationController<S, G> {
    pub fn new(service: S, gateway: G) -> Self {
        Self {
            service,
            gateway,
            state: SubmissionState::Idle,
            field_errors: FieldErrors::default(),
            root_error: None,
        }
    }

    /// Resume a form whose lifecycle was persisted between requests.
    pub fn with_state(mut self, state: SubmissionState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    pub fn root_error(&self) -> Option<&str> {
        self.root_error.as_deref()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn into_gateway(self) -> G {
        self.gateway
    }

    /// Validates `input` and, when it passes, enters `Submitting` and hands back the payload
    /// to send. Returns `None` when a submission is already in flight or a field failed.
    pub fn begin(&mut self, input: &RegistrationInput) -> Option<RegistrationPayload> {
        if self.state == SubmissionState::Submitting {
            debug!("ignoring submit for {}: already submitting", input.username);
            return None;
        }

        self.root_error = None;
        self.field_errors = validation::validate(input);

        if !self.field_errors.is_empty() {
            debug!(
                "registration for {} blocked by {} field error(s)",
                input.username,
                self.field_errors.len()
            );
            return None;
        }

        self.state = SubmissionState::Submitting;
        Some(input.payload())
    }

    /// Sends `payload` and settles the lifecycle on the response.
    pub async fn dispatch(
        &mut self,
        input: &RegistrationInput,
        payload: RegistrationPayload,
    ) -> SubmissionState {
        if self.state != SubmissionState::Submitting {
            warn!("dispatch called outside of a submission, ignoring");
            return self.state;
        }

        let result = self.service.register(&payload).await;
        self.resolve(input, result).await
    }

    /// `begin` then `dispatch`.
    pub async fn submit(&mut self, input: &RegistrationInput) -> SubmissionState {
        match self.begin(input) {
            Some(payload) => self.dispatch(input, payload).await,
            None => self.state,
        }
    }

    async fn resolve(
        &mut self,
        input: &RegistrationInput,
        result: Result<(), account::Error>,
    ) -> SubmissionState {
        match result {
            Ok(()) => {
                info!("registered new account {}", input.username);
                self.state = SubmissionState::Succeeded;

                let credentials = SignInCredentials {
                    email: input.email.clone(),
                    password: input.password.clone(),
                };

                match self.gateway.sign_in(credentials).await {
                    Ok(()) => self.gateway.navigate(HUB_PATH),
                    Err(e) => {
                        warn!("sign in after registering {} failed: {e}", input.username);
                        self.gateway.navigate(SIGN_IN_PATH);
                    }
                }
            }
            Err(e) => {
                warn!("registration for {} failed: {e}", input.username);
                self.state = SubmissionState::Failed;
                self.root_error = Some(e.root_message());
            }
        }

        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::{
        account::{NETWORK_FAILURE, REJECTION_FALLBACK},
        Field,
    };
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    #[derive(Clone)]
    enum Reply {
        Accept,
        Reject(Option<&'static str>),
        Malformed,
    }

    #[derive(Clone)]
    struct FakeService {
        reply: Reply,
        calls: Arc<Mutex<Vec<RegistrationPayload>>>,
    }

    impl FakeService {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: Arc::default(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AccountService for FakeService {
        async fn register(&self, payload: &RegistrationPayload) -> Result<(), account::Error> {
            self.calls.lock().unwrap().push(payload.clone());

            match self.reply {
                Reply::Accept => Ok(()),
                Reply::Reject(message) => Err(account::Error::Rejected {
                    status: 409,
                    message: message.map(str::to_string),
                }),
                Reply::Malformed => Err(account::Error::Malformed("eof".into())),
            }
        }
    }

    #[derive(Default)]
    struct FakeGateway {
        fail_sign_in: bool,
        sign_ins: Arc<AtomicUsize>,
        navigations: Vec<String>,
        last_email: Option<String>,
    }

    #[async_trait]
    impl SessionGateway for FakeGateway {
        type Error = String;

        async fn sign_in(&mut self, credentials: SignInCredentials) -> Result<(), String> {
            self.sign_ins.fetch_add(1, Ordering::SeqCst);
            self.last_email = Some(credentials.email);

            if self.fail_sign_in {
                Err("invalid credentials".into())
            } else {
                Ok(())
            }
        }

        fn navigate(&mut self, path: &str) {
            self.navigations.push(path.to_string());
        }
    }

    fn valid() -> RegistrationInput {
        RegistrationInput {
            username: "john_doe7".into(),
            email: "john.doe@example.com".into(),
            password: "Aaaaaaa1".into(),
            confirm_password: "Aaaaaaa1".into(),
            main_game: "valorant".into(),
        }
    }

    fn controller(reply: Reply) -> (RegistrationController<FakeService, FakeGateway>, FakeService) {
        let service = FakeService::new(reply);
        let controller = RegistrationController::new(service.clone(), FakeGateway::default());
        (controller, service)
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_service() {
        let (mut controller, service) = controller(Reply::Accept);
        let mut input = valid();
        input.username = "ab".into();

        let state = controller.submit(&input).await;

        assert_eq!(state, SubmissionState::Idle);
        assert_eq!(service.calls(), 0);
        assert_eq!(controller.field_errors().len(), 1);
        assert!(controller
            .field_errors()
            .get(Field::Username)
            .unwrap()
            .contains("at least 3 characters"));
        assert!(controller.gateway().navigations.is_empty());
    }

    #[tokio::test]
    async fn mismatched_passwords_block_submission() {
        let (mut controller, service) = controller(Reply::Accept);
        let mut input = valid();
        input.confirm_password = "Aaaaaaa2".into();

        controller.submit(&input).await;

        assert_eq!(service.calls(), 0);
        assert!(controller.field_errors().contains(Field::ConfirmPassword));
    }

    #[tokio::test]
    async fn accepted_registration_signs_in_and_navigates_once() {
        let (mut controller, service) = controller(Reply::Accept);
        let input = valid();

        let payload = controller.begin(&input).unwrap();
        assert_eq!(controller.state(), SubmissionState::Submitting);

        let state = controller.dispatch(&input, payload).await;

        assert_eq!(state, SubmissionState::Succeeded);
        assert_eq!(service.calls(), 1);
        assert!(controller.root_error().is_none());

        let gateway = controller.into_gateway();
        assert_eq!(gateway.sign_ins.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.last_email.as_deref(), Some("john.doe@example.com"));
        assert_eq!(gateway.navigations, vec![HUB_PATH.to_string()]);
    }

    #[tokio::test]
    async fn failed_sign_in_still_navigates_once() {
        let service = FakeService::new(Reply::Accept);
        let gateway = FakeGateway {
            fail_sign_in: true,
            ..Default::default()
        };
        let mut controller = RegistrationController::new(service, gateway);

        let state = controller.submit(&valid()).await;

        assert_eq!(state, SubmissionState::Succeeded);
        assert_eq!(
            controller.gateway().navigations,
            vec![SIGN_IN_PATH.to_string()]
        );
    }

    #[tokio::test]
    async fn rejection_surfaces_the_service_message() {
        let (mut controller, _) = controller(Reply::Reject(Some("Username already taken")));

        let state = controller.submit(&valid()).await;

        assert_eq!(state, SubmissionState::Failed);
        assert_eq!(controller.root_error(), Some("Username already taken"));
        assert!(controller.field_errors().is_empty());
        assert!(controller.gateway().navigations.is_empty());
        assert_eq!(controller.gateway().sign_ins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejection_without_message_uses_the_fallback() {
        let (mut controller, _) = controller(Reply::Reject(None));

        controller.submit(&valid()).await;

        assert_eq!(controller.root_error(), Some(REJECTION_FALLBACK));
    }

    #[tokio::test]
    async fn network_failure_surfaces_the_generic_message() {
        let (mut controller, _) = controller(Reply::Malformed);

        let state = controller.submit(&valid()).await;

        assert_eq!(state, SubmissionState::Failed);
        assert_eq!(controller.root_error(), Some(NETWORK_FAILURE));
    }

    #[tokio::test]
    async fn second_submit_while_submitting_is_a_noop() {
        let (mut controller, service) = controller(Reply::Accept);
        let input = valid();

        let first = controller.begin(&input);
        let second = controller.begin(&input);

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(controller.state(), SubmissionState::Submitting);

        // A resumed controller sees the persisted state too.
        let mut resumed = RegistrationController::new(service.clone(), FakeGateway::default())
            .with_state(SubmissionState::Submitting);
        assert_eq!(resumed.submit(&input).await, SubmissionState::Submitting);
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn failed_submission_can_be_retried() {
        let service = FakeService::new(Reply::Reject(Some("Email already registered")));
        let mut controller = RegistrationController::new(service.clone(), FakeGateway::default());

        assert_eq!(controller.submit(&valid()).await, SubmissionState::Failed);
        assert_eq!(controller.submit(&valid()).await, SubmissionState::Failed);
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn resubmitting_clears_the_previous_root_error() {
        let (controller, _) = controller(Reply::Reject(Some("Username already taken")));
        let mut controller = controller.with_state(SubmissionState::Failed);
        controller.submit(&valid()).await;
        assert!(controller.root_error().is_some());

        let mut input = valid();
        input.email = "nope".into();
        controller.submit(&input).await;

        assert_eq!(controller.state(), SubmissionState::Failed);
        assert!(controller.root_error().is_none());
        assert!(controller.field_errors().contains(Field::Email));
    }

    #[tokio::test]
    async fn dispatch_outside_a_submission_does_nothing() {
        let (mut controller, service) = controller(Reply::Accept);
        let input = valid();

        let state = controller.dispatch(&input, input.payload()).await;

        assert_eq!(state, SubmissionState::Idle);
        assert_eq!(service.calls(), 0);
    }
}
