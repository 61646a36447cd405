//! Sign-up field rules and the lifecycle of a submission to the account service.

pub mod account;
mod controller;
mod form;
pub mod validation;

pub use {
    account::{AccountService, HttpAccountService},
    controller::{
        RegistrationController, SessionGateway, SignInCredentials, SubmissionState, HUB_PATH,
        SIGN_IN_PATH,
    },
    form::{Field, FieldVisibility, FormEcho, MainGame, RegistrationInput, RegistrationPayload},
    validation::{validate, FieldErrors},
};
