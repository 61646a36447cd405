use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap, str::FromStr as _, sync::LazyLock};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use super::form::{Field, MainGame};

static RE_USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("username pattern should compile"));
static RE_UPPERCASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]").expect("uppercase pattern should compile"));
static RE_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]").expect("digit pattern should compile"));

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 8;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.chars().count();

    if length < USERNAME_MIN {
        return Err(error(
            "username_length",
            "Username must be at least 3 characters long",
        ));
    }

    if length > USERNAME_MAX {
        return Err(error(
            "username_length",
            "Username must be at most 20 characters long",
        ));
    }

    if !RE_USERNAME.is_match(username) {
        return Err(error(
            "username_charset",
            "Only letters, numbers and underscores are allowed",
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(error(
            "password_length",
            "Password must be at least 8 characters long",
        ));
    }

    if !RE_UPPERCASE.is_match(password) {
        return Err(error(
            "password_uppercase",
            "Must contain at least one uppercase letter",
        ));
    }

    if !RE_DIGIT.is_match(password) {
        return Err(error("password_digit", "Must contain at least one number"));
    }

    Ok(())
}

pub fn validate_main_game(main_game: &str) -> Result<(), ValidationError> {
    match MainGame::from_str(main_game) {
        Ok(_) => Ok(()),
        Err(_) => Err(error("main_game", "Select your main game")),
    }
}

/// Field name to message. Empty means the input may be submitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    /// Records `message` for `field`, keeping a message that is already there.
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// First message in field order, for surfaces that only show one line.
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();

        for (name, kind) in errors.into_errors() {
            let Some(field) = Field::from_struct_field(&name) else {
                tracing::debug!("ignoring validation error for unknown field {name}");
                continue;
            };

            if let ValidationErrorsKind::Field(errors) = kind {
                // One message per field, the first rule that failed.
                if let Some(error) = errors.first() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    fields.insert(field, message);
                }
            }
        }

        Self(fields)
    }
}

/// Runs every field and cross-field rule against `input`.
pub fn validate<T: Validate>(input: &T) -> FieldErrors {
    match input.validate() {
        Ok(()) => FieldErrors::default(),
        Err(errors) => errors.into(),
    }
}
