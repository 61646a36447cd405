use derive_masked::DebugMasked;
use derive_more::derive::Display;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use validator::Validate;

use super::validation::{validate_main_game, validate_password, validate_username};

/// Everything the user typed into the sign-up form for one submission attempt.
#[derive(Validate, Serialize, Deserialize, DebugMasked, Display, Clone, Default)]
#[display("Username: {username} Email: {email} Password: REDACTED MainGame: {main_game}")]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationInput {
    #[validate(custom(function = "validate_username"))]
    pub username: String,

    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,

    #[masked]
    #[validate(custom(function = "validate_password"))]
    pub password: String,

    #[masked]
    #[validate(must_match(other = "password", message = "The passwords don't match"))]
    pub confirm_password: String,

    #[validate(custom(function = "validate_main_game"))]
    pub main_game: String,
}

impl RegistrationInput {
    pub fn payload(&self) -> RegistrationPayload {
        RegistrationPayload {
            username: self.username.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            main_game: self.main_game.clone(),
        }
    }

    /// The values that are safe to keep around between requests.
    pub fn echo(&self) -> FormEcho {
        FormEcho {
            username: self.username.clone(),
            email: self.email.clone(),
            main_game: self.main_game.clone(),
        }
    }
}

/// Body posted to the account service. Same rules as the form minus the confirmation.
#[derive(Validate, Serialize, Deserialize, DebugMasked, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    #[validate(custom(function = "validate_username"))]
    pub username: String,

    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,

    #[masked]
    #[validate(custom(function = "validate_password"))]
    pub password: String,

    #[validate(custom(function = "validate_main_game"))]
    pub main_game: String,
}

/// Non-secret part of the form, re-filled into the page after a redirect.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormEcho {
    pub username: String,
    pub email: String,
    pub main_game: String,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MainGame {
    Valorant,
    Lol,
    Cs2,
    Other,
}

impl MainGame {
    pub fn id(&self) -> &'static str {
        match self {
            MainGame::Valorant => "valorant",
            MainGame::Lol => "lol",
            MainGame::Cs2 => "cs2",
            MainGame::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MainGame::Valorant => "Valorant",
            MainGame::Lol => "League of Legends",
            MainGame::Cs2 => "CS:GO 2",
            MainGame::Other => "Other",
        }
    }

    pub fn all() -> impl Iterator<Item = MainGame> {
        MainGame::iter()
    }
}

/// Form fields as the page and the service name them.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Field {
    Username,
    Email,
    Password,
    ConfirmPassword,
    MainGame,
    /// The terms checkbox. Checked by the page host, not by `validate`.
    Terms,
}

impl Field {
    /// Maps the struct field names `validator` reports back to form fields.
    pub fn from_struct_field(name: &str) -> Option<Field> {
        match name {
            "username" => Some(Field::Username),
            "email" => Some(Field::Email),
            "password" => Some(Field::Password),
            "confirm_password" => Some(Field::ConfirmPassword),
            "main_game" => Some(Field::MainGame),
            _ => None,
        }
    }
}

/// Show-or-mask state of the two password inputs. Purely presentational.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldVisibility {
    pub password: bool,
    pub confirm_password: bool,
}

impl FieldVisibility {
    /// Flips the field and returns the new value. Fields without a mask are ignored.
    pub fn toggle(&mut self, field: Field) -> bool {
        match field {
            Field::Password => {
                self.password = !self.password;
                self.password
            }
            Field::ConfirmPassword => {
                self.confirm_password = !self.confirm_password;
                self.confirm_password
            }
            _ => false,
        }
    }

    pub fn is_visible(&self, field: Field) -> bool {
        match field {
            Field::Password => self.password,
            Field::ConfirmPassword => self.confirm_password,
            _ => true,
        }
    }
}
