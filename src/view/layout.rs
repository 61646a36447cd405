use axum_messages::{Level, Message};
use rinja::Template;

use crate::model::User;

#[derive(Template)]
#[template(path = "layout.html")]
pub struct Layout {
    pub title: String,
    pub content: String,
    pub flashes: Vec<Flash>,
    pub user: Option<User>,
    pub version_string: String,
}

/// A flash message ready for the banner area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flash {
    pub class: &'static str,
    pub text: String,
}

impl From<Message> for Flash {
    fn from(message: Message) -> Self {
        let class = match message.level {
            Level::Debug | Level::Info => "flash-info",
            Level::Success => "flash-success",
            Level::Warning => "flash-warning",
            Level::Error => "flash-error",
        };

        Self {
            class,
            text: message.message,
        }
    }
}
