pub mod api;
pub mod auth;
mod events;
mod home;
pub mod hub;

pub(crate) use events::*;
pub(crate) use home::*;
