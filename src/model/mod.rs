mod notification;
mod user;

pub use notification::*;
pub use user::*;
