use axum::response::IntoResponse;

use crate::{auth::AuthSession, page, view::Landing};

pub async fn landing(AuthSession { user, .. }: AuthSession) -> impl IntoResponse {
    page!(Landing { signed_in: user.is_some() }, {
        "title" => "Welcome",
    })
}
