use rinja::Template;

#[derive(Template)]
#[template(path = "pages/error.html")]
pub struct ErrorPage {
    pub code: u16,
    pub message: String,
}
