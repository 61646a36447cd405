use rinja::Template;

#[derive(Template)]
#[template(path = "pages/landing.html")]
pub struct Landing {
    pub signed_in: bool,
}
