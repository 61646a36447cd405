use rinja::Template;
use std::str::FromStr as _;

use crate::registration::{Field, FieldErrors, FieldVisibility, FormEcho, MainGame};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameOption {
    pub id: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

pub fn game_options(selected: &str) -> Vec<GameOption> {
    MainGame::all()
        .map(|game| GameOption {
            id: game.id(),
            label: game.label(),
            selected: game.id() == selected,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignUp {
    pub form: FormEcho,
    pub errors: FieldErrors,
    pub root_error: Option<String>,
    pub visibility: FieldVisibility,
    pub password: String,
    pub confirm_password: String,
    pub terms_accepted: bool,
    pub submitting: bool,
    pub games: Vec<GameOption>,
}

impl SignUp {
    pub fn new(form: FormEcho) -> Self {
        let games = game_options(&form.main_game);

        Self {
            form,
            errors: FieldErrors::default(),
            root_error: None,
            visibility: FieldVisibility::default(),
            password: String::new(),
            confirm_password: String::new(),
            terms_accepted: false,
            submitting: false,
            games,
        }
    }

    pub fn with_errors(mut self, errors: FieldErrors, root_error: Option<String>) -> Self {
        self.errors = errors;
        self.root_error = root_error;
        self
    }

    pub fn with_visibility(mut self, visibility: FieldVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Only for re-rendering the same request, never for pages built from the session.
    pub fn with_passwords(mut self, password: String, confirm_password: String) -> Self {
        self.password = password;
        self.confirm_password = confirm_password;
        self
    }

    pub fn accepting_terms(mut self, terms_accepted: bool) -> Self {
        self.terms_accepted = terms_accepted;
        self
    }

    pub fn submitting(mut self, submitting: bool) -> Self {
        self.submitting = submitting;
        self
    }

    fn field(name: &str) -> Option<Field> {
        Field::from_str(name).ok()
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        Self::field(name).and_then(|field| self.errors.get(field))
    }

    pub fn input_type(&self, name: &str) -> &'static str {
        match Self::field(name) {
            Some(field) if self.visibility.is_visible(field) => "text",
            _ => "password",
        }
    }

    pub fn toggle_label(&self, name: &str) -> &'static str {
        match self.input_type(name) {
            "text" => "Hide",
            _ => "Show",
        }
    }
}

#[derive(Template)]
#[template(path = "pages/signin.html")]
pub struct SignIn {
    pub email: String,
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(main_game: &str) -> FormEcho {
        FormEcho {
            username: "john_doe7".into(),
            email: "john@example.com".into(),
            main_game: main_game.into(),
        }
    }

    #[test]
    fn only_the_chosen_game_is_selected() {
        let options = game_options("lol");

        assert_eq!(options.len(), 4);
        let selected: Vec<_> = options.iter().filter(|o| o.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].label, "League of Legends");
    }

    #[test]
    fn visibility_switches_input_type() {
        let mut visibility = FieldVisibility::default();
        visibility.toggle(Field::ConfirmPassword);
        let view = SignUp::new(echo("cs2")).with_visibility(visibility);

        assert_eq!(view.input_type("password"), "password");
        assert_eq!(view.input_type("confirmPassword"), "text");
        assert_eq!(view.toggle_label("confirmPassword"), "Hide");
    }

    #[test]
    fn renders_errors_and_echo_without_passwords() {
        let errors = crate::registration::validate(&crate::registration::RegistrationInput {
            username: "ab".into(),
            email: "john@example.com".into(),
            password: "Aaaaaaa1".into(),
            confirm_password: "Aaaaaaa1".into(),
            main_game: "valorant".into(),
        });
        let html = SignUp::new(echo("valorant"))
            .with_errors(errors, Some("Registration failed".into()))
            .render()
            .unwrap();

        assert!(html.contains("Username must be at least 3 characters long"));
        assert!(html.contains("Registration failed"));
        assert!(html.contains("john@example.com"));
        assert!(html.contains(r#"value="valorant" selected"#));
    }
}
