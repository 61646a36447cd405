use rinja::Template;

use crate::{model::Notification, team::Team};

/// One entry of the notification dropdown.
#[derive(Clone, Debug)]
pub struct NotificationItem {
    pub id: i32,
    pub message: String,
    pub created: String,
}

impl From<Notification> for NotificationItem {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            message: notification.message,
            created: notification.created_at.format("%b %e, %H:%M").to_string(),
        }
    }
}

/// Header and sidebar shared by every hub page.
#[derive(Clone, Debug)]
pub struct HubChrome {
    pub username: String,
    pub notifications: Vec<NotificationItem>,
    pub menu_open: bool,
    pub current: &'static str,
}

impl HubChrome {
    pub fn unread(&self) -> usize {
        self.notifications.len()
    }

    pub fn menu_href(&self) -> String {
        if self.menu_open {
            self.current.to_string()
        } else {
            format!("{}?menu=open", self.current)
        }
    }
}

#[derive(Template)]
#[template(path = "hub/index.html")]
pub struct Hub {
    pub chrome: HubChrome,
}

#[derive(Template)]
#[template(path = "hub/create.html")]
pub struct TeamCreate {
    pub chrome: HubChrome,
    pub text: String,
    pub teams: Vec<Team>,
    pub fallback: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "components/notification.html")]
pub struct NotificationComponent {
    pub notification: NotificationItem,
}
