use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;

use crate::schema::notification;

#[derive(Clone, Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = notification)]
#[diesel(check_for_backend(Sqlite))]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub message: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Notification {
    /// Newest first.
    pub fn unread_for_user(
        user_id: i32,
        limit: i64,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Vec<Notification>> {
        notification::table
            .filter(notification::user_id.eq(user_id))
            .filter(notification::is_read.eq(false))
            .order((notification::created_at.desc(), notification::id.desc()))
            .limit(limit)
            .select(Notification::as_select())
            .load(conn)
    }

    /// `None` when the notification does not exist or belongs to someone else.
    pub fn mark_read(
        id: i32,
        user_id: i32,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Option<Notification>> {
        diesel::update(
            notification::table
                .filter(notification::id.eq(id))
                .filter(notification::user_id.eq(user_id)),
        )
        .set((
            notification::is_read.eq(true),
            notification::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .returning(Notification::as_returning())
        .get_result(conn)
        .optional()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notification)]
#[diesel(check_for_backend(Sqlite))]
pub struct NewNotification {
    pub user_id: i32,
    pub message: String,
}

impl NewNotification {
    pub fn new(user_id: i32, message: impl Into<String>) -> Self {
        Self {
            user_id,
            message: message.into(),
        }
    }

    pub fn create(&self, conn: &mut SqliteConnection) -> QueryResult<Notification> {
        diesel::insert_into(notification::table)
            .values(self)
            .returning(Notification::as_returning())
            .get_result(conn)
    }
}
