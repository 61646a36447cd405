use chrono::NaiveDateTime;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;

use crate::schema::user;

#[derive(Clone, derive_more::Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = user)]
#[diesel(check_for_backend(Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[debug(skip)]
    pub password: String,
    pub main_game: String,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn find(id: i32, conn: &mut SqliteConnection) -> QueryResult<Option<User>> {
        user::table
            .find(id)
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    pub fn find_by_email(email: &str, conn: &mut SqliteConnection) -> QueryResult<Option<User>> {
        user::table
            .filter(user::email.eq(email))
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    pub fn username_exists(username: &str, conn: &mut SqliteConnection) -> QueryResult<bool> {
        diesel::select(exists(user::table.filter(user::username.eq(username)))).get_result(conn)
    }

    pub fn email_exists(email: &str, conn: &mut SqliteConnection) -> QueryResult<bool> {
        diesel::select(exists(user::table.filter(user::email.eq(email)))).get_result(conn)
    }
}

#[derive(derive_more::Debug, Insertable)]
#[diesel(table_name = user)]
#[diesel(check_for_backend(Sqlite))]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[debug(skip)]
    pub password: String,
    pub main_game: String,
}

impl NewUser {
    /// `password` must already be hashed.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        main_game: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            main_game: main_game.into(),
        }
    }

    pub fn create(&self, conn: &mut SqliteConnection) -> QueryResult<User> {
        diesel::insert_into(user::table)
            .values(self)
            .returning(User::as_returning())
            .get_result(conn)
    }
}
