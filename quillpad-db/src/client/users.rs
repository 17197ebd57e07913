use crate::{
    client::{DbClient, DbError, Result},
    record::{CredentialsRecord, UserRecord, to_primitive},
};
use quillpad_common::model::{
    Id,
    user::{CreateUser, Credentials, User, UserMarker, Username},
};
use sqlx::{query, query_as, query_scalar};
use time::UtcDateTime;

impl DbClient {
    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.date_joined
            FROM
                users
            WHERE
                users.user_id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_credentials(&self, username: &Username) -> Result<Option<Credentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.date_joined,
                users.password_hash
            FROM
                users
            WHERE
                users.username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(Credentials::try_from).transpose()?;
        Ok(credentials)
    }

    /// Whether the name is in use, ignoring case.
    pub async fn username_exists(&self, username: &Username) -> Result<bool> {
        let usernames = query_scalar::<_, String>("SELECT users.username FROM users")
            .fetch_all(&self.pool)
            .await?;

        Ok(usernames
            .iter()
            .any(|existing| username.matches_ignore_case(existing)))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.date_joined
            FROM
                users
            ORDER BY
                users.username
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    /// Fails with [`DbError::UsernameTaken`] if the username is in use, even
    /// when a concurrent registration won the race.
    pub async fn create_user(&self, user: &CreateUser) -> Result<Id<UserMarker>> {
        let user_id = query_scalar::<_, i64>(
            "
            INSERT INTO users (username, password_hash, date_joined)
            VALUES ($1, $2, $3)
            RETURNING user_id
            ",
        )
        .bind(user.username.get())
        .bind(user.password.as_phc_str())
        .bind(to_primitive(UtcDateTime::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::UsernameTaken,
            err => err.into(),
        })?;

        Ok(user_id.into())
    }

    /// The user's comments stay, detached from the account. Sessions are
    /// removed. Returns whether the user existed.
    pub async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
