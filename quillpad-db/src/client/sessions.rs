use crate::{
    client::{DbClient, Result},
    record::{SessionUserRecord, to_primitive},
};
use quillpad_common::model::{
    auth::{Session, SessionTokenHash},
    user::User,
};
use sqlx::{query, query_as};

impl DbClient {
    pub async fn create_session(&self, session: &Session) -> Result<()> {
        query(
            "
            INSERT INTO sessions (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(session.token_hash.0.as_slice())
        .bind(session.user.get())
        .bind(to_primitive(session.created_at))
        .bind(
            session
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The session with the given hash and the user it belongs to. Expiry is
    /// left to the caller.
    pub async fn fetch_session(
        &self,
        token_hash: &SessionTokenHash,
    ) -> Result<Option<(Session, User)>> {
        let record = query_as::<_, SessionUserRecord>(
            "
            SELECT
                sessions.token_hash,
                sessions.created_at,
                sessions.expires_after_seconds,
                users.user_id,
                users.username,
                users.date_joined
            FROM
                sessions NATURAL JOIN users
            WHERE
                sessions.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(<(Session, User)>::try_from).transpose()?;
        Ok(session)
    }

    pub async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<bool> {
        let result = query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash.0.as_slice())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::DbClient;
    use quillpad_common::{
        model::{
            auth::{PasswordDigest, Session, SessionToken},
            user::{CreateUser, Username},
        },
        util::PositiveDuration,
    };
    use time::{Duration, UtcDateTime};

    #[tokio::test]
    async fn session_lifecycle() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let user_id = db
            .create_user(&CreateUser {
                username: Username::new("alice").unwrap(),
                password: PasswordDigest::from_stored("unused".to_owned()),
            })
            .await
            .unwrap();

        let token = SessionToken::generate_random(user_id);
        let token_hash = token.hash().unwrap();
        let session = Session {
            user: user_id,
            token_hash: token_hash.clone(),
            created_at: UtcDateTime::now(),
            expires_after: PositiveDuration::new(Duration::hours(12)),
        };
        db.create_session(&session).await.unwrap();

        let (fetched, user) = db.fetch_session(&token_hash).await.unwrap().unwrap();
        assert_eq!(fetched.user, user_id);
        assert_eq!(fetched.token_hash, token_hash);
        assert_eq!(fetched.expires_after, session.expires_after);
        assert_eq!(user.username.get(), "alice");

        let other_hash = SessionToken::generate_random(user_id).hash().unwrap();
        assert!(db.fetch_session(&other_hash).await.unwrap().is_none());

        assert!(db.delete_session(&token_hash).await.unwrap());
        assert!(db.fetch_session(&token_hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sessions_are_removed_with_their_user() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let user_id = db
            .create_user(&CreateUser {
                username: Username::new("bob").unwrap(),
                password: PasswordDigest::from_stored("unused".to_owned()),
            })
            .await
            .unwrap();
        let token_hash = SessionToken::generate_random(user_id).hash().unwrap();
        db.create_session(&Session {
            user: user_id,
            token_hash: token_hash.clone(),
            created_at: UtcDateTime::now(),
            expires_after: None,
        })
        .await
        .unwrap();

        db.delete_user(user_id).await.unwrap();
        assert!(db.fetch_session(&token_hash).await.unwrap().is_none());
    }
}
