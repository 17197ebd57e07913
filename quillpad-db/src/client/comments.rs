use crate::{
    client::{DbClient, Result},
    record::{CommentRecord, like_pattern, to_primitive},
};
use quillpad_common::model::{
    Id,
    comment::{Comment, CommentMarker, CreateComment},
    post::PostMarker,
};
use sqlx::{query, query_as, query_scalar};
use time::UtcDateTime;

const SELECT_COMMENTS: &str = "
    SELECT
        comments.comment_id,
        comments.post_id,
        comments.author,
        comments.body,
        comments.created_on,
        users.user_id,
        users.username,
        users.date_joined
    FROM
        comments LEFT JOIN users ON comments.user_id = users.user_id
";

impl DbClient {
    /// Comments on a post, oldest first.
    pub async fn list_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(&format!(
            "{SELECT_COMMENTS}
            WHERE
                comments.post_id = $1
            ORDER BY
                comments.created_on,
                comments.comment_id"
        ))
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    pub async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let record = query_as::<_, CommentRecord>(&format!(
            "{SELECT_COMMENTS} WHERE comments.comment_id = $1"
        ))
        .bind(comment_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }

    /// Comments whose body, legacy author name or account username contains
    /// `search`, newest first.
    pub async fn search_comments(&self, search: &str) -> Result<Vec<Comment>> {
        let pattern = like_pattern(search);
        let records = query_as::<_, CommentRecord>(&format!(
            "{SELECT_COMMENTS}
            WHERE
                comments.body LIKE $1 ESCAPE '\\'
                OR comments.author LIKE $1 ESCAPE '\\'
                OR users.username LIKE $1 ESCAPE '\\'
            ORDER BY
                comments.created_on DESC,
                comments.comment_id DESC"
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    pub async fn create_comment(&self, comment: &CreateComment) -> Result<Id<CommentMarker>> {
        let comment_id = query_scalar::<_, i64>(
            "
            INSERT INTO comments (post_id, user_id, body, created_on)
            VALUES ($1, $2, $3, $4)
            RETURNING comment_id
            ",
        )
        .bind(comment.post.get())
        .bind(comment.user.get())
        .bind(&comment.body)
        .bind(to_primitive(UtcDateTime::now()))
        .fetch_one(&self.pool)
        .await?;

        Ok(comment_id.into())
    }

    /// Replaces the body, keeping author and creation time. Returns whether the
    /// comment existed.
    pub async fn update_comment(&self, comment_id: Id<CommentMarker>, body: &str) -> Result<bool> {
        let result = query("UPDATE comments SET body = $1 WHERE comment_id = $2")
            .bind(body)
            .bind(comment_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool> {
        let result = query("DELETE FROM comments WHERE comment_id = $1")
            .bind(comment_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{client::DbClient, record::to_primitive};
    use quillpad_common::model::{
        Id,
        auth::PasswordDigest,
        comment::CreateComment,
        post::{PostContent, PostMarker, PostTitle},
        user::{CreateUser, UserMarker, Username},
    };
    use sqlx::query;
    use time::UtcDateTime;

    async fn setup() -> (DbClient, Id<PostMarker>, Id<UserMarker>) {
        let db = DbClient::connect_in_memory().await.unwrap();
        let post = db
            .create_post(&PostContent {
                title: PostTitle::new("Hello").unwrap(),
                body: "World".to_owned(),
                categories: Vec::new(),
            })
            .await
            .unwrap();
        let user = db
            .create_user(&CreateUser {
                username: Username::new("alice").unwrap(),
                password: PasswordDigest::from_stored("unused".to_owned()),
            })
            .await
            .unwrap();

        (db, post, user)
    }

    #[tokio::test]
    async fn comments_belong_to_post_and_user() {
        let (db, post, user) = setup().await;

        let first = db
            .create_comment(&CreateComment {
                post,
                user,
                body: "First!".to_owned(),
            })
            .await
            .unwrap();
        let second = db
            .create_comment(&CreateComment {
                post,
                user,
                body: "Second".to_owned(),
            })
            .await
            .unwrap();

        let comments = db.list_post_comments(post).await.unwrap();
        let ids: Vec<_> = comments.iter().map(|comment| comment.id).collect();
        assert_eq!(ids, [first, second]);
        assert_eq!(comments[0].display_author(), "alice");
        assert_eq!(comments[0].post, post);

        assert!(db.delete_comment(first).await.unwrap());
        assert_eq!(db.list_post_comments(post).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn editing_a_comment_keeps_its_author() {
        let (db, post, user) = setup().await;
        let comment_id = db
            .create_comment(&CreateComment {
                post,
                user,
                body: "Frist".to_owned(),
            })
            .await
            .unwrap();
        let original = db.fetch_comment(comment_id).await.unwrap().unwrap();

        assert!(db.update_comment(comment_id, "First").await.unwrap());

        let edited = db.fetch_comment(comment_id).await.unwrap().unwrap();
        assert_eq!(edited.body, "First");
        assert_eq!(edited.display_author(), "alice");
        assert_eq!(edited.created_on, original.created_on);

        assert!(!db.update_comment(Id::new(404), "x").await.unwrap());
        assert!(db.fetch_comment(Id::new(404)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_post_deletes_its_comments() {
        let (db, post, user) = setup().await;
        db.create_comment(&CreateComment {
            post,
            user,
            body: "Bye".to_owned(),
        })
        .await
        .unwrap();

        assert!(db.delete_post(post).await.unwrap());

        assert!(db.list_post_comments(post).await.unwrap().is_empty());
        assert!(db.search_comments("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_user_keeps_comments_without_account() {
        let (db, post, user) = setup().await;
        db.create_comment(&CreateComment {
            post,
            user,
            body: "Still here".to_owned(),
        })
        .await
        .unwrap();

        assert!(db.delete_user(user).await.unwrap());

        let comments = db.list_post_comments(post).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].user.is_none());
        assert_eq!(comments[0].body, "Still here");
    }

    #[tokio::test]
    async fn legacy_comments_show_their_author_and_are_searchable() {
        let (db, post, _) = setup().await;
        query(
            "
            INSERT INTO comments (post_id, author, body, created_on)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(post.get())
        .bind("Old Timer")
        .bind("Written long ago")
        .bind(to_primitive(UtcDateTime::now()))
        .execute(&db.pool)
        .await
        .unwrap();

        let comments = db.search_comments("old timer").await.unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].user.is_none());
        assert_eq!(comments[0].display_author(), "Old Timer");

        assert_eq!(db.search_comments("alice").await.unwrap().len(), 0);
    }
}
