use crate::{
    client::{DbClient, Result},
    record::{PostCategoryRecord, PostRecord, like_pattern, to_primitive},
};
use quillpad_common::model::{
    Id,
    category::Category,
    category::CategoryMarker,
    post::{Post, PostContent, PostMarker},
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, query, query_as, query_scalar};
use std::collections::HashMap;
use time::UtcDateTime;
use tracing::debug;

const SELECT_POSTS: &str = "
    SELECT
        posts.post_id,
        posts.title,
        posts.body,
        posts.created_on,
        posts.last_modified
    FROM
        posts
";

const ORDER_NEWEST_FIRST: &str = "
    ORDER BY
        posts.created_on DESC,
        posts.post_id DESC
";

impl DbClient {
    /// All posts, newest first.
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(&format!("{SELECT_POSTS} {ORDER_NEWEST_FIRST}"))
            .fetch_all(&self.pool)
            .await?;

        self.attach_categories(records).await
    }

    pub async fn count_posts(&self) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let Some(record) =
            query_as::<_, PostRecord>(&format!("{SELECT_POSTS} WHERE posts.post_id = $1"))
                .bind(post_id.get())
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let categories = query_as::<_, PostCategoryRecord>(
            "
            SELECT
                post_categories.post_id,
                categories.category_id,
                categories.name
            FROM
                post_categories NATURAL JOIN categories
            WHERE
                post_categories.post_id = $1
            ORDER BY
                categories.name COLLATE NOCASE
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Category::try_from)
        .collect::<Result<_, _>>()?;

        Ok(Some(record.into_post(categories)?))
    }

    /// Posts tagged with a category whose name equals `name` ignoring case,
    /// newest first.
    pub async fn list_posts_by_category(&self, name: &str) -> Result<Vec<Post>> {
        let category_ids: Vec<i64> = self
            .list_categories()
            .await?
            .into_iter()
            .filter(|category| category.name.matches_ignore_case(name))
            .map(|category| category.id.get())
            .collect();

        if category_ids.is_empty() {
            debug!(name, "No category matches");
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_POSTS);
        builder.push(
            "
            WHERE posts.post_id IN (
                SELECT post_categories.post_id
                FROM post_categories
                WHERE post_categories.category_id IN (",
        );
        let mut separated = builder.separated(", ");
        for category_id in category_ids {
            separated.push_bind(category_id);
        }
        separated.push_unseparated("))");
        builder.push(ORDER_NEWEST_FIRST);

        let records = builder
            .build_query_as::<PostRecord>()
            .fetch_all(&self.pool)
            .await?;

        self.attach_categories(records).await
    }

    /// Posts whose title or body contains `search`, newest first. An empty
    /// search matches every post. With a `category`, only posts tagged with it
    /// are returned.
    pub async fn search_posts(
        &self,
        search: &str,
        category: Option<Id<CategoryMarker>>,
    ) -> Result<Vec<Post>> {
        let pattern = like_pattern(search);

        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_POSTS);
        builder
            .push(" WHERE (posts.title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR posts.body LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");

        if let Some(category_id) = category {
            builder
                .push(
                    " AND posts.post_id IN (
                        SELECT post_categories.post_id
                        FROM post_categories
                        WHERE post_categories.category_id = ",
                )
                .push_bind(category_id.get())
                .push(")");
        }
        builder.push(ORDER_NEWEST_FIRST);

        let records = builder
            .build_query_as::<PostRecord>()
            .fetch_all(&self.pool)
            .await?;

        self.attach_categories(records).await
    }

    pub async fn create_post(&self, post: &PostContent) -> Result<Id<PostMarker>> {
        let now = to_primitive(UtcDateTime::now());
        let mut transaction = self.pool.begin().await?;

        let post_id = query_scalar::<_, i64>(
            "
            INSERT INTO posts (title, body, created_on, last_modified)
            VALUES ($1, $2, $3, $3)
            RETURNING post_id
            ",
        )
        .bind(post.title.get())
        .bind(&post.body)
        .bind(now)
        .fetch_one(&mut *transaction)
        .await?;

        replace_post_categories(&mut transaction, post_id, post).await?;
        transaction.commit().await?;

        debug!(post_id, "Created post");
        Ok(post_id.into())
    }

    /// Replaces title, body and categories and bumps `last_modified`.
    /// Returns `None` if the post does not exist.
    pub async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        post: &PostContent,
    ) -> Result<Option<Post>> {
        let mut transaction = self.pool.begin().await?;

        // Writing first takes the write lock up front. last_modified never
        // moves backwards, even if the clock does.
        let result = query(
            "
            UPDATE posts
            SET title = $1, body = $2, last_modified = MAX($3, last_modified)
            WHERE post_id = $4
            ",
        )
        .bind(post.title.get())
        .bind(&post.body)
        .bind(to_primitive(UtcDateTime::now()))
        .bind(post_id.get())
        .execute(&mut *transaction)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        replace_post_categories(&mut transaction, post_id.get(), post).await?;
        transaction.commit().await?;

        debug!(%post_id, "Updated post");
        self.fetch_post(post_id).await
    }

    /// Comments and category links go with the post. Returns whether the post
    /// existed.
    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn attach_categories(&self, records: Vec<PostRecord>) -> Result<Vec<Post>> {
        let mut categories_by_post: HashMap<i64, Vec<Category>> = HashMap::new();

        let category_records = query_as::<_, PostCategoryRecord>(
            "
            SELECT
                post_categories.post_id,
                categories.category_id,
                categories.name
            FROM
                post_categories NATURAL JOIN categories
            ORDER BY
                categories.name COLLATE NOCASE
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        for record in category_records {
            categories_by_post
                .entry(record.post_id)
                .or_default()
                .push(Category::try_from(record)?);
        }

        let posts = records
            .into_iter()
            .map(|record| {
                let categories = categories_by_post
                    .remove(&record.post_id)
                    .unwrap_or_default();
                record.into_post(categories)
            })
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }
}

async fn replace_post_categories(
    connection: &mut SqliteConnection,
    post_id: i64,
    post: &PostContent,
) -> Result<()> {
    query("DELETE FROM post_categories WHERE post_id = $1")
        .bind(post_id)
        .execute(&mut *connection)
        .await?;

    for category_id in &post.categories {
        query(
            "
            INSERT INTO post_categories (post_id, category_id)
            VALUES ($1, $2)
            ",
        )
        .bind(post_id)
        .bind(category_id.get())
        .execute(&mut *connection)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{client::DbClient, record::to_primitive};
    use quillpad_common::model::{
        Id,
        category::{CategoryMarker, CategoryName},
        post::{PostContent, PostTitle},
    };
    use std::time::Duration;
    use time::UtcDateTime;

    fn content(title: &str, body: &str, categories: Vec<Id<CategoryMarker>>) -> PostContent {
        PostContent {
            title: PostTitle::new(title).unwrap(),
            body: body.to_owned(),
            categories,
        }
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first() {
        let db = DbClient::connect_in_memory().await.unwrap();

        let first = db.create_post(&content("First", "a", vec![])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = db.create_post(&content("Second", "b", vec![])).await.unwrap();

        let ids: Vec<_> = db
            .list_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(ids, [second, first]);
        assert_eq!(db.count_posts().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_post_is_none() {
        let db = DbClient::connect_in_memory().await.unwrap();

        assert!(db.fetch_post(Id::new(404)).await.unwrap().is_none());
        assert!(
            db.update_post(Id::new(404), &content("x", "y", vec![]))
                .await
                .unwrap()
                .is_none()
        );
        assert!(!db.delete_post(Id::new(404)).await.unwrap());
    }

    #[tokio::test]
    async fn editing_updates_body_and_last_modified() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let tech = db
            .create_category(&CategoryName::new("Tech").unwrap())
            .await
            .unwrap();
        let life = db
            .create_category(&CategoryName::new("Life").unwrap())
            .await
            .unwrap();

        let post_id = db
            .create_post(&content("Hello", "Hi", vec![tech]))
            .await
            .unwrap();
        let created = db.fetch_post(post_id).await.unwrap().unwrap();
        assert_eq!(created.created_on, created.last_modified);

        tokio::time::sleep(Duration::from_millis(2)).await;
        let edited = db
            .update_post(post_id, &content("Hello", "World", vec![life]))
            .await
            .unwrap()
            .unwrap();

        let fetched = db.fetch_post(post_id).await.unwrap().unwrap();
        assert_eq!(fetched, edited);
        assert_eq!(fetched.body, "World");
        assert_eq!(fetched.created_on, created.created_on);
        assert!(fetched.last_modified > fetched.created_on);
        assert_eq!(fetched.category_ids(), [life]);
    }

    #[tokio::test]
    async fn category_filter_ignores_case() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let tech = db
            .create_category(&CategoryName::new("Tech").unwrap())
            .await
            .unwrap();
        let also_tech = db
            .create_category(&CategoryName::new("TECH").unwrap())
            .await
            .unwrap();
        let life = db
            .create_category(&CategoryName::new("Life").unwrap())
            .await
            .unwrap();

        let both = db
            .create_post(&content("Both", "x", vec![tech, also_tech]))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let tech_only = db.create_post(&content("Tech", "x", vec![tech])).await.unwrap();
        db.create_post(&content("Life", "x", vec![life])).await.unwrap();

        let upper = db.list_posts_by_category("Tech").await.unwrap();
        let lower = db.list_posts_by_category("tech").await.unwrap();
        assert_eq!(upper, lower);

        let ids: Vec<_> = lower.iter().map(|post| post.id).collect();
        assert_eq!(ids, [tech_only, both]);

        assert!(db.list_posts_by_category("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_matches_title_and_body_literally() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let rust = db
            .create_post(&content("Learning Rust", "ownership", vec![]))
            .await
            .unwrap();
        let percent = db
            .create_post(&content("Numbers", "100% done", vec![]))
            .await
            .unwrap();

        let found: Vec<_> = db
            .search_posts("rust", None)
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(found, [rust]);

        let found: Vec<_> = db
            .search_posts("0%", None)
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(found, [percent]);

        assert_eq!(db.search_posts("", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn search_filters_by_category() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let tech = db
            .create_category(&CategoryName::new("Tech").unwrap())
            .await
            .unwrap();
        let life = db
            .create_category(&CategoryName::new("Life").unwrap())
            .await
            .unwrap();

        let tagged = db
            .create_post(&content("Rust", "x", vec![tech, life]))
            .await
            .unwrap();
        db.create_post(&content("Rust again", "x", vec![life]))
            .await
            .unwrap();

        let found: Vec<_> = db
            .search_posts("rust", Some(tech))
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(found, [tagged]);

        assert_eq!(db.search_posts("", Some(life)).await.unwrap().len(), 2);
        assert!(db.search_posts("", Some(Id::new(404))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn editing_never_moves_last_modified_backwards() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let post_id = db.create_post(&content("Hello", "Hi", vec![])).await.unwrap();

        let future = to_primitive(UtcDateTime::now() + time::Duration::days(365));
        sqlx::query("UPDATE posts SET last_modified = $1 WHERE post_id = $2")
            .bind(future)
            .bind(post_id.get())
            .execute(&db.pool)
            .await
            .unwrap();

        let edited = db
            .update_post(post_id, &content("Hello", "World", vec![]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.body, "World");
        assert_eq!(to_primitive(edited.last_modified), future);
    }
}
