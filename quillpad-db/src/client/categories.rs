use crate::{
    client::{DbClient, Result},
    record::{CategoryRecord, like_pattern},
};
use quillpad_common::model::{
    Id,
    category::{Category, CategoryMarker, CategoryName},
};
use sqlx::{query, query_as, query_scalar};

impl DbClient {
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let records = query_as::<_, CategoryRecord>(
            "
            SELECT
                categories.category_id,
                categories.name
            FROM
                categories
            ORDER BY
                categories.name COLLATE NOCASE,
                categories.category_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let categories = records
            .into_iter()
            .map(Category::try_from)
            .collect::<Result<_, _>>()?;
        Ok(categories)
    }

    pub async fn fetch_category(
        &self,
        category_id: Id<CategoryMarker>,
    ) -> Result<Option<Category>> {
        let record = query_as::<_, CategoryRecord>(
            "
            SELECT
                categories.category_id,
                categories.name
            FROM
                categories
            WHERE
                categories.category_id = $1
            ",
        )
        .bind(category_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let category = record.map(Category::try_from).transpose()?;
        Ok(category)
    }

    /// Categories whose name contains `search`, ordered like
    /// [`DbClient::list_categories`].
    pub async fn search_categories(&self, search: &str) -> Result<Vec<Category>> {
        let records = query_as::<_, CategoryRecord>(
            "
            SELECT
                categories.category_id,
                categories.name
            FROM
                categories
            WHERE
                categories.name LIKE $1 ESCAPE '\\'
            ORDER BY
                categories.name COLLATE NOCASE,
                categories.category_id
            ",
        )
        .bind(like_pattern(search))
        .fetch_all(&self.pool)
        .await?;

        let categories = records
            .into_iter()
            .map(Category::try_from)
            .collect::<Result<_, _>>()?;
        Ok(categories)
    }

    pub async fn create_category(&self, name: &CategoryName) -> Result<Id<CategoryMarker>> {
        let category_id = query_scalar::<_, i64>(
            "
            INSERT INTO categories (name)
            VALUES ($1)
            RETURNING category_id
            ",
        )
        .bind(name.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(category_id.into())
    }

    /// Returns whether the category existed.
    pub async fn update_category(
        &self,
        category_id: Id<CategoryMarker>,
        name: &CategoryName,
    ) -> Result<bool> {
        let result = query("UPDATE categories SET name = $1 WHERE category_id = $2")
            .bind(name.get())
            .bind(category_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Posts lose the category; they are not deleted. Returns whether the
    /// category existed.
    pub async fn delete_category(&self, category_id: Id<CategoryMarker>) -> Result<bool> {
        let result = query("DELETE FROM categories WHERE category_id = $1")
            .bind(category_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::DbClient;
    use quillpad_common::model::{
        Id,
        category::{Category, CategoryName},
        post::{PostContent, PostTitle},
    };

    #[tokio::test]
    async fn categories_are_listed_by_name() {
        let db = DbClient::connect_in_memory().await.unwrap();

        for name in ["tech", "Art", "life"] {
            db.create_category(&CategoryName::new(name).unwrap())
                .await
                .unwrap();
        }

        let names: Vec<_> = db
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|category| category.name.get().to_owned())
            .collect();
        assert_eq!(names, ["Art", "life", "tech"]);
    }

    #[tokio::test]
    async fn categories_are_searched_by_name() {
        let db = DbClient::connect_in_memory().await.unwrap();

        for name in ["Rust", "rustaceans", "Gardening", "100%"] {
            db.create_category(&CategoryName::new(name).unwrap())
                .await
                .unwrap();
        }

        let names = |categories: Vec<Category>| -> Vec<String> {
            categories
                .into_iter()
                .map(|category| category.name.get().to_owned())
                .collect()
        };
        assert_eq!(
            names(db.search_categories("RUST").await.unwrap()),
            ["Rust", "rustaceans"]
        );
        assert_eq!(names(db.search_categories("0%").await.unwrap()), ["100%"]);
        assert_eq!(db.search_categories("").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn renaming_a_category() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let tech = db
            .create_category(&CategoryName::new("Tech").unwrap())
            .await
            .unwrap();

        let renamed = CategoryName::new("Technology").unwrap();
        assert!(db.update_category(tech, &renamed).await.unwrap());
        assert_eq!(
            db.fetch_category(tech).await.unwrap().unwrap().name,
            renamed
        );

        assert!(!db.update_category(Id::new(404), &renamed).await.unwrap());
        assert!(db.fetch_category(Id::new(404)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_category_keeps_its_posts() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let tech = db
            .create_category(&CategoryName::new("Tech").unwrap())
            .await
            .unwrap();
        let post_id = db
            .create_post(&PostContent {
                title: PostTitle::new("Hello").unwrap(),
                body: "World".to_owned(),
                categories: vec![tech],
            })
            .await
            .unwrap();

        assert!(db.delete_category(tech).await.unwrap());
        assert!(!db.delete_category(tech).await.unwrap());

        let post = db.fetch_post(post_id).await.unwrap().unwrap();
        assert!(post.categories.is_empty());
    }
}
