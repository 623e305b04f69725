//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, post};
use crate::query::{classify_write_error, db_error, timed};
use gophersocial_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, FromQueryResult, QueryFilter, Statement, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

/// Upper bound on feed page size.
pub const MAX_FEED_LIMIT: u64 = 20;

/// Largest offset the store can bind (`BIGINT`).
pub const MAX_FEED_OFFSET: u64 = i64::MAX as u64;

/// Values for a post insert.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Complete replacement values for an optimistic update.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Feed ordering by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Validated feed filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFilter {
    pub limit: u64,
    pub offset: u64,
    pub sort: SortDirection,
    /// A post matches if any of its tags is listed. Empty disables the filter.
    pub tags: Vec<String>,
    /// Case-insensitive substring over title and content.
    pub search: Option<String>,
}

impl Default for FeedFilter {
    fn default() -> Self {
        Self {
            limit: MAX_FEED_LIMIT,
            offset: 0,
            sort: SortDirection::Desc,
            tags: Vec::new(),
            search: None,
        }
    }
}

/// A feed entry: the post plus its author's username and comment count.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize, Deserialize)]
pub struct PostWithMetadata {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub version: i32,
    pub created_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub updated_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub username: String,
    pub comments_count: i64,
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a post. The stored row starts at version 0.
    pub async fn create(&self, new_post: NewPost) -> AppResult<post::Model> {
        let model = post::ActiveModel {
            user_id: Set(new_post.user_id),
            title: Set(new_post.title),
            content: Set(new_post.content),
            tags: Set(new_post.tags),
            version: Set(0),
            ..Default::default()
        };

        timed(model.insert(self.db.as_ref()))
            .await
            .map_err(classify_write_error)
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<post::Model>> {
        timed(Post::find_by_id(id).one(self.db.as_ref()))
            .await
            .map_err(db_error)
    }

    /// Apply `changes` only if the stored version still equals `observed_version`.
    ///
    /// Returns the updated row with its version incremented by one. A missing
    /// row and a stale version are both `NotFound`.
    pub async fn update(
        &self,
        id: i64,
        observed_version: i32,
        changes: PostChanges,
    ) -> AppResult<post::Model> {
        let updated = timed(
            Post::update_many()
                .col_expr(post::Column::Title, Expr::value(changes.title))
                .col_expr(post::Column::Content, Expr::value(changes.content))
                .col_expr(post::Column::Tags, Expr::value(changes.tags))
                .col_expr(
                    post::Column::Version,
                    Expr::col(post::Column::Version).add(1),
                )
                .col_expr(post::Column::UpdatedAt, Expr::current_timestamp().into())
                .filter(post::Column::Id.eq(id))
                .filter(post::Column::Version.eq(observed_version))
                .exec_with_returning(self.db.as_ref()),
        )
        .await
        .map_err(db_error)?;

        updated.into_iter().next().ok_or_else(AppError::not_found)
    }

    /// Delete a post.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = timed(Post::delete_by_id(id).exec(self.db.as_ref()))
            .await
            .map_err(db_error)?;

        if result.rows_affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    /// Posts by the viewer and by everyone the viewer follows.
    pub async fn get_user_feed(
        &self,
        viewer_id: i64,
        filter: &FeedFilter,
    ) -> AppResult<Vec<PostWithMetadata>> {
        timed(
            PostWithMetadata::find_by_statement(feed_statement(viewer_id, filter))
                .all(self.db.as_ref()),
        )
        .await
        .map_err(db_error)
    }
}

/// Build the feed query. Only the sort keyword is interpolated, from a closed enum.
fn feed_statement(viewer_id: i64, filter: &FeedFilter) -> Statement {
    let sql = format!(
        r"
        SELECT p.id, p.user_id, p.title, p.content, p.tags, p.version,
               p.created_at, p.updated_at,
               u.username,
               COUNT(c.id) AS comments_count
        FROM posts p
        LEFT JOIN comments c ON c.post_id = p.id
        LEFT JOIN users u ON u.id = p.user_id
        WHERE (
                p.user_id = $1
                OR p.user_id IN (SELECT f.user_id FROM followers f WHERE f.follower_id = $1)
              )
          AND ($2::text = '' OR p.title ILIKE $2 OR p.content ILIKE $2)
          AND (cardinality($3::varchar[]) = 0 OR p.tags && $3::varchar[])
        GROUP BY p.id, u.username
        ORDER BY p.created_at {sort}, p.id DESC
        LIMIT $4 OFFSET $5
        ",
        sort = filter.sort.as_sql()
    );

    let pattern = filter
        .search
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)))
        .unwrap_or_default();

    Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        sql,
        [
            viewer_id.into(),
            pattern.into(),
            filter.tags.clone().into(),
            (filter.limit.min(MAX_FEED_LIMIT) as i64).into(),
            (filter.offset.min(MAX_FEED_OFFSET) as i64).into(),
        ],
    )
}

/// Escape LIKE metacharacters so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn create_test_post(id: i64, version: i32) -> post::Model {
        post::Model {
            id,
            user_id: 1,
            title: "Hello".to_string(),
            content: "World".to_string(),
            tags: vec!["rust".to_string(), "rust".to_string()],
            version,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn changes() -> PostChanges {
        PostChanges {
            title: "New".to_string(),
            content: "Body".to_string(),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_keeps_tag_order_and_duplicates() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post(1, 0)]])
            .into_connection();
        let repo = PostRepository::new(Arc::new(db));

        let post = repo
            .create(NewPost {
                user_id: 1,
                title: "Hello".to_string(),
                content: "World".to_string(),
                tags: vec!["rust".to_string(), "rust".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(post.version, 0);
        assert_eq!(post.tags, vec!["rust", "rust"]);
    }

    #[tokio::test]
    async fn test_update_returns_incremented_version() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post(42, 4)]])
            .into_connection();
        let repo = PostRepository::new(Arc::new(db));

        let post = repo.update(42, 3, changes()).await.unwrap();
        assert_eq!(post.version, 4);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new()])
            .into_connection();
        let repo = PostRepository::new(Arc::new(db));

        let result = repo.update(42, 3, changes()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let repo = PostRepository::new(Arc::new(db));

        assert!(matches!(repo.delete(7).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_user_feed_maps_rows() {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let row = BTreeMap::from([
            ("id", Value::BigInt(Some(5))),
            ("user_id", Value::BigInt(Some(2))),
            ("title", Value::String(Some(Box::new("t".to_string())))),
            ("content", Value::String(Some(Box::new("c".to_string())))),
            ("tags", vec!["t1".to_string()].into()),
            ("version", Value::Int(Some(0))),
            ("created_at", now.into()),
            ("updated_at", now.into()),
            ("username", Value::String(Some(Box::new("bob".to_string())))),
            ("comments_count", Value::BigInt(Some(3))),
        ]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row]])
            .into_connection();
        let repo = PostRepository::new(Arc::new(db));

        let feed = repo.get_user_feed(1, &FeedFilter::default()).await.unwrap();

        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].username, "bob");
        assert_eq!(feed[0].comments_count, 3);
        assert_eq!(feed[0].tags, vec!["t1"]);
    }

    #[test]
    fn test_feed_statement_sort_direction() {
        let desc = feed_statement(1, &FeedFilter::default());
        assert!(desc.sql.contains("ORDER BY p.created_at DESC, p.id DESC"));

        let asc = feed_statement(
            1,
            &FeedFilter {
                sort: SortDirection::Asc,
                ..FeedFilter::default()
            },
        );
        assert!(asc.sql.contains("ORDER BY p.created_at ASC, p.id DESC"));
    }

    #[test]
    fn test_feed_statement_binds_filters() {
        let stmt = feed_statement(
            9,
            &FeedFilter {
                limit: 500,
                offset: 40,
                sort: SortDirection::Desc,
                tags: vec!["t1".to_string()],
                search: Some("50%_off".to_string()),
            },
        );
        let values = stmt.values.unwrap().0;

        assert_eq!(values[0], Value::BigInt(Some(9)));
        assert_eq!(
            values[1],
            Value::String(Some(Box::new(r"%50\%\_off%".to_string())))
        );
        assert_eq!(values[3], Value::BigInt(Some(20)));
        assert_eq!(values[4], Value::BigInt(Some(40)));
    }

    #[test]
    fn test_offset_never_binds_negative() {
        let stmt = feed_statement(
            1,
            &FeedFilter {
                offset: u64::MAX,
                ..FeedFilter::default()
            },
        );
        let values = stmt.values.unwrap().0;
        assert_eq!(values[4], Value::BigInt(Some(i64::MAX)));
    }

    #[test]
    fn test_empty_search_disables_filter() {
        let stmt = feed_statement(
            1,
            &FeedFilter {
                search: Some(String::new()),
                ..FeedFilter::default()
            },
        );
        let values = stmt.values.unwrap().0;
        assert_eq!(values[1], Value::String(Some(Box::new(String::new()))));
    }
}
