//! Post service: authoring, optimistic edits and the feed.

use gophersocial_common::{AppError, AppResult};
use gophersocial_db::entities::post;
use gophersocial_db::repositories::{
    CommentRepository, CommentWithAuthor, FeedFilter, MAX_FEED_LIMIT, MAX_FEED_OFFSET, NewPost,
    PostChanges, PostRepository, PostWithMetadata, SortDirection,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

/// Most tags accepted in a feed filter.
pub const MAX_FEED_TAGS: usize = 5;

/// Input for creating a post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 100))]
    pub title: String,

    #[validate(length(min = 1, max = 1000))]
    pub content: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update of a post. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePostInput {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 1000))]
    pub content: Option<String>,

    pub tags: Option<Vec<String>>,

    /// Version the client last saw. Defaults to the version of the loaded post.
    pub version: Option<i32>,
}

/// Raw feed query parameters.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PaginatedFeedQuery {
    #[validate(range(min = 1, max = 20))]
    pub limit: Option<u64>,

    #[validate(range(max = MAX_FEED_OFFSET))]
    pub offset: Option<u64>,

    pub sort: Option<SortDirection>,

    /// Comma-separated tag list.
    pub tags: Option<String>,

    #[validate(length(max = 100))]
    pub search: Option<String>,
}

impl PaginatedFeedQuery {
    /// Validate and apply defaults.
    pub fn into_filter(self) -> AppResult<FeedFilter> {
        self.validate()?;

        let tags: Vec<String> = self
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(ToString::to_string)
            .collect();
        if tags.len() > MAX_FEED_TAGS {
            return Err(AppError::Validation(format!(
                "tags: at most {MAX_FEED_TAGS} tags are allowed"
            )));
        }

        Ok(FeedFilter {
            limit: self.limit.unwrap_or(MAX_FEED_LIMIT),
            offset: self.offset.unwrap_or(0),
            sort: self.sort.unwrap_or_default(),
            tags,
            search: self.search.filter(|s| !s.is_empty()),
        })
    }
}

/// A post with its comments in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: post::Model,
    pub comments: Vec<CommentWithAuthor>,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    posts: PostRepository,
    comments: CommentRepository,
}

impl PostService {
    #[must_use]
    pub const fn new(posts: PostRepository, comments: CommentRepository) -> Self {
        Self { posts, comments }
    }

    /// Create a post authored by `user_id`.
    pub async fn create(&self, user_id: i64, input: CreatePostInput) -> AppResult<post::Model> {
        input.validate()?;

        self.posts
            .create(NewPost {
                user_id,
                title: input.title,
                content: input.content,
                tags: input.tags,
            })
            .await
    }

    /// Load a post and its comments.
    pub async fn get_with_comments(&self, post_id: i64) -> AppResult<PostWithComments> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("post not found".to_string()))?;
        let comments = self.comments.get_by_post_id(post_id).await?;

        Ok(PostWithComments { post, comments })
    }

    /// Apply `input` on top of `current`, guarded by the observed version.
    ///
    /// A stale version is `NotFound`, same as a vanished post.
    pub async fn update(
        &self,
        current: &post::Model,
        input: UpdatePostInput,
    ) -> AppResult<post::Model> {
        input.validate()?;

        let observed_version = input.version.unwrap_or(current.version);
        let changes = PostChanges {
            title: input.title.unwrap_or_else(|| current.title.clone()),
            content: input.content.unwrap_or_else(|| current.content.clone()),
            tags: input.tags.unwrap_or_else(|| current.tags.clone()),
        };

        let updated = self
            .posts
            .update(current.id, observed_version, changes)
            .await?;
        debug!(post_id = updated.id, version = updated.version, "Post updated");
        Ok(updated)
    }

    /// Delete a post.
    pub async fn delete(&self, post_id: i64) -> AppResult<()> {
        self.posts.delete(post_id).await
    }

    /// The viewer's feed.
    pub async fn feed(
        &self,
        viewer_id: i64,
        query: PaginatedFeedQuery,
    ) -> AppResult<Vec<PostWithMetadata>> {
        let filter = query.into_filter()?;
        self.posts.get_user_feed(viewer_id, &filter).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gophersocial_db::entities::{comment, user};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

    fn create_test_post(id: i64, user_id: i64, version: i32) -> post::Model {
        post::Model {
            id,
            user_id,
            title: "title".to_string(),
            content: "content".to_string(),
            tags: vec!["rust".to_string()],
            version,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn service(db: DatabaseConnection) -> PostService {
        let db = Arc::new(db);
        PostService::new(
            PostRepository::new(Arc::clone(&db)),
            CommentRepository::new(db),
        )
    }

    #[test]
    fn test_feed_query_defaults() {
        let filter = PaginatedFeedQuery::default().into_filter().unwrap();
        assert_eq!(filter, FeedFilter::default());
    }

    #[test]
    fn test_feed_query_parses_tags() {
        let filter = PaginatedFeedQuery {
            tags: Some("go, rust,,sql".to_string()),
            sort: Some(SortDirection::Asc),
            ..Default::default()
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.tags, vec!["go", "rust", "sql"]);
        assert_eq!(filter.sort, SortDirection::Asc);
    }

    #[test]
    fn test_feed_query_rejects_out_of_range() {
        for query in [
            PaginatedFeedQuery {
                limit: Some(0),
                ..Default::default()
            },
            PaginatedFeedQuery {
                limit: Some(MAX_FEED_LIMIT + 1),
                ..Default::default()
            },
            PaginatedFeedQuery {
                tags: Some("a,b,c,d,e,f".to_string()),
                ..Default::default()
            },
            PaginatedFeedQuery {
                search: Some("x".repeat(101)),
                ..Default::default()
            },
            PaginatedFeedQuery {
                offset: Some(MAX_FEED_OFFSET + 1),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                query.into_filter(),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_feed_query_accepts_largest_offset() {
        let filter = PaginatedFeedQuery {
            offset: Some(MAX_FEED_OFFSET),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.offset, MAX_FEED_OFFSET);
    }

    #[test]
    fn test_empty_search_disables_filter() {
        let filter = PaginatedFeedQuery {
            search: Some(String::new()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.search, None);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let result = service
            .create(
                1,
                CreatePostInput {
                    title: "x".repeat(101),
                    content: "content".to_string(),
                    tags: vec![],
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_with_comments() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post(1, 1, 0)]])
            .append_query_results([Vec::<(comment::Model, user::Model)>::new()])
            .into_connection();

        let loaded = service(db).get_with_comments(1).await.unwrap();
        assert_eq!(loaded.post.id, 1);
        assert!(loaded.comments.is_empty());

        let json = serde_json::to_value(&loaded).unwrap();
        assert_eq!(json["title"], "title");
        assert!(json["comments"].is_array());
    }

    #[tokio::test]
    async fn test_get_missing_post() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new()])
            .into_connection();

        assert!(matches!(
            service(db).get_with_comments(9).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let current = create_test_post(1, 1, 3);
        let mut updated = current.clone();
        updated.title = "new title".to_string();
        updated.version = 4;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[updated]])
            .into_connection();

        let result = service(db)
            .update(
                &current,
                UpdatePostInput {
                    title: Some("new title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.title, "new title");
        assert_eq!(result.version, 4);
        assert_eq!(result.tags, current.tags);
    }

    #[tokio::test]
    async fn test_update_stale_version_is_not_found() {
        let current = create_test_post(1, 1, 4);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new()])
            .into_connection();

        let result = service(db)
            .update(
                &current,
                UpdatePostInput {
                    version: Some(3),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
