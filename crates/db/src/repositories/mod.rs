//! Database repositories.

mod comment;
mod follower;
mod post;
mod role;
mod user;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use comment::{CommentAuthor, CommentRepository, CommentWithAuthor, NewComment};
pub use follower::FollowerRepository;
pub use post::{
    FeedFilter, NewPost, PostChanges, PostRepository, PostWithMetadata, SortDirection,
    MAX_FEED_LIMIT, MAX_FEED_OFFSET,
};
pub use role::RoleRepository;
pub use user::{NewUser, UserRepository, UserWithRole};

/// Storage facade grouping every repository over one shared pool.
#[derive(Clone)]
pub struct Storage {
    pub users: UserRepository,
    pub posts: PostRepository,
    pub comments: CommentRepository,
    pub followers: FollowerRepository,
    pub roles: RoleRepository,
}

impl Storage {
    /// Build all repositories on the same connection pool.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            users: UserRepository::new(Arc::clone(&db)),
            posts: PostRepository::new(Arc::clone(&db)),
            comments: CommentRepository::new(Arc::clone(&db)),
            followers: FollowerRepository::new(Arc::clone(&db)),
            roles: RoleRepository::new(db),
        }
    }
}
