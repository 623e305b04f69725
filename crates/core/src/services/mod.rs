//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod cache;
pub mod comment;
pub mod following;
pub mod mailer;
pub mod post;
pub mod registration;
pub mod role;
pub mod user;

pub use auth::{Claims, JwtAuthenticator};
pub use cache::{RedisUserCache, USER_CACHE_TTL, UserCache, cache_key};
pub use comment::{CommentService, CreateCommentInput};
pub use following::FollowingService;
pub use mailer::{MailMessage, MailTransport, Mailer, SendGridTransport};
pub use post::{CreatePostInput, PaginatedFeedQuery, PostService, PostWithComments, UpdatePostInput};
pub use registration::{RegisterUserInput, RegistrationService};
pub use role::RoleService;
pub use user::{UserService, hash_password, verify_password};
