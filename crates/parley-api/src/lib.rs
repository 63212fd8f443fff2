pub mod admin;
pub mod analytics;
pub mod chat;
pub mod client;
pub mod error;
pub mod moderation;
pub mod notifications;
pub mod private;
pub mod session;

pub use admin::Paged;
pub use chat::{ChatApi, MessagePage, OutgoingMessage, PageOrder};
pub use client::HttpApi;
pub use error::{ApiError, ApiResult};
pub use session::{Session, SessionHandle};
