use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alias the server substitutes for the author of every message once that
/// author has been banned.
pub const BANNED_ALIAS: &str = "[User Telah Dibanned]";

/// Opaque server-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque server-assigned user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Moderators, admins and super-admins.
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        };
        f.write_str(name)
    }
}

/// Delivery state of a private-thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: Option<UserId>,
    pub alias: String,
    pub role: Role,
}

/// Reply target as captured when the reply was sent. Never re-resolved, so
/// it keeps showing the original alias/snippet after edits or deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub message_id: Option<MessageId>,
    pub author_alias: String,
    pub snippet: String,
}

/// A chat message from either the public room or a private thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: AuthorRef,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub reply_to: Option<ReplyRef>,
    pub is_deleted: bool,
    pub author_is_banned: bool,
    /// Only set for private-thread messages.
    pub status: Option<DeliveryStatus>,
    pub mentions: Vec<UserId>,
    /// Receiving side of a private message.
    pub recipient: Option<UserId>,
}

impl Message {
    pub fn is_from(&self, user_id: &UserId) -> bool {
        self.author.id.as_ref() == Some(user_id)
    }

    pub fn mentions_user(&self, user_id: &UserId) -> bool {
        self.mentions.contains(user_id)
    }
}

/// Identity of one conversation: the public room, or the private thread
/// owned by a (non-staff) user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationId {
    Public,
    Private(UserId),
}

impl ConversationId {
    pub fn is_public(&self) -> bool {
        matches!(self, ConversationId::Public)
    }

    /// Owner of a private thread.
    pub fn thread_owner(&self) -> Option<&UserId> {
        match self {
            ConversationId::Public => None,
            ConversationId::Private(owner) => Some(owner),
        }
    }

    /// Whether a private message between `from` and `to` belongs to this
    /// thread. Either endpoint may be the owner.
    pub fn owns_private(&self, from: &UserId, to: Option<&UserId>) -> bool {
        match self {
            ConversationId::Public => false,
            ConversationId::Private(owner) => from == owner || to == Some(owner),
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationId::Public => f.write_str("public"),
            ConversationId::Private(owner) => write!(f, "private:{}", owner),
        }
    }
}

/// Entry in the staff private-chat inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateContact {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Room-wide counters, pushed with `updateChatStats` and served by
/// `GET /analytics/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStats {
    #[serde(default)]
    pub online_count: u64,
    #[serde(default)]
    pub total_users: u64,
    #[serde(default, alias = "totalChats")]
    pub total_messages: u64,
}
