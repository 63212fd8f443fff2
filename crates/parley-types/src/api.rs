use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    AuthorRef, BANNED_ALIAS, DeliveryStatus, Message, MessageId, ReplyRef, Role, UserId,
};

// -- Auth --

/// Body of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub nim: String,
    pub password: String,
}

/// User payload returned by login and pushed with `userUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub warn_count: u32,
    #[serde(default)]
    pub is_muted: bool,
    #[serde(default)]
    pub mute_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_banned: bool,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

/// Error body the server attaches to rejected requests.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_reason(self) -> Option<String> {
        self.msg
            .or(self.message)
            .filter(|reason| !reason.trim().is_empty())
    }
}

// -- Public chat --

/// `userId` is either populated with the author document or left as a bare id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRefDto {
    Populated {
        #[serde(rename = "_id")]
        id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    Id(UserId),
}

/// `replyTo` is either populated with the target message or a bare id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyToDto {
    Populated {
        #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
        id: Option<MessageId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Id(MessageId),
}

/// Public room message as the server sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicChatDto {
    #[serde(rename = "_id")]
    pub id: MessageId,
    #[serde(default)]
    pub user_id: Option<UserRefDto>,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reply_to: Option<ReplyToDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_alias: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub mentions: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<Role>,
}

impl From<PublicChatDto> for Message {
    fn from(dto: PublicChatDto) -> Self {
        let (author_id, populated_role, populated_alias) = match dto.user_id {
            Some(UserRefDto::Populated { id, role, alias }) => (Some(id), role, alias),
            Some(UserRefDto::Id(id)) => (Some(id), None, None),
            None => (None, None, None),
        };

        let alias = if dto.alias.is_empty() {
            populated_alias.unwrap_or_default()
        } else {
            dto.alias
        };

        let reply_to = dto.reply_to.map(|reply| match reply {
            ReplyToDto::Populated { id, alias, message } => ReplyRef {
                message_id: id,
                author_alias: dto.reply_to_alias.clone().or(alias).unwrap_or_default(),
                snippet: message.unwrap_or_default(),
            },
            ReplyToDto::Id(id) => ReplyRef {
                message_id: Some(id),
                author_alias: dto.reply_to_alias.clone().unwrap_or_default(),
                snippet: String::new(),
            },
        });

        Message {
            id: dto.id,
            author_is_banned: alias == BANNED_ALIAS,
            author: AuthorRef {
                id: author_id,
                alias,
                role: populated_role.or(dto.user_role).unwrap_or_default(),
            },
            body: dto.message,
            created_at: dto.created_at,
            reply_to,
            is_deleted: dto.is_deleted,
            status: None,
            mentions: dto.mentions,
            recipient: None,
        }
    }
}

impl From<&Message> for PublicChatDto {
    fn from(message: &Message) -> Self {
        PublicChatDto {
            id: message.id.clone(),
            user_id: message.author.id.clone().map(|id| UserRefDto::Populated {
                id,
                role: Some(message.author.role),
                alias: Some(message.author.alias.clone()),
            }),
            alias: message.author.alias.clone(),
            message: message.body.clone(),
            created_at: message.created_at,
            reply_to: message.reply_to.as_ref().map(|reply| ReplyToDto::Populated {
                id: reply.message_id.clone(),
                alias: Some(reply.author_alias.clone()),
                message: Some(reply.snippet.clone()),
            }),
            reply_to_alias: message.reply_to.as_ref().map(|reply| reply.author_alias.clone()),
            is_deleted: message.is_deleted,
            mentions: message.mentions.clone(),
            user_role: Some(message.author.role),
        }
    }
}

/// Response of `GET /chat?page=N`. Page 1 holds the most recent messages,
/// newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPageDto {
    pub chats: Vec<PublicChatDto>,
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendChatRequest {
    pub message: String,
    #[serde(rename = "replyTo")]
    pub reply_to: Option<MessageId>,
}

// -- Private threads --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDto {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateMessageDto {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub from: PartyDto,
    #[serde(default)]
    pub to: Option<PartyDto>,
    #[serde(default)]
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
}

impl From<PrivateMessageDto> for Message {
    fn from(dto: PrivateMessageDto) -> Self {
        Message {
            id: dto.id,
            author: AuthorRef {
                id: Some(dto.from.id),
                alias: dto.from.alias.unwrap_or_default(),
                role: dto.from.role.unwrap_or_default(),
            },
            body: dto.message,
            created_at: dto.created_at,
            reply_to: None,
            is_deleted: false,
            author_is_banned: false,
            status: Some(dto.status.unwrap_or(DeliveryStatus::Sent)),
            mentions: Vec::new(),
            recipient: dto.to.map(|to| to.id),
        }
    }
}

/// Body of `POST /private/send` (user writing to staff).
#[derive(Debug, Clone, Serialize)]
pub struct PrivateSendRequest {
    pub message: String,
}

/// Body of `POST /private/reply` (staff answering a user's thread).
#[derive(Debug, Clone, Serialize)]
pub struct PrivateReplyRequest {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub message: String,
}

// -- Reports --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    Toxic,
    Sara,
    Pornografi,
    Spam,
    Scam,
    Lainnya,
}

impl ReportCategory {
    pub const ALL: [ReportCategory; 6] = [
        ReportCategory::Toxic,
        ReportCategory::Sara,
        ReportCategory::Pornografi,
        ReportCategory::Spam,
        ReportCategory::Scam,
        ReportCategory::Lainnya,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportCategory::Toxic => "toxic",
            ReportCategory::Sara => "sara",
            ReportCategory::Pornografi => "pornografi",
            ReportCategory::Spam => "spam",
            ReportCategory::Scam => "scam",
            ReportCategory::Lainnya => "lainnya",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == name)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub message_id: MessageId,
    pub reported_id: Option<UserId>,
    pub reason_category: ReportCategory,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportStatus {
    Pending,
    ActionTaken,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportParty {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub alias: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(rename = "_id")]
    pub id: String,
    pub reason_category: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub status: ReportStatus,
    #[serde(default)]
    pub message_text: Option<String>,
    #[serde(default)]
    pub reporter_id: Option<ReportParty>,
    #[serde(default)]
    pub reported_id: Option<ReportParty>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Warn,
    Mute,
    Ban,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationActionRequest {
    pub user_id: UserId,
    pub action: ModerationAction,
    pub report_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportStatusRequest {
    pub status: ReportStatus,
}

// -- Admin --

/// Registration state of an account awaiting staff approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Other,
}

/// Row of the admin user table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub nim: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: Option<AccountStatus>,
    #[serde(default)]
    pub warn_count: u32,
    #[serde(default)]
    pub is_muted: bool,
    #[serde(default)]
    pub mute_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_banned: bool,
}

impl AdminUser {
    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        self.is_muted && self.mute_until.is_some_and(|until| until > now)
    }
}

/// Response of `GET /admin/users?page=N&limit=L`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPageDto {
    #[serde(default)]
    pub users: Vec<AdminUser>,
    #[serde(default)]
    pub total: u64,
}

/// Response of `GET /admin/chats?page=N&limit=L`.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminChatPageDto {
    #[serde(default)]
    pub chats: Vec<PublicChatDto>,
    #[serde(default)]
    pub total: u64,
}

/// Body of `PUT /admin/users/:id/role`.
#[derive(Debug, Clone, Serialize)]
pub struct RoleChangeRequest {
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub admin_alias: String,
    #[serde(default)]
    pub target_user_alias: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Response of `GET /audit-logs?page=N&limit=L`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogPageDto {
    #[serde(default)]
    pub logs: Vec<AuditLogEntry>,
    #[serde(default)]
    pub total: u64,
}

// -- Analytics --

/// Message counts per hour of day, as chart labels and values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct HourlyActivity {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub data: Vec<u64>,
}

impl HourlyActivity {
    /// `(label, count)` pairs; extra labels or values are ignored.
    pub fn buckets(&self) -> impl Iterator<Item = (&str, u64)> {
        self.labels.iter().map(String::as_str).zip(self.data.iter().copied())
    }

    pub fn busiest(&self) -> Option<(&str, u64)> {
        self.buckets().max_by_key(|(_, count)| *count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActiveUser {
    pub alias: String,
    #[serde(default)]
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_public(json: &str) -> Message {
        serde_json::from_str::<PublicChatDto>(json).unwrap().into()
    }

    #[test]
    fn public_message_with_populated_author_and_reply() {
        let message = parse_public(
            r#"{
                "_id": "m2",
                "userId": {"_id": "u1", "role": "moderator"},
                "alias": "Budi",
                "message": "hi @Sari",
                "createdAt": "2024-05-01T10:00:00.000Z",
                "replyTo": {"_id": "m1", "alias": "Sari", "message": "hello all"},
                "mentions": ["u2"]
            }"#,
        );

        assert_eq!(message.author.id, Some(UserId::from("u1")));
        assert_eq!(message.author.role, Role::Moderator);
        assert_eq!(message.author.alias, "Budi");
        let reply = message.reply_to.unwrap();
        assert_eq!(reply.message_id, Some(MessageId::from("m1")));
        assert_eq!(reply.author_alias, "Sari");
        assert_eq!(reply.snippet, "hello all");
        assert_eq!(message.mentions, vec![UserId::from("u2")]);
        assert_eq!(message.status, None);
    }

    #[test]
    fn reply_alias_prefers_denormalized_field() {
        let message = parse_public(
            r#"{
                "_id": "m2", "userId": "u1", "alias": "Budi", "message": "ok",
                "createdAt": "2024-05-01T10:00:00Z",
                "replyTo": "m1", "replyToAlias": "Sari", "userRole": "admin"
            }"#,
        );

        assert_eq!(message.author.role, Role::Admin);
        let reply = message.reply_to.unwrap();
        assert_eq!(reply.message_id, Some(MessageId::from("m1")));
        assert_eq!(reply.author_alias, "Sari");
        assert!(reply.snippet.is_empty());
    }

    #[test]
    fn banned_alias_flags_author() {
        let message = parse_public(
            r#"{"_id": "m3", "userId": null, "alias": "[User Telah Dibanned]",
                "message": "x", "createdAt": "2024-05-01T10:00:00Z", "isDeleted": true}"#,
        );

        assert!(message.author_is_banned);
        assert!(message.is_deleted);
        assert_eq!(message.author.id, None);
    }

    #[test]
    fn private_message_defaults_to_sent() {
        let dto: PrivateMessageDto = serde_json::from_str(
            r#"{"_id": "p1", "from": {"id": "u1", "role": "user"}, "to": {"id": "a1"},
                "message": "help", "createdAt": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        let message = Message::from(dto);

        assert_eq!(message.status, Some(DeliveryStatus::Sent));
        assert_eq!(message.recipient, Some(UserId::from("a1")));
        assert!(message.is_from(&UserId::from("u1")));
    }

    #[test]
    fn outgoing_chat_keeps_null_reply() {
        let body = serde_json::to_value(SendChatRequest {
            message: "hi".into(),
            reply_to: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"message": "hi", "replyTo": null}));
    }

    #[test]
    fn session_accepts_mongo_id() {
        let dto: SessionDto = serde_json::from_str(
            r#"{"_id": "u1", "token": "t", "alias": "Budi", "role": "user",
                "isMuted": true, "muteUntil": "2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(dto.id, UserId::from("u1"));
        assert!(dto.is_muted);
        assert_eq!(dto.warn_count, 0);
    }

    #[test]
    fn error_body_reason_falls_back_to_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"message": "Too many requests"}"#).unwrap();
        assert_eq!(body.into_reason().as_deref(), Some("Too many requests"));

        let empty: ErrorBody = serde_json::from_str(r#"{"msg": "  "}"#).unwrap();
        assert_eq!(empty.into_reason(), None);
    }

    #[test]
    fn admin_user_row_tolerates_missing_and_unknown_fields() {
        let user: AdminUser = serde_json::from_str(
            r#"{"_id": "u3", "nim": "1301", "alias": "Rani", "role": "moderator",
                "status": "suspended", "isMuted": true, "muteUntil": "2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(user.status, Some(AccountStatus::Other));
        assert_eq!(user.warn_count, 0);

        let before = "2024-05-01T11:00:00Z".parse().unwrap();
        let after = "2024-05-01T13:00:00Z".parse().unwrap();
        assert!(user.is_muted_at(before));
        assert!(!user.is_muted_at(after));
    }

    #[test]
    fn busiest_hour() {
        let activity = HourlyActivity {
            labels: vec!["08:00".into(), "09:00".into(), "10:00".into()],
            data: vec![4, 17, 9, 99],
        };
        assert_eq!(activity.buckets().count(), 3);
        assert_eq!(activity.busiest(), Some(("09:00", 17)));
        assert_eq!(HourlyActivity::default().busiest(), None);
    }
}
