use serde::{Deserialize, Serialize};

use crate::api::{PrivateMessageDto, PublicChatDto, SessionDto};
use crate::models::{ChatStats, MessageId, Notification, UserId};

/// Room name the user side of a private thread addresses for typing signals.
pub const STAFF_ROOM: &str = "admins";

/// Events pushed by the realtime server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// New message in the public room
    ChatMessage(PublicChatDto),

    /// A public message was edited, deleted or had its author banned
    ChatMessageUpdated(PublicChatDto),

    /// Someone is typing in the public room (payload: alias)
    PublicTyping(String),

    PublicStopTyping,

    /// New message in a private thread
    PrivateMessage(PrivateMessageDto),

    /// Someone is typing in a private thread room (payload: alias)
    Typing(String),

    StopTyping,

    /// A single private message was read by its recipient
    MessageRead(MessageId),

    /// Staff read the open thread: every user-authored message becomes read
    MessagesReadByAdmin,

    /// Full set of currently connected user ids
    OnlineUsers(Vec<UserId>),

    /// Staff inbox must be reloaded
    PrivateChatListChanged,

    #[serde(rename = "new_notification")]
    NewNotification(Notification),

    /// Session fields changed server-side (warnings, mute, ban)
    UserUpdated(SessionDto),

    UpdateChatStats(ChatStats),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChatMessage(_) => "chatMessage",
            Self::ChatMessageUpdated(_) => "chatMessageUpdated",
            Self::PublicTyping(_) => "publicTyping",
            Self::PublicStopTyping => "publicStopTyping",
            Self::PrivateMessage(_) => "privateMessage",
            Self::Typing(_) => "typing",
            Self::StopTyping => "stopTyping",
            Self::MessageRead(_) => "messageRead",
            Self::MessagesReadByAdmin => "messagesReadByAdmin",
            Self::OnlineUsers(_) => "onlineUsers",
            Self::PrivateChatListChanged => "privateChatListChanged",
            Self::NewNotification(_) => "new_notification",
            Self::UserUpdated(_) => "userUpdated",
            Self::UpdateChatStats(_) => "updateChatStats",
        }
    }
}

/// Commands sent FROM client TO server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Bind this socket to the logged-in user (sent once per connection)
    RegisterUserSocket(UserId),

    /// Announce presence when a view opens
    UserOnline(UserId),

    /// Join a private-thread room (thread owner id or `"admins"`)
    JoinRoom(String),

    /// Republish a message this client just created over REST
    ChatMessage(PublicChatDto),

    PublicTyping(String),

    PublicStopTyping,

    Typing { room: String, alias: String },

    StopTyping { room: String },
}
