use async_trait::async_trait;
use tracing::debug;

use parley_types::api::{
    ChatPageDto, PrivateMessageDto, PrivateReplyRequest, PrivateSendRequest, PublicChatDto,
    SendChatRequest,
};
use parley_types::models::{ConversationId, Message, MessageId};

use crate::client::HttpApi;
use crate::error::ApiResult;

/// Order in which a page lists its messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrder {
    NewestFirst,
    OldestFirst,
}

/// One page of history as returned by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub order: PageOrder,
}

impl MessagePage {
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            has_more: false,
            order: PageOrder::OldestFirst,
        }
    }

    /// Messages oldest → newest.
    pub fn into_chronological(self) -> Vec<Message> {
        let mut messages = self.messages;
        if self.order == PageOrder::NewestFirst {
            messages.reverse();
        }
        messages
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: String,
    pub reply_to: Option<MessageId>,
}

/// The REST calls the message store depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Page 1 is the most recent page.
    async fn fetch_page(
        &self,
        conversation: &ConversationId,
        page: u32,
        limit: u32,
    ) -> ApiResult<MessagePage>;

    /// Create a message and return it as stored by the server.
    async fn post_message(
        &self,
        conversation: &ConversationId,
        message: &OutgoingMessage,
    ) -> ApiResult<Message>;
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn fetch_page(
        &self,
        conversation: &ConversationId,
        page: u32,
        limit: u32,
    ) -> ApiResult<MessagePage> {
        match conversation {
            ConversationId::Public => {
                let dto: ChatPageDto = self
                    .get_json(&format!("chat?page={}&limit={}", page, limit))
                    .await?;
                debug!("Fetched public page {} ({} messages)", page, dto.chats.len());
                Ok(MessagePage {
                    messages: dto.chats.into_iter().map(Message::from).collect(),
                    has_more: dto.has_more,
                    order: PageOrder::NewestFirst,
                })
            }
            // Private threads are served whole, so only page 1 exists.
            ConversationId::Private(_) if page > 1 => Ok(MessagePage::empty()),
            ConversationId::Private(owner) => {
                let dtos: Vec<PrivateMessageDto> =
                    self.get_json(&format!("private/{}", owner)).await?;
                debug!("Fetched private thread {} ({} messages)", owner, dtos.len());
                Ok(MessagePage {
                    messages: dtos.into_iter().map(Message::from).collect(),
                    has_more: false,
                    order: PageOrder::OldestFirst,
                })
            }
        }
    }

    async fn post_message(
        &self,
        conversation: &ConversationId,
        message: &OutgoingMessage,
    ) -> ApiResult<Message> {
        match conversation {
            ConversationId::Public => {
                let body = SendChatRequest {
                    message: message.body.clone(),
                    reply_to: message.reply_to.clone(),
                };
                let dto: PublicChatDto = self.post_json("chat", &body).await?;
                Ok(dto.into())
            }
            ConversationId::Private(owner) if *owner == self.session().user_id() => {
                let body = PrivateSendRequest {
                    message: message.body.clone(),
                };
                let dto: PrivateMessageDto = self.post_json("private/send", &body).await?;
                Ok(dto.into())
            }
            ConversationId::Private(owner) => {
                let body = PrivateReplyRequest {
                    user_id: owner.clone(),
                    message: message.body.clone(),
                };
                let dto: PrivateMessageDto = self.post_json("private/reply", &body).await?;
                Ok(dto.into())
            }
        }
    }
}
