use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use parley_gateway::{Hub, Subscription};
use parley_types::api::PublicChatDto;
use parley_types::events::{ClientCommand, ServerEvent};
use parley_types::models::{ConversationId, Message, MessageId};

use crate::error::SendError;
use crate::store::{LoadOutcome, MessageStore};
use crate::typing::{TypingEmitter, TypingIndicator, TypingTarget};

/// One open conversation: routes realtime events into the store, tracks who
/// is typing, and sends on the user's behalf. Dropping the view releases its
/// hub subscription.
pub struct ConversationView {
    store: Arc<MessageStore>,
    hub: Hub,
    emitter: TypingEmitter,
    typing: watch::Receiver<Option<String>>,
    router: JoinHandle<()>,
}

impl ConversationView {
    /// Open a view on the store's current conversation and announce it.
    pub fn open(store: Arc<MessageStore>, hub: Hub) -> Self {
        let session = store.session().current();
        let conversation = store.conversation();

        match &conversation {
            ConversationId::Public => hub.emit(ClientCommand::UserOnline(session.user_id.clone())),
            ConversationId::Private(owner) => hub.emit(ClientCommand::JoinRoom(owner.to_string())),
        }

        let subscription = hub.subscribe(format!("view {}", conversation));
        let (typing_tx, typing) = watch::channel(None);
        let router = tokio::spawn(route_events(subscription, store.clone(), typing_tx));

        let emitter = TypingEmitter::new(
            hub.clone(),
            TypingTarget::for_conversation(&conversation, &session.user_id),
            session.alias,
        );

        info!("Opened view on {}", conversation);
        Self {
            store,
            hub,
            emitter,
            typing,
            router,
        }
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    pub fn conversation(&self) -> ConversationId {
        self.store.conversation()
    }

    /// Reset the store onto another conversation and reopen the view there.
    pub fn switch_to(&mut self, conversation: ConversationId) {
        self.router.abort();
        self.store.switch_to(conversation);
        let store = self.store.clone();
        let hub = self.hub.clone();
        *self = Self::open(store, hub);
    }

    pub async fn load_initial(&self) -> LoadOutcome {
        self.store.load_initial().await
    }

    pub async fn load_older(&self) -> LoadOutcome {
        self.store.load_older().await
    }

    /// Alias currently shown as typing.
    pub fn typing_alias(&self) -> Option<String> {
        self.typing.borrow().clone()
    }

    pub fn typing_updates(&self) -> watch::Receiver<Option<String>> {
        self.typing.clone()
    }

    pub fn keystroke(&mut self) {
        self.emitter.keystroke();
    }

    pub fn cancel_typing(&mut self) {
        self.emitter.stop();
    }

    /// Send, merge the created message, and republish it to the public room.
    /// If the store moved to another conversation while the request was in
    /// flight, the message is returned but neither merged nor republished.
    pub async fn send(
        &mut self,
        body: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Message, SendError> {
        let conversation = self.store.conversation();
        let message = self.store.send_to(&conversation, body, reply_to).await?;
        self.emitter.stop();

        if self.store.conversation() != conversation {
            debug!("Left {} while sending {}, not merging", conversation, message.id);
            return Ok(message);
        }
        self.store.apply_incoming(message.clone());

        if conversation.is_public() {
            self.hub
                .emit(ClientCommand::ChatMessage(PublicChatDto::from(&message)));
        }
        Ok(message)
    }
}

impl Drop for ConversationView {
    fn drop(&mut self) {
        self.router.abort();
    }
}

async fn route_events(
    mut subscription: Subscription,
    store: Arc<MessageStore>,
    typing_tx: watch::Sender<Option<String>>,
) {
    let mut typing = TypingIndicator::new();

    loop {
        let deadline = typing.deadline();
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let conversation = store.conversation();
                apply_event(event, &conversation, &store, &mut typing, Instant::now());
            }
            _ = sleep_until(deadline) => {
                typing.expire(Instant::now());
            }
        }

        typing_tx.send_if_modified(|shown| {
            let current = typing.alias().map(str::to_string);
            if *shown == current {
                return false;
            }
            *shown = current;
            true
        });
    }
    debug!("Event router for subscription {} stopped", subscription.id());
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Route one realtime event into the open conversation. Events for other
/// conversations are ignored.
fn apply_event(
    event: ServerEvent,
    conversation: &ConversationId,
    store: &MessageStore,
    typing: &mut TypingIndicator,
    now: Instant,
) {
    match (event, conversation) {
        (ServerEvent::ChatMessage(dto), ConversationId::Public) => {
            let message = Message::from(dto);
            typing.on_message(&message.author.alias);
            store.apply_incoming(message);
        }
        (ServerEvent::ChatMessageUpdated(dto), ConversationId::Public) => {
            store.apply_update(dto.into());
        }
        (ServerEvent::PublicTyping(alias), ConversationId::Public) => typing.start(alias, now),
        (ServerEvent::PublicStopTyping, ConversationId::Public) => {
            typing.stop();
        }
        (ServerEvent::PrivateMessage(dto), ConversationId::Private(_)) => {
            let to = dto.to.as_ref().map(|to| &to.id);
            if !conversation.owns_private(&dto.from.id, to) {
                trace!("Private message for another thread");
                return;
            }
            let message = Message::from(dto);
            typing.on_message(&message.author.alias);
            store.apply_incoming(message);
        }
        (ServerEvent::Typing(alias), ConversationId::Private(_)) => typing.start(alias, now),
        (ServerEvent::StopTyping, ConversationId::Private(_)) => {
            typing.stop();
        }
        (ServerEvent::MessageRead(id), ConversationId::Private(_)) => {
            store.mark_read(&id);
        }
        (ServerEvent::MessagesReadByAdmin, ConversationId::Private(_)) => {
            store.mark_read_by_staff();
        }
        (event, _) => trace!("View on {} ignores {}", conversation, event.name()),
    }
}
