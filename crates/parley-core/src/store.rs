use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use parley_api::{ChatApi, OutgoingMessage, SessionHandle};
use parley_types::models::{ConversationId, Message, MessageId};

use crate::error::SendError;
use crate::window::ConversationWindow;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

const CHANGE_CAPACITY: usize = 256;

/// Backward pagination state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub next_page: u32,
    pub has_more: bool,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            next_page: 1,
            has_more: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { inserted: usize, has_more: bool },
    /// The server had no older messages.
    Exhausted,
    /// Another load was in flight or history is exhausted; nothing was requested.
    Skipped,
    /// The conversation changed while the request was in flight.
    Stale,
    /// Transport or server error, already logged.
    Failed,
}

/// Notifications for observers of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Reset(ConversationId),
    Replaced { count: usize },
    Prepended { count: usize },
    HistoryExhausted,
    Appended(MessageId),
    Updated { id: MessageId, index: usize },
    StatusChanged,
}

/// Identifies the conversation and epoch a request was issued under.
#[derive(Debug, Clone)]
struct Ticket {
    conversation: ConversationId,
    epoch: u64,
}

struct State {
    conversation: ConversationId,
    epoch: u64,
    window: ConversationWindow,
    cursor: PageCursor,
    loading: bool,
}

impl State {
    fn ticket(&self) -> Ticket {
        Ticket {
            conversation: self.conversation.clone(),
            epoch: self.epoch,
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.epoch == ticket.epoch && self.conversation == ticket.conversation
    }
}

/// Authoritative in-memory view of one conversation at a time.
///
/// The lock is never held across an await; results of requests issued
/// under an older epoch are dropped without touching the current state.
pub struct MessageStore {
    api: Arc<dyn ChatApi>,
    session: SessionHandle,
    page_size: u32,
    state: Mutex<State>,
    changes: broadcast::Sender<StoreChange>,
}

impl MessageStore {
    pub fn new(
        api: Arc<dyn ChatApi>,
        session: SessionHandle,
        conversation: ConversationId,
        page_size: u32,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            api,
            session,
            page_size: page_size.max(1),
            state: Mutex::new(State {
                conversation,
                epoch: 0,
                window: ConversationWindow::new(),
                cursor: PageCursor::default(),
                loading: false,
            }),
            changes,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, change: StoreChange) {
        let _ = self.changes.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn conversation(&self) -> ConversationId {
        self.state().conversation.clone()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.state().window.messages().to_vec()
    }

    pub fn cursor(&self) -> PageCursor {
        self.state().cursor
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    /// Point the store at another conversation. Every in-flight request
    /// becomes stale.
    pub fn switch_to(&self, conversation: ConversationId) {
        let mut state = self.state();
        state.epoch += 1;
        state.conversation = conversation.clone();
        state.window.clear();
        state.cursor = PageCursor::default();
        state.loading = false;
        drop(state);

        info!("Switched to {}", conversation);
        self.notify(StoreChange::Reset(conversation));
    }

    /// Fetch the newest page and replace the window with it.
    pub async fn load_initial(&self) -> LoadOutcome {
        let ticket = {
            let mut state = self.state();
            state.epoch += 1;
            state.loading = true;
            state.ticket()
        };

        let result = self
            .api
            .fetch_page(&ticket.conversation, 1, self.page_size)
            .await;

        let mut state = self.state();
        if !state.is_current(&ticket) {
            debug!("Dropping stale initial page for {}", ticket.conversation);
            return LoadOutcome::Stale;
        }
        state.loading = false;

        match result {
            Ok(page) => {
                let has_more = page.has_more;
                let messages = page.into_chronological();
                let count = messages.len();
                state.window.replace_all(messages);
                state.cursor = PageCursor {
                    next_page: 2,
                    has_more,
                };
                drop(state);

                debug!("Loaded {} messages for {} (more: {})", count, ticket.conversation, has_more);
                self.notify(StoreChange::Replaced { count });
                LoadOutcome::Loaded {
                    inserted: count,
                    has_more,
                }
            }
            Err(e) => {
                warn!("Failed to load {}: {}", ticket.conversation, e);
                LoadOutcome::Failed
            }
        }
    }

    /// Fetch the next older page and splice it in front of the window.
    pub async fn load_older(&self) -> LoadOutcome {
        let (ticket, page_number) = {
            let mut state = self.state();
            if state.loading || !state.cursor.has_more {
                return LoadOutcome::Skipped;
            }
            state.loading = true;
            (state.ticket(), state.cursor.next_page)
        };

        let result = self
            .api
            .fetch_page(&ticket.conversation, page_number, self.page_size)
            .await;

        let mut state = self.state();
        if !state.is_current(&ticket) {
            debug!("Dropping stale page {} for {}", page_number, ticket.conversation);
            return LoadOutcome::Stale;
        }
        state.loading = false;

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to load page {} of {}: {}", page_number, ticket.conversation, e);
                return LoadOutcome::Failed;
            }
        };

        let server_has_more = page.has_more;
        let messages = page.into_chronological();
        if messages.is_empty() {
            state.cursor.has_more = false;
            drop(state);
            debug!("History of {} exhausted at page {}", ticket.conversation, page_number);
            self.notify(StoreChange::HistoryExhausted);
            return LoadOutcome::Exhausted;
        }

        // A short page is the last one
        let full_page = messages.len() >= self.page_size as usize;
        let inserted = state.window.prepend(messages);
        state.cursor.next_page += 1;
        state.cursor.has_more = server_has_more && full_page;
        let has_more = state.cursor.has_more;
        drop(state);

        debug!("Prepended {} messages to {} (more: {})", inserted, ticket.conversation, has_more);
        self.notify(StoreChange::Prepended { count: inserted });
        if !has_more {
            self.notify(StoreChange::HistoryExhausted);
        }
        LoadOutcome::Loaded { inserted, has_more }
    }

    /// Append a pushed or just-sent message unless its id is already held.
    pub fn apply_incoming(&self, message: Message) -> bool {
        let id = message.id.clone();
        let appended = self.state().window.push(message);
        if appended {
            self.notify(StoreChange::Appended(id));
        }
        appended
    }

    /// Replace a held message in place. Unknown ids are dropped.
    pub fn apply_update(&self, message: Message) -> Option<usize> {
        let id = message.id.clone();
        let index = self.state().window.replace(message);
        match index {
            Some(index) => self.notify(StoreChange::Updated { id, index }),
            None => debug!("Ignoring update for unknown message {}", id),
        }
        index
    }

    pub fn mark_read(&self, id: &MessageId) -> bool {
        let changed = self.state().window.mark_read(id);
        if changed {
            self.notify(StoreChange::StatusChanged);
        }
        changed
    }

    /// Staff opened the thread: everything a non-staff user wrote is read.
    pub fn mark_read_by_staff(&self) -> usize {
        let changed = self
            .state()
            .window
            .mark_read_where(|m| !m.author.role.is_staff());
        if changed > 0 {
            self.notify(StoreChange::StatusChanged);
        }
        changed
    }

    /// Validate and create a message in the current conversation. The caller
    /// feeds the result into `apply_incoming` and republishes it.
    pub async fn send_message(
        &self,
        body: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Message, SendError> {
        let conversation = self.conversation();
        self.send_to(&conversation, body, reply_to).await
    }

    /// Same as `send_message`, for a conversation captured by the caller.
    pub async fn send_to(
        &self,
        conversation: &ConversationId,
        body: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Message, SendError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(SendError::EmptyBody);
        }

        let session = self.session.current();
        if session.is_banned {
            return Err(SendError::Banned);
        }
        let now = Utc::now();
        if let Some(until) = session.mute_until.filter(|_| session.is_muted_at(now)) {
            return Err(SendError::Muted { until });
        }

        if reply_to.is_some() && !conversation.is_public() {
            return Err(SendError::ReplyNotSupported);
        }

        let outgoing = OutgoingMessage {
            body: body.to_string(),
            reply_to,
        };
        match self.api.post_message(conversation, &outgoing).await {
            Ok(message) => {
                debug!("Sent {} to {}", message.id, conversation);
                Ok(message)
            }
            Err(e) => {
                warn!("Send to {} rejected: {}", conversation, e);
                Err(SendError::Rejected(e))
            }
        }
    }
}
