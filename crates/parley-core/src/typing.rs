use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use parley_gateway::Hub;
use parley_types::events::{ClientCommand, STAFF_ROOM};
use parley_types::models::{ConversationId, UserId};

/// How long a typing signal lives without a refresh, both ways.
pub const TYPING_TIMEOUT: Duration = Duration::from_millis(2000);

/// Who is typing in the open conversation, as seen from incoming events.
#[derive(Debug, Default)]
pub struct TypingIndicator {
    current: Option<(String, Instant)>,
}

impl TypingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A start while someone is typing replaces the alias and refreshes the expiry.
    pub fn start(&mut self, alias: impl Into<String>, now: Instant) {
        self.current = Some((alias.into(), now + TYPING_TIMEOUT));
    }

    pub fn stop(&mut self) -> bool {
        self.current.take().is_some()
    }

    /// A message from the displayed alias ends its typing signal.
    pub fn on_message(&mut self, author_alias: &str) -> bool {
        if self.alias() == Some(author_alias) {
            self.current = None;
            return true;
        }
        false
    }

    /// Clear the signal once its deadline has passed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.current {
            Some((_, deadline)) if *deadline <= now => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        self.current.as_ref().map(|(alias, _)| alias.as_str())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|(_, deadline)| *deadline)
    }
}

/// Where outgoing typing signals go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingTarget {
    Public,
    Room(String),
}

impl TypingTarget {
    /// A user typing in their own thread addresses the staff room; staff
    /// address the owner's room.
    pub fn for_conversation(conversation: &ConversationId, me: &UserId) -> Self {
        match conversation {
            ConversationId::Public => TypingTarget::Public,
            ConversationId::Private(owner) if owner == me => TypingTarget::Room(STAFF_ROOM.to_string()),
            ConversationId::Private(owner) => TypingTarget::Room(owner.to_string()),
        }
    }

    fn start_command(&self, alias: &str) -> ClientCommand {
        match self {
            TypingTarget::Public => ClientCommand::PublicTyping(alias.to_string()),
            TypingTarget::Room(room) => ClientCommand::Typing {
                room: room.clone(),
                alias: alias.to_string(),
            },
        }
    }

    fn stop_command(&self) -> ClientCommand {
        match self {
            TypingTarget::Public => ClientCommand::PublicStopTyping,
            TypingTarget::Room(room) => ClientCommand::StopTyping { room: room.clone() },
        }
    }
}

/// Debounces local keystrokes into start/stop signals.
pub struct TypingEmitter {
    hub: Hub,
    target: TypingTarget,
    alias: String,
    timer: Option<JoinHandle<()>>,
}

impl TypingEmitter {
    pub fn new(hub: Hub, target: TypingTarget, alias: impl Into<String>) -> Self {
        Self {
            hub,
            target,
            alias: alias.into(),
            timer: None,
        }
    }

    pub fn target(&self) -> &TypingTarget {
        &self.target
    }

    fn timer_pending(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Emit start unless a stop is already scheduled, then (re)schedule the stop.
    pub fn keystroke(&mut self) {
        if !self.timer_pending() {
            trace!("Typing started in {:?}", self.target);
            self.hub.emit(self.target.start_command(&self.alias));
        }
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let hub = self.hub.clone();
        let stop = self.target.stop_command();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(TYPING_TIMEOUT).await;
            hub.emit(stop);
        }));
    }

    /// On send or cancel: stop right away.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.hub.emit(self.target.stop_command());
    }
}

impl Drop for TypingEmitter {
    fn drop(&mut self) {
        if self.timer_pending() {
            self.stop();
        }
    }
}
