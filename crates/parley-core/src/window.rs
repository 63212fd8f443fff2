use std::collections::HashSet;

use parley_types::models::{DeliveryStatus, Message, MessageId};

/// Loaded messages of one conversation, oldest → newest, without duplicate ids.
#[derive(Debug, Clone, Default)]
pub struct ConversationWindow {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl ConversationWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    /// Replace everything with a chronological batch. Later duplicates are dropped.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.clear();
        for message in messages {
            self.push(message);
        }
    }

    /// Splice an older chronological batch before the earliest held message.
    /// Returns how many were actually inserted.
    pub fn prepend(&mut self, older: Vec<Message>) -> usize {
        let mut fresh = Vec::with_capacity(older.len());
        for message in older {
            if self.ids.insert(message.id.clone()) {
                fresh.push(message);
            }
        }
        let inserted = fresh.len();
        fresh.append(&mut self.messages);
        self.messages = fresh;
        inserted
    }

    /// Append if the id is new.
    pub fn push(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace in place. Returns the index, or `None` for an unknown id.
    pub fn replace(&mut self, message: Message) -> Option<usize> {
        if !self.ids.contains(&message.id) {
            return None;
        }
        let index = self.messages.iter().position(|m| m.id == message.id)?;
        self.messages[index] = message;
        Some(index)
    }

    pub fn mark_read(&mut self, id: &MessageId) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == id) {
            Some(message) => set_read(message),
            None => false,
        }
    }

    /// Mark every matching message read; returns how many changed.
    pub fn mark_read_where(&mut self, mut predicate: impl FnMut(&Message) -> bool) -> usize {
        self.messages
            .iter_mut()
            .filter(|m| predicate(m))
            .map(set_read)
            .filter(|changed| *changed)
            .count()
    }
}

fn set_read(message: &mut Message) -> bool {
    if message.status == Some(DeliveryStatus::Read) {
        return false;
    }
    message.status = Some(DeliveryStatus::Read);
    true
}
