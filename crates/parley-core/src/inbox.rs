use std::collections::HashSet;

use tracing::{debug, warn};

use parley_api::{ApiResult, HttpApi};
use parley_types::events::ServerEvent;
use parley_types::models::{Notification, PrivateContact, UserId};

/// The user's notifications, newest first.
#[derive(Debug, Default)]
pub struct NotificationFeed {
    items: Vec<Notification>,
}

impl NotificationFeed {
    pub fn new(items: Vec<Notification>) -> Self {
        Self { items }
    }

    pub async fn load(api: &HttpApi) -> ApiResult<Self> {
        let items = api.notifications().await?;
        debug!("Loaded {} notifications", items.len());
        Ok(Self::new(items))
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    /// Prepend a pushed notification. Returns the new entry, if any.
    pub fn apply_event(&mut self, event: &ServerEvent) -> Option<&Notification> {
        let ServerEvent::NewNotification(notification) = event else {
            return None;
        };
        if self.items.iter().any(|n| n.id == notification.id) {
            return None;
        }
        self.items.insert(0, notification.clone());
        self.items.first()
    }

    /// Flip everything to read once the server accepted it.
    pub async fn mark_all_read(&mut self, api: &HttpApi) -> ApiResult<()> {
        api.mark_all_notifications_read().await?;
        self.set_all_read();
        Ok(())
    }

    fn set_all_read(&mut self) {
        for item in &mut self.items {
            item.is_read = true;
        }
    }
}

/// What a realtime event means for the contact list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactUpdate {
    Unchanged,
    PresenceChanged,
    RefreshNeeded,
}

/// Staff inbox of private threads with presence.
#[derive(Debug, Default)]
pub struct ContactList {
    contacts: Vec<PrivateContact>,
    online: HashSet<UserId>,
}

impl ContactList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contacts(&self) -> &[PrivateContact] {
        &self.contacts
    }

    pub fn is_online(&self, id: &UserId) -> bool {
        self.online.contains(id)
    }

    pub fn replace(&mut self, contacts: Vec<PrivateContact>) {
        self.contacts = contacts;
    }

    pub async fn refresh(&mut self, api: &HttpApi) -> ApiResult<()> {
        match api.private_contacts().await {
            Ok(contacts) => {
                debug!("Contact list refreshed ({} threads)", contacts.len());
                self.replace(contacts);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to refresh contact list: {}", e);
                Err(e)
            }
        }
    }

    /// `open_thread` is the owner of the thread currently on screen, if any.
    pub fn apply_event(&mut self, event: &ServerEvent, open_thread: Option<&UserId>) -> ContactUpdate {
        match event {
            ServerEvent::OnlineUsers(ids) => {
                self.online = ids.iter().cloned().collect();
                ContactUpdate::PresenceChanged
            }
            ServerEvent::PrivateChatListChanged => ContactUpdate::RefreshNeeded,
            ServerEvent::PrivateMessage(dto) => {
                let to = dto.to.as_ref().map(|to| &to.id);
                let is_open = open_thread
                    .is_some_and(|owner| &dto.from.id == owner || to == Some(owner));
                if is_open {
                    ContactUpdate::Unchanged
                } else {
                    ContactUpdate::RefreshNeeded
                }
            }
            _ => ContactUpdate::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parley_types::api::{PartyDto, PrivateMessageDto};
    use parley_api::{Session, SessionHandle};
    use parley_types::models::{MessageId, Role};

    use super::*;

    fn notification(id: &str, is_read: bool) -> Notification {
        Notification {
            id: id.into(),
            message: format!("notification {id}"),
            link: None,
            is_read,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pushed_notifications_are_prepended_once() {
        let mut feed = NotificationFeed::new(vec![notification("n1", true)]);
        assert_eq!(feed.unread_count(), 0);

        let event = ServerEvent::NewNotification(notification("n2", false));
        assert!(feed.apply_event(&event).is_some());
        assert!(feed.apply_event(&event).is_none());

        assert_eq!(feed.items()[0].id, "n2");
        assert_eq!(feed.unread_count(), 1);

        feed.set_all_read();
        assert_eq!(feed.unread_count(), 0);
    }

    fn private(from: &str, to: &str) -> ServerEvent {
        ServerEvent::PrivateMessage(PrivateMessageDto {
            id: MessageId::from("p1"),
            from: PartyDto {
                id: UserId::from(from),
                role: Some(Role::User),
                alias: None,
            },
            to: Some(PartyDto {
                id: UserId::from(to),
                role: None,
                alias: None,
            }),
            message: "hi".into(),
            created_at: Utc::now(),
            status: None,
        })
    }

    #[test]
    fn messages_for_closed_threads_need_refresh() {
        let mut contacts = ContactList::new();
        let open = UserId::from("u1");

        assert_eq!(
            contacts.apply_event(&private("u1", "a1"), Some(&open)),
            ContactUpdate::Unchanged
        );
        assert_eq!(
            contacts.apply_event(&private("u2", "a1"), Some(&open)),
            ContactUpdate::RefreshNeeded
        );
        assert_eq!(
            contacts.apply_event(&private("u2", "a1"), None),
            ContactUpdate::RefreshNeeded
        );
        assert_eq!(
            contacts.apply_event(&ServerEvent::PrivateChatListChanged, None),
            ContactUpdate::RefreshNeeded
        );
    }

    #[test]
    fn presence_replaces_online_set() {
        let mut contacts = ContactList::new();
        contacts.apply_event(
            &ServerEvent::OnlineUsers(vec![UserId::from("u1"), UserId::from("u2")]),
            None,
        );
        contacts.apply_event(&ServerEvent::OnlineUsers(vec![UserId::from("u2")]), None);

        assert!(!contacts.is_online(&UserId::from("u1")));
        assert!(contacts.is_online(&UserId::from("u2")));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_contacts_and_reports_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let api = HttpApi::with_session(
            &base,
            SessionHandle::new(Session {
                user_id: UserId::from("a1"),
                token: "t1".into(),
                alias: "Admin".into(),
                role: Role::Admin,
                warn_count: 0,
                is_muted: false,
                mute_until: None,
                is_banned: false,
            }),
        )
        .unwrap();

        let mut contacts = ContactList::new();
        contacts.replace(vec![PrivateContact {
            id: UserId::from("u1"),
            alias: "Budi".into(),
            role: Role::User,
        }]);

        assert!(contacts.refresh(&api).await.is_err());
        assert_eq!(contacts.contacts().len(), 1);
    }
}
