use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use parley_types::api::SessionDto;
use parley_types::models::{Role, UserId};

/// Warnings after which the server bans the account permanently.
pub const MAX_WARNINGS: u32 = 5;

/// Identity and moderation state of the logged-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: UserId,
    pub token: String,
    pub alias: String,
    pub role: Role,
    pub warn_count: u32,
    pub is_muted: bool,
    pub mute_until: Option<DateTime<Utc>>,
    pub is_banned: bool,
}

impl Session {
    pub fn from_dto(dto: SessionDto) -> Self {
        Self {
            user_id: dto.id,
            token: dto.token.unwrap_or_default(),
            alias: dto.alias,
            role: dto.role,
            warn_count: dto.warn_count,
            is_muted: dto.is_muted,
            mute_until: dto.mute_until,
            is_banned: dto.is_banned,
        }
    }

    /// Muted only while the mute has an end time still in the future.
    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        self.is_muted && self.mute_until.is_some_and(|until| until > now)
    }

    pub fn is_muted_now(&self) -> bool {
        self.is_muted_at(Utc::now())
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Banner text shown once the account has collected warnings.
    pub fn warning(&self) -> Option<String> {
        if self.warn_count == 0 {
            return None;
        }
        let remaining = MAX_WARNINGS.saturating_sub(self.warn_count);
        Some(format!(
            "You have received {} warning(s). {} more will permanently ban your account.",
            self.warn_count, remaining
        ))
    }

    /// Apply a `userUpdated` push. The token is kept unless the push carries one.
    pub fn apply_update(&mut self, dto: SessionDto) {
        let token = dto.token.clone().unwrap_or_else(|| std::mem::take(&mut self.token));
        *self = Self::from_dto(dto);
        self.token = token;
    }
}

/// Shared, explicitly passed session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn current(&self) -> Session {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn user_id(&self) -> UserId {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user_id
            .clone()
    }

    pub fn token(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    pub fn set_token(&self, token: String) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).token = token;
    }

    pub fn apply_update(&self, dto: SessionDto) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_update(dto);
    }
}
