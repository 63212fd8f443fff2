use reqwest::Method;
use tracing::info;

use parley_types::api::{
    AdminChatPageDto, AdminUser, AuditLogEntry, AuditLogPageDto, RoleChangeRequest, UserPageDto,
};
use parley_types::models::{Message, Role, UserId};

use crate::client::HttpApi;
use crate::error::ApiResult;

pub const DEFAULT_AUDIT_PAGE_SIZE: u32 = 25;

/// One page of an admin table along with the server's total row count.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Paged<T> {
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit)) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

impl HttpApi {
    pub async fn users(&self, page: u32, limit: u32) -> ApiResult<Paged<AdminUser>> {
        let dto: UserPageDto = self
            .get_json(&format!("admin/users?page={}&limit={}", page, limit))
            .await?;
        Ok(Paged {
            items: dto.users,
            total: dto.total,
            page,
            limit,
        })
    }

    pub async fn approve_user(&self, id: &UserId) -> ApiResult<()> {
        self.patch_empty(&format!("admin/users/{}/approve", id)).await?;
        info!("Approved user {}", id);
        Ok(())
    }

    pub async fn reject_user(&self, id: &UserId) -> ApiResult<()> {
        self.patch_empty(&format!("admin/users/{}/reject", id)).await?;
        info!("Rejected user {}", id);
        Ok(())
    }

    pub async fn delete_user(&self, id: &UserId) -> ApiResult<()> {
        self.send(Method::DELETE, &format!("admin/users/{}", id), None::<&()>)
            .await?;
        info!("Deleted user {}", id);
        Ok(())
    }

    /// Super-admin only; the server enforces it.
    pub async fn change_role(&self, id: &UserId, role: Role) -> ApiResult<()> {
        let body = RoleChangeRequest { role };
        self.send(Method::PUT, &format!("admin/users/{}/role", id), Some(&body))
            .await?;
        info!("Changed role of {} to {}", id, role);
        Ok(())
    }

    /// Public room messages for moderation, newest first.
    pub async fn admin_chats(&self, page: u32, limit: u32) -> ApiResult<Paged<Message>> {
        let dto: AdminChatPageDto = self
            .get_json(&format!("admin/chats?page={}&limit={}", page, limit))
            .await?;
        Ok(Paged {
            items: dto.chats.into_iter().map(Message::from).collect(),
            total: dto.total,
            page,
            limit,
        })
    }

    pub async fn audit_logs(&self, page: u32, limit: u32) -> ApiResult<Paged<AuditLogEntry>> {
        let dto: AuditLogPageDto = self
            .get_json(&format!("audit-logs?page={}&limit={}", page, limit))
            .await?;
        Ok(Paged {
            items: dto.logs,
            total: dto.total,
            page,
            limit,
        })
    }

    async fn patch_empty(&self, path: &str) -> ApiResult<()> {
        let empty = serde_json::json!({});
        self.send(Method::PATCH, path, Some(&empty)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(total: u64, page: u32, limit: u32) -> Paged<()> {
        Paged {
            items: Vec::new(),
            total,
            page,
            limit,
        }
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page(0, 1, 20).total_pages(), 0);
        assert_eq!(page(20, 1, 20).total_pages(), 1);
        assert_eq!(page(21, 1, 20).total_pages(), 2);
        assert!(page(21, 1, 20).has_next());
        assert!(!page(21, 2, 20).has_next());
        assert_eq!(page(5, 1, 0).total_pages(), 0);
    }
}
