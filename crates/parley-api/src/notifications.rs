use reqwest::Method;

use parley_types::models::Notification;

use crate::client::HttpApi;
use crate::error::ApiResult;

impl HttpApi {
    pub async fn notifications(&self) -> ApiResult<Vec<Notification>> {
        self.get_json("notifications").await
    }

    pub async fn mark_all_notifications_read(&self) -> ApiResult<()> {
        let empty = serde_json::json!({});
        self.send(Method::PATCH, "notifications/read-all", Some(&empty))
            .await?;
        Ok(())
    }
}
