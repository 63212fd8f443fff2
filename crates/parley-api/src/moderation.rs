use reqwest::Method;
use tracing::info;

use parley_types::api::{
    ModerationActionRequest, Report, ReportRequest, ReportStatus, ReportStatusRequest,
};
use parley_types::models::MessageId;

use crate::client::HttpApi;
use crate::error::ApiResult;

impl HttpApi {
    pub async fn submit_report(&self, report: &ReportRequest) -> ApiResult<()> {
        self.send(Method::POST, "reports/report", Some(report)).await?;
        info!(
            "Reported message {} ({})",
            report.message_id,
            report.reason_category.as_str()
        );
        Ok(())
    }

    pub async fn reports(&self) -> ApiResult<Vec<Report>> {
        self.get_json("reports").await
    }

    pub async fn update_report_status(&self, report_id: &str, status: ReportStatus) -> ApiResult<()> {
        let body = ReportStatusRequest { status };
        self.send(Method::PUT, &format!("reports/{}", report_id), Some(&body))
            .await?;
        Ok(())
    }

    /// Warn, mute or ban the reported user.
    pub async fn take_action(&self, action: &ModerationActionRequest) -> ApiResult<()> {
        self.send(Method::POST, "reports/action", Some(action)).await?;
        info!("Applied {:?} to {}", action.action, action.user_id);
        Ok(())
    }

    /// Soft-delete a public message; the server pushes `chatMessageUpdated`.
    pub async fn delete_message(&self, message_id: &MessageId) -> ApiResult<()> {
        self.send(Method::DELETE, &format!("admin/chats/{}", message_id), None::<&()>)
            .await?;
        Ok(())
    }
}
