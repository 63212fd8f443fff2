use parley_types::api::{ActiveUser, HourlyActivity};
use parley_types::models::ChatStats;

use crate::client::HttpApi;
use crate::error::ApiResult;

impl HttpApi {
    /// Member and message totals shown next to the public room.
    pub async fn chat_stats(&self) -> ApiResult<ChatStats> {
        self.get_json("analytics/stats").await
    }

    pub async fn activity_by_hour(&self) -> ApiResult<HourlyActivity> {
        self.get_json("analytics/activity-by-hour").await
    }

    /// Most active posters, busiest first.
    pub async fn active_users(&self) -> ApiResult<Vec<ActiveUser>> {
        self.get_json("analytics/active-users").await
    }
}
