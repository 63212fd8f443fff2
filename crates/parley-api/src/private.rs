use parley_types::models::PrivateContact;

use crate::client::HttpApi;
use crate::error::ApiResult;

impl HttpApi {
    /// Users with an open private thread (staff inbox).
    pub async fn private_contacts(&self) -> ApiResult<Vec<PrivateContact>> {
        self.get_json("private/users").await
    }
}
