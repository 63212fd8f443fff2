use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use parley_types::api::{Credentials, ErrorBody, SessionDto, TokenResponse};

use crate::error::{ApiError, ApiResult};
use crate::session::{Session, SessionHandle};

/// REST client bound to one logged-in session.
///
/// The underlying `reqwest::Client` keeps a cookie jar, so the refresh-token
/// cookie set at login is replayed by `POST /auth/token`.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base: Url,
    session: SessionHandle,
}

impl HttpApi {
    /// Log in with `nim` + password and bind the resulting session.
    pub async fn login(base: &str, credentials: &Credentials) -> ApiResult<Self> {
        let base = parse_base(base)?;
        let http = build_client()?;

        let resp = http
            .post(base.join("auth/login")?)
            .json(credentials)
            .send()
            .await?;
        let dto: SessionDto = check(resp).await?.json().await?;

        info!("Logged in as {} ({}, {})", dto.alias, dto.id, dto.role);

        Ok(Self {
            http,
            base,
            session: SessionHandle::new(Session::from_dto(dto)),
        })
    }

    pub async fn register(base: &str, credentials: &Credentials) -> ApiResult<()> {
        let base = parse_base(base)?;
        let resp = build_client()?
            .post(base.join("auth/register")?)
            .json(credentials)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Bind an already established session (no cookie jar from a login).
    pub fn with_session(base: &str, session: SessionHandle) -> ApiResult<Self> {
        Ok(Self {
            http: build_client()?,
            base: parse_base(base)?,
            session,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub(crate) fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let resp = self.send(Method::GET, path, None::<&()>).await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let resp = self.send(Method::POST, path, Some(body)).await?;
        Ok(resp.json().await?)
    }

    /// Authenticated request whose response body is not needed.
    pub(crate) async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<Response>
    where
        B: Serialize + Sync,
    {
        let url = self.endpoint(path)?;
        self.send_authed(|| {
            let req = self.http.request(method.clone(), url.clone());
            match body {
                Some(body) => req.json(body),
                None => req,
            }
        })
        .await
    }

    /// Send with the session's bearer token. A 403 triggers exactly one token
    /// refresh followed by a single retry of the same request.
    pub(crate) async fn send_authed<F>(&self, build: F) -> ApiResult<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let resp = build().bearer_auth(self.session.token()).send().await?;
        if resp.status() != StatusCode::FORBIDDEN {
            return check(resp).await;
        }

        debug!("Request to {} was forbidden, refreshing token", resp.url());
        if let Err(e) = self.refresh_token().await {
            warn!("Token refresh failed: {}", e);
            return Err(ApiError::SessionExpired);
        }

        let retry = build().bearer_auth(self.session.token()).send().await?;
        check(retry).await
    }

    async fn refresh_token(&self) -> ApiResult<()> {
        let resp = self.http.post(self.endpoint("auth/token")?).send().await?;
        let token: TokenResponse = check(resp).await?.json().await?;
        self.session.set_token(token.access_token);
        debug!("Access token refreshed");
        Ok(())
    }
}

fn build_client() -> ApiResult<reqwest::Client> {
    Ok(reqwest::Client::builder().cookie_store(true).build()?)
}

/// Base URL with a trailing slash so relative joins keep any path prefix.
fn parse_base(base: &str) -> ApiResult<Url> {
    let mut url = Url::parse(base)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Turn a non-success response into `ApiError::Status` with the server reason.
pub(crate) async fn check(resp: Response) -> ApiResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let reason = resp
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::into_reason);

    Err(ApiError::Status {
        status: status.as_u16(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_keeps_path_prefix() {
        let base = parse_base("https://chat.example.com/api").unwrap();
        assert_eq!(base.join("chat").unwrap().as_str(), "https://chat.example.com/api/chat");

        let base = parse_base("http://localhost:5000/").unwrap();
        assert_eq!(
            base.join("private/users").unwrap().as_str(),
            "http://localhost:5000/private/users"
        );
    }

    #[test]
    fn base_rejects_garbage() {
        assert!(matches!(parse_base("not a url"), Err(ApiError::InvalidUrl(_))));
    }
}
