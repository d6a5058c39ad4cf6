//! REST client for the ProPhone API

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    Action, AuthResponse, CopilotMessage, CopilotRequest, CopilotResponse, DenialKind,
    ErrorBody, ImpersonationResponse, LoginRequest, MagicCodeRequest, MagicCodeResponse,
    MagicCodeStatus, MagicCodeVerifyRequest, MemberUpdate, ProfileUpdate, RegisterRequest,
    UserProfile,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cannot reach server: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Server {
        status: StatusCode,
        message: String,
        reason: Option<DenialKind>,
    },

    #[error("not signed in")]
    NotSignedIn,
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        if self.token.is_none() {
            return Err(ApiError::NotSignedIn);
        }
        Ok(self.request(method, path))
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let response = check(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        builder: RequestBuilder,
        body: &B,
    ) -> Result<T, ApiError> {
        Self::send(builder.json(body)).await
    }

    // Auth

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        Self::send_json(self.request(Method::POST, "/api/auth/register"), req).await
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ApiError> {
        Self::send_json(self.request(Method::POST, "/api/auth/login"), req).await
    }

    /// Ask for an emailed sign-in code. Delivery outcomes come back typed,
    /// so only transport and unexpected server errors are `Err`.
    pub async fn request_magic_code(&self, email: &str) -> Result<MagicCodeStatus, ApiError> {
        let response = self
            .request(Method::POST, "/api/auth/magic-code")
            .json(&MagicCodeRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        match response.status() {
            StatusCode::OK | StatusCode::NOT_FOUND | StatusCode::BAD_GATEWAY => {
                let body: MagicCodeResponse = response.json().await?;
                Ok(body.status)
            }
            _ => Err(check(response).await.err().unwrap_or(ApiError::Server {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "unexpected response".to_string(),
                reason: None,
            })),
        }
    }

    pub async fn verify_magic_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<AuthResponse, ApiError> {
        Self::send_json(
            self.request(Method::POST, "/api/auth/magic-code/verify"),
            &MagicCodeVerifyRequest {
                email: email.to_string(),
                code: code.to_string(),
            },
        )
        .await
    }

    // Profile

    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        Self::send(self.authed(Method::GET, "/api/user/profile")?).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        Self::send_json(self.authed(Method::PUT, "/api/user/profile")?, update).await
    }

    // Team

    pub async fn list_members(&self) -> Result<Vec<UserProfile>, ApiError> {
        Self::send(self.authed(Method::GET, "/api/team/members")?).await
    }

    pub async fn update_member(
        &self,
        id: Uuid,
        update: &MemberUpdate,
    ) -> Result<UserProfile, ApiError> {
        let path = format!("/api/team/members/{}", id);
        Self::send_json(self.authed(Method::PUT, &path)?, update).await
    }

    pub async fn delete_member(&self, id: Uuid) -> Result<(), ApiError> {
        let path = format!("/api/team/members/{}", id);
        check(self.authed(Method::DELETE, &path)?.send().await?).await?;
        Ok(())
    }

    /// Suspend, ban or reactivate a member.
    pub async fn change_status(&self, id: Uuid, action: Action) -> Result<UserProfile, ApiError> {
        let path = format!("/api/team/members/{}/{}", id, action);
        Self::send(self.authed(Method::POST, &path)?).await
    }

    pub async fn impersonate(&self, id: Uuid) -> Result<ImpersonationResponse, ApiError> {
        let path = format!("/api/team/members/{}/impersonate", id);
        Self::send(self.authed(Method::POST, &path)?).await
    }

    // Copilot

    pub async fn copilot(&self, messages: Vec<CopilotMessage>) -> Result<CopilotResponse, ApiError> {
        Self::send_json(
            self.authed(Method::POST, "/api/copilot/chat")?,
            &CopilotRequest { messages },
        )
        .await
    }
}

/// Turn non-2xx responses into `ApiError::Server`, keeping the server's message.
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(server_error(status, &text))
}

fn server_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(body) => ApiError::Server {
            status,
            message: body.error,
            reason: body.reason,
        },
        Err(_) => ApiError::Server {
            status,
            message: format!("server returned {}", status),
            reason: None,
        },
    }
}
