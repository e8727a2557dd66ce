//! Auth endpoints as opaque calls. A successful login installs the returned
//! token on the gateway it was built from.

use boardsync_common::User;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::HttpGateway;
use crate::errors::GatewayError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Serialize)]
struct EmailOnly<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct OtpCheck<'a> {
    email: &'a str,
    otp: &'a str,
}

/// Whatever the auth endpoint chose to send back.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default, alias = "accessToken")]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Clone)]
pub struct AuthClient {
    gateway: HttpGateway,
}

impl AuthClient {
    pub fn new(gateway: HttpGateway) -> Self {
        Self { gateway }
    }

    pub async fn sign_up(&self, form: &SignUp) -> Result<AuthResponse, GatewayError> {
        self.gateway.post("/auth/signup", form).await
    }

    /// Log in and install the returned token for subsequent requests.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, GatewayError> {
        let response: AuthResponse = self.gateway.post("/auth/login", credentials).await?;
        if let Some(token) = &response.token {
            self.gateway.set_token(Some(token.clone()));
            info!(email = %credentials.email, "logged in");
        }
        Ok(response)
    }

    pub fn logout(&self) {
        self.gateway.set_token(None);
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<AuthResponse, GatewayError> {
        self.gateway
            .post("/auth/verify-otp", &OtpCheck { email, otp })
            .await
    }

    pub async fn resend_otp(&self, email: &str) -> Result<AuthResponse, GatewayError> {
        self.gateway
            .post("/auth/resend-otp", &EmailOnly { email })
            .await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<AuthResponse, GatewayError> {
        self.gateway
            .post("/auth/forgot-password", &EmailOnly { email })
            .await
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<AuthResponse, GatewayError> {
        self.gateway.post("/auth/reset-password", reset).await
    }

    pub async fn resend_reset_otp(&self, email: &str) -> Result<AuthResponse, GatewayError> {
        self.gateway
            .post("/auth/resend-otp-reset", &EmailOnly { email })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::gateway::WorkspaceGateway;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> (HttpGateway, AuthClient) {
        let gateway = HttpGateway::new(&ApiConfig {
            base_url: server.uri(),
            request_timeout_secs: 5,
            token: None,
        })
        .unwrap();
        (gateway.clone(), AuthClient::new(gateway))
    }

    #[tokio::test]
    async fn login_installs_token_on_shared_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(serde_json::json!({"email": "ada@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "jwt-abc",
                "user": {"_id": "u1", "userName": "ada", "email": "ada@example.com"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/profile"))
            .and(header("authorization", "Bearer jwt-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_id": "u1", "userName": "ada", "email": "ada@example.com"
            })))
            .mount(&server)
            .await;

        let (gateway, auth) = client_for(&server);
        let response = auth
            .login(&Credentials {
                email: "ada@example.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.token.as_deref(), Some("jwt-abc"));
        assert!(gateway.has_token());
        assert_eq!(gateway.profile().await.unwrap().user_name, "ada");

        auth.logout();
        assert!(!gateway.has_token());
    }

    #[tokio::test]
    async fn failed_login_leaves_token_unset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "message": "Invalid credentials"
            })))
            .mount(&server)
            .await;

        let (gateway, auth) = client_for(&server);
        let err = auth
            .login(&Credentials {
                email: "ada@example.com".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(!gateway.has_token());
    }

    #[tokio::test]
    async fn reset_password_uses_camel_case_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/reset-password"))
            .and(body_json(serde_json::json!({
                "email": "ada@example.com", "otp": "123456", "newPassword": "s3cret"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Password updated"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (_, auth) = client_for(&server);
        let response = auth
            .reset_password(&PasswordReset {
                email: "ada@example.com".into(),
                otp: "123456".into(),
                new_password: "s3cret".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.message.as_deref(), Some("Password updated"));
        assert_eq!(response.token, None);
    }
}
