//! Google sign-in (`OpenID` Connect authorization code flow).

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::GoogleOAuthConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Google OAuth errors.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("google account email is not verified")]
    UnverifiedEmail,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Profile returned by the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUser {
    /// Stable Google account id.
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
}

/// Google OAuth client.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    client: Client,
    client_id: String,
    client_secret: SecretString,
}

impl GoogleOAuthClient {
    #[must_use]
    pub fn new(config: &GoogleOAuthConfig) -> Self {
        Self {
            client: Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// Build the URL that sends the user to Google's consent screen.
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?\
            client_id={}&\
            response_type=code&\
            redirect_uri={}&\
            scope=openid%20email%20profile&\
            state={}&\
            nonce={}&\
            prompt=select_account",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(nonce)
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::TokenExchange` if Google rejects the code.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchange(text));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Fetch the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::UnverifiedEmail` if Google has not verified the
    /// account's email.
    #[instrument(skip(self, access_token))]
    pub async fn userinfo(&self, access_token: &str) -> Result<GoogleUser, OAuthError> {
        let user: GoogleUser = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !user.email_verified {
            return Err(OAuthError::UnverifiedEmail);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_encodes_parameters() {
        let client = GoogleOAuthClient::new(&GoogleOAuthConfig {
            client_id: "abc.apps.googleusercontent.com".to_string(),
            client_secret: SecretString::from("s"),
        });
        let url = client.authorization_url("https://shop.test/auth/google/callback", "st8", "n0nce");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fshop.test%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("state=st8"));
        assert!(url.contains("nonce=n0nce"));
        assert!(url.contains("scope=openid%20email%20profile"));
    }
}
