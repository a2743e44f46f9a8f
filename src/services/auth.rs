//! Bearer tokens for Microsoft Graph via the OAuth2 client-credentials grant.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use oauth2::basic::BasicClient;
use oauth2::{AuthType, ClientId, ClientSecret, Scope, TokenResponse, TokenUrl};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;
/// Used when the token endpoint omits `expires_in`.
const DEFAULT_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token endpoint '{url}': {reason}")]
    Endpoint { url: String, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Token request failed: {0}")]
    Request(String),
}

/// Azure AD application identity.
#[derive(Debug)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

pub struct AccessToken {
    secret: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, lifetime: std::time::Duration) -> Self {
        let lifetime = Duration::from_std(lifetime).unwrap_or_else(|_| Duration::seconds(DEFAULT_LIFETIME_SECS as i64));
        Self { secret: SecretString::from(secret.into()), expires_at: Utc::now() + lifetime }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    fn bearer(&self) -> SecretString {
        SecretString::from(self.secret.expose_secret().to_owned())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken").field("expires_at", &self.expires_at).finish_non_exhaustive()
    }
}

/// Source of fresh access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, AuthError>;
}

/// Client-credentials grant against `<authority>/<tenant>/oauth2/v2.0/token`.
pub struct ClientCredentialsProvider {
    credentials: Credentials,
    token_url: TokenUrl,
    http: reqwest::Client,
}

impl ClientCredentialsProvider {
    pub fn new(credentials: Credentials, authority_url: &str, timeout: std::time::Duration) -> Result<Self, AuthError> {
        let url = format!("{}/{}/oauth2/v2.0/token", authority_url.trim_end_matches('/'), credentials.tenant_id);
        let token_url = TokenUrl::new(url.clone())
            .map_err(|e| AuthError::Endpoint { url, reason: e.to_string() })?;

        // The token endpoint must not be followed through redirects.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self { credentials, token_url, http })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn fetch_token(&self) -> Result<AccessToken, AuthError> {
        debug!("Requesting Graph token from {}", self.token_url.as_str());

        let client = BasicClient::new(ClientId::new(self.credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.credentials.client_secret.expose_secret().to_owned()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(self.token_url.clone());

        let response = client
            .exchange_client_credentials()
            .add_scope(Scope::new(GRAPH_SCOPE.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let lifetime = response
            .expires_in()
            .unwrap_or(std::time::Duration::from_secs(DEFAULT_LIFETIME_SECS));
        info!("Obtained Graph access token valid for {}s", lifetime.as_secs());

        Ok(AccessToken::new(response.access_token().secret().to_owned(), lifetime))
    }
}

/// Holds the current token and refreshes it before reuse once it nears expiry.
pub struct Session {
    provider: Box<dyn TokenProvider>,
    current: Mutex<Option<AccessToken>>,
}

impl Session {
    pub fn new(provider: impl TokenProvider + 'static) -> Self {
        Self { provider: Box::new(provider), current: Mutex::new(None) }
    }

    /// Build a session and fetch its first token immediately.
    pub async fn start(provider: impl TokenProvider + 'static) -> Result<Self, AuthError> {
        let session = Self::new(provider);
        session.bearer().await?;
        Ok(session)
    }

    /// A valid bearer token, fetching a new one if needed.
    pub async fn bearer(&self) -> Result<SecretString, AuthError> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if !token.is_expired_at(Utc::now()) {
                return Ok(token.bearer());
            }
            debug!("Access token expired at {}, refreshing", token.expires_at());
        }

        let token = self.provider.fetch_token().await?;
        let bearer = token.bearer();
        *current = Some(token);
        Ok(bearer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        lifetime: StdDuration,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn fetch_token(&self) -> Result<AccessToken, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken::new(format!("token-{}", n), self.lifetime))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl TokenProvider for FailingProvider {
        async fn fetch_token(&self) -> Result<AccessToken, AuthError> {
            Err(AuthError::Request("invalid_client".to_string()))
        }
    }

    #[test]
    fn token_expiry_includes_skew() {
        let token = AccessToken::new("t", StdDuration::from_secs(120));
        assert!(!token.is_expired_at(Utc::now()));
        assert!(token.is_expired_at(Utc::now() + Duration::seconds(61)));
    }

    #[tokio::test]
    async fn session_reuses_a_valid_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = Session::start(CountingProvider { calls: calls.clone(), lifetime: StdDuration::from_secs(3600) })
            .await
            .unwrap();

        let first = session.bearer().await.unwrap();
        let second = session.bearer().await.unwrap();

        assert_eq!(first.expose_secret(), "token-1");
        assert_eq!(second.expose_secret(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn session_refreshes_a_token_near_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = Session::new(CountingProvider { calls: calls.clone(), lifetime: StdDuration::from_secs(30) });

        assert_eq!(session.bearer().await.unwrap().expose_secret(), "token-1");
        assert_eq!(session.bearer().await.unwrap().expose_secret(), "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn session_start_surfaces_token_failure() {
        let err = Session::start(FailingProvider).await.err().unwrap();
        assert!(err.to_string().contains("invalid_client"));
    }

    #[tokio::test]
    async fn client_credentials_against_token_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                mockito::Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                mockito::Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
                mockito::Matcher::UrlEncoded("scope".into(), GRAPH_SCOPE.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"graph-token"}"#)
            .create_async()
            .await;

        let credentials = Credentials {
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: SecretString::from("s3cret".to_string()),
        };
        let provider = ClientCredentialsProvider::new(credentials, &server.url(), StdDuration::from_secs(5)).unwrap();
        let token = provider.fetch_token().await.unwrap();

        assert_eq!(token.bearer().expose_secret(), "graph-token");
        assert!(!token.is_expired_at(Utc::now()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_credentials_are_an_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_client","error_description":"bad secret"}"#)
            .create_async()
            .await;

        let credentials = Credentials {
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: SecretString::from("wrong".to_string()),
        };
        let provider = ClientCredentialsProvider::new(credentials, &server.url(), StdDuration::from_secs(5)).unwrap();
        let err = provider.fetch_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Request(_)));
    }
}
