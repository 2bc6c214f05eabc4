use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::AppConfig;

/// How the client authenticates against the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Pre-issued bearer token.
    Bearer { token: String },
    /// OAuth 2.0 client credentials against the configured authority.
    ClientCredentials {
        authority: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl Credentials {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        if let Some(token) = cfg.access_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(Self::Bearer {
                token: token.to_string(),
            });
        }
        match (&cfg.tenant_id, &cfg.client_id, &cfg.client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                Ok(Self::ClientCredentials {
                    authority: cfg.authority.trim_end_matches('/').to_string(),
                    tenant_id: tenant_id.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                })
            }
            _ => anyhow::bail!(
                "No credentials configured. Set access_token, or tenant_id, client_id and client_secret (PLUGREG__* variables work too)"
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Returns a bearer token for `resource` (the environment URL).
pub async fn acquire_token(
    http: &reqwest::Client,
    credentials: &Credentials,
    resource: &str,
) -> Result<String> {
    match credentials {
        Credentials::Bearer { token } => Ok(token.clone()),
        Credentials::ClientCredentials {
            authority,
            tenant_id,
            client_id,
            client_secret,
        } => {
            let scope = format!("{}/.default", resource.trim_end_matches('/'));
            tracing::debug!(authority = %authority, client_id = %client_id, "Requesting access token");
            let token = oauth_client_credentials(
                http,
                &format!("{authority}/{tenant_id}/oauth2/v2.0/token"),
                client_id,
                client_secret,
                &scope,
            )
            .await?;
            Ok(token.access_token)
        }
    }
}

pub async fn oauth_client_credentials(
    http: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    scope: &str,
) -> Result<TokenResponse> {
    let resp = http
        .post(token_url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(format!(
            "grant_type=client_credentials&client_id={}&client_secret={}&scope={}",
            urlencoding(client_id),
            urlencoding(client_secret),
            urlencoding(scope),
        ))
        .send()
        .await
        .context("Failed to reach the token endpoint")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OAuth token request failed (HTTP {status}): {body}");
    }

    resp.json().await.context("Failed to parse token response")
}

fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_credentials(authority: &str) -> Credentials {
        Credentials::ClientCredentials {
            authority: authority.to_string(),
            tenant_id: "contoso-tenant".into(),
            client_id: "app-id".into(),
            client_secret: "a&b".into(),
        }
    }

    #[test]
    fn test_access_token_wins_over_client_credentials() {
        let cfg = AppConfig {
            access_token: Some("token".into()),
            tenant_id: Some("t".into()),
            client_id: Some("c".into()),
            client_secret: Some("s".into()),
            ..AppConfig::default()
        };
        assert_eq!(
            Credentials::from_config(&cfg).unwrap(),
            Credentials::Bearer {
                token: "token".into()
            }
        );
    }

    #[test]
    fn test_incomplete_credentials_fail() {
        let cfg = AppConfig {
            client_id: Some("c".into()),
            ..AppConfig::default()
        };
        assert!(Credentials::from_config(&cfg).is_err());
    }

    #[tokio::test]
    async fn test_client_credentials_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contoso-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_secret=a%26b"))
            .and(body_string_contains(
                "scope=https%3A%2F%2Fcontoso.crm.dynamics.com%2F.default",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "eyJ0", "token_type": "Bearer"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = acquire_token(
            &reqwest::Client::new(),
            &client_credentials(&server.uri()),
            "https://contoso.crm.dynamics.com/",
        )
        .await
        .unwrap();
        assert_eq!(token, "eyJ0");
    }

    #[tokio::test]
    async fn test_token_endpoint_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = acquire_token(
            &reqwest::Client::new(),
            &client_credentials(&server.uri()),
            "https://contoso.crm.dynamics.com",
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("401"), "{err}");
    }
}
