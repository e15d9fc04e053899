//! Provider authorization and logout URL construction.

use tracing::error;
use url::Url;

use crate::config::LoginConfig;
use crate::error::{LoginError, LoginResult};

/// Builds provider redirect URLs for the configured tenant.
///
/// Deterministic given its inputs; every parameter value is percent-encoded
/// individually by the query serializer.
#[derive(Debug, Clone)]
pub struct AuthorizeUrlBuilder {
    config: LoginConfig,
}

impl AuthorizeUrlBuilder {
    /// Create a builder for the given configuration.
    #[must_use]
    pub fn new(config: LoginConfig) -> Self {
        Self { config }
    }

    /// Compose the authorization request URL embedding `nonce`.
    pub fn build(&self, nonce: &str) -> LoginResult<String> {
        let mut url = self.parse_endpoint(&self.config.authorize_endpoint())?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("scope", "openid email");
            query.append_pair("response_type", "id_token");
            query.append_pair("response_mode", "form_post");
            query.append_pair("redirect_uri", &self.config.callback_url());
            query.append_pair("client_id", self.config.client_id());
            query.append_pair("nonce", nonce);
        }
        Ok(url.into())
    }

    /// Compose the provider logout URL returning to the local home.
    pub fn logout_url(&self) -> LoginResult<String> {
        let mut url = self.parse_endpoint(&self.config.logout_endpoint())?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", self.config.client_id());
            query.append_pair("returnTo", &self.config.home_url());
        }
        Ok(url.into())
    }

    fn parse_endpoint(&self, endpoint: &str) -> LoginResult<Url> {
        // Settings::ready validated the tenant base, so this only fires on a
        // config constructed around a URL that url::Url refuses.
        Url::parse(endpoint).map_err(|e| {
            error!(endpoint = %endpoint, error = %e, "provider endpoint is not a valid URL");
            LoginError::NotReady
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::collections::HashMap;

    fn builder() -> AuthorizeUrlBuilder {
        let settings = Settings {
            tenant_domain: Some("myapp.example-idp.com".to_string()),
            client_id: Some("client abc".to_string()),
            base_url: "https://app.example.com".to_string(),
        };
        AuthorizeUrlBuilder::new(settings.ready().unwrap())
    }

    fn query_map(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn authorize_url_carries_fixed_parameters() {
        let url = builder().build("abc123").unwrap();
        assert!(url.starts_with("https://myapp.example-idp.com/authorize?"));

        let query = query_map(&url);
        assert_eq!(query["scope"], "openid email");
        assert_eq!(query["response_type"], "id_token");
        assert_eq!(query["response_mode"], "form_post");
        assert_eq!(
            query["redirect_uri"],
            "https://app.example.com/login/callback"
        );
        assert_eq!(query["client_id"], "client abc");
        assert_eq!(query["nonce"], "abc123");
    }

    #[test]
    fn parameter_values_are_percent_encoded() {
        let url = builder().build("n+once/with specials").unwrap();
        // The raw string must not contain unencoded reserved characters.
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Flogin%2Fcallback"));
        assert!(url.contains("client_id=client+abc") || url.contains("client_id=client%20abc"));
        assert!(!url.contains("n+once/with specials"));
    }

    #[test]
    fn build_is_deterministic() {
        assert_eq!(
            builder().build("abc123").unwrap(),
            builder().build("abc123").unwrap()
        );
    }

    #[test]
    fn logout_url_returns_home() {
        let url = builder().logout_url().unwrap();
        assert!(url.starts_with("https://myapp.example-idp.com/v2/logout?"));

        let query = query_map(&url);
        assert_eq!(query["client_id"], "client abc");
        assert_eq!(query["returnTo"], "https://app.example.com");
    }
}
