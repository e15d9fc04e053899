//! Login configuration.
//!
//! All provider URLs are derived from a single tenant base, and every
//! component receives the configuration explicitly. The flow is inert until
//! both the tenant domain and the client id are present: `Settings::ready`
//! is the only way to obtain a usable [`LoginConfig`].

use std::env;

use url::Url;

/// Environment variable for the identity provider tenant domain.
pub const ENV_TENANT_DOMAIN: &str = "RELIER_TENANT_DOMAIN";
/// Environment variable for the OIDC client identifier.
pub const ENV_CLIENT_ID: &str = "RELIER_CLIENT_ID";
/// Environment variable for the deployment's own base URL.
pub const ENV_BASE_URL: &str = "RELIER_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Raw settings, possibly incomplete.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Identity provider tenant domain, e.g. `myapp.example-idp.com`.
    /// A full URL (scheme included) is also accepted.
    pub tenant_domain: Option<String>,
    /// OIDC client identifier registered with the provider.
    pub client_id: Option<String>,
    /// Base URL of this deployment, used for the callback and home redirects.
    pub base_url: String,
}

impl Settings {
    /// Load settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            tenant_domain: env::var(ENV_TENANT_DOMAIN).ok().filter(|v| !v.is_empty()),
            client_id: env::var(ENV_CLIENT_ID).ok().filter(|v| !v.is_empty()),
            base_url: env::var(ENV_BASE_URL)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Whether the login flow can start at all.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready().is_some()
    }

    /// Produce a complete configuration, or `None` if any required input is
    /// missing or unusable.
    #[must_use]
    pub fn ready(&self) -> Option<LoginConfig> {
        let tenant_domain = self.tenant_domain.clone()?;
        let client_id = self.client_id.clone()?;
        let config = LoginConfig {
            tenant_domain,
            client_id,
            base_url: self.base_url.trim_end_matches('/').to_string(),
        };
        // Reject unparseable URLs up front so URL building never fails later.
        Url::parse(&config.issuer()).ok()?;
        Url::parse(&config.home_url()).ok()?;
        Some(config)
    }
}

/// Complete, validated login configuration.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    tenant_domain: String,
    client_id: String,
    base_url: String,
}

impl LoginConfig {
    /// The configured OIDC client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Build a tenant URL for the given path.
    ///
    /// A bare domain gets an `https://` prefix; a domain carrying its own
    /// scheme is used as-is (loopback development setups).
    #[must_use]
    pub fn tenant_url(&self, path: &str) -> String {
        let domain = self.tenant_domain.trim().trim_end_matches('/');
        if domain.contains("://") {
            format!("{domain}{path}")
        } else {
            format!("https://{domain}{path}")
        }
    }

    /// Expected `iss` claim value. Providers issue with a trailing slash.
    #[must_use]
    pub fn issuer(&self) -> String {
        self.tenant_url("/")
    }

    /// Authorization endpoint of the provider.
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        self.tenant_url("/authorize")
    }

    /// Logout endpoint of the provider.
    #[must_use]
    pub fn logout_endpoint(&self) -> String {
        self.tenant_url("/v2/logout")
    }

    /// JWKS endpoint of the provider.
    #[must_use]
    pub fn jwks_uri(&self) -> String {
        self.tenant_url("/.well-known/jwks.json")
    }

    /// Fixed callback endpoint of this deployment.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.base_url, crate::router::CALLBACK_PATH)
    }

    /// Home destination after a successful login or short-circuit.
    #[must_use]
    pub fn home_url(&self) -> String {
        self.base_url.clone()
    }

    /// Whether this deployment is served over TLS.
    #[must_use]
    pub fn secure_transport(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Append the provider host to a host-supplied redirect allowlist.
    ///
    /// The host environment validates outbound redirects against its own
    /// allowlist; the provider's domain must be registered there or the
    /// authorize redirect would be rejected.
    #[must_use]
    pub fn allowed_redirect_hosts(&self, mut hosts: Vec<String>) -> Vec<String> {
        if let Some(host) = Url::parse(&self.issuer())
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        {
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        hosts
    }
}
