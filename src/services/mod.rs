//! Services composing the login flow.

pub mod authorize_url;
pub mod identity;
pub mod jwks_cache;
pub mod session;
pub mod token_verifier;

pub use authorize_url::AuthorizeUrlBuilder;
pub use identity::{IdentityResolver, UserStore};
pub use jwks_cache::{Jwk, JwkSet, JwksCache};
pub use session::{DefaultSessionPolicy, SessionPolicy, SessionSink};
pub use token_verifier::IdTokenValidator;
