//! Session layer backed by `PostgreSQL`.
//!
//! The session only carries the logged-in user ID (or the user still owing a
//! two-factor code); everything else is read from the database per request.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "mb_session";

/// Session expiry time in seconds (7 days of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The `tower_sessions.session` table is created by the migrations. Cookies
/// are signed with a key derived from `STOREFRONT_SESSION_SECRET`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    let store = PostgresStore::new(pool.clone());
    let (secure, same_site) = cookie_policy(&config.base_url, &config.frontend_url);

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(secure)
        .with_same_site(same_site)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(&config.session_secret))
}

/// 64-byte cookie signing key: SHA-512 of the session secret.
fn signing_key(secret: &SecretString) -> Key {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// `Secure` flag and `SameSite` mode for the session cookie.
///
/// A SPA on another site (not just another subdomain) only sends the cookie
/// with `SameSite=None`, which browsers accept only over HTTPS.
fn cookie_policy(base_url: &str, frontend_url: &str) -> (bool, SameSite) {
    let secure = base_url.starts_with("https://");
    let cross_site = registrable_domain(base_url) != registrable_domain(frontend_url);

    if cross_site && secure {
        (true, SameSite::None)
    } else {
        (secure, SameSite::Lax)
    }
}

/// Registrable part of the URL host: the last two labels, or three under a
/// country second-level domain such as `com.ar`.
fn registrable_domain(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    let host = url.host_str()?;
    let labels: Vec<&str> = host.split('.').collect();
    let keep = match labels.as_slice() {
        [.., second, tld] if tld.len() == 2 && second.len() <= 3 => 3,
        _ => 2,
    };
    let start = labels.len().saturating_sub(keep);
    Some(labels.get(start..)?.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_origin_is_lax() {
        let (secure, same_site) =
            cookie_policy("https://mercadoboom.com.ar", "https://mercadoboom.com.ar");
        assert!(secure);
        assert_eq!(same_site, SameSite::Lax);
    }

    #[test]
    fn test_subdomains_are_same_site() {
        let (_, same_site) = cookie_policy(
            "https://api.mercadoboom.com.ar",
            "https://www.mercadoboom.com.ar",
        );
        assert_eq!(same_site, SameSite::Lax);
    }

    #[test]
    fn test_cross_site_https_uses_none() {
        let (secure, same_site) = cookie_policy(
            "https://api.mercadoboom.com.ar",
            "https://mercadoboom.vercel.app",
        );
        assert!(secure);
        assert_eq!(same_site, SameSite::None);
    }

    #[test]
    fn test_plain_http_never_uses_none() {
        let (secure, same_site) = cookie_policy("http://localhost:3000", "http://127.0.0.1:5173");
        assert!(!secure);
        assert_eq!(same_site, SameSite::Lax);
    }

    #[test]
    fn test_signing_key_is_stable() {
        let secret = SecretString::from("k7Qz9vLm2Xr8Tn4Wp6Yb3Jc5Hd1Fg0Sa");
        assert_eq!(signing_key(&secret).master(), signing_key(&secret).master());
        let other = SecretString::from("a7Qz9vLm2Xr8Tn4Wp6Yb3Jc5Hd1Fg0Sa");
        assert_ne!(signing_key(&secret).master(), signing_key(&other).master());
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(
            registrable_domain("https://api.mercadoboom.com.ar").as_deref(),
            Some("mercadoboom.com.ar")
        );
        assert_eq!(
            registrable_domain("https://shop.example.com").as_deref(),
            Some("example.com")
        );
        assert_eq!(registrable_domain("http://localhost:3000").as_deref(), Some("localhost"));
        assert!(registrable_domain("not a url").is_none());
    }
}
