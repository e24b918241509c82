//! Route authorization gate.
//!
//! Every inbound path maps to exactly one [`GateDecision`] per request:
//!
//! 1. Asset and internal paths bypass the gate.
//! 2. Paths without a recognized locale prefix are redirected to one.
//! 3. Auth pages redirect home when a session token is present; protected
//!    and admin paths redirect to login when it is absent.
//! 4. Admin paths perform one profile lookup. Anything but an admin role,
//!    including a failed lookup, redirects away.
//!
//! There is no retry: a failed admin check fails closed.

use marketstall_core::Profile;

use crate::config::LocaleConfig;
use crate::gateway::{ProfileGateway, SessionToken};

/// Path prefixes that never reach the gate.
const BYPASS_PREFIXES: &[&str] = &["/static/", "/_internal/", "/health"];

/// Sign-in and sign-up pages.
const AUTH_PAGES: &[&str] = &["/login", "/register"];

/// Paths that require a session token.
const PROTECTED_PREFIXES: &[&str] = &["/checkout", "/orders", "/account"];

/// Paths that require an admin role.
const ADMIN_PREFIX: &str = "/admin";

/// Query parameter carrying the page to return to after login.
pub const NEXT_PARAM: &str = "next";

/// Path class after locale normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    AuthPage,
    Public,
    Protected,
    Admin,
}

/// Static classification of a path, before any session or profile is
/// consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass<'a> {
    Bypass,
    MissingLocale,
    Localized { locale: &'a str, area: Area },
}

/// Terminal gate state for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Bypass,
    LocaleRedirect(String),
    RedirectHome(String),
    RedirectLogin(String),
    AdminDenied(String),
    /// Continue to the handler. Admin paths carry the verified profile.
    Allow(Option<Profile>),
}

impl GateDecision {
    /// Redirect target, if this decision redirects.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::LocaleRedirect(to)
            | Self::RedirectHome(to)
            | Self::RedirectLogin(to)
            | Self::AdminDenied(to) => Some(to),
            Self::Bypass | Self::Allow(_) => None,
        }
    }
}

/// Classifies paths and makes the per-request decision.
#[derive(Debug, Clone)]
pub struct RouteGate {
    locales: LocaleConfig,
}

impl RouteGate {
    #[must_use]
    pub const fn new(locales: LocaleConfig) -> Self {
        Self { locales }
    }

    #[must_use]
    pub const fn locales(&self) -> &LocaleConfig {
        &self.locales
    }

    /// Classify a path without any I/O.
    #[must_use]
    pub fn classify<'a>(&self, path: &'a str) -> PathClass<'a> {
        if is_bypassed(path) {
            return PathClass::Bypass;
        }

        let trimmed = path.trim_start_matches('/');
        let (first, rest) = trimmed
            .find('/')
            .map_or((trimmed, ""), |idx| trimmed.split_at(idx));

        if !self.locales.is_supported(first) {
            return PathClass::MissingLocale;
        }

        let area = if AUTH_PAGES.iter().any(|p| has_prefix(rest, p)) {
            Area::AuthPage
        } else if has_prefix(rest, ADMIN_PREFIX) {
            Area::Admin
        } else if PROTECTED_PREFIXES.iter().any(|p| has_prefix(rest, p)) {
            Area::Protected
        } else {
            Area::Public
        };

        PathClass::Localized {
            locale: first,
            area,
        }
    }

    /// Decide what happens to a request.
    ///
    /// Only admin paths with a token reach the profile collaborator.
    #[tracing::instrument(skip(self, query, token, profiles), fields(authenticated = token.is_some()))]
    pub async fn decide(
        &self,
        path: &str,
        query: Option<&str>,
        token: Option<&SessionToken>,
        profiles: &dyn ProfileGateway,
    ) -> GateDecision {
        let (locale, area) = match self.classify(path) {
            PathClass::Bypass => return GateDecision::Bypass,
            PathClass::MissingLocale => {
                let to = with_query(&self.localized(path), query);
                tracing::debug!(to = %to, "Adding locale prefix");
                return GateDecision::LocaleRedirect(to);
            }
            PathClass::Localized { locale, area } => (locale, area),
        };

        match (area, token) {
            (Area::Public, _) => GateDecision::Allow(None),
            (Area::AuthPage, Some(_)) => GateDecision::RedirectHome(format!("/{locale}")),
            (Area::AuthPage, None) => GateDecision::Allow(None),
            (Area::Protected | Area::Admin, None) => {
                GateDecision::RedirectLogin(login_url(locale, path, query))
            }
            (Area::Protected, Some(_)) => GateDecision::Allow(None),
            (Area::Admin, Some(token)) => match profiles.fetch_profile(token).await {
                Ok(profile) if profile.role.is_admin() => GateDecision::Allow(Some(profile)),
                Ok(profile) => {
                    tracing::warn!(account_id = %profile.id, role = %profile.role, "Admin access denied");
                    GateDecision::AdminDenied(format!("/{locale}"))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Admin role check failed, denying");
                    GateDecision::AdminDenied(format!("/{locale}"))
                }
            },
        }
    }

    fn localized(&self, path: &str) -> String {
        let default = &self.locales.default;
        if path == "/" || path.is_empty() {
            format!("/{default}")
        } else {
            format!("/{default}{path}")
        }
    }
}

fn is_bypassed(path: &str) -> bool {
    if BYPASS_PREFIXES
        .iter()
        .any(|p| path.starts_with(p) || path == p.trim_end_matches('/'))
    {
        return true;
    }
    path.rsplit('/')
        .next()
        .is_some_and(|last| last.contains('.'))
}

/// Segment-aware prefix match: `/orders` matches `/orders` and
/// `/orders/42` but not `/ordersx`.
fn has_prefix(rest: &str, prefix: &str) -> bool {
    rest.strip_prefix(prefix)
        .is_some_and(|tail| tail.is_empty() || tail.starts_with('/'))
}

fn with_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path.to_owned(),
    }
}

/// Login page for `locale` that continues to `path` after sign-in.
pub(crate) fn login_url(locale: &str, path: &str, query: Option<&str>) -> String {
    let next = with_query(path, query);
    format!(
        "/{locale}/login?{NEXT_PARAM}={}",
        urlencoding::encode(&next)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use marketstall_core::{AccountId, Role};

    use super::*;
    use crate::gateway::GatewayError;

    enum Lookup {
        Role(Role),
        Unauthorized,
        Down,
    }

    struct FakeProfiles {
        lookup: Lookup,
        calls: AtomicUsize,
    }

    impl FakeProfiles {
        const fn new(lookup: Lookup) -> Self {
            Self {
                lookup,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProfileGateway for FakeProfiles {
        async fn fetch_profile(&self, _token: &SessionToken) -> Result<Profile, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.lookup {
                Lookup::Role(role) => Ok(Profile {
                    id: AccountId::new(1),
                    role,
                    name: None,
                    email: None,
                }),
                Lookup::Unauthorized => Err(GatewayError::Unauthorized),
                Lookup::Down => Err(GatewayError::Status {
                    status: 503,
                    body: "unavailable".into(),
                }),
            }
        }
    }

    fn gate() -> RouteGate {
        RouteGate::new(LocaleConfig::default())
    }

    fn token() -> SessionToken {
        SessionToken::new("tok").unwrap()
    }

    #[test]
    fn test_classify_bypass() {
        let gate = gate();
        for path in [
            "/static/app.css",
            "/_internal/build/chunk",
            "/health",
            "/favicon.ico",
            "/en/products/shoe.png",
        ] {
            assert_eq!(gate.classify(path), PathClass::Bypass, "{path}");
        }
    }

    #[test]
    fn test_classify_areas() {
        let gate = gate();
        let area = |path| match gate.classify(path) {
            PathClass::Localized { area, .. } => Some(area),
            _ => None,
        };

        assert_eq!(area("/en"), Some(Area::Public));
        assert_eq!(area("/ar/cart"), Some(Area::Public));
        assert_eq!(area("/en/login"), Some(Area::AuthPage));
        assert_eq!(area("/en/register"), Some(Area::AuthPage));
        assert_eq!(area("/en/checkout"), Some(Area::Protected));
        assert_eq!(area("/en/orders/42"), Some(Area::Protected));
        assert_eq!(area("/en/ordersx"), Some(Area::Public));
        assert_eq!(area("/ar/admin/orders"), Some(Area::Admin));
        assert_eq!(gate.classify("/cart"), PathClass::MissingLocale);
        assert_eq!(gate.classify("/"), PathClass::MissingLocale);
    }

    #[tokio::test]
    async fn test_locale_redirect_preserves_query() {
        let profiles = FakeProfiles::new(Lookup::Role(Role::Admin));
        let decision = gate()
            .decide("/checkout", Some("step=shippingDetails"), None, &profiles)
            .await;
        assert_eq!(
            decision,
            GateDecision::LocaleRedirect("/en/checkout?step=shippingDetails".into())
        );

        let decision = gate().decide("/", None, None, &profiles).await;
        assert_eq!(decision.location(), Some("/en"));
    }

    #[tokio::test]
    async fn test_auth_page_with_token_redirects_home() {
        let profiles = FakeProfiles::new(Lookup::Role(Role::Customer));
        let decision = gate()
            .decide("/ar/login", None, Some(&token()), &profiles)
            .await;
        assert_eq!(decision, GateDecision::RedirectHome("/ar".into()));

        let decision = gate().decide("/ar/login", None, None, &profiles).await;
        assert_eq!(decision, GateDecision::Allow(None));
    }

    #[tokio::test]
    async fn test_protected_without_token_redirects_to_login() {
        let profiles = FakeProfiles::new(Lookup::Role(Role::Customer));
        let decision = gate()
            .decide("/en/orders/42", Some("success=true"), None, &profiles)
            .await;
        assert_eq!(
            decision,
            GateDecision::RedirectLogin("/en/login?next=%2Fen%2Forders%2F42%3Fsuccess%3Dtrue".into())
        );

        let decision = gate()
            .decide("/en/checkout", None, Some(&token()), &profiles)
            .await;
        assert_eq!(decision, GateDecision::Allow(None));
        assert_eq!(profiles.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_admin_allows_admin_role() {
        let profiles = FakeProfiles::new(Lookup::Role(Role::Admin));
        let decision = gate()
            .decide("/en/admin", None, Some(&token()), &profiles)
            .await;
        assert!(matches!(decision, GateDecision::Allow(Some(ref p)) if p.role.is_admin()));
        assert_eq!(profiles.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_admin_fails_closed() {
        for lookup in [Lookup::Role(Role::Customer), Lookup::Role(Role::Unknown), Lookup::Unauthorized, Lookup::Down] {
            let profiles = FakeProfiles::new(lookup);
            let decision = gate()
                .decide("/ar/admin/orders", None, Some(&token()), &profiles)
                .await;
            assert_eq!(decision, GateDecision::AdminDenied("/ar".into()));
        }
    }

    #[tokio::test]
    async fn test_admin_without_token_skips_lookup() {
        let profiles = FakeProfiles::new(Lookup::Role(Role::Admin));
        let decision = gate().decide("/en/admin", None, None, &profiles).await;
        assert!(matches!(decision, GateDecision::RedirectLogin(_)));
        assert_eq!(profiles.calls.load(Ordering::SeqCst), 0);
    }
}
