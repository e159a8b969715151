//! Route/Capability Gate
//!
//! A pure function of the route, a gateway snapshot and the license state.
//! Route tiers come from configuration as path prefixes matched on segment
//! boundaries (`/wallet` covers `/wallet/send`, not `/wallets`).

use presence_core::config::{GatewayConfig, RoutesConfig};

/// Access tier of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTier {
    /// Open to everyone
    Public,
    /// Needs a verified, unlocked session
    Verified,
    /// Needs a verified session and an active license
    Licensed,
}

/// Gate verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed
    Allow,
    /// Send the caller to this route
    Redirect(String),
}

/// Result of the entitlement lookup for the session owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    /// License in force
    Active,
    /// No license or lapsed
    Inactive,
    /// Not looked up (non-licensed route) or lookup failed
    Unknown,
}

/// What the gate needs to know about the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateView {
    /// Session verified
    pub verified: bool,
    /// Session locked by a purge
    pub locked: bool,
    /// Privileged device capability; satisfies the verified tier only
    pub privileged_device: bool,
}

/// Route tiers and redirect targets.
#[derive(Debug, Clone)]
pub struct RouteTable {
    verified: Vec<String>,
    licensed: Vec<String>,
    public_entry: String,
    license_redirect: String,
}

fn covers(prefix: &str, route: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    route == prefix
        || route
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
}

impl RouteTable {
    /// Table from route and gateway configuration.
    pub fn new(routes: &RoutesConfig, gateway: &GatewayConfig) -> Self {
        Self {
            verified: routes.verified.clone(),
            licensed: routes.licensed.clone(),
            public_entry: gateway.public_entry.clone(),
            license_redirect: routes.license_redirect.clone(),
        }
    }

    /// Tier of `route`; licensed wins over verified.
    pub fn tier(&self, route: &str) -> RouteTier {
        if self.licensed.iter().any(|p| covers(p, route)) {
            RouteTier::Licensed
        } else if self.verified.iter().any(|p| covers(p, route)) {
            RouteTier::Verified
        } else {
            RouteTier::Public
        }
    }

    /// Where unauthorized callers land.
    pub fn public_entry(&self) -> &str {
        &self.public_entry
    }
}

/// Decide whether `route` may be entered.
pub fn authorize(
    route: &str,
    view: &GateView,
    license: LicenseState,
    table: &RouteTable,
) -> GateDecision {
    let session_ok = !view.locked && view.verified;
    match table.tier(route) {
        RouteTier::Public => GateDecision::Allow,
        RouteTier::Verified if session_ok || (view.privileged_device && !view.locked) => {
            GateDecision::Allow
        }
        RouteTier::Verified => GateDecision::Redirect(table.public_entry.clone()),
        RouteTier::Licensed if !session_ok => GateDecision::Redirect(table.public_entry.clone()),
        RouteTier::Licensed if license == LicenseState::Active => GateDecision::Allow,
        RouteTier::Licensed => GateDecision::Redirect(table.license_redirect.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(&RoutesConfig::default(), &GatewayConfig::default())
    }

    fn verified() -> GateView {
        GateView {
            verified: true,
            ..GateView::default()
        }
    }

    #[test]
    fn public_routes_always_allow() {
        let view = GateView {
            locked: true,
            ..GateView::default()
        };
        assert_eq!(
            authorize("/", &view, LicenseState::Unknown, &table()),
            GateDecision::Allow
        );
        assert_eq!(
            authorize("/wallets", &view, LicenseState::Unknown, &table()),
            GateDecision::Allow
        );
    }

    #[test]
    fn verified_routes_need_verified_unlocked_session() {
        let t = table();
        assert_eq!(
            authorize("/wallet/send", &GateView::default(), LicenseState::Unknown, &t),
            GateDecision::Redirect("/".into())
        );
        assert_eq!(
            authorize("/wallet/send", &verified(), LicenseState::Unknown, &t),
            GateDecision::Allow
        );
        let locked = GateView {
            locked: true,
            ..verified()
        };
        assert_eq!(
            authorize("/vault", &locked, LicenseState::Unknown, &t),
            GateDecision::Redirect("/".into())
        );
    }

    #[test]
    fn licensed_routes_need_license_after_verification() {
        let t = table();
        assert_eq!(t.tier("/treasury/ledger"), RouteTier::Licensed);
        assert_eq!(
            authorize("/treasury", &GateView::default(), LicenseState::Active, &t),
            GateDecision::Redirect("/".into())
        );
        assert_eq!(
            authorize("/treasury", &verified(), LicenseState::Inactive, &t),
            GateDecision::Redirect("/activate".into())
        );
        assert_eq!(
            authorize("/treasury", &verified(), LicenseState::Unknown, &t),
            GateDecision::Redirect("/activate".into())
        );
        assert_eq!(
            authorize("/treasury", &verified(), LicenseState::Active, &t),
            GateDecision::Allow
        );
    }

    #[test]
    fn privileged_device_satisfies_verified_tier_only() {
        let t = table();
        let view = GateView {
            privileged_device: true,
            ..GateView::default()
        };
        assert_eq!(
            authorize("/dashboard", &view, LicenseState::Unknown, &t),
            GateDecision::Allow
        );
        assert_eq!(
            authorize("/treasury", &view, LicenseState::Active, &t),
            GateDecision::Redirect("/".into())
        );
    }
}
