//! Route-level access control.
//!
//! The guard is a pure function of the route's access rule and the derived
//! `is_authenticated` flag. Callers must have initialized the identity
//! manager first; [`crate::PlannerClient::navigate`] does that.

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Only for signed-in users (schedules, profile).
    RequiresAuth,
    /// Only for visitors (login, register).
    RequiresGuest,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

pub fn guard(access: RouteAccess, is_authenticated: bool) -> GuardDecision {
    match (access, is_authenticated) {
        (RouteAccess::RequiresAuth, false) => GuardDecision::Redirect(LOGIN_PATH.to_string()),
        (RouteAccess::RequiresGuest, true) => GuardDecision::Redirect(HOME_PATH.to_string()),
        _ => GuardDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_routes_send_visitors_to_login() {
        assert_eq!(
            guard(RouteAccess::RequiresAuth, false),
            GuardDecision::Redirect("/login".to_string())
        );
        assert_eq!(guard(RouteAccess::RequiresAuth, true), GuardDecision::Allow);
    }

    #[test]
    fn guest_routes_send_users_home() {
        assert_eq!(
            guard(RouteAccess::RequiresGuest, true),
            GuardDecision::Redirect("/".to_string())
        );
        assert_eq!(guard(RouteAccess::RequiresGuest, false), GuardDecision::Allow);
    }

    #[test]
    fn public_routes_always_allow() {
        assert_eq!(guard(RouteAccess::Public, true), GuardDecision::Allow);
        assert_eq!(guard(RouteAccess::Public, false), GuardDecision::Allow);
    }
}
