//! OAuth scopes for the directory API.

pub const USER: &str = "https://www.googleapis.com/auth/admin.directory.user";
pub const USER_READONLY: &str = "https://www.googleapis.com/auth/admin.directory.user.readonly";
pub const USER_ALIAS: &str = "https://www.googleapis.com/auth/admin.directory.user.alias";
pub const USER_SECURITY: &str = "https://www.googleapis.com/auth/admin.directory.user.security";
pub const GROUP: &str = "https://www.googleapis.com/auth/admin.directory.group";
pub const GROUP_READONLY: &str = "https://www.googleapis.com/auth/admin.directory.group.readonly";
pub const GROUP_MEMBER: &str = "https://www.googleapis.com/auth/admin.directory.group.member";
pub const GROUP_MEMBER_READONLY: &str =
    "https://www.googleapis.com/auth/admin.directory.group.member.readonly";
pub const ORGUNIT: &str = "https://www.googleapis.com/auth/admin.directory.orgunit";
pub const ORGUNIT_READONLY: &str =
    "https://www.googleapis.com/auth/admin.directory.orgunit.readonly";
pub const ROLE_MANAGEMENT: &str =
    "https://www.googleapis.com/auth/admin.directory.rolemanagement";
pub const ROLE_MANAGEMENT_READONLY: &str =
    "https://www.googleapis.com/auth/admin.directory.rolemanagement.readonly";

/// Parse a comma-separated scope list, dropping blanks.
pub fn parse_scope_list(raw: &str) -> Vec<String> {
    let mut scopes = Vec::new();
    for item in raw.split(',') {
        let scope = item.trim();
        if !scope.is_empty() && !scopes.iter().any(|s: &String| s == scope) {
            scopes.push(scope.to_string());
        }
    }
    scopes
}

/// The scope set actually requested from the token endpoint.
///
/// A non-empty override replaces the per-call request entirely.
pub fn effective_scopes(requested: &[&str], scope_override: &[String]) -> Vec<String> {
    if scope_override.is_empty() {
        requested.iter().map(|s| s.to_string()).collect()
    } else {
        scope_override.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_skips_blanks() {
        let scopes = parse_scope_list(" a, ,b,a ,");
        assert_eq!(scopes, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn empty_override_keeps_request() {
        let scopes = effective_scopes(&[USER_READONLY], &[]);
        assert_eq!(scopes, vec![USER_READONLY.to_string()]);
    }

    #[test]
    fn override_replaces_request_entirely() {
        let override_set = vec![GROUP.to_string()];
        let scopes = effective_scopes(&[USER_READONLY, USER], &override_set);
        assert_eq!(scopes, override_set);
    }
}
