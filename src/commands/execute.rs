use crate::commands::resolve::*;
use crate::directory::*;

/// Lines shown before a list collapses into a total count.
pub const LIST_PREVIEW: usize = 25;

/// Run one resolved command and render the follow-up text.
pub async fn execute(directory: &DirectoryClient, command: &DirectoryCommand) -> Result<String, DirectoryError> {
    match command {
        DirectoryCommand::User { email } => {
            let user = directory.get_user(email).await?;
            Ok(user_summary(&user, email))
        }
        DirectoryCommand::Group { email } => {
            let members = directory.list_group_members(email).await?;
            Ok(member_list("Members", &members))
        }
        DirectoryCommand::Admin(admin) => execute_admin(directory, admin).await,
    }
}

async fn execute_admin(directory: &DirectoryClient, command: &AdminCommand) -> Result<String, DirectoryError> {
    match command {
        AdminCommand::Groups(cmd) => groups(directory, cmd).await,
        AdminCommand::Members(cmd) => members(directory, cmd).await,
        AdminCommand::Aliases(cmd) => group_aliases(directory, cmd).await,
        AdminCommand::OrgUnits(cmd) => org_units(directory, cmd).await,
        AdminCommand::Roles(cmd) => roles(directory, cmd).await,
        AdminCommand::Users(cmd) => users(directory, cmd).await,
        AdminCommand::UserAliases(cmd) => user_aliases(directory, cmd).await,
    }
}

async fn groups(directory: &DirectoryClient, cmd: &GroupsCommand) -> Result<String, DirectoryError> {
    match cmd {
        GroupsCommand::Create {
            email,
            name,
            description,
        } => {
            let group = directory
                .create_group(&NewGroup {
                    email: email.clone(),
                    name: name.clone(),
                    description: description.clone(),
                })
                .await?;
            Ok(format!("Group created: {}", or(&group.email, email)))
        }
        GroupsCommand::Update {
            group,
            name,
            description,
        } => {
            let patch = GroupPatch {
                name: name.clone(),
                description: description.clone(),
            };
            let updated = directory.update_group(group, &patch).await?;
            Ok(format!("Group updated: {}", or(&updated.email, group)))
        }
        GroupsCommand::Get { group } => {
            let found = directory.get_group(group).await?;
            Ok(format!(
                "Group: {} ({})",
                or(&found.email, group),
                or(&found.name, "-")
            ))
        }
        GroupsCommand::List { domain, customer } => {
            let filter = ListFilter {
                domain: domain.clone(),
                customer: customer.clone(),
            };
            let groups = directory.list_groups(&filter).await?;
            let lines: Vec<String> = groups.iter().map(|g| format!("- {}", or(&g.email, "-"))).collect();
            Ok(preview("Groups", "groups", &lines))
        }
        GroupsCommand::ListForUser { user } => {
            let groups = directory.list_groups_for_member(user).await?;
            if groups.is_empty() {
                return Ok("(none)".to_string());
            }
            Ok(groups
                .iter()
                .map(|g| format!("- {}", or(&g.email, "-")))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        GroupsCommand::Delete { group } => {
            directory.delete_group(group).await?;
            Ok(format!("Group deleted: {}", group))
        }
    }
}

async fn members(directory: &DirectoryClient, cmd: &MembersCommand) -> Result<String, DirectoryError> {
    match cmd {
        MembersCommand::Add { group, email, role } => {
            directory.add_group_member(group, email, *role).await?;
            Ok(format!("Member added: {}", email))
        }
        MembersCommand::Update { group, member, role } => {
            directory.update_group_member(group, member, *role).await?;
            Ok(format!("Membership updated: {} -> {}", member, role_name(*role)))
        }
        MembersCommand::List { group } => {
            let members = directory.list_group_members(group).await?;
            Ok(member_list("Members", &members))
        }
        MembersCommand::Remove { group, member } => {
            directory.remove_group_member(group, member).await?;
            Ok(format!("Member removed: {}", member))
        }
    }
}

async fn group_aliases(directory: &DirectoryClient, cmd: &AliasesCommand) -> Result<String, DirectoryError> {
    match cmd {
        AliasesCommand::Add { group, alias } => {
            directory.add_group_alias(group, alias).await?;
            Ok(format!("Alias added: {}", alias))
        }
        AliasesCommand::List { group } => {
            let aliases = directory.list_group_aliases(group).await?;
            Ok(alias_list(&aliases))
        }
        AliasesCommand::Delete { group, alias } => {
            directory.delete_group_alias(group, alias).await?;
            Ok(format!("Alias deleted: {}", alias))
        }
    }
}

async fn org_units(directory: &DirectoryClient, cmd: &OrgUnitsCommand) -> Result<String, DirectoryError> {
    match cmd {
        OrgUnitsCommand::Create {
            name,
            parent,
            description,
        } => {
            let unit = directory
                .create_org_unit(&NewOrgUnit {
                    name: name.clone(),
                    parent_org_unit_path: parent.clone().unwrap_or_else(|| "/".to_string()),
                    description: description.clone(),
                })
                .await?;
            Ok(format!("Org unit created: {}", or(&unit.org_unit_path, name)))
        }
        OrgUnitsCommand::Update {
            path,
            name,
            description,
            parent,
        } => {
            let patch = OrgUnitPatch {
                name: name.clone(),
                description: description.clone(),
                parent_org_unit_path: parent.clone(),
            };
            let unit = directory.update_org_unit(path, &patch).await?;
            Ok(format!("Org unit updated: {}", or(&unit.org_unit_path, path)))
        }
        OrgUnitsCommand::Get { path } => {
            let unit = directory.get_org_unit(path).await?;
            Ok(format!(
                "Org unit: {} ({})",
                or(&unit.org_unit_path, path),
                or(&unit.name, "-")
            ))
        }
        OrgUnitsCommand::List => {
            let units = directory.list_org_units().await?;
            let lines: Vec<String> = units
                .iter()
                .map(|u| format!("- {}", or(&u.org_unit_path, "-")))
                .collect();
            Ok(preview("Org units", "org units", &lines))
        }
        OrgUnitsCommand::Delete { path } => {
            directory.delete_org_unit(path).await?;
            Ok(format!("Org unit deleted: {}", path))
        }
    }
}

async fn roles(directory: &DirectoryClient, cmd: &RolesCommand) -> Result<String, DirectoryError> {
    match cmd {
        RolesCommand::List => {
            let roles = directory.list_roles().await?;
            let lines: Vec<String> = roles
                .iter()
                .map(|r| format!("- {} ({})", or(&r.role_name, "-"), or(&r.role_id, "-")))
                .collect();
            Ok(preview("Roles", "roles", &lines))
        }
        RolesCommand::Assignments { user } => {
            let assignments = directory.list_role_assignments(user.as_deref()).await?;
            let lines: Vec<String> = assignments
                .iter()
                .map(|a| {
                    format!(
                        "- role {} -> {} ({})",
                        or(&a.role_id, "-"),
                        or(&a.assigned_to, "-"),
                        or(&a.scope_type, "-")
                    )
                })
                .collect();
            Ok(preview("Role assignments", "assignments", &lines))
        }
        RolesCommand::Assign {
            role_id,
            assigned_to,
            scope_type,
            org_unit_id,
        } => {
            let assignment = directory
                .create_role_assignment(&NewRoleAssignment {
                    role_id: role_id.clone(),
                    assigned_to: assigned_to.clone(),
                    scope_type: *scope_type,
                    org_unit_id: org_unit_id.clone(),
                })
                .await?;
            Ok(format!(
                "Role assigned: {} -> {} (assignment {})",
                role_id,
                assigned_to,
                or(&assignment.role_assignment_id, "-")
            ))
        }
    }
}

async fn users(directory: &DirectoryClient, cmd: &UsersCommand) -> Result<String, DirectoryError> {
    match cmd {
        UsersCommand::Create {
            email,
            given_name,
            family_name,
            password,
        } => {
            let user = directory
                .create_user(&NewUser {
                    primary_email: email.clone(),
                    name: NewUserName {
                        given_name: given_name.clone(),
                        family_name: family_name.clone(),
                    },
                    password: password.clone(),
                })
                .await?;
            Ok(format!("User created: {}", or(&user.primary_email, email)))
        }
        UsersCommand::Update { user, org_unit_path } => {
            let patch = UserPatch {
                org_unit_path: org_unit_path.clone(),
            };
            let updated = directory.update_user(user, &patch).await?;
            Ok(format!("User updated: {}", or(&updated.primary_email, user)))
        }
        UsersCommand::MakeAdmin { user, status } => {
            directory.make_user_admin(user, *status).await?;
            Ok(format!("Admin status for {}: {}", user, status))
        }
        UsersCommand::Get { user } => {
            let found = directory.get_user(user).await?;
            Ok(user_summary(&found, user))
        }
        UsersCommand::List { domain, customer } => {
            let filter = ListFilter {
                domain: domain.clone(),
                customer: customer.clone(),
            };
            let users = directory.list_users(&filter).await?;
            let lines: Vec<String> = users
                .iter()
                .map(|u| format!("- {}", or(&u.primary_email, "-")))
                .collect();
            Ok(preview("Users", "users", &lines))
        }
        UsersCommand::Delete { user } => {
            directory.delete_user(user).await?;
            Ok(format!("User deleted: {}", user))
        }
        UsersCommand::Undelete { user } => {
            directory.undelete_user(user).await?;
            Ok(format!("User restored: {}", user))
        }
    }
}

async fn user_aliases(directory: &DirectoryClient, cmd: &UserAliasesCommand) -> Result<String, DirectoryError> {
    match cmd {
        UserAliasesCommand::Create { user, alias } => {
            directory.create_user_alias(user, alias).await?;
            Ok(format!("Alias added for {}: {}", user, alias))
        }
        UserAliasesCommand::List { user } => {
            let aliases = directory.list_user_aliases(user).await?;
            Ok(alias_list(&aliases))
        }
        UserAliasesCommand::Delete { user, alias } => {
            directory.delete_user_alias(user, alias).await?;
            Ok(format!("Alias deleted for {}: {}", user, alias))
        }
    }
}

fn or<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value.as_deref().filter(|v| !v.is_empty()).unwrap_or(fallback)
}

fn role_name(role: MemberRole) -> &'static str {
    match role {
        MemberRole::Member => "MEMBER",
        MemberRole::Manager => "MANAGER",
        MemberRole::Owner => "OWNER",
    }
}

pub fn user_summary(user: &User, requested: &str) -> String {
    let full_name = user.name.as_ref().and_then(|n| n.full_name.clone());
    [
        format!("Name: {}", or(&full_name, "-")),
        format!("Primary Email: {}", or(&user.primary_email, requested)),
        format!("Org Unit: {}", or(&user.org_unit_path, "-")),
        format!(
            "Suspended: {}",
            if user.suspended.unwrap_or(false) { "Yes" } else { "No" }
        ),
    ]
    .join("\n")
}

pub fn member_list(title: &str, members: &[Member]) -> String {
    let lines: Vec<String> = members
        .iter()
        .map(|m| format!("- {} ({})", or(&m.email, "-"), or(&m.role, "-")))
        .collect();
    preview(title, "members", &lines)
}

fn alias_list(aliases: &[Alias]) -> String {
    if aliases.is_empty() {
        return "(none)".to_string();
    }
    aliases
        .iter()
        .map(|a| format!("- {}", or(&a.alias, "-")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Title:` followed by the first [`LIST_PREVIEW`] lines, plus a total when
/// the list is longer.
fn preview(title: &str, noun: &str, lines: &[String]) -> String {
    let mut out = format!("{}:", title);
    for line in lines.iter().take(LIST_PREVIEW) {
        out.push('\n');
        out.push_str(line);
    }
    if lines.len() > LIST_PREVIEW {
        out.push_str(&format!("\n... {} {} total", lines.len(), noun));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_summary_lists_core_fields() {
        let user = User {
            primary_email: Some("a@x.com".into()),
            name: Some(UserName {
                full_name: Some("Ada X".into()),
                ..Default::default()
            }),
            org_unit_path: Some("/Eng".into()),
            suspended: Some(false),
            ..Default::default()
        };
        assert_eq!(
            user_summary(&user, "a@x.com"),
            "Name: Ada X\nPrimary Email: a@x.com\nOrg Unit: /Eng\nSuspended: No"
        );
    }

    #[test]
    fn user_summary_falls_back_to_requested_email() {
        let summary = user_summary(&User::default(), "b@x.com");
        assert!(summary.contains("Primary Email: b@x.com"));
        assert!(summary.contains("Name: -"));
    }

    #[test]
    fn member_list_caps_preview_and_reports_total() {
        let members: Vec<Member> = (0..30)
            .map(|i| Member {
                email: Some(format!("m{}@x.com", i)),
                role: Some("MEMBER".into()),
            })
            .collect();
        let out = member_list("Members", &members);
        assert!(out.starts_with("Members:\n- m0@x.com (MEMBER)"));
        assert!(out.contains("- m24@x.com (MEMBER)"));
        assert!(!out.contains("m25@x.com"));
        assert!(out.ends_with("... 30 members total"));
    }

    #[test]
    fn short_list_has_no_total_line() {
        let members = vec![Member {
            email: Some("solo@x.com".into()),
            role: Some("OWNER".into()),
        }];
        assert_eq!(member_list("Members", &members), "Members:\n- solo@x.com (OWNER)");
    }
}
