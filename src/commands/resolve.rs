//! Typed command schema resolved from the interaction option tree.
//!
//! Every variant carries its validated fields, so execution never has to
//! look anything up by name again.

use thiserror::Error;

use crate::directory::{MemberRole, ScopeType};
use crate::transport::{CommandData, CommandOption};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandValidationError {
    #[error("{command}: missing required argument(s): {}", .fields.join(", "))]
    MissingArguments {
        command: String,
        fields: Vec<&'static str>,
    },
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0}: a subcommand group is required")]
    MissingSubcommandGroup(String),
    #[error("{command}: unknown subcommand group {group}")]
    UnknownSubcommandGroup { command: String, group: String },
    #[error("{0}: a subcommand is required")]
    MissingSubcommand(String),
    #[error("{group}: unknown subcommand {subcommand}")]
    UnknownSubcommand { group: String, subcommand: String },
    #[error("{field}: invalid value {value:?}, expected one of {}", .expected.join("|"))]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static [&'static str],
    },
}

impl CommandValidationError {
    /// Failures answered in the synchronous response instead of a follow-up.
    pub fn responds_immediately(&self) -> bool {
        match self {
            Self::UnknownCommand(_) | Self::MissingSubcommandGroup(_) => true,
            Self::MissingArguments { command, .. } => command == "user" || command == "group",
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCommand {
    User { email: String },
    Group { email: String },
    Admin(AdminCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Groups(GroupsCommand),
    Members(MembersCommand),
    Aliases(AliasesCommand),
    OrgUnits(OrgUnitsCommand),
    Roles(RolesCommand),
    Users(UsersCommand),
    UserAliases(UserAliasesCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupsCommand {
    Create {
        email: String,
        name: Option<String>,
        description: Option<String>,
    },
    Update {
        group: String,
        name: Option<String>,
        description: Option<String>,
    },
    Get { group: String },
    List {
        domain: Option<String>,
        customer: Option<String>,
    },
    ListForUser { user: String },
    Delete { group: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembersCommand {
    Add {
        group: String,
        email: String,
        role: MemberRole,
    },
    Update {
        group: String,
        member: String,
        role: MemberRole,
    },
    List { group: String },
    Remove { group: String, member: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasesCommand {
    Add { group: String, alias: String },
    List { group: String },
    Delete { group: String, alias: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgUnitsCommand {
    Create {
        name: String,
        parent: Option<String>,
        description: Option<String>,
    },
    Update {
        path: String,
        name: Option<String>,
        description: Option<String>,
        parent: Option<String>,
    },
    Get { path: String },
    List,
    Delete { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolesCommand {
    List,
    Assignments { user: Option<String> },
    Assign {
        role_id: String,
        assigned_to: String,
        scope_type: Option<ScopeType>,
        org_unit_id: Option<String>,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub enum UsersCommand {
    Create {
        email: String,
        given_name: String,
        family_name: String,
        password: String,
    },
    Update {
        user: String,
        org_unit_path: Option<String>,
    },
    MakeAdmin { user: String, status: bool },
    Get { user: String },
    List {
        domain: Option<String>,
        customer: Option<String>,
    },
    Delete { user: String },
    Undelete { user: String },
}

impl std::fmt::Debug for UsersCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create {
                email,
                given_name,
                family_name,
                ..
            } => f
                .debug_struct("Create")
                .field("email", email)
                .field("given_name", given_name)
                .field("family_name", family_name)
                .field("password", &"<redacted>")
                .finish(),
            Self::Update { user, org_unit_path } => f
                .debug_struct("Update")
                .field("user", user)
                .field("org_unit_path", org_unit_path)
                .finish(),
            Self::MakeAdmin { user, status } => f
                .debug_struct("MakeAdmin")
                .field("user", user)
                .field("status", status)
                .finish(),
            Self::Get { user } => f.debug_struct("Get").field("user", user).finish(),
            Self::List { domain, customer } => f
                .debug_struct("List")
                .field("domain", domain)
                .field("customer", customer)
                .finish(),
            Self::Delete { user } => f.debug_struct("Delete").field("user", user).finish(),
            Self::Undelete { user } => f.debug_struct("Undelete").field("user", user).finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAliasesCommand {
    Create { user: String, alias: String },
    List { user: String },
    Delete { user: String, alias: String },
}

const STATUS_VALUES: &[&str] = &["true", "false"];

/// Collects leaf values for one subcommand and remembers every missing
/// required field so they can be reported together.
struct Args<'a> {
    command: String,
    options: &'a [CommandOption],
    missing: Vec<&'static str>,
}

impl<'a> Args<'a> {
    fn new(command: impl Into<String>, options: &'a [CommandOption]) -> Self {
        Self {
            command: command.into(),
            options,
            missing: Vec::new(),
        }
    }

    fn optional(&self, name: &str) -> Option<String> {
        find(self.options, name).and_then(CommandOption::text_value)
    }

    fn required(&mut self, name: &'static str) -> String {
        self.optional(name).unwrap_or_else(|| {
            self.missing.push(name);
            String::new()
        })
    }

    fn choice<T>(
        &self,
        name: &'static str,
        expected: &'static [&'static str],
        parse: fn(&str) -> Option<T>,
    ) -> Result<Option<T>, CommandValidationError> {
        match self.optional(name) {
            None => Ok(None),
            Some(raw) => parse(&raw).map(Some).ok_or(CommandValidationError::InvalidValue {
                field: name,
                value: raw,
                expected,
            }),
        }
    }

    fn finish(self) -> Result<(), CommandValidationError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(CommandValidationError::MissingArguments {
                command: self.command,
                fields: self.missing,
            })
        }
    }
}

/// First option with a matching name wins.
fn find<'a>(options: &'a [CommandOption], name: &str) -> Option<&'a CommandOption> {
    options.iter().find(|o| o.name == name)
}

fn parse_status(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

pub fn resolve(data: &CommandData) -> Result<DirectoryCommand, CommandValidationError> {
    match data.name.as_str() {
        "user" => {
            let mut args = Args::new("user", &data.options);
            let email = args.required("email");
            args.finish()?;
            Ok(DirectoryCommand::User { email })
        }
        "group" => {
            let mut args = Args::new("group", &data.options);
            let email = args.required("email");
            args.finish()?;
            Ok(DirectoryCommand::Group { email })
        }
        "admin" => resolve_admin(&data.options).map(DirectoryCommand::Admin),
        other => Err(CommandValidationError::UnknownCommand(other.to_string())),
    }
}

fn resolve_admin(options: &[CommandOption]) -> Result<AdminCommand, CommandValidationError> {
    let group = options
        .first()
        .ok_or_else(|| CommandValidationError::MissingSubcommandGroup("admin".to_string()))?;
    let sub = group
        .options
        .first()
        .ok_or_else(|| CommandValidationError::MissingSubcommand(format!("admin {}", group.name)))?;
    let path = format!("admin {} {}", group.name, sub.name);
    let args = Args::new(path, &sub.options);

    let sub_name = sub.name.as_str();
    let resolved = match group.name.as_str() {
        "groups" => resolve_groups(sub_name, args).map(AdminCommand::Groups),
        "members" => resolve_members(sub_name, args).map(AdminCommand::Members),
        "aliases" => resolve_aliases(sub_name, args).map(AdminCommand::Aliases),
        "orgunits" => resolve_org_units(sub_name, args).map(AdminCommand::OrgUnits),
        "roles" => resolve_roles(sub_name, args).map(AdminCommand::Roles),
        "users" => resolve_users(sub_name, args).map(AdminCommand::Users),
        "user-aliases" => resolve_user_aliases(sub_name, args).map(AdminCommand::UserAliases),
        other => {
            return Err(CommandValidationError::UnknownSubcommandGroup {
                command: "admin".to_string(),
                group: other.to_string(),
            })
        }
    };
    resolved.map_err(|e| {
        e.unwrap_or_else(|| CommandValidationError::UnknownSubcommand {
            group: format!("admin {}", group.name),
            subcommand: sub.name.clone(),
        })
    })
}

/// `Err(None)` means the subcommand name is not part of the group.
type Resolved<T> = Result<T, Option<CommandValidationError>>;

fn resolve_groups(sub: &str, mut args: Args<'_>) -> Resolved<GroupsCommand> {
    let cmd = match sub {
        "create" => GroupsCommand::Create {
            email: args.required("email"),
            name: args.optional("name"),
            description: args.optional("description"),
        },
        "update" => GroupsCommand::Update {
            group: args.required("group"),
            name: args.optional("name"),
            description: args.optional("description"),
        },
        "get" => GroupsCommand::Get {
            group: args.required("group"),
        },
        "list" => GroupsCommand::List {
            domain: args.optional("domain"),
            customer: args.optional("customer"),
        },
        "list-for-user" => GroupsCommand::ListForUser {
            user: args.required("user"),
        },
        "delete" => GroupsCommand::Delete {
            group: args.required("group"),
        },
        _ => return Err(None),
    };
    args.finish().map_err(Some)?;
    Ok(cmd)
}

fn resolve_members(sub: &str, mut args: Args<'_>) -> Resolved<MembersCommand> {
    let cmd = match sub {
        "add" => {
            let role = member_role(&args).map_err(Some)?;
            MembersCommand::Add {
                group: args.required("group"),
                email: args.required("email"),
                role,
            }
        }
        "update" => {
            let role = member_role(&args).map_err(Some)?;
            MembersCommand::Update {
                group: args.required("group"),
                member: args.required("member"),
                role,
            }
        }
        "list" => MembersCommand::List {
            group: args.required("group"),
        },
        "remove" => MembersCommand::Remove {
            group: args.required("group"),
            member: args.required("member"),
        },
        _ => return Err(None),
    };
    args.finish().map_err(Some)?;
    Ok(cmd)
}

fn member_role(args: &Args<'_>) -> Result<MemberRole, CommandValidationError> {
    Ok(args
        .choice("role", MemberRole::NAMES, MemberRole::parse)?
        .unwrap_or_default())
}

fn resolve_aliases(sub: &str, mut args: Args<'_>) -> Resolved<AliasesCommand> {
    let cmd = match sub {
        "add" => AliasesCommand::Add {
            group: args.required("group"),
            alias: args.required("alias"),
        },
        "list" => AliasesCommand::List {
            group: args.required("group"),
        },
        "delete" => AliasesCommand::Delete {
            group: args.required("group"),
            alias: args.required("alias"),
        },
        _ => return Err(None),
    };
    args.finish().map_err(Some)?;
    Ok(cmd)
}

fn resolve_org_units(sub: &str, mut args: Args<'_>) -> Resolved<OrgUnitsCommand> {
    let cmd = match sub {
        "create" => OrgUnitsCommand::Create {
            name: args.required("name"),
            parent: args.optional("parent"),
            description: args.optional("description"),
        },
        "update" => OrgUnitsCommand::Update {
            path: args.required("path"),
            name: args.optional("name"),
            description: args.optional("description"),
            parent: args.optional("parent"),
        },
        "get" => OrgUnitsCommand::Get {
            path: args.required("path"),
        },
        "list" => OrgUnitsCommand::List,
        "delete" => OrgUnitsCommand::Delete {
            path: args.required("path"),
        },
        _ => return Err(None),
    };
    args.finish().map_err(Some)?;
    Ok(cmd)
}

fn resolve_roles(sub: &str, mut args: Args<'_>) -> Resolved<RolesCommand> {
    let cmd = match sub {
        "list" => RolesCommand::List,
        "assignments" => RolesCommand::Assignments {
            user: args.optional("user"),
        },
        "assign" => {
            let scope_type = args
                .choice("scope_type", ScopeType::NAMES, ScopeType::parse)
                .map_err(Some)?;
            RolesCommand::Assign {
                role_id: args.required("role_id"),
                assigned_to: args.required("assigned_to"),
                scope_type,
                org_unit_id: args.optional("org_unit_id"),
            }
        }
        _ => return Err(None),
    };
    args.finish().map_err(Some)?;
    Ok(cmd)
}

fn resolve_users(sub: &str, mut args: Args<'_>) -> Resolved<UsersCommand> {
    let cmd = match sub {
        "create" => UsersCommand::Create {
            email: args.required("email"),
            given_name: args.required("given_name"),
            family_name: args.required("family_name"),
            password: args.required("password"),
        },
        "update" => UsersCommand::Update {
            user: args.required("user"),
            org_unit_path: args.optional("org_unit_path"),
        },
        "make-admin" => {
            let user = args.required("user");
            let status = match args.choice("status", STATUS_VALUES, parse_status).map_err(Some)? {
                Some(status) => status,
                None => {
                    args.missing.push("status");
                    false
                }
            };
            UsersCommand::MakeAdmin { user, status }
        }
        "get" => UsersCommand::Get {
            user: args.required("user"),
        },
        "list" => UsersCommand::List {
            domain: args.optional("domain"),
            customer: args.optional("customer"),
        },
        "delete" => UsersCommand::Delete {
            user: args.required("user"),
        },
        "undelete" => UsersCommand::Undelete {
            user: args.required("user"),
        },
        _ => return Err(None),
    };
    args.finish().map_err(Some)?;
    Ok(cmd)
}

fn resolve_user_aliases(sub: &str, mut args: Args<'_>) -> Resolved<UserAliasesCommand> {
    let cmd = match sub {
        "create" => UserAliasesCommand::Create {
            user: args.required("user"),
            alias: args.required("alias"),
        },
        "list" => UserAliasesCommand::List {
            user: args.required("user"),
        },
        "delete" => UserAliasesCommand::Delete {
            user: args.required("user"),
            alias: args.required("alias"),
        },
        _ => return Err(None),
    };
    args.finish().map_err(Some)?;
    Ok(cmd)
}
