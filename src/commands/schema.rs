//! Slash-command definitions published to the chat platform.

use anyhow::{Context, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::config::DiscordConfig;
use crate::transport::{OPTION_STRING, OPTION_SUB_COMMAND, OPTION_SUB_COMMAND_GROUP};

/// Application command type for chat input (slash) commands.
const CHAT_INPUT: u8 = 1;

fn text(name: &str, description: &str, required: bool) -> Value {
    let mut option = json!({ "type": OPTION_STRING, "name": name, "description": description });
    if required {
        option["required"] = Value::Bool(true);
    }
    option
}

fn sub(name: &str, description: &str, options: Vec<Value>) -> Value {
    json!({ "type": OPTION_SUB_COMMAND, "name": name, "description": description, "options": options })
}

fn group(name: &str, description: &str, subcommands: Vec<Value>) -> Value {
    json!({ "type": OPTION_SUB_COMMAND_GROUP, "name": name, "description": description, "options": subcommands })
}

/// Top-level command definitions: `user`, `group` and `admin`.
pub fn command_definitions() -> Vec<Value> {
    let group_key = || text("group", "group key or email", true);
    let user_key = || text("user", "user key or email", true);

    vec![
        json!({
            "name": "user",
            "type": CHAT_INPUT,
            "description": "Look up a directory user",
            "options": [text("email", "user email", true)],
        }),
        json!({
            "name": "group",
            "type": CHAT_INPUT,
            "description": "List the members of a group",
            "options": [text("email", "group email", true)],
        }),
        json!({
            "name": "admin",
            "type": CHAT_INPUT,
            "description": "Directory administration",
            "options": [
                group("groups", "Manage groups", vec![
                    sub("create", "Create a group", vec![
                        text("email", "group@example.com", true),
                        text("name", "display name", false),
                        text("description", "description", false),
                    ]),
                    sub("update", "Update a group", vec![
                        group_key(),
                        text("name", "display name", false),
                        text("description", "description", false),
                    ]),
                    sub("get", "Show a group", vec![group_key()]),
                    sub("list", "List groups", vec![
                        text("domain", "example.com", false),
                        text("customer", "my_customer", false),
                    ]),
                    sub("list-for-user", "List the groups of a user", vec![
                        text("user", "user@example.com", true),
                    ]),
                    sub("delete", "Delete a group", vec![group_key()]),
                ]),
                group("members", "Manage group members", vec![
                    sub("add", "Add a member", vec![
                        group_key(),
                        text("email", "user@example.com", true),
                        text("role", "MEMBER/MANAGER/OWNER", false),
                    ]),
                    sub("update", "Change a membership", vec![
                        group_key(),
                        text("member", "member key or email", true),
                        text("role", "MEMBER/MANAGER/OWNER", false),
                    ]),
                    sub("list", "List all members", vec![group_key()]),
                    sub("remove", "Remove a member", vec![
                        group_key(),
                        text("member", "member key or email", true),
                    ]),
                ]),
                group("aliases", "Manage group aliases", vec![
                    sub("add", "Add an alias", vec![group_key(), text("alias", "alias@example.com", true)]),
                    sub("list", "List aliases", vec![group_key()]),
                    sub("delete", "Delete an alias", vec![group_key(), text("alias", "alias@example.com", true)]),
                ]),
                group("orgunits", "Manage organizational units", vec![
                    sub("create", "Create an org unit", vec![
                        text("name", "name", true),
                        text("parent", "/Parent", false),
                        text("description", "description", false),
                    ]),
                    sub("update", "Update an org unit", vec![
                        text("path", "/Parent/Child", true),
                        text("name", "name", false),
                        text("description", "description", false),
                        text("parent", "new parent", false),
                    ]),
                    sub("get", "Show an org unit", vec![text("path", "/Parent/Child", true)]),
                    sub("list", "List org units", vec![]),
                    sub("delete", "Delete an org unit", vec![text("path", "/Parent/Child", true)]),
                ]),
                group("roles", "Manage admin roles", vec![
                    sub("list", "List roles", vec![]),
                    sub("assignments", "List role assignments", vec![
                        text("user", "user@example.com", false),
                    ]),
                    sub("assign", "Assign a role", vec![
                        text("role_id", "role id", true),
                        text("assigned_to", "user or group id", true),
                        text("scope_type", "CUSTOMER/ORG_UNIT", false),
                        text("org_unit_id", "org unit id", false),
                    ]),
                ]),
                group("users", "Manage users", vec![
                    sub("create", "Create a user", vec![
                        text("email", "user@example.com", true),
                        text("given_name", "given name", true),
                        text("family_name", "family name", true),
                        text("password", "initial password", true),
                    ]),
                    sub("update", "Update a user", vec![
                        user_key(),
                        text("org_unit_path", "/OU", false),
                    ]),
                    sub("make-admin", "Grant or revoke super admin", vec![
                        user_key(),
                        text("status", "true/false", true),
                    ]),
                    sub("get", "Show a user", vec![user_key()]),
                    sub("list", "List users", vec![
                        text("domain", "example.com", false),
                        text("customer", "my_customer", false),
                    ]),
                    sub("delete", "Delete a user", vec![user_key()]),
                    sub("undelete", "Restore a deleted user", vec![user_key()]),
                ]),
                group("user-aliases", "Manage user aliases", vec![
                    sub("create", "Add an alias", vec![user_key(), text("alias", "alias@example.com", true)]),
                    sub("list", "List aliases", vec![user_key()]),
                    sub("delete", "Delete an alias", vec![user_key(), text("alias", "alias@example.com", true)]),
                ]),
            ],
        }),
    ]
}

/// Publish every command definition, stopping at the first rejection.
pub async fn register_commands(discord: &DiscordConfig, http: &Client) -> Result<usize> {
    let url = format!(
        "{}/applications/{}/commands",
        discord.api_base.trim_end_matches('/'),
        discord.app_id
    );
    let definitions = command_definitions();
    for definition in &definitions {
        let name = definition["name"].as_str().unwrap_or_default();
        let resp = http
            .post(&url)
            .header(AUTHORIZATION, format!("Bot {}", discord.bot_token))
            .json(definition)
            .send()
            .await
            .with_context(|| format!("registering command {}", name))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("registering command {} failed: {} {}", name, status, body);
        }
        info!(command = name, status = %status.as_u16(), "command registered");
    }
    Ok(definitions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::resolve::resolve;
    use crate::transport::{CommandData, CommandOption};
    use mockito::Server;

    fn find<'a>(options: &'a Value, name: &str) -> &'a Value {
        options
            .as_array()
            .unwrap()
            .iter()
            .find(|o| o["name"] == name)
            .unwrap_or_else(|| panic!("no option named {name}"))
    }

    #[test]
    fn definitions_cover_top_level_commands() {
        let defs = command_definitions();
        let names: Vec<&str> = defs.iter().filter_map(|d| d["name"].as_str()).collect();
        assert_eq!(names, vec!["user", "group", "admin"]);
    }

    #[test]
    fn every_admin_subcommand_resolves_with_required_options() {
        let defs = command_definitions();
        let admin = &defs[2];
        for group in admin["options"].as_array().unwrap() {
            for sub in group["options"].as_array().unwrap() {
                let leaves: Vec<CommandOption> = sub["options"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter(|o| o["required"] == true)
                    .map(|o| {
                        let value = if o["name"] == "status" { "true" } else { "x@example.com" };
                        serde_json::from_value(json!({"name": o["name"], "type": 3, "value": value})).unwrap()
                    })
                    .collect();
                let data = CommandData {
                    name: "admin".into(),
                    options: vec![CommandOption {
                        name: group["name"].as_str().unwrap().into(),
                        kind: OPTION_SUB_COMMAND_GROUP,
                        value: None,
                        options: vec![CommandOption {
                            name: sub["name"].as_str().unwrap().into(),
                            kind: OPTION_SUB_COMMAND,
                            value: None,
                            options: leaves,
                        }],
                    }],
                };
                assert!(
                    resolve(&data).is_ok(),
                    "admin {} {} did not resolve",
                    group["name"],
                    sub["name"]
                );
            }
        }
    }

    #[test]
    fn member_role_is_optional() {
        let defs = command_definitions();
        let members = find(&defs[2]["options"], "members");
        let add = find(&members["options"], "add");
        let role = find(&add["options"], "role");
        assert!(role.get("required").is_none());
    }

    #[tokio::test]
    async fn register_posts_each_definition() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/applications/42/commands")
            .match_header("authorization", "Bot bot-secret")
            .with_status(201)
            .expect(3)
            .create_async()
            .await;

        let discord = DiscordConfig {
            public_key: "ab".into(),
            bot_token: "bot-secret".into(),
            app_id: "42".into(),
            api_base: server.url(),
        };
        let count = register_commands(&discord, &Client::new()).await.unwrap();
        assert_eq!(count, 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn register_stops_on_rejection() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/applications/42/commands")
            .with_status(400)
            .with_body(r#"{"message":"Invalid Form Body"}"#)
            .expect(1)
            .create_async()
            .await;

        let discord = DiscordConfig {
            public_key: "ab".into(),
            bot_token: "bot".into(),
            app_id: "42".into(),
            api_base: server.url(),
        };
        let err = register_commands(&discord, &Client::new()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid Form Body"));
        mock.assert_async().await;
    }
}
