use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::fmt;
use tracing::{debug, trace};

use crate::transport::FollowupMessage;

/// Platform cap on message content, in characters.
pub const MAX_CONTENT_CHARS: usize = 2000;
const TRUNCATION_MARKER: &str = "\n…(truncated)";
const FENCE_CLOSE: &str = "\n```";

/// Delivers deferred results through the per-interaction webhook.
#[derive(Clone)]
pub struct FollowupClient {
    api_base: String,
    app_id: String,
    bot_token: String,
    http: Client,
}

impl FollowupClient {
    pub fn new(
        api_base: impl Into<String>,
        app_id: impl Into<String>,
        bot_token: impl Into<String>,
        http: Client,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            app_id: app_id.into(),
            bot_token: bot_token.into(),
            http,
        }
    }

    pub fn webhook_url(&self, reply_token: &str) -> String {
        format!(
            "{}/webhooks/{}/{}",
            self.api_base.trim_end_matches('/'),
            self.app_id,
            reply_token
        )
    }

    /// POST one follow-up message. The response body is not consumed and
    /// failures are not retried.
    pub async fn send(&self, reply_token: &str, content: &str) -> Result<()> {
        let url = self.webhook_url(reply_token);
        let payload = FollowupMessage {
            content: truncate_content(content),
        };

        trace!(app_id = %self.app_id, content_len = payload.content.len(), "sending follow-up");

        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bot {}", self.bot_token))
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await
            .context("follow-up send")?;

        let status = resp.status();
        debug!(status_code = %status.as_u16(), "follow-up webhook responded");
        if status.is_success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("follow-up delivery failed: {}", status))
        }
    }
}

impl fmt::Debug for FollowupClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FollowupClient")
            .field("api_base", &self.api_base)
            .field("app_id", &self.app_id)
            .finish()
    }
}

/// Clamp content to the platform limit, keeping whole characters. A code
/// fence left open by the cut is closed after the marker.
pub fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content.to_string();
    }
    let keep = MAX_CONTENT_CHARS - TRUNCATION_MARKER.chars().count() - FENCE_CLOSE.chars().count();
    let mut out: String = content.chars().take(keep).collect();
    let fence_open = out.matches("```").count() % 2 == 1;
    out.push_str(TRUNCATION_MARKER);
    if fence_open {
        out.push_str(FENCE_CLOSE);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn send_posts_content_with_bot_auth() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/webhooks/app-1/reply-token")
            .match_header("authorization", "Bot bot-secret")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"content": "done"})))
            .with_status(200)
            .create_async()
            .await;

        let client = FollowupClient::new(server.url(), "app-1", "bot-secret", Client::new());
        client.send("reply-token", "done").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/webhooks/app-1/expired")
            .with_status(404)
            .create_async()
            .await;

        let client = FollowupClient::new(server.url(), "app-1", "bot", Client::new());
        assert!(client.send("expired", "late").await.is_err());
    }

    #[test]
    fn webhook_url_tolerates_trailing_slash() {
        let client = FollowupClient::new("https://chat.example/api/", "7", "b", Client::new());
        assert_eq!(client.webhook_url("tok"), "https://chat.example/api/webhooks/7/tok");
    }

    #[test]
    fn long_content_is_truncated_to_limit() {
        let long = "ü".repeat(MAX_CONTENT_CHARS + 50);
        let out = truncate_content(&long);
        assert!(out.chars().count() <= MAX_CONTENT_CHARS);
        assert!(out.ends_with("(truncated)"));
        assert_eq!(truncate_content("short"), "short");
    }

    #[test]
    fn truncated_error_block_keeps_closing_fence() {
        let fenced = format!("```\n{}\n```", "x".repeat(MAX_CONTENT_CHARS * 2));
        let out = truncate_content(&fenced);
        assert_eq!(out.chars().count(), MAX_CONTENT_CHARS);
        assert!(out.ends_with("(truncated)\n```"));
        assert_eq!(out.matches("```").count(), 2);
    }

    #[test]
    fn debug_hides_bot_token() {
        let client = FollowupClient::new("https://x", "7", "very-secret", Client::new());
        assert!(!format!("{:?}", client).contains("very-secret"));
    }
}
