//! Interaction state machine.
//!
//! `dispatch` runs inside the request and never touches the network: it
//! classifies the interaction, resolves the typed command and picks the
//! synchronous response. Anything needing the directory becomes a
//! [`DeferredTask`] that `run` resolves into exactly one follow-up.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::error_report::format_error;
use crate::commands::execute::execute;
use crate::commands::resolve::{resolve, CommandValidationError, DirectoryCommand};
use crate::directory::{DirectoryClient, DirectoryError};
use crate::security::audit_log::AuditLogger;
use crate::transport::followup::FollowupClient;
use crate::transport::{Interaction, InteractionKind, InteractionResponse};

/// How long the platform keeps a reply token valid.
pub const FOLLOWUP_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] CommandValidationError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

#[derive(Debug)]
pub enum DeferredWork {
    Execute(DirectoryCommand),
    Report(CommandValidationError),
}

/// Background work bound to one reply token.
#[derive(Debug)]
pub struct DeferredTask {
    pub interaction_id: String,
    pub reply_token: String,
    pub work: DeferredWork,
}

/// Result of the synchronous phase.
#[derive(Debug)]
pub enum Dispatch {
    /// Reply with this body and do nothing else.
    Respond(InteractionResponse),
    /// Reply with a deferred acknowledgment, then run the task.
    Defer(DeferredTask),
    /// Interaction type this relay does not handle.
    Unsupported(u8),
}

impl Dispatch {
    pub fn response(&self) -> Option<InteractionResponse> {
        match self {
            Dispatch::Respond(resp) => Some(resp.clone()),
            Dispatch::Defer(_) => Some(InteractionResponse::deferred()),
            Dispatch::Unsupported(_) => None,
        }
    }
}

/// Terminal state of a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Success message sent.
    Delivered,
    /// Error message sent.
    Reported,
    /// Follow-up POST failed; not retried.
    Undelivered,
    /// Work outlived the reply token.
    Expired,
}

#[derive(Debug, Clone)]
pub struct InteractionDispatcher {
    directory: DirectoryClient,
    followup: FollowupClient,
    audit: AuditLogger,
    window: Duration,
}

impl InteractionDispatcher {
    pub fn new(directory: DirectoryClient, followup: FollowupClient) -> Self {
        Self {
            directory,
            followup,
            audit: AuditLogger::new(),
            window: FOLLOWUP_WINDOW,
        }
    }

    /// Override the follow-up window. Used by tests.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn dispatch(&self, interaction: &Interaction) -> Dispatch {
        match interaction.kind() {
            InteractionKind::Ping => Dispatch::Respond(InteractionResponse::pong()),
            InteractionKind::Unsupported(kind) => Dispatch::Unsupported(kind),
            InteractionKind::Command => {
                let data = interaction.data.clone().unwrap_or_default();
                self.audit.command_received(&interaction.id, &data.name);

                let work = match resolve(&data) {
                    Ok(command) => DeferredWork::Execute(command),
                    Err(e) if e.responds_immediately() => {
                        debug!(interaction_id = %interaction.id, error = %e, "rejecting command synchronously");
                        return Dispatch::Respond(InteractionResponse::ephemeral(e.to_string()));
                    }
                    Err(e) => DeferredWork::Report(e),
                };

                Dispatch::Defer(DeferredTask {
                    interaction_id: interaction.id.clone(),
                    reply_token: interaction.token.clone(),
                    work,
                })
            }
        }
    }

    /// Drive a deferred task to exactly one follow-up, bounded by the
    /// follow-up window.
    pub async fn run(&self, task: DeferredTask) -> TaskOutcome {
        let interaction_id = task.interaction_id.clone();
        match tokio::time::timeout(self.window, self.complete(task)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(interaction_id = %interaction_id, "deferred task exceeded follow-up window");
                self.audit.followup_expired(&interaction_id);
                TaskOutcome::Expired
            }
        }
    }

    async fn complete(&self, task: DeferredTask) -> TaskOutcome {
        let result = match task.work {
            DeferredWork::Execute(command) => execute(&self.directory, &command)
                .await
                .map_err(TaskError::from),
            DeferredWork::Report(e) => Err(TaskError::from(e)),
        };

        let (content, reported) = match result {
            Ok(message) => (message, false),
            Err(e) => {
                info!(interaction_id = %task.interaction_id, error = %e, "command failed");
                (format_error(&e), true)
            }
        };

        match self.followup.send(&task.reply_token, &content).await {
            Ok(()) => {
                self.audit.followup_delivered(&task.interaction_id, reported);
                if reported {
                    TaskOutcome::Reported
                } else {
                    TaskOutcome::Delivered
                }
            }
            Err(e) => {
                self.audit.followup_failed(&task.interaction_id, &format!("{:#}", e));
                TaskOutcome::Undelivered
            }
        }
    }
}
