use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn signature_valid(&self, timestamp: &str) {
        info!(target: "audit", event = "signature_valid", timestamp);
    }

    pub fn signature_invalid(&self, reason: &str) {
        warn!(target: "audit", event = "signature_invalid", reason);
    }

    pub fn verification_bypassed(&self) {
        warn!(target: "audit", event = "verification_bypassed");
    }

    pub fn command_received(&self, interaction_id: &str, command: &str) {
        info!(target: "audit", event = "command_received", interaction_id, command);
    }

    pub fn followup_delivered(&self, interaction_id: &str, reported_error: bool) {
        info!(target: "audit", event = "followup_delivered", interaction_id, reported_error);
    }

    pub fn followup_failed(&self, interaction_id: &str, error_msg: &str) {
        warn!(target: "audit", event = "followup_failed", interaction_id, error = error_msg);
    }

    pub fn followup_expired(&self, interaction_id: &str) {
        warn!(target: "audit", event = "followup_expired", interaction_id);
    }
}
