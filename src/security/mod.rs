pub mod audit_log;
pub mod scopes;
pub mod service_account;
pub mod signature;
pub mod token_issuer;
