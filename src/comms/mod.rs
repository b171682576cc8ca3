pub mod ack;
pub mod api;

pub use api::{create_router, serve, AppState};
