pub mod dispatcher;
pub mod error_report;
pub mod execute;
pub mod resolve;
pub mod schema;
pub mod tasks;

pub use dispatcher::{DeferredTask, Dispatch, InteractionDispatcher, TaskError, TaskOutcome};
pub use error_report::format_error;
pub use resolve::{resolve, CommandValidationError, DirectoryCommand};
pub use tasks::BackgroundTasks;
