//! Application use cases. Orchestrate domain logic via ports.

pub mod auth_service;
pub mod messaging_service;
pub mod photo_uploads;
pub mod tool_dispatcher;

pub use auth_service::AuthService;
pub use messaging_service::MessagingService;
pub use photo_uploads::PhotoUploadTracker;
pub use tool_dispatcher::ToolDispatcher;
