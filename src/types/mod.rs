// Public modules
pub mod chat_request;
pub mod health_status;
pub mod message_param;

// Re-exports
pub use chat_request::ChatRequest;
pub use health_status::HealthStatus;
pub use message_param::{MessageParam, MessageRole};
