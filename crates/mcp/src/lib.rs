pub mod client;
pub mod data_server;
pub mod prompt_server;
pub mod protocol;

pub use client::{route_for, Route, ToolClient, ToolError, TOOL_ROUTES};
pub use protocol::{ErrorCode, ToolCallRequest, ToolCallResponse, ToolErrorBody};
