pub mod health;
pub mod mcp_http;
pub mod tools;
pub mod ui;
