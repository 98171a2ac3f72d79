/// Tool call execution and status rendering
pub mod dispatcher;
/// Per-event conversation handling
pub mod handlers;
/// Prompt history assembly
pub mod history;
/// Chat model invocation
pub mod invoker;
/// Platform-neutral chat types and the platform trait
pub mod platform;
/// Startup wiring
pub mod runner;
/// Slack adapter and Socket Mode listener
pub mod slack;
