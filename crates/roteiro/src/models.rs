//! These models represent the objects passed around by the agent
//!
//! The conversation exchanged with the model is built from these types. Providers convert
//! them to and from their own wire formats (for example openai chat completions), and the
//! capability modules only ever see a `ToolCall` and produce a `CapabilityResult`.
pub mod message;
pub mod outcome;
pub mod role;
pub mod tool;
