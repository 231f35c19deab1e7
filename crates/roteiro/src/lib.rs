pub mod agent;
pub mod capabilities;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod route_state;

pub use agent::Agent;
pub use models::outcome::AgentOutcome;
