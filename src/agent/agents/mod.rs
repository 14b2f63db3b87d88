pub mod agent_interface;
pub mod guard_agent;
pub mod model_agent;

pub use agent_interface::*;
pub use guard_agent::*;
pub use model_agent::*;
