pub mod agent_factory;
pub mod instructions;
pub mod stateless_llm_factory;
pub mod tool_extractor;
pub mod transcript;

pub mod agents;
pub mod stateless_llm;

pub use agent_factory::*;
pub use stateless_llm_factory::*;
pub use agents::*;
pub use stateless_llm::*;
