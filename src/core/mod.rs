//! 核心编排层：错误、状态投影、会话控制、主控循环

pub mod error;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use error::RelayError;
pub use orchestrator::{
    create_components, create_components_with, create_session, Command, Components,
};
pub use session::{InteractionOutcome, SessionController};
pub use state::{AgentPhase, UiState};
