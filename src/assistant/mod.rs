//! 远端 Assistant 层：协议类型、客户端抽象与实现（OpenAI Assistants HTTP / Mock）

pub mod mock;
pub mod openai;
pub mod traits;
pub mod types;

pub use mock::{MockAssistantClient, MockStep};
pub use openai::OpenAiAssistantClient;
pub use traits::AssistantClient;
pub use types::{Run, RunStatus, SortOrder, ThreadId, ToolCall, ToolOutput};
