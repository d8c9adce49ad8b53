pub mod executor;
pub mod registry;
pub mod schema;
pub mod search;

pub use executor::{ToolCallOutcome, ToolCallReport, ToolExecutor};
pub use registry::{Tool, ToolError, ToolRegistry};
pub use schema::parameters_schema_for;
pub use search::{SearchArgs, TavilySearchTool, TAVILY_SEARCH};
