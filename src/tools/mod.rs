//! 工具层：参数包、注册表、执行器与各能力的执行器实现

pub mod documents;
pub mod executor;
pub mod memories;
pub mod params;
pub mod registry;
pub mod schema;

pub const SEARCH_DOCUMENTS: &str = "search_documents";
pub const GET_ALL_USER_DOCUMENTS: &str = "get_all_user_documents";
pub const GET_DOCUMENT_BY_NAME: &str = "get_document_by_name";
pub const LIST_DOCUMENTS: &str = "list_documents";
pub const SEARCH_MEMORIES: &str = "search_memories";
pub const GET_RECENT_MEMORIES: &str = "get_recent_memories";

pub use documents::{register_document_tools, DocumentGroup};
pub use executor::ToolExecutor;
pub use memories::register_memory_tools;
pub use params::{ToolParams, IDENTITY_KEY};
pub use registry::{
    Handler, RegistryError, ToolDefinition, ToolError, ToolHandler, ToolOutput, ToolRegistry,
    ToolResult, ToolSpec,
};
pub use schema::{ParamSpec, ParamType};
