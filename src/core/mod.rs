//! 核心编排层：错误、事件协议、流水线阶段、上下文组装、事件流与编排器

pub mod context;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod state;
pub mod stream;

pub use error::{AgentError, StoreError};
pub use events::{event_schema_json, AgentEvent};
pub use orchestrator::{AgentOrchestrator, OrchestratorSettings};
pub use state::PipelinePhase;
pub use stream::{collect_reply, event_channel, AgentEventStream, AgentReply, EventSink};
