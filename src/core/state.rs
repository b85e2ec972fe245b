//! 流水线阶段
//!
//! Start → DocumentInventory → IntentDetection → { Clarify | ToolRound → Generation → Done }，
//! 任一阶段的未处理故障进入 Error。

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Start,
    DocumentInventory,
    IntentDetection,
    Clarify,
    ToolRound,
    Generation,
    Done,
    Error,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Start => "start",
            PipelinePhase::DocumentInventory => "document_inventory",
            PipelinePhase::IntentDetection => "intent_detection",
            PipelinePhase::Clarify => "clarify",
            PipelinePhase::ToolRound => "tool_round",
            PipelinePhase::Generation => "generation",
            PipelinePhase::Done => "done",
            PipelinePhase::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelinePhase::Clarify | PipelinePhase::Done | PipelinePhase::Error
        )
    }

    /// 合法迁移（Error 可从任一非终止阶段进入）
    pub fn can_advance_to(&self, next: PipelinePhase) -> bool {
        use PipelinePhase::*;
        if next == Error {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Start, DocumentInventory)
                | (DocumentInventory, IntentDetection)
                | (IntentDetection, Clarify)
                | (IntentDetection, ToolRound)
                | (ToolRound, Generation)
                | (Generation, Done)
        )
    }
}
