use thiserror::Error;

use crate::material::shader::ShaderStage;

/// Contract violations surfaced to the pass driver.
///
/// Per-node problems (unsupported modes, stage mismatches) never end up here;
/// they are logged and replaced with neutral values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("shader stage `{stage}` was never created in context `{context}`")]
    StageNotCreated { stage: ShaderStage, context: String },
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("graph `{0}` has no output node")]
    NoOutputNode(String),
    #[error("node `{node}` has no output socket `{socket}`")]
    UnknownOutputSocket { node: String, socket: String },
}
