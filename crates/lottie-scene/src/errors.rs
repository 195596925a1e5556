use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("Asset not found: {0}")]
    MissingAsset(String),
    #[error("Layer {0} needs a refId but has none")]
    MissingReference(String),
    #[error("Layer {layer} has parent {parent} which does not exist")]
    MissingParent { layer: String, parent: u32 },
    #[error("Parent chain loops back to layer {0}")]
    ParentCycle(u32),
    #[error("Asset {0} references itself")]
    SelfReference(String),
    #[error("Recursion depth limit exceeded")]
    RecursionLimit,
    #[error("Property {0} has no keyframe values")]
    EmptyKeyframes(&'static str),
    #[error("Cannot morph a path of {from} segments into one of {to} segments")]
    MismatchedPathSegments { from: usize, to: usize },
    #[error("Layer {layer} ends at {out_frame} before it starts at {in_frame}")]
    InvalidLayerRange {
        layer: String,
        in_frame: f32,
        out_frame: f32,
    },
    #[error("Frame {frame} is outside the document range 0..={total}")]
    FrameOutOfRange { frame: f32, total: f32 },
}

impl SceneError {
    /// Structural errors abort scene construction; range errors are advisory.
    pub fn is_structural(&self) -> bool {
        !matches!(self, SceneError::FrameOutOfRange { .. })
    }
}
