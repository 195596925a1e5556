// lottie-model: Serde structs for exported keyframe animation documents
pub mod model;

pub use model::{Asset, Document, Layer, LayerType};
