//! Turns a parsed animation document into a resolved scene graph and
//! evaluates it frame by frame.
//!
//! ```no_run
//! use lottie_model::Document;
//! use lottie_scene::Scene;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = Document::from_json_str(&std::fs::read_to_string("anim.json")?)?;
//! let scene = Scene::build(&doc)?;
//! let state = scene.evaluate_frame(12.0);
//! let tree = scene.render_tree(&state);
//! println!("{} draw commands", tree.draw_list().len());
//! # Ok(())
//! # }
//! ```

pub mod animatable;
pub mod driver;
pub mod errors;
pub mod path;
pub mod player;
pub mod renderer;
pub mod scene;
pub mod shapes;
pub mod transform;

pub use animatable::{Easing, Interpolatable, Segment, Timeline};
pub use driver::{ContentState, FrameState, MaskState, NodeState};
pub use errors::SceneError;
pub use path::{ConcretePath, CubicSegment, PathGeometry};
pub use player::{FrameClock, LottiePlayer, PlaybackClock, PlaybackState};
pub use renderer::*;
pub use scene::{Composition, NodeId, NodeKind, NodeOrigin, Scene, SceneNode};
