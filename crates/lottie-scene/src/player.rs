use lottie_model::Document;
use tracing::{debug, info};

use crate::driver::FrameState;
use crate::errors::SceneError;
use crate::renderer::RenderTree;
use crate::scene::Scene;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Source of the frame a player should show. Looping and wall-clock timing
/// live on this side.
pub trait FrameClock {
    fn target_frame(&self) -> f32;
    fn state(&self) -> PlaybackState;
}

/// Fixed-rate clock advanced by elapsed seconds.
#[derive(Clone, Debug)]
pub struct PlaybackClock {
    frame: f32,
    frame_rate: f32,
    in_point: f32,
    out_point: f32,
    looping: bool,
    state: PlaybackState,
}

impl PlaybackClock {
    pub fn new(frame_rate: f32, in_point: f32, out_point: f32) -> Self {
        PlaybackClock {
            frame: in_point,
            frame_rate,
            in_point,
            out_point,
            looping: false,
            state: PlaybackState::Stopped,
        }
    }

    pub fn for_scene(scene: &Scene) -> Self {
        Self::new(scene.frame_rate, scene.in_point, scene.out_point)
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn play(&mut self) {
        self.state = PlaybackState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.frame = self.in_point;
    }

    /// `dt` is in seconds. Without looping the clock parks on the last frame
    /// and pauses.
    pub fn advance(&mut self, dt: f32) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.frame += dt * self.frame_rate;

        if self.frame >= self.out_point {
            let duration = self.out_point - self.in_point;
            if self.looping && duration > 0.0 {
                self.frame = self.in_point + (self.frame - self.out_point) % duration;
            } else {
                self.frame = self.out_point;
                self.state = PlaybackState::Paused;
            }
        }
    }
}

impl FrameClock for PlaybackClock {
    fn target_frame(&self) -> f32 {
        self.frame
    }

    fn state(&self) -> PlaybackState {
        self.state
    }
}

/// Owns a built scene and the state of the most recently evaluated frame.
pub struct LottiePlayer {
    scene: Option<Scene>,
    pub current_frame: f32,
    pub width: f32,
    pub height: f32,
    pub duration_frames: f32,
    pub frame_rate: f32,
    state: FrameState,
    evaluated: bool,
}

impl Default for LottiePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl LottiePlayer {
    pub fn new() -> Self {
        Self {
            scene: None,
            current_frame: 0.0,
            width: 0.0,
            height: 0.0,
            duration_frames: 0.0,
            frame_rate: 0.0,
            state: FrameState::default(),
            evaluated: false,
        }
    }

    /// Builds the scene and evaluates frame 0. On error the previously
    /// loaded scene is kept.
    pub fn load(&mut self, doc: &Document) -> Result<&FrameState, SceneError> {
        let scene = Scene::build(doc)?;
        info!(
            width = scene.width,
            height = scene.height,
            frames = scene.total_frames(),
            nodes = scene.len(),
            "[Player] scene loaded"
        );
        self.width = scene.width;
        self.height = scene.height;
        self.frame_rate = scene.frame_rate;
        self.duration_frames = scene.total_frames();
        self.scene = Some(scene);
        self.evaluated = false;
        Ok(self.first_frame_snapshot())
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn evaluate_frame(&mut self, frame: f32) -> &FrameState {
        if let Some(scene) = &self.scene {
            scene.evaluate_frame_into(frame, &mut self.state);
            self.evaluated = true;
        }
        self.current_frame = frame;
        &self.state
    }

    /// Like [`evaluate_frame`](Self::evaluate_frame) but rejects frames
    /// outside the document.
    pub fn seek(&mut self, frame: f32) -> Result<&FrameState, SceneError> {
        if let Some(scene) = &self.scene {
            scene.check_frame(frame)?;
        }
        Ok(self.evaluate_frame(frame))
    }

    /// Evaluates the clock's frame when playing or paused and the frame
    /// differs from the last one evaluated.
    pub fn sync(&mut self, clock: &impl FrameClock) -> Option<&FrameState> {
        if clock.state() == PlaybackState::Stopped {
            return None;
        }
        let target = clock.target_frame();
        if self.evaluated && target == self.current_frame {
            return None;
        }
        debug!(frame = target, "[Player] sync");
        Some(self.evaluate_frame(target))
    }

    pub fn first_frame_snapshot(&mut self) -> &FrameState {
        self.evaluate_frame(0.0)
    }

    pub fn frame_state(&self) -> &FrameState {
        &self.state
    }

    pub fn render_tree(&self) -> RenderTree {
        match &self.scene {
            Some(scene) => scene.render_tree(&self.state),
            None => RenderTree::empty(self.width, self.height, self.current_frame),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.scene.is_some() && self.current_frame >= self.duration_frames
    }
}
