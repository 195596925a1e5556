use glam::{Mat3, Vec2};
use lottie_model::model::{self as data, PositionProperty, Vec3DefaultZero, Vec3Scale};

use crate::animatable::Timeline;
use crate::errors::SceneError;

fn xy(v: &Vec3DefaultZero) -> Vec2 {
    Vec2::new(v.0[0], v.0[1])
}

#[derive(Clone, Debug, PartialEq)]
pub enum PositionTrack {
    Unified(Timeline<Vec2>),
    Split { x: Timeline<f32>, y: Timeline<f32> },
}

impl PositionTrack {
    fn evaluate(&self, frame: f32) -> Vec2 {
        match self {
            PositionTrack::Unified(p) => p.evaluate(frame),
            PositionTrack::Split { x, y } => Vec2::new(x.evaluate(frame), y.evaluate(frame)),
        }
    }

    fn is_animated(&self) -> bool {
        match self {
            PositionTrack::Unified(p) => p.is_animated(),
            PositionTrack::Split { x, y } => x.is_animated() || y.is_animated(),
        }
    }

    fn shift(&mut self, offset: f32) {
        match self {
            PositionTrack::Unified(p) => p.shift(offset),
            PositionTrack::Split { x, y } => {
                x.shift(offset);
                y.shift(offset);
            }
        }
    }
}

/// Animated anchor, position, scale, rotation and opacity of a layer or
/// shape group.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformTracks {
    pub anchor: Timeline<Vec2>,
    pub position: PositionTrack,
    pub scale: Timeline<Vec2>,
    pub rotation: Timeline<f32>,
    pub opacity: Timeline<f32>,
}

impl Default for TransformTracks {
    fn default() -> Self {
        TransformTracks {
            anchor: Timeline::constant(Vec2::ZERO),
            position: PositionTrack::Unified(Timeline::constant(Vec2::ZERO)),
            scale: Timeline::constant(Vec2::ONE),
            rotation: Timeline::constant(0.0),
            opacity: Timeline::constant(1.0),
        }
    }
}

impl TransformTracks {
    pub fn from_model(t: &data::Transform) -> Result<Self, SceneError> {
        let position = match &t.p {
            PositionProperty::Unified(p) => {
                PositionTrack::Unified(Timeline::from_property(p, xy, Vec2::ZERO, "position")?)
            }
            PositionProperty::Split { x, y } => PositionTrack::Split {
                x: Timeline::from_property(x, |v| *v, 0.0, "position.x")?,
                y: Timeline::from_property(y, |v| *v, 0.0, "position.y")?,
            },
        };

        Ok(TransformTracks {
            anchor: Timeline::from_property(&t.a, xy, Vec2::ZERO, "anchor")?,
            position,
            scale: Timeline::from_property(
                &t.s,
                |v: &Vec3Scale| Vec2::new(v.0[0], v.0[1]) / 100.0,
                Vec2::ONE,
                "scale",
            )?,
            rotation: Timeline::from_property(&t.r, |v| *v, 0.0, "rotation")?,
            opacity: Timeline::from_property(&t.o, |v| *v / 100.0, 1.0, "opacity")?,
        })
    }

    pub fn shift(&mut self, offset: f32) {
        self.anchor.shift(offset);
        self.position.shift(offset);
        self.scale.shift(offset);
        self.rotation.shift(offset);
        self.opacity.shift(offset);
    }

    pub fn is_animated(&self) -> bool {
        self.anchor.is_animated()
            || self.position.is_animated()
            || self.scale.is_animated()
            || self.rotation.is_animated()
            || self.opacity.is_animated()
    }

    pub fn resolve(&self, frame: f32, auto_orient: bool) -> TransformState {
        let anchor = self.anchor.evaluate(frame);
        let position = self.position.evaluate(frame);
        let scale = self.scale.evaluate(frame);
        let mut rotation = self.rotation.evaluate(frame);
        if auto_orient && self.position.is_animated() {
            let ahead = self.position.evaluate(frame + 0.5);
            let behind = self.position.evaluate(frame - 0.5);
            let heading = ahead - behind;
            if heading.length_squared() > f32::EPSILON {
                rotation += heading.y.atan2(heading.x).to_degrees();
            }
        }
        let opacity = self.opacity.evaluate(frame).clamp(0.0, 1.0);

        TransformState {
            anchor,
            position,
            scale,
            rotation,
            opacity,
        }
    }
}

/// Transform values at one frame. Rotation is in degrees, scale and opacity
/// are fractions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformState {
    pub anchor: Vec2,
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
    pub opacity: f32,
}

impl Default for TransformState {
    fn default() -> Self {
        TransformState {
            anchor: Vec2::ZERO,
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

impl TransformState {
    /// T(position) * R(rotation) * S(scale) * T(-anchor)
    pub fn matrix(&self) -> Mat3 {
        Mat3::from_translation(self.position)
            * Mat3::from_angle(self.rotation.to_radians())
            * Mat3::from_scale(self.scale)
            * Mat3::from_translation(-self.anchor)
    }
}
