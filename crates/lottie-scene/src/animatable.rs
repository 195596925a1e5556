use glam::{Vec2, Vec4};
use lottie_model::model::{EasingHandle, Keyframe, Property, Value};

use crate::errors::SceneError;

pub trait Interpolatable: Sized + Clone {
    fn lerp(&self, other: &Self, t: f32) -> Self;

    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        _tan_in: Option<Vec2>,
        _tan_out: Option<Vec2>,
    ) -> Self {
        self.lerp(other, t)
    }
}

impl Interpolatable for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolatable for Vec2 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec2::lerp(*self, *other, t)
    }

    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        tan_in: Option<Vec2>,
        tan_out: Option<Vec2>,
    ) -> Self {
        let t_out = tan_out.unwrap_or(Vec2::ZERO);
        let t_in = tan_in.unwrap_or(Vec2::ZERO);
        if t_out == Vec2::ZERO && t_in == Vec2::ZERO {
            return self.lerp(other, t);
        }

        let p0 = *self;
        let p3 = *other;
        let p1 = p0 + t_out;
        let p2 = p3 + t_in;

        let one_minus_t = 1.0 - t;
        let one_minus_t_sq = one_minus_t * one_minus_t;
        let t_sq = t * t;

        p0 * (one_minus_t_sq * one_minus_t)
            + p1 * (3.0 * one_minus_t_sq * t)
            + p2 * (3.0 * one_minus_t * t_sq)
            + p3 * (t_sq * t)
    }
}

impl Interpolatable for Vec4 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec4::lerp(*self, *other, t)
    }
}

/// Temporal easing of one keyframe segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Easing {
    Linear,
    CubicBezier { p1: Vec2, p2: Vec2 },
}

impl Easing {
    /// Both handles come from the keyframe that opens the segment. A missing
    /// handle falls back to the linear control point on that side.
    pub fn from_handles(out_handle: Option<&EasingHandle>, in_handle: Option<&EasingHandle>) -> Self {
        if out_handle.is_none() && in_handle.is_none() {
            return Easing::Linear;
        }
        let p1 = out_handle
            .map(|h| Vec2::new(h.x.0, h.y.0))
            .unwrap_or(Vec2::ZERO);
        let p2 = in_handle
            .map(|h| Vec2::new(h.x.0, h.y.0))
            .unwrap_or(Vec2::ONE);
        Easing::CubicBezier { p1, p2 }
    }

    pub fn apply(&self, x: f32) -> f32 {
        match *self {
            Easing::Linear => x.clamp(0.0, 1.0),
            Easing::CubicBezier { p1, p2 } => {
                if p1.x == p1.y && p2.x == p2.y {
                    return x.clamp(0.0, 1.0);
                }
                solve_cubic_bezier(p1, p2, x)
            }
        }
    }
}

fn bezier_component(a1: f32, a2: f32, t: f32) -> f32 {
    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * t * a1 + 3.0 * one_minus_t * t * t * a2 + t * t * t
}

fn bezier_slope(a1: f32, a2: f32, t: f32) -> f32 {
    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * a1
        + 6.0 * one_minus_t * t * (a2 - a1)
        + 3.0 * t * t * (1.0 - a2)
}

// Cubic Bezier Easing
pub fn solve_cubic_bezier(p1: Vec2, p2: Vec2, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let t = solve_curve_x(p1.x, p2.x, x);
    bezier_component(p1.y, p2.y, t)
}

fn solve_curve_x(x1: f32, x2: f32, x: f32) -> f32 {
    // Newton-Raphson
    let mut t = x;
    for _ in 0..8 {
        let err = bezier_component(x1, x2, t) - x;
        if err.abs() < 1e-5 {
            return t;
        }
        let dx_dt = bezier_slope(x1, x2, t);
        if dx_dt.abs() < 1e-6 {
            break;
        }
        t -= err / dx_dt;
        if !(0.0..=1.0).contains(&t) {
            break;
        }
    }

    // Bisection when Newton stalls or leaves the unit interval.
    let (mut lo, mut hi) = (0.0_f32, 1.0_f32);
    let mut t = x;
    for _ in 0..32 {
        let est = bezier_component(x1, x2, t);
        if (est - x).abs() < 1e-5 {
            break;
        }
        if est < x {
            lo = t;
        } else {
            hi = t;
        }
        t = (lo + hi) * 0.5;
    }
    t
}

/// Interpolation data between two adjacent keyframes.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment<T> {
    pub start_frame: f32,
    pub end_frame: f32,
    pub from: Option<T>,
    pub to: Option<T>,
    pub easing: Easing,
    pub hold: bool,
    pub tangent_out: Option<Vec2>,
    pub tangent_in: Option<Vec2>,
}

impl<T: Interpolatable> Segment<T> {
    pub fn duration(&self) -> f32 {
        self.end_frame - self.start_frame
    }

    fn first_value(&self) -> Option<&T> {
        self.from.as_ref().or(self.to.as_ref())
    }

    fn last_value(&self) -> Option<&T> {
        self.to.as_ref().or(self.from.as_ref())
    }

    fn value_at(&self, frame: f32) -> Option<T> {
        if self.hold {
            return self.from.clone();
        }
        let (from, to) = (self.from.as_ref()?, self.to.as_ref()?);
        let ratio = (frame - self.start_frame) / self.duration();
        let eased = self.easing.apply(ratio);
        Some(from.lerp_spatial(to, eased, self.tangent_in, self.tangent_out))
    }
}

/// A property sampled by frame number: either a constant or an ordered list
/// of keyframe segments.
#[derive(Clone, Debug, PartialEq)]
pub enum Timeline<T> {
    Constant(T),
    Animated { segments: Vec<Segment<T>>, fallback: T },
}

fn tangent(raw: Option<&Vec<f32>>) -> Option<Vec2> {
    match raw.map(Vec::as_slice) {
        Some([x, y, ..]) => Some(Vec2::new(*x, *y)),
        _ => None,
    }
}

impl<T: Interpolatable> Timeline<T> {
    pub fn constant(value: T) -> Self {
        Timeline::Constant(value)
    }

    /// `default` stands in for properties the exporter omitted entirely.
    pub fn from_property<U>(
        prop: &Property<U>,
        convert: impl Fn(&U) -> T,
        default: T,
        property: &'static str,
    ) -> Result<Self, SceneError> {
        match &prop.k {
            Value::Default => Ok(Timeline::Constant(default)),
            Value::Static(v) => Ok(Timeline::Constant(convert(v))),
            Value::Animated(keyframes) => Self::from_keyframes(keyframes, convert, property),
        }
    }

    /// Segment k spans `[kf[k].t, kf[k+1].t]`; its end value is `kf[k].e`
    /// or the next keyframe's start. A trailing keyframe that carries a value
    /// becomes a zero-duration segment so the final value is reachable.
    pub fn from_keyframes<U>(
        keyframes: &[Keyframe<U>],
        convert: impl Fn(&U) -> T,
        property: &'static str,
    ) -> Result<Self, SceneError> {
        let mut segments = Vec::with_capacity(keyframes.len());
        for (idx, kf) in keyframes.iter().enumerate() {
            let from = kf.s.as_ref().map(&convert);
            let explicit_end = kf.e.as_ref().map(&convert);
            match keyframes.get(idx + 1) {
                Some(next) => {
                    let to = explicit_end.or_else(|| next.s.as_ref().map(&convert));
                    segments.push(Segment {
                        start_frame: kf.t,
                        end_frame: next.t,
                        from,
                        to,
                        easing: Easing::from_handles(kf.o.as_ref(), kf.i.as_ref()),
                        hold: kf.is_hold(),
                        tangent_out: tangent(kf.to.as_ref()),
                        tangent_in: tangent(kf.ti.as_ref()),
                    });
                }
                None if from.is_some() || explicit_end.is_some() => {
                    let to = explicit_end.or_else(|| from.clone());
                    segments.push(Segment {
                        start_frame: kf.t,
                        end_frame: kf.t,
                        from: from.or_else(|| to.clone()),
                        to,
                        easing: Easing::Linear,
                        hold: false,
                        tangent_out: None,
                        tangent_in: None,
                    });
                }
                None => {}
            }
        }

        let fallback = segments
            .iter()
            .find_map(|s| s.first_value().cloned())
            .ok_or(SceneError::EmptyKeyframes(property))?;

        Ok(Timeline::Animated { segments, fallback })
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Timeline::Animated { .. })
    }

    pub fn segments(&self) -> &[Segment<T>] {
        match self {
            Timeline::Constant(_) => &[],
            Timeline::Animated { segments, .. } => segments,
        }
    }

    /// Moves every segment by `offset` frames.
    pub fn shift(&mut self, offset: f32) {
        if let Timeline::Animated { segments, .. } = self {
            for segment in segments.iter_mut() {
                segment.start_frame += offset;
                segment.end_frame += offset;
            }
        }
    }

    pub fn evaluate(&self, frame: f32) -> T {
        match self {
            Timeline::Constant(v) => v.clone(),
            Timeline::Animated { segments, fallback } => {
                Self::evaluate_segments(segments, frame).unwrap_or_else(|| fallback.clone())
            }
        }
    }

    fn evaluate_segments(segments: &[Segment<T>], frame: f32) -> Option<T> {
        let first = segments.first()?;
        let last = segments.last()?;

        if frame <= first.start_frame {
            return first.first_value().cloned();
        }
        if frame >= last.end_frame {
            return last.last_value().cloned();
        }

        for segment in segments {
            if segment.duration() <= 0.0 {
                continue;
            }
            // Half-open, so the next keyframe owns its own frame.
            if segment.start_frame <= frame && frame < segment.end_frame {
                if let Some(value) = segment.value_at(frame) {
                    return Some(value);
                }
            }
        }

        // No usable segment covers the frame; hold the latest value reached.
        segments
            .iter()
            .rev()
            .filter(|s| s.start_frame <= frame)
            .find_map(|s| {
                if frame >= s.end_frame {
                    s.last_value().cloned()
                } else {
                    s.from.clone()
                }
            })
    }
}

/// Color channels may be authored in 0..1 or 0..255; any RGB channel above
/// 1 means the whole color is byte scaled. Alpha defaults to opaque.
pub fn normalize_color(raw: &[f32]) -> Vec4 {
    let channel = |i: usize, default: f32| raw.get(i).copied().unwrap_or(default);
    let rgb = [channel(0, 0.0), channel(1, 0.0), channel(2, 0.0)];
    let divisor = if rgb.iter().any(|c| *c > 1.0) { 255.0 } else { 1.0 };
    let alpha = match raw.get(3) {
        Some(a) if *a > 1.0 => a / 255.0,
        Some(a) => *a,
        None => 1.0,
    };
    Vec4::new(rgb[0] / divisor, rgb[1] / divisor, rgb[2] / divisor, alpha)
}

/// Packs the RGB channels as `0xRRGGBB`.
pub fn color_to_hex(color: Vec4) -> u32 {
    let [r, g, b, _] = color_to_rgba8(color);
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

pub fn color_to_rgba8(color: Vec4) -> [u8; 4] {
    let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).floor() as u8;
    [byte(color.x), byte(color.y), byte(color.z), byte(color.w)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lottie_model::model::Keyframe;

    fn scalar_timeline(keyframes: Vec<Keyframe<f32>>) -> Timeline<f32> {
        Timeline::from_keyframes(&keyframes, |v: &f32| *v, "test").unwrap()
    }

    #[test]
    fn test_evaluate_across_segments() {
        let timeline = scalar_timeline(vec![
            Keyframe::linear(0.0, Some(0.0), Some(10.0)),
            Keyframe::linear(10.0, Some(10.0), Some(20.0)),
            Keyframe::linear(20.0, Some(20.0), Some(30.0)),
        ]);

        assert_eq!(timeline.evaluate(0.0), 0.0);
        assert_eq!(timeline.evaluate(5.0), 5.0);
        assert_eq!(timeline.evaluate(10.0), 10.0);
        assert_eq!(timeline.evaluate(15.0), 15.0);
        // Trailing keyframe carries its own end value.
        assert_eq!(timeline.evaluate(20.0), 30.0);
    }

    #[test]
    fn test_clamps_outside_keyframe_range() {
        let timeline = scalar_timeline(vec![
            Keyframe::linear(10.0, Some(3.0), None),
            Keyframe::linear(20.0, Some(7.0), None),
        ]);

        assert_eq!(timeline.evaluate(-100.0), 3.0);
        assert_eq!(timeline.evaluate(10.0), 3.0);
        assert_eq!(timeline.evaluate(20.0), 7.0);
        assert_eq!(timeline.evaluate(1e6), 7.0);
    }

    #[test]
    fn test_identity_easing_hits_midpoint() {
        let eased = Keyframe::linear(0.0, Some(0.0), Some(100.0))
            .with_easing(EasingHandle::new(0.0, 0.0), EasingHandle::new(1.0, 1.0));
        let timeline = scalar_timeline(vec![eased, Keyframe::linear(10.0, None, None)]);

        assert!((timeline.evaluate(5.0) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_ease_in_out_is_symmetric_and_monotonic() {
        let easing = Easing::from_handles(
            Some(&EasingHandle::new(0.42, 0.0)),
            Some(&EasingHandle::new(0.58, 1.0)),
        );

        assert!((easing.apply(0.5) - 0.5).abs() < 1e-3);
        assert!(easing.apply(0.25) < 0.25);
        assert!(easing.apply(0.75) > 0.75);

        let mut previous = 0.0;
        for step in 1..=20 {
            let y = easing.apply(step as f32 / 20.0);
            assert!(y >= previous);
            previous = y;
        }
        assert_eq!(easing.apply(1.0), 1.0);
    }

    #[test]
    fn test_easing_uses_handles_of_opening_keyframe() {
        let opening = Keyframe::linear(0.0, Some(0.0), Some(1.0))
            .with_easing(EasingHandle::new(0.9, 0.0), EasingHandle::new(1.0, 0.1));
        let closing = Keyframe::linear(10.0, Some(1.0), None)
            .with_easing(EasingHandle::new(0.0, 1.0), EasingHandle::new(0.0, 1.0));
        let timeline = scalar_timeline(vec![opening, closing]);

        // Slow start from the opening keyframe's handles.
        assert!(timeline.evaluate(5.0) < 0.2);
    }

    #[test]
    fn test_hold_keyframe_keeps_start_value() {
        let mut held = Keyframe::linear(0.0, Some(4.0), Some(8.0));
        held.h = Some(1);
        let timeline = scalar_timeline(vec![held, Keyframe::linear(10.0, Some(8.0), None)]);

        assert_eq!(timeline.evaluate(9.99), 4.0);
        assert_eq!(timeline.evaluate(10.0), 8.0);
    }

    #[test]
    fn test_hold_releases_on_next_keyframe_frame() {
        let mut held = Keyframe::linear(0.0, Some(4.0), None);
        held.h = Some(1);
        let timeline = scalar_timeline(vec![
            held,
            Keyframe::linear(10.0, Some(8.0), None),
            Keyframe::linear(20.0, Some(12.0), None),
        ]);

        assert_eq!(timeline.evaluate(9.5), 4.0);
        assert_eq!(timeline.evaluate(10.0), 8.0);
        assert_eq!(timeline.evaluate(15.0), 10.0);
        assert_eq!(timeline.evaluate(20.0), 12.0);
    }

    #[test]
    fn test_zero_is_a_valid_end_value() {
        let timeline = scalar_timeline(vec![
            Keyframe::linear(0.0, Some(10.0), Some(0.0)),
            Keyframe::linear(10.0, None, None),
        ]);

        assert_eq!(timeline.evaluate(5.0), 5.0);
        assert_eq!(timeline.evaluate(10.0), 0.0);
    }

    #[test]
    fn test_zero_duration_segment_is_skipped() {
        let timeline = scalar_timeline(vec![
            Keyframe::linear(0.0, Some(0.0), None),
            Keyframe::linear(10.0, Some(100.0), None),
            Keyframe::linear(10.0, Some(200.0), None),
            Keyframe::linear(20.0, Some(300.0), None),
        ]);

        assert_eq!(timeline.evaluate(5.0), 50.0);
        assert_eq!(timeline.evaluate(15.0), 250.0);
    }

    #[test]
    fn test_segment_without_end_value_holds_latest() {
        let timeline = scalar_timeline(vec![
            Keyframe::linear(0.0, Some(1.0), Some(2.0)),
            Keyframe::linear(10.0, Some(5.0), None),
            Keyframe::linear(20.0, None, None),
        ]);

        assert_eq!(timeline.evaluate(15.0), 5.0);
    }

    #[test]
    fn test_empty_keyframes_are_rejected() {
        let empty: Vec<Keyframe<f32>> = Vec::new();
        let err = Timeline::from_keyframes(&empty, |v: &f32| *v, "opacity").unwrap_err();
        assert_eq!(err, SceneError::EmptyKeyframes("opacity"));

        let valueless = vec![Keyframe::<f32>::linear(0.0, None, None)];
        assert!(Timeline::from_keyframes(&valueless, |v: &f32| *v, "opacity").is_err());
    }

    #[test]
    fn test_shift_moves_keyframes() {
        let mut timeline = scalar_timeline(vec![
            Keyframe::linear(0.0, Some(0.0), None),
            Keyframe::linear(10.0, Some(10.0), None),
        ]);
        timeline.shift(50.0);

        assert_eq!(timeline.evaluate(50.0), 0.0);
        assert_eq!(timeline.evaluate(55.0), 5.0);
        assert_eq!(timeline.segments()[0].start_frame, 50.0);
    }

    #[test]
    fn test_spatial_tangents_bend_position() {
        let mut kf = Keyframe::linear(0.0, Some([0.0_f32, 0.0]), Some([100.0, 0.0]));
        kf.to = Some(vec![0.0, 50.0]);
        kf.ti = Some(vec![0.0, 50.0]);
        let keyframes = vec![kf, Keyframe::linear(10.0, None, None)];
        let timeline =
            Timeline::from_keyframes(&keyframes, |v: &[f32; 2]| Vec2::from(*v), "position").unwrap();

        let mid = timeline.evaluate(5.0);
        assert!((mid.x - 50.0).abs() < 1e-3);
        assert!((mid.y - 37.5).abs() < 1e-3);
    }

    #[test]
    fn test_color_normalization() {
        assert_eq!(normalize_color(&[255.0, 0.0, 0.0]), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(normalize_color(&[0.5, 0.25, 1.0, 0.5]), Vec4::new(0.5, 0.25, 1.0, 0.5));
        assert_eq!(color_to_hex(normalize_color(&[1.0, 0.5, 0.0, 1.0])), 0xFF7F00);
        assert_eq!(color_to_rgba8(Vec4::new(0.0, 1.0, 0.0, 0.5)), [0, 255, 0, 127]);
    }
}
