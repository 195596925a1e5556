use glam::Vec2;
use kurbo::{BezPath, CubicBez, ParamCurve, ParamCurveArclen, Point};
use lottie_model::model::{BezierPath, Property, Value};

use crate::animatable::{Interpolatable, Timeline};
use crate::errors::SceneError;

const ARCLEN_ACCURACY: f64 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicSegment {
    pub cp1: Vec2,
    pub cp2: Vec2,
    pub to: Vec2,
}

/// A single sub-path with absolute control points.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ConcretePath {
    pub start: Vec2,
    pub segments: Vec<CubicSegment>,
    pub closed: bool,
}

fn point(v: Vec2) -> Point {
    Point::new(f64::from(v.x), f64::from(v.y))
}

fn vec2(p: Point) -> Vec2 {
    Vec2::new(p.x as f32, p.y as f32)
}

impl ConcretePath {
    pub fn empty() -> Self {
        ConcretePath::default()
    }

    /// Converts vertex-relative tangents into absolute control points.
    /// Segment k runs from vertex k-1 to vertex k; a closed path gains a final
    /// segment back to vertex 0.
    pub fn from_bezier(path: &BezierPath, closed: bool) -> Self {
        let Some(first) = path.v.first() else {
            return ConcretePath {
                closed,
                ..ConcretePath::default()
            };
        };

        let vertex = |k: usize| Vec2::from(path.v[k]);
        let offset = |tangents: &[[f32; 2]], k: usize| {
            tangents.get(k).copied().map(Vec2::from).unwrap_or(Vec2::ZERO)
        };
        let in_cp = |k: usize| vertex(k) + offset(path.i.as_slice(), k);
        let out_cp = |k: usize| vertex(k) + offset(path.o.as_slice(), k);

        let n = path.v.len();
        let mut segments = Vec::with_capacity(n);
        for k in 1..n {
            segments.push(CubicSegment {
                cp1: out_cp(k - 1),
                cp2: in_cp(k),
                to: vertex(k),
            });
        }
        if closed {
            segments.push(CubicSegment {
                cp1: out_cp(n - 1),
                cp2: in_cp(0),
                to: vertex(0),
            });
        }

        ConcretePath {
            start: Vec2::from(*first),
            segments,
            closed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    fn cubics(&self) -> impl Iterator<Item = CubicBez> + '_ {
        let mut current = self.start;
        self.segments.iter().map(move |seg| {
            let cubic = CubicBez::new(point(current), point(seg.cp1), point(seg.cp2), point(seg.to));
            current = seg.to;
            cubic
        })
    }

    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        if self.is_empty() {
            return path;
        }
        path.move_to(point(self.start));
        for seg in &self.segments {
            path.curve_to(point(seg.cp1), point(seg.cp2), point(seg.to));
        }
        if self.closed {
            path.close_path();
        }
        path
    }

    pub fn length(&self) -> f64 {
        self.cubics().map(|c| c.arclen(ARCLEN_ACCURACY)).sum()
    }

    /// Pairs segments by index. Paths of different segment counts cannot
    /// morph; they switch over at the end of the transition instead.
    pub fn morph(&self, other: &ConcretePath, t: f32) -> ConcretePath {
        if self.segments.len() != other.segments.len() {
            return if t < 1.0 { self.clone() } else { other.clone() };
        }
        ConcretePath {
            start: self.start.lerp(other.start, t),
            segments: self
                .segments
                .iter()
                .zip(&other.segments)
                .map(|(a, b)| CubicSegment {
                    cp1: a.cp1.lerp(b.cp1, t),
                    cp2: a.cp2.lerp(b.cp2, t),
                    to: a.to.lerp(b.to, t),
                })
                .collect(),
            closed: self.closed,
        }
    }

    /// Keeps the part of the path between two fractions of its arc length.
    pub fn trim(&self, start: f32, end: f32) -> ConcretePath {
        let cubics: Vec<CubicBez> = self.cubics().collect();
        let lengths: Vec<f64> = cubics.iter().map(|c| c.arclen(ARCLEN_ACCURACY)).collect();
        let total: f64 = lengths.iter().sum();
        if total <= 0.0 || end <= start {
            return ConcretePath::empty();
        }

        let from = f64::from(start.clamp(0.0, 1.0)) * total;
        let to = f64::from(end.clamp(0.0, 1.0)) * total;

        let mut trimmed = ConcretePath::empty();
        let mut walked = 0.0;
        for (cubic, len) in cubics.iter().zip(&lengths) {
            let seg_start = walked;
            let seg_end = walked + len;
            walked = seg_end;

            let lo = from.max(seg_start);
            let hi = to.min(seg_end);
            if hi <= lo || *len <= 0.0 {
                continue;
            }

            let t0 = cubic.inv_arclen(lo - seg_start, ARCLEN_ACCURACY);
            let t1 = cubic.inv_arclen(hi - seg_start, ARCLEN_ACCURACY);
            let piece = cubic.subsegment(t0..t1);
            if trimmed.is_empty() {
                trimmed.start = vec2(piece.p0);
            }
            trimmed.segments.push(CubicSegment {
                cp1: vec2(piece.p1),
                cp2: vec2(piece.p2),
                to: vec2(piece.p3),
            });
        }
        trimmed
    }
}

impl Interpolatable for ConcretePath {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self.morph(other, t)
    }
}

/// Path data of a shape or mask: fixed, or morphing between keyframed paths.
#[derive(Clone, Debug, PartialEq)]
pub enum PathGeometry {
    Static(ConcretePath),
    Animated(Timeline<ConcretePath>),
}

impl PathGeometry {
    /// `force_closed` covers exporters that flag closure on the shape rather
    /// than on each path, and masks, which are always closed.
    pub fn from_property(prop: &Property<BezierPath>, force_closed: bool) -> Result<Self, SceneError> {
        let convert = |p: &BezierPath| ConcretePath::from_bezier(p, p.c || force_closed);
        match &prop.k {
            Value::Default => Ok(PathGeometry::Static(ConcretePath::empty())),
            Value::Static(p) => Ok(PathGeometry::Static(convert(p))),
            Value::Animated(keyframes) => {
                let timeline = Timeline::from_keyframes(keyframes, convert, "path")?;
                for segment in timeline.segments() {
                    if segment.hold {
                        continue;
                    }
                    if let (Some(from), Some(to)) = (&segment.from, &segment.to) {
                        if from.len() != to.len() {
                            return Err(SceneError::MismatchedPathSegments {
                                from: from.len(),
                                to: to.len(),
                            });
                        }
                    }
                }
                Ok(PathGeometry::Animated(timeline))
            }
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, PathGeometry::Animated(_))
    }

    pub fn shift(&mut self, offset: f32) {
        if let PathGeometry::Animated(timeline) = self {
            timeline.shift(offset);
        }
    }

    pub fn resolve(&self, frame: f32) -> ConcretePath {
        match self {
            PathGeometry::Static(path) => path.clone(),
            PathGeometry::Animated(timeline) => timeline.evaluate(frame),
        }
    }
}

/// Maps trim start/end/offset onto one or two arc-length windows of a path.
/// `start` and `end` are fractions in 0..1, `offset` is in turns.
pub fn trim_windows(start: f32, end: f32, offset: f32) -> Vec<(f32, f32)> {
    let span = end - start;
    if span <= 0.0 {
        return Vec::new();
    }
    if span >= 1.0 {
        return vec![(0.0, 1.0)];
    }
    let shifted = start + offset;
    let lo = shifted - shifted.floor();
    let hi = lo + span;
    if hi <= 1.0 {
        vec![(lo, hi)]
    } else {
        vec![(lo, 1.0), (0.0, hi - 1.0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lottie_model::model::Keyframe;

    fn square(size: f32) -> BezierPath {
        BezierPath::polygon(
            vec![[0.0, 0.0], [size, 0.0], [size, size], [0.0, size]],
            true,
        )
    }

    #[test]
    fn test_from_bezier_uses_absolute_control_points() {
        let path = BezierPath {
            c: false,
            v: vec![[0.0, 0.0], [10.0, 0.0]],
            o: vec![[2.0, 1.0], [0.0, 0.0]],
            i: vec![[0.0, 0.0], [-3.0, 1.0]],
        };
        let concrete = ConcretePath::from_bezier(&path, false);

        assert_eq!(concrete.start, Vec2::new(0.0, 0.0));
        assert_eq!(
            concrete.segments,
            vec![CubicSegment {
                cp1: Vec2::new(2.0, 1.0),
                cp2: Vec2::new(7.0, 1.0),
                to: Vec2::new(10.0, 0.0),
            }]
        );
    }

    #[test]
    fn test_closed_path_returns_to_first_vertex() {
        let concrete = ConcretePath::from_bezier(&square(10.0), true);
        assert_eq!(concrete.len(), 4);
        assert_eq!(concrete.segments[3].to, Vec2::ZERO);

        let open = ConcretePath::from_bezier(&square(10.0), false);
        assert_eq!(open.len(), 3);
        assert!(!open.to_bez_path().elements().is_empty());
    }

    #[test]
    fn test_empty_vertex_list_is_empty_path() {
        let concrete = ConcretePath::from_bezier(&BezierPath::default(), true);
        assert!(concrete.is_empty());
        assert!(concrete.to_bez_path().elements().is_empty());
    }

    #[test]
    fn test_morph_to_itself_is_identity() {
        let p = ConcretePath::from_bezier(&square(12.5), true);
        for t in [0.0, 0.3, 0.5, 1.0] {
            assert_eq!(p.morph(&p, t), p);
        }
    }

    #[test]
    fn test_animated_path_morphs_vertices() {
        let keyframes = vec![
            Keyframe::linear(0.0, Some(square(10.0)), Some(square(20.0))),
            Keyframe::linear(10.0, None, None),
        ];
        let geometry = PathGeometry::from_property(&Property::animated(keyframes), false).unwrap();

        let mid = geometry.resolve(5.0);
        assert_eq!(mid.segments[1].to, Vec2::new(15.0, 15.0));
        assert_eq!(geometry.resolve(10.0), ConcretePath::from_bezier(&square(20.0), true));
    }

    #[test]
    fn test_mismatched_morph_is_rejected() {
        let triangle = BezierPath::polygon(vec![[0.0, 0.0], [5.0, 0.0], [0.0, 5.0]], true);
        let keyframes = vec![
            Keyframe::linear(0.0, Some(square(10.0)), Some(triangle)),
            Keyframe::linear(10.0, None, None),
        ];
        let err = PathGeometry::from_property(&Property::animated(keyframes), false).unwrap_err();
        assert_eq!(err, SceneError::MismatchedPathSegments { from: 4, to: 3 });
    }

    #[test]
    fn test_hold_between_different_paths_is_allowed() {
        let mut empty = Keyframe::linear(0.0, Some(BezierPath::default()), None);
        empty.h = Some(1);
        let keyframes = vec![empty, Keyframe::linear(11.0, Some(square(10.0)), None)];
        let geometry = PathGeometry::from_property(&Property::animated(keyframes), true).unwrap();

        assert!(geometry.resolve(10.0).is_empty());
        assert_eq!(geometry.resolve(11.0).len(), 4);
    }

    #[test]
    fn test_trim_keeps_fraction_of_length() {
        let line = ConcretePath::from_bezier(
            &BezierPath::polygon(vec![[0.0, 0.0], [100.0, 0.0]], false),
            false,
        );
        assert!((line.length() - 100.0).abs() < 1e-2);

        let half = line.trim(0.25, 0.75);
        assert!((half.start.x - 25.0).abs() < 0.1);
        assert!((half.segments[0].to.x - 75.0).abs() < 0.1);
        assert!(line.trim(0.5, 0.5).is_empty());
    }

    #[test]
    fn test_trim_windows_wrap_around() {
        assert_eq!(trim_windows(0.0, 1.0, 0.3), vec![(0.0, 1.0)]);
        assert_eq!(trim_windows(0.2, 0.2, 0.0), Vec::new());
        let windows = trim_windows(0.5, 1.0, 0.25);
        assert_eq!(windows.len(), 2);
        assert!((windows[0].0 - 0.75).abs() < 1e-6);
        assert!((windows[1].1 - 0.25).abs() < 1e-6);
    }
}
