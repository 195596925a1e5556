use glam::{Vec2, Vec4};
use lottie_model::model::{self as data, Vec3DefaultZero};
use tracing::debug;

use crate::animatable::{normalize_color, Timeline};
use crate::errors::SceneError;
use crate::path::{trim_windows, ConcretePath, PathGeometry};
use crate::renderer::{Fill, LineCap, LineJoin, Stroke};
use crate::transform::{TransformState, TransformTracks};

fn xy(v: &Vec3DefaultZero) -> Vec2 {
    Vec2::new(v.0[0], v.0[1])
}

fn color(raw: &Vec<f32>) -> Vec4 {
    normalize_color(raw)
}

fn percent(v: &f32) -> f32 {
    *v / 100.0
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathProperty {
    pub name: Option<String>,
    pub geometry: PathGeometry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FillProperty {
    pub name: Option<String>,
    pub color: Timeline<Vec4>,
    pub opacity: Timeline<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StrokeProperty {
    pub name: Option<String>,
    pub color: Timeline<Vec4>,
    pub width: Timeline<f32>,
    pub opacity: Timeline<f32>,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: Option<f32>,
    pub fill_enabled: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrimProperty {
    pub name: Option<String>,
    pub start: Timeline<f32>,
    pub end: Timeline<f32>,
    pub offset: Timeline<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RectProperty {
    pub name: Option<String>,
    pub position: Timeline<Vec2>,
    pub size: Timeline<Vec2>,
    pub roundness: Timeline<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EllipseProperty {
    pub name: Option<String>,
    pub position: Timeline<Vec2>,
    pub size: Timeline<Vec2>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShapeElement {
    Path(PathProperty),
    Stroke(StrokeProperty),
    Trim(TrimProperty),
    Rect(RectProperty),
    Ellipse(EllipseProperty),
    Fill(FillProperty),
    Transform(TransformTracks),
}

impl ShapeElement {
    /// `None` for shape kinds this engine does not draw.
    pub fn from_model(shape: &data::Shape) -> Result<Option<Self>, SceneError> {
        let element = match shape {
            data::Shape::Path(p) => ShapeElement::Path(PathProperty {
                name: p.nm.clone(),
                geometry: PathGeometry::from_property(&p.ks, p.closed.unwrap_or(false))?,
            }),
            data::Shape::Stroke(s) => ShapeElement::Stroke(StrokeProperty {
                name: s.nm.clone(),
                color: Timeline::from_property(&s.c, color, Vec4::W, "stroke.color")?,
                width: Timeline::from_property(&s.w, |v| *v, 1.0, "stroke.width")?,
                opacity: Timeline::from_property(&s.o, percent, 1.0, "stroke.opacity")?,
                cap: LineCap::from(s.lc),
                join: LineJoin::from(s.lj),
                miter_limit: s.ml,
                fill_enabled: s.fill_enabled,
            }),
            data::Shape::Trim(t) => ShapeElement::Trim(TrimProperty {
                name: t.nm.clone(),
                start: Timeline::from_property(&t.s, |v| *v, 0.0, "trim.start")?,
                end: Timeline::from_property(&t.e, |v| *v, 100.0, "trim.end")?,
                offset: Timeline::from_property(&t.o, |v| *v, 0.0, "trim.offset")?,
            }),
            data::Shape::Rect(r) => ShapeElement::Rect(RectProperty {
                name: r.nm.clone(),
                position: Timeline::from_property(&r.p, xy, Vec2::ZERO, "rect.position")?,
                size: Timeline::from_property(&r.s, xy, Vec2::ZERO, "rect.size")?,
                roundness: Timeline::from_property(&r.r, |v| *v, 0.0, "rect.roundness")?,
            }),
            data::Shape::Ellipse(e) => ShapeElement::Ellipse(EllipseProperty {
                name: e.nm.clone(),
                position: Timeline::from_property(&e.p, xy, Vec2::ZERO, "ellipse.position")?,
                size: Timeline::from_property(&e.s, xy, Vec2::ZERO, "ellipse.size")?,
            }),
            data::Shape::Fill(f) => ShapeElement::Fill(FillProperty {
                name: f.nm.clone(),
                color: Timeline::from_property(&f.c, color, Vec4::W, "fill.color")?,
                opacity: Timeline::from_property(&f.o, percent, 1.0, "fill.opacity")?,
            }),
            data::Shape::Transform(t) => ShapeElement::Transform(TransformTracks::from_model(&t.t)?),
            data::Shape::Group(g) => {
                debug!(group = ?g.nm, "nested shape group skipped");
                return Ok(None);
            }
            data::Shape::Unknown => {
                debug!("unsupported shape type skipped");
                return Ok(None);
            }
        };
        Ok(Some(element))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ShapeElement::Path(_) => "path",
            ShapeElement::Stroke(_) => "stroke",
            ShapeElement::Trim(_) => "trim",
            ShapeElement::Rect(_) => "rect",
            ShapeElement::Ellipse(_) => "ellipse",
            ShapeElement::Fill(_) => "fill",
            ShapeElement::Transform(_) => "transform-group",
        }
    }

    pub fn shift(&mut self, offset: f32) {
        match self {
            ShapeElement::Path(p) => p.geometry.shift(offset),
            ShapeElement::Stroke(s) => {
                s.color.shift(offset);
                s.width.shift(offset);
                s.opacity.shift(offset);
            }
            ShapeElement::Trim(t) => {
                t.start.shift(offset);
                t.end.shift(offset);
                t.offset.shift(offset);
            }
            ShapeElement::Rect(r) => {
                r.position.shift(offset);
                r.size.shift(offset);
                r.roundness.shift(offset);
            }
            ShapeElement::Ellipse(e) => {
                e.position.shift(offset);
                e.size.shift(offset);
            }
            ShapeElement::Fill(f) => {
                f.color.shift(offset);
                f.opacity.shift(offset);
            }
            ShapeElement::Transform(t) => t.shift(offset),
        }
    }
}

/// The items of one `gr` shape, or a lone top-level primitive, drawn
/// together with a shared fill, stroke and trim.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ShapeGroup {
    pub name: Option<String>,
    pub elements: Vec<ShapeElement>,
}

impl ShapeGroup {
    pub fn from_model(shape: &data::Shape) -> Result<Self, SceneError> {
        match shape {
            data::Shape::Group(group) => {
                let mut elements = Vec::with_capacity(group.it.len());
                for item in &group.it {
                    if let Some(element) = ShapeElement::from_model(item)? {
                        elements.push(element);
                    }
                }
                Ok(ShapeGroup {
                    name: group.nm.clone(),
                    elements,
                })
            }
            other => Ok(ShapeGroup {
                name: None,
                elements: ShapeElement::from_model(other)?.into_iter().collect(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn shift(&mut self, offset: f32) {
        for element in &mut self.elements {
            element.shift(offset);
        }
    }

    pub fn resolve(&self, frame: f32) -> ResolvedGroup {
        let mut resolved = ResolvedGroup {
            name: self.name.clone(),
            ..ResolvedGroup::default()
        };

        // The last fill, stroke, trim or transform of a group wins.
        for element in &self.elements {
            match element {
                ShapeElement::Path(_) => {}
                ShapeElement::Fill(f) => {
                    resolved.fill = Some(FillState {
                        color: f.color.evaluate(frame),
                        opacity: f.opacity.evaluate(frame),
                    })
                }
                ShapeElement::Stroke(s) => {
                    resolved.stroke = Some(StrokeState {
                        color: s.color.evaluate(frame),
                        width: s.width.evaluate(frame),
                        opacity: s.opacity.evaluate(frame),
                        cap: s.cap,
                        join: s.join,
                        miter_limit: s.miter_limit,
                        fill_enabled: s.fill_enabled,
                    })
                }
                ShapeElement::Trim(t) => {
                    resolved.trim = Some(TrimState::new(
                        t.start.evaluate(frame),
                        t.end.evaluate(frame),
                        t.offset.evaluate(frame),
                    ))
                }
                ShapeElement::Rect(r) => resolved.rects.push(RectState {
                    position: r.position.evaluate(frame),
                    size: r.size.evaluate(frame),
                    roundness: r.roundness.evaluate(frame),
                }),
                ShapeElement::Ellipse(e) => resolved.ellipses.push(EllipseState {
                    center: e.position.evaluate(frame),
                    size: e.size.evaluate(frame),
                }),
                ShapeElement::Transform(t) => resolved.transform = Some(t.resolve(frame, false)),
            }
        }

        // Paths draw bottom-up: reverse of declaration order.
        for element in self.elements.iter().rev() {
            if let ShapeElement::Path(p) = element {
                let path = p.geometry.resolve(frame);
                match resolved.trim {
                    Some(trim) => {
                        for (start, end) in trim.windows() {
                            let piece = path.trim(start, end);
                            if !piece.is_empty() {
                                resolved.paths.push(piece);
                            }
                        }
                    }
                    None => resolved.paths.push(path),
                }
            }
        }

        resolved
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillState {
    pub color: Vec4,
    pub opacity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeState {
    pub color: Vec4,
    pub width: f32,
    pub opacity: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: Option<f32>,
    pub fill_enabled: bool,
}

/// Trim range in percent, always low-to-high, plus offset in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrimState {
    pub start: f32,
    pub end: f32,
    pub offset: f32,
}

impl TrimState {
    pub fn new(start: f32, end: f32, offset: f32) -> Self {
        let (start, end) = if start > end { (end, start) } else { (start, end) };
        TrimState { start, end, offset }
    }

    /// Arc-length windows, as fractions of the path length.
    pub fn windows(&self) -> Vec<(f32, f32)> {
        trim_windows(self.start / 100.0, self.end / 100.0, self.offset / 360.0)
    }
}

/// `position` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectState {
    pub position: Vec2,
    pub size: Vec2,
    pub roundness: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EllipseState {
    pub center: Vec2,
    pub size: Vec2,
}

impl EllipseState {
    pub fn radii(&self) -> Vec2 {
        self.size / 2.0
    }
}

/// A shape group's geometry and paint at one frame. Paths are already
/// trimmed.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ResolvedGroup {
    pub name: Option<String>,
    pub paths: Vec<ConcretePath>,
    pub rects: Vec<RectState>,
    pub ellipses: Vec<EllipseState>,
    pub fill: Option<FillState>,
    pub stroke: Option<StrokeState>,
    pub trim: Option<TrimState>,
    pub transform: Option<TransformState>,
}

impl ResolvedGroup {
    pub fn has_geometry(&self) -> bool {
        self.paths.iter().any(|p| !p.is_empty()) || !self.rects.is_empty() || !self.ellipses.is_empty()
    }

    /// With a stroke, the fill is the stroke color when `fill_enabled`,
    /// otherwise the group fill; without one, just the group fill.
    pub fn paint(&self) -> (Option<Fill>, Option<Stroke>) {
        let fill_from = |f: &FillState| Fill {
            color: f.color,
            opacity: f.opacity,
        };
        match &self.stroke {
            Some(stroke) => {
                let fill = if stroke.fill_enabled {
                    Some(Fill {
                        color: stroke.color,
                        opacity: stroke.opacity,
                    })
                } else {
                    self.fill.as_ref().map(fill_from)
                };
                let stroke = Stroke {
                    color: stroke.color,
                    width: stroke.width,
                    opacity: stroke.opacity,
                    cap: stroke.cap,
                    join: stroke.join,
                    miter_limit: stroke.miter_limit,
                };
                (fill, Some(stroke))
            }
            None => (self.fill.as_ref().map(fill_from), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group(value: serde_json::Value) -> ShapeGroup {
        let shape: data::Shape = serde_json::from_value(value).unwrap();
        ShapeGroup::from_model(&shape).unwrap()
    }

    #[test]
    fn test_trim_range_is_normalized() {
        let trim = TrimState::new(80.0, 20.0, 0.0);
        assert_eq!((trim.start, trim.end), (20.0, 80.0));
        let windows = trim.windows();
        assert_eq!(windows.len(), 1);
        assert!((windows[0].0 - 0.2).abs() < 1e-6);
        assert!((windows[0].1 - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_group_resolves_rect_fill_and_transform() {
        let g = group(json!({
            "ty": "gr",
            "nm": "Box",
            "it": [
                { "ty": "rc", "s": { "a": 0, "k": [20, 10] }, "p": { "a": 0, "k": [5, 5] } },
                { "ty": "fl", "c": { "a": 0, "k": [255, 0, 0, 1] }, "o": { "a": 0, "k": 50 } },
                { "ty": "tr", "p": { "a": 0, "k": [1, 2] }, "o": { "a": 0, "k": 100 } },
                { "ty": "gf" }
            ]
        }));
        assert_eq!(g.elements.len(), 3);
        assert_eq!(g.elements[0].kind(), "rect");

        let resolved = g.resolve(0.0);
        assert_eq!(resolved.name.as_deref(), Some("Box"));
        assert_eq!(
            resolved.rects,
            vec![RectState {
                position: Vec2::new(5.0, 5.0),
                size: Vec2::new(20.0, 10.0),
                roundness: 0.0,
            }]
        );
        assert_eq!(
            resolved.fill,
            Some(FillState {
                color: Vec4::new(1.0, 0.0, 0.0, 1.0),
                opacity: 0.5,
            })
        );
        assert_eq!(resolved.transform.map(|t| t.position), Some(Vec2::new(1.0, 2.0)));
        assert!(resolved.has_geometry());
    }

    #[test]
    fn test_paths_are_reversed() {
        let square = |offset: f32| {
            json!({
                "ty": "sh",
                "ks": { "a": 0, "k": {
                    "c": true,
                    "v": [[offset, 0], [offset + 1.0, 0], [offset + 1.0, 1]],
                    "i": [[0, 0], [0, 0], [0, 0]],
                    "o": [[0, 0], [0, 0], [0, 0]]
                } }
            })
        };
        let g = group(json!({ "ty": "gr", "it": [square(0.0), square(10.0)] }));
        let resolved = g.resolve(0.0);
        assert_eq!(resolved.paths.len(), 2);
        assert_eq!(resolved.paths[0].start, Vec2::new(10.0, 0.0));
        assert_eq!(resolved.paths[1].start, Vec2::new(0.0, 0.0));
    }

    #[test]
    fn test_stroke_fill_enabled_paints_with_stroke_color() {
        let g = group(json!({
            "ty": "gr",
            "it": [
                { "ty": "el", "s": { "a": 0, "k": [10, 10] }, "p": { "a": 0, "k": [0, 0] } },
                { "ty": "fl", "c": { "a": 0, "k": [0, 0, 1, 1] } },
                { "ty": "st", "c": { "a": 0, "k": [0, 1, 0, 1] }, "w": { "a": 0, "k": 3 },
                  "lc": 2, "lj": 3, "fillEnabled": true }
            ]
        }));
        let resolved = g.resolve(0.0);
        let (fill, stroke) = resolved.paint();
        let stroke = stroke.unwrap();
        assert_eq!(fill.unwrap().color, Vec4::new(0.0, 1.0, 0.0, 1.0));
        assert_eq!(stroke.width, 3.0);
        assert_eq!(stroke.cap, LineCap::Round);
        assert_eq!(stroke.join, LineJoin::Bevel);
        assert_eq!(resolved.ellipses[0].radii(), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_stroke_without_fill_enabled_keeps_group_fill() {
        let g = group(json!({
            "ty": "gr",
            "it": [
                { "ty": "fl", "c": { "a": 0, "k": [0, 0, 1, 1] } },
                { "ty": "st", "c": { "a": 0, "k": [0, 1, 0, 1] }, "w": { "a": 0, "k": 3 } }
            ]
        }));
        let (fill, stroke) = g.resolve(0.0).paint();
        assert_eq!(fill.unwrap().color, Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert!(stroke.is_some());
    }

    #[test]
    fn test_trim_applies_to_paths() {
        let g = group(json!({
            "ty": "gr",
            "it": [
                { "ty": "sh", "ks": { "a": 0, "k": {
                    "c": false, "v": [[0, 0], [100, 0]], "i": [[0, 0], [0, 0]], "o": [[0, 0], [0, 0]]
                } } },
                { "ty": "tm", "s": { "a": 0, "k": 75 }, "e": { "a": 0, "k": 25 } }
            ]
        }));
        let resolved = g.resolve(0.0);
        assert_eq!(resolved.trim, Some(TrimState::new(25.0, 75.0, 0.0)));
        assert_eq!(resolved.paths.len(), 1);
        assert!((resolved.paths[0].start.x - 25.0).abs() < 0.1);
    }

    #[test]
    fn test_empty_keyframes_fail_group_build() {
        let shape: data::Shape = serde_json::from_value(json!({
            "ty": "fl", "c": { "a": 1, "k": [] }
        }))
        .unwrap();
        assert_eq!(
            ShapeGroup::from_model(&shape).unwrap_err(),
            SceneError::EmptyKeyframes("fill.color")
        );
    }
}
