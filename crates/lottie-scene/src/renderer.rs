use glam::{Mat3, Vec2, Vec4};
use kurbo::{Affine, BezPath, Ellipse, Rect, RoundedRect, Shape as _};

#[derive(Clone, Debug)]
pub struct RenderTree {
    pub width: f32,
    pub height: f32,
    pub frame: f32,
    pub root: RenderNode,
}

impl RenderTree {
    pub fn empty(width: f32, height: f32, frame: f32) -> Self {
        RenderTree {
            width,
            height,
            frame,
            root: RenderNode::group(Vec::new()),
        }
    }

    /// Flattens the tree into paint order with world transforms and
    /// compounded alpha, the way a rasterizer walks it.
    pub fn draw_list(&self) -> Vec<DrawCommand> {
        let mut out = Vec::new();
        collect(&self.root, Mat3::IDENTITY, 1.0, false, &mut out);
        out
    }
}

fn collect(node: &RenderNode, parent: Mat3, parent_alpha: f32, masked: bool, out: &mut Vec<DrawCommand>) {
    let world = parent * node.transform;
    let alpha = parent_alpha * node.alpha;
    let masked = masked || !node.masks.is_empty();
    match &node.content {
        NodeContent::Group(children) => {
            for child in children {
                collect(child, world, alpha, masked, out);
            }
        }
        NodeContent::Shape(shape) => out.push(DrawCommand {
            name: node.name.clone(),
            transform: world,
            alpha,
            blend_mode: node.blend_mode,
            masked,
            content: DrawContent::Shape(shape.clone()),
        }),
        NodeContent::Image(image) => out.push(DrawCommand {
            name: node.name.clone(),
            transform: world,
            alpha,
            blend_mode: node.blend_mode,
            masked,
            content: DrawContent::Image(image.clone()),
        }),
    }
}

#[derive(Clone, Debug)]
pub struct DrawCommand {
    pub name: Option<String>,
    pub transform: Mat3,
    pub alpha: f32,
    pub blend_mode: BlendMode,
    pub masked: bool,
    pub content: DrawContent,
}

#[derive(Clone, Debug)]
pub enum DrawContent {
    Shape(Shape),
    Image(Image),
}

impl DrawCommand {
    /// Bounds of the command in composition space.
    pub fn world_bounds(&self) -> Rect {
        let affine = to_affine(self.transform);
        match &self.content {
            DrawContent::Shape(shape) => (affine * shape.geometry.to_path()).bounding_box(),
            DrawContent::Image(image) => {
                let local = Rect::new(0.0, 0.0, f64::from(image.width), f64::from(image.height));
                (affine * local.to_path(0.1)).bounding_box()
            }
        }
    }
}

pub fn to_affine(m: Mat3) -> Affine {
    let c = m.to_cols_array();
    Affine::new([
        f64::from(c[0]),
        f64::from(c[1]),
        f64::from(c[3]),
        f64::from(c[4]),
        f64::from(c[6]),
        f64::from(c[7]),
    ])
}

#[derive(Clone, Debug)]
pub struct RenderNode {
    pub name: Option<String>,
    pub transform: Mat3,
    pub alpha: f32,
    pub blend_mode: BlendMode,
    pub content: NodeContent,
    /// Applied in order, each with its own mode.
    pub masks: Vec<Mask>,
}

impl RenderNode {
    pub fn group(children: Vec<RenderNode>) -> Self {
        RenderNode {
            name: None,
            transform: Mat3::IDENTITY,
            alpha: 1.0,
            blend_mode: BlendMode::Normal,
            content: NodeContent::Group(children),
            masks: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeContent {
    Group(Vec<RenderNode>),
    Shape(Shape),
    Image(Image),
}

#[derive(Clone, Debug)]
pub struct Shape {
    pub geometry: ShapeGeometry,
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
}

#[derive(Clone, Debug)]
pub enum ShapeGeometry {
    Path(BezPath),
    /// `origin` is the top-left corner.
    Rect { origin: Vec2, size: Vec2, radius: f32 },
    Ellipse { center: Vec2, radii: Vec2 },
}

impl ShapeGeometry {
    pub fn to_path(&self) -> BezPath {
        match self {
            ShapeGeometry::Path(path) => path.clone(),
            ShapeGeometry::Rect { origin, size, radius } => {
                let rect = Rect::new(
                    f64::from(origin.x),
                    f64::from(origin.y),
                    f64::from(origin.x + size.x),
                    f64::from(origin.y + size.y),
                );
                if *radius > 0.0 {
                    RoundedRect::from_rect(rect, f64::from(*radius)).to_path(0.1)
                } else {
                    rect.to_path(0.1)
                }
            }
            ShapeGeometry::Ellipse { center, radii } => Ellipse::new(
                (f64::from(center.x), f64::from(center.y)),
                (f64::from(radii.x), f64::from(radii.y)),
                0.0,
            )
            .to_path(0.1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Image {
    pub asset_id: String,
    /// File path or data URI of the texture.
    pub source: Option<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Fill {
    pub color: Vec4, // R, G, B, A
    pub opacity: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub color: Vec4,
    pub width: f32,
    pub opacity: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: Option<f32>,
}

#[derive(Clone, Debug)]
/// One authored mask path.
pub struct Mask {
    pub mode: MaskMode,
    pub path: BezPath,
    pub opacity: f32,
    pub inverted: bool,
}

// Enums
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

const BLEND_MODES: [BlendMode; 16] = [
    BlendMode::Normal,
    BlendMode::Multiply,
    BlendMode::Screen,
    BlendMode::Overlay,
    BlendMode::Darken,
    BlendMode::Lighten,
    BlendMode::ColorDodge,
    BlendMode::ColorBurn,
    BlendMode::HardLight,
    BlendMode::SoftLight,
    BlendMode::Difference,
    BlendMode::Exclusion,
    BlendMode::Hue,
    BlendMode::Saturation,
    BlendMode::Color,
    BlendMode::Luminosity,
];

impl BlendMode {
    /// Unknown codes draw as `Normal`.
    pub fn from_code(code: u8) -> Self {
        BLEND_MODES
            .get(usize::from(code))
            .copied()
            .unwrap_or(BlendMode::Normal)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

impl From<u8> for LineCap {
    fn from(code: u8) -> Self {
        match code {
            2 => LineCap::Round,
            3 => LineCap::Square,
            _ => LineCap::Butt,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

impl From<u8> for LineJoin {
    fn from(code: u8) -> Self {
        match code {
            2 => LineJoin::Round,
            3 => LineJoin::Bevel,
            _ => LineJoin::Miter,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskMode {
    None,
    Add,
    Subtract,
    Intersect,
    Lighten,
    Darken,
    Difference,
}

impl MaskMode {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("n") => MaskMode::None,
            Some("s") => MaskMode::Subtract,
            Some("i") => MaskMode::Intersect,
            Some("l") => MaskMode::Lighten,
            Some("d") => MaskMode::Darken,
            Some("f") => MaskMode::Difference,
            _ => MaskMode::Add,
        }
    }
}
