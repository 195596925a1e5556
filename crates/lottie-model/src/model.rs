use serde::{de::DeserializeOwned, de::SeqAccess, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::io::Read;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Document {
    pub v: Option<String>,
    #[serde(default)]
    pub ip: f32,
    pub op: f32,
    pub fr: f32,
    pub w: u32,
    pub h: u32,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Document {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Frames between the in-point and the out-point. Scene timing uses `op` directly.
    pub fn duration_frames(&self) -> f32 {
        self.op - self.ip
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    Precomp,
    Solid,
    Image,
    Null,
    Shape,
    Text,
    Other(u8),
}

impl From<u8> for LayerType {
    fn from(ty: u8) -> Self {
        match ty {
            0 => LayerType::Precomp,
            1 => LayerType::Solid,
            2 => LayerType::Image,
            3 => LayerType::Null,
            4 => LayerType::Shape,
            5 => LayerType::Text,
            other => LayerType::Other(other),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Layer {
    #[serde(default)]
    pub ty: u8,
    #[serde(default)]
    pub ind: Option<u32>,
    #[serde(default)]
    pub parent: Option<u32>,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub ip: f32,
    #[serde(default)]
    pub op: f32,
    #[serde(default)]
    pub st: f32,
    #[serde(default)]
    pub bm: Option<u8>,
    #[serde(default)]
    pub ao: Option<u8>,
    #[serde(default)]
    pub ks: Transform,

    #[serde(default, rename = "hasMask")]
    pub has_mask: Option<bool>,
    #[serde(default, rename = "masksProperties")]
    pub masks_properties: Option<Vec<MaskProperties>>,

    // Type specific
    #[serde(default, rename = "refId")]
    pub ref_id: Option<String>, // PreComp, Image
    #[serde(default)]
    pub w: Option<u32>, // PreComp
    #[serde(default)]
    pub h: Option<u32>, // PreComp
    #[serde(default)]
    pub shapes: Option<Vec<Shape>>, // Shape Layer
}

impl Layer {
    pub fn layer_type(&self) -> LayerType {
        LayerType::from(self.ty)
    }

    pub fn has_mask(&self) -> bool {
        self.has_mask.unwrap_or(false)
    }

    pub fn auto_orient(&self) -> bool {
        self.ao == Some(1)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MaskProperties {
    #[serde(default)]
    pub inv: bool,
    #[serde(default)]
    pub mode: Option<String>,
    pub pt: Property<BezierPath>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub nm: Option<String>,
}

// Shapes

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "ty")]
pub enum Shape {
    #[serde(rename = "gr")]
    Group(GroupShape),
    #[serde(rename = "rc")]
    Rect(RectShape),
    #[serde(rename = "el")]
    Ellipse(EllipseShape),
    #[serde(rename = "fl")]
    Fill(FillShape),
    #[serde(rename = "st")]
    Stroke(StrokeShape),
    #[serde(rename = "tr")]
    Transform(TransformShape),
    #[serde(rename = "sh")]
    Path(PathShape),
    #[serde(rename = "tm")]
    Trim(TrimShape),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GroupShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub it: Vec<Shape>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RectShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub d: Option<u8>,
    pub s: Property<Vec3DefaultZero>,
    pub p: Property<Vec3DefaultZero>,
    #[serde(default)]
    pub r: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EllipseShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub d: Option<u8>,
    pub s: Property<Vec3DefaultZero>,
    pub p: Property<Vec3DefaultZero>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FillShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<Vec<f32>>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub r: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StrokeShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<Vec<f32>>,
    pub w: Property<f32>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub lc: u8,
    #[serde(default)]
    pub lj: u8,
    #[serde(default)]
    pub ml: Option<f32>,
    #[serde(default, rename = "fillEnabled")]
    pub fill_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub ks: Property<BezierPath>,
    /// Legacy exporters put the closed flag on the shape instead of the path.
    #[serde(default)]
    pub closed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrimShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub s: Property<f32>,
    pub e: Property<f32>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub m: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransformShape {
    #[serde(flatten)]
    pub t: Transform,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Transform {
    #[serde(default)]
    pub a: Property<Vec3DefaultZero>, // Anchor
    #[serde(default)]
    pub p: PositionProperty,
    #[serde(default)]
    pub s: Property<Vec3Scale>,
    #[serde(default, alias = "rz")]
    pub r: Property<f32>,
    #[serde(default)]
    pub o: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum PositionProperty {
    // Tried first: every `Property` field is optional, so `Unified` would
    // swallow a split object.
    Split {
        x: Property<f32>,
        y: Property<f32>,
    },
    Unified(Property<Vec3DefaultZero>),
}

impl Default for PositionProperty {
    fn default() -> Self {
        PositionProperty::Unified(Property::default())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Property<T> {
    #[serde(default)]
    pub a: u8,
    #[serde(default)]
    #[serde(bound(deserialize = "T: DeserializeOwned"))]
    pub k: Value<T>,
    #[serde(default)]
    pub ix: Option<u32>,
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Property {
            a: 0,
            k: Value::Default,
            ix: None,
        }
    }
}

impl<T> Property<T> {
    pub fn fixed(value: T) -> Self {
        Property {
            a: 0,
            k: Value::Static(value),
            ix: None,
        }
    }

    pub fn animated(keyframes: Vec<Keyframe<T>>) -> Self {
        Property {
            a: 1,
            k: Value::Animated(keyframes),
            ix: None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub enum Value<T> {
    Default,
    Static(T),
    Animated(Vec<Keyframe<T>>),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;

        if v.is_null() {
            return Ok(Value::Default);
        }

        // Keyframe lists are arrays of objects; anything else is a static value.
        let looks_animated = v
            .as_array()
            .map(|arr| arr.first().map_or(true, |first| first.is_object() && first.get("t").is_some()))
            .unwrap_or(false);

        if looks_animated {
            if let Ok(keyframes) = serde_json::from_value::<Vec<Keyframe<T>>>(v.clone()) {
                return Ok(Value::Animated(keyframes));
            }
        }

        if let Ok(val) = serde_json::from_value::<T>(v.clone()) {
            return Ok(Value::Static(val));
        }

        if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
            if let Some(first) = vec.into_iter().next() {
                return Ok(Value::Static(first));
            }
        }

        Ok(Value::Default)
    }
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Default
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Keyframe<T> {
    pub t: f32,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub s: Option<T>,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub e: Option<T>,
    #[serde(default)]
    pub i: Option<EasingHandle>,
    #[serde(default)]
    pub o: Option<EasingHandle>,
    #[serde(default)]
    pub to: Option<Vec<f32>>,
    #[serde(default)]
    pub ti: Option<Vec<f32>>,
    #[serde(default)]
    pub h: Option<u8>,
    #[serde(default)]
    pub n: Option<String>,
}

impl<T> Keyframe<T> {
    /// A linear keyframe at `t` starting at `s`; the end value comes from `e`
    /// or from the next keyframe.
    pub fn linear(t: f32, s: Option<T>, e: Option<T>) -> Self {
        Keyframe {
            t,
            s,
            e,
            i: None,
            o: None,
            to: None,
            ti: None,
            h: None,
            n: None,
        }
    }

    pub fn with_easing(mut self, o: EasingHandle, i: EasingHandle) -> Self {
        self.o = Some(o);
        self.i = Some(i);
        self
    }

    pub fn is_hold(&self) -> bool {
        self.h == Some(1)
    }
}

fn deserialize_keyframe_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    if v.is_null() {
        return Ok(None);
    }

    if let Ok(val) = serde_json::from_value(v.clone()) {
        return Ok(Some(val));
    }

    if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
        if let Some(first) = vec.into_iter().next() {
            return Ok(Some(first));
        }
    }

    Ok(None)
}

/// One control point of a keyframe's temporal easing curve.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct EasingHandle {
    pub x: EasingComponent,
    pub y: EasingComponent,
}

impl EasingHandle {
    pub fn new(x: f32, y: f32) -> Self {
        EasingHandle {
            x: EasingComponent(x),
            y: EasingComponent(y),
        }
    }
}

/// Exporters write either a scalar or a per-dimension array; only the first
/// dimension drives the easing.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct EasingComponent(pub f32);

impl<'de> Deserialize<'de> for EasingComponent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Scalar(f32),
            Multi(Vec<f32>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Scalar(v) => Ok(EasingComponent(v)),
            Raw::Multi(values) => values
                .first()
                .copied()
                .map(EasingComponent)
                .ok_or_else(|| serde::de::Error::custom("empty easing component")),
        }
    }
}

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];

// Wrapper for Vec3 with Z defaulting to 0.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3DefaultZero(pub Vec3);

impl Default for Vec3DefaultZero {
    fn default() -> Self {
        Vec3DefaultZero([0.0, 0.0, 0.0])
    }
}

impl From<Vec2> for Vec3DefaultZero {
    fn from(v: Vec2) -> Self {
        Vec3DefaultZero([v[0], v[1], 0.0])
    }
}

impl<'de> Deserialize<'de> for Vec3DefaultZero {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Vec3Visitor;
        impl<'de> serde::de::Visitor<'de> for Vec3Visitor {
            type Value = Vec3DefaultZero;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a sequence of 2 or 3 floats")
            }
            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let x = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let y = seq.next_element()?.unwrap_or(0.0);
                let z = seq.next_element()?.unwrap_or(0.0);
                while seq.next_element::<f32>()?.is_some() {}
                Ok(Vec3DefaultZero([x, y, z]))
            }
        }
        deserializer.deserialize_seq(Vec3Visitor)
    }
}

// Wrapper for Vec3 with Z defaulting to 100.0 (for Scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3Scale(pub Vec3);

impl Default for Vec3Scale {
    fn default() -> Self {
        Vec3Scale([100.0, 100.0, 100.0])
    }
}

impl From<Vec2> for Vec3Scale {
    fn from(v: Vec2) -> Self {
        Vec3Scale([v[0], v[1], 100.0])
    }
}

impl<'de> Deserialize<'de> for Vec3Scale {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Vec3ScaleVisitor;
        impl<'de> serde::de::Visitor<'de> for Vec3ScaleVisitor {
            type Value = Vec3Scale;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a sequence of 2 or 3 floats")
            }
            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let x = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let y = seq.next_element()?.unwrap_or(x);
                let z = seq.next_element()?.unwrap_or(100.0);
                while seq.next_element::<f32>()?.is_some() {}
                Ok(Vec3Scale([x, y, z]))
            }
        }
        deserializer.deserialize_seq(Vec3ScaleVisitor)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BezierPath {
    #[serde(default)]
    pub c: bool,
    #[serde(default)]
    pub i: Vec<Vec2>,
    #[serde(default)]
    pub o: Vec<Vec2>,
    #[serde(default)]
    pub v: Vec<Vec2>,
}

impl BezierPath {
    /// A polygon with zero-length tangents.
    pub fn polygon(vertices: Vec<Vec2>, closed: bool) -> Self {
        let n = vertices.len();
        BezierPath {
            c: closed,
            i: vec![[0.0, 0.0]; n],
            o: vec![[0.0, 0.0]; n],
            v: vertices,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub layers: Option<Vec<Layer>>,
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub h: Option<u32>,
    #[serde(default)]
    pub u: Option<String>,
    #[serde(default)]
    pub p: Option<String>,
    #[serde(default)]
    pub e: Option<u8>,
}

impl Asset {
    /// Texture location: the embedded data URI, or `u` joined with `p`.
    pub fn texture_path(&self) -> Option<String> {
        let p = self.p.as_ref()?;
        if self.e == Some(1) || p.starts_with("data:") {
            return Some(p.clone());
        }
        match self.u.as_deref() {
            Some(dir) if !dir.is_empty() => {
                Some(format!("{}/{}", dir.trim_end_matches('/'), p))
            }
            _ => Some(p.clone()),
        }
    }
}
