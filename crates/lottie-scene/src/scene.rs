use std::collections::{HashMap, HashSet};

use lottie_model::model::{Asset, Document, Layer, LayerType, MaskProperties};
use tracing::{debug, instrument, warn};

use crate::animatable::Timeline;
use crate::errors::SceneError;
use crate::path::PathGeometry;
use crate::renderer::{BlendMode, MaskMode};
use crate::shapes::ShapeGroup;
use crate::transform::TransformTracks;

/// Compositions nested deeper than this are rejected.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Handle of a node in the scene arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeOrigin {
    /// Instantiated from a layer of the document or of an asset.
    Layer,
    /// Transform-only copy of an ancestor, created to rebuild a parent chain
    /// inside a composition.
    ClonedAncestor,
    Mask,
}

/// Fields every layer variant shares, already shifted into the timeline of
/// the composition that owns the node.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerHeader {
    pub layer_type: LayerType,
    pub index: Option<u32>,
    pub parent_index: Option<u32>,
    pub name: Option<String>,
    pub in_frame: f32,
    pub out_frame: f32,
    pub start_time: f32,
    pub blend_mode: BlendMode,
    pub has_mask: bool,
    pub auto_orient: bool,
}

impl LayerHeader {
    fn from_layer(layer: &Layer, offset: f32) -> Self {
        LayerHeader {
            layer_type: layer.layer_type(),
            index: layer.ind,
            parent_index: layer.parent,
            name: layer.nm.clone(),
            in_frame: layer.ip + offset,
            out_frame: layer.op + offset,
            start_time: layer.st + offset,
            blend_mode: BlendMode::from_code(layer.bm.unwrap_or(0)),
            has_mask: layer.has_mask(),
            auto_orient: layer.auto_orient(),
        }
    }

    pub fn is_active(&self, frame: f32) -> bool {
        self.in_frame <= frame && frame <= self.out_frame
    }

    pub fn label(&self) -> String {
        layer_label(self.name.as_deref(), self.index)
    }
}

fn layer_label(name: Option<&str>, index: Option<u32>) -> String {
    match (name, index) {
        (Some(name), _) => name.to_string(),
        (None, Some(index)) => format!("#{}", index),
        (None, None) => "<unnamed>".to_string(),
    }
}

fn is_masked(layer: &Layer) -> bool {
    layer.has_mask() && layer.layer_type() != LayerType::Image
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaskPath {
    pub name: Option<String>,
    pub inverted: bool,
    pub mode: MaskMode,
    pub geometry: PathGeometry,
    pub opacity: Timeline<f32>,
}

impl MaskPath {
    fn from_model(mask: &MaskProperties, offset: f32) -> Result<Self, SceneError> {
        let mut geometry = PathGeometry::from_property(&mask.pt, true)?;
        geometry.shift(offset);
        let mut opacity = Timeline::from_property(&mask.o, |v| *v / 100.0, 1.0, "mask.opacity")?;
        opacity.shift(offset);
        Ok(MaskPath {
            name: mask.nm.clone(),
            inverted: mask.inv,
            mode: MaskMode::from_code(mask.mode.as_deref()),
            geometry,
            opacity,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageSource {
    pub asset_id: String,
    pub source: Option<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaskBinding {
    pub target: NodeId,
    pub mask: NodeId,
}

/// A resolved sub-scene. The document root is a composition without an asset.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Composition {
    pub asset_id: Option<String>,
    pub width: f32,
    pub height: f32,
    /// Instantiated layers, highest index first.
    pub layers: Vec<NodeId>,
    /// Nodes attached at the composition root, in paint order: ordinary
    /// layers first, then cloned ancestor shells.
    pub children: Vec<NodeId>,
    pub masks: Vec<MaskBinding>,
    pub cloned_layers: Vec<NodeId>,
}

impl Composition {
    fn pending(asset_id: String, width: Option<u32>, height: Option<u32>) -> Self {
        Composition {
            asset_id: Some(asset_id),
            width: width.unwrap_or(0) as f32,
            height: height.unwrap_or(0) as f32,
            ..Composition::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Shape(Vec<ShapeGroup>),
    Composition(Composition),
    Image(ImageSource),
    Null,
    Mask(Vec<MaskPath>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub header: LayerHeader,
    pub transform: TransformTracks,
    pub kind: NodeKind,
    pub origin: NodeOrigin,
    /// Scene-graph parent; `None` when attached to a composition root.
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Fully resolved, immutable scene. Frames are evaluated against it with
/// [`Scene::evaluate_frame`].
#[derive(Clone, Debug)]
pub struct Scene {
    pub version: Option<String>,
    pub width: f32,
    pub height: f32,
    pub frame_rate: f32,
    pub in_point: f32,
    pub out_point: f32,
    pub(crate) root: Composition,
    pub(crate) nodes: Vec<SceneNode>,
}

impl Scene {
    #[instrument(level = "debug", skip(doc), fields(layers = doc.layers.len(), assets = doc.assets.len()))]
    pub fn build(doc: &Document) -> Result<Self, SceneError> {
        let mut builder = SceneBuilder::new(doc);
        let root = builder.build_root(doc)?;
        debug!(nodes = builder.nodes.len(), "scene built");
        Ok(Scene {
            version: doc.v.clone(),
            width: doc.w as f32,
            height: doc.h as f32,
            frame_rate: doc.fr,
            in_point: doc.ip,
            out_point: doc.op,
            root,
            nodes: builder.nodes,
        })
    }

    pub fn root(&self) -> &Composition {
        &self.root
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Last addressable frame.
    pub fn total_frames(&self) -> f32 {
        self.out_point
    }

    pub fn check_frame(&self, frame: f32) -> Result<f32, SceneError> {
        let total = self.total_frames();
        if (0.0..=total).contains(&frame) {
            Ok(frame)
        } else {
            Err(SceneError::FrameOutOfRange { frame, total })
        }
    }

    pub fn find_by_name<'s>(&'s self, name: &'s str) -> impl Iterator<Item = NodeId> + 's {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.header.name.as_deref() == Some(name))
            .map(|(idx, _)| NodeId(idx))
    }

    pub fn composition(&self, id: NodeId) -> Option<&Composition> {
        match &self.node(id).kind {
            NodeKind::Composition(comp) => Some(comp),
            _ => None,
        }
    }
}

struct SceneBuilder<'a> {
    assets: HashMap<&'a str, &'a Asset>,
    nodes: Vec<SceneNode>,
    asset_stack: Vec<&'a str>,
}

impl<'a> SceneBuilder<'a> {
    fn new(doc: &'a Document) -> Self {
        SceneBuilder {
            assets: doc.assets.iter().map(|a| (a.id.as_str(), a)).collect(),
            nodes: Vec::new(),
            asset_stack: Vec::new(),
        }
    }

    fn push(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    fn asset(&self, id: &str) -> Result<&'a Asset, SceneError> {
        self.assets
            .get(id)
            .copied()
            .ok_or_else(|| SceneError::MissingAsset(id.to_string()))
    }

    fn instantiate(&mut self, layer: &Layer, offset: f32) -> Result<NodeId, SceneError> {
        let label = layer_label(layer.nm.as_deref(), layer.ind);
        if layer.ip > layer.op {
            return Err(SceneError::InvalidLayerRange {
                layer: label,
                in_frame: layer.ip,
                out_frame: layer.op,
            });
        }

        let mut transform = TransformTracks::from_model(&layer.ks)?;
        transform.shift(offset);

        let kind = match layer.layer_type() {
            LayerType::Shape => {
                let mut groups = Vec::new();
                for shape in layer.shapes.iter().flatten() {
                    let mut group = ShapeGroup::from_model(shape)?;
                    if group.is_empty() {
                        continue;
                    }
                    group.shift(offset);
                    groups.push(group);
                }
                NodeKind::Shape(groups)
            }
            LayerType::Precomp => {
                let ref_id = layer
                    .ref_id
                    .clone()
                    .ok_or_else(|| SceneError::MissingReference(label.clone()))?;
                NodeKind::Composition(Composition::pending(ref_id, layer.w, layer.h))
            }
            LayerType::Image => {
                let asset_id = layer
                    .ref_id
                    .clone()
                    .ok_or_else(|| SceneError::MissingReference(label.clone()))?;
                NodeKind::Image(ImageSource {
                    asset_id,
                    source: None,
                    width: 0,
                    height: 0,
                })
            }
            LayerType::Null => NodeKind::Null,
            other => {
                warn!(layer = %label, kind = ?other, "unsupported layer type, keeping transform only");
                NodeKind::Null
            }
        };

        Ok(self.push(SceneNode {
            header: LayerHeader::from_layer(layer, offset),
            transform,
            kind,
            origin: NodeOrigin::Layer,
            parent: None,
            children: Vec::new(),
        }))
    }

    /// Masks always live directly under their target and share its range.
    fn attach_mask(&mut self, target: NodeId, layer: &Layer, offset: f32) -> Result<NodeId, SceneError> {
        let paths = layer
            .masks_properties
            .iter()
            .flatten()
            .map(|m| MaskPath::from_model(m, offset))
            .collect::<Result<Vec<_>, _>>()?;

        let target_header = &self.nodes[target.0].header;
        let header = LayerHeader {
            index: None,
            parent_index: None,
            has_mask: false,
            auto_orient: false,
            blend_mode: BlendMode::Normal,
            ..target_header.clone()
        };
        let mask = self.push(SceneNode {
            header,
            transform: TransformTracks::default(),
            kind: NodeKind::Mask(paths),
            origin: NodeOrigin::Mask,
            parent: None,
            children: Vec::new(),
        });
        self.attach(target, mask);
        Ok(mask)
    }

    fn build_root(&mut self, doc: &'a Document) -> Result<Composition, SceneError> {
        check_parent_chains(&doc.layers)?;

        let mut ids = Vec::with_capacity(doc.layers.len());
        for layer in &doc.layers {
            ids.push(self.instantiate(layer, 0.0)?);
        }
        let index_map: HashMap<u32, NodeId> = doc
            .layers
            .iter()
            .zip(&ids)
            .filter_map(|(layer, id)| layer.ind.map(|ind| (ind, *id)))
            .collect();

        let mut comp = Composition {
            width: doc.w as f32,
            height: doc.h as f32,
            ..Composition::default()
        };

        for (layer, &id) in doc.layers.iter().zip(&ids).rev() {
            comp.layers.push(id);
            if is_masked(layer) {
                let mask = self.attach_mask(id, layer, 0.0)?;
                comp.masks.push(MaskBinding { target: id, mask });
                comp.children.push(id);
            } else if let Some(parent_index) = layer.parent {
                let parent = *index_map.get(&parent_index).ok_or_else(|| SceneError::MissingParent {
                    layer: layer_label(layer.nm.as_deref(), layer.ind),
                    parent: parent_index,
                })?;
                self.attach(parent, id);
            } else {
                comp.children.push(id);
            }
        }

        for &id in &ids {
            self.resolve_reference(id, 1)?;
        }
        Ok(comp)
    }

    fn resolve_reference(&mut self, id: NodeId, depth: usize) -> Result<(), SceneError> {
        let kind = std::mem::replace(&mut self.nodes[id.0].kind, NodeKind::Null);
        let resolved = match kind {
            NodeKind::Composition(pending) => {
                if depth > MAX_NESTING_DEPTH {
                    return Err(SceneError::RecursionLimit);
                }
                NodeKind::Composition(self.build_composition(id, pending, depth)?)
            }
            NodeKind::Image(mut image) => {
                let asset = self.asset(&image.asset_id)?;
                image.source = asset.texture_path();
                image.width = asset.w.unwrap_or(0);
                image.height = asset.h.unwrap_or(0);
                NodeKind::Image(image)
            }
            other => other,
        };
        self.nodes[id.0].kind = resolved;
        Ok(())
    }

    fn build_composition(
        &mut self,
        owner: NodeId,
        pending: Composition,
        depth: usize,
    ) -> Result<Composition, SceneError> {
        let asset_id = pending.asset_id.unwrap_or_default();
        let asset = self.asset(&asset_id)?;
        if self.asset_stack.contains(&asset.id.as_str()) {
            return Err(SceneError::SelfReference(asset.id.clone()));
        }

        // Template layers are copied into fresh nodes and shifted into the
        // parent timeline; the asset itself is never touched.
        let offset = self.nodes[owner.0].header.start_time;
        let templates: &'a [Layer] = asset.layers.as_deref().unwrap_or(&[]);
        let mut instances = Vec::with_capacity(templates.len());
        for layer in templates {
            instances.push((self.instantiate(layer, offset)?, layer));
        }
        instances.sort_by_key(|(_, layer)| layer.ind.unwrap_or(0));

        let index_map: HashMap<u32, NodeId> = instances
            .iter()
            .filter_map(|(id, layer)| layer.ind.map(|ind| (ind, *id)))
            .collect();

        let mut comp = Composition {
            asset_id: Some(asset.id.clone()),
            width: if pending.width > 0.0 { pending.width } else { asset.w.unwrap_or(0) as f32 },
            height: if pending.height > 0.0 { pending.height } else { asset.h.unwrap_or(0) as f32 },
            ..Composition::default()
        };

        for &(id, layer) in instances.iter().rev() {
            comp.layers.push(id);
            if is_masked(layer) {
                let mask = self.attach_mask(id, layer, offset)?;
                comp.masks.push(MaskBinding { target: id, mask });
                comp.children.push(id);
            } else if layer.parent.is_some() {
                if let Some(top) = self.clone_ancestors(id, &index_map)? {
                    comp.cloned_layers.push(top);
                }
            } else {
                comp.children.push(id);
            }
        }
        comp.children.extend(comp.cloned_layers.iter().copied());

        self.asset_stack.push(asset.id.as_str());
        for &(id, _) in &instances {
            self.resolve_reference(id, depth + 1)?;
        }
        self.asset_stack.pop();

        debug!(
            asset = %asset.id,
            offset,
            layers = instances.len(),
            clones = comp.cloned_layers.len(),
            "composition resolved"
        );
        Ok(comp)
    }

    /// Rebuilds the parent chain of `child` out of fresh copies of its
    /// ancestors and returns the topmost copy.
    fn clone_ancestors(
        &mut self,
        child: NodeId,
        index_map: &HashMap<u32, NodeId>,
    ) -> Result<Option<NodeId>, SceneError> {
        let mut seen = HashSet::new();
        if let Some(index) = self.nodes[child.0].header.index {
            seen.insert(index);
        }

        let mut current = child;
        let mut top = None;
        while let Some(parent_index) = self.nodes[current.0].header.parent_index {
            if !seen.insert(parent_index) {
                return Err(SceneError::ParentCycle(parent_index));
            }
            let template = *index_map.get(&parent_index).ok_or_else(|| SceneError::MissingParent {
                layer: self.nodes[current.0].header.label(),
                parent: parent_index,
            })?;
            let clone = self.clone_ancestor(template, current);
            self.attach(clone, current);
            top = Some(clone);
            current = clone;
        }
        Ok(top)
    }

    fn clone_ancestor(&mut self, template: NodeId, child: NodeId) -> NodeId {
        let (child_in, child_out) = {
            let header = &self.nodes[child.0].header;
            (header.in_frame, header.out_frame)
        };
        let source = &self.nodes[template.0];
        let mut header = source.header.clone();
        header.has_mask = false;

        // A shell only carries the transform; a shape ancestor also takes
        // the child's active range.
        let kind = match source.kind {
            NodeKind::Shape(_) => {
                header.in_frame = child_in;
                header.out_frame = child_out;
                NodeKind::Shape(Vec::new())
            }
            _ => NodeKind::Null,
        };

        debug!(ancestor = %header.label(), "cloning ancestor shell");
        let node = SceneNode {
            header,
            transform: source.transform.clone(),
            kind,
            origin: NodeOrigin::ClonedAncestor,
            parent: None,
            children: Vec::new(),
        };
        self.push(node)
    }
}

/// Parent links among the document's top-level layers must form a forest.
fn check_parent_chains(layers: &[Layer]) -> Result<(), SceneError> {
    let parents: HashMap<u32, Option<u32>> = layers
        .iter()
        .filter_map(|layer| layer.ind.map(|ind| (ind, layer.parent)))
        .collect();

    for layer in layers {
        let mut seen = HashSet::new();
        if let Some(ind) = layer.ind {
            seen.insert(ind);
        }
        let mut next = layer.parent;
        while let Some(parent) = next {
            if !seen.insert(parent) {
                return Err(SceneError::ParentCycle(parent));
            }
            next = parents.get(&parent).copied().flatten();
        }
    }
    Ok(())
}
