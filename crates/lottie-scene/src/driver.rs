use glam::Mat3;

use crate::path::ConcretePath;
use crate::renderer::{
    Image, Mask, MaskMode, NodeContent, RenderNode, RenderTree, Shape, ShapeGeometry,
};
use crate::scene::{Composition, NodeId, NodeKind, NodeOrigin, Scene};
use crate::shapes::ResolvedGroup;
use crate::transform::TransformState;

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedMask {
    pub path: ConcretePath,
    pub opacity: f32,
    pub inverted: bool,
    pub mode: MaskMode,
}

/// Drawable output of one node at one frame.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum ContentState {
    /// Outside the node's active range.
    #[default]
    Hidden,
    /// Active, but the node draws nothing itself.
    Empty,
    Shapes(Vec<ResolvedGroup>),
    Image,
    Mask(Vec<ResolvedMask>),
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct NodeState {
    pub evaluated: bool,
    pub active: bool,
    pub transform: TransformState,
    pub content: ContentState,
    /// Mask node applied to this node this frame.
    pub mask: Option<NodeId>,
}

impl NodeState {
    pub fn matrix(&self) -> Mat3 {
        self.transform.matrix()
    }

    pub fn shapes(&self) -> &[ResolvedGroup] {
        match &self.content {
            ContentState::Shapes(groups) => groups,
            _ => &[],
        }
    }

    pub fn has_visible_geometry(&self) -> bool {
        match &self.content {
            ContentState::Hidden | ContentState::Empty => false,
            ContentState::Shapes(groups) => groups.iter().any(ResolvedGroup::has_geometry),
            ContentState::Image => true,
            ContentState::Mask(paths) => paths.iter().any(|m| !m.path.is_empty()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskState {
    pub target: NodeId,
    pub mask: NodeId,
    pub applied: bool,
}

/// Resolved state of every node for one frame, indexed by [`NodeId`].
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FrameState {
    pub frame: f32,
    pub nodes: Vec<NodeState>,
    pub masks: Vec<MaskState>,
    /// Visiting order of the evaluation pass.
    pub order: Vec<NodeId>,
}

impl FrameState {
    pub fn node(&self, id: NodeId) -> &NodeState {
        &self.nodes[id.0]
    }

    pub fn mask_for(&self, target: NodeId) -> Option<&MaskState> {
        self.masks.iter().find(|m| m.target == target)
    }

    pub fn applied_masks(&self) -> usize {
        self.masks.iter().filter(|m| m.applied).count()
    }
}

impl Scene {
    pub fn evaluate_frame(&self, frame: f32) -> FrameState {
        let mut state = FrameState::default();
        self.evaluate_frame_into(frame, &mut state);
        state
    }

    /// Reuses the buffers of `state`. The result depends only on the scene
    /// and `frame`, so frames can be visited in any order.
    pub fn evaluate_frame_into(&self, frame: f32, state: &mut FrameState) {
        state.frame = frame;
        state.nodes.clear();
        state.nodes.resize_with(self.nodes.len(), NodeState::default);
        state.masks.clear();
        state.order.clear();
        self.evaluate_composition(&self.root, frame, state);
    }

    fn evaluate_composition(&self, comp: &Composition, frame: f32, state: &mut FrameState) {
        for binding in &comp.masks {
            let drawn = self.evaluate_node(binding.mask, frame, state);
            let applied = drawn && self.node(binding.target).header.is_active(frame);
            state.nodes[binding.target.0].mask = applied.then_some(binding.mask);
            state.masks.push(MaskState {
                target: binding.target,
                mask: binding.mask,
                applied,
            });
        }
        for &child in &comp.children {
            self.evaluate_subtree(child, frame, state);
        }
    }

    fn evaluate_subtree(&self, id: NodeId, frame: f32, state: &mut FrameState) {
        self.evaluate_node(id, frame, state);
        let node = self.node(id);
        if let NodeKind::Composition(comp) = &node.kind {
            self.evaluate_composition(comp, frame, state);
        }
        for &child in &node.children {
            if self.node(child).origin != NodeOrigin::Mask {
                self.evaluate_subtree(child, frame, state);
            }
        }
    }

    /// Returns whether the node produced any visible geometry.
    fn evaluate_node(&self, id: NodeId, frame: f32, state: &mut FrameState) -> bool {
        let node = self.node(id);
        // The topmost shell of a cloned parent chain stays visible so its
        // children can draw.
        let top_shell = node.origin == NodeOrigin::ClonedAncestor && node.parent.is_none();
        let active = top_shell || node.header.is_active(frame);
        let transform = node.transform.resolve(frame, node.header.auto_orient);

        let content = if !active {
            ContentState::Hidden
        } else {
            match &node.kind {
                NodeKind::Shape(groups) if !groups.is_empty() => {
                    ContentState::Shapes(groups.iter().map(|g| g.resolve(frame)).collect())
                }
                NodeKind::Mask(paths) => ContentState::Mask(
                    paths
                        .iter()
                        .map(|m| ResolvedMask {
                            path: m.geometry.resolve(frame),
                            opacity: m.opacity.evaluate(frame),
                            inverted: m.inverted,
                            mode: m.mode,
                        })
                        .collect(),
                ),
                NodeKind::Image(_) => ContentState::Image,
                _ => ContentState::Empty,
            }
        };

        let slot = &mut state.nodes[id.0];
        slot.evaluated = true;
        slot.active = active;
        slot.transform = transform;
        slot.content = content;
        let drawn = slot.has_visible_geometry();
        state.order.push(id);
        drawn
    }

    pub fn render_tree(&self, state: &FrameState) -> RenderTree {
        let mut root = RenderNode::group(self.render_children(&self.root.children, state));
        root.name = Some("root".to_string());
        RenderTree {
            width: self.width,
            height: self.height,
            frame: state.frame,
            root,
        }
    }

    fn render_children(&self, ids: &[NodeId], state: &FrameState) -> Vec<RenderNode> {
        ids.iter().filter_map(|id| self.render_node(*id, state)).collect()
    }

    fn render_node(&self, id: NodeId, state: &FrameState) -> Option<RenderNode> {
        let node = self.node(id);
        let node_state = state.nodes.get(id.0)?;
        if !node_state.evaluated || !node_state.active {
            return None;
        }

        let mut items = Vec::new();
        match (&node.kind, &node_state.content) {
            (_, ContentState::Shapes(groups)) => {
                items.extend(groups.iter().filter_map(render_group));
            }
            (NodeKind::Image(image), ContentState::Image) => items.push(RenderNode {
                content: NodeContent::Image(Image {
                    asset_id: image.asset_id.clone(),
                    source: image.source.clone(),
                    width: image.width,
                    height: image.height,
                }),
                ..RenderNode::group(Vec::new())
            }),
            (NodeKind::Composition(comp), _) => {
                items.extend(self.render_children(&comp.children, state));
            }
            _ => {}
        }
        for &child in &node.children {
            if self.node(child).origin == NodeOrigin::Mask {
                continue;
            }
            if let Some(rendered) = self.render_node(child, state) {
                items.push(rendered);
            }
        }

        let masks = match node_state.mask.and_then(|id| state.nodes.get(id.0)) {
            Some(NodeState {
                content: ContentState::Mask(paths),
                ..
            }) => paths
                .iter()
                .map(|m| Mask {
                    mode: m.mode,
                    path: m.path.to_bez_path(),
                    opacity: m.opacity,
                    inverted: m.inverted,
                })
                .collect(),
            _ => Vec::new(),
        };

        Some(RenderNode {
            name: node.header.name.clone(),
            transform: node_state.matrix(),
            alpha: node_state.transform.opacity,
            blend_mode: node.header.blend_mode,
            content: NodeContent::Group(items),
            masks,
        })
    }
}

fn render_group(group: &ResolvedGroup) -> Option<RenderNode> {
    let (fill, stroke) = group.paint();
    if fill.is_none() && stroke.is_none() {
        return None;
    }
    let shape = |geometry: ShapeGeometry| RenderNode {
        content: NodeContent::Shape(Shape {
            geometry,
            fill: fill.clone(),
            stroke: stroke.clone(),
        }),
        ..RenderNode::group(Vec::new())
    };

    let mut items = Vec::new();
    for path in group.paths.iter().filter(|p| !p.is_empty()) {
        items.push(shape(ShapeGeometry::Path(path.to_bez_path())));
    }
    for rect in &group.rects {
        items.push(shape(ShapeGeometry::Rect {
            origin: rect.position,
            size: rect.size,
            radius: rect.roundness,
        }));
    }
    for ellipse in &group.ellipses {
        items.push(shape(ShapeGeometry::Ellipse {
            center: ellipse.center,
            radii: ellipse.radii(),
        }));
    }

    let mut node = RenderNode::group(items);
    node.name = group.name.clone();
    if let Some(transform) = group.transform {
        node.transform = transform.matrix();
        node.alpha = transform.opacity;
    }
    Some(node)
}
