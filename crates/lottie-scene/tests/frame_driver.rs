use glam::Vec2;
use lottie_model::model::Document;
use lottie_scene::{ContentState, DrawContent, MaskMode, NodeContent, NodeId, Scene};
use serde_json::json;
use std::fs::File;
use std::io::BufReader;

fn doc(value: serde_json::Value) -> Document {
    serde_json::from_value(value).unwrap()
}

fn fixture_scene() -> Scene {
    let file = File::open("tests/fixtures/precomp_parented.json").unwrap();
    Scene::build(&Document::from_reader(BufReader::new(file)).unwrap()).unwrap()
}

fn rect_layer(ip: f32, op: f32) -> serde_json::Value {
    json!({
        "ty": 4, "ind": 1, "nm": "Rect", "ip": ip, "op": op,
        "shapes": [{
            "ty": "gr", "nm": "Body",
            "it": [
                {
                    "ty": "rc",
                    "s": { "a": 0, "k": [10, 10] },
                    "p": { "a": 1, "k": [
                        { "t": 0, "s": [0, 0] },
                        { "t": 50, "s": [100, 100] }
                    ] }
                },
                { "ty": "fl", "c": { "a": 0, "k": [1, 0, 0, 1] }, "o": { "a": 0, "k": 100 } }
            ]
        }]
    })
}

fn rect_position(scene: &Scene, id: NodeId, frame: f32) -> Vec2 {
    let state = scene.evaluate_frame(frame);
    state.node(id).shapes()[0].rects[0].position
}

#[test]
fn test_rect_position_interpolates_and_clamps() {
    let scene = Scene::build(&doc(json!({
        "fr": 30, "op": 100, "w": 200, "h": 200,
        "layers": [rect_layer(0.0, 100.0)]
    })))
    .unwrap();
    let rect = scene.find_by_name("Rect").next().unwrap();

    assert_eq!(rect_position(&scene, rect, 25.0), Vec2::new(50.0, 50.0));
    assert_eq!(rect_position(&scene, rect, 75.0), Vec2::new(100.0, 100.0));
}

#[test]
fn test_layer_outside_range_has_no_geometry() {
    let scene = Scene::build(&doc(json!({
        "fr": 30, "op": 100, "w": 200, "h": 200,
        "layers": [rect_layer(20.0, 40.0)]
    })))
    .unwrap();
    let rect = scene.find_by_name("Rect").next().unwrap();

    let state = scene.evaluate_frame(50.0);
    let node = state.node(rect);
    assert!(node.evaluated);
    assert!(!node.active);
    assert_eq!(node.content, ContentState::Hidden);
    assert!(!node.has_visible_geometry());
    assert!(scene.render_tree(&state).draw_list().is_empty());

    assert!(scene.evaluate_frame(30.0).node(rect).has_visible_geometry());
}

fn masked_scene() -> Scene {
    Scene::build(&doc(json!({
        "fr": 30, "op": 60, "w": 100, "h": 100,
        "layers": [{
            "ty": 4, "ind": 1, "nm": "Target", "ip": 0, "op": 60, "hasMask": true,
            "masksProperties": [{
                "mode": "a",
                "pt": { "a": 1, "k": [
                    { "t": 0, "h": 1, "s": [{ "c": true, "v": [] }] },
                    { "t": 11, "s": [{ "c": true, "v": [[0, 0], [10, 0], [10, 10]] }] }
                ] },
                "o": { "a": 0, "k": 100 }
            }],
            "shapes": [{
                "ty": "gr",
                "it": [
                    { "ty": "rc", "s": { "a": 0, "k": [20, 20] }, "p": { "a": 0, "k": [0, 0] } },
                    { "ty": "fl", "c": { "a": 0, "k": [0, 0, 1, 1] } }
                ]
            }]
        }]
    })))
    .unwrap()
}

#[test]
fn test_mask_binding_follows_mask_geometry() {
    let scene = masked_scene();
    let target = scene.find_by_name("Target").next().unwrap();

    let before = scene.evaluate_frame(10.0);
    let binding = before.mask_for(target).unwrap();
    assert!(!binding.applied);
    assert_eq!(before.node(target).mask, None);
    assert_eq!(before.applied_masks(), 0);

    let after = scene.evaluate_frame(11.0);
    let binding = after.mask_for(target).unwrap();
    assert!(binding.applied);
    assert_eq!(after.node(target).mask, Some(binding.mask));

    let commands = scene.render_tree(&after).draw_list();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].masked);
    assert!(!scene.render_tree(&before).draw_list()[0].masked);
}

#[test]
fn test_held_mask_switches_on_keyframe_frame() {
    let scene = Scene::build(&doc(json!({
        "fr": 30, "op": 60, "w": 100, "h": 100,
        "layers": [{
            "ty": 4, "ind": 1, "nm": "Target", "ip": 0, "op": 60, "hasMask": true,
            "masksProperties": [{
                "mode": "a",
                "pt": { "a": 1, "k": [
                    { "t": 0, "h": 1, "s": [{ "c": true, "v": [] }] },
                    { "t": 11, "s": [{ "c": true, "v": [[0, 0], [10, 0], [10, 10]] }] },
                    { "t": 30, "s": [{ "c": true, "v": [[0, 0], [40, 0], [40, 40]] }] }
                ] }
            }],
            "shapes": []
        }]
    })))
    .unwrap();
    let target = scene.find_by_name("Target").next().unwrap();

    assert!(!scene.evaluate_frame(10.0).mask_for(target).unwrap().applied);
    assert!(scene.evaluate_frame(11.0).mask_for(target).unwrap().applied);
    assert!(scene.evaluate_frame(20.0).mask_for(target).unwrap().applied);
}

#[test]
fn test_each_mask_keeps_its_own_mode() {
    let square = json!({ "c": true, "v": [[0, 0], [20, 0], [20, 20], [0, 20]] });
    let scene = Scene::build(&doc(json!({
        "fr": 30, "op": 60, "w": 100, "h": 100,
        "layers": [{
            "ty": 4, "ind": 1, "nm": "Target", "ip": 0, "op": 60, "hasMask": true,
            "masksProperties": [
                { "mode": "a", "pt": { "a": 0, "k": square } },
                { "mode": "s", "inv": true, "o": { "a": 0, "k": 50 }, "pt": { "a": 0, "k": square } }
            ],
            "shapes": [{ "ty": "gr", "it": [
                { "ty": "rc", "s": { "a": 0, "k": [20, 20] }, "p": { "a": 0, "k": [0, 0] } },
                { "ty": "fl", "c": { "a": 0, "k": [0, 1, 0, 1] } }
            ] }]
        }]
    })))
    .unwrap();

    let tree = scene.render_tree(&scene.evaluate_frame(5.0));
    let NodeContent::Group(layers) = &tree.root.content else {
        panic!("root should be a group");
    };
    let masks = &layers[0].masks;
    assert_eq!(masks.len(), 2);
    assert_eq!(masks[0].mode, MaskMode::Add);
    assert!(!masks[0].inverted);
    assert_eq!(masks[0].opacity, 1.0);
    assert_eq!(masks[1].mode, MaskMode::Subtract);
    assert!(masks[1].inverted);
    assert_eq!(masks[1].opacity, 0.5);
}

#[test]
fn test_masks_are_evaluated_before_layers() {
    let scene = masked_scene();
    let target = scene.find_by_name("Target").next().unwrap();
    let state = scene.evaluate_frame(20.0);
    let mask = state.mask_for(target).unwrap().mask;

    let mask_pos = state.order.iter().position(|id| *id == mask).unwrap();
    let target_pos = state.order.iter().position(|id| *id == target).unwrap();
    assert!(mask_pos < target_pos);
    assert_eq!(state.order[0], mask);
}

#[test]
fn test_evaluation_is_order_independent() {
    let scene = fixture_scene();
    let direct = scene.evaluate_frame(30.0);

    let mut reused = scene.evaluate_frame(80.0);
    scene.evaluate_frame_into(10.0, &mut reused);
    scene.evaluate_frame_into(30.0, &mut reused);
    assert_eq!(direct, reused);
    assert_eq!(scene.evaluate_frame(30.0), direct);
}

#[test]
fn test_precomp_instances_follow_their_own_timing() {
    let scene = fixture_scene();
    let boxes: Vec<_> = scene.find_by_name("Box").collect();

    let early = scene.evaluate_frame(25.0);
    let late = scene.evaluate_frame(75.0);
    let positions = |state: &lottie_scene::FrameState| {
        boxes
            .iter()
            .filter(|id| state.node(**id).active)
            .map(|id| state.node(*id).shapes()[0].rects[0].position)
            .collect::<Vec<_>>()
    };

    assert_eq!(positions(&early), vec![Vec2::new(50.0, 50.0)]);
    assert_eq!(positions(&late), vec![Vec2::new(50.0, 50.0)]);
}

#[test]
fn test_draw_list_applies_cloned_parent_transform() {
    let scene = fixture_scene();
    let tree = scene.render_tree(&scene.evaluate_frame(25.0));
    assert_eq!(tree.width, 320.0);
    assert_eq!(tree.frame, 25.0);

    let commands = tree.draw_list();
    assert_eq!(commands.len(), 1);
    assert!(matches!(commands[0].content, DrawContent::Shape(_)));

    // Rect at (50, 50) inside a rig positioned at (10, 10).
    let bounds = commands[0].world_bounds();
    assert!((bounds.x0 - 60.0).abs() < 1e-3);
    assert!((bounds.y0 - 60.0).abs() < 1e-3);
    assert!((bounds.x1 - 80.0).abs() < 1e-3);
    assert!((bounds.y1 - 80.0).abs() < 1e-3);
}

#[test]
fn test_cloned_shell_stays_active_outside_its_range() {
    let scene = fixture_scene();
    let late = scene.find_by_name("Late").next().unwrap();
    let shell = scene.composition(late).unwrap().cloned_layers[0];

    // The shell copies Rig's range of 50..100 but is forced visible.
    let state = scene.evaluate_frame(10.0);
    assert!(state.node(shell).active);
    assert!(!state.node(late).active);
}
