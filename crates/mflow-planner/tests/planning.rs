//! End-to-end planning scenarios.

use std::collections::HashSet;

use mflow_models::{FormatInfo, JobSpec, MediaDuration, MediaInfo, VideoStream};
use mflow_planner::Planner;
use serde_json::json;

fn spec(value: serde_json::Value) -> JobSpec {
    serde_json::from_value(value).unwrap()
}

fn probed_1080p(secs: u64) -> MediaInfo {
    MediaInfo {
        format: FormatInfo {
            filename: "in.mp4".to_string(),
            format_name: "mp4".to_string(),
            duration: Some(MediaDuration::from_secs(secs)),
            size: Some(50_000_000),
            bit_rate: Some(4_000_000),
            start_time: Some(0.0),
        },
        video_streams: vec![VideoStream {
            index: 0,
            codec: "h264".to_string(),
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            pixel_format: "yuv420p".to_string(),
            bit_rate: Some(4_000_000),
            duration: Some(MediaDuration::from_secs(secs)),
        }],
        audio_streams: Vec::new(),
    }
}

fn two_op_spec() -> JobSpec {
    spec(json!({
        "inputs": [{"id": "video", "source": "file:///in.mp4"}],
        "operations": [
            {"op": "trim", "input": "video", "output": "trimmed",
             "params": {"start": "00:00:10", "duration": "00:00:30"}},
            {"op": "scale", "input": "trimmed", "output": "scaled",
             "params": {"width": 1280, "height": 720}}
        ],
        "outputs": [{"id": "scaled", "destination": "file:///out.mp4"}]
    }))
}

#[test]
fn two_op_pipeline_has_expected_shape() {
    let plan = Planner::with_global_registry().plan(&two_op_spec()).unwrap();

    assert_eq!(plan.node_count(), 4);
    assert_eq!(plan.edge_count(), 3);
    assert_eq!(plan.stages.len(), 4);

    // Linear chain: each stage holds exactly one node.
    for stage in &plan.stages {
        assert_eq!(stage.len(), 1);
    }
}

#[test]
fn topological_order_is_a_permutation_respecting_edges() {
    let plan = Planner::with_global_registry().plan(&two_op_spec()).unwrap();

    let ids: HashSet<&str> = plan.nodes.iter().map(|n| n.id()).collect();
    let ordered: HashSet<&str> = plan.order.iter().map(String::as_str).collect();
    assert_eq!(ids, ordered);
    assert_eq!(plan.order.len(), plan.nodes.len());

    let position = |id: &str| plan.order.iter().position(|n| n == id).unwrap();
    for edge in &plan.edges {
        assert!(
            position(&edge.from) < position(&edge.to),
            "edge {} -> {} violated",
            edge.from,
            edge.to
        );
    }
}

#[test]
fn stages_partition_nodes_with_no_intra_stage_edges() {
    let plan = Planner::with_global_registry()
        .plan(&spec(json!({
            "inputs": [
                {"id": "a", "source": "file:///a.mp4"},
                {"id": "b", "source": "file:///b.mp4"}
            ],
            "operations": [
                {"op": "trim", "input": "a", "output": "a_cut", "params": {"duration": "10s"}},
                {"op": "trim", "input": "b", "output": "b_cut", "params": {"duration": "10s"}},
                {"op": "concat", "inputs": ["a_cut", "b_cut"], "output": "joined", "params": {}}
            ],
            "outputs": [{"id": "joined", "destination": "file:///out.mp4"}]
        })))
        .unwrap();

    // Partition: every node appears exactly once across stages.
    let mut seen = HashSet::new();
    for stage in &plan.stages {
        for id in stage {
            assert!(seen.insert(id.clone()), "{} appears twice", id);
        }
    }
    assert_eq!(seen.len(), plan.nodes.len());

    // No stage contains two nodes connected by an edge.
    for stage in &plan.stages {
        let members: HashSet<&str> = stage.iter().map(String::as_str).collect();
        for edge in &plan.edges {
            assert!(
                !(members.contains(edge.from.as_str()) && members.contains(edge.to.as_str())),
                "stage contains edge {} -> {}",
                edge.from,
                edge.to
            );
        }
    }

    // Longest path (input -> trim -> concat -> output) + 1.
    assert_eq!(plan.stages.len(), 4);
}

#[test]
fn parallel_fan_out_shares_stage_two() {
    let plan = Planner::with_global_registry()
        .plan(&spec(json!({
            "inputs": [
                {"id": "a", "source": "file:///a.mp4"},
                {"id": "b", "source": "file:///b.mp4"}
            ],
            "operations": [
                {"op": "trim", "input": "a", "output": "a_cut", "params": {"duration": "10s"}},
                {"op": "trim", "input": "b", "output": "b_cut", "params": {"duration": "10s"}}
            ],
            "outputs": [
                {"id": "a_cut", "destination": "file:///a_out.mp4"},
                {"id": "b_cut", "destination": "file:///b_out.mp4"}
            ]
        })))
        .unwrap();

    let stage: HashSet<&str> = plan.stages[1].iter().map(String::as_str).collect();
    assert_eq!(stage, ["op_0_trim", "op_1_trim"].into_iter().collect());
}

#[test]
fn forward_reference_is_rejected() {
    let err = Planner::with_global_registry()
        .plan(&spec(json!({
            "inputs": [{"id": "video", "source": "file:///in.mp4"}],
            "operations": [
                {"op": "scale", "input": "trimmed", "output": "scaled",
                 "params": {"width": 1280, "height": 720}},
                {"op": "trim", "input": "video", "output": "trimmed",
                 "params": {"duration": "10s"}}
            ],
            "outputs": [{"id": "scaled", "destination": "file:///out.mp4"}]
        })))
        .unwrap_err();

    assert_eq!(err.to_string(), "reference 'trimmed' not found");
}

#[test]
fn scale_auto_height_resolves_against_probed_input() {
    let planner = Planner::with_global_registry();
    let mut graph = planner
        .build_graph(&spec(json!({
            "inputs": [{"id": "video", "source": "file:///in.mp4"}],
            "operations": [
                {"op": "scale", "input": "video", "output": "scaled",
                 "params": {"width": 1280, "height": -1}}
            ],
            "outputs": [{"id": "scaled", "destination": "file:///out.mp4"}]
        })))
        .unwrap();

    graph
        .node_mut("input_video")
        .unwrap()
        .set_media(probed_1080p(120));
    planner.plan_graph(&mut graph).unwrap();

    let scaled = graph.node("op_0_scale").unwrap().media().unwrap();
    let video = scaled.primary_video().unwrap();
    assert_eq!((video.width, video.height), (1280, 720));

    // The probed input is untouched.
    let input = graph.node("input_video").unwrap().media().unwrap();
    assert_eq!(
        (
            input.primary_video().unwrap().width,
            input.primary_video().unwrap().height
        ),
        (1920, 1080)
    );
}

#[test]
fn metadata_computation_never_mutates_inputs() {
    let registry = mflow_ops::registry::global();
    let inputs = vec![probed_1080p(60)];
    let before = inputs.clone();

    for (name, params) in [
        ("trim", json!({"start": "5s", "duration": "20s"})),
        ("scale", json!({"width": 640, "height": -1})),
        ("crop", json!({"width": 640, "height": 360})),
        ("fps", json!({"fps": 24})),
        ("drawtext", json!({"text": "hello"})),
        ("speed", json!({"factor": 2.0})),
    ] {
        let op = registry.require(name).unwrap();
        let coerced = op.validate(params.as_object().unwrap()).unwrap();
        op.output_metadata(&inputs, &coerced).unwrap();
        assert_eq!(inputs, before, "{} mutated its inputs", name);
    }
}
