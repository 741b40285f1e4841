//! External-tool command assembly.
//!
//! Consumes a compiled graph and emits a single argument vector: one `-i`
//! per input node, a joined `-filter_complex` expression, and per output a
//! `-map` for each label of its producer followed by the destination path.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use mflow_ops::{CompileContext, OperatorRegistry, StreamLabel};
use mflow_planner::{Graph, NodeKind, PlanError};

use crate::error::MediaResult;

const DEFAULT_BINARY: &str = "ffmpeg";

/// Builds the external-tool argv from a graph.
pub struct CommandBuilder {
    binary: String,
    registry: Arc<OperatorRegistry>,
}

impl CommandBuilder {
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            registry,
        }
    }

    /// Use a configured binary instead of `ffmpeg`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Assemble the argument vector.
    pub fn build(&self, graph: &Graph) -> MediaResult<Vec<String>> {
        let inputs = graph.input_nodes();

        // Seed each input's stream labels from its zero-based index.
        let mut labels: HashMap<String, Vec<StreamLabel>> = HashMap::new();
        for (index, input) in inputs.iter().enumerate() {
            labels.insert(
                input.id.clone(),
                vec![
                    StreamLabel::video(format!("{}:v", index)),
                    StreamLabel::audio(format!("{}:a", index)),
                ],
            );
        }

        // Compile operations in topological order, threading labels.
        let mut filters: Vec<String> = Vec::new();
        for id in graph.topological_sort()? {
            let Some(node) = graph.node(&id) else { continue };
            let NodeKind::Operation { op, params, .. } = &node.kind else {
                continue;
            };

            let predecessors = graph.predecessors(&id);
            let input_labels: Vec<Vec<StreamLabel>> = predecessors
                .iter()
                .map(|pred| labels.get(*pred).cloned().unwrap_or_default())
                .collect();
            let metadata = {
                let collected: Vec<_> = predecessors
                    .iter()
                    .filter_map(|pred| graph.node(pred).and_then(|n| n.media()).cloned())
                    .collect();
                // All-or-nothing: partial metadata would skew -1 resolution.
                if collected.len() == predecessors.len() {
                    collected
                } else {
                    Vec::new()
                }
            };

            let operator = self
                .registry
                .require(op)
                .map_err(|e| PlanError::at_node(&id, e))?;
            let coerced = operator
                .validate(params)
                .map_err(|e| PlanError::at_node(&id, e))?;

            let ctx = CompileContext {
                inputs: input_labels,
                params: coerced,
                metadata,
            };
            let fragment = operator
                .compile(&ctx)
                .map_err(|e| PlanError::at_node(&id, e))?;

            filters.extend(fragment.exprs);
            labels.insert(id.clone(), fragment.outputs);
        }

        // Assemble argv.
        let mut args = vec![self.binary.clone()];
        for input in &inputs {
            if let NodeKind::Input { source, staged, .. } = &input.kind {
                args.push("-i".to_string());
                args.push(local_path(staged.as_deref(), source));
            }
        }

        if !filters.is_empty() {
            args.push("-filter_complex".to_string());
            args.push(filters.join(";"));
        }

        for output in graph.output_nodes() {
            let NodeKind::Output {
                destination,
                staged,
                ..
            } = &output.kind
            else {
                continue;
            };

            let producers = graph.predecessors(&output.id);
            if let Some(producer) = producers.first() {
                for label in labels.get(*producer).into_iter().flatten() {
                    args.push("-map".to_string());
                    args.push(label.render());
                }
            }
            args.push(local_path(staged.as_deref(), destination));
        }

        debug!(argv = ?args, "assembled command");
        Ok(args)
    }
}

/// The local path the tool should read or write: the staged path when the
/// stager ran, else the URI with any `file://` prefix stripped.
fn local_path(staged: Option<&std::path::Path>, uri: &str) -> String {
    match staged {
        Some(path) => path.to_string_lossy().into_owned(),
        None => uri.strip_prefix("file://").unwrap_or(uri).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mflow_models::{FormatInfo, JobSpec, MediaDuration, MediaInfo};
    use mflow_ops::registry;
    use mflow_planner::GraphBuilder;
    use serde_json::json;

    fn build_graph(spec: serde_json::Value) -> Graph {
        let spec: JobSpec = serde_json::from_value(spec).unwrap();
        GraphBuilder::new(registry::global()).build(&spec).unwrap()
    }

    fn builder() -> CommandBuilder {
        CommandBuilder::new(registry::global())
    }

    #[test]
    fn two_op_pipeline_argv() {
        let graph = build_graph(json!({
            "inputs": [{"id": "video", "source": "file:///in.mp4"}],
            "operations": [
                {"op": "trim", "input": "video", "output": "trimmed",
                 "params": {"start": "00:00:10", "duration": "00:00:30"}},
                {"op": "scale", "input": "trimmed", "output": "scaled",
                 "params": {"width": 1280, "height": 720}}
            ],
            "outputs": [{"id": "scaled", "destination": "file:///out.mp4"}]
        }));

        let args = builder().build(&graph).unwrap();
        assert_eq!(
            args,
            vec![
                "ffmpeg",
                "-i",
                "/in.mp4",
                "-filter_complex",
                "[0:v]trim=start=10.000:duration=30.000[v];\
                 [0:a]atrim=start=10.000:duration=30.000[a];\
                 [v]scale=1280:720:flags=bicubic[v]",
                "-map",
                "[v]",
                "-map",
                "[a]",
                "/out.mp4",
            ]
        );
    }

    #[test]
    fn passthrough_output_maps_input_labels() {
        let graph = build_graph(json!({
            "inputs": [{"id": "video", "source": "file:///in.mp4"}],
            "operations": [],
            "outputs": [{"id": "video", "destination": "file:///copy.mp4"}]
        }));

        let args = builder().build(&graph).unwrap();
        assert_eq!(
            args,
            vec![
                "ffmpeg", "-i", "/in.mp4", "-map", "[0:v]", "-map", "[0:a]", "/copy.mp4",
            ]
        );
    }

    #[test]
    fn fan_out_emits_two_inputs() {
        let graph = build_graph(json!({
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
        }));

        let args = builder().build(&graph).unwrap();
        let input_count = args.iter().filter(|a| a.as_str() == "-i").count();
        assert_eq!(input_count, 2);
        assert_eq!(args[2], "/a.mp4");
        assert_eq!(args[4], "/b.mp4");
    }

    #[test]
    fn unknown_operator_fails() {
        let mut graph = Graph::new();
        graph
            .add_node(mflow_planner::Node {
                id: "op_0_warp".to_string(),
                kind: NodeKind::Operation {
                    op: "warp".to_string(),
                    params: serde_json::Map::new(),
                    media: None,
                },
            })
            .unwrap();

        let err = builder().build(&graph).unwrap_err();
        assert!(err.to_string().contains("unknown operator 'warp'"));
    }

    #[test]
    fn staged_paths_override_uris() {
        let mut graph = build_graph(json!({
            "inputs": [{"id": "video", "source": "https://cdn.example.com/in.mp4"}],
            "operations": [],
            "outputs": [{"id": "video", "destination": "s3://bucket/out.mp4"}]
        }));

        if let Some(node) = graph.node_mut("input_video") {
            if let NodeKind::Input { staged, media, .. } = &mut node.kind {
                *staged = Some("/tmp/job/in.mp4".into());
                *media = Some(MediaInfo {
                    format: FormatInfo {
                        duration: Some(MediaDuration::from_secs(10)),
                        ..Default::default()
                    },
                    ..Default::default()
                });
            }
        }
        if let Some(node) = graph.node_mut("output_video") {
            if let NodeKind::Output { staged, .. } = &mut node.kind {
                *staged = Some("/tmp/job/out.mp4".into());
            }
        }

        let args = builder().build(&graph).unwrap();
        assert_eq!(args[2], "/tmp/job/in.mp4");
        assert_eq!(args.last().unwrap(), "/tmp/job/out.mp4");
    }

    #[test]
    fn custom_binary_name() {
        let graph = build_graph(json!({
            "inputs": [{"id": "video", "source": "file:///in.mp4"}],
            "operations": [],
            "outputs": [{"id": "video", "destination": "file:///out.mp4"}]
        }));
        let args = builder().with_binary("/opt/ffmpeg/bin/ffmpeg").build(&graph).unwrap();
        assert_eq!(args[0], "/opt/ffmpeg/bin/ffmpeg");
    }
}
