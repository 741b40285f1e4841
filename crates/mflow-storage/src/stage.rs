//! Execution-time staging.
//!
//! Before the external tool runs, every remote input is materialised under
//! a fresh per-job temporary directory and the graph's input/output nodes
//! are rewritten to local paths, keeping the original destinations for the
//! upload pass. The directory is scrubbed on all exit paths, but only when
//! it passes a temp-location heuristic.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use mflow_models::OutputArtifact;
use mflow_planner::{Graph, NodeKind};

use crate::client::StorageClient;
use crate::error::{StorageError, StorageResult};
use crate::uri::{extension_of, file_path, parse_scheme, Scheme};

/// One staged output awaiting upload.
#[derive(Debug, Clone)]
pub struct StagedOutput {
    pub node_id: String,
    pub spec_id: String,
    pub local_path: PathBuf,
    pub destination: String,
}

/// The staging record for one job.
#[derive(Debug)]
pub struct StagedJob {
    pub dir: PathBuf,
    pub outputs: Vec<StagedOutput>,
}

/// Materialises inputs locally and uploads outputs after success.
pub struct Stager {
    storage: StorageClient,
    work_dir: PathBuf,
}

impl Stager {
    pub fn new(storage: StorageClient, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            work_dir: work_dir.into(),
        }
    }

    /// Download every remote input and rewrite the graph to local paths.
    /// Local `file` inputs pass through without a copy. The staging
    /// directory is removed again if any download fails.
    pub async fn stage_inputs(&self, job_id: &str, graph: &mut Graph) -> StorageResult<StagedJob> {
        fs::create_dir_all(&self.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("mflow-{}-", job_id))
            .tempdir_in(&self.work_dir)?
            .into_path();
        debug!(job_id, dir = %dir.display(), "staging directory created");

        match self.stage_into(&dir, graph).await {
            Ok(outputs) => Ok(StagedJob { dir, outputs }),
            Err(e) => {
                let _ = fs::remove_dir_all(&dir).await;
                Err(e)
            }
        }
    }

    async fn stage_into(
        &self,
        dir: &Path,
        graph: &mut Graph,
    ) -> StorageResult<Vec<StagedOutput>> {
        let input_ids: Vec<String> = graph
            .input_nodes()
            .iter()
            .map(|n| n.id.clone())
            .collect();

        for (index, id) in input_ids.iter().enumerate() {
            let (source, spec_id) = match graph.node(id).map(|n| &n.kind) {
                Some(NodeKind::Input {
                    source, spec_id, ..
                }) => (source.clone(), spec_id.clone()),
                _ => continue,
            };

            let local = match parse_scheme(&source)? {
                Scheme::File => {
                    let path = file_path(&source);
                    if !fs::try_exists(&path).await? {
                        return Err(StorageError::NotFound(source));
                    }
                    path
                }
                _ => {
                    let staged =
                        dir.join(format!("in_{}_{}.{}", index, spec_id, extension_of(&source)));
                    self.storage.get(&source, &staged).await?;
                    staged
                }
            };

            if let Some(node) = graph.node_mut(id) {
                if let NodeKind::Input { staged, .. } = &mut node.kind {
                    *staged = Some(local);
                }
            }
        }

        // Point every output at a local file; the original destination is
        // kept for the upload pass.
        let mut outputs = Vec::new();
        let output_ids: Vec<String> = graph
            .output_nodes()
            .iter()
            .map(|n| n.id.clone())
            .collect();
        for id in output_ids {
            let Some(node) = graph.node_mut(&id) else { continue };
            if let NodeKind::Output {
                spec_id,
                destination,
                staged,
                ..
            } = &mut node.kind
            {
                let local = dir.join(format!("out_{}.{}", spec_id, extension_of(destination)));
                *staged = Some(local.clone());
                outputs.push(StagedOutput {
                    node_id: id.clone(),
                    spec_id: spec_id.clone(),
                    local_path: local,
                    destination: destination.clone(),
                });
            }
        }

        Ok(outputs)
    }

    /// Upload every produced file to its original destination.
    pub async fn upload_outputs(&self, staged: &StagedJob) -> StorageResult<Vec<OutputArtifact>> {
        let mut artifacts = Vec::with_capacity(staged.outputs.len());
        for output in &staged.outputs {
            if !fs::try_exists(&output.local_path).await? {
                return Err(StorageError::upload_failed(format!(
                    "output '{}' was not produced",
                    output.spec_id
                )));
            }
            let size_bytes = fs::metadata(&output.local_path).await.ok().map(|m| m.len());

            self.storage
                .put(&output.local_path, &output.destination)
                .await?;
            info!(output = %output.spec_id, destination = %output.destination, "output delivered");

            artifacts.push(OutputArtifact {
                id: output.spec_id.clone(),
                destination: output.destination.clone(),
                size_bytes,
            });
        }
        Ok(artifacts)
    }

    /// Remove the staging directory. Paths outside the configured work dir
    /// and the system temp root are refused.
    pub async fn cleanup(&self, staged: &StagedJob) -> StorageResult<()> {
        if !self.is_scrub_safe(&staged.dir) {
            warn!(dir = %staged.dir.display(), "refusing to scrub suspicious path");
            return Err(StorageError::RefusedCleanup(staged.dir.clone()));
        }
        if fs::try_exists(&staged.dir).await? {
            fs::remove_dir_all(&staged.dir).await?;
            debug!(dir = %staged.dir.display(), "staging directory removed");
        }
        Ok(())
    }

    fn is_scrub_safe(&self, dir: &Path) -> bool {
        let under_work_dir = dir.starts_with(&self.work_dir);
        let under_tmp = dir.starts_with(std::env::temp_dir());
        let named_like_staging = dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("mflow-"))
            .unwrap_or(false);
        (under_work_dir || under_tmp) && named_like_staging
    }
}
