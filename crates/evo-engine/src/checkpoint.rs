//! Checkpoint discovery, loading and writing.
//!
//! A checkpoint is a directory named `checkpoint_<N>` containing
//! `metadata.json` (last iteration + archive) and one JSON file per
//! candidate under `programs/`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::types::{Candidate, Edge, EvolutionData, Population};
use crate::EngineError;

/// Checkpoint-level metadata.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointMetadata {
    #[serde(default)]
    last_iteration: u64,
    #[serde(default)]
    archive: Vec<String>,
}

/// Find the highest-numbered `checkpoint_<N>` directory under `base`.
pub fn find_latest_checkpoint(base: &Path) -> Option<PathBuf> {
    let mut best: Option<(u64, PathBuf)> = None;
    for entry in WalkDir::new(base)
        .max_depth(4)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let Some(n) = name
            .strip_prefix("checkpoint_")
            .and_then(|s| s.parse::<u64>().ok())
        else {
            continue;
        };
        if best.as_ref().map_or(true, |(b, _)| n > *b) {
            best = Some((n, entry.into_path()));
        }
    }
    best.map(|(_, path)| path)
}

/// Load the evolution graph from a checkpoint directory.
pub fn load_checkpoint(dir: &Path) -> Result<EvolutionData, EngineError> {
    let metadata: CheckpointMetadata = match std::fs::read_to_string(dir.join("metadata.json")) {
        Ok(content) => serde_json::from_str(&content)?,
        Err(_) => CheckpointMetadata::default(),
    };

    let mut nodes: Vec<Candidate> = Vec::new();
    let programs_dir = dir.join("programs");
    if programs_dir.is_dir() {
        for entry in std::fs::read_dir(&programs_dir)? {
            let entry = entry?;
            if entry.path().extension().map_or(true, |e| e != "json") {
                continue;
            }
            let content = std::fs::read_to_string(entry.path())?;
            match serde_json::from_str::<Candidate>(&content) {
                Ok(candidate) => nodes.push(candidate),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping unreadable program file");
                }
            }
        }
    }
    nodes.sort_by(|a, b| a.iteration.cmp(&b.iteration).then(a.id.cmp(&b.id)));

    let edges = nodes
        .iter()
        .filter_map(|c| {
            let parent = c.parent_id.as_ref()?;
            nodes.iter().any(|p| &p.id == parent).then(|| Edge {
                source: parent.clone(),
                target: c.id.clone(),
            })
        })
        .collect();

    Ok(EvolutionData {
        nodes,
        edges,
        archive: metadata.archive,
        checkpoint_dir: dir.display().to_string(),
    })
}

/// Load the latest checkpoint under `base`, if any.
pub fn load_latest(base: &Path) -> Option<EvolutionData> {
    let dir = find_latest_checkpoint(base)?;
    match load_checkpoint(&dir) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to load checkpoint");
            None
        }
    }
}

/// Persist a population snapshot as `checkpoints/checkpoint_<iteration>`.
pub fn save_checkpoint(
    output_dir: &Path,
    iteration: u64,
    population: &Population,
) -> Result<PathBuf, EngineError> {
    let dir = output_dir
        .join("checkpoints")
        .join(format!("checkpoint_{iteration}"));
    let programs_dir = dir.join("programs");
    std::fs::create_dir_all(&programs_dir)?;

    let metadata = CheckpointMetadata {
        last_iteration: iteration,
        archive: population.archive.clone(),
    };
    std::fs::write(
        dir.join("metadata.json"),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    for candidate in &population.candidates {
        std::fs::write(
            programs_dir.join(format!("{}.json", candidate.id)),
            serde_json::to_string_pretty(candidate)?,
        )?;
    }

    debug!(dir = %dir.display(), programs = population.candidates.len(), "checkpoint saved");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn candidate(id: &str, parent: Option<&str>, iteration: u64) -> Candidate {
        Candidate {
            id: id.into(),
            code: "x = 1".into(),
            metrics: BTreeMap::new(),
            generation: 0,
            parent_id: parent.map(Into::into),
            island: 0,
            iteration,
            method: "seed".into(),
        }
    }

    #[test]
    fn roundtrip_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let pop = Population {
            candidates: vec![
                candidate("a", None, 0),
                candidate("b", Some("a"), 3),
            ],
            archive: vec!["b".into()],
        };

        let saved = save_checkpoint(dir.path(), 10, &pop).unwrap();
        assert!(saved.ends_with("checkpoints/checkpoint_10"));

        let data = load_checkpoint(&saved).unwrap();
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.edges.len(), 1);
        assert_eq!(data.archive, vec!["b".to_string()]);
    }

    #[test]
    fn latest_checkpoint_is_highest_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let pop = Population::default();
        let _ = save_checkpoint(dir.path(), 10, &pop).unwrap();
        let _ = save_checkpoint(dir.path(), 100, &pop).unwrap();
        let _ = save_checkpoint(dir.path(), 20, &pop).unwrap();

        let latest = find_latest_checkpoint(dir.path()).unwrap();
        assert!(latest.ends_with("checkpoint_100"));
    }

    #[test]
    fn no_checkpoint_found_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_latest_checkpoint(dir.path()).is_none());
        assert!(load_latest(dir.path()).is_none());
    }

    #[test]
    fn non_numeric_checkpoint_names_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("checkpoint_latest")).unwrap();
        assert!(find_latest_checkpoint(dir.path()).is_none());
    }

    #[test]
    fn missing_metadata_defaults_to_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = dir.path().join("checkpoint_1");
        std::fs::create_dir_all(ckpt.join("programs")).unwrap();
        let data = load_checkpoint(&ckpt).unwrap();
        assert!(data.archive.is_empty());
        assert!(data.nodes.is_empty());
    }

    #[test]
    fn corrupt_program_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let pop = Population {
            candidates: vec![candidate("a", None, 0)],
            archive: vec![],
        };
        let saved = save_checkpoint(dir.path(), 1, &pop).unwrap();
        std::fs::write(saved.join("programs").join("bad.json"), "{oops").unwrap();

        let data = load_checkpoint(&saved).unwrap();
        assert_eq!(data.nodes.len(), 1);
    }
}
