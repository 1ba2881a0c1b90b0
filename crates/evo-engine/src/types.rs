//! Candidate population and evolution-graph data shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One candidate solution known to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique candidate identifier.
    pub id: String,
    /// Program source text.
    pub code: String,
    /// Evaluation metrics; `combined_score` is the ranking key.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Generation depth from the initial program.
    #[serde(default)]
    pub generation: u32,
    /// Parent candidate, if derived rather than seeded.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Island the candidate evolved on.
    #[serde(default)]
    pub island: u32,
    /// Iteration at which the candidate was discovered.
    #[serde(default)]
    pub iteration: u64,
    /// Variation method that produced the candidate.
    #[serde(default = "unknown_method")]
    pub method: String,
}

fn unknown_method() -> String {
    "unknown".into()
}

impl Candidate {
    /// The candidate's combined score, if evaluated.
    pub fn combined_score(&self) -> Option<f64> {
        self.metrics.get("combined_score").copied()
    }
}

/// Parent→child relationship between two candidates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Parent candidate id.
    pub source: String,
    /// Child candidate id.
    pub target: String,
}

/// The engine's in-memory population: candidates plus the best-set archive.
#[derive(Clone, Debug, Default)]
pub struct Population {
    /// All known candidates.
    pub candidates: Vec<Candidate>,
    /// Ids of the current best set.
    pub archive: Vec<String>,
}

/// Graph-shaped evolution data served to visualizers.
///
/// Produced either from a persisted checkpoint or synthesized live from
/// a [`Population`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionData {
    /// All candidate nodes.
    pub nodes: Vec<Candidate>,
    /// Parent→child edges (both endpoints known).
    pub edges: Vec<Edge>,
    /// Ids of the best-set archive.
    pub archive: Vec<String>,
    /// Source checkpoint directory, `"live"`, or empty when no data exists.
    pub checkpoint_dir: String,
}

impl Population {
    /// Synthesize the visualizer graph from live engine state.
    pub fn to_evolution_data(&self) -> EvolutionData {
        let edges = self
            .candidates
            .iter()
            .filter_map(|c| {
                let parent = c.parent_id.as_ref()?;
                self.candidates
                    .iter()
                    .any(|p| &p.id == parent)
                    .then(|| Edge {
                        source: parent.clone(),
                        target: c.id.clone(),
                    })
            })
            .collect();

        EvolutionData {
            nodes: self.candidates.clone(),
            edges,
            archive: self.archive.clone(),
            checkpoint_dir: "live".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, parent: Option<&str>, score: Option<f64>) -> Candidate {
        let mut metrics = BTreeMap::new();
        if let Some(s) = score {
            let _ = metrics.insert("combined_score".to_string(), s);
        }
        Candidate {
            id: id.into(),
            code: "pass".into(),
            metrics,
            generation: 0,
            parent_id: parent.map(Into::into),
            island: 0,
            iteration: 0,
            method: "unknown".into(),
        }
    }

    #[test]
    fn combined_score_lookup() {
        assert_eq!(candidate("a", None, Some(0.5)).combined_score(), Some(0.5));
        assert_eq!(candidate("a", None, None).combined_score(), None);
    }

    #[test]
    fn live_data_builds_edges_for_known_parents() {
        let pop = Population {
            candidates: vec![
                candidate("root", None, Some(0.1)),
                candidate("child", Some("root"), Some(0.2)),
                candidate("orphan", Some("missing"), None),
            ],
            archive: vec!["child".into()],
        };
        let data = pop.to_evolution_data();
        assert_eq!(data.nodes.len(), 3);
        assert_eq!(
            data.edges,
            vec![Edge {
                source: "root".into(),
                target: "child".into()
            }]
        );
        assert_eq!(data.archive, vec!["child".to_string()]);
        assert_eq!(data.checkpoint_dir, "live");
    }

    #[test]
    fn empty_population_yields_empty_graph() {
        let data = Population::default().to_evolution_data();
        assert!(data.nodes.is_empty());
        assert!(data.edges.is_empty());
        assert!(data.archive.is_empty());
    }

    #[test]
    fn candidate_deserializes_with_defaults() {
        let c: Candidate =
            serde_json::from_str(r#"{"id": "x", "code": "print()"}"#).unwrap();
        assert_eq!(c.method, "unknown");
        assert!(c.parent_id.is_none());
        assert!(c.metrics.is_empty());
    }
}
