use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const FEATURE_COUNT: usize = 14;

/// On-disk forest artifact. Nodes are stored in pre-order arrays per
/// tree; `feature < 0` marks a leaf carrying the win probability.
#[derive(Deserialize)]
struct ForestArtifact {
    n_features: usize,
    trees: Vec<DecisionTree>,
}

#[derive(Deserialize)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

#[derive(Deserialize)]
struct TreeNode {
    feature: i32,
    #[serde(default)]
    threshold: f64,
    #[serde(default)]
    left: usize,
    #[serde(default)]
    right: usize,
    #[serde(default)]
    value: f64,
}

/// Immutable handle to the pretrained win classifier. Loaded once at
/// startup and shared read-only with the request handlers.
pub struct WinClassifier {
    trees: Vec<DecisionTree>,
}

impl WinClassifier {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact {}", path.display()))?;
        let artifact: ForestArtifact = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed model artifact {}", path.display()))?;

        ensure!(
            artifact.n_features == FEATURE_COUNT,
            "Model expects {} features, this build assembles {}",
            artifact.n_features,
            FEATURE_COUNT
        );
        ensure!(!artifact.trees.is_empty(), "Model artifact has no trees");

        for (tree_idx, tree) in artifact.trees.iter().enumerate() {
            ensure!(!tree.nodes.is_empty(), "Tree {} is empty", tree_idx);

            for (node_idx, node) in tree.nodes.iter().enumerate() {
                if node.feature < 0 {
                    continue;
                }
                ensure!(
                    (node.feature as usize) < FEATURE_COUNT,
                    "Tree {} node {} splits on unknown feature {}",
                    tree_idx,
                    node_idx,
                    node.feature
                );
                // Children must point forward so a walk always terminates.
                ensure!(
                    node.left > node_idx
                        && node.right > node_idx
                        && node.left < tree.nodes.len()
                        && node.right < tree.nodes.len(),
                    "Tree {} node {} has out-of-order children",
                    tree_idx,
                    node_idx
                );
            }
        }

        Ok(Self {
            trees: artifact.trees,
        })
    }

    /// Majority vote over the forest: true means the side is predicted
    /// to win.
    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> bool {
        let votes = self.trees.iter().filter(|tree| tree.vote(features)).count();
        votes * 2 > self.trees.len()
    }
}

impl DecisionTree {
    fn vote(&self, features: &[f64; FEATURE_COUNT]) -> bool {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            if node.feature < 0 {
                return node.value >= 0.5;
            }
            idx = if features[node.feature as usize] <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }
}

/// What the classifier said about the submitted side. Display text
/// lives with the presentation layer, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Favorable,
    Unfavorable,
}

impl From<bool> for Outcome {
    fn from(predicted_win: bool) -> Self {
        if predicted_win {
            Outcome::Favorable
        } else {
            Outcome::Unfavorable
        }
    }
}

/// One submitted side of a hypothetical match: per-lane vision and
/// mastery plus the early objective flags.
#[derive(Debug, Clone, Default)]
pub struct TeamSnapshot {
    pub top_vs: i64,
    pub jun_vs: i64,
    pub mid_vs: i64,
    pub adc_vs: i64,
    pub sup_vs: i64,
    pub top_mastery: i64,
    pub jun_mastery: i64,
    pub mid_mastery: i64,
    pub adc_mastery: i64,
    pub sup_mastery: i64,
    pub first_blood: bool,
    pub first_brick: bool,
    pub first_dragon: bool,
    pub first_herald: bool,
}

/// Assemble the model input. The order is the column order the
/// classifier was trained on and must never change.
pub fn feature_vector(snapshot: &TeamSnapshot) -> [f64; FEATURE_COUNT] {
    [
        snapshot.top_vs as f64,
        snapshot.top_mastery as f64,
        flag(snapshot.first_brick),
        flag(snapshot.first_blood),
        flag(snapshot.first_dragon),
        flag(snapshot.first_herald),
        snapshot.jun_vs as f64,
        snapshot.jun_mastery as f64,
        snapshot.mid_vs as f64,
        snapshot.mid_mastery as f64,
        snapshot.adc_vs as f64,
        snapshot.adc_mastery as f64,
        snapshot.sup_vs as f64,
        snapshot.sup_mastery as f64,
    ]
}

fn flag(present: bool) -> f64 {
    if present { 1.0 } else { 0.0 }
}
