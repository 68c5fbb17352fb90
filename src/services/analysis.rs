//! Lineage tracing and per-generation statistics over the stored forest.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Node;
use crate::domain::ports::NodeStore;

const PREVIEW_CHARS: usize = 80;

/// Root-to-node path following `parent_id`.
///
/// Fails with [`DomainError::BrokenLineage`] if a link is missing, a cycle is found, or
/// depths do not decrease by exactly one per step.
pub async fn lineage(store: &dyn NodeStore, id: Uuid) -> DomainResult<Vec<Node>> {
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut current = store.get(id).await?.ok_or(DomainError::NodeNotFound(id))?;

    loop {
        if !seen.insert(current.id) {
            return Err(DomainError::BrokenLineage(id, format!("cycle through {}", current.id)));
        }
        let parent_id = current.parent_id;
        let depth = current.depth;
        path.push(current);

        let Some(parent_id) = parent_id else {
            if depth != 0 {
                return Err(DomainError::BrokenLineage(id, format!("root at depth {depth}")));
            }
            break;
        };

        let parent = store
            .get(parent_id)
            .await?
            .ok_or_else(|| DomainError::BrokenLineage(id, format!("missing ancestor {parent_id}")))?;
        if parent.depth + 1 != depth {
            return Err(DomainError::BrokenLineage(
                id,
                format!("depth jumps from {} to {depth}", parent.depth),
            ));
        }
        current = parent;
    }

    path.reverse();
    Ok(path)
}

/// Statistics of one generation (all nodes at a given depth).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationStats {
    pub depth: u32,
    pub count: usize,
    /// Nodes at this depth that carry a score.
    pub scored: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub best_id: Option<Uuid>,
    pub best_preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestNode {
    pub id: Uuid,
    pub depth: u32,
    pub score: f64,
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAnalysis {
    pub total_nodes: usize,
    pub generations: Vec<GenerationStats>,
    /// Mean change of the generation mean from one depth to the next.
    pub avg_improvement_per_generation: Option<f64>,
    pub best: Option<BestNode>,
}

/// Groups nodes by depth and summarizes each generation.
pub fn analyze(nodes: &[Node]) -> SearchAnalysis {
    let mut by_depth: BTreeMap<u32, Vec<&Node>> = BTreeMap::new();
    for node in nodes {
        by_depth.entry(node.depth).or_default().push(node);
    }

    let generations: Vec<GenerationStats> = by_depth
        .into_iter()
        .map(|(depth, members)| generation_stats(depth, &members))
        .collect();

    let means: Vec<f64> = generations.iter().filter_map(|g| g.mean).collect();
    let avg_improvement_per_generation = (means.len() >= 2)
        .then(|| means.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (means.len() - 1) as f64);

    let best = nodes
        .iter()
        .filter_map(|n| n.score.map(|s| (n, s)))
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(n, score)| BestNode {
            id: n.id,
            depth: n.depth,
            score,
            strategy: n.strategy.clone(),
        });

    SearchAnalysis {
        total_nodes: nodes.len(),
        generations,
        avg_improvement_per_generation,
        best,
    }
}

fn generation_stats(depth: u32, members: &[&Node]) -> GenerationStats {
    let scored: Vec<(&Node, f64)> = members.iter().filter_map(|n| n.score.map(|s| (*n, s))).collect();
    let scores: Vec<f64> = scored.iter().map(|(_, s)| *s).collect();

    let mean = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);
    // Sample standard deviation; a single score has zero spread.
    let std_dev = mean.map(|m| {
        if scores.len() < 2 {
            0.0
        } else {
            (scores.iter().map(|s| (s - m).powi(2)).sum::<f64>() / (scores.len() - 1) as f64).sqrt()
        }
    });
    let best = scored.iter().max_by(|(_, a), (_, b)| a.total_cmp(b));

    GenerationStats {
        depth,
        count: members.len(),
        scored: scores.len(),
        mean,
        std_dev,
        min: scores.iter().copied().reduce(f64::min),
        max: scores.iter().copied().reduce(f64::max),
        best_id: best.map(|(n, _)| n.id),
        best_preview: best.map(|(n, _)| n.preview(PREVIEW_CHARS)),
    }
}
