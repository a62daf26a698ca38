use std::collections::{BTreeSet, HashMap};

use super::stage::{Stage, StageKind};
use crate::types::{AppError, AppResult};

/// Validated stage graph. Construction rejects duplicate stages, unknown upstream
/// references and cycles, so an executable order always exists.
#[derive(Debug, Clone)]
pub struct StageGraph {
    stages: Vec<Stage>,
    order: Vec<usize>,
}

impl StageGraph {
    pub fn new(stages: Vec<Stage>) -> AppResult<Self> {
        let mut index: HashMap<StageKind, usize> = HashMap::new();
        for (i, stage) in stages.iter().enumerate() {
            if index.insert(stage.kind, i).is_some() {
                return Err(AppError::StageGraph(format!(
                    "stage '{}' is declared more than once",
                    stage.kind
                )));
            }
        }

        // Adjacency list and in-degree count
        let mut in_degree = vec![0usize; stages.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
        for (i, stage) in stages.iter().enumerate() {
            for upstream in &stage.upstream {
                let Some(&dep) = index.get(&upstream.stage) else {
                    return Err(AppError::StageGraph(format!(
                        "stage '{}' depends on unknown stage '{}'",
                        stage.kind, upstream.stage
                    )));
                };
                in_degree[i] += 1;
                dependents[dep].push(i);
            }
        }

        // Kahn's algorithm; the ready set is ordered by declaration index
        let mut ready: BTreeSet<usize> = (0..stages.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(stages.len());
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != stages.len() {
            let cycle: Vec<&str> = (0..stages.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| stages[i].name())
                .collect();
            return Err(AppError::StageGraph(format!(
                "circular dependency between stages: {}",
                cycle.join(", ")
            )));
        }

        Ok(Self { stages, order })
    }

    /// Stages in execution order: every stage after all of its upstream stages
    pub fn ordered(&self) -> impl Iterator<Item = &Stage> {
        self.order.iter().map(|&i| &self.stages[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::{standard_stages, Upstream};
    use std::path::Path;

    fn stage(kind: StageKind, upstream: &[StageKind]) -> Stage {
        Stage {
            kind,
            upstream: upstream.iter().map(|&u| Upstream::new(u, &[])).collect(),
            tools: vec![],
            instructions: String::new(),
        }
    }

    fn names(graph: &StageGraph) -> Vec<&'static str> {
        graph.ordered().map(|s| s.name()).collect()
    }

    #[test]
    fn test_standard_order_respects_dependencies() {
        let graph = StageGraph::new(standard_stages(Path::new("d.csv"), "", "revenue")).unwrap();
        assert_eq!(
            names(&graph),
            vec![
                "plan",
                "load",
                "clean",
                "explore",
                "analyze",
                "detect_anomalies",
                "visualize",
                "report"
            ]
        );

        let position: HashMap<StageKind, usize> =
            graph.ordered().enumerate().map(|(i, s)| (s.kind, i)).collect();
        for s in graph.ordered() {
            for u in &s.upstream {
                assert!(position[&u.stage] < position[&s.kind]);
            }
        }
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let graph = StageGraph::new(vec![
            stage(StageKind::Report, &[StageKind::Plan]),
            stage(StageKind::Load, &[]),
            stage(StageKind::Plan, &[]),
        ])
        .unwrap();
        assert_eq!(names(&graph), vec!["load", "plan", "report"]);
    }

    #[test]
    fn test_rejects_cycle() {
        let err = StageGraph::new(vec![
            stage(StageKind::Load, &[StageKind::Clean]),
            stage(StageKind::Clean, &[StageKind::Load]),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::StageGraph(ref m) if m.contains("circular")));
    }

    #[test]
    fn test_rejects_unknown_upstream() {
        let err = StageGraph::new(vec![stage(StageKind::Clean, &[StageKind::Load])]).unwrap_err();
        assert!(err.to_string().contains("unknown stage 'load'"));
    }

    #[test]
    fn test_rejects_duplicate() {
        let err =
            StageGraph::new(vec![stage(StageKind::Load, &[]), stage(StageKind::Load, &[])]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
