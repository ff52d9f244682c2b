//! Wave scheduling: level-ordered execution planning over the step graph.
//!
//! A wave is the maximal set of not-yet-scheduled nodes whose dependencies
//! are already satisfied. Waves are computed once, up front, so an
//! unsatisfiable pipeline fails before anything executes.

use super::{build_dependency_graph, StepNode};
use crate::errors::PlanningError;
use crate::step::Step;
use std::collections::HashSet;

/// One scheduling level.
///
/// Members are indices into the node list, in original pipeline order. The
/// defining invariant: no member depends on another member's output, so the
/// whole wave may run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    /// Node indices scheduled to run together.
    pub members: Vec<usize>,
}

impl Wave {
    /// Number of members in the wave.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true when the wave has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Computes the ordered wave sequence for a graph.
///
/// Kahn-style level ordering: repeatedly scan the remaining nodes in
/// original order and collect every node whose dependencies are all
/// satisfied by `pre_satisfied` or by earlier waves. An empty scan with
/// nodes still remaining means no progress is possible (a missing variable
/// or a cycle) and planning fails. An empty graph yields zero waves.
///
/// Worst case O(W * N) with W <= N; pipelines are small and user-authored,
/// so the scan stays cheap.
pub fn compute_execution_waves(
    nodes: &[StepNode],
    pre_satisfied: &HashSet<String>,
) -> Result<Vec<Wave>, PlanningError> {
    let mut satisfied = pre_satisfied.clone();
    let mut remaining: Vec<usize> = (0..nodes.len()).collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<usize>, Vec<usize>) = remaining
            .into_iter()
            .partition(|&i| nodes[i].dependencies.iter().all(|dep| satisfied.contains(dep)));

        if ready.is_empty() {
            return Err(no_progress_error(nodes, &blocked, &satisfied));
        }

        for &i in &ready {
            satisfied.extend(nodes[i].outputs.iter().cloned());
        }
        waves.push(Wave { members: ready });
        remaining = blocked;
    }

    Ok(waves)
}

fn no_progress_error(
    nodes: &[StepNode],
    stuck: &[usize],
    satisfied: &HashSet<String>,
) -> PlanningError {
    let all_outputs: HashSet<&str> = nodes
        .iter()
        .flat_map(|node| node.outputs.iter().map(String::as_str))
        .collect();

    let stuck_steps: Vec<String> = stuck.iter().map(|&i| nodes[i].label.clone()).collect();

    let unsatisfied: HashSet<&str> = stuck
        .iter()
        .flat_map(|&i| nodes[i].dependencies.iter())
        .filter(|dep| !satisfied.contains(dep.as_str()))
        .map(String::as_str)
        .collect();

    let never_produced: Vec<String> = unsatisfied
        .iter()
        .filter(|dep| !all_outputs.contains(*dep))
        .map(ToString::to_string)
        .collect();

    PlanningError::no_progress(
        stuck_steps,
        unsatisfied.iter().map(ToString::to_string).collect(),
        never_produced,
    )
}

/// A fully resolved execution plan: the dependency graph plus its waves.
///
/// Computed once per run and read-only afterwards; also usable standalone
/// to preview how a pipeline would execute.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// One node per step, aligned with the input order.
    pub nodes: Vec<StepNode>,
    /// Waves in execution order.
    pub waves: Vec<Wave>,
}

impl ExecutionPlan {
    /// Builds the graph and computes its waves in one pass.
    pub fn compute(
        steps: &[Step],
        pre_satisfied: &HashSet<String>,
    ) -> Result<Self, PlanningError> {
        let nodes = build_dependency_graph(steps);
        let waves = compute_execution_waves(&nodes, pre_satisfied)?;
        Ok(Self { nodes, waves })
    }

    /// Number of waves in the plan.
    #[must_use]
    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    /// Number of steps covered by the plan.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plan(steps: &[Step]) -> Result<ExecutionPlan, PlanningError> {
        ExecutionPlan::compute(steps, &HashSet::new())
    }

    fn wave_members(plan: &ExecutionPlan) -> Vec<Vec<usize>> {
        plan.waves.iter().map(|wave| wave.members.clone()).collect()
    }

    #[test]
    fn test_empty_pipeline_yields_zero_waves() {
        let computed = plan(&[]).unwrap();
        assert!(computed.waves.is_empty());
    }

    #[test]
    fn test_independent_generates_share_wave_zero() {
        let steps = vec![
            Step::generate("sdxl.txt2img", "a"),
            Step::generate("sdxl.txt2img", "b"),
            Step::generate("sdxl.txt2img", "c"),
        ];

        let computed = plan(&steps).unwrap();
        assert_eq!(wave_members(&computed), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_fan_out_plans_into_two_waves() {
        let steps = vec![
            Step::generate("sdxl.txt2img", "draft"),
            Step::transform("esrgan.upscale", "draft", "big"),
            Step::transform("tint.apply", "draft", "tinted"),
        ];

        let computed = plan(&steps).unwrap();
        assert_eq!(wave_members(&computed), vec![vec![0], vec![1, 2]]);
    }

    #[test]
    fn test_linear_chain_plans_one_wave_per_step() {
        let steps = vec![
            Step::generate("sdxl.txt2img", "draft"),
            Step::transform("esrgan.upscale", "draft", "big"),
            Step::transform("tint.apply", "big", "final"),
            Step::save("s3.put", "final"),
        ];

        let computed = plan(&steps).unwrap();
        assert_eq!(
            wave_members(&computed),
            vec![vec![0], vec![1], vec![2], vec![3]],
        );
    }

    #[test]
    fn test_every_step_appears_in_exactly_one_wave() {
        let steps = vec![
            Step::generate("g", "a"),
            Step::generate("g", "b"),
            Step::transform("t", "a", "c"),
            Step::transform("t", "b", "d"),
            Step::transform("merge", "c", "e").with_param("other", json!("d")),
            Step::save("s", "e"),
        ];

        let computed = plan(&steps).unwrap();
        let mut seen: Vec<usize> = computed
            .waves
            .iter()
            .flat_map(|wave| wave.members.iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_no_intra_wave_dependencies() {
        let steps = vec![
            Step::generate("g", "a"),
            Step::transform("t", "a", "b"),
            Step::generate("g", "c"),
            Step::transform("t", "c", "d"),
        ];

        let computed = plan(&steps).unwrap();
        for wave in &computed.waves {
            let outputs: HashSet<&str> = wave
                .members
                .iter()
                .flat_map(|&i| computed.nodes[i].outputs.iter().map(String::as_str))
                .collect();
            for &i in &wave.members {
                for dep in &computed.nodes[i].dependencies {
                    assert!(
                        !outputs.contains(dep.as_str()),
                        "wave member depends on a sibling output: {dep}",
                    );
                }
            }
        }
    }

    #[test]
    fn test_independent_chains_interleave() {
        let steps = vec![
            Step::generate("g", "a1"),
            Step::transform("t", "a1", "a2"),
            Step::generate("g", "b1"),
            Step::transform("t", "b1", "b2"),
        ];

        let computed = plan(&steps).unwrap();
        assert_eq!(wave_members(&computed), vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn test_missing_dependency_fails_planning() {
        let steps = vec![Step::transform("esrgan.upscale", "nowhere", "big")];

        let err = plan(&steps).unwrap_err();
        assert!(err.to_string().contains("nowhere"));
        assert_eq!(err.never_produced, vec!["nowhere".to_string()]);
    }

    #[test]
    fn test_pre_satisfied_dependency_unblocks_wave_zero() {
        let steps = vec![Step::transform("esrgan.upscale", "upload", "big")];
        let pre_satisfied = HashSet::from(["upload".to_string()]);

        let computed = ExecutionPlan::compute(&steps, &pre_satisfied).unwrap();
        assert_eq!(wave_members(&computed), vec![vec![0]]);
    }

    #[test]
    fn test_cycle_fails_planning_without_missing_names() {
        let steps = vec![
            Step::transform("t", "b", "a"),
            Step::transform("t", "a", "b"),
        ];

        let err = plan(&steps).unwrap_err();
        assert_eq!(err.stuck_steps.len(), 2);
        assert!(err.never_produced.is_empty());
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_secondary_reference_defers_step_to_later_wave() {
        let steps = vec![
            Step::generate("g", "base"),
            Step::transform("slow.chain", "base", "logo"),
            Step::transform("composite.blend", "base", "final")
                .with_param("overlay", json!("logo")),
        ];

        let computed = plan(&steps).unwrap();
        assert_eq!(wave_members(&computed), vec![vec![0], vec![1], vec![2]]);
    }
}
