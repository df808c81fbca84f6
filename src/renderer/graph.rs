//! Frame Graph
//!
//! A small declarative DAG built fresh each frame. Passes carry stable
//! names and a queue affinity; edges record ordering requirements. The
//! graph is recorded, validated, and used for command labeling and
//! timestamp scopes — sequencing itself runs in the prescribed order,
//! which validation confirms is a topological order of the recorded
//! edges.

use smallvec::SmallVec;

/// Queue affinity of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAffinity {
    Graphics,
    Compute,
}

/// Identifier of a pass within one frame's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassId(pub usize);

/// A recorded pass.
#[derive(Debug, Clone, Copy)]
pub struct PassDesc {
    pub name: &'static str,
    pub queue: QueueAffinity,
}

/// Validation failures; a malformed graph is a frame-construction bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    UnknownPass(usize),
    SelfDependency(&'static str),
    Cycle,
}

/// The per-frame pass DAG.
#[derive(Default)]
pub struct FrameGraph {
    passes: Vec<PassDesc>,
    edges: Vec<(PassId, PassId)>,
}

impl FrameGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.passes.clear();
        self.edges.clear();
    }

    pub fn add_pass(&mut self, desc: PassDesc) -> PassId {
        let id = PassId(self.passes.len());
        self.passes.push(desc);
        id
    }

    /// Records `before → after`: `before` must execute first.
    pub fn add_dependency(&mut self, before: PassId, after: PassId) {
        self.edges.push((before, after));
    }

    #[must_use]
    pub fn passes(&self) -> &[PassDesc] {
        &self.passes
    }

    #[must_use]
    pub fn pass_name(&self, id: PassId) -> &'static str {
        self.passes[id.0].name
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Checks edge validity and acyclicity; returns a topological order
    /// (stable with respect to insertion order).
    pub fn validate(&self) -> Result<Vec<PassId>, GraphError> {
        let count = self.passes.len();
        let mut indegree = vec![0usize; count];
        let mut successors: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); count];

        for &(before, after) in &self.edges {
            if before.0 >= count {
                return Err(GraphError::UnknownPass(before.0));
            }
            if after.0 >= count {
                return Err(GraphError::UnknownPass(after.0));
            }
            if before == after {
                return Err(GraphError::SelfDependency(self.passes[before.0].name));
            }
            successors[before.0].push(after.0);
            indegree[after.0] += 1;
        }

        // Kahn's algorithm; the ready list is scanned in index order so
        // the result is deterministic.
        let mut order = Vec::with_capacity(count);
        let mut ready: Vec<usize> = (0..count).filter(|&i| indegree[i] == 0).collect();
        while let Some(&index) = ready.first() {
            ready.remove(0);
            order.push(PassId(index));
            for &next in &successors[index] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(next);
                    ready.sort_unstable();
                }
            }
        }

        if order.len() == count {
            Ok(order)
        } else {
            Err(GraphError::Cycle)
        }
    }

    /// Whether `sequence` is consistent with every recorded edge; the
    /// orchestrator asserts its prescribed order against the graph.
    #[must_use]
    pub fn order_satisfies_edges(&self, sequence: &[PassId]) -> bool {
        let mut position = vec![usize::MAX; self.passes.len()];
        for (index, id) in sequence.iter().enumerate() {
            if id.0 >= position.len() {
                return false;
            }
            position[id.0] = index;
        }
        self.edges.iter().all(|&(before, after)| {
            position[before.0] != usize::MAX
                && position[after.0] != usize::MAX
                && position[before.0] < position[after.0]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_pass(graph: &mut FrameGraph, name: &'static str) -> PassId {
        graph.add_pass(PassDesc {
            name,
            queue: QueueAffinity::Graphics,
        })
    }

    #[test]
    fn topological_order_respects_edges() {
        let mut graph = FrameGraph::new();
        let a = graph_pass(&mut graph, "a");
        let b = graph_pass(&mut graph, "b");
        let c = graph_pass(&mut graph, "c");
        graph.add_dependency(a, b);
        graph.add_dependency(b, c);
        let order = graph.validate().unwrap();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn cycle_detected() {
        let mut graph = FrameGraph::new();
        let a = graph_pass(&mut graph, "a");
        let b = graph_pass(&mut graph, "b");
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);
        assert_eq!(graph.validate(), Err(GraphError::Cycle));
    }

    #[test]
    fn sequence_check_rejects_inverted_order() {
        let mut graph = FrameGraph::new();
        let a = graph_pass(&mut graph, "a");
        let b = graph_pass(&mut graph, "b");
        graph.add_dependency(a, b);
        assert!(graph.order_satisfies_edges(&[a, b]));
        assert!(!graph.order_satisfies_edges(&[b, a]));
    }
}
