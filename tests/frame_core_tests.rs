//! Frame Core Tests
//!
//! GPU-free coverage of the executor's bookkeeping:
//! - Timeline value monotonicity and non-blocking signaled checks
//! - Deferred release ordering against the completed counter
//! - Frame graph validation (cycles, unknown edges, prescribed order)

use verdant::renderer::core::TimelineCoordinator;
use verdant::renderer::core::timeline::ReleaseResource;
use verdant::renderer::graph::{FrameGraph, GraphError, PassDesc, PassId, QueueAffinity};

// ============================================================================
// Timeline
// ============================================================================

#[test]
fn timeline_values_strictly_increase() {
    let mut timeline = TimelineCoordinator::new();
    let mut previous = 0;
    for _ in 0..64 {
        let value = timeline.next_value();
        assert!(value > previous);
        previous = value;
    }
    assert_eq!(timeline.last_issued(), previous);
}

#[test]
fn zero_is_always_signaled() {
    let timeline = TimelineCoordinator::new();
    assert!(timeline.signaled(0));
    assert!(!timeline.signaled(1));
}

#[test]
fn signaled_tracks_the_completion_token() {
    let mut timeline = TimelineCoordinator::new();
    let first = timeline.next_value();
    let second = timeline.next_value();
    let token = timeline.completion_token();

    assert!(!timeline.signaled(first));
    token.signal_up_to(first);
    assert!(timeline.signaled(first));
    assert!(!timeline.signaled(second));

    // The counter is monotonic: an out-of-order lower signal is a no-op.
    token.signal_up_to(second);
    token.signal_up_to(first);
    assert_eq!(token.completed_value(), second);
}

#[test]
fn releases_fire_only_once_their_value_completes() {
    let mut timeline = TimelineCoordinator::new();
    let early = timeline.next_value();
    let late = timeline.next_value();
    timeline.schedule_buffer_release(Default::default(), early);
    timeline.schedule_buffer_release(Default::default(), late);
    assert_eq!(timeline.pending_release_count(), 2);

    let token = timeline.completion_token();
    token.signal_up_to(early);
    let mut released = Vec::new();
    timeline.drain_reached_with(|resource| released.push(resource));
    assert_eq!(released.len(), 1);
    assert_eq!(timeline.pending_release_count(), 1);

    token.signal_up_to(late);
    timeline.drain_reached_with(|resource| released.push(resource));
    assert_eq!(released.len(), 2);
    assert_eq!(timeline.pending_release_count(), 0);
    assert!(matches!(released[0], ReleaseResource::Buffer(_)));
}

#[test]
fn frame_slot_reuse_invariant() {
    // Model FRAMES_IN_FLIGHT slots: a slot may only be reused once its
    // last signaled value completed.
    let mut timeline = TimelineCoordinator::new();
    let token = timeline.completion_token();
    let mut slot_values = [0u64; 2];

    for frame in 0..8 {
        let slot = frame % 2;
        // The orchestrator's gate.
        if !timeline.signaled(slot_values[slot]) {
            // Simulate the GPU catching up.
            token.signal_up_to(slot_values[slot]);
        }
        assert!(timeline.signaled(slot_values[slot]));
        slot_values[slot] = timeline.next_value();
    }
}

// ============================================================================
// Frame graph
// ============================================================================

fn pass(graph: &mut FrameGraph, name: &'static str, queue: QueueAffinity) -> PassId {
    graph.add_pass(PassDesc { name, queue })
}

#[test]
fn pipeline_graph_validates_and_orders() {
    let mut graph = FrameGraph::new();
    let shadow = pass(&mut graph, "shadow", QueueAffinity::Graphics);
    let gi_surface = pass(&mut graph, "gi_surface", QueueAffinity::Compute);
    let gi_inject = pass(&mut graph, "gi_inject", QueueAffinity::Compute);
    let gi_propagate = pass(&mut graph, "gi_propagate", QueueAffinity::Compute);
    let prepass = pass(&mut graph, "prepass", QueueAffinity::Graphics);
    let ssao = pass(&mut graph, "ssao", QueueAffinity::Graphics);
    let ssao_blur = pass(&mut graph, "ssao_blur", QueueAffinity::Graphics);
    let main = pass(&mut graph, "main", QueueAffinity::Graphics);
    let post = pass(&mut graph, "post", QueueAffinity::Graphics);

    graph.add_dependency(shadow, prepass);
    graph.add_dependency(gi_surface, gi_inject);
    graph.add_dependency(gi_inject, gi_propagate);
    graph.add_dependency(gi_propagate, main);
    graph.add_dependency(prepass, ssao);
    graph.add_dependency(ssao, ssao_blur);
    graph.add_dependency(ssao_blur, main);
    graph.add_dependency(main, post);

    let order = graph.validate().expect("pipeline graph must be acyclic");
    assert_eq!(order.len(), graph.passes().len());
    assert!(graph.order_satisfies_edges(&order));

    // The GI chain must appear in sequence.
    let position = |id: PassId| order.iter().position(|&p| p == id).unwrap();
    assert!(position(gi_surface) < position(gi_inject));
    assert!(position(gi_inject) < position(gi_propagate));
    assert!(position(gi_propagate) < position(main));
}

#[test]
fn cycle_is_rejected() {
    let mut graph = FrameGraph::new();
    let a = pass(&mut graph, "a", QueueAffinity::Graphics);
    let b = pass(&mut graph, "b", QueueAffinity::Graphics);
    let c = pass(&mut graph, "c", QueueAffinity::Graphics);
    graph.add_dependency(a, b);
    graph.add_dependency(b, c);
    graph.add_dependency(c, a);
    assert_eq!(graph.validate(), Err(GraphError::Cycle));
}

#[test]
fn self_dependency_is_rejected() {
    let mut graph = FrameGraph::new();
    let a = pass(&mut graph, "a", QueueAffinity::Graphics);
    graph.add_dependency(a, a);
    assert!(matches!(graph.validate(), Err(GraphError::SelfDependency("a"))));
}

#[test]
fn inverted_sequence_fails_the_edge_check() {
    let mut graph = FrameGraph::new();
    let a = pass(&mut graph, "a", QueueAffinity::Graphics);
    let b = pass(&mut graph, "b", QueueAffinity::Compute);
    graph.add_dependency(a, b);
    assert!(!graph.order_satisfies_edges(&[b, a]));
}

#[test]
fn graph_resets_clean() {
    let mut graph = FrameGraph::new();
    let a = pass(&mut graph, "a", QueueAffinity::Graphics);
    let b = pass(&mut graph, "b", QueueAffinity::Graphics);
    graph.add_dependency(a, b);
    graph.reset();
    assert!(graph.passes().is_empty());
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.validate().unwrap().is_empty());
}
