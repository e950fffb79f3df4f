use state_debugger::anchor::TextDocument;
use state_debugger::config::Mode;
use state_debugger::decoration::{DecorationOption, DecorationStore, Glyph, Position, StateColor, COLLAPSED_GLYPH};
use state_debugger::protocol::{ExecutionTrace, RunSnapshot};
use state_debugger::session::DocumentSession;
use state_debugger::trace::{StepGraph, TraceEntry, TraceReconstructor, VerificationStep};

const URI: &str = "file:///tmp/example.vpr";

// Helper: a step with an optional parent and a marker for client state `index`
fn step(index: usize, parent: Option<usize>, branch: bool) -> VerificationStep {
    let mut s = VerificationStep::new(index, parent, 0);
    s.is_branch = branch;
    s.decoration = Some(index);
    s
}

fn option(index: usize, line: u32, character: u32) -> DecorationOption {
    DecorationOption::new(index, Position::new(line, character))
}

fn hidden_session_with(options: Vec<DecorationOption>) -> DocumentSession {
    let mut session = DocumentSession::new(URI);
    session
        .store_snapshot(RunSnapshot {
            uri: URI.to_string(),
            steps: Vec::new(),
            decoration_options: options,
            global_info: None,
            text: None,
        })
        .expect("snapshot should be accepted");
    session
}

// Helper: a session whose states are shown in a blank document
fn session_with(options: Vec<DecorationOption>) -> DocumentSession {
    let mut session = hidden_session_with(options);
    let mut editor = TextDocument::new(URI, "          \n".repeat(8));
    session.show_states(&mut editor).expect("states should be shown");
    session
}

fn states(trace: &[TraceEntry]) -> Vec<usize> {
    trace.iter().map(|e| e.state).collect()
}

fn visible_snapshot(session: &DocumentSession) -> Vec<(usize, Glyph, StateColor)> {
    session
        .store()
        .options()
        .iter()
        .map(|o| (o.index, o.glyph, o.color))
        .collect()
}

/// 0 root, 1 nested in 0, 2 nested in 1, 3 nested in 0 after 1's body.
fn nested_graph() -> StepGraph {
    StepGraph::new(vec![
        step(0, None, false),
        step(1, Some(0), false),
        step(2, Some(1), false),
        step(3, Some(0), false),
    ])
}

#[cfg(test)]
mod trace_tests {
    use super::*;

    #[test]
    fn test_depths_are_derived_from_parents() {
        let graph = nested_graph();
        let depths: Vec<usize> = graph.steps().iter().map(|s| s.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1]);
    }

    #[test]
    fn test_trace_records_only_new_depth_minima() {
        let graph = nested_graph();
        let trace = TraceReconstructor::new(&graph, Mode::Simple).build_trace(3);

        // Step 2 is nested deeper than the staircase allows and must be skipped.
        assert_eq!(states(&trace), vec![3, 1, 0]);
        assert!(trace.iter().all(|e| e.color == StateColor::Interesting && e.show));
    }

    #[test]
    fn test_branch_folds_into_parent() {
        let graph = StepGraph::new(vec![
            step(0, None, false),
            step(1, Some(0), false),
            step(2, Some(0), false),
            step(3, Some(2), true),
            step(4, Some(3), false),
        ]);
        let trace = TraceReconstructor::new(&graph, Mode::Simple).build_trace(4);
        assert_eq!(states(&trace), vec![4, 3, 2, 1, 0]);

        // A branch jumps straight to its parent instead of the sequential predecessor.
        let graph = StepGraph::new(vec![
            step(0, None, false),
            step(1, Some(0), false),
            step(2, Some(0), true),
        ]);
        let trace = TraceReconstructor::new(&graph, Mode::Simple).build_trace(2);
        assert_eq!(states(&trace), vec![2, 0]);
    }

    #[test]
    fn test_undecorated_steps_are_walked_but_not_recorded() {
        let mut steps = vec![step(0, None, false), step(1, Some(0), false), step(2, Some(0), false)];
        steps[1].decoration = None;
        let graph = StepGraph::new(steps);
        let trace = TraceReconstructor::new(&graph, Mode::Simple).build_trace(2);
        assert_eq!(states(&trace), vec![2, 0]);
    }

    #[test]
    fn test_advanced_mode_prepends_expansion_and_top_level_states() {
        let graph = nested_graph();
        let trace = TraceReconstructor::new(&graph, Mode::Advanced).build_trace(1);

        assert_eq!(states(&trace), vec![2, 0, 1, 0]);
        assert_eq!(trace[0].color, StateColor::Uninteresting);
        assert_eq!(trace[1].color, StateColor::Uninteresting);
        assert_eq!(trace[2].color, StateColor::Interesting);
        assert!(trace.iter().all(|e| e.show));
    }

    #[test]
    fn test_top_level_states_are_scoped_to_the_verifiable() {
        let mut other = step(2, None, false);
        other.verifiable_id = 7;
        let graph = StepGraph::new(vec![step(0, None, false), step(1, Some(0), false), other]);

        assert_eq!(graph.top_level_states(0), vec![0]);
        assert_eq!(graph.top_level_states(7), vec![2]);
    }

    #[test]
    fn test_unknown_state_yields_empty_trace() {
        let graph = nested_graph();
        let trace = TraceReconstructor::new(&graph, Mode::Advanced).build_trace(99);
        assert!(trace.is_empty());
    }

    #[test]
    fn test_self_referencing_parent_terminates() {
        let graph = StepGraph::new(vec![step(0, None, false), step(1, Some(1), true)]);
        let trace = TraceReconstructor::new(&graph, Mode::Simple).build_trace(1);
        assert_eq!(states(&trace), vec![1]);

        let graph = StepGraph::new(vec![step(0, Some(0), false)]);
        let trace = TraceReconstructor::new(&graph, Mode::Simple).build_trace(0);
        assert_eq!(states(&trace), vec![0]);
    }

    #[test]
    fn test_cyclic_branches_terminate() {
        let graph = StepGraph::new(vec![step(0, None, false), step(1, Some(2), true), step(2, Some(1), true)]);
        let trace = TraceReconstructor::new(&graph, Mode::Advanced).build_trace(1);
        assert!(trace.len() <= graph.len() * 2, "walk must stop on a cycle");
        assert!(states(&trace).contains(&1));
    }

    #[test]
    fn test_dangling_parent_returns_partial_trace() {
        let graph = StepGraph::new(vec![step(0, None, false), step(1, Some(42), true)]);
        let trace = TraceReconstructor::new(&graph, Mode::Simple).build_trace(1);
        assert_eq!(states(&trace), vec![1]);
    }
}

#[cfg(test)]
mod decoration_tests {
    use super::*;

    #[test]
    fn test_color_precedence() {
        let mut opt = option(0, 0, 0);

        assert!(opt.request_color(StateColor::Current));
        assert!(!opt.request_color(StateColor::Previous));
        assert!(!opt.request_color(StateColor::Error));
        assert!(!opt.request_color(StateColor::Interesting));
        assert_eq!(opt.color, StateColor::Current);

        assert!(opt.request_color(StateColor::Uninteresting));
        assert!(opt.request_color(StateColor::Error));
        assert!(!opt.request_color(StateColor::Interesting));
        assert!(opt.request_color(StateColor::Previous));
        assert!(!opt.request_color(StateColor::Error));
        assert_eq!(opt.color, StateColor::Previous);
    }

    #[test]
    fn test_rendered_text() {
        let mut opt = option(3, 0, 0);
        opt.number_to_display = 12;
        assert_eq!(opt.rendered_text(), "");
        opt.expand();
        assert_eq!(opt.rendered_text(), "(12)");
        opt.collapse();
        assert_eq!(opt.rendered_text(), COLLAPSED_GLYPH);
        opt.hide();
        assert!(!opt.is_visible());
    }

    #[test]
    fn test_duplicate_position_last_write_wins() {
        let mut store = DecorationStore::new();
        store.replace(vec![option(0, 2, 4), option(1, 2, 4), option(2, 3, 0)]);

        assert_eq!(store.len(), 3);
        assert_eq!(store.at_position(Position::new(2, 4)).map(|o| o.index), Some(1));
        assert_eq!(store.at_position(Position::new(3, 0)).map(|o| o.index), Some(2));
        assert!(store.at_position(Position::new(9, 9)).is_none());
    }

    #[test]
    fn test_anchored_ranges_shift_along_the_line() {
        let mut store = DecorationStore::new();
        store.replace(vec![option(0, 0, 2), option(1, 0, 5), option(2, 1, 0), option(3, 0, 5)]);

        store.set_anchored(true);
        let range = |state| store.get(state).map(|o| (o.range.start, o.range.end));
        assert_eq!(range(0), Some((Position::new(0, 2), Position::new(0, 3))));
        assert_eq!(range(1), Some((Position::new(0, 6), Position::new(0, 7))));
        assert_eq!(range(3), Some((Position::new(0, 7), Position::new(0, 8))));
        assert_eq!(range(2), Some((Position::new(1, 0), Position::new(1, 1))));
        assert_eq!(store.at_position(Position::new(0, 6)).map(|o| o.index), Some(1));

        store.set_anchored(false);
        assert_eq!(store.at_position(Position::new(0, 5)).map(|o| o.index), Some(3));
        assert!(store.at_position(Position::new(0, 6)).is_none());
    }

    #[test]
    fn test_snapshot_deserializes_from_wire_format() {
        let json = r#"{
            "uri": "file:///tmp/example.vpr",
            "decorationOptions": [
                {"index": 0, "originalPosition": {"line": 1, "character": 2}, "depth": 0,
                 "methodIndex": 0, "isErrorState": false, "numberToDisplay": 1,
                 "hoverMessage": "inhale acc(x.f)"},
                {"index": 1, "originalPosition": {"line": 2, "character": 2}, "depth": 1,
                 "methodIndex": 0, "isErrorState": true, "parent": 0, "numberToDisplay": 2}
            ],
            "steps": [
                {"index": 0, "verifiableId": 0, "decoration": 0},
                {"index": 1, "parent": 0, "verifiableId": 0, "decoration": 1, "isBranch": true}
            ]
        }"#;
        let snapshot: RunSnapshot = serde_json::from_str(json).expect("valid snapshot");
        assert_eq!(snapshot.decoration_options.len(), 2);
        assert_eq!(snapshot.decoration_options[1].parent_index, Some(0));
        assert!(snapshot.decoration_options[1].is_error_state);
        assert_eq!(snapshot.decoration_options[0].color, StateColor::Uninteresting);
        assert_eq!(snapshot.decoration_options[0].glyph, Glyph::Hidden);
        assert!(snapshot.steps[1].is_branch);
    }

    #[test]
    fn test_snapshot_keeps_verifier_rendering() {
        let json = format!(
            r#"{{
            "uri": "file:///tmp/example.vpr",
            "decorationOptions": [
                {{"index": 0, "originalPosition": {{"line": 0, "character": 0}}, "numberToDisplay": 1,
                 "contentText": "(1)", "color": "interesting"}},
                {{"index": 1, "originalPosition": {{"line": 1, "character": 0}}, "numberToDisplay": 2,
                 "isErrorState": true, "contentText": "{COLLAPSED_GLYPH}", "color": "error"}},
                {{"index": 2, "originalPosition": {{"line": 2, "character": 0}}, "numberToDisplay": 3,
                 "contentText": ""}}
            ]
        }}"#
        );
        let snapshot: RunSnapshot = serde_json::from_str(&json).expect("valid snapshot");

        let mut store = DecorationStore::new();
        store.replace(snapshot.decoration_options);

        let first = store.get(0).unwrap();
        assert_eq!(first.glyph, Glyph::Label);
        assert_eq!(first.rendered_text(), "(1)");
        assert_eq!(first.color, StateColor::Interesting);

        let error_state = store.get(1).unwrap();
        assert_eq!(error_state.glyph, Glyph::Collapsed);
        assert_eq!(error_state.color, StateColor::Error);

        assert!(!store.get(2).unwrap().is_visible());
        assert_eq!(store.get(2).unwrap().color, StateColor::Uninteresting);
    }
}

#[cfg(test)]
mod selection_marking_tests {
    use super::*;

    fn scenario_a() -> (DocumentSession, StepGraph) {
        let mut error_state = option(1, 1, 0);
        error_state.is_error_state = true;
        let session = session_with(vec![option(0, 0, 0), error_state]);
        let graph = StepGraph::new(vec![step(0, None, false), step(1, None, false)]);
        (session, graph)
    }

    #[test]
    fn test_scenario_a_select_first_state() {
        let (mut session, graph) = scenario_a();
        let tracer = TraceReconstructor::new(&graph, Mode::Simple);

        assert!(session.mark_selection(0, &tracer));

        let first = session.decoration(0).unwrap();
        assert_eq!(first.color, StateColor::Current);
        assert_eq!(first.rendered_text(), "(0)");

        let second = session.decoration(1).unwrap();
        assert_eq!(second.color, StateColor::Error);
        assert_eq!(second.rendered_text(), COLLAPSED_GLYPH);
    }

    #[test]
    fn test_scenario_a_select_error_state_first() {
        let (mut session, graph) = scenario_a();
        let tracer = TraceReconstructor::new(&graph, Mode::Simple);

        assert!(session.mark_selection(1, &tracer));

        let error_state = session.decoration(1).unwrap();
        assert_eq!(error_state.color, StateColor::Current);
        assert_eq!(error_state.rendered_text(), "(1)");

        let other = session.decoration(0).unwrap();
        assert_eq!(other.color, StateColor::Uninteresting);
        assert!(!other.is_visible());
    }

    #[test]
    fn test_scenario_a_previous_selection_is_remembered() {
        let (mut session, graph) = scenario_a();
        let tracer = TraceReconstructor::new(&graph, Mode::Simple);

        session.mark_selection(0, &tracer);
        session.mark_selection(1, &tracer);

        assert_eq!(session.decoration(1).unwrap().color, StateColor::Current);
        let previous = session.decoration(0).unwrap();
        assert_eq!(previous.color, StateColor::Previous);
        assert!(!previous.is_visible(), "state 0 is not on the trace of state 1");
        assert_eq!(session.selection().previous, Some(1));
    }

    #[test]
    fn test_mark_selection_is_idempotent() {
        let graph = nested_graph();
        let tracer = TraceReconstructor::new(&graph, Mode::Advanced);
        let mut error_state = option(2, 2, 4);
        error_state.is_error_state = true;
        let mut session = session_with(vec![option(0, 0, 0), option(1, 1, 4), error_state, option(3, 3, 4)]);

        session.mark_selection(0, &tracer);
        session.mark_selection(3, &tracer);
        session.mark_selection(3, &tracer);
        let once = visible_snapshot(&session);
        session.mark_selection(3, &tracer);
        let twice = visible_snapshot(&session);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_current_survives_the_trace_pass() {
        let graph = nested_graph();
        let tracer = TraceReconstructor::new(&graph, Mode::Simple);
        let mut session = session_with(vec![option(0, 0, 0), option(1, 1, 4), option(2, 2, 4), option(3, 3, 4)]);

        session.mark_selection(3, &tracer);

        // State 3 is also the first entry of its own trace.
        assert_eq!(session.decoration(3).unwrap().color, StateColor::Current);
        assert_eq!(session.decoration(1).unwrap().color, StateColor::Interesting);
        assert_eq!(session.decoration(0).unwrap().color, StateColor::Interesting);
        assert!(!session.decoration(2).unwrap().is_visible());
    }

    #[test]
    fn test_out_of_range_selection_changes_nothing() {
        let graph = nested_graph();
        let tracer = TraceReconstructor::new(&graph, Mode::Simple);
        let mut session = session_with(vec![option(0, 0, 0)]);

        let before = visible_snapshot(&session);
        assert!(!session.mark_selection(5, &tracer));
        assert_eq!(visible_snapshot(&session), before);
    }

    #[test]
    fn test_hidden_states_are_not_marked() {
        let graph = nested_graph();
        let tracer = TraceReconstructor::new(&graph, Mode::Simple);
        let mut session = hidden_session_with(vec![option(0, 0, 0), option(1, 1, 4), option(2, 2, 4), option(3, 3, 4)]);

        let before = visible_snapshot(&session);
        assert!(!session.mark_selection(3, &tracer));
        assert!(session.begin_mark_selection(3).is_none());
        assert_eq!(visible_snapshot(&session), before);
        assert_eq!(session.selection().current, None);
        assert_eq!(session.selection().previous, None);
    }

    #[test]
    fn test_hiding_states_stops_marking() {
        let graph = nested_graph();
        let tracer = TraceReconstructor::new(&graph, Mode::Simple);
        let mut session = session_with(vec![option(0, 0, 0), option(1, 1, 4), option(2, 2, 4), option(3, 3, 4)]);

        assert!(session.mark_selection(1, &tracer));
        session.hide_states();
        let before = visible_snapshot(&session);

        assert!(!session.mark_selection(3, &tracer));
        assert_eq!(visible_snapshot(&session), before);
        assert_eq!(session.selection().current, Some(1));
        assert!(session.rendered_decorations(true).is_empty());
    }

    #[test]
    fn test_stale_trace_is_dropped() {
        let mut session = session_with(vec![option(0, 0, 0), option(1, 1, 0)]);

        let first = session.begin_mark_selection(0).unwrap();
        let second = session.begin_mark_selection(1).unwrap();
        assert!(second.request_id > first.request_id);

        let late = ExecutionTrace {
            request_id: first.request_id,
            uri: URI.to_string(),
            trace: vec![TraceEntry {
                state: 0,
                color: StateColor::Interesting,
                show: true,
            }],
        };
        assert!(!session.apply_trace(&late));
        assert!(!session.decoration(0).unwrap().is_visible());

        let fresh = ExecutionTrace {
            request_id: second.request_id,
            uri: URI.to_string(),
            trace: vec![TraceEntry {
                state: 1,
                color: StateColor::Interesting,
                show: true,
            }],
        };
        assert!(session.apply_trace(&fresh));
        assert!(session.decoration(1).unwrap().is_visible());
    }

    #[test]
    fn test_snapshot_for_another_document_is_rejected() {
        let mut session = session_with(vec![option(0, 0, 0)]);
        let result = session.store_snapshot(RunSnapshot {
            uri: "file:///tmp/other.vpr".to_string(),
            steps: Vec::new(),
            decoration_options: vec![option(0, 5, 5), option(1, 6, 6)],
            global_info: None,
            text: None,
        });

        assert!(matches!(result, Err(state_debugger::Error::IdentityMismatch { .. })));
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn test_new_snapshot_resets_selection() {
        let graph = nested_graph();
        let tracer = TraceReconstructor::new(&graph, Mode::Simple);
        let mut session = session_with(vec![option(0, 0, 0), option(1, 1, 0)]);
        session.mark_selection(1, &tracer);
        assert_eq!(session.selection().current, Some(1));

        session
            .store_snapshot(RunSnapshot {
                uri: URI.to_string(),
                steps: Vec::new(),
                decoration_options: vec![option(0, 0, 0)],
                global_info: Some("verified in 1.2s".to_string()),
                text: None,
            })
            .unwrap();

        assert_eq!(session.selection().current, None);
        assert_eq!(session.selection().previous, None);
        assert_eq!(session.global_info(), Some("verified in 1.2s"));
    }
}
