//! Stage graph validation: lint rules and diagnostics.
//!
//! Five built-in rules check that a [`StageGraph`] can be driven to `end` by
//! the registered handlers. Call [`validate`] for advisory diagnostics or
//! [`validate_or_raise`] to fail on any `Error`-severity issue.

use std::collections::BTreeSet;

use newsdesk_types::{NewsdeskError, Stage};

use crate::graph::{Edge, StageGraph};
use crate::handler::HandlerRegistry;

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub stage: Option<Stage>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, graph: &StageGraph, registry: &HandlerRegistry) -> Vec<Diagnostic>;
}

impl Diagnostic {
    fn error(rule: &str, stage: Option<Stage>, message: String, fix: Option<String>) -> Self {
        Self {
            rule: rule.into(),
            severity: Severity::Error,
            message,
            stage,
            fix,
        }
    }
}

/// The graph with the revise branch of every conditional edge removed.
fn forward_successors(graph: &StageGraph, from: Stage) -> Vec<Stage> {
    match graph.edge(from) {
        Some(Edge::Direct(to)) => vec![to],
        Some(Edge::Conditional { on_exit, .. }) => vec![on_exit],
        None => vec![],
    }
}

fn forward_reachable(graph: &StageGraph, start: Stage) -> BTreeSet<Stage> {
    let mut seen = BTreeSet::from([start]);
    let mut stack = vec![start];
    while let Some(stage) = stack.pop() {
        for next in forward_successors(graph, stage) {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct EntryStageRule;
impl LintRule for EntryStageRule {
    fn name(&self) -> &str { "entry_stage" }
    fn apply(&self, graph: &StageGraph, _registry: &HandlerRegistry) -> Vec<Diagnostic> {
        let entry = graph.entry();
        if entry == Stage::End || graph.edge(entry).is_none() {
            return vec![Diagnostic::error(
                self.name(),
                Some(entry),
                format!("Entry stage '{entry}' has no outgoing edge"),
                Some(format!("Add an edge from '{entry}'")),
            )];
        }
        vec![]
    }
}

struct TerminalStageRule;
impl LintRule for TerminalStageRule {
    fn name(&self) -> &str { "terminal_stage" }
    fn apply(&self, graph: &StageGraph, _registry: &HandlerRegistry) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        if !graph.reachable_from(graph.entry()).contains(&Stage::End) {
            diags.push(Diagnostic::error(
                self.name(),
                Some(Stage::End),
                format!("Stage 'end' is not reachable from '{}'", graph.entry()),
                Some("Add an edge leading to 'end'".into()),
            ));
        }
        if graph.edge(Stage::End).is_some() {
            diags.push(Diagnostic::error(
                self.name(),
                Some(Stage::End),
                "Stage 'end' must not have outgoing edges".into(),
                Some("Remove the edge out of 'end'".into()),
            ));
        }
        // Every other stage needs a way out, or the run would stall.
        for stage in graph.stages() {
            if stage != Stage::End && graph.edge(stage).is_none() {
                diags.push(Diagnostic::error(
                    self.name(),
                    Some(stage),
                    format!("Stage '{stage}' has no outgoing edge and is not 'end'"),
                    None,
                ));
            }
        }
        diags
    }
}

struct HandlerRegisteredRule;
impl LintRule for HandlerRegisteredRule {
    fn name(&self) -> &str { "handler_registered" }
    fn apply(&self, graph: &StageGraph, registry: &HandlerRegistry) -> Vec<Diagnostic> {
        graph
            .stages()
            .into_iter()
            .filter(|s| *s != Stage::End && !registry.has(*s))
            .map(|s| {
                Diagnostic::error(
                    self.name(),
                    Some(s),
                    format!("No handler registered for stage '{s}'"),
                    Some(format!("Register a handler for '{s}'")),
                )
            })
            .collect()
    }
}

/// The only cycles allowed are a conditional edge's revise branch leading
/// back to the conditional stage.
struct SingleCycleRule;
impl LintRule for SingleCycleRule {
    fn name(&self) -> &str { "single_cycle" }
    fn apply(&self, graph: &StageGraph, _registry: &HandlerRegistry) -> Vec<Diagnostic> {
        let mut diags = Vec::new();

        for stage in graph.stages() {
            let loops_back = forward_successors(graph, stage)
                .into_iter()
                .any(|next| forward_reachable(graph, next).contains(&stage));
            if loops_back {
                diags.push(Diagnostic::error(
                    self.name(),
                    Some(stage),
                    format!("Stage '{stage}' is on a cycle that bypasses the revision gate"),
                    Some("Route the loop through a conditional edge".into()),
                ));
            }
        }

        for (from, edge) in graph.edges() {
            if let Edge::Conditional { on_revise, .. } = edge {
                if !forward_reachable(graph, on_revise).contains(&from) {
                    diags.push(Diagnostic::error(
                        self.name(),
                        Some(on_revise),
                        format!("Revise branch '{on_revise}' never returns to '{from}'"),
                        Some(format!("Add an edge from '{on_revise}' back to '{from}'")),
                    ));
                }
            }
        }
        diags
    }
}

struct ReachabilityRule;
impl LintRule for ReachabilityRule {
    fn name(&self) -> &str { "reachability" }
    fn apply(&self, graph: &StageGraph, _registry: &HandlerRegistry) -> Vec<Diagnostic> {
        let reached = graph.reachable_from(graph.entry());
        graph
            .stages()
            .difference(&reached)
            .map(|s| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!("Stage '{s}' is not reachable from '{}'", graph.entry()),
                stage: Some(*s),
                fix: Some(format!("Add an edge leading to '{s}' or remove it")),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run all lint rules and return every diagnostic found.
pub fn validate(graph: &StageGraph, registry: &HandlerRegistry) -> Vec<Diagnostic> {
    let rules: Vec<Box<dyn LintRule>> = vec![
        Box::new(EntryStageRule),
        Box::new(TerminalStageRule),
        Box::new(HandlerRegisteredRule),
        Box::new(SingleCycleRule),
        Box::new(ReachabilityRule),
    ];

    let mut diagnostics = Vec::new();
    for rule in &rules {
        diagnostics.extend(rule.apply(graph, registry));
    }
    diagnostics
}

/// Run all lint rules; return `Err` if any `Error`-severity diagnostic found.
pub fn validate_or_raise(
    graph: &StageGraph,
    registry: &HandlerRegistry,
) -> newsdesk_types::Result<Vec<Diagnostic>> {
    let diagnostics = validate(graph, registry);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.clone())
        .collect();
    if !errors.is_empty() {
        return Err(NewsdeskError::GraphValidation(errors.join("; ")));
    }
    Ok(diagnostics)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
