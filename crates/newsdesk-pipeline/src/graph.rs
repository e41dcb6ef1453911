//! Stage graph: a map from stage to its single outgoing edge.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use newsdesk_types::Stage;

/// Outgoing edge of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Direct(Stage),
    /// Resolved at run time by [`crate::gate::should_continue`].
    Conditional { on_revise: Stage, on_exit: Stage },
}

impl Edge {
    pub fn targets(&self) -> Vec<Stage> {
        match *self {
            Edge::Direct(to) => vec![to],
            Edge::Conditional { on_revise, on_exit } => vec![on_revise, on_exit],
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageGraph {
    entry: Stage,
    edges: BTreeMap<Stage, Edge>,
}

impl StageGraph {
    /// Empty graph starting at `entry`.
    pub fn new(entry: Stage) -> Self {
        Self {
            entry,
            edges: BTreeMap::new(),
        }
    }

    /// The run order: `init` through `notify`, with `assess` gating between
    /// `revise` and `headline`, and `revise` looping back to `assess`.
    pub fn standard() -> Self {
        let mut graph = Self::new(Stage::Init);
        graph
            .add_edge(Stage::Init, Stage::Fetch)
            .add_edge(Stage::Fetch, Stage::FilterLeads)
            .add_edge(Stage::FilterLeads, Stage::Enrich)
            .add_edge(Stage::Enrich, Stage::Draft)
            .add_edge(Stage::Draft, Stage::Assess)
            .add_conditional(Stage::Assess, Stage::Revise, Stage::Headline)
            .add_edge(Stage::Revise, Stage::Assess)
            .add_edge(Stage::Headline, Stage::Finalize)
            .add_edge(Stage::Finalize, Stage::Notify)
            .add_edge(Stage::Notify, Stage::End);
        graph
    }

    pub fn add_edge(&mut self, from: Stage, to: Stage) -> &mut Self {
        self.edges.insert(from, Edge::Direct(to));
        self
    }

    pub fn add_conditional(&mut self, from: Stage, on_revise: Stage, on_exit: Stage) -> &mut Self {
        self.edges
            .insert(from, Edge::Conditional { on_revise, on_exit });
        self
    }

    pub fn entry(&self) -> Stage {
        self.entry
    }

    pub fn edge(&self, from: Stage) -> Option<Edge> {
        self.edges.get(&from).copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = (Stage, Edge)> + '_ {
        self.edges.iter().map(|(s, e)| (*s, *e))
    }

    /// Every stage that appears in the graph, either as a source or a target.
    pub fn stages(&self) -> BTreeSet<Stage> {
        let mut all: BTreeSet<Stage> = BTreeSet::from([self.entry]);
        for (from, edge) in &self.edges {
            all.insert(*from);
            all.extend(edge.targets());
        }
        all
    }

    pub fn successors(&self, from: Stage) -> Vec<Stage> {
        self.edge(from).map(|e| e.targets()).unwrap_or_default()
    }

    /// BFS from `start`, following both branches of conditional edges.
    pub fn reachable_from(&self, start: Stage) -> BTreeSet<Stage> {
        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(stage) = queue.pop_front() {
            for next in self.successors(stage) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }
}

impl fmt::Display for StageGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (from, edge) in &self.edges {
            match edge {
                Edge::Direct(to) => writeln!(f, "{from} -> {to}")?,
                Edge::Conditional { on_revise, on_exit } => {
                    writeln!(f, "{from} -> {on_revise} [below threshold, attempts left]")?;
                    writeln!(f, "{from} -> {on_exit} [otherwise]")?;
                }
            }
        }
        Ok(())
    }
}
