//! Execution graph derived from the stage list (or legacy edges)

mod cycle;
mod scheduling;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use super::ir::{DagEdge, DagStage, SpecIr, StageOrigin};
use crate::error::ValidationError;

/// Transform-level execution graph.
///
/// Every candidate of stage *i* connects to every candidate of stage *i+1*.
/// First-stage candidates hang off the null source and last-stage
/// candidates feed the null sink; legacy `{from, to: null}` edges mark
/// terminals the same way.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph {
    /// Transform IDs in first-appearance order
    nodes: Vec<String>,
    /// Adjacency list: transform_id -> transforms fed by it
    edges: HashMap<String, Vec<String>>,
    /// Transforms with an edge from the null source
    entries: Vec<String>,
    /// Transforms with an edge to the null sink
    terminals: Vec<String>,
}

impl ExecutionGraph {
    /// Derive the graph from declared stages plus any legacy edges.
    pub fn derive(ir: &SpecIr) -> Self {
        let mut graph = Self::default();

        for stage in &ir.dag_stages {
            for id in &stage.candidates {
                graph.add_node(id);
            }
        }
        if let Some(first) = ir.dag_stages.first() {
            graph.entries = first.candidates.clone();
        }
        if let Some(last) = ir.dag_stages.last() {
            graph.terminals = last.candidates.clone();
        }
        // Synthesized stages are only an ordering; the legacy edges are the graph.
        if ir.stage_origin == StageOrigin::Declared {
            for pair in ir.dag_stages.windows(2) {
                for from in &pair[0].candidates {
                    for to in &pair[1].candidates {
                        graph.add_edge(from, to);
                    }
                }
            }
        }

        graph.add_legacy_edges(&ir.dag_edges);
        graph
    }

    /// Graph of legacy `{from, to}` edges alone.
    pub fn from_edges(edges: &[DagEdge]) -> Self {
        let mut graph = Self::default();
        graph.add_legacy_edges(edges);
        graph
    }

    fn add_legacy_edges(&mut self, edges: &[DagEdge]) {
        for edge in edges {
            self.add_node(&edge.from);
            match &edge.to {
                Some(to) => self.add_edge(&edge.from, to),
                None => {
                    if !self.terminals.contains(&edge.from) {
                        self.terminals.push(edge.from.clone());
                    }
                }
            }
        }
    }

    fn add_node(&mut self, id: &str) {
        if !self.edges.contains_key(id) {
            self.edges.insert(id.to_string(), Vec::new());
            self.nodes.push(id.to_string());
        }
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(from);
        self.add_node(to);
        let successors = self.edges.entry(from.to_string()).or_default();
        if !successors.iter().any(|s| s == to) {
            successors.push(to.to_string());
        }
    }

    /// Fail with the cycle path if the graph is not acyclic.
    pub fn ensure_acyclic(&self) -> Result<(), ValidationError> {
        match cycle::find_cycle(&self.nodes, &self.edges) {
            Some(path) => Err(ValidationError::Cycle { path }),
            None => Ok(()),
        }
    }

    /// Transforms in dependency order.
    pub fn topological_order(&self) -> Result<Vec<String>, ValidationError> {
        scheduling::topological_sort(&self.nodes, &self.edges)
    }

    /// `stages` in execution order: each stage sorts by the earliest
    /// topological position among its candidates, declaration order
    /// breaking ties. Stages without known candidates go last.
    pub fn order_stages<'s>(&self, stages: &'s [DagStage]) -> Result<Vec<&'s DagStage>, ValidationError> {
        let order = self.topological_order()?;
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut ordered: Vec<&DagStage> = stages.iter().collect();
        ordered.sort_by_key(|stage| {
            stage
                .candidates
                .iter()
                .filter_map(|c| position.get(c.as_str()).copied())
                .min()
                .unwrap_or(usize::MAX)
        });
        Ok(ordered)
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn successors(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn terminals(&self) -> &[String] {
        &self.terminals
    }

    /// All edges with `None` standing for the null source or sink.
    pub fn edges(&self) -> Vec<(Option<&str>, Option<&str>)> {
        let mut all: Vec<(Option<&str>, Option<&str>)> =
            self.entries.iter().map(|id| (None, Some(id.as_str()))).collect();
        for from in &self.nodes {
            for to in self.successors(from) {
                all.push((Some(from.as_str()), Some(to.as_str())));
            }
        }
        all.extend(self.terminals.iter().map(|id| (Some(id.as_str()), None)));
        all
    }
}
