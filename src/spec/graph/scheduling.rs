//! Topological ordering of the execution graph

use std::collections::{HashMap, VecDeque};

use crate::error::ValidationError;

/// Kahn's algorithm; ties are broken by node order.
pub fn topological_sort(
    nodes: &[String],
    edges: &HashMap<String, Vec<String>>,
) -> Result<Vec<String>, ValidationError> {
    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (n.as_str(), 0)).collect();
    for successors in edges.values() {
        for to in successors {
            *in_degree.entry(to.as_str()).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<&str> = nodes
        .iter()
        .map(String::as_str)
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();
    let mut result = Vec::with_capacity(nodes.len());

    while let Some(node_id) = queue.pop_front() {
        result.push(node_id.to_string());
        for dep in edges.get(node_id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dep.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dep.as_str());
                }
            }
        }
    }

    if result.len() != nodes.len() {
        let stuck: Vec<String> = nodes
            .iter()
            .filter(|n| !result.contains(n))
            .cloned()
            .collect();
        return Err(ValidationError::Cycle { path: stuck });
    }

    Ok(result)
}
