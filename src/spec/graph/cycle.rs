//! Cycle detection for the execution graph

use std::collections::{HashMap, HashSet};

/// Find a cycle using DFS, visiting roots in node order so the reported
/// path is stable. The path starts and ends on the same transform.
pub fn find_cycle(nodes: &[String], edges: &HashMap<String, Vec<String>>) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for node_id in nodes {
        if !visited.contains(node_id.as_str()) {
            if let Some(cycle) = dfs_detect_cycle(edges, node_id, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(cycle);
            }
        }
    }
    None
}

fn dfs_detect_cycle<'a>(
    edges: &'a HashMap<String, Vec<String>>,
    node_id: &'a str,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node_id);
    rec_stack.insert(node_id);
    path.push(node_id);

    for next in edges.get(node_id).into_iter().flatten() {
        let next = next.as_str();
        if !visited.contains(next) {
            if let Some(cycle) = dfs_detect_cycle(edges, next, visited, rec_stack, path) {
                return Some(cycle);
            }
        } else if rec_stack.contains(next) {
            let start = path.iter().position(|p| *p == next).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|p| p.to_string()).collect();
            cycle.push(next.to_string());
            return Some(cycle);
        }
    }

    path.pop();
    rec_stack.remove(node_id);
    None
}
