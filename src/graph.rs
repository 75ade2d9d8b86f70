use std::collections::{HashMap, HashSet};

use crate::dsl::{Connection, MaterialGraph, Node, NodeKind, incoming_connection};

/// Follow a connection back through reroute nodes to the socket that actually produces the value.
///
/// Returns `None` when a reroute on the way has nothing plugged into it.
pub fn resolve_reroutes<'a>(
    graph: &'a MaterialGraph,
    nodes_by_id: &HashMap<String, Node>,
    conn: &'a Connection,
) -> Option<&'a Connection> {
    let mut current = conn;
    let mut visited: HashSet<&str> = HashSet::new();
    loop {
        let Some(node) = nodes_by_id.get(&current.from.node_id) else {
            return Some(current);
        };
        if node.kind != NodeKind::Reroute {
            return Some(current);
        }
        if !visited.insert(current.from.node_id.as_str()) {
            return None;
        }
        let input = node.input(0)?;
        current = incoming_connection(graph, &node.id, &input.id)?;
    }
}

/// All nodes the value of `start` depends on, `start` included.
pub fn upstream_reachable(graph: &MaterialGraph, start: &str) -> HashSet<String> {
    let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
    for c in &graph.connections {
        incoming
            .entry(c.to.node_id.as_str())
            .or_default()
            .push(c.from.node_id.as_str());
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<&str> = vec![start];
    while let Some(n) = stack.pop() {
        if !visited.insert(n.to_string()) {
            continue;
        }
        if let Some(prevs) = incoming.get(n) {
            for p in prevs {
                stack.push(p);
            }
        }
    }
    visited
}

/// The terminal node a driver starts walking from.
///
/// When a graph carries several output nodes of the same kind, the first one wins.
pub fn output_node(graph: &MaterialGraph, kind: NodeKind) -> Option<&Node> {
    graph.nodes.iter().find(|n| n.kind == kind)
}
