use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PinId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinKind {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinType {
    Volume,
    Mesh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Single,
    Array,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDefinition {
    pub name: String,
    pub pin_type: PinType,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub optional: bool,
}

impl PinDefinition {
    pub fn new(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            name: name.into(),
            pin_type,
            cardinality: Cardinality::Single,
            optional: false,
        }
    }

    pub fn array(mut self) -> Self {
        self.cardinality = Cardinality::Array;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    pub category: String,
    pub inputs: Vec<PinDefinition>,
    pub outputs: Vec<PinDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub category: String,
    pub inputs: Vec<PinId>,
    pub outputs: Vec<PinId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub id: PinId,
    pub node: NodeId,
    pub name: String,
    pub kind: PinKind,
    pub pin_type: PinType,
    pub cardinality: Cardinality,
    pub optional: bool,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub from: PinId,
    pub to: PinId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),
    #[error("pin {0:?} does not exist")]
    MissingPin(PinId),
    #[error("link {0:?} does not exist")]
    MissingLink(LinkId),
    #[error("pins {from:?} and {to:?} are not linked")]
    NotLinked { from: PinId, to: PinId },
    #[error("links must run from an output pin to an input pin ({from:?} -> {to:?})")]
    PinDirection { from: PinId, to: PinId },
    #[error("cannot link a {from:?} output to a {to:?} input")]
    TypeMismatch { from: PinType, to: PinType },
    #[error("input pin {pin:?} already has a link")]
    InputAlreadyConnected { pin: PinId },
    #[error("linking {from:?} -> {to:?} would create a cycle")]
    CycleDetected { from: NodeId, to: NodeId },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    next_id: u64,
    nodes: BTreeMap<NodeId, Node>,
    pins: BTreeMap<PinId, Pin>,
    links: BTreeMap<LinkId, Link>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_node(&mut self, definition: NodeDefinition) -> NodeId {
        let node_id = NodeId(self.alloc_id());
        let inputs = self.add_pins(node_id, PinKind::Input, definition.inputs);
        let outputs = self.add_pins(node_id, PinKind::Output, definition.outputs);
        self.nodes.insert(
            node_id,
            Node {
                id: node_id,
                name: definition.name,
                category: definition.category,
                inputs,
                outputs,
            },
        );
        node_id
    }

    fn add_pins(&mut self, node: NodeId, kind: PinKind, defs: Vec<PinDefinition>) -> Vec<PinId> {
        defs.into_iter()
            .enumerate()
            .map(|(index, def)| {
                let id = PinId(self.alloc_id());
                self.pins.insert(
                    id,
                    Pin {
                        id,
                        node,
                        name: def.name,
                        kind,
                        pin_type: def.pin_type,
                        cardinality: def.cardinality,
                        // Outputs are never optional.
                        optional: kind == PinKind::Input && def.optional,
                        index,
                    },
                );
                id
            })
            .collect()
    }

    pub fn remove_node(&mut self, node_id: NodeId) -> Result<Vec<Link>, GraphError> {
        let node = self
            .nodes
            .remove(&node_id)
            .ok_or(GraphError::MissingNode(node_id))?;
        let mut removed = Vec::new();
        for pin in node.inputs.iter().chain(node.outputs.iter()) {
            removed.extend(self.remove_links_for_pin(*pin));
            self.pins.remove(pin);
        }
        Ok(removed)
    }

    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn pin(&self, pin_id: PinId) -> Option<&Pin> {
        self.pins.get(&pin_id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    pub fn find_pin(&self, node_id: NodeId, name: &str, kind: PinKind) -> Option<PinId> {
        let node = self.node(node_id)?;
        let pins = match kind {
            PinKind::Input => &node.inputs,
            PinKind::Output => &node.outputs,
        };
        pins.iter()
            .copied()
            .find(|pin_id| self.pin(*pin_id).is_some_and(|pin| pin.name == name))
    }

    pub fn input_pin(&self, node_id: NodeId, index: usize) -> Option<PinId> {
        self.node(node_id)?.inputs.get(index).copied()
    }

    pub fn output_pin(&self, node_id: NodeId, index: usize) -> Option<PinId> {
        self.node(node_id)?.outputs.get(index).copied()
    }

    pub fn input_links(&self, pin: PinId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |link| link.to == pin)
    }

    pub fn add_link(&mut self, from: PinId, to: PinId) -> Result<LinkId, GraphError> {
        let from_pin = self.pins.get(&from).ok_or(GraphError::MissingPin(from))?;
        let to_pin = self.pins.get(&to).ok_or(GraphError::MissingPin(to))?;

        if from_pin.kind != PinKind::Output || to_pin.kind != PinKind::Input {
            return Err(GraphError::PinDirection { from, to });
        }
        if from_pin.pin_type != to_pin.pin_type {
            return Err(GraphError::TypeMismatch {
                from: from_pin.pin_type,
                to: to_pin.pin_type,
            });
        }
        if to_pin.cardinality == Cardinality::Single && self.input_links(to).next().is_some() {
            return Err(GraphError::InputAlreadyConnected { pin: to });
        }

        let (from_node, to_node) = (from_pin.node, to_pin.node);
        if self.would_create_cycle(from_node, to_node) {
            return Err(GraphError::CycleDetected {
                from: from_node,
                to: to_node,
            });
        }

        let id = LinkId(self.alloc_id());
        self.links.insert(id, Link { id, from, to });
        Ok(id)
    }

    pub fn remove_link(&mut self, link_id: LinkId) -> Result<Link, GraphError> {
        self.links
            .remove(&link_id)
            .ok_or(GraphError::MissingLink(link_id))
    }

    pub fn remove_link_between(&mut self, from: PinId, to: PinId) -> Result<Link, GraphError> {
        let link_id = self
            .links
            .values()
            .find(|link| link.from == from && link.to == to)
            .map(|link| link.id)
            .ok_or(GraphError::NotLinked { from, to })?;
        self.remove_link(link_id)
    }

    pub fn remove_links_for_pin(&mut self, pin: PinId) -> Vec<Link> {
        let ids: Vec<LinkId> = self
            .links
            .values()
            .filter(|link| link.from == pin || link.to == pin)
            .map(|link| link.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.links.remove(&id))
            .collect()
    }

    fn link_nodes(&self, link: &Link) -> Option<(NodeId, NodeId)> {
        Some((self.pins.get(&link.from)?.node, self.pins.get(&link.to)?.node))
    }

    pub fn upstream_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut seen = BTreeSet::new();
        self.links
            .values()
            .filter_map(|link| self.link_nodes(link))
            .filter(|(_, to)| *to == node_id)
            .map(|(from, _)| from)
            .filter(|from| seen.insert(*from))
            .collect()
    }

    pub fn downstream_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut seen = BTreeSet::new();
        self.links
            .values()
            .filter_map(|link| self.link_nodes(link))
            .filter(|(from, _)| *from == node_id)
            .map(|(_, to)| to)
            .filter(|to| seen.insert(*to))
            .collect()
    }

    pub fn descendants(&self, node_id: NodeId) -> BTreeSet<NodeId> {
        let adjacency = self.adjacency(None);
        let mut reached = BTreeSet::new();
        let mut stack = vec![node_id];
        while let Some(current) = stack.pop() {
            for next in adjacency.get(&current).into_iter().flatten() {
                if *next != node_id && reached.insert(*next) {
                    stack.push(*next);
                }
            }
        }
        reached
    }

    fn adjacency(&self, extra: Option<(NodeId, NodeId)>) -> BTreeMap<NodeId, Vec<NodeId>> {
        let mut adjacency: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        let edges = self
            .links
            .values()
            .filter_map(|link| self.link_nodes(link))
            .chain(extra);
        for (from, to) in edges {
            adjacency.entry(from).or_default().push(to);
        }
        adjacency
    }

    pub fn would_create_cycle(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let adjacency = self.adjacency(Some((from, to)));
        let mut marks: BTreeMap<NodeId, Mark> = BTreeMap::new();

        for start in self.nodes.keys().copied() {
            if marks.contains_key(&start) {
                continue;
            }
            // Iterative DFS: each frame is (node, index of next child to visit).
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
            marks.insert(start, Mark::InProgress);
            while let Some((node, child)) = stack.pop() {
                let children = adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]);
                match children.get(child) {
                    Some(next) => {
                        stack.push((node, child + 1));
                        match marks.get(next) {
                            Some(Mark::InProgress) => return true,
                            Some(Mark::Done) => {}
                            None => {
                                marks.insert(*next, Mark::InProgress);
                                stack.push((*next, 0));
                            }
                        }
                    }
                    None => {
                        marks.insert(node, Mark::Done);
                    }
                }
            }
        }
        false
    }

    /// Topological order of all nodes. Among nodes that are ready at the same
    /// time, the one inserted first comes first.
    pub fn topo_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let adjacency = self.adjacency(None);
        let mut in_degree: BTreeMap<NodeId, usize> =
            self.nodes.keys().map(|id| (*id, 0)).collect();
        for targets in adjacency.values() {
            for target in targets {
                if let Some(degree) = in_degree.get_mut(target) {
                    *degree += 1;
                }
            }
        }

        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for target in adjacency.get(&node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(target) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*target);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = in_degree
                .iter()
                .find(|(_, degree)| **degree > 0)
                .map(|(id, _)| *id)
                .unwrap_or(NodeId(0));
            return Err(GraphError::CycleDetected {
                from: stuck,
                to: stuck,
            });
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume_node(graph: &mut Graph, name: &str) -> (NodeId, PinId, PinId) {
        let id = graph.add_node(NodeDefinition {
            name: name.to_string(),
            category: "Test".to_string(),
            inputs: vec![PinDefinition::new("in", PinType::Volume).optional()],
            outputs: vec![PinDefinition::new("out", PinType::Volume)],
        });
        let node = graph.node(id).expect("node");
        (id, node.inputs[0], node.outputs[0])
    }

    #[test]
    fn link_requires_matching_types() {
        let mut graph = Graph::new();
        let (_, _, out) = volume_node(&mut graph, "a");
        let mesh_node = graph.add_node(NodeDefinition {
            name: "m".to_string(),
            category: "Test".to_string(),
            inputs: vec![PinDefinition::new("in", PinType::Mesh)],
            outputs: Vec::new(),
        });
        let mesh_in = graph.node(mesh_node).expect("node").inputs[0];
        assert_eq!(
            graph.add_link(out, mesh_in),
            Err(GraphError::TypeMismatch {
                from: PinType::Volume,
                to: PinType::Mesh
            })
        );
        assert_eq!(graph.links().count(), 0);
    }

    #[test]
    fn link_direction_is_checked() {
        let mut graph = Graph::new();
        let (_, a_in, a_out) = volume_node(&mut graph, "a");
        let (_, b_in, _) = volume_node(&mut graph, "b");
        assert!(matches!(
            graph.add_link(b_in, a_in),
            Err(GraphError::PinDirection { .. })
        ));
        assert!(graph.add_link(a_out, b_in).is_ok());
    }

    #[test]
    fn single_input_accepts_one_link() {
        let mut graph = Graph::new();
        let (_, _, a_out) = volume_node(&mut graph, "a");
        let (_, _, b_out) = volume_node(&mut graph, "b");
        let (_, c_in, _) = volume_node(&mut graph, "c");
        graph.add_link(a_out, c_in).expect("first link");
        assert_eq!(
            graph.add_link(b_out, c_in),
            Err(GraphError::InputAlreadyConnected { pin: c_in })
        );
    }

    #[test]
    fn cycles_are_rejected_without_mutation() {
        let mut graph = Graph::new();
        let (a, a_in, a_out) = volume_node(&mut graph, "a");
        let (b, b_in, b_out) = volume_node(&mut graph, "b");
        graph.add_link(a_out, b_in).expect("a -> b");
        let before = graph.clone();
        assert_eq!(
            graph.add_link(b_out, a_in),
            Err(GraphError::CycleDetected { from: b, to: a })
        );
        assert_eq!(graph, before);
        assert!(graph.would_create_cycle(a, a));
    }

    #[test]
    fn topo_order_breaks_ties_by_insertion() {
        let mut graph = Graph::new();
        let (a, _, a_out) = volume_node(&mut graph, "a");
        let (b, b_in, _) = volume_node(&mut graph, "b");
        let (c, _, c_out) = volume_node(&mut graph, "c");
        let (d, d_in, _) = volume_node(&mut graph, "d");
        graph.add_link(c_out, b_in).expect("c -> b");
        graph.add_link(a_out, d_in).expect("a -> d");
        assert_eq!(graph.topo_order().expect("order"), vec![a, c, b, d]);
    }

    #[test]
    fn descendants_follow_outgoing_links_only() {
        let mut graph = Graph::new();
        let (a, _, a_out) = volume_node(&mut graph, "a");
        let (b, b_in, b_out) = volume_node(&mut graph, "b");
        let (c, c_in, _) = volume_node(&mut graph, "c");
        let (d, _, _) = volume_node(&mut graph, "d");
        graph.add_link(a_out, b_in).expect("a -> b");
        graph.add_link(b_out, c_in).expect("b -> c");
        let reached = graph.descendants(a);
        assert_eq!(reached, BTreeSet::from([b, c]));
        assert!(graph.descendants(c).is_empty());
        assert!(!reached.contains(&d));
    }

    #[test]
    fn removing_node_drops_its_links() {
        let mut graph = Graph::new();
        let (a, _, a_out) = volume_node(&mut graph, "a");
        let (b, b_in, _) = volume_node(&mut graph, "b");
        graph.add_link(a_out, b_in).expect("a -> b");
        let removed = graph.remove_node(a).expect("remove");
        assert_eq!(removed.len(), 1);
        assert_eq!(graph.links().count(), 0);
        assert!(graph.pin(a_out).is_none());
        assert!(graph.upstream_nodes(b).is_empty());
        assert_eq!(graph.remove_node(a), Err(GraphError::MissingNode(a)));
    }
}
