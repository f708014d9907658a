//! Subsumption graph of symbolic states
//!
//! Nodes are symbolic states plus initial/final flags; edges are labelled by
//! the fired edge tuple and are either *actual* (a real transition of the
//! zone graph) or *abstract* (a subsumption: the behaviours of the source
//! are covered by the target).
//!
//! Nodes are indexed by the hash of their *discrete part* only, so all
//! states with equal `(vloc, intval)` share a bucket and can be compared by
//! zone inclusion. The graph is built using [`RefCell`], a type implementing
//! the internal mutability pattern; borrow discipline is checked at runtime,
//! so borrows must be kept short.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use zora_timed_automaton::state::Vedge;
use zora_zone_graph::ZgState;

/// Type alias for references to nodes in the subsumption graph
pub type NodeRef = Rc<RefCell<Node>>;

/// Type alias for references to edges in the subsumption graph
pub type EdgeRef = Rc<RefCell<Edge>>;

/// Kind of an edge of the subsumption graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// A transition of the zone graph
    Actual,
    /// A subsumption: the source's behaviours are covered by the target
    Abstract,
}

/// Node of the subsumption graph
#[derive(Debug)]
pub struct Node {
    state: ZgState,
    initial: bool,
    is_final: bool,
    /// Membership flag of the waiting set, for constant-time removal
    pub(crate) in_waiting: bool,
    out_edges: Vec<EdgeRef>,
    in_edges: Vec<EdgeRef>,
}

impl Node {
    /// Symbolic state of the node
    pub fn state(&self) -> &ZgState {
        &self.state
    }

    /// Check whether the node is an initial node
    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Check whether the node was marked final
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Outgoing edges of the node
    pub fn out_edges(&self) -> &[EdgeRef] {
        &self.out_edges
    }

    /// Incoming edges of the node
    pub fn in_edges(&self) -> &[EdgeRef] {
        &self.in_edges
    }
}

/// Edge of the subsumption graph
///
/// Endpoints are weak handles: the graph owns the nodes, and an edge whose
/// endpoint was removed is dead.
#[derive(Debug)]
pub struct Edge {
    kind: EdgeKind,
    vedge: Rc<Vedge>,
    src: Weak<RefCell<Node>>,
    tgt: Weak<RefCell<Node>>,
}

impl Edge {
    /// Kind of the edge
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    /// Edge tuple labelling the edge
    pub fn vedge(&self) -> &Rc<Vedge> {
        &self.vedge
    }

    /// Source node, if still in the graph
    pub fn src(&self) -> Option<NodeRef> {
        self.src.upgrade()
    }

    /// Target node, if still in the graph
    pub fn tgt(&self) -> Option<NodeRef> {
        self.tgt.upgrade()
    }
}

/// Graph of symbolic states under the subsumption order
#[derive(Debug, Default)]
pub struct SubsumptionGraph {
    buckets: HashMap<u64, Vec<NodeRef>>,
    node_count: usize,
}

impl SubsumptionGraph {
    /// Create an empty graph with the given initial bucket capacity
    pub fn new(table_size: usize) -> Self {
        SubsumptionGraph {
            buckets: HashMap::with_capacity(table_size),
            node_count: 0,
        }
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.node_count
    }

    /// Check whether the graph holds no node
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Insert a state as a fresh node
    pub fn insert(&mut self, state: ZgState) -> NodeRef {
        let key = state.discrete_hash();
        let node = Rc::new(RefCell::new(Node {
            state,
            initial: false,
            is_final: false,
            in_waiting: false,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        }));
        self.buckets.entry(key).or_default().push(Rc::clone(&node));
        self.node_count += 1;
        node
    }

    /// Find a node covering the state, i.e. with equal discrete part and a
    /// zone including the state's
    ///
    /// When several covering nodes exist any one of them is returned.
    pub fn lookup_covering(&self, state: &ZgState) -> Option<NodeRef> {
        let bucket = self.buckets.get(&state.discrete_hash())?;
        bucket
            .iter()
            .find(|n| state.is_le(n.borrow().state()))
            .map(Rc::clone)
    }

    /// Find a node covering the state among nodes other than `excluded`
    pub fn lookup_covering_excluding(
        &self,
        state: &ZgState,
        excluded: &NodeRef,
    ) -> Option<NodeRef> {
        let bucket = self.buckets.get(&state.discrete_hash())?;
        bucket
            .iter()
            .find(|n| !Rc::ptr_eq(n, excluded) && state.is_le(n.borrow().state()))
            .map(Rc::clone)
    }

    /// Collect the nodes covered by the state
    pub fn nodes_covered_by(&self, state: &ZgState) -> Vec<NodeRef> {
        match self.buckets.get(&state.discrete_hash()) {
            None => Vec::new(),
            Some(bucket) => bucket
                .iter()
                .filter(|n| n.borrow().state().is_le(state))
                .map(Rc::clone)
                .collect(),
        }
    }

    /// Add an edge between two nodes
    pub fn add_edge(&mut self, src: &NodeRef, tgt: &NodeRef, kind: EdgeKind, vedge: Rc<Vedge>) {
        let edge = Rc::new(RefCell::new(Edge {
            kind,
            vedge,
            src: Rc::downgrade(src),
            tgt: Rc::downgrade(tgt),
        }));
        if Rc::ptr_eq(src, tgt) {
            let mut node = src.borrow_mut();
            node.out_edges.push(Rc::clone(&edge));
            node.in_edges.push(edge);
        } else {
            src.borrow_mut().out_edges.push(Rc::clone(&edge));
            tgt.borrow_mut().in_edges.push(edge);
        }
    }

    /// Remove the outgoing edges of a node
    pub fn remove_out_edges(&mut self, node: &NodeRef) {
        let edges = std::mem::take(&mut node.borrow_mut().out_edges);
        for edge in edges {
            if let Some(tgt) = edge.borrow().tgt() {
                tgt.borrow_mut()
                    .in_edges
                    .retain(|e| !Rc::ptr_eq(e, &edge));
            }
        }
    }

    /// Redirect the incoming edges of a node to another node, downgrading
    /// them to abstract edges
    ///
    /// Used by full covering: predecessors of a covered node point to the
    /// covering node afterwards.
    pub fn redirect_incoming(&mut self, from: &NodeRef, to: &NodeRef) {
        let edges = std::mem::take(&mut from.borrow_mut().in_edges);
        for edge in edges {
            let (src, vedge) = {
                let e = edge.borrow();
                (e.src(), Rc::clone(e.vedge()))
            };
            let Some(src) = src else { continue };
            // Self-loops onto the covered node are dropped with it.
            if Rc::ptr_eq(&src, from) {
                continue;
            }
            src.borrow_mut().out_edges.retain(|e| !Rc::ptr_eq(e, &edge));
            self.add_edge(&src, to, EdgeKind::Abstract, vedge);
        }
    }

    /// Remove a node and its remaining edges from the graph
    pub fn remove_node(&mut self, node: &NodeRef) {
        self.remove_out_edges(node);
        let in_edges = std::mem::take(&mut node.borrow_mut().in_edges);
        for edge in in_edges {
            if let Some(src) = edge.borrow().src() {
                src.borrow_mut()
                    .out_edges
                    .retain(|e| !Rc::ptr_eq(e, &edge));
            }
        }

        let key = node.borrow().state().discrete_hash();
        if let Some(bucket) = self.buckets.get_mut(&key) {
            let before = bucket.len();
            bucket.retain(|n| !Rc::ptr_eq(n, node));
            self.node_count -= before - bucket.len();
        }
    }

    /// Mark a node initial
    pub fn mark_initial(&mut self, node: &NodeRef) {
        node.borrow_mut().initial = true;
    }

    /// Mark a node final
    pub fn mark_final(&mut self, node: &NodeRef) {
        node.borrow_mut().is_final = true;
    }

    /// Iterate over all nodes of the graph
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.buckets.values().flatten().map(Rc::clone).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use zora_dbm::Dbm;
    use zora_timed_automaton::state::{Intval, Vloc};
    use zora_timed_automaton::LocationId;

    fn state(loc: usize, elapsed: bool) -> ZgState {
        let mut zone = Dbm::zero(1);
        if elapsed {
            zone.time_elapse();
        }
        ZgState {
            vloc: Rc::new(Vloc::new(vec![LocationId(loc)])),
            intval: Rc::new(Intval::new(vec![])),
            zone: Rc::new(zone),
        }
    }

    #[test]
    fn test_insert_and_lookup_covering() {
        let mut graph = SubsumptionGraph::new(16);
        let node = graph.insert(state(0, true));
        assert_eq!(graph.len(), 1);

        // The sharp zone is covered by the elapsed one.
        let covering = graph.lookup_covering(&state(0, false)).unwrap();
        assert!(Rc::ptr_eq(&covering, &node));

        // A different discrete part is never covered.
        assert!(graph.lookup_covering(&state(1, false)).is_none());
    }

    #[test]
    fn test_nodes_covered_by() {
        let mut graph = SubsumptionGraph::new(16);
        let small = graph.insert(state(0, false));
        let _other = graph.insert(state(1, false));

        let covered = graph.nodes_covered_by(&state(0, true));
        assert_eq!(covered.len(), 1);
        assert!(Rc::ptr_eq(&covered[0], &small));
    }

    #[test]
    fn test_remove_node_detaches_edges() {
        let mut graph = SubsumptionGraph::new(16);
        let a = graph.insert(state(0, false));
        let b = graph.insert(state(1, false));
        graph.add_edge(&a, &b, EdgeKind::Actual, Rc::new(Vedge::empty()));

        graph.remove_node(&b);
        assert_eq!(graph.len(), 1);
        assert!(a.borrow().out_edges().is_empty());
    }

    #[test]
    fn test_redirect_incoming() {
        let mut graph = SubsumptionGraph::new(16);
        let a = graph.insert(state(0, false));
        let covered = graph.insert(state(1, false));
        let covering = graph.insert(state(1, true));
        graph.add_edge(&a, &covered, EdgeKind::Actual, Rc::new(Vedge::empty()));

        graph.redirect_incoming(&covered, &covering);
        graph.remove_node(&covered);

        assert_eq!(graph.len(), 2);
        let out = a.borrow().out_edges().to_vec();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].borrow().kind(), EdgeKind::Abstract);
        assert!(Rc::ptr_eq(&out[0].borrow().tgt().unwrap(), &covering));
    }

    #[test]
    fn test_mark_flags() {
        let mut graph = SubsumptionGraph::new(16);
        let node = graph.insert(state(0, false));
        assert!(!node.borrow().is_initial());
        assert!(!node.borrow().is_final());

        graph.mark_initial(&node);
        graph.mark_final(&node);
        assert!(node.borrow().is_initial());
        assert!(node.borrow().is_final());
    }
}
