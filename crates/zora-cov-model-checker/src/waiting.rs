//! Waiting sets driving the exploration order
//!
//! A [`WaitingSet`] hands out pending nodes in BFS (queue) or DFS (stack)
//! order and supports constant-time removal: covered nodes are not pulled
//! out of the container but flagged through the node's `in_waiting` bit and
//! skipped on pop.

use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;

use crate::graph::NodeRef;

/// Exploration order of the waiting set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchOrder {
    /// Breadth-first: pending nodes form a queue
    Bfs,
    /// Depth-first: pending nodes form a stack
    Dfs,
}

/// Set of nodes waiting to be expanded
#[derive(Debug)]
pub struct WaitingSet {
    order: SearchOrder,
    pending: VecDeque<NodeRef>,
}

impl WaitingSet {
    /// Create an empty waiting set with the given order
    pub fn new(order: SearchOrder) -> Self {
        WaitingSet {
            order,
            pending: VecDeque::new(),
        }
    }

    /// Append a node
    pub fn insert(&mut self, node: &NodeRef) {
        node.borrow_mut().in_waiting = true;
        self.pending.push_back(Rc::clone(node));
    }

    /// Flag a node as removed
    ///
    /// The node stays in the container and is skipped when popped.
    pub fn fast_remove(&mut self, node: &NodeRef) {
        node.borrow_mut().in_waiting = false;
    }

    /// Pop the next pending node in the configured order
    pub fn pop(&mut self) -> Option<NodeRef> {
        loop {
            let node = match self.order {
                SearchOrder::Bfs => self.pending.pop_front()?,
                SearchOrder::Dfs => self.pending.pop_back()?,
            };
            let mut inner = node.borrow_mut();
            if inner.in_waiting {
                inner.in_waiting = false;
                drop(inner);
                return Some(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use zora_dbm::Dbm;
    use zora_timed_automaton::state::{Intval, Vloc};
    use zora_timed_automaton::LocationId;
    use zora_zone_graph::ZgState;

    use crate::graph::SubsumptionGraph;

    fn node(graph: &mut SubsumptionGraph, loc: usize) -> NodeRef {
        graph.insert(ZgState {
            vloc: Rc::new(Vloc::new(vec![LocationId(loc)])),
            intval: Rc::new(Intval::new(vec![])),
            zone: Rc::new(Dbm::zero(1)),
        })
    }

    #[test]
    fn test_bfs_order() {
        let mut graph = SubsumptionGraph::new(16);
        let a = node(&mut graph, 0);
        let b = node(&mut graph, 1);

        let mut waiting = WaitingSet::new(SearchOrder::Bfs);
        waiting.insert(&a);
        waiting.insert(&b);

        assert!(Rc::ptr_eq(&waiting.pop().unwrap(), &a));
        assert!(Rc::ptr_eq(&waiting.pop().unwrap(), &b));
        assert!(waiting.pop().is_none());
    }

    #[test]
    fn test_dfs_order() {
        let mut graph = SubsumptionGraph::new(16);
        let a = node(&mut graph, 0);
        let b = node(&mut graph, 1);

        let mut waiting = WaitingSet::new(SearchOrder::Dfs);
        waiting.insert(&a);
        waiting.insert(&b);

        assert!(Rc::ptr_eq(&waiting.pop().unwrap(), &b));
        assert!(Rc::ptr_eq(&waiting.pop().unwrap(), &a));
    }

    #[test]
    fn test_fast_remove_skips_node() {
        let mut graph = SubsumptionGraph::new(16);
        let a = node(&mut graph, 0);
        let b = node(&mut graph, 1);

        let mut waiting = WaitingSet::new(SearchOrder::Bfs);
        waiting.insert(&a);
        waiting.insert(&b);
        waiting.fast_remove(&a);

        assert!(Rc::ptr_eq(&waiting.pop().unwrap(), &b));
        assert!(waiting.pop().is_none());
    }
}
