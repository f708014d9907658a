//! DOT rendering of the subsumption graph
//!
//! Nodes and edges are sorted by the lexical order on their states and edge
//! tuples before rendering, so two runs on identical inputs produce
//! byte-identical output.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::rc::Rc;

use zora_zone_graph::ZoneGraph;

use crate::graph::{NodeRef, SubsumptionGraph};

/// Render the subsumption graph in DOT format
///
/// Node attributes are `vloc`, `intval`, `zone`, `initial` and `final`;
/// edge attributes are `vedge`. Nodes are ordered lexically by
/// `(vloc, intval, zone)` and edges by source, target and edge tuple.
pub fn dot_output(graph: &SubsumptionGraph, zone_graph: &ZoneGraph, name: &str) -> String {
    let mut nodes = graph.nodes();
    nodes.sort_by(|a, b| a.borrow().state().lexical_cmp(b.borrow().state()));

    let index: HashMap<*const _, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (Rc::as_ptr(n) as *const _, i))
        .collect();
    let node_index = |n: &NodeRef| index[&(Rc::as_ptr(n) as *const _)];

    let mut out = format!("digraph {name} {{\n");

    for (i, node) in nodes.iter().enumerate() {
        let inner = node.borrow();
        let mut attributes: BTreeMap<String, String> = zone_graph.attributes(inner.state());
        attributes.insert("initial".to_string(), inner.is_initial().to_string());
        attributes.insert("final".to_string(), inner.is_final().to_string());

        let rendered: Vec<String> = attributes
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect();
        out.push_str(&format!("  n{i} [{}]\n", rendered.join(", ")));
    }

    // (source index, target index, vedge rendering) triples, sorted.
    let mut edges: Vec<(usize, usize, String)> = Vec::new();
    for node in &nodes {
        for edge in node.borrow().out_edges() {
            let inner = edge.borrow();
            let Some(tgt) = inner.tgt() else { continue };
            let vedge = zone_graph
                .transition_attributes(&zora_zone_graph::ZgTransition {
                    vedge: Rc::clone(inner.vedge()),
                })
                .remove("vedge")
                .unwrap_or_default();
            edges.push((node_index(node), node_index(&tgt), vedge));
        }
    }
    edges.sort();

    for (src, tgt, vedge) in edges {
        out.push_str(&format!("  n{src} -> n{tgt} [vedge=\"{vedge}\"]\n"));
    }

    out.push_str("}\n");
    out
}
