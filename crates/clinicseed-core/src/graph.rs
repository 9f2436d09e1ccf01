use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::schema::TableDef;

/// Errors raised while ordering a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown node '{node}' referenced by '{referenced_by}'")]
    UnknownNode { node: String, referenced_by: String },
    #[error("dependency cycle between: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Directed graph where an edge `parent -> child` means the parent must
/// exist before the child.
///
/// Ordering is stable: among nodes that are ready at the same time, the one
/// added first wins, so a graph whose declaration order already respects
/// every edge sorts back to declaration order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    ranks: BTreeMap<String, usize>,
    children: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; re-adding keeps the original rank.
    pub fn add_node(&mut self, name: impl Into<String>) {
        let name = name.into();
        let next = self.ranks.len();
        self.ranks.entry(name.clone()).or_insert(next);
        self.children.entry(name).or_default();
    }

    /// Declare that `child` depends on `parent`. Self edges are ignored.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<(), GraphError> {
        for (node, other) in [(parent, child), (child, parent)] {
            if !self.ranks.contains_key(node) {
                return Err(GraphError::UnknownNode {
                    node: node.to_string(),
                    referenced_by: other.to_string(),
                });
            }
        }
        if parent != child {
            self.children
                .entry(parent.to_string())
                .or_default()
                .insert(child.to_string());
        }
        Ok(())
    }

    /// Parents-first order, or the nodes stuck on a cycle.
    pub fn toposort(&self) -> Result<Vec<String>, GraphError> {
        let mut indegree: BTreeMap<&str, usize> =
            self.ranks.keys().map(|node| (node.as_str(), 0)).collect();

        for targets in self.children.values() {
            for target in targets {
                if let Some(count) = indegree.get_mut(target.as_str()) {
                    *count += 1;
                }
            }
        }

        let mut ready: BTreeSet<(usize, &str)> = indegree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| (self.ranks[*node], *node))
            .collect();

        let mut order = Vec::with_capacity(self.ranks.len());

        while let Some(entry) = ready.iter().next().copied() {
            ready.remove(&entry);
            let (_, node) = entry;
            order.push(node.to_string());

            if let Some(targets) = self.children.get(node) {
                for target in targets {
                    if let Some(count) = indegree.get_mut(target.as_str()) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            ready.insert((self.ranks[target], target.as_str()));
                        }
                    }
                }
            }
        }

        if order.len() == self.ranks.len() {
            Ok(order)
        } else {
            let mut stuck: Vec<(usize, String)> = indegree
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(node, _)| (self.ranks[node], node.to_string()))
                .collect();
            stuck.sort();
            Err(GraphError::Cycle(
                stuck.into_iter().map(|(_, node)| node).collect(),
            ))
        }
    }
}

fn catalog_graph(tables: &[TableDef]) -> Result<DependencyGraph, GraphError> {
    let mut graph = DependencyGraph::new();
    for table in tables {
        graph.add_node(table.name);
    }
    for table in tables {
        for reference in table.references {
            graph.add_edge(reference.table, table.name)?;
        }
    }
    Ok(graph)
}

/// Parents-first order of the given tables, derived from their foreign keys.
pub fn insertion_order(tables: &[TableDef]) -> Result<Vec<String>, GraphError> {
    catalog_graph(tables)?.toposort()
}

/// Children-first order of the given tables: deleting in this order never
/// removes a row that another table still references.
pub fn cleanup_order(tables: &[TableDef]) -> Result<Vec<String>, GraphError> {
    let mut order = insertion_order(tables)?;
    order.reverse();
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CATALOG, table_def};

    fn position(order: &[String], name: &str) -> usize {
        order
            .iter()
            .position(|item| item == name)
            .unwrap_or_else(|| panic!("{name} missing from order"))
    }

    #[test]
    fn toposort_reports_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a");
        graph.add_node("b");
        graph.add_node("c");
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "a").unwrap();

        let err = graph.toposort().unwrap_err();
        assert_eq!(err, GraphError::Cycle(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn toposort_keeps_declaration_order_when_unconstrained() {
        let mut graph = DependencyGraph::new();
        for node in ["zeta", "alpha", "mid"] {
            graph.add_node(node);
        }
        graph.add_edge("zeta", "mid").unwrap();

        assert_eq!(graph.toposort().unwrap(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn unknown_edge_target_is_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_node("pets");
        let err = graph.add_edge("profiles", "pets").unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode { node, .. } if node == "profiles"));
    }

    #[test]
    fn self_references_do_not_form_cycles() {
        let order = insertion_order(&[*table_def("store_categories").unwrap()]).unwrap();
        assert_eq!(order, vec!["store_categories"]);
    }

    #[test]
    fn cleanup_order_deletes_children_before_parents() {
        let order = cleanup_order(CATALOG).expect("catalog is acyclic");
        assert_eq!(order.len(), CATALOG.len());

        for table in CATALOG {
            for reference in table.references {
                if reference.table == table.name {
                    continue;
                }
                assert!(
                    position(&order, table.name) < position(&order, reference.table),
                    "{} must be deleted before {}",
                    table.name,
                    reference.table
                );
            }
        }

        assert!(position(&order, "lab_results") < position(&order, "lab_orders"));
        assert!(position(&order, "weight_records") < position(&order, "pets"));
        assert!(position(&order, "services") < position(&order, "tenants"));
    }
}
