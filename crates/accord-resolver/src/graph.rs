//! Resolved dependency graph construction and traversal.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use accord_core::Category;

/// A node in the resolved dependency graph.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResolvedNode {
    pub name: String,
    pub version: String,
    pub category: Category,
}

impl ResolvedNode {
    /// `name:version` identifier.
    pub fn key(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }
}

impl fmt::Display for ResolvedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Edge label in the dependency graph.
#[derive(Debug, Clone)]
pub struct DepEdge {
    pub category: Category,
    pub optional: bool,
}

/// A resolved dependency graph backed by petgraph.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ResolvedNode, DepEdge>,
    /// Lookup from `name:version` to node index.
    index: HashMap<String, NodeIndex>,
    pub root: Option<NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or retrieve a node. If the key already exists, returns the
    /// existing index.
    pub fn add_node(&mut self, node: ResolvedNode) -> NodeIndex {
        let key = node.key();
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(node);
        self.index.insert(key, idx);
        idx
    }

    /// Set the root node of the graph (the project itself).
    pub fn set_root(&mut self, idx: NodeIndex) {
        self.root = Some(idx);
    }

    /// Add a dependency edge from `from` to `to`.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: DepEdge) {
        if !self.graph.edges(from).any(|e| e.target() == to) {
            self.graph.add_edge(from, to, edge);
        }
    }

    /// Look up a node by `name:version`, or by bare name.
    pub fn find(&self, key: &str) -> Option<NodeIndex> {
        if let Some(&idx) = self.index.get(key) {
            return Some(idx);
        }
        let mut matches: Vec<NodeIndex> = self
            .index
            .iter()
            .filter(|(full_key, _)| full_key.split(':').next() == Some(key))
            .map(|(_, &idx)| idx)
            .collect();
        matches.sort();
        matches.into_iter().next()
    }

    pub fn node(&self, idx: NodeIndex) -> &ResolvedNode {
        &self.graph[idx]
    }

    /// All resolved nodes (excluding root).
    pub fn all_nodes(&self) -> Vec<&ResolvedNode> {
        self.graph
            .node_indices()
            .filter(|&idx| Some(idx) != self.root)
            .map(|idx| &self.graph[idx])
            .collect()
    }

    /// Direct dependencies of a node.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut deps: Vec<(NodeIndex, &DepEdge)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        deps.sort_by(|a, b| self.graph[a.0].key().cmp(&self.graph[b.0].key()));
        deps
    }

    /// Reverse dependencies (who depends on this node).
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut deps: Vec<(NodeIndex, &DepEdge)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect();
        deps.sort_by(|a, b| self.graph[a.0].key().cmp(&self.graph[b.0].key()));
        deps
    }

    /// Find the path from root to a specific package, if it is in the graph.
    pub fn find_path(&self, target_key: &str) -> Option<Vec<&ResolvedNode>> {
        let root = self.root?;
        let target = self.find(target_key)?;
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.dfs_path(root, target, &mut path, &mut visited) {
            Some(path.iter().map(|&idx| &self.graph[idx]).collect())
        } else {
            None
        }
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for (child, _) in self.dependencies_of(current) {
            if self.dfs_path(child, target, path, visited) {
                return true;
            }
        }
        path.pop();
        visited.remove(&current);
        false
    }

    /// Print the dependency tree to a string, grouping root dependencies by
    /// category.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        let root = match self.root {
            Some(r) => r,
            None => return output,
        };

        let root_node = &self.graph[root];
        output.push_str(&format!("{root_node}\n"));

        let deps = self.dependencies_of(root);
        let mut main_deps: Vec<(NodeIndex, &DepEdge)> = Vec::new();
        let mut dev_deps: Vec<(NodeIndex, &DepEdge)> = Vec::new();
        for (idx, edge) in deps {
            match edge.category {
                Category::Dev => dev_deps.push((idx, edge)),
                Category::Main => main_deps.push((idx, edge)),
            }
        }

        let show_headers = !dev_deps.is_empty();
        let mut visited = HashSet::new();
        visited.insert(root);

        let sections = [("[dependencies]", &main_deps), ("[dev-dependencies]", &dev_deps)];
        let total_sections = sections.iter().filter(|(_, d)| !d.is_empty()).count();
        let mut sections_printed = 0usize;

        for (label, deps_list) in sections {
            if deps_list.is_empty() {
                continue;
            }
            sections_printed += 1;
            if show_headers {
                output.push_str(&format!("{label}\n"));
            }
            let is_last_section = sections_printed == total_sections;
            let count = deps_list.len();
            for (i, (idx, _edge)) in deps_list.iter().enumerate() {
                let is_last = i == count - 1 && is_last_section;
                self.print_subtree(&mut output, *idx, "", is_last, 1, max_depth, &mut visited);
            }
        }

        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        output.push_str(&format!("{prefix}{connector}{node}\n"));

        if let Some(max) = max_depth {
            if depth >= max {
                return;
            }
        }

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let deps = self.dependencies_of(idx);
        let count = deps.len();
        for (i, (child, _)) in deps.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_subtree(
                output,
                *child,
                &child_prefix,
                is_last,
                depth + 1,
                max_depth,
                visited,
            );
        }

        visited.remove(&idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, version: &str) -> ResolvedNode {
        ResolvedNode {
            name: name.to_string(),
            version: version.to_string(),
            category: Category::Main,
        }
    }

    fn edge() -> DepEdge {
        DepEdge {
            category: Category::Main,
            optional: false,
        }
    }

    #[test]
    fn add_node_deduplicates_by_key() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(node("cleo", "0.6.5"));
        let b = graph.add_node(node("cleo", "0.6.5"));
        assert_eq!(a, b);
    }

    #[test]
    fn path_from_root() {
        let mut graph = DependencyGraph::new();
        let root = graph.add_node(node("my-package", "1.2.3"));
        graph.set_root(root);
        let cleo = graph.add_node(node("cleo", "0.6.5"));
        let pastel = graph.add_node(node("pastel", "0.1.0"));
        graph.add_edge(root, cleo, edge());
        graph.add_edge(cleo, pastel, edge());

        let path = graph.find_path("pastel").unwrap();
        let names: Vec<&str> = path.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["my-package", "cleo", "pastel"]);
    }

    #[test]
    fn tree_sections_by_category() {
        let mut graph = DependencyGraph::new();
        let root = graph.add_node(node("my-package", "1.2.3"));
        graph.set_root(root);
        let cleo = graph.add_node(node("cleo", "0.6.5"));
        let pytest = graph.add_node(ResolvedNode {
            name: "pytest".to_string(),
            version: "3.5.0".to_string(),
            category: Category::Dev,
        });
        graph.add_edge(root, cleo, edge());
        graph.add_edge(
            root,
            pytest,
            DepEdge {
                category: Category::Dev,
                optional: false,
            },
        );

        let tree = graph.print_tree(None);
        assert!(tree.contains("[dependencies]"));
        assert!(tree.contains("[dev-dependencies]"));
        assert!(tree.contains("cleo 0.6.5"));
        assert!(tree.contains("pytest 3.5.0"));
    }

    #[test]
    fn dependents_are_reverse_edges() {
        let mut graph = DependencyGraph::new();
        let root = graph.add_node(node("my-package", "1.2.3"));
        graph.set_root(root);
        let shared = graph.add_node(node("shared", "2.0.0"));
        let a = graph.add_node(node("a", "1.0.0"));
        graph.add_edge(root, a, edge());
        graph.add_edge(root, shared, edge());
        graph.add_edge(a, shared, edge());

        let dependents = graph.dependents_of(shared);
        assert_eq!(dependents.len(), 2);
    }
}
