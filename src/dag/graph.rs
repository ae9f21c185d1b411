// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::api::{Container, ContainerDependency, ContainerStatus, Task};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DependencyNode {
    /// Effective dependencies, explicit and implicit.
    deps: Vec<ContainerDependency>,
    /// Containers that depend on this one.
    dependents: Vec<String>,
}

/// Container dependency graph of one task, keyed by container name.
///
/// Explicit dependencies are combined with the implicit ones that `links`
/// and `volumes_from` imply, so cycle detection and readiness checks see
/// the same edges.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<String, DependencyNode>,
    order: Vec<String>,
}

impl DependencyGraph {
    pub fn from_task(task: &Task) -> Self {
        let mut nodes: HashMap<String, DependencyNode> = HashMap::new();
        let mut order = Vec::with_capacity(task.containers.len());

        for container in task.containers.iter() {
            order.push(container.name.clone());
            nodes.insert(
                container.name.clone(),
                DependencyNode {
                    deps: effective_dependencies(container, task),
                    dependents: Vec::new(),
                },
            );
        }

        for name in order.iter() {
            let deps: Vec<String> = nodes
                .get(name)
                .map(|n| n.deps.iter().map(|d| d.container_name.clone()).collect())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    if !dep_node.dependents.contains(name) {
                        dep_node.dependents.push(name.clone());
                    }
                }
            }
        }

        Self { nodes, order }
    }

    /// Container names in task order.
    pub fn containers(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn dependencies_of(&self, name: &str) -> &[ContainerDependency] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Dependency names that do not exist in the task, as
    /// `(container, missing dependency)` pairs.
    pub fn unknown_dependencies(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for name in self.order.iter() {
            for dep in self.dependencies_of(name) {
                if !self.nodes.contains_key(&dep.container_name) {
                    missing.push((name.clone(), dep.container_name.clone()));
                }
            }
        }
        missing
    }

    fn petgraph(&self) -> DiGraphMap<&str, ()> {
        // Edge direction: container -> dependency.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.order.iter() {
            graph.add_node(name.as_str());
        }
        for name in self.order.iter() {
            for dep in self.dependencies_of(name) {
                if self.nodes.contains_key(&dep.container_name) {
                    graph.add_edge(name.as_str(), dep.container_name.as_str(), ());
                }
            }
        }
        graph
    }

    /// The first cycle found, as the sorted names of the containers on it.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let graph = self.petgraph();
        for component in tarjan_scc(&graph) {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|n| graph.contains_edge(*n, *n));
            if cyclic {
                let mut names: Vec<String> = component.iter().map(|s| s.to_string()).collect();
                names.sort();
                return Some(names);
            }
        }
        None
    }

    /// A start order in which every container comes after its dependencies.
    ///
    /// `None` if the graph has a cycle.
    pub fn start_order(&self) -> Option<Vec<String>> {
        let graph = self.petgraph();
        let mut order: Vec<String> = toposort(&graph, None)
            .ok()?
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        order.reverse();
        Some(order)
    }
}

/// Explicit dependencies plus those implied by `links` and `volumes_from`.
///
/// A link must be at its steady state before the linking container starts;
/// a volume source must exist before the mounting container is created.
pub fn effective_dependencies(container: &Container, task: &Task) -> Vec<ContainerDependency> {
    let mut deps = container.dependencies.clone();

    for link in container.links.iter() {
        let target = link.split(':').next().unwrap_or(link);
        let satisfied = task
            .container(target)
            .map(Container::steady_state)
            .unwrap_or(ContainerStatus::Running);
        deps.push(ContainerDependency::new(
            target,
            satisfied,
            ContainerStatus::Created,
        ));
    }

    for source in container.volumes_from.iter() {
        deps.push(ContainerDependency::new(
            source.as_str(),
            ContainerStatus::Created,
            ContainerStatus::Pulled,
        ));
    }

    deps
}
