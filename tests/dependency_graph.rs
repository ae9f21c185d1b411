// tests/dependency_graph.rs

mod common;

use proptest::prelude::*;

use taskengine::api::{ContainerStatus, Task, TaskStatus};
use taskengine::dag::{DependencyGraph, dependencies_are_resolved, validate_dependencies};
use taskengine::errors::EngineError;

use crate::common::{ContainerBuilder, TaskBuilder};

#[test]
fn cycle_is_reported_with_its_members() {
    let task = TaskBuilder::new("arn:task/cycle")
        .container(ContainerBuilder::new("a", "img").after("b").build())
        .container(ContainerBuilder::new("b", "img").after("c").build())
        .container(ContainerBuilder::new("c", "img").after("a").build())
        .simple("d", "img")
        .build();

    match validate_dependencies(&task) {
        Err(EngineError::DependencyCycle { task, containers }) => {
            assert_eq!(task, "arn:task/cycle");
            assert_eq!(containers, vec!["a", "b", "c"]);
        }
        other => panic!("expected a dependency cycle, got {other:?}"),
    }
}

#[test]
fn self_link_is_a_cycle() {
    let task = TaskBuilder::new("arn:task/self")
        .container(ContainerBuilder::new("a", "img").link("a").build())
        .build();

    assert!(matches!(
        validate_dependencies(&task),
        Err(EngineError::DependencyCycle { .. })
    ));
}

#[test]
fn links_and_volumes_count_as_edges() {
    let task = TaskBuilder::new("arn:task/implicit")
        .container(ContainerBuilder::new("web", "img").link("db:database").build())
        .container(ContainerBuilder::new("db", "img").volumes_from("web").build())
        .build();

    let err = validate_dependencies(&task).unwrap_err();
    assert!(err.to_string().contains("web"), "{err}");
}

#[test]
fn unknown_dependency_is_rejected() {
    let task = TaskBuilder::new("arn:task/unknown")
        .container(ContainerBuilder::new("web", "img").after("ghost").build())
        .build();

    match validate_dependencies(&task) {
        Err(EngineError::UnknownDependency { container, dependency }) => {
            assert_eq!(container, "web");
            assert_eq!(dependency, "ghost");
        }
        other => panic!("expected unknown dependency, got {other:?}"),
    }
}

#[test]
fn empty_and_duplicate_tasks_are_invalid() {
    let empty = Task::new("arn:task/empty");
    assert!(matches!(
        validate_dependencies(&empty),
        Err(EngineError::InvalidTask(_))
    ));

    let duplicate = TaskBuilder::new("arn:task/dup")
        .simple("web", "a")
        .simple("web", "b")
        .build();
    assert!(matches!(
        validate_dependencies(&duplicate),
        Err(EngineError::InvalidTask(_))
    ));
}

#[test]
fn start_order_puts_dependencies_first() {
    let task = TaskBuilder::new("arn:task/order")
        .container(ContainerBuilder::new("web", "img").after("app").build())
        .container(ContainerBuilder::new("app", "img").link("db").build())
        .simple("db", "img")
        .build();

    let order = DependencyGraph::from_task(&task).start_order().unwrap();
    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(pos("db") < pos("app"));
    assert!(pos("app") < pos("web"));
}

#[test]
fn dependents_are_tracked() {
    let task = TaskBuilder::new("arn:task/dependents")
        .container(ContainerBuilder::new("web", "img").after("db").build())
        .container(ContainerBuilder::new("worker", "img").after("db").build())
        .simple("db", "img")
        .build();

    let graph = DependencyGraph::from_task(&task);
    let mut dependents = graph.dependents_of("db").to_vec();
    dependents.sort();
    assert_eq!(dependents, vec!["web", "worker"]);
    assert_eq!(graph.dependencies_of("web").len(), 1);
}

#[test]
fn dependency_gates_only_past_dependent_status() {
    let mut task = TaskBuilder::new("arn:task/gate")
        .container(ContainerBuilder::new("web", "img").after("db").build())
        .simple("db", "img")
        .build();
    let web = task.container("web").unwrap().clone();

    assert!(dependencies_are_resolved(&web, &task, ContainerStatus::Pulled));
    assert!(dependencies_are_resolved(&web, &task, ContainerStatus::Created));
    assert!(!dependencies_are_resolved(&web, &task, ContainerStatus::Running));

    task.container_mut("db").unwrap().known_status = ContainerStatus::Running;
    assert!(dependencies_are_resolved(&web, &task, ContainerStatus::Running));
}

#[test]
fn dependency_stops_after_its_dependents() {
    let mut task = TaskBuilder::new("arn:task/stop-order")
        .container(ContainerBuilder::new("web", "img").after("db").build())
        .simple("db", "img")
        .desired(TaskStatus::Stopped)
        .build();
    for c in task.containers.iter_mut() {
        c.known_status = ContainerStatus::Running;
    }
    let db = task.container("db").unwrap().clone();

    assert!(!dependencies_are_resolved(&db, &task, ContainerStatus::Stopped));
    task.container_mut("web").unwrap().known_status = ContainerStatus::Stopped;
    assert!(dependencies_are_resolved(&db, &task, ContainerStatus::Stopped));
}

/// Tasks where container N may only depend on containers 0..N.
fn acyclic_task(max: usize) -> impl Strategy<Value = Task> {
    (1..=max).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            move |raw| {
                let mut builder = TaskBuilder::new("arn:task/prop");
                for (i, picks) in raw.into_iter().enumerate() {
                    let mut container = ContainerBuilder::new(&format!("c{i}"), "img");
                    let mut deps: Vec<usize> = picks.into_iter().filter(|_| i > 0).map(|p| p % i.max(1)).collect();
                    deps.sort();
                    deps.dedup();
                    for d in deps {
                        container = container.after(&format!("c{d}"));
                    }
                    builder = builder.container(container.build());
                }
                builder.build()
            },
        )
    })
}

proptest! {
    #[test]
    fn generated_dags_validate_and_order(task in acyclic_task(8)) {
        prop_assert!(validate_dependencies(&task).is_ok());
        let order = DependencyGraph::from_task(&task).start_order().unwrap();
        prop_assert_eq!(order.len(), task.containers.len());
        for container in task.containers.iter() {
            let me = order.iter().position(|n| *n == container.name).unwrap();
            for dep in container.dependencies.iter() {
                let them = order.iter().position(|n| *n == dep.container_name).unwrap();
                prop_assert!(them < me);
            }
        }
    }

    #[test]
    fn back_edge_always_creates_a_cycle(task in acyclic_task(8)) {
        let mut task = task;
        let n = task.containers.len();
        prop_assume!(n >= 2);
        let last = format!("c{}", n - 1);
        let Some(first_dep) = task.containers[n - 1].dependencies.first().cloned() else {
            return Ok(());
        };
        let target = task.container_mut(&first_dep.container_name).unwrap();
        target.links.push(last);
        let is_cycle = matches!(
            validate_dependencies(&task),
            Err(EngineError::DependencyCycle { .. })
        );
        prop_assert!(is_cycle);
    }
}
