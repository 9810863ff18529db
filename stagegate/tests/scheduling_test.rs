//! Scheduler behaviour under real concurrency
//!
//! Node tasks run on a multi-threaded runtime with randomized delays; the
//! order in which phases are entered must still follow the declared edges.

use rand::Rng;
use stagegate::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn path_manager(len: usize) -> DependencyManager {
    let mut manager = DependencyManager::new();
    for i in 0..len {
        manager.register_node(format!("n{i}")).unwrap();
    }
    for i in 1..len {
        manager
            .add_dependency(&format!("n{i}"), Phase::Create, &format!("n{}", i - 1), Phase::Create)
            .unwrap();
    }
    manager
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_path_enters_in_order_under_random_delays() {
    const LEN: usize = 12;

    let scheduler = Arc::new(path_manager(LEN).freeze().unwrap());
    let entered = Arc::new(Mutex::new(Vec::new()));

    // ThreadRng is not Send, so draw every delay up front.
    let mut rng = rand::thread_rng();
    let mut order: Vec<usize> = (0..LEN).collect();
    order.sort_by_key(|_| rng.gen::<u32>());
    let delays: Vec<(u64, u64)> = (0..LEN)
        .map(|_| (rng.gen_range(0..15), rng.gen_range(0..5)))
        .collect();

    let handles: Vec<_> = order
        .into_iter()
        .map(|i| {
            let scheduler = Arc::clone(&scheduler);
            let entered = Arc::clone(&entered);
            let (before, during) = delays[i];
            tokio::spawn(async move {
                let name = format!("n{i}");
                tokio::time::sleep(Duration::from_millis(before)).await;

                let admission = scheduler.enter(&name, Phase::Create).await.unwrap();
                assert!(admission.is_clear());
                entered.lock().unwrap().push(i);

                tokio::time::sleep(Duration::from_millis(during)).await;
                scheduler.signal_done(&name, Phase::Create);
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*entered.lock().unwrap(), (0..LEN).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_nodes_without_edges_never_wait() {
    let mut manager = DependencyManager::new();
    for name in ["a", "b", "c"] {
        manager.register_node(name).unwrap();
    }
    let scheduler = manager.freeze().unwrap();

    for name in ["a", "b", "c"] {
        for phase in Phase::ALL {
            let admission = tokio::time::timeout(
                Duration::from_millis(100),
                scheduler.enter(name, phase),
            )
            .await
            .expect("enter must not block without prerequisites")
            .unwrap();
            assert!(admission.is_clear());
            scheduler.signal_done(name, phase);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fan_in_releases_every_waiter_once() {
    let mut manager = DependencyManager::new();
    manager.register_node("spine").unwrap();
    for i in 0..8 {
        let leaf = format!("leaf{i}");
        manager.register_node(&leaf).unwrap();
        manager
            .add_dependency(&leaf, Phase::Configure, "spine", Phase::Healthy)
            .unwrap();
    }
    let scheduler = Arc::new(manager.freeze().unwrap());

    let waiters: Vec<_> = (0..8)
        .map(|i| {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                scheduler
                    .enter(&format!("leaf{i}"), Phase::Configure)
                    .await
                    .unwrap()
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(waiters.iter().all(|handle| !handle.is_finished()));

    scheduler.signal_done("spine", Phase::Healthy);
    for waiter in waiters {
        assert_eq!(waiter.await.unwrap(), Admission::Clear);
    }
    for i in 0..8 {
        assert_eq!(
            scheduler.remaining(&format!("leaf{i}"), Phase::Configure).unwrap(),
            0
        );
    }
}

#[test]
fn test_cycle_error_names_region_and_lists_graph() {
    let mut manager = path_manager(4);
    manager
        .add_dependency("n1", Phase::Create, "n2", Phase::Configure)
        .unwrap();

    match manager.freeze() {
        Err(DependencyError::CyclicDependencies { region, adjacency }) => {
            assert_eq!(region, vec!["n0", "n1", "n2"]);
            assert!(adjacency.contains("n2 -> [ n1, n3 ]"));
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
}
