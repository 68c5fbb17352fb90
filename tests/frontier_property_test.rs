//! Ordering and exclusivity properties of both frontier implementations.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use uuid::Uuid;

use multiverse::adapters::memory::InMemoryFrontier;
use multiverse::adapters::sqlite::{create_migrated_test_pool, initialize_database, SqliteFrontier};
use multiverse::domain::models::DatabaseConfig;
use multiverse::domain::ports::Frontier;

/// Expected pop order: priority descending, insertion order among ties.
fn expected_order(entries: &[(Uuid, f64)]) -> Vec<Uuid> {
    let mut indexed: Vec<(usize, &(Uuid, f64))> = entries.iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| b.1.total_cmp(&a.1).then(ia.cmp(ib)));
    indexed.into_iter().map(|(_, (id, _))| *id).collect()
}

async fn drain(frontier: &dyn Frontier, entries: &[(Uuid, f64)], batch: usize) -> Vec<Uuid> {
    for (id, priority) in entries {
        frontier.push(*id, *priority).await.unwrap();
    }
    let mut popped = Vec::new();
    loop {
        let ids = frontier.pop_batch(batch).await.unwrap();
        if ids.is_empty() {
            break;
        }
        popped.extend(ids);
    }
    popped
}

fn entries_strategy() -> impl Strategy<Value = Vec<(Uuid, f64)>> {
    // Few distinct priorities so ties are common.
    prop::collection::vec((0_u8..5).prop_map(|p| (Uuid::new_v4(), f64::from(p) / 4.0)), 0..25)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn proptest_in_memory_pops_in_priority_then_insertion_order(entries in entries_strategy(), batch in 1_usize..6) {
        let popped = tokio_test::block_on(async {
            let frontier = InMemoryFrontier::new();
            drain(&frontier, &entries, batch).await
        });
        prop_assert_eq!(popped, expected_order(&entries));
    }

    #[test]
    fn proptest_sqlite_pops_in_priority_then_insertion_order(entries in entries_strategy(), batch in 1_usize..6) {
        let popped = tokio_test::block_on(async {
            let frontier = SqliteFrontier::new(create_migrated_test_pool().await.unwrap());
            drain(&frontier, &entries, batch).await
        });
        prop_assert_eq!(popped, expected_order(&entries));
    }
}

#[tokio::test]
async fn test_concurrent_sqlite_consumers_never_share_entries() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("frontier.db").display().to_string(),
        max_connections: 5,
    };
    let frontier = Arc::new(SqliteFrontier::new(initialize_database(&config).await.unwrap()));

    for i in 0..200 {
        frontier.push(Uuid::new_v4(), f64::from(i % 7)).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let frontier = Arc::clone(&frontier);
        handles.push(tokio::spawn(async move {
            let mut mine = Vec::new();
            loop {
                let ids = frontier.pop_batch(7).await.unwrap();
                if ids.is_empty() {
                    break mine;
                }
                mine.extend(ids);
            }
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "entry {id} delivered twice");
        }
    }
    assert_eq!(seen.len(), 200);
    assert_eq!(frontier.size().await.unwrap(), 0);
}
