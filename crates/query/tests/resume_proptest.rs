//! Property-based tests for offset key resumption.
//!
//! Paging through a query in pages of random size, on random workers,
//! must deliver exactly the rows a single pass delivers.

mod common;

use common::{account, account_store, compiler};
use proptest::prelude::*;
use resumedb_query::{offset_key, EngineConfig, ExecutionEnumerator, QueryEngine, QueryRequest};
use std::collections::BTreeSet;
use std::sync::Arc;

const WORKERS: usize = 4;

/// Strategy for a set of distinct account ids in random insertion order.
fn accountids_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(-500i64..500, 0..40)
        .prop_flat_map(|set| Just(set.into_iter().collect::<Vec<_>>()).prop_shuffle())
}

fn query(ordered: bool, fetch: usize) -> String {
    if ordered {
        format!("SELECT a FROM Account a ORDER BY accountid FETCH {}", fetch)
    } else {
        format!("SELECT a FROM Account a FETCH {}", fetch)
    }
}

/// Runs the query without FETCH in one pass.
fn single_pass(engine: &QueryEngine, ordered: bool, store: &resumedb_storage::MemoryStore) -> Vec<resumedb_core::RowId> {
    let text = if ordered {
        "SELECT a FROM Account a ORDER BY accountid"
    } else {
        "SELECT a FROM Account a"
    };
    engine
        .fetch_page(&QueryRequest::new(text, account()), Box::new(store.begin()))
        .unwrap()
        .rows
        .iter()
        .filter_map(|r| r.identity())
        .collect()
}

proptest! {
    /// Property: the concatenation of resumed pages equals the single-pass result.
    #[test]
    fn paged_equals_single_pass(
        ids in accountids_strategy(),
        ordered in any::<bool>(),
        pages in prop::collection::vec((1usize..6, 0..WORKERS), 1..60),
    ) {
        let (store, _) = account_store(&ids);
        let engine = QueryEngine::new(EngineConfig::default().with_workers(WORKERS), compiler());
        let expected = single_pass(&engine, ordered, &store);

        let mut delivered = Vec::new();
        let mut key = None;
        for (fetch, worker) in pages {
            let mut request = QueryRequest::new(query(ordered, fetch), account()).on_worker(worker);
            if let Some(key) = key.take() {
                request = request.resume_from(key);
            }
            let page = engine.fetch_page(&request, Box::new(store.begin())).unwrap();
            prop_assert!(page.len() <= fetch);
            delivered.extend(page.rows.iter().filter_map(|r| r.identity()));
            match page.offset_key {
                Some(next) => key = Some(next),
                None => break,
            }
        }
        if key.is_none() {
            prop_assert_eq!(&delivered, &expected);
        } else {
            prop_assert_eq!(&delivered[..], &expected[..delivered.len()]);
        }
    }

    /// Property: the first row after a resume is never the row the key was
    /// captured on, and capturing twice gives identical bytes.
    #[test]
    fn resume_is_exclusive_and_capture_is_stable(
        ids in accountids_strategy(),
        stop in 1usize..40,
    ) {
        let (store, _) = account_store(&ids);
        let engine = QueryEngine::new(EngineConfig::default(), compiler());
        let template = engine
            .get_or_compile("SELECT a FROM Account a ORDER BY accountid", &account(), 0)
            .unwrap();
        let mut enumerator = ExecutionEnumerator::bind(Arc::clone(&template), Box::new(store.begin())).unwrap();
        let mut last = None;
        for _ in 0..stop.min(ids.len()) {
            prop_assert!(enumerator.advance().unwrap());
            last = enumerator.current_row().unwrap().identity();
        }
        let first = enumerator.capture_offset_key();
        let second = offset_key::encode(&enumerator);
        prop_assert_eq!(&first, &second);

        match (first, last) {
            (Some(key), Some(last)) => {
                let mut resumed = offset_key::decode(&key, template, Box::new(store.begin()), Vec::new()).unwrap();
                if resumed.advance().unwrap() {
                    prop_assert_ne!(resumed.current_row().unwrap().identity(), Some(last));
                }
            }
            (None, None) => prop_assert!(ids.is_empty()),
            (key, last) => prop_assert!(false, "key {:?} without row {:?}", key, last),
        }
    }

    /// Property: deleting rows between pages never resurrects a delivered
    /// row and never skips a row that survived.
    #[test]
    fn resume_tolerates_deletes(
        ids in accountids_strategy(),
        deletes in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
        fetch in 1usize..5,
    ) {
        let (store, rows) = account_store(&ids);
        let engine = QueryEngine::new(EngineConfig::default().with_workers(2), compiler());
        let mut deleted = BTreeSet::new();
        let mut delivered = Vec::new();
        let mut key = None;
        let mut deletes = deletes.into_iter();
        for page_no in 0.. {
            let mut request = QueryRequest::new(query(true, fetch), account()).on_worker(page_no % 2);
            if let Some(key) = key.take() {
                request = request.resume_from(key);
            }
            let page = engine.fetch_page(&request, Box::new(store.begin())).unwrap();
            delivered.extend(page.rows.iter().filter_map(|r| r.identity()));
            match page.offset_key {
                Some(next) => key = Some(next),
                None => break,
            }
            if let (Some(pick), false) = (deletes.next(), rows.is_empty()) {
                let victim = rows[pick.index(rows.len())];
                if deleted.insert(victim) {
                    store.delete(victim).unwrap();
                }
            }
        }

        let by_accountid = |id: &resumedb_core::RowId| {
            ids[rows.iter().position(|r| r == id).unwrap()]
        };
        let delivered_ids: Vec<i64> = delivered.iter().map(by_accountid).collect();
        prop_assert!(delivered_ids.windows(2).all(|w| w[0] < w[1]));
        for row in &rows {
            if !deleted.contains(row) {
                prop_assert!(delivered.contains(row));
            }
        }
    }
}
