//! End-to-end paging scenarios through the query engine.

mod common;

use common::{account, account_store, accountids, compiler, CountingCompiler};
use resumedb_query::{
    EngineConfig, EngineError, OffsetKey, OffsetKeyError, QueryEngine, QueryRequest, SchemaChangeScope,
};
use std::sync::{Arc, Barrier};
use std::thread;

const ACCOUNTS: [i64; 5] = [0, 1, 2, 3, 4];

fn engine(workers: usize) -> QueryEngine {
    QueryEngine::new(EngineConfig::default().with_workers(workers), compiler())
}

#[test]
fn test_page_then_resume_on_other_worker() {
    let (store, ids) = account_store(&ACCOUNTS);
    let engine = engine(2);

    let first = QueryRequest::new("SELECT a FROM Account a ORDER BY accountid FETCH 3", account());
    let page = engine.fetch_page(&first, Box::new(store.begin())).unwrap();
    assert_eq!(accountids(&page, &ids, &ACCOUNTS), vec![0, 1, 2]);
    let key = page.offset_key.expect("more rows remain");

    let second = QueryRequest::new("SELECT a FROM Account a ORDER BY accountid FETCH 2", account())
        .on_worker(1)
        .resume_from(key);
    let page = engine.fetch_page(&second, Box::new(store.begin())).unwrap();
    assert_eq!(accountids(&page, &ids, &ACCOUNTS), vec![3, 4]);
    assert!(page.offset_key.is_none());
}

#[test]
fn test_resume_after_delete() {
    let (store, ids) = account_store(&ACCOUNTS);
    let engine = engine(1);

    let first = QueryRequest::new("SELECT a FROM Account a ORDER BY accountid FETCH 3", account());
    let key = engine
        .fetch_page(&first, Box::new(store.begin()))
        .unwrap()
        .offset_key
        .unwrap();

    store.delete(ids[3]).unwrap();

    let second = QueryRequest::new("SELECT a FROM Account a ORDER BY accountid FETCH 2", account()).resume_from(key);
    let page = engine.fetch_page(&second, Box::new(store.begin())).unwrap();
    assert_eq!(accountids(&page, &ids, &ACCOUNTS), vec![4]);
    assert!(page.is_last());
}

#[test]
fn test_resume_after_delete_of_last_row() {
    let (store, ids) = account_store(&ACCOUNTS);
    let engine = engine(1);
    let first = QueryRequest::new("SELECT a FROM Account a ORDER BY accountid FETCH 3", account());
    let key = engine
        .fetch_page(&first, Box::new(store.begin()))
        .unwrap()
        .offset_key
        .unwrap();

    // the anchor row itself is gone; the seek still lands after it
    store.delete(ids[2]).unwrap();
    let page = engine
        .fetch_page(&first.clone().resume_from(key), Box::new(store.begin()))
        .unwrap();
    assert_eq!(accountids(&page, &ids, &ACCOUNTS), vec![3, 4]);
}

#[test]
fn test_key_from_other_plan_shape_is_rejected() {
    let (store, _) = account_store(&ACCOUNTS);
    let engine = engine(1);
    let indexed = QueryRequest::new("SELECT a FROM Account a ORDER BY accountid FETCH 2", account());
    let key = engine
        .fetch_page(&indexed, Box::new(store.begin()))
        .unwrap()
        .offset_key
        .unwrap();

    let full = QueryRequest::new("SELECT a FROM Account a FETCH 2", account()).resume_from(key);
    let err = engine.fetch_page(&full, Box::new(store.begin())).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidOffsetKey(OffsetKeyError::FingerprintMismatch { .. })
    ));
}

#[test]
fn test_corrupt_keys_are_rejected() {
    let (store, _) = account_store(&ACCOUNTS);
    let engine = engine(1);
    let request = QueryRequest::new("SELECT a FROM Account a ORDER BY accountid FETCH 2", account());
    let key = engine
        .fetch_page(&request, Box::new(store.begin()))
        .unwrap()
        .offset_key
        .unwrap();

    let mut bytes = key.clone().into_bytes();
    bytes[0] = 0xff;
    let bad_version = request.clone().resume_from(OffsetKey::from_bytes(bytes));
    assert!(matches!(
        engine.fetch_page(&bad_version, Box::new(store.begin())),
        Err(EngineError::InvalidOffsetKey(OffsetKeyError::UnsupportedVersion(0xff)))
    ));

    let truncated = OffsetKey::from_bytes(&key.as_bytes()[..key.len() - 1]);
    assert!(matches!(
        engine.fetch_page(&request.clone().resume_from(truncated), Box::new(store.begin())),
        Err(EngineError::InvalidOffsetKey(_))
    ));

    // a hex token survives transport unchanged
    let token = key.to_hex_token();
    let carried = OffsetKey::from_hex_token(&format!(" {} ", token.to_uppercase())).unwrap();
    assert_eq!(carried, key);
}

#[test]
fn test_fetch_zero() {
    let (store, _) = account_store(&ACCOUNTS);
    let engine = engine(1);
    let request = QueryRequest::new("SELECT a FROM Account a ORDER BY accountid FETCH 0", account());
    let page = engine.fetch_page(&request, Box::new(store.begin())).unwrap();
    assert!(page.is_empty());
    assert!(page.offset_key.is_none());
}

#[test]
fn test_offset_and_fetch_windows() {
    let (store, ids) = account_store(&ACCOUNTS);
    let engine = engine(1);
    for offset in 0..=6u64 {
        for fetch in 0..=6u64 {
            let text = format!("SELECT a FROM Account a ORDER BY accountid OFFSET {} FETCH {}", offset, fetch);
            let page = engine
                .fetch_page(&QueryRequest::new(text, account()), Box::new(store.begin()))
                .unwrap();
            let start = (offset as usize).min(ACCOUNTS.len());
            let end = (start + fetch as usize).min(ACCOUNTS.len());
            assert_eq!(accountids(&page, &ids, &ACCOUNTS), ACCOUNTS[start..end].to_vec());
            assert_eq!(
                page.offset_key.is_some(),
                fetch > 0 && end < ACCOUNTS.len(),
                "offset {} fetch {}",
                offset,
                fetch
            );
        }
    }
}

#[test]
fn test_unordered_scan_pages_cover_every_row() {
    let (store, ids) = account_store(&[40, 10, 30, 20, 0]);
    let engine = engine(3);
    let mut request = QueryRequest::new("SELECT a FROM Account a FETCH 2", account());
    let mut seen = Vec::new();
    for worker in [0, 2, 1, 0] {
        request = request.on_worker(worker);
        let page = engine.fetch_page(&request, Box::new(store.begin())).unwrap();
        seen.extend(accountids(&page, &ids, &[40, 10, 30, 20, 0]));
        match page.offset_key {
            Some(key) => request = request.resume_from(key),
            None => break,
        }
    }
    assert_eq!(seen, vec![40, 10, 30, 20, 0]);
}

#[test]
fn test_concurrent_first_compile_runs_once() {
    let compiler = Arc::new(CountingCompiler::default());
    let engine = Arc::new(QueryEngine::new(EngineConfig::default(), compiler.clone()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine
                    .get_or_compile("SELECT a FROM Account a ORDER BY accountid", &account(), 0)
                    .unwrap()
            })
        })
        .collect();
    let templates: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(compiler.calls(), 1);
    assert!(templates.iter().all(|t| Arc::ptr_eq(t, &templates[0])));
    let stats = &engine.stats()[0];
    assert_eq!(stats.compiles, 1);
    assert_eq!(stats.hits, 7);
}

#[test]
fn test_invalidate_forces_recompile_with_same_shape() {
    let compiler = Arc::new(CountingCompiler::default());
    let engine = QueryEngine::new(EngineConfig::default().with_workers(2), compiler.clone());
    let text = "SELECT a FROM Account a ORDER BY accountid FETCH 1";
    let before = engine.get_or_compile(text, &account(), 1).unwrap();

    assert_eq!(engine.invalidate(&SchemaChangeScope::Extent("Account".into())), 1);
    let after = engine.get_or_compile(text, &account(), 1).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before.fingerprint(), after.fingerprint());
    assert_eq!(compiler.calls(), 2);
}

#[test]
fn test_compile_errors_surface() {
    let (store, _) = account_store(&ACCOUNTS);
    let engine = engine(1);
    let request = QueryRequest::new("DELETE FROM Account", account());
    assert!(matches!(
        engine.fetch_page(&request, Box::new(store.begin())),
        Err(EngineError::Compile(_))
    ));
    assert_eq!(engine.stats()[0].entries, 0);
}
