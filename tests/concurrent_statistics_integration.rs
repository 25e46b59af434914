//! Concurrent statistics requests against one shared engine
//!
//! Dashboards issue one request per statistic card at the same time. Results
//! must not depend on what else is running.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tally::models::{Dimension, EventRecord, ScopeId};
use tally::statistics::{
    LabelTable, ReferrerKind, Sorting, Statistic, StatisticsEngine, StatisticsRequest, TimeRange,
};
use tally::storage::{MemoryStore, RecordStore};

async fn seeded_store() -> Arc<dyn RecordStore> {
    let store = Arc::new(MemoryStore::new());
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
    let languages = ["en", "de", "fr", "en", "es"];
    let pages = ["/", "/pricing", "/blog", "/"];
    let referrers = [Some("https://news.example"), None, Some("https://search.example")];

    for i in 0..200i64 {
        let mut record = EventRecord::new("site", now - Duration::minutes(i * 37))
            .with(Dimension::Language, languages[(i % 5) as usize])
            .with(Dimension::Page, pages[(i % 4) as usize]);
        if let Some(referrer) = referrers[(i % 3) as usize] {
            record = record.with(Dimension::Referrer, referrer);
        }
        if i % 10 == 0 {
            record = record.with(Dimension::Source, "newsletter");
        }
        store.insert(&record).await.unwrap();
    }

    store
}

fn requests() -> Vec<StatisticsRequest> {
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
    let statistics = [
        Statistic::Languages,
        Statistic::Pages,
        Statistic::Referrers(ReferrerKind::WithSource),
        Statistic::Referrers(ReferrerKind::NoSource),
    ];
    let sortings = [Sorting::Top, Sorting::New, Sorting::Recent];

    let mut requests = Vec::new();
    for statistic in statistics {
        for sorting in sortings {
            requests.push(
                StatisticsRequest::new(vec![ScopeId::new("site")], statistic, sorting)
                    .with_range(TimeRange::Last30Days)
                    .with_limit(15)
                    .at(now),
            );
        }
    }
    requests
}

#[tokio::test]
async fn test_concurrent_requests_match_sequential_results() {
    let store = seeded_store().await;
    let engine = Arc::new(StatisticsEngine::new(
        Arc::clone(&store),
        Arc::new(LabelTable::languages()),
    ));

    let mut expected = Vec::new();
    for request in requests() {
        expected.push(engine.get_statistics(&request).await.unwrap());
    }

    let mut handles = vec![];
    for round in 0..5 {
        for (index, request) in requests().into_iter().enumerate() {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let entries = engine.get_statistics(&request).await.unwrap();
                (round, index, entries)
            }));
        }
    }

    for handle in handles {
        let (round, index, entries) = handle.await.unwrap();
        assert_eq!(
            entries, expected[index],
            "round {} request {} diverged from sequential result",
            round, index
        );
    }
}

#[tokio::test]
async fn test_concurrent_requests_with_cache() {
    let store = seeded_store().await;
    let engine = Arc::new(
        StatisticsEngine::new(store, Arc::new(LabelTable::languages()))
            .with_cache(1_000, StdDuration::from_secs(60)),
    );

    let mut handles = vec![];
    for _ in 0..10 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let request = requests().remove(0);
            engine.get_statistics(&request).await.unwrap()
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert!(!results[0].is_empty());
    assert!(results.iter().all(|entries| entries == &results[0]));
    assert!(results[0].len() <= 15);
}

#[tokio::test]
async fn test_referrers_prefer_source() {
    let store = seeded_store().await;
    let engine = StatisticsEngine::new(store, Arc::new(LabelTable::languages()));

    let request = requests()
        .into_iter()
        .find(|request| {
            request.statistic == Statistic::Referrers(ReferrerKind::WithSource)
                && request.sorting == Sorting::Top
        })
        .unwrap();
    let entries = engine.get_statistics(&request).await.unwrap();

    assert!(entries.iter().any(|entry| entry.value == "newsletter"));
    // Source and referrer combinations stay separate even when they render the same
    let newsletter = entries.iter().filter(|entry| entry.value == "newsletter").count();
    assert!(newsletter > 1);
    let ids: std::collections::HashSet<_> = entries.iter().map(|entry| &entry.id).collect();
    assert_eq!(ids.len(), entries.len());
}
