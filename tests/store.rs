// tests/store.rs
use chrono::{Duration, TimeZone, Utc};
use weird_news_pipeline::pipeline::run_id_for;
use weird_news_pipeline::store::{FileRunStore, RunStore};
use weird_news_pipeline::{PipelineState, RunReport, RunStatus};

fn report(minute: i64, status: RunStatus) -> RunReport {
    let ts = Utc.with_ymd_and_hms(2026, 10, 4, 6, 0, 0).unwrap() + Duration::minutes(minute);
    RunReport {
        run_id: run_id_for(ts),
        started_at: ts,
        finished_at: ts + Duration::seconds(42),
        status,
        state: PipelineState::Done,
        ranked_items: vec![],
        selected: None,
        artifact: None,
        errors: vec![],
        source_errors: vec![],
    }
}

#[tokio::test]
async fn file_store_round_trips_and_orders_by_run_time() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileRunStore::new(tmp.path().join("runs"));

    let older = report(0, RunStatus::Completed);
    let newer = report(90, RunStatus::Partial);
    // saved out of order on purpose
    store.save(&newer).await.unwrap();
    store.save(&older).await.unwrap();

    let latest = store.latest().await.unwrap().expect("one record");
    assert_eq!(latest, newer);

    let recent = store.recent(5).await.unwrap();
    let ids: Vec<_> = recent.iter().map(|r| r.run_id.clone()).collect();
    assert_eq!(ids, vec![newer.run_id.clone(), older.run_id.clone()]);

    let files = std::fs::read_dir(store.dir()).unwrap().count();
    assert_eq!(files, 2, "one file per run, no temp leftovers");
}

#[tokio::test]
async fn missing_directory_means_no_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileRunStore::new(tmp.path().join("never-created"));
    assert!(store.latest().await.unwrap().is_none());
    assert!(store.recent(3).await.unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_records_are_skipped_by_recent() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileRunStore::new(tmp.path());
    store.save(&report(0, RunStatus::Empty)).await.unwrap();
    std::fs::write(tmp.path().join("00000000T000000.000Z.json"), "{not json").unwrap();

    let recent = store.recent(10).await.unwrap();
    assert_eq!(recent.len(), 1);
}
