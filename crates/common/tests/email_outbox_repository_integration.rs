#![cfg(feature = "integration-tests")]

mod support;

use common::domain::{
    DomainError, EmailOutboxRepository, JobStatus, NewEmailJob, DEFAULT_MAX_RETRIES,
};
use common::postgres::PostgresEmailOutboxRepository;
use std::collections::HashSet;
use std::time::Duration;
use support::setup_test_db;

fn new_job(n: usize) -> NewEmailJob {
    NewEmailJob {
        to_email: format!("user{n}@example.com"),
        subject: format!("Subject {n}"),
        html: "<p>hi</p>".to_string(),
        max_retries: DEFAULT_MAX_RETRIES,
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_enqueue_starts_pending() {
    let db = setup_test_db().await;
    let repo = PostgresEmailOutboxRepository::new(db.client.clone());

    let job = repo.enqueue(new_job(1)).await.unwrap();

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 0);
    assert_eq!(job.max_retries, 3);
    assert!(job.processed_at.is_none());
    assert!(job.sent_at.is_none());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_claim_batch_is_oldest_first_and_bounded() {
    let db = setup_test_db().await;
    let repo = PostgresEmailOutboxRepository::new(db.client.clone());

    let mut ids = Vec::new();
    for n in 0..5 {
        ids.push(repo.enqueue(new_job(n)).await.unwrap().id);
    }

    let claimed = repo.claim_batch(3).await.unwrap();

    assert_eq!(claimed.iter().map(|j| j.id).collect::<Vec<_>>(), ids[..3]);
    assert!(claimed
        .iter()
        .all(|j| j.status == JobStatus::Processing && j.processed_at.is_some()));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_concurrent_claims_never_overlap() {
    let db = setup_test_db().await;
    let repo = PostgresEmailOutboxRepository::new(db.client.clone());

    for n in 0..20 {
        repo.enqueue(new_job(n)).await.unwrap();
    }

    let first = repo.clone();
    let second = repo.clone();
    let (a, b) = futures::join!(first.claim_batch(10), second.claim_batch(10));
    let (a, b) = (a.unwrap(), b.unwrap());

    let a_ids: HashSet<i64> = a.iter().map(|j| j.id).collect();
    let b_ids: HashSet<i64> = b.iter().map(|j| j.id).collect();
    assert!(a_ids.is_disjoint(&b_ids));

    // Whatever either claimer skipped is still claimable exactly once
    let rest: HashSet<i64> = repo
        .claim_batch(20)
        .await
        .unwrap()
        .iter()
        .map(|j| j.id)
        .collect();
    assert!(rest.is_disjoint(&a_ids) && rest.is_disjoint(&b_ids));
    assert_eq!(a_ids.len() + b_ids.len() + rest.len(), 20);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_sent_job_is_never_claimed_again() {
    let db = setup_test_db().await;
    let repo = PostgresEmailOutboxRepository::new(db.client.clone());

    let job = repo.enqueue(new_job(1)).await.unwrap();
    let claimed = repo.claim_batch(10).await.unwrap();
    assert_eq!(claimed.len(), 1);

    repo.mark_sent(job.id).await.unwrap();

    assert!(repo.claim_batch(10).await.unwrap().is_empty());
    // A second completion attempt finds no claim to complete
    let err = repo.mark_sent(job.id).await.unwrap_err();
    assert!(matches!(err, DomainError::JobNotClaimed(id) if id == job.id));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_failures_retry_then_become_terminal() {
    let db = setup_test_db().await;
    let repo = PostgresEmailOutboxRepository::new(db.client.clone());

    repo.enqueue(new_job(1)).await.unwrap();

    for attempt in 1..=3 {
        let mut claimed = repo.claim_batch(10).await.unwrap();
        assert_eq!(claimed.len(), 1, "attempt {attempt} should claim the job");
        let job = claimed.remove(0);
        let outcome = job.failure_outcome(format!("smtp down #{attempt}"));
        repo.record_failure(job.id, outcome).await.unwrap();
    }

    assert!(repo.claim_batch(10).await.unwrap().is_empty());

    let conn = db.client.get_connection().await.unwrap();
    let row = conn
        .query_one(
            "SELECT status, retry_count, last_error FROM email_queue",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<_, String>(0), "failed");
    assert_eq!(row.get::<_, i32>(1), 3);
    assert_eq!(row.get::<_, Option<String>>(2).as_deref(), Some("smtp down #3"));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_retry_clears_processed_at() {
    let db = setup_test_db().await;
    let repo = PostgresEmailOutboxRepository::new(db.client.clone());

    repo.enqueue(new_job(1)).await.unwrap();
    let job = repo.claim_batch(1).await.unwrap().remove(0);
    repo.record_failure(job.id, job.failure_outcome("timeout"))
        .await
        .unwrap();

    let job = repo.claim_batch(1).await.unwrap().remove(0);
    assert_eq!(job.retry_count, 1);
    assert_eq!(job.last_error.as_deref(), Some("timeout"));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_release_stale_returns_abandoned_claims() {
    let db = setup_test_db().await;
    let repo = PostgresEmailOutboxRepository::new(db.client.clone());

    let job = repo.enqueue(new_job(1)).await.unwrap();
    repo.claim_batch(1).await.unwrap();

    // Fresh claims stay put
    assert_eq!(repo.release_stale(Duration::from_secs(300)).await.unwrap(), 0);

    let conn = db.client.get_connection().await.unwrap();
    conn.execute(
        "UPDATE email_queue SET processed_at = NOW() - INTERVAL '10 minutes' WHERE id = $1",
        &[&job.id],
    )
    .await
    .unwrap();

    assert_eq!(repo.release_stale(Duration::from_secs(300)).await.unwrap(), 1);

    let reclaimed = repo.claim_batch(1).await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].retry_count, 0);
    assert_eq!(reclaimed[0].last_error.as_deref(), Some("claim expired"));
}
