#![cfg(feature = "integration-tests")]

mod support;

use chrono::{Duration, Utc};
use common::domain::{AlertRepository, AlertType, DomainError, NewAlert, RecentAlertQuery};
use common::postgres::PostgresAlertRepository;
use support::{seed_company, setup_test_db};

fn candidate(company_id: i64, device_id: i64, alert_type: AlertType) -> NewAlert {
    NewAlert {
        company_id,
        device_id: Some(device_id),
        alert_type,
        message: "Voltage exceeds maximum threshold (250V). Current value: 254.32V".to_string(),
        value: "254.32V".to_string(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_insert_then_exists_since() {
    let db = setup_test_db().await;
    let repo = PostgresAlertRepository::new(db.client.clone());
    let (company_id, _, device_id) = seed_company(&db.client, "key-a").await;
    let since = Utc::now() - Duration::seconds(20);

    let written = repo
        .insert_alerts(vec![candidate(company_id, device_id, AlertType::OverVoltage)], since)
        .await
        .unwrap();
    assert_eq!(written.len(), 1);
    assert!(!written[0].delivered);

    let query = RecentAlertQuery {
        alert_type: AlertType::OverVoltage,
        device_id: Some(device_id),
        company_id,
        since,
    };
    assert!(repo.exists_since(query.clone()).await.unwrap());

    let other_type = RecentAlertQuery {
        alert_type: AlertType::OverPower,
        ..query
    };
    assert!(!repo.exists_since(other_type).await.unwrap());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_insert_skips_duplicate_inside_window() {
    let db = setup_test_db().await;
    let repo = PostgresAlertRepository::new(db.client.clone());
    let (company_id, _, device_id) = seed_company(&db.client, "key-b").await;
    let since = Utc::now() - Duration::seconds(20);

    repo.insert_alerts(vec![candidate(company_id, device_id, AlertType::OverVoltage)], since)
        .await
        .unwrap();
    let second = repo
        .insert_alerts(
            vec![
                candidate(company_id, device_id, AlertType::OverVoltage),
                candidate(company_id, device_id, AlertType::OverPower),
            ],
            since,
        )
        .await
        .unwrap();

    assert_eq!(second.len(), 1);
    assert_eq!(second[0].alert_type, AlertType::OverPower);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_concurrent_inserts_write_one_alert() {
    let db = setup_test_db().await;
    let repo = PostgresAlertRepository::new(db.client.clone());
    let (company_id, _, device_id) = seed_company(&db.client, "key-c").await;
    let since = Utc::now() - Duration::seconds(20);

    let (a, b) = futures::join!(
        repo.insert_alerts(vec![candidate(company_id, device_id, AlertType::OverVoltage)], since),
        repo.insert_alerts(vec![candidate(company_id, device_id, AlertType::OverVoltage)], since),
    );

    assert_eq!(a.unwrap().len() + b.unwrap().len(), 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_undelivered_listing_and_marking() {
    let db = setup_test_db().await;
    let repo = PostgresAlertRepository::new(db.client.clone());
    let (company_id, _, device_id) = seed_company(&db.client, "key-d").await;
    let since = Utc::now() - Duration::seconds(20);

    let mut older = candidate(company_id, device_id, AlertType::UnderVoltage);
    older.created_at = Utc::now() - Duration::minutes(5);
    repo.insert_alerts(
        vec![older, candidate(company_id, device_id, AlertType::OverPower)],
        since,
    )
    .await
    .unwrap();

    let pending = repo.list_undelivered(10).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].alert_type, AlertType::UnderVoltage);

    repo.mark_delivered(pending[0].id).await.unwrap();

    let pending = repo.list_undelivered(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].alert_type, AlertType::OverPower);

    let err = repo.mark_delivered(999_999).await.unwrap_err();
    assert!(matches!(err, DomainError::AlertNotFound(999_999)));
}
