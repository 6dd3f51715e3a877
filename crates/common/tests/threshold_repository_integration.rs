#![cfg(feature = "integration-tests")]

mod support;

use common::domain::{DeviceRepository, ThresholdPolicy, ThresholdPolicyRepository};
use common::postgres::{PostgresDeviceRepository, PostgresThresholdPolicyRepository};
use support::{seed_company, setup_test_db};

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_policy_scopes_are_looked_up_independently() {
    let db = setup_test_db().await;
    let repo = PostgresThresholdPolicyRepository::new(db.client.clone());
    let (company_id, user_id, _) = seed_company(&db.client, "key-t").await;

    assert_eq!(repo.get_global_policy().await.unwrap(), None);
    assert_eq!(repo.get_company_policy(company_id).await.unwrap(), None);

    let conn = db.client.get_connection().await.unwrap();
    conn.execute(
        "INSERT INTO threshold_policies (company_id, user_id, voltage_min, voltage_max, power_max)
         VALUES (NULL, NULL, 190, 240, 4000),
                ($1, NULL, 205, 245, 3000),
                ($1, $2, 210, 235, 2500)",
        &[&company_id, &user_id],
    )
    .await
    .unwrap();

    assert_eq!(
        repo.get_global_policy().await.unwrap(),
        Some(ThresholdPolicy::new(190.0, 240.0, 4000.0))
    );
    assert_eq!(
        repo.get_company_policy(company_id).await.unwrap(),
        Some(ThresholdPolicy::new(205.0, 245.0, 3000.0))
    );
    assert_eq!(
        repo.get_user_policy(company_id, user_id).await.unwrap(),
        Some(ThresholdPolicy::new(210.0, 235.0, 2500.0))
    );
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_second_global_policy_is_rejected() {
    let db = setup_test_db().await;
    let conn = db.client.get_connection().await.unwrap();

    conn.execute(
        "INSERT INTO threshold_policies (voltage_min, voltage_max, power_max) VALUES (200, 250, 5000)",
        &[],
    )
    .await
    .unwrap();
    let second = conn
        .execute(
            "INSERT INTO threshold_policies (voltage_min, voltage_max, power_max) VALUES (180, 260, 6000)",
            &[],
        )
        .await;

    assert!(second.is_err());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_device_lookup_by_api_key_requires_active() {
    let db = setup_test_db().await;
    let repo = PostgresDeviceRepository::new(db.client.clone());
    let (company_id, _, device_id) = seed_company(&db.client, "key-dev").await;

    let device = repo.find_active_by_api_key("key-dev").await.unwrap().unwrap();
    assert_eq!(device.id, device_id);
    assert_eq!(device.company_id, company_id);
    assert_eq!(device.name, "Main panel");

    let conn = db.client.get_connection().await.unwrap();
    conn.execute("UPDATE devices SET is_active = false WHERE id = $1", &[&device_id])
        .await
        .unwrap();

    assert!(repo.find_active_by_api_key("key-dev").await.unwrap().is_none());
    // Inactive devices are still resolvable by id for display
    assert!(repo.get_device(device_id).await.unwrap().is_some());
    assert!(repo.find_active_by_api_key("nope").await.unwrap().is_none());
}
