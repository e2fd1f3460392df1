use admissions::domain::admin_log::AdminLogEntry;
use admissions::domain::application::ApplicationRecord;
use admissions::domain::ports::{
    AdminLogStore, AdminLogStoreBox, ApplicationStore, ApplicationStoreBox, Clock, ClockBox,
};
use admissions::domain::profile::ApplicantProfile;
use admissions::infrastructure::clock::SystemClock;
use admissions::infrastructure::in_memory::{InMemoryAdminLogStore, InMemoryApplicationStore};
use serde_json::json;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let application_store: ApplicationStoreBox = Box::new(InMemoryApplicationStore::new());
    let admin_log_store: AdminLogStoreBox = Box::new(InMemoryAdminLogStore::new());
    let clock: ClockBox = Box::new(SystemClock);

    let record = ApplicationRecord::new(
        ApplicantProfile {
            primary_email: "parent@example.com".into(),
            ..Default::default()
        },
        "2025-2026".into(),
        clock.now(),
    );
    let id = record.id;
    let entry = AdminLogEntry::new("UPDATE_APPLICATION", json!({ "application_id": id }), "admin", clock.now());

    // Verify Send + Sync by spawning tasks
    let as_handle = tokio::spawn(async move {
        application_store.insert(record).await.unwrap();
        application_store
            .find_by_email_ignore_case("PARENT@example.com")
            .await
            .unwrap()
            .unwrap()
    });

    let log_handle = tokio::spawn(async move {
        admin_log_store.append(entry).await.unwrap();
        admin_log_store.all().await.unwrap()
    });

    let retrieved = as_handle.await.unwrap();
    assert_eq!(retrieved.id, id);

    let entries = log_handle.await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor, "admin");
}
