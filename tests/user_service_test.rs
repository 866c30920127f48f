use ehr_directory::audit::{AuditAction, AuditEvent, AuditLogger, AuditResult, MemoryAuditSink};
use ehr_directory::directory::{DirectoryError, MemoryDirectory};
use ehr_directory::models::{User, UserType, sample_users};
use ehr_directory::service::{ServiceError, UserService};
use std::sync::Arc;
use std::time::Duration;

fn user(id: &str, username: &str) -> User {
    User {
        id: id.to_string(),
        display_name: format!("Name {}", id),
        date_of_birth: "1990-01-01".to_string(),
        address: format!("{} Test Lane", id),
        age: 30,
        user_type: UserType::Patient,
        gender: "F".to_string(),
        contact_info: "555-0000".to_string(),
        username: username.to_string(),
        credential_secret: "secret".to_string(),
    }
}

fn durable_service(users: Vec<User>) -> (UserService, Arc<MemoryAuditSink>) {
    let directory = Arc::new(MemoryDirectory::with_users(users).unwrap());
    let sink = Arc::new(MemoryAuditSink::new());
    let audit = AuditLogger::durable(sink.clone(), Duration::from_secs(1)).unwrap();
    (UserService::new(directory, audit), sink)
}

fn successes(events: &[AuditEvent], action: AuditAction) -> usize {
    events
        .iter()
        .filter(|e| e.action() == action && e.result() == AuditResult::Success)
        .count()
}

/// Test that an added record reads back unchanged and a second add is rejected
#[tokio::test]
async fn test_add_then_get_and_duplicate() {
    let (service, sink) = durable_service(vec![]);

    let added = service
        .add_user(user("P-1", "pat"), "ADMIN-001", "intake")
        .await
        .unwrap();
    let fetched = service.get_user("P-1", "DOCTOR-001").await.unwrap();
    assert_eq!(added, fetched);

    let duplicate = service
        .add_user(user("P-1", "other"), "ADMIN-001", "intake")
        .await;
    assert_eq!(
        duplicate,
        Err(ServiceError::Validation(DirectoryError::AlreadyExists(
            "P-1".to_string()
        )))
    );

    let events = sink.events().await;
    assert_eq!(events.len(), 3);
    assert_eq!(successes(&events, AuditAction::Add), 1);
    assert_eq!(events[0].event_type(), "USER_ADD");
    assert_eq!(events[0].resource(), "user/P-1");
    assert_eq!(events[0].message(), "Added user: Name P-1");
    assert_eq!(events[0].details()["reason"], "intake");
    assert_eq!(events[0].details()["added_user_type"], "PATIENT");
    assert_eq!(events[2].result(), AuditResult::Failure);
    assert_eq!(events[2].message(), "User already exists: P-1");
}

/// Test that a taken username is rejected under a fresh id
#[tokio::test]
async fn test_add_rejects_taken_username() {
    let (service, sink) = durable_service(sample_users());

    let result = service
        .add_user(user("P-9", "johndoe"), "ADMIN-001", "intake")
        .await;
    assert_eq!(
        result,
        Err(ServiceError::Validation(DirectoryError::UsernameTaken(
            "johndoe".to_string()
        )))
    );

    let events = sink.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].result(), AuditResult::Failure);
    assert_eq!(events[0].resource(), "user/P-9");
}

/// Test that an empty id is replaced with a generated, type-prefixed one
#[tokio::test]
async fn test_add_generates_id() {
    let (service, _sink) = durable_service(vec![]);

    let mut doctor = user("", "drwho");
    doctor.user_type = UserType::Doctor;
    let added = service.add_user(doctor, "ADMIN-001", "hire").await.unwrap();

    assert!(added.id.starts_with("DOCTOR-"));
    assert!(service.get_user(&added.id, "ADMIN-001").await.is_ok());
}

/// Test that removing an absent id fails without a success event
#[tokio::test]
async fn test_remove_missing_user() {
    let (service, sink) = durable_service(vec![]);

    let result = service.remove_user("P-404", "ADMIN-001", "cleanup").await;
    assert_eq!(
        result,
        Err(ServiceError::Validation(DirectoryError::NotFound(
            "P-404".to_string()
        )))
    );

    let events = sink.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(successes(&events, AuditAction::Remove), 0);
    assert_eq!(events[0].result(), AuditResult::Failure);
    assert_eq!(events[0].message(), "User not found: P-404");
}

/// Test the full remove flow produces exactly one success event on the record
#[tokio::test]
async fn test_remove_end_to_end() {
    let (service, sink) = durable_service(vec![user("P-1", "pat")]);

    let removed = service.remove_user("P-1", "admin", "test").await.unwrap();
    assert_eq!(removed.id, "P-1");
    assert!(service.get_user("P-1", "admin").await.is_err());

    let events = sink.events().await;
    let remove_events: Vec<&AuditEvent> = events
        .iter()
        .filter(|e| e.action() == AuditAction::Remove)
        .collect();
    assert_eq!(remove_events.len(), 1);

    let event = remove_events[0];
    assert_eq!(event.result(), AuditResult::Success);
    assert_eq!(event.resource(), "user/P-1");
    assert_eq!(event.acting_user_id(), "admin");
    assert_eq!(event.event_type(), "USER_REMOVE");
    assert_eq!(event.details()["reason"], "test");
    assert_eq!(event.details()["removed_user_type"], "PATIENT");
    assert_eq!(event.application_name(), "EHRViewer");
    assert_eq!(event.component_name(), "UserService");
    assert!(!event.correlation_id().is_empty());
}

/// Test listing returns every record and audits the count
#[tokio::test]
async fn test_list_users() {
    let (service, sink) = durable_service(sample_users());

    let users = service.list_users("ADMIN-001").await.unwrap();
    assert_eq!(users.len(), 4);
    assert!(users.contains_key("NURSE-001"));

    let events = sink.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type(), "USER_VIEW_ALL");
    assert_eq!(events[0].resource(), "user");
    assert_eq!(events[0].details()["record_count"], 4);
    assert_eq!(events[0].message(), "User ADMIN-001 viewed all users");
}

/// Test authentication against the seeded identities
#[tokio::test]
async fn test_authenticate() {
    let (service, sink) = durable_service(sample_users());

    let user = service
        .authenticate("johndoe", "password1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.id, "PATIENT-001");

    let miss = service.authenticate("johndoe", "wrong").await.unwrap();
    assert!(miss.is_none());

    let events = sink.events().await;
    assert_eq!(events.len(), 2);

    assert_eq!(events[0].event_type(), "USER_LOGIN");
    assert_eq!(events[0].result(), AuditResult::Success);
    assert_eq!(events[0].acting_user_id(), "PATIENT-001");
    assert_eq!(events[0].resource(), "user/PATIENT-001");

    assert_eq!(events[1].result(), AuditResult::Failure);
    assert_eq!(events[1].resource(), "user/unknown");
    assert_eq!(events[1].acting_user_id(), "unknown");
    assert_eq!(
        events[1].message(),
        "Failed login attempt for username: johndoe"
    );
}

/// Test logout by record and by username
#[tokio::test]
async fn test_logout() {
    let (service, sink) = durable_service(sample_users());

    let nurse = service
        .authenticate("nursebob", "password3")
        .await
        .unwrap()
        .unwrap();
    service.logout(&nurse).await.unwrap();

    let admin = service.logout_username("adminjane").await.unwrap();
    assert_eq!(admin.id, "ADMIN-001");

    let missing = service.logout_username("ghost").await;
    assert!(missing.as_ref().is_err_and(ServiceError::is_validation));

    let events = sink.events().await;
    assert_eq!(events.len(), 4);
    assert_eq!(events[1].event_type(), "USER_LOGOUT");
    assert_eq!(events[1].acting_user_id(), "NURSE-001");
    assert_eq!(events[1].message(), "User nursebob logged out successfully");
    assert_eq!(events[2].acting_user_id(), "ADMIN-001");
    assert_eq!(events[3].result(), AuditResult::Failure);
    assert_eq!(events[3].resource(), "user/unknown");
}

/// Test that every audited call releases its context, including failures
#[tokio::test]
async fn test_contexts_released_after_errors() {
    let (service, _sink) = durable_service(vec![]);

    let _ = service.get_user("missing", "ADMIN-001").await;
    let _ = service.remove_user("missing", "ADMIN-001", "x").await;
    let _ = service.authenticate("nobody", "nothing").await;
    let _ = service.logout_username("nobody").await;

    assert_eq!(service.audit().active_contexts(), 0);
}

/// Test each audited call gets its own correlation id
#[tokio::test]
async fn test_correlation_ids_are_unique() {
    let (service, sink) = durable_service(sample_users());

    for _ in 0..5 {
        service.get_user("PATIENT-001", "DOCTOR-001").await.unwrap();
    }

    let events = sink.events().await;
    let mut ids: Vec<&str> = events.iter().map(|e| e.correlation_id()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

/// Test concurrent adds of one id admit exactly one winner
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_same_id() {
    let (service, sink) = durable_service(vec![]);
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for i in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .add_user(user("P-1", &format!("user{}", i)), "ADMIN-001", "race")
                .await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => assert_eq!(
                e,
                ServiceError::Validation(DirectoryError::AlreadyExists("P-1".to_string()))
            ),
        }
    }
    assert_eq!(wins, 1);

    let events = sink.events().await;
    assert_eq!(events.len(), 16);
    assert_eq!(successes(&events, AuditAction::Add), 1);
    assert_eq!(service.audit().active_contexts(), 0);
}

/// Test listings taken during concurrent adds never show partial records
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_list_during_concurrent_adds() {
    let (service, _sink) = durable_service(vec![]);
    let service = Arc::new(service);

    let writer = {
        let service = service.clone();
        tokio::spawn(async move {
            for i in 0..100 {
                let id = format!("P-{}", i);
                service
                    .add_user(user(&id, &format!("u{}", i)), "ADMIN-001", "bulk")
                    .await
                    .unwrap();
            }
        })
    };

    let mut previous = 0;
    for _ in 0..20 {
        let users = service.list_users("ADMIN-001").await.unwrap();
        assert!(users.len() >= previous);
        previous = users.len();

        for (id, record) in &users {
            assert_eq!(&record.id, id);
            assert_eq!(record.display_name, format!("Name {}", id));
            assert_eq!(record.address, format!("{} Test Lane", id));
        }
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
    assert_eq!(service.list_users("ADMIN-001").await.unwrap().len(), 100);
}
