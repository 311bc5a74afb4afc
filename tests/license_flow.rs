use chrono::{Duration, Utc};
use pipehub::error::HubError;
use pipehub::license::{LicenseCreate, LicenseStatus, LicenseStore, LicenseUpdate};
use pipehub::Storage;

fn store() -> LicenseStore {
    LicenseStore::new(Storage::temporary().unwrap())
}

fn issue(store: &LicenseStore, user: &str, plugin: u64) -> pipehub::license::PluginLicense {
    store
        .issue(LicenseCreate {
            user_id: user.to_string(),
            plugin_id: plugin,
            expires_at: None,
            machine_id: None,
        })
        .unwrap()
}

#[test]
fn issue_and_lookup() {
    let store = store();
    let license = issue(&store, "alice", 1);
    assert_eq!(license.license_key.len(), 32);
    assert_eq!(license.status, LicenseStatus::Active);
    assert!(license.is_active);

    let by_id = store.get(license.id).unwrap();
    assert_eq!(by_id.license_key, license.license_key);

    let by_key = store.get_by_key(&license.license_key).unwrap().unwrap();
    assert_eq!(by_key.id, license.id);

    assert!(store.get_by_key("nope").unwrap().is_none());
    assert!(matches!(store.get(9999), Err(HubError::LicenseNotFound { .. })));
}

#[test]
fn issued_keys_are_unique() {
    let store = store();
    let a = issue(&store, "alice", 1);
    let b = issue(&store, "alice", 1);
    assert_ne!(a.license_key, b.license_key);
}

#[test]
fn verify_accepts_and_stamps_a_valid_license() {
    let store = store();
    let license = issue(&store, "alice", 1);

    let outcome = store.verify(&license.license_key, 1, None).unwrap();
    assert!(outcome.valid);
    assert!(outcome.reason.is_none());

    let stamped = store.get(license.id).unwrap();
    assert!(stamped.last_verified_at.is_some());
}

#[test]
fn verify_rejects_unknown_key_and_wrong_plugin() {
    let store = store();
    let license = issue(&store, "alice", 1);

    let unknown = store.verify("not-a-key", 1, None).unwrap();
    assert!(!unknown.valid);
    assert_eq!(unknown.reason.as_deref(), Some("License not found"));

    let wrong = store.verify(&license.license_key, 2, None).unwrap();
    assert!(!wrong.valid);
    assert_eq!(wrong.reason.as_deref(), Some("License does not match plugin"));
}

#[test]
fn first_verification_binds_the_machine() {
    let store = store();
    let license = issue(&store, "alice", 1);

    let first = store.verify(&license.license_key, 1, Some("machine-a")).unwrap();
    assert!(first.valid);
    assert_eq!(
        store.get(license.id).unwrap().machine_id.as_deref(),
        Some("machine-a")
    );

    // same machine keeps working, another is rejected
    assert!(store.verify(&license.license_key, 1, Some("machine-a")).unwrap().valid);
    let other = store.verify(&license.license_key, 1, Some("machine-b")).unwrap();
    assert!(!other.valid);
    assert_eq!(
        other.reason.as_deref(),
        Some("License is bound to another machine")
    );

    // verification without a machine id does not unbind
    assert!(store.verify(&license.license_key, 1, None).unwrap().valid);
    assert_eq!(
        store.get(license.id).unwrap().machine_id.as_deref(),
        Some("machine-a")
    );
}

#[test]
fn expiry_is_detected_and_persisted() {
    let store = store();
    let license = store
        .issue(LicenseCreate {
            user_id: "alice".to_string(),
            plugin_id: 1,
            expires_at: Some(Utc::now() - Duration::hours(1)),
            machine_id: None,
        })
        .unwrap();

    let outcome = store.verify(&license.license_key, 1, None).unwrap();
    assert!(!outcome.valid);
    assert_eq!(outcome.reason.as_deref(), Some("License has expired"));

    // the transition is written back
    let row = store.get(license.id).unwrap();
    assert_eq!(row.status, LicenseStatus::Expired);
    assert!(!store.has_valid_license("alice", 1).unwrap());

    // subsequent checks report the stored status
    let again = store.verify(&license.license_key, 1, None).unwrap();
    assert_eq!(again.reason.as_deref(), Some("License status is expired"));
}

#[test]
fn revoke_is_idempotent_and_blocks_verification() {
    let store = store();
    let license = issue(&store, "alice", 1);

    assert!(store.revoke(license.id).unwrap());
    assert!(store.revoke(license.id).unwrap());
    assert!(!store.revoke(9999).unwrap());

    let row = store.get(license.id).unwrap();
    assert_eq!(row.status, LicenseStatus::Revoked);
    assert!(!row.is_active);

    let outcome = store.verify(&license.license_key, 1, None).unwrap();
    assert!(!outcome.valid);
    assert_eq!(outcome.reason.as_deref(), Some("License is not active"));
    assert!(!store.has_valid_license("alice", 1).unwrap());
}

#[test]
fn has_valid_license_does_not_match_user_prefixes() {
    let store = store();
    issue(&store, "alice", 1);
    assert!(store.has_valid_license("alice", 1).unwrap());
    assert!(!store.has_valid_license("alice2", 1).unwrap());
    assert!(!store.has_valid_license("alic", 1).unwrap());
    assert!(!store.has_valid_license("alice", 2).unwrap());
}

#[test]
fn listing_and_pagination() {
    let store = store();
    issue(&store, "alice", 1);
    issue(&store, "alice", 2);
    issue(&store, "bob", 1);

    let alice = store.list_for_user("alice", 0, 100).unwrap();
    assert_eq!(alice.len(), 2);
    assert!(alice.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(store.list_for_user("alice", 1, 100).unwrap().len(), 1);

    assert_eq!(store.list_for_plugin(1, 0, 100).unwrap().len(), 2);
    assert_eq!(store.list_for_plugin(2, 0, 100).unwrap().len(), 1);

    let ids = store.licensed_plugin_ids("alice").unwrap();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn update_patches_only_given_fields() {
    let store = store();
    let license = store
        .issue(LicenseCreate {
            user_id: "alice".to_string(),
            plugin_id: 1,
            expires_at: Some(Utc::now() + Duration::days(30)),
            machine_id: Some("machine-a".to_string()),
        })
        .unwrap();

    let updated = store
        .update(
            license.id,
            LicenseUpdate {
                expires_at: Some(None),
                machine_id: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(updated.expires_at.is_none());
    assert!(updated.machine_id.is_none());
    assert!(updated.is_active);

    let deactivated = store
        .update(
            license.id,
            LicenseUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(!deactivated.is_active);
    assert!(deactivated.expires_at.is_none());

    assert!(matches!(
        store.update(9999, LicenseUpdate::default()),
        Err(HubError::LicenseNotFound { .. })
    ));
}

#[test]
fn purchase_protocol_prevents_double_issue() {
    let store = store();

    // first purchase: no license yet, issue one
    assert!(!store.has_valid_license("alice", 1).unwrap());
    issue(&store, "alice", 1);

    // second purchase following protocol stops at the check
    assert!(store.has_valid_license("alice", 1).unwrap());
    assert_eq!(store.list_for_user("alice", 0, 100).unwrap().len(), 1);

    // after revoking, the protocol allows a fresh purchase
    let license = store.list_for_user("alice", 0, 100).unwrap().remove(0);
    store.revoke(license.id).unwrap();
    assert!(!store.has_valid_license("alice", 1).unwrap());
    issue(&store, "alice", 1);
    assert!(store.has_valid_license("alice", 1).unwrap());
}

#[test]
fn empty_user_id_rejected() {
    let store = store();
    let err = store
        .issue(LicenseCreate {
            user_id: "  ".to_string(),
            plugin_id: 1,
            expires_at: None,
            machine_id: None,
        })
        .unwrap_err();
    assert!(matches!(err, HubError::InvalidInput(_)));
}
