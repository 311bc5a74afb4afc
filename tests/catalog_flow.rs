use std::sync::Arc;
use std::thread;

use pipehub::blob::ArtifactStore;
use pipehub::catalog::{PluginCatalog, PluginCreate, PluginStatus, PluginUpdate, PluginVersionCreate, PluginVisibility};
use pipehub::error::HubError;
use pipehub::license::{LicenseCreate, LicenseStore};
use pipehub::Storage;
use tempfile::TempDir;

fn setup() -> (PluginCatalog, LicenseStore, TempDir) {
    let temp = TempDir::new().unwrap();
    let storage = Storage::temporary().unwrap();
    let artifacts = ArtifactStore::new(temp.path()).unwrap();
    let catalog = PluginCatalog::new(storage.clone(), artifacts);
    let licenses = LicenseStore::new(storage);
    (catalog, licenses, temp)
}

fn create_plugin(catalog: &PluginCatalog, name: &str, visibility: PluginVisibility) -> u64 {
    catalog
        .create(PluginCreate {
            name: name.to_string(),
            description: Some("test plugin".to_string()),
            icon: None,
            tags: None,
            status: PluginStatus::Active,
            visibility,
        })
        .unwrap()
        .id
}

fn version_create(version: &str) -> PluginVersionCreate {
    PluginVersionCreate {
        version: version.to_string(),
        changelog: Some(format!("changes in {}", version)),
        min_app_version: None,
        dependencies: None,
    }
}

#[test]
fn create_get_and_list() {
    let (catalog, _licenses, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);

    let plugin = catalog.get(id).unwrap();
    assert_eq!(plugin.name, "scroll-tracker");
    assert_eq!(plugin.downloads_count, 0);

    let by_name = catalog.get_by_name("scroll-tracker").unwrap().unwrap();
    assert_eq!(by_name.id, id);
    assert!(catalog.get_by_name("unknown").unwrap().is_none());

    create_plugin(&catalog, "focus-timer", PluginVisibility::Private);
    assert_eq!(catalog.list(0, 100).unwrap().len(), 2);
    assert_eq!(catalog.list(1, 100).unwrap().len(), 1);
    assert_eq!(catalog.list_public().unwrap().len(), 1);
}

#[test]
fn duplicate_name_is_a_conflict() {
    let (catalog, _licenses, _temp) = setup();
    create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);
    let err = catalog
        .create(PluginCreate {
            name: "scroll-tracker".to_string(),
            description: None,
            icon: None,
            tags: None,
            status: PluginStatus::Active,
            visibility: PluginVisibility::Public,
        })
        .unwrap_err();
    assert!(matches!(err, HubError::Conflict(_)));
}

#[test]
fn rename_releases_the_old_name() {
    let (catalog, _licenses, _temp) = setup();
    let id = create_plugin(&catalog, "old-name", PluginVisibility::Public);

    let updated = catalog
        .update(
            id,
            PluginUpdate {
                name: Some("new-name".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.name, "new-name");

    // the old name is free again
    create_plugin(&catalog, "old-name", PluginVisibility::Public);
    // the new name is taken
    let err = catalog
        .update(
            id,
            PluginUpdate {
                name: Some("old-name".to_string()),
                ..Default::default()
            },
        )
        .map(|_| ());
    assert!(matches!(err, Err(HubError::Conflict(_))));
}

#[test]
fn newest_upload_becomes_latest() {
    let (catalog, _licenses, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);

    let v1 = catalog.add_version(id, version_create("1.0.0"), b"v1").unwrap();
    assert!(v1.is_latest);

    let v2 = catalog.add_version(id, version_create("1.2.0"), b"v2").unwrap();
    assert!(v2.is_latest);

    let latest = catalog.latest_version(id).unwrap().unwrap();
    assert_eq!(latest.version, "1.2.0");

    // exactly one row carries the flag
    let flagged: Vec<_> = catalog
        .versions(id, 0, 100)
        .unwrap()
        .into_iter()
        .filter(|v| v.is_latest)
        .collect();
    assert_eq!(flagged.len(), 1);

    // uploading an older version still takes the flag
    catalog.add_version(id, version_create("0.9.0"), b"v0").unwrap();
    let latest = catalog.latest_version(id).unwrap().unwrap();
    assert_eq!(latest.version, "0.9.0");
}

#[test]
fn duplicate_and_malformed_versions_rejected() {
    let (catalog, _licenses, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);
    catalog.add_version(id, version_create("1.0.0"), b"v1").unwrap();

    let dup = catalog.add_version(id, version_create("1.0.0"), b"again");
    assert!(matches!(dup, Err(HubError::Conflict(_))));

    let bad = catalog.add_version(id, version_create("1.0.x"), b"bad");
    assert!(matches!(bad, Err(HubError::InvalidInput(_))));
}

#[test]
fn deleting_latest_does_not_promote_another() {
    let (catalog, _licenses, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);
    catalog.add_version(id, version_create("1.0.0"), b"v1").unwrap();
    let v2 = catalog.add_version(id, version_create("1.1.0"), b"v2").unwrap();

    catalog.delete_version(id, v2.id).unwrap();
    assert!(catalog.latest_version(id).unwrap().is_none());
    assert_eq!(catalog.versions(id, 0, 100).unwrap().len(), 1);
}

#[test]
fn delete_cascades_versions_and_licenses() {
    let (catalog, licenses, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Private);
    catalog.add_version(id, version_create("1.0.0"), b"v1").unwrap();
    licenses
        .issue(LicenseCreate {
            user_id: "alice".to_string(),
            plugin_id: id,
            expires_at: None,
            machine_id: None,
        })
        .unwrap();
    assert!(licenses.has_valid_license("alice", id).unwrap());

    catalog.delete(&licenses, id).unwrap();

    assert!(matches!(catalog.get(id), Err(HubError::PluginNotFound { .. })));
    assert!(!licenses.has_valid_license("alice", id).unwrap());
    assert!(licenses.list_for_user("alice", 0, 100).unwrap().is_empty());

    // the name is free again
    create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);
}

#[test]
fn download_counters_increment_on_both_rows() {
    let (catalog, _licenses, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);
    let version = catalog.add_version(id, version_create("1.0.0"), b"v1").unwrap();

    catalog.increment_downloads(id, version.id);
    catalog.increment_downloads(id, version.id);

    assert_eq!(catalog.get(id).unwrap().downloads_count, 2);
    let row = catalog.version_by_string(id, "1.0.0").unwrap().unwrap();
    assert_eq!(row.download_count, 2);
}

#[test]
fn artifact_roundtrip_with_hash() {
    let (catalog, _licenses, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);
    let bytes = b"PK\x03\x04payload";
    let version = catalog.add_version(id, version_create("1.0.0"), bytes).unwrap();

    assert_eq!(version.zip_hash, blake3::hash(bytes).to_hex().to_string());
    assert_eq!(version.zip_size, bytes.len() as u64);
    assert_eq!(version.file_name, "scroll-tracker_1.0.0.zip");

    assert_eq!(catalog.artifact_bytes(&version).unwrap(), bytes);
}

#[test]
fn download_survives_plugin_rename() {
    let (catalog, _licenses, _temp) = setup();
    let id = create_plugin(&catalog, "old-name", PluginVisibility::Public);
    let bytes = b"PK\x03\x04payload";
    catalog.add_version(id, version_create("1.0.0"), bytes).unwrap();

    catalog
        .update(
            id,
            PluginUpdate {
                name: Some("new-name".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    let row = catalog.version_by_string(id, "1.0.0").unwrap().unwrap();
    assert_eq!(row.file_name, "old-name_1.0.0.zip");
    assert_eq!(catalog.artifact_bytes(&row).unwrap(), bytes);
}

#[test]
fn concurrent_uploads_leave_exactly_one_latest() {
    let (catalog, _licenses, _temp) = setup();
    let catalog = Arc::new(catalog);
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);

    for round in 0u64..10 {
        let first = Arc::clone(&catalog);
        let second = Arc::clone(&catalog);
        let version_a = format!("{}.0.0", 2 * round + 1);
        let version_b = format!("{}.0.0", 2 * round + 2);
        let a = thread::spawn(move || first.add_version(id, version_create(&version_a), b"a"));
        let b = thread::spawn(move || second.add_version(id, version_create(&version_b), b"b"));
        a.join().unwrap().unwrap();
        b.join().unwrap().unwrap();

        let flagged = catalog
            .versions(id, 0, 1000)
            .unwrap()
            .into_iter()
            .filter(|v| v.is_latest)
            .count();
        assert_eq!(flagged, 1);
    }
}
