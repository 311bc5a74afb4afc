use std::sync::Arc;

use pipehub::blob::ArtifactStore;
use pipehub::catalog::{PluginCatalog, PluginCreate, PluginStatus, PluginVersionCreate, PluginVisibility};
use pipehub::error::HubError;
use pipehub::license::{LicenseCreate, LicenseStore};
use pipehub::update::{BatchCheckItem, UpdateChecker};
use pipehub::Storage;
use tempfile::TempDir;

fn setup() -> (Arc<PluginCatalog>, Arc<LicenseStore>, UpdateChecker, TempDir) {
    let temp = TempDir::new().unwrap();
    let storage = Storage::temporary().unwrap();
    let catalog = Arc::new(PluginCatalog::new(
        storage.clone(),
        ArtifactStore::new(temp.path()).unwrap(),
    ));
    let licenses = Arc::new(LicenseStore::new(storage));
    let checker = UpdateChecker::new(
        Arc::clone(&catalog),
        Arc::clone(&licenses),
        "https://hub.example.com/",
    );
    (catalog, licenses, checker, temp)
}

fn create_plugin(catalog: &PluginCatalog, name: &str, visibility: PluginVisibility) -> u64 {
    catalog
        .create(PluginCreate {
            name: name.to_string(),
            description: None,
            icon: None,
            tags: None,
            status: PluginStatus::Active,
            visibility,
        })
        .unwrap()
        .id
}

fn add_version(catalog: &PluginCatalog, plugin_id: u64, version: &str) {
    catalog
        .add_version(
            plugin_id,
            PluginVersionCreate {
                version: version.to_string(),
                changelog: Some(format!("changes in {}", version)),
                min_app_version: None,
                dependencies: None,
            },
            version.as_bytes(),
        )
        .unwrap();
}

fn item(pipe_id: &str, version: &str) -> BatchCheckItem {
    BatchCheckItem {
        pipe_id: Some(pipe_id.to_string()),
        version: Some(version.to_string()),
    }
}

#[test]
fn outdated_client_gets_an_update() {
    let (catalog, _licenses, checker, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);
    add_version(&catalog, id, "1.0.0");
    add_version(&catalog, id, "1.2.0");

    let info = checker.check_one(id, "1.0.0", None).unwrap();
    assert!(info.has_update);
    assert_eq!(info.current_version, "1.0.0");
    assert_eq!(info.latest_version, "1.2.0");
    assert_eq!(
        info.download_url.as_deref(),
        Some(
            format!(
                "https://hub.example.com/api/v1/plugins/{}/versions/1.2.0/download",
                id
            )
            .as_str()
        )
    );
    assert!(info.latest_file_hash.is_some());
    assert!(info.latest_file_size.is_some());
    assert_eq!(info.changelog.as_deref(), Some("changes in 1.2.0"));
}

#[test]
fn current_client_gets_no_update() {
    let (catalog, _licenses, checker, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);
    add_version(&catalog, id, "1.2.0");

    let info = checker.check_one(id, "1.2.0", None).unwrap();
    assert!(!info.has_update);
    assert_eq!(info.latest_version, "1.2.0");
    assert!(info.download_url.is_none());
    assert!(info.latest_file_hash.is_none());
}

#[test]
fn plugin_without_versions_echoes_current() {
    let (catalog, _licenses, checker, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);

    let info = checker.check_one(id, "0.5.0", None).unwrap();
    assert!(!info.has_update);
    assert_eq!(info.current_version, "0.5.0");
    assert_eq!(info.latest_version, "0.5.0");
}

#[test]
fn private_plugins_require_a_license() {
    let (catalog, licenses, checker, _temp) = setup();
    let id = create_plugin(&catalog, "pro-plugin", PluginVisibility::Private);
    add_version(&catalog, id, "2.0.0");

    assert!(matches!(
        checker.check_one(id, "1.0.0", None),
        Err(HubError::Unauthenticated)
    ));
    assert!(matches!(
        checker.check_one(id, "1.0.0", Some("alice")),
        Err(HubError::PermissionDenied(_))
    ));

    licenses
        .issue(LicenseCreate {
            user_id: "alice".to_string(),
            plugin_id: id,
            expires_at: None,
            machine_id: None,
        })
        .unwrap();
    let info = checker.check_one(id, "1.0.0", Some("alice")).unwrap();
    assert!(info.has_update);
}

#[test]
fn unknown_plugin_is_not_found() {
    let (_catalog, _licenses, checker, _temp) = setup();
    assert!(matches!(
        checker.check_one(424242, "1.0.0", None),
        Err(HubError::PluginNotFound { .. })
    ));
}

#[test]
fn batch_isolates_failures_per_item() {
    let (catalog, _licenses, checker, _temp) = setup();
    let id = create_plugin(&catalog, "scroll-tracker", PluginVisibility::Public);
    add_version(&catalog, id, "1.2.0");

    let items = vec![
        item(&id.to_string(), "1.0.0"),
        item("424242", "1.0.0"),
        item(&id.to_string(), "1.2.0"),
    ];
    let results = checker.check_batch(&items, None);
    assert_eq!(results.len(), 3);

    assert!(results[0].update.as_ref().unwrap().has_update);
    assert!(results[0].error.is_none());

    assert!(results[1].update.is_none());
    assert_eq!(results[1].error.as_deref(), Some("Plugin not found"));
    assert_eq!(results[1].status, Some(404));

    assert!(!results[2].update.as_ref().unwrap().has_update);
}

#[test]
fn batch_flags_malformed_items() {
    let (_catalog, _licenses, checker, _temp) = setup();
    let items = vec![
        BatchCheckItem {
            pipe_id: None,
            version: Some("1.0.0".to_string()),
        },
        BatchCheckItem {
            pipe_id: Some("7".to_string()),
            version: None,
        },
        item("not-a-number", "1.0.0"),
    ];
    let results = checker.check_batch(&items, None);
    assert_eq!(results.len(), 3);

    assert_eq!(results[0].pipe_id, "unknown");
    assert_eq!(results[0].error.as_deref(), Some("Missing pipe_id or version"));
    assert_eq!(results[0].status, Some(400));

    assert_eq!(results[1].pipe_id, "7");
    assert_eq!(results[1].status, Some(400));

    assert_eq!(results[2].error.as_deref(), Some("Invalid plugin id"));
    assert_eq!(results[2].status, Some(400));
}

#[test]
fn batch_enforces_private_access_per_item() {
    let (catalog, _licenses, checker, _temp) = setup();
    let public_id = create_plugin(&catalog, "free-plugin", PluginVisibility::Public);
    let private_id = create_plugin(&catalog, "pro-plugin", PluginVisibility::Private);
    add_version(&catalog, public_id, "1.1.0");
    add_version(&catalog, private_id, "1.1.0");

    let items = vec![
        item(&public_id.to_string(), "1.0.0"),
        item(&private_id.to_string(), "1.0.0"),
    ];

    let anonymous = checker.check_batch(&items, None);
    assert!(anonymous[0].update.as_ref().unwrap().has_update);
    assert_eq!(anonymous[1].error.as_deref(), Some("Authentication required"));
    assert_eq!(anonymous[1].status, Some(401));

    let unlicensed = checker.check_batch(&items, Some("alice"));
    assert_eq!(unlicensed[1].error.as_deref(), Some("Permission denied"));
    assert_eq!(unlicensed[1].status, Some(403));
}
