use std::sync::Mutex;

use chrono::Utc;
use sled::transaction::TransactionError;

use crate::blob::ArtifactStore;
use crate::error::{HubError, Result};
use crate::license::LicenseStore;
use crate::storage::{self, composite_key, id_key, Storage};
use crate::version::parse_version;

use super::dto::{
    Plugin, PluginCreate, PluginUpdate, PluginVersion, PluginVersionCreate, PluginVisibility,
};

pub struct PluginCatalog {
    storage: Storage,
    artifacts: ArtifactStore,
    // Serializes version uploads so two concurrent latest-flag swaps cannot
    // miss each other's rows
    upload_lock: Mutex<()>,
}

impl PluginCatalog {
    pub fn new(storage: Storage, artifacts: ArtifactStore) -> Self {
        Self {
            storage,
            artifacts,
            upload_lock: Mutex::new(()),
        }
    }

    pub fn create(&self, data: PluginCreate) -> Result<Plugin> {
        let name = data.name.trim().to_string();
        if name.is_empty() {
            return Err(HubError::invalid_input("Plugin name cannot be empty"));
        }

        let id = self.storage.next_id()?;

        // Name uniqueness is enforced by claiming the index entry; a losing
        // concurrent create surfaces as a conflict, never a silent overwrite.
        if !storage::claim_unique(&self.storage.plugin_names, name.as_bytes(), &id_key(id))? {
            return Err(HubError::conflict(format!(
                "Plugin with name '{}' already exists",
                name
            )));
        }

        let now = Utc::now();
        let plugin = Plugin {
            id,
            name,
            description: data.description,
            icon: data.icon,
            tags: data.tags,
            status: data.status,
            visibility: data.visibility,
            downloads_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.storage
            .plugins
            .insert(id_key(id), storage::encode(&plugin)?)?;
        self.storage.flush()?;

        tracing::info!("Created plugin {} '{}'", plugin.id, plugin.name);
        Ok(plugin)
    }

    pub fn get(&self, plugin_id: u64) -> Result<Plugin> {
        self.storage
            .plugins
            .get(id_key(plugin_id))?
            .map(|bytes| storage::decode(&bytes))
            .transpose()?
            .ok_or_else(|| HubError::plugin_not_found(plugin_id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Plugin>> {
        let Some(id_bytes) = self.storage.plugin_names.get(name.as_bytes())? else {
            return Ok(None);
        };
        match self.storage.plugins.get(id_bytes)? {
            Some(bytes) => Ok(Some(storage::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list(&self, skip: usize, limit: usize) -> Result<Vec<Plugin>> {
        let mut plugins = Vec::new();
        for entry in self.storage.plugins.iter().skip(skip).take(limit) {
            let (_, bytes) = entry?;
            plugins.push(storage::decode(&bytes)?);
        }
        Ok(plugins)
    }

    pub fn list_public(&self) -> Result<Vec<Plugin>> {
        let mut plugins = Vec::new();
        for entry in self.storage.plugins.iter() {
            let (_, bytes) = entry?;
            let plugin: Plugin = storage::decode(&bytes)?;
            if plugin.visibility == PluginVisibility::Public {
                plugins.push(plugin);
            }
        }
        Ok(plugins)
    }

    /// Plugins the user holds a usable license for.
    pub fn list_licensed(&self, licenses: &LicenseStore, user_id: &str) -> Result<Vec<Plugin>> {
        let mut plugins = Vec::new();
        for plugin_id in licenses.licensed_plugin_ids(user_id)? {
            // A dangling license (plugin since deleted) is skipped, not an error
            if let Some(bytes) = self.storage.plugins.get(id_key(plugin_id))? {
                plugins.push(storage::decode(&bytes)?);
            }
        }
        Ok(plugins)
    }

    pub fn update(&self, plugin_id: u64, patch: PluginUpdate) -> Result<Plugin> {
        let new_name = match patch.name.as_deref() {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(HubError::invalid_input("Plugin name cannot be empty"));
                }
                Some(name.to_string())
            }
            None => None,
        };

        // Renames claim the new name up front so a duplicate rename loses
        // cleanly at the claim. The claim is released again if the record
        // update cannot complete.
        let mut claimed = false;
        if let Some(ref name) = new_name {
            if storage::claim_unique(
                &self.storage.plugin_names,
                name.as_bytes(),
                &id_key(plugin_id),
            )? {
                claimed = true;
            } else {
                let owned_by_self = matches!(
                    self.storage.plugin_names.get(name.as_bytes())?,
                    Some(holder) if holder.as_ref() == id_key(plugin_id)
                );
                if !owned_by_self {
                    return Err(HubError::conflict(format!(
                        "Plugin with name '{}' already exists",
                        name
                    )));
                }
            }
        }

        let mut previous_name: Option<String> = None;
        let outcome = storage::modify::<Plugin, _>(
            &self.storage.plugins,
            &id_key(plugin_id),
            |current| {
                let mut plugin = current.ok_or_else(|| HubError::plugin_not_found(plugin_id))?;
                previous_name = Some(plugin.name.clone());
                if let Some(ref name) = new_name {
                    plugin.name = name.clone();
                }
                if let Some(ref description) = patch.description {
                    plugin.description = Some(description.clone());
                }
                if let Some(ref icon) = patch.icon {
                    plugin.icon = Some(icon.clone());
                }
                if let Some(ref tags) = patch.tags {
                    plugin.tags = Some(tags.clone());
                }
                if let Some(status) = patch.status {
                    plugin.status = status;
                }
                if let Some(visibility) = patch.visibility {
                    plugin.visibility = visibility;
                }
                plugin.updated_at = Utc::now();
                Ok(Some(plugin))
            },
        );

        let updated = match outcome {
            Ok(updated) => updated,
            Err(err) => {
                self.release_claim(claimed, new_name.as_deref())?;
                return Err(err);
            }
        };
        let Some(plugin) = updated else {
            self.release_claim(claimed, new_name.as_deref())?;
            return Err(HubError::plugin_not_found(plugin_id));
        };

        if claimed {
            if let Some(prev) = previous_name {
                if new_name.as_deref() != Some(prev.as_str()) {
                    self.storage.plugin_names.remove(prev.as_bytes())?;
                }
            }
        }
        Ok(plugin)
    }

    fn release_claim(&self, claimed: bool, name: Option<&str>) -> Result<()> {
        if claimed {
            if let Some(name) = name {
                self.storage.plugin_names.remove(name.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Hard delete, cascading versions, licenses, stats rows, usage logs and
    /// stored artifacts.
    pub fn delete(&self, licenses: &LicenseStore, plugin_id: u64) -> Result<()> {
        let plugin = self.get(plugin_id)?;

        let mut version_count = 0;
        for entry in self.storage.versions.scan_prefix(id_key(plugin_id)) {
            let (key, _) = entry?;
            self.storage.versions.remove(key)?;
            version_count += 1;
        }

        let license_count = licenses.remove_for_plugin(plugin_id)?;

        for entry in self.storage.daily_stats.scan_prefix(id_key(plugin_id)) {
            let (key, _) = entry?;
            self.storage.daily_stats.remove(key)?;
        }

        let mut log_victims = Vec::new();
        for entry in self.storage.usage_logs.iter() {
            let (key, bytes) = entry?;
            let log: serde_json::Value = storage::decode(&bytes)?;
            if log.get("plugin_id").and_then(|v| v.as_u64()) == Some(plugin_id) {
                log_victims.push(key.to_vec());
            }
        }
        for key in log_victims {
            self.storage.usage_logs.remove(key)?;
        }

        self.artifacts.remove_plugin(plugin_id)?;
        self.storage.plugin_names.remove(plugin.name.as_bytes())?;
        self.storage.plugins.remove(id_key(plugin_id))?;
        self.storage.flush()?;

        tracing::info!(
            "Deleted plugin {} '{}' ({} versions, {} licenses)",
            plugin_id,
            plugin.name,
            version_count,
            license_count
        );
        Ok(())
    }

    /// Stores the artifact, creates the version row and marks it latest.
    ///
    /// The newest upload always becomes latest regardless of semantic order
    /// (source-compatible behavior; uploading an old version after a newer
    /// one demotes the newer one).
    pub fn add_version(
        &self,
        plugin_id: u64,
        data: PluginVersionCreate,
        artifact: &[u8],
    ) -> Result<PluginVersion> {
        let plugin = self.get(plugin_id)?;
        parse_version(&data.version)?;

        let _guard = self
            .upload_lock
            .lock()
            .map_err(|_| HubError::internal("Upload lock poisoned"))?;

        if self.version_by_string(plugin_id, &data.version)?.is_some() {
            return Err(HubError::conflict(format!(
                "Version '{}' already exists for plugin {}",
                data.version, plugin_id
            )));
        }

        let stored = self
            .artifacts
            .store(plugin_id, &plugin.name, &data.version, artifact)?;

        let version_id = self.storage.next_id()?;
        let version = PluginVersion {
            id: version_id,
            plugin_id,
            version: data.version.clone(),
            changelog: data.changelog,
            min_app_version: data.min_app_version,
            dependencies: data.dependencies,
            zip_url: format!(
                "/api/v1/plugins/{}/versions/{}/download",
                plugin_id, data.version
            ),
            zip_hash: stored.hash,
            zip_size: stored.size,
            file_name: stored.file_name,
            is_latest: true,
            download_count: 0,
            created_at: Utc::now(),
        };

        // Insert the new row and demote the previous latest in one
        // transaction; readers never observe two flagged rows or none.
        let mut demotions: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for entry in self.storage.versions.scan_prefix(id_key(plugin_id)) {
            let (key, bytes) = entry?;
            let mut row: PluginVersion = storage::decode(&bytes)?;
            if row.is_latest {
                row.is_latest = false;
                demotions.push((key.to_vec(), storage::encode(&row)?));
            }
        }
        let new_key = composite_key(plugin_id, version_id);
        let new_bytes = storage::encode(&version)?;
        self.storage
            .versions
            .transaction(|tx| {
                tx.insert(&new_key, new_bytes.as_slice())?;
                for (key, bytes) in &demotions {
                    tx.insert(key.as_slice(), bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(|err: TransactionError<()>| match err {
                TransactionError::Abort(()) => HubError::internal("Latest-flag swap aborted"),
                TransactionError::Storage(e) => HubError::from(e),
            })?;
        self.storage.flush()?;

        tracing::info!(
            "Added version {} to plugin {} ({} bytes)",
            version.version,
            plugin_id,
            version.zip_size
        );
        Ok(version)
    }

    pub fn versions(&self, plugin_id: u64, skip: usize, limit: usize) -> Result<Vec<PluginVersion>> {
        self.get(plugin_id)?;
        let mut versions = Vec::new();
        for entry in self
            .storage
            .versions
            .scan_prefix(id_key(plugin_id))
            .skip(skip)
            .take(limit)
        {
            let (_, bytes) = entry?;
            versions.push(storage::decode(&bytes)?);
        }
        Ok(versions)
    }

    /// Deletes a version row and its artifact. Deleting the latest version
    /// does not promote another one; the catalog can be left without a
    /// latest version until the next upload.
    pub fn delete_version(&self, plugin_id: u64, version_id: u64) -> Result<()> {
        let key = composite_key(plugin_id, version_id);
        let Some(bytes) = self.storage.versions.get(key)? else {
            return Err(HubError::version_not_found(format!("id {}", version_id)));
        };
        let version: PluginVersion = storage::decode(&bytes)?;
        self.storage.versions.remove(key)?;
        self.artifacts.remove_version(plugin_id, &version.version)?;
        tracing::info!(
            "Deleted version {} of plugin {}",
            version.version,
            plugin_id
        );
        Ok(())
    }

    /// The version flagged is_latest — not necessarily the semantically
    /// highest string.
    pub fn latest_version(&self, plugin_id: u64) -> Result<Option<PluginVersion>> {
        for entry in self.storage.versions.scan_prefix(id_key(plugin_id)) {
            let (_, bytes) = entry?;
            let version: PluginVersion = storage::decode(&bytes)?;
            if version.is_latest {
                return Ok(Some(version));
            }
        }
        Ok(None)
    }

    pub fn version_by_string(
        &self,
        plugin_id: u64,
        version: &str,
    ) -> Result<Option<PluginVersion>> {
        for entry in self.storage.versions.scan_prefix(id_key(plugin_id)) {
            let (_, bytes) = entry?;
            let candidate: PluginVersion = storage::decode(&bytes)?;
            if candidate.version == version {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Best-effort download counters on the plugin and version rows. Failures
    /// are logged and swallowed so they never block a download response.
    pub fn increment_downloads(&self, plugin_id: u64, version_id: u64) {
        if let Err(err) = self.try_increment_downloads(plugin_id, version_id) {
            tracing::warn!(
                "Failed to increment download counters for plugin {} version {}: {}",
                plugin_id,
                version_id,
                err
            );
        }
    }

    fn try_increment_downloads(&self, plugin_id: u64, version_id: u64) -> Result<()> {
        storage::modify::<Plugin, _>(&self.storage.plugins, &id_key(plugin_id), |current| {
            Ok(current.map(|mut plugin| {
                plugin.downloads_count += 1;
                plugin
            }))
        })?;
        storage::modify::<PluginVersion, _>(
            &self.storage.versions,
            &composite_key(plugin_id, version_id),
            |current| {
                Ok(current.map(|mut version| {
                    version.download_count += 1;
                    version
                }))
            },
        )?;
        Ok(())
    }

    /// Reads the stored package by the file name recorded on the version
    /// row, so the artifact stays reachable across plugin renames.
    pub fn artifact_bytes(&self, version: &PluginVersion) -> Result<Vec<u8>> {
        self.artifacts
            .read(version.plugin_id, &version.version, &version.file_name)
    }
}
