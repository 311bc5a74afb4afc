use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

use crate::error::{HubError, Result};
use crate::storage::{self, id_key, Storage};

use super::dto::{LicenseCreate, LicenseStatus, LicenseUpdate, PluginLicense, VerifyOutcome};

const LICENSE_KEY_LEN: usize = 32;

pub struct LicenseStore {
    storage: Storage,
}

impl LicenseStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// 32 alphanumeric characters from the OS RNG, just under 191 bits of
    /// entropy.
    fn generate_license_key() -> String {
        OsRng
            .sample_iter(&Alphanumeric)
            .take(LICENSE_KEY_LEN)
            .map(char::from)
            .collect()
    }

    /// Issues a new license. Callers gating purchases must check
    /// `has_valid_license` first; issuance itself is not idempotent.
    pub fn issue(&self, data: LicenseCreate) -> Result<PluginLicense> {
        if data.user_id.trim().is_empty() {
            return Err(HubError::invalid_input("user_id cannot be empty"));
        }

        let id = self.storage.next_id()?;

        // Claim the key in the unique index before writing the record. A
        // colliding key (vanishingly rare) just means we roll a new one.
        let license_key = loop {
            let candidate = Self::generate_license_key();
            if storage::claim_unique(
                &self.storage.license_keys,
                candidate.as_bytes(),
                &id_key(id),
            )? {
                break candidate;
            }
            tracing::warn!("License key collision, regenerating");
        };

        let license = PluginLicense {
            id,
            user_id: data.user_id,
            plugin_id: data.plugin_id,
            license_key,
            issued_at: Utc::now(),
            expires_at: data.expires_at,
            is_active: true,
            status: LicenseStatus::Active,
            machine_id: data.machine_id,
            last_verified_at: None,
        };

        self.storage
            .licenses
            .insert(id_key(id), storage::encode(&license)?)?;
        self.storage.license_index.insert(
            index_key(&license.user_id, license.plugin_id, license.id),
            Vec::<u8>::new(),
        )?;
        self.storage.flush()?;

        tracing::info!(
            "Issued license {} for user {} on plugin {}",
            license.id,
            license.user_id,
            license.plugin_id
        );
        Ok(license)
    }

    pub fn get(&self, license_id: u64) -> Result<PluginLicense> {
        self.storage
            .licenses
            .get(id_key(license_id))?
            .map(|bytes| storage::decode(&bytes))
            .transpose()?
            .ok_or_else(|| HubError::license_not_found(license_id))
    }

    pub fn get_by_key(&self, license_key: &str) -> Result<Option<PluginLicense>> {
        let Some(id_bytes) = self.storage.license_keys.get(license_key.as_bytes())? else {
            return Ok(None);
        };
        let id = decode_id(&id_bytes)?;
        match self.storage.licenses.get(id_key(id))? {
            Some(bytes) => Ok(Some(storage::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_for_user(
        &self,
        user_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PluginLicense>> {
        let mut licenses = Vec::new();
        for entry in self.storage.license_index.scan_prefix(user_prefix(user_id)) {
            let (key, _) = entry?;
            let license_id = license_id_from_index(&key)?;
            licenses.push(self.get(license_id)?);
        }
        licenses.sort_by_key(|l| l.id);
        Ok(licenses.into_iter().skip(skip).take(limit).collect())
    }

    pub fn list_for_plugin(
        &self,
        plugin_id: u64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PluginLicense>> {
        let mut licenses = Vec::new();
        for entry in self.storage.licenses.iter() {
            let (_, bytes) = entry?;
            let license: PluginLicense = storage::decode(&bytes)?;
            if license.plugin_id == plugin_id {
                licenses.push(license);
            }
        }
        Ok(licenses.into_iter().skip(skip).take(limit).collect())
    }

    pub fn update(&self, license_id: u64, patch: LicenseUpdate) -> Result<PluginLicense> {
        let updated = storage::modify::<PluginLicense, _>(
            &self.storage.licenses,
            &id_key(license_id),
            |current| {
                let mut license = current.ok_or_else(|| HubError::license_not_found(license_id))?;
                if let Some(expires_at) = patch.expires_at {
                    license.expires_at = expires_at;
                }
                if let Some(is_active) = patch.is_active {
                    license.is_active = is_active;
                }
                if let Some(status) = patch.status {
                    license.status = status;
                }
                if let Some(ref machine_id) = patch.machine_id {
                    license.machine_id = machine_id.clone();
                }
                Ok(Some(license))
            },
        )?;
        updated.ok_or_else(|| HubError::license_not_found(license_id))
    }

    /// License verification state machine. Lazily persists the
    /// Active -> Expired transition and binds an unbound license to the first
    /// machine that presents it. The whole read-modify-write runs in a CAS
    /// loop so two concurrent first verifications cannot bind two machines.
    pub fn verify(
        &self,
        license_key: &str,
        plugin_id: u64,
        machine_id: Option<&str>,
    ) -> Result<VerifyOutcome> {
        let Some(id_bytes) = self.storage.license_keys.get(license_key.as_bytes())? else {
            return Ok(VerifyOutcome::invalid("License not found"));
        };
        let license_id = decode_id(&id_bytes)?;

        let mut outcome = VerifyOutcome::invalid("License not found");
        storage::modify::<PluginLicense, _>(
            &self.storage.licenses,
            &id_key(license_id),
            |current| {
                let Some(mut license) = current else {
                    outcome = VerifyOutcome::invalid("License not found");
                    return Ok(None);
                };

                if license.plugin_id != plugin_id {
                    outcome = VerifyOutcome::invalid("License does not match plugin");
                    return Ok(Some(license));
                }
                if !license.is_active {
                    outcome = VerifyOutcome::invalid("License is not active");
                    return Ok(Some(license));
                }
                if license.status != LicenseStatus::Active {
                    outcome = VerifyOutcome::invalid(format!(
                        "License status is {}",
                        license.status.as_str()
                    ));
                    return Ok(Some(license));
                }
                if let Some(expires_at) = license.expires_at {
                    if expires_at < Utc::now() {
                        license.status = LicenseStatus::Expired;
                        outcome = VerifyOutcome::invalid("License has expired");
                        return Ok(Some(license));
                    }
                }
                if let (Some(requested), Some(bound)) = (machine_id, license.machine_id.as_deref())
                {
                    if requested != bound {
                        outcome = VerifyOutcome::invalid("License is bound to another machine");
                        return Ok(Some(license));
                    }
                }

                // First-use binding, one-time
                if let Some(requested) = machine_id {
                    if license.machine_id.is_none() {
                        license.machine_id = Some(requested.to_string());
                    }
                }
                license.last_verified_at = Some(Utc::now());
                outcome = VerifyOutcome::valid(license.expires_at);
                Ok(Some(license))
            },
        )?;

        Ok(outcome)
    }

    /// Revokes a license. Idempotent: revoking an already-revoked license is
    /// a no-op returning true. Returns false only for an unknown id.
    pub fn revoke(&self, license_id: u64) -> Result<bool> {
        let mut found = false;
        storage::modify::<PluginLicense, _>(
            &self.storage.licenses,
            &id_key(license_id),
            |current| match current {
                Some(mut license) => {
                    found = true;
                    license.is_active = false;
                    license.status = LicenseStatus::Revoked;
                    Ok(Some(license))
                }
                None => Ok(None),
            },
        )?;
        if found {
            tracing::info!("Revoked license {}", license_id);
        }
        Ok(found)
    }

    /// Validity predicate without machine binding: active flag, active
    /// status, not past expiry.
    pub fn has_valid_license(&self, user_id: &str, plugin_id: u64) -> Result<bool> {
        let now = Utc::now();
        for entry in self
            .storage
            .license_index
            .scan_prefix(plugin_prefix(user_id, plugin_id))
        {
            let (key, _) = entry?;
            let license_id = license_id_from_index(&key)?;
            let Some(bytes) = self.storage.licenses.get(id_key(license_id))? else {
                continue;
            };
            let license: PluginLicense = storage::decode(&bytes)?;
            let usable = license.is_active
                && license.status == LicenseStatus::Active
                && license.expires_at.map_or(true, |exp| exp > now);
            if usable {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Plugin ids for which the user currently holds a usable license.
    pub fn licensed_plugin_ids(&self, user_id: &str) -> Result<Vec<u64>> {
        let now = Utc::now();
        let mut ids = Vec::new();
        for entry in self.storage.license_index.scan_prefix(user_prefix(user_id)) {
            let (key, _) = entry?;
            let license_id = license_id_from_index(&key)?;
            let Some(bytes) = self.storage.licenses.get(id_key(license_id))? else {
                continue;
            };
            let license: PluginLicense = storage::decode(&bytes)?;
            let usable = license.is_active
                && license.status == LicenseStatus::Active
                && license.expires_at.map_or(true, |exp| exp > now);
            if usable && !ids.contains(&license.plugin_id) {
                ids.push(license.plugin_id);
            }
        }
        Ok(ids)
    }

    /// Cascade helper for plugin deletion: removes all licenses of a plugin
    /// together with their key and user index entries.
    pub fn remove_for_plugin(&self, plugin_id: u64) -> Result<usize> {
        let mut removed = 0;
        let mut victims = Vec::new();
        for entry in self.storage.licenses.iter() {
            let (key, bytes) = entry?;
            let license: PluginLicense = storage::decode(&bytes)?;
            if license.plugin_id == plugin_id {
                victims.push((key.to_vec(), license));
            }
        }
        for (key, license) in victims {
            self.storage.licenses.remove(key)?;
            self.storage
                .license_keys
                .remove(license.license_key.as_bytes())?;
            self.storage
                .license_index
                .remove(index_key(&license.user_id, license.plugin_id, license.id))?;
            removed += 1;
        }
        Ok(removed)
    }
}

// Index layout: user_id \0 plugin_id(be) license_id(be). The NUL separator
// keeps "alice" from matching the prefix of "alice2".
fn index_key(user_id: &str, plugin_id: u64, license_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + 17);
    key.extend_from_slice(user_id.as_bytes());
    key.push(0);
    key.extend_from_slice(&plugin_id.to_be_bytes());
    key.extend_from_slice(&license_id.to_be_bytes());
    key
}

fn user_prefix(user_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + 1);
    key.extend_from_slice(user_id.as_bytes());
    key.push(0);
    key
}

fn plugin_prefix(user_id: &str, plugin_id: u64) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(&plugin_id.to_be_bytes());
    key
}

fn license_id_from_index(key: &[u8]) -> Result<u64> {
    if key.len() < 8 {
        return Err(HubError::internal("Malformed license index key"));
    }
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&key[key.len() - 8..]);
    Ok(u64::from_be_bytes(id_bytes))
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
    if bytes.len() != 8 {
        return Err(HubError::internal("Malformed id index value"));
    }
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(bytes);
    Ok(u64::from_be_bytes(id_bytes))
}
