use crate::config::Settings;
use crate::database::DocumentStore;
use crate::models::{FieldValue, UserRecord};
use crate::utils::AppResult;

pub const ROLE_FIELD: &str = "role";
pub const ADDRESS_FIELD: &str = "address";
pub const MISSPELLED_ADDRESS_FIELD: &str = "adress";

/// A transformed record and whether the misspelled address field was folded away.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchedRecord {
    pub record: UserRecord,
    pub address_corrected: bool,
}

/// Final state of a patch run that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOutcome {
    /// The patched record was written back.
    Persisted(PatchedRecord),
    /// The record was patched in memory only.
    DryRun(PatchedRecord),
    /// No document under the key; nothing was written.
    NotFound,
}

/// Sets `role` and folds the misspelled `adress` field into `address`.
///
/// When both spellings are present the `address` value is kept. Every other
/// field is left as it was.
pub fn transform_record(mut record: UserRecord, target_role: &str) -> PatchedRecord {
    record.insert(ROLE_FIELD, FieldValue::string(target_role));

    let address_corrected = match record.remove(MISSPELLED_ADDRESS_FIELD) {
        Some(misspelled) => {
            if !record.contains(ADDRESS_FIELD) {
                record.insert(ADDRESS_FIELD, misspelled);
            }
            true
        }
        None => false,
    };

    PatchedRecord {
        record,
        address_corrected,
    }
}

/// Fetches one record, transforms it, and overwrites it in the store.
pub struct RecordPatcher<S: DocumentStore> {
    store: S,
    collection: String,
    target_role: String,
    dry_run: bool,
}

impl<S: DocumentStore> RecordPatcher<S> {
    pub fn new(store: S, settings: &Settings) -> Self {
        Self {
            store,
            collection: settings.collection.clone(),
            target_role: settings.target_role.clone(),
            dry_run: settings.dry_run,
        }
    }

    pub async fn patch(&self, key: &str) -> AppResult<PatchOutcome> {
        log::info!("🔍 Fetching '{}' from collection '{}'", key, self.collection);

        let record = match self.store.get(&self.collection, key).await? {
            Some(record) => record,
            None => return Ok(PatchOutcome::NotFound),
        };

        log::info!(
            "👤 Current role: {}",
            record.get(ROLE_FIELD).map(FieldValue::to_plain_json).unwrap_or_default()
        );
        log::debug!("📄 Current fields ({}): {}", record.field_count(), record.to_plain_json());

        let patched = transform_record(record, &self.target_role);

        if self.dry_run {
            return Ok(PatchOutcome::DryRun(patched));
        }

        self.store.set(&self.collection, key, &patched.record).await?;
        Ok(PatchOutcome::Persisted(patched))
    }
}
