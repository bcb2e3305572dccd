use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::approval::DecisionEvent;
use crate::core::fix::{FixStatus, ProposedFix};
use crate::error::FixError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    fixes: BTreeMap<String, ProposedFix>,
    /// Decision events that arrived before every batch member was ready.
    #[serde(default)]
    deferred: Vec<DecisionEvent>,
}

/// JSON-file backed store for fix records.
///
/// Records are append/update only — nothing is ever deleted, so rejected and
/// failed fixes stay available for audit. The file is rewritten after every
/// mutation.
pub struct FixStore {
    path: PathBuf,
    data: StoreData,
}

impl FixStore {
    pub fn open(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading fix store {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing fix store {}", path.display()))?
        } else {
            StoreData::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing fix store {}", self.path.display()))?;
        Ok(())
    }

    /// Insert a new record. At most one non-terminal fix may exist per issue;
    /// re-attempting after rejection means inserting a fresh record.
    pub fn insert(&mut self, fix: ProposedFix) -> Result<()> {
        if let Some(active) = self.active_fix_for_issue(&fix.issue_id) {
            bail!(
                "issue {} already has an active fix {} ({})",
                fix.issue_id,
                active.id,
                active.status
            );
        }
        if self.data.fixes.contains_key(&fix.id) {
            bail!("duplicate fix id {}", fix.id);
        }
        self.data.fixes.insert(fix.id.clone(), fix);
        self.persist()
    }

    pub fn get(&self, id: &str) -> Option<&ProposedFix> {
        self.data.fixes.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &ProposedFix> {
        self.data.fixes.values()
    }

    pub fn by_batch(&self, batch_id: &str) -> Vec<&ProposedFix> {
        self.data
            .fixes
            .values()
            .filter(|f| f.batch_id == batch_id)
            .collect()
    }

    /// All records owning the given artifact reference (revision or change
    /// request). Batch code fixes share one reference.
    pub fn by_artifact(&self, reference: &str) -> Vec<&ProposedFix> {
        self.data
            .fixes
            .values()
            .filter(|f| f.artifact_reference() == Some(reference))
            .collect()
    }

    pub fn active_fix_for_issue(&self, issue_id: &str) -> Option<&ProposedFix> {
        self.data
            .fixes
            .values()
            .find(|f| f.issue_id == issue_id && !f.status.is_terminal())
    }

    /// Mutate one record and persist. The closure's error aborts the update.
    pub fn modify<F>(&mut self, id: &str, f: F) -> std::result::Result<ProposedFix, FixError>
    where
        F: FnOnce(&mut ProposedFix) -> std::result::Result<(), FixError>,
    {
        let fix = self
            .data
            .fixes
            .get_mut(id)
            .ok_or_else(|| FixError::UnknownFix(id.to_string()))?;
        f(fix)?;
        let updated = fix.clone();
        self.persist()
            .map_err(|e| FixError::TrackerAccess(format!("store write failed: {e}")))?;
        Ok(updated)
    }

    /// Mutate several records and persist once, so observers reading the
    /// store file never see a batch half-transitioned.
    pub fn modify_many<F>(
        &mut self,
        ids: &[String],
        mut f: F,
    ) -> std::result::Result<Vec<ProposedFix>, FixError>
    where
        F: FnMut(&mut ProposedFix) -> std::result::Result<(), FixError>,
    {
        for id in ids {
            if !self.data.fixes.contains_key(id) {
                return Err(FixError::UnknownFix(id.clone()));
            }
        }
        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            let fix = self.data.fixes.get_mut(id).expect("checked above");
            f(fix)?;
            updated.push(fix.clone());
        }
        self.persist()
            .map_err(|e| FixError::TrackerAccess(format!("store write failed: {e}")))?;
        Ok(updated)
    }

    pub fn push_deferred(&mut self, event: DecisionEvent) -> Result<()> {
        self.data.deferred.push(event);
        self.persist()
    }

    /// Remove and return deferred decisions targeting the given artifact.
    pub fn take_deferred_for(&mut self, reference: &str) -> Result<Vec<DecisionEvent>> {
        let (matched, rest): (Vec<_>, Vec<_>) = self
            .data
            .deferred
            .drain(..)
            .partition(|d| d.artifact_reference() == Some(reference));
        self.data.deferred = rest;
        if !matched.is_empty() {
            self.persist()?;
        }
        Ok(matched)
    }

    pub fn deferred(&self) -> &[DecisionEvent] {
        &self.data.deferred
    }

    /// Batch counts for status display.
    pub fn batch_counts(&self, batch_id: &str) -> BatchCounts {
        let mut counts = BatchCounts::default();
        for fix in self.by_batch(batch_id) {
            counts.total += 1;
            match fix.status {
                FixStatus::Applied => counts.applied += 1,
                FixStatus::Failed => counts.failed += 1,
                FixStatus::Rejected => counts.rejected += 1,
                FixStatus::Manual => counts.manual += 1,
                FixStatus::Pending => counts.pending += 1,
                _ => counts.in_progress += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchCounts {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    pub rejected: usize,
    pub manual: usize,
    pub pending: usize,
    pub in_progress: usize,
}
