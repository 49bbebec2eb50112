//! Quarantine gate: holds external signals until enough distinct sources agree.
//!
//! # State Transitions
//! ```text
//! Pending → Verified: confirmations >= required and not yet expired
//! Pending → Rejected: explicit reject
//! Pending → Expired:  observed after expires_at
//! ```
//! Terminal states never change.
//!
//! Items live in a `DashMap` keyed by content hash and are written back to an
//! optional JSON file after every change.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::observability::metrics;
use crate::quarantine::types::{
    DataType, QuarantineError, QuarantineStats, QuarantineStatus, QuarantinedItem,
};

/// Stable id for a piece of content: first 16 hex chars of SHA-256 over sorted-key JSON.
pub fn content_id(content: &Value) -> String {
    let digest = Sha256::digest(canonical_json(content).as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Serialize with object keys sorted at every depth.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        scalar => scalar.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct QuarantineGate {
    items: DashMap<String, QuarantinedItem>,
    persistence_path: Option<PathBuf>,
}

impl QuarantineGate {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            items: DashMap::new(),
            persistence_path,
        }
    }

    /// Open the gate, loading previously persisted items when the file exists.
    pub fn load(persistence_path: Option<PathBuf>) -> Result<Self, QuarantineError> {
        let gate = Self::new(persistence_path);
        if let Some(path) = gate.persistence_path.as_deref().filter(|p| p.exists()) {
            let reader = BufReader::new(File::open(path)?);
            let items: Vec<QuarantinedItem> = serde_json::from_reader(reader)?;
            for item in items {
                gate.items.insert(item.id.clone(), item);
            }
            tracing::info!(
                path = %path.display(),
                items = gate.items.len(),
                "Loaded quarantine store"
            );
        }
        Ok(gate)
    }

    /// Write every item to the persistence file, if one is configured.
    pub fn save(&self) -> Result<(), QuarantineError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let mut items: Vec<QuarantinedItem> = self.items.iter().map(|r| r.value().clone()).collect();
        items.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        write_items(path, &items)?;
        tracing::debug!(items = items.len(), "Saved quarantine store");
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            tracing::error!(error = %e, "Failed to persist quarantine store");
        }
    }

    pub fn submit(&self, data_type: DataType, content: Value, source: &str) -> QuarantinedItem {
        self.submit_at(data_type, content, source, Utc::now())
    }

    /// Submit content from `source`.
    ///
    /// A repeat from an already-counted source changes nothing. A new source adds a
    /// confirmation to a pending item, which may verify it.
    pub fn submit_at(
        &self,
        data_type: DataType,
        content: Value,
        source: &str,
        now: DateTime<Utc>,
    ) -> QuarantinedItem {
        let id = content_id(&content);

        let item = match self.items.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                let item = entry.get_mut();
                if item.status == QuarantineStatus::Pending && !item.sources.contains(source) {
                    if item.is_expired_at(now) {
                        expire(item);
                    } else {
                        item.sources.insert(source.to_string());
                        item.confirmations += 1;
                        tracing::info!(
                            id = %item.id,
                            source = %source,
                            confirmations = item.confirmations,
                            required = item.required_confirmations,
                            "Quarantine item confirmed by new source"
                        );
                        try_verify(item, now);
                    }
                }
                item.clone()
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let mut item = QuarantinedItem {
                    id: id.clone(),
                    data_type,
                    content,
                    sources: BTreeSet::from([source.to_string()]),
                    status: QuarantineStatus::Pending,
                    confirmations: 1,
                    required_confirmations: data_type.required_confirmations(),
                    submitted_at: now,
                    expires_at: now + data_type.quarantine_duration(),
                    verified_at: None,
                    review_notes: Vec::new(),
                    acted_on: false,
                };
                tracing::info!(
                    id = %id,
                    data_type = %data_type,
                    source = %source,
                    "Quarantined new item"
                );
                metrics::record_quarantine_event(data_type.as_str(), "submitted");
                try_verify(&mut item, now);
                entry.insert(item).value().clone()
            }
        };

        self.persist();
        item
    }

    pub fn confirm(&self, id: &str, reviewer: &str, notes: Option<&str>) -> Result<QuarantinedItem, QuarantineError> {
        self.confirm_at(id, reviewer, notes, Utc::now())
    }

    /// Manual confirmation by a reviewer. Counts even when the reviewer already submitted.
    pub fn confirm_at(
        &self,
        id: &str,
        reviewer: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<QuarantinedItem, QuarantineError> {
        let item = {
            let mut item = self
                .items
                .get_mut(id)
                .ok_or_else(|| QuarantineError::UnknownItem(id.to_string()))?;
            if item.status == QuarantineStatus::Pending && item.is_expired_at(now) {
                expire(&mut item);
            }
            if item.status != QuarantineStatus::Pending {
                let status = item.status;
                drop(item);
                self.persist();
                return Err(QuarantineError::NotPending {
                    id: id.to_string(),
                    status,
                });
            }

            item.sources.insert(reviewer.to_string());
            item.confirmations += 1;
            if let Some(notes) = notes {
                item.review_notes.push(format!("{}: {}", reviewer, notes));
            }
            try_verify(&mut item, now);
            item.clone()
        };

        self.persist();
        Ok(item)
    }

    pub fn reject(&self, id: &str, reason: &str) -> Result<QuarantinedItem, QuarantineError> {
        let item = {
            let mut item = self
                .items
                .get_mut(id)
                .ok_or_else(|| QuarantineError::UnknownItem(id.to_string()))?;
            if item.status != QuarantineStatus::Pending {
                return Err(QuarantineError::NotPending {
                    id: id.to_string(),
                    status: item.status,
                });
            }
            item.status = QuarantineStatus::Rejected;
            item.review_notes.push(format!("rejected: {}", reason));
            tracing::warn!(id = %id, reason = %reason, "Quarantine item rejected");
            metrics::record_quarantine_event(item.data_type.as_str(), "rejected");
            item.clone()
        };

        self.persist();
        Ok(item)
    }

    pub fn get(&self, id: &str) -> Option<QuarantinedItem> {
        self.items.get(id).map(|r| r.value().clone())
    }

    pub fn pending(&self) -> Vec<QuarantinedItem> {
        self.pending_at(Utc::now())
    }

    /// Pending items, oldest first. Items past their expiry are expired on the way.
    pub fn pending_at(&self, now: DateTime<Utc>) -> Vec<QuarantinedItem> {
        let mut expired_any = false;
        let mut pending = Vec::new();
        for mut item in self.items.iter_mut() {
            if item.status != QuarantineStatus::Pending {
                continue;
            }
            if item.is_expired_at(now) {
                expire(&mut item);
                expired_any = true;
            } else {
                pending.push(item.clone());
            }
        }
        if expired_any {
            self.persist();
        }
        pending.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        pending
    }

    /// Verified items, optionally of one type.
    pub fn verified(&self, data_type: Option<DataType>) -> Vec<QuarantinedItem> {
        let mut items: Vec<QuarantinedItem> = self
            .items
            .iter()
            .filter(|r| r.status == QuarantineStatus::Verified)
            .filter(|r| data_type.map_or(true, |t| r.data_type == t))
            .map(|r| r.value().clone())
            .collect();
        items.sort_by(|a, b| a.verified_at.cmp(&b.verified_at));
        items
    }

    /// Whether this exact content has been verified.
    pub fn is_trusted(&self, content: &Value) -> bool {
        self.items
            .get(&content_id(content))
            .is_some_and(|item| item.status == QuarantineStatus::Verified)
    }

    /// Verified items of actionable types not yet acted on. Nothing is marked.
    pub fn unacted_verified(&self) -> Vec<QuarantinedItem> {
        let mut items: Vec<QuarantinedItem> = self
            .items
            .iter()
            .filter(|r| {
                r.status == QuarantineStatus::Verified && r.data_type.is_actionable() && !r.acted_on
            })
            .map(|r| r.value().clone())
            .collect();
        items.sort_by(|a, b| a.verified_at.cmp(&b.verified_at));
        items
    }

    /// Mark verified items as acted on so they are not raised again.
    pub fn mark_acted_on(&self, ids: &[String]) -> usize {
        let mut marked = 0;
        for id in ids {
            if let Some(mut item) = self.items.get_mut(id) {
                if item.status == QuarantineStatus::Verified && !item.acted_on {
                    item.acted_on = true;
                    marked += 1;
                }
            }
        }
        if marked > 0 {
            self.persist();
        }
        marked
    }

    pub fn stats(&self) -> QuarantineStats {
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        for item in self.items.iter() {
            *by_status.entry(item.status.as_str().to_string()).or_default() += 1;
        }
        let total = self.items.len();
        let count = |s: QuarantineStatus| by_status.get(s.as_str()).copied().unwrap_or(0);
        let rejected = count(QuarantineStatus::Rejected);

        QuarantineStats {
            total_items: total,
            pending_count: count(QuarantineStatus::Pending),
            verified_count: count(QuarantineStatus::Verified),
            rejection_rate: if total == 0 {
                0.0
            } else {
                rejected as f64 / total as f64
            },
            by_status,
        }
    }
}

fn try_verify(item: &mut QuarantinedItem, now: DateTime<Utc>) {
    if item.status == QuarantineStatus::Pending
        && item.confirmations >= item.required_confirmations
        && !item.is_expired_at(now)
    {
        item.status = QuarantineStatus::Verified;
        item.verified_at = Some(now);
        tracing::info!(
            id = %item.id,
            data_type = %item.data_type,
            confirmations = item.confirmations,
            "Quarantine item verified"
        );
        metrics::record_quarantine_event(item.data_type.as_str(), "verified");
    }
}

fn expire(item: &mut QuarantinedItem) {
    item.status = QuarantineStatus::Expired;
    tracing::info!(id = %item.id, data_type = %item.data_type, "Quarantine item expired");
    metrics::record_quarantine_event(item.data_type.as_str(), "expired");
}

fn write_items(path: &Path, items: &[QuarantinedItem]) -> Result<(), QuarantineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, items)?;
    Ok(())
}
