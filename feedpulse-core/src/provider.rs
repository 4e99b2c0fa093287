//! Collaborator interfaces and shipped implementations
//!
//! Collection needs three lookups it does not own: who an organization is,
//! which submissions it received, and what its questions look like. Each is a
//! trait so the service can run against an embedding application's stores,
//! the in-memory [`MemoryProvider`], or exported JSON files through
//! [`ExportDirectory`].
//!
//! ## Export file format
//!
//! ```json
//! {
//!   "organization": { "id": "...", "account_id": "..." },
//!   "questions":    [ { "id": "...", "question_type": "rating", "min_value": 1, "max_value": 5 } ],
//!   "submissions":  [ { "id": "...", "created_at": "2024-01-01T10:00:00Z", "responses": [ ... ] } ]
//! }
//! ```

use crate::error::{Error, Result};
use crate::types::{Organization, QuestionMeta, Submission};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

/// Source of feedback submissions.
pub trait FeedbackProvider: Send + Sync {
    /// Up to `limit` submissions of an organization, most recent first.
    fn fetch_recent(&self, organization_id: Uuid, limit: usize) -> Result<Vec<Submission>>;
}

/// Source of organization records.
pub trait OrganizationProvider: Send + Sync {
    /// Returns [`Error::OrganizationNotFound`] for unknown ids.
    fn get_organization(&self, organization_id: Uuid) -> Result<Organization>;
}

/// Source of question metadata.
pub trait QuestionProvider: Send + Sync {
    /// Returns [`Error::QuestionNotFound`] for unknown ids.
    fn get_question(&self, question_id: Uuid) -> Result<QuestionMeta>;
}

fn most_recent(submissions: &[Submission], limit: usize) -> Vec<Submission> {
    let mut recent = submissions.to_vec();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(limit);
    recent
}

// ============================================
// In-memory provider
// ============================================

/// Thread-safe in-memory provider implementing all three interfaces.
#[derive(Default)]
pub struct MemoryProvider {
    organizations: RwLock<HashMap<Uuid, Organization>>,
    submissions: RwLock<HashMap<Uuid, Vec<Submission>>>,
    questions: RwLock<HashMap<Uuid, QuestionMeta>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_organization(&self, organization: Organization) {
        self.organizations
            .write()
            .unwrap()
            .insert(organization.id, organization);
    }

    pub fn add_question(&self, question: QuestionMeta) {
        self.questions.write().unwrap().insert(question.id, question);
    }

    pub fn add_submission(&self, organization_id: Uuid, submission: Submission) {
        self.submissions
            .write()
            .unwrap()
            .entry(organization_id)
            .or_default()
            .push(submission);
    }

    /// Remove every submission of an organization.
    pub fn clear_submissions(&self, organization_id: Uuid) {
        self.submissions.write().unwrap().remove(&organization_id);
    }
}

impl FeedbackProvider for MemoryProvider {
    fn fetch_recent(&self, organization_id: Uuid, limit: usize) -> Result<Vec<Submission>> {
        let submissions = self.submissions.read().unwrap();
        Ok(submissions
            .get(&organization_id)
            .map(|s| most_recent(s, limit))
            .unwrap_or_default())
    }
}

impl OrganizationProvider for MemoryProvider {
    fn get_organization(&self, organization_id: Uuid) -> Result<Organization> {
        self.organizations
            .read()
            .unwrap()
            .get(&organization_id)
            .cloned()
            .ok_or(Error::OrganizationNotFound(organization_id))
    }
}

impl QuestionProvider for MemoryProvider {
    fn get_question(&self, question_id: Uuid) -> Result<QuestionMeta> {
        self.questions
            .read()
            .unwrap()
            .get(&question_id)
            .cloned()
            .ok_or(Error::QuestionNotFound(question_id))
    }
}

// ============================================
// Export directory provider
// ============================================

/// One organization's export file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationExport {
    pub organization: Organization,
    #[serde(default)]
    pub questions: Vec<QuestionMeta>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

/// Provider backed by a directory of `*.json` organization exports.
///
/// Files are read once at [`load`](Self::load). Unreadable or malformed
/// files are skipped with a warning; a later file for the same organization
/// replaces an earlier one.
pub struct ExportDirectory {
    root: PathBuf,
    exports: HashMap<Uuid, OrganizationExport>,
    questions: HashMap<Uuid, QuestionMeta>,
}

impl ExportDirectory {
    /// Load every export file directly under `root`.
    pub fn load(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("export directory not found: {}", root.display()),
            )));
        }

        let pattern = root.join("*.json");
        let pattern_str = pattern.to_string_lossy();
        let mut paths: Vec<PathBuf> = glob::glob(&pattern_str)
            .map_err(|e| Error::Config(format!("Invalid glob pattern: {}", e)))?
            .flatten()
            .collect();
        paths.sort();

        let mut exports = HashMap::new();
        let mut questions = HashMap::new();
        for path in &paths {
            let export = match Self::read_export(path) {
                Ok(export) => export,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping export file");
                    continue;
                }
            };
            tracing::debug!(
                path = %path.display(),
                organization_id = %export.organization.id,
                submissions = export.submissions.len(),
                "Loaded export file"
            );
            for question in &export.questions {
                questions.insert(question.id, question.clone());
            }
            exports.insert(export.organization.id, export);
        }

        tracing::info!(
            root = %root.display(),
            files = paths.len(),
            organizations = exports.len(),
            "Loaded export directory"
        );

        Ok(Self {
            root: root.to_path_buf(),
            exports,
            questions,
        })
    }

    fn read_export(path: &Path) -> Result<OrganizationExport> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Organizations with an export, sorted.
    pub fn organization_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.exports.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl FeedbackProvider for ExportDirectory {
    fn fetch_recent(&self, organization_id: Uuid, limit: usize) -> Result<Vec<Submission>> {
        Ok(self
            .exports
            .get(&organization_id)
            .map(|e| most_recent(&e.submissions, limit))
            .unwrap_or_default())
    }
}

impl OrganizationProvider for ExportDirectory {
    fn get_organization(&self, organization_id: Uuid) -> Result<Organization> {
        self.exports
            .get(&organization_id)
            .map(|e| e.organization.clone())
            .ok_or(Error::OrganizationNotFound(organization_id))
    }
}

impl QuestionProvider for ExportDirectory {
    fn get_question(&self, question_id: Uuid) -> Result<QuestionMeta> {
        self.questions
            .get(&question_id)
            .cloned()
            .ok_or(Error::QuestionNotFound(question_id))
    }
}
