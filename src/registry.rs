// 🎟️ Attendee Registry - the in-memory roster and its rules
//
// Problem solved:
// - arrival == check-in: an attendee exists only once they are checked in
// - ids stay unique across deletions (max + 1, never a count)
// - every successful mutation is mirrored to the snapshot store

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{SnapshotError, SnapshotStore};

/// Attendee codes are fixed-width: exactly 9 characters, no more, no less.
pub const CODE_LEN: usize = 9;

// ============================================================================
// ATTENDEE
// ============================================================================

/// One checked-in person on the roster.
///
/// Field names are pinned to the stored snapshot layout
/// (`{id, firstName, lastName, code, checkedIn, checkInTime}`), so renaming
/// a field here is a breaking change for existing rosters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    /// Assigned by the registry, never taken from input
    pub id: u64,

    pub first_name: String,
    pub last_name: String,

    /// Operator-facing key, unique case-sensitively
    pub code: String,

    pub checked_in: bool,

    /// Wall-clock "HH:MM", captured once at registration
    pub check_in_time: Option<String>,
}

impl Attendee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Avatar-style initials for list display ("Somchai Dee" -> "SD")
    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .next()
            .into_iter()
            .chain(self.last_name.chars().next())
            .collect()
    }

    /// Check if a search term matches this attendee (case-insensitive
    /// substring of first name, last name, or code)
    pub fn matches(&self, term: &str) -> bool {
        let lower = term.to_lowercase();

        self.first_name.to_lowercase().contains(&lower)
            || self.last_name.to_lowercase().contains(&lower)
            || self.code.to_lowercase().contains(&lower)
    }
}

// ============================================================================
// DRAFT (transient, never persisted)
// ============================================================================

/// In-progress registration input before submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub first_name: String,
    pub last_name: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    FirstName,
    LastName,
    Code,
}

// ============================================================================
// VALIDATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

// ============================================================================
// STATS
// ============================================================================

/// Aggregate counts over the full (unfiltered) roster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub checked_in: usize,
    pub pending: usize,
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Owner of the attendee roster.
///
/// The roster is insertion-ordered and only ever grows at the end (register)
/// or loses a row (delete); rows are never edited in place. The registry also
/// holds the two transient pieces of desk state: the registration draft and
/// the search term. Neither is part of the persisted snapshot.
pub struct Registry {
    attendees: Vec<Attendee>,
    draft: Draft,
    search_term: String,
    store: Box<dyn SnapshotStore>,
    last_store_error: Option<String>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // `store` is a trait object and not `Debug`; skip it.
        f.debug_struct("Registry")
            .field("attendees", &self.attendees)
            .field("draft", &self.draft)
            .field("search_term", &self.search_term)
            .field("last_store_error", &self.last_store_error)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Open a registry backed by the given store.
    ///
    /// A missing snapshot starts an empty roster. A snapshot that is present
    /// but malformed (unparseable, or entries breaking roster rules) fails
    /// the whole open: a partially loaded roster would look complete to the
    /// operator while silently missing people.
    pub fn open(store: Box<dyn SnapshotStore>) -> Result<Self, SnapshotError> {
        let attendees = store.load()?;

        if let Some((index, reason)) = roster_defect(&attendees) {
            return Err(SnapshotError::InvalidEntry { index, reason });
        }

        Ok(Registry {
            attendees,
            draft: Draft::default(),
            search_term: String::new(),
            store,
            last_store_error: None,
        })
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Full roster in insertion order
    pub fn attendees(&self) -> &[Attendee] {
        &self.attendees
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Last persistence failure, if the most recent save did not stick.
    /// The in-memory roster stays authoritative either way.
    pub fn last_store_error(&self) -> Option<&str> {
        self.last_store_error.as_deref()
    }

    /// Filtered view: every attendee whose first name, last name, or code
    /// contains `term` (case-insensitive). An empty term is the full roster.
    /// Recomputed on every call; relative order is always insertion order.
    pub fn search(&self, term: &str) -> Vec<&Attendee> {
        self.attendees.iter().filter(|a| a.matches(term)).collect()
    }

    /// Filtered view under the current search term
    pub fn filtered(&self) -> Vec<&Attendee> {
        self.search(&self.search_term)
    }

    pub fn stats(&self) -> Stats {
        let total = self.attendees.len();
        let checked_in = self.attendees.iter().filter(|a| a.checked_in).count();

        Stats {
            total,
            checked_in,
            pending: total - checked_in,
        }
    }

    // ========================================================================
    // INTENTS (transient state - no persistence trigger)
    // ========================================================================

    pub fn set_draft_field(&mut self, field: DraftField, value: String) {
        match field {
            DraftField::FirstName => self.draft.first_name = value,
            DraftField::LastName => self.draft.last_name = value,
            DraftField::Code => self.draft.code = value,
        }
    }

    pub fn set_search_term(&mut self, term: String) {
        self.search_term = term;
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Register the current draft as a checked-in attendee.
    ///
    /// On success the attendee is appended to the roster with the next id and
    /// the current wall-clock time, the draft is cleared, the snapshot is
    /// rewritten, and the new id is returned. On validation failure nothing
    /// changes and every problem is reported.
    pub fn register(&mut self) -> Result<u64, Vec<ValidationError>> {
        let errors = self.validate_draft();
        if !errors.is_empty() {
            return Err(errors);
        }

        let id = self.next_id();
        let check_in_time = Local::now().format("%H:%M").to_string();

        self.attendees.push(Attendee {
            id,
            first_name: self.draft.first_name.clone(),
            last_name: self.draft.last_name.clone(),
            code: self.draft.code.clone(),
            checked_in: true,
            check_in_time: Some(check_in_time),
        });

        self.draft = Draft::default();
        self.persist();

        Ok(id)
    }

    /// Remove the attendee with the given id.
    ///
    /// Returns whether anything was removed. A stale id is a no-op, not an
    /// error: the list view may hold an id that was deleted moments ago. The
    /// confirmation prompt gating this is the UI's job.
    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.attendees.len();
        self.attendees.retain(|a| a.id != id);

        let removed = self.attendees.len() != before;
        if removed {
            self.persist();
        }

        removed
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Next id = max existing + 1 (1 when empty). A count-based id would
    /// collide after deletions.
    fn next_id(&self) -> u64 {
        self.attendees.iter().map(|a| a.id).max().unwrap_or(0) + 1
    }

    fn validate_draft(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.draft.first_name.is_empty() {
            errors.push(ValidationError {
                field: "first_name".to_string(),
                message: "Required field is empty".to_string(),
            });
        }

        if self.draft.last_name.is_empty() {
            errors.push(ValidationError {
                field: "last_name".to_string(),
                message: "Required field is empty".to_string(),
            });
        }

        if self.draft.code.is_empty() {
            errors.push(ValidationError {
                field: "code".to_string(),
                message: "Required field is empty".to_string(),
            });
        } else {
            let len = self.draft.code.chars().count();
            if len != CODE_LEN {
                errors.push(ValidationError {
                    field: "code".to_string(),
                    message: format!("Must be exactly {} characters, got {}", CODE_LEN, len),
                });
            } else if self.attendees.iter().any(|a| a.code == self.draft.code) {
                errors.push(ValidationError {
                    field: "code".to_string(),
                    message: "Already registered".to_string(),
                });
            }
        }

        errors
    }

    /// Mirror the roster to the store. A write failure never blocks or rolls
    /// back the in-memory mutation; it is logged and kept visible until a
    /// later save succeeds.
    fn persist(&mut self) {
        match self.store.save(&self.attendees) {
            Ok(()) => self.last_store_error = None,
            Err(err) => {
                warn!(error = %err, "roster snapshot write failed; in-memory roster stays authoritative");
                self.last_store_error = Some(err.to_string());
            }
        }
    }
}

/// Scan a loaded roster for entries that break the data model. Returns the
/// first offending index and the reason.
fn roster_defect(attendees: &[Attendee]) -> Option<(usize, String)> {
    for (index, attendee) in attendees.iter().enumerate() {
        if attendee.first_name.is_empty() {
            return Some((index, "first name is empty".to_string()));
        }
        if attendee.last_name.is_empty() {
            return Some((index, "last name is empty".to_string()));
        }

        let len = attendee.code.chars().count();
        if len != CODE_LEN {
            return Some((
                index,
                format!("code must be {} characters, got {}", CODE_LEN, len),
            ));
        }

        if attendees[..index].iter().any(|a| a.id == attendee.id) {
            return Some((index, format!("duplicate id {}", attendee.id)));
        }
        if attendees[..index].iter().any(|a| a.code == attendee.code) {
            return Some((index, format!("duplicate code {}", attendee.code)));
        }
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SnapshotStore};

    fn test_registry() -> (Registry, MemoryStore) {
        let store = MemoryStore::new();
        let registry = Registry::open(Box::new(store.clone())).unwrap();
        (registry, store)
    }

    fn register(
        registry: &mut Registry,
        first: &str,
        last: &str,
        code: &str,
    ) -> Result<u64, Vec<ValidationError>> {
        registry.set_draft_field(DraftField::FirstName, first.to_string());
        registry.set_draft_field(DraftField::LastName, last.to_string());
        registry.set_draft_field(DraftField::Code, code.to_string());
        registry.register()
    }

    #[test]
    fn test_register_first_attendee() {
        let (mut registry, _) = test_registry();

        let id = register(&mut registry, "Somchai", "Dee", "660610001").unwrap();

        assert_eq!(id, 1);
        assert_eq!(registry.attendees().len(), 1);

        let attendee = &registry.attendees()[0];
        assert_eq!(attendee.id, 1);
        assert_eq!(attendee.full_name(), "Somchai Dee");
        assert!(attendee.checked_in);

        // HH:MM wall-clock stamp
        let time = attendee.check_in_time.as_deref().unwrap();
        assert_eq!(time.len(), 5);
        assert_eq!(&time[2..3], ":");
    }

    #[test]
    fn test_register_clears_draft() {
        let (mut registry, _) = test_registry();

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();

        assert_eq!(*registry.draft(), Draft::default());
    }

    #[test]
    fn test_register_requires_all_fields() {
        let (mut registry, _) = test_registry();

        let errors = registry.register().unwrap_err();

        assert_eq!(errors.len(), 3);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"first_name"));
        assert!(fields.contains(&"last_name"));
        assert!(fields.contains(&"code"));

        assert!(registry.attendees().is_empty());
    }

    #[test]
    fn test_register_rejects_wrong_length_codes() {
        let (mut registry, _) = test_registry();

        for len in (0usize..=8).chain([10, 15]) {
            let code = "6".repeat(len);
            let errors = register(&mut registry, "Somchai", "Dee", &code).unwrap_err();

            assert_eq!(errors.len(), 1, "length {} should fail", len);
            assert_eq!(errors[0].field, "code");
            assert!(registry.attendees().is_empty());
        }

        // Exactly 9 passes
        assert!(register(&mut registry, "Somchai", "Dee", &"6".repeat(9)).is_ok());
    }

    #[test]
    fn test_code_length_counts_characters_not_bytes() {
        let (mut registry, _) = test_registry();

        // 9 Thai digits are 27 bytes but 9 characters
        let code = "๖๖๐๖๑๐๐๐๑";
        assert_eq!(code.chars().count(), 9);

        assert!(register(&mut registry, "Somchai", "Dee", code).is_ok());
    }

    #[test]
    fn test_register_rejects_duplicate_code() {
        let (mut registry, _) = test_registry();

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();
        let errors = register(&mut registry, "Somchai", "Dee", "660610001").unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "code");
        assert_eq!(registry.attendees().len(), 1);

        // One character of difference is a different person
        assert!(register(&mut registry, "Somchai", "Dee", "660610002").is_ok());
        assert_eq!(registry.attendees().len(), 2);
    }

    #[test]
    fn test_duplicate_check_is_case_sensitive() {
        let (mut registry, _) = test_registry();

        register(&mut registry, "Ann", "Lee", "abc123def").unwrap();

        assert!(register(&mut registry, "Bee", "Lee", "ABC123DEF").is_ok());
        assert_eq!(registry.attendees().len(), 2);
    }

    #[test]
    fn test_ids_survive_deletions() {
        let (mut registry, _) = test_registry();

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();
        register(&mut registry, "Suda", "Chai", "660610002").unwrap();

        assert!(registry.delete(1));

        // Third registration gets id 3, not a reused 2
        let id = register(&mut registry, "Anan", "Porn", "660610003").unwrap();
        assert_eq!(id, 3);

        let ids: Vec<u64> = registry.attendees().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let (mut registry, store) = test_registry();

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();
        let saved = store.raw();

        assert!(!registry.delete(99));
        assert_eq!(registry.attendees().len(), 1);
        // No mutation, no rewrite
        assert_eq!(store.raw(), saved);
    }

    #[test]
    fn test_search_matches_any_field_case_insensitive() {
        let (mut registry, _) = test_registry();

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();
        register(&mut registry, "Suda", "Somsak", "770610002").unwrap();
        register(&mut registry, "Anan", "Porn", "880610003").unwrap();

        // First name and last name both match "som"
        let hits = registry.search("SOM");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].first_name, "Somchai");
        assert_eq!(hits[1].last_name, "Somsak");

        // Code match
        let hits = registry.search("8806");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].first_name, "Anan");

        // No match
        assert!(registry.search("zzz").is_empty());
    }

    #[test]
    fn test_search_empty_term_returns_all_in_order() {
        let (mut registry, _) = test_registry();

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();
        register(&mut registry, "Suda", "Chai", "660610002").unwrap();

        let all = registry.search("");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[1].id, 2);
    }

    #[test]
    fn test_search_by_code_prefix() {
        let (mut registry, _) = test_registry();

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();
        register(&mut registry, "Suda", "Chai", "770000000").unwrap();
        register(&mut registry, "Anan", "Porn", "660610999").unwrap();

        let hits = registry.search("660610");
        let codes: Vec<&str> = hits.iter().map(|a| a.code.as_str()).collect();

        // Both matching codes, original relative order
        assert_eq!(codes, vec!["660610001", "660610999"]);
    }

    #[test]
    fn test_filtered_follows_search_term_intent() {
        let (mut registry, _) = test_registry();

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();
        register(&mut registry, "Suda", "Chai", "770610002").unwrap();

        registry.set_search_term("suda".to_string());
        let filtered = registry.filtered();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].first_name, "Suda");

        registry.set_search_term(String::new());
        assert_eq!(registry.filtered().len(), 2);
    }

    #[test]
    fn test_stats_track_register_and_delete() {
        let (mut registry, _) = test_registry();

        assert_eq!(registry.stats(), Stats::default());

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();
        register(&mut registry, "Suda", "Chai", "660610002").unwrap();
        registry.delete(1);

        let stats = registry.stats();
        assert_eq!(stats.total, 1);
        // Every attendee the registry creates is checked in
        assert_eq!(stats.checked_in, stats.total);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn test_mutations_persist_but_transient_state_does_not() {
        let (mut registry, store) = test_registry();

        registry.set_draft_field(DraftField::FirstName, "Somchai".to_string());
        registry.set_search_term("som".to_string());
        assert!(store.raw().is_none());

        registry.set_draft_field(DraftField::LastName, "Dee".to_string());
        registry.set_draft_field(DraftField::Code, "660610001".to_string());
        registry.register().unwrap();
        assert!(store.raw().is_some());

        // A second registry over the same slot sees the mutation
        let reopened = Registry::open(Box::new(store.clone())).unwrap();
        assert_eq!(reopened.attendees(), registry.attendees());
        // ...but not the transient desk state
        assert_eq!(*reopened.draft(), Draft::default());
        assert_eq!(reopened.search_term(), "");
    }

    #[test]
    fn test_failed_validation_mutates_nothing() {
        let (mut registry, store) = test_registry();

        register(&mut registry, "Somchai", "Dee", "short").unwrap_err();

        assert!(registry.attendees().is_empty());
        assert!(store.raw().is_none());
        // Draft survives so the operator can correct it
        assert_eq!(registry.draft().first_name, "Somchai");
    }

    fn stored_attendee(id: u64, code: &str) -> Attendee {
        Attendee {
            id,
            first_name: "Somchai".to_string(),
            last_name: "Dee".to_string(),
            code: code.to_string(),
            checked_in: true,
            check_in_time: Some("09:15".to_string()),
        }
    }

    #[test]
    fn test_open_rejects_snapshot_with_invalid_entry() {
        let mut store = MemoryStore::new();
        store.save(&[stored_attendee(1, "short")]).unwrap();

        let err = Registry::open(Box::new(store)).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidEntry { index: 0, .. }));
    }

    #[test]
    fn test_open_rejects_snapshot_with_duplicate_ids() {
        let mut store = MemoryStore::new();
        store
            .save(&[
                stored_attendee(7, "660610001"),
                stored_attendee(7, "660610002"),
            ])
            .unwrap();

        let err = Registry::open(Box::new(store)).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidEntry { index: 1, .. }));
    }

    #[test]
    fn test_initials() {
        let (mut registry, _) = test_registry();

        register(&mut registry, "Somchai", "Dee", "660610001").unwrap();

        assert_eq!(registry.attendees()[0].initials(), "SD");
    }
}
