//! Collection directory state.
//!
//! Owns the raw list mirror of server truth plus the query/filter/sort
//! inputs, and derives the projection the shell renders. Mutations call
//! the server first and patch local state only on confirmed success, so
//! rendered data never lies about what the server accepted.
//!
//! Loads are split-phase (`begin_load` / `apply_load`) so a completion
//! that arrives after a newer load was issued is dropped instead of
//! clobbering fresher data. The convenience `load`/`refresh` wrappers
//! cover the common sequential case.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::api::CollectionApi;
use super::{Collection, CollectionStatus};
use crate::debounce::Debouncer;
use crate::error::ApiError;
use crate::session::Session;

/// Settle time for the search query.
const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Status filter applied to the derived view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Draft,
    Published,
    Archived,
}

impl StatusFilter {
    /// Returns true if a collection with the given status passes.
    pub fn matches(self, status: CollectionStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Draft => status == CollectionStatus::Draft,
            StatusFilter::Published => status == CollectionStatus::Published,
            StatusFilter::Archived => status == CollectionStatus::Archived,
        }
    }
}

/// Sort key for the derived view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    UpdatedNewest,
    UpdatedOldest,
    CreatedNewest,
    CreatedOldest,
    QuestionsHigh,
    QuestionsLow,
}

/// Token identifying one in-flight load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

/// Tracks the newest load; completions of superseded loads are dropped.
#[derive(Debug, Default)]
struct LoadTracker {
    next: u64,
    active: Option<u64>,
}

impl LoadTracker {
    fn begin(&mut self) -> LoadToken {
        let token = LoadToken(self.next);
        self.next += 1;
        self.active = Some(token.0);
        token
    }

    /// Clears the active load if the token still identifies it.
    fn complete(&mut self, token: LoadToken) -> bool {
        if self.active == Some(token.0) {
            self.active = None;
            true
        } else {
            false
        }
    }
}

/// Memoized derived view keyed on everything it depends on.
#[derive(Debug)]
struct ViewCache {
    revision: u64,
    query: String,
    filter: StatusFilter,
    sort: SortKey,
    items: Vec<Collection>,
}

/// Directory of the collections visible to the current user.
pub struct CollectionDirectory {
    api: CollectionApi,
    session: Arc<Session>,
    raw: Vec<Collection>,
    revision: u64,
    query_input: String,
    applied_query: String,
    query_debounce: Debouncer,
    filter: StatusFilter,
    sort: SortKey,
    loading: bool,
    refreshing: bool,
    error: Option<String>,
    loads: LoadTracker,
    cache: Option<ViewCache>,
}

impl CollectionDirectory {
    /// Creates an empty directory bound to the given endpoints and session.
    pub fn new(api: CollectionApi, session: Arc<Session>) -> Self {
        Self {
            api,
            session,
            raw: Vec::new(),
            revision: 0,
            query_input: String::new(),
            applied_query: String::new(),
            query_debounce: Debouncer::new(SEARCH_DEBOUNCE),
            filter: StatusFilter::All,
            sort: SortKey::UpdatedNewest,
            loading: false,
            refreshing: false,
            error: None,
            loads: LoadTracker::default(),
            cache: None,
        }
    }

    // === Surface state ===

    /// True while the initial load is in flight.
    pub fn loading(&self) -> bool {
        self.loading
    }

    /// True while a manual refresh is in flight.
    pub fn refreshing(&self) -> bool {
        self.refreshing
    }

    /// Message of the last failed load, cleared on the next attempt.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The live (not yet debounced) query text.
    pub fn query(&self) -> &str {
        &self.query_input
    }

    /// The current status filter.
    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    /// The current sort key.
    pub fn sort_key(&self) -> SortKey {
        self.sort
    }

    // === Inputs ===

    /// Updates the search text; the filter applies once typing settles.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query_input = query.into();
        self.query_debounce.reset();
    }

    /// Applies the settled query if the debounce fired. Returns true if
    /// the applied query changed.
    pub fn poll_query(&mut self) -> bool {
        if !self.query_debounce.fired() {
            return false;
        }
        self.query_debounce.cancel();
        self.apply_query()
    }

    /// Waits out the remaining settle time, then applies the query.
    pub async fn settle_query(&mut self) -> bool {
        if let Some(remaining) = self.query_debounce.remaining() {
            tokio::time::sleep(remaining).await;
        }
        self.poll_query()
    }

    /// Applies the pending query immediately (e.g. on submit).
    pub fn flush_query(&mut self) -> bool {
        self.query_debounce.cancel();
        self.apply_query()
    }

    fn apply_query(&mut self) -> bool {
        if self.applied_query == self.query_input {
            return false;
        }
        self.applied_query = self.query_input.clone();
        true
    }

    /// Sets the status filter.
    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
    }

    /// Sets the sort key.
    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    // === Loading ===

    /// Marks the initial load as started.
    pub fn begin_load(&mut self) -> LoadToken {
        self.loading = true;
        self.error = None;
        self.loads.begin()
    }

    /// Marks a manual refresh as started.
    pub fn begin_refresh(&mut self) -> LoadToken {
        self.refreshing = true;
        self.error = None;
        self.loads.begin()
    }

    /// Applies a load completion. Stale completions (a newer load was
    /// begun since) are dropped without touching any state.
    pub fn apply_load(
        &mut self,
        token: LoadToken,
        result: Result<Vec<Collection>, ApiError>,
    ) -> Result<(), ApiError> {
        if !self.loads.complete(token) {
            debug!("dropping stale load completion");
            return Ok(());
        }

        self.loading = false;
        self.refreshing = false;
        match result {
            Ok(list) => {
                self.raw = list;
                self.bump();
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetches and replaces the raw list.
    pub async fn load(&mut self) -> Result<(), ApiError> {
        let token = self.begin_load();
        let result = self.api.fetch_collections().await;
        self.apply_load(token, result)
    }

    /// Re-fetches the raw list as a manual refresh.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let token = self.begin_refresh();
        let result = self.api.fetch_collections().await;
        self.apply_load(token, result)
    }

    // === Derived view ===

    /// The filtered, sorted projection the shell renders.
    ///
    /// Memoized on (raw revision, applied query, filter, sort key);
    /// recomputed only when one of those changed.
    pub fn view(&mut self) -> &[Collection] {
        let stale = match &self.cache {
            Some(cache) => {
                cache.revision != self.revision
                    || cache.query != self.applied_query
                    || cache.filter != self.filter
                    || cache.sort != self.sort
            }
            None => true,
        };

        if stale {
            self.cache = Some(ViewCache {
                revision: self.revision,
                query: self.applied_query.clone(),
                filter: self.filter,
                sort: self.sort,
                items: compute_view(&self.raw, &self.applied_query, self.filter, self.sort),
            });
        }

        &self.cache.as_ref().expect("view cache just filled").items
    }

    // === Mutations ===

    /// True iff the current user owns the collection. Advisory: the
    /// server still rejects mutations it does not permit.
    pub fn can_edit(&self, collection: &Collection) -> bool {
        self.session
            .snapshot()
            .profile
            .is_some_and(|profile| profile.id == collection.created_by.id)
    }

    /// Changes a collection's status, patching the local copy on success.
    pub async fn change_status(
        &mut self,
        id: &str,
        new_status: CollectionStatus,
    ) -> Result<(), ApiError> {
        self.api.update_status(id, new_status).await?;
        debug!("collection {} status -> {}", id, new_status);

        if let Some(item) = self.raw.iter_mut().find(|c| c.id == id) {
            item.status = new_status;
        }
        self.bump();
        Ok(())
    }

    /// Deletes a collection, removing the local copy on success.
    pub async fn delete(&mut self, id: &str) -> Result<(), ApiError> {
        self.api.delete_collection(id).await?;

        self.raw.retain(|c| c.id != id);
        self.bump();
        Ok(())
    }

    /// Duplicates a collection and prepends the copy locally from the
    /// caller-supplied data (no refetch). Returns the new id.
    pub async fn duplicate(
        &mut self,
        id: &str,
        title: &str,
        description: &str,
    ) -> Result<String, ApiError> {
        let source = self.raw.iter().find(|c| c.id == id).cloned();
        let new_id = self.api.duplicate_collection(id, title, description).await?;

        if let Some(source) = source {
            let now = Utc::now();
            let copy = Collection {
                id: new_id.clone(),
                title: title.trim().to_string(),
                description: description.trim().to_string(),
                status: CollectionStatus::Draft,
                created_by: source.created_by,
                created_at: now,
                updated_at: now,
                question_count: source.question_count,
                questions: None,
            };
            self.raw.insert(0, copy);
            self.bump();
        }

        Ok(new_id)
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

/// Computes the derived view: sort by key, push archived items after
/// everything else (stable within each group), then filter by status
/// and case-insensitive substring match on title or description.
///
/// Pure function of its inputs; calling it twice yields identical output.
pub fn compute_view(
    raw: &[Collection],
    query: &str,
    filter: StatusFilter,
    sort: SortKey,
) -> Vec<Collection> {
    let mut items: Vec<Collection> = raw.to_vec();

    match sort {
        SortKey::UpdatedNewest => items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        SortKey::UpdatedOldest => items.sort_by(|a, b| a.updated_at.cmp(&b.updated_at)),
        SortKey::CreatedNewest => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::CreatedOldest => items.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortKey::QuestionsHigh => items.sort_by(|a, b| b.question_count.cmp(&a.question_count)),
        SortKey::QuestionsLow => items.sort_by(|a, b| a.question_count.cmp(&b.question_count)),
    }

    // Stable: relative order within each group is preserved.
    items.sort_by_key(|c| c.status == CollectionStatus::Archived);

    let query = query.trim().to_lowercase();
    items.retain(|c| {
        filter.matches(c.status)
            && (query.is_empty()
                || c.title.to_lowercase().contains(&query)
                || c.description.to_lowercase().contains(&query))
    });

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserProfile;
    use chrono::{DateTime, TimeZone, Utc};

    fn owner(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            first_name: "Tess".to_string(),
            last_name: "Archer".to_string(),
            role: "teacher".to_string(),
            receive_notifications: false,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn collection(
        id: &str,
        title: &str,
        status: CollectionStatus,
        created_hour: u32,
        updated_hour: u32,
        question_count: u32,
    ) -> Collection {
        Collection {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{title} description"),
            status,
            created_by: owner("u1"),
            created_at: at(created_hour),
            updated_at: at(updated_hour),
            question_count,
            questions: None,
        }
    }

    fn sample() -> Vec<Collection> {
        vec![
            collection("a", "Algebra", CollectionStatus::Draft, 1, 1, 5),
            collection("b", "Biology", CollectionStatus::Published, 2, 2, 3),
            collection("c", "Chemistry", CollectionStatus::Archived, 3, 3, 9),
        ]
    }

    const ALL_SORTS: [SortKey; 6] = [
        SortKey::UpdatedNewest,
        SortKey::UpdatedOldest,
        SortKey::CreatedNewest,
        SortKey::CreatedOldest,
        SortKey::QuestionsHigh,
        SortKey::QuestionsLow,
    ];

    fn ids(items: &[Collection]) -> Vec<&str> {
        items.iter().map(|c| c.id.as_str()).collect()
    }

    /// Test: derivation is a pure function, identical on repeat calls.
    #[test]
    fn test_view_idempotent_for_all_sort_keys() {
        let raw = sample();
        for sort in ALL_SORTS {
            let first = compute_view(&raw, "", StatusFilter::All, sort);
            let second = compute_view(&raw, "", StatusFilter::All, sort);
            assert_eq!(first, second, "sort {sort:?} not idempotent");
        }
    }

    /// Test: archived items always land after non-archived ones.
    #[test]
    fn test_archived_always_last() {
        let raw = sample();
        for sort in ALL_SORTS {
            let view = compute_view(&raw, "", StatusFilter::All, sort);
            let archived_pos = view
                .iter()
                .position(|c| c.status == CollectionStatus::Archived)
                .unwrap();
            assert_eq!(archived_pos, view.len() - 1, "sort {sort:?}");
        }
    }

    /// Test: updated-newest sorts by timestamp, then archived moves last.
    ///
    /// updated_at: a=t1 < b=t2 < c=t3 with c archived. Timestamp order
    /// gives [c, b, a]; the archived partition yields [b, a, c].
    #[test]
    fn test_updated_newest_with_archived_partition() {
        let view = compute_view(&sample(), "", StatusFilter::All, SortKey::UpdatedNewest);
        assert_eq!(ids(&view), ["b", "a", "c"]);
    }

    /// Test: question-count sorts treat the count ascending/descending.
    #[test]
    fn test_question_count_sort() {
        let raw = vec![
            collection("a", "A", CollectionStatus::Draft, 1, 1, 5),
            collection("b", "B", CollectionStatus::Draft, 2, 2, 0),
            collection("c", "C", CollectionStatus::Draft, 3, 3, 9),
        ];
        let high = compute_view(&raw, "", StatusFilter::All, SortKey::QuestionsHigh);
        assert_eq!(ids(&high), ["c", "a", "b"]);

        let low = compute_view(&raw, "", StatusFilter::All, SortKey::QuestionsLow);
        assert_eq!(ids(&low), ["b", "a", "c"]);
    }

    /// Test: the draft filter yields only drafts under any sort key.
    #[test]
    fn test_draft_filter_only_drafts() {
        let raw = sample();
        for sort in ALL_SORTS {
            let view = compute_view(&raw, "", StatusFilter::Draft, sort);
            assert!(!view.is_empty());
            assert!(view.iter().all(|c| c.status == CollectionStatus::Draft));
        }
    }

    /// Test: the query matches title or description, case-insensitively.
    #[test]
    fn test_query_matches_title_or_description() {
        let raw = sample();

        let by_title = compute_view(&raw, "ALGEBRA", StatusFilter::All, SortKey::UpdatedNewest);
        assert_eq!(ids(&by_title), ["a"]);

        let by_description = compute_view(
            &raw,
            "biology desc",
            StatusFilter::All,
            SortKey::UpdatedNewest,
        );
        assert_eq!(ids(&by_description), ["b"]);

        let none = compute_view(&raw, "geology", StatusFilter::All, SortKey::UpdatedNewest);
        assert!(none.is_empty());
    }

    /// Test: filter and query combine conjunctively.
    #[test]
    fn test_filter_and_query_combine() {
        let raw = sample();
        let view = compute_view(&raw, "biology", StatusFilter::Draft, SortKey::UpdatedNewest);
        assert!(view.is_empty());
    }

    /// Test: stale load completions are dropped.
    #[test]
    fn test_stale_load_completion_dropped() {
        let mut loads = LoadTracker::default();
        let first = loads.begin();
        let second = loads.begin();

        assert!(!loads.complete(first));
        assert!(loads.complete(second));
        // A token can only complete once.
        assert!(!loads.complete(second));
    }
}
