//! Keyed query store with an invalidation-tag index.
//!
//! The store only holds data; it never issues requests. The async runner in
//! the client crate decides when an entry needs a fetch and writes results
//! back through the methods here.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::entry::{CacheEntry, QueryStatus};
use super::patch::{diff_values, revert_changes, PatchRecord};
use super::{CacheKey, Endpoint, Result, Tag};

/// In-memory query cache.
///
/// No TTL and no eviction: entries leave only through [`QueryCache::remove`],
/// [`QueryCache::clear`] or replacement by a newer result.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Maps each provided tag to the keys carrying it.
    tag_index: HashMap<Tag, HashSet<CacheKey>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Decodes the fulfilled value of `key`, if any.
    pub fn data<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        match self.entries.get(key).and_then(|entry| entry.data.as_ref()) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// All keys currently resident for `endpoint`, in key order.
    fn keys_for(&self, endpoint: Endpoint) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|key| key.endpoint() == endpoint)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Arguments of every entry currently resident for `endpoint`.
    pub fn list_args(&self, endpoint: Endpoint) -> Vec<Value> {
        self.keys_for(endpoint)
            .iter()
            .filter_map(|key| self.entries.get(key))
            .map(|entry| entry.args.clone())
            .collect()
    }

    /// Returns true if `key` has no usable value: absent, never fetched,
    /// rejected, or invalidated.
    pub fn needs_fetch(&self, key: &CacheKey) -> bool {
        self.entries.get(key).is_none_or(|entry| !entry.is_fresh())
    }

    /// Records that a request for `key` started. Existing data is kept.
    ///
    /// `tags` are indexed right away, so an invalidation that arrives before
    /// the first result already hits the entry.
    pub fn mark_pending(&mut self, key: &CacheKey, args: Value, tags: Vec<Tag>) {
        let old_tags = {
            let entry = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(args));
            entry.status = QueryStatus::Pending;
            entry.invalidated_while_pending = false;
            std::mem::replace(&mut entry.tags, tags.into_iter().collect::<BTreeSet<_>>())
        };
        self.reindex(key, &old_tags);
    }

    /// Stores a fulfilled value for `key` and replaces its tags.
    ///
    /// The entry stays stale if it was invalidated after its request started.
    pub fn write(&mut self, key: &CacheKey, args: Value, value: Value, tags: Vec<Tag>) {
        let old_tags = {
            let entry = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(args.clone()));
            entry.args = args;
            entry.data = Some(value);
            entry.status = QueryStatus::Fulfilled;
            entry.error = None;
            entry.stale = std::mem::take(&mut entry.invalidated_while_pending);
            std::mem::replace(&mut entry.tags, tags.into_iter().collect::<BTreeSet<_>>())
        };
        self.reindex(key, &old_tags);
    }

    /// Serializes and stores a fulfilled value for `key`.
    pub fn write_typed<A, T>(&mut self, key: &CacheKey, args: &A, value: &T, tags: Vec<Tag>) -> Result<()>
    where
        A: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        let args = serde_json::to_value(args)?;
        let value = serde_json::to_value(value)?;
        self.write(key, args, value, tags);
        Ok(())
    }

    /// Records a failed request. The last fulfilled value stays readable.
    pub fn mark_rejected(&mut self, key: &CacheKey, args: Value, error: impl Into<String>) {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(args));
        entry.status = QueryStatus::Rejected;
        entry.error = Some(error.into());
        entry.invalidated_while_pending = false;
    }

    /// Runs `recipe` over the decoded value of `key` and records what changed.
    ///
    /// Returns `Ok(None)` when the entry holds no value or the recipe changed
    /// nothing; no patch is recorded in either case.
    pub fn update_data<T, F>(&mut self, key: &CacheKey, recipe: F) -> Result<Option<PatchRecord>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let Some(current) = self.entries.get_mut(key).and_then(|e| e.data.as_mut()) else {
            return Ok(None);
        };

        let mut typed: T = serde_json::from_value(current.clone())?;
        recipe(&mut typed);
        let updated = serde_json::to_value(&typed)?;

        let changes = diff_values(current, &updated);
        if changes.is_empty() {
            return Ok(None);
        }
        *current = updated;

        tracing::debug!(key = %key, changes = changes.len(), "applied cache patch");
        Ok(Some(PatchRecord {
            key: key.clone(),
            changes,
        }))
    }

    /// Restores the before-values recorded in `patch`.
    ///
    /// Returns the number of leaves restored; zero if the entry is gone.
    pub fn undo(&mut self, patch: &PatchRecord) -> usize {
        let Some(current) = self.entries.get_mut(&patch.key).and_then(|e| e.data.as_mut()) else {
            return 0;
        };
        let restored = revert_changes(current, &patch.changes);
        tracing::debug!(key = %patch.key, restored, "reverted cache patch");
        restored
    }

    /// Marks every entry carrying `tag` as stale and returns their keys.
    pub fn invalidate(&mut self, tag: &Tag) -> Vec<CacheKey> {
        let mut hit: BTreeSet<CacheKey> = BTreeSet::new();
        for (provided, keys) in &self.tag_index {
            if tag.matches(provided) {
                hit.extend(keys.iter().cloned());
            }
        }

        for key in &hit {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.stale = true;
                if entry.is_pending() {
                    entry.invalidated_while_pending = true;
                }
            }
        }

        tracing::debug!(tag = %tag, entries = hit.len(), "invalidated tag");
        hit.into_iter().collect()
    }

    /// Registers a subscriber for `key` and returns the new count.
    pub fn subscribe(&mut self, key: &CacheKey, args: Value) -> usize {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(args));
        entry.subscribers += 1;
        entry.subscribers
    }

    /// Removes a subscriber from `key` and returns the remaining count.
    pub fn unsubscribe(&mut self, key: &CacheKey) -> usize {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                entry.subscribers
            }
            None => 0,
        }
    }

    /// Keys of stale entries that still have subscribers.
    pub fn stale_subscribed(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.stale && entry.subscribers > 0)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            self.unindex(tag, key);
        }
        Some(entry)
    }

    /// Drops every entry, e.g. on logout.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.tag_index.clear();
    }

    fn reindex(&mut self, key: &CacheKey, old_tags: &BTreeSet<Tag>) {
        for tag in old_tags {
            self.unindex(tag, key);
        }
        let new_tags: Vec<Tag> = self
            .entries
            .get(key)
            .map(|entry| entry.tags.iter().cloned().collect())
            .unwrap_or_default();
        for tag in new_tags {
            self.tag_index.entry(tag).or_default().insert(key.clone());
        }
    }

    fn unindex(&mut self, tag: &Tag, key: &CacheKey) {
        if let Some(keys) = self.tag_index.get_mut(tag) {
            keys.remove(key);
            if keys.is_empty() {
                self.tag_index.remove(tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{task_tag, todolist_tag, TagKind};
    use crate::todolist::{GetTasksArgs, GetTasksResponse, Task, TaskPriority, TaskStatus};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn todolist_a() -> Uuid {
        Uuid::from_u128(0xA)
    }

    fn todolist_b() -> Uuid {
        Uuid::from_u128(0xB)
    }

    fn task(id: u128, todolist_id: Uuid, status: TaskStatus) -> Task {
        Task {
            id: Uuid::from_u128(id),
            title: format!("Task {}", id),
            status,
            todo_list_id: todolist_id,
            order: 0,
            added_date: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            deadline: None,
            description: None,
            priority: TaskPriority::Low,
            start_date: None,
        }
    }

    fn seed_page(cache: &mut QueryCache, todolist_id: Uuid, page: u32, tasks: Vec<Task>) -> CacheKey {
        let args = GetTasksArgs::new(todolist_id, page);
        let key = CacheKey::new(Endpoint::GetTasks, &args).unwrap();
        let response = GetTasksResponse {
            total_count: tasks.len() as u64,
            items: tasks,
            error: None,
        };
        cache
            .write_typed(&key, &args, &response, vec![task_tag(todolist_id)])
            .unwrap();
        key
    }

    #[test]
    fn test_get_absent() {
        let cache = QueryCache::new();
        let key = CacheKey::new(Endpoint::GetTodolists, &()).unwrap();
        assert!(cache.get(&key).is_none());
        assert!(cache.needs_fetch(&key));
    }

    #[test]
    fn test_write_then_read() {
        let mut cache = QueryCache::new();
        let key = seed_page(&mut cache, todolist_a(), 1, vec![task(1, todolist_a(), TaskStatus::New)]);

        let page: GetTasksResponse = cache.data(&key).unwrap().unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!cache.needs_fetch(&key));
        assert_eq!(cache.get(&key).unwrap().status, QueryStatus::Fulfilled);
    }

    #[test]
    fn test_list_args_only_for_endpoint() {
        let mut cache = QueryCache::new();
        seed_page(&mut cache, todolist_a(), 1, vec![]);
        seed_page(&mut cache, todolist_a(), 2, vec![]);
        seed_page(&mut cache, todolist_b(), 1, vec![]);
        let todolists = CacheKey::new(Endpoint::GetTodolists, &()).unwrap();
        cache.write(&todolists, Value::Null, serde_json::json!([]), vec![todolist_tag()]);

        let args: Vec<GetTasksArgs> = cache
            .list_args(Endpoint::GetTasks)
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();

        assert_eq!(args.len(), 3);
        assert_eq!(
            args.iter().filter(|a| a.todolist_id == todolist_a()).count(),
            2
        );
        assert_eq!(cache.list_args(Endpoint::GetTodolists).len(), 1);
    }

    #[test]
    fn test_invalidate_marks_only_tagged_entries_stale() {
        let mut cache = QueryCache::new();
        let a1 = seed_page(&mut cache, todolist_a(), 1, vec![]);
        let a2 = seed_page(&mut cache, todolist_a(), 2, vec![]);
        let b1 = seed_page(&mut cache, todolist_b(), 1, vec![]);

        let hit = cache.invalidate(&task_tag(todolist_a()));

        assert_eq!(hit.len(), 2);
        assert!(cache.needs_fetch(&a1));
        assert!(cache.needs_fetch(&a2));
        assert!(!cache.needs_fetch(&b1));
        // Stale entries keep their data until the refetch lands.
        assert!(cache.get(&a1).unwrap().data.is_some());
    }

    #[test]
    fn test_invalidate_kind_hits_every_id() {
        let mut cache = QueryCache::new();
        seed_page(&mut cache, todolist_a(), 1, vec![]);
        seed_page(&mut cache, todolist_b(), 1, vec![]);

        let hit = cache.invalidate(&Tag::all(TagKind::Task));
        assert_eq!(hit.len(), 2);
    }

    #[test]
    fn test_rewrite_clears_stale_flag() {
        let mut cache = QueryCache::new();
        let key = seed_page(&mut cache, todolist_a(), 1, vec![]);
        cache.invalidate(&task_tag(todolist_a()));
        assert!(cache.needs_fetch(&key));

        seed_page(&mut cache, todolist_a(), 1, vec![]);
        assert!(!cache.needs_fetch(&key));
    }

    #[test]
    fn test_pending_entry_is_hit_by_invalidation() {
        let mut cache = QueryCache::new();
        let args = GetTasksArgs::new(todolist_a(), 1);
        let key = CacheKey::new(Endpoint::GetTasks, &args).unwrap();
        let args = serde_json::to_value(&args).unwrap();

        cache.mark_pending(&key, args.clone(), vec![task_tag(todolist_a())]);
        assert_eq!(cache.invalidate(&task_tag(todolist_a())), vec![key.clone()]);

        cache.write(&key, args, serde_json::json!({"items": []}), vec![task_tag(todolist_a())]);
        assert!(cache.get(&key).unwrap().data.is_some());
        assert!(cache.needs_fetch(&key));
    }

    #[test]
    fn test_invalidation_during_refetch_keeps_entry_stale() {
        let mut cache = QueryCache::new();
        let key = seed_page(&mut cache, todolist_a(), 1, vec![]);
        let args = cache.get(&key).unwrap().args.clone();
        cache.invalidate(&task_tag(todolist_a()));

        cache.mark_pending(&key, args.clone(), vec![task_tag(todolist_a())]);
        cache.invalidate(&task_tag(todolist_a()));
        cache.write(&key, args.clone(), serde_json::json!({"items": []}), vec![task_tag(todolist_a())]);
        assert!(cache.needs_fetch(&key));

        // A refetch with no invalidation in between is fresh again.
        cache.mark_pending(&key, args.clone(), vec![task_tag(todolist_a())]);
        cache.write(&key, args, serde_json::json!({"items": []}), vec![task_tag(todolist_a())]);
        assert!(!cache.needs_fetch(&key));
    }

    #[test]
    fn test_rejected_keeps_previous_data() {
        let mut cache = QueryCache::new();
        let key = seed_page(&mut cache, todolist_a(), 1, vec![task(1, todolist_a(), TaskStatus::New)]);

        cache.mark_pending(&key, Value::Null, vec![task_tag(todolist_a())]);
        assert!(cache.get(&key).unwrap().is_pending());
        cache.mark_rejected(&key, Value::Null, "timeout");

        let entry = cache.get(&key).unwrap();
        assert_eq!(entry.status, QueryStatus::Rejected);
        assert_eq!(entry.error.as_deref(), Some("timeout"));
        assert!(entry.data.is_some());
        assert!(cache.needs_fetch(&key));
    }

    #[test]
    fn test_update_data_and_undo_round_trip() {
        let mut cache = QueryCache::new();
        let target = task(1, todolist_a(), TaskStatus::New);
        let key = seed_page(
            &mut cache,
            todolist_a(),
            1,
            vec![target.clone(), task(2, todolist_a(), TaskStatus::New)],
        );
        let before = cache.get(&key).unwrap().data.clone();

        let patch = cache
            .update_data::<GetTasksResponse, _>(&key, |page| {
                if let Some(task) = page.find_mut(target.id) {
                    task.status = TaskStatus::Completed;
                }
            })
            .unwrap()
            .expect("patch recorded");

        let page: GetTasksResponse = cache.data(&key).unwrap().unwrap();
        assert_eq!(page.find(target.id).unwrap().status, TaskStatus::Completed);
        assert_eq!(patch.changes.len(), 1);

        assert_eq!(cache.undo(&patch), 1);
        assert_eq!(cache.get(&key).unwrap().data, before);
    }

    #[test]
    fn test_update_data_without_match_records_nothing() {
        let mut cache = QueryCache::new();
        let key = seed_page(&mut cache, todolist_a(), 1, vec![task(1, todolist_a(), TaskStatus::New)]);

        let patch = cache
            .update_data::<GetTasksResponse, _>(&key, |page| {
                if let Some(task) = page.find_mut(Uuid::from_u128(99)) {
                    task.status = TaskStatus::Completed;
                }
            })
            .unwrap();

        assert!(patch.is_none());
    }

    #[test]
    fn test_update_data_on_absent_entry() {
        let mut cache = QueryCache::new();
        let key = CacheKey::new(Endpoint::GetTasks, &GetTasksArgs::new(todolist_a(), 1)).unwrap();

        let patch = cache
            .update_data::<GetTasksResponse, _>(&key, |page| page.total_count = 7)
            .unwrap();

        assert!(patch.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_undo_after_remove_is_noop() {
        let mut cache = QueryCache::new();
        let key = seed_page(&mut cache, todolist_a(), 1, vec![task(1, todolist_a(), TaskStatus::New)]);
        let patch = cache
            .update_data::<GetTasksResponse, _>(&key, |page| page.total_count = 9)
            .unwrap()
            .unwrap();

        cache.remove(&key);
        assert_eq!(cache.undo(&patch), 0);
        assert!(cache.invalidate(&task_tag(todolist_a())).is_empty());
    }

    #[test]
    fn test_subscriber_counts() {
        let mut cache = QueryCache::new();
        let key = seed_page(&mut cache, todolist_a(), 1, vec![]);

        assert_eq!(cache.subscribe(&key, Value::Null), 1);
        assert_eq!(cache.subscribe(&key, Value::Null), 2);
        assert_eq!(cache.unsubscribe(&key), 1);

        cache.invalidate(&task_tag(todolist_a()));
        assert_eq!(cache.stale_subscribed(), vec![key.clone()]);

        assert_eq!(cache.unsubscribe(&key), 0);
        assert_eq!(cache.unsubscribe(&key), 0);
        assert!(cache.stale_subscribed().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cache = QueryCache::new();
        seed_page(&mut cache, todolist_a(), 1, vec![]);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.invalidate(&task_tag(todolist_a())).is_empty());
    }
}
