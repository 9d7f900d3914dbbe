//! Speculative cache edits applied before a mutation settles.
//!
//! Every function takes the cache lock once and releases it before
//! returning, so each apply or revert step is atomic with respect to other
//! tasks.

use serde_json::Value;
use tokio::sync::RwLock;
use todosync_core::cache::{CacheKey, Endpoint, PatchRecord, QueryCache};
use todosync_core::todolist::{
    DomainTodolist, EntityStatus, GetTasksArgs, GetTasksResponse, Task, UpdateTaskModel,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// The patches one mutation applied. Owned by that mutation only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimisticPatches {
    records: Vec<PatchRecord>,
}

impl OptimisticPatches {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PatchRecord] {
        &self.records
    }
}

/// Cached `getTasks` keys whose arguments name `todolist_id`.
fn task_page_keys(cache: &QueryCache, todolist_id: Uuid) -> Vec<CacheKey> {
    cache
        .list_args(Endpoint::GetTasks)
        .into_iter()
        .filter(|args| {
            serde_json::from_value::<GetTasksArgs>(args.clone())
                .is_ok_and(|args| args.todolist_id == todolist_id)
        })
        .map(|args| CacheKey::from_value(Endpoint::GetTasks, &args))
        .collect()
}

/// Key of the cached todolists collection.
fn todolists_key() -> CacheKey {
    CacheKey::from_value(Endpoint::GetTodolists, &Value::Null)
}

/// Applies `model` to the task on every cached page of `todolist_id`.
///
/// Pages that do not hold the task are left alone and record nothing.
pub async fn patch_task_in_pages(
    cache: &RwLock<QueryCache>,
    todolist_id: Uuid,
    task_id: Uuid,
    model: &UpdateTaskModel,
) -> Result<OptimisticPatches> {
    let mut cache = cache.write().await;
    let mut records = Vec::new();

    for key in task_page_keys(&cache, todolist_id) {
        let patch = cache.update_data::<GetTasksResponse, _>(&key, |page| {
            if let Some(task) = page.find_mut(task_id) {
                model.apply_to(task);
            }
        })?;
        records.extend(patch);
    }

    debug!(%todolist_id, %task_id, pages = records.len(), "patched cached task");
    Ok(OptimisticPatches { records })
}

/// Restores every field `patches` touched. Returns the number restored.
pub async fn rollback(cache: &RwLock<QueryCache>, patches: &OptimisticPatches) -> usize {
    let mut cache = cache.write().await;
    let restored: usize = patches
        .records
        .iter()
        .rev()
        .map(|record| cache.undo(record))
        .sum();
    debug!(patches = patches.len(), restored, "rolled back optimistic patches");
    restored
}

/// Writes the server's copy of `task` over every cached page holding it.
///
/// Returns the number of pages that changed.
pub async fn reconcile_task(
    cache: &RwLock<QueryCache>,
    todolist_id: Uuid,
    task: &Task,
) -> Result<usize> {
    let mut cache = cache.write().await;
    let mut changed = 0;

    for key in task_page_keys(&cache, todolist_id) {
        let patch = cache.update_data::<GetTasksResponse, _>(&key, |page| {
            if let Some(cached) = page.find_mut(task.id) {
                *cached = task.clone();
            }
        })?;
        if patch.is_some() {
            changed += 1;
        }
    }

    Ok(changed)
}

/// Finds the cached copy of a task on any page of `todolist_id`.
pub async fn find_cached_task(
    cache: &RwLock<QueryCache>,
    todolist_id: Uuid,
    task_id: Uuid,
) -> Result<Option<Task>> {
    let cache = cache.read().await;
    for key in task_page_keys(&cache, todolist_id) {
        if let Some(page) = cache.data::<GetTasksResponse>(&key)? {
            if let Some(task) = page.find(task_id) {
                return Ok(Some(task.clone()));
            }
        }
    }
    Ok(None)
}

/// Sets the client-side status of one cached todolist.
///
/// Returns `None` when the collection is not cached, the todolist is not in
/// it, or it already had that status.
pub async fn set_todolist_status(
    cache: &RwLock<QueryCache>,
    todolist_id: Uuid,
    status: EntityStatus,
) -> Result<Option<PatchRecord>> {
    let mut cache = cache.write().await;
    let patch = cache.update_data::<Vec<DomainTodolist>, _>(&todolists_key(), |todolists| {
        if let Some(todolist) = todolists.iter_mut().find(|t| t.id() == todolist_id) {
            todolist.entity_status = status;
        }
    })?;
    Ok(patch)
}

/// Restores a single patch record, if there is one.
pub async fn undo_record(cache: &RwLock<QueryCache>, record: Option<&PatchRecord>) -> usize {
    match record {
        Some(record) => cache.write().await.undo(record),
        None => 0,
    }
}
