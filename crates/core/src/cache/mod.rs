//! Query cache: keyed results, invalidation tags and reversible patches.

mod entry;
mod error;
mod keys;
mod patch;
mod store;

pub use entry::{CacheEntry, QueryStatus};
pub use error::{CacheError, Result};
pub use keys::{
    captcha_tag, serialize_args, task_tag, todolist_tag, CacheKey, Endpoint, EndpointConfig, Tag,
    TagKind,
};
pub use patch::{diff_values, revert_changes, FieldChange, PatchRecord, PathSegment};
pub use store::QueryCache;
