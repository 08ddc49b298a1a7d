//! Object storage access for maintenance operations.
//!
//! All filesystem interaction goes through [`object_store::ObjectStore`];
//! list/move/delete calls are synchronous from the operation's point of view
//! and carry no timeouts of their own. Callers that need cancellation wrap
//! the whole maintenance run.

use std::sync::Arc;

use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{DynObjectStore, ObjectMeta, ObjectStore};

use crate::errors::MaintenanceResult;

pub mod paths;

/// Sharable reference to [`ObjectStore`]
pub type ObjectStoreRef = Arc<DynObjectStore>;

/// List files under `prefix` and collect those matching the predicate.
///
/// With `recursive` set, the full subtree is walked; otherwise only the
/// immediate children of `prefix` are considered (delimiter listing). A
/// prefix with no objects under it yields an empty result, not an error.
pub(crate) async fn list_files<F>(
    store: &dyn ObjectStore,
    prefix: &Path,
    recursive: bool,
    predicate: F,
) -> MaintenanceResult<Vec<ObjectMeta>>
where
    F: Fn(&ObjectMeta) -> bool,
{
    let entries: Vec<ObjectMeta> = if recursive {
        store.list(Some(prefix)).try_collect().await?
    } else {
        store.list_with_delimiter(Some(prefix)).await?.objects
    };
    Ok(entries.into_iter().filter(|meta| predicate(meta)).collect())
}
