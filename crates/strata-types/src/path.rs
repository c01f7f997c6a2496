//! The literal key layout inside the blob store.
//!
//! Keys are `/`-separated strings. These helpers are the only place paths
//! are assembled, so the layout stays compatible with data written by
//! earlier versions.

use crate::checkpoint::Checkpoint;

/// Prefix reserved for checkpoints that failed to load.
pub const FAILED_MARKER_PREFIX: &str = "0__err_";

/// Blob written last into a versioned checkpoint once all of its resources
/// are saved. Names starting with `.` are never resource keys.
pub const COMMIT_MARKER: &str = ".committed";

/// Join two path fragments with exactly one `/`.
pub fn join(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{child}"),
    }
}

/// Directory holding the resources of `checkpoint`.
pub fn checkpoint_dir(root: &str, checkpoint: Checkpoint) -> String {
    if checkpoint.is_live() {
        root.trim_end_matches('/').to_string()
    } else {
        join(root, &checkpoint.to_string())
    }
}

/// Directory a failed checkpoint is moved to.
pub fn failed_dir(root: &str, checkpoint: Checkpoint) -> String {
    join(root, &checkpoint.failed_marker())
}

/// Key of one resource inside a checkpoint directory.
pub fn resource_key(dir: &str, namespace: &str, resource: &str) -> String {
    join(dir, &format!("{namespace}_{resource}"))
}

/// Key of the commit marker inside a checkpoint directory.
pub fn commit_key(dir: &str) -> String {
    join(dir, COMMIT_MARKER)
}

/// The first path segment of `path` below `prefix`, if `path` lies under it.
///
/// ```
/// use strata_types::path::child_name;
///
/// assert_eq!(child_name("idx", "idx/17/graph_nodes"), Some("17"));
/// assert_eq!(child_name("idx", "idx/graph_nodes"), Some("graph_nodes"));
/// assert_eq!(child_name("idx", "idx2/graph_nodes"), None);
/// ```
pub fn child_name<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    let rest = if prefix.is_empty() {
        path
    } else {
        path.strip_prefix(prefix)?.strip_prefix('/')?
    };
    rest.split('/').next().filter(|segment| !segment.is_empty())
}
