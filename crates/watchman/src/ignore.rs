use shotwatch_core::classify::{is_excluded, is_excluded_name};
use std::path::{Path, PathBuf};

/// A watched directory as given and as the OS reports it, since notification
/// backends may resolve symlinks in the prefix.
#[derive(Debug, Clone)]
struct Root {
    given: PathBuf,
    canonical: PathBuf,
}

impl Root {
    fn new(path: &Path) -> Self {
        Self {
            given: path.to_path_buf(),
            canonical: std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
        }
    }

    fn strip<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.given).or_else(|_| path.strip_prefix(&self.canonical)).ok()
    }

    fn is(&self, path: &Path) -> bool {
        path == self.given || path == self.canonical
    }
}

/// The set of roots the pump routes events against.
#[derive(Debug, Default)]
pub(crate) struct WatchRoots {
    task_roots: Vec<Root>,
    discovery_root: Option<Root>,
    task_depth: usize,
}

impl WatchRoots {
    pub(crate) fn new(task_depth: usize) -> Self {
        Self { task_depth, ..Default::default() }
    }

    pub(crate) fn has_task_root(&self, path: &Path) -> bool {
        self.task_roots.iter().any(|r| r.is(path))
    }

    pub(crate) fn add_task_root(&mut self, path: &Path) {
        if !self.has_task_root(path) {
            self.task_roots.push(Root::new(path));
        }
    }

    pub(crate) fn remove_task_root(&mut self, path: &Path) -> bool {
        let before = self.task_roots.len();
        self.task_roots.retain(|r| !r.is(path));
        self.task_roots.len() != before
    }

    pub(crate) fn discovery_root(&self) -> Option<&Path> {
        self.discovery_root.as_ref().map(|r| r.given.as_path())
    }

    pub(crate) fn set_discovery_root(&mut self, path: &Path) {
        self.discovery_root = Some(Root::new(path));
    }

    /// A file event is accepted when it lies under a task root, no deeper
    /// than `task_depth` directories below it, on a visible non-cache path.
    pub(crate) fn accepts_file(&self, path: &Path) -> bool {
        self.task_roots.iter().any(|root| match root.strip(path) {
            Some(relative) if relative.as_os_str().is_empty() => false,
            Some(relative) => relative.components().count() <= self.task_depth + 1 && !is_excluded(relative),
            None => false,
        })
    }

    /// True for a visible, non-cache entry directly inside the discovery root.
    pub(crate) fn is_discovery_child(&self, path: &Path) -> bool {
        let Some(root) = &self.discovery_root else {
            return false;
        };
        match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => root.is(parent) && !is_excluded_name(name),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_depth_is_limited_below_task_roots() {
        let mut roots = WatchRoots::new(2);
        roots.add_task_root(Path::new("/data/vid_1"));

        assert!(roots.accepts_file(Path::new("/data/vid_1/shot_01.jpg")));
        assert!(roots.accepts_file(Path::new("/data/vid_1/a/shot_01.jpg")));
        assert!(roots.accepts_file(Path::new("/data/vid_1/a/b/shot_01.jpg")));
        assert!(!roots.accepts_file(Path::new("/data/vid_1/a/b/c/shot_01.jpg")));
        assert!(!roots.accepts_file(Path::new("/data/vid_1")));
        assert!(!roots.accepts_file(Path::new("/data/vid_2/shot_01.jpg")));
    }

    #[test]
    fn hidden_and_cache_paths_are_rejected() {
        let mut roots = WatchRoots::new(2);
        roots.add_task_root(Path::new("/data/vid_1"));

        assert!(!roots.accepts_file(Path::new("/data/vid_1/cache/shot_01.jpg")));
        assert!(!roots.accepts_file(Path::new("/data/vid_1/.shot_01.jpg.swp")));
    }

    #[test]
    fn discovery_children_are_immediate_only() {
        let mut roots = WatchRoots::new(2);
        assert!(!roots.is_discovery_child(Path::new("/data/vid_1")));

        roots.set_discovery_root(Path::new("/data"));
        assert!(roots.is_discovery_child(Path::new("/data/vid_1")));
        assert!(!roots.is_discovery_child(Path::new("/data/vid_1/sub")));
        assert!(!roots.is_discovery_child(Path::new("/data")));
        assert!(!roots.is_discovery_child(Path::new("/data/.trash")));
        assert!(!roots.is_discovery_child(Path::new("/data/cache")));
    }

    #[test]
    fn task_roots_are_idempotent() {
        let mut roots = WatchRoots::new(2);
        roots.add_task_root(Path::new("/data/vid_1"));
        roots.add_task_root(Path::new("/data/vid_1"));
        assert!(roots.remove_task_root(Path::new("/data/vid_1")));
        assert!(!roots.has_task_root(Path::new("/data/vid_1")));
    }
}
