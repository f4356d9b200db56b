use nodupe_types::FileRecord;

/// Resolves a group of duplicate [`FileRecord`]s into keeper-first order.
/// The first element after sorting is the keeper. `Interactive` is resolved
/// by an injected callback rather than a comparator.
pub trait KeeperStrategy {
    /// Reorders `group` in place so `group[0]` is the chosen keeper.
    fn order(&self, group: &mut [FileRecord]);
}

pub struct Newest;

impl KeeperStrategy for Newest {
    fn order(&self, group: &mut [FileRecord]) {
        group.sort_by(|a, b| {
            b.modified_time
                .cmp(&a.modified_time)
                .then_with(|| a.path.len().cmp(&b.path.len()))
                .then_with(|| a.path.cmp(&b.path))
        });
    }
}

pub struct Oldest;

impl KeeperStrategy for Oldest {
    fn order(&self, group: &mut [FileRecord]) {
        group.sort_by(|a, b| {
            a.modified_time
                .cmp(&b.modified_time)
                .then_with(|| a.path.len().cmp(&b.path.len()))
                .then_with(|| a.path.cmp(&b.path))
        });
    }
}

pub struct ShortestPath;

impl KeeperStrategy for ShortestPath {
    fn order(&self, group: &mut [FileRecord]) {
        group.sort_by(|a, b| {
            a.path
                .len()
                .cmp(&b.path.len())
                .then_with(|| b.modified_time.cmp(&a.modified_time))
                .then_with(|| a.path.cmp(&b.path))
        });
    }
}

/// Per-group callback for the `interactive` strategy. A caller (a TUI, most
/// naturally) supplies the closure, picking an index into `group`.
pub trait InteractiveChooser {
    fn choose_keeper(&self, group: &[FileRecord]) -> usize;
}

pub struct Interactive<'a> {
    pub chooser: &'a dyn InteractiveChooser,
}

impl KeeperStrategy for Interactive<'_> {
    fn order(&self, group: &mut [FileRecord]) {
        let idx = self.chooser.choose_keeper(group).min(group.len() - 1);
        group.swap(0, idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(path: &str, mtime: i64) -> FileRecord {
        let mut r = FileRecord::new_discovered(path.to_string(), 5, mtime, 0);
        r.full_hash = Some("deadbeef".into());
        r
    }

    #[test]
    fn newest_breaks_ties_by_shortest_then_lexicographic_path() {
        let mut group = vec![rec("/a/zz.txt", 100), rec("/a/y.txt", 200), rec("/a/x.txt", 150)];
        Newest.order(&mut group);
        assert_eq!(group[0].path, "/a/y.txt");
    }

    #[test]
    fn oldest_is_symmetric_to_newest() {
        let mut group = vec![rec("/a/zz.txt", 100), rec("/a/y.txt", 200), rec("/a/x.txt", 150)];
        Oldest.order(&mut group);
        assert_eq!(group[0].path, "/a/zz.txt");
    }

    #[test]
    fn shortest_path_ties_break_by_greatest_mtime() {
        let mut group = vec![rec("/aa/xx.txt", 100), rec("/bb/yy.txt", 200)];
        ShortestPath.order(&mut group);
        assert_eq!(group[0].path, "/bb/yy.txt");
    }
}
