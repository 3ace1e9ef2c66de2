//! Page-cache provider for browsing a finite, pre-fetched list.
//!
//! Pages are materialized lazily, ten rows at a time, and memoized so that
//! paging back never re-derives anything.

use chrono::Utc;

use crate::error::RemoteError;
use crate::snapshot::{Collection, Row, Snapshot};
use crate::util::{format_time_since, local_time_with};

use super::SnapshotProvider;

pub const PAGE_LENGTH: usize = 10;

/// What the list holds; decides the row collection and the date field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    AppVersions,
    TerminatedEnvironments,
}

impl PageKind {
    pub fn collection(&self) -> Collection {
        match self {
            PageKind::AppVersions => Collection::AppVersions,
            PageKind::TerminatedEnvironments => Collection::Environments,
        }
    }

    fn date_key(&self) -> &'static str {
        match self {
            PageKind::AppVersions => "DateCreated",
            PageKind::TerminatedEnvironments => "DateUpdated",
        }
    }

    fn date_format(&self) -> &'static str {
        match self {
            PageKind::AppVersions => "%Y/%m/%d %H:%M",
            PageKind::TerminatedEnvironments => "%Y/%m/%d %H:%M %Z",
        }
    }
}

/// Item shown as `#number` in a newest-first list numbered from `len` down
/// to 1.
pub fn nth_newest<T>(items: &[T], number: usize) -> Option<&T> {
    if number == 0 || number > items.len() {
        return None;
    }
    items.get(items.len() - number)
}

pub struct PagedProvider {
    kind: PageKind,
    environment: Row,
    items: Vec<Row>,
    /// Items not yet materialized into a page.
    remaining: usize,
    history: Vec<Vec<Row>>,
    /// 1-based index into `history` of the page on screen; 0 before the
    /// first page.
    current_page: usize,
}

impl PagedProvider {
    /// `items` must be newest first; they are numbered from `len` down to 1.
    pub fn new(kind: PageKind, environment: Row, items: Vec<Row>) -> Result<Self, RemoteError> {
        if kind == PageKind::TerminatedEnvironments && items.is_empty() {
            return Err(RemoteError::NotFound(
                "No terminated environments found.\nEnvironments are available for six weeks after termination."
                    .to_string(),
            ));
        }
        Ok(Self {
            kind,
            environment,
            remaining: items.len(),
            items,
            history: Vec::new(),
            current_page: 0,
        })
    }

    #[cfg(test)]
    fn pages_materialized(&self) -> usize {
        self.history.len()
    }

    /// Materializes the next page, or re-serves the current one when the
    /// list is exhausted.
    pub fn get_version_data(&mut self) -> Snapshot {
        if self.remaining == 0 {
            return self.table_data();
        }
        let start = self.items.len() - self.remaining;
        let count = self.remaining.min(PAGE_LENGTH);
        let now = Utc::now();
        let date_key = self.kind.date_key();
        let page: Vec<Row> = self.items[start..start + count]
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mut row = item.clone();
                row.set("DeployNum", self.remaining - i);
                match item.time(date_key) {
                    Some(date) => {
                        row.set("SinceCreated", format_time_since(date, now));
                        row.set(date_key, local_time_with(date, self.kind.date_format()));
                    }
                    None => {
                        row.remove("SinceCreated");
                        row.remove(date_key);
                    }
                }
                row
            })
            .collect();
        self.remaining -= count;
        self.history.push(page);
        self.current_page = self.history.len();
        self.table_data()
    }

    pub fn get_next_page_data(&mut self) -> Snapshot {
        if self.current_page < self.history.len() {
            self.current_page += 1;
            return self.table_data();
        }
        self.get_version_data()
    }

    pub fn get_previous_page_data(&mut self) -> Snapshot {
        if self.current_page > 1 {
            self.current_page -= 1;
        }
        self.table_data()
    }

    fn table_data(&self) -> Snapshot {
        let rows = self
            .current_page
            .checked_sub(1)
            .and_then(|i| self.history.get(i))
            .cloned()
            .unwrap_or_default();
        Snapshot::new(self.kind.collection(), self.environment.clone(), rows)
    }
}

impl SnapshotProvider for PagedProvider {
    fn get_fresh_data(&mut self) -> Snapshot {
        if self.current_page == 0 {
            return self.get_version_data();
        }
        self.table_data()
    }

    fn next_page(&mut self) -> Option<Snapshot> {
        Some(self.get_next_page_data())
    }

    fn previous_page(&mut self) -> Option<Snapshot> {
        Some(self.get_previous_page_data())
    }

    fn is_live(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn versions(n: usize) -> Vec<Row> {
        let now = Utc::now();
        (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.set("VersionLabel", format!("v{}", n - i));
                row.set("DateCreated", now - Duration::days(i as i64 + 1));
                row
            })
            .collect()
    }

    fn numbers(snapshot: &Snapshot) -> Vec<i64> {
        snapshot.rows.iter().filter_map(|r| r.int("DeployNum")).collect()
    }

    #[test]
    fn test_pages_count_down() {
        let mut provider = PagedProvider::new(PageKind::AppVersions, Row::new(), versions(23)).unwrap();
        let first = provider.get_fresh_data();
        assert_eq!(numbers(&first), (14..=23).rev().collect::<Vec<_>>());
        assert_eq!(first.rows[0].text("SinceCreated"), Some("1 day"));
        assert!(first.rows[0].text("DateCreated").is_some());

        let second = provider.get_next_page_data();
        assert_eq!(numbers(&second), (4..=13).rev().collect::<Vec<_>>());
        let third = provider.get_next_page_data();
        assert_eq!(numbers(&third), vec![3, 2, 1]);
    }

    #[test]
    fn test_next_past_end_is_noop() {
        let mut provider = PagedProvider::new(PageKind::AppVersions, Row::new(), versions(12)).unwrap();
        provider.get_fresh_data();
        let last = provider.get_next_page_data();
        assert_eq!(provider.get_next_page_data(), last);
        assert_eq!(provider.pages_materialized(), 2);
        assert_eq!(provider.current_page, 2);
    }

    #[test]
    fn test_previous_is_served_from_history() {
        let mut provider = PagedProvider::new(PageKind::AppVersions, Row::new(), versions(25)).unwrap();
        let first = provider.get_fresh_data();
        provider.get_next_page_data();
        provider.get_next_page_data();
        assert_eq!(provider.pages_materialized(), 3);

        provider.get_previous_page_data();
        let back = provider.get_previous_page_data();
        assert_eq!(back, first);
        assert_eq!(provider.get_previous_page_data(), first);

        // Forward again reuses memoized pages.
        provider.get_next_page_data();
        provider.get_next_page_data();
        assert_eq!(provider.pages_materialized(), 3);
        assert_eq!(numbers(&provider.get_fresh_data()), (1..=5).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_nth_newest_counts_down() {
        let items = versions(5);
        assert_eq!(nth_newest(&items, 5).and_then(|r| r.text("VersionLabel")), Some("v5"));
        assert_eq!(nth_newest(&items, 1).and_then(|r| r.text("VersionLabel")), Some("v1"));
        assert!(nth_newest(&items, 0).is_none());
        assert!(nth_newest(&items, 6).is_none());
    }

    #[test]
    fn test_empty_terminated_list_is_not_found() {
        let err = PagedProvider::new(PageKind::TerminatedEnvironments, Row::new(), Vec::new())
            .err()
            .unwrap();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[test]
    fn test_missing_dates_render_absent() {
        let mut row = Row::new();
        row.set("EnvironmentId", "e-1");
        let mut provider = PagedProvider::new(PageKind::TerminatedEnvironments, Row::new(), vec![row]).unwrap();
        let page = provider.get_fresh_data();
        assert_eq!(page.collection, Collection::Environments);
        assert!(!page.rows[0].contains("SinceCreated"));
        assert_eq!(page.rows[0].display("DateUpdated"), "-");
    }
}
