//! Message listing: picks SORT, THREAD or a client-side fallback and
//! paginates the result.
//!
//! | request    | THREAD=alg | SORT | commands                       |
//! |------------|------------|------|--------------------------------|
//! | threaded   | yes        | any  | `UID THREAD`, page, `UID FETCH` |
//! | any        | no/unused  | yes  | `UID SORT`, page, `UID FETCH`   |
//! | any        | no/unused  | no   | `UID SEARCH`, `UID FETCH`, sort, page |
//!
//! All three produce the same order for the same sort program whenever the
//! data is unambiguous: ties are broken by ascending UID.

mod paginate;
mod sort;
mod summary;

use std::collections::HashMap;
use std::future::Future;

pub use paginate::{DEFAULT_PER_PAGE, Paginator};
pub use sort::{base_subject, client_sort};
pub use summary::MessageSummary;

use crate::command::{SearchCriteria, SortProgram, ThreadAlgorithm};
use crate::parser::ThreadNode;
use crate::session::Session;
use crate::types::{CapabilitySet, Mailbox, Uid};
use crate::Result;

/// What to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Folder to select.
    pub folder: String,
    /// Page number, from 1; clamped to the available pages.
    pub page: usize,
    /// Messages per page; `None` lists everything.
    pub per_page: Option<usize>,
    /// Sort program; ignored for threaded listings.
    pub program: SortProgram,
    /// Ask for a threaded listing.
    pub threaded: bool,
    /// Search criteria; `ALL` by default.
    pub criteria: SearchCriteria,
}

impl ListRequest {
    /// First page of `folder`, newest first.
    #[must_use]
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            page: 1,
            per_page: Some(DEFAULT_PER_PAGE),
            program: SortProgram::default(),
            threaded: false,
            criteria: SearchCriteria::All,
        }
    }

    /// Sets the page number.
    #[must_use]
    pub const fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Sets the page size; `None` disables paging.
    #[must_use]
    pub const fn per_page(mut self, per_page: Option<usize>) -> Self {
        self.per_page = per_page;
        self
    }

    /// Sets the sort program.
    #[must_use]
    pub fn program(mut self, program: SortProgram) -> Self {
        self.program = program;
        self
    }

    /// Requests a threaded listing.
    #[must_use]
    pub const fn threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    /// Sets the search criteria.
    #[must_use]
    pub fn criteria(mut self, criteria: SearchCriteria) -> Self {
        self.criteria = criteria;
        self
    }
}

/// The command sequence chosen for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPath {
    /// Server-side `UID SORT`; only the requested page is fetched.
    Sort,
    /// Server-side `UID THREAD`, flattened depth-first.
    Thread(ThreadAlgorithm),
    /// `UID SEARCH`, fetch everything, sort locally.
    SearchAndSort,
}

/// Chooses how to list for a server with `capabilities`.
///
/// A threaded request uses THREAD when offered (REFERENCES preferred);
/// otherwise SORT is used when offered, then the local fallback.
#[must_use]
pub fn plan(capabilities: &CapabilitySet, request: &ListRequest) -> ListPath {
    if request.threaded
        && let Some(algorithm) = ThreadAlgorithm::preferred(&capabilities.thread_algorithms())
    {
        return ListPath::Thread(algorithm);
    }
    if capabilities.supports("SORT") {
        ListPath::Sort
    } else {
        ListPath::SearchAndSort
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageList {
    /// Summaries of the page, in listing order.
    pub messages: Vec<MessageSummary>,
    /// Position within the full result.
    pub paginator: Paginator,
    /// How the listing was produced.
    pub path: ListPath,
}

/// A thread member after flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadEntry {
    /// Message UID.
    pub uid: Uid,
    /// 0 for thread roots.
    pub depth: u32,
    /// The message this one replies to.
    pub parent: Option<Uid>,
}

/// Flattens a thread forest depth-first.
///
/// Depth grows by one along a chain; siblings share the depth and parent
/// of the branch that introduced them.
#[must_use]
pub fn flatten_threads(forest: &[ThreadNode]) -> Vec<ThreadEntry> {
    let mut entries = Vec::new();
    let mut stack: Vec<(&ThreadNode, u32, Option<Uid>)> =
        forest.iter().rev().map(|node| (node, 0, None)).collect();

    while let Some((node, depth, parent)) = stack.pop() {
        let Some(uid) = Uid::new(node.id) else {
            continue;
        };
        entries.push(ThreadEntry { uid, depth, parent });
        stack.extend(
            node.children
                .iter()
                .rev()
                .map(|child| (child, depth + 1, Some(uid))),
        );
    }
    entries
}

/// The operations a listing needs from a connection.
///
/// [`Session`] implements this; tests substitute scripted sources.
pub trait MessageSource: Send {
    /// Capabilities of the server.
    fn capability_set(&mut self) -> impl Future<Output = Result<CapabilitySet>> + Send;

    /// Makes `folder` the selected folder.
    fn enter_folder(&mut self, folder: &str) -> impl Future<Output = Result<()>> + Send;

    /// `UID SEARCH`.
    fn search_uids(
        &mut self,
        criteria: SearchCriteria,
    ) -> impl Future<Output = Result<Vec<Uid>>> + Send;

    /// `UID SORT`.
    fn sort_uids(
        &mut self,
        program: &SortProgram,
        criteria: SearchCriteria,
    ) -> impl Future<Output = Result<Vec<Uid>>> + Send;

    /// `UID THREAD`.
    fn thread_forest(
        &mut self,
        algorithm: ThreadAlgorithm,
        criteria: SearchCriteria,
    ) -> impl Future<Output = Result<Vec<ThreadNode>>> + Send;

    /// Summaries for `uids`, in any order; unknown UIDs are skipped.
    fn load_summaries(
        &mut self,
        uids: &[Uid],
    ) -> impl Future<Output = Result<Vec<MessageSummary>>> + Send;
}

impl MessageSource for Session {
    async fn capability_set(&mut self) -> Result<CapabilitySet> {
        if let Some(capabilities) = self.capabilities() {
            return Ok(capabilities.clone());
        }
        Ok(self.negotiate().await?.clone())
    }

    async fn enter_folder(&mut self, folder: &str) -> Result<()> {
        let wanted = Mailbox::new(folder);
        if self.state().selected_mailbox() != Some(&wanted) {
            self.select(folder).await?;
        }
        Ok(())
    }

    async fn search_uids(&mut self, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        self.search(criteria).await
    }

    async fn sort_uids(
        &mut self,
        program: &SortProgram,
        criteria: SearchCriteria,
    ) -> Result<Vec<Uid>> {
        self.sort(program, criteria).await
    }

    async fn thread_forest(
        &mut self,
        algorithm: ThreadAlgorithm,
        criteria: SearchCriteria,
    ) -> Result<Vec<ThreadNode>> {
        self.thread(algorithm, criteria).await
    }

    async fn load_summaries(&mut self, uids: &[Uid]) -> Result<Vec<MessageSummary>> {
        self.fetch_summaries(uids).await
    }
}

/// Lists one page of messages.
///
/// # Errors
///
/// Returns the first error from selecting, searching or fetching. The
/// chosen path never fails for lack of a capability.
pub async fn list_messages<S: MessageSource>(
    source: &mut S,
    request: &ListRequest,
) -> Result<MessageList> {
    source.enter_folder(&request.folder).await?;
    let capabilities = source.capability_set().await?;
    let path = plan(&capabilities, request);
    tracing::debug!(folder = %request.folder, path = ?path, "listing messages");

    let list = match path {
        ListPath::Sort => {
            let uids = source
                .sort_uids(&request.program, request.criteria.clone())
                .await?;
            let paginator = Paginator::new(uids.len(), request.per_page, request.page);
            let page = paginator.slice(&uids);
            let summaries = source.load_summaries(page).await?;
            MessageList {
                messages: in_order(page, summaries),
                paginator,
                path,
            }
        }
        ListPath::Thread(algorithm) => {
            let forest = source
                .thread_forest(algorithm, request.criteria.clone())
                .await?;
            let entries = flatten_threads(&forest);
            let paginator = Paginator::new(entries.len(), request.per_page, request.page);
            let page = paginator.slice(&entries);
            let uids: Vec<Uid> = page.iter().map(|e| e.uid).collect();
            let mut messages = in_order(&uids, source.load_summaries(&uids).await?);
            annotate(&mut messages, page);
            MessageList {
                messages,
                paginator,
                path,
            }
        }
        ListPath::SearchAndSort => {
            let uids = source.search_uids(request.criteria.clone()).await?;
            let mut summaries = in_order(&uids, source.load_summaries(&uids).await?);
            client_sort(&mut summaries, &request.program);
            let paginator = Paginator::new(summaries.len(), request.per_page, request.page);
            MessageList {
                messages: paginator.slice(&summaries).to_vec(),
                paginator,
                path,
            }
        }
    };

    tracing::debug!(
        folder = %request.folder,
        total = list.paginator.total(),
        page = list.paginator.page(),
        returned = list.messages.len(),
        "message list ready"
    );
    Ok(list)
}

impl Session {
    /// Lists one page of `request.folder`, selecting it first.
    ///
    /// # Errors
    ///
    /// See [`list_messages`].
    pub async fn list_messages(&mut self, request: &ListRequest) -> Result<MessageList> {
        list_messages(self, request).await
    }
}

/// Arranges `summaries` in `order` with one row per UID, dropping UIDs
/// the server did not return and rows nobody asked for.
fn in_order(order: &[Uid], summaries: Vec<MessageSummary>) -> Vec<MessageSummary> {
    let mut by_uid: HashMap<Uid, MessageSummary> =
        summaries.into_iter().map(|s| (s.uid, s)).collect();
    order.iter().filter_map(|uid| by_uid.remove(uid)).collect()
}

fn annotate(messages: &mut [MessageSummary], entries: &[ThreadEntry]) {
    let by_uid: HashMap<Uid, &ThreadEntry> = entries.iter().map(|e| (e.uid, e)).collect();
    for message in messages {
        if let Some(entry) = by_uid.get(&message.uid) {
            message.depth = entry.depth;
            message.parent = entry.parent;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::Envelope;
    use crate::types::Flags;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    fn summary(n: u32, date: &str) -> MessageSummary {
        MessageSummary {
            uid: uid(n),
            flags: Flags::default(),
            size: 100,
            internal_date: None,
            envelope: Envelope {
                date: date.into(),
                ..Envelope::default()
            },
            references: Vec::new(),
            depth: 0,
            parent: None,
        }
    }

    /// Scripted server; returns summaries in ascending UID order like a
    /// real `UID FETCH`.
    #[derive(Default)]
    struct FakeSource {
        capabilities: Vec<&'static str>,
        sorted: Vec<u32>,
        searched: Vec<u32>,
        forest: Vec<ThreadNode>,
        dates: HashMap<u32, &'static str>,
        fetched: Vec<Vec<u32>>,
        selected: Option<String>,
        stray: Vec<MessageSummary>,
    }

    impl MessageSource for FakeSource {
        async fn capability_set(&mut self) -> Result<CapabilitySet> {
            Ok(self.capabilities.iter().collect())
        }

        async fn enter_folder(&mut self, folder: &str) -> Result<()> {
            self.selected = Some(folder.to_string());
            Ok(())
        }

        async fn search_uids(&mut self, _criteria: SearchCriteria) -> Result<Vec<Uid>> {
            Ok(self.searched.iter().map(|&n| uid(n)).collect())
        }

        async fn sort_uids(
            &mut self,
            _program: &SortProgram,
            _criteria: SearchCriteria,
        ) -> Result<Vec<Uid>> {
            Ok(self.sorted.iter().map(|&n| uid(n)).collect())
        }

        async fn thread_forest(
            &mut self,
            _algorithm: ThreadAlgorithm,
            _criteria: SearchCriteria,
        ) -> Result<Vec<ThreadNode>> {
            Ok(self.forest.clone())
        }

        async fn load_summaries(&mut self, uids: &[Uid]) -> Result<Vec<MessageSummary>> {
            let mut wanted: Vec<u32> = uids.iter().map(|u| u.get()).collect();
            self.fetched.push(wanted.clone());
            wanted.sort_unstable();
            Ok(wanted
                .into_iter()
                .map(|n| summary(n, self.dates.get(&n).copied().unwrap_or_default()))
                .chain(self.stray.iter().cloned())
                .collect())
        }
    }

    fn uids_of(list: &MessageList) -> Vec<u32> {
        list.messages.iter().map(|m| m.uid.get()).collect()
    }

    fn node(id: u32, children: Vec<ThreadNode>) -> ThreadNode {
        ThreadNode { id, children }
    }

    #[test]
    fn test_plan() {
        let request = ListRequest::new("INBOX");
        let threaded = request.clone().threaded(true);
        let caps = |names: &[&str]| names.iter().collect::<CapabilitySet>();

        assert_eq!(plan(&caps(&["IMAP4rev1"]), &request), ListPath::SearchAndSort);
        assert_eq!(plan(&caps(&["SORT"]), &request), ListPath::Sort);
        assert_eq!(plan(&caps(&["SORT"]), &threaded), ListPath::Sort);
        assert_eq!(
            plan(&caps(&["SORT", "THREAD=ORDEREDSUBJECT", "THREAD=REFERENCES"]), &threaded),
            ListPath::Thread(ThreadAlgorithm::References)
        );
        assert_eq!(
            plan(&caps(&["THREAD=ORDEREDSUBJECT"]), &request),
            ListPath::SearchAndSort
        );
    }

    #[test]
    fn test_flatten_rfc5256_example() {
        // (2)(3 6 (4 23)(44 7 96))
        let forest = vec![
            node(2, vec![]),
            node(
                3,
                vec![node(
                    6,
                    vec![
                        node(4, vec![node(23, vec![])]),
                        node(44, vec![node(7, vec![node(96, vec![])])]),
                    ],
                )],
            ),
        ];

        let flat: Vec<(u32, u32, Option<u32>)> = flatten_threads(&forest)
            .into_iter()
            .map(|e| (e.uid.get(), e.depth, e.parent.map(Uid::get)))
            .collect();

        assert_eq!(
            flat,
            [
                (2, 0, None),
                (3, 0, None),
                (6, 1, Some(3)),
                (4, 2, Some(6)),
                (23, 3, Some(4)),
                (44, 2, Some(6)),
                (7, 3, Some(44)),
                (96, 4, Some(7)),
            ]
        );
    }

    #[tokio::test]
    async fn test_sort_fetches_only_the_page() {
        let mut source = FakeSource {
            capabilities: vec!["SORT"],
            sorted: vec![5, 3, 9, 1, 7],
            ..FakeSource::default()
        };
        let request = ListRequest::new("Lists").per_page(Some(2)).page(2);

        let list = list_messages(&mut source, &request).await.unwrap();

        assert_eq!(list.path, ListPath::Sort);
        assert_eq!(source.selected.as_deref(), Some("Lists"));
        assert_eq!(source.fetched, [vec![9, 1]]);
        assert_eq!(uids_of(&list), [9, 1]);
        assert_eq!(list.paginator.total(), 5);
        assert_eq!(list.paginator.max_page(), 3);
    }

    #[tokio::test]
    async fn test_thread_annotates_depth() {
        let mut source = FakeSource {
            capabilities: vec!["THREAD=REFERENCES"],
            forest: vec![node(10, vec![node(12, vec![node(11, vec![])])]), node(4, vec![])],
            ..FakeSource::default()
        };
        let request = ListRequest::new("INBOX").threaded(true);

        let list = list_messages(&mut source, &request).await.unwrap();

        assert_eq!(list.path, ListPath::Thread(ThreadAlgorithm::References));
        assert_eq!(uids_of(&list), [10, 12, 11, 4]);
        let depths: Vec<u32> = list.messages.iter().map(|m| m.depth).collect();
        assert_eq!(depths, [0, 1, 2, 0]);
        assert_eq!(list.messages[2].parent, Some(uid(12)));
    }

    #[tokio::test]
    async fn test_fallback_sorts_then_paginates() {
        let mut source = FakeSource {
            searched: vec![1, 2, 3, 4],
            dates: [
                (1, "Mon, 1 Jan 2024 09:00:00 +0000"),
                (2, "Wed, 3 Jan 2024 09:00:00 +0000"),
                (3, "Tue, 2 Jan 2024 09:00:00 +0000"),
                (4, "Wed, 3 Jan 2024 09:00:00 +0000"),
            ]
            .into_iter()
            .collect(),
            ..FakeSource::default()
        };
        let request = ListRequest::new("INBOX").per_page(Some(3));

        let list = list_messages(&mut source, &request).await.unwrap();

        assert_eq!(list.path, ListPath::SearchAndSort);
        assert_eq!(source.fetched, [vec![1, 2, 3, 4]]);
        assert_eq!(uids_of(&list), [2, 4, 3]);
        assert!(list.paginator.has_next());
    }

    #[tokio::test]
    async fn test_fallback_ignores_duplicate_and_foreign_rows() {
        let mut source = FakeSource {
            searched: vec![1, 2],
            dates: [
                (1, "Mon, 1 Jan 2024 09:00:00 +0000"),
                (2, "Tue, 2 Jan 2024 09:00:00 +0000"),
            ]
            .into_iter()
            .collect(),
            stray: vec![
                summary(1, "Mon, 1 Jan 2024 09:00:00 +0000"),
                summary(99, "Fri, 5 Jan 2024 09:00:00 +0000"),
            ],
            ..FakeSource::default()
        };

        let list = list_messages(&mut source, &ListRequest::new("INBOX"))
            .await
            .unwrap();

        assert_eq!(uids_of(&list), [2, 1]);
        assert_eq!(list.paginator.total(), 2);
    }

    #[tokio::test]
    async fn test_empty_folder() {
        let mut source = FakeSource {
            capabilities: vec!["SORT"],
            ..FakeSource::default()
        };
        let list = list_messages(&mut source, &ListRequest::new("Empty").page(3))
            .await
            .unwrap();
        assert!(list.messages.is_empty());
        assert_eq!(list.paginator.page(), 1);
    }
}
