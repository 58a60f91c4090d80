//! Folder tree built from LIST, LSUB and STATUS data.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::types::{ListResponse, Mailbox, MailboxAttribute, decode_utf7};

/// Role of a folder, from SPECIAL-USE attributes or well-known names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderKind {
    /// INBOX.
    Inbox,
    /// Sent mail.
    Sent,
    /// Drafts.
    Drafts,
    /// Trash.
    Trash,
    /// Spam/junk.
    Junk,
    /// Archive.
    Archive,
    /// Any other folder.
    Regular,
}

impl FolderKind {
    /// Detects the role of a LIST entry.
    ///
    /// SPECIAL-USE attributes win; otherwise the last path segment is
    /// matched against common names.
    #[must_use]
    pub fn detect(list: &ListResponse) -> Self {
        if list.mailbox.is_inbox() {
            return Self::Inbox;
        }
        let from_attribute = list.attributes.iter().find_map(|attr| match attr {
            MailboxAttribute::Sent => Some(Self::Sent),
            MailboxAttribute::Drafts => Some(Self::Drafts),
            MailboxAttribute::Trash => Some(Self::Trash),
            MailboxAttribute::Junk => Some(Self::Junk),
            MailboxAttribute::Archive => Some(Self::Archive),
            _ => None,
        });
        from_attribute.unwrap_or_else(|| Self::from_name(leaf_name(list.mailbox.as_str(), list.delimiter)))
    }

    /// Detects the role from a folder name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower == "inbox" {
            Self::Inbox
        } else if lower.contains("sent") {
            Self::Sent
        } else if lower.contains("draft") {
            Self::Drafts
        } else if lower.contains("trash") || lower.contains("deleted") {
            Self::Trash
        } else if lower.contains("spam") || lower.contains("junk") {
            Self::Junk
        } else if lower.contains("archive") {
            Self::Archive
        } else {
            Self::Regular
        }
    }
}

/// Message counts from `STATUS (MESSAGES UNSEEN)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderCounts {
    /// Total messages.
    pub messages: u32,
    /// Unseen messages.
    pub unseen: u32,
}

/// A node of the folder tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Full mailbox name as used in commands.
    pub name: Mailbox,
    /// Last hierarchy segment with modified UTF-7 decoded.
    pub display_name: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// LIST attributes; synthesised parents carry `\Noselect`.
    pub attributes: Vec<MailboxAttribute>,
    /// Detected role.
    pub kind: FolderKind,
    /// Listed by LSUB.
    pub subscribed: bool,
    /// Counts; `None` if STATUS was not run or failed.
    pub counts: Option<FolderCounts>,
    /// Child folders, INBOX first then by name.
    pub children: Vec<Folder>,
}

impl Folder {
    /// Returns true if the folder can be selected.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| matches!(a, MailboxAttribute::NoSelect | MailboxAttribute::NonExistent))
    }

    /// Depth-first traversal including `self`.
    pub fn iter(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    fn from_list(list: &ListResponse) -> Self {
        Self {
            name: list.mailbox.clone(),
            display_name: decode_utf7(leaf_name(list.mailbox.as_str(), list.delimiter)).into_owned(),
            delimiter: list.delimiter,
            attributes: list.attributes.clone(),
            kind: FolderKind::detect(list),
            subscribed: list
                .attributes
                .iter()
                .any(|a| matches!(a, MailboxAttribute::Subscribed)),
            counts: None,
            children: Vec::new(),
        }
    }

    fn placeholder(name: &str, delimiter: Option<char>) -> Self {
        Self {
            name: Mailbox::new(name),
            display_name: decode_utf7(leaf_name(name, delimiter)).into_owned(),
            delimiter,
            attributes: vec![MailboxAttribute::NoSelect],
            kind: FolderKind::from_name(leaf_name(name, delimiter)),
            subscribed: false,
            counts: None,
            children: Vec::new(),
        }
    }
}

/// Builds the folder forest from LIST entries.
///
/// `subscribed` holds the names returned by LSUB and `counts` the STATUS
/// results. Parents missing from LIST are synthesised as `\Noselect`.
#[must_use]
pub fn build_tree(
    lists: &[ListResponse],
    subscribed: &HashSet<Mailbox>,
    counts: &BTreeMap<Mailbox, FolderCounts>,
) -> Vec<Folder> {
    let mut nodes: BTreeMap<String, Folder> = BTreeMap::new();

    for list in lists {
        let mut folder = Folder::from_list(list);
        folder.subscribed |= subscribed.contains(&list.mailbox);
        folder.counts = counts.get(&list.mailbox).copied();
        nodes.insert(list.mailbox.as_str().to_string(), folder);

        if let Some(delimiter) = list.delimiter {
            let name = list.mailbox.as_str();
            let mut end = name.len();
            while let Some(pos) = name[..end].rfind(delimiter) {
                end = pos;
                let parent = &name[..end];
                if parent.is_empty() {
                    break;
                }
                nodes
                    .entry(parent.to_string())
                    .or_insert_with(|| Folder::placeholder(parent, Some(delimiter)));
            }
        }
    }

    // Longest names first so every child is attached before its parent
    // moves.
    let mut names: Vec<String> = nodes.keys().cloned().collect();
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));

    let mut roots = Vec::new();
    for name in names {
        let Some(folder) = nodes.remove(&name) else {
            continue;
        };
        match parent_name(&name, folder.delimiter).and_then(|parent| nodes.get_mut(parent)) {
            Some(parent) => parent.children.push(folder),
            None => roots.push(folder),
        }
    }

    sort_siblings(&mut roots);
    roots
}

fn sort_siblings(folders: &mut [Folder]) {
    folders.sort_by(compare_folders);
    for folder in folders {
        sort_siblings(&mut folder.children);
    }
}

fn compare_folders(a: &Folder, b: &Folder) -> Ordering {
    b.name
        .is_inbox()
        .cmp(&a.name.is_inbox())
        .then_with(|| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
        })
        .then_with(|| a.name.as_str().cmp(b.name.as_str()))
}

fn parent_name(name: &str, delimiter: Option<char>) -> Option<&str> {
    let pos = name.rfind(delimiter?)?;
    let parent = &name[..pos];
    (!parent.is_empty()).then_some(parent)
}

fn leaf_name(name: &str, delimiter: Option<char>) -> &str {
    delimiter
        .and_then(|d| name.rsplit(d).next())
        .filter(|leaf| !leaf.is_empty())
        .unwrap_or(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn list(name: &str, attributes: &[&str]) -> ListResponse {
        ListResponse {
            attributes: attributes.iter().map(|a| MailboxAttribute::parse(a)).collect(),
            delimiter: Some('/'),
            mailbox: Mailbox::new(name),
        }
    }

    #[test]
    fn test_kind_prefers_special_use() {
        assert_eq!(FolderKind::detect(&list("Gesendet", &["\\Sent"])), FolderKind::Sent);
        assert_eq!(FolderKind::detect(&list("Old/Sent Items", &[])), FolderKind::Sent);
        assert_eq!(FolderKind::detect(&list("inbox", &[])), FolderKind::Inbox);
        assert_eq!(FolderKind::detect(&list("Projects", &[])), FolderKind::Regular);
    }

    #[test]
    fn test_tree_synthesises_missing_parents() {
        let lists = vec![
            list("INBOX", &[]),
            list("Work/2024/Q1", &["\\HasNoChildren"]),
            list("archive", &["\\Archive"]),
        ];
        let tree = build_tree(&lists, &HashSet::new(), &BTreeMap::new());

        let names: Vec<_> = tree.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["INBOX", "archive", "Work"]);

        let work = &tree[2];
        assert!(!work.is_selectable());
        assert_eq!(work.children[0].name.as_str(), "Work/2024");
        assert!(!work.children[0].is_selectable());
        assert_eq!(work.children[0].children[0].display_name, "Q1");
        assert!(work.children[0].children[0].is_selectable());
    }

    #[test]
    fn test_tree_marks_subscriptions_and_counts() {
        let lists = vec![list("INBOX", &[]), list("Lists", &[])];
        let subscribed: HashSet<_> = [Mailbox::new("Lists")].into_iter().collect();
        let counts: BTreeMap<_, _> = [(
            Mailbox::new("INBOX"),
            FolderCounts {
                messages: 10,
                unseen: 2,
            },
        )]
        .into_iter()
        .collect();

        let tree = build_tree(&lists, &subscribed, &counts);

        assert_eq!(tree[0].counts.unwrap().unseen, 2);
        assert!(!tree[0].subscribed);
        assert!(tree[1].subscribed);
        assert!(tree[1].counts.is_none());
    }

    #[test]
    fn test_display_name_is_decoded_but_name_is_not() {
        let lists = vec![list("INBOX", &[]), list("INBOX/Entw&APw-rfe", &[])];
        let tree = build_tree(&lists, &HashSet::new(), &BTreeMap::new());

        let drafts = &tree[0].children[0];
        assert_eq!(drafts.display_name, "Entwürfe");
        assert_eq!(drafts.name.as_str(), "INBOX/Entw&APw-rfe");
    }

    #[test]
    fn test_flat_namespace() {
        let lists = vec![ListResponse {
            attributes: Vec::new(),
            delimiter: None,
            mailbox: Mailbox::new("a.b"),
        }];
        let tree = build_tree(&lists, &HashSet::new(), &BTreeMap::new());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].display_name, "a.b");
    }
}
