//! Session states as defined by RFC 9051 section 3.

use crate::parser::UntaggedResponse;
use crate::protocol::CommandResult;
use crate::types::{Mailbox, MailboxStatus, ResponseCode};

/// Protocol state of a [`super::Session`].
///
/// Transitions only happen when the corresponding command completes with
/// OK; a NO or BAD leaves the state as it was.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No live connection.
    #[default]
    Disconnected,
    /// Connected and greeted, not yet authenticated.
    Connected,
    /// Authenticated, no folder selected.
    Authenticated,
    /// A folder is selected (SELECT or EXAMINE).
    Selected(Mailbox),
}

impl SessionState {
    /// Returns `true` if we're authenticated (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns `true` if a folder is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// Returns the selected folder name, if any.
    #[must_use]
    pub const fn selected_mailbox(&self) -> Option<&Mailbox> {
        match self {
            Self::Selected(mailbox) => Some(mailbox),
            _ => None,
        }
    }
}

/// The selected folder and its metadata.
///
/// A change of [`MailboxStatus::uid_validity`] means every UID cached for
/// this folder is void.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFolder {
    /// Folder name.
    pub name: Mailbox,
    /// Counts, flags and UID metadata.
    pub status: MailboxStatus,
    /// True when UIDVALIDITY differs from the last time this session
    /// selected the folder.
    pub uid_validity_changed: bool,
}

impl SelectedFolder {
    /// Builds the folder metadata from a completed SELECT or EXAMINE.
    pub(crate) fn from_select(name: Mailbox, examine: bool, result: &CommandResult) -> Self {
        let mut status = MailboxStatus {
            read_only: examine,
            ..MailboxStatus::default()
        };

        for response in &result.responses {
            match response {
                UntaggedResponse::Exists(n) => status.exists = *n,
                UntaggedResponse::Recent(n) => status.recent = *n,
                UntaggedResponse::Flags(flags) => status.flags = flags.clone(),
                UntaggedResponse::Ok {
                    code: Some(code), ..
                } => apply_code(&mut status, code),
                _ => {}
            }
        }
        if let Some(code) = &result.code {
            apply_code(&mut status, code);
        }

        Self {
            name,
            status,
            uid_validity_changed: false,
        }
    }
}

fn apply_code(status: &mut MailboxStatus, code: &ResponseCode) {
    match code {
        ResponseCode::UidValidity(v) => status.uid_validity = Some(*v),
        ResponseCode::UidNext(uid) => status.uid_next = Some(*uid),
        ResponseCode::Unseen(seq) => status.unseen = Some(*seq),
        ResponseCode::PermanentFlags(flags) => status.permanent_flags = flags.iter().cloned().collect(),
        ResponseCode::ReadOnly => status.read_only = true,
        ResponseCode::ReadWrite => status.read_only = false,
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::{Response, ResponseParser};
    use crate::types::{Status, UidValidity};

    fn untagged(line: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(line).unwrap() {
            Response::Untagged(u) => u,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    #[test]
    fn test_state_predicates() {
        assert!(!SessionState::Connected.is_authenticated());
        assert!(SessionState::Authenticated.is_authenticated());
        let selected = SessionState::Selected(Mailbox::new("INBOX"));
        assert!(selected.is_selected());
        assert_eq!(selected.selected_mailbox().unwrap().as_str(), "INBOX");
        assert_eq!(SessionState::default(), SessionState::Disconnected);
    }

    #[test]
    fn test_from_select_collects_metadata() {
        let result = CommandResult {
            status: Status::Ok,
            code: Some(ResponseCode::ReadWrite),
            text: "SELECT completed".into(),
            responses: vec![
                untagged(b"* 172 EXISTS\r\n"),
                untagged(b"* 1 RECENT\r\n"),
                untagged(b"* FLAGS (\\Answered \\Seen)\r\n"),
                untagged(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n"),
                untagged(b"* OK [UIDNEXT 4392] Predicted next UID\r\n"),
                untagged(b"* OK [PERMANENTFLAGS (\\Seen \\*)] Limited\r\n"),
            ],
        };

        let folder = SelectedFolder::from_select(Mailbox::new("INBOX"), false, &result);

        assert_eq!(folder.status.exists, 172);
        assert_eq!(folder.status.recent, 1);
        assert_eq!(folder.status.flags.len(), 2);
        assert_eq!(folder.status.uid_validity, UidValidity::new(3_857_529_045));
        assert_eq!(folder.status.uid_next.unwrap().get(), 4392);
        assert!(!folder.status.permanent_flags.is_empty());
        assert!(!folder.status.read_only);
    }

    #[test]
    fn test_examine_is_read_only() {
        let result = CommandResult {
            status: Status::Ok,
            code: Some(ResponseCode::ReadOnly),
            text: String::new(),
            responses: Vec::new(),
        };
        let folder = SelectedFolder::from_select(Mailbox::new("Archive"), true, &result);
        assert!(folder.status.read_only);
    }
}
