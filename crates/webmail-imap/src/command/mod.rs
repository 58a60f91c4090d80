//! IMAP command builder.
//!
//! This module provides types and serialization for IMAP commands. Every
//! message-level command is UID-based; sequence numbers never leave the
//! session.

mod serialize;
mod tag_generator;
mod types;

use crate::types::{Flag, Mailbox, UidSet};

pub use tag_generator::TagGenerator;
pub use types::{
    FetchAttribute, SearchCriteria, SortCriterion, SortKey, SortProgram, StatusAttribute,
    StoreAction, ThreadAlgorithm,
};

use serialize::{
    Encoder, write_astring, write_fetch_items, write_flag_list, write_mailbox,
    write_search_criteria, write_store_action,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Base64 initial response for SASL-IR servers.
        initial_response: Option<String>,
    },

    // Authenticated State Commands
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: Mailbox,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: Mailbox,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: Mailbox,
    },
    /// RENAME command.
    Rename {
        /// Current mailbox name.
        from: Mailbox,
        /// New mailbox name.
        to: Mailbox,
    },
    /// SUBSCRIBE command.
    Subscribe {
        /// Mailbox to subscribe.
        mailbox: Mailbox,
    },
    /// UNSUBSCRIBE command.
    Unsubscribe {
        /// Mailbox to unsubscribe.
        mailbox: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// LSUB command.
    Lsub {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Status items to request.
        items: Vec<StatusAttribute>,
    },
    /// APPEND command.
    Append {
        /// Target mailbox.
        mailbox: Mailbox,
        /// Flags to set.
        flags: Vec<Flag>,
        /// Message data.
        message: Vec<u8>,
    },

    // Selected State Commands
    /// CLOSE command.
    Close,
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (RFC 4315 UIDPLUS).
    UidExpunge {
        /// UIDs to expunge.
        uids: UidSet,
    },
    /// UID SEARCH command.
    Search {
        /// Search criteria.
        criteria: SearchCriteria,
    },
    /// UID SORT command (RFC 5256).
    Sort {
        /// Sort program.
        program: SortProgram,
        /// Charset of string criteria.
        charset: String,
        /// Search criteria.
        criteria: SearchCriteria,
    },
    /// UID THREAD command (RFC 5256).
    Thread {
        /// Threading algorithm.
        algorithm: ThreadAlgorithm,
        /// Charset of string criteria.
        charset: String,
        /// Search criteria.
        criteria: SearchCriteria,
    },
    /// UID FETCH command.
    Fetch {
        /// Messages to fetch.
        uids: UidSet,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
    },
    /// UID STORE command.
    Store {
        /// Messages to change.
        uids: UidSet,
        /// Store action.
        action: StoreAction,
        /// Silent mode (no FETCH response).
        silent: bool,
    },
    /// UID COPY command.
    Copy {
        /// Messages to copy.
        uids: UidSet,
        /// Target mailbox.
        mailbox: Mailbox,
    },
    /// UID MOVE command (RFC 6851).
    Move {
        /// Messages to move.
        uids: UidSet,
        /// Target mailbox.
        mailbox: Mailbox,
    },
}

impl Command {
    /// Command name used in logs; never includes arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::Close => "CLOSE",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { .. } => "UID SEARCH",
            Self::Sort { .. } => "UID SORT",
            Self::Thread { .. } => "UID THREAD",
            Self::Fetch { .. } => "UID FETCH",
            Self::Store { .. } => "UID STORE",
            Self::Copy { .. } => "UID COPY",
            Self::Move { .. } => "UID MOVE",
        }
    }

    /// UIDs addressed by a command whose FETCH data belongs to it.
    #[must_use]
    pub const fn uid_scope(&self) -> Option<&UidSet> {
        match self {
            Self::Fetch { uids, .. } | Self::Store { uids, .. } => Some(uids),
            _ => None,
        }
    }

    /// Serializes the command with the given tag.
    ///
    /// The first part is sent right away. Each later part starts with the
    /// data of a synchronizing literal and is sent after the server's `+`
    /// continuation request. With `literal_plus` every literal is sent
    /// inline as `{n+}` and the command is a single part.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn serialize(&self, tag: &str, literal_plus: bool) -> Vec<Vec<u8>> {
        let mut buf = Encoder::new(literal_plus);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Close => buf.extend_from_slice(b"CLOSE"),
            Self::Expunge => buf.extend_from_slice(b"EXPUNGE"),

            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTHENTICATE ");
                buf.extend_from_slice(mechanism.as_bytes());
                if let Some(resp) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(resp.as_bytes());
                }
            }

            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::Examine { mailbox } => {
                buf.extend_from_slice(b"EXAMINE ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::Create { mailbox } => {
                buf.extend_from_slice(b"CREATE ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::Delete { mailbox } => {
                buf.extend_from_slice(b"DELETE ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::Rename { from, to } => {
                buf.extend_from_slice(b"RENAME ");
                write_mailbox(&mut buf, from);
                buf.push(b' ');
                write_mailbox(&mut buf, to);
            }

            Self::Subscribe { mailbox } => {
                buf.extend_from_slice(b"SUBSCRIBE ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::Unsubscribe { mailbox } => {
                buf.extend_from_slice(b"UNSUBSCRIBE ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::List { reference, pattern } | Self::Lsub { reference, pattern } => {
                buf.extend_from_slice(self.name().as_bytes());
                buf.push(b' ');
                write_astring(&mut buf, reference);
                buf.push(b' ');
                write_astring(&mut buf, pattern);
            }

            Self::Status { mailbox, items } => {
                buf.extend_from_slice(b"STATUS ");
                write_mailbox(&mut buf, mailbox);
                buf.extend_from_slice(b" (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    buf.extend_from_slice(item.as_str().as_bytes());
                }
                buf.push(b')');
            }

            Self::Append {
                mailbox,
                flags,
                message,
            } => {
                buf.extend_from_slice(b"APPEND ");
                write_mailbox(&mut buf, mailbox);
                if !flags.is_empty() {
                    buf.push(b' ');
                    write_flag_list(&mut buf, flags);
                }
                buf.push(b' ');
                buf.literal(message);
            }

            Self::UidExpunge { uids } => {
                buf.extend_from_slice(b"UID EXPUNGE ");
                buf.extend_from_slice(uids.to_string().as_bytes());
            }

            Self::Search { criteria } => {
                buf.extend_from_slice(b"UID SEARCH ");
                write_search_criteria(&mut buf, criteria);
            }

            Self::Sort {
                program,
                charset,
                criteria,
            } => {
                buf.extend_from_slice(b"UID SORT ");
                buf.extend_from_slice(program.to_wire().as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(charset.as_bytes());
                buf.push(b' ');
                write_search_criteria(&mut buf, criteria);
            }

            Self::Thread {
                algorithm,
                charset,
                criteria,
            } => {
                buf.extend_from_slice(b"UID THREAD ");
                buf.extend_from_slice(algorithm.as_str().as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(charset.as_bytes());
                buf.push(b' ');
                write_search_criteria(&mut buf, criteria);
            }

            Self::Fetch { uids, items } => {
                buf.extend_from_slice(b"UID FETCH ");
                buf.extend_from_slice(uids.to_string().as_bytes());
                buf.push(b' ');
                write_fetch_items(&mut buf, items);
            }

            Self::Store {
                uids,
                action,
                silent,
            } => {
                buf.extend_from_slice(b"UID STORE ");
                buf.extend_from_slice(uids.to_string().as_bytes());
                buf.push(b' ');
                write_store_action(&mut buf, action, *silent);
            }

            Self::Copy { uids, mailbox } | Self::Move { uids, mailbox } => {
                buf.extend_from_slice(self.name().as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(uids.to_string().as_bytes());
                buf.push(b' ');
                write_mailbox(&mut buf, mailbox);
            }
        }

        buf.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::types::{Flag, Uid};

    use super::*;

    fn uids(values: &[u32]) -> UidSet {
        let list: Vec<Uid> = values.iter().map(|&v| Uid::new(v).unwrap()).collect();
        UidSet::from_uids(&list).unwrap()
    }

    /// Serializes a command that must fit on one line.
    fn line(cmd: &Command, tag: &str) -> Vec<u8> {
        let mut parts = cmd.serialize(tag, false);
        assert_eq!(parts.len(), 1, "{} was split", cmd.name());
        parts.remove(0)
    }

    #[test]
    fn test_capability_command() {
        assert_eq!(line(&Command::Capability, "A001"), b"A001 CAPABILITY\r\n");
    }

    #[test]
    fn test_login_command() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        assert_eq!(line(&cmd, "A001"), b"A001 LOGIN user pass\r\n");
    }

    #[test]
    fn test_login_quoted() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pa\"ss word".to_string(),
        };
        assert_eq!(
            line(&cmd, "A001"),
            b"A001 LOGIN user@example.com \"pa\\\"ss word\"\r\n"
        );
    }

    #[test]
    fn test_select_quotes_spaces() {
        let cmd = Command::Select {
            mailbox: Mailbox::new("Sent Items"),
        };
        assert_eq!(line(&cmd, "A001"), b"A001 SELECT \"Sent Items\"\r\n");
    }

    #[test]
    fn test_list_and_lsub() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(line(&cmd, "A001"), b"A001 LIST \"\" \"*\"\r\n");
        let cmd = Command::Lsub {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(line(&cmd, "A002"), b"A002 LSUB \"\" \"*\"\r\n");
    }

    #[test]
    fn test_sort_command() {
        let cmd = Command::Sort {
            program: "-DATE SUBJECT".parse().unwrap(),
            charset: "UTF-8".to_string(),
            criteria: SearchCriteria::All,
        };
        assert_eq!(
            line(&cmd, "A5"),
            b"A5 UID SORT (REVERSE DATE SUBJECT) UTF-8 ALL\r\n"
        );
    }

    #[test]
    fn test_thread_command() {
        let cmd = Command::Thread {
            algorithm: ThreadAlgorithm::References,
            charset: "UTF-8".to_string(),
            criteria: SearchCriteria::Undeleted,
        };
        assert_eq!(
            line(&cmd, "A6"),
            b"A6 UID THREAD REFERENCES UTF-8 UNDELETED\r\n"
        );
    }

    #[test]
    fn test_fetch_summary() {
        let cmd = Command::Fetch {
            uids: uids(&[3, 1, 2, 9]),
            items: FetchAttribute::summary(),
        };
        assert_eq!(
            line(&cmd, "A7"),
            b"A7 UID FETCH 1:3,9 (UID FLAGS RFC822.SIZE INTERNALDATE ENVELOPE \
              BODY.PEEK[HEADER.FIELDS (REFERENCES)])\r\n"
                .as_slice()
        );
    }

    #[test]
    fn test_fetch_single_part() {
        let cmd = Command::Fetch {
            uids: uids(&[42]),
            items: vec![FetchAttribute::peek("1.2")],
        };
        assert_eq!(line(&cmd, "A8"), b"A8 UID FETCH 42 BODY.PEEK[1.2]\r\n");
    }

    #[test]
    fn test_store_command() {
        let cmd = Command::Store {
            uids: uids(&[1]),
            action: StoreAction::AddFlags(vec![Flag::Seen]),
            silent: true,
        };
        assert_eq!(
            line(&cmd, "A001"),
            b"A001 UID STORE 1 +FLAGS.SILENT (\\Seen)\r\n"
        );
    }

    #[test]
    fn test_copy_and_move() {
        let cmd = Command::Copy {
            uids: uids(&[4, 5]),
            mailbox: Mailbox::new("Archive"),
        };
        assert_eq!(line(&cmd, "A1"), b"A1 UID COPY 4:5 Archive\r\n");
        let cmd = Command::Move {
            uids: uids(&[4]),
            mailbox: Mailbox::new("Archive"),
        };
        assert_eq!(line(&cmd, "A2"), b"A2 UID MOVE 4 Archive\r\n");
    }

    #[test]
    fn test_search_or_parenthesizes_conjunction() {
        let cmd = Command::Search {
            criteria: SearchCriteria::Or(
                Box::new(SearchCriteria::And(vec![
                    SearchCriteria::Unseen,
                    SearchCriteria::Flagged,
                ])),
                Box::new(SearchCriteria::From("bob".to_string())),
            ),
        };
        assert_eq!(
            line(&cmd, "A3"),
            b"A3 UID SEARCH OR (UNSEEN FLAGGED) FROM bob\r\n"
        );
    }

    #[test]
    fn test_append_synchronizing() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("Drafts"),
            flags: vec![Flag::Draft, Flag::Seen],
            message: b"Subject: x\r\n\r\nhi".to_vec(),
        };
        assert_eq!(
            cmd.serialize("A4", false),
            [
                b"A4 APPEND Drafts (\\Draft \\Seen) {16}\r\n".to_vec(),
                b"Subject: x\r\n\r\nhi\r\n".to_vec(),
            ]
        );
    }

    #[test]
    fn test_append_literal_plus() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("Drafts"),
            flags: vec![],
            message: b"hi".to_vec(),
        };
        assert_eq!(
            cmd.serialize("A4", true),
            [b"A4 APPEND Drafts {2+}\r\nhi\r\n".to_vec()]
        );
    }

    #[test]
    fn test_crlf_in_search_text_is_sent_as_literal() {
        let cmd = Command::Search {
            criteria: SearchCriteria::Subject("x\r\nA9 DELETE INBOX".to_string()),
        };

        let parts = cmd.serialize("A1", false);
        assert_eq!(
            parts,
            [
                b"A1 UID SEARCH SUBJECT {18}\r\n".to_vec(),
                b"x\r\nA9 DELETE INBOX\r\n".to_vec(),
            ]
        );
        assert!(!parts.iter().any(|part| part.starts_with(b"A9")));

        assert_eq!(
            cmd.serialize("A1", true),
            [b"A1 UID SEARCH SUBJECT {18+}\r\nx\r\nA9 DELETE INBOX\r\n".to_vec()]
        );
    }

    #[test]
    fn test_eight_bit_strings_are_literals() {
        let cmd = Command::Login {
            username: "jos\u{e9}".to_string(),
            password: "pa\0ss".to_string(),
        };
        assert_eq!(
            cmd.serialize("A2", true),
            [b"A2 LOGIN {5+}\r\njos\xc3\xa9 {5+}\r\npa\0ss\r\n".to_vec()]
        );
        assert_eq!(cmd.serialize("A2", false).len(), 3);
    }

    #[test]
    fn test_uid_scope_covers_fetch_and_store() {
        let fetch = Command::Fetch {
            uids: uids(&[1, 2]),
            items: vec![FetchAttribute::Flags],
        };
        assert_eq!(fetch.uid_scope(), Some(&uids(&[1, 2])));
        assert!(Command::Noop.uid_scope().is_none());
    }

    #[test]
    fn test_uid_expunge_command() {
        let cmd = Command::UidExpunge {
            uids: uids(&[100, 101, 102]),
        };
        assert_eq!(line(&cmd, "A001"), b"A001 UID EXPUNGE 100:102\r\n");
    }

    #[test]
    fn test_name_never_contains_arguments() {
        let cmd = Command::Login {
            username: "u".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(cmd.name(), "LOGIN");
    }
}
