//! Message commands of the selected state.
//!
//! Every message is addressed by UID; sequence numbers only appear in
//! unsolicited EXPUNGE and FETCH updates.

use std::collections::HashMap;

use super::{Responder, Session};
use crate::command::{
    Command, FetchAttribute, SearchCriteria, SortProgram, StoreAction, ThreadAlgorithm,
};
use crate::decode::{self, TransferEncoding};
use crate::parser::{FetchItem, MimePart, Params, PartPath, ThreadNode, UntaggedResponse};
use crate::strategy::MessageSummary;
use crate::types::{Flag, Flags, Mailbox, ResponseCode, SeqNum, Uid, UidSet};
use crate::{Error, Result};

/// UIDs per `UID FETCH` when loading summaries.
pub(crate) const SUMMARY_BATCH: usize = 500;

/// How [`Session::set_flags`] combines the given flags with existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOp {
    /// `+FLAGS`.
    Add,
    /// `-FLAGS`.
    Remove,
    /// `FLAGS`.
    Replace,
}

/// Raw content of one body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartData {
    /// Bytes as sent by the server, still transfer-encoded.
    pub data: Vec<u8>,
    /// Content-Transfer-Encoding from BODYSTRUCTURE.
    pub encoding: TransferEncoding,
    /// `type/subtype`, lowercased.
    pub mime_type: String,
    /// Content-Type parameters.
    pub params: Params,
}

impl PartData {
    /// Bytes with the transfer encoding undone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for invalid base64.
    pub fn decoded(&self) -> Result<Vec<u8>> {
        decode::decode_transfer(&self.data, self.encoding)
    }

    /// Decoded text in the part's charset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for invalid base64.
    pub fn text(&self) -> Result<String> {
        let bytes = self.decoded()?;
        Ok(decode::decode_charset(&bytes, self.params.get("charset")))
    }
}

impl Session {
    /// `UID SEARCH`; returns matching UIDs in server order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] without a selected folder, or
    /// [`Error::CommandFailed`] if the server refuses.
    pub async fn search(&mut self, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        self.ensure_selected().await?;
        let responses = self
            .run(&Command::Search { criteria }, Responder::None)
            .await?
            .into_result()?;
        Ok(collect_ids(&responses, |r| match r {
            UntaggedResponse::Search(ids) => Some(ids),
            _ => None,
        }))
    }

    /// `UID SORT` (RFC 5256); returns UIDs in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityUnsupported`] unless SORT is advertised.
    pub async fn sort(
        &mut self,
        program: &SortProgram,
        criteria: SearchCriteria,
    ) -> Result<Vec<Uid>> {
        self.ensure_selected().await?;
        self.ensure_capabilities().await?;
        self.require("SORT")?;

        let command = Command::Sort {
            program: program.clone(),
            charset: "UTF-8".to_string(),
            criteria,
        };
        let responses = self.run(&command, Responder::None).await?.into_result()?;
        Ok(collect_ids(&responses, |r| match r {
            UntaggedResponse::Sort(ids) => Some(ids),
            _ => None,
        }))
    }

    /// `UID THREAD` (RFC 5256); returns the thread forest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityUnsupported`] unless `THREAD=<algorithm>`
    /// is advertised.
    pub async fn thread(
        &mut self,
        algorithm: ThreadAlgorithm,
        criteria: SearchCriteria,
    ) -> Result<Vec<ThreadNode>> {
        self.ensure_selected().await?;
        self.ensure_capabilities().await?;
        self.require(&format!("THREAD={}", algorithm.as_str()))?;

        let command = Command::Thread {
            algorithm,
            charset: "UTF-8".to_string(),
            criteria,
        };
        let responses = self.run(&command, Responder::None).await?.into_result()?;
        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Thread(forest) => Some(forest),
                _ => None,
            })
            .flatten()
            .collect())
    }

    /// `UID FETCH`; returns the data of every message the server sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if a FETCH line cannot be
    /// parsed, or [`Error::CommandFailed`].
    pub async fn fetch(
        &mut self,
        uids: &UidSet,
        items: Vec<FetchAttribute>,
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        self.ensure_selected().await?;
        let command = Command::Fetch {
            uids: uids.clone(),
            items,
        };
        let responses = self.run(&command, Responder::None).await?.into_result()?;
        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Fetch { seq, items } => Some((seq, items)),
                _ => None,
            })
            .collect())
    }

    /// Loads list summaries for `uids`, batched by 500.
    ///
    /// Results come in server order with one summary per UID; UIDs that no
    /// longer exist are silently missing. Data the server sends for other
    /// UIDs is ignored, and repeated FETCH data for one UID is merged with
    /// later items winning.
    ///
    /// # Errors
    ///
    /// Returns the first batch error.
    pub async fn fetch_summaries(&mut self, uids: &[Uid]) -> Result<Vec<MessageSummary>> {
        let mut order = Vec::with_capacity(uids.len());
        let mut merged: HashMap<Uid, Vec<FetchItem>> = HashMap::with_capacity(uids.len());
        for chunk in uids.chunks(SUMMARY_BATCH) {
            let Some(set) = UidSet::from_uids(chunk) else {
                continue;
            };
            for (_, items) in self.fetch(&set, FetchAttribute::summary()).await? {
                let Some(uid) = uid_of(&items).filter(|&uid| set.contains(uid)) else {
                    continue;
                };
                merged
                    .entry(uid)
                    .or_insert_with(|| {
                        order.push(uid);
                        Vec::new()
                    })
                    .extend(items);
            }
        }

        let summaries: Vec<MessageSummary> = order
            .iter()
            .filter_map(|uid| merged.get(uid))
            .filter_map(|items| MessageSummary::from_fetch(items))
            .collect();
        tracing::debug!(requested = uids.len(), fetched = summaries.len(), "summaries loaded");
        Ok(summaries)
    }

    /// Fetches the MIME tree of one message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageNotFound`] if the UID does not exist.
    pub async fn fetch_body_structure(&mut self, uid: Uid) -> Result<MimePart> {
        let items = self
            .fetch_one(uid, vec![FetchAttribute::Uid, FetchAttribute::BodyStructure])
            .await?;
        body_structure(items).ok_or_else(|| Error::malformed(0, "FETCH without BODYSTRUCTURE"))
    }

    /// Fetches one body part together with what is needed to decode it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageNotFound`] for an unknown UID and
    /// [`Error::InvalidState`] if the message has no such part.
    pub async fn fetch_part(&mut self, uid: Uid, path: &PartPath) -> Result<PartData> {
        if path.is_root() {
            return Err(Error::InvalidState(
                "part path is empty; use fetch_source for the whole message".into(),
            ));
        }
        let section = path.section("");
        let items = self
            .fetch_one(
                uid,
                vec![
                    FetchAttribute::Uid,
                    FetchAttribute::BodyStructure,
                    FetchAttribute::peek(section.as_str()),
                ],
            )
            .await?;

        let data = section_data(&items, &section).unwrap_or_default();
        let structure =
            body_structure(items).ok_or_else(|| Error::malformed(0, "FETCH without BODYSTRUCTURE"))?;
        let part = structure
            .find(path)
            .ok_or_else(|| Error::InvalidState(format!("message {uid} has no part {path}")))?;

        Ok(PartData {
            data,
            encoding: part
                .fields()
                .map_or(TransferEncoding::SevenBit, |f| TransferEncoding::parse(&f.encoding)),
            mime_type: part.mime_type(),
            params: part.params().clone(),
        })
    }

    /// Fetches the complete RFC 5322 source (`BODY.PEEK[]`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageNotFound`] if the UID does not exist.
    pub async fn fetch_source(&mut self, uid: Uid) -> Result<Vec<u8>> {
        let items = self
            .fetch_one(uid, vec![FetchAttribute::Uid, FetchAttribute::peek("")])
            .await?;
        Ok(section_data(&items, "").unwrap_or_default())
    }

    /// Fetches raw headers: the message header for `None`, the embedded
    /// header of a `message/rfc822` part, or a part's MIME header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageNotFound`] if the UID does not exist.
    pub async fn fetch_part_header(&mut self, uid: Uid, part: Option<&PartPath>) -> Result<Vec<u8>> {
        let section = match part {
            None => "HEADER".to_string(),
            Some(path) if path.is_root() => "HEADER".to_string(),
            Some(path) => {
                let structure = self.fetch_body_structure(uid).await?;
                let is_message = structure
                    .find(path)
                    .is_some_and(|p| matches!(p, MimePart::Message(_)));
                path.section(if is_message { "HEADER" } else { "MIME" })
            }
        };
        let items = self
            .fetch_one(uid, vec![FetchAttribute::Uid, FetchAttribute::peek(section.as_str())])
            .await?;
        Ok(section_data(&items, &section).unwrap_or_default())
    }

    /// Adds, removes or replaces flags and returns the resulting flags.
    ///
    /// A server may answer OK without FETCH data when nothing changed. For
    /// a single UID the current flags are then fetched; a message that no
    /// longer exists yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the server refuses the STORE.
    pub async fn set_flags(
        &mut self,
        uids: &UidSet,
        flags: Vec<Flag>,
        op: FlagOp,
    ) -> Result<Vec<(Uid, Flags)>> {
        self.ensure_selected().await?;
        let action = match op {
            FlagOp::Add => StoreAction::AddFlags(flags),
            FlagOp::Remove => StoreAction::RemoveFlags(flags),
            FlagOp::Replace => StoreAction::SetFlags(flags),
        };
        let command = Command::Store {
            uids: uids.clone(),
            action,
            silent: false,
        };
        let responses = self.run(&command, Responder::None).await?.into_result()?;

        let updated: Vec<(Uid, Flags)> = responses
            .iter()
            .filter_map(|r| match r {
                UntaggedResponse::Fetch { items, .. } => flags_of(items),
                _ => None,
            })
            .collect();
        if !updated.is_empty() || !matches!(uids, UidSet::Single(_)) {
            return Ok(updated);
        }

        tracing::debug!(uids = %uids, "STORE reported no change, reading current flags");
        let fetched = self
            .fetch(uids, vec![FetchAttribute::Uid, FetchAttribute::Flags])
            .await?;
        Ok(fetched
            .iter()
            .filter_map(|(_, items)| flags_of(items))
            .collect())
    }

    /// `UID COPY` to another folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] (often with `[TRYCREATE]`).
    pub async fn copy(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        self.ensure_selected().await?;
        let command = Command::Copy {
            uids: uids.clone(),
            mailbox: Mailbox::new(mailbox),
        };
        self.run(&command, Responder::None).await?.check()?;
        Ok(())
    }

    /// Moves messages, with `UID MOVE` when advertised and copy, flag and
    /// expunge otherwise.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; after a failed copy the
    /// source messages are untouched.
    pub async fn move_messages(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        self.ensure_selected().await?;
        self.ensure_capabilities().await?;

        if self.supports("MOVE") {
            let command = Command::Move {
                uids: uids.clone(),
                mailbox: Mailbox::new(mailbox),
            };
            self.run(&command, Responder::None).await?.check()?;
            return Ok(());
        }

        tracing::debug!(mailbox, "MOVE not advertised, copying instead");
        self.copy(uids, mailbox).await?;
        let store = Command::Store {
            uids: uids.clone(),
            action: StoreAction::AddFlags(vec![Flag::Deleted]),
            silent: true,
        };
        self.run(&store, Responder::None).await?.check()?;

        let expunge = if self.supports("UIDPLUS") {
            Command::UidExpunge { uids: uids.clone() }
        } else {
            Command::Expunge
        };
        self.run(&expunge, Responder::None).await?.check()?;
        Ok(())
    }

    /// Permanently removes messages flagged `\Deleted`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] for a read-only folder.
    pub async fn expunge(&mut self) -> Result<Vec<SeqNum>> {
        self.ensure_selected().await?;
        let responses = self
            .run(&Command::Expunge, Responder::None)
            .await?
            .into_result()?;
        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Expunge(seq) => Some(seq),
                _ => None,
            })
            .collect())
    }

    /// Appends a message; returns its UID when the server reports
    /// `[APPENDUID]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the server refuses.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: Vec<Flag>,
        message: Vec<u8>,
    ) -> Result<Option<Uid>> {
        self.ensure_authenticated().await?;
        self.ensure_capabilities().await?;

        let command = Command::Append {
            mailbox: Mailbox::new(mailbox),
            flags,
            message,
        };
        let result = self.run(&command, Responder::None).await?.check()?;

        Ok(match result.code {
            Some(ResponseCode::AppendUid { uid, .. }) => Some(uid),
            _ => None,
        })
    }

    /// Fetches `items` for one UID, failing if the server returns nothing.
    async fn fetch_one(&mut self, uid: Uid, items: Vec<FetchAttribute>) -> Result<Vec<FetchItem>> {
        self.fetch(&UidSet::single(uid), items)
            .await?
            .into_iter()
            .map(|(_, items)| items)
            .find(|items| uid_of(items) == Some(uid))
            .ok_or(Error::MessageNotFound(uid.get()))
    }
}

fn collect_ids<'a, F>(responses: &'a [UntaggedResponse], pick: F) -> Vec<Uid>
where
    F: Fn(&'a UntaggedResponse) -> Option<&'a Vec<u32>>,
{
    responses
        .iter()
        .filter_map(pick)
        .flatten()
        .filter_map(|&id| Uid::new(id))
        .collect()
}

pub(crate) fn uid_of(items: &[FetchItem]) -> Option<Uid> {
    items.iter().find_map(|item| match item {
        FetchItem::Uid(uid) => Some(*uid),
        _ => None,
    })
}

fn flags_of(items: &[FetchItem]) -> Option<(Uid, Flags)> {
    let uid = uid_of(items)?;
    let flags = items.iter().find_map(|item| match item {
        FetchItem::Flags(flags) => Some(flags.clone()),
        _ => None,
    })?;
    Some((uid, flags))
}

fn section_data(items: &[FetchItem], section: &str) -> Option<Vec<u8>> {
    items.iter().find_map(|item| match item {
        FetchItem::Body {
            section: s, data, ..
        } if s.eq_ignore_ascii_case(section) => Some(data.clone().unwrap_or_default()),
        _ => None,
    })
}

fn body_structure(items: Vec<FetchItem>) -> Option<MimePart> {
    items.into_iter().find_map(|item| match item {
        FetchItem::BodyStructure(part) => Some(*part),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::SessionConfig;
    use tokio_test::io::Builder;

    const OPEN: Duration = Duration::from_secs(3600);

    fn quiet() -> SessionConfig {
        SessionConfig::new().keepalive_interval(None).auto_reconnect(false)
    }

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    #[test]
    fn test_part_data_text_decodes_charset() {
        let part = PartData {
            data: b"caf=E9".to_vec(),
            encoding: TransferEncoding::QuotedPrintable,
            mime_type: "text/plain".into(),
            params: Params::new(vec![("charset".to_string(), "iso-8859-1".to_string())]),
        };
        assert_eq!(part.text().unwrap(), "café");
    }

    #[test]
    fn test_section_data_matches_case_insensitively() {
        let items = vec![FetchItem::Body {
            section: "header".into(),
            origin: None,
            data: Some(b"Subject: x\r\n\r\n".to_vec()),
        }];
        assert_eq!(section_data(&items, "HEADER").unwrap(), b"Subject: x\r\n\r\n");
        assert!(section_data(&items, "TEXT").is_none());
    }

    #[tokio::test]
    async fn test_fetch_part_decodes_with_structure() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0000 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\n* OK [UIDVALIDITY 7] ok\r\nA0000 OK [READ-WRITE] done\r\n")
            .write(b"A0001 UID FETCH 42 (UID BODYSTRUCTURE BODY.PEEK[2])\r\n")
            .read(
                b"* 3 FETCH (UID 42 BODYSTRUCTURE ((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"utf-8\") NIL NIL \"7BIT\" 2 1)\
(\"APPLICATION\" \"PDF\" (\"NAME\" \"a.pdf\") NIL NIL \"BASE64\" 8) \"MIXED\") BODY[2] {8}\r\nSGVsbG8=)\r\n",
            )
            .read(b"A0001 OK done\r\n")
            .wait(OPEN)
            .build();
        let mut session = Session::from_stream(mock, quiet()).await.unwrap();
        session.select("INBOX").await.unwrap();

        let part = session
            .fetch_part(uid(42), &"2".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(part.mime_type, "application/pdf");
        assert_eq!(part.encoding, TransferEncoding::Base64);
        assert_eq!(part.decoded().unwrap(), b"Hello");
    }

    #[tokio::test]
    async fn test_fetch_missing_uid_is_not_found() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0000 SELECT INBOX\r\n")
            .read(b"A0000 OK done\r\n")
            .write(b"A0001 UID FETCH 9 (UID BODY.PEEK[])\r\n")
            .read(b"A0001 OK nothing\r\n")
            .wait(OPEN)
            .build();
        let mut session = Session::from_stream(mock, quiet()).await.unwrap();
        session.select("INBOX").await.unwrap();

        let err = session.fetch_source(uid(9)).await.unwrap_err();
        assert!(matches!(err, Error::MessageNotFound(9)));
    }

    #[tokio::test]
    async fn test_sort_requires_capability() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0000 SELECT INBOX\r\n")
            .read(b"A0000 OK done\r\n")
            .wait(OPEN)
            .build();
        let mut session = Session::from_stream(mock, quiet()).await.unwrap();
        session.select("INBOX").await.unwrap();

        let err = session
            .sort(&SortProgram::default(), SearchCriteria::All)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityUnsupported(f) if f == "SORT"));
    }

    #[tokio::test]
    async fn test_move_falls_back_to_copy_store_expunge() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1 UIDPLUS] ready\r\n")
            .write(b"A0000 SELECT INBOX\r\n")
            .read(b"A0000 OK done\r\n")
            .write(b"A0001 UID COPY 4:5 Archive\r\n")
            .read(b"A0001 OK [COPYUID 9 4:5 10:11] copied\r\n")
            .write(b"A0002 UID STORE 4:5 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0002 OK stored\r\n")
            .write(b"A0003 UID EXPUNGE 4:5\r\n")
            .read(b"* 4 EXPUNGE\r\n* 4 EXPUNGE\r\nA0003 OK expunged\r\n")
            .wait(OPEN)
            .build();
        let mut session = Session::from_stream(mock, quiet()).await.unwrap();
        session.select("INBOX").await.unwrap();

        session
            .move_messages(&UidSet::range(uid(4), uid(5)), "Archive")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_flags_reads_flags_after_quiet_store() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0000 SELECT INBOX\r\n")
            .read(b"A0000 OK done\r\n")
            .write(b"A0001 UID STORE 8 +FLAGS (\\Seen)\r\n")
            .read(b"A0001 OK nothing changed\r\n")
            .write(b"A0002 UID FETCH 8 (UID FLAGS)\r\n")
            .read(b"* 3 FETCH (UID 8 FLAGS (\\Seen \\Flagged))\r\nA0002 OK done\r\n")
            .wait(OPEN)
            .build();
        let mut session = Session::from_stream(mock, quiet()).await.unwrap();
        session.select("INBOX").await.unwrap();

        let updated = session
            .set_flags(&UidSet::single(uid(8)), vec![Flag::Seen], FlagOp::Add)
            .await
            .unwrap();

        assert_eq!(updated.len(), 1);
        let (target, flags) = &updated[0];
        assert_eq!(*target, uid(8));
        assert!(flags.is_seen());
        assert!(flags.is_flagged());
    }

    #[tokio::test]
    async fn test_set_flags_on_expunged_message_is_empty() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0000 SELECT INBOX\r\n")
            .read(b"A0000 OK done\r\n")
            .write(b"A0001 UID STORE 8 -FLAGS (\\Flagged)\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 UID FETCH 8 (UID FLAGS)\r\n")
            .read(b"A0002 OK done\r\n")
            .wait(OPEN)
            .build();
        let mut session = Session::from_stream(mock, quiet()).await.unwrap();
        session.select("INBOX").await.unwrap();

        let updated = session
            .set_flags(&UidSet::single(uid(8)), vec![Flag::Flagged], FlagOp::Remove)
            .await
            .unwrap();
        assert!(updated.is_empty());
    }

    #[tokio::test]
    async fn test_summaries_skip_unrequested_and_merge_repeats() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0000 SELECT INBOX\r\n")
            .read(b"A0000 OK done\r\n")
            .write(b"A0001 UID FETCH 4:5 (UID FLAGS RFC822.SIZE INTERNALDATE ENVELOPE BODY.PEEK[HEADER.FIELDS (REFERENCES)])\r\n")
            .read(b"* 1 FETCH (UID 5 FLAGS () RFC822.SIZE 300)\r\n")
            .read(b"* 7 FETCH (UID 70 FLAGS () RFC822.SIZE 1)\r\n")
            .read(b"* 1 FETCH (UID 5 FLAGS (\\Seen))\r\n")
            .read(b"* 2 FETCH (UID 4 FLAGS () RFC822.SIZE 200)\r\n")
            .read(b"A0001 OK done\r\n")
            .wait(OPEN)
            .build();
        let mut session = Session::from_stream(mock, quiet()).await.unwrap();
        session.select("INBOX").await.unwrap();

        let summaries = session.fetch_summaries(&[uid(5), uid(4)]).await.unwrap();

        let rows: Vec<(u32, u32, bool)> = summaries
            .iter()
            .map(|s| (s.uid.get(), s.size, s.is_seen()))
            .collect();
        assert_eq!(rows, [(5, 300, true), (4, 200, false)]);
    }

    #[tokio::test]
    async fn test_append_with_synchronizing_literal() {
        let mock = Builder::new()
            .read(b"* PREAUTH [CAPABILITY IMAP4rev1 UIDPLUS] ready\r\n")
            .write(b"A0000 APPEND Drafts (\\Draft) {5}\r\n")
            .read(b"+ Ready for literal data\r\n")
            .write(b"hello\r\n")
            .read(b"A0000 OK [APPENDUID 38505 3955] APPEND completed\r\n")
            .wait(OPEN)
            .build();
        let mut session = Session::from_stream(mock, quiet()).await.unwrap();

        let appended = session
            .append("Drafts", vec![Flag::Draft], b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(appended, Some(uid(3955)));
    }
}
