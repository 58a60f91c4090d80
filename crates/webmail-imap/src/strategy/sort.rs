//! Client-side ordering with RFC 5256 SORT semantics.
//!
//! Used when the server lacks SORT, so a listing comes out in the order a
//! SORT-capable server would produce for the same program.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};

use super::MessageSummary;
use crate::command::{SortCriterion, SortKey, SortProgram};
use crate::parser::Address;

/// Sorts `messages` by `program`; messages equal under every key keep
/// ascending UID order.
pub fn client_sort(messages: &mut [MessageSummary], program: &SortProgram) {
    let mut keyed: Vec<(Vec<KeyValue>, &MessageSummary)> = messages
        .iter()
        .map(|m| (program.criteria().iter().map(|c| key_value(m, c.key)).collect(), m))
        .collect();

    keyed.sort_by(|(a_keys, a), (b_keys, b)| {
        program
            .criteria()
            .iter()
            .zip(a_keys.iter().zip(b_keys))
            .map(|(criterion, (x, y))| directed(criterion, x.cmp(y)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.uid.cmp(&b.uid))
    });

    let order: Vec<MessageSummary> = keyed.into_iter().map(|(_, m)| m.clone()).collect();
    for (slot, message) in messages.iter_mut().zip(order) {
        *slot = message;
    }
}

const fn directed(criterion: &SortCriterion, ordering: Ordering) -> Ordering {
    if criterion.reverse {
        ordering.reverse()
    } else {
        ordering
    }
}

/// Precomputed value of one sort key.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum KeyValue {
    /// Missing dates sort before every known date.
    Time(Option<i64>),
    Size(u32),
    Text(String),
}

fn key_value(message: &MessageSummary, key: SortKey) -> KeyValue {
    match key {
        SortKey::Arrival => KeyValue::Time(timestamp(message.arrival())),
        SortKey::Date => KeyValue::Time(timestamp(message.date())),
        SortKey::Size => KeyValue::Size(message.size),
        SortKey::Subject => KeyValue::Text(base_subject(&message.subject()).to_ascii_lowercase()),
        SortKey::From => KeyValue::Text(first_mailbox(&message.envelope.from)),
        SortKey::To => KeyValue::Text(first_mailbox(&message.envelope.to)),
        SortKey::Cc => KeyValue::Text(first_mailbox(&message.envelope.cc)),
    }
}

fn timestamp(date: Option<DateTime<FixedOffset>>) -> Option<i64> {
    date.map(|d| d.timestamp())
}

fn first_mailbox(addresses: &[Address]) -> String {
    addresses
        .first()
        .map(|a| a.mailbox.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Reduces a subject to its RFC 5256 base subject.
///
/// Strips `Re:`, `Fw:` and `Fwd:` leaders with optional `[blob]`s, a
/// trailing `(fwd)`, and a `[Fwd: ...]` wrapper. Whitespace runs collapse
/// to one space.
#[must_use]
pub fn base_subject(subject: &str) -> String {
    let mut subject = subject.split_whitespace().collect::<Vec<_>>().join(" ");

    loop {
        while let Some(head) = strip_suffix_ignore_case(&subject, "(fwd)") {
            subject = head.trim_end().to_string();
        }

        loop {
            if let Some(rest) = strip_leader(&subject) {
                subject = rest.to_string();
            } else if let Some(rest) = strip_blob(&subject).filter(|rest| !rest.is_empty()) {
                subject = rest.to_string();
            } else {
                break;
            }
        }

        match unwrap_fwd(&subject) {
            Some(inner) => subject = inner.to_string(),
            None => return subject,
        }
    }
}

/// `*subj-blob subj-refwd`.
fn strip_leader(s: &str) -> Option<&str> {
    let mut rest = s;
    while let Some(after) = strip_blob(rest) {
        rest = after;
    }
    let after = ["fwd", "fw", "re"]
        .iter()
        .find_map(|prefix| strip_prefix_ignore_case(rest, prefix))?
        .trim_start();
    let after = strip_blob(after).unwrap_or(after);
    after.strip_prefix(':').map(str::trim_start)
}

/// `"[" *BLOBCHAR "]" *WSP`.
fn strip_blob(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('[')?;
    let end = inner.find(['[', ']'])?;
    inner[end..]
        .strip_prefix(']')
        .map(str::trim_start)
}

fn unwrap_fwd(s: &str) -> Option<&str> {
    let inner = strip_prefix_ignore_case(s, "[fwd:")?.strip_suffix(']')?;
    Some(inner.trim())
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::parser::Envelope;
    use crate::types::{Flags, Uid};

    fn message(uid: u32, subject: &str, date: &str, from: &str) -> MessageSummary {
        MessageSummary {
            uid: Uid::new(uid).unwrap(),
            flags: Flags::default(),
            size: uid * 10,
            internal_date: Some("01-Jan-2024 00:00:00 +0000".into()),
            envelope: Envelope {
                date: date.into(),
                subject: subject.into(),
                from: vec![Address {
                    mailbox: from.into(),
                    host: "example.com".into(),
                    ..Address::default()
                }],
                ..Envelope::default()
            },
            references: Vec::new(),
            depth: 0,
            parent: None,
        }
    }

    fn uids(messages: &[MessageSummary]) -> Vec<u32> {
        messages.iter().map(|m| m.uid.get()).collect()
    }

    #[test]
    fn test_base_subject() {
        assert_eq!(base_subject("Re: [list] Fwd: Hello (fwd)"), "Hello");
        assert_eq!(base_subject("RE:  re:   Lunch\t plans"), "Lunch plans");
        assert_eq!(base_subject("[Fwd: Re: Meeting]"), "Meeting");
        assert_eq!(base_subject("Fw [x]: notes"), "notes");
        assert_eq!(base_subject("[announce] Release"), "Release");
        assert_eq!(base_subject("[only-blob]"), "[only-blob]");
        assert_eq!(base_subject("Reply needed"), "Reply needed");
        assert_eq!(base_subject(""), "");
    }

    #[test]
    fn test_reverse_date_with_uid_ties() {
        let mut messages = vec![
            message(3, "a", "Tue, 2 Jan 2024 10:00:00 +0000", "x"),
            message(1, "b", "Mon, 1 Jan 2024 10:00:00 +0000", "x"),
            message(2, "c", "Tue, 2 Jan 2024 10:00:00 +0000", "x"),
        ];
        client_sort(&mut messages, &"-DATE".parse().unwrap());
        assert_eq!(uids(&messages), [2, 3, 1]);
    }

    #[test]
    fn test_missing_date_uses_internal_date() {
        let mut messages = vec![
            message(1, "a", "Wed, 3 Jan 2024 10:00:00 +0000", "x"),
            message(2, "b", "", "x"),
        ];
        client_sort(&mut messages, &SortProgram::ascending(SortKey::Date));
        assert_eq!(uids(&messages), [2, 1]);
    }

    #[test]
    fn test_subject_then_from() {
        let mut messages = vec![
            message(1, "Re: beta", "", "Zed"),
            message(2, "ALPHA", "", "bob"),
            message(3, "Fwd: Beta", "", "amy"),
            message(4, "alpha", "", "Bob"),
        ];
        client_sort(&mut messages, &"SUBJECT FROM".parse().unwrap());
        assert_eq!(uids(&messages), [2, 4, 3, 1]);
    }

    #[test]
    fn test_size_reverse() {
        let mut messages = vec![message(1, "", "", ""), message(5, "", "", ""), message(3, "", "", "")];
        client_sort(&mut messages, &SortProgram::descending(SortKey::Size));
        assert_eq!(uids(&messages), [5, 3, 1]);
    }

    proptest! {
        #[test]
        fn prop_base_subject_is_idempotent(subject in "((Re|Fwd|FW): |\\[[a-z]{1,5}\\] )*[A-Za-z ]{0,12}( \\(fwd\\))?") {
            let once = base_subject(&subject);
            prop_assert_eq!(base_subject(&once), once);
        }

        #[test]
        fn prop_sort_is_deterministic(sizes in proptest::collection::vec(0u32..4, 0..20)) {
            let mut messages: Vec<_> = sizes
                .iter()
                .enumerate()
                .map(|(i, &size)| {
                    let mut m = message(u32::try_from(i).unwrap() + 1, "", "", "");
                    m.size = size;
                    m
                })
                .collect();
            let mut reversed: Vec<_> = messages.iter().rev().cloned().collect();
            let program = SortProgram::ascending(SortKey::Size);

            client_sort(&mut messages, &program);
            client_sort(&mut reversed, &program);

            prop_assert_eq!(uids(&messages), uids(&reversed));
            for pair in messages.windows(2) {
                prop_assert!((pair[0].size, pair[0].uid) < (pair[1].size, pair[1].uid));
            }
        }
    }
}
