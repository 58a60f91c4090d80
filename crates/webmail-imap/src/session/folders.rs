//! Folder commands of the authenticated state.
//!
//! CREATE, DELETE, RENAME and (UN)SUBSCRIBE succeed when the folder is
//! already in the requested state, so a retried request does not fail.

use std::collections::{BTreeMap, HashSet};

use super::{Responder, Session};
use crate::command::{Command, StatusAttribute};
use crate::folder::{self, Folder, FolderCounts};
use crate::parser::{StatusItem, UntaggedResponse};
use crate::types::{ListResponse, Mailbox, ResponseCode};
use crate::{Error, Result};

impl Session {
    /// `LIST reference pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the server refuses.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        self.ensure_authenticated().await?;
        let command = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let responses = self.run(&command, Responder::None).await?.into_result()?;
        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::List(list) => Some(list),
                _ => None,
            })
            .collect())
    }

    /// `LSUB reference pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the server refuses.
    pub async fn lsub(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        self.ensure_authenticated().await?;
        let command = Command::Lsub {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let responses = self.run(&command, Responder::None).await?.into_result()?;
        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Lsub(list) => Some(list),
                _ => None,
            })
            .collect())
    }

    /// `STATUS mailbox (MESSAGES UNSEEN)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the folder cannot be queried.
    pub async fn status(&mut self, mailbox: &str) -> Result<FolderCounts> {
        self.ensure_authenticated().await?;
        let command = Command::Status {
            mailbox: Mailbox::new(mailbox),
            items: vec![StatusAttribute::Messages, StatusAttribute::Unseen],
        };
        let responses = self.run(&command, Responder::None).await?.into_result()?;

        let mut counts = FolderCounts::default();
        for response in &responses {
            let UntaggedResponse::Status { items, .. } = response else {
                continue;
            };
            for item in items {
                match item {
                    StatusItem::Messages(n) => counts.messages = *n,
                    StatusItem::Unseen(n) => counts.unseen = *n,
                    _ => {}
                }
            }
        }
        Ok(counts)
    }

    /// Lists every folder as a tree with subscription state and counts.
    ///
    /// A folder whose STATUS fails is returned without counts.
    ///
    /// # Errors
    ///
    /// Returns an error if LIST or LSUB fails.
    pub async fn list_folders(&mut self) -> Result<Vec<Folder>> {
        let lists = self.list("", "*").await?;
        let subscribed: HashSet<Mailbox> = self
            .lsub("", "*")
            .await?
            .into_iter()
            .map(|l| l.mailbox)
            .collect();

        let mut counts = BTreeMap::new();
        for list in lists.iter().filter(|l| l.is_selectable()) {
            match self.status(list.mailbox.as_str()).await {
                Ok(folder_counts) => {
                    counts.insert(list.mailbox.clone(), folder_counts);
                }
                Err(err) if err.is_connection_lost() => return Err(err),
                Err(err) => {
                    tracing::debug!(mailbox = %list.mailbox, error = %err, "STATUS failed");
                }
            }
        }

        tracing::debug!(folders = lists.len(), "folder list loaded");
        Ok(folder::build_tree(&lists, &subscribed, &counts))
    }

    /// Creates a folder; an existing folder is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] for any other refusal.
    pub async fn create(&mut self, mailbox: &str) -> Result<()> {
        self.ensure_authenticated().await?;
        let command = Command::Create {
            mailbox: Mailbox::new(mailbox),
        };
        let result = self.run(&command, Responder::None).await?;
        tolerate(result.check(), &ResponseCode::AlreadyExists, mailbox)
    }

    /// Deletes a folder; a missing folder is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] for any other refusal.
    pub async fn delete(&mut self, mailbox: &str) -> Result<()> {
        self.ensure_authenticated().await?;
        let command = Command::Delete {
            mailbox: Mailbox::new(mailbox),
        };
        let result = self.run(&command, Responder::None).await?;
        tolerate(result.check(), &ResponseCode::NonExistent, mailbox)
    }

    /// Renames a folder.
    ///
    /// If the server refuses but `from` is gone and `to` exists, the rename
    /// already happened and this succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the rename did not take place.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.ensure_authenticated().await?;
        let command = Command::Rename {
            from: Mailbox::new(from),
            to: Mailbox::new(to),
        };
        let Err(err) = self.run(&command, Responder::None).await?.check() else {
            return Ok(());
        };

        let existing: HashSet<String> = self
            .list("", "*")
            .await?
            .into_iter()
            .map(|l| l.mailbox.0)
            .collect();
        if !existing.contains(from) && existing.contains(to) {
            tracing::debug!(from, to, "folder already renamed");
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Subscribes to a folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] if the server refuses.
    pub async fn subscribe(&mut self, mailbox: &str) -> Result<()> {
        self.ensure_authenticated().await?;
        let command = Command::Subscribe {
            mailbox: Mailbox::new(mailbox),
        };
        self.run(&command, Responder::None).await?.check()?;
        Ok(())
    }

    /// Unsubscribes from a folder; a missing subscription is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] for any other refusal.
    pub async fn unsubscribe(&mut self, mailbox: &str) -> Result<()> {
        self.ensure_authenticated().await?;
        let command = Command::Unsubscribe {
            mailbox: Mailbox::new(mailbox),
        };
        let result = self.run(&command, Responder::None).await?;
        tolerate(result.check(), &ResponseCode::NonExistent, mailbox)
    }
}

/// Treats a refusal carrying `code` as success.
fn tolerate<T>(outcome: Result<T>, code: &ResponseCode, mailbox: &str) -> Result<()> {
    match outcome {
        Ok(_) => Ok(()),
        Err(err) if err.response_code() == Some(code) => {
            tracing::debug!(mailbox, code = ?code, "already in requested state");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
