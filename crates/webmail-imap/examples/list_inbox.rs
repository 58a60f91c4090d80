#![allow(clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: print the folder tree and the newest messages of a mailbox.
//!
//! ## Running
//!
//! ```bash
//! IMAP_HOST=imap.example.com IMAP_USER=alice IMAP_PASSWORD=secret \
//!     cargo run --package webmail-imap --example list_inbox
//! ```
//!
//! `IMAP_FOLDER` picks another folder than INBOX and `RUST_LOG` adjusts
//! the log output (default `webmail_imap=debug`).

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use webmail_imap::{Credentials, Folder, ListRequest, ServerParams, Session, SessionConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "webmail_imap=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = std::env::var("IMAP_HOST")?;
    let user = std::env::var("IMAP_USER")?;
    let password = std::env::var("IMAP_PASSWORD")?;
    let folder = std::env::var("IMAP_FOLDER").unwrap_or_else(|_| "INBOX".into());

    let server = ServerParams::new(host);
    let credentials = Credentials::password(user, password);
    let mut session = Session::open(&server, &credentials, SessionConfig::new()).await?;

    println!("Folders:");
    for node in session.list_folders().await? {
        print_folder(&node, 1);
    }

    let request = ListRequest::new(folder.as_str()).per_page(Some(20)).threaded(true);
    let list = session.list_messages(&request).await?;
    println!(
        "\n{}: page {} of {} ({} messages, {:?})",
        folder,
        list.paginator.page(),
        list.paginator.max_page(),
        list.paginator.total(),
        list.path
    );
    for message in &list.messages {
        let indent = "  ".repeat(message.depth as usize);
        let from = message.from().map(|a| a.display_name()).unwrap_or_default();
        let unread = if message.is_seen() { ' ' } else { '*' };
        println!("{unread} {:>6} {indent}{} ({})", message.uid.get(), message.subject(), from);
    }

    session.logout().await?;
    Ok(())
}

fn print_folder(folder: &Folder, level: usize) {
    let counts = folder
        .counts
        .map(|c| format!(" [{}/{}]", c.unseen, c.messages))
        .unwrap_or_default();
    println!("{}{}{}", "  ".repeat(level), folder.display_name, counts);
    for child in &folder.children {
        print_folder(child, level + 1);
    }
}
