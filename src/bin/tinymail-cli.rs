#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for reading and sending mail through tinymail

use clap::{Parser, Subcommand};
use tinymail::{Account, Credentials, MailClient, MailConfig, Mailbox, Message};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tinymail-cli")]
#[command(about = "Minimal webmail client: list, read and send mail")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List mailboxes, INBOX first
    Mailboxes,

    /// Show a mailbox's UIDs and its newest messages
    Mailbox {
        /// Mailbox name
        name: String,
    },

    /// Show summaries for specific UIDs
    Messages {
        /// Mailbox containing the messages
        mailbox: String,

        /// Comma-separated UIDs (e.g. 42,41,7)
        #[arg(value_parser = parse_uid_list)]
        uids: UidList,
    },

    /// Show a single message with its text body
    Show {
        /// Message UID
        #[arg(value_parser = parse_uid)]
        uid: u32,

        /// Mailbox containing the message
        #[arg(long, default_value = "INBOX")]
        mailbox: String,
    },

    /// Send a plain-text message
    Send {
        /// Recipient address
        #[arg(long)]
        to: String,

        /// Subject line
        #[arg(long)]
        subject: String,

        /// Sender address (default: the account address)
        #[arg(long)]
        from: Option<String>,

        /// Message body (default: read from stdin)
        #[arg(long)]
        body: Option<String>,
    },
}

fn parse_uid(s: &str) -> Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(0) => Err("UID must be greater than 0".to_string()),
        Ok(uid) => Ok(uid),
        Err(e) => Err(format!("Invalid UID '{s}': {e}")),
    }
}

/// A comma-separated list of non-zero UIDs.
#[derive(Clone, Debug)]
struct UidList(Vec<u32>);

fn parse_uid_list(s: &str) -> Result<UidList, String> {
    s.split(',').map(parse_uid).collect::<Result<_, _>>().map(UidList)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = MailConfig::from_env()?;
    let credentials = Credentials::from_env()?;
    let account_email = credentials.email.clone();
    let client = MailClient::new(credentials, config)?;

    match &args.command {
        Command::Mailboxes => {
            let account = client.account().await?;
            print_account(&args, &account)?;
        }
        Command::Mailbox { name } => {
            let mailbox = client.mailbox(name).await?;
            print_mailbox(&args, &mailbox)?;
        }
        Command::Messages { mailbox, uids } => {
            let messages = client.messages(mailbox, &uids.0).await?;
            print_messages(&args, &messages)?;
        }
        Command::Show { uid, mailbox } => {
            let message = client.message(mailbox, *uid).await?;
            print_message(&args, &message)?;
        }
        Command::Send {
            to,
            subject,
            from,
            body,
        } => {
            let body = match body {
                Some(body) => body.clone(),
                None => {
                    let mut body = String::new();
                    tokio::io::stdin().read_to_string(&mut body).await?;
                    body
                }
            };
            let from = from.as_deref().unwrap_or(&account_email);
            client.send(from, to, subject, &body).await?;
            if !args.json {
                println!("Message sent to {to}");
            }
        }
    }

    Ok(())
}

fn print_account(args: &Args, account: &Account) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(account)?);
    } else {
        for mailbox in &account.mailboxes {
            println!("{}", mailbox.name);
        }
    }
    Ok(())
}

fn print_mailbox(args: &Args, mailbox: &Mailbox) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(mailbox)?);
        return Ok(());
    }

    let total = mailbox.uids.as_ref().map_or(0, Vec::len);
    println!("{}: {total} message(s)\n", mailbox.name);
    print_message_table(mailbox.messages.as_deref().unwrap_or_default());
    Ok(())
}

fn print_messages(args: &Args, messages: &[Message]) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(messages)?);
    } else {
        print_message_table(messages);
    }
    Ok(())
}

fn print_message(args: &Args, message: &Message) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(message)?);
        return Ok(());
    }

    println!("UID:     {}", message.uid);
    println!("From:    {}", message.from);
    println!("Subject: {}", message.subject);
    println!("Seen:    {}", if message.seen { "yes" } else { "no" });

    println!("\n--- Body ---\n");
    match &message.body {
        Some(body) => println!("{body}"),
        None => println!("(no plain-text body)"),
    }
    Ok(())
}

fn print_message_table(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    let header = format!("{:<8} {:<4} {:<30} {}", "UID", "New", "From", "Subject");
    println!("{header}");
    println!("{}", "-".repeat(80));

    for message in messages {
        println!(
            "{:<8} {:<4} {:<30} {}",
            message.uid,
            if message.seen { "" } else { "*" },
            truncate(&message.from, 28),
            truncate(&message.subject, 40),
        );
    }

    println!("\n{} message(s)", messages.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
