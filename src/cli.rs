use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};

use remindr::model::KindTag;

#[derive(Parser)]
#[command(name = "remindr", about = "Reminders for birthdays, meetings, and calls")]
pub struct Cli {
    /// Path to the SQLite database [default: ~/.remindr/remindr.db]
    #[arg(long, env = "REMINDR_DB", global = true)]
    pub db: Option<PathBuf>,

    /// JSON file with per-kind notification templates
    #[arg(long, env = "REMINDR_TEMPLATES", global = true)]
    pub templates: Option<PathBuf>,

    /// JSON address book used by `add --contact`
    #[arg(long, env = "REMINDR_CONTACTS", global = true)]
    pub contacts: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create database and tables (idempotent)
    Init,

    /// Request notification permission, or deny it with --deny
    Auth {
        /// Record a denial instead of a grant
        #[arg(long)]
        deny: bool,
    },

    /// Add a reminder
    Add {
        /// Reminder title
        title: String,
        /// Kind (birthday, meeting, call, custom)
        #[arg(short, long, default_value = "custom", value_parser = parse_kind)]
        kind: KindTag,
        /// Description
        #[arg(short, long, default_value = "")]
        desc: String,
        /// Due date (RFC 3339 or "YYYY-MM-DD HH:MM" local) [default: now]
        #[arg(long, value_parser = parse_when)]
        due: Option<DateTime<Utc>>,
        /// When to fire the notification
        #[arg(short, long, value_parser = parse_when)]
        remind: Option<DateTime<Utc>>,
        /// Link (meeting and custom)
        #[arg(long, default_value = "")]
        link: String,
        /// Mail address (meeting)
        #[arg(long, default_value = "")]
        mail: String,
        /// Look up the contact by name prefix in the address book
        #[arg(long, conflicts_with_all = ["first_name", "last_name", "phone"])]
        contact: Option<String>,
        /// Contact first name
        #[arg(long)]
        first_name: Option<String>,
        /// Contact last name
        #[arg(long)]
        last_name: Option<String>,
        /// Contact phone number
        #[arg(long)]
        phone: Option<String>,
        /// Print the stored task as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit a reminder
    Edit {
        /// Task index or id
        task: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        desc: Option<String>,
        /// New reminder time
        #[arg(short, long, value_parser = parse_when, conflicts_with = "clear_remind")]
        remind: Option<DateTime<Utc>>,
        /// Remove the reminder and cancel its notification
        #[arg(long)]
        clear_remind: bool,
        /// Set the completed flag
        #[arg(long)]
        completed: Option<bool>,
    },

    /// Remove reminders by index
    Rm {
        /// Indices as shown by `list`
        #[arg(required = true)]
        indices: Vec<usize>,
    },

    /// List reminders
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show reminder details
    Show {
        /// Task index or id
        task: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List pending notifications
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Deliver notifications that are due and print them
    Fire,
}

fn parse_kind(s: &str) -> Result<KindTag, String> {
    s.parse()
}

/// Accepts RFC 3339, or `YYYY-MM-DD HH:MM` in local time.
pub fn parse_when(s: &str) -> Result<DateTime<Utc>, String> {
    parse_when_in(s, &Local)
}

fn parse_when_in<Tz: TimeZone>(s: &str, tz: &Tz) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").map_err(|_| {
        format!("invalid time '{s}': expected RFC 3339 or YYYY-MM-DD HH:MM")
    })?;
    tz.from_local_datetime(&naive)
        .single()
        .map(|ts| ts.with_timezone(&Utc))
        .ok_or_else(|| format!("time '{s}' is ambiguous or skipped in the local time zone"))
}
