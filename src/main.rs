mod cli;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use log::info;
use rusqlite::Connection;
use uuid::Uuid;

use cli::{Cli, Command};
use remindr::contacts::{ContactDirectory, JsonDirectory};
use remindr::local_center::LocalNotificationCenter;
use remindr::model::{ContactInfo, Kind, PhoneNumber, Task};
use remindr::scheduler::{NotificationCenter, Scheduler};
use remindr::store::{Scheduling, TaskStore};
use remindr::templates::ReminderTemplates;
use remindr::{db, output, paths};

type Store = TaskStore<LocalNotificationCenter>;

fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("REMINDR_LOG", "warn"))
        .format_timestamp_secs()
        .init();
}

fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn open_db(db_path: &Path) -> Result<Connection> {
    let path = db_path
        .to_str()
        .context("database path is not valid UTF-8")?;
    let conn = db::open(path).with_context(|| format!("failed to open {path}"))?;
    db::init(&conn)?;
    Ok(conn)
}

fn load_templates(path: Option<&Path>) -> Result<ReminderTemplates> {
    match path {
        Some(p) => Ok(ReminderTemplates::load(p)?),
        None => Ok(ReminderTemplates::default()),
    }
}

fn open_store(db_path: &Path, templates: Option<&Path>) -> Result<Store> {
    let center = LocalNotificationCenter::new(open_db(db_path)?);
    let scheduler = Scheduler::new(center, load_templates(templates)?)
        .context("failed to register notification category")?;
    if let Err(e) = scheduler.request_authorization() {
        log::warn!("authorization request failed: {e}");
    }
    let mut store = TaskStore::new(open_db(db_path)?, paths::store_key(), scheduler);
    store
        .load()
        .with_context(|| format!("failed to load tasks from {}", db_path.display()))?;
    info!("loaded {} tasks under '{}'", store.len(), store.key());
    Ok(store)
}

/// Resolves a task argument given as a list index or a task id.
fn resolve_task(store: &Store, arg: &str) -> Result<usize> {
    if let Ok(index) = arg.parse::<usize>() {
        if index >= store.len() {
            bail!("no task at index {index} ({} tasks)", store.len());
        }
        return Ok(index);
    }
    let id = Uuid::parse_str(arg).with_context(|| format!("'{arg}' is not an index or task id"))?;
    store
        .position(id)
        .with_context(|| format!("task {id} not found"))
}

fn report_scheduling(scheduling: &Scheduling) {
    match scheduling {
        Scheduling::NotRequested => {}
        Scheduling::Scheduled { identifier } => eprintln!("Scheduled notification {identifier}"),
        Scheduling::Failed(e) => eprintln!("warning: reminder not scheduled: {e}"),
    }
}

fn lookup_contact(directory: Option<&Path>, prefix: &str) -> Result<ContactInfo> {
    let path = directory.context("--contact needs an address book (--contacts or REMINDR_CONTACTS)")?;
    let directory = JsonDirectory::load(path)?;
    let matches = directory.find_by_name_prefix(prefix);
    match matches.as_slice() {
        [] => bail!("no contact matches '{prefix}'"),
        [entry] => Ok(ContactInfo::from(entry)),
        many => {
            let names: Vec<String> = many
                .iter()
                .map(|e| format!("{} {}", e.given_name, e.family_name))
                .collect();
            bail!("'{prefix}' matches several contacts: {}", names.join(", "))
        }
    }
}

fn main() {
    setup_logging();
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(paths::default_db_path);
    ensure_db_dir(&db_path)?;
    let templates = cli.templates.as_deref();

    match cli.command {
        Command::Init => {
            open_db(&db_path)?;
            eprintln!("Initialized {}", db_path.display());
        }

        Command::Auth { deny } => {
            let store = open_store(&db_path, templates)?;
            let scheduler = store.scheduler();
            if deny {
                scheduler.center().set_authorization(false)?;
                eprintln!("Notifications denied");
            } else if scheduler.request_authorization()? {
                eprintln!("Notifications authorized");
            } else {
                eprintln!("Notifications denied");
            }
        }

        Command::Add {
            title,
            kind,
            desc,
            due,
            remind,
            link,
            mail,
            contact,
            first_name,
            last_name,
            phone,
            json,
        } => {
            let mut store = open_store(&db_path, templates)?;
            let kind = Kind::from_tag(kind, link, mail);
            let mut task = Task::new(kind, title);
            task.description = desc;
            if let Some(due) = due {
                task.due_date = due;
            }
            task.reminder_date = remind;
            task.contact = match contact {
                Some(prefix) => Some(lookup_contact(cli.contacts.as_deref(), &prefix)?),
                None if first_name.is_some() || last_name.is_some() || phone.is_some() => {
                    Some(ContactInfo::new(
                        first_name.unwrap_or_default(),
                        last_name.unwrap_or_default(),
                        phone.map(PhoneNumber::new),
                    ))
                }
                None => None,
            };
            let id = task.id;
            let scheduling = store.add(task)?;
            if json {
                let index = store.len() - 1;
                let detail = output::TaskDetail {
                    index,
                    task: &store.tasks()[index],
                };
                println!("{}", serde_json::to_string_pretty(&detail)?);
            }
            eprintln!("Added task {id}");
            report_scheduling(&scheduling);
        }

        Command::Edit {
            task,
            title,
            desc,
            remind,
            clear_remind,
            completed,
        } => {
            let mut store = open_store(&db_path, templates)?;
            let index = resolve_task(&store, &task)?;
            let mut task = store.tasks()[index].clone();
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(desc) = desc {
                task.description = desc;
            }
            if remind.is_some() {
                task.reminder_date = remind;
            } else if clear_remind {
                task.reminder_date = None;
            }
            if let Some(completed) = completed {
                task.is_completed = completed;
            }
            let id = task.id;
            let scheduling = store.update(task)?;
            eprintln!("Updated task {id}");
            report_scheduling(&scheduling);
        }

        Command::Rm { indices } => {
            let mut store = open_store(&db_path, templates)?;
            let indices: BTreeSet<usize> = indices.into_iter().collect();
            for task in store.remove(&indices)? {
                eprintln!("Removed '{}' ({})", task.title, task.id);
            }
        }

        Command::List { json } => {
            let store = open_store(&db_path, templates)?;
            if json {
                println!("{}", serde_json::to_string_pretty(store.tasks())?);
            } else {
                print!("{}", output::format_task_list(store.tasks()));
            }
        }

        Command::Show { task, json } => {
            let store = open_store(&db_path, templates)?;
            let index = resolve_task(&store, &task)?;
            let task = &store.tasks()[index];
            if json {
                let detail = output::TaskDetail { index, task };
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                print!("{}", output::format_task_detail(index, task));
            }
        }

        Command::Pending { json } => {
            let store = open_store(&db_path, templates)?;
            let pending = store.scheduler().center().pending()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&pending)?);
            } else {
                print!("{}", output::format_notifications(&pending));
            }
        }

        Command::Fire => {
            let store = open_store(&db_path, templates)?;
            let fired = store.scheduler().center().deliver_due(&Local::now())?;
            print!("{}", output::format_notifications(&fired));
            eprintln!("Delivered {} notification(s) at {}", fired.len(), Utc::now());
        }
    }

    Ok(())
}
