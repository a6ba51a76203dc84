use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::model::Task;
use crate::scheduler::NotificationRequest;

#[derive(Serialize)]
pub struct TaskDetail<'a> {
    pub index: usize,
    #[serde(flatten)]
    pub task: &'a Task,
}

fn local(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_task_detail(index: usize, task: &Task) -> String {
    let mut out = String::new();
    out.push_str(&format!("Index:       {index}\n"));
    out.push_str(&format!("Id:          {}\n", task.id));
    out.push_str(&format!("Kind:        {}\n", task.kind.tag()));
    out.push_str(&format!("Title:       {}\n", task.title));
    if !task.description.is_empty() {
        out.push_str(&format!("Description: {}\n", task.description));
    }
    if let Some(link) = task.kind.link().filter(|l| !l.is_empty()) {
        out.push_str(&format!("Link:        {link}\n"));
    }
    if let Some(mail) = task.kind.mail().filter(|m| !m.is_empty()) {
        out.push_str(&format!("Mail:        {mail}\n"));
    }
    out.push_str(&format!("Due:         {}\n", local(&task.due_date)));
    if let Some(ref at) = task.reminder_date {
        out.push_str(&format!("Reminder:    {}\n", local(at)));
    }
    out.push_str(&format!(
        "Completed:   {}\n",
        if task.is_completed { "yes" } else { "no" }
    ));
    if let Some(ref contact) = task.contact {
        out.push_str(&format!("Contact:     {}\n", contact.display_name()));
        if let Some(ref phone) = contact.phone_number {
            out.push_str(&format!("Phone:       {phone}\n"));
        }
    }
    out
}

pub fn format_task_list(tasks: &[Task]) -> String {
    let mut out = String::new();
    for (index, task) in tasks.iter().enumerate() {
        let reminder = task
            .reminder_date
            .as_ref()
            .map(|at| format!("  @ {}", local(at)))
            .unwrap_or_default();
        out.push_str(&format!(
            "{index:>3} {} [{}] {}{}\n",
            task.icon(),
            task.kind.tag(),
            task.title,
            reminder
        ));
    }
    out
}

pub fn format_notifications(requests: &[NotificationRequest]) -> String {
    let mut out = String::new();
    for r in requests {
        let t = &r.trigger;
        out.push_str(&format!(
            "{:04}-{:02}-{:02} {:02}:{:02}  {}  {}",
            t.year, t.month, t.day, t.hour, t.minute, r.identifier, r.title
        ));
        if !r.body.is_empty() {
            out.push_str(&format!(": {}", r.body));
        }
        out.push('\n');
    }
    out
}
