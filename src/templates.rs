//! Per-kind title and body templates for reminder notifications.
//!
//! Placeholders are written as `{name}` and replaced with task fields:
//! `{title}`, `{description}`, `{contact}`, `{phone}`, `{link}`, `{mail}`.
//! Fields the task does not carry render as the empty string; unknown
//! placeholders are left as-is.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::ConfigError;
use crate::model::{KindTag, Task};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub title: String,
    pub body: String,
}

impl Template {
    fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderTemplates {
    pub birthday: Template,
    pub meeting: Template,
    pub call: Template,
    pub custom: Template,
}

impl Default for ReminderTemplates {
    fn default() -> Self {
        Self {
            birthday: Template::new("Birthday: {title}", "{description}"),
            meeting: Template::new("Meeting: {title}", "{description}"),
            call: Template::new("Call: {title}", "Call {contact} at {phone}"),
            custom: Template::new("{title}", "{description}"),
        }
    }
}

/// A rendered notification title and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub title: String,
    pub body: String,
}

impl ReminderTemplates {
    /// Reads templates from a JSON file. Kinds missing from the file keep
    /// their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        config::read_json(path)
    }

    pub fn for_kind(&self, tag: KindTag) -> &Template {
        match tag {
            KindTag::Birthday => &self.birthday,
            KindTag::Meeting => &self.meeting,
            KindTag::Call => &self.call,
            KindTag::Custom => &self.custom,
        }
    }

    pub fn render(&self, task: &Task) -> Rendered {
        let template = self.for_kind(task.kind.tag());
        Rendered {
            title: interpolate(&template.title, task),
            body: interpolate(&template.body, task),
        }
    }
}

fn placeholder(name: &str, task: &Task) -> Option<String> {
    let contact = task.contact.as_ref();
    let value = match name {
        "title" => task.title.clone(),
        "description" => task.description.clone(),
        "contact" => contact.map(|c| c.display_name()).unwrap_or_default(),
        "phone" => contact
            .and_then(|c| c.phone_number.as_ref())
            .map(|p| p.to_string())
            .unwrap_or_default(),
        "link" => task.kind.link().unwrap_or_default().to_string(),
        "mail" => task.kind.mail().unwrap_or_default().to_string(),
        _ => return None,
    };
    Some(value)
}

fn interpolate(template: &str, task: &Task) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match placeholder(name, task) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
