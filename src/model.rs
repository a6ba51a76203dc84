use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a reminder is about. Payload fields only exist on the kinds that use them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kind {
    Birthday,
    Meeting {
        #[serde(default)]
        link: String,
        #[serde(default)]
        mail: String,
    },
    Call,
    Custom {
        #[serde(default)]
        link: String,
    },
}

impl Default for Kind {
    fn default() -> Self {
        Self::Custom {
            link: String::new(),
        }
    }
}

impl Kind {
    pub fn tag(&self) -> KindTag {
        match self {
            Self::Birthday => KindTag::Birthday,
            Self::Meeting { .. } => KindTag::Meeting,
            Self::Call => KindTag::Call,
            Self::Custom { .. } => KindTag::Custom,
        }
    }

    /// Builds a kind from its tag, dropping payload the tag has no room for.
    pub fn from_tag(tag: KindTag, link: String, mail: String) -> Self {
        match tag {
            KindTag::Birthday => Self::Birthday,
            KindTag::Meeting => Self::Meeting { link, mail },
            KindTag::Call => Self::Call,
            KindTag::Custom => Self::Custom { link },
        }
    }

    /// Legacy integer encoding: 0 = unset, 1 = birthday, 2 = meeting, 3 = call, 4 = custom.
    pub fn from_code(code: u8, link: String, mail: String) -> Option<Self> {
        let tag = match code {
            0 | 4 => KindTag::Custom,
            1 => KindTag::Birthday,
            2 => KindTag::Meeting,
            3 => KindTag::Call,
            _ => return None,
        };
        Some(Self::from_tag(tag, link, mail))
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            Self::Meeting { link, .. } | Self::Custom { link } => Some(link),
            _ => None,
        }
    }

    pub fn mail(&self) -> Option<&str> {
        match self {
            Self::Meeting { mail, .. } => Some(mail),
            _ => None,
        }
    }
}

/// Payload-free discriminant of [`Kind`], used for lookups and parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    Birthday,
    Meeting,
    Call,
    Custom,
}

impl KindTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Birthday => "birthday",
            Self::Meeting => "meeting",
            Self::Call => "call",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KindTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "birthday" => Ok(Self::Birthday),
            "meeting" => Ok(Self::Meeting),
            "call" => Ok(Self::Call),
            "custom" => Ok(Self::Custom),
            _ => Err(format!(
                "invalid kind '{s}': must be birthday, meeting, call, or custom"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a contact, copied into the task that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub id: Uuid,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<PhoneNumber>,
}

impl ContactInfo {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone_number: Option<PhoneNumber>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaskRecord")]
pub struct Task {
    pub id: Uuid,
    pub kind: Kind,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub is_completed: bool,
    pub reminder_date: Option<DateTime<Utc>>,
    pub contact: Option<ContactInfo>,
}

impl Task {
    pub fn new(kind: Kind, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            description: String::new(),
            due_date: Utc::now(),
            is_completed: false,
            reminder_date: None,
            contact: None,
        }
    }

    /// Returns display icon: x=completed, !=reminder set, .=plain
    pub fn icon(&self) -> &'static str {
        if self.is_completed {
            "x"
        } else if self.reminder_date.is_some() {
            "!"
        } else {
            "."
        }
    }
}

/// On-disk shape of a task. Accepts both the tagged `kind` object and the
/// older integer code with top-level `link`/`mail` fields.
#[derive(Deserialize)]
struct TaskRecord {
    id: Uuid,
    #[serde(default)]
    kind: KindField,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    due_date: DateTime<Utc>,
    #[serde(default)]
    is_completed: bool,
    #[serde(default)]
    reminder_date: Option<DateTime<Utc>>,
    #[serde(default)]
    contact: Option<ContactInfo>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    mail: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KindField {
    Code(u8),
    Tagged(Kind),
}

impl Default for KindField {
    fn default() -> Self {
        Self::Code(0)
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = String;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let kind = match record.kind {
            KindField::Tagged(kind) => kind,
            KindField::Code(code) => Kind::from_code(code, record.link, record.mail)
                .ok_or_else(|| format!("unknown kind code {code}"))?,
        };
        Ok(Self {
            id: record.id,
            kind,
            title: record.title,
            description: record.description,
            due_date: record.due_date,
            is_completed: record.is_completed,
            reminder_date: record.reminder_date,
            contact: record.contact,
        })
    }
}
