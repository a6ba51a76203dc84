use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::model::Task;
use crate::templates::ReminderTemplates;

/// Category attached to every reminder notification.
pub const CATEGORY_ID: &str = "reminder.actions";
pub const SNOOZE_ACTION: &str = "Snooze";
pub const OPEN_APP_ACTION: &str = "Open App";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthOption {
    Alert,
    Badge,
    Sound,
}

impl AuthOption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Badge => "badge",
            Self::Sound => "sound",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub identifier: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCategory {
    pub identifier: String,
    pub actions: Vec<NotificationAction>,
}

impl NotificationCategory {
    /// The Snooze / Open App category shared by all reminders.
    pub fn reminder_actions() -> Self {
        let action = |id: &str| NotificationAction {
            identifier: id.to_string(),
            title: id.to_string(),
        };
        Self {
            identifier: CATEGORY_ID.to_string(),
            actions: vec![action(SNOOZE_ACTION), action(OPEN_APP_ACTION)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sound {
    Default,
    None,
}

impl Sound {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Fires when the wall clock matches these components.
/// With the year included a non-repeating trigger fires at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarTrigger {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub repeats: bool,
}

impl CalendarTrigger {
    pub fn new(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
    ) -> Result<Self, SchedulingError> {
        if NaiveDate::from_ymd_opt(year, month, day).is_none() || hour > 23 || minute > 59 {
            return Err(SchedulingError::InvalidTrigger(format!(
                "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}"
            )));
        }
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            repeats: false,
        })
    }

    /// Components of `date` as seen in its own time zone. Seconds are dropped.
    pub fn matching<Tz: TimeZone>(date: &DateTime<Tz>) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            hour: date.hour(),
            minute: date.minute(),
            repeats: false,
        }
    }

    fn key(&self) -> (i32, u32, u32, u32, u32) {
        (self.year, self.month, self.day, self.hour, self.minute)
    }

    /// True once the wall clock of `now` has reached the trigger minute.
    pub fn is_due_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        Self::matching(now).key() >= self.key()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub identifier: String,
    pub title: String,
    pub body: String,
    pub sound: Sound,
    pub category: String,
    pub trigger: CalendarTrigger,
}

/// Host notification service. Requests are keyed by identifier: adding a
/// request whose identifier is already pending replaces it.
pub trait NotificationCenter {
    fn request_authorization(&self, options: &[AuthOption]) -> Result<bool, SchedulingError>;
    fn set_categories(&self, categories: &[NotificationCategory]) -> Result<(), SchedulingError>;
    fn add(&self, request: &NotificationRequest) -> Result<(), SchedulingError>;
    fn remove_pending(&self, identifiers: &[String]) -> Result<(), SchedulingError>;
    fn pending(&self) -> Result<Vec<NotificationRequest>, SchedulingError>;
}

impl<C: NotificationCenter + ?Sized> NotificationCenter for &C {
    fn request_authorization(&self, options: &[AuthOption]) -> Result<bool, SchedulingError> {
        (**self).request_authorization(options)
    }

    fn set_categories(&self, categories: &[NotificationCategory]) -> Result<(), SchedulingError> {
        (**self).set_categories(categories)
    }

    fn add(&self, request: &NotificationRequest) -> Result<(), SchedulingError> {
        (**self).add(request)
    }

    fn remove_pending(&self, identifiers: &[String]) -> Result<(), SchedulingError> {
        (**self).remove_pending(identifiers)
    }

    fn pending(&self) -> Result<Vec<NotificationRequest>, SchedulingError> {
        (**self).pending()
    }
}

pub fn notification_id(id: Uuid) -> String {
    id.hyphenated().to_string()
}

/// Turns tasks into calendar-triggered notifications on a [`NotificationCenter`].
///
/// Trigger components are taken in `tz`, the user's wall clock.
pub struct Scheduler<C, Tz: TimeZone = Local> {
    center: C,
    templates: ReminderTemplates,
    tz: Tz,
}

impl<C: NotificationCenter> Scheduler<C, Local> {
    pub fn new(center: C, templates: ReminderTemplates) -> Result<Self, SchedulingError> {
        Self::with_time_zone(center, templates, Local)
    }
}

impl<C: NotificationCenter, Tz: TimeZone> Scheduler<C, Tz> {
    /// Registers the reminder category once; later scheduling only
    /// references it by identifier.
    pub fn with_time_zone(
        center: C,
        templates: ReminderTemplates,
        tz: Tz,
    ) -> Result<Self, SchedulingError> {
        center.set_categories(&[NotificationCategory::reminder_actions()])?;
        Ok(Self {
            center,
            templates,
            tz,
        })
    }

    pub fn center(&self) -> &C {
        &self.center
    }

    pub fn templates(&self) -> &ReminderTemplates {
        &self.templates
    }

    pub fn request_authorization(&self) -> Result<bool, SchedulingError> {
        let granted = self.center.request_authorization(&[
            AuthOption::Alert,
            AuthOption::Badge,
            AuthOption::Sound,
        ])?;
        if granted {
            info!("notification authorization granted");
        } else {
            warn!("notification authorization denied");
        }
        Ok(granted)
    }

    pub fn schedule_notification(
        &self,
        title: &str,
        body: &str,
        date: DateTime<Utc>,
        id: Uuid,
    ) -> Result<String, SchedulingError> {
        if date <= Utc::now() {
            return Err(SchedulingError::InPast(date));
        }
        let request = NotificationRequest {
            identifier: notification_id(id),
            title: title.to_string(),
            body: body.to_string(),
            sound: Sound::Default,
            category: CATEGORY_ID.to_string(),
            trigger: CalendarTrigger::matching(&date.with_timezone(&self.tz)),
        };
        self.center.add(&request)?;
        info!("scheduled notification {} for {date}", request.identifier);
        Ok(request.identifier)
    }

    /// Schedules `task` at its reminder date, using the templates for its kind.
    pub fn schedule(&self, task: &Task) -> Result<String, SchedulingError> {
        let date = task.reminder_date.ok_or(SchedulingError::NoReminder(task.id))?;
        let rendered = self.templates.render(task);
        self.schedule_notification(&rendered.title, &rendered.body, date, task.id)
    }

    pub fn cancel(&self, id: Uuid) -> Result<(), SchedulingError> {
        let identifier = notification_id(id);
        self.center.remove_pending(std::slice::from_ref(&identifier))?;
        info!("cancelled notification {identifier}");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::*;

    /// In-memory center that records every call.
    #[derive(Default)]
    pub struct RecordingCenter {
        pub authorized: RefCell<Option<bool>>,
        pub deny: bool,
        pub fail_add: bool,
        pub categories: RefCell<Vec<Vec<NotificationCategory>>>,
        pub added: RefCell<Vec<NotificationRequest>>,
        pub pending: RefCell<Vec<NotificationRequest>>,
        pub removed: RefCell<Vec<String>>,
    }

    impl NotificationCenter for RecordingCenter {
        fn request_authorization(&self, _: &[AuthOption]) -> Result<bool, SchedulingError> {
            let granted = *self.authorized.borrow_mut().get_or_insert(!self.deny);
            Ok(granted)
        }

        fn set_categories(&self, categories: &[NotificationCategory]) -> Result<(), SchedulingError> {
            self.categories.borrow_mut().push(categories.to_vec());
            Ok(())
        }

        fn add(&self, request: &NotificationRequest) -> Result<(), SchedulingError> {
            if self.fail_add {
                return Err(SchedulingError::Host("simulated failure".into()));
            }
            self.added.borrow_mut().push(request.clone());
            let mut pending = self.pending.borrow_mut();
            pending.retain(|r| r.identifier != request.identifier);
            pending.push(request.clone());
            Ok(())
        }

        fn remove_pending(&self, identifiers: &[String]) -> Result<(), SchedulingError> {
            self.removed.borrow_mut().extend_from_slice(identifiers);
            self.pending
                .borrow_mut()
                .retain(|r| !identifiers.contains(&r.identifier));
            Ok(())
        }

        fn pending(&self) -> Result<Vec<NotificationRequest>, SchedulingError> {
            Ok(self.pending.borrow().clone())
        }
    }
}
