use chrono::{DateTime, TimeZone};
use rusqlite::{Connection, OptionalExtension};

use crate::error::SchedulingError;
use crate::scheduler::{
    AuthOption, CalendarTrigger, NotificationCategory, NotificationCenter, NotificationRequest,
    Sound,
};

const UPSERT_REQUEST: &str = "
INSERT INTO notifications
    (identifier, title, body, sound, category, year, month, day, hour, minute, repeats)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
ON CONFLICT(identifier) DO UPDATE SET
    title = excluded.title,
    body = excluded.body,
    sound = excluded.sound,
    category = excluded.category,
    year = excluded.year,
    month = excluded.month,
    day = excluded.day,
    hour = excluded.hour,
    minute = excluded.minute,
    repeats = excluded.repeats,
    state = 'pending',
    created_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now'),
    fired_at = NULL
";

const REQUEST_COLUMNS: &str =
    "identifier, title, body, sound, category, year, month, day, hour, minute, repeats";

const MARK_FIRED: &str = "
UPDATE notifications
SET state = 'fired', fired_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
WHERE identifier = ?1 AND state = 'pending'
";

/// Notification service backed by the local SQLite database.
///
/// Stands in for the OS notification center: requests wait in the
/// `notifications` table until [`deliver_due`](Self::deliver_due) moves them
/// to the fired state.
pub struct LocalNotificationCenter {
    conn: Connection,
}

impl LocalNotificationCenter {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Host-side permission switch, outside the scheduler's control.
    pub fn set_authorization(&self, granted: bool) -> Result<(), SchedulingError> {
        self.conn.execute(
            "INSERT INTO notification_auth (id, granted) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET granted = excluded.granted,
                 requested_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
            [granted],
        )?;
        Ok(())
    }

    pub fn authorization(&self) -> Result<Option<bool>, SchedulingError> {
        let granted = self
            .conn
            .query_row("SELECT granted FROM notification_auth WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(granted)
    }

    pub fn categories(&self) -> Result<Vec<NotificationCategory>, SchedulingError> {
        let mut stmt = self
            .conn
            .prepare("SELECT identifier, actions FROM notification_categories ORDER BY identifier")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut categories = Vec::new();
        for row in rows {
            let (identifier, actions) = row?;
            let actions = serde_json::from_str(&actions)
                .map_err(|e| SchedulingError::Host(format!("corrupt category '{identifier}': {e}")))?;
            categories.push(NotificationCategory {
                identifier,
                actions,
            });
        }
        Ok(categories)
    }

    /// Fires every pending request whose trigger minute has been reached
    /// on the wall clock of `now`. Returns the fired requests.
    pub fn deliver_due<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<Vec<NotificationRequest>, SchedulingError> {
        let due: Vec<NotificationRequest> = self
            .pending()?
            .into_iter()
            .filter(|r| r.trigger.is_due_at(now))
            .collect();
        let tx = self.conn.unchecked_transaction()?;
        for request in &due {
            tx.execute(MARK_FIRED, [&request.identifier])?;
        }
        tx.commit()?;
        Ok(due)
    }

    pub fn delivered(&self) -> Result<Vec<NotificationRequest>, SchedulingError> {
        self.query_state("fired")
    }

    fn query_state(&self, state: &str) -> Result<Vec<NotificationRequest>, SchedulingError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM notifications WHERE state = ?1
             ORDER BY year, month, day, hour, minute, identifier"
        ))?;
        let rows = stmt.query_map([state], read_request_row)?;
        let mut requests = Vec::new();
        for row in rows {
            requests.push(NotificationRequest::try_from(row?)?);
        }
        Ok(requests)
    }
}

struct RequestRow {
    identifier: String,
    title: String,
    body: String,
    sound: String,
    category: String,
    components: (i32, u32, u32, u32, u32),
    repeats: bool,
}

fn read_request_row(row: &rusqlite::Row) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        identifier: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        sound: row.get(3)?,
        category: row.get(4)?,
        components: (row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?),
        repeats: row.get(10)?,
    })
}

impl TryFrom<RequestRow> for NotificationRequest {
    type Error = SchedulingError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let sound = Sound::parse(&row.sound).ok_or_else(|| {
            SchedulingError::Host(format!("unknown sound '{}' on {}", row.sound, row.identifier))
        })?;
        let (year, month, day, hour, minute) = row.components;
        let trigger = CalendarTrigger {
            repeats: row.repeats,
            ..CalendarTrigger::new(year, month, day, hour, minute)?
        };
        Ok(Self {
            identifier: row.identifier,
            title: row.title,
            body: row.body,
            sound,
            category: row.category,
            trigger,
        })
    }
}

impl NotificationCenter for LocalNotificationCenter {
    fn request_authorization(&self, options: &[AuthOption]) -> Result<bool, SchedulingError> {
        if let Some(granted) = self.authorization()? {
            return Ok(granted);
        }
        let options: Vec<&str> = options.iter().map(|o| o.as_str()).collect();
        self.conn.execute(
            "INSERT INTO notification_auth (id, granted, options) VALUES (1, 1, ?1)",
            [options.join(",")],
        )?;
        Ok(true)
    }

    fn set_categories(&self, categories: &[NotificationCategory]) -> Result<(), SchedulingError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM notification_categories", [])?;
        for category in categories {
            let actions = serde_json::to_string(&category.actions)
                .map_err(|e| SchedulingError::Host(e.to_string()))?;
            tx.execute(
                "INSERT INTO notification_categories (identifier, actions) VALUES (?1, ?2)",
                rusqlite::params![category.identifier, actions],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn add(&self, request: &NotificationRequest) -> Result<(), SchedulingError> {
        if self.authorization()? != Some(true) {
            return Err(SchedulingError::NotAuthorized);
        }
        let t = &request.trigger;
        self.conn.execute(
            UPSERT_REQUEST,
            rusqlite::params![
                request.identifier,
                request.title,
                request.body,
                request.sound.as_str(),
                request.category,
                t.year,
                t.month,
                t.day,
                t.hour,
                t.minute,
                t.repeats,
            ],
        )?;
        Ok(())
    }

    fn remove_pending(&self, identifiers: &[String]) -> Result<(), SchedulingError> {
        let tx = self.conn.unchecked_transaction()?;
        for identifier in identifiers {
            tx.execute(
                "DELETE FROM notifications WHERE identifier = ?1 AND state = 'pending'",
                [identifier],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn pending(&self) -> Result<Vec<NotificationRequest>, SchedulingError> {
        self.query_state("pending")
    }
}
