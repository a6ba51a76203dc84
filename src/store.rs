use std::collections::BTreeSet;

use chrono::{Local, TimeZone, Utc};
use log::{info, warn};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::{SchedulingError, StoreError};
use crate::model::Task;
use crate::scheduler::{NotificationCenter, Scheduler};

/// What happened to a task's notification during a store mutation.
/// Scheduling problems never undo the mutation itself.
#[derive(Debug)]
pub enum Scheduling {
    /// The task carries no reminder date.
    NotRequested,
    Scheduled { identifier: String },
    Failed(SchedulingError),
}

impl Scheduling {
    fn from_result(task: &Task, result: Result<String, SchedulingError>) -> Self {
        match result {
            Ok(identifier) => Self::Scheduled { identifier },
            Err(err) => {
                warn!("failed to schedule reminder for task {}: {err}", task.id);
                Self::Failed(err)
            }
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled { .. })
    }
}

/// Ordered, persisted collection of tasks.
///
/// The in-memory sequence is authoritative; every mutation rewrites the
/// whole blob under `key`.
pub struct TaskStore<C, Tz: TimeZone = Local> {
    conn: Connection,
    key: String,
    tasks: Vec<Task>,
    scheduler: Scheduler<C, Tz>,
}

impl<C: NotificationCenter, Tz: TimeZone> TaskStore<C, Tz> {
    /// Creates an empty store. Call [`load`](Self::load) to restore saved tasks.
    pub fn new(conn: Connection, key: impl Into<String>, scheduler: Scheduler<C, Tz>) -> Self {
        Self {
            conn,
            key: key.into(),
            tasks: Vec::new(),
            scheduler,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    pub fn scheduler(&self) -> &Scheduler<C, Tz> {
        &self.scheduler
    }

    /// Replaces the in-memory sequence with the stored one.
    ///
    /// A missing entry yields an empty sequence. An undecodable blob leaves
    /// the sequence untouched and is reported as [`StoreError::Decode`].
    pub fn load(&mut self) -> Result<(), StoreError> {
        let Some(blob) = db::get_blob(&self.conn, &self.key)? else {
            self.tasks.clear();
            return Ok(());
        };
        match serde_json::from_slice::<Vec<Task>>(&blob) {
            Ok(tasks) => {
                self.tasks = tasks;
                Ok(())
            }
            Err(err) => {
                warn!("stored tasks under '{}' are unreadable: {err}", self.key);
                Err(StoreError::Decode(err))
            }
        }
    }

    /// Overwrites the stored blob with the full in-memory sequence.
    pub fn save(&self) -> Result<(), StoreError> {
        let blob = serde_json::to_vec(&self.tasks).map_err(StoreError::Encode)?;
        db::put_blob(&self.conn, &self.key, &blob)?;
        Ok(())
    }

    /// Appends `task`, schedules its reminder when it has one, then saves.
    ///
    /// If the save fails the task is dropped again and any notification it
    /// registered is cancelled.
    pub fn add(&mut self, task: Task) -> Result<Scheduling, StoreError> {
        if self.position(task.id).is_some() {
            return Err(StoreError::DuplicateId(task.id));
        }
        self.tasks.push(task);
        let task = &self.tasks[self.tasks.len() - 1];
        let scheduling = if task.reminder_date.is_some() {
            Scheduling::from_result(task, self.scheduler.schedule(task))
        } else {
            Scheduling::NotRequested
        };
        if let Err(err) = self.save() {
            if let Some(task) = self.tasks.pop() {
                if scheduling.is_scheduled() {
                    if let Err(cancel_err) = self.scheduler.cancel(task.id) {
                        warn!(
                            "failed to cancel reminder for unsaved task {}: {cancel_err}",
                            task.id
                        );
                    }
                }
            }
            return Err(err);
        }
        Ok(scheduling)
    }

    /// Removes the tasks at `indices` (positions before removal), cancels
    /// their pending notifications and saves. Returns the removed tasks in
    /// their original order.
    ///
    /// Any index out of range rejects the whole call.
    pub fn remove(&mut self, indices: &BTreeSet<usize>) -> Result<Vec<Task>, StoreError> {
        let len = self.tasks.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(StoreError::IndexOutOfRange { index, len });
        }
        let mut removed = Vec::with_capacity(indices.len());
        for &index in indices.iter().rev() {
            removed.push(self.tasks.remove(index));
        }
        removed.reverse();
        for task in &removed {
            if let Err(err) = self.scheduler.cancel(task.id) {
                warn!("failed to cancel reminder for removed task {}: {err}", task.id);
            }
        }
        self.save()?;
        Ok(removed)
    }

    /// Replaces the stored task with the same id, keeping its position.
    ///
    /// A changed reminder date cancels the old notification and schedules a
    /// new one when a date is still set. A pending reminder whose rendered
    /// title or body changed is scheduled again under the same identifier.
    pub fn update(&mut self, task: Task) -> Result<Scheduling, StoreError> {
        let index = self.position(task.id).ok_or(StoreError::NotFound(task.id))?;
        let previous = std::mem::replace(&mut self.tasks[index], task);
        let task = &self.tasks[index];

        let date_changed = previous.reminder_date != task.reminder_date;
        let templates = self.scheduler.templates();
        let content_changed = templates.render(&previous) != templates.render(task);

        if date_changed && previous.reminder_date.is_some() {
            if let Err(err) = self.scheduler.cancel(task.id) {
                warn!("failed to cancel stale reminder for task {}: {err}", task.id);
            }
        }
        let scheduling = match task.reminder_date {
            None => {
                if date_changed {
                    info!("reminder cleared for task {}", task.id);
                }
                Scheduling::NotRequested
            }
            Some(_) if date_changed => {
                Scheduling::from_result(task, self.scheduler.schedule(task))
            }
            // Already fired; nothing left at the host to refresh.
            Some(at) if content_changed && at > Utc::now() => {
                Scheduling::from_result(task, self.scheduler.schedule(task))
            }
            Some(_) => Scheduling::NotRequested,
        };
        self.save()?;
        Ok(scheduling)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::{ContactInfo, Kind, PhoneNumber};
    use crate::scheduler::testing::RecordingCenter;
    use crate::scheduler::notification_id;
    use crate::templates::ReminderTemplates;

    const KEY: &str = "test.tasks";

    fn store(center: &RecordingCenter) -> TaskStore<&RecordingCenter, Utc> {
        store_on(center, db::open_memory().unwrap())
    }

    fn store_on(center: &RecordingCenter, conn: Connection) -> TaskStore<&RecordingCenter, Utc> {
        let scheduler =
            Scheduler::with_time_zone(center, ReminderTemplates::default(), Utc).unwrap();
        TaskStore::new(conn, KEY, scheduler)
    }

    fn reminded(title: &str) -> Task {
        let mut t = Task::new(Kind::Birthday, title);
        t.reminder_date = Some(Utc::now() + Duration::hours(1));
        t
    }

    fn stored_tasks(store: &TaskStore<&RecordingCenter, Utc>) -> Vec<Task> {
        let blob = db::get_blob(&store.conn, KEY).unwrap().unwrap();
        serde_json::from_slice(&blob).unwrap()
    }

    #[test]
    fn load_missing_key_is_empty() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        s.load().unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn load_malformed_keeps_previous() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        s.add(Task::new(Kind::Call, "kept")).unwrap();
        db::put_blob(&s.conn, KEY, b"{ definitely not tasks").unwrap();

        let err = s.load().unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)), "unexpected error: {err}");
        assert_eq!(s.len(), 1);
        assert_eq!(s.tasks()[0].title, "kept");
    }

    #[test]
    fn add_appends_and_persists() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let a = Task::new(Kind::Call, "a");
        let b = Task::new(Kind::Birthday, "b");
        s.add(a.clone()).unwrap();
        s.add(b.clone()).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.tasks().last(), Some(&b));
        assert_eq!(stored_tasks(&s), vec![a, b]);
    }

    #[test]
    fn add_duplicate_id_fails() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let t = Task::new(Kind::Call, "a");
        s.add(t.clone()).unwrap();
        assert!(matches!(s.add(t.clone()), Err(StoreError::DuplicateId(id)) if id == t.id));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn add_schedules_only_with_reminder_date() {
        let center = RecordingCenter::default();
        let mut s = store(&center);

        let mut plain = Task::new(Kind::Custom { link: String::new() }, "plain");
        plain.due_date = Utc::now() + Duration::hours(2);
        let outcome = s.add(plain).unwrap();
        assert!(matches!(outcome, Scheduling::NotRequested));
        assert!(center.added.borrow().is_empty());

        let t = reminded("bday");
        let outcome = s.add(t.clone()).unwrap();
        assert!(outcome.is_scheduled());
        let added = center.added.borrow();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].identifier, notification_id(t.id));
    }

    #[test]
    fn scheduling_failure_does_not_roll_back() {
        let center = RecordingCenter {
            fail_add: true,
            ..Default::default()
        };
        let mut s = store(&center);
        let t = reminded("x");
        let outcome = s.add(t.clone()).unwrap();
        assert!(matches!(outcome, Scheduling::Failed(SchedulingError::Host(_))));
        assert_eq!(s.tasks(), &[t.clone()]);
        assert_eq!(stored_tasks(&s), vec![t]);
    }

    #[test]
    fn past_reminder_is_added_but_not_scheduled() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let mut t = Task::new(Kind::Call, "late");
        t.reminder_date = Some(Utc::now() - Duration::hours(1));
        let outcome = s.add(t).unwrap();
        assert!(matches!(outcome, Scheduling::Failed(SchedulingError::InPast(_))));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn remove_keeps_relative_order() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let tasks: Vec<Task> = (0..4).map(|i| Task::new(Kind::Call, format!("t{i}"))).collect();
        for t in &tasks {
            s.add(t.clone()).unwrap();
        }
        let removed = s.remove(&BTreeSet::from([1, 3])).unwrap();
        assert_eq!(removed, vec![tasks[1].clone(), tasks[3].clone()]);
        assert_eq!(s.tasks(), &[tasks[0].clone(), tasks[2].clone()]);
        assert_eq!(stored_tasks(&s), vec![tasks[0].clone(), tasks[2].clone()]);
    }

    #[test]
    fn remove_out_of_range_changes_nothing() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        s.add(Task::new(Kind::Call, "a")).unwrap();
        let err = s.remove(&BTreeSet::from([0, 5])).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { index: 5, len: 1 }));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn remove_cancels_pending_notification() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let t = reminded("gone");
        s.add(t.clone()).unwrap();
        assert_eq!(center.pending().unwrap().len(), 1);
        s.remove(&BTreeSet::from([0])).unwrap();
        assert!(center.pending().unwrap().is_empty());
        assert_eq!(*center.removed.borrow(), vec![notification_id(t.id)]);
    }

    #[test]
    fn update_reschedules_changed_reminder() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let mut t = reminded("move me");
        s.add(t.clone()).unwrap();

        t.reminder_date = Some(Utc::now() + Duration::days(2));
        let outcome = s.update(t.clone()).unwrap();
        assert!(outcome.is_scheduled());
        let pending = center.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].identifier, notification_id(t.id));
        assert_eq!(center.added.borrow().len(), 2);
        assert_eq!(s.get(t.id), Some(&t));
    }

    #[test]
    fn update_clearing_reminder_cancels() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let mut t = reminded("quiet");
        s.add(t.clone()).unwrap();
        t.reminder_date = None;
        assert!(matches!(s.update(t).unwrap(), Scheduling::NotRequested));
        assert!(center.pending().unwrap().is_empty());
    }

    #[test]
    fn update_flag_only_leaves_notifications() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let mut t = reminded("steady");
        s.add(t.clone()).unwrap();
        t.is_completed = true;
        assert!(matches!(s.update(t.clone()).unwrap(), Scheduling::NotRequested));
        assert_eq!(center.added.borrow().len(), 1);
        assert!(center.removed.borrow().is_empty());
        assert!(stored_tasks(&s)[0].is_completed);
    }

    #[test]
    fn update_content_refreshes_pending_notification() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let mut t = Task::new(Kind::Call, "Plumber");
        t.contact = Some(ContactInfo::new("Bob", "B", Some(PhoneNumber::new("111"))));
        t.reminder_date = Some(Utc::now() + Duration::hours(1));
        s.add(t.clone()).unwrap();

        t.title = "Electrician".into();
        t.contact = Some(ContactInfo::new("Eve", "E", Some(PhoneNumber::new("999"))));
        assert!(s.update(t.clone()).unwrap().is_scheduled());

        let pending = center.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].identifier, notification_id(t.id));
        assert_eq!(pending[0].title, "Call: Electrician");
        assert_eq!(pending[0].body, "Call Eve E at 999");
        assert_eq!(stored_tasks(&s)[0].title, "Electrician");
    }

    #[test]
    fn update_content_of_fired_reminder_does_not_reschedule() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let mut t = Task::new(Kind::Birthday, "old");
        t.reminder_date = Some(Utc::now() - Duration::hours(1));
        s.add(t.clone()).unwrap();
        t.title = "new".into();
        assert!(matches!(s.update(t).unwrap(), Scheduling::NotRequested));
        assert!(center.added.borrow().is_empty());
    }

    #[test]
    fn update_unknown_fails() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        let t = Task::new(Kind::Call, "nobody");
        assert!(matches!(s.update(t), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn add_rolls_back_when_save_fails() {
        let center = RecordingCenter::default();
        let mut s = store(&center);
        s.conn.execute_batch("DROP TABLE kv").unwrap();
        let t = reminded("unsaved");
        assert!(matches!(s.add(t.clone()), Err(StoreError::Db(_))));
        assert!(s.is_empty());
        assert_eq!(center.added.borrow().len(), 1);
        assert!(center.pending().unwrap().is_empty());
        assert_eq!(*center.removed.borrow(), vec![notification_id(t.id)]);
    }

    #[test]
    fn empty_sequence_round_trips() {
        let center = RecordingCenter::default();
        let conn = db::open_memory().unwrap();
        let s = store_on(&center, conn);
        s.save().unwrap();
        assert_eq!(db::get_blob(&s.conn, KEY).unwrap().as_deref(), Some(&b"[]"[..]));

        let mut fresh = TaskStore::new(s.conn, KEY, s.scheduler);
        fresh.tasks.push(Task::new(Kind::Call, "stale"));
        fresh.load().unwrap();
        assert!(fresh.is_empty());
    }

    #[test]
    fn round_trip_through_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");
        let path = path.to_str().unwrap();

        let mut meeting = Task::new(
            Kind::Meeting {
                link: "https://call".into(),
                mail: "a@b.com".into(),
            },
            "Team sync",
        );
        meeting.contact = Some(ContactInfo::new("Ann", "Lee", Some(PhoneNumber::new("555"))));
        meeting.description = "weekly".into();
        let tasks = vec![meeting, Task::new(Kind::Call, "ring"), reminded("cake")];

        let center = RecordingCenter::default();
        {
            let conn = db::open(path).unwrap();
            db::init(&conn).unwrap();
            let mut s = store_on(&center, conn);
            for t in &tasks {
                s.add(t.clone()).unwrap();
            }
        }

        let mut fresh = store_on(&center, db::open(path).unwrap());
        fresh.load().unwrap();
        assert_eq!(fresh.tasks(), tasks.as_slice());
    }

    #[test]
    fn stores_with_different_keys_are_independent() {
        let center = RecordingCenter::default();
        let conn = db::open_memory().unwrap();
        let mut s = store_on(&center, conn);
        s.add(Task::new(Kind::Call, "a")).unwrap();
        db::put_blob(&s.conn, "other.tasks", b"[]").unwrap();
        s.load().unwrap();
        assert_eq!(s.len(), 1);
    }
}
