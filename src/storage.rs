//! File-backed user profile store.
//!
//! One JSON document maps user ids to profiles. All mutation goes through a
//! single mutex-guarded read-modify-write so concurrent handler invocations
//! cannot interleave; every write persists the whole store synchronously
//! before returning. Storage failures degrade to an empty store on read and
//! a logged no-op on write; they never crash a handler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::deadline_extractor::DeadlineDraft;

/// Cached schedules go stale after this long.
const CACHE_TTL_HOURS: i64 = 24;

/// A tracked deadline, owned exclusively by one user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deadline {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub due_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Everything the bot remembers about one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<serde_json::Value>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub cached_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deadlines: Vec<Deadline>,
}

/// Pre-map store layout: an array of records with an embedded user id.
/// Read compatibility only; the store always writes the map layout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    user_id: Option<u64>,
    #[serde(default)]
    university: Option<String>,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    schedule: Option<serde_json::Value>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    cached_at: Option<DateTime<Utc>>,
}

pub struct UserStore {
    path: PathBuf,
    profiles: Mutex<HashMap<u64, UserProfile>>,
}

impl UserStore {
    /// Open the store at `path`, loading whatever is already there.
    /// A missing or unreadable file starts the store empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = match read_profiles(&path) {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not load user data, starting empty");
                HashMap::new()
            }
        };
        Self {
            path,
            profiles: Mutex::new(profiles),
        }
    }

    pub fn get(&self, user_id: u64) -> Option<UserProfile> {
        self.lock().get(&user_id).cloned()
    }

    /// Merge a partial update into the user's profile, creating an empty
    /// profile first if the user is unknown. Persists before returning.
    pub fn update(&self, user_id: u64, apply: impl FnOnce(&mut UserProfile)) {
        let mut profiles = self.lock();
        apply(profiles.entry(user_id).or_default());
        self.persist(&profiles);
    }

    /// Like `update`, but only for users that already exist: a miss is a
    /// no-op that neither creates a profile nor touches the file.
    fn update_existing(&self, user_id: u64, apply: impl FnOnce(&mut UserProfile)) -> bool {
        let mut profiles = self.lock();
        match profiles.get_mut(&user_id) {
            Some(profile) => {
                apply(profile);
                self.persist(&profiles);
                true
            }
            None => false,
        }
    }

    pub fn set_university(&self, user_id: u64, slug: &str) {
        self.update(user_id, |p| p.university = Some(slug.to_string()));
    }

    pub fn set_group(&self, user_id: u64, group: &str) {
        self.update(user_id, |p| p.group = Some(group.to_string()));
    }

    /// Both onboarding fields present and non-empty.
    pub fn is_complete(&self, user_id: u64) -> bool {
        self.lock().get(&user_id).is_some_and(|p| {
            p.university.as_deref().is_some_and(|s| !s.is_empty())
                && p.group.as_deref().is_some_and(|s| !s.is_empty())
        })
    }

    pub fn cache_schedule(&self, user_id: u64, schedule: serde_json::Value) {
        let now = Utc::now();
        self.update(user_id, |p| {
            p.schedule = Some(schedule);
            p.cached_at = Some(now);
        });
    }

    /// Cached schedule, or `None` when absent or stale. Stale entries are
    /// never returned; the caller re-fetches in both cases.
    pub fn cached_schedule(&self, user_id: u64) -> Option<serde_json::Value> {
        self.cached_schedule_at(user_id, Utc::now())
    }

    pub fn cached_schedule_at(&self, user_id: u64, now: DateTime<Utc>) -> Option<serde_json::Value> {
        let profiles = self.lock();
        let profile = profiles.get(&user_id)?;
        let cached_at = profile.cached_at?;
        if now - cached_at >= Duration::hours(CACHE_TTL_HOURS) {
            return None;
        }
        profile.schedule.clone()
    }

    /// Persist a draft as a real deadline and return it.
    pub fn add_deadline(&self, user_id: u64, draft: DeadlineDraft) -> Deadline {
        let deadline = Deadline {
            id: new_deadline_id(),
            title: draft.title,
            subject: draft.subject,
            due_date: due_date_timestamp(draft.due_date),
            created_at: Utc::now(),
            description: Some(draft.description),
            completed: false,
        };
        let stored = deadline.clone();
        self.update(user_id, move |p| p.deadlines.push(stored));
        deadline
    }

    /// Remove a deadline by id. Returns whether anything was removed.
    pub fn remove_deadline(&self, user_id: u64, deadline_id: &str) -> bool {
        let mut removed = false;
        self.update_existing(user_id, |p| {
            let before = p.deadlines.len();
            p.deadlines.retain(|d| d.id != deadline_id);
            removed = p.deadlines.len() != before;
        });
        removed
    }

    /// Mark a deadline as done. It stays in the profile but drops out of the
    /// active list.
    pub fn complete_deadline(&self, user_id: u64, deadline_id: &str) -> bool {
        let mut found = false;
        self.update_existing(user_id, |p| {
            if let Some(d) = p.deadlines.iter_mut().find(|d| d.id == deadline_id) {
                d.completed = true;
                found = true;
            }
        });
        found
    }

    /// Edit a deadline in place. Returns whether the id was found.
    pub fn update_deadline(
        &self,
        user_id: u64,
        deadline_id: &str,
        apply: impl FnOnce(&mut Deadline),
    ) -> bool {
        let mut found = false;
        self.update_existing(user_id, |p| {
            if let Some(d) = p.deadlines.iter_mut().find(|d| d.id == deadline_id) {
                apply(d);
                found = true;
            }
        });
        found
    }

    pub fn deadlines(&self, user_id: u64) -> Vec<Deadline> {
        self.lock()
            .get(&user_id)
            .map(|p| p.deadlines.clone())
            .unwrap_or_default()
    }

    /// Not-completed deadlines, soonest first.
    pub fn active_deadlines(&self, user_id: u64) -> Vec<Deadline> {
        let mut active: Vec<Deadline> = self
            .deadlines(user_id)
            .into_iter()
            .filter(|d| !d.completed)
            .collect();
        active.sort_by_key(|d| d.due_date);
        active
    }

    pub fn user_ids(&self) -> Vec<u64> {
        self.lock().keys().copied().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, UserProfile>> {
        self.profiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, profiles: &HashMap<u64, UserProfile>) {
        if let Err(e) = write_profiles(&self.path, profiles) {
            error!(path = %self.path.display(), error = %e, "Failed to persist user data");
        }
    }
}

/// A resolved due date is stored as the end of that day, so a deadline
/// created "for today" is not already in the past.
fn due_date_timestamp(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN))
        .and_utc()
}

fn new_deadline_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("deadline_{}_{}", Utc::now().timestamp_millis(), suffix)
}

fn read_profiles(path: &Path) -> anyhow::Result<HashMap<u64, UserProfile>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    if value.is_array() {
        let records: Vec<LegacyRecord> = serde_json::from_value(value)?;
        let mut profiles = HashMap::new();
        for record in records {
            if let Some(user_id) = record.user_id {
                profiles.insert(
                    user_id,
                    UserProfile {
                        university: record.university,
                        group: record.group,
                        schedule: record.schedule,
                        cached_at: record.cached_at,
                        deadlines: Vec::new(),
                    },
                );
            }
        }
        return Ok(profiles);
    }

    let map: HashMap<String, UserProfile> = serde_json::from_value(value)?;
    Ok(map
        .into_iter()
        .filter_map(|(k, v)| k.parse::<u64>().ok().map(|id| (id, v)))
        .collect())
}

fn write_profiles(path: &Path, profiles: &HashMap<u64, UserProfile>) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let map: HashMap<String, &UserProfile> = profiles
        .iter()
        .map(|(id, profile)| (id.to_string(), profile))
        .collect();
    let json = serde_json::to_string_pretty(&map)?;
    std::fs::write(path, json)?;
    Ok(())
}
