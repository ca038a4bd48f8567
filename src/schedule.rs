//! Schedule scraper collaborator.
//!
//! The schedule itself comes from an external Python scraper invoked as a
//! subprocess. This module is the only place that knows about that process
//! boundary: callers hand in a slug and a group and get back a JSON document
//! or an error string. The scraper writes its result to a temp file rather
//! than stdout, which it uses for progress output.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;
use tracing::{info, warn};

/// A slow external batch operation; generous but bounded.
const SCRAPER_TIMEOUT: Duration = Duration::from_secs(60);

/// Locations tried when no explicit path is configured.
const DEFAULT_SCRIPT_LOCATIONS: &[&str] = &["parser/parser.py", "../parser/parser.py"];

pub struct ScheduleService {
    script: Option<PathBuf>,
}

impl ScheduleService {
    /// Locate the scraper script: the configured path first, then the
    /// conventional locations. A missing script leaves the service in a
    /// degraded "unavailable" state instead of failing startup.
    pub fn discover(configured: Option<PathBuf>) -> Self {
        let script = configured
            .into_iter()
            .chain(DEFAULT_SCRIPT_LOCATIONS.iter().map(PathBuf::from))
            .find(|p| p.is_file());

        match &script {
            Some(path) => info!(script = %path.display(), "Schedule scraper found"),
            None => warn!("Schedule scraper not found, schedule feature disabled"),
        }
        Self { script }
    }

    pub fn is_available(&self) -> bool {
        self.script.is_some()
    }

    /// Run the scraper for one university group and return the schedule
    /// document it produced.
    pub async fn fetch(&self, slug: &str, group: &str) -> Result<serde_json::Value> {
        let script = self
            .script
            .as_deref()
            .ok_or_else(|| anyhow!("schedule scraper is not available"))?;

        let output_file = tempfile::Builder::new()
            .prefix("schedule_")
            .suffix(".json")
            .tempfile()
            .context("failed to create scraper output file")?;

        info!(%slug, %group, "Fetching schedule");
        let result = tokio::time::timeout(
            SCRAPER_TIMEOUT,
            Command::new("python")
                .arg(script)
                .args(["--slug", slug, "--group", group])
                .arg("--output")
                .arg(output_file.path())
                .output(),
        )
        .await
        .map_err(|_| anyhow!("schedule scraper timed out"))?
        .context("failed to run schedule scraper")?;

        if !result.status.success() {
            return Err(anyhow!("scraper failed: {}", last_stderr_line(&result.stderr)));
        }

        let content = std::fs::read_to_string(output_file.path())
            .context("scraper produced no output file")?;
        let schedule: serde_json::Value =
            serde_json::from_str(&content).context("scraper output is not valid JSON")?;
        Ok(schedule)
    }
}

fn last_stderr_line(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("unknown error")
        .to_string()
}

/// Render a schedule document for the user. Two scraper output shapes are
/// supported: the object form with a `days` array, and the plain
/// array-of-day-arrays form.
pub fn format_schedule(schedule: &serde_json::Value) -> String {
    if let Some(days) = schedule.get("days").and_then(|d| d.as_array()) {
        return format_days_schedule(schedule, days);
    }
    if let Some(days) = schedule.as_array() {
        return format_grid_schedule(days);
    }
    "Неизвестный формат расписания".to_string()
}

fn format_days_schedule(schedule: &serde_json::Value, days: &[serde_json::Value]) -> String {
    let group = schedule
        .get("group")
        .and_then(|g| g.as_str())
        .unwrap_or("Неизвестная группа");
    let mut result = format!("📅 Расписание: {group}\n");

    if let Some(source) = schedule.get("source").and_then(|s| s.as_str()) {
        result.push_str(&format!("🔗 Источник: {source}\n"));
    }

    for day in days {
        let lessons = match day.get("lessons").and_then(|l| l.as_array()) {
            Some(lessons) if !lessons.is_empty() => lessons,
            _ => continue,
        };

        if let Some(name) = day.get("name").and_then(|n| n.as_str()) {
            result.push_str(&format!("\n📆 {name}\n"));
            result.push_str(&"─".repeat(30));
            result.push('\n');
        }

        for lesson in lessons {
            let subject = match lesson.get("subject").and_then(|s| s.as_str()) {
                Some(subject) => subject,
                None => continue,
            };

            if let Some(time) = lesson
                .pointer("/pair/time_range")
                .or_else(|| lesson.pointer("/pair/start"))
                .and_then(|t| t.as_str())
            {
                result.push_str(&format!("⏰ {time}\n"));
            }
            result.push_str(&format!("📚 {subject}\n"));
            if let Some(lesson_type) = lesson.get("lesson_type").and_then(|t| t.as_str()) {
                result.push_str(&format!("   Тип: {lesson_type}\n"));
            }
            if let Some(names) = joined_names(lesson.get("teachers")) {
                result.push_str(&format!("👤 {names}\n"));
            }
            if let Some(names) = joined_names(lesson.get("rooms")) {
                result.push_str(&format!("🏢 {names}\n"));
            }
            if let Some(week) = lesson.get("week_type").and_then(|w| w.as_str()) {
                result.push_str(&format!("📌 Неделя: {week}\n"));
            }
            result.push('\n');
        }
    }

    result
}

fn format_grid_schedule(days: &[serde_json::Value]) -> String {
    let mut result = "📅 Расписание\n".to_string();

    for day in days {
        let slots = match day.as_array() {
            Some(slots) if !slots.is_empty() => slots,
            _ => continue,
        };

        if let Some(date) = slots[0].get("date").and_then(|d| d.as_str()) {
            result.push_str(&format!("\n📆 {date}"));
            if let Some(week) = slots[0].get("week").and_then(|w| w.as_str()) {
                result.push_str(&format!(" ({week})"));
            }
            result.push('\n');
            result.push_str(&"─".repeat(30));
            result.push('\n');
        }

        for slot in slots {
            let classes = match slot.get("classes").and_then(|c| c.as_array()) {
                Some(classes) if !classes.is_empty() => classes,
                _ => continue,
            };

            if let Some(time) = slot.get("time").and_then(|t| t.as_str()) {
                result.push_str(&format!("⏰ {time}\n"));
            }
            for class in classes {
                if let Some(name) = class.get("name").and_then(|n| n.as_str()) {
                    if name != "Место для заметок" {
                        result.push_str(&format!("📚 {name}\n"));
                    }
                }
                if let Some(teacher) = class.get("teacher").and_then(|t| t.as_str()) {
                    result.push_str(&format!("👤 {teacher}\n"));
                }
                if let Some(place) = class.get("place").and_then(|p| p.as_str()) {
                    result.push_str(&format!("🏢 {place}\n"));
                }
            }
            result.push('\n');
        }
    }

    result
}

fn joined_names(value: Option<&serde_json::Value>) -> Option<String> {
    let items = value?.as_array()?;
    let names: Vec<&str> = items
        .iter()
        .filter_map(|item| item.get("name").and_then(|n| n.as_str()))
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_days_shape() {
        let schedule = json!({
            "group": "ПИ-31",
            "source": "togu",
            "days": [{
                "name": "Понедельник",
                "lessons": [{
                    "subject": "Математика",
                    "pair": {"time_range": "08:00-09:30"},
                    "lesson_type": "Лекция",
                    "teachers": [{"name": "Иванов И.И."}],
                    "rooms": [{"name": "301л"}]
                }]
            }]
        });
        let text = format_schedule(&schedule);
        assert!(text.contains("ПИ-31"));
        assert!(text.contains("Понедельник"));
        assert!(text.contains("Математика"));
        assert!(text.contains("Иванов И.И."));
        assert!(text.contains("08:00-09:30"));
    }

    #[test]
    fn formats_grid_shape() {
        let schedule = json!([[{
            "date": "02.09",
            "week": "числитель",
            "time": "10:00",
            "classes": [{"name": "Физика", "teacher": "Петров П.П.", "place": "ауд. 5"}]
        }]]);
        let text = format_schedule(&schedule);
        assert!(text.contains("02.09"));
        assert!(text.contains("Физика"));
        assert!(text.contains("числитель"));
    }

    #[test]
    fn note_rows_are_skipped() {
        let schedule = json!([[{
            "date": "02.09",
            "time": "10:00",
            "classes": [{"name": "Место для заметок"}]
        }]]);
        let text = format_schedule(&schedule);
        assert!(!text.contains("Место для заметок"));
    }

    #[test]
    fn unknown_shape_is_reported() {
        assert_eq!(format_schedule(&json!(42)), "Неизвестный формат расписания");
    }

    #[test]
    fn unavailable_service_reports_so() {
        let service = ScheduleService { script: None };
        assert!(!service.is_available());
    }
}
