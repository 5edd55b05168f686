//! The in-memory schedule table: `(name, version, cron, last_run, next_run)`
//! for every active Scheduled definition.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use tracing::warn;

use crate::model::{JsonMap, TriggerType, WorkflowDefinition};

#[derive(Clone)]
pub struct Schedule {
    pub name: String,
    pub version: u32,
    pub cron: CronSchedule,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub enabled: bool,
    pub input: JsonMap,
}

#[derive(Default)]
pub struct ScheduleTable {
    by_name: HashMap<String, Schedule>,
}

impl ScheduleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the table from the given active definitions. A definition
    /// with an unparseable cron expression is logged and skipped rather
    /// than aborting the whole refresh.
    pub fn refresh(&mut self, definitions: &[WorkflowDefinition]) {
        let now = Utc::now();
        let mut next = HashMap::new();
        for def in definitions {
            if def.trigger != TriggerType::Scheduled || !def.is_active {
                continue;
            }
            let Some(expr) = &def.cron_expression else {
                warn!(workflow = %def.name, "scheduled trigger missing cron_expression");
                continue;
            };
            let cron = match CronSchedule::from_str(expr) {
                Ok(cron) => cron,
                Err(e) => {
                    warn!(workflow = %def.name, error = %e, "invalid cron expression, skipping");
                    continue;
                }
            };
            let existing = self.by_name.remove(&def.name);
            let next_run = cron
                .after(&now)
                .next()
                .unwrap_or(now);
            next.insert(
                def.name.clone(),
                Schedule {
                    name: def.name.clone(),
                    version: def.version,
                    cron,
                    last_run: existing.and_then(|s| s.last_run),
                    next_run,
                    enabled: true,
                    input: JsonMap::new(),
                },
            );
        }
        self.by_name = next;
    }

    /// Names of schedules that are `enabled && next_run <= now`, truncated
    /// to `limit`.
    pub fn due_names(&self, limit: usize) -> Vec<String> {
        let now = Utc::now();
        let mut due: Vec<&Schedule> = self
            .by_name
            .values()
            .filter(|s| s.enabled && s.next_run <= now)
            .collect();
        due.sort_by_key(|s| s.next_run);
        due.into_iter().take(limit).map(|s| s.name.clone()).collect()
    }

    pub fn mark_run(&mut self, name: &str) {
        let now = Utc::now();
        if let Some(schedule) = self.by_name.get_mut(name) {
            schedule.last_run = Some(now);
            schedule.next_run = schedule.cron.after(&now).next().unwrap_or(now);
        }
    }

    pub fn input_for(&self, name: &str) -> Option<JsonMap> {
        self.by_name.get(name).map(|s| s.input.clone())
    }

    pub fn get(&self, name: &str) -> Option<&Schedule> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scheduled_def(name: &str, cron: &str) -> WorkflowDefinition {
        WorkflowDefinition {
            name: name.into(),
            version: 1,
            start_activity_id: "a".into(),
            activities: vec![],
            transitions: vec![],
            input_schema: None,
            output_schema: None,
            trigger: TriggerType::Scheduled,
            cron_expression: Some(cron.into()),
            default_retry_policy: None,
            timeout: None,
            tags: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn invalid_cron_is_skipped_not_fatal() {
        let mut table = ScheduleTable::new();
        table.refresh(&[scheduled_def("bad", "not a cron")]);
        assert!(table.is_empty());
    }

    #[test]
    fn refresh_populates_next_run() {
        let mut table = ScheduleTable::new();
        table.refresh(&[scheduled_def("hello", "0 * * * * *")]);
        assert_eq!(table.len(), 1);
        assert!(table.get("hello").unwrap().next_run > Utc::now());
    }

    #[test]
    fn mark_run_advances_next_run_and_sets_last_run() {
        let mut table = ScheduleTable::new();
        table.refresh(&[scheduled_def("hello", "* * * * * *")]);
        let before = table.get("hello").unwrap().next_run;
        std::thread::sleep(std::time::Duration::from_millis(1100));
        table.mark_run("hello");
        let schedule = table.get("hello").unwrap();
        assert!(schedule.last_run.is_some());
        assert!(schedule.next_run >= before);
    }
}
