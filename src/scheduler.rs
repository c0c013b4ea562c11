// src/scheduler.rs
//! Scheduled-run adapter: fixed weekday slots, sequential targets, and a
//! per-target error boundary so one failure never stops the rest.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDateTime, Timelike, Weekday};
use metrics::gauge;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{BriefRunner, RunSummary};
use crate::target::{Reason, Target};

/// A wall-clock trigger, evaluated Mon–Fri in process-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub reason: Reason,
    pub hour: u32,
    pub minute: u32,
}

impl ScheduleSlot {
    pub const fn new(reason: Reason, hour: u32, minute: u32) -> Self {
        Self {
            reason,
            hour,
            minute,
        }
    }
}

/// 15:00 preopen, 16:00/19:00/22:00 intraday, 22:30 postclose (Europe/Berlin
/// when the process runs with TZ=Europe/Berlin).
pub fn default_slots() -> Vec<ScheduleSlot> {
    vec![
        ScheduleSlot::new(Reason::Preopen, 15, 0),
        ScheduleSlot::new(Reason::Intraday, 16, 0),
        ScheduleSlot::new(Reason::Intraday, 19, 0),
        ScheduleSlot::new(Reason::Intraday, 22, 0),
        ScheduleSlot::new(Reason::Postclose, 22, 30),
    ]
}

/// Which slot (if any) matches `now` to the minute. Weekends never match.
pub fn due_reason(now: NaiveDateTime, slots: &[ScheduleSlot]) -> Option<Reason> {
    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return None;
    }
    slots
        .iter()
        .find(|s| s.hour == now.hour() && s.minute == now.minute())
        .map(|s| s.reason)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub key: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleReport {
    pub reason: Reason,
    pub succeeded: Vec<RunSummary>,
    pub failed: Vec<RunFailure>,
}

impl ScheduleReport {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run every target once, in order. Failures are captured, not propagated.
pub async fn run_scheduled(runner: &BriefRunner, targets: &[Target], reason: Reason) -> ScheduleReport {
    let mut report = ScheduleReport {
        reason,
        succeeded: Vec::with_capacity(targets.len()),
        failed: Vec::new(),
    };

    for t in targets {
        match runner.run(t, reason).await {
            Ok(summary) => report.succeeded.push(summary),
            Err(e) => report.failed.push(RunFailure {
                key: t.key.clone(),
                error: e.to_string(),
            }),
        }
    }

    if report.all_ok() {
        tracing::info!(
            target: "scheduler",
            reason = reason.as_str(),
            ok = report.succeeded.len(),
            "scheduled invocation finished"
        );
    } else {
        let failed: Vec<&str> = report.failed.iter().map(|f| f.key.as_str()).collect();
        tracing::warn!(
            target: "scheduler",
            reason = reason.as_str(),
            ok = report.succeeded.len(),
            failed = ?failed,
            "scheduled invocation finished with failures"
        );
    }
    report
}

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub tick_secs: u64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self { tick_secs: 20 }
    }
}

/// Poll local time and fire `run_scheduled` on due slots. Invocations are
/// awaited inline, so two never overlap; each slot fires once per minute.
pub fn spawn_scheduler(
    cfg: SchedulerCfg,
    runner: Arc<BriefRunner>,
    targets: Arc<Vec<Target>>,
    slots: Vec<ScheduleSlot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.tick_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_fired: Option<NaiveDateTime> = None;

        tracing::info!(
            target: "scheduler",
            slots = slots.len(),
            targets = targets.len(),
            "scheduler started"
        );

        loop {
            ticker.tick().await;
            let now = Local::now().naive_local();
            let Some(minute) = now.with_second(0).and_then(|m| m.with_nanosecond(0)) else {
                continue;
            };
            if last_fired == Some(minute) {
                continue;
            }
            let Some(reason) = due_reason(now, &slots) else {
                continue;
            };
            last_fired = Some(minute);

            let report = run_scheduled(&runner, &targets, reason).await;
            gauge!("scheduler_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
            gauge!("scheduler_last_failures").set(report.failed.len() as f64);
        }
    })
}
