//! Drives the scheduled broadcasters and keeps their liveness for `/health`.

use crate::broadcast::{Broadcaster, TickOutcome};
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub enum Schedule {
    Every(Duration),
    /// Times of day in UTC
    DailyAt(Vec<NaiveTime>),
}

impl Schedule {
    fn describe(&self) -> String {
        match self {
            Schedule::Every(d) => format!("every {}", humantime::format_duration(*d)),
            Schedule::DailyAt(times) => {
                let times: Vec<String> = times.iter().map(|t| t.format("%H:%M").to_string()).collect();
                format!("daily at {} UTC", times.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[default]
    Idle,
    Polling,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskHealth {
    pub state: TaskState,
    pub ticks: u64,
    pub dispatched: u64,
    pub failures: u64,
    pub skipped_overlaps: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub name: &'static str,
    pub schedule: String,
    #[serde(flatten)]
    pub health: TaskHealth,
}

struct SupervisedTask {
    broadcaster: Arc<dyn Broadcaster>,
    schedule: Schedule,
    running: tokio::sync::Mutex<()>,
    health: Mutex<TaskHealth>,
}

impl SupervisedTask {
    fn update(&self, f: impl FnOnce(&mut TaskHealth)) {
        if let Ok(mut health) = self.health.lock() {
            f(&mut health);
        }
    }

    /// One poll. Returns `None` when the previous tick is still running.
    async fn run_tick(&self) -> Option<TickOutcome> {
        let name = self.broadcaster.name();
        let Ok(_guard) = self.running.try_lock() else {
            warn!("{}: previous tick still running, skipping", name);
            self.update(|h| h.skipped_overlaps += 1);
            return None;
        };

        self.update(|h| h.state = TaskState::Polling);
        let result = self.broadcaster.tick().await;

        let outcome = match result {
            Ok(outcome) => {
                match outcome {
                    TickOutcome::Seeded => info!("{}: seeded, nothing sent", name),
                    TickOutcome::Skipped => debug!("{}: nothing new", name),
                    TickOutcome::Dispatched(n) => info!("{}: dispatched {} message(s)", name, n),
                }
                self.update(|h| {
                    if let TickOutcome::Dispatched(n) = outcome {
                        h.dispatched += n as u64;
                    }
                    h.last_error = None;
                });
                Some(outcome)
            }
            Err(e) => {
                error!("{}: tick failed: {:#}", name, e);
                self.update(|h| {
                    h.failures += 1;
                    h.last_error = Some(format!("{:#}", e));
                });
                Some(TickOutcome::Skipped)
            }
        };

        self.update(|h| {
            h.state = TaskState::Idle;
            h.ticks += 1;
            h.last_tick_at = Some(Utc::now());
        });
        outcome
    }
}

#[derive(Default)]
pub struct TaskSupervisor {
    tasks: Mutex<Vec<Arc<SupervisedTask>>>,
    started: AtomicBool,
    scheduler: tokio::sync::Mutex<Option<JobScheduler>>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, broadcaster: Arc<dyn Broadcaster>, schedule: Schedule) {
        info!("Supervisor: registered {} ({})", broadcaster.name(), schedule.describe());
        let task = Arc::new(SupervisedTask {
            broadcaster,
            schedule,
            running: tokio::sync::Mutex::new(()),
            health: Mutex::new(TaskHealth::default()),
        });
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
    }

    /// Starts every registered task. Later calls after a successful start are no-ops.
    ///
    /// Each task polls once right away so the first poll only seeds its cache, then
    /// follows its schedule. Cron jobs are set up before anything is spawned, so a
    /// failed start leaves nothing running and can be retried.
    pub async fn start(&self) -> anyhow::Result<()> {
        let mut scheduler_slot = self.scheduler.lock().await;
        if self.started.load(Ordering::SeqCst) {
            return Ok(());
        }

        let tasks: Vec<Arc<SupervisedTask>> = self
            .tasks
            .lock()
            .map_err(|_| anyhow::anyhow!("supervisor task list poisoned"))?
            .clone();

        let mut scheduler = None;
        for task in &tasks {
            let Schedule::DailyAt(times) = &task.schedule else {
                continue;
            };
            if times.is_empty() {
                anyhow::bail!("{} has a daily schedule with no times", task.broadcaster.name());
            }
            if scheduler.is_none() {
                scheduler = Some(JobScheduler::new().await?);
            }
            if let Some(scheduler) = &scheduler {
                for time in times {
                    let job_task = task.clone();
                    let cron = format!("0 {} {} * * *", time.minute(), time.hour());
                    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
                        let task = job_task.clone();
                        Box::pin(async move {
                            task.run_tick().await;
                        })
                    })?;
                    scheduler.add(job).await?;
                }
            }
        }
        if let Some(scheduler) = scheduler {
            scheduler.start().await?;
            *scheduler_slot = Some(scheduler);
        }
        self.started.store(true, Ordering::SeqCst);

        for task in tasks {
            match task.schedule.clone() {
                Schedule::Every(period) => {
                    tokio::spawn(async move {
                        task.run_tick().await;
                        let mut ticker = interval_at(Instant::now() + period, period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                        loop {
                            ticker.tick().await;
                            task.run_tick().await;
                        }
                    });
                }
                Schedule::DailyAt(_) => {
                    tokio::spawn(async move {
                        task.run_tick().await;
                    });
                }
            }
        }

        info!("Supervisor: started");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        let Ok(tasks) = self.tasks.lock() else {
            return Vec::new();
        };
        tasks
            .iter()
            .map(|task| TaskSnapshot {
                name: task.broadcaster.name(),
                schedule: task.schedule.describe(),
                health: task.health.lock().map(|h| h.clone()).unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl Broadcaster for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn tick(&self) -> anyhow::Result<TickOutcome> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("feed unreachable");
            }
            Ok(if n == 0 { TickOutcome::Seeded } else { TickOutcome::Dispatched(1) })
        }
    }

    fn task(delay: Duration, fail: bool) -> SupervisedTask {
        SupervisedTask {
            broadcaster: Arc::new(Counting {
                calls: AtomicUsize::new(0),
                delay,
                fail,
            }),
            schedule: Schedule::Every(Duration::from_secs(60)),
            running: tokio::sync::Mutex::new(()),
            health: Mutex::new(TaskHealth::default()),
        }
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let t = task(Duration::from_millis(50), false);
        let (a, b) = tokio::join!(t.run_tick(), t.run_tick());
        assert_eq!(a, Some(TickOutcome::Seeded));
        assert_eq!(b, None);

        let health = t.health.lock().unwrap().clone();
        assert_eq!(health.ticks, 1);
        assert_eq!(health.skipped_overlaps, 1);
        assert_eq!(health.state, TaskState::Idle);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_next_tick_retries() {
        let t = task(Duration::ZERO, true);
        t.run_tick().await;
        t.run_tick().await;
        let health = t.health.lock().unwrap().clone();
        assert_eq!(health.ticks, 2);
        assert_eq!(health.failures, 2);
        assert_eq!(health.last_error.as_deref(), Some("feed unreachable"));
    }

    #[tokio::test]
    async fn test_start_seeds_then_follows_interval() {
        let supervisor = TaskSupervisor::new();
        let broadcaster = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: false,
        });
        supervisor.register(broadcaster.clone(), Schedule::Every(Duration::from_millis(40)));
        supervisor.start().await.unwrap();
        // A second start must not spawn a second loop
        supervisor.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let snapshot = supervisor.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].health.ticks >= 2);
        assert_eq!(snapshot[0].health.dispatched, snapshot[0].health.ticks - 1);
        assert!(broadcaster.calls.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn test_failed_start_can_be_retried_and_spawns_nothing() {
        let supervisor = TaskSupervisor::new();
        let ticker = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: false,
        });
        supervisor.register(ticker.clone(), Schedule::Every(Duration::from_millis(20)));
        supervisor.register(
            Arc::new(Counting {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            }),
            Schedule::DailyAt(Vec::new()),
        );

        assert!(supervisor.start().await.is_err());
        assert!(!supervisor.is_started());
        // The retry fails the same way instead of reporting success
        assert!(supervisor.start().await.is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(ticker.calls.load(Ordering::SeqCst), 0);
    }
}
