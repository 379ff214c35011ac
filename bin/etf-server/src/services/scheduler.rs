//! Investment-day scheduler.
//!
//! Wakes on every `SCHEDULER_INTERVAL` boundary (hourly by default), works out
//! which portfolio entries are due on the local calendar day and asks the AI
//! service for one integrated analysis per user. A user is analysed at most
//! once per local day.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::entities::{
    InvestmentCycle, NotificationStore, NotificationType, PortfolioEntry, PortfolioStore,
    SettingsRecord, SettingsStore, UserStore,
};
use crate::services::ai::{portfolio_analysis_messages, AnalysisRequest};
use crate::services::analysis::{analysis_section, assess};
use crate::state::AppState;
use crate::timezone;

/// Whether an entry with `cycle`/`day` falls on `today`.
///
/// Weekly days count from Monday = 0; a monthly entry without a day runs on the 1st.
pub fn is_due(cycle: InvestmentCycle, day: Option<i64>, today: NaiveDate) -> bool {
    match cycle {
        InvestmentCycle::Daily => true,
        InvestmentCycle::Weekly => day == Some(timezone::weekday_index(today)),
        InvestmentCycle::Monthly => day.unwrap_or(1) == i64::from(today.day()),
    }
}

/// What happened to one user during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    NothingDue,
    AlreadyHandled,
    /// The analysis did not differ enough to notify.
    Unchanged,
    Notified,
    /// The AI service failed; a plain reminder was sent instead.
    Reminded,
}

/// Tally of one scheduler run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub users: usize,
    pub notified: usize,
    pub reminded: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Scheduler {
    state: Arc<AppState>,
    /// `(user_id, local date)` pairs already analysed by this process.
    handled: Mutex<HashSet<(i64, NaiveDate)>>,
}

impl Scheduler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            handled: Mutex::new(HashSet::new()),
        }
    }

    /// Run until `shutdown` flips to `true`.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let interval = self.state.config.scheduler_interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "scheduler started");
            loop {
                if *shutdown.borrow() {
                    break;
                }
                let wait = until_next_boundary(Utc::now(), interval);
                debug!(wait_secs = wait.as_secs(), "scheduler sleeping");
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
                let summary = self.run_once(Utc::now()).await;
                info!(?summary, "scheduler run finished");
            }
            info!("scheduler stopped");
        })
    }

    /// Check every notification-enabled user once, as of `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> RunSummary {
        let today = timezone::local_date(now, self.state.config.timezone_offset_hours);
        let span = info_span!("scheduler_run", %today);
        async move {
            let mut summary = RunSummary::default();
            let candidates = match self.state.store.list_notification_enabled().await {
                Ok(c) => c,
                Err(e) => {
                    error!(error = %e, "failed to load notification settings");
                    return summary;
                }
            };

            for settings in candidates {
                summary.users += 1;
                match self.process_user(&settings, now, today).await {
                    Ok(UserOutcome::Notified) => summary.notified += 1,
                    Ok(UserOutcome::Reminded) => summary.reminded += 1,
                    Ok(UserOutcome::Unchanged) => summary.unchanged += 1,
                    Ok(UserOutcome::NothingDue | UserOutcome::AlreadyHandled) => {
                        summary.skipped += 1
                    }
                    Err(e) => {
                        summary.failed += 1;
                        error!(user_id = settings.user_id, error = %e, "scheduler failed for user");
                    }
                }
            }
            summary
        }
        .instrument(span)
        .await
    }

    fn mark_handled(&self, user_id: i64, today: NaiveDate) -> bool {
        match self.handled.lock() {
            Ok(mut set) => {
                set.retain(|(_, day)| *day == today);
                set.insert((user_id, today))
            }
            Err(_) => true,
        }
    }

    async fn already_notified_today(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let since = timezone::start_of_local_day(now, self.state.config.timezone_offset_hours);
        let store = &self.state.store;
        Ok(store
            .exists_since(user_id, NotificationType::PortfolioAnalysis, since)
            .await?
            || store
                .exists_since(user_id, NotificationType::InvestmentReminder, since)
                .await?)
    }

    async fn process_user(
        &self,
        settings: &SettingsRecord,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> anyhow::Result<UserOutcome> {
        let store = &self.state.store;
        let Some(user) = store.get_user(settings.user_id).await? else {
            warn!(user_id = settings.user_id, "settings without user; skipping");
            return Ok(UserOutcome::NothingDue);
        };

        let due: Vec<PortfolioEntry> = store
            .list_portfolios(user.id)
            .await?
            .into_iter()
            .filter(|e| is_due(e.portfolio.cycle, e.portfolio.day, today))
            .collect();
        if due.is_empty() {
            return Ok(UserOutcome::NothingDue);
        }

        if self.already_notified_today(user.id, now).await? || !self.mark_handled(user.id, today) {
            debug!(user_id = user.id, "already handled today");
            return Ok(UserOutcome::AlreadyHandled);
        }

        info!(user_id = user.id, etfs = due.len(), "requesting portfolio analysis");
        let messages = portfolio_analysis_messages(&user.name, settings, &due, today);
        let request = AnalysisRequest::for_settings(messages, Some(settings));
        let notifier = &self.state.notifier;

        let answer = match self.state.advisor.analyze(&request).await {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => {
                warn!(user_id = user.id, "AI service returned an empty analysis");
                notifier.send_investment_reminder(&user, settings, &due).await?;
                return Ok(UserOutcome::Reminded);
            }
            Err(e) => {
                warn!(user_id = user.id, error = %e, "AI analysis failed; sending reminder");
                notifier.send_investment_reminder(&user, settings, &due).await?;
                return Ok(UserOutcome::Reminded);
            }
        };

        let previous = store
            .latest_of_type(user.id, NotificationType::PortfolioAnalysis)
            .await?
            .map(|n| analysis_section(&n.content).to_owned());
        let assessment = assess(
            &answer,
            previous.as_deref(),
            self.state.config.ai_analysis_threshold,
        );

        if !assessment.should_notify {
            info!(user_id = user.id, "analysis unchanged; no notification");
            return Ok(UserOutcome::Unchanged);
        }

        notifier
            .send_portfolio_analysis(&user, settings, &due, &answer, &assessment)
            .await?;
        Ok(UserOutcome::Notified)
    }
}

/// Time left until the next multiple of `interval` since the Unix epoch.
fn until_next_boundary(now: DateTime<Utc>, interval: Duration) -> Duration {
    let interval_ms = interval.as_millis().max(1);
    let now_ms = u128::try_from(now.timestamp_millis()).unwrap_or(0);
    let remaining = interval_ms - now_ms % interval_ms;
    Duration::from_millis(u64::try_from(remaining).unwrap_or(u64::MAX))
}
