use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use dutycal_core::Assignment;
use dutycal_core::config::DutyConfig;
use dutycal_core::date_range::DateRange;
use dutycal_core::fairness::FairnessPolicy;
use dutycal_core::ingest::OverrideIngestor;
use dutycal_core::remote::{CalendarService, MemoryCalendar, Remote};
use dutycal_core::schedule::ScheduleGenerator;
use dutycal_core::store::{AssignmentStore, FileStore, MemoryStore};
use dutycal_core::sync::Reconciler;

/// Everything a command needs, loaded from the user's config.
pub struct App {
    pub config: DutyConfig,
    pub store: Arc<FileStore>,
    pub policy: Arc<FairnessPolicy>,
}

impl App {
    pub fn load() -> Result<Self> {
        Self::new(DutyConfig::load()?)
    }

    pub fn new(config: DutyConfig) -> Result<Self> {
        let policy = Arc::new(config.policy()?);
        let state_path = config.state_path();
        let store = Arc::new(
            FileStore::open(&state_path)
                .with_context(|| format!("Failed to open {}", state_path.display()))?,
        );

        Ok(App {
            config,
            store,
            policy,
        })
    }

    /// Today in the configured timezone.
    pub fn today(&self) -> Result<NaiveDate> {
        let tz = self.config.timezone()?;
        Ok(Utc::now().with_timezone(&tz).date_naive())
    }

    pub fn range(&self, from: Option<&str>, to: Option<&str>) -> Result<DateRange> {
        Ok(DateRange::from_args(from, to, self.today()?)?)
    }

    pub fn remote(&self) -> Result<&Remote> {
        self.config.remote.as_ref().with_context(|| {
            format!(
                "No [remote] configured.\n\n\
                Add one to {} e.g.:\n\n  \
                [remote]\n  \
                provider = \"google\"\n  \
                google_calendar_id = \"primary\"",
                DutyConfig::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "your config file".into())
            )
        })
    }

    pub fn calendar(&self) -> Result<Arc<dyn CalendarService>> {
        Ok(Arc::new(self.remote()?.clone()))
    }

    pub fn generator(&self) -> ScheduleGenerator {
        ScheduleGenerator::new(self.store.clone(), self.policy.clone())
    }

    /// Reconciler for `assignments`.
    ///
    /// A dry run reconciles a copy of them against an in-memory calendar, so
    /// entry ids it records never reach the state file.
    pub async fn reconciler(
        &self,
        assignments: &[Assignment],
        dry_run: bool,
    ) -> Result<Reconciler> {
        let concurrency = self.config.sync_concurrency;
        if !dry_run {
            return Ok(Reconciler::new(self.store.clone(), self.calendar()?)
                .with_concurrency(concurrency));
        }

        let scratch = Arc::new(MemoryStore::new());
        for assignment in assignments {
            scratch.upsert(assignment).await?;
        }
        Ok(Reconciler::new(scratch, Arc::new(MemoryCalendar::new())).with_concurrency(concurrency))
    }

    pub fn ingestor(&self) -> Result<OverrideIngestor> {
        Ok(OverrideIngestor::new(
            self.store.clone(),
            self.store.clone(),
            self.calendar()?,
            self.policy.clone(),
            self.config.ingest_settings()?,
        ))
    }
}
