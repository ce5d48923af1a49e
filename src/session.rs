//! Step session
//!
//! Owns the detector state together with both persistence layers. All user
//! actions (reset, commit) and sensor readings go through a session.

use chrono::{Local, NaiveDate};
use std::path::Path;

use crate::chart::ChartSeries;
use crate::config::{DetectorConfig, TallyConfig};
use crate::detector::StepDetector;
use crate::error::TallyError;
use crate::prefs::RunningCountStore;
use crate::sensor::{AccelerationSource, SensorSubscription};
use crate::store::{DailyStepStore, DATE_FORMAT};
use crate::types::{AccelerationSample, RecordId, StepEvent, StepRecord};

/// Running tally plus its persistence
pub struct StepSession {
    detector: StepDetector,
    store: DailyStepStore,
    prefs: RunningCountStore,
}

impl StepSession {
    /// Create a session, restoring the running count saved in `prefs`
    pub fn new(config: DetectorConfig, store: DailyStepStore, prefs: RunningCountStore) -> Self {
        let restored = prefs.load();
        if restored > 0 {
            log::info!("Restored running count of {} steps", restored);
        }

        Self {
            detector: StepDetector::with_running_count(config, restored),
            store,
            prefs,
        }
    }

    /// Open the database and running count file named by `config`
    pub fn open(config: &TallyConfig) -> Result<Self, TallyError> {
        config.detector.validate()?;
        let store = DailyStepStore::open(config.database_path())?;
        let prefs = RunningCountStore::open(config.prefs_path())?;
        Ok(Self::new(config.detector, store, prefs))
    }

    /// Open a session rooted in `data_dir` with default file names
    pub fn open_in(data_dir: &Path, detector: DetectorConfig) -> Result<Self, TallyError> {
        let config = TallyConfig {
            detector,
            data_dir: data_dir.to_path_buf(),
            ..TallyConfig::default()
        };
        Self::open(&config)
    }

    /// Session backed entirely by memory
    pub fn in_memory(config: DetectorConfig) -> Result<Self, TallyError> {
        Ok(Self::new(
            config,
            DailyStepStore::open_in_memory()?,
            RunningCountStore::in_memory(),
        ))
    }

    /// Feed one sensor reading
    pub fn on_sample(&mut self, sample: &AccelerationSample) -> Option<StepEvent> {
        self.detector.process_sample(sample)
    }

    /// Attach an accelerometer to this session.
    ///
    /// `None` means the device has no accelerometer; that is reported once and
    /// not retried.
    pub fn subscribe<S: AccelerationSource>(
        &mut self,
        source: Option<S>,
    ) -> Result<SensorSubscription<'_, S>, TallyError> {
        match source {
            Some(source) => Ok(SensorSubscription::new(self, source)),
            None => {
                log::warn!("Accelerometer is not available on this device");
                Err(TallyError::SensorUnavailable)
            }
        }
    }

    pub fn running_count(&self) -> u32 {
        self.detector.running_count()
    }

    pub fn detector(&self) -> &StepDetector {
        &self.detector
    }

    /// Write the running count to the running count store
    pub fn persist(&mut self) -> Result<(), TallyError> {
        self.prefs.save(self.detector.running_count())
    }

    /// Zero the running count and persist it immediately
    pub fn reset(&mut self) -> Result<(), TallyError> {
        self.detector.reset_count();
        self.persist()?;
        log::info!("Running count reset");
        Ok(())
    }

    /// Save the running count as the record for `date`, then reset
    pub fn commit_on(&mut self, date: NaiveDate) -> Result<RecordId, TallyError> {
        let count = self.detector.running_count();
        let id = self
            .store
            .append(count, &date.format(DATE_FORMAT).to_string())?;
        self.reset()?;
        Ok(id)
    }

    /// Save the running count as today's record, then reset
    pub fn commit(&mut self) -> Result<RecordId, TallyError> {
        self.commit_on(Local::now().date_naive())
    }

    /// All committed records in insertion order
    pub fn history(&self) -> Result<Vec<StepRecord>, TallyError> {
        Ok(self.store.list_all()?)
    }

    /// Committed history as a chart series
    pub fn chart(&self) -> Result<ChartSeries, TallyError> {
        Ok(ChartSeries::from_records(&self.history()?))
    }

    pub fn store(&self) -> &DailyStepStore {
        &self.store
    }
}

impl Drop for StepSession {
    fn drop(&mut self) {
        if let Err(err) = self.persist() {
            log::warn!("Failed to persist running count on close: {err}");
        }
    }
}
