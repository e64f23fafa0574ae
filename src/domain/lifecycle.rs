//! Per-key lifecycle on top of the store, the registry and the
//! synchronizer.
//!
//! A key is `Configured` while it only exists in the store, `Active` while
//! it is in the registry, and `Removed` after it was taken out of the
//! registry. Parameters are never deleted from the store.

use crate::domain::category::Category;
use crate::domain::config::ChartConfig;
use crate::domain::error::ChartError;
use crate::domain::key::IndicatorKey;
use crate::domain::ohlcv::BaseSeries;
use crate::domain::parameter::IndicatorParameter;
use crate::domain::registry::{IndicatorBox, SubscriptionId};
use crate::domain::store::ParameterStore;
use crate::domain::synchronizer::ChartSynchronizer;
use crate::domain::task::TaskSupervisor;
use crate::domain::trading::TradingRecord;
use crate::ports::archive_port::SeriesArchivePort;
use crate::ports::computation_port::ComputationPort;
use crate::ports::data_port::DataPort;
use crate::ports::render_port::RenderPort;
use chrono::NaiveDate;
use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

const BASE_SERIES_TASK: &str = "base-series";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Configured,
    Active,
    Removed,
}

/// Outcome of a multi-key load. Failed keys never stop the others.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub loaded: Vec<IndicatorKey>,
    pub failed: Vec<(IndicatorKey, ChartError)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub key: IndicatorKey,
    pub label: String,
    pub state: LifecycleState,
    /// Why this instance cannot be loaded as stored, if it cannot.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuGroup {
    pub category: Category,
    pub title: &'static str,
    pub entries: Vec<MenuEntry>,
}

#[derive(Debug)]
pub struct Duplicated {
    pub key: IndicatorKey,
    /// Set when an immediate load was requested and failed; the new key
    /// stays `Configured`.
    pub load_error: Option<ChartError>,
}

#[derive(Debug)]
pub enum BackgroundEvent {
    Archived { identifier: String },
    ArchiveFailed { identifier: String, error: ChartError },
    BaseSeriesInstalled { symbol: String, report: BatchReport },
    BaseSeriesFailed { symbol: String, error: ChartError },
    /// A background task panicked before producing a result.
    TaskFailed { task: String, reason: String },
}

enum TaskOutput {
    Archive {
        identifier: String,
        result: Result<(), ChartError>,
    },
    BaseSeries {
        symbol: String,
        result: Result<BaseSeries, ChartError>,
    },
}

pub struct ChartSession<R: RenderPort + 'static> {
    config: ChartConfig,
    store: ParameterStore,
    registry: IndicatorBox,
    synchronizer: Rc<RefCell<ChartSynchronizer<R>>>,
    subscription: SubscriptionId,
    removed: HashSet<IndicatorKey>,
    archive: Option<Arc<dyn SeriesArchivePort>>,
    tasks: TaskSupervisor<TaskOutput>,
}

impl<R: RenderPort + 'static> ChartSession<R> {
    pub fn new(
        config: ChartConfig,
        store: ParameterStore,
        base: BaseSeries,
        engine: Box<dyn ComputationPort>,
        renderer: R,
    ) -> Self {
        let mut registry = IndicatorBox::new(base, engine, config.default_placement);
        let synchronizer = Rc::new(RefCell::new(ChartSynchronizer::new(
            renderer,
            config.palette,
        )));
        synchronizer.borrow_mut().sync_all(&registry);
        let subscription = registry.subscribe(synchronizer.clone());
        Self {
            config,
            store,
            registry,
            synchronizer,
            subscription,
            removed: HashSet::new(),
            archive: None,
            tasks: TaskSupervisor::new(),
        }
    }

    /// Archive activated series through `archive` when archiving is enabled.
    pub fn with_archive(mut self, archive: Arc<dyn SeriesArchivePort>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn registry(&self) -> &IndicatorBox {
        &self.registry
    }

    pub fn synchronizer(&self) -> Ref<'_, ChartSynchronizer<R>> {
        self.synchronizer.borrow()
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// `None` for keys the store does not know.
    pub fn state(&self, key: &IndicatorKey) -> Option<LifecycleState> {
        if self.registry.contains(&key.to_string()) {
            Some(LifecycleState::Active)
        } else if self.removed.contains(key) {
            Some(LifecycleState::Removed)
        } else if self.store.contains(key) {
            Some(LifecycleState::Configured)
        } else {
            None
        }
    }

    /// Configured|Removed|Active → Active.
    pub fn load(&mut self, key: &IndicatorKey) -> Result<(), ChartError> {
        match self.registry.load_indicator(&self.store, key) {
            Ok(()) => {
                self.removed.remove(key);
                tracing::info!(%key, "indicator activated");
                self.archive_active(key);
                Ok(())
            }
            Err(e) => {
                log_failure(key, &e);
                Err(e)
            }
        }
    }

    pub fn reload(&mut self, key: &IndicatorKey) -> Result<(), ChartError> {
        self.load(key)
    }

    /// Active → Removed. Parameters stay in the store.
    pub fn remove(&mut self, key: &IndicatorKey) -> Result<(), ChartError> {
        self.registry.remove_indicator(&key.to_string())?;
        self.removed.insert(key.clone());
        tracing::info!(%key, "indicator removed");
        Ok(())
    }

    /// Mutates the store only; an active instance keeps its current series
    /// until it is reloaded.
    pub fn save_parameters(
        &mut self,
        key: &IndicatorKey,
        params: &[IndicatorParameter],
    ) -> Result<(), ChartError> {
        self.store.save_parameters(key, params).inspect_err(|e| {
            tracing::error!(%key, error = %e, "saving parameters failed");
        })
    }

    pub fn set_parameter(&mut self, key: &IndicatorKey, name: &str, value: &str) -> Result<(), ChartError> {
        self.store.set_parameter(key, name, value).inspect_err(|e| {
            tracing::error!(%key, name, error = %e, "setting parameter failed");
        })
    }

    pub fn duplicate(&mut self, key: &IndicatorKey, load_now: bool) -> Result<Duplicated, ChartError> {
        let new_key = self.store.duplicate(key)?;
        let load_error = if load_now {
            self.load(&new_key).err()
        } else {
            None
        };
        Ok(Duplicated {
            key: new_key,
            load_error,
        })
    }

    /// Load every key, retrying keys whose references were not active yet
    /// for as long as each pass activates something.
    pub fn load_many(&mut self, keys: &[IndicatorKey]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut pending: Vec<IndicatorKey> = keys.to_vec();

        loop {
            let mut deferred = Vec::new();
            let before = report.loaded.len();
            for key in pending {
                match self.registry.load_indicator(&self.store, &key) {
                    Ok(()) => {
                        self.removed.remove(&key);
                        self.archive_active(&key);
                        report.loaded.push(key);
                    }
                    Err(e @ ChartError::DependencyUnresolved { .. }) => deferred.push((key, e)),
                    Err(e) => {
                        log_failure(&key, &e);
                        report.failed.push((key, e));
                    }
                }
            }
            if deferred.is_empty() || report.loaded.len() == before {
                for (key, e) in deferred {
                    log_failure(&key, &e);
                    report.failed.push((key, e));
                }
                break;
            }
            pending = deferred.into_iter().map(|(key, _)| key).collect();
        }

        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "batch load finished"
        );
        report
    }

    pub fn add_trading_record(&mut self, name: &str, record: TradingRecord) {
        self.registry.add_trading_record(name, record);
    }

    pub fn remove_trading_record(&mut self, name: &str) -> Result<(), ChartError> {
        self.registry.remove_trading_record(name).map(|_| ())
    }

    /// One group per non-empty category, in category order. A key whose
    /// configuration is broken is listed with its error.
    pub fn menu(&self) -> Vec<MenuGroup> {
        let mut groups: Vec<MenuGroup> = Category::ALL
            .iter()
            .map(|&category| MenuGroup {
                category,
                title: category.menu_title(),
                entries: Vec::new(),
            })
            .collect();

        for key in self.store.get_all_keys() {
            let category = self.store.get_category(&key).unwrap_or(Category::Default);
            let error = self.check_configuration(&key).err().map(|e| {
                tracing::warn!(%key, error = %e, "menu entry has invalid configuration");
                e.to_string()
            });
            let label = match self.store.get_description(key.indicator_type()) {
                Ok(description) if !description.is_empty() => format!("{description} ({key})"),
                _ => key.to_string(),
            };
            let entry = MenuEntry {
                state: self.state(&key).unwrap_or(LifecycleState::Configured),
                key,
                label,
                error,
            };
            if let Some(group) = groups.iter_mut().find(|g| g.category == category) {
                group.entries.push(entry);
            }
        }

        groups.retain(|g| !g.entries.is_empty());
        groups
    }

    fn check_configuration(&self, key: &IndicatorKey) -> Result<(), ChartError> {
        for param in self.store.get_parameters_for(key)? {
            param.value_for(key)?;
        }
        Ok(())
    }

    /// Fetch a new base series in the background. A newer request supersedes
    /// an older one still in flight.
    pub fn request_base_series(
        &mut self,
        port: Arc<dyn DataPort + Send + Sync>,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) {
        let symbol = symbol.to_string();
        self.tasks.spawn(BASE_SERIES_TASK, move |_| {
            let result = port.fetch_bars(&symbol, start, end);
            TaskOutput::BaseSeries { symbol, result }
        });
    }

    /// Apply finished background work on the calling thread.
    pub fn poll_background(&mut self) -> Vec<BackgroundEvent> {
        let mut events = Vec::new();
        for completion in self.tasks.drain_completed() {
            let output = match completion.output {
                Ok(output) => output,
                Err(failure) => {
                    tracing::error!(task = %completion.name, reason = %failure.reason, "background task failed");
                    events.push(BackgroundEvent::TaskFailed {
                        task: completion.name,
                        reason: failure.reason,
                    });
                    continue;
                }
            };
            match output {
                TaskOutput::Archive {
                    identifier,
                    result: Ok(()),
                } => {
                    tracing::debug!(%identifier, "series archived");
                    events.push(BackgroundEvent::Archived { identifier });
                }
                TaskOutput::Archive {
                    identifier,
                    result: Err(error),
                } => {
                    tracing::error!(%identifier, error = %error, "archiving series failed");
                    events.push(BackgroundEvent::ArchiveFailed { identifier, error });
                }
                TaskOutput::BaseSeries {
                    symbol,
                    result: Ok(base),
                } => {
                    let report = self.install_base_series(base);
                    events.push(BackgroundEvent::BaseSeriesInstalled { symbol, report });
                }
                TaskOutput::BaseSeries {
                    symbol,
                    result: Err(error),
                } => {
                    tracing::error!(%symbol, error = %error, "loading base series failed");
                    events.push(BackgroundEvent::BaseSeriesFailed { symbol, error });
                }
            }
        }
        events
    }

    /// Block until background work has finished; results still need
    /// [`ChartSession::poll_background`].
    pub fn wait_background(&mut self) {
        self.tasks.wait_idle();
    }

    /// Swap in `base` and reload every store-backed indicator that was
    /// active, in its previous order. Directly added indicators are dropped.
    pub fn install_base_series(&mut self, base: BaseSeries) -> BatchReport {
        let symbol = base.symbol().to_string();
        let previous = self.registry.replace_base_series(base);
        let keys: Vec<IndicatorKey> = previous
            .iter()
            .filter_map(|indicator| {
                if indicator.key.is_none() {
                    tracing::warn!(
                        identifier = %indicator.identifier,
                        "dropping indicator without stored configuration"
                    );
                }
                indicator.key.clone()
            })
            .collect();
        tracing::info!(%symbol, reloading = keys.len(), "base series installed");
        self.load_many(&keys)
    }

    fn archive_active(&mut self, key: &IndicatorKey) {
        if !self.config.archive_enabled {
            return;
        }
        let Some(archive) = self.archive.clone() else {
            return;
        };
        let identifier = key.to_string();
        let Some(indicator) = self.registry.get(&identifier) else {
            return;
        };
        let base = self.registry.base_series();
        let symbol = base.symbol().to_string();
        let timestamps = base.timestamps();
        let series = indicator.series.clone();

        self.tasks
            .spawn(&format!("archive:{identifier}"), move |token| {
                let result = if token.is_cancelled() {
                    Ok(())
                } else {
                    archive.archive_series(&symbol, &identifier, &timestamps, &series)
                };
                TaskOutput::Archive { identifier, result }
            });
    }
}

impl<R: RenderPort + 'static> Drop for ChartSession<R> {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.subscription);
    }
}

fn log_failure(key: &IndicatorKey, error: &ChartError) {
    if error.is_isolated() {
        tracing::warn!(%key, %error, "indicator not activated");
    } else {
        tracing::error!(%key, %error, "indicator not activated");
    }
}
