use std::{
    collections::BTreeSet,
    path::PathBuf,
    time::{Duration, Instant},
};

use rayon::prelude::*;

use crate::{
    assets::store::LayerStore,
    config::mask::{AssetLayout, MaskConfig, MonitorSettings},
    foundation::{
        core::ActiveState,
        error::{MaskError, MaskResult},
    },
    render::composite::{Compositor, RenderOutcome},
    session::cancel::CancelToken,
    watch::state_log::{PollOutcome, StateLog},
};

/// A mask configuration with its own layer store and result counter.
#[derive(Debug)]
pub struct MaskPipeline {
    config: MaskConfig,
    store: LayerStore,
    compositor: Compositor,
}

impl MaskPipeline {
    /// Load the layers of `config` and prepare a compositor writing into `results_dir`.
    pub fn new(
        config: MaskConfig,
        layout: AssetLayout,
        settings: &MonitorSettings,
        results_dir: PathBuf,
    ) -> Self {
        let store = LayerStore::load(&config, layout, settings.frame_size);
        let compositor = Compositor::new(results_dir, settings.frame_size);
        Self {
            config,
            store,
            compositor,
        }
    }

    /// Configuration rendered by this pipeline.
    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    /// Cached layers.
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Compositor and its result counter.
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Render `active` into the next numbered result image.
    pub fn render(&mut self, active: &ActiveState) -> MaskResult<Option<RenderOutcome>> {
        self.compositor.render(active, &self.config, &self.store)
    }
}

/// What one poll or state update produced.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Result images written, one per configuration that rendered.
    pub rendered: Vec<RenderOutcome>,
    /// Wall time spent rendering.
    pub elapsed: Duration,
}

impl CycleReport {
    /// True when nothing was written.
    pub fn is_idle(&self) -> bool {
        self.rendered.is_empty()
    }

    /// Paths written during the cycle.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.rendered.iter().map(|r| r.path.clone()).collect()
    }
}

/// The polling loop: watches the state log and re-renders every mask configuration on change.
///
/// Layer stores are loaded once in [`MaskSession::initialize`] and never mutated afterwards.
#[derive(Debug)]
pub struct MaskSession {
    pipelines: Vec<MaskPipeline>,
    watcher: StateLog,
    settings: MonitorSettings,
}

impl MaskSession {
    /// Load every configuration's layers and prepare the watcher.
    ///
    /// With a single configuration results go straight into `settings.results_dir`; with several,
    /// each writes into `settings.results_dir/{name}`. Result directories are not created here.
    #[tracing::instrument(skip_all, fields(panorama = layout.panorama_id()))]
    pub fn initialize(
        configs: Vec<MaskConfig>,
        layout: &AssetLayout,
        settings: MonitorSettings,
    ) -> MaskResult<Self> {
        if configs.is_empty() {
            return Err(MaskError::validation("at least one mask config is required"));
        }
        let mut names = BTreeSet::new();
        for config in &configs {
            if !names.insert(config.name()) {
                return Err(MaskError::validation(format!(
                    "duplicate mask config name '{}'",
                    config.name()
                )));
            }
        }

        let shared_dir = configs.len() == 1;
        let started = Instant::now();
        let pipelines: Vec<MaskPipeline> = configs
            .into_iter()
            .map(|config| {
                let results_dir = if shared_dir {
                    settings.results_dir.clone()
                } else {
                    settings.results_dir.join(config.name())
                };
                MaskPipeline::new(config, layout.clone(), &settings, results_dir)
            })
            .collect();

        let frames: usize = pipelines.iter().map(|p| p.store().frame_count()).sum();
        tracing::info!(
            configs = pipelines.len(),
            frames,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "session initialized"
        );

        Ok(Self {
            pipelines,
            watcher: StateLog::new(settings.state_log.clone()),
            settings,
        })
    }

    /// Pipelines in configuration order.
    pub fn pipelines(&self) -> &[MaskPipeline] {
        &self.pipelines
    }

    /// Settings the session was created with.
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// The state log watcher.
    pub fn watcher(&self) -> &StateLog {
        &self.watcher
    }

    /// Render every configuration for a raw state line.
    ///
    /// Empty and all-inactive states are a no-op. Every configuration is attempted; the first
    /// fatal error is returned afterwards.
    pub fn process_state(&mut self, raw: &[i64]) -> MaskResult<CycleReport> {
        let active = ActiveState::from_raw(raw);
        if active.is_empty() {
            return Ok(CycleReport::default());
        }

        let started = Instant::now();
        let results: Vec<MaskResult<Option<RenderOutcome>>> = if self.settings.parallel {
            self.pipelines
                .par_iter_mut()
                .map(|p| p.render(&active))
                .collect()
        } else {
            self.pipelines.iter_mut().map(|p| p.render(&active)).collect()
        };

        let mut report = CycleReport::default();
        let mut first_err = None;
        for result in results {
            match result {
                Ok(Some(outcome)) => report.rendered.push(outcome),
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(error = %err, "render failed");
                    first_err.get_or_insert(err);
                }
            }
        }
        report.elapsed = started.elapsed();

        if let Some(err) = first_err {
            return Err(err);
        }
        tracing::info!(
            ?raw,
            active = active.len(),
            results = report.rendered.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "state processed"
        );
        Ok(report)
    }

    /// Poll the state log once and render if it reports a new state.
    pub fn poll_once(&mut self) -> MaskResult<CycleReport> {
        match self.watcher.poll() {
            PollOutcome::Changed(state) => self.process_state(&state),
            _ => Ok(CycleReport::default()),
        }
    }

    /// Poll every `interval` until `cancel` fires; returns the number of cycles that rendered.
    ///
    /// Per-cycle errors are logged and the loop carries on.
    pub fn run_forever(&mut self, interval: Duration, cancel: &CancelToken) -> u64 {
        tracing::info!(log = %self.watcher.path().display(), "waiting for updates");
        let mut rendered_cycles = 0;
        while !cancel.is_cancelled() {
            match self.poll_once() {
                Ok(report) if !report.is_idle() => rendered_cycles += 1,
                Ok(_) => {}
                Err(err) => tracing::error!(error = %err, "cycle failed"),
            }
            if cancel.sleep(interval) {
                break;
            }
        }
        tracing::info!(rendered_cycles, "monitor stopped");
        rendered_cycles
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/monitor.rs"]
mod tests;
