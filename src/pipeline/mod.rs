//! Pipeline orchestrator: catalog → fetch → extract → merge → CSV.
//!
//! One full pass for one dataset:
//!   1. Load and deduplicate the station catalog (the only fatal input error)
//!   2. Fetch every station page, bounded by `pipeline.concurrency`
//!   3. Extract each page's date → reading series
//!   4. Merge into the wide table, fill missing cells, write the CSV
//! Nothing from step 2 is persisted; re-running starts from scratch.

pub mod coordinator;
pub mod progress;
pub mod retry;

use crate::aggregate::merge;
use crate::config::{AppConfig, DatasetConfig};
use crate::loader::load_catalog;
use crate::models::{Catalog, MergedTable, Series};
use crate::scraper::parsers::extract_series;
use crate::scraper::{SirScraper, StationSource};
use crate::storage::write_table;
use crate::utils::Timer;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use self::coordinator::Coordinator;
use self::progress::EventSink;
use self::retry::RetryPolicy;

pub struct Pipeline {
    config: AppConfig,
    dataset: DatasetConfig,
    events: EventSink,
}

impl Pipeline {
    pub fn new(config: AppConfig, dataset: DatasetConfig) -> Self {
        Self {
            config,
            dataset,
            events: EventSink::none(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.pipeline.output_dir.join(&self.dataset.output_file)
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        let pipeline = &self.config.pipeline;
        load_catalog(
            &pipeline.catalog_path,
            pipeline.catalog_delimiter_byte()?,
            &pipeline.id_column,
        )
        .context("Cannot start without a station catalog")
    }

    /// Full pass against the live SIR site.
    pub async fn run(&self, catalog: &Catalog) -> Result<PipelineStats> {
        let scraper = SirScraper::new(&self.config.scraper, self.dataset.clone())
            .context("Failed to build scraper")?;

        self.run_with_source(catalog, Arc::new(scraper)).await
    }

    pub async fn run_with_source(
        &self,
        catalog: &Catalog,
        source: Arc<dyn StationSource>,
    ) -> Result<PipelineStats> {
        info!("=== {}: {} stations ===", self.dataset.variant, catalog.len());

        let contents = {
            let _t = Timer::start(format!("{} fetch", self.dataset.variant));
            Coordinator::new(
                source,
                RetryPolicy::from_config(&self.config.scraper),
                self.config.pipeline.concurrency,
            )
            .with_deadline(self.config.pipeline.deadline())
            .with_events(self.events.clone())
            .fetch_all(&catalog.ids())
            .await
        };

        let skipped = contents.values().filter(|c| c.is_empty()).count();
        let (table, series) = self.assemble(catalog, &contents);
        let with_data = series.values().filter(|s| !s.is_empty()).count();

        let output = self.output_path();
        write_table(&output, &table)
            .with_context(|| format!("Failed to save {} table", self.dataset.variant))?;

        let stats = PipelineStats {
            stations: catalog.len(),
            with_data,
            skipped,
            dates: table.date_columns().len(),
            output,
        };

        info!(
            "=== Done: {} stations | {} with data | {} skipped | {} dates → {:?} ===",
            stats.stations, stats.with_data, stats.skipped, stats.dates, stats.output
        );

        Ok(stats)
    }

    /// Extract every page and build the filled table.
    pub fn assemble(
        &self,
        catalog: &Catalog,
        contents: &HashMap<String, String>,
    ) -> (MergedTable, HashMap<String, Series>) {
        let series: HashMap<String, Series> = contents
            .iter()
            .map(|(id, content)| (id.clone(), extract_series(content, &self.dataset)))
            .collect();

        let mut table = merge(catalog, &series, &self.config.pipeline.excluded_columns);
        debug!("{} empty cells filled with {}", table.missing_count(), self.config.pipeline.fill_value);
        table.fill_missing(self.config.pipeline.fill_value);

        (table, series)
    }
}

#[derive(Debug)]
pub struct PipelineStats {
    pub stations: usize,
    pub with_data: usize,
    pub skipped: usize,
    pub dates: usize,
    pub output: PathBuf,
}
