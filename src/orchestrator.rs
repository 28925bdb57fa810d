use crate::config::RunConfig;
use crate::models::ListingEntry;
use crate::output;
use crate::scrapers::{DedupAccumulator, PageDriver, PaginationController, StopReason, UnitReport};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Interrupted,
}

/// What a run produced
#[derive(Debug)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub units: Vec<UnitReport>,
    pub restored: usize,
    pub entries: Vec<ListingEntry>,
}

/// Drives every work unit in order and persists the accumulated listings
pub struct Orchestrator {
    config: RunConfig,
    controller: PaginationController,
    interrupt: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(config: RunConfig, interrupt: Arc<AtomicBool>) -> Result<Self> {
        let controller = PaginationController::new(&config, interrupt.clone())?;
        Ok(Self {
            config,
            controller,
            interrupt,
        })
    }

    /// Crawl all units with the given browser, then save what was collected.
    ///
    /// Results are saved whether the run completes or is interrupted; only a
    /// persistence failure is returned as an error.
    pub fn run<D: PageDriver>(&self, driver: &mut D) -> Result<RunSummary> {
        let mut acc = DedupAccumulator::new(self.config.dedup_scope);
        let restored = self.restore(&mut acc);
        let mut units = Vec::new();

        for unit in &self.config.units {
            if self.interrupted() {
                break;
            }
            info!(">>> CITY={}  CATEGORY={}", unit.city, unit.category_label());

            let report = self.controller.run_unit(driver, unit, &mut acc);
            if report.stop.is_exhausted() {
                info!(unit = %report.unit, pages = report.pages, new = report.admitted, "Stopped: {}", report.stop);
            } else {
                warn!(unit = %report.unit, pages = report.pages, new = report.admitted, "Stopped early: {}", report.stop);
            }

            let interrupted = report.stop == StopReason::Interrupted;
            units.push(report);
            if interrupted {
                break;
            }
            self.write_snapshot(&acc);
        }

        let outcome = if self.interrupted() {
            warn!("Interrupted by user, saving progress...");
            RunOutcome::Interrupted
        } else {
            RunOutcome::Completed
        };
        self.persist(acc.entries(), outcome)?;

        Ok(RunSummary {
            outcome,
            units,
            restored,
            entries: acc.entries().to_vec(),
        })
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Seed the accumulator from a previous run's snapshot, else its CSV
    fn restore(&self, acc: &mut DedupAccumulator) -> usize {
        if !self.config.output.resume {
            return 0;
        }
        let candidates: [PathBuf; 2] = [self.config.output.snapshot_path(), self.config.output.csv.clone()];
        let Some(path) = candidates.iter().find(|p| p.exists()) else {
            info!("Nothing to resume from");
            return 0;
        };
        match output::read_csv(path) {
            Ok(rows) => {
                let mut restored = 0;
                for row in rows {
                    if acc.admit(row) {
                        restored += 1;
                    }
                }
                info!(path = %path.display(), restored, "Resumed previous results");
                restored
            }
            Err(e) => {
                warn!(error = %e, "Could not resume, starting fresh");
                0
            }
        }
    }

    fn write_snapshot(&self, acc: &DedupAccumulator) {
        if !self.config.output.snapshot || acc.is_empty() {
            return;
        }
        let path = self.config.output.snapshot_path();
        if let Err(e) = output::write_csv(&path, acc.entries()) {
            warn!(error = %e, "Failed to write snapshot");
        }
    }

    fn persist(&self, entries: &[ListingEntry], outcome: RunOutcome) -> Result<()> {
        let paths = &self.config.output;
        if entries.is_empty() {
            warn!("No results scraped.");
        } else {
            output::write_csv(&paths.csv, entries)?;
            info!("💾 Saved {} listings to {}", entries.len(), paths.csv.display());
            if let Some(json) = &paths.json {
                output::write_json(json, entries)?;
                info!("💾 Saved {} listings to {}", entries.len(), json.display());
            }
        }
        if outcome == RunOutcome::Completed && paths.snapshot {
            output::remove_if_present(&paths.snapshot_path())?;
        }
        Ok(())
    }
}
