/// Basin batch orchestration.
///
/// Basins run on a fixed-size rayon pool. Workers send each outcome over a
/// channel; the calling thread is the only one that touches the manifest,
/// appending a row as soon as a basin finishes.
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::discovery::BasinWorkUnit;
use crate::manifest::{ManifestRow, ManifestWriter};
use crate::pipeline::StageError;

#[derive(Debug)]
pub enum BasinOutcome {
    /// Every stage passed; carries the catchment count when known.
    Succeeded { n_cats: Option<usize> },
    Failed(StageError),
    Panicked(String),
}

impl BasinOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BasinOutcome::Succeeded { .. })
    }
}

#[derive(Debug)]
pub struct BatchResult {
    /// Outcome per basin id.
    pub outcomes: BTreeMap<String, BasinOutcome>,
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &BasinOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(id, o)| (id.as_str(), o))
    }

    pub fn log_summary(&self, label: &str) {
        log::info!(
            "{label}: {} basins, {} succeeded, {} failed in {:.1} s",
            self.total(),
            self.succeeded(),
            self.failed(),
            self.elapsed.as_secs_f64()
        );
        for (id, outcome) in self.failures() {
            match outcome {
                BasinOutcome::Failed(err) => log::warn!("  {id}: {err}"),
                BasinOutcome::Panicked(msg) => log::warn!("  {id}: panicked: {msg}"),
                BasinOutcome::Succeeded { .. } => {}
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}

fn run_isolated<F>(unit: &BasinWorkUnit, job: &F) -> BasinOutcome
where
    F: Fn(&BasinWorkUnit) -> Result<Option<usize>, StageError>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| job(unit))) {
        Ok(Ok(n_cats)) => BasinOutcome::Succeeded { n_cats },
        Ok(Err(err)) => BasinOutcome::Failed(err),
        Err(payload) => BasinOutcome::Panicked(panic_message(payload)),
    }
}

/// Run `job` for every unit on `workers` threads.
///
/// A failing or panicking basin never affects the others. With `manifest`,
/// the file is truncated first and gains one `basin_id,n_cats` row per
/// basin that succeeded with a known catchment count.
pub fn run_batch<F>(
    units: &[BasinWorkUnit],
    workers: usize,
    manifest: Option<&Path>,
    job: F,
) -> Result<BatchResult>
where
    F: Fn(&BasinWorkUnit) -> Result<Option<usize>, StageError> + Sync,
{
    let start = Instant::now();
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("building basin worker pool")?;
    let mut writer = manifest.map(ManifestWriter::create).transpose()?;

    let (tx, rx) = mpsc::channel::<(String, BasinOutcome)>();
    let pool = &pool;
    let job = &job;
    let mut outcomes = BTreeMap::new();
    let mut manifest_error = None;

    thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                units.par_iter().for_each_with(tx, |tx, unit| {
                    log::info!("{}: started", unit.id);
                    let outcome = run_isolated(unit, job);
                    // The receiver outlives every worker.
                    let _ = tx.send((unit.id.clone(), outcome));
                });
            });
        });

        for (id, outcome) in rx {
            match &outcome {
                BasinOutcome::Succeeded { n_cats } => {
                    log::info!("{id}: done");
                    if let (Some(w), Some(n)) = (writer.as_mut(), n_cats) {
                        let row = ManifestRow {
                            basin_id: id.clone(),
                            n_cats: *n,
                        };
                        if let Err(err) = w.append(&row) {
                            log::error!("manifest: {err:#}");
                            manifest_error.get_or_insert(err);
                        }
                    }
                }
                BasinOutcome::Failed(err) => log::error!("{id}: {err}"),
                BasinOutcome::Panicked(msg) => log::error!("{id}: panicked: {msg}"),
            }
            outcomes.insert(id, outcome);
        }
    });

    if let Some(err) = manifest_error {
        return Err(err.context("writing batch manifest"));
    }
    Ok(BatchResult {
        outcomes,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::read_manifest;
    use std::path::PathBuf;

    fn units(n: usize) -> Vec<BasinWorkUnit> {
        (0..n)
            .map(|i| BasinWorkUnit {
                id: format!("b{i}"),
                source_gpkg: PathBuf::from(format!("/in/b{i}/data/b{i}.gpkg")),
                basin_dir: PathBuf::from(format!("/out/b{i}")),
                forcing_dir: PathBuf::from(format!("/in/b{i}/data/forcing")),
            })
            .collect()
    }

    // -- isolation --

    #[test]
    fn failures_and_panics_stay_local() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = tmp.path().join("basins_passed.csv");
        let result = run_batch(&units(6), 3, Some(&manifest), |unit| match unit.id.as_str() {
            "b1" => Err(StageError::Failed {
                stage: "configs",
                message: "no forcing".into(),
            }),
            "b4" => panic!("corrupt geopackage"),
            id => Ok(Some(id[1..].parse::<usize>().unwrap() * 10)),
        })
        .unwrap();

        assert_eq!(result.total(), 6);
        assert_eq!(result.succeeded(), 4);
        assert!(matches!(result.outcomes["b1"], BasinOutcome::Failed(_)));
        match &result.outcomes["b4"] {
            BasinOutcome::Panicked(msg) => assert_eq!(msg, "corrupt geopackage"),
            other => panic!("unexpected {other:?}"),
        }

        let mut rows = read_manifest(&manifest).unwrap();
        rows.sort_by(|a, b| a.basin_id.cmp(&b.basin_id));
        let ids: Vec<_> = rows.iter().map(|r| r.basin_id.as_str()).collect();
        assert_eq!(ids, ["b0", "b2", "b3", "b5"]);
        assert_eq!(rows[3].n_cats, 50);
    }

    // -- manifest --

    #[test]
    fn unknown_catchment_count_is_not_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = tmp.path().join("basins_passed.csv");
        let result = run_batch(&units(2), 1, Some(&manifest), |_| Ok(None)).unwrap();
        assert_eq!(result.succeeded(), 2);
        assert!(read_manifest(&manifest).unwrap().is_empty());
    }

    #[test]
    fn no_manifest_and_empty_batch() {
        let result = run_batch(&[], 4, None, |_| Ok(Some(1))).unwrap();
        assert_eq!(result.total(), 0);
        assert_eq!(result.failed(), 0);
    }
}
