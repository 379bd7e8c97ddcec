//! Per-generation CSV recording of a synthesis run.

use std::fs::{File, create_dir_all};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use directories::ProjectDirs;

use crate::info::SolverInfo;
use crate::options::{CallbackAction, CallbackFn};

/// One completed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    /// Generation number, starting at 1
    pub iteration: usize,
    /// Seconds since the run started
    pub elapsed: f64,
    /// Candidates scored so far
    pub evaluations: usize,
    /// Best fitness seen so far
    pub best_ever: f64,
    /// Best fitness of this generation
    pub current: f64,
    /// Mean fitness of this generation
    pub mean: f64,
}

/// Records the progress of a run through its callback.
///
/// Records are shared with the callbacks created by
/// [`create_callback`](Self::create_callback), so the recorder can be
/// finalized after the run while the callback lives in the options.
#[derive(Debug, Clone)]
pub struct GenerationRecorder {
    run_name: String,
    output_dir: PathBuf,
    records: Arc<Mutex<Vec<GenerationRecord>>>,
}

fn lock(records: &Mutex<Vec<GenerationRecord>>) -> MutexGuard<'_, Vec<GenerationRecord>> {
    match records.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Application name under the user cache directory.
const APPLICATION: &str = "math-synthesis";

/// Default location of run records: `<user cache>/records`.
pub fn records_dir() -> io::Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("org", "math-audio", APPLICATION)
        .ok_or_else(|| io::Error::other("failed to determine project directories"))?;
    Ok(proj_dirs.cache_dir().join("records"))
}

impl GenerationRecorder {
    /// Recorder writing under [`records_dir`].
    pub fn new(run_name: impl Into<String>) -> io::Result<Self> {
        Ok(Self::with_output_dir(run_name, records_dir()?))
    }

    /// Recorder writing under `output_dir`.
    pub fn with_output_dir(run_name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_name: run_name.into(),
            output_dir: output_dir.into(),
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Append the state after one generation.
    pub fn record(&self, info: &SolverInfo) {
        lock(&self.records).push(GenerationRecord {
            iteration: info.iterations,
            elapsed: info.elapsed,
            evaluations: info.evaluations,
            best_ever: info.minf,
            current: info.current,
            mean: info.mean,
        });
    }

    /// Callback recording every generation; it never stops the run.
    pub fn create_callback(&self) -> CallbackFn {
        let recorder = self.clone();
        Box::new(move |info: &SolverInfo| -> CallbackAction {
            recorder.record(info);
            CallbackAction::Continue
        })
    }

    /// Snapshot of the records so far.
    pub fn records(&self) -> Vec<GenerationRecord> {
        lock(&self.records).clone()
    }

    /// Write `<run>_generations.csv` and `<run>_summary.txt`; returns the CSV
    /// path.
    pub fn finalize(&self, info: &SolverInfo) -> io::Result<PathBuf> {
        create_dir_all(&self.output_dir)?;
        let csv_path = self
            .output_dir
            .join(format!("{}_generations.csv", self.run_name));
        let records = self.records();

        let mut file = BufWriter::new(File::create(&csv_path)?);
        writeln!(file, "iteration,elapsed,evaluations,best_ever,current,mean")?;
        for r in &records {
            writeln!(
                file,
                "{},{:.6},{},{:.16e},{:.16e},{:.16e}",
                r.iteration, r.elapsed, r.evaluations, r.best_ever, r.current, r.mean
            )?;
        }
        file.flush()?;

        let summary_path = self.output_dir.join(format!("{}_summary.txt", self.run_name));
        let mut summary = File::create(&summary_path)?;
        writeln!(summary, "Run: {}", self.run_name)?;
        writeln!(summary, "Generations: {}", info.iterations)?;
        writeln!(summary, "Evaluations: {}", info.evaluations)?;
        writeln!(summary, "Refinements: {}", info.refinements)?;
        writeln!(summary, "Refinement failures: {}", info.refinement_failures)?;
        writeln!(summary, "Degenerate evaluations: {}", info.degenerate)?;
        writeln!(summary, "Best fitness: {:e}", info.minf)?;
        writeln!(summary, "Final fitness: {:e}", info.final_fitness)?;
        writeln!(summary, "Elapsed: {:.3}s", info.elapsed)?;
        match &info.stop {
            Some(stop) => writeln!(summary, "Stop: {}", stop)?,
            None => writeln!(summary, "Stop: none")?,
        }

        log::info!(
            "recorded {} generations to {}",
            records.len(),
            csv_path.display()
        );
        Ok(csv_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(iterations: usize, minf: f64) -> SolverInfo {
        SolverInfo {
            iterations,
            evaluations: iterations * 6,
            minf,
            current: minf * 2.0,
            mean: minf * 4.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_records_dir_is_named_after_the_crate() {
        // no home directory in some sandboxes
        let Ok(dir) = records_dir() else { return };
        assert!(dir.ends_with("records"));
        assert!(
            dir.components()
                .any(|c| c.as_os_str().to_string_lossy().contains(APPLICATION))
        );
        assert!(!dir.to_string_lossy().contains("spinorama"));
    }

    #[test]
    fn test_callback_records_every_generation() {
        let recorder = GenerationRecorder::with_output_dir("cb", std::env::temp_dir());
        let mut callback = recorder.create_callback();
        assert_eq!(callback(&info(1, 1.0)), CallbackAction::Continue);
        assert_eq!(callback(&info(2, 0.5)), CallbackAction::Continue);

        let records = recorder.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].iteration, 2);
        assert_eq!(records[1].evaluations, 12);
        assert_eq!(records[1].best_ever, 0.5);
        assert_eq!(records[1].mean, 2.0);
    }

    #[test]
    fn test_finalize_writes_files() {
        let dir = std::env::temp_dir().join(format!("math-synthesis-rec-{}", std::process::id()));
        let recorder = GenerationRecorder::with_output_dir("demo", &dir);
        recorder.record(&info(1, 3.0));
        recorder.record(&info(2, 1.0));

        let csv = recorder.finalize(&info(2, 1.0)).unwrap();
        let text = std::fs::read_to_string(&csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "iteration,elapsed,evaluations,best_ever,current,mean");
        assert!(lines[2].starts_with("2,"));

        let summary = std::fs::read_to_string(dir.join("demo_summary.txt")).unwrap();
        assert!(summary.contains("Generations: 2"));
        assert!(summary.contains("Stop: none"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
