//! CSV output backend.
//!
//! Creates two files in the configured output directory:
//! - `progress.csv`
//! - `episodes.csv`

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use csv::{Writer, WriterBuilder};

use crate::writer::OutputWriter;
use crate::{EpisodeRow, OutputResult, ProgressRow};

const PROGRESS_HEADER: [&str; 14] = [
    "iteration",
    "steps",
    "episodes",
    "mean_return",
    "success_rate",
    "collisions",
    "policy_loss",
    "value_loss",
    "entropy",
    "approx_kl",
    "clip_fraction",
    "epochs_run",
    "stopped_early",
    "elapsed_secs",
];

const EPISODE_HEADER: [&str; 7] = ["iteration", "seed", "length", "spawned", "goals", "collisions", "mean_return"];

/// Writes training output to two CSV files.
pub struct CsvWriter {
    progress: Writer<File>,
    episodes: Writer<File>,
    finished: bool,
}

impl CsvWriter {
    /// Create `dir` if needed, truncate both files and write the header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        fs::create_dir_all(dir)?;
        let mut progress = Writer::from_path(dir.join("progress.csv"))?;
        progress.write_record(PROGRESS_HEADER)?;

        let mut episodes = Writer::from_path(dir.join("episodes.csv"))?;
        episodes.write_record(EPISODE_HEADER)?;

        Ok(Self { progress, episodes, finished: false })
    }

    /// Like [`new`](Self::new) but keep existing rows, so a resumed run
    /// continues the same files.  Headers are written only to empty files.
    pub fn append(dir: &Path) -> OutputResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            progress: open_append(&dir.join("progress.csv"), &PROGRESS_HEADER)?,
            episodes: open_append(&dir.join("episodes.csv"), &EPISODE_HEADER)?,
            finished: false,
        })
    }
}

fn open_append(path: &Path, header: &[&str]) -> OutputResult<Writer<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let empty = file.metadata()?.len() == 0;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    if empty {
        writer.write_record(header)?;
    }
    Ok(writer)
}

fn opt(v: Option<f32>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

impl OutputWriter for CsvWriter {
    fn write_progress(&mut self, row: &ProgressRow) -> OutputResult<()> {
        self.progress.write_record(&[
            row.iteration.to_string(),
            row.steps.to_string(),
            row.episodes.to_string(),
            opt(row.mean_return),
            row.success_rate.to_string(),
            row.collisions.to_string(),
            row.policy_loss.to_string(),
            row.value_loss.to_string(),
            row.entropy.to_string(),
            row.approx_kl.to_string(),
            row.clip_fraction.to_string(),
            row.epochs_run.to_string(),
            (row.stopped_early as u8).to_string(),
            format!("{:.3}", row.elapsed_secs),
        ])?;
        // One row per iteration; flush so progress survives preemption.
        self.progress.flush()?;
        Ok(())
    }

    fn write_episode(&mut self, row: &EpisodeRow) -> OutputResult<()> {
        self.episodes.write_record(&[
            row.iteration.to_string(),
            row.seed.to_string(),
            row.length.to_string(),
            row.spawned.to_string(),
            row.goals.to_string(),
            row.collisions.to_string(),
            row.mean_return.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.progress.flush()?;
        self.episodes.flush()?;
        Ok(())
    }
}
