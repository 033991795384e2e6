//! Tests for ix-output.

use std::path::Path;

use tempfile::TempDir;

use ix_sim::EpisodeSummary;
use ix_train::IterationStats;

use crate::{CsvWriter, EpisodeRow, OutputError, OutputResult, OutputWriter, ProgressObserver, ProgressRow};

fn tmp() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

fn stats(iteration: u64) -> IterationStats {
    IterationStats {
        iteration,
        steps: 400,
        episodes: 3,
        mean_return: Some(0.75),
        spawned: 8,
        goals: 6,
        collisions: 2,
        epochs_run: 4,
        ..IterationStats::default()
    }
}

fn summary(seed: u64) -> EpisodeSummary {
    EpisodeSummary { seed, length: 120, spawned: 2, goals: 1, collisions: 1, returns: vec![1.5, -9.5] }
}

fn records(path: &Path) -> Vec<Vec<String>> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    rdr.records().map(|r| r.unwrap().iter().map(str::to_owned).collect()).collect()
}

fn headers(path: &Path) -> Vec<String> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    rdr.headers().unwrap().iter().map(str::to_owned).collect()
}

// ── CSV ───────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod csv_tests {
    use super::*;

    #[test]
    fn csv_files_created() {
        let dir = tmp();
        let out = dir.path().join("nested");
        let _w = CsvWriter::new(&out).unwrap();
        assert!(out.join("progress.csv").exists());
        assert!(out.join("episodes.csv").exists());
    }

    #[test]
    fn csv_headers_correct() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        assert_eq!(headers(&dir.path().join("episodes.csv")), [
            "iteration", "seed", "length", "spawned", "goals", "collisions", "mean_return"
        ]);
        let progress = headers(&dir.path().join("progress.csv"));
        assert_eq!(progress.len(), 14);
        assert_eq!(progress[0], "iteration");
        assert_eq!(progress[3], "mean_return");
    }

    #[test]
    fn progress_rows_written() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_progress(&ProgressRow::from(&stats(0))).unwrap();
        w.write_progress(&ProgressRow::from(&IterationStats { mean_return: None, ..stats(1) })).unwrap();
        w.finish().unwrap();

        let rows = records(&dir.path().join("progress.csv"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "0");
        assert_eq!(rows[0][3], "0.75");
        assert_eq!(rows[0][4], "0.75"); // 6 goals of 8 spawned
        assert_eq!(rows[1][3], "");
    }

    #[test]
    fn episode_rows_written() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_episode(&EpisodeRow::new(4, &summary(77))).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();

        let rows = records(&dir.path().join("episodes.csv"));
        assert_eq!(rows, vec![vec!["4", "77", "120", "2", "1", "1", "-4"]]);
    }

    #[test]
    fn append_continues_existing_files() {
        let dir = tmp();
        {
            let mut w = CsvWriter::append(dir.path()).unwrap();
            w.write_progress(&ProgressRow::from(&stats(0))).unwrap();
            w.finish().unwrap();
        }
        {
            let mut w = CsvWriter::append(dir.path()).unwrap();
            w.write_progress(&ProgressRow::from(&stats(1))).unwrap();
            w.finish().unwrap();
        }
        let rows = records(&dir.path().join("progress.csv"));
        let iterations: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(iterations, ["0", "1"]);
    }
}

// ── ProgressObserver ──────────────────────────────────────────────────────────

#[cfg(test)]
mod observer_tests {
    use ix_core::{ActorCriticConfig, EnvConfig};
    use ix_train::{ExperimentConfig, MemoryCheckpointStore, TrainConfig, TrainObserver};

    use super::*;

    /// Fails every write with a distinct message.
    #[derive(Default)]
    struct Broken {
        calls: usize,
    }

    impl OutputWriter for Broken {
        fn write_progress(&mut self, _row: &ProgressRow) -> OutputResult<()> {
            self.calls += 1;
            Err(OutputError::Io(std::io::Error::other(format!("write {}", self.calls))))
        }

        fn write_episode(&mut self, _row: &EpisodeRow) -> OutputResult<()> {
            self.calls += 1;
            Err(OutputError::Io(std::io::Error::other(format!("write {}", self.calls))))
        }

        fn finish(&mut self) -> OutputResult<()> {
            Ok(())
        }
    }

    #[test]
    fn first_error_is_kept() {
        let mut obs = ProgressObserver::new(Broken::default());
        obs.on_iteration(&stats(0));
        obs.on_episode(0, &summary(1));
        let err = obs.take_error().unwrap();
        assert!(err.to_string().contains("write 1"));
        assert!(obs.take_error().is_none());
        assert_eq!(obs.into_writer().calls, 2);
    }

    #[test]
    fn training_run_fills_progress_csv() {
        let dir = tmp();
        let mut config = ExperimentConfig::default();
        config.env = EnvConfig { nagents: 2, horizon: 25, npoints: 8, history_len: 1, ..EnvConfig::default() };
        config.actor_critic = ActorCriticConfig { hidden_sizes: vec![8], history_len: 1, ..ActorCriticConfig::default() };
        config.train = TrainConfig { steps_per_epoch: 50, epochs: 2, iterations: 2, ..TrainConfig::default() };

        let mut obs = ProgressObserver::new(CsvWriter::new(dir.path()).unwrap());
        ix_train::launch(&config, &MemoryCheckpointStore::new(), &mut obs).unwrap();
        assert!(obs.take_error().is_none());

        let progress = records(&dir.path().join("progress.csv"));
        assert_eq!(progress.len(), 2);
        let episodes = records(&dir.path().join("episodes.csv"));
        assert!(!episodes.is_empty());
    }
}
