// src/partition.rs

use crate::error::{MineError, Result};
use crate::model::{ChangeId, ChangeMap};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Splits the candidate changes into contiguous chunks of at most
/// `partition_size` entries. With a seed, the candidate list is shuffled first.
pub fn split(changes: &ChangeMap, partition_size: usize, shuffle_seed: Option<u64>) -> Vec<ChangeMap> {
    let mut ids: Vec<&ChangeId> = changes.keys().collect();
    if let Some(seed) = shuffle_seed {
        let mut rng = StdRng::seed_from_u64(seed);
        ids.shuffle(&mut rng);
    }
    ids.chunks(partition_size.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(|&id| (id.clone(), changes[id].clone()))
                .collect()
        })
        .collect()
}

/// A chunk of changes persisted to the scratch directory.
#[derive(Debug, Clone)]
pub struct Partition {
    pub index: usize,
    pub path: PathBuf,
    pub len: usize,
}

/// One unit of parallel work: every change of `antecedents` against every
/// change of `consequents`.
#[derive(Debug, Clone)]
pub struct Job {
    pub antecedents: Partition,
    pub consequents: Partition,
}

/// Scratch directory holding the partition files of one run.
///
/// Created fresh per run and removed by [`ScratchSpace::close`], or on drop
/// if the run bails out early.
pub struct ScratchSpace {
    dir: TempDir,
    partitions: Vec<Partition>,
}

impl ScratchSpace {
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("change_partitions_");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| MineError::io(parent, e))?;
                builder.tempdir_in(parent).map_err(|e| MineError::io(parent, e))?
            }
            None => builder
                .tempdir()
                .map_err(|e| MineError::io(std::env::temp_dir(), e))?,
        };
        Ok(Self {
            dir,
            partitions: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Persists each chunk as `partition_<index>.json`.
    pub fn write_partitions(&mut self, chunks: &[ChangeMap]) -> Result<()> {
        for chunk in chunks {
            let index = self.partitions.len();
            let path = self.dir.path().join(format!("partition_{index}.json"));
            let file = File::create(&path).map_err(|e| MineError::io(&path, e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, chunk).map_err(|e| MineError::json(&path, e))?;
            writer.flush().map_err(|e| MineError::io(&path, e))?;
            self.partitions.push(Partition {
                index,
                path,
                len: chunk.len(),
            });
        }
        Ok(())
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Every (antecedent partition, consequent partition) combination.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(self.partitions.len() * self.partitions.len());
        for antecedents in &self.partitions {
            for consequents in &self.partitions {
                jobs.push(Job {
                    antecedents: antecedents.clone(),
                    consequents: consequents.clone(),
                });
            }
        }
        jobs
    }

    /// Deletes the scratch directory. Only call once no worker reads from it.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| MineError::io(path, e))
    }
}

pub fn load_partition(path: &Path) -> Result<ChangeMap> {
    let file = File::open(path).map_err(|e| MineError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| MineError::json(path, e))
}
