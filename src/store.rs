//! On-disk job state, one pretty-printed JSON file per job.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::job::Job;
use crate::model::JobId;

#[derive(Debug, Clone)]
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    /// Open (and create if needed) the state directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("job-{id}.json"))
    }

    /// Write through a temp file so a crash never leaves a half-written job.
    pub fn save(&self, job: &Job) -> Result<()> {
        let path = self.path_for(job.id());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(job)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        debug!(job_id = %job.id(), path = %path.display(), "job saved");
        Ok(())
    }

    /// Every stored job, sorted by id. Unreadable files are skipped.
    pub fn load_all(&self) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_job_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("job-") && n.ends_with(".json"));
            if !is_job_file {
                continue;
            }
            match read_job(&path) {
                Ok(mut job) => {
                    job.rebuild_descriptor();
                    jobs.push(job);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable job file"),
            }
        }
        jobs.sort_by_key(Job::id);
        Ok(jobs)
    }

    /// Returns whether a file was removed.
    pub fn remove(&self, id: JobId) -> Result<bool> {
        let path = self.path_for(id);
        if path.exists() {
            fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

fn read_job(path: &Path) -> Result<Job> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
