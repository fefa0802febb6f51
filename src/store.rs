//! Run report persistence. One record per run, keyed by run timestamp.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::pipeline::RunReport;

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save(&self, report: &RunReport) -> Result<()>;
    async fn latest(&self) -> Result<Option<RunReport>>;
    /// Most recent first.
    async fn recent(&self, n: usize) -> Result<Vec<RunReport>>;
}

/// Last-N reports in memory.
#[derive(Debug)]
pub struct MemoryRunStore {
    inner: Mutex<Vec<RunReport>>,
    cap: usize,
}

impl MemoryRunStore {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 1_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }
}

impl Default for MemoryRunStore {
    fn default() -> Self {
        Self::with_capacity(50)
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save(&self, report: &RunReport) -> Result<()> {
        let mut v = self.inner.lock().expect("run store mutex poisoned");
        v.push(report.clone());
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
        Ok(())
    }

    async fn latest(&self) -> Result<Option<RunReport>> {
        let v = self.inner.lock().expect("run store mutex poisoned");
        Ok(v.last().cloned())
    }

    async fn recent(&self, n: usize) -> Result<Vec<RunReport>> {
        let v = self.inner.lock().expect("run store mutex poisoned");
        Ok(v.iter().rev().take(n).cloned().collect())
    }
}

/// `<dir>/<run_id>.json`, one file per run.
#[derive(Debug, Clone)]
pub struct FileRunStore {
    dir: PathBuf,
}

impl FileRunStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record paths sorted oldest first. Run ids sort chronologically.
    async fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e).with_context(|| format!("read_dir {}", self.dir.display())),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }

    async fn read(path: &Path) -> Result<RunReport> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn save(&self, report: &RunReport) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create {}", self.dir.display()))?;
        let path = self.dir.join(format!("{}.json", report.run_id));
        let body = serde_json::to_vec_pretty(report).context("serialize run report")?;
        // write-then-rename so readers never see a half-written record
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("rename to {}", path.display()))?;
        tracing::debug!(path = %path.display(), "run report stored");
        Ok(())
    }

    async fn latest(&self) -> Result<Option<RunReport>> {
        match self.record_paths().await?.last() {
            Some(p) => Self::read(p).await.map(Some),
            None => Ok(None),
        }
    }

    async fn recent(&self, n: usize) -> Result<Vec<RunReport>> {
        let paths = self.record_paths().await?;
        let mut out = Vec::new();
        for p in paths.iter().rev().take(n) {
            match Self::read(p).await {
                Ok(r) => out.push(r),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable run record"),
            }
        }
        Ok(out)
    }
}
