//! In-memory source for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::{LoaderError, Result};
use crate::source::StaticSource;

#[derive(Default)]
pub struct MapSource {
    files: HashMap<String, String>,
    failing: Mutex<HashSet<String>>,
    reads: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, body: &str) -> Self {
        self.files.insert(path.to_string(), body.to_string());
        self
    }

    /// Every read waits for a permit from `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Make reads of `path` fail with HTTP 500 until `heal` is called.
    pub fn fail(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn heal(&self, path: &str) {
        self.failing.lock().unwrap().remove(path);
    }

    pub fn reads_of(&self, path: &str) -> usize {
        self.reads.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().unwrap().len()
    }
}

#[async_trait]
impl StaticSource for MapSource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn read(&self, path: &str) -> Result<String> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        self.reads.lock().unwrap().push(path.to_string());

        if self.failing.lock().unwrap().contains(path) {
            return Err(LoaderError::Status {
                url: path.to_string(),
                status: 500,
            });
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound(path.to_string()))
    }
}
