//! Filesystem fixtures for tests that need a real container directory.

use crate::api::AttrApi;
use crate::config::AttrConfig;
use crate::error::Result;
use crate::store::fs_backend::FsBackend;
use std::path::PathBuf;
use tempfile::TempDir;

/// A container directory inside a temp dir that lives as long as the value.
pub struct TestEnv {
    _dir: TempDir,
    pub root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().join("container");
        Self { _dir: dir, root }
    }

    pub fn backend(&self) -> FsBackend {
        FsBackend::new(self.root.clone()).expect("fs backend")
    }

    pub fn init(&self, config: AttrConfig) -> AttrApi<FsBackend> {
        AttrApi::init(self.backend(), config).expect("init container")
    }

    /// Opens the container through a fresh backend, as a new process would.
    pub fn reopen(&self, config: AttrConfig) -> Result<AttrApi<FsBackend>> {
        AttrApi::open_container(self.backend(), config)
    }
}
