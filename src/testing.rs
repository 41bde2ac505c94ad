//! In-memory transport for unit tests.

use crate::ssh::{ExecChannel, RemoteExit, RemoteFs, RemoteStat, Transport};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct RemoteState {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, (Vec<u8>, u32)>,
    pub commands: Vec<String>,
    pub stats: usize,
    pub mkdirs: usize,
    pub writes: usize,
    pub removes: usize,
    pub sftp_opened: usize,
    pub sftp_closed: usize,
    pub exec_opened: usize,
    pub exec_closed: usize,
    pub disconnected: usize,
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}

impl RemoteState {
    fn dir_exists(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }
}

/// Records everything done to it. The remote command "runs" by returning the
/// configured exit and output. Clones share the same remote state.
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<RemoteState>>,
    pub exit: RemoteExit,
    pub output: Vec<u8>,
    pub fail_sftp: bool,
    pub fail_exec_open: bool,
    pub fail_run: bool,
    pub fail_remove: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let mut state = RemoteState::default();
        state.dirs.insert("/".to_string());
        state.dirs.insert("/tmp".to_string());

        Self {
            state: Arc::new(Mutex::new(state)),
            exit: RemoteExit::Status(0),
            output: Vec::new(),
            fail_sftp: false,
            fail_exec_open: false,
            fail_run: false,
            fail_remove: false,
        }
    }

    pub fn with_exit(mut self, exit: RemoteExit) -> Self {
        self.exit = exit;
        self
    }

    pub fn fs(&self) -> MemoryFs {
        MemoryFs {
            state: self.state.clone(),
            fail_remove: self.fail_remove,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).map(|(data, _)| data.clone())
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.state().dirs.contains(path)
    }

    pub fn put_file(&self, path: &str, data: &[u8], mode: u32) {
        self.state()
            .files
            .insert(path.to_string(), (data.to_vec(), mode));
    }
}

pub struct MemoryFs {
    state: Arc<Mutex<RemoteState>>,
    fail_remove: bool,
}

#[async_trait]
impl RemoteFs for MemoryFs {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), anyhow::Error> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        if !state.dir_exists(parent(path)) {
            return Err(anyhow!("no such file: {}", path));
        }
        let mode = state.files.get(path).map(|(_, m)| *m).unwrap_or(0o644);
        state.files.insert(path.to_string(), (data.to_vec(), mode));
        Ok(())
    }

    async fn set_permissions(&self, path: &str, mode: u32) -> Result<(), anyhow::Error> {
        let mut state = self.state.lock().unwrap();
        match state.files.get_mut(path) {
            Some((_, m)) => {
                *m = mode;
                Ok(())
            }
            None => Err(anyhow!("no such file: {}", path)),
        }
    }

    async fn stat(&self, path: &str) -> Result<RemoteStat, anyhow::Error> {
        let mut state = self.state.lock().unwrap();
        state.stats += 1;
        if state.dirs.contains(path) {
            return Ok(RemoteStat {
                is_dir: true,
                permissions: Some(0o755),
            });
        }
        match state.files.get(path) {
            Some((_, mode)) => Ok(RemoteStat {
                is_dir: false,
                permissions: Some(*mode),
            }),
            None => Err(anyhow!("no such file: {}", path)),
        }
    }

    async fn create_dir(&self, path: &str) -> Result<(), anyhow::Error> {
        let mut state = self.state.lock().unwrap();
        state.mkdirs += 1;
        if state.dirs.contains(path) || state.files.contains_key(path) {
            return Err(anyhow!("failure: {} exists", path));
        }
        if !state.dir_exists(parent(path)) {
            return Err(anyhow!("no such file: {}", parent(path)));
        }
        state.dirs.insert(path.to_string());
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), anyhow::Error> {
        let mut state = self.state.lock().unwrap();
        state.removes += 1;
        if self.fail_remove {
            return Err(anyhow!("permission denied: {}", path));
        }
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("no such file: {}", path))
    }

    async fn close(&self) -> Result<(), anyhow::Error> {
        self.state.lock().unwrap().sftp_closed += 1;
        Ok(())
    }
}

pub struct MemoryExec {
    state: Arc<Mutex<RemoteState>>,
    exit: RemoteExit,
    output: Vec<u8>,
    fail_run: bool,
}

#[async_trait]
impl ExecChannel for MemoryExec {
    async fn run(
        &mut self,
        command: &str,
        output: &mut Vec<u8>,
    ) -> Result<RemoteExit, anyhow::Error> {
        self.state.lock().unwrap().commands.push(command.to_string());
        output.extend_from_slice(&self.output);
        if self.fail_run {
            return Err(anyhow!("connection reset"));
        }
        Ok(self.exit.clone())
    }

    async fn close(self) -> Result<(), anyhow::Error> {
        self.state.lock().unwrap().exec_closed += 1;
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Fs = MemoryFs;
    type Channel = MemoryExec;

    async fn open_sftp(&self) -> Result<MemoryFs, anyhow::Error> {
        if self.fail_sftp {
            return Err(anyhow!("subsystem request failed"));
        }
        self.state().sftp_opened += 1;
        Ok(self.fs())
    }

    async fn open_exec(&self) -> Result<MemoryExec, anyhow::Error> {
        if self.fail_exec_open {
            return Err(anyhow!("channel open failure"));
        }
        self.state().exec_opened += 1;
        Ok(MemoryExec {
            state: self.state.clone(),
            exit: self.exit.clone(),
            output: self.output.clone(),
            fail_run: self.fail_run,
        })
    }

    async fn disconnect(self) -> Result<(), anyhow::Error> {
        self.state().disconnected += 1;
        Ok(())
    }
}
