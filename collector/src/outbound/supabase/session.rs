//! Session persistence for the GoTrue adapter.
//!
//! The current session lives in memory and, when a session file is
//! configured, is mirrored to disk as JSON so later runs start signed in.
//! File access goes through `cap_std` directory handles.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use cap_std::{ambient_authority, fs::Dir};
use tracing::debug;

use crate::domain::Session;
use crate::domain::ports::AuthGatewayError;

/// Location of the persisted session.
#[derive(Debug, Clone)]
struct SessionFile {
    directory: PathBuf,
    file_name: OsString,
}

impl SessionFile {
    fn new(path: &Path) -> io::Result<Self> {
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "session file path must include a file name",
            )
        })?;
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok(Self {
            directory: directory.to_path_buf(),
            file_name: file_name.to_os_string(),
        })
    }

    fn read(&self) -> io::Result<Option<String>> {
        let directory = match Dir::open_ambient_dir(&self.directory, ambient_authority()) {
            Ok(directory) => directory,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error),
        };
        match directory.read_to_string(Path::new(&self.file_name)) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        Dir::create_ambient_dir_all(&self.directory, ambient_authority())?;
        let directory = Dir::open_ambient_dir(&self.directory, ambient_authority())?;
        directory.write(Path::new(&self.file_name), contents)
    }

    fn remove(&self) -> io::Result<()> {
        let directory = match Dir::open_ambient_dir(&self.directory, ambient_authority()) {
            Ok(directory) => directory,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(error),
        };
        match directory.remove_file(Path::new(&self.file_name)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error),
        }
    }
}

/// Current session plus optional on-disk mirror.
#[derive(Debug, Default)]
pub(super) struct SessionStore {
    current: RwLock<Option<Session>>,
    file: Option<SessionFile>,
}

impl SessionStore {
    /// Store that also persists to `path`, when given.
    pub(super) fn new(path: Option<&Path>) -> io::Result<Self> {
        let file = path.map(SessionFile::new).transpose()?;
        Ok(Self {
            current: RwLock::new(None),
            file,
        })
    }

    /// Session in memory, falling back to the session file.
    pub(super) fn load(&self) -> Result<Option<Session>, AuthGatewayError> {
        if let Some(session) = self.cached() {
            return Ok(Some(session));
        }
        let Some(file) = &self.file else {
            return Ok(None);
        };
        let Some(contents) = file.read().map_err(storage_error)? else {
            return Ok(None);
        };
        let session: Session = serde_json::from_str(&contents).map_err(|error| {
            AuthGatewayError::storage(format!("session file is not valid JSON: {error}"))
        })?;
        debug!(user_id = %session.user.id, "session restored from file");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(Some(session))
    }

    /// Session in memory only.
    pub(super) fn cached(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current session.
    pub(super) fn save(&self, session: &Session) -> Result<(), AuthGatewayError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        let Some(file) = &self.file else {
            return Ok(());
        };
        let contents = serde_json::to_string(session).map_err(|error| {
            AuthGatewayError::storage(format!("session could not be encoded: {error}"))
        })?;
        file.write(&contents).map_err(storage_error)
    }

    /// Forget the current session in memory and on disk.
    pub(super) fn clear(&self) -> Result<(), AuthGatewayError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        match &self.file {
            Some(file) => file.remove().map_err(storage_error),
            None => Ok(()),
        }
    }
}

fn storage_error(error: io::Error) -> AuthGatewayError {
    AuthGatewayError::storage(error.to_string())
}
