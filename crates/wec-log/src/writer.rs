use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde_json::Map;
use tracing::warn;

use crate::event::{Event, EventType};

/// I/O failure against the Event Log. Per §7, loss of durability here is
/// fatal — the process must not continue executing steps.
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open event log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to append to event log {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read event log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed event log {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The durable, append-only Event Log (C1).
///
/// Holds the full in-memory replay alongside an open file handle so that
/// `last_successful_step`/`loop_counter` (used by the Interpreter's resume
/// path) never need to re-read the file.
pub struct EventLog {
    path: PathBuf,
    file: File,
    events: Vec<Event>,
}

impl EventLog {
    /// Open an existing log for resume, or create a new, empty one.
    ///
    /// Does not itself emit `STATE_ZERO`; callers decide whether this is
    /// a fresh run (call [`EventLog::append`] with `STATE_ZERO`) or a
    /// resume (inspect [`EventLog::last_successful_step`]).
    pub fn open_or_create(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| LogError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let events = if path.exists() {
            load_events(&path)?
        } else {
            Vec::new()
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self { path, file, events })
    }

    /// Append an event; does not return until it is durable on disk.
    pub fn append(
        &mut self,
        event_type: EventType,
        step_id: Option<&str>,
        payload: Map<String, serde_json::Value>,
    ) -> Result<(), LogError> {
        let event = Event::new(event_type, step_id.map(str::to_string), payload);
        let mut line = serde_json::to_vec(&event).expect("Event serializes infallibly");
        line.push(b'\n');

        self.file
            .write_all(&line)
            .map_err(|source| LogError::Append {
                path: self.path.clone(),
                source,
            })?;
        self.file.sync_data().map_err(|source| LogError::Append {
            path: self.path.clone(),
            source,
        })?;

        self.events.push(event);
        Ok(())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The `step_id` of the most recent `STEP_SUCCESS` event, if any.
    pub fn last_successful_step(&self) -> Option<&str> {
        self.events
            .iter()
            .rev()
            .find(|e| e.event_type == EventType::StepSuccess)
            .and_then(|e| e.step_id.as_deref())
    }

    /// The highest `counter` of a `LOOP_ITERATION` event for `loop_id`, or 0.
    pub fn loop_counter(&self, loop_id: &str) -> u32 {
        self.events
            .iter()
            .filter(|e| {
                e.event_type == EventType::LoopIteration
                    && e.step_id.as_deref() == Some(loop_id)
            })
            .filter_map(|e| e.payload.get("counter"))
            .filter_map(|v| v.as_str().and_then(|s| s.parse::<u32>().ok()))
            .max()
            .unwrap_or(0)
    }

    /// Whether `STATE_ZERO` has already been written (i.e. this is a resume).
    pub fn has_state_zero(&self) -> bool {
        self.events
            .iter()
            .any(|e| e.event_type == EventType::StateZero)
    }
}

fn load_events(path: &Path) -> Result<Vec<Event>, LogError> {
    let file = File::open(path).map_err(|source| LogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut first_byte = [0u8; 1];
    use std::io::Read;
    let peeked = reader.read(&mut first_byte).map_err(|source| LogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if peeked == 0 {
        return Ok(Vec::new());
    }

    if first_byte[0] == b'[' {
        // Legacy whole-file JSON array representation.
        let rest = fs::read_to_string(path).map_err(|source| LogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        return serde_json::from_str(&rest).map_err(|source| LogError::Malformed {
            path: path.to_path_buf(),
            source,
        });
    }

    // Newline-delimited: re-read from the start line by line.
    drop(reader);
    let file = File::open(path).map_err(|source| LogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| LogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(trimmed) {
            Ok(event) => events.push(event),
            Err(source) => {
                warn!(
                    path = %path.display(),
                    error = %source,
                    "skipping malformed trailing line in event log"
                );
            }
        }
    }
    Ok(events)
}
