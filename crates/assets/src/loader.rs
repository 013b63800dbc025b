//! Scene loading with progress reporting.
//!
//! A load reports zero or more [`LoadEvent::Progress`] events followed by
//! exactly one terminal `Success` or `Failure`. Failures are not retried.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use crate::error::AssetError;
use crate::scene::{SceneData, SceneFile};
use crate::tag::TaggingPolicy;

const CHUNK: usize = 64 * 1024;

#[derive(Debug)]
pub enum LoadEvent {
    /// Fraction of the load completed, in `[0, 1]`.
    Progress(f32),
    Success(SceneData),
    Failure(AssetError),
}

impl LoadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadEvent::Progress(_))
    }
}

pub trait AssetLoader {
    fn load(&self, identifier: &str, on_event: &mut dyn FnMut(LoadEvent));
}

/// Run a load to completion, keeping only the terminal event.
pub fn load_scene(loader: &dyn AssetLoader, identifier: &str) -> Result<SceneData, AssetError> {
    let mut outcome = None;
    loader.load(identifier, &mut |event| match event {
        LoadEvent::Progress(_) => {}
        LoadEvent::Success(scene) => outcome = Some(Ok(scene)),
        LoadEvent::Failure(err) => outcome = Some(Err(err)),
    });
    outcome.unwrap_or_else(|| Err(AssetError::NotFound(identifier.to_string())))
}

fn finish(file: Result<SceneFile, AssetError>, policy: &TaggingPolicy) -> LoadEvent {
    match file.and_then(|f| SceneData::resolve(f, policy)) {
        Ok(scene) => LoadEvent::Success(scene),
        Err(err) => {
            tracing::warn!(%err, "scene load failed");
            LoadEvent::Failure(err)
        }
    }
}

/// Loads scene JSON files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
    policy: TaggingPolicy,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: TaggingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TaggingPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn read(
        &self,
        identifier: &str,
        on_event: &mut dyn FnMut(LoadEvent),
    ) -> Result<SceneFile, AssetError> {
        let path = self.root.join(identifier);
        let mut file = std::fs::File::open(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.display().to_string()),
            _ => AssetError::Io(err),
        })?;
        let total = file.metadata()?.len();
        let mut data = Vec::with_capacity(total as usize);
        let mut chunk = vec![0u8; CHUNK];
        loop {
            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            if total > 0 {
                on_event(LoadEvent::Progress(
                    (data.len() as f64 / total as f64).min(1.0) as f32,
                ));
            }
        }
        Ok(serde_json::from_slice(&data)?)
    }
}

impl AssetLoader for FileLoader {
    fn load(&self, identifier: &str, on_event: &mut dyn FnMut(LoadEvent)) {
        let _span = tracing::info_span!("load_scene", identifier).entered();
        on_event(LoadEvent::Progress(0.0));
        let file = self.read(identifier, on_event);
        if file.is_ok() {
            on_event(LoadEvent::Progress(1.0));
        }
        on_event(finish(file, &self.policy));
    }
}

/// Serves scene JSON from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    scenes: HashMap<String, String>,
    policy: TaggingPolicy,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identifier: impl Into<String>, json: impl Into<String>) {
        self.scenes.insert(identifier.into(), json.into());
    }

    pub fn insert_scene(
        &mut self,
        identifier: impl Into<String>,
        scene: &SceneFile,
    ) -> Result<(), AssetError> {
        self.insert(identifier, serde_json::to_string(scene)?);
        Ok(())
    }
}

impl AssetLoader for MemoryLoader {
    fn load(&self, identifier: &str, on_event: &mut dyn FnMut(LoadEvent)) {
        on_event(LoadEvent::Progress(0.0));
        let file = self
            .scenes
            .get(identifier)
            .ok_or_else(|| AssetError::NotFound(identifier.to_string()))
            .and_then(|json| SceneFile::from_json(json));
        if file.is_ok() {
            on_event(LoadEvent::Progress(1.0));
        }
        on_event(finish(file, &self.policy));
    }
}
