//! Types for the acquire module.

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::Credential;
use crate::config::DownloadParameters;
use crate::episode::{EpisodeDescriptor, InputKind};

/// Everything the acquisition collaborator needs for one episode.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub episode: EpisodeDescriptor,
    /// Passed through unmodified.
    pub credential: Option<Credential>,
    /// Scratch directory for this episode only.
    pub temp_dir: PathBuf,
    pub params: Arc<DownloadParameters>,
}

/// One downloaded stream on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredFile {
    pub path: PathBuf,
    pub kind: InputKind,
    pub language: Option<String>,
}

impl AcquiredFile {
    pub fn new(path: impl Into<PathBuf>, kind: InputKind, language: Option<&str>) -> Self {
        Self {
            path: path.into(),
            kind,
            language: language.map(str::to_string),
        }
    }
}

/// Raw streams of one episode, owned by whichever stage holds it.
#[derive(Debug)]
pub struct AcquiredMedia {
    pub episode: EpisodeDescriptor,
    pub files: Vec<AcquiredFile>,
    pub temp_dir: PathBuf,
}

impl AcquiredMedia {
    /// The main media file: the first video stream, else the first file.
    pub fn primary(&self) -> Option<&AcquiredFile> {
        self.files
            .iter()
            .find(|f| f.kind == InputKind::Video)
            .or_else(|| self.files.first())
    }

    pub fn files_of(&self, kind: InputKind) -> impl Iterator<Item = &AcquiredFile> {
        self.files.iter().filter(move |f| f.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(files: Vec<AcquiredFile>) -> AcquiredMedia {
        AcquiredMedia {
            episode: EpisodeDescriptor::new("Show", Some(1), 1u32, "T", "u"),
            files,
            temp_dir: PathBuf::from("/tmp/x"),
        }
    }

    #[test]
    fn test_primary_prefers_video() {
        let m = media(vec![
            AcquiredFile::new("/tmp/x/a.ass", InputKind::Subtitle, Some("en-US")),
            AcquiredFile::new("/tmp/x/v.mkv", InputKind::Video, None),
        ]);
        assert_eq!(m.primary().unwrap().path, PathBuf::from("/tmp/x/v.mkv"));
        assert_eq!(m.files_of(InputKind::Subtitle).count(), 1);
    }

    #[test]
    fn test_primary_falls_back_to_first() {
        let m = media(vec![AcquiredFile::new("/tmp/x/a.m4a", InputKind::Audio, None)]);
        assert_eq!(m.primary().unwrap().kind, InputKind::Audio);
        assert!(media(Vec::new()).primary().is_none());
    }
}
