//! Skip-existing support.
//!
//! Files under the destination tree whose name contains `S<season>E<episode> - `
//! (season padded to at least two digits) count as completed episodes. No
//! manifest is kept; the file names are the only record.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::episode::{EpisodeDescriptor, EpisodeId, SequenceNumber};

static EPISODE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"S(\d{2,})E(\d+) - ").expect("episode file pattern is valid"));

/// An episode removed from the pending set because its output exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEpisode {
    pub id: EpisodeId,
    /// The existing file that marked the episode as complete.
    pub path: PathBuf,
}

/// Extracts the episode identity from a file name, if it follows the
/// naming convention.
pub fn parse_file_name(name: &str) -> Option<EpisodeId> {
    let captures = EPISODE_FILE.captures(name)?;
    let season = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let episode = captures.get(2)?.as_str().parse::<u32>().ok()?;
    Some(EpisodeId::new(Some(season), SequenceNumber::whole(episode)))
}

/// Lists every file under `dir` (recursively) that marks a completed episode.
///
/// A missing directory and unreadable entries yield nothing.
pub fn scan_existing(dir: &Path) -> Vec<(EpisodeId, PathBuf)> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "Output directory does not exist yet, nothing to skip");
        return Vec::new();
    }

    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let id = parse_file_name(&entry.file_name().to_string_lossy())?;
            Some((id, entry.into_path()))
        })
        .collect()
}

/// Removes episodes whose output already exists under `dir` from `pending`.
///
/// Returns one [`SkippedEpisode`] per removed descriptor. Running it again on
/// an unchanged directory removes nothing further.
pub fn remove_existing(dir: &Path, pending: &mut Vec<EpisodeDescriptor>) -> Vec<SkippedEpisode> {
    let mut skipped = Vec::new();

    for (id, path) in scan_existing(dir) {
        let before = pending.len();
        pending.retain(|episode| episode.id() != id);
        let removed = before - pending.len();

        for _ in 0..removed {
            warn!(
                episode = %id,
                file = %path.display(),
                "Skipping episode due to existing file"
            );
            skipped.push(SkippedEpisode {
                id,
                path: path.clone(),
            });
        }
    }

    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn episode(season: u32, number: u32) -> EpisodeDescriptor {
        EpisodeDescriptor::new("Show", Some(season), number, format!("Ep {}", number), "u")
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(
            parse_file_name("S01E02 - Title.mkv"),
            Some(EpisodeId::new(Some(1), 2u32))
        );
        assert_eq!(
            parse_file_name("S10E120 - Long Run.mkv"),
            Some(EpisodeId::new(Some(10), 120u32))
        );
        assert_eq!(parse_file_name("S01E02.mkv"), None);
        assert_eq!(parse_file_name("S1E02 - Unpadded.mkv"), None);
        assert_eq!(parse_file_name("notes.txt"), None);
    }

    #[test]
    fn test_removes_existing_episode() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("S01E02 - Title.mkv"), b"done").unwrap();

        let mut pending = vec![episode(1, 1), episode(1, 2), episode(1, 3)];
        let skipped = remove_existing(dir.path(), &mut pending);

        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].id, EpisodeId::new(Some(1), 2u32));
        let ids: Vec<_> = pending.iter().map(|e| e.id()).collect();
        assert_eq!(
            ids,
            vec![EpisodeId::new(Some(1), 1u32), EpisodeId::new(Some(1), 3u32)]
        );
    }

    #[test]
    fn test_scans_recursively() {
        let dir = TempDir::new().unwrap();
        let season_dir = dir.path().join("Show").join("Season 2");
        fs::create_dir_all(&season_dir).unwrap();
        fs::write(season_dir.join("S02E05 - Deep.mkv"), b"done").unwrap();

        let mut pending = vec![episode(2, 4), episode(2, 5)];
        let skipped = remove_existing(dir.path(), &mut pending);

        assert_eq!(skipped.len(), 1);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), EpisodeId::new(Some(2), 4u32));
    }

    #[test]
    fn test_ignores_non_matching_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cover.jpg"), b"img").unwrap();
        fs::write(dir.path().join("S01E01.partial"), b"tmp").unwrap();

        let mut pending = vec![episode(1, 1)];
        let skipped = remove_existing(dir.path(), &mut pending);

        assert!(skipped.is_empty());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_second_scan_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("S01E01 - A.mkv"), b"done").unwrap();

        let mut pending = vec![episode(1, 1), episode(1, 2)];
        let first = remove_existing(dir.path(), &mut pending);
        let after_first = pending.clone();
        let second = remove_existing(dir.path(), &mut pending);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(pending, after_first);
    }

    #[test]
    fn test_missing_directory_skips_nothing() {
        let dir = TempDir::new().unwrap();
        let mut pending = vec![episode(1, 1)];
        let skipped = remove_existing(&dir.path().join("absent"), &mut pending);
        assert!(skipped.is_empty());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_decimal_sequence_is_not_matched_by_whole_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("S01E12 - Regular.mkv"), b"done").unwrap();

        let special = EpisodeDescriptor::new("Show", Some(1), 12.5, "Special", "u");
        let mut pending = vec![special];
        let skipped = remove_existing(dir.path(), &mut pending);

        assert!(skipped.is_empty());
        assert_eq!(pending.len(), 1);
    }
}
