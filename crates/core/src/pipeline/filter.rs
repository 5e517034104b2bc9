//! Narrowing the discovered episode set before any work starts.

use std::collections::HashMap;
use tracing::debug;

use crate::config::DownloadParameters;
use crate::episode::{EpisodeDescriptor, EpisodeId};
use crate::range::{RangeError, RangeFilter};

/// Keeps the episodes inside the configured season range, then inside the
/// configured episode range.
///
/// Open ends extend to the highest season and episode observed in the set.
/// Episodes without a season count as season 0. An empty set is returned as
/// is, without parsing anything.
pub fn apply_ranges(
    params: &DownloadParameters,
    episodes: Vec<EpisodeDescriptor>,
) -> Result<Vec<EpisodeDescriptor>, RangeError> {
    if episodes.is_empty() {
        return Ok(episodes);
    }

    let max_season = episodes
        .iter()
        .map(|e| e.season.unwrap_or(0))
        .max()
        .unwrap_or(0);
    let seasons = RangeFilter::SEASONS.parse(params.season_range.as_deref(), max_season)?;
    let episodes: Vec<_> = episodes
        .into_iter()
        .filter(|e| seasons.contains(e.season.unwrap_or(0)))
        .collect();

    let max_sequence = episodes
        .iter()
        .map(|e| e.sequence.integer_part())
        .max()
        .unwrap_or(0);
    let sequences = RangeFilter::EPISODES.parse(params.episode_range.as_deref(), max_sequence)?;
    debug!(
        seasons = ?seasons,
        episodes = ?sequences,
        "Applying ranges"
    );

    Ok(episodes
        .into_iter()
        .filter(|e| sequences.contains_sequence(e.sequence))
        .collect())
}

/// Drops unwanted dub variants and collapses the set to one descriptor per
/// `(season, sequence)`.
///
/// The first descriptor of an identity wins. When dubs are enabled, audio
/// inputs of later wanted variants are folded into it so a single output
/// file carries every requested language.
pub fn select_variants(params: &DownloadParameters, episodes: Vec<EpisodeDescriptor>) -> Vec<EpisodeDescriptor> {
    let mut selected: Vec<EpisodeDescriptor> = Vec::with_capacity(episodes.len());
    let mut index: HashMap<EpisodeId, usize> = HashMap::new();

    for episode in episodes {
        if !params.wants_episode(&episode) {
            debug!(episode = %episode.id(), dub = ?episode.dub_language, "Dropping unwanted variant");
            continue;
        }

        match index.get(&episode.id()) {
            Some(&position) => {
                if params.dubs && episode.dubbed {
                    if selected[position].merge_dub(&episode) {
                        debug!(
                            episode = %episode.id(),
                            dub = ?episode.dub_language,
                            "Merged dub audio into episode"
                        );
                    }
                } else {
                    debug!(episode = %episode.id(), "Dropping duplicate episode");
                }
            }
            None => {
                index.insert(episode.id(), selected.len());
                selected.push(episode);
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{EpisodeInput, InputKind};

    fn episode(season: u32, number: f64) -> EpisodeDescriptor {
        EpisodeDescriptor::new("Show", Some(season), number, format!("Ep {}", number), "u")
    }

    fn numbers(episodes: &[EpisodeDescriptor]) -> Vec<String> {
        episodes.iter().map(|e| e.id().to_string()).collect()
    }

    fn params(seasons: Option<&str>, episodes: Option<&str>) -> DownloadParameters {
        DownloadParameters {
            season_range: seasons.map(str::to_string),
            episode_range: episodes.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_ranges_keeps_everything() {
        let all = vec![episode(1, 1.0), episode(1, 2.0), episode(2, 1.0)];
        let kept = apply_ranges(&params(None, None), all).unwrap();
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_season_then_episode_range() {
        let all = vec![
            episode(1, 1.0),
            episode(1, 2.0),
            episode(2, 1.0),
            episode(2, 2.0),
            episode(2, 3.0),
        ];
        let kept = apply_ranges(&params(Some("2"), Some("2-")), all).unwrap();
        assert_eq!(numbers(&kept), vec!["S02E02", "S02E03"]);
    }

    #[test]
    fn test_inverted_range_matches_nothing() {
        let all = vec![episode(1, 1.0), episode(1, 5.0), episode(1, 9.0)];
        let kept = apply_ranges(&params(None, Some("8-2")), all).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn test_decimal_episode_outside_whole_bound() {
        let all = vec![episode(1, 12.0), episode(1, 12.5)];
        let kept = apply_ranges(&params(None, Some("12")), all).unwrap();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].sequence.is_whole());
    }

    #[test]
    fn test_invalid_range_is_error() {
        let err = apply_ranges(&params(Some("a-1"), None), vec![episode(1, 1.0)]).unwrap_err();
        assert!(matches!(err, RangeError::InvalidFormat { .. }));
    }

    #[test]
    fn test_empty_set_skips_parsing() {
        let kept = apply_ranges(&params(Some("--"), None), Vec::new()).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn test_duplicates_collapse_to_first() {
        let first = episode(1, 3.0);
        let mut second = episode(1, 3.0);
        second.title = "Other".to_string();

        let selected = select_variants(&DownloadParameters::default(), vec![first, second]);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].title, "Ep 3");
    }

    #[test]
    fn test_dubs_dropped_unless_enabled() {
        let sub = episode(1, 1.0);
        let dub = episode(1, 1.0).with_dub("English");

        let selected = select_variants(&DownloadParameters::default(), vec![dub, sub]);
        assert_eq!(selected.len(), 1);
        assert!(!selected[0].dubbed);
    }

    #[test]
    fn test_wanted_dub_audio_is_merged() {
        let sub = EpisodeDescriptor::new("Show", Some(1), 1u32, "Ep 1", "https://x/watch/sub")
            .with_input(EpisodeInput::new("v", None, InputKind::Video));
        let dub = EpisodeDescriptor::new("Show", Some(1), 1u32, "Ep 1", "https://x/watch/dub-en")
            .with_dub("English")
            .with_input(EpisodeInput::new("a-en", Some("en"), InputKind::Audio));
        let params = DownloadParameters {
            dubs: true,
            ..Default::default()
        };

        let selected = select_variants(&params, vec![sub, dub.clone(), dub]);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].inputs_of(InputKind::Video).count(), 1);
        assert_eq!(
            selected[0].dub_tracks,
            vec![EpisodeInput::new(
                "https://x/watch/dub-en",
                Some("English"),
                InputKind::Audio
            )]
        );
    }
}
