//! Heuristics that tie a file or torrent name to a series and episode.
//!
//! Series detection is a plain substring test against the normalized title
//! and its dotted form. Season/episode extraction walks an ordered list of
//! patterns and the first match wins.

use once_cell::sync::Lazy;
use regex::Regex;

use super::models::{EpisodeIdentity, SeriesRef};
use super::title::normalize;

struct EpisodePattern {
    regex: Regex,
    /// Pattern only captures the episode; season defaults to 1.
    season_less: bool,
}

impl EpisodePattern {
    fn new(pattern: &str, season_less: bool) -> Self {
        Self {
            regex: Regex::new(pattern).unwrap(),
            season_less,
        }
    }

    fn captures(&self, path: &str) -> Option<(u32, u32)> {
        let caps = self.regex.captures(path)?;
        if self.season_less {
            let episode = caps.get(1)?.as_str().parse().ok()?;
            return Some((1, episode));
        }
        let season = caps.get(1)?.as_str().parse().ok()?;
        let episode = caps.get(2)?.as_str().parse().ok()?;
        Some((season, episode))
    }
}

// s1e2, s01e02, S1E02, S01EP02
const SXXEXX: &str = r"[sS](\d{1,2})[eE][pP]?(\d{1,2})";
// 1x2, 01x02
const NXNN: &str = r"(\d{1,2})x(\d{1,2})";
// E02
const EXX: &str = r"E(\d{2})";

static PATTERNS: Lazy<Vec<EpisodePattern>> = Lazy::new(|| {
    vec![
        EpisodePattern::new(SXXEXX, false),
        EpisodePattern::new(NXNN, false),
    ]
});

static SERIES_PATTERNS: Lazy<Vec<EpisodePattern>> = Lazy::new(|| {
    vec![
        EpisodePattern::new(SXXEXX, false),
        EpisodePattern::new(NXNN, false),
        EpisodePattern::new(EXX, true),
    ]
});

fn first_match(patterns: &[EpisodePattern], path: &str) -> Option<(u32, u32)> {
    patterns.iter().find_map(|pattern| pattern.captures(path))
}

/// True when the normalized `title` appears in `path` (case-insensitive),
/// either as-is or with its spaces replaced by dots.
pub fn path_contains_series(path: &str, title: &str) -> bool {
    let title = normalize(title).to_lowercase();
    if title.is_empty() {
        return false;
    }
    let path = path.to_lowercase();
    path.contains(&title) || path.contains(&title.replace(' ', "."))
}

/// `(season, episode)` from the first pattern that matches `path`.
pub fn extract_season_episode(path: &str) -> Option<(u32, u32)> {
    first_match(&PATTERNS, path)
}

/// Like [`extract_season_episode`] but also accepts a bare `E02`, which is
/// only safe once the series is already known.
pub fn extract_season_episode_for_series(path: &str) -> Option<(u32, u32)> {
    first_match(&SERIES_PATTERNS, path)
}

/// The first series in `series_list` whose title occurs in `path` and for
/// which an episode number can be extracted. No disambiguation is attempted.
pub fn match_against_known_series(path: &str, series_list: &[SeriesRef]) -> Option<EpisodeIdentity> {
    series_list
        .iter()
        .filter(|series| path_contains_series(path, &series.name))
        .find_map(|series| {
            extract_season_episode(path)
                .map(|(season, episode)| EpisodeIdentity::new(series, season, episode))
        })
}

/// Identity of `path` for a single already-known series.
pub fn match_series(path: &str, series: &SeriesRef) -> Option<EpisodeIdentity> {
    if !path_contains_series(path, &series.name) {
        return None;
    }
    extract_season_episode_for_series(path)
        .map(|(season, episode)| EpisodeIdentity::new(series, season, episode))
}
