use regex::{Regex, RegexBuilder};

/// Filename episode numbering rules, evaluated in order.
pub const EPISODE_RULES: &[(&str, &str)] = &[
    ("s00e00", r"S\d{1,2}\.?E\d{2}"),
    ("s00_e00", r"S\d{2}\s+E\d{2}"),
    ("s00_00", r"\bS\d{1,2}\s*\d{2}\b"),
    ("0x00", r"\b[1-9][0-9]?x[0-9]{1,2}\b"),
    ("00e00", r"\b\d{1,2}e\d{2,3}\b"),
    ("episode_00", r"\bepisode[\s._-]*\d{1,3}\b"),
    ("ep_00", r"\bep\.?\s*\d{1,3}\b"),
    ("dash_number", r"\s-\s*\d+[[:alnum:]]*"),
    ("season_dash", r"Season_-\d{2}"),
    ("season_word", r"\bSeason[\s._]?\d+\b"),
    ("e00", r"\bE\d{1,3}\b"),
    ("series_of", r"series\.\d+\.\d+of\d+"),
    ("00x00", r"\b\d{2}x\d{2}\b"),
    ("bracketed_season", r"\(S\d{1,2}\)"),
    ("mini_series", r"MINI[- ]?SERIES"),
];

pub const MINI_SERIES_RULE: &str = r"MINI[- ]?SERIES";

/// Anime-style absolute numbering: `Title - 01 ` or `Title 01v2`.
pub const ANIME_EPISODE_RULE: &str = r"\s-\s\d{2,3}\s|\d{2,3}v\d+";

/// Curated title patterns for common anime release groups and encodes.
pub const ANIME_TITLE_RULES: &[&str] = &[
    r"^\[(?:SubsPlease|Erai-raws|HorribleSubs|Judas|EMBER|ASW|Commie|Coalgirls|GJM|Kametsu|Anime Time|DKB|Golumpa)\]",
    r"\bHi10P?\b",
];

/// Season signals searched in the full source path.
pub const SEASON_PATH_RULE: &str = r"\bs\d{2}\b";

/// Season signals matched against whole directory names.
pub const SEASON_FOLDER_RULE: &str = r"^season[\s._-]*\d{1,3}$";

/// Matches hash-like basenames such as `d41d8cd98f00b204e9800998ecf8427e.mkv`.
pub const HASH_NAME_RULE: &str = r"^[a-f0-9]{32}(\.[^.]+$|\[.+?\]\.)";

pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// `dash_number` matches only a bare two or three digit token. Resolutions,
/// years, bitrates and bit depths after a dash are not episode numbers.
pub fn accept(rule: &str, matched: &str) -> bool {
    if rule != "dash_number" {
        return true;
    }
    let token = matched.trim_start().trim_start_matches('-').trim_start();
    (2..=3).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rules_compile() {
        for (name, pattern) in EPISODE_RULES {
            assert!(compile(pattern).is_ok(), "rule {} does not compile", name);
        }
        for pattern in ANIME_TITLE_RULES {
            assert!(compile(pattern).is_ok());
        }
    }

    #[test]
    fn test_dash_number_guard() {
        assert!(accept("dash_number", " - 12"));
        assert!(accept("dash_number", " -104"));
        assert!(!accept("dash_number", " - 1080p"));
        assert!(!accept("dash_number", " - 2019"));
        assert!(!accept("dash_number", " - 320Kbps"));
        assert!(!accept("dash_number", " - 10bit"));
        assert!(accept("s00e00", "S01E02"));
    }
}
