//! Movie / show / anime classification from names and paths.
//!
//! Decision order, first match wins:
//! 1. an explicit `force_show` / `force_movie` flag
//! 2. a hash-like basename without identifiers is rejected
//! 3. a season signal anywhere in the path
//! 4. an episode numbering rule or mini-series marker in the basename
//! 5. an anime numbering rule or anime title rule
//! 6. otherwise a movie

pub mod eligibility;
pub mod patterns;

use crate::error::Error;
use crate::outcome::SkipReason;
use regex::Regex;
use std::path::{Component, Path};

/// The raw episode rule hit, forwarded to the resolver for season/episode extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub rule: String,
    pub matched: String,
    /// Text before the match; usually the show title.
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Movie,
    Show { episode: Option<PatternMatch> },
    AnimeShow { episode: Option<PatternMatch> },
    Rejected(SkipReason),
}

impl Classification {
    pub fn is_show(&self) -> bool {
        matches!(
            self,
            Classification::Show { .. } | Classification::AnimeShow { .. }
        )
    }

    pub fn episode_match(&self) -> Option<&PatternMatch> {
        match self {
            Classification::Show { episode } | Classification::AnimeShow { episode } => {
                episode.as_ref()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyFlags {
    pub force_show: bool,
    pub force_movie: bool,
    pub has_identifiers: bool,
}

#[derive(Debug)]
struct PatternRule {
    name: String,
    regex: Regex,
}

#[derive(Debug)]
pub struct Classifier {
    episode_rules: Vec<PatternRule>,
    mini_series: Regex,
    anime_episode: Regex,
    anime_titles: Vec<Regex>,
    season_path: Regex,
    season_folder: Regex,
    hash_name: Regex,
}

impl Classifier {
    /// Build the rule set; `extra_anime_patterns` are appended after the curated anime titles.
    pub fn new(extra_anime_patterns: &[String]) -> Result<Self, Error> {
        let episode_rules = patterns::EPISODE_RULES
            .iter()
            .map(|(name, pattern)| {
                Ok(PatternRule {
                    name: name.to_string(),
                    regex: patterns::compile(pattern)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let anime_titles = patterns::ANIME_TITLE_RULES
            .iter()
            .copied()
            .chain(extra_anime_patterns.iter().map(|s| s.as_str()))
            .map(patterns::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Classifier {
            episode_rules,
            mini_series: patterns::compile(patterns::MINI_SERIES_RULE)?,
            anime_episode: patterns::compile(patterns::ANIME_EPISODE_RULE)?,
            anime_titles,
            season_path: patterns::compile(patterns::SEASON_PATH_RULE)?,
            season_folder: patterns::compile(patterns::SEASON_FOLDER_RULE)?,
            hash_name: patterns::compile(patterns::HASH_NAME_RULE)?,
        })
    }

    pub fn is_hash_name(&self, file_name: &str) -> bool {
        self.hash_name.is_match(file_name)
    }

    /// First episode rule hit in `file_name`.
    pub fn episode_match(&self, file_name: &str) -> Option<PatternMatch> {
        self.episode_rules.iter().find_map(|rule| {
            rule.regex
                .find_iter(file_name)
                .find(|m| patterns::accept(&rule.name, m.as_str()))
                .map(|m| PatternMatch {
                    rule: rule.name.clone(),
                    matched: m.as_str().to_string(),
                    prefix: file_name[..m.start()].to_string(),
                })
        })
    }

    pub fn has_season_signal(&self, path: &Path) -> bool {
        if self.season_path.is_match(&path.to_string_lossy()) {
            return true;
        }
        path.parent()
            .map(|parent| {
                parent.components().any(|c| match c {
                    Component::Normal(name) => self.season_folder.is_match(&name.to_string_lossy()),
                    _ => false,
                })
            })
            .unwrap_or(false)
    }

    pub fn classify(&self, file_name: &str, path: &Path, flags: ClassifyFlags) -> Classification {
        if flags.force_show {
            return Classification::Show {
                episode: self.episode_match(file_name),
            };
        }
        if flags.force_movie {
            return Classification::Movie;
        }

        if !flags.has_identifiers && self.is_hash_name(file_name) {
            return Classification::Rejected(SkipReason::MissingIdentifiersOnHashFile);
        }

        let episode = self.episode_match(file_name);

        if self.has_season_signal(path) {
            return Classification::Show { episode };
        }

        if episode.is_some() || self.mini_series.is_match(file_name) {
            return Classification::Show { episode };
        }

        if let Some(m) = self.anime_episode.find(file_name) {
            return Classification::AnimeShow {
                episode: Some(PatternMatch {
                    rule: "anime_episode".to_string(),
                    matched: m.as_str().to_string(),
                    prefix: file_name[..m.start()].to_string(),
                }),
            };
        }
        if self.anime_titles.iter().any(|re| re.is_match(file_name)) {
            return Classification::AnimeShow { episode: None };
        }

        Classification::Movie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(path: &str, flags: ClassifyFlags) -> Classification {
        let classifier = Classifier::new(&[]).unwrap();
        let path = Path::new(path);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        classifier.classify(&name, path, flags)
    }

    #[test]
    fn test_episode_code_is_show() {
        match classify("/src/Show.Name.S01E02.mkv", ClassifyFlags::default()) {
            Classification::Show { episode: Some(m) } => {
                assert_eq!(m.rule, "s00e00");
                assert_eq!(m.matched, "S01E02");
                assert_eq!(m.prefix, "Show.Name.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_plain_movie() {
        assert_eq!(
            classify("/src/Inception.2010.1080p.BluRay.mkv", ClassifyFlags::default()),
            Classification::Movie
        );
        assert_eq!(
            classify("/src/The Matrix (1999) - 1080p.mkv", ClassifyFlags::default()),
            Classification::Movie
        );
    }

    #[test]
    fn test_season_folder_takes_precedence() {
        let path = "/src/Some Show/Season 2/Some Show Pilot.mkv";
        assert!(classify(path, ClassifyFlags::default()).is_show());
        assert!(classify("/src/Some.Show.S02/pilot.mkv", ClassifyFlags::default()).is_show());

        let forced = ClassifyFlags {
            force_movie: true,
            ..ClassifyFlags::default()
        };
        assert_eq!(classify(path, forced), Classification::Movie);
    }

    #[test]
    fn test_force_show_overrides_movie_name() {
        let flags = ClassifyFlags {
            force_show: true,
            ..ClassifyFlags::default()
        };
        assert!(classify("/src/Inception.2010.mkv", flags).is_show());
    }

    #[test]
    fn test_hash_name_rejected_without_identifiers() {
        assert_eq!(
            classify("/src/d41d8cd98f00b204e9800998ecf8427e.mkv", ClassifyFlags::default()),
            Classification::Rejected(SkipReason::MissingIdentifiersOnHashFile)
        );
        let flags = ClassifyFlags {
            has_identifiers: true,
            ..ClassifyFlags::default()
        };
        assert_eq!(
            classify("/src/d41d8cd98f00b204e9800998ecf8427e.mkv", flags),
            Classification::Movie
        );
    }

    #[test]
    fn test_episode_rule_variants() {
        for path in [
            "/src/Show 1x05.mkv",
            "/src/Show Episode 07.mkv",
            "/src/Show - 104.mkv",
            "/src/Band of Brothers MINISERIES Part 3.mkv",
            "/src/Show (S02) Part.mkv",
        ] {
            assert!(classify(path, ClassifyFlags::default()).is_show(), "{}", path);
        }
    }

    #[test]
    fn test_anime_rules() {
        assert!(matches!(
            classify("/src/Frieren 12v2.mkv", ClassifyFlags::default()),
            Classification::AnimeShow { .. }
        ));
        assert!(matches!(
            classify("/src/[SubsPlease] Frieren 12 (1080p).mkv", ClassifyFlags::default()),
            Classification::AnimeShow { episode: None }
        ));
    }

    #[test]
    fn test_extra_anime_patterns_are_appended() {
        let classifier = Classifier::new(&[r"^\[MyGroup\]".to_string()]).unwrap();
        let name = "[MyGroup] Title.mkv";
        assert!(matches!(
            classifier.classify(name, Path::new("/src/[MyGroup] Title.mkv"), ClassifyFlags::default()),
            Classification::AnimeShow { .. }
        ));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = Classifier::new(&[]).unwrap();
        let path = Path::new("/src/Show.Name.S01E02.mkv");
        let first = classifier.classify("Show.Name.S01E02.mkv", path, ClassifyFlags::default());
        for _ in 0..10 {
            assert_eq!(
                classifier.classify("Show.Name.S01E02.mkv", path, ClassifyFlags::default()),
                first
            );
        }
    }
}
