use super::{MetadataResolver, ResolveContext, Resolution};
use crate::classifier::{Classification, PatternMatch};
use crate::error::Error;
use crate::task::SourceFile;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap();
    static ref QUALITY: Regex = Regex::new(
        r"(?i)\b(2160p|1080p|720p|480p|bluray|blu-ray|web-?dl|webrip|hdtv|dvdrip|x264|x265|h\.?264|hevc|remux)\b"
    )
    .unwrap();
    static ref RELEASE_GROUP: Regex = Regex::new(r"^\s*\[[^\]]*\]\s*").unwrap();
    static ref BRACKETED: Regex = Regex::new(r"[\[(][^\])]*[\])]").unwrap();
    static ref SEASON_EPISODE: Regex = Regex::new(r"(?i)s(\d{1,2})[.\s]*e(\d{1,3})").unwrap();
    static ref NUMBER_X_NUMBER: Regex = Regex::new(r"(?i)(\d{1,2})x(\d{1,3})").unwrap();
    static ref SEASON_ONLY: Regex = Regex::new(r"(?i)(?:season[\s._-]*|\bs)(\d{1,3})").unwrap();
    static ref TRAILING_NUMBER: Regex = Regex::new(r"(\d{1,3})\D*$").unwrap();
    static ref SEASON_FOLDER: Regex = Regex::new(r"(?i)^(?:season[\s._-]*|s)(\d{1,3})$").unwrap();
    static ref EXTRAS_FOLDER: Regex = Regex::new(
        r"(?i)^(extras?|featurettes?|behind[\s._-]?the[\s._-]?scenes?|deleted[\s._-]?scenes?|interviews?|trailers?|shorts?|bonus|special[\s._-]?features?)$"
    )
    .unwrap();
}

/// Derives destinations from file and folder names without a catalog lookup.
///
/// Movies land in `Movies/Title (Year)/`, shows in `Shows/<Show>/Season NN/`
/// and anime in `Anime/<Show>/Season NN/`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilenameResolver;

impl FilenameResolver {
    pub fn new() -> Self {
        FilenameResolver
    }

    fn resolve_movie(&self, source: &SourceFile, ctx: &ResolveContext<'_>) -> Option<Resolution> {
        let stem = file_stem(&source.file_name);
        let (title, year) = movie_title_and_year(stem)?;
        let canonical_id = ctx.identifiers.canonical();

        let mut folder = match year {
            Some(year) => format!("{} ({})", title, year),
            None => title.clone(),
        };
        if ctx.settings.tmdb_folder_id {
            if let Some(id) = canonical_id.as_deref().filter(|id| id.starts_with("tmdb-")) {
                folder = format!("{} {{{}}}", folder, id);
            }
        }

        let file_name = if ctx.settings.rename_enabled {
            let base = match year {
                Some(year) => format!("{} ({})", title, year),
                None => title,
            };
            with_extension(&base, &source.file_name)
        } else {
            source.file_name.clone()
        };

        let is_extra = is_extras_folder(&source.parent_dir);
        let mut destination = ctx.dest_root.join("Movies").join(folder);
        if is_extra {
            destination.push("Extras");
        }
        destination.push(file_name);

        Some(Resolution {
            destination,
            canonical_id,
            season: None,
            is_extra,
        })
    }

    fn resolve_show(
        &self,
        source: &SourceFile,
        ctx: &ResolveContext<'_>,
        episode_match: Option<&PatternMatch>,
        anime: bool,
    ) -> Option<Resolution> {
        let show = show_title(source, episode_match)?;
        let (parsed_season, parsed_episode) = episode_match
            .map(season_and_episode)
            .unwrap_or((None, None));
        let season = ctx
            .season
            .or(parsed_season)
            .or_else(|| season_from_path(&source.path))
            .unwrap_or(1);
        let episode = ctx.episode.or(parsed_episode);
        let canonical_id = ctx.identifiers.canonical();

        let mut show_folder = show.clone();
        if ctx.settings.tmdb_folder_id {
            if let Some(id) = canonical_id.as_deref().filter(|id| id.starts_with("tmdb-")) {
                show_folder = format!("{} {{{}}}", show_folder, id);
            }
        }

        let is_extra = is_extras_folder(&source.parent_dir);
        let mut destination = ctx
            .dest_root
            .join(if anime { "Anime" } else { "Shows" })
            .join(show_folder);
        if is_extra {
            destination.push("Extras");
            destination.push(&source.file_name);
            return Some(Resolution {
                destination,
                canonical_id,
                season: None,
                is_extra,
            });
        }

        destination.push(format!("Season {:02}", season));
        let file_name = match (ctx.settings.rename_enabled, episode) {
            (true, Some(episode)) => with_extension(
                &format!("{} - S{:02}E{:02}", show, season, episode),
                &source.file_name,
            ),
            _ => source.file_name.clone(),
        };
        destination.push(file_name);

        Some(Resolution {
            destination,
            canonical_id,
            season: Some(season),
            is_extra,
        })
    }
}

impl MetadataResolver for FilenameResolver {
    fn resolve(
        &self,
        source: &SourceFile,
        context: &ResolveContext<'_>,
    ) -> Result<Option<Resolution>, Error> {
        Ok(match context.classification {
            Classification::Movie => self.resolve_movie(source, context),
            Classification::Show { episode } => {
                self.resolve_show(source, context, episode.as_ref(), false)
            }
            Classification::AnimeShow { episode } => {
                self.resolve_show(source, context, episode.as_ref(), true)
            }
            Classification::Rejected(_) => None,
        })
    }
}

fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

fn with_extension(base: &str, original: &str) -> String {
    match Path::new(original).extension() {
        Some(ext) => format!("{}.{}", base, ext.to_string_lossy()),
        None => base.to_string(),
    }
}

fn clean_title(raw: &str) -> String {
    let without_group = RELEASE_GROUP.replace(raw, "");
    let without_brackets = BRACKETED.replace_all(&without_group, " ");
    let spaced: String = without_brackets
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect();
    spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string()
}

fn movie_title_and_year(stem: &str) -> Option<(String, Option<u32>)> {
    // The last year wins so that titles like "2001 A Space Odyssey 1968" keep their number.
    let year_match = YEAR.find_iter(stem).filter(|m| m.start() > 0).last();
    let cut = match (year_match, QUALITY.find(stem)) {
        (Some(year), _) => year.start(),
        (None, Some(quality)) => quality.start(),
        (None, None) => stem.len(),
    };
    let title = clean_title(&stem[..cut]);
    if title.is_empty() {
        return None;
    }
    let year = year_match.and_then(|m| m.as_str().parse().ok());
    Some((title, year))
}

fn show_title(source: &SourceFile, episode_match: Option<&PatternMatch>) -> Option<String> {
    if let Some(m) = episode_match {
        let title = clean_title(&m.prefix);
        if !title.is_empty() {
            return Some(title);
        }
    }

    let mut dirs = source
        .path
        .parent()
        .map(|parent| {
            parent
                .components()
                .rev()
                .filter_map(|c| match c {
                    Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
        .into_iter();
    let title = dirs
        .find(|name| !SEASON_FOLDER.is_match(name) && !is_extras_folder(name))
        .map(|name| clean_title(&name))
        .unwrap_or_else(|| clean_title(file_stem(&source.file_name)));
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

fn season_and_episode(m: &PatternMatch) -> (Option<u32>, Option<u32>) {
    if let Some(c) = SEASON_EPISODE.captures(&m.matched) {
        return (c[1].parse().ok(), c[2].parse().ok());
    }
    if let Some(c) = NUMBER_X_NUMBER.captures(&m.matched) {
        return (c[1].parse().ok(), c[2].parse().ok());
    }
    let season = SEASON_ONLY
        .captures(&m.matched)
        .and_then(|c| c[1].parse().ok());
    let episode = match m.rule.as_str() {
        "episode_00" | "ep_00" | "dash_number" | "e00" | "anime_episode" => TRAILING_NUMBER
            .captures(m.matched.split('v').next().unwrap_or(&m.matched))
            .and_then(|c| c[1].parse().ok()),
        _ => None,
    };
    (season, episode)
}

fn season_from_path(path: &Path) -> Option<u32> {
    path.parent()?.components().rev().find_map(|c| match c {
        Component::Normal(name) => SEASON_FOLDER
            .captures(&name.to_string_lossy())
            .and_then(|c| c[1].parse().ok()),
        _ => None,
    })
}

fn is_extras_folder(name: &str) -> bool {
    EXTRAS_FOLDER.is_match(name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, ClassifyFlags};
    use crate::task::{Identifiers, LinkSettings};

    fn resolve(path: &str, settings: LinkSettings, ids: &Identifiers) -> Option<Resolution> {
        let classifier = Classifier::new(&[]).unwrap();
        let source = SourceFile::new(Path::new(path));
        let classification =
            classifier.classify(&source.file_name, &source.path, ClassifyFlags::default());
        let ctx = ResolveContext {
            classification: &classification,
            dest_root: Path::new("/dest"),
            actual_dir: "src",
            settings,
            identifiers: ids,
            season: None,
            episode: None,
            auto_select: true,
        };
        FilenameResolver::new().resolve(&source, &ctx).unwrap()
    }

    fn renaming() -> LinkSettings {
        LinkSettings {
            rename_enabled: true,
            tmdb_folder_id: true,
            skip_extras: false,
        }
    }

    #[test]
    fn test_show_episode_destination() {
        let res = resolve("/src/Show.Name.S01E02.mkv", renaming(), &Identifiers::default()).unwrap();
        assert_eq!(
            res.destination,
            PathBuf::from("/dest/Shows/Show Name/Season 01/Show Name - S01E02.mkv")
        );
        assert_eq!(res.season, Some(1));
        assert!(!res.is_extra);
    }

    #[test]
    fn test_movie_with_tmdb_folder_id() {
        let ids = Identifiers {
            tmdb: Some(27205),
            ..Identifiers::default()
        };
        let res = resolve("/src/Inception.2010.1080p.BluRay.x264.mkv", renaming(), &ids).unwrap();
        assert_eq!(
            res.destination,
            PathBuf::from("/dest/Movies/Inception (2010) {tmdb-27205}/Inception (2010).mkv")
        );
        assert_eq!(res.canonical_id.as_deref(), Some("tmdb-27205"));
    }

    #[test]
    fn test_movie_keeps_original_name_without_rename() {
        let settings = LinkSettings {
            rename_enabled: false,
            tmdb_folder_id: false,
            skip_extras: false,
        };
        let res = resolve("/src/The.Matrix.1999.mkv", settings, &Identifiers::default()).unwrap();
        assert_eq!(
            res.destination,
            PathBuf::from("/dest/Movies/The Matrix (1999)/The.Matrix.1999.mkv")
        );
    }

    #[test]
    fn test_season_folder_show_uses_folder_names() {
        let res = resolve(
            "/src/Some Show/Season 2/Pilot.mkv",
            renaming(),
            &Identifiers::default(),
        )
        .unwrap();
        assert_eq!(
            res.destination,
            PathBuf::from("/dest/Shows/Some Show/Season 02/Pilot.mkv")
        );
        assert_eq!(res.season, Some(2));
    }

    #[test]
    fn test_extras_folder_detected() {
        let res = resolve(
            "/src/Inception (2010)/Featurettes/Making.Of.2010.mkv",
            renaming(),
            &Identifiers::default(),
        )
        .unwrap();
        assert!(res.is_extra);
    }
}
