//! Title, year and kind normalization shared by the catalog sources.
//!
//! Collection names produced here must stay byte-identical across releases:
//! existing collections are found by exact name.

use emby_sync_models::MediaKind;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static BLANK_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\-—–]*$").expect("blank title regex should compile"));
static FOUR_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").expect("year regex should compile"));
static DOULIST_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"年份:\s*(\d{4})").expect("doulist year regex should compile"));
static DOULIST_GENRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"类型:\s*([^<]+)").expect("doulist genre regex should compile"));
static SEASON_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" 第[一二三四五六七八九十\d]+季").expect("season regex should compile"));
static COLLECTION_SPECIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[【】·｜。▧~➠❍★❶*+?!@#$%^&()\[\]{}\\|<>,;:'"`]"#).expect("specials regex should compile")
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

const FALLBACK_COLLECTION_NAME: &str = "默认合集";

/// Exact-match title substitutions, e.g. to fix upstream spelling variants.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new(aliases: BTreeMap<String, String>) -> Self {
        Self { aliases }
    }

    pub fn apply(&self, title: &str) -> String {
        self.aliases.get(title).cloned().unwrap_or_else(|| title.to_string())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Empty titles and separator rows made only of spaces and dashes.
pub fn is_blank_title(raw: &str) -> bool {
    raw.trim().is_empty() || BLANK_TITLE.is_match(raw)
}

/// First whitespace-delimited token of the trimmed title.
pub fn first_token(raw: &str) -> &str {
    raw.split_whitespace().next().unwrap_or("")
}

/// First run of four digits anywhere in `field`.
pub fn first_year(field: &str) -> Option<u32> {
    FOUR_DIGITS.find(field).and_then(|m| m.as_str().parse().ok())
}

/// `年份: 2019` inside a doulist item description.
pub fn doulist_year(description: &str) -> Option<u32> {
    DOULIST_YEAR
        .captures(description)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Kind from the `类型:` genre line of a doulist description. Movie unless
/// the genres say TV and nothing says film.
pub fn doulist_kind(description: &str) -> MediaKind {
    let Some(genres) = DOULIST_GENRE.captures(description).and_then(|c| c.get(1)) else {
        return MediaKind::Movie;
    };
    let genres = genres.as_str().trim();
    if ["剧情", "电影", "爱情", "同性"].iter().any(|g| genres.contains(g)) {
        MediaKind::Movie
    } else if genres.contains("电视剧") || genres.contains("剧集") {
        MediaKind::Series
    } else {
        MediaKind::Movie
    }
}

/// Kind from a weekly chart item's `type` field; `None` for books.
pub fn chart_kind(type_field: Option<&str>) -> Option<MediaKind> {
    match type_field.map(str::trim) {
        Some("book") => None,
        Some("tv") => Some(MediaKind::Series),
        _ => Some(MediaKind::Movie),
    }
}

/// Removes every ` 第N季` season marker.
pub fn strip_season_suffix(title: &str) -> String {
    SEASON_MARKER.replace_all(title, "").into_owned()
}

/// Strips the decorative characters list curators like to put in titles.
pub fn clean_collection_title(title: &str) -> String {
    let stripped = COLLECTION_SPECIALS.replace_all(title, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");
    if collapsed.is_empty() {
        FALLBACK_COLLECTION_NAME.to_string()
    } else {
        collapsed.into_owned()
    }
}

/// Season stripping (series only) followed by alias substitution.
pub fn finish_title(title: &str, kind: MediaKind, aliases: &AliasTable) -> String {
    let title = title.trim();
    match kind {
        MediaKind::Series => aliases.apply(&strip_season_suffix(title)),
        MediaKind::Movie => aliases.apply(title),
    }
}
