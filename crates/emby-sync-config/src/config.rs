use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::paths::PathManager;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub rsshub: RsshubConfig,
    #[serde(default)]
    pub importers: ImporterConfig,
    /// Exact title substitutions applied to every catalog entry.
    #[serde(default = "default_alias_table")]
    pub name_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    #[serde(default)]
    pub run: RunOptions,
    #[serde(default)]
    pub genre_mapper: GenreMapperConfig,
    /// Localized genre name -> the English genre the server's metadata carries.
    #[serde(default)]
    pub genre_mapping: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    pub api_key: String,
    /// Required for `ignore_played`, which filters searches to unplayed items.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub ignore_played: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_proxy_url")]
    pub http: String,
    #[serde(default = "default_proxy_url")]
    pub https: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            http: default_proxy_url(),
            https: default_proxy_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsshubConfig {
    #[serde(default = "default_rsshub_url")]
    pub url: String,
}

impl Default for RsshubConfig {
    fn default() -> Self {
        Self { url: default_rsshub_url() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImporterConfig {
    #[serde(default)]
    pub hotmovie: HotMovieConfig,
    #[serde(default)]
    pub doulist: DoulistConfig,
    #[serde(default)]
    pub bangumi: BangumiConfig,
}

/// Douban weekly charts served through RSSHub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotMovieConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub rss_ids: Vec<String>,
    #[serde(default)]
    pub substring_match: bool,
}

impl Default for HotMovieConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rss_ids: Vec::new(),
            substring_match: false,
        }
    }
}

/// User curated Douban lists served through RSSHub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoulistConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub doulist_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub substring_match: bool,
}

impl Default for DoulistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            doulist_ids: Vec::new(),
            substring_match: true,
        }
    }
}

/// The bgm.tv airing calendar, folded into a single collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BangumiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bangumi_collection")]
    pub collection_name: String,
    #[serde(default = "default_bangumi_api")]
    pub api_url: String,
    #[serde(default)]
    pub substring_match: bool,
}

impl Default for BangumiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            collection_name: default_bangumi_collection(),
            api_url: default_bangumi_api(),
            substring_match: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub csv_enabled: bool,
    /// Falls back to the data directory when unset.
    #[serde(default)]
    pub csv_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Standard 5-field cron expression. Takes precedence over the interval.
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub interval_minutes: Option<u64>,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub dry_run: bool,
    /// Run enabled importers concurrently instead of one after another.
    #[serde(default = "default_true")]
    pub concurrent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreMapperConfig {
    /// Libraries (as named in the server's library settings) to rewrite.
    #[serde(default)]
    pub library_names: Vec<String>,
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

impl Default for GenreMapperConfig {
    fn default() -> Self {
        Self {
            library_names: Vec::new(),
            dry_run: true,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrent: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_proxy_url() -> String {
    "http://127.0.0.1:7890".to_string()
}

fn default_rsshub_url() -> String {
    "https://rsshub.app".to_string()
}

fn default_bangumi_collection() -> String {
    "✨当季新番".to_string()
}

fn default_bangumi_api() -> String {
    "https://api.bgm.tv/calendar".to_string()
}

pub fn default_alias_table() -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    aliases.insert("7号房的礼物".to_string(), "七号房的礼物".to_string());
    aliases
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: None,
            interval_minutes: Some(60 * 6),
            run_on_startup: true,
        }
    }
}

impl Config {
    /// A config that only knows how to reach the server; everything else defaulted.
    pub fn with_server(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                url: url.into(),
                api_key: api_key.into(),
                user_id: None,
                ignore_played: false,
                timeout_secs: default_timeout_secs(),
            },
            proxy: ProxyConfig::default(),
            rsshub: RsshubConfig::default(),
            importers: ImporterConfig::default(),
            name_mapping: default_alias_table(),
            output: OutputConfig::default(),
            scheduler: None,
            run: RunOptions::default(),
            genre_mapper: GenreMapperConfig::default(),
            genre_mapping: BTreeMap::new(),
        }
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.url.trim().is_empty() {
            return Err(anyhow::anyhow!("server.url is required"));
        }
        if !self.server.url.starts_with("http://") && !self.server.url.starts_with("https://") {
            return Err(anyhow::anyhow!("server.url must start with http:// or https://"));
        }
        if self.server.api_key.is_empty() || self.server.api_key == "YOUR_API_KEY" {
            return Err(anyhow::anyhow!("server.api_key is not configured"));
        }
        if self.server.timeout_secs == 0 {
            return Err(anyhow::anyhow!("server.timeout_secs must be positive"));
        }
        if self.server.ignore_played && self.server.user_id.as_deref().map_or(true, str::is_empty) {
            return Err(anyhow::anyhow!("server.ignore_played requires server.user_id"));
        }

        let importers = &self.importers;
        if (importers.hotmovie.enabled || importers.doulist.enabled) && self.rsshub.url.trim().is_empty() {
            return Err(anyhow::anyhow!("rsshub.url is required by the enabled importers"));
        }
        if importers.hotmovie.enabled && importers.hotmovie.rss_ids.is_empty() {
            return Err(anyhow::anyhow!("importers.hotmovie is enabled but rss_ids is empty"));
        }
        if importers.doulist.enabled && importers.doulist.doulist_ids.is_empty() {
            return Err(anyhow::anyhow!("importers.doulist is enabled but doulist_ids is empty"));
        }
        if importers.bangumi.enabled && importers.bangumi.collection_name.trim().is_empty() {
            return Err(anyhow::anyhow!("importers.bangumi.collection_name cannot be empty"));
        }

        if let Some(scheduler) = &self.scheduler {
            if scheduler.enabled && scheduler.cron.is_none() && scheduler.interval_minutes.is_none() {
                return Err(anyhow::anyhow!("scheduler needs either cron or interval_minutes"));
            }
            if scheduler.interval_minutes == Some(0) {
                return Err(anyhow::anyhow!("scheduler.interval_minutes must be positive"));
            }
            if let Some(cron) = &scheduler.cron {
                let fields = cron.split_whitespace().count();
                if fields != 5 && fields != 6 {
                    return Err(anyhow::anyhow!("scheduler.cron must have 5 or 6 fields, got {}", fields));
                }
            }
        }

        Ok(())
    }

    /// Checks the settings `embysync genres` needs on top of [`Config::validate`].
    pub fn validate_genre_mapper(&self) -> anyhow::Result<()> {
        if self.genre_mapper.library_names.iter().all(|n| n.trim().is_empty()) {
            return Err(anyhow::anyhow!("genre_mapper.library_names is empty"));
        }
        if self.genre_mapping.is_empty() {
            return Err(anyhow::anyhow!("genre_mapping has no entries"));
        }
        if self.server.user_id.as_deref().map_or(true, str::is_empty) {
            return Err(anyhow::anyhow!("genre mapping requires server.user_id"));
        }
        Ok(())
    }

    /// Where the missing-items report lives: `output.csv_file`, else the data directory.
    pub fn missing_report_path(&self, paths: &PathManager) -> PathBuf {
        self.output
            .csv_file
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| paths.missing_report_file())
    }

    /// User scoping applies only when played items should be hidden.
    pub fn search_user_id(&self) -> Option<&str> {
        if self.server.ignore_played {
            self.server.user_id.as_deref().filter(|u| !u.is_empty())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample() -> Config {
        let mut config = Config::with_server("http://emby.local:8096", "secret");
        config.importers.hotmovie.rss_ids = vec!["movie_real_time_hotest".to_string()];
        config
    }

    #[test]
    fn test_config_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let mut config = sample();
        config.name_mapping.insert("Old".to_string(), "New".to_string());
        config.scheduler = Some(SchedulerConfig {
            cron: Some("0 3 * * *".to_string()),
            ..SchedulerConfig::default()
        });

        config.save_to_file(file.path()).unwrap();
        let loaded = Config::load_from_file(file.path()).unwrap();

        assert_eq!(loaded.server.api_key, "secret");
        assert_eq!(loaded.importers.hotmovie.rss_ids, vec!["movie_real_time_hotest"]);
        assert_eq!(loaded.name_mapping.get("Old").map(String::as_str), Some("New"));
        assert_eq!(loaded.name_mapping.get("7号房的礼物").map(String::as_str), Some("七号房的礼物"));
        assert_eq!(loaded.scheduler.unwrap().cron.as_deref(), Some("0 3 * * *"));
    }

    #[test]
    fn test_minimal_file_gets_defaults() {
        let toml = r#"
            [server]
            url = "http://emby:8096"
            api_key = "abc"
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.timeout_secs, 30);
        assert!(config.importers.hotmovie.enabled);
        assert!(!config.importers.doulist.enabled);
        assert!(config.importers.doulist.substring_match);
        assert!(!config.importers.hotmovie.substring_match);
        assert_eq!(config.importers.bangumi.collection_name, "✨当季新番");
        assert!(config.name_mapping.contains_key("7号房的礼物"));
        assert!(!config.run.dry_run);
    }

    #[test]
    fn test_config_validate() {
        let mut config = sample();
        assert!(config.validate().is_ok());

        config.server.api_key = "YOUR_API_KEY".to_string();
        assert!(config.validate().is_err());
        config.server.api_key = "secret".to_string();

        config.importers.hotmovie.rss_ids.clear();
        assert!(config.validate().is_err());
        config.importers.hotmovie.enabled = false;
        assert!(config.validate().is_ok());

        config.server.ignore_played = true;
        assert!(config.validate().is_err());
        config.server.user_id = Some("u1".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.search_user_id(), Some("u1"));

        config.scheduler = Some(SchedulerConfig {
            cron: None,
            interval_minutes: None,
            ..SchedulerConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_genre_mapper_section() {
        let toml = r#"
            [server]
            url = "http://emby:8096"
            api_key = "abc"

            [genre_mapper]
            library_names = ["电影", "剧集"]

            [genre_mapping]
            "动作" = "Action"
            "科幻" = "Science Fiction"
        "#;
        let mut config: Config = toml::from_str(toml).unwrap();

        assert!(config.genre_mapper.dry_run);
        assert_eq!(config.genre_mapper.library_names, vec!["电影", "剧集"]);
        assert_eq!(config.genre_mapping.get("科幻").map(String::as_str), Some("Science Fiction"));
        // Item details are user-scoped.
        assert!(config.validate_genre_mapper().is_err());

        config.server.user_id = Some("u1".to_string());
        assert!(config.validate_genre_mapper().is_ok());

        config.genre_mapping.clear();
        assert!(config.validate_genre_mapper().is_err());
    }

    #[test]
    fn test_missing_report_path_fallback() {
        let paths = PathManager::rooted_at("/srv/embysync");
        let mut config = sample();
        assert_eq!(config.missing_report_path(&paths), paths.missing_report_file());

        config.output.csv_file = Some("/tmp/misses.csv".to_string());
        assert_eq!(config.missing_report_path(&paths), PathBuf::from("/tmp/misses.csv"));
    }
}
