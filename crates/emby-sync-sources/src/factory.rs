//! Importer registry.
//!
//! Each importer is a catalog source plus the list of upstream ids it syncs
//! and its matching leniency. The set is fixed at compile time; config flags
//! only decide which ones run.

use anyhow::Result;
use emby_sync_config::Config;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::bangumi::BangumiSource;
use crate::douban::{DoulistSource, WeeklyChartSource};
use crate::http::build_client;
use crate::normalize::AliasTable;
use crate::CatalogSource;

/// A ready-to-run importer.
pub struct ConfiguredSource {
    pub importer: String,
    pub source: Box<dyn CatalogSource>,
    pub source_ids: Vec<String>,
    /// Accept case-insensitive containment when no exact name matches.
    pub substring_match: bool,
}

/// What `embysync importers` shows for one registered importer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImporterInfo {
    pub name: String,
    pub description: String,
    pub enabled: bool,
}

/// Builds one importer from configuration.
pub trait SourceFactory: Send + Sync {
    /// Identifier used in config, CLI flags and reports.
    fn source_name(&self) -> &str;

    fn description(&self) -> &str;

    fn is_enabled(&self, config: &Config) -> bool;

    fn create_source(&self, config: &Config, client: &Client) -> ConfiguredSource;

    /// Called before a run; only enabled importers are checked.
    fn validate_config(&self, config: &Config) -> Result<()>;
}

/// Registry of importer factories, in the order they run.
pub struct SourceFactoryRegistry {
    factories: Vec<Box<dyn SourceFactory>>,
}

impl SourceFactoryRegistry {
    /// Create a new registry with all built-in importers registered
    pub fn new() -> Self {
        let mut registry = Self { factories: Vec::new() };

        registry.register(Box::new(HotMovieFactory));
        registry.register(Box::new(DoulistFactory));
        registry.register(Box::new(BangumiFactory));

        registry
    }

    /// Register a factory, replacing any existing one with the same name
    pub fn register(&mut self, factory: Box<dyn SourceFactory>) {
        self.factories.retain(|f| f.source_name() != factory.source_name());
        self.factories.push(factory);
    }

    /// Build every importer the config enables.
    pub fn create_enabled_sources(&self, config: &Config) -> Result<Vec<ConfiguredSource>> {
        let client = feed_client(config)?;
        Ok(self
            .factories
            .iter()
            .filter(|f| f.is_enabled(config))
            .map(|f| f.create_source(config, &client))
            .collect())
    }

    /// Build a specific importer, whether or not the config enables it.
    pub fn create_source_by_name(&self, name: &str, config: &Config) -> Result<Option<ConfiguredSource>> {
        let Some(factory) = self.factories.iter().find(|f| f.source_name() == name) else {
            return Ok(None);
        };
        let client = feed_client(config)?;
        Ok(Some(factory.create_source(config, &client)))
    }

    pub fn validate_all_configs(&self, config: &Config) -> Result<()> {
        for factory in self.factories.iter().filter(|f| f.is_enabled(config)) {
            factory.validate_config(config)?;
        }
        Ok(())
    }

    /// Every registered importer in run order, with its enabled flag from `config`.
    pub fn describe(&self, config: &Config) -> Vec<ImporterInfo> {
        self.factories
            .iter()
            .map(|f| ImporterInfo {
                name: f.source_name().to_string(),
                description: f.description().to_string(),
                enabled: f.is_enabled(config),
            })
            .collect()
    }
}

impl Default for SourceFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn feed_client(config: &Config) -> Result<Client> {
    build_client(&config.proxy, Duration::from_secs(config.server.timeout_secs))
}

fn aliases(config: &Config) -> AliasTable {
    AliasTable::new(config.name_mapping.clone())
}

fn non_empty_ids(ids: &[String]) -> Vec<String> {
    ids.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

struct HotMovieFactory;

impl SourceFactory for HotMovieFactory {
    fn source_name(&self) -> &str {
        "hotmovie"
    }

    fn description(&self) -> &str {
        "Douban weekly charts via RSSHub"
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.importers.hotmovie.enabled
    }

    fn create_source(&self, config: &Config, client: &Client) -> ConfiguredSource {
        let hotmovie = &config.importers.hotmovie;
        ConfiguredSource {
            importer: self.source_name().to_string(),
            source: Box::new(WeeklyChartSource::new(client.clone(), &config.rsshub.url, aliases(config))),
            source_ids: non_empty_ids(&hotmovie.rss_ids),
            substring_match: hotmovie.substring_match,
        }
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        if non_empty_ids(&config.importers.hotmovie.rss_ids).is_empty() {
            return Err(anyhow::anyhow!("hotmovie importer has no rss_ids"));
        }
        Ok(())
    }
}

struct DoulistFactory;

impl SourceFactory for DoulistFactory {
    fn source_name(&self) -> &str {
        "doulist"
    }

    fn description(&self) -> &str {
        "Douban user lists via RSSHub"
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.importers.doulist.enabled
    }

    fn create_source(&self, config: &Config, client: &Client) -> ConfiguredSource {
        let doulist = &config.importers.doulist;
        ConfiguredSource {
            importer: self.source_name().to_string(),
            source: Box::new(DoulistSource::new(client.clone(), &config.rsshub.url, aliases(config))),
            source_ids: non_empty_ids(&doulist.doulist_ids),
            substring_match: doulist.substring_match,
        }
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        if non_empty_ids(&config.importers.doulist.doulist_ids).is_empty() {
            return Err(anyhow::anyhow!("doulist importer has no doulist_ids"));
        }
        Ok(())
    }
}

struct BangumiFactory;

impl SourceFactory for BangumiFactory {
    fn source_name(&self) -> &str {
        "bangumi"
    }

    fn description(&self) -> &str {
        "bgm.tv airing calendar"
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.importers.bangumi.enabled
    }

    fn create_source(&self, config: &Config, client: &Client) -> ConfiguredSource {
        let bangumi = &config.importers.bangumi;
        ConfiguredSource {
            importer: self.source_name().to_string(),
            source: Box::new(BangumiSource::new(
                client.clone(),
                &bangumi.api_url,
                &bangumi.collection_name,
                aliases(config),
            )),
            // The calendar is a single feed.
            source_ids: vec!["calendar".to_string()],
            substring_match: bangumi.substring_match,
        }
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        if config.importers.bangumi.collection_name.trim().is_empty() {
            return Err(anyhow::anyhow!("bangumi importer needs a collection_name"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::with_server("http://emby:8096", "key");
        config.importers.hotmovie.rss_ids = vec![" movie_weekly_best ".to_string(), "".to_string()];
        config.importers.doulist.enabled = true;
        config.importers.doulist.doulist_ids = vec!["42".to_string()];
        config
    }

    #[test]
    fn test_enabled_sources_in_registry_order() {
        let registry = SourceFactoryRegistry::new();
        let sources = registry.create_enabled_sources(&config()).unwrap();

        let names: Vec<&str> = sources.iter().map(|s| s.importer.as_str()).collect();
        assert_eq!(names, vec!["hotmovie", "doulist"]);
        assert_eq!(sources[0].source_ids, vec!["movie_weekly_best"]);
        assert!(!sources[0].substring_match);
        assert!(sources[1].substring_match);
        assert_eq!(sources[1].source.source_name(), "doulist");
    }

    #[test]
    fn test_create_by_name_ignores_enabled_flag() {
        let registry = SourceFactoryRegistry::new();
        let bangumi = registry.create_source_by_name("bangumi", &config()).unwrap().unwrap();
        assert_eq!(bangumi.source_ids, vec!["calendar"]);
        assert!(registry.create_source_by_name("trakt", &config()).unwrap().is_none());
    }

    #[test]
    fn test_validate_only_enabled() {
        let registry = SourceFactoryRegistry::new();
        let mut config = config();
        assert!(registry.validate_all_configs(&config).is_ok());

        config.importers.doulist.doulist_ids = vec!["  ".to_string()];
        assert!(registry.validate_all_configs(&config).is_err());
        config.importers.doulist.enabled = false;
        assert!(registry.validate_all_configs(&config).is_ok());
    }

    #[test]
    fn test_describe_reports_enabled_flags() {
        let infos = SourceFactoryRegistry::new().describe(&config());
        let flags: Vec<(&str, bool)> = infos.iter().map(|i| (i.name.as_str(), i.enabled)).collect();
        assert_eq!(flags, vec![("hotmovie", true), ("doulist", true), ("bangumi", false)]);
        assert!(infos.iter().all(|i| !i.description.is_empty()));
    }
}
