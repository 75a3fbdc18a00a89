pub mod config;
pub mod paths;

pub use config::{
    BangumiConfig, Config, DoulistConfig, GenreMapperConfig, HotMovieConfig, ImporterConfig, OutputConfig, ProxyConfig, RsshubConfig,
    RunOptions, SchedulerConfig, ServerConfig, default_alias_table,
};
pub use paths::{PathManager, container_base_path};
