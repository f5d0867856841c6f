pub mod display;
pub mod parser;
pub mod types;
pub mod validate;

pub use display::display_config;
pub use parser::{ConfigError, ConfigParser, FromYaml, ParseResult};
pub use types::{AppConfig, RouteConfig, ServerConfig};
pub use validate::validate_configs;

impl AppConfig {
    pub fn display_config(&self) {
        display::display_config(&self.servers);
    }
}
