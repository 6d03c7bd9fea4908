pub mod db;
pub mod formio;
pub mod plugin_config;
pub mod registry;
