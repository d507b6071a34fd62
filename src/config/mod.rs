// Environment-driven configuration

pub mod app;

pub use app::AppConfig;
