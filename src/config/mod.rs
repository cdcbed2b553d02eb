mod settings;

pub use settings::{Config, EXAMPLE_CONFIG};
