pub mod config;

pub use self::config::{Cli, Command, Configuration, ContendArgs, ScenarioArgs};
