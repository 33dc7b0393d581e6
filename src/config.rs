use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PenroseError, Result};
use crate::grammar::Grammar;
use crate::turtle::Theme;

pub const DEFAULT_CONFIG_PATH: &str = "penrose.json";
/// Past this the production no longer fits a frame budget.
pub const MAX_GENERATIONS: u32 = 8;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preset: String,
    /// Overrides `preset` when present.
    pub grammar: Option<Grammar>,
    pub generations: u32,
    pub step_budget: usize,
    pub fps: usize,
    pub theme: Theme,
    pub width: usize,
    pub height: usize,
    pub pixels_per_unit: f64,
    pub instant: bool,
    pub dual: bool,
    pub rotation_offset: f64,
    pub rotation_speed: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            preset: "penrose".to_string(),
            grammar: None,
            generations: 5,
            step_budget: 24,
            fps: 30,
            theme: Theme::Dark,
            width: 800,
            height: 800,
            pixels_per_unit: 0.8,
            instant: false,
            dual: false,
            rotation_offset: 0.0,
            rotation_speed: 0.0,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Config::from_json(&text)?;
        info!(path = %path.as_ref().display(), "loaded config");
        Ok(config)
    }

    /// Missing file means defaults; anything else wrong with the file is an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Config::load(path.as_ref()) {
            Err(PenroseError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %path.as_ref().display(), "config not found, using defaults");
                Ok(Config::default())
            }
            other => other,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn grammar(&self) -> Result<Grammar> {
        match &self.grammar {
            Some(grammar) => Ok(grammar.clone()),
            None => Grammar::preset(&self.preset),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(PenroseError::InvalidConfig("fps must be positive".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PenroseError::InvalidConfig("window size must be positive".into()));
        }
        if self.generations > MAX_GENERATIONS {
            return Err(PenroseError::InvalidConfig(format!(
                "generations {} exceeds the maximum of {}", self.generations, MAX_GENERATIONS
            )));
        }
        if self.step_budget == 0 {
            return Err(PenroseError::InvalidConfig("step_budget must be at least 1".into()));
        }
        if !self.rotation_speed.is_finite() || self.rotation_speed < 0.0 {
            return Err(PenroseError::InvalidConfig(format!(
                "rotation_speed {} must be zero or positive", self.rotation_speed
            )));
        }
        if self.pixels_per_unit <= 0.0 {
            return Err(PenroseError::InvalidConfig("pixels_per_unit must be positive".into()));
        }
        if let Some(grammar) = &self.grammar {
            if grammar.scale_factor <= 0.0 {
                return Err(PenroseError::InvalidConfig("grammar scale_factor must be positive".into()));
            }
        } else {
            Grammar::preset(&self.preset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn partial_json_fills_defaults() {
        let config = Config::from_json(r#"{ "generations": 3, "theme": "light" }"#).unwrap();
        assert_eq!(config.generations, 3);
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.step_budget, 24);
        assert_eq!(config.grammar().unwrap(), Grammar::penrose());
    }

    #[test]
    fn custom_grammar_overrides_preset() {
        let json = r#"{
            "preset": "koch",
            "grammar": {
                "axiom": "F",
                "rules": { "F": "F-F" },
                "theta_degrees": 90.0,
                "start_length": 10.0,
                "scale_factor": 0.5
            }
        }"#;
        let grammar = Config::from_json(json).unwrap().grammar().unwrap();
        assert_eq!(grammar.rules.get(&'F').map(String::as_str), Some("F-F"));
        assert!(grammar.dropped.is_empty());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(Config::from_json(r#"{ "fps": 0 }"#), Err(PenroseError::InvalidConfig(_))));
        assert!(matches!(Config::from_json(r#"{ "generations": 12 }"#), Err(PenroseError::InvalidConfig(_))));
        assert!(matches!(Config::from_json(r#"{ "step_budget": 0 }"#), Err(PenroseError::InvalidConfig(_))));
        assert!(matches!(Config::from_json(r#"{ "rotation_speed": -0.5 }"#), Err(PenroseError::InvalidConfig(_))));
        assert!(Config::from_json(r#"{ "step_budget": 1, "rotation_speed": 0.0 }"#).is_ok());
        assert!(matches!(Config::from_json(r#"{ "preset": "hilbert" }"#), Err(PenroseError::UnknownPreset(_))));
        assert!(matches!(Config::from_json("{ not json"), Err(PenroseError::Json(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("penrose.json");
        let config = Config { generations: 2, dual: true, rotation_speed: 0.01, ..Config::default() };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
