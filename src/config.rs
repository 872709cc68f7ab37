//! Settings file for staffdrill
//!
//! Settings are stored in TOML format at:
//! - Linux: `~/.config/staffdrill/config.toml`
//! - macOS: `~/Library/Application Support/staffdrill/config.toml`
//! - Windows: `%APPDATA%\staffdrill\config.toml`

use crate::engine::SessionConfig;
use crate::error::{Error, Result};
use crate::note::{ClefType, Difficulty, GameMode, MetronomeSpeed, NoteName, NoteNotation, RoundLength};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub game: GameSettings,
    pub metronome: MetronomeSettings,
    pub audio: AudioSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub clef: ClefType,
    pub round_length: RoundLength,
    /// Empty = every note
    pub allowed_notes: Vec<NoteName>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeSettings {
    pub enabled: bool,
    pub bpm: MetronomeSpeed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub muted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub notation: NoteNotation,
}

const DEFAULT_CONFIG: &str = r#"# staffdrill configuration file

[game]
# "practice", "timed" (60 second challenge) or "streak" (first miss ends it)
mode = "practice"

# 1 = staff lines only ... 5 = three ledger lines
difficulty = 2

# "treble", "bass" or "random" (picked per round)
clef = "treble"

# Notes per round: 4, 8 or 12 (timed mode always uses one)
round_length = 4

# Restrict which notes appear, e.g. ["Do", "Mi", "Sol"]. Empty = all notes.
allowed_notes = []

[metronome]
enabled = false

# 60, 90, 120 or 150
bpm = 90

[audio]
muted = false

[display]
# "solfege" (Do Re Mi) or "letter" (C D E)
notation = "solfege"
"#;

impl Settings {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load settings from `path`, or defaults when there is no file there
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(path)
            .map_err(|e| Error::Config(format!("invalid settings file {}: {}", path.display(), e)))
    }

    /// Save settings to `path`, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "staffdrill") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Write the commented default file to `path`
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }

    /// The engine's view of these settings
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            mode: self.game.mode,
            difficulty: self.game.difficulty,
            clef: self.game.clef,
            round_length: self.game.round_length,
            allowed_notes: if self.game.allowed_notes.is_empty() {
                None
            } else {
                Some(self.game.allowed_notes.clone())
            },
            metronome_enabled: self.metronome.enabled,
            metronome_speed: self.metronome.bpm,
        }
    }
}
