// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::Path;

use config::{Config, File};

pub mod audio;
pub mod error;
pub mod player;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::player::Player;

/// Parses the player configuration from a YAML file.
pub fn parse_player(path: &Path) -> Result<Player, ConfigError> {
    Ok(Config::builder()
        .add_source(File::from(path))
        .build()?
        .try_deserialize::<Player>()?)
}

/// Parses the player configuration if a path is given, otherwise returns the defaults.
pub fn load_player(path: Option<&Path>) -> Result<Player, ConfigError> {
    match path {
        Some(path) => parse_player(path),
        None => Ok(Player::default()),
    }
}

#[cfg(test)]
mod test {
    use std::{fs, time::Duration};

    use super::*;

    #[test]
    fn test_parse_player_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.yaml");
        fs::write(
            &path,
            "audio:\n  device: mock-device\nplayback:\n  end_tolerance: 50ms\n",
        )
        .unwrap();

        let player = load_player(Some(&path)).unwrap();
        assert_eq!(player.audio().device(), "mock-device");
        assert_eq!(player.end_tolerance().unwrap(), Duration::from_millis(50));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = parse_player(&dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_no_path_uses_defaults() {
        let player = load_player(None).unwrap();
        assert_eq!(player.audio().device(), "default");
        assert_eq!(player.product(), "DocuVoice_AI");
    }
}
