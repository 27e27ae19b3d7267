use std::{fs::File, path::{PathBuf, Path}, io::{Write, Read}};
use serde::{Deserialize, Serialize};

pub struct ConfigManager {
	pub config: Config,
	save_check: Option<Config>,
	path: PathBuf,
}

impl ConfigManager {
	/// Missing or unreadable files fall back to the defaults
	pub fn load(path: &Path) -> Self {
		Self {
			config: 's: {
				if let Ok(mut f) = File::open(path) {
					let mut buf = Vec::new();
					if f.read_to_end(&mut buf).is_ok() {
						match serde_json::from_slice(&buf) {
							Ok(c) => break 's c,
							Err(e) => log!(err, "Config at {path:?} is invalid, using defaults ({e})"),
						}
					}
				}

				Config::default()
			},
			save_check: None,
			path: path.to_owned(),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn mark_for_changes(&mut self) {
		self.save_check = Some(self.config.clone());
	}

	/// Only writes if the config changed since `mark_for_changes`
	pub fn save(&mut self) -> Result<(), crate::Error> {
		if let Some(save_check) = self.save_check.take() {
			if self.config != save_check {
				self.save_forced()?;
			}
		}

		Ok(())
	}

	pub fn save_forced(&self) -> Result<(), crate::Error> {
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent)?;
		}

		File::create(&self.path)?.write_all(crate::json_pretty(&self.config)?.as_bytes())?;

		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
	pub game_install: Option<String>,
	/// Loose file directories searched before the game install, in order
	pub file_roots: Vec<PathBuf>,
	pub staining_template: String,
	pub shader_package_dir: String,
	pub highlight_color: [f32; 3],
	pub default_stain: u8,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			game_install: None,
			file_roots: Vec::new(),
			staining_template: "chara/base_material/stainingtemplate.stm".to_string(),
			shader_package_dir: "shader/sm5/shpk".to_string(),
			highlight_color: [1.0, 0.8, 0.0],
			default_stain: 1,
		}
	}
}

impl Config {
	pub fn shader_package_path(&self, shader: &str) -> String {
		format!("{}/{shader}", self.shader_package_dir.trim_end_matches('/'))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn saves_only_when_changed() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("Atelier").join("config.json");

		let mut manager = ConfigManager::load(&path);
		assert_eq!(manager.config, Config::default());

		manager.mark_for_changes();
		manager.save().unwrap();
		assert!(!path.exists());

		manager.mark_for_changes();
		manager.config.default_stain = 12;
		manager.config.file_roots.push(PathBuf::from("/mods/loose"));
		manager.save().unwrap();
		assert!(path.exists());

		let reloaded = ConfigManager::load(&path);
		assert_eq!(reloaded.config, manager.config);
	}

	#[test]
	fn partial_and_broken_files() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");

		std::fs::write(&path, r#"{"default_stain": 4}"#).unwrap();
		let manager = ConfigManager::load(&path);
		assert_eq!(manager.config.default_stain, 4);
		assert_eq!(manager.config.shader_package_dir, "shader/sm5/shpk");

		std::fs::write(&path, "not json").unwrap();
		assert_eq!(ConfigManager::load(&path).config, Config::default());
	}

	#[test]
	fn shader_package_paths() {
		let mut config = Config::default();
		assert_eq!(config.shader_package_path("character.shpk"), "shader/sm5/shpk/character.shpk");
		config.shader_package_dir = "shader/sm5/shpk/".to_string();
		assert_eq!(config.shader_package_path("skin.shpk"), "shader/sm5/shpk/skin.shpk");
	}
}
