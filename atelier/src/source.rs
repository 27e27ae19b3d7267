use std::path::PathBuf;
use crate::{config::Config, Error};

/// Somewhere game files can be read from
pub trait FileSource {
	fn read(&self, path: &str) -> Result<Vec<u8>, Error>;

	/// Where the file lives on disk, if it does
	fn local_path(&self, _path: &str) -> Option<PathBuf> {
		None
	}
}

// ----------

/// Loose files, either a direct path or a game path relative to one of the roots
#[derive(Debug, Clone, Default)]
pub struct LooseFiles {
	pub roots: Vec<PathBuf>,
}

impl LooseFiles {
	pub fn new(roots: Vec<PathBuf>) -> Self {
		Self{roots}
	}
}

impl FileSource for LooseFiles {
	fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
		match self.local_path(path) {
			Some(p) => Ok(std::fs::read(p)?),
			None => Err(Error::missing("file", path, "not found in any loose file root")),
		}
	}

	fn local_path(&self, path: &str) -> Option<PathBuf> {
		let direct = PathBuf::from(path);
		if direct.is_absolute() && direct.is_file() {
			return Some(direct);
		}

		self.roots.iter()
			.map(|root| root.join(path))
			.find(|v| v.is_file())
	}
}

// ----------

/// Files inside the game install
pub struct GameFiles(pub pigment::GameData);

impl GameFiles {
	/// None if no install could be found at the path, or automatically when no path is given
	pub fn open(game_install: Option<&str>) -> Option<Self> {
		pigment::get_game_data(game_install).map(Self)
	}
}

impl FileSource for GameFiles {
	fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
		self.0.read(path).map_err(|e| Error::missing("file", path, e))
	}
}

// ----------

/// Sources tried in order, the first one that has the file wins
#[derive(Default)]
pub struct Sources(pub Vec<Box<dyn FileSource>>);

impl Sources {
	pub fn from_config(config: &Config) -> Self {
		let mut sources = Sources::default();
		sources.push(LooseFiles::new(config.file_roots.clone()));
		match GameFiles::open(config.game_install.as_deref()) {
			Some(game) => sources.push(game),
			None => log!(err, "No game install found, only loose files are available"),
		}

		sources
	}

	pub fn push(&mut self, source: impl FileSource + 'static) {
		self.0.push(Box::new(source));
	}
}

impl FileSource for Sources {
	fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
		let mut reasons = Vec::new();
		for source in &self.0 {
			match source.read(path) {
				Ok(v) => return Ok(v),
				Err(Error::MissingResource{reason, ..}) => reasons.push(reason),
				Err(e) => reasons.push(e.to_string()),
			}
		}

		match reasons.is_empty() {
			true => Err(Error::missing("file", path, "no file sources")),
			false => Err(Error::missing("file", path, reasons.join(", "))),
		}
	}

	fn local_path(&self, path: &str) -> Option<PathBuf> {
		self.0.iter().find_map(|v| v.local_path(path))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roots_are_searched_in_order() {
		let a = tempfile::tempdir().unwrap();
		let b = tempfile::tempdir().unwrap();
		std::fs::create_dir_all(a.path().join("chara")).unwrap();
		std::fs::create_dir_all(b.path().join("chara")).unwrap();
		std::fs::write(a.path().join("chara/a.mtrl"), [1]).unwrap();
		std::fs::write(b.path().join("chara/a.mtrl"), [2]).unwrap();
		std::fs::write(b.path().join("chara/b.mtrl"), [3]).unwrap();

		let loose = LooseFiles::new(vec![a.path().to_owned(), b.path().to_owned()]);
		assert_eq!(loose.read("chara/a.mtrl").unwrap(), [1]);
		assert_eq!(loose.read("chara/b.mtrl").unwrap(), [3]);
		assert!(matches!(loose.read("chara/c.mtrl"), Err(Error::MissingResource{..})));

		let direct = b.path().join("chara/b.mtrl");
		assert_eq!(LooseFiles::default().read(direct.to_str().unwrap()).unwrap(), [3]);
	}

	#[test]
	fn chained_sources_fall_through() {
		let a = tempfile::tempdir().unwrap();
		let b = tempfile::tempdir().unwrap();
		std::fs::write(b.path().join("x.stm"), [9]).unwrap();

		let mut sources = Sources::default();
		assert!(sources.read("x.stm").is_err());
		sources.push(LooseFiles::new(vec![a.path().to_owned()]));
		sources.push(LooseFiles::new(vec![b.path().to_owned()]));
		assert_eq!(sources.read("x.stm").unwrap(), [9]);
		assert_eq!(sources.local_path("x.stm"), Some(b.path().join("x.stm")));
	}

	struct Broken;

	impl FileSource for Broken {
		fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
			Err(Error::Pigment(pigment::Error::Game(format!("{path} is not in the index"))))
		}
	}

	#[test]
	fn misses_in_every_source_are_missing_resources() {
		let a = tempfile::tempdir().unwrap();
		let mut sources = Sources::default();
		sources.push(LooseFiles::new(vec![a.path().to_owned()]));
		sources.push(Broken);

		match sources.read("chara/x.mtrl") {
			Err(Error::MissingResource{path, reason, ..}) => {
				assert_eq!(path, "chara/x.mtrl");
				assert!(reason.contains("not found in any loose file root"), "{reason}");
				assert!(reason.contains("not in the index"), "{reason}");
			}
			v => panic!("expected a missing resource, got {v:?}"),
		}
	}
}
