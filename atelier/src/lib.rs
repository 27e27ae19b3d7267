#![allow(static_mut_refs)]

#[macro_use]
mod log;
pub use log::{LogType, set_logger};

pub mod config;
mod error;
pub use error::Error;
pub mod source;
pub mod tab;
pub mod material;
pub mod highlight;
pub mod clipboard;
pub mod session;
pub use session::EditSession;
pub use pigment;

static mut CONFIG: Option<config::ConfigManager> = None;
pub fn config() -> &'static mut config::ConfigManager {
	unsafe{CONFIG.get_or_insert_with(|| config::ConfigManager::load(&config_path()))}
}

fn config_path() -> std::path::PathBuf {
	dirs::config_dir()
		.unwrap_or_else(|| std::path::PathBuf::from("."))
		.join("Atelier")
		.join("config.json")
}

pub fn json_pretty<T: serde::Serialize>(data: &T) -> Result<String, serde_json::Error> {
	let mut serializer = serde_json::Serializer::with_formatter(Vec::new(), serde_json::ser::PrettyFormatter::with_indent(b"\t"));
	data.serialize(&mut serializer)?;
	Ok(String::from_utf8_lossy(&serializer.into_inner()).into_owned())
}
