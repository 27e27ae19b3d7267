use std::{io::{Read, Seek, SeekFrom}, ops::{Deref, DerefMut}, path::{Path, PathBuf}};
use binrw::{BinRead, BinResult, Endian};
pub use ironworks::file::File;

pub mod format;
pub mod half_ext;
pub mod names;
pub mod resolve;
pub mod dye;
pub mod devkit;

pub use format::game::mtrl::{FormatError, ColorTable, ColorTableRow, ColorDyeTable, ColorDyeTableRow};
pub use names::{crc32, shader_param_name};

// ----------

trait NullReader {
	fn null_terminated(&self) -> Result<String, std::str::Utf8Error>;
}

impl NullReader for [u8] {
	fn null_terminated(&self) -> Result<String, std::str::Utf8Error> {
		let p = std::str::from_utf8(if let Some(l) = self.iter().position(|v| *v == 0) {&self[..l]} else {self})?;
		Ok(p.to_owned())
	}
}

/// Reads primitives off a stream without repeating the endian everywhere
pub(crate) struct SimpleReader<'a, R> {
	reader: &'a mut R,
	endian: Endian,
}

impl<'a, R: Read + Seek> SimpleReader<'a, R> {
	pub fn new(reader: &'a mut R, endian: Endian) -> Self {
		Self {reader, endian}
	}

	pub fn read<T>(&mut self) -> BinResult<T> where
	T: for<'b> BinRead<Args<'b> = ()> {
		T::read_options(&mut *self.reader, self.endian, ())
	}

	pub fn read_vec<T>(&mut self, count: usize) -> BinResult<Vec<T>> where
	T: for<'b> BinRead<Args<'b> = ()> {
		(0..count).map(|_| T::read_options(&mut *self.reader, self.endian, ())).collect()
	}

	/// Sizes come straight from headers, so they are checked against the stream before allocating
	pub fn bytes(&mut self, count: usize) -> BinResult<Vec<u8>> {
		let remaining = self.remaining()?;
		if count as u64 > remaining {
			return self.fail(format!("{count} bytes requested but only {remaining} remain"));
		}

		let mut buf = vec![0; count];
		self.reader.read_exact(&mut buf)?;
		Ok(buf)
	}

	pub fn rest(&mut self) -> BinResult<Vec<u8>> {
		let mut buf = Vec::new();
		self.reader.read_to_end(&mut buf)?;
		Ok(buf)
	}

	pub fn pos(&mut self) -> BinResult<u64> {
		Ok(self.reader.stream_position()?)
	}

	pub fn remaining(&mut self) -> BinResult<u64> {
		let pos = self.reader.stream_position()?;
		let end = self.reader.seek(SeekFrom::End(0))?;
		self.reader.seek(SeekFrom::Start(pos))?;
		Ok(end.saturating_sub(pos))
	}

	pub fn fail<T>(&mut self, message: impl Into<String>) -> BinResult<T> {
		Err(binrw::Error::AssertFail {
			pos: self.reader.stream_position().unwrap_or(0),
			message: message.into(),
		})
	}
}

// ----------

#[derive(Copy, Eq, PartialEq, Clone, Debug, thiserror::Error)]
#[error("{what} is too large, {len} while max is {max_len}")]
pub struct SizeError {
	pub what: &'static str,
	pub len: usize,
	pub max_len: usize,
}

impl SizeError {
	pub fn u8(what: &'static str, len: usize) -> Result<u8, SizeError> {
		u8::try_from(len).map_err(|_| SizeError{what, len, max_len: u8::MAX as usize})
	}

	pub fn u16(what: &'static str, len: usize) -> Result<u16, SizeError> {
		u16::try_from(len).map_err(|_| SizeError{what, len, max_len: u16::MAX as usize})
	}

	pub fn u32(what: &'static str, len: usize) -> Result<u32, SizeError> {
		u32::try_from(len).map_err(|_| SizeError{what, len, max_len: u32::MAX as usize})
	}
}

impl From<SizeError> for binrw::Error {
	fn from(err: SizeError) -> Self {
		binrw::Error::AssertFail{pos: 0, message: err.to_string()}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0:?}")] Io(#[from] std::io::Error),
	#[error("{0}")] Binrw(#[from] binrw::Error),
	#[error("{0}")] Json(#[from] serde_json::Error),
	#[error("{0}")] Format(#[from] FormatError),
	#[error("{0}")] Size(#[from] SizeError),
	#[error("{0:?}")] Utf8(#[from] std::str::Utf8Error),
	#[error("{0:?}")] Game(String),
}

// ----------

/// Read only access to the game install
pub struct GameData(ironworks::Ironworks);

impl GameData {
	pub fn exists(&self, path: &str) -> bool {
		self.file::<Vec<u8>>(path).is_ok()
	}

	pub fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
		self.file::<Vec<u8>>(path).map_err(|e| Error::Game(format!("{e:?}")))
	}
}

impl Deref for GameData {
	type Target = ironworks::Ironworks;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for GameData {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

pub fn get_game_data<P>(gamepath: Option<P>) -> Option<GameData> where
P: AsRef<Path> {
	if let Some(gamepath) = gamepath {
		if gamepath.as_ref().exists() && gamepath.as_ref().join("game").exists() {
			return Some(GameData(ironworks::Ironworks::new()
				.with_resource(ironworks::sqpack::SqPack::new(ironworks::sqpack::Install::at(gamepath.as_ref())))));
		}
	} else {
		for drive_letter in 'A'..='Z' {
			for path in [":/SquareEnix/FINAL FANTASY XIV - A Realm Reborn",
			":/Program Files (x86)/SquareEnix/FINAL FANTASY XIV - A Realm Reborn",
			":/Program Files (x86)/Steam/steamapps/common/FINAL FANTASY XIV Online",
			":/SteamLibrary/steamapps/common/FINAL FANTASY XIV Online"] {
				let try_path = PathBuf::from(format!("{drive_letter}{path}"));
				if try_path.join("game").exists() {
					return Some(GameData(ironworks::Ironworks::new()
						.with_resource(ironworks::sqpack::SqPack::new(ironworks::sqpack::Install::at(try_path.as_ref())))));
				}
			}
		}
	}

	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn null_terminated_stops_at_first_nul() {
		let data = b"shader.shpk\0garbage\0";
		assert_eq!(data[..].null_terminated().unwrap(), "shader.shpk");
		assert_eq!(b"no_nul"[..].null_terminated().unwrap(), "no_nul");
	}

	#[test]
	fn oversized_byte_reads_fail_before_allocating() {
		let mut data = std::io::Cursor::new(vec![1u8, 2, 3, 4]);
		let mut r = SimpleReader::new(&mut data, Endian::Little);
		assert_eq!(r.read::<u8>().unwrap(), 1);
		assert_eq!(r.remaining().unwrap(), 3);
		assert!(r.bytes(usize::MAX).is_err());
		assert_eq!(r.pos().unwrap(), 1);
		assert_eq!(r.bytes(3).unwrap(), [2, 3, 4]);
	}

	#[test]
	fn size_error_reports_limit() {
		let err = SizeError::u8("additional data", 300).unwrap_err();
		assert_eq!(err.max_len, 255);
		assert_eq!(SizeError::u16("strings", 300), Ok(300));
	}
}
