use std::io::{Cursor, Read, Seek, Write};

/// Raw game bytes, the format as it is stored in the sqpacks
pub trait Bytes {
	fn read<T>(reader: &mut T) -> Result<Self, crate::Error> where Self: Sized, T: Read + Seek;
	fn write<T>(&self, writer: &mut T) -> Result<(), crate::Error> where T: Write + Seek;

	fn from_bytes(data: &[u8]) -> Result<Self, crate::Error> where Self: Sized {
		Self::read(&mut Cursor::new(data))
	}

	fn to_bytes(&self) -> Result<Vec<u8>, crate::Error> {
		let mut data = Cursor::new(Vec::new());
		self.write(&mut data)?;
		Ok(data.into_inner())
	}
}
