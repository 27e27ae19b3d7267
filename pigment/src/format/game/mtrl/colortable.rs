use std::io::{Cursor, Read, Seek, Write};
use binrw::{BinRead, BinWrite};
use half::f16;
use crate::half_ext::{gloss_floor, to_half};

pub const ROW_COUNT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("buffer too short, expected at least {expected} bytes but got {actual}")]
pub struct FormatError {
	pub expected: usize,
	pub actual: usize,
}

impl FormatError {
	fn check(expected: usize, bytes: &[u8]) -> Result<(), FormatError> {
		if bytes.len() < expected {
			return Err(FormatError{expected, actual: bytes.len()});
		}

		Ok(())
	}

	fn read<T>(expected: usize, bytes: &[u8]) -> Result<T, FormatError> where
	T: for<'a> BinRead<Args<'a> = ()> {
		Self::check(expected, bytes)?;
		T::read_options(&mut Cursor::new(bytes), binrw::Endian::Little, ()).map_err(|_| FormatError{expected, actual: bytes.len()})
	}
}

// ----------

const DIFFUSE: usize = 0;
const SPECULAR_STRENGTH: usize = 3;
const SPECULAR: usize = 4;
const GLOSS: usize = 7;
const EMISSIVE: usize = 8;
const TILE_SET: usize = 11;
const REPEAT_X: usize = 12;
const SKEW_X: usize = 13;
const SKEW_Y: usize = 14;
const REPEAT_Y: usize = 15;

/// One row of a legacy color table, 16 halves.
///
/// The raw halves are kept as is so a parse and write never alters a row,
/// all setters clamp and round to half precision and report whether the
/// stored bits actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTableRow {
	data: [u16; 16],
}

impl Default for ColorTableRow {
	fn default() -> Self {
		let mut row = Self{data: [0; 16]};
		row.set_diffuse(glam::Vec3::ONE);
		row.set_specular_strength(1.0);
		row.set_specular(glam::Vec3::ONE);
		row.set_gloss_strength(20.0);
		row.set_emissive(glam::Vec3::ZERO);
		row.set_tile_set(0);
		row.set_material_repeat(glam::vec2(16.0, 16.0));
		row.set_material_skew(glam::Vec2::ZERO);
		row
	}
}

impl ColorTableRow {
	pub const SIZE: usize = 32;

	pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
		FormatError::read(Self::SIZE, bytes)
	}

	pub fn write(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		for (i, v) in self.data.iter().enumerate() {
			bytes[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
		}

		bytes
	}

	pub fn raw(&self) -> &[u16; 16] {
		&self.data
	}

	fn get(&self, index: usize) -> f32 {
		f16::from_bits(self.data[index]).to_f32()
	}

	fn set(&mut self, index: usize, value: f32) -> bool {
		let bits = to_half(value).to_bits();
		let changed = self.data[index] != bits;
		self.data[index] = bits;
		changed
	}

	fn get3(&self, index: usize) -> glam::Vec3 {
		glam::vec3(self.get(index), self.get(index + 1), self.get(index + 2))
	}

	fn set3(&mut self, index: usize, value: glam::Vec3) -> bool {
		self.set(index, value.x) | self.set(index + 1, value.y) | self.set(index + 2, value.z)
	}

	pub fn diffuse(&self) -> glam::Vec3 {self.get3(DIFFUSE)}
	pub fn set_diffuse(&mut self, value: glam::Vec3) -> bool {self.set3(DIFFUSE, value)}

	pub fn specular(&self) -> glam::Vec3 {self.get3(SPECULAR)}
	pub fn set_specular(&mut self, value: glam::Vec3) -> bool {self.set3(SPECULAR, value)}

	pub fn specular_strength(&self) -> f32 {self.get(SPECULAR_STRENGTH)}
	pub fn set_specular_strength(&mut self, value: f32) -> bool {self.set(SPECULAR_STRENGTH, value)}

	pub fn emissive(&self) -> glam::Vec3 {self.get3(EMISSIVE)}
	pub fn set_emissive(&mut self, value: glam::Vec3) -> bool {self.set3(EMISSIVE, value)}

	pub fn gloss_strength(&self) -> f32 {self.get(GLOSS)}
	pub fn set_gloss_strength(&mut self, value: f32) -> bool {self.set(GLOSS, gloss_floor(value))}

	/// Stored as a fraction of 64, rows read back truncated
	pub fn tile_set(&self) -> u16 {
		(self.get(TILE_SET) * 64.0).clamp(0.0, 63.0) as u16
	}

	pub fn set_tile_set(&mut self, value: u16) -> bool {
		self.set(TILE_SET, (value.min(63) as f32 + 0.5) / 64.0)
	}

	pub fn material_repeat(&self) -> glam::Vec2 {
		glam::vec2(self.get(REPEAT_X), self.get(REPEAT_Y))
	}

	pub fn set_material_repeat(&mut self, value: glam::Vec2) -> bool {
		self.set(REPEAT_X, value.x) | self.set(REPEAT_Y, value.y)
	}

	pub fn material_skew(&self) -> glam::Vec2 {
		glam::vec2(self.get(SKEW_X), self.get(SKEW_Y))
	}

	pub fn set_material_skew(&mut self, value: glam::Vec2) -> bool {
		self.set(SKEW_X, value.x) | self.set(SKEW_Y, value.y)
	}

	/// Rewrites every field through its setter, done after each edit so
	/// the stored row always holds what the setters would produce
	pub fn normalize(&mut self) -> bool {
		let mut changed = false;
		changed |= self.set_diffuse(self.diffuse());
		changed |= self.set_specular_strength(self.specular_strength());
		changed |= self.set_specular(self.specular());
		changed |= self.set_gloss_strength(self.gloss_strength());
		changed |= self.set_emissive(self.emissive());
		changed |= self.set_tile_set(self.tile_set());
		changed |= self.set_material_repeat(self.material_repeat());
		changed |= self.set_material_skew(self.material_skew());
		changed
	}
}

impl BinRead for ColorTableRow {
	type Args<'a> = ();

	fn read_options<R: Read + Seek>(reader: &mut R, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<Self> {
		Ok(Self{data: <[u16; 16]>::read_options(reader, endian, ())?})
	}
}

impl BinWrite for ColorTableRow {
	type Args<'a> = ();

	fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<()> {
		self.data.write_options(writer, endian, ())
	}
}

// ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorTable {
	pub rows: [ColorTableRow; ROW_COUNT],
}

impl ColorTable {
	pub const SIZE: usize = ColorTableRow::SIZE * ROW_COUNT;

	pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
		FormatError::read(Self::SIZE, bytes)
	}

	pub fn write(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		for (i, row) in self.rows.iter().enumerate() {
			bytes[i * ColorTableRow::SIZE..(i + 1) * ColorTableRow::SIZE].copy_from_slice(&row.write());
		}

		bytes
	}
}

impl BinRead for ColorTable {
	type Args<'a> = ();

	fn read_options<R: Read + Seek>(reader: &mut R, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<Self> {
		Ok(Self{rows: <[ColorTableRow; ROW_COUNT]>::read_options(reader, endian, ())?})
	}
}

impl BinWrite for ColorTable {
	type Args<'a> = ();

	fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<()> {
		self.rows.write_options(writer, endian, ())
	}
}

// ----------

const DYE_DIFFUSE: u16 = 0x01;
const DYE_SPECULAR: u16 = 0x02;
const DYE_EMISSIVE: u16 = 0x04;
const DYE_GLOSS: u16 = 0x08;
const DYE_SPECULAR_STRENGTH: u16 = 0x10;

/// Template id in the upper 11 bits, one flag per dyeable field below
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorDyeTableRow {
	data: u16,
}

impl ColorDyeTableRow {
	pub const SIZE: usize = 2;
	pub const MAX_TEMPLATE: u16 = 0x7FF;

	pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
		FormatError::read(Self::SIZE, bytes)
	}

	pub fn write(&self) -> [u8; Self::SIZE] {
		self.data.to_le_bytes()
	}

	pub fn raw(&self) -> u16 {
		self.data
	}

	pub fn template(&self) -> u16 {
		self.data >> 5
	}

	pub fn set_template(&mut self, value: u16) -> bool {
		let data = (self.data & 0x1F) | (value.min(Self::MAX_TEMPLATE) << 5);
		let changed = data != self.data;
		self.data = data;
		changed
	}

	fn flag(&self, flag: u16) -> bool {
		self.data & flag != 0
	}

	fn set_flag(&mut self, flag: u16, value: bool) -> bool {
		let data = if value {self.data | flag} else {self.data & !flag};
		let changed = data != self.data;
		self.data = data;
		changed
	}

	pub fn diffuse(&self) -> bool {self.flag(DYE_DIFFUSE)}
	pub fn set_diffuse(&mut self, value: bool) -> bool {self.set_flag(DYE_DIFFUSE, value)}

	pub fn specular(&self) -> bool {self.flag(DYE_SPECULAR)}
	pub fn set_specular(&mut self, value: bool) -> bool {self.set_flag(DYE_SPECULAR, value)}

	pub fn emissive(&self) -> bool {self.flag(DYE_EMISSIVE)}
	pub fn set_emissive(&mut self, value: bool) -> bool {self.set_flag(DYE_EMISSIVE, value)}

	pub fn gloss(&self) -> bool {self.flag(DYE_GLOSS)}
	pub fn set_gloss(&mut self, value: bool) -> bool {self.set_flag(DYE_GLOSS, value)}

	pub fn specular_strength(&self) -> bool {self.flag(DYE_SPECULAR_STRENGTH)}
	pub fn set_specular_strength(&mut self, value: bool) -> bool {self.set_flag(DYE_SPECULAR_STRENGTH, value)}
}

impl BinRead for ColorDyeTableRow {
	type Args<'a> = ();

	fn read_options<R: Read + Seek>(reader: &mut R, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<Self> {
		Ok(Self{data: u16::read_options(reader, endian, ())?})
	}
}

impl BinWrite for ColorDyeTableRow {
	type Args<'a> = ();

	fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<()> {
		self.data.write_options(writer, endian, ())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorDyeTable {
	pub rows: [ColorDyeTableRow; ROW_COUNT],
}

impl ColorDyeTable {
	pub const SIZE: usize = ColorDyeTableRow::SIZE * ROW_COUNT;

	pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
		FormatError::read(Self::SIZE, bytes)
	}

	pub fn write(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		for (i, row) in self.rows.iter().enumerate() {
			bytes[i * ColorDyeTableRow::SIZE..(i + 1) * ColorDyeTableRow::SIZE].copy_from_slice(&row.write());
		}

		bytes
	}
}

impl BinRead for ColorDyeTable {
	type Args<'a> = ();

	fn read_options<R: Read + Seek>(reader: &mut R, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<Self> {
		Ok(Self{rows: <[ColorDyeTableRow; ROW_COUNT]>::read_options(reader, endian, ())?})
	}
}

impl BinWrite for ColorDyeTable {
	type Args<'a> = ();

	fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<()> {
		self.rows.write_options(writer, endian, ())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::half_ext::HALF_EPSILON;

	fn pattern(len: usize) -> Vec<u8> {
		(0..len).map(|i| (i * 37 + 11) as u8).collect()
	}

	#[test]
	fn tables_round_trip_bit_exact() {
		let bytes = pattern(ColorTable::SIZE);
		assert_eq!(ColorTable::parse(&bytes).unwrap().write().to_vec(), bytes);

		let bytes = pattern(ColorDyeTable::SIZE);
		assert_eq!(ColorDyeTable::parse(&bytes).unwrap().write().to_vec(), bytes);
	}

	#[test]
	fn short_buffers_are_rejected() {
		assert_eq!(ColorTable::parse(&[0; 511]), Err(FormatError{expected: 512, actual: 511}));
		assert_eq!(ColorTableRow::parse(&[0; 31]), Err(FormatError{expected: 32, actual: 31}));
		assert_eq!(ColorDyeTable::parse(&[0; 10]), Err(FormatError{expected: 64, actual: 10}));
		assert!(ColorDyeTableRow::parse(&[1]).is_err());
	}

	#[test]
	fn zeroed_table_reads_black_and_floors_gloss_on_rewrite() {
		let mut table = ColorTable::parse(&[0; ColorTable::SIZE]).unwrap();
		assert_eq!(table.rows.len(), 32);
		for row in table.rows.iter_mut() {
			assert_eq!(row.tile_set(), 0);
			assert_eq!(row.diffuse(), glam::Vec3::ZERO);
			assert_eq!(row.specular(), glam::Vec3::ZERO);
			assert_eq!(row.emissive(), glam::Vec3::ZERO);
			assert_eq!(row.gloss_strength(), 0.0);

			assert!(row.normalize());
			assert_eq!(row.gloss_strength(), HALF_EPSILON);
			assert_eq!(row.tile_set(), 0);
			assert_eq!(row.diffuse(), glam::Vec3::ZERO);
		}
	}

	#[test]
	fn setters_only_report_changes_after_rounding() {
		let mut row = ColorTableRow::default();
		row.set_specular_strength(0.1);
		// 0.1 and 0.100001 land on the same half
		assert!(!row.set_specular_strength(0.100001));
		assert!(row.set_specular_strength(0.2));
		assert!(!row.set_diffuse(row.diffuse()));
	}

	#[test]
	fn gloss_is_floored() {
		let mut row = ColorTableRow::default();
		for v in [0.0, -5.0, -0.0] {
			row.set_gloss_strength(v);
			assert_eq!(row.gloss_strength(), HALF_EPSILON);
			assert_ne!(row.gloss_strength(), 0.0);
		}
	}

	#[test]
	fn tile_set_round_trips_and_clamps() {
		let mut row = ColorTableRow::default();
		for tile in 0..64 {
			row.set_tile_set(tile);
			assert_eq!(row.tile_set(), tile);
		}
		row.set_tile_set(200);
		assert_eq!(row.tile_set(), 63);
	}

	#[test]
	fn repeat_and_skew_use_their_own_halves() {
		let mut row = ColorTableRow::parse(&[0; 32]).unwrap();
		row.set_material_repeat(glam::vec2(1.0, 2.0));
		row.set_material_skew(glam::vec2(3.0, 4.0));
		let raw = row.raw();
		assert_eq!(f16::from_bits(raw[12]).to_f32(), 1.0);
		assert_eq!(f16::from_bits(raw[15]).to_f32(), 2.0);
		assert_eq!(f16::from_bits(raw[13]).to_f32(), 3.0);
		assert_eq!(f16::from_bits(raw[14]).to_f32(), 4.0);
	}

	#[test]
	fn dye_row_flags_and_template() {
		let mut row = ColorDyeTableRow::parse(&[0, 0]).unwrap();
		assert!(row.set_template(300));
		assert!(row.set_diffuse(true));
		assert!(row.set_gloss(true));
		assert!(!row.set_gloss(true));
		assert_eq!(row.template(), 300);
		assert!(row.diffuse() && row.gloss());
		assert!(!row.specular() && !row.emissive() && !row.specular_strength());
		assert_eq!(row.raw(), 300 << 5 | 0x01 | 0x08);

		row.set_template(u16::MAX);
		assert_eq!(row.template(), ColorDyeTableRow::MAX_TEMPLATE);
		assert!(row.diffuse());
	}
}
