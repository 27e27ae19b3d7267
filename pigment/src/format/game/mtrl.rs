use std::{io::{Read, Seek, Write}, ops::Range};
use binrw::{BinRead, BinWrite};
use crate::{NullReader, SimpleReader, SizeError};

pub mod colortable;
pub use colortable::{FormatError, ColorTable, ColorTableRow, ColorDyeTable, ColorDyeTableRow};

pub const EXT: &'static [&'static str] = &["mtrl"];

pub const VERSION: u32 = 0x01030000;
/// Texture index of a sampler that has no texture assigned
pub const NO_TEXTURE: u8 = 255;

pub type Error = binrw::Error;

// ----------

#[derive(Debug, Clone, PartialEq)]
pub struct Mtrl {
	pub version: u32,
	pub shader: String,
	pub textures: Vec<Texture>,
	pub uvsets: Vec<UvSet>,
	pub colorsets: Vec<ColorSetInfo>,
	pub additional_data: Vec<u8>,
	pub data_set: DataSet,
	pub shader_keys: Vec<ShaderKey>,
	pub constants: Vec<Constant>,
	pub samplers: Vec<Sampler>,
	/// Flat value storage the constants point into
	pub values: Vec<f32>,
	pub shader_flags: u32,
}

impl Mtrl {
	pub fn new(shader: impl Into<String>) -> Self {
		Self {
			version: VERSION,
			shader: shader.into(),
			textures: Vec::new(),
			uvsets: Vec::new(),
			colorsets: Vec::new(),
			additional_data: Vec::new(),
			data_set: DataSet::None,
			shader_keys: Vec::new(),
			constants: Vec::new(),
			samplers: Vec::new(),
			values: Vec::new(),
			shader_flags: 0,
		}
	}

	pub fn color_table(&self) -> Option<&ColorTable> {
		match &self.data_set {
			DataSet::Legacy{table, ..} => Some(table),
			_ => None,
		}
	}

	pub fn dye_table(&self) -> Option<&ColorDyeTable> {
		match &self.data_set {
			DataSet::Legacy{dyes, ..} => dyes.as_ref(),
			_ => None,
		}
	}

	pub fn tables_mut(&mut self) -> Option<(&mut ColorTable, Option<&mut ColorDyeTable>)> {
		match &mut self.data_set {
			DataSet::Legacy{table, dyes} => Some((table, dyes.as_mut())),
			_ => None,
		}
	}

	pub fn constant(&self, id: u32) -> Option<&Constant> {
		self.constants.iter().find(|v| v.id == id)
	}

	pub fn constant_values(&self, id: u32) -> Option<&[f32]> {
		let range = self.constant(id)?.value_range()?;
		self.values.get(range)
	}

	pub fn constant_values_mut(&mut self, id: u32) -> Option<&mut [f32]> {
		let range = self.constant(id)?.value_range()?;
		self.values.get_mut(range)
	}

	/// Appends a constant with its own storage at the end of the value array,
	/// replaces the values in place if the id is already present
	pub fn add_constant(&mut self, id: u32, values: &[f32]) -> Result<&Constant, SizeError> {
		if let Some(i) = self.constants.iter().position(|v| v.id == id) {
			if let Some(range) = self.constants[i].value_range() {
				if range.len() == values.len() && range.end <= self.values.len() {
					self.values[range].copy_from_slice(values);
					return Ok(&self.constants[i]);
				}
			}
			self.constants.remove(i);
		}

		let byte_offset = SizeError::u16("constant offset", self.values.len() * 4)?;
		let byte_size = SizeError::u16("constant size", values.len() * 4)?;
		SizeError::u16("constant values", (self.values.len() + values.len()) * 4)?;
		self.values.extend_from_slice(values);
		self.constants.push(Constant{id, byte_offset, byte_size});
		Ok(&self.constants[self.constants.len() - 1])
	}

	pub fn sampler(&self, id: u32) -> Option<&Sampler> {
		self.samplers.iter().find(|v| v.id == id)
	}

	pub fn sampler_texture(&self, sampler: &Sampler) -> Option<&Texture> {
		if sampler.texture_index == NO_TEXTURE {return None}
		self.textures.get(sampler.texture_index as usize)
	}

	pub fn shader_key(&self, category: u32) -> Option<u32> {
		self.shader_keys.iter().find(|v| v.category == category).map(|v| v.value)
	}

	pub fn set_shader_key(&mut self, category: u32, value: u32) {
		match self.shader_keys.iter_mut().find(|v| v.category == category) {
			Some(key) => key.value = value,
			None => self.shader_keys.push(ShaderKey{category, value}),
		}
	}

	/// String pool laid out as textures, uv sets, color sets, shader, each nul terminated.
	/// Returns the pool alongside the offsets in that same order
	fn build_strings(&self) -> Result<(Vec<u8>, Vec<u16>), SizeError> {
		let mut strings = Vec::new();
		let mut offsets = Vec::new();
		let names = self.textures.iter().map(|v| &v.path)
			.chain(self.uvsets.iter().map(|v| &v.name))
			.chain(self.colorsets.iter().map(|v| &v.name))
			.chain(std::iter::once(&self.shader));

		for name in names {
			offsets.push(SizeError::u16("string offset", strings.len())?);
			strings.extend_from_slice(name.as_bytes());
			strings.push(0);
		}

		while strings.len() % 4 != 0 {
			strings.push(0);
		}

		SizeError::u16("strings", strings.len())?;
		Ok((strings, offsets))
	}
}

impl BinRead for Mtrl {
	type Args<'a> = ();

	fn read_options<R: Read + Seek>(reader: &mut R, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<Self> {
		let mut r = SimpleReader::new(reader, endian);

		let version = r.read::<u32>()?;
		let _file_size = r.read::<u16>()?;
		let data_set_size = r.read::<u16>()?;
		let strings_size = r.read::<u16>()?;
		let shader_name_offset = r.read::<u16>()?;
		let texture_count = r.read::<u8>()?;
		let uvset_count = r.read::<u8>()?;
		let colorset_count = r.read::<u8>()?;
		let additional_data_size = r.read::<u8>()?;

		let texture_infos = r.read_vec::<[u16; 2]>(texture_count as usize)?; // name offset, flags
		let uvset_infos = r.read_vec::<[u16; 2]>(uvset_count as usize)?; // name offset, index
		let colorset_infos = r.read_vec::<[u16; 2]>(colorset_count as usize)?; // name offset, index
		let strings = r.bytes(strings_size as usize)?;
		let additional_data = r.bytes(additional_data_size as usize)?;

		let data_set = match data_set_size as usize {
			0 => DataSet::None,
			ColorTable::SIZE => DataSet::Legacy {
				table: r.read::<ColorTable>()?,
				dyes: None,
			},
			DataSet::LEGACY_DYED_SIZE => DataSet::Legacy {
				table: r.read::<ColorTable>()?,
				dyes: Some(r.read::<ColorDyeTable>()?),
			},
			size => DataSet::Opaque(r.bytes(size)?),
		};

		let values_size = r.read::<u16>()?;
		let shader_key_count = r.read::<u16>()?;
		let constant_count = r.read::<u16>()?;
		let sampler_count = r.read::<u16>()?;
		let shader_flags = r.read::<u32>()?;

		let shader_keys = r.read_vec::<ShaderKey>(shader_key_count as usize)?;
		let constants = r.read_vec::<Constant>(constant_count as usize)?;
		let samplers = r.read_vec::<Sampler>(sampler_count as usize)?;
		if values_size % 4 != 0 {
			return r.fail(format!("constant value size {values_size} is not a multiple of 4"));
		}
		let values = r.read_vec::<f32>(values_size as usize / 4)?;

		let mut string = |offset: u16| -> binrw::BinResult<String> {
			match strings.get(offset as usize..).map(|v| v.null_terminated()) {
				Some(Ok(v)) => Ok(v),
				Some(Err(e)) => r.fail(format!("string at {offset} is invalid: {e}")),
				None => r.fail(format!("string offset {offset} is past the string pool")),
			}
		};

		let mut textures = Vec::with_capacity(texture_infos.len());
		for [offset, flags] in texture_infos {
			textures.push(Texture{path: string(offset)?, flags});
		}

		let mut uvsets = Vec::with_capacity(uvset_infos.len());
		for [offset, index] in uvset_infos {
			uvsets.push(UvSet{name: string(offset)?, index});
		}

		let mut colorsets = Vec::with_capacity(colorset_infos.len());
		for [offset, index] in colorset_infos {
			colorsets.push(ColorSetInfo{name: string(offset)?, index});
		}

		Ok(Self {
			version,
			shader: string(shader_name_offset)?,
			textures,
			uvsets,
			colorsets,
			additional_data,
			data_set,
			shader_keys,
			constants,
			samplers,
			values,
			shader_flags,
		})
	}
}

impl BinWrite for Mtrl {
	type Args<'a> = ();

	fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<()> {
		let (strings, offsets) = self.build_strings()?;
		// the shader name is the last string in the pool
		let shader_offset = offsets.last().copied().unwrap_or(0);
		let mut offsets = offsets.into_iter();
		let data_set_size = self.data_set.size();
		let values_size = SizeError::u16("constant values", self.values.len() * 4)?;

		let file_size = 16
			+ 4 * (self.textures.len() + self.uvsets.len() + self.colorsets.len())
			+ strings.len()
			+ self.additional_data.len()
			+ data_set_size
			+ 12
			+ 8 * (self.shader_keys.len() + self.constants.len())
			+ 12 * self.samplers.len()
			+ values_size as usize;

		self.version.write_options(writer, endian, ())?;
		// only the lower 16 bits fit, the game does not read this
		(file_size as u16).write_options(writer, endian, ())?;
		SizeError::u16("data set", data_set_size)?.write_options(writer, endian, ())?;
		(strings.len() as u16).write_options(writer, endian, ())?;
		shader_offset.write_options(writer, endian, ())?;
		SizeError::u8("textures", self.textures.len())?.write_options(writer, endian, ())?;
		SizeError::u8("uv sets", self.uvsets.len())?.write_options(writer, endian, ())?;
		SizeError::u8("color sets", self.colorsets.len())?.write_options(writer, endian, ())?;
		SizeError::u8("additional data", self.additional_data.len())?.write_options(writer, endian, ())?;

		for texture in &self.textures {
			[offsets.next().unwrap_or(0), texture.flags].write_options(writer, endian, ())?;
		}

		for uvset in &self.uvsets {
			[offsets.next().unwrap_or(0), uvset.index].write_options(writer, endian, ())?;
		}

		for colorset in &self.colorsets {
			[offsets.next().unwrap_or(0), colorset.index].write_options(writer, endian, ())?;
		}

		writer.write_all(&strings)?;
		writer.write_all(&self.additional_data)?;

		match &self.data_set {
			DataSet::None => {}
			DataSet::Legacy{table, dyes} => {
				table.write_options(writer, endian, ())?;
				if let Some(dyes) = dyes {
					dyes.write_options(writer, endian, ())?;
				}
			}
			DataSet::Opaque(data) => writer.write_all(data)?,
		}

		values_size.write_options(writer, endian, ())?;
		SizeError::u16("shader keys", self.shader_keys.len())?.write_options(writer, endian, ())?;
		SizeError::u16("constants", self.constants.len())?.write_options(writer, endian, ())?;
		SizeError::u16("samplers", self.samplers.len())?.write_options(writer, endian, ())?;
		self.shader_flags.write_options(writer, endian, ())?;

		self.shader_keys.write_options(writer, endian, ())?;
		self.constants.write_options(writer, endian, ())?;
		self.samplers.write_options(writer, endian, ())?;
		self.values.write_options(writer, endian, ())?;

		Ok(())
	}
}

impl ironworks::file::File for Mtrl {
	fn read(mut data: impl ironworks::FileStream) -> Result<Self, ironworks::Error> {
		Mtrl::read_le(&mut data).map_err(|e| ironworks::Error::Resource(e.into()))
	}
}

impl crate::format::external::Bytes for Mtrl {
	fn read<T>(reader: &mut T) -> Result<Self, crate::Error>
	where T: Read + Seek {
		Ok(Mtrl::read_le(reader)?)
	}

	fn write<T>(&self, writer: &mut T) -> Result<(), crate::Error> where
	T: Write + Seek {
		self.write_le(writer)?;

		Ok(())
	}
}

impl super::Extension for Mtrl {
	const EXT: &'static [&'static str] = EXT;
}

// ----------

#[derive(Debug, Clone, PartialEq)]
pub enum DataSet {
	None,
	Legacy {
		table: ColorTable,
		dyes: Option<ColorDyeTable>,
	},
	/// Layouts we do not edit, kept byte for byte
	Opaque(Vec<u8>),
}

impl DataSet {
	pub const LEGACY_DYED_SIZE: usize = ColorTable::SIZE + ColorDyeTable::SIZE;

	pub fn size(&self) -> usize {
		match self {
			DataSet::None => 0,
			DataSet::Legacy{dyes: None, ..} => ColorTable::SIZE,
			DataSet::Legacy{dyes: Some(_), ..} => Self::LEGACY_DYED_SIZE,
			DataSet::Opaque(data) => data.len(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
	pub path: String,
	pub flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UvSet {
	pub name: String,
	pub index: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorSetInfo {
	pub name: String,
	pub index: u16,
}

#[binrw::binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderKey {
	pub category: u32,
	pub value: u32,
}

/// Declares which slice of the value array belongs to a shader constant
#[binrw::binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constant {
	pub id: u32,
	pub byte_offset: u16,
	pub byte_size: u16,
}

impl Constant {
	pub fn is_aligned(&self) -> bool {
		self.byte_offset & 0x3 == 0 && self.byte_size & 0x3 == 0
	}

	/// Range in float units, None if the constant does not address whole floats
	pub fn value_range(&self) -> Option<Range<usize>> {
		if !self.is_aligned() {return None}
		let start = self.byte_offset as usize >> 2;
		Some(start..start + (self.byte_size as usize >> 2))
	}
}

#[binrw::binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sampler {
	pub id: u32,
	pub flags: u32,
	pub texture_index: u8,
	pub padding: [u8; 3],
}

impl Sampler {
	pub fn new(id: u32, texture_index: u8) -> Self {
		Self {
			id,
			// wrap on both axes, the default for most materials
			flags: 0x000F8340,
			texture_index,
			padding: [0; 3],
		}
	}

	pub fn u_address_mode(&self) -> AddressMode {
		(self.flags & 0x3).into()
	}

	pub fn set_u_address_mode(&mut self, mode: AddressMode) {
		self.flags = (self.flags & !0x3) | mode as u32;
	}

	pub fn v_address_mode(&self) -> AddressMode {
		(self.flags >> 2 & 0x3).into()
	}

	pub fn set_v_address_mode(&mut self, mode: AddressMode) {
		self.flags = (self.flags & !0xC) | (mode as u32) << 2;
	}

	/// Signed 10 bit value in 1/64 steps
	pub fn lod_bias(&self) -> f32 {
		((self.flags as i32) << 12 >> 22) as f32 / 64.0
	}

	pub fn set_lod_bias(&mut self, bias: f32) {
		let raw = ((bias * 64.0).round() as i32).clamp(-512, 511) as u32 & 0x3FF;
		self.flags = (self.flags & !(0x3FF << 10)) | raw << 10;
	}

	pub fn min_lod(&self) -> u32 {
		self.flags >> 20 & 0xF
	}

	pub fn set_min_lod(&mut self, lod: u32) {
		self.flags = (self.flags & !(0xF << 20)) | (lod.min(15) << 20);
	}
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
	Wrap   = 0,
	Mirror = 1,
	Clamp  = 2,
	Border = 3,
}

impl From<u32> for AddressMode {
	fn from(value: u32) -> Self {
		match value & 0x3 {
			0 => Self::Wrap,
			1 => Self::Mirror,
			2 => Self::Clamp,
			_ => Self::Border,
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use std::io::Cursor;
	use crate::format::external::Bytes;
	use super::*;

	pub(crate) fn sample() -> Mtrl {
		let mut mtrl = Mtrl::new("character.shpk");
		mtrl.textures.push(Texture{path: "chara/equipment/e0001/texture/v01_c0101e0001_top_n.tex".to_string(), flags: 0});
		mtrl.textures.push(Texture{path: "chara/equipment/e0001/texture/v01_c0101e0001_top_m.tex".to_string(), flags: 0x8000});
		mtrl.uvsets.push(UvSet{name: "uvSet0".to_string(), index: 0});
		mtrl.colorsets.push(ColorSetInfo{name: "colorSet1".to_string(), index: 0});
		mtrl.additional_data = vec![0x34, 0x05, 0, 0];
		mtrl.data_set = DataSet::Legacy{table: ColorTable::default(), dyes: Some(ColorDyeTable::default())};
		mtrl.set_shader_key(0xB616DC5A, 0x5CC605B5);
		mtrl.add_constant(0x2C2A34DD, &[1.0, 0.5, 0.25]).unwrap();
		mtrl.add_constant(0x29AC0223, &[0.5]).unwrap();
		mtrl.samplers.push(Sampler::new(0x0C5EC1F1, 0));
		mtrl.samplers.push(Sampler::new(0x8A4E82B6, 1));
		mtrl.shader_flags = 0x0D;
		mtrl
	}

	#[test]
	fn write_then_parse_keeps_everything() {
		let mtrl = sample();
		let bytes = mtrl.to_bytes().unwrap();
		let parsed = Mtrl::from_bytes(&bytes).unwrap();
		assert_eq!(parsed, mtrl);
		assert_eq!(parsed.to_bytes().unwrap(), bytes);
	}

	#[test]
	fn header_describes_the_written_file() {
		let bytes = sample().to_bytes().unwrap();
		let mut r = Cursor::new(&bytes);
		assert_eq!(u32::read_le(&mut r).unwrap(), VERSION);
		assert_eq!(u16::read_le(&mut r).unwrap() as usize, bytes.len());
		assert_eq!(u16::read_le(&mut r).unwrap() as usize, DataSet::LEGACY_DYED_SIZE);
		let strings_size = u16::read_le(&mut r).unwrap();
		assert_eq!(strings_size % 4, 0);
	}

	#[test]
	fn unknown_data_sets_are_kept_verbatim() {
		let mut mtrl = sample();
		mtrl.data_set = DataSet::Opaque((0..2176).map(|v| v as u8).collect());
		let parsed = Mtrl::from_bytes(&mtrl.to_bytes().unwrap()).unwrap();
		assert_eq!(parsed.data_set, mtrl.data_set);
		assert!(parsed.color_table().is_none());
	}

	#[test]
	fn table_without_dyes() {
		let mut mtrl = sample();
		mtrl.data_set = DataSet::Legacy{table: ColorTable::default(), dyes: None};
		let parsed = Mtrl::from_bytes(&mtrl.to_bytes().unwrap()).unwrap();
		assert!(parsed.color_table().is_some());
		assert!(parsed.dye_table().is_none());
	}

	#[test]
	fn truncated_files_fail() {
		let bytes = sample().to_bytes().unwrap();
		assert!(Mtrl::from_bytes(&bytes[..bytes.len() - 3]).is_err());
		assert!(Mtrl::from_bytes(&bytes[..10]).is_err());
	}

	#[test]
	fn constant_values_follow_declarations() {
		let mut mtrl = sample();
		assert_eq!(mtrl.constant_values(0x2C2A34DD), Some(&[1.0, 0.5, 0.25][..]));
		assert_eq!(mtrl.constant(0x29AC0223).unwrap().byte_offset, 12);

		// same size replaces in place
		mtrl.add_constant(0x2C2A34DD, &[0.0, 0.0, 0.0]).unwrap();
		assert_eq!(mtrl.values.len(), 4);
		assert_eq!(mtrl.constant_values(0x2C2A34DD), Some(&[0.0, 0.0, 0.0][..]));

		mtrl.constants[0].byte_offset = 2;
		assert_eq!(mtrl.constant_values(0x2C2A34DD), None);
	}

	#[test]
	fn sampler_flags_decode() {
		let mut sampler = Sampler::new(1, 0);
		assert_eq!(sampler.u_address_mode(), AddressMode::Wrap);
		sampler.set_u_address_mode(AddressMode::Clamp);
		sampler.set_v_address_mode(AddressMode::Mirror);
		sampler.set_lod_bias(-1.5);
		sampler.set_min_lod(3);
		assert_eq!(sampler.u_address_mode(), AddressMode::Clamp);
		assert_eq!(sampler.v_address_mode(), AddressMode::Mirror);
		assert_eq!(sampler.lod_bias(), -1.5);
		assert_eq!(sampler.min_lod(), 3);
	}
}
