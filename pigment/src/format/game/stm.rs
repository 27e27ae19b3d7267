use std::{collections::BTreeMap, io::{Cursor, Read, Seek, Write}};
use binrw::{BinRead, BinWrite};
use glam::Vec3;
use half::f16;
use crate::{SimpleReader, SizeError};

pub const EXT: &'static [&'static str] = &["stm"];

pub type Error = binrw::Error;

pub const MAGIC: u16 = 0x534D;
/// Stains per template, stain ids are 1 based
pub const STAIN_COUNT: usize = 128;

/// Resolved dye values for a single template and stain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DyePack {
	pub diffuse: Vec3,
	pub specular: Vec3,
	pub emissive: Vec3,
	pub gloss: f32,
	pub specular_power: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stm {
	pub version: u16,
	pub unknown: u16,
	pub templates: BTreeMap<u16, Template>,
}

impl Stm {
	pub fn template(&self, id: u16) -> Option<&Template> {
		self.templates.get(&id)
	}

	/// None if the template does not exist or the stain is 0 (undyed) or out of range
	pub fn dye_pack(&self, template: u16, stain: u8) -> Option<DyePack> {
		self.template(template)?.dye_pack(stain)
	}
}

impl BinRead for Stm {
	type Args<'a> = ();

	fn read_options<R: Read + Seek>(reader: &mut R, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<Self> {
		let mut r = SimpleReader::new(reader, endian);

		if r.read::<u16>()? != MAGIC {
			return r.fail("not a staining template");
		}

		let version = r.read::<u16>()?;
		let count = r.read::<u16>()? as usize;
		let unknown = r.read::<u16>()?;
		let keys = r.read_vec::<u16>(count)?;
		let offsets = r.read_vec::<u16>(count)?;
		let data = r.rest()?;

		let mut templates = BTreeMap::new();
		for (key, offset) in keys.into_iter().zip(offsets) {
			match Template::decode(&data[(offset as usize * 2).min(data.len())..], endian) {
				Ok(template) => {templates.insert(key, template);}
				Err(e) => return r.fail(format!("template {key} is malformed: {e}")),
			}
		}

		Ok(Self {
			version,
			unknown,
			templates,
		})
	}
}

impl BinWrite for Stm {
	type Args<'a> = ();

	fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<()> {
		let mut data = Cursor::new(Vec::new());
		let mut offsets = Vec::with_capacity(self.templates.len());
		for template in self.templates.values() {
			offsets.push(SizeError::u16("staining template data", data.get_ref().len() / 2)?);
			template.encode(&mut data, endian)?;
		}

		MAGIC.write_options(writer, endian, ())?;
		self.version.write_options(writer, endian, ())?;
		SizeError::u16("staining templates", self.templates.len())?.write_options(writer, endian, ())?;
		self.unknown.write_options(writer, endian, ())?;
		for key in self.templates.keys() {
			key.write_options(writer, endian, ())?;
		}
		offsets.write_options(writer, endian, ())?;
		writer.write_all(data.get_ref())?;

		Ok(())
	}
}

impl ironworks::file::File for Stm {
	fn read(mut data: impl ironworks::FileStream) -> Result<Self, ironworks::Error> {
		Stm::read_le(&mut data).map_err(|e| ironworks::Error::Resource(e.into()))
	}
}

impl crate::format::external::Bytes for Stm {
	fn read<T>(reader: &mut T) -> Result<Self, crate::Error>
	where T: Read + Seek {
		Ok(Stm::read_le(reader)?)
	}

	fn write<T>(&self, writer: &mut T) -> Result<(), crate::Error> where
	T: Write + Seek {
		self.write_le(writer)?;

		Ok(())
	}
}

impl super::Extension for Stm {
	const EXT: &'static [&'static str] = EXT;
}

// ----------

/// Per stain values of one template, every array holds `STAIN_COUNT` entries
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
	pub diffuse: Vec<[f16; 3]>,
	pub specular: Vec<[f16; 3]>,
	pub emissive: Vec<[f16; 3]>,
	pub gloss: Vec<f16>,
	pub specular_power: Vec<f16>,
}

impl Default for Template {
	fn default() -> Self {
		Self {
			diffuse: vec![[f16::ZERO; 3]; STAIN_COUNT],
			specular: vec![[f16::ZERO; 3]; STAIN_COUNT],
			emissive: vec![[f16::ZERO; 3]; STAIN_COUNT],
			gloss: vec![f16::ZERO; STAIN_COUNT],
			specular_power: vec![f16::ZERO; STAIN_COUNT],
		}
	}
}

impl Template {
	pub fn dye_pack(&self, stain: u8) -> Option<DyePack> {
		let i = (stain as usize).checked_sub(1)?;
		let vec3 = |v: &[f16; 3]| Vec3::new(v[0].to_f32(), v[1].to_f32(), v[2].to_f32());

		Some(DyePack {
			diffuse: vec3(self.diffuse.get(i)?),
			specular: vec3(self.specular.get(i)?),
			emissive: vec3(self.emissive.get(i)?),
			gloss: self.gloss.get(i)?.to_f32(),
			specular_power: self.specular_power.get(i)?.to_f32(),
		})
	}

	pub fn set_dye_pack(&mut self, stain: u8, pack: &DyePack) -> bool {
		let Some(i) = (stain as usize).checked_sub(1) else {return false};
		if i >= STAIN_COUNT {return false}
		let vec3 = |v: Vec3| [f16::from_f32(v.x), f16::from_f32(v.y), f16::from_f32(v.z)];

		self.diffuse[i] = vec3(pack.diffuse);
		self.specular[i] = vec3(pack.specular);
		self.emissive[i] = vec3(pack.emissive);
		self.gloss[i] = f16::from_f32(pack.gloss);
		self.specular_power[i] = f16::from_f32(pack.specular_power);
		true
	}

	/// `data` starts at the template's array ends
	fn decode(data: &[u8], endian: binrw::Endian) -> binrw::BinResult<Self> {
		let mut cursor = Cursor::new(data);
		let mut r = SimpleReader::new(&mut cursor, endian);
		let ends = r.read::<[u16; 5]>()?;

		let mut start = 0;
		let mut sections = Vec::with_capacity(ends.len());
		for end in ends {
			let end = end as usize * 2;
			if end < start {
				return r.fail("array ends are out of order");
			}

			sections.push(r.bytes(end - start)?);
			start = end;
		}

		Ok(Self {
			diffuse: decode_array(&sections[0], endian)?,
			specular: decode_array(&sections[1], endian)?,
			emissive: decode_array(&sections[2], endian)?,
			gloss: decode_array(&sections[3], endian)?,
			specular_power: decode_array(&sections[4], endian)?,
		})
	}

	fn encode<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian) -> binrw::BinResult<()> {
		let mut arrays = Cursor::new(Vec::new());
		let mut ends = [0u16; 5];
		encode_array(&self.diffuse, &mut arrays, endian)?;
		ends[0] = SizeError::u16("template", arrays.get_ref().len() / 2)?;
		encode_array(&self.specular, &mut arrays, endian)?;
		ends[1] = SizeError::u16("template", arrays.get_ref().len() / 2)?;
		encode_array(&self.emissive, &mut arrays, endian)?;
		ends[2] = SizeError::u16("template", arrays.get_ref().len() / 2)?;
		encode_array(&self.gloss, &mut arrays, endian)?;
		ends[3] = SizeError::u16("template", arrays.get_ref().len() / 2)?;
		encode_array(&self.specular_power, &mut arrays, endian)?;
		ends[4] = SizeError::u16("template", arrays.get_ref().len() / 2)?;

		ends.write_options(writer, endian, ())?;
		writer.write_all(arrays.get_ref())?;
		Ok(())
	}
}

// ----------

trait StainValue: Copy {
	const SIZE: usize;
	fn read<R: Read + Seek>(r: &mut SimpleReader<R>) -> binrw::BinResult<Self>;
	fn write<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian) -> binrw::BinResult<()>;
	fn bits(&self) -> u64;
	fn default() -> Self;
}

impl StainValue for f16 {
	const SIZE: usize = 2;

	fn read<R: Read + Seek>(r: &mut SimpleReader<R>) -> binrw::BinResult<Self> {Ok(f16::from_bits(r.read::<u16>()?))}
	fn write<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian) -> binrw::BinResult<()> {self.to_bits().write_options(writer, endian, ())}
	fn bits(&self) -> u64 {self.to_bits() as u64}
	fn default() -> Self {f16::ZERO}
}

impl StainValue for [f16; 3] {
	const SIZE: usize = 6;

	fn read<R: Read + Seek>(r: &mut SimpleReader<R>) -> binrw::BinResult<Self> {
		Ok(r.read::<[u16; 3]>()?.map(f16::from_bits))
	}

	fn write<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian) -> binrw::BinResult<()> {
		self.map(|v| v.to_bits()).write_options(writer, endian, ())
	}

	fn bits(&self) -> u64 {
		(self[0].to_bits() as u64) | (self[1].to_bits() as u64) << 16 | (self[2].to_bits() as u64) << 32
	}

	fn default() -> Self {[f16::ZERO; 3]}
}

/// Arrays come in four shapes: empty (all default), a single repeated value,
/// every stain spelled out, or a palette followed by one index byte per stain
fn decode_array<T: StainValue>(data: &[u8], endian: binrw::Endian) -> binrw::BinResult<Vec<T>> {
	let len = data.len();
	let mut cursor = Cursor::new(data);
	let mut r = SimpleReader::new(&mut cursor, endian);

	if len == 0 {
		return Ok(vec![T::default(); STAIN_COUNT]);
	}

	if len == T::SIZE {
		return Ok(vec![T::read(&mut r)?; STAIN_COUNT]);
	}

	if len == T::SIZE * STAIN_COUNT {
		return (0..STAIN_COUNT).map(|_| T::read(&mut r)).collect();
	}

	let Some(palette_len) = len.checked_sub(STAIN_COUNT).filter(|v| v % T::SIZE == 0) else {
		return r.fail(format!("{len} bytes do not form a stain array"));
	};

	let palette = (0..palette_len / T::SIZE).map(|_| T::read(&mut r)).collect::<binrw::BinResult<Vec<_>>>()?;
	Ok(r.bytes(STAIN_COUNT)?.into_iter().map(|i| match i {
		0 | 255 => T::default(),
		i => palette.get(i as usize - 1).copied().unwrap_or_else(T::default),
	}).collect())
}

/// Picks the smallest shape that reads back unambiguously
fn encode_array<T: StainValue, W: Write + Seek>(values: &[T], writer: &mut W, endian: binrw::Endian) -> binrw::BinResult<()> {
	let default = T::default().bits();
	if values.iter().all(|v| v.bits() == default) {return Ok(())}

	if values.len() == STAIN_COUNT && values.iter().all(|v| v.bits() == values[0].bits()) {
		return values[0].write(writer, endian);
	}

	let mut palette = Vec::<T>::new();
	let mut indices = Vec::with_capacity(STAIN_COUNT);
	for v in values {
		if v.bits() == default {
			indices.push(0u8);
			continue;
		}

		match palette.iter().position(|p| p.bits() == v.bits()) {
			Some(i) => indices.push(i as u8 + 1),
			None => {
				palette.push(*v);
				indices.push(palette.len().min(254) as u8);
			}
		}
	}

	if values.len() == STAIN_COUNT && palette.len() < 254 && palette.len() * T::SIZE + STAIN_COUNT < T::SIZE * STAIN_COUNT {
		for v in &palette {
			v.write(writer, endian)?;
		}
		writer.write_all(&indices)?;
	} else {
		for v in values {
			v.write(writer, endian)?;
		}
	}

	Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
	use crate::format::external::Bytes;
	use super::*;

	fn h(v: f32) -> f16 {f16::from_f32(v)}

	/// Template 7 dyes diffuse red for stain 1 and blue for stain 2, everything else zero
	pub(crate) fn sample() -> Stm {
		let mut template = Template::default();
		template.diffuse[0] = [h(1.0), h(0.0), h(0.0)];
		template.diffuse[1] = [h(0.0), h(0.0), h(1.0)];
		template.specular = vec![[h(0.5), h(0.5), h(0.5)]; STAIN_COUNT];
		template.gloss = (0..STAIN_COUNT).map(|v| h(v as f32)).collect();
		template.specular_power[4] = h(2.0);

		let mut stm = Stm {
			version: 0x0101,
			unknown: 0,
			templates: BTreeMap::new(),
		};
		stm.templates.insert(7, template);
		stm.templates.insert(9, Template::default());
		stm
	}

	#[test]
	fn write_then_parse_keeps_everything() {
		let stm = sample();
		let bytes = stm.to_bytes().unwrap();
		let parsed = Stm::from_bytes(&bytes).unwrap();
		assert_eq!(parsed, stm);
		assert_eq!(parsed.to_bytes().unwrap(), bytes);
	}

	fn encoded_len<T: StainValue>(values: &[T]) -> usize {
		let mut data = Cursor::new(Vec::new());
		encode_array(values, &mut data, binrw::Endian::Little).unwrap();
		let len = data.get_ref().len();
		assert_eq!(decode_array::<T>(data.get_ref(), binrw::Endian::Little).unwrap().iter().map(|v| v.bits()).collect::<Vec<_>>(), values.iter().map(|v| v.bits()).collect::<Vec<_>>());
		len
	}

	#[test]
	fn arrays_pick_compact_shapes() {
		assert_eq!(encoded_len(&vec![f16::ZERO; STAIN_COUNT]), 0);
		assert_eq!(encoded_len(&vec![h(0.5); STAIN_COUNT]), 2);

		let sample = sample();
		assert_eq!(encoded_len(&sample.templates[&7].diffuse), 2 * 6 + STAIN_COUNT);

		// 128 distinct halves, a palette would not be smaller
		assert_eq!(encoded_len(&sample.templates[&7].gloss), 2 * STAIN_COUNT);
	}

	#[test]
	fn palette_indices_decode() {
		let mut data = h(3.0).to_bits().to_le_bytes().to_vec();
		let mut indices = vec![0u8; STAIN_COUNT];
		indices[0] = 1;
		indices[1] = 255;
		indices[2] = 1;
		data.extend_from_slice(&indices);

		let values = decode_array::<f16>(&data, binrw::Endian::Little).unwrap();
		assert_eq!(values[0], h(3.0));
		assert_eq!(values[1], f16::ZERO);
		assert_eq!(values[2], h(3.0));
		assert_eq!(values[3], f16::ZERO);

		assert!(decode_array::<[f16; 3]>(&[0; 131], binrw::Endian::Little).is_err());
		assert!(Template::decode(&[2, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], binrw::Endian::Little).is_err());
	}

	#[test]
	fn dye_packs_resolve_by_stain() {
		let stm = sample();
		let pack = stm.dye_pack(7, 2).unwrap();
		assert_eq!(pack.diffuse, Vec3::new(0.0, 0.0, 1.0));
		assert_eq!(pack.specular, Vec3::splat(0.5));
		assert_eq!(pack.gloss, 1.0);
		assert_eq!(stm.dye_pack(7, 5).unwrap().specular_power, 2.0);

		assert!(stm.dye_pack(7, 0).is_none());
		assert!(stm.dye_pack(7, 129).is_none());
		assert!(stm.dye_pack(8, 1).is_none());
	}

	#[test]
	fn rejects_other_files() {
		assert!(Stm::from_bytes(&[0x4D, 0x44, 0, 0, 0, 0, 0, 0]).is_err());
		let bytes = sample().to_bytes().unwrap();
		assert!(Stm::from_bytes(&bytes[..bytes.len() - 20]).is_err());
	}
}
