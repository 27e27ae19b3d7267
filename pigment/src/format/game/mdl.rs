use std::io::{Read, Seek, Write};
use binrw::{binrw, BinRead, BinWrite};
use crate::SimpleReader;

pub const EXT: &'static [&'static str] = &["mdl"];

pub type Error = binrw::Error;

pub const MAX_LODS: u8 = 3;
pub const HEADER_SIZE: usize = 0x44;
const ELEMENTS_PER_DECLARATION: usize = 17;

/// A model kept at header level, the mesh data is carried along untouched
#[derive(Debug, Clone, PartialEq)]
pub struct Mdl {
	pub header: Header,
	pub vertex_declarations: Vec<[VertexElement; ELEMENTS_PER_DECLARATION]>,
	pub string_count: u16,
	pub string_padding: u16,
	pub string_block: Vec<u8>,
	pub rest: Vec<u8>,
}

impl Mdl {
	pub fn strings(&self) -> Vec<String> {
		self.string_block
			.split(|v| *v == 0)
			.take(self.string_count as usize)
			.map(|v| String::from_utf8_lossy(v).into_owned())
			.collect()
	}

	/// Material paths as stored, mostly relative ones like `/mt_c0101e0001_top_a.mtrl`
	pub fn material_paths(&self) -> Vec<String> {
		self.strings()
			.into_iter()
			.filter(|v| v.ends_with(".mtrl"))
			.collect()
	}

	pub fn file_size(&self) -> usize {
		HEADER_SIZE
			+ self.vertex_declarations.len() * ELEMENTS_PER_DECLARATION * 8
			+ 8
			+ self.string_block.len()
			+ self.rest.len()
	}

	pub fn validate(&self) -> Vec<MdlIssue> {
		let mut issues = Vec::new();
		let h = &self.header;

		if h.lod_count > MAX_LODS {
			issues.push(MdlIssue::TooManyLods(h.lod_count));
		}

		if h.vertex_declaration_count as usize != self.vertex_declarations.len() {
			issues.push(MdlIssue::DeclarationCount{declared: h.vertex_declaration_count as usize, found: self.vertex_declarations.len()});
		}

		let found = self.string_block.split(|v| *v == 0).count().saturating_sub(1);
		if found < self.string_count as usize {
			issues.push(MdlIssue::StringCount{declared: self.string_count as usize, found});
		}

		let size = self.file_size() as u64;
		for lod in 0..(h.lod_count.min(MAX_LODS) as usize) {
			if h.vertex_offsets[lod] as u64 + h.vertex_buffer_sizes[lod] as u64 > size {
				issues.push(MdlIssue::VertexBufferOutOfBounds(lod));
			}

			if h.index_offsets[lod] as u64 + h.index_buffer_sizes[lod] as u64 > size {
				issues.push(MdlIssue::IndexBufferOutOfBounds(lod));
			}
		}

		issues
	}

	/// Turns the short material paths models store into full game paths
	pub fn absolute_material_path(model_path: &str, material_path: &str, variant: u16) -> String {
		// /mt_c0101e0001_top_a.mtrl
		let Some(name) = material_path.strip_prefix("/mt_").and_then(|v| v.get(0..10)).filter(|v| v.is_ascii()) else {
			return material_path.to_string();
		};
		let (kind1, id1, kind2, id2) = (&name[0..1], &name[1..5], &name[5..6], &name[6..10]);
		let version = format!("v{variant:04}");

		match (kind1, kind2) {
			("c", "e") => format!("chara/equipment/e{id2}/material/{version}{material_path}"),
			("c", "a") => format!("chara/accessory/a{id2}/material/{version}{material_path}"),
			("c", "b") => format!("chara/human/c{id1}/obj/body/b{id2}/material/{version}{material_path}"),
			("c", "h") => format!("chara/human/c{id1}/obj/hair/h{id2}/material/{version}{material_path}"),
			("c", "t") => format!("chara/human/c{id1}/obj/tail/t{id2}/material/{version}{material_path}"),
			("c", "f") => format!("chara/human/c{id1}/obj/face/f{id2}/material{material_path}"),
			("c", "z") => format!("chara/human/c{id1}/obj/zear/z{id2}/material{material_path}"),
			("d", "e") => format!("chara/demihuman/d{id1}/obj/equipment/e{id2}/material/{version}{material_path}"),
			("m", "b") => format!("chara/monster/m{id1}/obj/body/b{id2}/material/{version}{material_path}"),
			("w", "b") => format!("chara/weapon/w{id1}/obj/body/b{id2}/material/{version}{material_path}"),
			// anything else lives next to the model
			_ => match model_path.rfind("/model/") {
				Some(i) => format!("{}/material/{version}{material_path}", &model_path[..i]),
				None => material_path.to_string(),
			}
		}
	}
}

impl BinRead for Mdl {
	type Args<'a> = ();

	fn read_options<R: Read + Seek>(reader: &mut R, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<Self> {
		let mut r = SimpleReader::new(reader, endian);

		let header = r.read::<Header>()?;
		let vertex_declarations = r.read_vec::<[VertexElement; ELEMENTS_PER_DECLARATION]>(header.vertex_declaration_count as usize)?;
		let string_count = r.read::<u16>()?;
		let string_padding = r.read::<u16>()?;
		let string_size = r.read::<u32>()?;
		let string_block = r.bytes(string_size as usize)?;
		let rest = r.rest()?;

		Ok(Self {
			header,
			vertex_declarations,
			string_count,
			string_padding,
			string_block,
			rest,
		})
	}
}

impl BinWrite for Mdl {
	type Args<'a> = ();

	fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<()> {
		self.header.write_options(writer, endian, ())?;
		self.vertex_declarations.write_options(writer, endian, ())?;
		self.string_count.write_options(writer, endian, ())?;
		self.string_padding.write_options(writer, endian, ())?;
		crate::SizeError::u32("model strings", self.string_block.len())?.write_options(writer, endian, ())?;
		writer.write_all(&self.string_block)?;
		writer.write_all(&self.rest)?;

		Ok(())
	}
}

impl ironworks::file::File for Mdl {
	fn read(mut data: impl ironworks::FileStream) -> Result<Self, ironworks::Error> {
		Mdl::read_le(&mut data).map_err(|e| ironworks::Error::Resource(e.into()))
	}
}

impl crate::format::external::Bytes for Mdl {
	fn read<T>(reader: &mut T) -> Result<Self, crate::Error>
	where T: Read + Seek {
		Ok(Mdl::read_le(reader)?)
	}

	fn write<T>(&self, writer: &mut T) -> Result<(), crate::Error> where
	T: Write + Seek {
		self.write_le(writer)?;

		Ok(())
	}
}

impl super::Extension for Mdl {
	const EXT: &'static [&'static str] = EXT;
}

// ----------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MdlIssue {
	#[error("{0} lods, at most 3 are supported")]
	TooManyLods(u8),
	#[error("{declared} vertex declarations declared but {found} present")]
	DeclarationCount{declared: usize, found: usize},
	#[error("{declared} strings declared but only {found} present")]
	StringCount{declared: usize, found: usize},
	#[error("vertex buffer of lod {0} reaches past the end of the file")]
	VertexBufferOutOfBounds(usize),
	#[error("index buffer of lod {0} reaches past the end of the file")]
	IndexBufferOutOfBounds(usize),
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
	pub version: u32,
	pub stack_size: u32,
	pub runtime_size: u32,
	pub vertex_declaration_count: u16,
	pub material_count: u16,
	pub vertex_offsets: [u32; 3],
	pub index_offsets: [u32; 3],
	pub vertex_buffer_sizes: [u32; 3],
	pub index_buffer_sizes: [u32; 3],
	pub lod_count: u8,
	pub index_buffer_streaming: u8,
	pub edge_geometry: u8,
	pub padding: u8,
}

/// Vertex element kept raw, a stream of 255 ends the declaration
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexElement {
	pub stream: u8,
	pub offset: u8,
	pub kind: u8,
	pub usage: u8,
	pub usage_index: u8,
	pub padding: [u8; 3],
}

#[cfg(test)]
mod tests {
	use crate::format::external::Bytes;
	use super::*;

	fn sample() -> Mdl {
		let strings = b"j_kosi\0/mt_c0101e0001_top_a.mtrl\0/mt_c0101e0001_top_b.mtrl\0".to_vec();
		let mut declaration = [VertexElement::default(); ELEMENTS_PER_DECLARATION];
		declaration[0] = VertexElement{stream: 0, offset: 0, kind: 2, usage: 0, usage_index: 0, padding: [0; 3]};
		declaration[1].stream = 255;

		let mut mdl = Mdl {
			header: Header {
				version: 0x01000005,
				stack_size: 0,
				runtime_size: 0,
				vertex_declaration_count: 1,
				material_count: 2,
				vertex_offsets: [0; 3],
				index_offsets: [0; 3],
				vertex_buffer_sizes: [0; 3],
				index_buffer_sizes: [0; 3],
				lod_count: 1,
				index_buffer_streaming: 0,
				edge_geometry: 0,
				padding: 0,
			},
			vertex_declarations: vec![declaration],
			string_count: 3,
			string_padding: 0,
			string_block: strings,
			rest: vec![7; 64],
		};

		let size = mdl.file_size() as u32;
		mdl.header.vertex_offsets[0] = size - 64;
		mdl.header.vertex_buffer_sizes[0] = 48;
		mdl.header.index_offsets[0] = size - 16;
		mdl.header.index_buffer_sizes[0] = 16;
		mdl
	}

	#[test]
	fn write_returns_the_same_bytes() {
		let bytes = sample().to_bytes().unwrap();
		assert_eq!(bytes.len(), sample().file_size());
		let parsed = Mdl::from_bytes(&bytes).unwrap();
		assert_eq!(parsed, sample());
		assert_eq!(parsed.to_bytes().unwrap(), bytes);
	}

	#[test]
	fn string_block_larger_than_the_file_is_an_error() {
		let mut bytes = sample().to_bytes().unwrap();
		let size_at = HEADER_SIZE + ELEMENTS_PER_DECLARATION * 8 + 4;
		bytes[size_at..size_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
		assert!(Mdl::from_bytes(&bytes).is_err());
	}

	#[test]
	fn materials_are_listed() {
		let mdl = sample();
		assert_eq!(mdl.strings().len(), 3);
		assert_eq!(mdl.material_paths(), ["/mt_c0101e0001_top_a.mtrl", "/mt_c0101e0001_top_b.mtrl"]);
		assert_eq!(
			Mdl::absolute_material_path("chara/equipment/e0001/model/c0101e0001_top.mdl", "/mt_c0101e0001_top_a.mtrl", 1),
			"chara/equipment/e0001/material/v0001/mt_c0101e0001_top_a.mtrl",
		);
		assert_eq!(Mdl::absolute_material_path("", "chara/full/path.mtrl", 1), "chara/full/path.mtrl");
	}

	#[test]
	fn validate_checks_buffers() {
		let mut mdl = sample();
		assert!(mdl.validate().is_empty());

		mdl.header.lod_count = 4;
		mdl.header.index_buffer_sizes[0] = 17;
		mdl.string_count = 5;
		let issues = mdl.validate();
		assert!(issues.contains(&MdlIssue::TooManyLods(4)));
		assert!(issues.contains(&MdlIssue::IndexBufferOutOfBounds(0)));
		assert!(issues.contains(&MdlIssue::StringCount{declared: 5, found: 3}));
	}
}
