use std::{io::{Cursor, Read, Seek, Write}, ops::Range};
use binrw::{binrw, BinRead, BinWrite};
use crate::{names::MATERIAL_PARAMETER, SimpleReader, SizeError};

pub const EXT: &'static [&'static str] = &["shpk"];

pub type Error = binrw::Error;

pub const MAGIC: [u8; 4] = *b"ShPk";
pub const DX9_MAGIC: [u8; 4] = *b"DX9\0";
pub const DX11_MAGIC: [u8; 4] = *b"DX11";
/// Packages from this version on carry an extra word per shader and three in the header
pub const EXTENDED_VERSION: u32 = 0x0D01;
/// Resource slot shared by the samplers a material provides
pub const MATERIAL_SLOT: u16 = 2;

const HEADER_SIZE: usize = 68;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DxVersion {
	Dx9,
	Dx11,
}

// ----------

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPackage {
	pub version: u32,
	pub dx: DxVersion,
	pub header_extra: [u32; 3],
	pub vertex_shaders: Vec<Shader>,
	pub pixel_shaders: Vec<Shader>,
	/// Size of the material constant buffer in bytes
	pub material_params_size: u32,
	pub material_params: Vec<MaterialParam>,
	pub material_param_defaults: Option<Vec<f32>>,
	pub constants: Vec<Resource>,
	pub samplers: Vec<Resource>,
	pub textures: Vec<Resource>,
	pub uavs: Vec<Resource>,
	pub system_keys: Vec<Key>,
	pub scene_keys: Vec<Key>,
	pub material_keys: Vec<Key>,
	pub subview_key_defaults: [u32; 2],
	pub nodes: Vec<Node>,
	pub aliases: Vec<NodeAlias>,
	pub additional_data: Vec<u8>,
	pub blobs: Vec<u8>,
	pub strings: Vec<u8>,
}

impl ShaderPackage {
	/// Package without any shaders, resources or keys
	pub fn new(dx: DxVersion) -> Self {
		Self {
			version: EXTENDED_VERSION,
			dx,
			header_extra: [0; 3],
			vertex_shaders: Vec::new(),
			pixel_shaders: Vec::new(),
			material_params_size: 0,
			material_params: Vec::new(),
			material_param_defaults: Some(Vec::new()),
			constants: Vec::new(),
			samplers: Vec::new(),
			textures: Vec::new(),
			uavs: Vec::new(),
			system_keys: Vec::new(),
			scene_keys: Vec::new(),
			material_keys: Vec::new(),
			subview_key_defaults: [0; 2],
			nodes: Vec::new(),
			aliases: Vec::new(),
			additional_data: Vec::new(),
			blobs: Vec::new(),
			strings: Vec::new(),
		}
	}

	pub fn is_extended(&self) -> bool {
		self.version >= EXTENDED_VERSION
	}

	pub fn material_param(&self, id: u32) -> Option<&MaterialParam> {
		self.material_params.iter().find(|v| v.id == id)
	}

	/// Samplers the material is expected to provide
	pub fn material_samplers(&self) -> impl Iterator<Item = &Resource> {
		self.samplers.iter().filter(|v| v.slot == MATERIAL_SLOT)
	}

	pub fn material_sampler(&self, id: u32) -> Option<&Resource> {
		self.material_samplers().find(|v| v.id == id)
	}

	pub fn material_key(&self, id: u32) -> Option<&Key> {
		self.material_keys.iter().find(|v| v.id == id)
	}

	pub fn resource_name(&self, resource: &Resource) -> Option<&str> {
		let start = resource.name_offset as usize;
		let bytes = self.strings.get(start..start + resource.name_size as usize)?;
		std::str::from_utf8(bytes).ok()
	}

	pub fn shaders(&self) -> impl Iterator<Item = &Shader> {
		self.vertex_shaders.iter().chain(self.pixel_shaders.iter())
	}

	pub fn blob(&self, shader: &Shader) -> Option<&[u8]> {
		let start = shader.blob_offset as usize;
		self.blobs.get(start..start + shader.blob_size as usize)
	}

	/// Float count of the material constant buffer
	pub fn material_param_floats(&self) -> usize {
		self.material_params_size as usize / 4
	}

	/// Per float of the material constant buffer, whether any shader reads it.
	/// Shaders declare how many vectors of the buffer they bind, so usage is tracked per vector
	pub fn material_param_usage(&self) -> Vec<bool> {
		let floats = self.material_param_floats();
		let used_vectors = self.shaders()
			.flat_map(|v| v.constants.iter())
			.filter(|v| v.id == MATERIAL_PARAMETER)
			.map(|v| v.size as usize)
			.max()
			.unwrap_or(0);

		(0..floats).map(|i| i / 4 < used_vectors).collect()
	}

	/// Declares a new parameter at the end of the material buffer,
	/// returns the existing one if the id is already declared
	pub fn add_material_param(&mut self, id: u32, byte_size: u16) -> Result<&MaterialParam, SizeError> {
		if let Some(i) = self.material_params.iter().position(|v| v.id == id) {
			return Ok(&self.material_params[i]);
		}

		let byte_size = byte_size.saturating_add(3) & !3;
		let byte_offset = SizeError::u16("material parameter offset", self.material_params_size as usize)?;
		let new_size = SizeError::u16("material parameters", byte_offset as usize + byte_size as usize)?;
		self.material_params_size = new_size as u32;
		if let Some(defaults) = &mut self.material_param_defaults {
			defaults.resize(new_size as usize / 4, 0.0);
		}

		self.material_params.push(MaterialParam{id, byte_offset, byte_size});
		Ok(&self.material_params[self.material_params.len() - 1])
	}

	/// Drops the declaration. The buffer layout is left alone since the compiled shaders address it by offset
	pub fn remove_material_param(&mut self, id: u32) -> Option<MaterialParam> {
		let i = self.material_params.iter().position(|v| v.id == id)?;
		Some(self.material_params.remove(i))
	}

	pub fn material_param_defaults(&self, id: u32) -> Option<&[f32]> {
		let range = self.material_param(id)?.value_range()?;
		self.material_param_defaults.as_ref()?.get(range)
	}

	/// Parameters that cannot be addressed as whole floats or that share storage
	pub fn validate(&self) -> Vec<(u32, ParamIssue)> {
		let mut issues = Vec::new();
		for (i, param) in self.material_params.iter().enumerate() {
			let Some(range) = param.value_range() else {
				issues.push((param.id, ParamIssue::Misaligned));
				continue;
			};

			if range.end > self.material_param_floats() {
				issues.push((param.id, ParamIssue::OutOfBounds));
			}

			for other in &self.material_params[..i] {
				let Some(other_range) = other.value_range() else {continue};
				if range.start < other_range.end && other_range.start < range.end {
					issues.push((param.id, ParamIssue::Overlaps(other.id)));
				}
			}
		}

		issues
	}
}

impl BinRead for ShaderPackage {
	type Args<'a> = ();

	fn read_options<R: Read + Seek>(reader: &mut R, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<Self> {
		let mut r = SimpleReader::new(reader, endian);
		let start = r.pos()?;

		if r.read::<[u8; 4]>()? != MAGIC {
			return r.fail("not a shader package");
		}

		let version = r.read::<u32>()?;
		let dx = match r.read::<[u8; 4]>()? {
			DX9_MAGIC => DxVersion::Dx9,
			DX11_MAGIC => DxVersion::Dx11,
			v => return r.fail(format!("unknown directx magic {v:?}")),
		};

		let file_size = r.read::<u32>()?;
		let blobs_offset = r.read::<u32>()?;
		let strings_offset = r.read::<u32>()?;
		let vertex_shader_count = r.read::<u32>()?;
		let pixel_shader_count = r.read::<u32>()?;
		let material_params_size = r.read::<u32>()?;
		let material_param_count = r.read::<u16>()?;
		let has_defaults = r.read::<u16>()? != 0;
		let constant_count = r.read::<u16>()?;
		let sampler_count = r.read::<u16>()?;
		let texture_count = r.read::<u16>()?;
		let uav_count = r.read::<u16>()?;
		let system_key_count = r.read::<u32>()?;
		let scene_key_count = r.read::<u32>()?;
		let material_key_count = r.read::<u32>()?;
		let node_count = r.read::<u32>()?;
		let alias_count = r.read::<u32>()?;
		let header_extra = if version >= EXTENDED_VERSION {r.read::<[u32; 3]>()?} else {[0; 3]};

		if blobs_offset > strings_offset || strings_offset > file_size {
			return r.fail(format!("section offsets {blobs_offset} {strings_offset} do not fit in {file_size} bytes"));
		}

		let vertex_shaders = (0..vertex_shader_count).map(|_| Shader::read(&mut r, version)).collect::<binrw::BinResult<Vec<_>>>()?;
		let pixel_shaders = (0..pixel_shader_count).map(|_| Shader::read(&mut r, version)).collect::<binrw::BinResult<Vec<_>>>()?;

		let material_params = r.read_vec::<MaterialParam>(material_param_count as usize)?;
		let material_param_defaults = if has_defaults {
			Some(r.read_vec::<f32>(material_params_size as usize / 4)?)
		} else {
			None
		};

		let constants = r.read_vec::<Resource>(constant_count as usize)?;
		let samplers = r.read_vec::<Resource>(sampler_count as usize)?;
		let textures = r.read_vec::<Resource>(texture_count as usize)?;
		let uavs = r.read_vec::<Resource>(uav_count as usize)?;

		let system_keys = r.read_vec::<Key>(system_key_count as usize)?;
		let scene_keys = r.read_vec::<Key>(scene_key_count as usize)?;
		let material_keys = r.read_vec::<Key>(material_key_count as usize)?;
		let subview_key_defaults = r.read::<[u32; 2]>()?;

		let mut nodes = Vec::new();
		for _ in 0..node_count {
			let selector = r.read::<u32>()?;
			let pass_count = r.read::<u32>()?;
			let pass_indices = r.read::<[u8; 16]>()?;
			let system_keys = r.read_vec::<u32>(system_key_count as usize)?;
			let scene_keys = r.read_vec::<u32>(scene_key_count as usize)?;
			let material_keys = r.read_vec::<u32>(material_key_count as usize)?;
			let subview_keys = r.read::<[u32; 2]>()?;
			let passes = r.read_vec::<Pass>(pass_count as usize)?;
			nodes.push(Node{selector, pass_indices, system_keys, scene_keys, material_keys, subview_keys, passes});
		}

		let aliases = r.read_vec::<NodeAlias>(alias_count as usize)?;

		let pos = r.pos()? - start;
		if pos > blobs_offset as u64 {
			return r.fail(format!("tables run past the blob section at {blobs_offset}"));
		}
		let additional_data = r.bytes((blobs_offset as u64 - pos) as usize)?;
		let blobs = r.bytes((strings_offset - blobs_offset) as usize)?;
		let strings = r.bytes((file_size - strings_offset) as usize)?;

		Ok(Self {
			version,
			dx,
			header_extra,
			vertex_shaders,
			pixel_shaders,
			material_params_size,
			material_params,
			material_param_defaults,
			constants,
			samplers,
			textures,
			uavs,
			system_keys,
			scene_keys,
			material_keys,
			subview_key_defaults,
			nodes,
			aliases,
			additional_data,
			blobs,
			strings,
		})
	}
}

impl BinWrite for ShaderPackage {
	type Args<'a> = ();

	fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian, _args: Self::Args<'_>,) -> binrw::BinResult<()> {
		let mut body = Cursor::new(Vec::new());
		for shader in self.shaders() {
			shader.write(&mut body, endian, self.version)?;
		}

		self.material_params.write_options(&mut body, endian, ())?;
		if let Some(defaults) = &self.material_param_defaults {
			if defaults.len() != self.material_param_floats() {
				return Err(binrw::Error::AssertFail{pos: 0, message: format!("{} material defaults for {} floats", defaults.len(), self.material_param_floats())});
			}
			defaults.write_options(&mut body, endian, ())?;
		}

		self.constants.write_options(&mut body, endian, ())?;
		self.samplers.write_options(&mut body, endian, ())?;
		self.textures.write_options(&mut body, endian, ())?;
		self.uavs.write_options(&mut body, endian, ())?;
		self.system_keys.write_options(&mut body, endian, ())?;
		self.scene_keys.write_options(&mut body, endian, ())?;
		self.material_keys.write_options(&mut body, endian, ())?;
		self.subview_key_defaults.write_options(&mut body, endian, ())?;

		for node in &self.nodes {
			if node.system_keys.len() != self.system_keys.len() || node.scene_keys.len() != self.scene_keys.len() || node.material_keys.len() != self.material_keys.len() {
				return Err(binrw::Error::AssertFail{pos: 0, message: format!("node {:08X} key values do not match the declared keys", node.selector)});
			}

			node.selector.write_options(&mut body, endian, ())?;
			SizeError::u32("passes", node.passes.len())?.write_options(&mut body, endian, ())?;
			node.pass_indices.write_options(&mut body, endian, ())?;
			node.system_keys.write_options(&mut body, endian, ())?;
			node.scene_keys.write_options(&mut body, endian, ())?;
			node.material_keys.write_options(&mut body, endian, ())?;
			node.subview_keys.write_options(&mut body, endian, ())?;
			node.passes.write_options(&mut body, endian, ())?;
		}

		self.aliases.write_options(&mut body, endian, ())?;
		body.write_all(&self.additional_data)?;
		let body = body.into_inner();

		let header_size = HEADER_SIZE + if self.is_extended() {12} else {0};
		let blobs_offset = SizeError::u32("shader package", header_size + body.len())?;
		let strings_offset = SizeError::u32("shader package", blobs_offset as usize + self.blobs.len())?;
		let file_size = SizeError::u32("shader package", strings_offset as usize + self.strings.len())?;

		MAGIC.write_options(writer, endian, ())?;
		self.version.write_options(writer, endian, ())?;
		let dx_magic = match self.dx {
			DxVersion::Dx9 => DX9_MAGIC,
			DxVersion::Dx11 => DX11_MAGIC,
		};
		dx_magic.write_options(writer, endian, ())?;
		file_size.write_options(writer, endian, ())?;
		blobs_offset.write_options(writer, endian, ())?;
		strings_offset.write_options(writer, endian, ())?;
		SizeError::u32("vertex shaders", self.vertex_shaders.len())?.write_options(writer, endian, ())?;
		SizeError::u32("pixel shaders", self.pixel_shaders.len())?.write_options(writer, endian, ())?;
		self.material_params_size.write_options(writer, endian, ())?;
		SizeError::u16("material parameters", self.material_params.len())?.write_options(writer, endian, ())?;
		(self.material_param_defaults.is_some() as u16).write_options(writer, endian, ())?;
		SizeError::u16("constants", self.constants.len())?.write_options(writer, endian, ())?;
		SizeError::u16("samplers", self.samplers.len())?.write_options(writer, endian, ())?;
		SizeError::u16("textures", self.textures.len())?.write_options(writer, endian, ())?;
		SizeError::u16("uavs", self.uavs.len())?.write_options(writer, endian, ())?;
		SizeError::u32("system keys", self.system_keys.len())?.write_options(writer, endian, ())?;
		SizeError::u32("scene keys", self.scene_keys.len())?.write_options(writer, endian, ())?;
		SizeError::u32("material keys", self.material_keys.len())?.write_options(writer, endian, ())?;
		SizeError::u32("nodes", self.nodes.len())?.write_options(writer, endian, ())?;
		SizeError::u32("node aliases", self.aliases.len())?.write_options(writer, endian, ())?;
		if self.is_extended() {
			self.header_extra.write_options(writer, endian, ())?;
		}

		writer.write_all(&body)?;
		writer.write_all(&self.blobs)?;
		writer.write_all(&self.strings)?;

		Ok(())
	}
}

impl ironworks::file::File for ShaderPackage {
	fn read(mut data: impl ironworks::FileStream) -> Result<Self, ironworks::Error> {
		ShaderPackage::read_le(&mut data).map_err(|e| ironworks::Error::Resource(e.into()))
	}
}

impl crate::format::external::Bytes for ShaderPackage {
	fn read<T>(reader: &mut T) -> Result<Self, crate::Error>
	where T: Read + Seek {
		Ok(ShaderPackage::read_le(reader)?)
	}

	fn write<T>(&self, writer: &mut T) -> Result<(), crate::Error> where
	T: Write + Seek {
		self.write_le(writer)?;

		Ok(())
	}
}

impl super::Extension for ShaderPackage {
	const EXT: &'static [&'static str] = EXT;
}

// ----------

#[derive(Debug, Clone, PartialEq)]
pub struct Shader {
	/// Relative to the blob section
	pub blob_offset: u32,
	pub blob_size: u32,
	pub unknown: u32,
	pub constants: Vec<Resource>,
	pub samplers: Vec<Resource>,
	pub uavs: Vec<Resource>,
	pub textures: Vec<Resource>,
}

impl Shader {
	fn read<R: Read + Seek>(r: &mut SimpleReader<R>, version: u32) -> binrw::BinResult<Self> {
		let blob_offset = r.read::<u32>()?;
		let blob_size = r.read::<u32>()?;
		let constant_count = r.read::<u16>()?;
		let sampler_count = r.read::<u16>()?;
		let uav_count = r.read::<u16>()?;
		let texture_count = r.read::<u16>()?;
		let unknown = if version >= EXTENDED_VERSION {r.read::<u32>()?} else {0};

		Ok(Self {
			blob_offset,
			blob_size,
			unknown,
			constants: r.read_vec(constant_count as usize)?,
			samplers: r.read_vec(sampler_count as usize)?,
			uavs: r.read_vec(uav_count as usize)?,
			textures: r.read_vec(texture_count as usize)?,
		})
	}

	fn write<W: Write + Seek>(&self, writer: &mut W, endian: binrw::Endian, version: u32) -> binrw::BinResult<()> {
		self.blob_offset.write_options(writer, endian, ())?;
		self.blob_size.write_options(writer, endian, ())?;
		SizeError::u16("shader constants", self.constants.len())?.write_options(writer, endian, ())?;
		SizeError::u16("shader samplers", self.samplers.len())?.write_options(writer, endian, ())?;
		SizeError::u16("shader uavs", self.uavs.len())?.write_options(writer, endian, ())?;
		SizeError::u16("shader textures", self.textures.len())?.write_options(writer, endian, ())?;
		if version >= EXTENDED_VERSION {
			self.unknown.write_options(writer, endian, ())?;
		}
		self.constants.write_options(writer, endian, ())?;
		self.samplers.write_options(writer, endian, ())?;
		self.uavs.write_options(writer, endian, ())?;
		self.textures.write_options(writer, endian, ())?;

		Ok(())
	}
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resource {
	pub id: u32,
	pub name_offset: u32,
	pub name_size: u16,
	pub is_texture: u16,
	pub slot: u16,
	/// Vector count for constant buffers
	pub size: u16,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialParam {
	pub id: u32,
	pub byte_offset: u16,
	pub byte_size: u16,
}

impl MaterialParam {
	pub fn is_aligned(&self) -> bool {
		self.byte_offset & 0x3 == 0 && self.byte_size & 0x3 == 0
	}

	/// Range in float units, None if misaligned
	pub fn value_range(&self) -> Option<Range<usize>> {
		if !self.is_aligned() {return None}
		let start = self.byte_offset as usize >> 2;
		Some(start..start + (self.byte_size as usize >> 2))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamIssue {
	Misaligned,
	OutOfBounds,
	/// Shares storage with the parameter of this id
	Overlaps(u32),
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
	pub id: u32,
	pub default: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
	pub selector: u32,
	pub pass_indices: [u8; 16],
	pub system_keys: Vec<u32>,
	pub scene_keys: Vec<u32>,
	pub material_keys: Vec<u32>,
	pub subview_keys: [u32; 2],
	pub passes: Vec<Pass>,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pass {
	pub id: u32,
	pub vertex_shader: u32,
	pub pixel_shader: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeAlias {
	pub selector: u32,
	pub node: u32,
}
