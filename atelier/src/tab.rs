use pigment::{format::{external::Bytes, game::{Extension, Mdl, Mtrl, ShaderPackage}}, names::display_name, resolve::resolve};
use crate::{material::ConstantArena, Error};

/// A file that can be opened in an edit session
pub trait Editable {
	fn title(&self) -> &'static str;
	fn parse(data: &[u8]) -> Result<Self, Error> where Self: Sized;
	/// Human readable problems, empty if the file is fine
	fn validate(&self) -> Vec<String>;
	fn serialize(&self) -> Result<Vec<u8>, Error>;
}

// ----------

/// A material together with the arena its constants are edited through.
/// Every constant edit goes through `edit_constants`, which keeps the material in sync.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTab {
	mtrl: Mtrl,
	arena: ConstantArena,
}

impl MaterialTab {
	pub fn new(mtrl: Mtrl) -> Self {
		Self {
			arena: ConstantArena::from_material(&mtrl),
			mtrl,
		}
	}

	pub fn mtrl(&self) -> &Mtrl {
		&self.mtrl
	}

	/// Anything but the constants, those are overwritten by the arena on the next constant edit
	pub fn mtrl_mut(&mut self) -> &mut Mtrl {
		&mut self.mtrl
	}

	pub fn arena(&self) -> &ConstantArena {
		&self.arena
	}

	pub fn edit_constants<R>(&mut self, f: impl FnOnce(&mut ConstantArena) -> R) -> R {
		let r = f(&mut self.arena);
		self.arena.write_into(&mut self.mtrl);
		r
	}
}

impl Editable for MaterialTab {
	fn title(&self) -> &'static str {
		"Material"
	}

	fn parse(data: &[u8]) -> Result<Self, Error> {
		Ok(Self::new(Mtrl::from_bytes(data)?))
	}

	fn validate(&self) -> Vec<String> {
		let res = resolve(&self.mtrl, None);
		let mut issues = Vec::new();
		for (id, m) in &res.malformed_constants {
			issues.push(format!("Constant {}: {m}", display_name(*id)));
		}

		for (id, m) in &res.malformed_samplers {
			issues.push(format!("Sampler {}: {m}", display_name(*id)));
		}

		if !res.values.aliased.is_empty() {
			issues.push(format!("{} constant values are shared by multiple constants", res.values.aliased.len()));
		}

		if !res.values.orphaned.is_empty() {
			issues.push(format!("{} constant values are not used by any constant", res.values.orphaned.len()));
		}

		if !res.textures.orphaned.is_empty() {
			issues.push(format!("{} textures are not used by any sampler", res.textures.orphaned.len()));
		}

		issues
	}

	fn serialize(&self) -> Result<Vec<u8>, Error> {
		Ok(self.mtrl.to_bytes()?)
	}
}

impl Editable for Mdl {
	fn title(&self) -> &'static str {
		"Model"
	}

	fn parse(data: &[u8]) -> Result<Self, Error> {
		Ok(Mdl::from_bytes(data)?)
	}

	fn validate(&self) -> Vec<String> {
		Mdl::validate(self).into_iter().map(|v| v.to_string()).collect()
	}

	fn serialize(&self) -> Result<Vec<u8>, Error> {
		Ok(self.to_bytes()?)
	}
}

impl Editable for ShaderPackage {
	fn title(&self) -> &'static str {
		"Shader Package"
	}

	fn parse(data: &[u8]) -> Result<Self, Error> {
		Ok(ShaderPackage::from_bytes(data)?)
	}

	fn validate(&self) -> Vec<String> {
		ShaderPackage::validate(self).into_iter().map(|(id, issue)| {
			use pigment::format::game::shpk::ParamIssue;
			match issue {
				ParamIssue::Misaligned => format!("Parameter {}: offset or size is not a multiple of 4", display_name(id)),
				ParamIssue::OutOfBounds => format!("Parameter {}: reaches past the material buffer", display_name(id)),
				ParamIssue::Overlaps(other) => format!("Parameter {}: overlaps {}", display_name(id), display_name(other)),
			}
		}).collect()
	}

	fn serialize(&self) -> Result<Vec<u8>, Error> {
		Ok(self.to_bytes()?)
	}
}

// ----------

#[derive(Debug, Clone, PartialEq)]
pub enum FileTab {
	Material(MaterialTab),
	Model(Mdl),
	ShaderPackage(ShaderPackage),
}

fn ext_of(path: &str) -> String {
	path.rsplit('/').next()
		.and_then(|v| v.rsplit_once('.'))
		.map(|(_, ext)| ext.to_ascii_lowercase())
		.unwrap_or_default()
}

impl FileTab {
	pub fn is_supported(path: &str) -> bool {
		let ext = ext_of(path);
		[Mtrl::EXT, Mdl::EXT, ShaderPackage::EXT].iter().any(|v| v.contains(&ext.as_str()))
	}

	/// Picks the tab kind by the extension of the path
	pub fn parse(path: &str, data: &[u8]) -> Result<Self, Error> {
		let ext = ext_of(path);
		let ext = ext.as_str();
		if Mtrl::EXT.contains(&ext) {
			Ok(FileTab::Material(MaterialTab::parse(data)?))
		} else if Mdl::EXT.contains(&ext) {
			Ok(FileTab::Model(Mdl::parse(data)?))
		} else if ShaderPackage::EXT.contains(&ext) {
			Ok(FileTab::ShaderPackage(<ShaderPackage as Editable>::parse(data)?))
		} else {
			Err(Error::Unsupported(path.to_string()))
		}
	}

	fn inner(&self) -> &dyn Editable {
		match self {
			FileTab::Material(v) => v,
			FileTab::Model(v) => v,
			FileTab::ShaderPackage(v) => v,
		}
	}

	pub fn title(&self) -> &'static str {
		self.inner().title()
	}

	pub fn validate(&self) -> Vec<String> {
		self.inner().validate()
	}

	pub fn serialize(&self) -> Result<Vec<u8>, Error> {
		self.inner().serialize()
	}

	pub fn material(&self) -> Option<&MaterialTab> {
		match self {
			FileTab::Material(v) => Some(v),
			_ => None,
		}
	}

	pub fn material_mut(&mut self) -> Option<&mut MaterialTab> {
		match self {
			FileTab::Material(v) => Some(v),
			_ => None,
		}
	}
}
