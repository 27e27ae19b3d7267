use std::{path::{Path, PathBuf}, rc::Rc};
use glam::Vec3;
use pigment::{format::{external::Bytes, game::{ShaderPackage, Stm}}, names::display_name, resolve::{resolve, Resolution}, ColorTableRow};
use crate::{clipboard, config::Config, highlight::Highlighter, material::{ConstantKey, Draft}, source::FileSource, tab::{FileTab, MaterialTab}, Error};

/// A lazily loaded file the session depends on
enum Lazy<T> {
	Untried,
	Loaded(T),
	Failed,
}

impl<T> Lazy<T> {
	fn get(&self) -> Option<&T> {
		match self {
			Lazy::Loaded(v) => Some(v),
			_ => None,
		}
	}
}

/// One open file and everything needed to edit it.
///
/// Load, paste, dye and save failures never leave the session, they are logged
/// and kept in `last_error` until the next operation that succeeds or `clear_error`.
pub struct EditSession {
	path: String,
	save_path: Option<PathBuf>,
	source: Rc<dyn FileSource>,
	config: Config,
	tab: FileTab,
	shpk: Lazy<ShaderPackage>,
	stm: Lazy<Stm>,
	highlighter: Highlighter,
	pub draft: Draft,
	last_error: Option<Error>,
	dirty: bool,
}

impl EditSession {
	pub fn open(path: &str, source: Rc<dyn FileSource>, config: &Config) -> Result<Self, Error> {
		let data = source.read(path)?;
		let tab = FileTab::parse(path, &data)?;
		log!("Opened {} {path}", tab.title());

		Ok(Self {
			path: path.to_string(),
			save_path: source.local_path(path),
			source,
			config: config.clone(),
			tab,
			shpk: Lazy::Untried,
			stm: Lazy::Untried,
			highlighter: Highlighter::new(Vec3::from_array(config.highlight_color)),
			draft: Draft::default(),
			last_error: None,
			dirty: false,
		})
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	/// Where `save` writes to, None for files that only exist inside the game
	pub fn save_path(&self) -> Option<&Path> {
		self.save_path.as_deref()
	}

	pub fn tab(&self) -> &FileTab {
		&self.tab
	}

	pub fn material(&self) -> Option<&MaterialTab> {
		self.tab.material()
	}

	pub fn last_error(&self) -> Option<&Error> {
		self.last_error.as_ref()
	}

	pub fn clear_error(&mut self) {
		self.last_error = None;
	}

	pub fn is_dirty(&self) -> bool {
		self.dirty
	}

	fn fail(&mut self, err: Error) {
		log!(err, "{}: {err}", self.path);
		self.last_error = Some(err);
	}

	// ----------

	/// Writes to where the file was loaded from
	pub fn save(&mut self) -> bool {
		match self.save_path.clone() {
			Some(path) => self.save_as(&path),
			None => {
				self.fail(Error::edit("file has no location on disk, save it elsewhere first"));
				false
			}
		}
	}

	pub fn save_as(&mut self, path: &Path) -> bool {
		self.restore_highlight();
		match self.write_to(path) {
			Ok(()) => {
				log!("Saved {} to {path:?}", self.path);
				self.save_path = Some(path.to_owned());
				self.dirty = false;
				self.last_error = None;
				true
			}

			Err(e) => {
				self.fail(e);
				false
			}
		}
	}

	fn write_to(&self, path: &Path) -> Result<(), Error> {
		let data = self.tab.serialize()?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, data)?;
		Ok(())
	}

	// ----------

	/// Frame update, advances the highlight preview
	pub fn tick(&mut self) {
		let Some(table) = self.tab.material_mut().and_then(|v| v.mtrl_mut().tables_mut()).map(|v| v.0) else {return};
		self.highlighter.update(table);
	}

	/// Starts the preview on a row, None stops it.
	/// The preview never counts as an edit and is gone before anything is saved or copied.
	pub fn highlight_row(&mut self, row: Option<usize>) -> bool {
		let Some(table) = self.tab.material_mut().and_then(|v| v.mtrl_mut().tables_mut()).map(|v| v.0) else {return false};
		match row {
			Some(row) => self.highlighter.start(table, row),
			None => {
				self.highlighter.restore(table);
				true
			}
		}
	}

	pub fn highlighted_row(&self) -> Option<usize> {
		self.highlighter.row()
	}

	fn restore_highlight(&mut self) {
		if let Some(table) = self.tab.material_mut().and_then(|v| v.mtrl_mut().tables_mut()).map(|v| v.0) {
			self.highlighter.restore(table);
		}
	}

	// ----------

	/// The package of the material's shader, loaded on first use.
	/// A failed load is only retried after `reload_resources`.
	pub fn shader_package(&mut self) -> Option<&ShaderPackage> {
		if matches!(self.shpk, Lazy::Untried) {
			self.shpk = match self.load_shader_package() {
				Ok(v) => Lazy::Loaded(v),
				Err(e) => {
					self.fail(e);
					Lazy::Failed
				}
			};
		}

		self.shpk.get()
	}

	fn load_shader_package(&self) -> Result<ShaderPackage, Error> {
		let shader = match &self.tab {
			FileTab::Material(v) => v.mtrl().shader.clone(),
			_ => return Err(Error::edit("only materials use a shader package")),
		};

		let path = self.config.shader_package_path(&shader);
		let data = self.source.read(&path).map_err(|e| Error::missing("shader package", &path, e))?;
		ShaderPackage::from_bytes(&data).map_err(|e| Error::missing("shader package", &path, e))
	}

	pub fn staining_template(&mut self) -> Option<&Stm> {
		if matches!(self.stm, Lazy::Untried) {
			self.stm = match self.load_staining_template() {
				Ok(v) => Lazy::Loaded(v),
				Err(e) => {
					self.fail(e);
					Lazy::Failed
				}
			};
		}

		self.stm.get()
	}

	fn load_staining_template(&self) -> Result<Stm, Error> {
		let path = &self.config.staining_template;
		let data = self.source.read(path).map_err(|e| Error::missing("staining template", path, e))?;
		Stm::from_bytes(&data).map_err(|e| Error::missing("staining template", path, e))
	}

	/// Uses this package instead of looking one up, None goes back to looking it up
	pub fn set_shader_package(&mut self, shpk: Option<ShaderPackage>) {
		self.shpk = shpk.map_or(Lazy::Untried, Lazy::Loaded);
	}

	pub fn set_staining_template(&mut self, stm: Option<Stm>) {
		self.stm = stm.map_or(Lazy::Untried, Lazy::Loaded);
	}

	/// Failed loads are tried again on next use
	pub fn reload_resources(&mut self) {
		if matches!(self.shpk, Lazy::Failed) {self.shpk = Lazy::Untried}
		if matches!(self.stm, Lazy::Failed) {self.stm = Lazy::Untried}
	}

	/// Cross reference of the material against its shader package,
	/// limited to the material itself when the package is unavailable
	pub fn resolution(&mut self) -> Option<Resolution> {
		self.tab.material()?;
		self.shader_package();
		let mtrl = self.tab.material()?.mtrl();
		Some(resolve(mtrl, self.shpk.get()))
	}

	pub fn validate(&mut self) -> Vec<String> {
		let mut issues = self.tab.validate();
		let Some(res) = self.resolution() else {return issues};
		if !res.has_shader_package {return issues}

		for id in &res.missing_constants {
			issues.push(format!("Constant {} is missing", display_name(*id)));
		}

		for (id, m) in &res.malformed_constants {
			if matches!(m, pigment::resolve::Malformation::SizeMismatch{..}) {
				issues.push(format!("Constant {}: {m}", display_name(*id)));
			}
		}

		for id in &res.unknown_constants {
			issues.push(format!("Constant {} is not used by the shader", display_name(*id)));
		}

		for id in &res.missing_samplers {
			issues.push(format!("Sampler {} is missing", display_name(*id)));
		}

		for id in &res.unknown_samplers {
			issues.push(format!("Sampler {} is not used by the shader", display_name(*id)));
		}

		for id in &res.missing_keys {
			issues.push(format!("Shader key {} is missing", display_name(*id)));
		}

		for id in &res.unknown_keys {
			issues.push(format!("Shader key {} is not used by the shader", display_name(*id)));
		}

		for id in &res.malformed_params {
			issues.push(format!("Shader parameter {} is not float aligned", display_name(*id)));
		}

		issues
	}

	// ----------

	/// Dyes the color table with a stain, returns the rows that changed
	pub fn apply_dye(&mut self, stain: u8) -> Vec<usize> {
		self.restore_highlight();
		self.staining_template();
		let Lazy::Loaded(stm) = &self.stm else {return Vec::new()};
		let Some(mat) = self.tab.material_mut() else {return Vec::new()};
		let Some((table, Some(dyes))) = mat.mtrl_mut().tables_mut() else {return Vec::new()};

		let changed = pigment::dye::apply_dye_table(table, dyes, stm, stain);
		if !changed.is_empty() {
			self.dirty = true;
		}

		changed
	}

	/// Runs an edit on a color table row, the row is normalized afterwards
	pub fn edit_row(&mut self, row: usize, f: impl FnOnce(&mut ColorTableRow)) -> bool {
		self.restore_highlight();
		let Some(row) = self.tab.material_mut()
			.and_then(|v| v.mtrl_mut().tables_mut())
			.and_then(|(table, _)| table.rows.get_mut(row)) else {return false};

		let before = *row;
		f(row);
		row.normalize();
		let changed = *row != before;
		self.dirty |= changed;
		changed
	}

	pub fn copy_row(&mut self, row: usize) -> Option<String> {
		self.restore_highlight();
		let mtrl = self.tab.material()?.mtrl();
		let table = mtrl.color_table()?;
		let dye = mtrl.dye_table().and_then(|v| v.rows.get(row));
		Some(clipboard::export_row(table.rows.get(row)?, dye))
	}

	pub fn copy_table(&mut self) -> Option<String> {
		self.restore_highlight();
		let mtrl = self.tab.material()?.mtrl();
		Some(clipboard::export_table(mtrl.color_table()?, mtrl.dye_table()))
	}

	/// False and untouched if the text is not a row or there is no such row
	pub fn paste_row(&mut self, row: usize, text: &str) -> bool {
		self.restore_highlight();
		let (new_row, new_dye) = match clipboard::decode_row(text) {
			Ok(v) => v,
			Err(e) => {
				self.fail(e);
				return false;
			}
		};

		let Some((table, dyes)) = self.tab.material_mut().and_then(|v| v.mtrl_mut().tables_mut()) else {return false};
		let Some(target) = table.rows.get_mut(row) else {return false};
		*target = new_row;
		if let (Some(dyes), Some(new_dye)) = (dyes, new_dye) {
			dyes.rows[row] = new_dye;
		}

		self.dirty = true;
		self.last_error = None;
		true
	}

	pub fn paste_table(&mut self, text: &str) -> bool {
		self.restore_highlight();
		let (new_table, new_dyes) = match clipboard::decode_table(text) {
			Ok(v) => v,
			Err(e) => {
				self.fail(e);
				return false;
			}
		};

		let Some((table, dyes)) = self.tab.material_mut().and_then(|v| v.mtrl_mut().tables_mut()) else {return false};
		*table = new_table;
		if let (Some(dyes), Some(new_dyes)) = (dyes, new_dyes) {
			*dyes = new_dyes;
		}

		self.dirty = true;
		self.last_error = None;
		true
	}

	// ----------

	fn material_resolution(&mut self) -> Result<Resolution, Error> {
		let res = self.resolution().ok_or_else(|| Error::edit("not a material"))?;
		if !res.has_shader_package {
			return Err(Error::edit("the shader package is unavailable"));
		}

		Ok(res)
	}

	/// Adds every constant the shader expects but the material lacks, using the
	/// package's defaults where it has them. Returns the ids that were added.
	pub fn add_missing_constants(&mut self) -> Result<Vec<u32>, Error> {
		self.restore_highlight();
		let res = self.material_resolution()?;
		if !res.can_add_constants() {
			return Err(Error::edit("constant layout is misaligned, fix it before adding constants"));
		}

		let Lazy::Loaded(shpk) = &self.shpk else {return Ok(Vec::new())};
		let Some(mat) = self.tab.material_mut() else {return Ok(Vec::new())};

		let mut added = Vec::new();
		for id in res.missing_constants {
			let Some(param) = shpk.material_param(id) else {continue};
			let count = param.byte_size as usize / 4;
			let values = match shpk.material_param_defaults(id) {
				Some(v) => v.to_vec(),
				None => vec![0.0; count],
			};

			if mat.edit_constants(|arena| arena.insert(id, &values))?.is_some() {
				added.push(id);
			}
		}

		if !added.is_empty() {
			log!("Added {} constants to {}", added.len(), self.path);
			self.dirty = true;
		}

		Ok(added)
	}

	/// Removes a constant and packs the remaining values. Nothing changes if packing fails.
	pub fn remove_constant(&mut self, id: u32) -> Result<bool, Error> {
		self.restore_highlight();
		let mat = self.tab.material_mut().ok_or_else(|| Error::edit("not a material"))?;
		let removed = mat.edit_constants(|arena| -> Result<bool, Error> {
			let Some(key) = arena.find(id) else {return Ok(false)};
			let mut next = arena.clone();
			next.remove(key);
			next.rebuild()?;
			*arena = next;
			Ok(true)
		})?;

		self.dirty |= removed;
		Ok(removed)
	}

	/// Packs the constant values, dropping values no constant uses and splitting shared ones
	pub fn compact(&mut self) -> Result<(), Error> {
		self.restore_highlight();
		let mat = self.tab.material_mut().ok_or_else(|| Error::edit("not a material"))?;
		let before = (mat.mtrl().values.clone(), mat.mtrl().constants.clone());
		mat.edit_constants(|arena| arena.rebuild())?;
		self.dirty |= mat.mtrl().values != before.0 || mat.mtrl().constants != before.1;
		Ok(())
	}

	/// Edits the values of a constant in place
	pub fn edit_constant(&mut self, id: u32, f: impl FnOnce(&mut [f32])) -> bool {
		self.restore_highlight();
		let Some(mat) = self.tab.material_mut() else {return false};
		let edited = mat.edit_constants(|arena| {
			let Some(values) = arena.find(id).and_then(|k| arena.values_mut(k)) else {return false};
			f(values);
			true
		});

		self.dirty |= edited;
		edited
	}

	pub fn commit_constant_draft(&mut self) -> Result<Option<ConstantKey>, Error> {
		self.restore_highlight();
		let defaults = match &self.shpk {
			Lazy::Loaded(shpk) => shpk.material_param_defaults(self.draft.constant.id).map(|v| v.to_vec()),
			_ => None,
		};

		let mat = self.tab.material_mut().ok_or_else(|| Error::edit("not a material"))?;
		let draft = &mut self.draft.constant;
		let key = mat.edit_constants(|arena| draft.commit(arena, defaults.as_deref()))?;
		self.dirty |= key.is_some();
		Ok(key)
	}

	pub fn commit_sampler_draft(&mut self) -> Result<bool, Error> {
		let mat = self.tab.material_mut().ok_or_else(|| Error::edit("not a material"))?;
		let added = self.draft.sampler.commit(mat.mtrl_mut())?;
		self.dirty |= added;
		Ok(added)
	}

	pub fn commit_key_draft(&mut self) -> Result<(), Error> {
		let mat = self.tab.material_mut().ok_or_else(|| Error::edit("not a material"))?;
		self.draft.key.commit(mat.mtrl_mut());
		self.dirty = true;
		Ok(())
	}
}
