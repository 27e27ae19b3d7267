use pigment::{format::game::{mtrl::{Constant, Sampler, Texture, NO_TEXTURE}, Mtrl}, names::display_name, SizeError};

/// Stable handle to a material constant, stays valid across removals and rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstantKey(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConstant {
	pub id: u32,
	pub byte_offset: u16,
	pub byte_size: u16,
}

impl ArenaConstant {
	fn as_constant(&self) -> Constant {
		Constant{id: self.id, byte_offset: self.byte_offset, byte_size: self.byte_size}
	}
}

/// Material constants and their value storage.
/// Layouts are kept exactly as loaded until `rebuild`, which packs the values
/// in declaration order and drops everything no constant claims.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantArena {
	entries: Vec<(ConstantKey, ArenaConstant)>,
	values: Vec<f32>,
	next_key: u32,
}

impl ConstantArena {
	pub fn from_material(mtrl: &Mtrl) -> Self {
		let mut arena = Self {
			entries: Vec::with_capacity(mtrl.constants.len()),
			values: mtrl.values.clone(),
			next_key: 0,
		};

		for c in &mtrl.constants {
			let key = arena.new_key();
			arena.entries.push((key, ArenaConstant{id: c.id, byte_offset: c.byte_offset, byte_size: c.byte_size}));
		}

		arena
	}

	/// Writes constants and values back in declaration order
	pub fn write_into(&self, mtrl: &mut Mtrl) {
		mtrl.constants = self.entries.iter().map(|(_, v)| v.as_constant()).collect();
		mtrl.values = self.values.clone();
	}

	fn new_key(&mut self) -> ConstantKey {
		let key = ConstantKey(self.next_key);
		self.next_key += 1;
		key
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn keys(&self) -> impl Iterator<Item = ConstantKey> + '_ {
		self.entries.iter().map(|(k, _)| *k)
	}

	pub fn get(&self, key: ConstantKey) -> Option<&ArenaConstant> {
		self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
	}

	pub fn find(&self, id: u32) -> Option<ConstantKey> {
		self.entries.iter().find(|(_, v)| v.id == id).map(|(k, _)| *k)
	}

	pub fn values(&self, key: ConstantKey) -> Option<&[f32]> {
		let range = self.get(key)?.as_constant().value_range()?;
		self.values.get(range)
	}

	pub fn values_mut(&mut self, key: ConstantKey) -> Option<&mut [f32]> {
		let range = self.get(key)?.as_constant().value_range()?;
		self.values.get_mut(range)
	}

	pub fn all_values(&self) -> &[f32] {
		&self.values
	}

	/// Appends a constant with its own storage, None if the id is taken
	pub fn insert(&mut self, id: u32, values: &[f32]) -> Result<Option<ConstantKey>, crate::Error> {
		if self.find(id).is_some() {return Ok(None)}

		let byte_offset = SizeError::u16("constant values", self.values.len() * 4)?;
		let byte_size = SizeError::u16("constant size", values.len() * 4)?;
		SizeError::u16("constant values", (self.values.len() + values.len()) * 4)?;

		self.values.extend_from_slice(values);
		let key = self.new_key();
		self.entries.push((key, ArenaConstant{id, byte_offset, byte_size}));
		Ok(Some(key))
	}

	/// Storage stays in place until the next `rebuild`
	pub fn remove(&mut self, key: ConstantKey) -> Option<ArenaConstant> {
		let i = self.entries.iter().position(|(k, _)| *k == key)?;
		Some(self.entries.remove(i).1)
	}

	/// Packs the values of every constant contiguously in declaration order.
	/// Aliased constants each get their own copy, unclaimed values are dropped.
	/// Fails without touching anything if a constant is misaligned or out of bounds.
	pub fn rebuild(&mut self) -> Result<(), crate::Error> {
		let mut values = Vec::with_capacity(self.values.len());
		let mut layout = Vec::with_capacity(self.entries.len());
		for (_, c) in &self.entries {
			let Some(range) = c.as_constant().value_range() else {
				return Err(crate::Error::edit(format!("constant {} is not float aligned", display_name(c.id))));
			};

			let Some(slice) = self.values.get(range) else {
				return Err(crate::Error::edit(format!("constant {} reaches past the value storage", display_name(c.id))));
			};

			let byte_offset = SizeError::u16("constant values", values.len() * 4)?;
			values.extend_from_slice(slice);
			layout.push(byte_offset);
		}

		SizeError::u16("constant values", values.len() * 4)?;

		for ((_, c), byte_offset) in self.entries.iter_mut().zip(layout) {
			c.byte_offset = byte_offset;
		}
		self.values = values;

		Ok(())
	}
}

// ----------

/// A constant being composed before it is added
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantDraft {
	pub id: u32,
	pub value_count: usize,
}

/// A sampler being composed, together with the texture it samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplerDraft {
	pub id: u32,
	pub texture_path: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyDraft {
	pub category: u32,
	pub value: u32,
}

/// New entries being composed in a session, one of each kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
	pub constant: ConstantDraft,
	pub sampler: SamplerDraft,
	pub key: KeyDraft,
}

impl ConstantDraft {
	/// Adds the constant with zeroed values, or the given defaults when they fit
	pub fn commit(&mut self, arena: &mut ConstantArena, defaults: Option<&[f32]>) -> Result<Option<ConstantKey>, crate::Error> {
		if self.value_count == 0 {
			return Err(crate::Error::edit("a constant needs at least one value"));
		}

		let values = match defaults {
			Some(v) if v.len() == self.value_count => v.to_vec(),
			_ => vec![0.0; self.value_count],
		};

		let key = arena.insert(self.id, &values)?;
		if key.is_some() {
			*self = Self::default();
		}

		Ok(key)
	}
}

impl SamplerDraft {
	/// Adds the sampler, reusing a texture slot if the path is already present.
	/// False if the material already has a sampler with this id.
	pub fn commit(&mut self, mtrl: &mut Mtrl) -> Result<bool, crate::Error> {
		if mtrl.sampler(self.id).is_some() {return Ok(false)}

		let existing = mtrl.textures.iter().position(|v| v.path == self.texture_path);
		let texture_index = u8::try_from(existing.unwrap_or(mtrl.textures.len()))
			.ok()
			.filter(|v| *v != NO_TEXTURE)
			.ok_or_else(|| crate::Error::edit("too many textures"))?;

		if existing.is_none() {
			mtrl.textures.push(Texture{path: self.texture_path.clone(), flags: 0});
		}

		mtrl.samplers.push(Sampler::new(self.id, texture_index));
		*self = Self::default();
		Ok(true)
	}
}

impl KeyDraft {
	pub fn commit(&mut self, mtrl: &mut Mtrl) {
		mtrl.set_shader_key(self.category, self.value);
		*self = Self::default();
	}
}
