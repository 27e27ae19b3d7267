use std::{collections::{BTreeSet, HashSet}, fmt, ops::Range};
use crate::format::game::{mtrl::NO_TEXTURE, Mtrl, ShaderPackage};

/// How a set of ranges covers an index space.
/// Every index is either orphaned, aliased, or claimed exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
	pub universe: usize,
	pub orphaned: BTreeSet<usize>,
	pub aliased: BTreeSet<usize>,
}

impl Coverage {
	/// Claims are clipped to the universe, anything past it is reported elsewhere
	pub fn compute(universe: usize, claims: impl IntoIterator<Item = Range<usize>>) -> Self {
		let mut orphaned = (0..universe).collect::<BTreeSet<_>>();
		let mut aliased = BTreeSet::new();
		for claim in claims {
			for i in claim.start..claim.end.min(universe) {
				if !orphaned.remove(&i) {
					aliased.insert(i);
				}
			}
		}

		Self {universe, orphaned, aliased}
	}

	pub fn single_count(&self) -> usize {
		self.universe - self.orphaned.len() - self.aliased.len()
	}

	pub fn is_clean(&self) -> bool {
		self.orphaned.is_empty() && self.aliased.is_empty()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformation {
	/// Offset or size is not a multiple of 4
	Misaligned,
	/// Reaches past the storage it indexes
	OutOfBounds,
	/// The shader declares the parameter with another size, both in bytes
	SizeMismatch{expected: u16, actual: u16},
	/// The loaded shader package has no parameter with this id
	Unresolved,
}

impl fmt::Display for Malformation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Malformation::Misaligned => write!(f, "offset or size is not a multiple of 4"),
			Malformation::OutOfBounds => write!(f, "out of bounds"),
			Malformation::SizeMismatch{expected, actual} => write!(f, "size is {actual} bytes, the shader expects {expected}"),
			Malformation::Unresolved => write!(f, "not known to the shader package"),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
	pub has_shader_package: bool,
	pub missing_constants: Vec<u32>,
	pub missing_samplers: Vec<u32>,
	pub missing_keys: Vec<u32>,
	pub unknown_constants: Vec<u32>,
	pub unknown_samplers: Vec<u32>,
	pub unknown_keys: Vec<u32>,
	/// Over the material's float values
	pub values: Coverage,
	/// Over the material's textures, by sampler texture index
	pub textures: Coverage,
	pub malformed_constants: Vec<(u32, Malformation)>,
	pub malformed_samplers: Vec<(u32, Malformation)>,
	/// Shader parameters that cannot be mapped onto floats
	pub malformed_params: Vec<u32>,
}

impl Resolution {
	/// Adding or compacting constants needs every layout on both sides to be float aligned
	pub fn can_add_constants(&self) -> bool {
		self.malformed_params.is_empty() &&
		!self.malformed_constants.iter().any(|(_, v)| *v == Malformation::Misaligned)
	}

	pub fn constant_malformation(&self, id: u32) -> Option<Malformation> {
		self.malformed_constants.iter().find(|(v, _)| *v == id).map(|(_, v)| *v)
	}

	pub fn is_clean(&self) -> bool {
		self.missing_constants.is_empty() &&
		self.missing_samplers.is_empty() &&
		self.missing_keys.is_empty() &&
		self.unknown_constants.is_empty() &&
		self.unknown_samplers.is_empty() &&
		self.unknown_keys.is_empty() &&
		self.values.is_clean() &&
		self.textures.is_clean() &&
		self.malformed_constants.is_empty() &&
		self.malformed_samplers.is_empty() &&
		self.malformed_params.is_empty()
	}
}

/// Floats a constant touches, rounding misaligned bounds outwards
fn touched_floats(byte_offset: u16, byte_size: u16) -> Range<usize> {
	let start = byte_offset as usize >> 2;
	let end = (byte_offset as usize + byte_size as usize + 3) >> 2;
	start..end
}

/// Matches a material against the layout of its shader package by id.
/// Without a package only the material's own storage is checked.
pub fn resolve(mtrl: &Mtrl, shpk: Option<&ShaderPackage>) -> Resolution {
	let mut res = Resolution {
		has_shader_package: shpk.is_some(),
		values: Coverage::compute(mtrl.values.len(), mtrl.constants.iter().map(|v| touched_floats(v.byte_offset, v.byte_size))),
		textures: Coverage::compute(mtrl.textures.len(), mtrl.samplers.iter()
			.filter(|v| v.texture_index != NO_TEXTURE)
			.map(|v| v.texture_index as usize..v.texture_index as usize + 1)),
		..Default::default()
	};

	for constant in &mtrl.constants {
		match constant.value_range() {
			None => res.malformed_constants.push((constant.id, Malformation::Misaligned)),
			Some(range) if range.end > mtrl.values.len() => res.malformed_constants.push((constant.id, Malformation::OutOfBounds)),
			Some(_) => {}
		}
	}

	for sampler in &mtrl.samplers {
		if sampler.texture_index != NO_TEXTURE && sampler.texture_index as usize >= mtrl.textures.len() {
			res.malformed_samplers.push((sampler.id, Malformation::OutOfBounds));
		}
	}

	let Some(shpk) = shpk else {return res};

	// constants
	let mut seen = HashSet::new();
	for param in &shpk.material_params {
		if param.value_range().is_none() {
			res.malformed_params.push(param.id);
		}

		if !seen.insert(param.id) {continue}
		match mtrl.constant(param.id) {
			None => res.missing_constants.push(param.id),
			Some(constant) => if constant.is_aligned() && param.is_aligned() && constant.byte_size != param.byte_size {
				res.malformed_constants.push((constant.id, Malformation::SizeMismatch{expected: param.byte_size, actual: constant.byte_size}));
			}
		}
	}

	for constant in &mtrl.constants {
		if shpk.material_param(constant.id).is_none() {
			res.unknown_constants.push(constant.id);
			res.malformed_constants.push((constant.id, Malformation::Unresolved));
		}
	}

	// samplers
	let mut seen = HashSet::new();
	for sampler in shpk.material_samplers() {
		if seen.insert(sampler.id) && mtrl.sampler(sampler.id).is_none() {
			res.missing_samplers.push(sampler.id);
		}
	}

	for sampler in &mtrl.samplers {
		if shpk.material_sampler(sampler.id).is_none() {
			res.unknown_samplers.push(sampler.id);
		}
	}

	// keys
	let mut seen = HashSet::new();
	for key in &shpk.material_keys {
		if seen.insert(key.id) && mtrl.shader_key(key.id).is_none() {
			res.missing_keys.push(key.id);
		}
	}

	for key in &mtrl.shader_keys {
		if shpk.material_key(key.category).is_none() {
			res.unknown_keys.push(key.category);
		}
	}

	res
}

// ----------

/// Part of a single 4 float vector, components `start..end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRange {
	pub vector: usize,
	pub start: u8,
	pub end: u8,
}

impl ComponentRange {
	pub fn is_full(&self) -> bool {
		self.start == 0 && self.end == 4
	}
}

impl fmt::Display for ComponentRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}]", self.vector)?;
		if !self.is_full() {
			write!(f, ".{}", &"xyzw"[self.start as usize..self.end as usize])?;
		}
		Ok(())
	}
}

/// Splits a range in float units into its per vector parts
pub fn component_ranges(offset: usize, len: usize) -> Vec<ComponentRange> {
	let mut ranges = Vec::new();
	let end = offset + len;
	let mut pos = offset;
	while pos < end {
		let vector = pos / 4;
		let vector_end = ((vector + 1) * 4).min(end);
		ranges.push(ComponentRange {
			vector,
			start: (pos % 4) as u8,
			end: (vector_end - vector * 4) as u8,
		});
		pos = vector_end;
	}

	ranges
}

/// Display name of a float range, `g_MaterialParameter[1].yzw, [2]`
pub fn range_name(prefix: &str, offset: usize, len: usize) -> String {
	let parts = component_ranges(offset, len)
		.into_iter()
		.map(|v| v.to_string())
		.collect::<Vec<_>>();

	if parts.is_empty() {
		return format!("{prefix} (empty)");
	}

	format!("{prefix}{}", parts.join(", "))
}

#[cfg(test)]
mod tests {
	use crate::format::game::{mtrl::{self, Constant, Sampler}, shpk::{self, MaterialParam}};
	use super::*;

	#[test]
	fn missing_param_is_not_orphaned() {
		let mut mtrl = Mtrl::new("character.shpk");
		mtrl.add_constant(0x2C2A34DD, &[1.0, 1.0, 1.0]).unwrap();
		let mut shpk = shpk::tests::sample();
		shpk.material_params = vec![
			MaterialParam{id: 0x2C2A34DD, byte_offset: 0, byte_size: 12},
			MaterialParam{id: 0xABCD1234, byte_offset: 16, byte_size: 8},
		];

		let res = resolve(&mtrl, Some(&shpk));
		assert_eq!(res.missing_constants, [0xABCD1234]);
		assert!(res.values.orphaned.is_empty());
		assert!(res.values.aliased.is_empty());
		assert!(res.malformed_constants.is_empty());
	}

	#[test]
	fn shared_storage_is_aliased() {
		let mut mtrl = Mtrl::new("character.shpk");
		mtrl.values = vec![0.0; 8];
		mtrl.constants = vec![
			Constant{id: 1, byte_offset: 0, byte_size: 12},
			Constant{id: 2, byte_offset: 8, byte_size: 8},
		];

		let res = resolve(&mtrl, None);
		assert_eq!(res.values.aliased, BTreeSet::from([2]));
		assert_eq!(res.values.orphaned, BTreeSet::from([4, 5, 6, 7]));
		assert_eq!(res.values.single_count(), 3);
		assert!(res.missing_constants.is_empty());
		assert!(res.can_add_constants());
	}

	#[test]
	fn partition_covers_the_universe() {
		// small lcg, the exact values do not matter
		let mut seed = 0x1234_5678u32;
		let mut next = |max: u32| {
			seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
			(seed >> 8) % max
		};

		for _ in 0..64 {
			let universe = next(40) as usize;
			let claims = (0..next(8)).map(|_| {
				let start = next(44) as usize;
				start..start + next(10) as usize
			}).collect::<Vec<_>>();

			let cov = Coverage::compute(universe, claims.clone());
			assert_eq!(cov.orphaned.len() + cov.aliased.len() + cov.single_count(), universe);
			for i in 0..universe {
				let claimed = claims.iter().filter(|v| v.contains(&i)).count();
				assert_eq!(cov.orphaned.contains(&i), claimed == 0);
				assert_eq!(cov.aliased.contains(&i), claimed >= 2);
			}
		}
	}

	#[test]
	fn malformed_constants_are_reported() {
		let mut mtrl = Mtrl::new("character.shpk");
		mtrl.values = vec![0.0; 4];
		mtrl.constants = vec![
			Constant{id: 0x2C2A34DD, byte_offset: 2, byte_size: 12},
			Constant{id: 0x29AC0223, byte_offset: 12, byte_size: 8},
			Constant{id: 0x38A64362, byte_offset: 0, byte_size: 8},
			Constant{id: 0x7777, byte_offset: 0, byte_size: 4},
		];

		let shpk = shpk::tests::sample();
		let res = resolve(&mtrl, Some(&shpk));
		assert_eq!(res.constant_malformation(0x2C2A34DD), Some(Malformation::Misaligned));
		assert!(res.malformed_constants.contains(&(0x29AC0223, Malformation::OutOfBounds)));
		assert!(res.malformed_constants.contains(&(0x29AC0223, Malformation::SizeMismatch{expected: 4, actual: 8})));
		assert!(res.malformed_constants.contains(&(0x38A64362, Malformation::SizeMismatch{expected: 12, actual: 8})));
		assert!(res.malformed_constants.contains(&(0x7777, Malformation::Unresolved)));
		assert_eq!(res.unknown_constants, [0x7777]);
		assert_eq!(res.missing_constants, [0xABCD1234]);
		assert!(!res.can_add_constants());
	}

	#[test]
	fn samplers_and_keys_match_by_id() {
		let mut mtrl = Mtrl::new("character.shpk");
		mtrl.textures.push(mtrl::Texture{path: "a.tex".to_string(), flags: 0});
		mtrl.textures.push(mtrl::Texture{path: "b.tex".to_string(), flags: 0});
		mtrl.textures.push(mtrl::Texture{path: "c.tex".to_string(), flags: 0});
		mtrl.samplers.push(Sampler::new(0x0C5EC1F1, 0));
		mtrl.samplers.push(Sampler::new(0x1234, 0));
		mtrl.samplers.push(Sampler::new(0x5678, 9));
		mtrl.samplers.push(Sampler::new(0x9ABC, NO_TEXTURE));
		mtrl.set_shader_key(0xBEEF, 1);

		let res = resolve(&mtrl, Some(&shpk::tests::sample()));
		assert_eq!(res.missing_samplers, [0x8A4E82B6]);
		assert_eq!(res.unknown_samplers, [0x1234, 0x5678, 0x9ABC]);
		assert_eq!(res.malformed_samplers, [(0x5678, Malformation::OutOfBounds)]);
		assert_eq!(res.textures.aliased, BTreeSet::from([0]));
		assert_eq!(res.textures.orphaned, BTreeSet::from([1, 2]));
		assert_eq!(res.missing_keys, [0x7B7F12CD]);
		assert_eq!(res.unknown_keys, [0xBEEF]);
	}

	#[test]
	fn ranges_split_per_vector() {
		assert_eq!(component_ranges(1, 2), [ComponentRange{vector: 0, start: 1, end: 3}]);
		assert_eq!(component_ranges(4, 4), [ComponentRange{vector: 1, start: 0, end: 4}]);
		assert_eq!(component_ranges(6, 7).len(), 3);
		assert_eq!(range_name("g_MaterialParameter", 5, 7), "g_MaterialParameter[1].yzw, [2]");
		assert_eq!(range_name("g_MaterialParameter", 3, 2), "g_MaterialParameter[0].w, [1].x");
		assert_eq!(range_name("x", 0, 0), "x (empty)");
	}
}
