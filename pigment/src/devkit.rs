//! Export of the material parameter parts a shader never reads, so authoring
//! tools can hide them.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::format::game::ShaderPackage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Hidden {
	/// No part of the parameter is read
	Full,
	/// Unread floats relative to the start of the parameter
	#[serde(rename_all = "PascalCase")]
	Range {
		offset: usize,
		length: usize,
	},
}

/// Hidden parts per parameter id, parameters that are read in full are left out
pub fn hidden_params(shpk: &ShaderPackage, usage: &[bool]) -> BTreeMap<u32, Vec<Hidden>> {
	let mut hidden = BTreeMap::new();
	for param in &shpk.material_params {
		let Some(range) = param.value_range() else {continue};
		if range.is_empty() {continue}

		let mut parts = Vec::new();
		let mut start = None;
		for (i, float) in range.clone().enumerate() {
			let used = usage.get(float).copied().unwrap_or(false);
			match (used, start) {
				(false, None) => start = Some(i),
				(true, Some(s)) => {
					parts.push(Hidden::Range{offset: s, length: i - s});
					start = None;
				}
				_ => {}
			}
		}

		if let Some(s) = start {
			if s == 0 {
				parts.push(Hidden::Full);
			} else {
				parts.push(Hidden::Range{offset: s, length: range.len() - s});
			}
		}

		if !parts.is_empty() {
			hidden.insert(param.id, parts);
		}
	}

	hidden
}

/// Tab indented json of [`hidden_params`] using the package's own usage
pub fn export(shpk: &ShaderPackage) -> Result<String, crate::Error> {
	let hidden = hidden_params(shpk, &shpk.material_param_usage());
	let mut serializer = serde_json::Serializer::with_formatter(Vec::new(), serde_json::ser::PrettyFormatter::with_indent(b"\t"));
	hidden.serialize(&mut serializer)?;
	Ok(String::from_utf8(serializer.into_inner()).map_err(|e| e.utf8_error())?)
}

#[cfg(test)]
mod tests {
	use crate::format::game::shpk;
	use super::*;

	#[test]
	fn unread_parts_are_listed() {
		let shpk = shpk::tests::sample();
		let hidden = hidden_params(&shpk, &shpk.material_param_usage());

		// floats 8 and up are never read, which is all of 0xABCD1234
		assert_eq!(hidden.len(), 1);
		assert_eq!(hidden[&0xABCD1234], [Hidden::Full]);

		let mut usage = vec![true; 12];
		usage[5] = false;
		usage[6] = false;
		usage[9] = false;
		let hidden = hidden_params(&shpk, &usage);
		assert_eq!(hidden[&0x38A64362], [Hidden::Range{offset: 1, length: 2}]);
		assert_eq!(hidden[&0xABCD1234], [Hidden::Range{offset: 1, length: 1}]);
		assert!(!hidden.contains_key(&0x2C2A34DD));
	}

	#[test]
	fn json_layout() {
		let mut hidden = BTreeMap::new();
		hidden.insert(5u32, vec![Hidden::Full]);
		hidden.insert(7u32, vec![Hidden::Range{offset: 1, length: 2}]);
		let json = serde_json::to_string(&hidden).unwrap();
		assert_eq!(json, r#"{"5":[{"Type":"Full"}],"7":[{"Type":"Range","Offset":1,"Length":2}]}"#);

		let export = export(&shpk::tests::sample()).unwrap();
		assert!(export.contains(&format!("\"{}\"", 0xABCD1234u32)));
		assert!(export.contains("\t"));
	}
}
