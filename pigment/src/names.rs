use std::{collections::HashMap, sync::LazyLock};

const CRC_TABLE: [u32; 256] = {
	let mut table = [0u32; 256];
	let mut i = 0;
	while i < 256 {
		let mut c = i as u32;
		let mut k = 0;
		while k < 8 {
			c = if c & 1 != 0 {0xEDB88320 ^ (c >> 1)} else {c >> 1};
			k += 1;
		}
		table[i] = c;
		i += 1;
	}
	table
};

/// The crc the game uses to identify shader resources and keys.
/// Regular crc32 without the initial and final inversion.
pub const fn crc32(data: &[u8]) -> u32 {
	let mut crc = 0u32;
	let mut i = 0;
	while i < data.len() {
		crc = CRC_TABLE[((crc ^ data[i] as u32) & 0xFF) as usize] ^ (crc >> 8);
		i += 1;
	}
	crc
}

pub const MATERIAL_PARAMETER: u32 = crc32(b"g_MaterialParameter");

static NAMES: LazyLock<HashMap<u32, &'static str>> = LazyLock::new(|| {
	[
		// material constants
		"g_AlphaAperture",
		"g_AlphaMultiParam",
		"g_AlphaOffset",
		"g_AlphaThreshold",
		"g_AmbientOcclusionMask",
		"g_Color",
		"g_DetailColor",
		"g_DetailID",
		"g_DetailNormalScale",
		"g_DiffuseColor",
		"g_EmissiveColor",
		"g_EnvMapPower",
		"g_Fresnel",
		"g_FresnelValue0",
		"g_HeightScale",
		"g_IrisRingColor",
		"g_IrisThickness",
		"g_LipRoughnessScale",
		"g_NormalScale",
		"g_OutlineColor",
		"g_OutlineWidth",
		"g_ScatteringLevel",
		"g_ShaderID",
		"g_ShadowAlphaThreshold",
		"g_SheenAperture",
		"g_SheenRate",
		"g_SheenTintRate",
		"g_Shininess",
		"g_SpecularColor",
		"g_SpecularColorMask",
		"g_SpecularMask",
		"g_SpecularPower",
		"g_SphereMapIndex",
		"g_SSAOMask",
		"g_TextureMipBias",
		"g_TileAlpha",
		"g_TileIndex",
		"g_TileScale",
		"g_ToonIndex",
		"g_WhiteEyeColor",

		// constant buffers
		"g_CommonParameter",
		"g_CustomizeParameter",
		"g_MaterialParameter",
		"g_MaterialParameterDynamic",
		"g_ModelParameter",
		"g_SceneParameter",

		// samplers
		"g_SamplerCatchlight",
		"g_SamplerColorMap0",
		"g_SamplerColorMap1",
		"g_SamplerDecal",
		"g_SamplerDiffuse",
		"g_SamplerEnvMap",
		"g_SamplerFlow",
		"g_SamplerIndex",
		"g_SamplerMask",
		"g_SamplerNormal",
		"g_SamplerNormalMap0",
		"g_SamplerNormalMap1",
		"g_SamplerReflectionArray",
		"g_SamplerSpecular",
		"g_SamplerSpecularMap0",
		"g_SamplerSpecularMap1",
		"g_SamplerSphereMap",
		"g_SamplerTable",
		"g_SamplerTileNormal",
		"g_SamplerTileOrb",
		"g_SamplerWaveMap",
		"g_SamplerWhitecapMap",

		// material keys
		"CategorySkinType",
		"CategoryHairType",
		"CategoryTextureType",
		"CategorySpecularType",
		"CategoryFlowMapType",
		"CategoryDiffuseAlpha",
	].into_iter()
		.map(|v| (crc32(v.as_bytes()), v))
		.collect()
});

/// Display name for a resource id, if it is one we know of
pub fn shader_param_name(id: u32) -> Option<&'static str> {
	NAMES.get(&id).copied()
}

/// Name if known, hex id otherwise
pub fn display_name(id: u32) -> String {
	match shader_param_name(id) {
		Some(name) => name.to_string(),
		None => format!("0x{id:08X}"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn crc_matches_game_ids() {
		assert_eq!(crc32(b"g_SamplerNormal"), 0x0C5EC1F1);
		assert_eq!(crc32(b"g_DiffuseColor"), 0x2C2A34DD);
		assert_eq!(crc32(b"g_AlphaThreshold"), 0x29AC0223);
		assert_eq!(MATERIAL_PARAMETER, 0x64D12851);
		assert_eq!(crc32(b""), 0);
	}

	#[test]
	fn names_resolve_by_id() {
		assert_eq!(shader_param_name(0x565F8FD8), Some("g_SamplerIndex"));
		assert_eq!(shader_param_name(0xABCD1234), None);
		assert_eq!(display_name(0xABCD1234), "0xABCD1234");
		assert_eq!(display_name(0x2C2A34DD), "g_DiffuseColor");
	}
}
