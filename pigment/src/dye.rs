use crate::{format::game::stm::{DyePack, Stm}, ColorDyeTable, ColorDyeTableRow, ColorTable, ColorTableRow};

/// Copies the fields the dye row marks as dyeable from the pack into the row.
/// Returns whether anything changed, applying the same pack twice changes nothing the second time.
pub fn apply_dye(row: &mut ColorTableRow, dye: &ColorDyeTableRow, pack: &DyePack) -> bool {
	let mut changed = false;

	if dye.diffuse() {
		changed |= row.set_diffuse(pack.diffuse);
	}

	if dye.specular() {
		changed |= row.set_specular(pack.specular);
	}

	if dye.specular_strength() {
		changed |= row.set_specular_strength(pack.specular_power);
	}

	if dye.emissive() {
		changed |= row.set_emissive(pack.emissive);
	}

	if dye.gloss() {
		changed |= row.set_gloss_strength(pack.gloss);
	}

	changed
}

/// Dyes every row whose template knows the stain, rows without a pack are left alone.
/// Returns the indices of the rows that changed.
pub fn apply_dye_table(table: &mut ColorTable, dyes: &ColorDyeTable, stm: &Stm, stain: u8) -> Vec<usize> {
	let mut changed = Vec::new();
	for (i, (row, dye)) in table.rows.iter_mut().zip(dyes.rows.iter()).enumerate() {
		let Some(pack) = stm.dye_pack(dye.template(), stain) else {continue};
		if apply_dye(row, dye, &pack) {
			changed.push(i);
		}
	}

	changed
}

#[cfg(test)]
mod tests {
	use glam::Vec3;
	use crate::format::game::stm;
	use super::*;

	fn pack() -> DyePack {
		DyePack {
			diffuse: Vec3::new(0.8, 0.1, 0.1),
			specular: Vec3::new(0.3, 0.3, 0.3),
			emissive: Vec3::new(0.0, 0.2, 0.0),
			gloss: 0.0,
			specular_power: 0.75,
		}
	}

	#[test]
	fn only_flagged_fields_change() {
		let original = ColorTableRow::default();
		let mut row = original;
		let mut dye = ColorDyeTableRow::default();
		dye.set_diffuse(true);

		assert!(apply_dye(&mut row, &dye, &pack()));
		assert_ne!(row.diffuse(), original.diffuse());
		assert_eq!(row.raw()[3..], original.raw()[3..]);
	}

	#[test]
	fn dyeing_is_idempotent() {
		let mut dye = ColorDyeTableRow::default();
		let setters: [fn(&mut ColorDyeTableRow, bool) -> bool; 5] = [ColorDyeTableRow::set_diffuse, ColorDyeTableRow::set_specular, ColorDyeTableRow::set_emissive, ColorDyeTableRow::set_gloss, ColorDyeTableRow::set_specular_strength];
		for set in setters {
			set(&mut dye, true);
		}

		let mut row = ColorTableRow::default();
		apply_dye(&mut row, &dye, &pack());
		let once = row;
		assert!(!apply_dye(&mut row, &dye, &pack()));
		assert_eq!(row, once);

		// gloss of 0 is floored
		assert!(row.gloss_strength() > 0.0);
		assert_eq!(row.specular_strength(), 0.75);
	}

	#[test]
	fn tables_skip_unknown_templates() {
		let stm = stm::tests::sample();
		let mut table = ColorTable::default();
		let mut dyes = ColorDyeTable::default();
		dyes.rows[0].set_template(7);
		dyes.rows[0].set_diffuse(true);
		dyes.rows[1].set_template(8);
		dyes.rows[1].set_diffuse(true);
		dyes.rows[2].set_template(7);

		assert_eq!(apply_dye_table(&mut table, &dyes, &stm, 1), [0]);
		assert_eq!(table.rows[0].diffuse(), Vec3::new(1.0, 0.0, 0.0));
		assert_eq!(table.rows[1], ColorTableRow::default());

		// stain 0 means undyed
		assert!(apply_dye_table(&mut table, &dyes, &stm, 0).is_empty());
	}
}
