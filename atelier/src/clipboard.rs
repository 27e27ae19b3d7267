//! Text form of color table rows for copy and paste, base64 of the raw row
//! bytes directly followed by the dye row bytes.

use base64::{engine::general_purpose::STANDARD, Engine};
use pigment::{ColorDyeTable, ColorDyeTableRow, ColorTable, ColorTableRow};
use crate::Error;

pub fn export_row(row: &ColorTableRow, dye: Option<&ColorDyeTableRow>) -> String {
	let mut data = row.write().to_vec();
	if let Some(dye) = dye {
		data.extend_from_slice(&dye.write());
	}

	STANDARD.encode(data)
}

pub fn export_table(table: &ColorTable, dyes: Option<&ColorDyeTable>) -> String {
	let mut data = table.write().to_vec();
	if let Some(dyes) = dyes {
		data.extend_from_slice(&dyes.write());
	}

	STANDARD.encode(data)
}

/// The row and, if the text carries one, its dye row
pub fn decode_row(text: &str) -> Result<(ColorTableRow, Option<ColorDyeTableRow>), Error> {
	let data = STANDARD.decode(text.trim())?;
	let row = ColorTableRow::parse(&data)?;
	let dye = match data.get(ColorTableRow::SIZE..) {
		Some(rest) if rest.len() >= ColorDyeTableRow::SIZE => Some(ColorDyeTableRow::parse(rest)?),
		_ => None,
	};

	Ok((row, dye))
}

pub fn decode_table(text: &str) -> Result<(ColorTable, Option<ColorDyeTable>), Error> {
	let data = STANDARD.decode(text.trim())?;
	let table = ColorTable::parse(&data)?;
	let dyes = match data.get(ColorTable::SIZE..) {
		Some(rest) if rest.len() >= ColorDyeTable::SIZE => Some(ColorDyeTable::parse(rest)?),
		_ => None,
	};

	Ok((table, dyes))
}

/// Replaces the row with the pasted one, false and untouched if the text is not a row.
/// The dye row is only replaced if both the text and the target have one.
pub fn import_row(text: &str, row: &mut ColorTableRow, dye: Option<&mut ColorDyeTableRow>) -> bool {
	match decode_row(text) {
		Ok((new_row, new_dye)) => {
			*row = new_row;
			if let (Some(dye), Some(new_dye)) = (dye, new_dye) {
				*dye = new_dye;
			}
			true
		}

		Err(e) => {
			log!(err, "Could not paste color table row ({e})");
			false
		}
	}
}

pub fn import_table(text: &str, table: &mut ColorTable, dyes: Option<&mut ColorDyeTable>) -> bool {
	match decode_table(text) {
		Ok((new_table, new_dyes)) => {
			*table = new_table;
			if let (Some(dyes), Some(new_dyes)) = (dyes, new_dyes) {
				*dyes = new_dyes;
			}
			true
		}

		Err(e) => {
			log!(err, "Could not paste color table ({e})");
			false
		}
	}
}
