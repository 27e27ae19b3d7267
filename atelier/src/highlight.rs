use glam::Vec3;
use pigment::{ColorTable, ColorTableRow};

/// Ticks per pulse
pub const PERIOD: u32 = 32;

/// Brightness of the pulse at a tick, between 1/9 and 1
pub fn pulse(tick: u32) -> f32 {
	let phase = (tick % PERIOD) as f32 * std::f32::consts::TAU / PERIOD as f32;
	let v = (phase.sin() + 2.0) / 3.0;
	v * v
}

/// Preview of a single row, it goes dark and its emissive pulses.
/// Only ever lives in memory, `restore` puts the original row back.
#[derive(Debug, Clone)]
pub struct Highlighter {
	pub color: Vec3,
	tick: u32,
	active: Option<(usize, ColorTableRow)>,
}

impl Highlighter {
	pub fn new(color: Vec3) -> Self {
		Self {
			color,
			tick: 0,
			active: None,
		}
	}

	pub fn row(&self) -> Option<usize> {
		self.active.as_ref().map(|(i, _)| *i)
	}

	pub fn tick(&self) -> u32 {
		self.tick
	}

	/// Starts highlighting a row, any previous one is restored first
	pub fn start(&mut self, table: &mut ColorTable, row: usize) -> bool {
		self.restore(table);
		let Some(original) = table.rows.get(row) else {return false};
		self.active = Some((row, *original));
		self.tick = 0;
		self.apply(table);
		true
	}

	/// Advances the pulse and writes it into the table
	pub fn update(&mut self, table: &mut ColorTable) {
		if self.active.is_none() {return}
		self.tick = (self.tick + 1) % PERIOD;
		self.apply(table);
	}

	pub fn restore(&mut self, table: &mut ColorTable) {
		if let Some((row, original)) = self.active.take() {
			table.rows[row] = original;
		}
	}

	fn apply(&self, table: &mut ColorTable) {
		let Some((row, _)) = self.active else {return};
		let row = &mut table.rows[row];
		row.set_diffuse(Vec3::ZERO);
		row.set_specular(Vec3::ZERO);
		row.set_emissive(self.color * pulse(self.tick));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pulse_stays_in_range() {
		for tick in 0..PERIOD * 2 {
			let v = pulse(tick);
			assert!(v >= 1.0 / 9.0 - 1e-6 && v <= 1.0 + 1e-6, "{tick} {v}");
		}

		assert!((pulse(0) - 4.0 / 9.0).abs() < 1e-6);
		assert!((pulse(8) - 1.0).abs() < 1e-6);
		assert!((pulse(24) - 1.0 / 9.0).abs() < 1e-6);
		assert_eq!(pulse(3), pulse(3 + PERIOD));
	}

	#[test]
	fn restore_brings_back_the_row() {
		let mut table = ColorTable::default();
		table.rows[4].set_emissive(Vec3::new(0.1, 0.2, 0.3));
		let original = table.clone();

		let mut highlighter = Highlighter::new(Vec3::ONE);
		assert!(highlighter.start(&mut table, 4));
		for _ in 0..40 {
			highlighter.update(&mut table);
			assert_eq!(table.rows[4].diffuse(), Vec3::ZERO);
		}
		assert_eq!(highlighter.tick(), 40 % PERIOD);
		assert_ne!(table, original);

		// switching rows restores the previous one
		assert!(highlighter.start(&mut table, 5));
		assert_eq!(table.rows[4], original.rows[4]);

		highlighter.restore(&mut table);
		assert_eq!(table, original);
		assert_eq!(highlighter.row(), None);
		assert!(!highlighter.start(&mut table, 32));
	}
}
