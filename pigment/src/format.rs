pub mod external {
	pub mod bytes;
	pub use bytes::Bytes;
}

pub mod game {
	pub mod mtrl;
	pub use mtrl::Mtrl;
	pub mod shpk;
	pub use shpk::ShaderPackage;
	pub mod stm;
	pub use stm::Stm;
	pub mod mdl;
	pub use mdl::Mdl;

	pub trait Extension {
		const EXT: &'static [&'static str];
	}
}
