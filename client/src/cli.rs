use std::{path::{Path, PathBuf}, rc::Rc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use atelier::{pigment::{self, format::{external::Bytes, game::{ShaderPackage, Stm}}, names::display_name, resolve::range_name}, source::{FileSource, Sources}, tab::FileTab, EditSession};

pub fn handle_cli() -> Result<(), Box<dyn std::error::Error>> {
	let matches = Command::new("atelier")
		.about("Final Fantasy XIV material and shader package editor")
		.version("1.0")
		.subcommand_required(true)

		.subcommand(Command::new("inspect")
			.short_flag('i')
			.about("Print the contents of a material, model or shader package")
			.arg(file_arg("The game path or local path of the file")))

		.subcommand(Command::new("validate")
			.short_flag('v')
			.about("Check a file for layout problems, materials are checked against their shader package")
			.arg(file_arg("The game path or local path of the file"))
			.arg(Arg::new("shpk")
				.long("shpk")
				.help("Shader package to check against instead of the one the material names")
				.value_parser(value_parser!(PathBuf))
				.action(ArgAction::Set)
				.num_args(1)))

		.subcommand(Command::new("devkit")
			.about("Export the unused material parameter ranges of a shader package")
			.arg(file_arg("The game path or local path of the shader package"))
			.arg(out_arg()))

		.subcommand(Command::new("dye")
			.about("Apply a stain to the color table of a material")
			.arg(file_arg("The game path or local path of the material"))
			.arg(Arg::new("stain")
				.long("stain")
				.help("Stain id, 1 based")
				.required(true)
				.value_parser(value_parser!(u8))
				.action(ArgAction::Set)
				.num_args(1))
			.arg(Arg::new("stm")
				.long("stm")
				.help("Staining template to use instead of the configured one")
				.value_parser(value_parser!(PathBuf))
				.action(ArgAction::Set)
				.num_args(1))
			.arg(out_arg()))

		.subcommand(Command::new("copy-row")
			.about("Print a color table row and its dye row as base64")
			.arg(file_arg("The game path or local path of the material"))
			.arg(row_arg()))

		.subcommand(Command::new("paste-row")
			.about("Replace a color table row with one copied before")
			.arg(file_arg("The game path or local path of the material"))
			.arg(row_arg())
			.arg(Arg::new("data")
				.help("The base64 text of the row")
				.required(true)
				.action(ArgAction::Set)
				.num_args(1))
			.arg(out_arg()))

		.get_matches();

	match matches.subcommand() {
		Some(("inspect", sub)) => {
			let session = open(sub)?;
			inspect(&session);
		}

		Some(("validate", sub)) => {
			let mut session = open(sub)?;
			if let Some(path) = sub.get_one::<PathBuf>("shpk") {
				session.set_shader_package(Some(ShaderPackage::from_bytes(&std::fs::read(path)?)?));
			}

			let issues = session.validate();
			if let Some(err) = session.last_error() {
				println!("Warning: {err}");
			}

			if issues.is_empty() {
				println!("No issues found");
			} else {
				for issue in issues {
					println!("{issue}");
				}
			}
		}

		Some(("devkit", sub)) => {
			let session = open(sub)?;
			let FileTab::ShaderPackage(shpk) = session.tab() else {
				return Err("devkit export needs a shader package".into());
			};

			let json = pigment::devkit::export(shpk)?;
			match sub.get_one::<PathBuf>("out") {
				Some(path) => std::fs::write(path, json)?,
				None => println!("{json}"),
			}
		}

		Some(("dye", sub)) => {
			let mut session = open(sub)?;
			if let Some(path) = sub.get_one::<PathBuf>("stm") {
				session.set_staining_template(Some(Stm::from_bytes(&std::fs::read(path)?)?));
			}

			let stain = *sub.get_one::<u8>("stain").ok_or("stain is required")?;
			let changed = session.apply_dye(stain);
			if let Some(err) = session.last_error() {
				return Err(err.to_string().into());
			}

			println!("Dyed {} rows", changed.len());
			save(&mut session, sub)?;
		}

		Some(("copy-row", sub)) => {
			let mut session = open(sub)?;
			let row = *sub.get_one::<usize>("row").ok_or("row is required")?;
			let text = session.copy_row(row).ok_or("material has no such color table row")?;
			println!("{text}");
		}

		Some(("paste-row", sub)) => {
			let mut session = open(sub)?;
			let row = *sub.get_one::<usize>("row").ok_or("row is required")?;
			let data = sub.get_one::<String>("data").ok_or("data is required")?;
			if !session.paste_row(row, data) {
				return Err(match session.last_error() {
					Some(err) => err.to_string(),
					None => "material has no such color table row".to_string(),
				}.into());
			}

			save(&mut session, sub)?;
		}

		_ => unreachable!()
	}

	Ok(())
}

fn file_arg(help: &'static str) -> Arg {
	Arg::new("path")
		.help(help)
		.required(true)
		.action(ArgAction::Set)
		.num_args(1)
}

fn row_arg() -> Arg {
	Arg::new("row")
		.help("Index of the color table row, 0 based")
		.required(true)
		.value_parser(value_parser!(usize))
		.action(ArgAction::Set)
		.num_args(1)
}

fn out_arg() -> Arg {
	Arg::new("out")
		.long("out")
		.help("The path of the output, defaults to overwriting the input")
		.value_parser(value_parser!(PathBuf))
		.action(ArgAction::Set)
		.num_args(1)
}

/// Local files are opened directly, anything else is looked up as a game path
fn open(sub: &ArgMatches) -> Result<EditSession, Box<dyn std::error::Error>> {
	let path = sub.get_one::<String>("path").ok_or("path is required")?;
	let path = match Path::new(path).is_file() {
		true => std::fs::canonicalize(path)?.to_string_lossy().to_string(),
		false => path.to_owned(),
	};

	let config = &atelier::config().config;
	let source: Rc<dyn FileSource> = Rc::new(Sources::from_config(config));
	Ok(EditSession::open(&path, source, config)?)
}

fn save(session: &mut EditSession, sub: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
	let saved = match sub.get_one::<PathBuf>("out") {
		Some(path) => session.save_as(path),
		None => session.save(),
	};

	match (saved, session.last_error()) {
		(true, _) => Ok(()),
		(false, Some(err)) => Err(err.to_string().into()),
		(false, None) => Err("saving failed".into()),
	}
}

fn inspect(session: &EditSession) {
	println!("{} {}", session.tab().title(), session.path());

	match session.tab() {
		FileTab::Material(tab) => {
			let mtrl = tab.mtrl();
			println!("Shader: {}", mtrl.shader);

			println!("\nTextures:");
			for (i, tex) in mtrl.textures.iter().enumerate() {
				println!("\t{i}: {}", tex.path);
			}

			println!("\nSamplers:");
			for sampler in &mtrl.samplers {
				let tex = mtrl.sampler_texture(sampler).map_or("<none>", |v| v.path.as_str());
				println!("\t{}: {tex}", display_name(sampler.id));
			}

			println!("\nConstants:");
			for constant in &mtrl.constants {
				let range = range_name("Values", constant.byte_offset as usize >> 2, constant.byte_size as usize >> 2);
				match mtrl.constant_values(constant.id) {
					Some(values) => println!("\t{} {range}: {values:?}", display_name(constant.id)),
					None => println!("\t{} {range}: <malformed>", display_name(constant.id)),
				}
			}

			println!("\nShader keys:");
			for key in &mtrl.shader_keys {
				println!("\t{}: 0x{:08X}", display_name(key.category), key.value);
			}

			match (mtrl.color_table(), mtrl.dye_table()) {
				(Some(_), Some(_)) => println!("\nColor table with dyes"),
				(Some(_), None) => println!("\nColor table"),
				_ => {}
			}
		}

		FileTab::Model(mdl) => {
			println!("Materials:");
			for path in mdl.material_paths() {
				println!("\t{path}");
			}
		}

		FileTab::ShaderPackage(shpk) => {
			println!("Shaders: {} vertex, {} pixel", shpk.vertex_shaders.len(), shpk.pixel_shaders.len());

			let usage = shpk.material_param_usage();
			println!("\nMaterial parameters:");
			for param in &shpk.material_params {
				let offset = param.byte_offset as usize >> 2;
				let len = param.byte_size as usize >> 2;
				let used = usage.get(offset..offset + len).map_or(false, |v| v.iter().any(|v| *v));
				println!("\t{} {}{}", display_name(param.id), range_name("g_MaterialParameter", offset, len), if used {""} else {" (unused)"});
			}

			println!("\nMaterial samplers:");
			for sampler in shpk.material_samplers() {
				println!("\t{}", shpk.resource_name(sampler).map_or_else(|| display_name(sampler.id), |v| v.to_string()));
			}

			println!("\nMaterial keys:");
			for key in &shpk.material_keys {
				println!("\t{}: default 0x{:08X}", display_name(key.id), key.default);
			}
		}
	}
}
