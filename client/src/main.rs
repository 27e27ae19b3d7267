mod cli;

fn log(typ: atelier::LogType, msg: &str) {
	match typ {
		atelier::LogType::Log => println!("[{}] {msg}", typ.label()),
		_ => eprintln!("[{}] {msg}", typ.label()),
	}
}

fn main() {
	atelier::set_logger(log);

	if let Err(err) = cli::handle_cli() {
		eprintln!("{err}");
		std::process::exit(1);
	}
}
