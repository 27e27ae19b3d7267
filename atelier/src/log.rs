#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogType {
	Log = 0,
	Error = 1,
	Fatal = 255,
}

impl LogType {
	pub fn label(self) -> &'static str {
		match self {
			LogType::Log => "LOG",
			LogType::Error => "ERROR",
			LogType::Fatal => "FATAL",
		}
	}
}

pub(crate) fn line(typ: LogType, msg: &str) -> String {
	format!("[{}] {msg}", typ.label())
}

fn stdout_sink(typ: LogType, msg: &str) {
	println!("{}", line(typ, msg));
}

pub(crate) static mut LOG: fn(LogType, &str) = stdout_sink;

/// Replaces the sink every `log!` goes through, hosts install theirs before opening sessions
pub fn set_logger(logger: fn(LogType, &str)) {
	unsafe{LOG = logger};
}

#[macro_export]
macro_rules! log {
	(ftl, $($e:tt)*) => {{
		let s = format!($($e)*);
		unsafe{$crate::log::LOG($crate::log::LogType::Fatal, &s)};
	}};

	(log, $($e:tt)*) => {{
		let s = format!($($e)*);
		unsafe{$crate::log::LOG($crate::log::LogType::Log, &s)};
	}};

	(err, $($e:tt)*) => {{
		let s = format!($($e)*);
		unsafe{$crate::log::LOG($crate::log::LogType::Error, &s)};
	}};

	($($e:tt)*) => {{
		let s = format!($($e)*);
		unsafe{$crate::log::LOG($crate::log::LogType::Log, &s)};
	}};
}
