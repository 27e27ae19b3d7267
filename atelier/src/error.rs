#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0:?}")] Io(#[from] std::io::Error),
	#[error("{0}")] Pigment(#[from] pigment::Error),
	#[error("{0}")] Json(#[from] serde_json::Error),
	#[error("{0}")] Format(#[from] pigment::FormatError),
	#[error("invalid base64 ({0})")] Base64(#[from] base64::DecodeError),
	#[error("{0}")] Size(#[from] pigment::SizeError),

	/// A file the session depends on could not be loaded, the feature using it stays disabled
	#[error("{what} {path:?} could not be loaded ({reason})")]
	MissingResource {
		what: &'static str,
		path: String,
		reason: String,
	},

	#[error("{0:?} is not a supported file type")]
	Unsupported(String),

	#[error("{0}")]
	Edit(String),
}

impl Error {
	pub fn missing(what: &'static str, path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
		Error::MissingResource {
			what,
			path: path.into(),
			reason: reason.to_string(),
		}
	}

	pub fn edit(msg: impl Into<String>) -> Self {
		Error::Edit(msg.into())
	}
}
