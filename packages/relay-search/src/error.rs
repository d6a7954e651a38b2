pub type Result<T, E = Error> = std::result::Result<T, E>;

/// HTTP statuses worth another attempt within an interactive request.
const TRANSIENT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Upstream error from {source_name}: {message}")]
	Upstream { source_name: String, status: Option<u16>, transient: bool, message: String },
	#[error("Invalid response from {source_name}: {message}")]
	InvalidResponse { source_name: String, message: String },
	#[error("Source {source_id} is not registered.")]
	UnknownSource { source_id: String },
	#[error("Configuration error: {message}")]
	Config { message: String },
}
impl Error {
	pub fn upstream_status(source_name: &str, status: u16, message: impl Into<String>) -> Self {
		Self::Upstream {
			source_name: source_name.to_string(),
			status: Some(status),
			transient: is_transient_status(status),
			message: message.into(),
		}
	}

	/// Timeouts, resets, and 408/429/5xx gateway statuses are transient.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Upstream { transient: true, .. })
	}

	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Upstream { status, .. } => *status,
			_ => None,
		}
	}
}

pub fn is_transient_status(status: u16) -> bool {
	TRANSIENT_STATUSES.contains(&status)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_statuses() {
		assert!(Error::upstream_status("crm", 503, "unavailable").is_transient());
		assert!(Error::upstream_status("crm", 429, "slow down").is_transient());
		assert!(!Error::upstream_status("crm", 404, "missing").is_transient());
		assert!(!Error::Config { message: "x".to_string() }.is_transient());
		assert_eq!(Error::upstream_status("crm", 404, "missing").status(), Some(404));
	}
}
