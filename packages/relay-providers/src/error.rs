pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	/// Maps an adapter failure onto the search engine's error, classifying transient failures.
	pub fn into_search(self, source_name: &str) -> relay_search::Error {
		match self {
			Self::Reqwest(err) => {
				let status = err.status().map(|status| status.as_u16());
				let transient = err.is_timeout()
					|| err.is_connect()
					|| err.is_request()
					|| status.is_some_and(relay_search::is_transient_status);

				relay_search::Error::Upstream {
					source_name: source_name.to_string(),
					status,
					transient,
					message: err.to_string(),
				}
			},
			Self::InvalidResponse { message } =>
				relay_search::Error::InvalidResponse { source_name: source_name.to_string(), message },
			Self::InvalidConfig { message } => relay_search::Error::Config { message },
			other => relay_search::Error::Upstream {
				source_name: source_name.to_string(),
				status: None,
				transient: false,
				message: other.to_string(),
			},
		}
	}
}
