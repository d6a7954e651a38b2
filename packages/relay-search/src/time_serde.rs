pub mod option {
	use serde::Serializer;
	use time::{OffsetDateTime, format_description::well_known::Rfc3339};

	pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(value) => {
				let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

				serializer.serialize_some(&formatted)
			},
			None => serializer.serialize_none(),
		}
	}
}
