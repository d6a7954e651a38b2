use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

pub fn normalize(text: &str) -> String {
	text.trim().to_lowercase()
}

/// Splits normalized text on runs of whitespace, `.`, `_`, and `-`.
pub fn tokenize(text: &str) -> Vec<String> {
	normalize(text)
		.split(|ch: char| ch.is_whitespace() || matches!(ch, '.' | '_' | '-'))
		.filter(|token| !token.is_empty())
		.map(str::to_string)
		.collect()
}

/// Trims a raw query and collapses internal whitespace runs to single spaces. Case is kept.
pub fn collapse_query(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sort key approximating locale-aware ordering: accents fold onto their base letter.
pub fn collation_key(text: &str) -> String {
	normalize(text).nfkd().filter(|ch| !is_combining_mark(*ch)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalize_trims_and_lowercases() {
		assert_eq!(normalize("  Acme CORP \n"), "acme corp");
		assert_eq!(normalize(""), "");
		assert_eq!(normalize("   "), "");
	}

	#[test]
	fn normalize_is_idempotent() {
		for raw in ["  MiXeD Case ", "Ünïcödé  Name", "already normal", "\tTabbed\t", ""] {
			let once = normalize(raw);

			assert_eq!(normalize(&once), once);
		}
	}

	#[test]
	fn tokenize_splits_on_whitespace_and_punctuation() {
		assert_eq!(
			tokenize("Acme-Corp_West.coast  Office"),
			vec!["acme", "corp", "west", "coast", "office"]
		);
		assert_eq!(tokenize(" --__.. "), Vec::<String>::new());
	}

	#[test]
	fn tokenize_is_restartable() {
		let raw = "jane.doe@example.com Main-Street";

		assert_eq!(tokenize(raw), tokenize(raw));
		assert_eq!(tokenize(raw), vec!["jane", "doe@example", "com", "main", "street"]);
	}

	#[test]
	fn collapse_query_keeps_case() {
		assert_eq!(collapse_query("  Acme \t  Corp\n"), "Acme Corp");
		assert_eq!(collapse_query("   "), "");
	}

	#[test]
	fn collation_key_folds_accents() {
		assert_eq!(collation_key("Éclair"), "eclair");
		assert!(collation_key("émile") < collation_key("frank"));
	}
}
