use ahash::AHashSet;

use crate::{
	record::Record,
	scoring::{self, SearchConfig},
	text,
};

struct Ranked {
	score: f64,
	collation: String,
	plain: String,
	record: Record,
}

/// Dedupes by identity (first occurrence wins, `primary` before `secondary`), scores, sorts, and
/// truncates to `limit`.
///
/// Zero-score records are kept; callers decide what enters the candidate lists.
pub fn merge_rank(
	primary: Vec<Record>,
	secondary: Vec<Record>,
	query: &str,
	config: &SearchConfig,
	limit: usize,
) -> Vec<Record> {
	let mut seen = AHashSet::new();
	let mut ranked: Vec<Ranked> = primary
		.into_iter()
		.chain(secondary)
		.filter(|record| !record.id.is_empty() && seen.insert(record.id.clone()))
		.map(|record| {
			let display = record.field_text(&config.display_field);

			Ranked {
				score: scoring::score(&record, query, config),
				collation: text::collation_key(&display),
				plain: text::normalize(&display),
				record,
			}
		})
		.collect();

	ranked.sort_by(|a, b| {
		b.score
			.total_cmp(&a.score)
			.then_with(|| a.collation.cmp(&b.collation))
			.then_with(|| a.plain.cmp(&b.plain))
	});
	ranked.truncate(limit);

	ranked.into_iter().map(|entry| entry.record).collect()
}
