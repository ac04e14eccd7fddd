//! Splits messages that exceed a platform's length limit into numbered parts.
//!
//! Lengths are counted in characters. Every part of a split message is
//! prefixed with `(Part i/N)\n`, the prefix is not counted against the chunk.

/// characters kept free in every chunk for the part prefix
pub const PART_PREFIX_RESERVE: usize = 16;

/// byte offset of the `n`th character of `text`, or its length
fn char_offset(text: &str, n: usize) -> usize {
	text.char_indices().nth(n).map(|(offset, _)| offset).unwrap_or(text.len())
}

/// Cuts `text` into chunks of at most `chunk_len` characters.
///
/// A chunk ends right after the last newline in its window when that newline
/// lies past the middle of the window, otherwise at the window edge.
fn chunks(text: &str, chunk_len: usize) -> Vec<&str> {
	let chunk_len = chunk_len.max(1);
	let mut chunks = Vec::new();
	let mut rest = text;

	while !rest.is_empty() {
		let window_end = char_offset(rest, chunk_len);
		if window_end == rest.len() {
			chunks.push(rest);
			break;
		}

		let window = &rest[..window_end];
		let cut = match window.rfind('\n') {
			Some(newline) if window[..newline].chars().count() > chunk_len / 2 => newline + 1,
			_ => window_end,
		};

		chunks.push(&rest[..cut]);
		rest = &rest[cut..];
	}

	chunks
}

/// Splits `text` into parts that fit into `max_len` characters.
///
/// Messages that already fit are returned as a single unprefixed part.
///
/// # Arguments
///
/// * `text` - the rendered message
///
/// * `max_len` - the platform's maximum message length in characters
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
	if text.chars().count() <= max_len {
		return vec![text.to_string()];
	}

	let chunks = chunks(text, max_len.saturating_sub(PART_PREFIX_RESERVE));
	let total = chunks.len();

	chunks
		.into_iter()
		.enumerate()
		.map(|(index, chunk)| format!("(Part {}/{total})\n{chunk}", index + 1))
		.collect()
}

/// Removes the prefix added by [split_message].
pub fn strip_part_prefix(part: &str) -> &str {
	part.strip_prefix("(Part ")
		.and_then(|rest| rest.split_once(")\n"))
		.map(|(_, chunk)| chunk)
		.unwrap_or(part)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn reconstruct(parts: &[String]) -> String {
		parts.iter().map(|part| strip_part_prefix(part)).collect()
	}

	#[test]
	fn short_messages_are_untouched() {
		assert_eq!(split_message("hello", 2000), vec![String::from("hello")]);
		assert_eq!(split_message("", 2000), vec![String::new()]);
	}

	#[test]
	fn splits_after_newline_past_midpoint() {
		// 100 character limit leaves 84 per chunk
		let line = "x".repeat(59);
		let text = format!("{line}\n{line}\n{line}\n");

		let parts = split_message(&text, 100);

		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], format!("(Part 1/3)\n{line}\n"));
		assert_eq!(parts[2], format!("(Part 3/3)\n{line}\n"));
		assert_eq!(reconstruct(&parts), text);
	}

	#[test]
	fn splits_mid_line_when_newline_is_too_early() {
		let text = format!("short\n{}", "y".repeat(200));

		let parts = split_message(&text, 100);

		assert_eq!(strip_part_prefix(&parts[0]).chars().count(), 84);
		assert_eq!(reconstruct(&parts), text);
	}

	#[test]
	fn counts_characters_not_bytes() {
		let text = "告警".repeat(1500);

		let parts = split_message(&text, 2000);

		assert_eq!(parts.len(), 2);
		assert!(parts.iter().all(|part| part.chars().count() <= 2000));
		assert_eq!(reconstruct(&parts), text);
	}

	#[test]
	fn every_part_fits() {
		let text = (0..500).map(|i| format!("alert {i} is firing on node-{i}\n")).collect::<String>();

		for max_len in [100, 2000, 4096] {
			let parts = split_message(&text, max_len);

			assert!(parts.iter().all(|part| part.chars().count() <= max_len));
			assert_eq!(reconstruct(&parts), text);
		}
	}
}
