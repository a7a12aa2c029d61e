//! Extracts a human-readable message from a caught effect-body panic.
//!
//! Mirrors the teacher's `format_panic_sample`/`truncate_utf8` helpers used
//! when classifying `tokio::task::JoinError`s in its work scheduler.

use std::any::Any;

/// Recovers a single-line, length-bounded message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
	let raw = if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"<non-string panic payload>".to_string()
	};
	truncate_utf8(raw.lines().next().unwrap_or(""), 200)
}

fn truncate_utf8(s: &str, max_bytes: usize) -> String {
	if s.len() <= max_bytes {
		return s.to_string();
	}
	let mut idx = max_bytes;
	while idx > 0 && !s.is_char_boundary(idx) {
		idx -= 1;
	}
	format!("{}…", &s[..idx])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_str_payload() {
		let payload: Box<dyn Any + Send> = Box::new("boom");
		assert_eq!(panic_message(payload), "boom");
	}

	#[test]
	fn extracts_string_payload_first_line_only() {
		let payload: Box<dyn Any + Send> = Box::new("boom\nwith trailing detail".to_string());
		assert_eq!(panic_message(payload), "boom");
	}

	#[test]
	fn falls_back_for_unknown_payload() {
		let payload: Box<dyn Any + Send> = Box::new(42_u32);
		assert_eq!(panic_message(payload), "<non-string panic payload>");
	}
}
