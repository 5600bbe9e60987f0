use tokio::task::JoinError;

/// Extracts the panic payload message from a failed join.
///
/// Returns `None` when the task was cancelled rather than panicking.
pub fn join_error_panic_message(err: JoinError) -> Option<String> {
	if !err.is_panic() {
		return None;
	}
	let payload = err.into_panic();
	let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"task panicked with a non-string payload".to_string()
	};
	Some(msg)
}

#[cfg(test)]
#[path = "panic_tests.rs"]
mod tests;
