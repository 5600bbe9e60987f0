/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Job bodies that touch shared session state on the authority.
	Interactive,
	/// Timers and cleanup that run detached from any job (deferred expiry, drain loops).
	Background,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
		}
	}
}
