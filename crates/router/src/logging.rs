use tracing_subscriber::EnvFilter;

use crate::config::RouterConfig;

/// Installs a stderr fmt subscriber for the Herald crates.
///
/// `RUST_LOG` wins when set. Otherwise `debug = true` enables debug-level
/// output for the herald crates. Returns `false` if a global subscriber was
/// already installed.
pub fn init_tracing(config: &RouterConfig) -> bool {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(config.debug)));

	let installed = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok();
	if installed {
		tracing::debug!(debug = config.debug, "tracing initialized");
	}
	installed
}

fn default_directives(debug: bool) -> &'static str {
	if debug {
		"herald_router=debug,herald_worker=debug,herald_invocation=debug,info"
	} else {
		"herald_router=info,herald_worker=info,herald_invocation=info,warn"
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn debug_switch_raises_herald_levels() {
		assert!(default_directives(true).contains("herald_router=debug"));
		assert!(default_directives(false).contains("herald_router=info"));
	}
}
