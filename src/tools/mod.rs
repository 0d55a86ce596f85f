//! Tool executors the agent can hand to the model.
//!
//! - Search: web search behind a pluggable [`SearchProvider`] (DuckDuckGo or Tavily)
//! - Clock: current date and time in an IANA timezone

pub mod clock;
pub mod duckduckgo;
pub mod search;
pub mod tavily;

pub use clock::{Clock, ClockTool, FixedClock, SystemClock, TIME_ERROR_MARKER, TIME_TOOL_NAME};
pub use duckduckgo::{DuckDuckGoConfig, DuckDuckGoProvider};
pub use search::{
    provider_from_config, render_results, SearchProvider, SearchResult, SearchTool,
    SEARCH_ERROR_MARKER, SEARCH_TOOL_NAME,
};
pub use tavily::TavilyProvider;

use crate::tool::ToolRegistry;

/// Prefix of the payload returned when a requested tool does not exist or fails outright.
pub const TOOL_ERROR_MARKER: &str = "Tool error:";

/// Registry holding the search and clock tools.
pub fn scout_toolkit(search: SearchTool, clock: ClockTool) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(search);
    registry.register(clock);
    registry
}

/// Whether a tool payload reports a failure rather than a real observation.
pub fn is_failure_payload(payload: &str) -> bool {
    let trimmed = payload.trim_start();
    [SEARCH_ERROR_MARKER, TIME_ERROR_MARKER, TOOL_ERROR_MARKER]
        .iter()
        .any(|marker| trimmed.starts_with(marker))
}
