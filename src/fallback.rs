//! Recovery of search requests that a backend wrote into plain text.
//!
//! Some backends answer with `<tool_call>search_web ...` markup instead of
//! structured tool calls. The agent consults a [`TextToolCallParser`] only
//! when a completion carries no structured calls, so dropping the parser
//! leaves the rest of the loop untouched.

use std::sync::OnceLock;

use regex::Regex;

pub const TOOL_CALL_MARKER: &str = "<tool_call>";

pub trait TextToolCallParser: Send + Sync {
    /// Extract the search query, if `content` holds a textual search call.
    fn parse_search_query(&self, content: &str) -> Option<String>;
}

/// Recognises the three markup shapes seen in the wild, tried in order:
///
/// 1. `<tool_call>search_web<arg_key>query</arg_key><arg_value>…</arg_value>`
/// 2. `<tool_call>search_web(query="…")` (also `:` and single quotes)
/// 3. `<tool_call>{"name": "search_web", "arguments": {"query": "…"}}`
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupToolCallParser;

fn patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?s)<tool_call>search_web.*?<arg_value>(.*?)</arg_value>"),
            Regex::new(r#"(?s)<tool_call>\s*search_web\s*\(.*?query\s*[=:]\s*["']([^"']+)["']"#),
            Regex::new(r#"(?s)<tool_call>.*?"query"\s*:\s*"([^"]+)""#),
        ]
        .map(|pattern| pattern.expect("static regex"))
    })
}

impl TextToolCallParser for MarkupToolCallParser {
    fn parse_search_query(&self, content: &str) -> Option<String> {
        if !content.contains(TOOL_CALL_MARKER) {
            return None;
        }

        patterns()
            .iter()
            .find_map(|pattern| pattern.captures(content))
            .and_then(|captures| captures.get(1))
            .map(|query| query.as_str().trim().to_string())
            .filter(|query| !query.is_empty())
    }
}

/// Shorthand for [`MarkupToolCallParser`].
pub fn parse_text_tool_call(content: &str) -> Option<String> {
    MarkupToolCallParser.parse_search_query(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Option<String> {
        parse_text_tool_call(content)
    }

    #[test]
    fn ignores_text_without_marker() {
        assert_eq!(parse("search_web(query=\"rust\")"), None);
        assert_eq!(parse("The answer is 4."), None);
    }

    #[test]
    fn reads_value_tagged_markup() {
        let content = "<tool_call>search_web\n<arg_key>query</arg_key>\n<arg_value> rust 1.80 release </arg_value>\n</tool_call>";
        assert_eq!(parse(content).as_deref(), Some("rust 1.80 release"));
    }

    #[test]
    fn reads_call_syntax() {
        assert_eq!(
            parse("<tool_call> search_web(query = 'weather in Paris')</tool_call>").as_deref(),
            Some("weather in Paris")
        );
        assert_eq!(
            parse("<tool_call>search_web(max=3, query: \"gold price\")").as_deref(),
            Some("gold price")
        );
    }

    #[test]
    fn reads_json_fragment() {
        let content = r#"<tool_call>{"name": "search_web", "arguments": {"query": "nvidia earnings"}}</tool_call>"#;
        assert_eq!(parse(content).as_deref(), Some("nvidia earnings"));
    }

    #[test]
    fn first_matching_pattern_wins() {
        let content = r#"<tool_call>search_web<arg_value>first</arg_value> {"query": "second"}"#;
        assert_eq!(parse(content).as_deref(), Some("first"));
    }

    #[test]
    fn unparseable_markup_yields_nothing() {
        assert_eq!(parse("<tool_call>lookup_stock</tool_call>"), None);
        assert_eq!(parse("<tool_call>search_web<arg_value>  </arg_value>"), None);
    }
}
