/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Quit,
    Clear,
    Memory,
    Help,
    Unknown(String),
    Question(String),
}

pub fn parse(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Question(line.to_string());
    }

    match line.to_lowercase().as_str() {
        "/quit" | "/exit" | "/q" => Input::Quit,
        "/clear" => Input::Clear,
        "/memory" => Input::Memory,
        "/help" | "/h" => Input::Help,
        _ => Input::Unknown(line.to_string()),
    }
}

pub const WELCOME: &str = "\
============================================================
Search-Augmented Agent
============================================================
Commands:
  <question>  - Ask a question
  /clear      - Clear conversation history
  /memory     - View conversation history
  /help       - Show help
  /quit       - Exit program
============================================================";

pub const HELP: &str = "\
Help:
  An assistant with web search. It searches automatically when a question
  needs recent information and answers simple questions directly.

  Example questions:
    - What's the weather in Paris today?
    - Where are the next Olympics held?
    - What are the new features in the latest Rust release?
    - What time is it in New York?";
