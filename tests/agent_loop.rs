mod common;

use std::sync::Arc;

use common::{search_call, time_call, toolkit, RecordingSearch, ScriptedModel};
use sayr_scout::{
    Message, ModelCompletion, Role, SearchAgent, StubModel, ToolChoice, EMPTY_ANSWER,
};

#[tokio::test]
async fn simple_question_is_answered_without_tools() {
    let search = Arc::new(RecordingSearch::default());
    let model = StubModel::new(vec![r#"{"action":"respond","content":"2 + 2 = 4"}"#.into()]);
    let mut agent = SearchAgent::new(model).with_tools(toolkit(search.clone()));

    let reply = agent.chat("What is 2+2?").await;

    assert_eq!(reply.response, "2 + 2 = 4");
    assert_eq!(reply.memory_length, 2);
    assert_eq!(reply.timestamp.len(), "2024-05-01 14:30:00".len());
    assert_eq!(search.count(), 0);
}

#[tokio::test]
async fn never_runs_more_than_two_searches() {
    let search = Arc::new(RecordingSearch::default());
    let model = ScriptedModel::new(|i, _, _| {
        ModelCompletion::calls(vec![search_call(&format!("attempt {i}"))])
    });
    let mut agent = SearchAgent::new(model.clone()).with_tools(toolkit(search.clone()));

    let answer = agent.try_query("keep digging", 5).await.unwrap();

    assert_eq!(search.count(), 2);
    assert_eq!(answer.searches, 2);
    assert_eq!(answer.iterations, 5);
    assert_eq!(model.call_count(), 6);
    assert_eq!(
        model.choices(),
        vec![
            ToolChoice::Auto,
            ToolChoice::Auto,
            ToolChoice::None,
            ToolChoice::None,
            ToolChoice::None,
            ToolChoice::None,
        ]
    );
    assert_eq!(answer.text, EMPTY_ANSWER);
    assert_eq!(agent.memory().len(), 2);
}

#[tokio::test]
async fn surplus_searches_in_one_response_are_dropped() {
    let search = Arc::new(RecordingSearch::default());
    let model = ScriptedModel::new(|i, _, _| match i {
        0 => ModelCompletion::calls(vec![
            search_call("a"),
            search_call("b"),
            search_call("c"),
        ]),
        _ => ModelCompletion::text("done"),
    });
    let mut agent = SearchAgent::new(model).with_tools(toolkit(search.clone()));

    let answer = agent.try_query("three at once", 5).await.unwrap();

    assert_eq!(*search.queries.lock().unwrap(), vec!["a", "b"]);
    let request = &answer.turn[1];
    assert_eq!(request.tool_calls().len(), 2);
    let results: Vec<&Message> = answer
        .turn
        .iter()
        .filter(|m| m.role() == Role::Tool)
        .collect();
    assert_eq!(results.len(), 2);
    for (call, result) in request.tool_calls().iter().zip(results) {
        assert_eq!(result.tool_call_id(), Some(call.id.as_str()));
    }
}

#[tokio::test]
async fn iteration_guard_forces_a_direct_answer() {
    let search = Arc::new(RecordingSearch::default());
    let model = ScriptedModel::new(|_, _, choice| match choice {
        ToolChoice::Auto => ModelCompletion::calls(vec![search_call("more")]),
        ToolChoice::None => ModelCompletion::text("best effort answer"),
    });
    let mut agent = SearchAgent::new(model.clone())
        .with_tools(toolkit(search.clone()))
        .with_search_budget(10);

    let answer = agent.try_query("loop forever", 1).await.unwrap();

    assert_eq!(answer.text, "best effort answer");
    assert_eq!(search.count(), 1);
    assert_eq!(model.choices(), vec![ToolChoice::Auto, ToolChoice::None]);
}

#[tokio::test]
async fn failing_search_still_yields_an_answer() {
    let search = RecordingSearch::failing();
    let model = ScriptedModel::new(|i, _, _| match i {
        0 => ModelCompletion::calls(vec![search_call("gold price")]),
        _ => ModelCompletion::text("I could not reach the search service."),
    });
    let mut agent = SearchAgent::new(model).with_tools(toolkit(search.clone()));

    let answer = agent.try_query("gold price today?", 5).await.unwrap();

    assert!(answer.degraded);
    assert_eq!(search.count(), 1);
    let result = answer
        .turn
        .iter()
        .find(|m| m.role() == Role::Tool)
        .unwrap();
    assert!(result.content().starts_with("Search results: Search error:"));
    assert!(!answer.text.is_empty());
}

#[tokio::test]
async fn clock_result_precedes_dated_search() {
    let search = Arc::new(RecordingSearch::default());
    let model = ScriptedModel::new(|i, window, _| match i {
        0 => ModelCompletion::calls(vec![time_call("Asia/Shanghai")]),
        1 => {
            let clock = window.last().unwrap().content();
            let date = clock
                .lines()
                .find_map(|line| line.strip_prefix("Date: "))
                .unwrap();
            ModelCompletion::calls(vec![search_call(&format!("news {date}"))])
        }
        _ => ModelCompletion::text("Here is today's news."),
    });
    let mut agent = SearchAgent::new(model).with_tools(toolkit(search.clone()));
    let before = agent.memory().len();

    let answer = agent.try_query("What's the news today?", 5).await.unwrap();

    assert_eq!(*search.queries.lock().unwrap(), vec!["news 2024-05-01"]);
    let tool_results: Vec<&str> = answer
        .turn
        .iter()
        .filter(|m| m.role() == Role::Tool)
        .map(Message::content)
        .collect();
    assert!(tool_results[0].contains("Time: 14:30:00"));
    assert!(tool_results[1].starts_with("Search results: 1. Result for news 2024-05-01"));
    assert_eq!(answer.searches, 1);
    assert_eq!(agent.memory().len(), before + 2);
}

#[tokio::test]
async fn clock_runs_even_when_search_budget_is_spent() {
    let search = Arc::new(RecordingSearch::default());
    let model = ScriptedModel::new(|i, _, _| match i {
        0 => ModelCompletion::calls(vec![time_call("Europe/London")]),
        _ => ModelCompletion::text("It is morning in London."),
    });
    let mut agent = SearchAgent::new(model.clone())
        .with_tools(toolkit(search))
        .with_search_budget(0);

    let answer = agent.try_query("time in London?", 5).await.unwrap();

    assert_eq!(model.choices()[0], ToolChoice::None);
    assert!(answer.turn[2].content().contains("Timezone: Europe/London"));
    assert_eq!(answer.text, "It is morning in London.");
}

#[tokio::test]
async fn textual_search_request_is_recovered() {
    let search = Arc::new(RecordingSearch::default());
    let model = ScriptedModel::new(|i, _, _| match i {
        0 => ModelCompletion::text(
            r#"<tool_call>{"name": "search_web", "arguments": {"query": "rust 2024 edition"}}</tool_call>"#,
        ),
        _ => ModelCompletion::text("The 2024 edition shipped with Rust 1.85."),
    });
    let mut agent = SearchAgent::new(model).with_tools(toolkit(search.clone()));

    let answer = agent.try_query("when did the 2024 edition ship?", 5).await.unwrap();

    assert_eq!(*search.queries.lock().unwrap(), vec!["rust 2024 edition"]);
    assert_eq!(answer.searches, 1);
    assert!(answer.turn[1].content().starts_with("<tool_call>"));
    assert_eq!(answer.text, "The 2024 edition shipped with Rust 1.85.");
}

#[tokio::test]
async fn textual_search_request_is_final_once_budget_is_spent() {
    let search = Arc::new(RecordingSearch::default());
    let raw = "<tool_call>search_web(query=\"again\")</tool_call>";
    let model = ScriptedModel::new(move |_, _, _| ModelCompletion::text(raw));
    let mut agent = SearchAgent::new(model)
        .with_tools(toolkit(search.clone()))
        .with_search_budget(1);

    let answer = agent.try_query("q", 5).await.unwrap();

    assert_eq!(search.count(), 1);
    assert_eq!(answer.text, raw);
}

#[tokio::test]
async fn model_error_surfaces_from_try_query() {
    let model = StubModel::new(Vec::new());
    let mut agent = SearchAgent::new(model);

    assert!(agent.try_query("anyone there?", 5).await.is_err());
    assert_eq!(agent.memory().len(), 1);
}
