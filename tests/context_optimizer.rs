//! Context optimizer behavior on realistic conversations.

use std::time::Duration;

use parley::context::{ContextOptimizer, ConversationTurn, OptimizerConfig};
use parley::llm::FallbackChain;
use parley::{ChatService, Config, PollPolicy, Submission};

fn turn(position: u64, user: &str, assistant: &str) -> ConversationTurn {
    ConversationTurn::new(position, format!("{user:<50}"), format!("{assistant:<50}"))
}

fn optimizer(size_budget: usize, summary_max: usize) -> ContextOptimizer {
    ContextOptimizer::new(OptimizerConfig {
        size_budget,
        summary_max,
        ..OptimizerConfig::default()
    })
}

#[test]
fn long_conversation_lands_in_compression_band() {
    let history: Vec<ConversationTurn> = (0..40)
        .map(|i| turn(i, &format!("question number {i}"), &format!("answer number {i}")))
        .collect();

    let ctx = optimizer(1200, 300).optimize(&history, "and then?");

    assert!(ctx.optimization_applied());
    assert!(
        ctx.metrics.within_band(0.2, 0.4),
        "ratio {}",
        ctx.metrics.compression_ratio()
    );
    let summary = ctx.summary.as_deref().expect("dropped turns are summarized");
    assert!(summary.starts_with("Earlier conversation:"));
    assert!(ctx.contains_position(39));
}

#[test]
fn profile_survives_when_its_turn_is_dropped() {
    let mut history = vec![turn(0, "My name is Carol and I love hiking", "Hi Carol!")];
    history.extend((1..40).map(|i| turn(i, &format!("filler chat {i}"), "ok")));

    let ctx = optimizer(1000, 250).optimize(&history, "anything new?");

    assert_eq!(ctx.profile.name.as_deref(), Some("Carol"));
    assert!(ctx.profile.preferences.contains("hiking"));
    assert!(ctx.metrics.dropped_count() > 0);
}

#[test]
fn current_input_is_never_counted_as_history() {
    let history = vec![turn(0, "first", "reply")];
    let ctx = ContextOptimizer::default().optimize(&history, "My name is Dana");

    assert_eq!(ctx.metrics.original_count, 1);
    assert_eq!(ctx.turns.len(), 1);
    assert_eq!(ctx.profile.name.as_deref(), Some("Dana"));
}

#[tokio::test]
async fn service_preview_respects_the_configured_budget() {
    let mut config = Config::default();
    config.context.size_budget = 1200;
    config.context.summary_max = 300;
    let service = ChatService::with_chain(&config, FallbackChain::default());
    let poll = PollPolicy {
        interval: Duration::from_millis(2),
        max_attempts: 1000,
    };

    let id = service.submit(Submission::message("My name is Erin")).unwrap();
    service.wait_for(id, &poll).await.unwrap();
    for i in 0..15 {
        let id = service
            .submit(Submission::message(format!("Tell me fact number {i} about oceans")))
            .unwrap();
        service.wait_for(id, &poll).await.unwrap();
    }

    let input = "What do you remember?";
    let ctx = service.preview(input);

    assert_eq!(ctx.metrics.original_count, 16);
    assert!(ctx.optimization_applied());
    assert!(ctx.metrics.estimated_optimized_size + input.chars().count() <= 1200);
    assert_eq!(ctx.profile.name.as_deref(), Some("Erin"));

    // Preview creates no job.
    assert_eq!(service.history().len(), 16);
}
