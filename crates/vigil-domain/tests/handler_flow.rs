//! End-to-end handler scenarios against scripted collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use vigil_domain::{AnswerOutcome, FALLBACK_RESPONSE, HealthState, RequestHandler, Services};
use vigil_llm::MockGenerator;
use vigil_memory::RecordingMemory;
use vigil_retrieval::{ContextItem, StaticRetriever};

fn corpus() -> Arc<StaticRetriever> {
    Arc::new(StaticRetriever::new(vec![
        ContextItem::new("Phenylketonuria is an inherited disorder of phenylalanine metabolism."),
        ContextItem::new("Treatment is a lifelong low-phenylalanine diet."),
    ]))
}

/// Generator whose groundedness scores follow `scores`, then stay at the last one.
fn groundedness_sequence(scores: &'static [&'static str]) -> Arc<MockGenerator> {
    let calls = AtomicUsize::new(0);
    Arc::new(MockGenerator::scripted(move |req| {
        Ok(match req.purpose.as_str() {
            "score_groundedness" => {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                scores[n.min(scores.len() - 1)].to_string()
            }
            "check_precision" => "0.9".to_string(),
            "refine_response" => "- mention the diet".to_string(),
            "expand_query" => "phenylketonuria treatment diet".to_string(),
            _ => "PKU is managed with a low-phenylalanine diet.".to_string(),
        })
    }))
}

#[tokio::test]
async fn answer_improves_after_refinement() {
    let generator = groundedness_sequence(&["0.4", "0.5", "0.8"]);
    let handler = RequestHandler::new(Services::new(generator.clone(), corpus()));

    let answer = handler.handle_detailed("alice", "How is PKU treated?").await;

    assert_eq!(answer.outcome, AnswerOutcome::Pass);
    let scores = answer.scores.expect("controller ran");
    assert_eq!(scores.groundedness_loops, 3);
    assert_eq!(scores.precision_loops, 1);
    assert_eq!(generator.count_for("refine_response"), 2);
    assert_eq!(generator.count_for("craft_response"), 3);
}

#[tokio::test]
async fn ungrounded_answer_falls_back() {
    let generator = groundedness_sequence(&["0.3"]);
    let handler = RequestHandler::new(Services::new(generator.clone(), corpus()));

    let reply = handler.handle("alice", "How is PKU treated?").await;

    assert_eq!(reply, FALLBACK_RESPONSE);
    assert_eq!(generator.count_for("check_precision"), 0);
    assert_eq!(generator.count_for("score_groundedness"), 3);
}

#[tokio::test]
async fn memory_feeds_later_requests() {
    let generator = groundedness_sequence(&["0.9"]);
    let memory = Arc::new(RecordingMemory::new());
    let handler = RequestHandler::new(
        Services::new(generator.clone(), corpus()).with_memory(memory.clone()),
    );

    handler.handle("alice", "How is PKU treated?").await;
    handler.handle("bob", "What is PKU?").await;
    handler.handle("alice", "Can adults stop the diet?").await;

    assert_eq!(memory.stored().len(), 3);
    let last_craft = generator
        .requests()
        .into_iter()
        .rev()
        .find(|r| r.purpose == "craft_response")
        .expect("craft request");
    let prompt = last_craft.rendered_user();
    assert!(prompt.contains("How is PKU treated?"));
    assert!(!prompt.contains("What is PKU?"));
}

#[tokio::test]
async fn mixed_traffic_health() {
    let handler = RequestHandler::new(Services::new(groundedness_sequence(&["0.9"]), corpus()));

    for i in 0..5 {
        handler.handle(&format!("user-{i}"), "How is PKU treated?").await;
    }
    handler.handle("user-0", "").await;

    let health = handler.health_status();
    assert_eq!(health.total_requests, 6);
    assert_eq!(health.status, HealthState::Healthy);
    assert!(health.avg_latency_ms >= 0.0);

    let summary = handler.metrics_summary();
    assert_eq!(summary.counters["validation_failures"], 1);
    assert_eq!(summary.counters["cache_misses"], 5);
}
