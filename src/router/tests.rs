use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::*;
use crate::cache::CacheConfig;
use crate::cache::testing::InstrumentedStore;
use crate::evaluation::{Difficulty, EvaluationRequest, EvaluationResult, Status, Tier};
use crate::external::{DisabledProvider, ExternalError, MockProvider, MockStep, RetryConfig};
use crate::metrics::Metrics;

fn request(text: &str) -> EvaluationRequest {
    EvaluationRequest::new(text, "Say hello in Spanish", Difficulty::Beginner, "es")
}

fn orchestrator(provider: MockProvider) -> (Arc<MockProvider>, Orchestrator<MockProvider>) {
    orchestrator_with(provider, OrchestratorConfig::default())
}

fn orchestrator_with(
    provider: MockProvider,
    config: OrchestratorConfig,
) -> (Arc<MockProvider>, Orchestrator<MockProvider>) {
    let provider = Arc::new(provider);
    (Arc::clone(&provider), Orchestrator::new(config, provider))
}

#[tokio::test(start_paused = true)]
async fn test_cold_then_warm_identical_request() {
    let (provider, orchestrator) = orchestrator(MockProvider::always(MockStep::ok(84)));
    let req = request("hola");

    let first = orchestrator.evaluate(&req).await;
    assert!(!first.cached);
    assert_eq!(first.tier, Tier::External);
    assert_eq!(first.score, 84);

    let second = orchestrator.evaluate(&req).await;
    assert!(second.cached);
    assert_eq!(second.tier, Tier::ExactHit);
    assert_eq!(second.score, first.score);
    assert_eq!(second.status, first.status);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_near_duplicates_share_one_computation() {
    let (provider, orchestrator) = orchestrator(MockProvider::always(MockStep::ok(90)));

    let results = [
        orchestrator.evaluate(&request("Hola")).await,
        orchestrator.evaluate(&request("hola")).await,
        orchestrator.evaluate(&request("HOLA  ")).await,
    ];

    assert_eq!(provider.calls(), 1);
    assert!(!results[0].cached);
    assert!(results[1].cached && results[2].cached);
    assert!(results.iter().all(|r| r.score == 90));
    assert_eq!(orchestrator.exact_cache().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_similar_request_is_served_from_tier2_then_tier1() {
    let (provider, orchestrator) = orchestrator(MockProvider::always(MockStep::ok(88)));

    orchestrator.evaluate(&request("quisiera un cafe por favor")).await;

    let near = request("quisiera un cafe por favorr");
    let similar = orchestrator.evaluate(&near).await;
    assert_eq!(similar.tier, Tier::SimilarHit);
    assert!(similar.cached);
    assert_eq!(similar.score, 88);

    let repeat = orchestrator.evaluate(&near).await;
    assert_eq!(repeat.tier, Tier::ExactHit);
    assert_eq!(provider.calls(), 1);
    assert_eq!(orchestrator.exact_cache().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_confident_heuristic_answers_without_provider() {
    let (provider, orchestrator) = orchestrator(MockProvider::new());

    let empty = orchestrator.evaluate(&request("")).await;
    assert_eq!(empty.tier, Tier::Heuristic);
    assert_eq!(empty.status, Status::Wrong);
    assert!(!empty.error_recovered);

    let again = orchestrator.evaluate(&request("   ")).await;
    assert_eq!(again.tier, Tier::ExactHit);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_supremacy() {
    let (provider, orchestrator) = orchestrator(MockProvider::always(MockStep::hang()));
    let req = request("hola");

    let start = Instant::now();
    let result = orchestrator.evaluate(&req).await;

    assert_eq!(start.elapsed(), Duration::from_millis(8000));
    assert!(result.error_recovered);
    assert_eq!(result.tier, Tier::Fallback);

    let expected = orchestrator.heuristic().evaluate(&req);
    assert_eq!(result.score, expected.score);
    assert_eq!(result.status, expected.status);
    assert_eq!(result.confidence, expected.confidence);
    assert_eq!(result.feedback, expected.feedback);

    // The deadline fired during the third backoff; nothing new starts afterwards.
    let calls_at_deadline = provider.calls();
    assert_eq!(calls_at_deadline, 3);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(provider.calls(), calls_at_deadline);

    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.fallbacks, 1);
    assert!(snapshot.timeouts >= 1);
    assert!(orchestrator.exact_cache().is_empty(), "fallbacks are not cached");
}

#[tokio::test(start_paused = true)]
async fn test_custom_deadline_is_respected() {
    let config = OrchestratorConfig::default().fallback_timeout(Duration::from_millis(300));
    let (_, orchestrator) = orchestrator_with(MockProvider::always(MockStep::hang()), config);

    let start = Instant::now();
    let result = orchestrator.evaluate(&request("hola")).await;
    assert_eq!(start.elapsed(), Duration::from_millis(300));
    assert!(result.error_recovered);
}

#[tokio::test]
async fn test_deadline_fires_during_slow_similarity_scan() {
    let store = Arc::new(InstrumentedStore::new().visit_delay(Duration::from_millis(20)));
    let provider = Arc::new(MockProvider::always(MockStep::ok(84)));
    let orchestrator = Orchestrator::with_store(
        OrchestratorConfig::default().fallback_timeout(Duration::from_millis(200)),
        Arc::clone(&provider),
        store.clone(),
        Arc::new(Metrics::new()),
    );
    for i in 0..50 {
        let key = orchestrator.normalizer().normalize(&request(&format!("hola amigo {i:02}")));
        orchestrator.exact_cache().put(key, EvaluationResult::from_score(80, 0.9, "stored", Tier::External));
    }

    let start = Instant::now();
    let result = orchestrator.evaluate(&request("hola amigo 7")).await;

    assert!(start.elapsed() < Duration::from_millis(600), "{:?}", start.elapsed());
    assert!(result.error_recovered);
    assert_eq!(result.tier, Tier::Fallback);
    assert!(store.visits() < 50, "visited {}", store.visits());
    assert_eq!(provider.calls(), 0);
    assert!(orchestrator.metrics().snapshot().timeouts >= 1);
}

#[tokio::test]
async fn test_long_answers_do_not_stall_the_pipeline() {
    let config = OrchestratorConfig::default().fallback_timeout(Duration::from_millis(500));
    let (_, orchestrator) = orchestrator_with(MockProvider::always(MockStep::ok(84)), config);
    for i in 0..300 {
        let text = format!("{i:05}{}", "a".repeat(3995));
        let key = orchestrator.normalizer().normalize(&request(&text));
        orchestrator.exact_cache().put(key, EvaluationResult::from_score(10, 0.9, "essay", Tier::External));
    }

    let start = Instant::now();
    let result = orchestrator.evaluate(&request(&format!("99999{}", "a".repeat(3994)))).await;

    assert!(start.elapsed() < Duration::from_millis(500), "{:?}", start.elapsed());
    assert!(result.score <= 100);
    assert_eq!(orchestrator.similarity_cache().comparisons(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_provider_permanently_down() {
    let (provider, orchestrator) = orchestrator(MockProvider::always(MockStep::fail(
        ExternalError::service(Some(503), true, "down"),
    )));

    let start = Instant::now();
    let result = orchestrator.evaluate(&request("hola")).await;

    assert!(start.elapsed() <= Duration::from_millis(8000));
    assert!(result.error_recovered);
    assert!(result.score <= 100);
    assert_eq!(result.retries, 3);
    assert_eq!(provider.calls(), 4);
    assert!(orchestrator.exact_cache().is_empty());

    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.retries, 3);
    assert_eq!(snapshot.fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_provider_falls_back_immediately() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default(), Arc::new(DisabledProvider));

    let start = Instant::now();
    let result = orchestrator.evaluate(&request("hola")).await;

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(result.error_recovered);
    assert_eq!(result.retries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_response_falls_through_to_heuristic() {
    let (provider, orchestrator) = orchestrator(MockProvider::always(MockStep::fail(
        ExternalError::malformed("no score"),
    )));

    let result = orchestrator.evaluate(&request("hola")).await;

    assert!(result.error_recovered);
    assert_eq!(provider.calls(), 1);
    assert_eq!(orchestrator.metrics().snapshot().malformed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_crashed_call_task_becomes_fallback() {
    let (_, orchestrator) = orchestrator(MockProvider::always(MockStep::Panic));

    let result = orchestrator.evaluate(&request("hola")).await;

    assert!(result.error_recovered);
    assert_eq!(result.tier, Tier::Fallback);
    assert_eq!(orchestrator.metrics().snapshot().errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_is_cached_for_next_request() {
    let config = OrchestratorConfig::default()
        .retry(RetryConfig::default().call_timeout(Duration::from_secs(20)));
    let (provider, orchestrator) = orchestrator_with(
        MockProvider::always(MockStep::ok_after(77, Duration::from_secs(9))),
        config,
    );
    let req = request("hola");

    let first = orchestrator.evaluate(&req).await;
    assert!(first.error_recovered);
    assert!(orchestrator.exact_cache().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(provider.completed(), 1);

    let second = orchestrator.evaluate(&req).await;
    assert_eq!(second.tier, Tier::ExactHit);
    assert_eq!(second.score, 77);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_never_overwrites_existing_entry() {
    let config = OrchestratorConfig::default()
        .retry(RetryConfig::default().call_timeout(Duration::from_secs(20)));
    let (_, orchestrator) = orchestrator_with(
        MockProvider::always(MockStep::ok_after(77, Duration::from_secs(9))),
        config,
    );
    let req = request("hola");

    orchestrator.evaluate(&req).await;

    // A fresher answer lands under the same key before the late one arrives.
    let key = orchestrator.normalizer().normalize(&req);
    orchestrator.exact_cache().put(
        key,
        EvaluationResult::from_score(20, 0.9, "fresh", Tier::External),
    );

    tokio::time::sleep(Duration::from_secs(2)).await;

    let cached = orchestrator.evaluate(&req).await;
    assert_eq!(cached.score, 20);
    assert_eq!(cached.feedback, "fresh");
}

#[tokio::test(start_paused = true)]
async fn test_metrics_track_tiers() {
    let (_, orchestrator) = orchestrator(MockProvider::always(MockStep::ok(80)));

    orchestrator.evaluate(&request("buenos dias amigo")).await;
    orchestrator.evaluate(&request("buenos dias amigo")).await;
    orchestrator.evaluate(&request("buenos dias amigos")).await;
    orchestrator.evaluate(&request("")).await;

    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.requests, 4);
    assert_eq!(snapshot.tier4_hits, 1);
    assert_eq!(snapshot.tier1_hits, 1);
    assert_eq!(snapshot.tier2_hits, 1);
    assert_eq!(snapshot.tier3_hits, 1);
    assert!((snapshot.cache_hit_rate - 0.5).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_respect_capacity() {
    let config = OrchestratorConfig::default().cache(CacheConfig::default().capacity(50));
    let (_, orchestrator) = orchestrator_with(MockProvider::always(MockStep::ok(80)), config);
    let orchestrator = Arc::new(orchestrator);

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .evaluate(&request(&format!("respuesta numero {i}")))
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        let result = result.expect("task panicked");
        assert_eq!(result.score, 80);
    }
    assert!(orchestrator.exact_cache().len() <= 50);
    assert_eq!(orchestrator.metrics().snapshot().requests, 200);
}

#[test]
fn test_pipeline_state_order() {
    let mut state = PipelineState::Normalizing;
    let mut visited = vec![state];
    while let Some(next) = state.next_tier() {
        state = next;
        visited.push(state);
    }
    let names: Vec<_> = visited.iter().map(PipelineState::as_str).collect();
    assert_eq!(
        names,
        ["NORMALIZING", "TIER1_LOOKUP", "TIER2_LOOKUP", "TIER3_COMPUTE", "TIER4_CALL"]
    );
    assert!(PipelineState::FallbackDone.is_terminal());
    assert!(!PipelineState::Store.is_terminal());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_context() {
    let ctx = DeadlineContext::new(Duration::from_secs(1));
    assert!(!ctx.is_expired());
    assert_eq!(ctx.remaining(), Duration::from_secs(1));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(ctx.is_expired());
    assert_eq!(ctx.remaining(), Duration::ZERO);

    assert!(!ctx.is_cancelled());
    ctx.cancel();
    assert!(ctx.token().is_cancelled());
}
