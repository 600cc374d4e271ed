//! Property tests for routing invariants over randomly shaped registries

use std::sync::Arc;

use proptest::prelude::*;

use switchyard_llm::{
    BackendKind, MockBackend, ModelPrice, Router, Task, TaskKind, LARGE_TASK_THRESHOLD,
    NO_BACKEND,
};

const NAMES: [&str; 3] = ["local", "ollama", "remote"];
const KINDS: [BackendKind; 3] = [BackendKind::LocalChat, BackendKind::Ollama, BackendKind::Metered];

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn build_router(available: [bool; 3], order: &[usize], budget: f64) -> Router {
    let mut builder = Router::builder().cost_budget(budget);
    for i in 0..3 {
        let mock = MockBackend::new(NAMES[i], KINDS[i])
            .with_tokens(500)
            .with_price(ModelPrice::new(0.01, 0.03));
        mock.set_available(available[i]);
        builder = builder.backend(Arc::new(mock));
    }
    builder
        .fallback_order(order.iter().map(|&i| NAMES[i]))
        .build()
}

fn task_kind() -> impl Strategy<Value = TaskKind> {
    prop_oneof![
        Just(TaskKind::General),
        Just(TaskKind::Security),
        Just(TaskKind::Dependency),
        Just(TaskKind::Quality),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn route_never_repeats_and_envelope_is_consistent(
        available in prop::array::uniform3(any::<bool>()),
        order in prop::collection::vec(0usize..3, 0..6),
        kind in task_kind(),
        budget in 0.0f64..0.05,
    ) {
        let router = build_router(available, &order, budget);
        let result = runtime().block_on(router.route(&Task::new(kind, "fn main() {}")));

        let mut seen: Vec<&str> = result.attempts.iter().map(|a| a.backend_id.as_str()).collect();
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        prop_assert_eq!(seen.len(), total);

        if result.success {
            prop_assert!(result.error.is_none());
            prop_assert_ne!(result.backend_id.as_str(), NO_BACKEND);
        } else {
            prop_assert!(result.content.is_empty());
            prop_assert!(result.error.as_deref().map_or(false, |e| !e.is_empty()));
            prop_assert_eq!(result.backend_id.as_str(), NO_BACKEND);
        }

        // Only metered successes move the spend counter
        let expected = if result.success && result.backend_id == "remote" {
            result.cost_estimate
        } else {
            0.0
        };
        prop_assert!((router.spend() - expected).abs() < 1e-12);
    }

    #[test]
    fn large_tasks_start_on_self_hosted(
        available in prop::array::uniform3(any::<bool>()),
        order in prop::collection::vec(0usize..3, 0..6),
        extra in 1usize..64,
    ) {
        let router = build_router(available, &order, 10.0);
        let content = "a".repeat(LARGE_TASK_THRESHOLD + extra);
        let result = runtime().block_on(router.route(&Task::new(TaskKind::General, content)));

        prop_assert!(!result.attempts.is_empty());
        prop_assert_ne!(result.attempts[0].backend_id.as_str(), "remote");
    }

    #[test]
    fn security_tasks_past_headroom_start_on_self_hosted(
        available in prop::array::uniform2(any::<bool>()),
        remote_up in any::<bool>(),
        order in prop::collection::vec(0usize..3, 0..6),
        warmup in 1usize..6,
        fraction in 0.81f64..0.99,
    ) {
        let per_call = ModelPrice::new(0.01, 0.03).estimate(500);
        let ceiling = per_call * warmup as f64 / fraction;

        let mocks: Vec<Arc<MockBackend>> = (0..3)
            .map(|i| {
                Arc::new(
                    MockBackend::new(NAMES[i], KINDS[i])
                        .with_tokens(500)
                        .with_price(ModelPrice::new(0.01, 0.03)),
                )
            })
            .collect();
        let mut builder = Router::builder().cost_budget(ceiling);
        for mock in &mocks {
            builder = builder.backend(mock.clone());
        }
        let router = builder.fallback_order(order.iter().map(|&i| NAMES[i])).build();

        // Only the metered backend is up while spend warms into [0.8c, c)
        mocks[0].set_available(false);
        mocks[1].set_available(false);
        let rt = runtime();
        for _ in 0..warmup {
            let warm = rt.block_on(router.route(&Task::new(TaskKind::General, "fn warm() {}")));
            prop_assert_eq!(warm.backend_id.as_str(), "remote");
        }
        prop_assert!(router.spend() < ceiling);
        prop_assert!(router.spend() >= 0.8 * ceiling);

        mocks[0].set_available(available[0]);
        mocks[1].set_available(available[1]);
        mocks[2].set_available(remote_up);

        let task = Task::new(TaskKind::Security, "system(user_input)");
        let result = rt.block_on(router.route(&task));
        prop_assert!(!result.attempts.is_empty());
        prop_assert_ne!(result.attempts[0].backend_id.as_str(), "remote");
    }

    #[test]
    fn status_remaining_matches_spend(
        available in prop::array::uniform3(any::<bool>()),
        routes in 1usize..6,
        budget in 0.0f64..0.1,
    ) {
        let router = build_router(available, &[0, 1, 2], budget);
        let rt = runtime();
        for _ in 0..routes {
            rt.block_on(router.route(&Task::new(TaskKind::Security, "exec(cmd)")));
        }
        let status = rt.block_on(router.status());
        prop_assert!((status.budget_remaining - (status.cost_budget - status.spend)).abs() < 1e-12);
        prop_assert!(status.spend >= 0.0);
    }
}
