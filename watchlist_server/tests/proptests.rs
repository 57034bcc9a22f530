mod common;

use common::{ScriptedFetcher, sym};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use watchlist_common::{DispatchOutcome, FetchError, MutationRequest, SkipReason, Symbol};
use watchlist_server::dispatcher::Pipeline;
use watchlist_server::{ManualConnectivity, MemoryStore, QuoteStore, Reconciler};

struct Bench {
    store: Arc<MemoryStore>,
    fetcher: Arc<ScriptedFetcher>,
    network: Arc<ManualConnectivity>,
    pipeline: Pipeline,
}

impl Bench {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new(3));
        let fetcher = Arc::new(ScriptedFetcher::market());
        let network = Arc::new(ManualConnectivity::new(true));
        let pipeline = Pipeline::new(
            store.clone(),
            fetcher.clone(),
            network.clone(),
            Reconciler::default(),
        );
        Self {
            store,
            fetcher,
            network,
            pipeline,
        }
    }

    fn run(&self, request: &MutationRequest) -> DispatchOutcome {
        self.pipeline.run(request, &AtomicBool::new(false))
    }

    fn max_current_per_symbol(&self) -> usize {
        let mut counts: BTreeMap<Symbol, usize> = BTreeMap::new();
        for row in self.store.rows().iter().filter(|r| r.is_current) {
            *counts.entry(row.symbol.clone()).or_default() += 1;
        }
        counts.values().copied().max().unwrap_or(0)
    }
}

fn any_symbol() -> impl Strategy<Value = Symbol> {
    prop::sample::select(vec!["aapl", "GOOG", "Msft", "nflx", "NFLX", "zzzz"]).prop_map(sym)
}

fn any_request() -> impl Strategy<Value = MutationRequest> {
    prop_oneof![
        Just(MutationRequest::Init),
        Just(MutationRequest::PeriodicRefresh),
        any_symbol().prop_map(MutationRequest::Add),
        any_symbol().prop_map(MutationRequest::Delete),
    ]
}

fn case_variants() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), 4), 1..8).prop_map(|masks| {
        masks
            .into_iter()
            .map(|mask| {
                "nflx"
                    .chars()
                    .zip(mask)
                    .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c })
                    .collect::<String>()
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn repeated_add_watches_symbol_once(spellings in case_variants()) {
        let bench = Bench::new();
        for spelling in &spellings {
            let symbol = Symbol::parse(spelling).expect("symbol");
            bench.run(&MutationRequest::Add(symbol));
        }
        let nflx = sym("NFLX");
        let current: Vec<_> = bench.store.current().into_iter().filter(|r| r.symbol == nflx).collect();
        prop_assert_eq!(current.len(), 1);
        prop_assert_eq!(bench.fetcher.call_count(), 1);
    }

    #[test]
    fn at_most_one_current_row_per_symbol(
        steps in prop::collection::vec((any_request(), any::<bool>()), 1..24)
    ) {
        let bench = Bench::new();
        for (request, online) in &steps {
            bench.network.set_connected(*online);
            bench.run(request);
            prop_assert!(bench.max_current_per_symbol() <= 1);
        }
    }

    #[test]
    fn failed_fetch_never_changes_the_store(
        setup in prop::collection::vec(any_request(), 0..8),
        request in any_request(),
    ) {
        let bench = Bench::new();
        for step in &setup {
            bench.run(step);
        }
        bench.fetcher.fail_with(Some(FetchError::NetworkUnavailable("down".to_string())));
        let before = bench.store.rows();

        let outcome = bench.run(&request);

        // Only a Delete may write, and it never fetches.
        if matches!(outcome, DispatchOutcome::Failed(_)) || !matches!(request, MutationRequest::Delete(_)) {
            prop_assert_eq!(bench.store.rows(), before);
        }
    }

    #[test]
    fn init_twice_equals_init_once(setup in prop::collection::vec(any_request(), 0..6)) {
        let bench = Bench::new();
        for step in &setup {
            bench.run(step);
        }
        bench.run(&MutationRequest::Init);
        let once = bench.store.rows();
        let calls = bench.fetcher.call_count();

        let outcome = bench.run(&MutationRequest::Init);

        prop_assert_eq!(outcome, DispatchOutcome::Unchanged);
        prop_assert_eq!(bench.store.rows(), once);
        prop_assert_eq!(bench.fetcher.call_count(), calls);
    }

    #[test]
    fn offline_requests_leave_the_store_alone(
        setup in prop::collection::vec(any_request(), 0..6),
        request in any_request(),
    ) {
        let bench = Bench::new();
        for step in &setup {
            bench.run(step);
        }
        let before = bench.store.rows();
        let calls = bench.fetcher.call_count();
        bench.network.set_connected(false);

        let outcome = bench.run(&request);

        prop_assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::NetworkUnavailable));
        prop_assert_eq!(bench.store.rows(), before);
        prop_assert_eq!(bench.fetcher.call_count(), calls);
    }
}
