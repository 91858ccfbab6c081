use chrono::Utc;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use daily_tournament::{
    Country, PendingReward, TournamentService, User,
    db::{MemoryStore, Repositories},
    domain::CATALOG,
    leaderboard::{InMemoryLeaderboardStore, Member, Namespace, RankedLeaderboardStore},
};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Benchmark absolute score writes into a populated namespace
fn bench_set_score(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("ranked_set_score");

    for size in [5usize, 1_000, 100_000] {
        let store = InMemoryLeaderboardStore::new();
        rt.block_on(async {
            for id in 0..size as i64 {
                store
                    .set_score(Namespace::Group(1), Member::User(id), id % 97)
                    .await
                    .unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut next = 0i64;
            b.to_async(&rt).iter(|| {
                next = (next + 1) % size as i64;
                let store = &store;
                let id = next;
                async move {
                    store
                        .set_score(Namespace::Group(1), Member::User(id), id % 31)
                        .await
                        .unwrap()
                }
            });
        });
    }

    group.finish();
}

/// Benchmark rank lookups in a populated namespace
fn bench_rank_of(c: &mut Criterion) {
    let rt = runtime();
    let store = InMemoryLeaderboardStore::new();
    rt.block_on(async {
        for id in 0..10_000i64 {
            store
                .set_score(Namespace::Group(1), Member::User(id), id % 251)
                .await
                .unwrap();
        }
    });

    c.bench_function("ranked_rank_of_10k", |b| {
        b.to_async(&rt).iter(|| async {
            store
                .rank_of(Namespace::Group(1), Member::User(5_000))
                .await
                .unwrap()
        });
    });
}

/// Benchmark a full group's worth of sequential joins on a fresh tournament
fn bench_fill_group(c: &mut Criterion) {
    let rt = runtime();

    c.bench_function("assign_five_countries", |b| {
        b.to_async(&rt).iter(|| async {
            let store = Arc::new(MemoryStore::new());
            let repos = Repositories::from_store(store.clone());
            let service =
                TournamentService::new(&repos, Arc::new(InMemoryLeaderboardStore::new()));
            service.lifecycle().start(Utc::now()).await.unwrap();

            for (i, country) in CATALOG.into_iter().enumerate() {
                store.insert_user(eligible(i as i64 + 1, country)).await;
                service.enter_tournament(i as i64 + 1).await.unwrap();
            }
        });
    });
}

fn eligible(id: i64, country: Country) -> User {
    User {
        id,
        coins: 5_000,
        level: 25,
        country,
        score: 0,
        group_id: None,
        pending_reward: PendingReward::None,
        version: 0,
    }
}

criterion_group!(benches, bench_set_score, bench_rank_of, bench_fill_group);
criterion_main!(benches);
