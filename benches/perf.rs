use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

use decisive_vote::classifier::ChamberVoteClassifier;
use decisive_vote::config::ElectionConfig;
use decisive_vote::country::{Chamber, Country};
use decisive_vote::polls::NoPolls;
use decisive_vote::race::{Candidate, Race};
use decisive_vote::scorer::{Party, ScoreTable, ScorerConfig};
use decisive_vote::simulate::{OutcomeSimulator, simulate_many};
use decisive_vote::snapshot::ElectionSnapshot;
use decisive_vote::tipping_point::tipping_point_probability;

fn mini_country() -> (ElectionSnapshot, ScoreTable, Country) {
    let snapshot = ElectionSnapshot::from_json_str(SNAPSHOT_JSON).expect("valid fixture json");
    let mut config = ElectionConfig::default();
    config.house_seats = 5;
    config.senate_seats = 4;
    config.electoral_votes = 11;
    let scorer = ScoreTable::build(&snapshot.score_rows, &config.scorer);
    let country = Country::build(&snapshot, &scorer, &config).expect("fixture country builds");
    (snapshot, scorer, country)
}

fn bench_tipping_point(c: &mut Criterion) {
    let scorer = ScoreTable::build(&[], &ScorerConfig::default());
    let race = Race::new("PA", 6_900_000, Candidate::new("Trump", Party::Republican), &scorer, &NoPolls)
        .projected(0.4956, 1_564);

    c.bench_function("tipping_point_statewide", |b| {
        b.iter(|| black_box(tipping_point_probability(black_box(&race)).unwrap()))
    });
}

fn bench_country_build(c: &mut Criterion) {
    c.bench_function("country_build_fixture", |b| {
        b.iter(|| {
            let (_, _, country) = mini_country();
            black_box(country.seat_count(Chamber::House));
        })
    });
}

fn bench_government(c: &mut Criterion) {
    let (snapshot, scorer, country) = mini_country();
    let classifier = ChamberVoteClassifier::fit(&snapshot.roll_call, &scorer).expect("fixture fits");
    let simulator = OutcomeSimulator::new(&classifier);

    c.bench_function("simulate_government_once", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        b.iter(|| {
            let outcomes = country
                .simulate_government(black_box(0.01), &simulator, &mut rng)
                .unwrap();
            black_box(outcomes.len());
        })
    });

    c.bench_function("simulate_many_64", |b| {
        b.iter(|| {
            let runs = simulate_many(&country, &simulator, 64, 0.01, black_box(11)).unwrap();
            black_box(runs.len());
        })
    });
}

criterion_group!(perf, bench_tipping_point, bench_country_build, bench_government);
criterion_main!(perf);

static SNAPSHOT_JSON: &str = include_str!("../tests/fixtures/mini_snapshot.json");
