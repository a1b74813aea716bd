use decisive_vote::error::ModelError;
use decisive_vote::polls::NoPolls;
use decisive_vote::race::{Candidate, Race};
use decisive_vote::scorer::{Party, ScoreTable, ScorerConfig};
use decisive_vote::tipping_point::{VoteCountDistribution, tipping_point_probability};

fn polled_race(turnout: u64, sample_size: u64, share: f64) -> Race {
    let scorer = ScoreTable::build(&[], &ScorerConfig::default());
    Race::new("WI", turnout, Candidate::new("Smith", Party::Republican), &scorer, &NoPolls)
        .projected(share, sample_size)
}

#[test]
fn dead_heat_matches_the_flat_prior_approximation() {
    // Near a tie the kernel integrates to 1/(T+1) in share space, scaled by the share density at 0.5.
    let race = polled_race(300_000, 500, 0.5);
    let share_sd = (0.25_f64 / 500.0).sqrt();
    let density = 1.0 / (share_sd * (2.0 * std::f64::consts::PI).sqrt());
    let expected = density / 300_001.0;
    let p = tipping_point_probability(&race).unwrap();
    assert!((p - expected).abs() / expected < 0.02, "got {p}, expected {expected}");
}

#[test]
fn less_polling_raises_the_odds_near_a_tie() {
    let p2000 = tipping_point_probability(&polled_race(300_000, 2_000, 0.55)).unwrap();
    let p1000 = tipping_point_probability(&polled_race(300_000, 1_000, 0.55)).unwrap();
    let p500 = tipping_point_probability(&polled_race(300_000, 500, 0.55)).unwrap();
    assert!(p2000 <= p1000, "{p2000} > {p1000}");
    assert!(p1000 <= p500, "{p1000} > {p500}");
    assert!(p500 > 0.0);
}

#[test]
fn lopsided_races_are_almost_never_decisive() {
    let close = tipping_point_probability(&polled_race(300_000, 2_000, 0.52)).unwrap();
    let safe = tipping_point_probability(&polled_race(300_000, 2_000, 0.9)).unwrap();
    assert!(safe < 1e-20, "{safe}");
    assert!(close > safe);
    let safe_dem = tipping_point_probability(&polled_race(300_000, 2_000, 0.1)).unwrap();
    assert!(safe_dem < 1e-20, "{safe_dem}");
}

#[test]
fn probabilities_stay_in_the_unit_interval() {
    for (turnout, n, p) in [(1, 10, 0.5), (2, 10, 0.5), (101, 50, 0.6), (5_000_000, 3_000, 0.501)] {
        let prob = tipping_point_probability(&polled_race(turnout, n, p)).unwrap();
        assert!((0.0..=1.0).contains(&prob), "T={turnout} n={n} p={p}: {prob}");
    }
}

#[test]
fn contested_race_without_spread_is_rejected() {
    let race = polled_race(10_000, 400, 0.0);
    assert!(matches!(
        tipping_point_probability(&race),
        Err(ModelError::DegenerateDistribution { .. })
    ));
    let race = polled_race(10_000, 400, 1.0);
    assert!(matches!(
        VoteCountDistribution::for_race(&race),
        Err(ModelError::DegenerateDistribution { sample_size: 400, .. })
    ));
}

#[test]
fn empty_projection_cannot_mark_a_race_contested() {
    let race = polled_race(10_000, 0, 0.5);
    assert!(!race.contested());
    assert_eq!(race.incumbent_projected_vote_share(), 1.0);
    assert_eq!(tipping_point_probability(&race).unwrap(), 0.0);
}

#[test]
fn uncontested_race_has_no_distribution() {
    let scorer = ScoreTable::build(&[], &ScorerConfig::default());
    let race = Race::new("WY", 250_000, Candidate::new("Barrasso", Party::Republican), &scorer, &NoPolls);
    assert_eq!(tipping_point_probability(&race).unwrap(), 0.0);
    assert!(matches!(
        VoteCountDistribution::for_race(&race),
        Err(ModelError::Uncontested(code)) if code == "WY"
    ));
}
