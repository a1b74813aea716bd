use std::fs;
use std::path::PathBuf;

use decisive_vote::classifier::ChamberVoteClassifier;
use decisive_vote::config::ElectionConfig;
use decisive_vote::error::ModelError;
use decisive_vote::polls::PollSource;
use decisive_vote::scorer::{IdeologyScore, Party, ScoreTable};
use decisive_vote::snapshot::ElectionSnapshot;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn load() -> ElectionSnapshot {
    ElectionSnapshot::load(&fixture_path("mini_snapshot.json")).expect("fixture should load")
}

#[test]
fn parses_snapshot_fixture() {
    let snapshot = load();
    assert_eq!(snapshot.states.len(), 3);
    assert_eq!(snapshot.score_rows.len(), 13);
    assert_eq!(snapshot.senators.len(), 4);
    assert_eq!(snapshot.senators[3].party, Party::Independent);
    assert_eq!(snapshot.representatives[0].district_label(), "10");
    assert_eq!(snapshot.roll_call.len(), 10);
    assert_eq!(snapshot.district_turnout_totals().get("ME2"), Some(&380_000));
    assert!(snapshot.score_rows[11].nominate_dim1.is_none());
}

#[test]
fn poll_libraries_resolve_by_code_prefix() {
    let snapshot = load();
    let house = snapshot.poll_library("house").unwrap();
    assert_eq!(house.len(), 2);
    assert!(house.find_poll("PA10").is_some());
    assert!(house.find_poll("PA1").is_some());
    assert!(house.find_poll("PA2").is_none());
    let table = house.find_poll("PA10").unwrap();
    assert!(table.has_margin_of_error());
    let names: Vec<String> = table.candidate_columns().into_iter().map(|c| c.name).collect();
    assert_eq!(names, ["Perry", "DePasquale"]);
    assert!(snapshot.poll_library("governor").is_none());
}

#[test]
fn score_table_skips_invalid_and_old_rows() {
    let snapshot = load();
    let scorer = ScoreTable::build(&snapshot.score_rows, &ElectionConfig::default().scorer);
    assert_eq!(scorer.member_count(), 11);
    assert!(matches!(scorer.get_voter_score(12), Err(ModelError::VoterNotFound(12))));
    assert!(matches!(scorer.get_voter_score(13), Err(ModelError::VoterNotFound(13))));

    // Pennsylvania Republicans: Toomey, Fitzpatrick, Perry.
    let mean = scorer.get_score("Nobody Known", Party::Republican, "PA3");
    assert!((mean.dim1() - 0.5).abs() < 1e-12);
    assert!((mean.dim2() - 0.7 / 3.0).abs() < 1e-12);

    assert_eq!(
        scorer.get_score("Robert P. Casey", Party::Democrat, "PA"),
        IdeologyScore::new(-0.3, -0.1)
    );
    assert_eq!(
        scorer.get_score("Donald Trump", Party::Republican, "WI"),
        IdeologyScore::new(0.7, -0.1)
    );
}

#[test]
fn fixture_roll_call_fits_a_classifier() {
    let snapshot = load();
    let scorer = ScoreTable::build(&snapshot.score_rows, &ElectionConfig::default().scorer);
    let model = ChamberVoteClassifier::fit(&snapshot.roll_call, &scorer).unwrap();
    assert_eq!(model.predict(&IdeologyScore::new(0.6, 0.0)), 1);
    assert_eq!(model.predict(&IdeologyScore::new(-0.6, 0.0)), -1);
}

#[test]
fn config_file_overrides_defaults() {
    let raw = r#"{
        "house_seats": 5,
        "senate_seats": 4,
        "electoral_votes": 11,
        "split_vote_states": ["ME"],
        "congress_excluded": ["DC"],
        "nominees": {
            "republican": {"name": "Trump", "party": "R"},
            "democrat": {"name": "Biden", "party": "D"}
        },
        "poll_sources": {"electoral_college": "ec", "house": "house", "senate": "senate"},
        "rating_sheets": [
            {"chamber": "house", "poll_source": "house", "current": true,
             "ratings": {"toss_up": ["PA1", "PA10"]}}
        ]
    }"#;
    let config = ElectionConfig::from_json_str(raw).unwrap();
    assert_eq!(config.house_seats, 5);
    assert_eq!(config.scorer.congress_floor, 107);
    assert_eq!(config.rating_sheets.len(), 1);
    assert!(matches!(
        ElectionConfig::from_json_str("{\"house_seats\": \"many\"}"),
        Err(ModelError::Config(_))
    ));
}
