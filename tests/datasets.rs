// Decoding of recorded stats.nba.com responses, end to end.
use nba_stats::{Envelope, Error, Record, Value};
use std::fs;

fn fixture(name: &str) -> Envelope {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    let bytes = fs::read(&path).expect("Failed to read fixture");
    Envelope::decode(&bytes).expect("Failed to decode fixture")
}

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn lineups_single_row() {
    let env = fixture("leaguedashlineups.json");
    assert_eq!(env.resource(), "leaguedashlineups");

    let ds = env.get_dataset("Lineups").unwrap();
    assert_eq!(ds.row_count(), 1);

    let rows = ds.to_map();
    let expected = record(&[
        ("GROUP_SET", Value::from(1i64)),
        ("GROUP_ID", Value::from("Test")),
        ("GROUP_NAME", Value::from("Data")),
        ("TEAM_ID", Value::from(100i64)),
        ("TEAM_ABBREVIATION", Value::from(50i64)),
    ]);
    assert_eq!(rows, vec![expected.clone()]);
    assert_eq!(ds.get_row(0).unwrap(), expected);
}

#[test]
fn empty_response_has_no_datasets() {
    let env = fixture("videodetails_empty.json");
    assert!(env.tables().is_empty());

    let err = env.get_dataset("anything").unwrap_err();
    assert!(matches!(err, Error::DatasetNotFound { ref name } if name == "anything"));
    assert!(err.is_not_found());
}

#[test]
fn headerless_table_keeps_its_rows() {
    let env = fixture("shotchartdetail_no_headers.json");

    let ds = env.get_dataset("ShotLocations").unwrap();
    assert_eq!(ds.row_count(), 1);
    let rows = ds.to_map();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_empty());

    let shots = env.get_dataset("Shot_Chart_Detail").unwrap();
    assert_eq!(shots.row_count(), 2);
    assert_eq!(shots.get_row(1).unwrap()["SHOT_MADE_FLAG"].as_i64(), Some(0));
}

#[test]
fn duplicate_names_resolve_to_first() {
    let env = fixture("boxscore_multi.json");

    let ds = env.get_dataset("LineScore").unwrap();
    assert_eq!(ds.headers(), ["TEAM_ID", "PTS_QTR1", "PTS"]);
    assert_eq!(ds.row_count(), 2);

    let names: Vec<_> = env.dataset_names().filter(|n| *n == "LineScore").collect();
    assert_eq!(names.len(), 2);
}

#[test]
fn only_requested_dataset_is_read() {
    let env = fixture("boxscore_multi.json");
    assert_eq!(env.tables().len(), 7);

    let other = env.get_dataset("OtherStats").unwrap();
    let pts: Vec<_> = other
        .column("PTS_PAINT")
        .unwrap()
        .into_iter()
        .filter_map(Value::as_i64)
        .collect();
    assert_eq!(pts, [62, 48]);

    let summary = env.get_dataset("GameSummary").unwrap().get_row(0).unwrap();
    assert!(summary["NATL_TV_BROADCASTER_ABBREVIATION"].is_null());
    assert_eq!(summary["GAME_ID"].as_str(), Some("0022300061"));
    assert_eq!(summary["HOME_TEAM_ID"].as_i64(), Some(1610612743));
}

#[test]
fn ragged_rows_follow_prefix_zip() {
    let env = fixture("boxscore_multi.json");
    let ds = env.get_dataset("InactivePlayers").unwrap();

    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.mismatched_rows(), 2);

    let rows = ds.to_map();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].len(), 2);
    assert_eq!(rows[0]["FIRST_NAME"].as_str(), Some("Luka"));
    assert_eq!(rows[1].len(), 1);
    assert!(rows[1].get("FIRST_NAME").is_none());
}

#[test]
fn nested_values_are_raw() {
    let env = fixture("boxscore_multi.json");
    let row = env.get_dataset("AvailableVideo").unwrap().get_row(0).unwrap();
    assert_eq!(row["PT_AVAILABLE"].as_f64(), Some(1.0));
    assert_eq!(
        row["META"].as_raw(),
        Some(&serde_json::json!({"flags": [true, false]}))
    );
}

#[test]
fn empty_table_is_found_but_empty() {
    let env = fixture("boxscore_multi.json");
    let ds = env.get_dataset("Officials").unwrap();
    assert!(ds.is_empty());
    assert!(ds.to_map().is_empty());
    assert!(matches!(
        ds.get_row(0),
        Err(Error::RowIndexOutOfRange { index: 0, len: 0 })
    ));
}

#[test]
fn singular_result_set_key() {
    let env = fixture("scoreboard_singular.json");
    let ds = env.get_dataset("GameHeader").unwrap();
    assert_eq!(ds.get_row(0).unwrap()["GAME_ID"].as_str(), Some("0022300505"));
    assert_eq!(env.parameters()["DayOffset"], serde_json::json!(0));
}

#[test]
fn lookups_are_idempotent() {
    let env = fixture("boxscore_multi.json");
    for name in env.dataset_names() {
        let a = env.get_dataset(name).unwrap();
        let b = env.get_dataset(name).unwrap();
        assert_eq!(a.row_count(), b.row_count());
        assert_eq!(a.to_map(), b.to_map());
    }
}

#[test]
fn normalized_output_round_trips_values() {
    let env = fixture("boxscore_multi.json");
    let out = serde_json::to_value(env.to_normalized()).unwrap();

    assert_eq!(out["LineScore"].as_array().unwrap().len(), 2);
    assert_eq!(out["GameSummary"][0]["NATL_TV_BROADCASTER_ABBREVIATION"], serde_json::Value::Null);
    assert_eq!(out["OtherStats"][1]["TEAM_ID"], serde_json::json!(1610612747));
    assert_eq!(out["Officials"], serde_json::json!([]));
}

#[test]
fn envelope_can_be_read_from_many_threads() {
    let env = fixture("boxscore_multi.json");
    let expected = env.get_dataset("OtherStats").unwrap().to_map();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| env.get_dataset("OtherStats").unwrap().to_map()))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}
