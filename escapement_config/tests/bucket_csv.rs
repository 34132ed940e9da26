use std::fs::File;
use std::io::Write;

use escapement_config::{BucketRow, RowStatus, load_bucket_csv, write_bucket_csv};
use rstest::rstest;
use tempfile::tempdir;

fn row(bucket: usize, avg: f64, count: u32, status: RowStatus) -> BucketRow {
    BucketRow {
        bucket,
        temp_c: 13.25 + bucket as f32 * 0.5,
        avg_duration_us: avg,
        sample_count: count,
        status,
    }
}

#[test]
fn written_table_loads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("table.csv");
    let rows = vec![
        row(0, 500_012.5, 4096, RowStatus::Confirmed),
        row(1, 500_020.0, 17, RowStatus::Pending),
        row(2, 0.0, 0, RowStatus::Empty),
    ];
    write_bucket_csv(&path, &rows).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("bucket,temp_c,avg_duration_us,sample_count,status\n"));
    assert!(text.contains(",pending"));

    assert_eq!(load_bucket_csv(&path).unwrap(), rows);
}

#[test]
fn wrong_headers_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "bucket,temp,avg,count,status").unwrap();
    writeln!(f, "0,13.25,500000,1,pending").unwrap();
    drop(f);

    let err = load_bucket_csv(&path).unwrap_err();
    assert!(
        err.to_string()
            .contains("calibration CSV must have headers")
    );
}

#[rstest]
#[case("1,13.75,0,0,empty\n", "contiguous")]
#[case("0,13.25,500000,3,empty\n", "sample_count 0")]
#[case("0,13.25,500000,0,confirmed\n", "needs samples")]
#[case("0,13.25,-1,1,pending\n", "avg_duration_us")]
#[case("0,13.25,500000,1,done\n", "invalid CSV row 2")]
#[case("", "no rows")]
fn inconsistent_rows_are_rejected(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rows.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "bucket,temp_c,avg_duration_us,sample_count,status").unwrap();
    write!(f, "{body}").unwrap();
    drop(f);

    let err = load_bucket_csv(&path).unwrap_err();
    assert!(err.to_string().contains(needle), "expected {needle} in: {err}");
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempdir().unwrap();
    let err = load_bucket_csv(&dir.path().join("nope.csv")).unwrap_err();
    assert!(err.to_string().contains("nope.csv"));
}
