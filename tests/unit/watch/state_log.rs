use std::{
    io::Write,
    time::{Duration, UNIX_EPOCH},
};

use super::*;

/// Append `line` and pin the modification time so successive writes are distinguishable.
fn append(path: &Path, line: &str, mtime_secs: u64) {
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    writeln!(f, "{line}").unwrap();
    f.set_modified(UNIX_EPOCH + Duration::from_secs(mtime_secs))
        .unwrap();
}

#[test]
fn parses_bracketed_and_parenthesized_lists() {
    assert_eq!(parse_state_line("[0, 3, 0, 7]").unwrap(), vec![0, 3, 0, 7]);
    assert_eq!(parse_state_line("  [2,0]\r").unwrap(), vec![2, 0]);
    assert_eq!(parse_state_line("(1, 2)").unwrap(), vec![1, 2]);
    assert_eq!(parse_state_line("[]").unwrap(), Vec::<i64>::new());
}

#[test]
fn accepts_one_trailing_comma() {
    assert_eq!(parse_state_line("[1, 2,]").unwrap(), vec![1, 2]);
    assert_eq!(parse_state_line("(4, )").unwrap(), vec![4]);
    for bad in ["[,]", "[1,,]", "[1, 2,,]"] {
        assert!(parse_state_line(bad).is_err(), "{bad}");
    }
}

#[test]
fn rejects_malformed_lists() {
    for bad in ["[1, x, 3]", "", "1, 2", "[1.5]", "{\"a\": 1}"] {
        let err = parse_state_line(bad).unwrap_err();
        assert!(matches!(err, MaskError::StateParse(_)), "{bad}: {err}");
    }
}

#[test]
fn last_line_skips_trailing_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tmpl.log");
    std::fs::write(&path, "[1, 0]\n[2, 0]\n\n  \n").unwrap();
    assert_eq!(read_last_line(&path).unwrap().as_deref(), Some("[2, 0]"));

    std::fs::write(&path, "[3]").unwrap();
    assert_eq!(read_last_line(&path).unwrap().as_deref(), Some("[3]"));

    std::fs::write(&path, "\n\n").unwrap();
    assert_eq!(read_last_line(&path).unwrap(), None);

    std::fs::write(&path, "").unwrap();
    assert_eq!(read_last_line(&path).unwrap(), None);
}

#[test]
fn last_line_is_found_in_long_logs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tmpl.log");
    let mut body = String::new();
    for i in 0..2000 {
        body.push_str(&format!("[{i}, 0, 0]\n"));
    }
    let long_line = format!("[{}]", vec!["1"; 5000].join(", "));
    body.push_str(&long_line);
    body.push('\n');
    std::fs::write(&path, body).unwrap();

    assert_eq!(read_last_line(&path).unwrap(), Some(long_line));
}

#[test]
fn missing_file_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = StateLog::new(dir.path().join("tmpl.log"));
    assert_eq!(log.poll(), PollOutcome::Missing);
    assert!(!log.poll().changed());
}

#[test]
fn duplicate_state_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tmpl.log");
    let mut log = StateLog::new(&path);

    append(&path, "[2, 0]", 100);
    assert_eq!(log.poll(), PollOutcome::Changed(vec![2, 0]));
    assert_eq!(log.poll(), PollOutcome::Unmodified);

    append(&path, "[2, 0]", 101);
    assert_eq!(log.poll(), PollOutcome::Duplicate);
    assert_eq!(log.last_state(), Some(&[2, 0][..]));

    append(&path, "[2, 1]", 102);
    assert_eq!(log.poll().into_state(), Some(vec![2, 1]));
}

#[test]
fn malformed_line_is_not_reprocessed_until_the_file_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tmpl.log");
    let mut log = StateLog::new(&path);

    append(&path, "[1, 0, 3]", 100);
    assert!(log.poll().changed());

    append(&path, "[1, x, 3]", 101);
    assert!(matches!(log.poll(), PollOutcome::Malformed(_)));
    assert_eq!(log.last_state(), Some(&[1, 0, 3][..]));
    assert_eq!(log.poll(), PollOutcome::Unmodified);

    append(&path, "[1, 2, 3]", 102);
    assert_eq!(log.poll(), PollOutcome::Changed(vec![1, 2, 3]));
}

#[test]
fn all_inactive_state_is_not_a_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tmpl.log");
    let mut log = StateLog::new(&path);

    append(&path, "[0, 0, 0]", 100);
    let outcome = log.poll();
    assert_eq!(outcome, PollOutcome::Inactive);
    assert_eq!(outcome.into_state(), None);
    assert_eq!(log.last_state(), None);

    append(&path, "[0, 4, 0]", 101);
    assert!(log.poll().changed());
}
