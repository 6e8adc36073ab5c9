//! Unit tests for the result ledger.

use std::fmt;

use rstest::rstest;

use super::*;

struct Bucket {
    name: &'static str,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bucket {}", self.name)
    }
}

fn defects(result: &ActionResult) -> Vec<&ResultError> {
    result.errors().iter().filter(|e| e.is_defect()).collect()
}

// ---------------------------------------------------------------------------
// Code truth table
// ---------------------------------------------------------------------------

#[test]
fn open_result_reports_error() {
    let result = ActionResult::new();
    assert_eq!(result.code(), ResultCode::Error);
    assert_eq!(result.output(), INTERNAL_ERROR_OUTPUT);
}

#[test]
fn failed_result_reports_summary_verbatim() {
    let mut result = ActionResult::new();
    result.create("A");
    result.fail("bad spec");
    assert_eq!(result.code(), ResultCode::Failure);
    assert_eq!(result.output(), "bad spec");
}

#[test]
fn successful_result_without_changes_is_noop() {
    let mut result = ActionResult::new();
    result.succeed("done");
    assert_eq!(result.code(), ResultCode::Noop);
    assert_eq!(result.output(), NO_CHANGES_OUTPUT);
}

#[rstest]
#[case::create(ChangeSection::Create)]
#[case::update(ChangeSection::Update)]
#[case::delete(ChangeSection::Delete)]
fn any_change_makes_success(#[case] section: ChangeSection) {
    let mut result = ActionResult::new();
    result.append(section, "x");
    result.succeed("done");
    assert_eq!(result.code(), ResultCode::Success);
}

#[test]
fn recorded_error_overrides_finalization() {
    let mut result = ActionResult::new();
    result.create("A");
    result.succeed("done");
    result.push_error(crate::error::DispatchError::invalid_action("nope"));
    assert_eq!(result.code(), ResultCode::Error);
    assert_eq!(result.output(), INTERNAL_ERROR_OUTPUT);
}

// ---------------------------------------------------------------------------
// Output rendering
// ---------------------------------------------------------------------------

#[test]
fn output_lists_non_empty_sections_in_order() {
    let mut result = ActionResult::new();
    result.create(vec!["A"]);
    result.update(["B"]);
    result.delete(Vec::<String>::new());
    result.succeed("done");
    assert_eq!(result.output(), "done\nCreate:\n+ A\nUpdate:\n! B\n");
}

#[test]
fn output_renders_display_objects() {
    let mut result = ActionResult::new();
    result.delete(Change::object(Bucket { name: "logs" }));
    result.delete(vec![
        Change::object(Bucket { name: "tmp" }),
        Change::from("plain"),
    ]);
    result.succeed("removed");
    assert_eq!(
        result.output(),
        "removed\nDelete:\n- bucket logs\n- bucket tmp\n- plain\n"
    );
}

#[test]
fn slices_and_owned_strings_are_accepted() {
    let names = vec!["a".to_owned(), "b".to_owned()];
    let mut result = ActionResult::new();
    result.create(names.as_slice());
    result.create(names.first().expect("first name"));
    result.create(String::from("c"));
    let rendered: Vec<String> = result.creations().iter().map(ToString::to_string).collect();
    assert_eq!(rendered, ["a", "b", "a", "c"]);
}

// ---------------------------------------------------------------------------
// Lock semantics
// ---------------------------------------------------------------------------

#[rstest]
#[case::succeed_then_succeed(true, true)]
#[case::succeed_then_fail(true, false)]
#[case::fail_then_succeed(false, true)]
#[case::fail_then_fail(false, false)]
fn second_finalization_is_a_defect(#[case] first: bool, #[case] second: bool) {
    let mut result = ActionResult::new();
    result.create("A");
    if first {
        result.succeed("first");
    } else {
        result.fail("first");
    }
    if second {
        result.succeed("second");
    } else {
        result.fail("second");
    }

    assert_eq!(result.summary(), Some("first"));
    assert_eq!(result.is_success(), first);
    assert_eq!(result.creations().len(), 1);
    assert_eq!(defects(&result).len(), 1);
    assert_eq!(result.code(), ResultCode::Error);
}

#[rstest]
#[case::create(ChangeSection::Create)]
#[case::update(ChangeSection::Update)]
#[case::delete(ChangeSection::Delete)]
fn mutation_after_lock_is_rejected(#[case] section: ChangeSection) {
    let mut result = ActionResult::new();
    result.succeed("done");
    result.append(section, vec!["late", "later"]);

    assert!(result.is_empty());
    let recorded = defects(&result);
    assert_eq!(recorded.len(), 1);
    assert!(
        recorded
            .first()
            .is_some_and(|e| e.to_string().contains(section.as_str()))
    );
}

#[test]
fn each_rejected_call_records_one_defect() {
    let mut result = ActionResult::new();
    result.fail("stop");
    result.create("a");
    result.update(Vec::<String>::new());
    result.succeed("again");
    assert_eq!(defects(&result).len(), 3);
}

#[test]
fn result_code_serialises_lowercase() {
    let json = serde_json::to_string(&ResultCode::Noop).expect("serialise code");
    assert_eq!(json, "\"noop\"");
}
