//! End-to-end waiver application on JSON result documents.

mod common;

use common::{TestHarness, policy};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use waivers::{ApplyOptions, ApplyOutcome, ApplyReport, WaiverLevel, apply_waivers};

fn run(harness: &TestHarness, suite: &str, result: &Value, waiver: &Value) -> ApplyOutcome {
    let result_path = harness.create_json("results.json", result);
    let waiver_path = harness.create_json("waiver.json", waiver);
    let options = ApplyOptions::new(suite, result_path)
        .expect("options")
        .with_waiver_file(waiver_path);
    apply_waivers(&options).expect("apply")
}

fn applied(outcome: ApplyOutcome) -> ApplyReport {
    match outcome {
        ApplyOutcome::Applied(report) => report,
        ApplyOutcome::NoWaivers => panic!("expected waivers to apply"),
    }
}

fn sct_results() -> Value {
    json!({
        "test_results": [
            {
                "Test_suite": "RuntimeServicesTest",
                "Sub_test_suite": "VariableServicesTest",
                "Test_case": "GetVariable_Func",
                "Test_case_description": "GetVariable functionality",
                "subtests": [
                    {
                        "sub_Test_Number": "1",
                        "sub_Test_Description": "GetVariable_Func",
                        "sub_Test_GUID": "5D1DB9B6-1E4C-4A7B-AE2A-36F19A3A2E86",
                        "sub_test_result": "FAILED",
                        "sub_Test_Path": "GetVariableFunction.c:120"
                    },
                    {
                        "sub_Test_Number": "2",
                        "sub_Test_Description": "GetVariable with valid name",
                        "sub_test_result": "PASSED"
                    }
                ],
                "test_case_summary": {
                    "total_passed": 1,
                    "total_failed": 1,
                    "total_failed_with_waiver": 0,
                    "total_aborted": 0,
                    "total_skipped": 0,
                    "total_warnings": 0
                }
            }
        ],
        "suite_summary": {
            "total_passed": 1,
            "total_failed": 1,
            "total_failed_with_waiver": 0,
            "total_aborted": 0,
            "total_skipped": 0,
            "total_warnings": 0
        }
    })
}

#[test]
fn test_case_waiver_end_to_end() {
    let harness = TestHarness::new("test_case_waiver_end_to_end");
    let waiver = policy(
        "SCT",
        json!({ "TestSuites": [{
            "TestSuite": "RuntimeServicesTest",
            "TestCase": { "Test_case": "GetVariable_Func", "Reason": "known platform issue" }
        }]}),
    );

    let report = applied(run(&harness, "SCT", &sct_results(), &waiver));
    assert_eq!(report.waived_by_level.get(&WaiverLevel::TestCase), Some(&1));

    let out = harness.read_json("results.json");
    let entity = &out["test_results"][0];
    assert_eq!(
        entity["subtests"][0],
        json!({
            "sub_Test_Number": "1",
            "sub_Test_Description": "GetVariable_Func",
            "sub_Test_GUID": "5D1DB9B6-1E4C-4A7B-AE2A-36F19A3A2E86",
            "sub_test_result": "FAILED (WITH WAIVER)",
            "sub_Test_Path": "GetVariableFunction.c:120",
            "waiver_reason": "known platform issue"
        })
    );
    assert_eq!(
        entity["subtests"][1],
        json!({
            "sub_Test_Number": "2",
            "sub_Test_Description": "GetVariable with valid name",
            "sub_test_result": "PASSED"
        })
    );
    assert_eq!(entity["test_case_summary"]["total_failed"], 1);
    assert_eq!(entity["test_case_summary"]["total_failed_with_waiver"], 1);
    assert_eq!(entity["test_case_summary"]["total_passed"], 1);
    assert_eq!(out["suite_summary"]["total_failed_with_waiver"], 1);
    assert_eq!(entity["Test_case_description"], "GetVariable functionality");
}

#[test]
fn unmatched_scalar_failure_stays_exactly_failed() {
    let harness = TestHarness::new("unmatched_scalar_failure_stays_exactly_failed");
    let waiver = policy(
        "SCT",
        json!({ "TestSuites": [{ "TestSuite": "BootServicesTest", "Reason": "other entity" }]}),
    );

    let report = applied(run(&harness, "SCT", &sct_results(), &waiver));
    assert_eq!(report.waived_total(), 0);

    let subtest = &harness.read_json("results.json")["test_results"][0]["subtests"][0];
    assert_eq!(subtest["sub_test_result"], "FAILED");
    assert!(subtest.get("waiver_reason").is_none());
}

#[test]
fn second_run_is_a_no_op() {
    let harness = TestHarness::new("second_run_is_a_no_op");
    let waiver = policy("SCT", json!({ "Reason": "suite under bring-up" }));

    applied(run(&harness, "SCT", &sct_results(), &waiver));
    let first = harness.read_file("results.json");

    let options = ApplyOptions::new("SCT", harness.temp_path("results.json"))
        .expect("options")
        .with_waiver_file(harness.temp_path("waiver.json"));
    let report = applied(apply_waivers(&options).expect("second apply"));
    assert_eq!(report.waived_total(), 0);
    assert_eq!(harness.read_file("results.json"), first);
}

#[test]
fn counted_leaves_shift_one_failure_per_leaf() {
    let harness = TestHarness::new("counted_leaves_shift_one_failure_per_leaf");
    let results = json!({
        "test_results": [{
            "Test_suite": "Network",
            "subtests": [{
                "sub_Test_Number": "7",
                "sub_Test_Description": "Link not detected on eth0",
                "sub_test_result": {
                    "PASSED": 0, "FAILED": 2, "FAILED_WITH_WAIVER": 0,
                    "ABORTED": 0, "SKIPPED": 0, "WARNINGS": 0,
                    "pass_reasons": [], "fail_reasons": ["no link", "no dhcp"],
                    "abort_reasons": [], "skip_reasons": [], "warning_reasons": []
                }
            }],
            "test_suite_summary": {
                "total_passed": 0, "total_failed": 2, "total_failed_with_waiver": 0,
                "total_aborted": 0, "total_skipped": 0, "total_warnings": 0
            }
        }]
    });
    let waiver = policy(
        "STANDALONE",
        json!({ "TestSuites": [{
            "TestSuite": "Network",
            "TestCase": { "SubTests": [
                { "sub_Test_Description": "link not detected", "Reason": "no cable in lab" }
            ]}
        }]}),
    );

    let report = applied(run(&harness, "STANDALONE", &results, &waiver));
    assert_eq!(report.waived_by_level.get(&WaiverLevel::SubTest), Some(&1));

    let out = harness.read_json("results.json");
    let result = &out["test_results"][0]["subtests"][0]["sub_test_result"];
    assert_eq!(result["FAILED"], 1);
    assert_eq!(result["FAILED_WITH_WAIVER"], 1);
    assert_eq!(
        result["fail_reasons"],
        json!(["no link (WITH WAIVER)", "no dhcp (WITH WAIVER)"])
    );
    assert_eq!(result["waiver_reason"], "no cable in lab");

    let summary = &out["test_results"][0]["test_suite_summary"];
    assert_eq!(summary["total_failed"], 2);
    assert_eq!(summary["total_failed_with_waiver"], 1);
}

#[test]
fn bsa_list_with_trailing_suite_summary() {
    let harness = TestHarness::new("bsa_list_with_trailing_suite_summary");
    let results = json!([
        {
            "Test_suite": "PE",
            "subtests": [
                { "sub_Test_Number": "1", "sub_Test_Description": "Check PE", "sub_test_result": "FAILED" },
                { "sub_Test_Number": "2", "sub_Test_Description": "Check PE 2", "sub_test_result": "PASSED" }
            ],
            "test_suite_summary": { "total_PASSED": 1, "total_FAILED": 1, "total_FAILED_WITH_WAIVER": 0 }
        },
        {
            "Test_suite": "GIC",
            "subtests": [
                { "sub_Test_Number": "30", "sub_Test_Description": "Check GIC", "sub_test_result": "FAILED" }
            ],
            "test_suite_summary": { "total_PASSED": 0, "total_FAILED": 1, "total_FAILED_WITH_WAIVER": 0 }
        },
        { "Suite_summary": { "total_PASSED": 1, "total_FAILED": 2, "total_FAILED_WITH_WAIVER": 0 } }
    ]);
    let waiver = policy(
        "BSA",
        json!({ "TestSuites": [{
            "TestSuite": "GIC",
            "TestCase": { "SubTests": [{ "SubTestID": 30, "Reason": "GIC errata" }] }
        }]}),
    );

    applied(run(&harness, "BSA", &results, &waiver));
    let out = harness.read_json("results.json");

    assert_eq!(out[0]["subtests"][0]["sub_test_result"], "FAILED");
    assert_eq!(out[1]["subtests"][0]["sub_test_result"], "FAILED (WITH WAIVER)");
    assert_eq!(out[1]["test_suite_summary"]["total_FAILED_WITH_WAIVER"], 1);
    assert_eq!(out[2]["Suite_summary"]["total_FAILED"], 2);
    assert_eq!(out[2]["Suite_summary"]["total_FAILED_WITH_WAIVER"], 1);
    assert_eq!(out[2]["Suite_summary"]["total_PASSED"], 1);
}

#[test]
fn category_document_gates_test_suites() {
    let harness = TestHarness::new("category_document_gates_test_suites");
    let results = json!([
        { "Test_suite": "PE", "subtests": [{ "sub_Test_Description": "a", "sub_test_result": "FAILED" }] },
        { "Test_suite": "GIC", "subtests": [{ "sub_Test_Description": "b", "sub_test_result": "FAILED" }] }
    ]);
    let result_path = harness.create_json("bsa.json", &results);
    let waiver_path = harness.create_json("waiver.json", &policy("BSA", json!({ "Reason": "all" })));
    let categories = harness.create_json(
        "test_category.json",
        &json!({ "1": { "101": { "SName: BSA": [
            { "TSName": "PE", "Waivable": "yes" },
            { "TSName": "GIC", "Waivable": "no" }
        ]}}}),
    );

    let options = ApplyOptions::new("BSA", result_path)
        .expect("options")
        .with_waiver_file(waiver_path)
        .with_test_category_file(categories);
    let report = applied(apply_waivers(&options).expect("apply"));
    assert_eq!(report.entities_skipped, 1);

    let out = harness.read_json("bsa.json");
    assert_eq!(out[0]["subtests"][0]["sub_test_result"], "FAILED (WITH WAIVER)");
    assert_eq!(out[1]["subtests"][0]["sub_test_result"], "FAILED");
}

#[test]
fn broken_category_file_means_no_gating() {
    let harness = TestHarness::new("broken_category_file_means_no_gating");
    let result_path = harness.create_json(
        "bsa.json",
        &json!([{ "Test_suite": "GIC", "subtests": [{ "sub_Test_Description": "b", "sub_test_result": "FAILED" }] }]),
    );
    let waiver_path = harness.create_json("waiver.json", &policy("BSA", json!({ "Reason": "all" })));
    let categories = harness.create_file("test_category.json", "not json");

    let options = ApplyOptions::new("BSA", result_path)
        .expect("options")
        .with_waiver_file(waiver_path)
        .with_test_category_file(categories);
    let report = applied(apply_waivers(&options).expect("apply"));
    assert_eq!(report.waived_total(), 1);
}

#[test]
fn output_uses_four_space_indentation() {
    let harness = TestHarness::new("output_uses_four_space_indentation");
    let waiver = policy("SCT", json!({ "Reason": "r" }));
    applied(run(&harness, "SCT", &sct_results(), &waiver));
    let text = harness.read_file("results.json");
    assert!(text.starts_with("{\n    \"test_results\": [\n        {"));
}
