
use std::sync::Arc;

use harness::{
    bytes32_array, run_cli, spawn_mock_node, stderr, stdout, uint_word, write_config, MockNode,
    DEPOSIT_EVENT, WITHDRAWAL_EVENT,
};
use serde_json::Value;
use tempfile::TempDir;

const TREES: &str = "0x00000000000000000000000000000000000000aa";
const INSTANCE_A: &str = "0x00000000000000000000000000000000000000a1";
const INSTANCE_B: &str = "0x00000000000000000000000000000000000000b2";

const FROM_BLOCK: u64 = 100;
const HEAD: u64 = 5000;
const T0: u64 = 1_610_000_000;
const DAY: u64 = 86_400;

/// Ten days of history: 1000 deposits and 50 withdrawals over two instances,
/// 500 + 50 deposits and 200 + 3 withdrawals already known to the trees contract.
fn busy_node() -> MockNode {
    let mut node = MockNode {
        head: HEAD,
        log_base: FROM_BLOCK,
        ..MockNode::default()
    }
    .with_logs(INSTANCE_A, DEPOSIT_EVENT, 600)
    .with_logs(INSTANCE_B, DEPOSIT_EVENT, 400)
    .with_logs(INSTANCE_A, WITHDRAWAL_EVENT, 30)
    .with_logs(INSTANCE_B, WITHDRAWAL_EVENT, 20)
    .with_call("lastProcessedDepositLeaf()", uint_word(500))
    .with_call("lastProcessedWithdrawalLeaf()", uint_word(200))
    .with_call("getRegisteredDeposits()", bytes32_array(50))
    .with_call("getRegisteredWithdrawals()", bytes32_array(3));
    node.blocks.insert(FROM_BLOCK, T0);
    node.blocks.insert(HEAD, T0 + 10 * DAY);
    node
}

fn config_body(url: &str, instances: &[&str]) -> String {
    let list = instances
        .iter()
        .map(|a| format!("\"{}\"", a))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "[rpc]\nurl = \"{url}\"\n\n[forecast]\ntrees_address = \"{TREES}\"\ninstances = [{list}]\nfrom_block = {FROM_BLOCK}\n"
    )
}

async fn setup(node: MockNode, instances: &[&str]) -> (TempDir, String, Arc<MockNode>) {
    let node = Arc::new(node);
    let url = spawn_mock_node(node.clone()).await;
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &config_body(&url, instances));
    (dir, path, node)
}

fn json_out(out: &std::process::Output) -> Value {
    serde_json::from_str(&stdout(out)).expect("stdout is one JSON document")
}

#[tokio::test]
async fn forecast_worked_example_as_json() {
    let (_dir, config, _node) = setup(busy_node(), &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(&["--config", &config, "--json", "search-params"], &[]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let v = json_out(&out);
    assert_eq!(v["deposits"]["total"], 1000);
    assert_eq!(v["deposits"]["perInstanceCounts"], serde_json::json!([600, 400]));
    assert_eq!(v["withdrawals"]["total"], 50);
    assert_eq!(v["window"]["spanDays"], 10.0);
    assert_eq!(v["result"]["depositsFrom"], 1050);
    assert_eq!(v["result"]["depositsStep"], 20);
    assert_eq!(v["result"]["withdrawalsFrom"], 228);
    assert_eq!(v["result"]["withdrawalsStep"], 1);
}

#[tokio::test]
async fn forecast_console_report() {
    let (_dir, config, _node) = setup(busy_node(), &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(&["--config", &config, "search-params"], &[]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.starts_with(
        "Found 1000 deposits from 2021-01-07T06:13:20.000Z in 10 days\n\
         Found 50 withdrawals from 2021-01-07T06:13:20.000Z in 10 days\n"
    ));
    assert!(text.contains("  depositsFrom: 1050,\n  depositsStep: 20,\n"));
    assert!(text.ends_with("  withdrawalsFrom: 228,\n  withdrawalsStep: 1\n}\n"));
}

#[tokio::test]
async fn legacy_task_name_runs_the_forecast() {
    let (_dir, config, _node) = setup(busy_node(), &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(&["--config", &config, "--json", "searchParams"], &[]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(json_out(&out)["result"]["depositsFrom"], 1050);
}

#[tokio::test]
async fn chunked_log_queries_give_the_same_counts() {
    let (_dir, config, node) = setup(busy_node(), &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(
        &["--config", &config, "--json", "search-params", "--log-chunk-size", "250"],
        &[],
    )
    .await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let v = json_out(&out);
    assert_eq!(v["deposits"]["total"], 1000);
    assert_eq!(v["withdrawals"]["total"], 50);

    let requests = node.requests.lock().unwrap();
    let count = |method: &str| requests.iter().filter(|r| r["method"] == method).count();
    // blocks 100..=5000 in windows of 250 is 20 windows, for 2 instances x 2 events
    assert_eq!(count("eth_getLogs"), 20 * 4);
    // the head comes from the window lookup, never from a per-filter eth_blockNumber
    assert_eq!(count("eth_blockNumber"), 0);
    let last = requests
        .iter()
        .filter(|r| r["method"] == "eth_getLogs")
        .last()
        .unwrap();
    assert_eq!(last["params"][0]["toBlock"], format!("0x{:x}", HEAD));
}

#[tokio::test]
async fn unchunked_log_queries_end_at_the_resolved_head() {
    let (_dir, config, node) = setup(busy_node(), &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(&["--config", &config, "--json", "search-params"], &[]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let requests = node.requests.lock().unwrap();
    let log_queries: Vec<&Value> = requests
        .iter()
        .filter(|r| r["method"] == "eth_getLogs")
        .collect();
    assert_eq!(log_queries.len(), 4);
    for q in log_queries {
        assert_eq!(q["params"][0]["fromBlock"], format!("0x{:x}", FROM_BLOCK));
        assert_eq!(q["params"][0]["toBlock"], format!("0x{:x}", HEAD));
    }
}

#[tokio::test]
async fn malformed_env_override_fails_the_forecast() {
    let (_dir, config, _node) = setup(busy_node(), &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(
        &["--config", &config, "search-params"],
        &[("TREE_OPS_FROM_BLOCK", "soon")],
    )
    .await;
    assert!(!out.status.success());
    assert!(stdout(&out).is_empty());
    assert!(stderr(&out).contains("TREE_OPS_FROM_BLOCK"), "stderr: {}", stderr(&out));
}

#[tokio::test]
async fn flags_and_env_override_policy_knobs() {
    let (_dir, config, _node) = setup(busy_node(), &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(
        &["--config", &config, "--json", "search-params", "--step-divisor", "4"],
        &[("TREE_OPS_PROPOSAL_DAYS", "2")],
    )
    .await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let v = json_out(&out);
    // 550 + 100 * 2, 203 + 5 * 2
    assert_eq!(v["result"]["depositsFrom"], 750);
    assert_eq!(v["result"]["withdrawalsFrom"], 213);
    // 100 / 4 and round(5 / 4)
    assert_eq!(v["result"]["depositsStep"], 25);
    assert_eq!(v["result"]["withdrawalsStep"], 1);
    assert_eq!(v["proposalDays"], 2);
    assert_eq!(v["stepDivisor"], 4);
}

#[tokio::test]
async fn no_instances_forecasts_the_current_snapshot() {
    let (_dir, config, _node) = setup(busy_node(), &[]).await;

    let out = run_cli(&["--config", &config, "--json", "search-params"], &[]).await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let v = json_out(&out);
    assert_eq!(v["deposits"]["total"], 0);
    assert_eq!(v["result"]["depositsFrom"], 550);
    assert_eq!(v["result"]["depositsStep"], 0);
    assert_eq!(v["result"]["withdrawalsFrom"], 203);
    assert_eq!(v["result"]["withdrawalsStep"], 0);

    let err = stderr(&out);
    let warnings: Vec<&str> = err.lines().filter(|l| l.contains("WARN")).collect();
    assert_eq!(warnings.len(), 1, "stderr: {}", err);
    assert!(warnings[0].contains("no instances configured"), "stderr: {}", err);
}

#[tokio::test]
async fn empty_window_is_rejected_before_counting() {
    let mut node = busy_node();
    // history starts at the head: zero-length window
    node.head = FROM_BLOCK;
    let (_dir, config, node) = setup(node, &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(&["--config", &config, "search-params"], &[]).await;
    assert!(!out.status.success());
    assert!(stdout(&out).is_empty());
    assert!(
        stderr(&out).contains("observation window is empty"),
        "stderr: {}",
        stderr(&out)
    );
    assert!(!node
        .requests
        .lock()
        .unwrap()
        .iter()
        .any(|r| r["method"] == "eth_getLogs"));
}

#[tokio::test]
async fn failed_log_read_names_the_query() {
    let mut node = busy_node();
    node.failing_methods = vec!["eth_getLogs".to_string()];
    let (_dir, config, _node) = setup(node, &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(&["--config", &config, "search-params"], &[]).await;
    assert!(!out.status.success());
    assert!(stdout(&out).is_empty());
    let err = stderr(&out);
    assert!(err.contains("data source error: eth_getLogs("), "stderr: {}", err);
    assert!(err.contains("eth_getLogs unavailable"), "stderr: {}", err);
}

#[tokio::test]
async fn reverted_counter_call_names_the_read() {
    let mut node = busy_node();
    node.calls.remove(&harness::selector_hex("getRegisteredWithdrawals()"));
    let (_dir, config, _node) = setup(node, &[INSTANCE_A, INSTANCE_B]).await;

    let out = run_cli(&["--config", &config, "search-params"], &[]).await;
    assert!(!out.status.success());
    assert!(stdout(&out).is_empty());
    let err = stderr(&out);
    assert!(err.contains("getRegisteredWithdrawals() failed"), "stderr: {}", err);
    assert!(err.contains("execution reverted"), "stderr: {}", err);
}

#[tokio::test]
async fn missing_endpoint_is_a_configuration_error() {
    let out = run_cli(&["search-params"], &[]).await;
    assert!(!out.status.success());
    assert!(stdout(&out).is_empty());
    assert!(
        stderr(&out).contains("no RPC endpoint configured"),
        "stderr: {}",
        stderr(&out)
    );
}

#[tokio::test]
async fn rpc_url_flag_beats_the_config_file() {
    let node = Arc::new(busy_node());
    let url = spawn_mock_node(node.clone()).await;
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        &config_body("http://127.0.0.1:9/", &[INSTANCE_A, INSTANCE_B]),
    );

    let out = run_cli(
        &["--config", &config, "--json", "search-params", "--rpc-url", &url],
        &[],
    )
    .await;
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(json_out(&out)["result"]["withdrawalsFrom"], 228);
}
