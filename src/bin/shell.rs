//! Minimal command-line front end for a node. Each invocation parses its
//! own one-shot command off `std::env::args()` rather than running a REPL
//! loop (manual windows-over-args matching, no clap).

use std::process::ExitCode;
use std::time::Duration;

use fxt_runtime::arena::ArenaSizes;
use fxt_runtime::card::mock::MockRegisterFile;
use fxt_runtime::error::{self, ShellError};
use fxt_runtime::node::Node;
use fxt_runtime::node_factory::{MockCardRegistry, NodeFactory};
use fxt_runtime::point::{LockRequest, PointValue};

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("shell: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), ShellError> {
    match args.get(1).map(String::as_str) {
        Some("errors") => cmd_errors(),
        Some("run") => cmd_run(&args[2..]),
        Some("get") => cmd_get(&args[2..]),
        Some("set") => cmd_set(&args[2..]),
        Some("mock-set") => cmd_mock_set(&args[2..]),
        _ => Err(ShellError::Usage(usage_text())),
    }
}

fn usage_text() -> String {
    "usage:\n  \
     shell errors\n  \
     shell run <node.json> [millis]\n  \
     shell get <node.json> [millis] <point-id> [<point-id>...]\n  \
     shell set <node.json> [millis] <point-id>=<value> [...]\n  \
     shell mock-set <node.json> <chassis-idx> <slot> <channel> <value> [millis]"
        .to_string()
}

/// `errors`: dumps every registered (category, code) pair, the shell
/// surface for the error taxonomy's internal diagnostic dump.
fn cmd_errors() -> Result<(), ShellError> {
    for (category, code) in error::describe_all_categories() {
        println!("{}:{}", category, code);
    }
    Ok(())
}

fn load_node(path: &str, arena_sizes: ArenaSizes) -> Result<(Node, MockCardRegistry), ShellError> {
    let text = std::fs::read_to_string(path).map_err(|source| ShellError::ReadConfig { path: path.into(), source })?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| ShellError::Usage(format!("{} is not valid JSON: {}", path, e)))?;
    NodeFactory::build(&json, arena_sizes).map_err(ShellError::NodeBuild)
}

/// Parses a leading `<millis>` token off `rest`, if present and numeric,
/// returning the remaining tokens and the run duration (default 200ms,
/// long enough for a handful of scheduler ticks at typical FER rates).
fn take_duration(rest: &[String]) -> (Duration, &[String]) {
    match rest.first().and_then(|s| s.parse::<u64>().ok()) {
        Some(ms) => (Duration::from_millis(ms), &rest[1..]),
        None => (Duration::from_millis(200), rest),
    }
}

fn run_for(node: &mut Node, duration: Duration) -> Result<(), ShellError> {
    if !node.start() {
        return Err(ShellError::NodeBuild(node.error_code()));
    }
    std::thread::sleep(duration);
    node.stop();
    for _ in 0..200 {
        if node.is_stopped() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    node.join();
    let err = node.first_chassis_error();
    if !err.is_success() {
        log::warn!("node {} reported: {}", node.id(), err.to_text());
    }
    Ok(())
}

/// `run <node.json> [millis]`: loads, runs every chassis for the given
/// duration, then dumps the whole point database as JSON.
fn cmd_run(rest: &[String]) -> Result<(), ShellError> {
    let path = rest.first().ok_or_else(|| ShellError::Usage(usage_text()))?;
    let (duration, rest) = take_duration(&rest[1..]);
    let _ = rest;
    let (mut node, _registry) = load_node(path, ArenaSizes::default())?;
    run_for(&mut node, duration)?;
    let db = node.point_db().lock().expect("point database mutex poisoned");
    println!("{}", db.to_json(None, true));
    Ok(())
}

/// `get <node.json> [millis] <point-id> [...]`: runs the node briefly,
/// then prints only the requested points.
fn cmd_get(rest: &[String]) -> Result<(), ShellError> {
    let path = rest.first().ok_or_else(|| ShellError::Usage(usage_text()))?;
    let (duration, rest) = take_duration(&rest[1..]);
    let ids = parse_ids(rest)?;
    let (mut node, _registry) = load_node(path, ArenaSizes::default())?;
    run_for(&mut node, duration)?;
    let db = node.point_db().lock().expect("point database mutex poisoned");
    println!("{}", db.to_json(Some(&ids), true));
    Ok(())
}

/// `set <node.json> [millis] <id>=<value> [...]`: loads, starts, applies
/// the given point writes before the node's first tick by locking the
/// database right after `start()`, lets it run for the given duration,
/// then dumps the affected points back out.
fn cmd_set(rest: &[String]) -> Result<(), ShellError> {
    let path = rest.first().ok_or_else(|| ShellError::Usage(usage_text()))?;
    let (duration, rest) = take_duration(&rest[1..]);
    if rest.is_empty() {
        return Err(ShellError::Usage(usage_text()));
    }
    let mut ids = Vec::with_capacity(rest.len());
    let mut points = Vec::with_capacity(rest.len());
    for assignment in rest {
        let (id_str, value_str) = assignment.split_once('=').ok_or_else(|| ShellError::Usage(usage_text()))?;
        let id: u32 = id_str.parse().map_err(|_| ShellError::Usage(format!("not a point id: {}", id_str)))?;
        let value = parse_scalar(value_str);
        ids.push(id);
        points.push(serde_json::json!({ "id": id, "val": value }));
    }

    let (mut node, _registry) = load_node(path, ArenaSizes::default())?;
    if !node.start() {
        return Err(ShellError::NodeBuild(node.error_code()));
    }
    {
        let mut db = node.point_db().lock().expect("point database mutex poisoned");
        db.from_json(&serde_json::json!({ "points": points }), LockRequest::NoRequest).map_err(ShellError::NodeBuild)?;
    }
    std::thread::sleep(duration);
    node.stop();
    node.join();

    let db = node.point_db().lock().expect("point database mutex poisoned");
    println!("{}", db.to_json(Some(&ids), true));
    Ok(())
}

/// `mock-set <node.json> <chassis-idx> <slot> <channel> <value> [millis]`:
/// seeds a mock card's register file before the node starts, so a config
/// exercising `MockCard` can be driven end to end without real hardware.
fn cmd_mock_set(rest: &[String]) -> Result<(), ShellError> {
    if rest.len() < 5 {
        return Err(ShellError::Usage(usage_text()));
    }
    let path = &rest[0];
    let chassis_idx: u32 = rest[1].parse().map_err(|_| ShellError::Usage("chassis-idx must be a number".into()))?;
    let slot: u32 = rest[2].parse().map_err(|_| ShellError::Usage("slot must be a number".into()))?;
    let channel: u32 = rest[3].parse().map_err(|_| ShellError::Usage("channel must be a number".into()))?;
    let value_str = &rest[4];
    let (duration, _) = take_duration(&rest[5..]);

    let (mut node, registry) = load_node(path, ArenaSizes::default())?;
    let registers: &MockRegisterFile = registry
        .get(chassis_idx, slot)
        .ok_or_else(|| ShellError::Usage(format!("no mock card at chassis {} slot {}", chassis_idx, slot)))?;
    registers.set(channel, parse_mock_value(value_str));

    run_for(&mut node, duration)?;
    let db = node.point_db().lock().expect("point database mutex poisoned");
    println!("{}", db.to_json(None, true));
    Ok(())
}

fn parse_ids(rest: &[String]) -> Result<Vec<u32>, ShellError> {
    if rest.is_empty() {
        return Err(ShellError::Usage(usage_text()));
    }
    rest.iter().map(|s| s.parse().map_err(|_| ShellError::Usage(format!("not a point id: {}", s)))).collect()
}

/// Parses a command-line value into whatever JSON shape `Point::from_json`
/// expects: booleans and floats are recognized literally, everything else
/// is passed through as a hex-or-decimal string (the same encoding
/// `Point::to_json` emits for integers).
fn parse_scalar(s: &str) -> serde_json::Value {
    if let Ok(b) = s.parse::<bool>() {
        return serde_json::json!(b);
    }
    if let Ok(f) = s.parse::<f64>() {
        return serde_json::json!(f);
    }
    serde_json::json!(s)
}

/// Mock registers hold `PointValue` directly rather than a JSON document,
/// so CLI input is parsed into the narrower set the mock cards actually
/// exercise: bool, float, or a bare non-negative integer, defaulting to a
/// `U32` for anything else numeric-looking.
fn parse_mock_value(s: &str) -> PointValue {
    if let Ok(b) = s.parse::<bool>() {
        return PointValue::Bool(b);
    }
    if let Ok(u) = s.parse::<u32>() {
        return PointValue::U32(u);
    }
    if let Ok(f) = s.parse::<f32>() {
        return PointValue::F32(f);
    }
    PointValue::Bool(false)
}
