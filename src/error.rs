//! Hierarchical, 4-level error taxonomy.
//!
//! Every error produced by the runtime's own entities (points, cards,
//! components, logic chains, chassis, nodes) is a `FxtError`: a composite of
//! four 8-bit levels, `[L0][L1][L2][L3]`, matching the wire-format layout a
//! C implementation would pack into a `u32`. Level zero names the
//! subsystem, level one a finer-grained area within it, and levels two/three
//! are subsystem-specific leaf codes. A zero value at any level means "no
//! error at this level"; `FxtError::SUCCESS` is all-zero.
//!
//! This is deliberately *not* a `Result<T, Box<dyn Error>>` story: this
//! type needs to be cheaply copyable, comparable, and formattable without
//! allocation in the hot path (card scan/flush, component execute), so
//! entities latch it into a plain field rather than propagating via `?`
//! with a boxed trait object.

use std::fmt;

/// Top-level category (byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Category {
    Success = 0,
    Point = 1,
    Card = 2,
    Component = 3,
    LogicChain = 4,
    Chassis = 5,
    Node = 6,
}

impl Category {
    const ALL: [Category; 7] = [
        Category::Success,
        Category::Point,
        Category::Card,
        Category::Component,
        Category::LogicChain,
        Category::Chassis,
        Category::Node,
    ];

    fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| *c as u8 == code)
    }

    fn name(self) -> &'static str {
        match self {
            Category::Success => "SUCCESS",
            Category::Point => "POINT",
            Category::Card => "CARD",
            Category::Component => "COMPONENT",
            Category::LogicChain => "LOGIC_CHAIN",
            Category::Chassis => "CHASSIS",
            Category::Node => "NODE",
        }
    }
}

/// Leaf code tables, keyed by `(category, level1)`. Populated only with the
/// codes this crate actually raises; an (l0, l1, l2-or-l3) combination not
/// present here renders as `<unknown>` for that level, matching the source's
/// "degrade to `<unknown>` if any level fails to decode" rule.
macro_rules! leaf_table {
    ($name:ident, $cat:expr, $l1:expr, [$($code:expr => $text:expr),* $(,)?]) => {
        fn $name(code: u8) -> Option<&'static str> {
            match code {
                0 => Some("NONE"),
                $($code => Some($text),)*
                _ => None,
            }
        }
    };
}

// ---- Point subsystem -------------------------------------------------------
leaf_table!(point_l1, Category::Point, _, [
    1 => "PARSE",
    2 => "FACTORY",
]);
leaf_table!(point_parse_leaf, Category::Point, 1, [
    1 => "INVALID_JSON",
    2 => "TYPE_MISMATCH",
    3 => "SIZE_MISMATCH",
    4 => "UNKNOWN_TYPE",
    5 => "MISSING_FIELD",
]);
leaf_table!(point_factory_leaf, Category::Point, 2, [
    1 => "UNKNOWN_TYPE_GUID",
    2 => "OUT_OF_MEMORY",
    3 => "DUPLICATE_ID",
]);

// ---- Card subsystem ---------------------------------------------------------
leaf_table!(card_l1, Category::Card, _, [
    1 => "PARSE",
    2 => "DRIVER",
    3 => "RUNTIME",
]);
leaf_table!(card_parse_leaf, Category::Card, 1, [
    1 => "DUPLICATE_CHANNEL",
    2 => "UNKNOWN_TYPE_GUID",
    3 => "MISSING_REQUIRED_FIELD",
    4 => "OUT_OF_MEMORY",
    5 => "DRIVER_INTERVAL_TOO_SMALL",
]);
leaf_table!(card_driver_leaf, Category::Card, 2, [
    1 => "NOT_STARTED",
    2 => "IO_ERROR",
    3 => "TIMEOUT",
]);
leaf_table!(card_runtime_leaf, Category::Card, 3, [
    1 => "SCAN_FAILED",
    2 => "FLUSH_FAILED",
]);

// ---- Component subsystem -----------------------------------------------------
leaf_table!(component_l1, Category::Component, _, [
    1 => "PARSE",
    2 => "RESOLVE",
    3 => "EXECUTE",
]);
leaf_table!(component_parse_leaf, Category::Component, 1, [
    1 => "INCORRECT_NUM_INPUT_REFS",
    2 => "INCORRECT_NUM_OUTPUT_REFS",
    3 => "MISSING_REQUIRED_FIELD",
    4 => "OUT_OF_MEMORY",
    5 => "UNKNOWN_TYPE_GUID",
]);
leaf_table!(component_resolve_leaf, Category::Component, 2, [
    1 => "UNRESOLVED_INPUT_REF",
    2 => "UNRESOLVED_OUTPUT_REF",
    3 => "INPUT_REF_BAD_TYPE",
    4 => "OUTPUT_REF_BAD_TYPE",
    5 => "ARITY_MISMATCH",
]);
leaf_table!(component_execute_leaf, Category::Component, 3, [
    1 => "INTERNAL",
]);

// ---- Logic chain subsystem ----------------------------------------------------
leaf_table!(logic_chain_l1, Category::LogicChain, _, [
    1 => "BUILD",
    2 => "EXECUTE",
]);
leaf_table!(logic_chain_build_leaf, Category::LogicChain, 1, [
    1 => "COMPONENT_BUILD_FAILED",
]);
leaf_table!(logic_chain_execute_leaf, Category::LogicChain, 2, [
    1 => "COMPONENT_EXECUTE_FAILED",
    2 => "SETTER_APPLY_FAILED",
]);

// ---- Chassis subsystem ---------------------------------------------------------
leaf_table!(chassis_l1, Category::Chassis, _, [
    1 => "SCHEDULE",
    2 => "RUNTIME",
]);
leaf_table!(chassis_schedule_leaf, Category::Chassis, 1, [
    1 => "DEADLINE_MISSED",
]);
leaf_table!(chassis_runtime_leaf, Category::Chassis, 2, [
    1 => "SCANNER_FAILED",
    2 => "EXECUTION_SET_FAILED",
]);

// ---- Node subsystem -------------------------------------------------------------
leaf_table!(node_l1, Category::Node, _, [
    1 => "BUILD",
    2 => "LIFECYCLE",
]);
leaf_table!(node_build_leaf, Category::Node, 1, [
    1 => "NOT_ME",
    2 => "MAX_CHASSIS_EXCEEDED",
    3 => "OUT_OF_MEMORY",
    4 => "CHILD_BUILD_FAILED",
]);
leaf_table!(node_lifecycle_leaf, Category::Node, 2, [
    1 => "ALREADY_STARTED",
]);

fn l1_table(cat: Category) -> fn(u8) -> Option<&'static str> {
    match cat {
        Category::Success => |c| if c == 0 { Some("NONE") } else { None },
        Category::Point => point_l1,
        Category::Card => card_l1,
        Category::Component => component_l1,
        Category::LogicChain => logic_chain_l1,
        Category::Chassis => chassis_l1,
        Category::Node => node_l1,
    }
}

fn leaf_table_for(cat: Category, l1: u8) -> Option<fn(u8) -> Option<&'static str>> {
    match (cat, l1) {
        (Category::Point, 1) => Some(point_parse_leaf),
        (Category::Point, 2) => Some(point_factory_leaf),
        (Category::Card, 1) => Some(card_parse_leaf),
        (Category::Card, 2) => Some(card_driver_leaf),
        (Category::Card, 3) => Some(card_runtime_leaf),
        (Category::Component, 1) => Some(component_parse_leaf),
        (Category::Component, 2) => Some(component_resolve_leaf),
        (Category::Component, 3) => Some(component_execute_leaf),
        (Category::LogicChain, 1) => Some(logic_chain_build_leaf),
        (Category::LogicChain, 2) => Some(logic_chain_execute_leaf),
        (Category::Chassis, 1) => Some(chassis_schedule_leaf),
        (Category::Chassis, 2) => Some(chassis_runtime_leaf),
        (Category::Node, 1) => Some(node_build_leaf),
        (Category::Node, 2) => Some(node_lifecycle_leaf),
        _ => None,
    }
}

/// A full, 4-level composite error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FxtError {
    pub l0: u8,
    pub l1: u8,
    pub l2: u8,
    pub l3: u8,
}

impl FxtError {
    pub const SUCCESS: FxtError = FxtError { l0: 0, l1: 0, l2: 0, l3: 0 };

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn category(self) -> Option<Category> {
        Category::from_code(self.l0)
    }

    fn build(cat: Category, l1: u8, l2: u8, l3: u8) -> Self {
        FxtError { l0: cat as u8, l1, l2, l3 }
    }

    pub fn point(l1: u8, l2: u8) -> Self {
        Self::build(Category::Point, l1, l2, 0)
    }
    pub fn card(l1: u8, l2: u8) -> Self {
        Self::build(Category::Card, l1, l2, 0)
    }
    pub fn component(l1: u8, l2: u8) -> Self {
        Self::build(Category::Component, l1, l2, 0)
    }
    pub fn logic_chain(l1: u8, l2: u8) -> Self {
        Self::build(Category::LogicChain, l1, l2, 0)
    }
    pub fn chassis(l1: u8, l2: u8) -> Self {
        Self::build(Category::Chassis, l1, l2, 0)
    }
    pub fn node(l1: u8, l2: u8) -> Self {
        Self::build(Category::Node, l1, l2, 0)
    }

    /// Format as `"L0:L1:L2:L3"`, degrading to `"<unknown>"` if any level
    /// fails to decode against the category registry.
    pub fn to_text(self) -> String {
        if self.is_success() {
            return "SUCCESS".to_string();
        }
        let cat = match self.category() {
            Some(c) => c,
            None => return Category::UNKNOWN_TEXT.to_string(),
        };
        let l1_name = match l1_table(cat)(self.l1) {
            Some(n) => n,
            None => return Category::UNKNOWN_TEXT.to_string(),
        };
        if self.l1 == 0 {
            return format!("{}:{}", cat.name(), l1_name);
        }
        let leaf = match leaf_table_for(cat, self.l1) {
            Some(t) => t,
            None => return Category::UNKNOWN_TEXT.to_string(),
        };
        let l2_name = match leaf(self.l2) {
            Some(n) => n,
            None => return Category::UNKNOWN_TEXT.to_string(),
        };
        if self.l3 == 0 {
            format!("{}:{}:{}", cat.name(), l1_name, l2_name)
        } else {
            let l3_name = leaf(self.l3).unwrap_or(Category::UNKNOWN_TEXT);
            format!("{}:{}:{}:{}", cat.name(), l1_name, l2_name, l3_name)
        }
    }
}

impl Category {
    const UNKNOWN_TEXT: &'static str = "<unknown>";
}

impl fmt::Display for FxtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl std::error::Error for FxtError {}

/// All registered (category, leaf) name pairs, excluding SUCCESS. Used by
/// the shell's `errors` command for operator documentation, equivalent to
/// the original's `Error::printAllErrorCodes`.
pub fn describe_all_categories() -> Vec<(&'static str, &'static str)> {
    let mut out = Vec::new();
    for cat in [
        Category::Point,
        Category::Card,
        Category::Component,
        Category::LogicChain,
        Category::Chassis,
        Category::Node,
    ] {
        let l1 = l1_table(cat);
        for code in 1..=8u8 {
            if let Some(name) = l1(code) {
                out.push((cat.name(), name));
            }
        }
    }
    out
}

/// Leaf errors outside the domain taxonomy: CLI/arg parsing, thread spawn,
/// I/O at the edges of the process. Never latched into an entity's error
/// cell; these terminate a shell invocation or abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("usage error: {0}")]
    Usage(String),
    #[error("failed to read node configuration file {path}: {source}")]
    ReadConfig {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(std::io::Error),
    #[error("node build failed: {0}")]
    NodeBuild(FxtError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_all_zero() {
        assert!(FxtError::SUCCESS.is_success());
        assert_eq!(FxtError::SUCCESS.to_text(), "SUCCESS");
    }

    #[test]
    fn known_card_driver_error_formats() {
        let e = FxtError::card(2, 2); // CARD:DRIVER:IO_ERROR
        assert_eq!(e.to_text(), "CARD:DRIVER:IO_ERROR");
    }

    #[test]
    fn unknown_category_degrades() {
        let e = FxtError { l0: 200, l1: 1, l2: 1, l3: 0 };
        assert_eq!(e.to_text(), "<unknown>");
    }

    #[test]
    fn unknown_leaf_within_known_l1_degrades() {
        let e = FxtError::card(2, 250); // valid l0/l1, bogus leaf
        assert_eq!(e.to_text(), "<unknown>");
    }

    #[test]
    fn describe_all_categories_nonempty() {
        assert!(!describe_all_categories().is_empty());
    }
}
