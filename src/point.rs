//! Typed, validity-bearing data cells — the atomic unit the rest of the
//! runtime is built from.
//!
//! A `Point` is a small state machine over `(value, valid, locked)` plus an
//! optional [`Setter`](crate::setter::Setter). All mutation goes through
//! `write`/`set_invalid`, which apply the lock truth table below before
//! touching anything.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::FxtError;
use crate::guid;

/// Requested transition of a point's `locked` flag, carried alongside every
/// write/invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockRequest {
    #[default]
    NoRequest,
    Lock,
    Unlock,
}

/// The typed payload a point carries: bool, signed/unsigned 8/16/32/64-bit
/// integers, 32/64-bit floats, or a bounded string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PointValue {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str { max_len: usize, text: String },
}

impl PointValue {
    pub fn type_guid(&self) -> &'static str {
        match self {
            PointValue::Bool(_) => guid::point::BOOL,
            PointValue::I8(_) => guid::point::I8,
            PointValue::U8(_) => guid::point::U8,
            PointValue::I16(_) => guid::point::I16,
            PointValue::U16(_) => guid::point::U16,
            PointValue::I32(_) => guid::point::I32,
            PointValue::U32(_) => guid::point::U32,
            PointValue::I64(_) => guid::point::I64,
            PointValue::U64(_) => guid::point::U64,
            PointValue::F32(_) => guid::point::F32,
            PointValue::F64(_) => guid::point::F64,
            PointValue::Str { .. } => guid::point::STRING,
        }
    }

    /// Size in bytes of the concrete stateful payload — used purely for
    /// arena budget accounting (see `arena.rs`), not for any wire layout.
    pub fn stateful_size(&self) -> usize {
        match self {
            PointValue::Bool(_) => 1,
            PointValue::I8(_) | PointValue::U8(_) => 1,
            PointValue::I16(_) | PointValue::U16(_) => 2,
            PointValue::I32(_) | PointValue::U32(_) | PointValue::F32(_) => 4,
            PointValue::I64(_) | PointValue::U64(_) | PointValue::F64(_) => 8,
            PointValue::Str { max_len, .. } => *max_len,
        }
    }

    pub fn zero_of_type(type_guid: &str, max_len: usize) -> Option<PointValue> {
        Some(match type_guid {
            g if g == guid::point::BOOL => PointValue::Bool(false),
            g if g == guid::point::I8 => PointValue::I8(0),
            g if g == guid::point::U8 => PointValue::U8(0),
            g if g == guid::point::I16 => PointValue::I16(0),
            g if g == guid::point::U16 => PointValue::U16(0),
            g if g == guid::point::I32 => PointValue::I32(0),
            g if g == guid::point::U32 => PointValue::U32(0),
            g if g == guid::point::I64 => PointValue::I64(0),
            g if g == guid::point::U64 => PointValue::U64(0),
            g if g == guid::point::F32 => PointValue::F32(0.0),
            g if g == guid::point::F64 => PointValue::F64(0.0),
            g if g == guid::point::STRING => PointValue::Str { max_len, text: String::new() },
            _ => return None,
        })
    }

    /// Numeric attributes for types that support increment/decrement and
    /// bitwise ops: a small width/signedness lookup so components like the
    /// On/Off controller can validate "is this numeric" without a long
    /// match arm of their own.
    /// Bit width of an integer type GUID, independent of any concrete
    /// instance — used by the N-bit mux/demux components to validate
    /// `inputs.len() <= width` before a point even exists.
    pub fn integer_bit_width(type_guid: &str) -> Option<u32> {
        Some(match type_guid {
            g if g == guid::point::I8 || g == guid::point::U8 => 8,
            g if g == guid::point::I16 || g == guid::point::U16 => 16,
            g if g == guid::point::I32 || g == guid::point::U32 => 32,
            g if g == guid::point::I64 || g == guid::point::U64 => 64,
            _ => return None,
        })
    }

    pub fn numeric_attrs(&self) -> Option<NumericAttrs> {
        use NumericAttrs::*;
        Some(match self {
            PointValue::I8(_) => Integer { bits: 8, signed: true },
            PointValue::U8(_) => Integer { bits: 8, signed: false },
            PointValue::I16(_) => Integer { bits: 16, signed: true },
            PointValue::U16(_) => Integer { bits: 16, signed: false },
            PointValue::I32(_) => Integer { bits: 32, signed: true },
            PointValue::U32(_) => Integer { bits: 32, signed: false },
            PointValue::I64(_) => Integer { bits: 64, signed: true },
            PointValue::U64(_) => Integer { bits: 64, signed: false },
            PointValue::F32(_) => Float { bits: 32 },
            PointValue::F64(_) => Float { bits: 64 },
            PointValue::Bool(_) | PointValue::Str { .. } => return None,
        })
    }

    /// Numeric value as `f64`, for components (e.g. the On/Off
    /// controller) that compare across differently-typed numeric points
    /// without caring about bit width.
    pub fn as_f64_numeric(&self) -> Option<f64> {
        Some(match *self {
            PointValue::I8(v) => v as f64,
            PointValue::U8(v) => v as f64,
            PointValue::I16(v) => v as f64,
            PointValue::U16(v) => v as f64,
            PointValue::I32(v) => v as f64,
            PointValue::U32(v) => v as f64,
            PointValue::I64(v) => v as f64,
            PointValue::U64(v) => v as f64,
            PointValue::F32(v) => v as f64,
            PointValue::F64(v) => v,
            PointValue::Bool(_) | PointValue::Str { .. } => return None,
        })
    }

    pub(crate) fn as_u64_bits(&self) -> Option<u64> {
        Some(match *self {
            PointValue::I8(v) => v as u8 as u64,
            PointValue::U8(v) => v as u64,
            PointValue::I16(v) => v as u16 as u64,
            PointValue::U16(v) => v as u64,
            PointValue::I32(v) => v as u32 as u64,
            PointValue::U32(v) => v as u64,
            PointValue::I64(v) => v as u64,
            PointValue::U64(v) => v,
            _ => return None,
        })
    }

    pub(crate) fn from_u64_bits(&self, bits: u64) -> PointValue {
        match self {
            PointValue::I8(_) => PointValue::I8(bits as u8 as i8),
            PointValue::U8(_) => PointValue::U8(bits as u8),
            PointValue::I16(_) => PointValue::I16(bits as u16 as i16),
            PointValue::U16(_) => PointValue::U16(bits as u16),
            PointValue::I32(_) => PointValue::I32(bits as u32 as i32),
            PointValue::U32(_) => PointValue::U32(bits as u32),
            PointValue::I64(_) => PointValue::I64(bits as i64),
            PointValue::U64(_) => PointValue::U64(bits),
            other => other.clone(),
        }
    }

    /// `{ "0xHEX" | number | bool | {maxLen,text} }`.
    fn to_json_val(&self) -> Value {
        match self {
            PointValue::Bool(b) => json!(b),
            PointValue::I8(v) => json!(format!("0x{:02X}", *v as u8)),
            PointValue::U8(v) => json!(format!("0x{:02X}", v)),
            PointValue::I16(v) => json!(format!("0x{:04X}", *v as u16)),
            PointValue::U16(v) => json!(format!("0x{:04X}", v)),
            PointValue::I32(v) => json!(format!("0x{:08X}", *v as u32)),
            PointValue::U32(v) => json!(format!("0x{:08X}", v)),
            PointValue::I64(v) => json!(format!("0x{:016X}", *v as u64)),
            PointValue::U64(v) => json!(format!("0x{:016X}", v)),
            PointValue::F32(v) => json!(v),
            PointValue::F64(v) => json!(v),
            PointValue::Str { max_len, text } => json!({ "maxLen": max_len, "text": text }),
        }
    }

    pub(crate) fn from_json_val(&self, v: &Value) -> Option<PointValue> {
        Some(match self {
            PointValue::Bool(_) => PointValue::Bool(v.as_bool()?),
            PointValue::I8(_) => PointValue::I8(parse_hex_i64(v)? as i8),
            PointValue::U8(_) => PointValue::U8(parse_hex_i64(v)? as u8),
            PointValue::I16(_) => PointValue::I16(parse_hex_i64(v)? as i16),
            PointValue::U16(_) => PointValue::U16(parse_hex_i64(v)? as u16),
            PointValue::I32(_) => PointValue::I32(parse_hex_i64(v)? as i32),
            PointValue::U32(_) => PointValue::U32(parse_hex_i64(v)? as u32),
            PointValue::I64(_) => PointValue::I64(parse_hex_i64(v)?),
            PointValue::U64(_) => PointValue::U64(parse_hex_i64(v)? as u64),
            PointValue::F32(_) => PointValue::F32(v.as_f64()? as f32),
            PointValue::F64(_) => PointValue::F64(v.as_f64()?),
            PointValue::Str { max_len, .. } => {
                let obj = v.as_object()?;
                let max_len = obj.get("maxLen").and_then(|m| m.as_u64()).unwrap_or(*max_len as u64) as usize;
                let text = obj.get("text").and_then(|t| t.as_str()).unwrap_or("").to_string();
                PointValue::Str { max_len, text: truncate_to(&text, max_len) }
            }
        })
    }
}

fn truncate_to(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        s.chars().take(max_len).collect()
    }
}

/// Accepts either a hex string (`"0x2A"`, case-insensitive) or a bare JSON
/// number.
fn parse_hex_i64(v: &Value) -> Option<i64> {
    if let Some(s) = v.as_str() {
        let s = s.trim();
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        i64::from_str_radix(s, 16).ok().or_else(|| u64::from_str_radix(s, 16).ok().map(|u| u as i64))
    } else {
        v.as_i64().or_else(|| v.as_u64().map(|u| u as i64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericAttrs {
    Integer { bits: u32, signed: bool },
    Float { bits: u32 },
}

/// A single point. See the module docs for the full contract.
#[derive(Debug, Clone)]
pub struct Point {
    id: u32,
    name: Option<String>,
    value: PointValue,
    valid: bool,
    locked: bool,
    has_setter: bool,
}

impl Point {
    pub fn new(id: u32, name: Option<String>, initial: PointValue) -> Self {
        Point { id, name, value: initial, valid: false, locked: false, has_setter: false }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_guid(&self) -> &'static str {
        self.value.type_guid()
    }

    pub fn set_has_setter(&mut self, has_setter: bool) {
        self.has_setter = has_setter;
    }

    pub fn has_setter(&self) -> bool {
        self.has_setter
    }

    /// Copies the value out if valid. Returns validity; never fails for a
    /// size mismatch, since callers are expected to already know the
    /// point's type from `resolve_references`.
    pub fn read(&self) -> (bool, PointValue) {
        (self.valid, self.value.clone())
    }

    pub fn is_not_valid(&self) -> bool {
        !self.valid
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Internal helper implementing the point's lock truth table: returns
    /// whether the pending value/validity change is admitted, and applies
    /// any accompanying lock-state transition regardless.
    fn test_and_update_lock(&mut self, lock_request: LockRequest) -> bool {
        let admitted = match (self.locked, lock_request) {
            (false, _) => true,
            (true, LockRequest::NoRequest) => false,
            (true, LockRequest::Lock) => true,
            (true, LockRequest::Unlock) => true,
        };
        match lock_request {
            LockRequest::Lock => self.locked = true,
            LockRequest::Unlock => self.locked = false,
            LockRequest::NoRequest => {}
        }
        admitted
    }

    /// Writes `src`, setting `valid = true`, unless locked with
    /// `lock_request == NoRequest` (silently discarded). Returns whether
    /// the write was admitted.
    pub fn write(&mut self, src: PointValue, lock_request: LockRequest) -> bool {
        if !self.test_and_update_lock(lock_request) {
            return false;
        }
        self.value = src;
        self.valid = true;
        true
    }

    /// Sets `valid = false`, subject to the same lock gating as `write`.
    pub fn set_invalid(&mut self, lock_request: LockRequest) -> bool {
        if !self.test_and_update_lock(lock_request) {
            return false;
        }
        self.valid = false;
        true
    }

    /// Unconditionally overwrites value and validity, ignoring the lock
    /// gate entirely. Reserved for [`crate::setter::Setter`]: a setter's
    /// `update_from_setter` forces its target regardless of lock state,
    /// which is a different (and strictly more privileged) operation than
    /// the lock-gated `write`/`set_invalid` any component or command uses.
    pub(crate) fn force_set(&mut self, value: PointValue, valid: bool) {
        self.value = value;
        self.valid = valid;
    }

    pub fn set_lock_state(&mut self, lock_request: LockRequest) {
        match lock_request {
            LockRequest::Lock => self.locked = true,
            LockRequest::Unlock => self.locked = false,
            LockRequest::NoRequest => {}
        }
    }

    // ---- numeric ops --------------------------------------------------

    pub fn increment(&mut self, lock_request: LockRequest) -> bool {
        self.numeric_op(lock_request, |bits, _| bits.wrapping_add(1))
    }

    pub fn decrement(&mut self, lock_request: LockRequest) -> bool {
        self.numeric_op(lock_request, |bits, _| bits.wrapping_sub(1))
    }

    pub fn bit_or(&mut self, mask: u64, lock_request: LockRequest) -> bool {
        self.numeric_op(lock_request, move |bits, _| bits | mask)
    }

    pub fn bit_and(&mut self, mask: u64, lock_request: LockRequest) -> bool {
        self.numeric_op(lock_request, move |bits, _| bits & mask)
    }

    pub fn bit_xor(&mut self, mask: u64, lock_request: LockRequest) -> bool {
        self.numeric_op(lock_request, move |bits, _| bits ^ mask)
    }

    pub fn bit_set(&mut self, bit: u32, lock_request: LockRequest) -> bool {
        self.numeric_op(lock_request, move |bits, _| bits | (1u64 << bit))
    }

    pub fn bit_clear(&mut self, bit: u32, lock_request: LockRequest) -> bool {
        self.numeric_op(lock_request, move |bits, _| bits & !(1u64 << bit))
    }

    pub fn bit_toggle(&mut self, bit: u32, lock_request: LockRequest) -> bool {
        self.numeric_op(lock_request, move |bits, _| bits ^ (1u64 << bit))
    }

    fn numeric_op(&mut self, lock_request: LockRequest, f: impl FnOnce(u64, &PointValue) -> u64) -> bool {
        let bits = match self.value.as_u64_bits() {
            Some(b) => b,
            None => return false, // not a numeric/integer point; no-op
        };
        if !self.test_and_update_lock(lock_request) {
            return false;
        }
        let new_bits = f(bits, &self.value);
        self.value = self.value.from_u64_bits(new_bits);
        self.valid = true;
        true
    }

    /// Length-bounded string write: text longer than the point's declared
    /// `maxLen` is truncated rather than rejected outright, matching the
    /// original's fixed-size-buffer string points (writing past the
    /// buffer was never an option there either).
    pub fn write_str(&mut self, text: &str, lock_request: LockRequest) -> bool {
        let max_len = match &self.value {
            PointValue::Str { max_len, .. } => *max_len,
            _ => return false,
        };
        if !self.test_and_update_lock(lock_request) {
            return false;
        }
        self.value = PointValue::Str { max_len, text: truncate_to(text, max_len) };
        self.valid = true;
        true
    }

    // ---- JSON -----------------------------------------------------------

    /// `{ id, type?, valid, locked?, val }`, `val` omitted when invalid.
    pub fn to_json(&self, verbose: bool) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("id".into(), json!(self.id));
        if verbose {
            obj.insert("type".into(), json!(self.value.type_guid()));
            obj.insert("locked".into(), json!(self.locked));
        }
        obj.insert("valid".into(), json!(self.valid));
        if self.valid {
            obj.insert("val".into(), self.value.to_json_val());
        }
        Value::Object(obj)
    }

    /// Parses a point-command JSON object: `{ id, valid?, val?, locked? }`.
    /// `id` is assumed already matched to this point by the caller
    /// (`PointDatabase::from_json`). The command's own `locked` field (if
    /// present) overrides the caller's `lock_request` so that a lock
    /// transition and the value/validity change it's meant to accompany
    /// are applied as a single lock-gated operation, rather than the lock
    /// being pre-applied and then gating the write it was supposed to let
    /// through.
    pub fn from_json(&mut self, v: &Value, lock_request: LockRequest, err: &mut FxtError) {
        let obj = match v.as_object() {
            Some(o) => o,
            None => {
                *err = FxtError::point(1, 1); // POINT:PARSE:INVALID_JSON
                return;
            }
        };

        let locked_field = obj.get("locked").and_then(|l| l.as_bool());
        let lock_request = match locked_field {
            Some(true) => LockRequest::Lock,
            Some(false) => LockRequest::Unlock,
            None => lock_request,
        };

        let invalidated = obj.get("valid").and_then(|v| v.as_bool()).map(|valid| !valid).unwrap_or(false);
        if invalidated {
            self.set_invalid(lock_request);
        }

        if let Some(val) = obj.get("val") {
            match self.value.from_json_val(val) {
                Some(new_value) => {
                    self.write(new_value, lock_request);
                }
                None => {
                    *err = FxtError::point(1, 2); // POINT:PARSE:TYPE_MISMATCH
                }
            }
        } else if !invalidated && locked_field.is_some() {
            // `locked` with neither `val` nor `valid:false` present is a
            // bare lock transition with no accompanying value change.
            self.set_lock_state(lock_request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bool_point(id: u32) -> Point {
        Point::new(id, None, PointValue::Bool(false))
    }

    #[test]
    fn write_while_unlocked_admits_and_becomes_valid() {
        let mut p = bool_point(1);
        assert!(p.write(PointValue::Bool(true), LockRequest::NoRequest));
        assert_eq!(p.read(), (true, PointValue::Bool(true)));
    }

    #[test]
    fn lock_truth_table() {
        // false/no_request -> admitted, stays unlocked
        let mut p = bool_point(1);
        assert!(p.write(PointValue::Bool(true), LockRequest::NoRequest));
        assert!(!p.is_locked());

        // false/lock -> admitted, becomes locked
        let mut p = bool_point(1);
        assert!(p.write(PointValue::Bool(true), LockRequest::Lock));
        assert!(p.is_locked());

        // true/no_request -> NOT admitted
        let mut p = bool_point(1);
        p.write(PointValue::Bool(false), LockRequest::Lock);
        let before = p.read();
        assert!(!p.write(PointValue::Bool(true), LockRequest::NoRequest));
        assert_eq!(p.read(), before);

        // true/lock -> admitted, stays locked
        let mut p = bool_point(1);
        p.write(PointValue::Bool(false), LockRequest::Lock);
        assert!(p.write(PointValue::Bool(true), LockRequest::Lock));
        assert!(p.is_locked());

        // true/unlock -> admitted, becomes unlocked
        let mut p = bool_point(1);
        p.write(PointValue::Bool(false), LockRequest::Lock);
        assert!(p.write(PointValue::Bool(true), LockRequest::Unlock));
        assert!(!p.is_locked());
    }

    #[test]
    fn locked_write_is_silent_noop() {
        let mut p = bool_point(1);
        p.write(PointValue::Bool(true), LockRequest::Lock);
        assert!(!p.write(PointValue::Bool(false), LockRequest::NoRequest));
        assert_eq!(p.read(), (true, PointValue::Bool(true)));
    }

    #[test]
    fn set_invalid_then_read_reports_invalid() {
        let mut p = bool_point(1);
        p.write(PointValue::Bool(true), LockRequest::NoRequest);
        assert!(p.set_invalid(LockRequest::NoRequest));
        assert!(p.is_not_valid());
        assert_eq!(p.read().0, false);
    }

    #[test]
    fn json_roundtrip_modulo_invalid_omission() {
        let mut p = Point::new(42, None, PointValue::U16(0));
        p.write(PointValue::U16(0x2A), LockRequest::NoRequest);
        let j = p.to_json(true);
        assert_eq!(j["val"], json!("0x002A"));

        let mut p2 = Point::new(42, None, PointValue::U16(0));
        let mut err = FxtError::SUCCESS;
        p2.from_json(&j, LockRequest::NoRequest, &mut err);
        assert!(err.is_success());
        assert_eq!(p2.read(), p.read());
    }

    #[test]
    fn command_val_and_locked_together_locks_with_the_new_value() {
        // spec §8 scenario 5: {id, val:42, locked:true} must both lock
        // *and* take the new value, not lock first and then discard the
        // write the lock truth table would otherwise block.
        let mut p = Point::new(1, None, PointValue::U32(7));
        let mut err = FxtError::SUCCESS;

        p.from_json(&json!({ "id": 1, "val": "0x2A", "locked": true }), LockRequest::NoRequest, &mut err);
        assert!(err.is_success());
        assert!(p.is_locked());
        assert_eq!(p.read(), (true, PointValue::U32(42)));

        // subsequent unlocked-request write is ignored while locked.
        p.from_json(&json!({ "id": 1, "val": "0x63" }), LockRequest::NoRequest, &mut err);
        assert_eq!(p.read(), (true, PointValue::U32(42)));

        // explicit unlock admits the write and clears the lock.
        p.from_json(&json!({ "id": 1, "val": "0x63", "locked": false }), LockRequest::NoRequest, &mut err);
        assert!(!p.is_locked());
        assert_eq!(p.read(), (true, PointValue::U32(0x63)));
    }

    #[test]
    fn invalid_point_omits_val_in_json() {
        let p = Point::new(1, None, PointValue::Bool(false));
        let j = p.to_json(false);
        assert!(j.get("val").is_none());
        assert_eq!(j["valid"], json!(false));
    }

    #[test]
    fn hex_parse_is_case_insensitive() {
        assert_eq!(parse_hex_i64(&json!("0x2a")), Some(0x2a));
        assert_eq!(parse_hex_i64(&json!("0X2A")), Some(0x2a));
    }

    #[test]
    fn string_write_truncates_to_max_len() {
        let mut p = Point::new(1, None, PointValue::Str { max_len: 4, text: String::new() });
        assert!(p.write_str("hello world", LockRequest::NoRequest));
        match p.read().1 {
            PointValue::Str { text, .. } => assert_eq!(text, "hell"),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn as_f64_numeric_covers_signed_and_float() {
        assert_eq!(PointValue::I16(-5).as_f64_numeric(), Some(-5.0));
        assert_eq!(PointValue::F32(1.5).as_f64_numeric(), Some(1.5));
        assert_eq!(PointValue::Bool(true).as_f64_numeric(), None);
    }

    #[test]
    fn numeric_op_noop_on_bool() {
        let mut p = bool_point(1);
        assert!(!p.increment(LockRequest::NoRequest));
    }

    #[test]
    fn bit_ops_on_u8() {
        let mut p = Point::new(1, None, PointValue::U8(0b0000_0000));
        assert!(p.bit_set(4, LockRequest::NoRequest));
        assert_eq!(p.read().1, PointValue::U8(0b0001_0000));
        assert!(p.bit_toggle(4, LockRequest::NoRequest));
        assert_eq!(p.read().1, PointValue::U8(0));
    }
}
