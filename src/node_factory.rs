//! Node Factory / configuration loader: parses one JSON document
//! describing a node's chassis, scanners, cards, execution sets, logic
//! chains and components, and builds the whole object graph in one pass.
//! Every point (card channels, shared points, connection points,
//! auto-points) is built and registered before any component's references
//! are resolved, since a component may address a point owned by any card
//! or chassis in the node, not only ones declared earlier in the
//! document.

use serde_json::{json, Value};

use crate::arena::{Arena, Arenas, ArenaSizes};
use crate::card::composite::{CompositeBoardDriver, CompositeCard};
use crate::card::gpio::{GpioCard, GpioDriver, Pull};
use crate::card::mock::{MockCard, MockRegisterFile};
use crate::card::rht::RhtCard;
use crate::card::{Card, ChannelPoints};
use crate::chassis::Chassis;
use crate::component::and_gate::AndGate;
use crate::component::byte_demux::ByteDemux;
use crate::component::byte_mux::ByteMux;
use crate::component::byte_splitter::ByteSplitter;
use crate::component::nbit_demux::NBitDemux;
use crate::component::nbit_mux::NBitMux;
use crate::component::on_off::{OnOff, OnOffParams};
use crate::component::wire::Wire;
use crate::component::Component;
use crate::error::FxtError;
use crate::execution_set::ExecutionSet;
use crate::guid;
use crate::logic_chain::LogicChain;
use crate::node::Node;
use crate::point_db::PointDatabase;
use crate::point_factory::{register_builtin_factories, PointFactoryDatabase};
use crate::scanner::Scanner;

/// Node-type-defined ceiling on chassis count per node; the one node type
/// this factory builds fixes it here rather than reading it from
/// configuration.
pub const MAX_CHASSIS: usize = 4;

/// Where a mock card's register file ends up so a test harness or the
/// shell can poke it by `(chassis_index, slot)` after the node is built.
#[derive(Default)]
pub struct MockCardRegistry {
    entries: std::collections::HashMap<(u32, u32), MockRegisterFile>,
}

impl MockCardRegistry {
    fn insert(&mut self, chassis_idx: u32, slot: u32, regs: MockRegisterFile) {
        self.entries.insert((chassis_idx, slot), regs);
    }

    pub fn get(&self, chassis_idx: u32, slot: u32) -> Option<&MockRegisterFile> {
        self.entries.get(&(chassis_idx, slot))
    }
}

/// Hardware-specific GPIO/composite-board drivers are external
/// collaborators; a node loaded from configuration binds every such card
/// to a no-op driver so the scheduler, point
/// propagation and component execution can all be exercised without real
/// silicon. A deployment with actual hardware builds `GpioCard`/
/// `CompositeCard` directly against its own driver rather than going
/// through `NodeFactory`.
struct NoHardwareGpio;

impl GpioDriver for NoHardwareGpio {
    fn configure(&mut self, _channel: u32, _pull: Pull, _is_output: bool) -> Result<(), FxtError> {
        Ok(())
    }
    fn read(&mut self, _channel: u32) -> Result<bool, FxtError> {
        Ok(false)
    }
    fn write(&mut self, _channel: u32, _value: bool) -> Result<(), FxtError> {
        Ok(())
    }
}

struct NoHardwareBoard;

impl CompositeBoardDriver for NoHardwareBoard {
    fn read_digital(&mut self, _channel: u32) -> Result<bool, FxtError> {
        Ok(false)
    }
    fn read_analog(&mut self, _channel: u32) -> Result<i32, FxtError> {
        Ok(0)
    }
    fn read_button(&mut self, _channel: u32) -> Result<bool, FxtError> {
        Ok(false)
    }
    fn read_temperature(&mut self, _channel: u32) -> Result<f32, FxtError> {
        Ok(0.0)
    }
    fn write_digital(&mut self, _channel: u32, _value: bool) -> Result<(), FxtError> {
        Ok(())
    }
    fn write_analog(&mut self, _channel: u32, _value: i32) -> Result<(), FxtError> {
        Ok(())
    }
}

pub struct NodeFactory;

impl NodeFactory {
    /// Builds a complete `Node` from a parsed JSON document, plus the
    /// registry of any mock cards it contains. On any error the partially
    /// built point database is torn down via `cleanup_after_build_failure`
    /// and the first, lowest-level error is returned.
    pub fn build(json: &Value, arena_sizes: ArenaSizes) -> Result<(Node, MockCardRegistry), FxtError> {
        let mut point_db = PointDatabase::new();
        let mut factory_db = PointFactoryDatabase::new();
        register_builtin_factories(&mut factory_db);
        let mut arenas = Arenas::new(arena_sizes);
        let mut registry = MockCardRegistry::default();

        match Self::build_inner(json, &factory_db, &mut arenas, &mut point_db, &mut registry) {
            Ok((type_guid, id, chassis)) => Ok((Node::new(type_guid, id, arenas, point_db, chassis), registry)),
            Err(e) => {
                log::error!("node build failed: {}", e.to_text());
                point_db.cleanup_after_build_failure();
                Err(e)
            }
        }
    }

    fn build_inner(
        json: &Value,
        factory_db: &PointFactoryDatabase,
        arenas: &mut Arenas,
        point_db: &mut PointDatabase,
        registry: &mut MockCardRegistry,
    ) -> Result<(&'static str, u32, Vec<Chassis>), FxtError> {
        let type_str = json.get("type").and_then(|t| t.as_str()).ok_or(FxtError::node(1, 1))?; // NOT_ME
        if type_str != guid::node::STANDARD {
            return Err(FxtError::node(1, 1)); // NOT_ME
        }
        let id = json.get("id").and_then(|i| i.as_u64()).unwrap_or(0) as u32;

        let chassis_defs = json.get("chassis").and_then(|c| c.as_array()).ok_or(FxtError::node(1, 4))?; // CHILD_BUILD_FAILED
        if chassis_defs.is_empty() || chassis_defs.len() > MAX_CHASSIS {
            return Err(FxtError::node(1, 2)); // MAX_CHASSIS_EXCEEDED
        }

        let mut chassis_list = Vec::with_capacity(chassis_defs.len());
        for (idx, def) in chassis_defs.iter().enumerate() {
            chassis_list.push(build_chassis(def, factory_db, arenas, point_db, registry, idx as u32)?);
        }

        for chassis in &mut chassis_list {
            chassis.resolve_references(point_db)?;
        }

        Ok((guid::node::STANDARD, id, chassis_list))
    }
}

// ---- point helpers ----------------------------------------------------------

fn build_point(v: &Value, factory_db: &PointFactoryDatabase, arena: &mut Arena, point_db: &mut PointDatabase) -> Result<u32, FxtError> {
    let (point, setter) = factory_db.build(v, arena)?;
    let id = point_db.add(point)?;
    if let Some(setter) = setter {
        point_db.attach_setter(id, setter);
    }
    Ok(id)
}

fn build_points(defs: &[Value], factory_db: &PointFactoryDatabase, arena: &mut Arena, point_db: &mut PointDatabase) -> Result<Vec<u32>, FxtError> {
    defs.iter().map(|d| build_point(d, factory_db, arena, point_db)).collect()
}

/// Builds the pair of points one channel always has: a virtual point
/// (HA-stateful arena, no `initial` of its own) and an IO register
/// (card-stateful arena, which keeps the channel's `initial` block so a
/// setter is attached there instead).
fn build_channel_point(
    v: &Value,
    factory_db: &PointFactoryDatabase,
    ha_arena: &mut Arena,
    card_arena: &mut Arena,
    point_db: &mut PointDatabase,
) -> Result<ChannelPoints, FxtError> {
    let channel = v.get("channel").and_then(|c| c.as_u64()).ok_or(FxtError::card(1, 3))? as u32; // MISSING_REQUIRED_FIELD
    let io_register_id = v.get("ioRegId").and_then(|c| c.as_u64()).ok_or(FxtError::card(1, 3))? as u32;

    let mut vp_json = v.clone();
    if let Value::Object(ref mut m) = vp_json {
        m.remove("initial");
    }
    let (vp_point, _) = factory_db.build(&vp_json, ha_arena)?;
    let virtual_point_id = point_db.add(vp_point)?;

    let mut reg_json = v.clone();
    if let Value::Object(ref mut m) = reg_json {
        m.insert("id".to_string(), json!(io_register_id));
    }
    let (reg_point, setter) = factory_db.build(&reg_json, card_arena)?;
    let reg_id = point_db.add(reg_point)?;
    if let Some(setter) = setter {
        point_db.attach_setter(reg_id, setter);
    }

    Ok(ChannelPoints { channel, io_register_id: reg_id, virtual_point_id })
}

fn build_channel_points(
    defs: &[Value],
    factory_db: &PointFactoryDatabase,
    ha_arena: &mut Arena,
    card_arena: &mut Arena,
    point_db: &mut PointDatabase,
) -> Result<Vec<ChannelPoints>, FxtError> {
    defs.iter().map(|d| build_channel_point(d, factory_db, ha_arena, card_arena, point_db)).collect()
}

fn array_field<'a>(v: &'a Value, key: &str) -> Vec<Value> {
    v.get(key).and_then(|a| a.as_array()).cloned().unwrap_or_default()
}

fn intern_point_type(type_guid: &str) -> Result<&'static str, FxtError> {
    Ok(match type_guid {
        g if g == guid::point::BOOL => guid::point::BOOL,
        g if g == guid::point::I8 => guid::point::I8,
        g if g == guid::point::U8 => guid::point::U8,
        g if g == guid::point::I16 => guid::point::I16,
        g if g == guid::point::U16 => guid::point::U16,
        g if g == guid::point::I32 => guid::point::I32,
        g if g == guid::point::U32 => guid::point::U32,
        g if g == guid::point::I64 => guid::point::I64,
        g if g == guid::point::U64 => guid::point::U64,
        g if g == guid::point::F32 => guid::point::F32,
        g if g == guid::point::F64 => guid::point::F64,
        g if g == guid::point::STRING => guid::point::STRING,
        _ => return Err(FxtError::component(1, 5)), // UNKNOWN_TYPE_GUID
    })
}

fn intern_card_type(type_guid: &str) -> Result<&'static str, FxtError> {
    Ok(match type_guid {
        g if g == guid::card::MOCK_DIGITAL8 => guid::card::MOCK_DIGITAL8,
        g if g == guid::card::MOCK_ANALOG_IN8 => guid::card::MOCK_ANALOG_IN8,
        g if g == guid::card::MOCK_ANALOG_OUT8 => guid::card::MOCK_ANALOG_OUT8,
        _ => return Err(FxtError::card(1, 2)), // UNKNOWN_TYPE_GUID
    })
}

fn parse_pull(v: &Value) -> Pull {
    match v.get("pull").and_then(|p| p.as_str()) {
        Some("up") => Pull::Up,
        Some("down") => Pull::Down,
        _ => Pull::None,
    }
}

// ---- card builders -----------------------------------------------------------

fn build_gpio_card(
    v: &Value,
    factory_db: &PointFactoryDatabase,
    arenas: &mut Arenas,
    point_db: &mut PointDatabase,
) -> Result<Box<dyn Card + Send>, FxtError> {
    let slot = v.get("slot").and_then(|s| s.as_u64()).ok_or(FxtError::card(1, 3))? as u32;
    let points = v.get("points").ok_or(FxtError::card(1, 3))?;
    let input_defs = array_field(points, "inputs");
    let output_defs = array_field(points, "outputs");

    let mut inputs = Vec::with_capacity(input_defs.len());
    let mut pulls = Vec::with_capacity(input_defs.len());
    for def in &input_defs {
        inputs.push(build_channel_point(def, factory_db, &mut arenas.ha_stateful, &mut arenas.card_stateful, point_db)?);
        pulls.push(parse_pull(def));
    }
    let outputs = build_channel_points(&output_defs, factory_db, &mut arenas.ha_stateful, &mut arenas.card_stateful, point_db)?;

    let card = GpioCard::new(slot, NoHardwareGpio, inputs, pulls, outputs)?;
    Ok(Box::new(card))
}

fn build_composite_card(
    v: &Value,
    factory_db: &PointFactoryDatabase,
    arenas: &mut Arenas,
    point_db: &mut PointDatabase,
) -> Result<Box<dyn Card + Send>, FxtError> {
    let slot = v.get("slot").and_then(|s| s.as_u64()).ok_or(FxtError::card(1, 3))? as u32;
    let points = v.get("points").ok_or(FxtError::card(1, 3))?;
    let inputs = build_channel_points(&array_field(points, "inputs"), factory_db, &mut arenas.ha_stateful, &mut arenas.card_stateful, point_db)?;
    let outputs = build_channel_points(&array_field(points, "outputs"), factory_db, &mut arenas.ha_stateful, &mut arenas.card_stateful, point_db)?;

    let card = CompositeCard::new(slot, NoHardwareBoard, inputs, outputs)?;
    Ok(Box::new(card))
}

/// Channel numbering on the RHT card is fixed by this factory: the first
/// declared input channel is relative humidity, the second is
/// temperature, since the drivers for this card family only ever expose
/// two channels.
fn build_rht_card(
    v: &Value,
    factory_db: &PointFactoryDatabase,
    arenas: &mut Arenas,
    point_db: &mut PointDatabase,
) -> Result<Box<dyn Card + Send>, FxtError> {
    let slot = v.get("slot").and_then(|s| s.as_u64()).ok_or(FxtError::card(1, 3))? as u32;
    let driver_interval_us = v.get("driverInterval").and_then(|d| d.as_u64()).ok_or(FxtError::card(1, 3))?;
    let points = v.get("points").ok_or(FxtError::card(1, 3))?;
    let input_defs = array_field(points, "inputs");
    if input_defs.len() < 2 {
        return Err(FxtError::card(1, 3));
    }
    let humidity = build_channel_point(&input_defs[0], factory_db, &mut arenas.ha_stateful, &mut arenas.card_stateful, point_db)?;
    let temperature = build_channel_point(&input_defs[1], factory_db, &mut arenas.ha_stateful, &mut arenas.card_stateful, point_db)?;

    let card = RhtCard::new(slot, driver_interval_us, humidity, temperature)?;
    Ok(Box::new(card))
}

fn build_mock_card(
    type_guid: &str,
    v: &Value,
    factory_db: &PointFactoryDatabase,
    arenas: &mut Arenas,
    point_db: &mut PointDatabase,
    registry: &mut MockCardRegistry,
    chassis_idx: u32,
) -> Result<Box<dyn Card + Send>, FxtError> {
    let slot = v.get("slot").and_then(|s| s.as_u64()).ok_or(FxtError::card(1, 3))? as u32;
    let points = v.get("points").ok_or(FxtError::card(1, 3))?;
    let inputs = build_channel_points(&array_field(points, "inputs"), factory_db, &mut arenas.ha_stateful, &mut arenas.card_stateful, point_db)?;
    let outputs = build_channel_points(&array_field(points, "outputs"), factory_db, &mut arenas.ha_stateful, &mut arenas.card_stateful, point_db)?;

    let registers = MockRegisterFile::new();
    let card = MockCard::new(slot, intern_card_type(type_guid)?, registers.clone(), inputs, outputs)?;
    registry.insert(chassis_idx, slot, registers);
    Ok(Box::new(card))
}

fn build_card(
    v: &Value,
    factory_db: &PointFactoryDatabase,
    arenas: &mut Arenas,
    point_db: &mut PointDatabase,
    registry: &mut MockCardRegistry,
    chassis_idx: u32,
) -> Result<Box<dyn Card + Send>, FxtError> {
    let type_guid = v.get("type").and_then(|t| t.as_str()).ok_or(FxtError::card(1, 3))?;
    match type_guid {
        g if g == guid::card::GPIO_30 => build_gpio_card(v, factory_db, arenas, point_db),
        g if g == guid::card::COMPOSITE_RP2040 => build_composite_card(v, factory_db, arenas, point_db),
        g if g == guid::card::RHT_I2C => build_rht_card(v, factory_db, arenas, point_db),
        g if g == guid::card::MOCK_DIGITAL8 || g == guid::card::MOCK_ANALOG_IN8 || g == guid::card::MOCK_ANALOG_OUT8 => {
            build_mock_card(type_guid, v, factory_db, arenas, point_db, registry, chassis_idx)
        }
        _ => Err(FxtError::card(1, 2)), // UNKNOWN_TYPE_GUID
    }
}

// ---- component builders ------------------------------------------------------

fn input_array<'a>(v: &'a Value) -> Result<&'a Vec<Value>, FxtError> {
    v.get("inputs").and_then(|a| a.as_array()).ok_or(FxtError::component(1, 1)) // INCORRECT_NUM_INPUT_REFS
}

fn output_array<'a>(v: &'a Value) -> Result<&'a Vec<Value>, FxtError> {
    v.get("outputs").and_then(|a| a.as_array()).ok_or(FxtError::component(1, 2)) // INCORRECT_NUM_OUTPUT_REFS
}

fn ref_id(v: &Value) -> Result<u32, FxtError> {
    v.get("idRef").and_then(|i| i.as_u64()).map(|i| i as u32).ok_or(FxtError::component(1, 3)) // MISSING_REQUIRED_FIELD
}

fn ref_type(v: &Value) -> Result<&str, FxtError> {
    v.get("type").and_then(|t| t.as_str()).ok_or(FxtError::component(1, 3))
}

fn ref_bit(v: &Value) -> u8 {
    v.get("bit").and_then(|b| b.as_u64()).unwrap_or(0) as u8
}

fn ref_negate(v: &Value) -> bool {
    v.get("negate").and_then(|b| b.as_bool()).unwrap_or(false)
}

fn ids_from(arr: &[Value]) -> Result<Vec<u32>, FxtError> {
    arr.iter().map(ref_id).collect()
}

fn bit_refs_from(arr: &[Value]) -> Result<Vec<(u32, u8, bool)>, FxtError> {
    arr.iter().map(|r| Ok((ref_id(r)?, ref_bit(r), ref_negate(r)))).collect()
}

fn build_wire(v: &Value, is_bool: bool) -> Result<Box<dyn Component + Send>, FxtError> {
    let inputs = ids_from(input_array(v)?)?;
    let outputs = ids_from(output_array(v)?)?;
    let wire = if is_bool { Wire::new_bool(inputs, outputs)? } else { Wire::new_float(inputs, outputs)? };
    Ok(Box::new(wire))
}

fn build_and_gate(v: &Value) -> Result<Box<dyn Component + Send>, FxtError> {
    let inputs = ids_from(input_array(v)?)?;
    let outputs = output_array(v)?.iter().map(|o| Ok((ref_id(o)?, ref_negate(o)))).collect::<Result<Vec<_>, FxtError>>()?;
    Ok(Box::new(AndGate::new(inputs, outputs)?))
}

fn build_byte_mux(v: &Value) -> Result<Box<dyn Component + Send>, FxtError> {
    let inputs = bit_refs_from(input_array(v)?)?;
    let output = output_array(v)?.first().ok_or(FxtError::component(1, 2))?;
    Ok(Box::new(ByteMux::new(inputs, ref_id(output)?)?))
}

fn build_byte_demux(v: &Value) -> Result<Box<dyn Component + Send>, FxtError> {
    let input = input_array(v)?.first().ok_or(FxtError::component(1, 1))?;
    let outputs = bit_refs_from(output_array(v)?)?;
    Ok(Box::new(ByteDemux::new(ref_id(input)?, outputs)?))
}

fn array_of_8(v: Option<&Value>) -> Result<[u32; 8], FxtError> {
    let arr = v.and_then(|v| v.as_array()).ok_or(FxtError::component(1, 3))?;
    if arr.len() != 8 {
        return Err(FxtError::component(1, 3));
    }
    let mut out = [0u32; 8];
    for (i, item) in arr.iter().enumerate() {
        out[i] = ref_id(item)?;
    }
    Ok(out)
}

fn build_byte_splitter(v: &Value) -> Result<Box<dyn Component + Send>, FxtError> {
    let byte_in = v.get("byteIn").ok_or(FxtError::component(1, 3))?;
    let byte_out = v.get("byteOut").ok_or(FxtError::component(1, 3))?;
    let bool_outs = array_of_8(v.get("boolOuts"))?;
    let bool_ins = array_of_8(v.get("boolIns"))?;
    Ok(Box::new(ByteSplitter::new(ref_id(byte_in)?, bool_outs, bool_ins, ref_id(byte_out)?)))
}

fn build_nbit_mux(v: &Value) -> Result<Box<dyn Component + Send>, FxtError> {
    let inputs = bit_refs_from(input_array(v)?)?;
    let output = output_array(v)?.first().ok_or(FxtError::component(1, 2))?;
    let output_type = intern_point_type(ref_type(output)?)?;
    Ok(Box::new(NBitMux::new(output_type, inputs, ref_id(output)?)?))
}

fn build_nbit_demux(v: &Value) -> Result<Box<dyn Component + Send>, FxtError> {
    let input = input_array(v)?.first().ok_or(FxtError::component(1, 1))?;
    let input_type = intern_point_type(ref_type(input)?)?;
    let outputs = bit_refs_from(output_array(v)?)?;
    Ok(Box::new(NBitDemux::new(input_type, ref_id(input)?, outputs)?))
}

fn build_on_off(v: &Value) -> Result<Box<dyn Component + Send>, FxtError> {
    let pv = v.get("pv").ok_or(FxtError::component(1, 3))?;
    let sp = v.get("sp").ok_or(FxtError::component(1, 3))?;
    let numeric_type = intern_point_type(ref_type(pv)?)?;
    let rst = v.get("rst").map(ref_id).transpose()?;
    let output = v.get("output").map(ref_id).transpose()?;
    let output_complement = v.get("outputComplement").map(ref_id).transpose()?;
    let params = OnOffParams {
        hon: v.get("hon").and_then(|h| h.as_f64()).unwrap_or(0.0),
        hoff: v.get("hoff").and_then(|h| h.as_f64()).unwrap_or(0.0),
        mon_us: v.get("monUs").and_then(|m| m.as_u64()).unwrap_or(0),
        moff_us: v.get("moffUs").and_then(|m| m.as_u64()).unwrap_or(0),
    };
    Ok(Box::new(OnOff::new(numeric_type, ref_id(pv)?, ref_id(sp)?, rst, output, output_complement, params)?))
}

fn build_component(v: &Value) -> Result<Box<dyn Component + Send>, FxtError> {
    let type_guid = v.get("type").and_then(|t| t.as_str()).ok_or(FxtError::component(1, 3))?;
    match type_guid {
        g if g == guid::component::WIRE64_BOOL => build_wire(v, true),
        g if g == guid::component::WIRE64_FLOAT => build_wire(v, false),
        g if g == guid::component::AND_GATE => build_and_gate(v),
        g if g == guid::component::BYTE_MUX => build_byte_mux(v),
        g if g == guid::component::BYTE_DEMUX => build_byte_demux(v),
        g if g == guid::component::BYTE_SPLITTER => build_byte_splitter(v),
        g if g == guid::component::NBIT_MUX => build_nbit_mux(v),
        g if g == guid::component::NBIT_DEMUX => build_nbit_demux(v),
        g if g == guid::component::ON_OFF => build_on_off(v),
        _ => Err(FxtError::component(1, 5)), // UNKNOWN_TYPE_GUID
    }
}

// ---- scheduling-tree builders -------------------------------------------------

fn build_logic_chain(v: &Value, factory_db: &PointFactoryDatabase, arenas: &mut Arenas, point_db: &mut PointDatabase) -> Result<LogicChain, FxtError> {
    let id = v.get("id").and_then(|i| i.as_u64()).unwrap_or(0) as u32;
    let connection_ids = build_points(&array_field(v, "connectionPts"), factory_db, &mut arenas.ha_stateful, point_db)?;
    let auto_ids = build_points(&array_field(v, "autoPts"), factory_db, &mut arenas.ha_stateful, point_db)?;

    let mut components = Vec::new();
    for def in &array_field(v, "components") {
        components.push(build_component(def)?);
    }

    Ok(LogicChain::new(id, components, connection_ids, auto_ids))
}

fn build_execution_set(v: &Value, factory_db: &PointFactoryDatabase, arenas: &mut Arenas, point_db: &mut PointDatabase) -> Result<ExecutionSet, FxtError> {
    let id = v.get("id").and_then(|i| i.as_u64()).unwrap_or(0) as u32;
    let rate = v.get("exeRateMultiplier").and_then(|r| r.as_u64()).unwrap_or(1) as u32;

    let mut chains = Vec::new();
    for def in &array_field(v, "logicChains") {
        chains.push(build_logic_chain(def, factory_db, arenas, point_db)?);
    }

    ExecutionSet::new(id, rate, chains)
}

fn build_scanner(
    v: &Value,
    factory_db: &PointFactoryDatabase,
    arenas: &mut Arenas,
    point_db: &mut PointDatabase,
    registry: &mut MockCardRegistry,
    chassis_idx: u32,
) -> Result<Scanner, FxtError> {
    let id = v.get("id").and_then(|i| i.as_u64()).unwrap_or(0) as u32;
    let rate = v.get("scanRateMultiplier").and_then(|r| r.as_u64()).unwrap_or(1) as u32;

    let mut cards = Vec::new();
    for def in &array_field(v, "cards") {
        cards.push(build_card(def, factory_db, arenas, point_db, registry, chassis_idx)?);
    }

    Scanner::new(id, rate, cards)
}

fn build_chassis(
    v: &Value,
    factory_db: &PointFactoryDatabase,
    arenas: &mut Arenas,
    point_db: &mut PointDatabase,
    registry: &mut MockCardRegistry,
    chassis_idx: u32,
) -> Result<Chassis, FxtError> {
    let id = v.get("id").and_then(|i| i.as_u64()).unwrap_or(0) as u32;
    let fer_us = v.get("fer").and_then(|f| f.as_u64()).ok_or(FxtError::chassis(1, 1))?; // DEADLINE_MISSED (missing rate)

    let shared_ids = build_points(&array_field(v, "sharedPts"), factory_db, &mut arenas.ha_stateful, point_db)?;

    let mut scanners = Vec::new();
    for def in &array_field(v, "scanners") {
        scanners.push(build_scanner(def, factory_db, arenas, point_db, registry, chassis_idx)?);
    }

    let mut execution_sets = Vec::new();
    for def in &array_field(v, "executionSets") {
        execution_sets.push(build_execution_set(def, factory_db, arenas, point_db)?);
    }

    Chassis::new(id, fer_us, scanners, execution_sets, shared_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_node(chassis: Value) -> Value {
        json!({
            "type": guid::node::STANDARD,
            "id": 1,
            "chassis": [chassis],
        })
    }

    #[test]
    fn rejects_wrong_node_type() {
        let doc = json!({ "type": "not.a.node", "id": 1, "chassis": [] });
        let err = NodeFactory::build(&doc, ArenaSizes::default()).unwrap_err();
        assert_eq!(err.to_text(), "NODE:BUILD:NOT_ME");
    }

    #[test]
    fn rejects_empty_chassis_list() {
        let doc = json!({ "type": guid::node::STANDARD, "id": 1, "chassis": [] });
        let err = NodeFactory::build(&doc, ArenaSizes::default()).unwrap_err();
        assert_eq!(err.to_text(), "NODE:BUILD:MAX_CHASSIS_EXCEEDED");
    }

    #[test]
    fn builds_a_chassis_with_a_mock_card_and_wire_chain() {
        let chassis = json!({
            "id": 1,
            "fer": 1_000,
            "sharedPts": [],
            "scanners": [
                {
                    "id": 1,
                    "scanRateMultiplier": 1,
                    "cards": [
                        {
                            "type": guid::card::MOCK_DIGITAL8,
                            "slot": 0,
                            "points": {
                                "inputs": [
                                    { "type": guid::point::BOOL, "id": 10, "channel": 1, "ioRegId": 11 }
                                ],
                                "outputs": []
                            }
                        }
                    ]
                }
            ],
            "executionSets": [
                {
                    "id": 1,
                    "exeRateMultiplier": 1,
                    "logicChains": [
                        {
                            "id": 1,
                            "connectionPts": [
                                { "type": guid::point::BOOL, "id": 20 }
                            ],
                            "autoPts": [],
                            "components": [
                                {
                                    "type": guid::component::WIRE64_BOOL,
                                    "inputs": [ { "idRef": 10 } ],
                                    "outputs": [ { "idRef": 20 } ]
                                }
                            ]
                        }
                    ]
                }
            ]
        });

        let doc = minimal_node(chassis);
        let (node, registry) = NodeFactory::build(&doc, ArenaSizes::default()).unwrap();
        assert_eq!(node.type_guid(), guid::node::STANDARD);
        assert!(registry.get(0, 0).is_some());
    }

    #[test]
    fn unknown_component_type_guid_fails_the_whole_build() {
        let chassis = json!({
            "id": 1,
            "fer": 1_000,
            "sharedPts": [],
            "scanners": [],
            "executionSets": [
                {
                    "id": 1,
                    "exeRateMultiplier": 1,
                    "logicChains": [
                        {
                            "id": 1,
                            "connectionPts": [ { "type": guid::point::BOOL, "id": 1 } ],
                            "autoPts": [],
                            "components": [
                                { "type": "fxt.component.nonexistent", "inputs": [], "outputs": [] }
                            ]
                        }
                    ]
                }
            ]
        });

        let doc = minimal_node(chassis);
        let err = NodeFactory::build(&doc, ArenaSizes::default()).unwrap_err();
        assert_eq!(err.to_text(), "COMPONENT:PARSE:UNKNOWN_TYPE_GUID");
    }

    #[test]
    fn unresolved_component_reference_fails_after_the_whole_tree_is_built() {
        let chassis = json!({
            "id": 1,
            "fer": 1_000,
            "sharedPts": [],
            "scanners": [],
            "executionSets": [
                {
                    "id": 1,
                    "exeRateMultiplier": 1,
                    "logicChains": [
                        {
                            "id": 1,
                            "connectionPts": [ { "type": guid::point::BOOL, "id": 1 } ],
                            "autoPts": [],
                            "components": [
                                {
                                    "type": guid::component::WIRE64_BOOL,
                                    "inputs": [ { "idRef": 999 } ],
                                    "outputs": [ { "idRef": 1 } ]
                                }
                            ]
                        }
                    ]
                }
            ]
        });

        let doc = minimal_node(chassis);
        let err = NodeFactory::build(&doc, ArenaSizes::default()).unwrap_err();
        assert_eq!(err.to_text(), "COMPONENT:RESOLVE:UNRESOLVED_INPUT_REF");
    }
}
