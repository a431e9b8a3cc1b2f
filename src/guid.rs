//! Type GUID constants. The configuration format identifies every point,
//! card, component and node type by an opaque GUID string; this module is
//! the single place those strings are defined so factories, parsers and
//! tests all agree on them.

pub mod point {
    pub const BOOL: &str = "fxt.point.bool";
    pub const I8: &str = "fxt.point.i8";
    pub const U8: &str = "fxt.point.u8";
    pub const I16: &str = "fxt.point.i16";
    pub const U16: &str = "fxt.point.u16";
    pub const I32: &str = "fxt.point.i32";
    pub const U32: &str = "fxt.point.u32";
    pub const I64: &str = "fxt.point.i64";
    pub const U64: &str = "fxt.point.u64";
    pub const F32: &str = "fxt.point.f32";
    pub const F64: &str = "fxt.point.f64";
    pub const STRING: &str = "fxt.point.string";
}

pub mod card {
    pub const GPIO_30: &str = "fxt.card.gpio30";
    pub const COMPOSITE_RP2040: &str = "fxt.card.composite.rp2040";
    pub const RHT_I2C: &str = "fxt.card.rht.i2c";
    pub const MOCK_DIGITAL8: &str = "fxt.card.mock.digital8";
    pub const MOCK_ANALOG_IN8: &str = "fxt.card.mock.analogin8";
    pub const MOCK_ANALOG_OUT8: &str = "fxt.card.mock.analogout8";
}

pub mod component {
    pub const WIRE64_BOOL: &str = "fxt.component.wire64.bool";
    pub const WIRE64_FLOAT: &str = "fxt.component.wire64.float";
    pub const AND_GATE: &str = "fxt.component.digital.and_gate";
    pub const BYTE_MUX: &str = "fxt.component.digital.byte_mux";
    pub const BYTE_DEMUX: &str = "fxt.component.digital.byte_demux";
    pub const BYTE_SPLITTER: &str = "fxt.component.digital.byte_splitter";
    pub const NBIT_MUX: &str = "fxt.component.digital.nbit_mux";
    pub const NBIT_DEMUX: &str = "fxt.component.digital.nbit_demux";
    pub const ON_OFF: &str = "fxt.component.controller.on_off";
}

pub mod node {
    /// The only node type this crate's `NodeFactory` currently implements.
    pub const STANDARD: &str = "fxt.node.standard.v1";
}
