use std::convert::TryFrom;
use std::fmt;

use crate::capability::c_field;
use crate::error::{Error, Result};
use crate::v4l_sys::*;

/// Control data type
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Type {
    Integer         = 1,
    Boolean         = 2,
    Menu            = 3,
    Button          = 4,
    Integer64       = 5,
    CtrlClass       = 6,
    String          = 7,
    Bitmask         = 8,
    IntegerMenu     = 9,

    /* Compound types are >= 0x0100 */
    U8              = 0x0100,
    U16             = 0x0101,
    U32             = 0x0102,
    Area            = 0x0106,

    Unknown(u32),
}

impl From<u32> for Type {
    fn from(repr: u32) -> Self {
        match repr {
            1 => Self::Integer,
            2 => Self::Boolean,
            3 => Self::Menu,
            4 => Self::Button,
            5 => Self::Integer64,
            6 => Self::CtrlClass,
            7 => Self::String,
            8 => Self::Bitmask,
            9 => Self::IntegerMenu,

            0x0100 => Self::U8,
            0x0101 => Self::U16,
            0x0102 => Self::U32,
            0x0106 => Self::Area,
            repr => Self::Unknown(repr),
        }
    }
}

impl From<Type> for u32 {
    fn from(t: Type) -> Self {
        match t {
            Type::Integer => 1,
            Type::Boolean => 2,
            Type::Menu => 3,
            Type::Button => 4,
            Type::Integer64 => 5,
            Type::CtrlClass => 6,
            Type::String => 7,
            Type::Bitmask => 8,
            Type::IntegerMenu => 9,

            Type::U8 => 0x0100,
            Type::U16 => 0x0101,
            Type::U32 => 0x0102,
            Type::Area => 0x0106,
            Type::Unknown(t) => t,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags: u32 {
        const DISABLED              = 0x0001;
        const GRABBED               = 0x0002;
        const READ_ONLY             = 0x0004;
        const UPDATE                = 0x0008;
        const INACTIVE              = 0x0010;
        const SLIDER                = 0x0020;
        const WRITE_ONLY            = 0x0040;
        const VOLATILE              = 0x0080;
        const HAS_PAYLOAD           = 0x0100;
        const EXECUTE_ON_WRITE      = 0x0200;
        const MODIFY_LAYOUT         = 0x0400;

        const NEXT_CTRL             = 0x80000000;
        const NEXT_COMPOUND         = 0x40000000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device control menu item
pub enum MenuItem {
    Name(String),
    Value(i64),
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuItem::Name(name) => write!(f, "{}", name),
            MenuItem::Value(value) => write!(f, "{}", value),
        }
    }
}

impl TryFrom<(Type, v4l2_querymenu)> for MenuItem {
    type Error = ();

    fn try_from(item: (Type, v4l2_querymenu)) -> std::result::Result<Self, Self::Error> {
        // v4l2_querymenu is packed, copy the union out before looking at it
        let data = item.1.__bindgen_anon_1;
        unsafe {
            match item.0 {
                Type::Menu => Ok(MenuItem::Name(c_field(&data.name))),
                Type::IntegerMenu => Ok(MenuItem::Value(data.value)),
                _ => Err(()),
            }
        }
    }
}

#[derive(Debug, Clone)]
/// Device control description
pub struct Description {
    /// Control identifier, set by the the application
    pub id: u32,
    /// Type of control
    pub typ: Type,
    /// Name of the control, intended for the user
    pub name: String,
    /// Minimum value, inclusive
    pub minimum: i64,
    /// Maximum value, inclusive
    pub maximum: i64,
    /// Step size, always positive
    pub step: u64,
    /// Default value
    pub default: i64,
    /// Control flags
    pub flags: Flags,
    /// Size of a single element in bytes
    pub elem_size: u32,
    /// Number of elements, one unless this is an array control
    pub elems: u32,

    /// Items for menu controls (only valid if typ is a menu type)
    pub items: Option<Vec<(u32, MenuItem)>>,
}

impl Description {
    /// Whether the value is exchanged through a pointer (`VIDIOC_G_EXT_CTRLS`)
    pub fn has_payload(&self) -> bool {
        self.flags.contains(Flags::HAS_PAYLOAD)
    }

    /// Checks `value` against the reported type, range and element count
    ///
    /// Arrays must not be longer than the control; every element has to lie within
    /// `minimum..=maximum`.
    ///
    /// Catches what the driver would reject anyway, without a round trip to the kernel.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if self.flags.contains(Flags::READ_ONLY) {
            return Err(Error::Validation(format!(
                "control '{}' is read-only",
                self.name
            )));
        }

        match (self.typ, value) {
            (Type::String, _) => Err(Error::Unsupported(format!(
                "setting string control '{}'",
                self.name
            ))),
            (Type::Button, Value::None) => Ok(()),
            (
                Type::Integer
                | Type::Integer64
                | Type::Menu
                | Type::IntegerMenu
                | Type::Bitmask
                | Type::Boolean,
                Value::Integer(v),
            ) => self.check_range(*v),
            (Type::Boolean, Value::Boolean(v)) => self.check_range(*v as i64),
            (_, Value::CompoundU8(v)) if self.elem_size == 1 => {
                self.check_elements(v.iter().map(|&e| e as i64), v.len(), self.elems as usize)
            }
            (_, Value::CompoundU16(v)) if self.elem_size == 2 => {
                self.check_elements(v.iter().map(|&e| e as i64), v.len(), self.elems as usize)
            }
            (_, Value::CompoundU32(v)) if self.elem_size == 4 => {
                self.check_elements(v.iter().map(|&e| e as i64), v.len(), self.elems as usize)
            }
            (_, Value::CompoundPtr(v)) if self.has_payload() => {
                // raw payloads are checked byte by byte
                self.check_elements(v.iter().map(|&e| e as i64), v.len(), self.payload_size())
            }
            (typ, value) => Err(Error::Validation(format!(
                "control '{}' of type {} cannot hold {:?}",
                self.name, typ, value
            ))),
        }
    }

    fn check_range(&self, value: i64) -> Result<()> {
        if value < self.minimum || value > self.maximum {
            return Err(Error::Validation(format!(
                "value {} of control '{}' is outside of {}..={}",
                value, self.name, self.minimum, self.maximum
            )));
        }
        Ok(())
    }

    /// Bytes of one complete payload
    pub fn payload_size(&self) -> usize {
        self.elems as usize * self.elem_size as usize
    }

    /// Arrays may be shorter than the control; the missing elements are set to zero
    fn check_elements(
        &self,
        values: impl Iterator<Item = i64>,
        count: usize,
        limit: usize,
    ) -> Result<()> {
        if !self.has_payload() {
            return Err(Error::Validation(format!(
                "control '{}' does not take an array",
                self.name
            )));
        }
        if count > limit {
            return Err(Error::Validation(format!(
                "control '{}' takes at most {} elements, got {}",
                self.name, limit, count
            )));
        }
        for value in values {
            self.check_range(value)?;
        }
        Ok(())
    }
}

impl From<v4l2_query_ext_ctrl> for Description {
    fn from(ctrl: v4l2_query_ext_ctrl) -> Self {
        let name: Vec<u8> = ctrl.name.iter().map(|&c| c as u8).collect();
        Self {
            id: ctrl.id,
            typ: Type::from(ctrl.type_),
            name: c_field(&name),
            minimum: ctrl.minimum,
            maximum: ctrl.maximum,
            step: ctrl.step,
            default: ctrl.default_value,
            flags: Flags::from(ctrl.flags),
            elem_size: ctrl.elem_size,
            elems: ctrl.elems,
            items: None,
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID         : {}", self.id)?;
        writeln!(f, "Type       : {}", self.typ)?;
        writeln!(f, "Name       : {}", self.name)?;
        writeln!(f, "Minimum    : {}", self.minimum)?;
        writeln!(f, "Maximum    : {}", self.maximum)?;
        writeln!(f, "Step       : {}", self.step)?;
        writeln!(f, "Default    : {}", self.default)?;
        writeln!(f, "Flags      : {}", self.flags)?;
        if let Some(items) = &self.items {
            writeln!(f, "Menu ==>")?;
            for item in items {
                writeln!(f, " * {}", item.1)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device control value
pub enum Value {
    /* buttons */
    None,
    /* single values */
    Integer(i64),
    Boolean(bool),
    String(String),
    /* compound (matrix) values */
    CompoundU8(Vec<u8>),
    CompoundU16(Vec<u16>),
    CompoundU32(Vec<u32>),
    CompoundPtr(Vec<u8>),
}
