//! # Device Identity
//!
//! Manufacturers, products, radio modes and the (manufacturer, product,
//! sensor id) key that identifies a physical MiHome device.
//!
//! Control products (the OOK sockets) additionally map to a socket number
//! 0-4, where 0 addresses every socket on a house address. The mapping is a
//! closed bijection over the five control products; any other product maps
//! to socket 0.

use crate::constants::OT_MANUFACTURER_ENERGENIE;
use crate::error::MiHomeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Radio mode used to talk to a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mode {
    None,
    /// OpenThings telemetry, FSK modulation
    Monitor,
    /// On/off sockets, OOK modulation
    Control,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::None, Mode::Monitor, Mode::Control];

    fn short_name(self) -> &'static str {
        match self {
            Mode::None => "NONE",
            Mode::Monitor => "MONITOR",
            Mode::Control => "CONTROL",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MIHOME_MODE_{}", self.short_name())
    }
}

impl FromStr for Mode {
    type Err = MiHomeError;

    /// Accepts `monitor`, `MONITOR` or `MIHOME_MODE_MONITOR` style names.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let upper = value.trim().to_uppercase();
        for mode in Mode::ALL {
            if upper == mode.to_string() || upper == mode.short_name() {
                return Ok(mode);
            }
        }
        let names: Vec<String> = Mode::ALL
            .iter()
            .map(|m| m.short_name().to_lowercase())
            .collect();
        Err(MiHomeError::BadParameter(format!(
            "Invalid mode '{}'. Possible values are {}",
            value.trim(),
            names.join(", ")
        )))
    }
}

/// OpenThings manufacturer codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Manufacturer {
    None = 0x00,
    Sentec = 0x01,
    Hildebrand = 0x02,
    Energenie = OT_MANUFACTURER_ENERGENIE,
}

impl TryFrom<u8> for Manufacturer {
    type Error = MiHomeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x00 => Ok(Manufacturer::None),
            0x01 => Ok(Manufacturer::Sentec),
            0x02 => Ok(Manufacturer::Hildebrand),
            OT_MANUFACTURER_ENERGENIE => Ok(Manufacturer::Energenie),
            other => Err(MiHomeError::BadParameter(format!(
                "unknown manufacturer 0x{other:02X}"
            ))),
        }
    }
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Manufacturer::None => "OT_MANUFACTURER_NONE",
            Manufacturer::Sentec => "OT_MANUFACTURER_SENTEC",
            Manufacturer::Hildebrand => "OT_MANUFACTURER_HILDEBRAND",
            Manufacturer::Energenie => "OT_MANUFACTURER_ENERGENIE",
        };
        f.write_str(name)
    }
}

/// MiHome product codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Product {
    None = 0x00,
    /// Adaptor Monitor
    Miho004 = 0x01,
    /// Adaptor Plus
    Miho005 = 0x02,
    /// Radiator valve (eTRV)
    Miho013 = 0x03,
    /// House Monitor
    Miho006 = 0x05,
    /// Motion sensor
    Miho032 = 0x0C,
    /// Door sensor
    Miho033 = 0x0D,
    ControlAll = 0xF0,
    ControlOne = 0xF1,
    ControlTwo = 0xF2,
    ControlThree = 0xF3,
    ControlFour = 0xF4,
}

impl Product {
    pub const ALL: [Product; 12] = [
        Product::None,
        Product::Miho004,
        Product::Miho005,
        Product::Miho013,
        Product::Miho006,
        Product::Miho032,
        Product::Miho033,
        Product::ControlAll,
        Product::ControlOne,
        Product::ControlTwo,
        Product::ControlThree,
        Product::ControlFour,
    ];

    /// Wire code of the product
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Radio mode used by the product
    pub fn mode(self) -> Mode {
        match self {
            Product::Miho004
            | Product::Miho005
            | Product::Miho013
            | Product::Miho006
            | Product::Miho032
            | Product::Miho033 => Mode::Monitor,
            Product::ControlAll
            | Product::ControlOne
            | Product::ControlTwo
            | Product::ControlThree
            | Product::ControlFour => Mode::Control,
            Product::None => Mode::None,
        }
    }

    /// Socket number of a control product; 0 ("all") for anything else
    pub fn socket(self) -> u8 {
        match self {
            Product::ControlOne => 1,
            Product::ControlTwo => 2,
            Product::ControlThree => 3,
            Product::ControlFour => 4,
            _ => 0,
        }
    }

    /// Control product for a socket number, `Product::None` when undefined
    pub fn from_socket(socket: u8) -> Product {
        match socket {
            0 => Product::ControlAll,
            1 => Product::ControlOne,
            2 => Product::ControlTwo,
            3 => Product::ControlThree,
            4 => Product::ControlFour,
            _ => Product::None,
        }
    }
}

impl TryFrom<u8> for Product {
    type Error = MiHomeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Product::ALL
            .iter()
            .copied()
            .find(|p| p.code() == code)
            .ok_or_else(|| MiHomeError::BadParameter(format!("unknown product 0x{code:02X}")))
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Product::None => "NONE",
            Product::Miho004 => "MIHO004",
            Product::Miho005 => "MIHO005",
            Product::Miho013 => "MIHO013",
            Product::Miho006 => "MIHO006",
            Product::Miho032 => "MIHO032",
            Product::Miho033 => "MIHO033",
            Product::ControlAll => "CONTROL_ALL",
            Product::ControlOne => "CONTROL_ONE",
            Product::ControlTwo => "CONTROL_TWO",
            Product::ControlThree => "CONTROL_THREE",
            Product::ControlFour => "CONTROL_FOUR",
        };
        write!(f, "MIHOME_PRODUCT_{name}")
    }
}

/// Radiator valve positions accepted by the eTRV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValveState {
    /// Valve fully open
    Open = 0x00,
    /// Valve fully closed
    Closed = 0x01,
    /// Valve under thermostatic control
    Normal = 0x02,
}

impl TryFrom<u64> for ValveState {
    type Error = MiHomeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ValveState::Open),
            0x01 => Ok(ValveState::Closed),
            0x02 => Ok(ValveState::Normal),
            other => Err(MiHomeError::BadParameter(format!(
                "unknown valve state {other}"
            ))),
        }
    }
}

impl fmt::Display for ValveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValveState::Open => "OPEN",
            ValveState::Closed => "CLOSED",
            ValveState::Normal => "NORMAL",
        };
        write!(f, "MIHOME_VALVE_STATE_{name}")
    }
}

/// Identifies a unique physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    manufacturer: Manufacturer,
    product: Product,
    sensor_id: u32,
}

impl DeviceKey {
    pub fn new(manufacturer: Manufacturer, product: Product, sensor_id: u32) -> Self {
        Self {
            manufacturer,
            product,
            sensor_id,
        }
    }

    /// Key of an Energenie device
    pub fn energenie(product: Product, sensor_id: u32) -> Self {
        Self::new(Manufacturer::Energenie, product, sensor_id)
    }

    pub fn manufacturer(&self) -> Manufacturer {
        self.manufacturer
    }

    pub fn product(&self) -> Product {
        self.product
    }

    pub fn sensor_id(&self) -> u32 {
        self.sensor_id
    }

    pub fn mode(&self) -> Mode {
        self.product.mode()
    }

    pub fn socket(&self) -> u8 {
        self.product.socket()
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ manufacturer={} product={} sensor=0x{:08X} }}",
            self.manufacturer, self.product, self.sensor_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_modes() {
        assert_eq!(Product::Miho013.mode(), Mode::Monitor);
        assert_eq!(Product::ControlThree.mode(), Mode::Control);
        assert_eq!(Product::None.mode(), Mode::None);
    }

    #[test]
    fn test_socket_bijection() {
        for socket in 0..=4u8 {
            let product = Product::from_socket(socket);
            assert_eq!(product.mode(), Mode::Control);
            assert_eq!(product.socket(), socket);
        }
        assert_eq!(Product::from_socket(5), Product::None);
        assert_eq!(Product::Miho004.socket(), 0);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("monitor".parse::<Mode>().unwrap(), Mode::Monitor);
        assert_eq!(" MIHOME_MODE_CONTROL ".parse::<Mode>().unwrap(), Mode::Control);
        assert!("".parse::<Mode>().is_err());

        let err = "fsk".parse::<Mode>().unwrap_err().to_string();
        assert!(err.contains("none, monitor, control"));
    }

    #[test]
    fn test_product_codes_round_trip() {
        for product in Product::ALL {
            assert_eq!(Product::try_from(product.code()).unwrap(), product);
        }
        assert!(Product::try_from(0x42).is_err());
    }
}
