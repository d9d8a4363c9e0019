use crate::error::MiHomeError;
use crate::payload::data_encoding::{decode_value, encode_value, MAX_NUMERIC_WIDTH};
use std::fmt;

/// OpenThings record data types.
///
/// `UDecN`/`DecN` are fixed-point numbers with a binary point of N bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    UDec0,
    UDec4,
    UDec8,
    UDec12,
    UDec16,
    UDec20,
    UDec24,
    String,
    Dec0,
    Dec8,
    Dec16,
    Dec24,
    /// Reserved by the protocol; carried but never interpreted
    Float,
}

impl DataType {
    /// Type code as carried in the high nibble of the type/length byte.
    pub fn code(self) -> u8 {
        match self {
            DataType::UDec0 => 0x0,
            DataType::UDec4 => 0x1,
            DataType::UDec8 => 0x2,
            DataType::UDec12 => 0x3,
            DataType::UDec16 => 0x4,
            DataType::UDec20 => 0x5,
            DataType::UDec24 => 0x6,
            DataType::String => 0x7,
            DataType::Dec0 => 0x8,
            DataType::Dec8 => 0x9,
            DataType::Dec16 => 0xA,
            DataType::Dec24 => 0xB,
            DataType::Float => 0xF,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, MiHomeError> {
        match code {
            0x0 => Ok(DataType::UDec0),
            0x1 => Ok(DataType::UDec4),
            0x2 => Ok(DataType::UDec8),
            0x3 => Ok(DataType::UDec12),
            0x4 => Ok(DataType::UDec16),
            0x5 => Ok(DataType::UDec20),
            0x6 => Ok(DataType::UDec24),
            0x7 => Ok(DataType::String),
            0x8 => Ok(DataType::Dec0),
            0x9 => Ok(DataType::Dec8),
            0xA => Ok(DataType::Dec16),
            0xB => Ok(DataType::Dec24),
            0xF => Ok(DataType::Float),
            other => Err(MiHomeError::RecordDecodeError(format!(
                "reserved data type 0x{other:X}"
            ))),
        }
    }

    /// Binary point of numeric types, `None` for STRING and FLOAT.
    pub fn binary_point(self) -> Option<u32> {
        match self {
            DataType::UDec0 | DataType::Dec0 => Some(0),
            DataType::UDec4 => Some(4),
            DataType::UDec8 | DataType::Dec8 => Some(8),
            DataType::UDec12 => Some(12),
            DataType::UDec16 | DataType::Dec16 => Some(16),
            DataType::UDec20 => Some(20),
            DataType::UDec24 | DataType::Dec24 => Some(24),
            DataType::String | DataType::Float => None,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            DataType::Dec0 | DataType::Dec8 | DataType::Dec16 | DataType::Dec24
        )
    }

    pub fn is_numeric(self) -> bool {
        self.binary_point().is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::UDec0 => "UDEC_0",
            DataType::UDec4 => "UDEC_4",
            DataType::UDec8 => "UDEC_8",
            DataType::UDec12 => "UDEC_12",
            DataType::UDec16 => "UDEC_16",
            DataType::UDec20 => "UDEC_20",
            DataType::UDec24 => "UDEC_24",
            DataType::String => "STRING",
            DataType::Dec0 => "DEC_0",
            DataType::Dec8 => "DEC_8",
            DataType::Dec16 => "DEC_16",
            DataType::Dec24 => "DEC_24",
            DataType::Float => "FLOAT",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A data type together with the byte width declared for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    data_type: DataType,
    width: usize,
}

impl FieldType {
    pub fn new(data_type: DataType, width: usize) -> Result<Self, MiHomeError> {
        let max = if data_type.is_numeric() {
            MAX_NUMERIC_WIDTH
        } else {
            crate::constants::OT_RECORD_MAX_LENGTH
        };
        if width > max {
            return Err(MiHomeError::BadParameter(format!(
                "{data_type} cannot be {width} bytes wide (max {max})"
            )));
        }
        Ok(Self { data_type, width })
    }

    /// Parses the wire type/length byte.
    pub fn from_byte(byte: u8) -> Result<Self, MiHomeError> {
        let data_type = DataType::from_code(byte >> 4)?;
        Self::new(data_type, (byte & 0x0F) as usize)
            .map_err(|e| MiHomeError::RecordDecodeError(e.to_string()))
    }

    pub fn to_byte(self) -> u8 {
        (self.data_type.code() << 4) | (self.width as u8 & 0x0F)
    }

    pub fn data_type(self) -> DataType {
        self.data_type
    }

    pub fn width(self) -> usize {
        self.width
    }
}

/// A decoded record value
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Uint(u64),
    Int(i64),
    Float(f64),
    String(String),
}

impl RecordValue {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordValue::Uint(_) => "uint",
            RecordValue::Int(_) => "int",
            RecordValue::Float(_) => "float",
            RecordValue::String(_) => "string",
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Uint(v) => write!(f, "{v}"),
            RecordValue::Int(v) => write!(f, "{v}"),
            RecordValue::Float(v) => write!(f, "{v}"),
            RecordValue::String(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! parameter_names {
    ($( $(#[$doc:meta])* $variant:ident = $id:literal, $label:literal; )*) => {
        /// Parameter identifiers known to OpenThings devices
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ParameterName {
            $( $(#[$doc])* $variant, )*
        }

        impl ParameterName {
            pub const ALL: &'static [ParameterName] = &[ $( ParameterName::$variant, )* ];

            /// Identifier without the request bit
            pub fn id(self) -> u8 {
                match self {
                    $( ParameterName::$variant => $id, )*
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $( ParameterName::$variant => $label, )*
                }
            }

            pub fn from_id(id: u8) -> Result<Self, MiHomeError> {
                match id {
                    $( $id => Ok(ParameterName::$variant), )*
                    other => Err(MiHomeError::RecordDecodeError(format!(
                        "unknown parameter 0x{other:02X}"
                    ))),
                }
            }
        }
    };
}

parameter_names! {
    Alarm = 0x21, "alarm";
    /// eTRV: run the valve through its travel
    ExerciseValve = 0x23, "exercise-valve";
    /// eTRV: battery saving mode
    LowPowerMode = 0x24, "low-power-mode";
    /// eTRV: force the valve open, closed or normal
    ValveState = 0x25, "valve-state";
    /// eTRV: diagnostic flags
    Diagnostics = 0x26, "diagnostics";
    DebugOutput = 0x2D, "debug-output";
    Identify = 0x3F, "identify";
    SourceSelector = 0x40, "source-selector";
    WaterDetector = 0x41, "water-detector";
    GlassBreakage = 0x42, "glass-breakage";
    Closures = 0x43, "closures";
    DoorBell = 0x44, "door-bell";
    Energy = 0x45, "energy";
    FallSensor = 0x46, "fall-sensor";
    GasVolume = 0x47, "gas-volume";
    AirPressure = 0x48, "air-pressure";
    Illuminance = 0x49, "illuminance";
    Level = 0x4C, "level";
    Rainfall = 0x4D, "rainfall";
    ApparentPower = 0x50, "apparent-power";
    PowerFactor = 0x51, "power-factor";
    ReportPeriod = 0x52, "report-period";
    SmokeDetector = 0x53, "smoke-detector";
    TimeAndDate = 0x54, "time-and-date";
    Vibration = 0x56, "vibration";
    WaterVolume = 0x57, "water-volume";
    WindSpeed = 0x58, "wind-speed";
    GasPressure = 0x61, "gas-pressure";
    BatteryLevel = 0x62, "battery-level";
    CoDetector = 0x63, "co-detector";
    DoorSensor = 0x64, "door-sensor";
    Emergency = 0x65, "emergency";
    Frequency = 0x66, "frequency";
    GasFlowRate = 0x67, "gas-flow-rate";
    RelativeHumidity = 0x68, "relative-humidity";
    Current = 0x69, "current";
    Join = 0x6A, "join";
    LightLevel = 0x6C, "light-level";
    MotionDetector = 0x6D, "motion-detector";
    Occupancy = 0x6F, "occupancy";
    RealPower = 0x70, "real-power";
    ReactivePower = 0x71, "reactive-power";
    RotationSpeed = 0x72, "rotation-speed";
    SwitchState = 0x73, "switch-state";
    Temperature = 0x74, "temperature";
    Voltage = 0x76, "voltage";
    WaterFlowRate = 0x77, "water-flow-rate";
    WaterPressure = 0x78, "water-pressure";
    Phase1Power = 0x79, "phase-1-power";
    Phase2Power = 0x7A, "phase-2-power";
    Phase3Power = 0x7B, "phase-3-power";
    ThreePhaseTotal = 0x7D, "3-phase-total";
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named, typed parameter carried by a telemetry payload.
///
/// The raw bytes are kept as received; typed accessors decode on demand and
/// refuse to coerce between types.
#[derive(Debug, Clone)]
pub struct ParameterRecord {
    name: ParameterName,
    field: FieldType,
    is_report: bool,
    data: Vec<u8>,
}

impl ParameterRecord {
    /// Builds a record by encoding `value` into `field`.
    pub fn from_value(
        name: ParameterName,
        is_report: bool,
        field: FieldType,
        value: &RecordValue,
    ) -> Result<Self, MiHomeError> {
        let data = encode_value(value, field)?;
        Ok(Self {
            name,
            field,
            is_report,
            data,
        })
    }

    /// Builds a record from received bytes, checking they decode as `field`.
    pub fn from_bytes(
        name: ParameterName,
        is_report: bool,
        field: FieldType,
        bytes: &[u8],
    ) -> Result<Self, MiHomeError> {
        if field.data_type() != DataType::Float {
            decode_value(bytes, field)?;
        } else if bytes.len() != field.width() {
            return Err(MiHomeError::RecordDecodeError(format!(
                "expected {} bytes for FLOAT, got {}",
                field.width(),
                bytes.len()
            )));
        }
        Ok(Self {
            name,
            field,
            is_report,
            data: bytes.to_vec(),
        })
    }

    /// A zero-width UDEC_0 record, used by commands that carry no value.
    pub fn empty(name: ParameterName, is_report: bool) -> Self {
        Self {
            name,
            field: FieldType {
                data_type: DataType::UDec0,
                width: 0,
            },
            is_report,
            data: Vec::new(),
        }
    }

    /// A STRING record sized to `value`.
    pub fn string(name: ParameterName, is_report: bool, value: &str) -> Result<Self, MiHomeError> {
        let field = FieldType::new(DataType::String, value.len())?;
        Self::from_value(name, is_report, field, &RecordValue::String(value.to_string()))
    }

    pub fn name(&self) -> ParameterName {
        self.name
    }

    pub fn data_type(&self) -> DataType {
        self.field.data_type()
    }

    pub fn field_type(&self) -> FieldType {
        self.field
    }

    pub fn is_report(&self) -> bool {
        self.is_report
    }

    /// Raw record bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn value(&self) -> Result<RecordValue, MiHomeError> {
        decode_value(&self.data, self.field)
    }

    /// Value of a UDEC_0 record
    pub fn uint_value(&self) -> Result<u64, MiHomeError> {
        self.expect_type("uint", |t| t == DataType::UDec0)?;
        match self.value()? {
            RecordValue::Uint(v) => Ok(v),
            _ => Err(self.mismatch("uint")),
        }
    }

    /// Value of a DEC_0 record
    pub fn int_value(&self) -> Result<i64, MiHomeError> {
        self.expect_type("int", |t| t == DataType::Dec0)?;
        match self.value()? {
            RecordValue::Int(v) => Ok(v),
            _ => Err(self.mismatch("int")),
        }
    }

    /// Value of any UDEC or DEC record
    pub fn float_value(&self) -> Result<f64, MiHomeError> {
        self.expect_type("float", DataType::is_numeric)?;
        match self.value()? {
            RecordValue::Uint(v) => Ok(v as f64),
            RecordValue::Int(v) => Ok(v as f64),
            RecordValue::Float(v) => Ok(v),
            RecordValue::String(_) => Err(self.mismatch("float")),
        }
    }

    /// Value of a STRING record
    pub fn string_value(&self) -> Result<String, MiHomeError> {
        self.expect_type("string", |t| t == DataType::String)?;
        match self.value()? {
            RecordValue::String(v) => Ok(v),
            _ => Err(self.mismatch("string")),
        }
    }

    /// Non-zero test of a UDEC_0 record
    pub fn bool_value(&self) -> Result<bool, MiHomeError> {
        self.expect_type("bool", |t| t == DataType::UDec0)?;
        Ok(self.uint_value()? != 0)
    }

    /// Byte-level identity: name, report flag and raw bytes.
    pub fn is_duplicate(&self, other: &ParameterRecord) -> bool {
        self.name == other.name && self.is_report == other.is_report && self.data == other.data
    }

    fn expect_type(
        &self,
        requested: &'static str,
        accepts: impl Fn(DataType) -> bool,
    ) -> Result<(), MiHomeError> {
        if accepts(self.data_type()) {
            Ok(())
        } else {
            Err(self.mismatch(requested))
        }
    }

    fn mismatch(&self, requested: &'static str) -> MiHomeError {
        MiHomeError::TypeMismatchError {
            requested,
            actual: self.data_type().name(),
        }
    }
}

impl PartialEq for ParameterRecord {
    fn eq(&self, other: &Self) -> bool {
        self.is_duplicate(other)
    }
}

impl Eq for ParameterRecord {}

impl fmt::Display for ParameterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_report { "report" } else { "request" };
        match self.value() {
            Ok(v) => write!(f, "{}<{}>={} ({})", self.name, self.data_type(), v, kind),
            Err(_) => write!(
                f,
                "{}<{}>=0x{} ({})",
                self.name,
                self.data_type(),
                hex::encode_upper(&self.data),
                kind
            ),
        }
    }
}
