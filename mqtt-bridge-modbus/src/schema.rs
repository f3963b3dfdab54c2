//! Register schema: what to read from each device and how to describe it.
//!
//! The schema is an ordered mapping from register id to descriptor. The id
//! is the holding register address for real registers, or any identifier
//! for pseudo-registers (no `length`), which are never read but still
//! published so the entity set stays uniform.

use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Binary interpretation of a register's words.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegisterKind {
    /// Unsigned 16-bit integer (default)
    #[default]
    U16,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 32-bit integer (2 words, high word first)
    U32,
    /// Signed 32-bit integer (2 words, high word first)
    I32,
    /// ASCII text, two characters per word
    String,
    /// Raw word sequence
    Raw,
    /// Single byte-sized value stored in one word
    Byte,
    /// Unrecognized type name; decoded like [`RegisterKind::Raw`]
    Other(String),
}

impl RegisterKind {
    /// Return the configuration name for this type.
    pub fn as_str(&self) -> &str {
        match self {
            RegisterKind::U16 => "U16",
            RegisterKind::I16 => "I16",
            RegisterKind::U32 => "U32",
            RegisterKind::I32 => "I32",
            RegisterKind::String => "STRING",
            RegisterKind::Raw => "RAW",
            RegisterKind::Byte => "BYTE",
            RegisterKind::Other(name) => name,
        }
    }

    /// Minimum number of words needed to produce a value.
    pub fn min_words(&self) -> u16 {
        match self {
            RegisterKind::U32 | RegisterKind::I32 => 2,
            _ => 1,
        }
    }
}

impl FromStr for RegisterKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "U16" => RegisterKind::U16,
            "I16" => RegisterKind::I16,
            "U32" => RegisterKind::U32,
            "I32" => RegisterKind::I32,
            "STRING" | "STR" => RegisterKind::String,
            "RAW" | "DAT" => RegisterKind::Raw,
            "BYTE" => RegisterKind::Byte,
            _ => RegisterKind::Other(s.to_string()),
        })
    }
}

impl From<String> for RegisterKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<RegisterKind> for String {
    fn from(kind: RegisterKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one logical register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDescriptor {
    /// Register id; the mapping key in configuration.
    #[serde(skip)]
    pub id: String,

    /// Data type interpretation
    #[serde(rename = "type", default)]
    pub kind: RegisterKind,

    /// Number of 16-bit words to read; absent or zero for pseudo-registers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u16>,

    /// Divisor applied to numeric values
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Human-readable name shown by the consumer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Unit of measurement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(
        default,
        alias = "hass_device_class",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_class: Option<String>,

    #[serde(
        default,
        alias = "hass_state_class",
        skip_serializing_if = "Option::is_none"
    )]
    pub state_class: Option<String>,

    #[serde(
        default,
        alias = "hass_value_template",
        skip_serializing_if = "Option::is_none"
    )]
    pub value_template: Option<String>,

    /// Topic segment override (defaults to the id)
    #[serde(default, alias = "mqtt", skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

fn default_scale() -> f64 {
    1.0
}

impl RegisterDescriptor {
    /// Create a descriptor with no length (a pseudo-register) and no metadata.
    pub fn new(id: impl Into<String>, kind: RegisterKind) -> Self {
        Self {
            id: id.into(),
            kind,
            length: None,
            scale: default_scale(),
            name: None,
            unit: None,
            device_class: None,
            state_class: None,
            value_template: None,
            slug: None,
        }
    }

    pub fn with_length(mut self, length: u16) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Topic segment for this register.
    pub fn slug(&self) -> &str {
        self.slug.as_deref().unwrap_or(&self.id)
    }

    /// Number of words to read, or `None` for a pseudo-register.
    pub fn word_count(&self) -> Option<u16> {
        self.length.filter(|&n| n > 0)
    }

    /// True when this register is never read from the device.
    pub fn is_pseudo(&self) -> bool {
        self.word_count().is_none()
    }

    /// Holding register address, parsed from the id.
    pub fn address(&self) -> Option<u16> {
        self.id.trim().parse().ok()
    }

    /// The `(address, count)` read request, or `None` for a pseudo-register.
    pub fn read_request(&self) -> Option<(u16, u16)> {
        Some((self.address()?, self.word_count()?))
    }

    /// Check the descriptor's internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.slug().is_empty() {
            return Err(format!("Register '{}': topic slug cannot be empty", self.id));
        }

        if self.slug().contains(['/', '+', '#']) {
            return Err(format!(
                "Register '{}': topic slug '{}' must not contain '/', '+' or '#'",
                self.id,
                self.slug()
            ));
        }

        if !self.scale.is_finite() || self.scale == 0.0 {
            return Err(format!(
                "Register '{}': scale must be a finite, non-zero number",
                self.id
            ));
        }

        if let Some(length) = self.word_count() {
            if self.address().is_none() {
                return Err(format!(
                    "Register '{}': id must be a register address (0-65535) when length is set",
                    self.id
                ));
            }

            if length < self.kind.min_words() {
                return Err(format!(
                    "Register '{}': type {} needs length >= {}, got {}",
                    self.id,
                    self.kind,
                    self.kind.min_words(),
                    length
                ));
            }
        }

        Ok(())
    }
}

/// Ordered register schema, in configuration file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterSchema {
    registers: Vec<RegisterDescriptor>,
}

impl RegisterSchema {
    pub fn new(registers: Vec<RegisterDescriptor>) -> Self {
        Self { registers }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegisterDescriptor> {
        self.registers.iter()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Look up a register by id.
    pub fn get(&self, id: &str) -> Option<&RegisterDescriptor> {
        self.registers.iter().find(|r| r.id == id)
    }

    /// Validate every descriptor and reject duplicate ids or slugs.
    pub fn validate(&self) -> Result<(), String> {
        let mut slugs = std::collections::HashSet::new();

        for (i, register) in self.registers.iter().enumerate() {
            register.validate()?;

            if self.registers[..i].iter().any(|r| r.id == register.id) {
                return Err(format!("Register '{}' is defined more than once", register.id));
            }

            if !slugs.insert(register.slug()) {
                return Err(format!(
                    "Register '{}': topic slug '{}' is already used",
                    register.id,
                    register.slug()
                ));
            }
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a RegisterSchema {
    type Item = &'a RegisterDescriptor;
    type IntoIter = std::slice::Iter<'a, RegisterDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for RegisterSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.registers.len()))?;
        for register in &self.registers {
            map.serialize_entry(&register.id, register)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RegisterSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = RegisterSchema;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of register id to register descriptor")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut registers = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, mut descriptor)) =
                    map.next_entry::<String, RegisterDescriptor>()?
                {
                    descriptor.id = id;
                    registers.push(descriptor);
                }
                Ok(RegisterSchema { registers })
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_file_order() {
        let json = r#"{
            "35103": { type: "U16", length: 1, name: "PV1 Voltage", unit: "V", scale: 10 },
            "35000": { type: "STR", length: 8, mqtt: "model" },
            battery_soc_calc: { name: "Battery SoC (calc)", unit: "%" },
        }"#;

        let schema: RegisterSchema = json5::from_str(json).unwrap();
        let ids: Vec<_> = schema.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["35103", "35000", "battery_soc_calc"]);

        let pv = schema.get("35103").unwrap();
        assert_eq!(pv.read_request(), Some((35103, 1)));
        assert_eq!(pv.scale, 10.0);
        assert_eq!(pv.slug(), "35103");

        let model = schema.get("35000").unwrap();
        assert_eq!(model.kind, RegisterKind::String);
        assert_eq!(model.slug(), "model");

        let calc = schema.get("battery_soc_calc").unwrap();
        assert!(calc.is_pseudo());
        assert_eq!(calc.kind, RegisterKind::U16);
        assert_eq!(calc.read_request(), None);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_kind_aliases_and_unknown_names() {
        assert_eq!("STR".parse::<RegisterKind>().unwrap(), RegisterKind::String);
        assert_eq!("DAT".parse::<RegisterKind>().unwrap(), RegisterKind::Raw);
        assert_eq!(
            "i32".parse::<RegisterKind>().unwrap(),
            RegisterKind::Other("i32".to_string())
        );
        assert_eq!(
            "F32".parse::<RegisterKind>().unwrap(),
            RegisterKind::Other("F32".to_string())
        );
        assert_eq!(RegisterKind::Other("F32".to_string()).as_str(), "F32");
    }

    #[test]
    fn test_hass_aliases() {
        let json = r#"{
            "100": {
                length: 1,
                hass_device_class: "power",
                hass_state_class: "measurement",
                hass_value_template: "{{ value | int }}",
            },
        }"#;

        let schema: RegisterSchema = json5::from_str(json).unwrap();
        let reg = schema.get("100").unwrap();
        assert_eq!(reg.device_class.as_deref(), Some("power"));
        assert_eq!(reg.state_class.as_deref(), Some("measurement"));
        assert_eq!(reg.value_template.as_deref(), Some("{{ value | int }}"));
    }

    #[test]
    fn test_zero_length_is_pseudo() {
        let reg = RegisterDescriptor::new("total", RegisterKind::U16).with_length(0);
        assert!(reg.is_pseudo());
        assert!(reg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_32bit_register() {
        let reg = RegisterDescriptor::new("100", RegisterKind::U32).with_length(1);
        assert!(reg.validate().is_err());

        let reg = RegisterDescriptor::new("100", RegisterKind::I32).with_length(2);
        assert!(reg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_numeric_address() {
        let reg = RegisterDescriptor::new("power", RegisterKind::U16).with_length(1);
        assert!(reg.validate().is_err());

        let reg = RegisterDescriptor::new("70000", RegisterKind::U16).with_length(1);
        assert!(reg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_scale() {
        let reg = RegisterDescriptor::new("100", RegisterKind::U16)
            .with_length(1)
            .with_scale(0.0);
        assert!(reg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_wildcard_slug() {
        let reg = RegisterDescriptor::new("100", RegisterKind::U16).with_slug("a/b");
        assert!(reg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_slugs() {
        let schema = RegisterSchema::new(vec![
            RegisterDescriptor::new("100", RegisterKind::U16).with_slug("power"),
            RegisterDescriptor::new("101", RegisterKind::U16).with_slug("power"),
        ]);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_serialize_round_trips_order() {
        let schema = RegisterSchema::new(vec![
            RegisterDescriptor::new("200", RegisterKind::I16).with_length(1),
            RegisterDescriptor::new("100", RegisterKind::U32).with_length(2),
        ]);

        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.find("\"200\"").unwrap() < json.find("\"100\"").unwrap());

        let parsed: RegisterSchema = json5::from_str(&json).unwrap();
        assert_eq!(parsed, schema);
    }
}
