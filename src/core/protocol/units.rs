//! Unit resolver
//!
//! Each field value ends in one unit character whose meaning depends on the
//! field it modifies: `M` is m/s for a wind speed, mmHg for pressure and mm
//! for rain accumulation. Labels are first classified into a [`FieldGroup`],
//! then the unit character is looked up in that group's table.

use super::error::DecodeError;
use serde::ser::{Serialize, SerializeTuple, Serializer};
use std::fmt;

/// Unit character the device uses for "no valid value"
pub const INVALID_MARKER: char = '#';

const TEMPERATURE: &[(char, &str)] = &[('C', "C"), ('F', "F")];
const SPEED: &[(char, &str)] = &[('M', "m/s"), ('K', "km/h"), ('S', "mph"), ('N', "kn")];
const DIRECTION: &[(char, &str)] = &[('D', "deg")];
const PRESSURE: &[(char, &str)] = &[
    ('H', "hPa"),
    ('P', "Pa"),
    ('B', "bar"),
    ('M', "mmHg"),
    ('I', "inHg"),
];
const HUMIDITY: &[(char, &str)] = &[('P', "%")];
// The vendor manual documents 'S' but devices send 's'
const DURATION: &[(char, &str)] = &[('S', "s"), ('s', "s")];
const RAIN_INTENSITY: &[(char, &str)] = &[('M', "mm/h"), ('I', "in/h")];
const RAIN_ACCUMULATION: &[(char, &str)] = &[('M', "mm"), ('I', "in")];
const HAIL_INTENSITY: &[(char, &str)] = &[('M', "hits/cm2h"), ('I', "hits/in2h"), ('H', "hits/h")];
const HAIL_ACCUMULATION: &[(char, &str)] = &[('M', "hits/cm2"), ('I', "hits/in2"), ('H', "hits")];
const HEATING_STATUS: &[(char, &str)] = &[
    ('N', "0% hi-"),
    ('V', "50% mid-hi"),
    ('W', "100% lo-mid"),
    ('F', "50% -lo"),
];
const VOLTAGE: &[(char, &str)] = &[('V', "V")];

/// Field groups sharing one unit table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    /// `Id`, carries no unit
    Identifier,
    /// `T*`
    Temperature,
    /// `S*`
    Speed,
    /// `D*`
    Direction,
    /// `Pa`
    Pressure,
    /// `Ua`
    Humidity,
    /// `*d`
    Duration,
    /// `Ri`, `Rp`
    RainIntensity,
    /// `Rc`
    RainAccumulation,
    /// `Hi`, `Hp`
    HailIntensity,
    /// `Hc`
    HailAccumulation,
    /// `Vh`, the unit character is a heating status rather than a unit
    HeatingStatus,
    /// `V*`
    Voltage,
    /// Any other label, carries no unit
    Unclassified,
}

impl FieldGroup {
    /// Classify a label. Rules are tried in order and the first match wins,
    /// so `Id` never reaches the duration rule and `Vh` never reaches the
    /// voltage rule.
    pub fn classify(label: &str) -> Self {
        match label {
            "Id" => Self::Identifier,
            l if l.starts_with('T') => Self::Temperature,
            l if l.starts_with('S') => Self::Speed,
            l if l.starts_with('D') => Self::Direction,
            "Pa" => Self::Pressure,
            "Ua" => Self::Humidity,
            l if l.ends_with('d') => Self::Duration,
            "Ri" | "Rp" => Self::RainIntensity,
            "Rc" => Self::RainAccumulation,
            "Hi" | "Hp" => Self::HailIntensity,
            "Hc" => Self::HailAccumulation,
            "Vh" => Self::HeatingStatus,
            l if l.starts_with('V') => Self::Voltage,
            _ => Self::Unclassified,
        }
    }

    /// Unit table for this group. Unitless groups have an empty table.
    pub fn table(self) -> &'static [(char, &'static str)] {
        match self {
            Self::Identifier | Self::Unclassified => &[],
            Self::Temperature => TEMPERATURE,
            Self::Speed => SPEED,
            Self::Direction => DIRECTION,
            Self::Pressure => PRESSURE,
            Self::Humidity => HUMIDITY,
            Self::Duration => DURATION,
            Self::RainIntensity => RAIN_INTENSITY,
            Self::RainAccumulation => RAIN_ACCUMULATION,
            Self::HailIntensity => HAIL_INTENSITY,
            Self::HailAccumulation => HAIL_ACCUMULATION,
            Self::HeatingStatus => HEATING_STATUS,
            Self::Voltage => VOLTAGE,
        }
    }

    /// Look up a unit character, `None` when the table has no entry for it
    pub fn lookup(self, unit: char) -> Option<Unit> {
        match self {
            Self::Identifier | Self::Unclassified => Some(Unit::Unitless),
            Self::HeatingStatus => find(self.table(), unit).map(Unit::HeatingStatus),
            _ => find(self.table(), unit).map(Unit::Symbol),
        }
    }
}

fn find(table: &'static [(char, &'static str)], unit: char) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == unit).map(|(_, s)| *s)
}

/// Resolved unit of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Physical unit symbol, e.g. `m/s`
    Symbol(&'static str),
    /// Heater status reported by `Vh`, e.g. `50% mid-hi`
    HeatingStatus(&'static str),
    /// Device reported "no valid value"
    Invalid,
    /// Field carries no unit
    Unitless,
}

impl Unit {
    /// Text form, `None` for unitless fields
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Self::Symbol(s) | Self::HeatingStatus(s) => Some(*s),
            Self::Invalid => Some("invalid"),
            Self::Unitless => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or(""))
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(s) => serializer.serialize_str(s),
            None => serializer.serialize_none(),
        }
    }
}

/// Magnitude and unit of one field.
///
/// Only [`resolve`] builds these; they serialize as `[magnitude, unit]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitValue {
    value: f64,
    unit: Unit,
}

impl UnitValue {
    /// Numeric magnitude
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Resolved unit
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Heater status string of a `Vh` value. `"invalid"` when the device
    /// flagged the value, `None` for any other kind of field.
    pub fn status(&self) -> Option<&'static str> {
        match self.unit {
            Unit::HeatingStatus(_) | Unit::Invalid => self.unit.as_str(),
            _ => None,
        }
    }

    /// The same magnitude reported in volts. `Vh` carries the heating
    /// voltage in its magnitude and the heater status in its unit.
    pub(crate) fn as_volts(self) -> Self {
        Self {
            value: self.value,
            unit: Unit::Symbol("V"),
        }
    }
}

impl fmt::Display for UnitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            Unit::Unitless => write!(f, "{}", self.value),
            unit => write!(f, "{} {}", self.value, unit),
        }
    }
}

impl Serialize for UnitValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.value)?;
        tuple.serialize_element(&self.unit)?;
        tuple.end()
    }
}

/// Resolve the unit character of `label` alone
pub fn resolve_unit(label: &str, unit: char) -> Result<Unit, DecodeError> {
    FieldGroup::classify(label)
        .lookup(unit)
        .or_else(|| (unit == INVALID_MARKER).then_some(Unit::Invalid))
        .ok_or_else(|| DecodeError::UnknownUnit {
            label: label.to_string(),
            unit,
        })
}

/// Resolve a raw field value such as `2.2M` into magnitude and unit.
///
/// The magnitude is everything but the last character and is parsed
/// before the unit is looked up.
pub fn resolve(label: &str, raw_value: &str) -> Result<UnitValue, DecodeError> {
    let mut chars = raw_value.chars();
    let unit = chars.next_back().ok_or_else(|| DecodeError::MissingUnit {
        label: label.to_string(),
    })?;

    let magnitude = chars.as_str();
    let value = magnitude
        .parse::<f64>()
        .map_err(|_| DecodeError::InvalidMagnitude {
            label: label.to_string(),
            raw: magnitude.to_string(),
        })?;

    Ok(UnitValue {
        value,
        unit: resolve_unit(label, unit)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_first_match_wins() {
        let cases = [
            ("Id", FieldGroup::Identifier),
            ("Ta", FieldGroup::Temperature),
            ("Th", FieldGroup::Temperature),
            ("Sm", FieldGroup::Speed),
            ("Dm", FieldGroup::Direction),
            ("Pa", FieldGroup::Pressure),
            ("Ua", FieldGroup::Humidity),
            ("Rd", FieldGroup::Duration),
            ("Hd", FieldGroup::Duration),
            ("Ri", FieldGroup::RainIntensity),
            ("Rp", FieldGroup::RainIntensity),
            ("Rc", FieldGroup::RainAccumulation),
            ("Hi", FieldGroup::HailIntensity),
            ("Hp", FieldGroup::HailIntensity),
            ("Hc", FieldGroup::HailAccumulation),
            ("Vh", FieldGroup::HeatingStatus),
            ("Vs", FieldGroup::Voltage),
            ("Vr", FieldGroup::Voltage),
            ("Xx", FieldGroup::Unclassified),
            ("", FieldGroup::Unclassified),
        ];
        for (label, group) in cases {
            assert_eq!(FieldGroup::classify(label), group, "label {label:?}");
        }
    }

    #[test]
    fn test_same_character_depends_on_field() {
        assert_eq!(resolve("Sm", "2.2M").unwrap().unit(), Unit::Symbol("m/s"));
        assert_eq!(resolve("Pa", "760.0M").unwrap().unit(), Unit::Symbol("mmHg"));
        assert_eq!(resolve("Rc", "0.5M").unwrap().unit(), Unit::Symbol("mm"));
        assert_eq!(resolve("Hi", "0.0M").unwrap().unit(), Unit::Symbol("hits/cm2h"));
    }

    #[test]
    fn test_duration_accepts_both_cases() {
        assert_eq!(resolve_unit("Rd", 'S').unwrap(), Unit::Symbol("s"));
        assert_eq!(resolve_unit("Rd", 's').unwrap(), Unit::Symbol("s"));
        assert_eq!(resolve_unit("Hd", 's').unwrap(), Unit::Symbol("s"));
    }

    #[test]
    fn test_invalid_marker() {
        let value = resolve("Sm", "0.0#").unwrap();
        assert_eq!(value.value(), 0.0);
        assert_eq!(value.unit(), Unit::Invalid);
        assert_eq!(value.unit().as_str(), Some("invalid"));
    }

    #[test]
    fn test_unknown_unit_is_an_error() {
        let err = resolve("Ta", "21.0K").unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownUnit {
                label: "Ta".to_string(),
                unit: 'K'
            }
        );
        assert!(resolve_unit("Vs", 'N').is_err());
    }

    #[test]
    fn test_heating_status_value() {
        let vh = resolve("Vh", "12.3V").unwrap();
        assert_eq!(vh.value(), 12.3);
        assert_eq!(vh.status(), Some("50% mid-hi"));
        assert_eq!(vh.as_volts().unit(), Unit::Symbol("V"));

        assert_eq!(resolve("Vh", "0.0N").unwrap().status(), Some("0% hi-"));
        assert_eq!(resolve("Vh", "0.0#").unwrap().status(), Some("invalid"));
        assert_eq!(resolve("Vs", "12.0V").unwrap().status(), None);
    }

    #[test]
    fn test_unitless_labels() {
        assert_eq!(resolve("Id", "5s").unwrap().unit(), Unit::Unitless);
        assert_eq!(resolve("Xx", "1.0Q").unwrap().unit(), Unit::Unitless);
        assert_eq!(Unit::Unitless.as_str(), None);
    }

    #[test]
    fn test_magnitude_errors() {
        assert_eq!(
            resolve("Sm", "abcM").unwrap_err(),
            DecodeError::InvalidMagnitude {
                label: "Sm".to_string(),
                raw: "abc".to_string()
            }
        );
        assert!(matches!(
            resolve("Sm", "M"),
            Err(DecodeError::InvalidMagnitude { .. })
        ));
        assert!(matches!(resolve("Sm", ""), Err(DecodeError::MissingUnit { .. })));
        // magnitude is checked before the unit
        assert!(matches!(
            resolve("Ta", "x?"),
            Err(DecodeError::InvalidMagnitude { .. })
        ));
    }

    #[test]
    fn test_resolution_is_pure() {
        for _ in 0..3 {
            assert_eq!(resolve_unit("Dx", 'D').unwrap(), Unit::Symbol("deg"));
        }
    }

    #[test]
    fn test_serializes_as_pair() {
        let json = serde_json::to_string(&resolve("Ua", "14.2P").unwrap()).unwrap();
        assert_eq!(json, r#"[14.2,"%"]"#);
        let json = serde_json::to_string(&resolve("Id", "1s").unwrap()).unwrap();
        assert_eq!(json, "[1.0,null]");
    }
}
