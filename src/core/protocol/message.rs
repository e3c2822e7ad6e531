//! Message decoder
//!
//! Turns a tokenized frame into a typed [`Reading`]. Each message type has
//! a fixed set of required labels; a recognized message missing one of
//! them is a structural error, while an unrecognized message code simply
//! produces no reading.

use super::error::DecodeError;
use super::frame::{tokenize, Frame};
use super::units::{resolve, Unit, UnitValue};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Automatic-mode message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `r1`
    Wind,
    /// `r2`, pressure, temperature and humidity
    Ptu,
    /// `r3`, precipitation
    Rain,
    /// `r5`, supervisor message
    Status,
}

impl MessageType {
    /// All decodable message types
    pub fn all() -> &'static [MessageType] {
        &[Self::Wind, Self::Ptu, Self::Rain, Self::Status]
    }

    /// Look up a message code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "r1" => Some(Self::Wind),
            "r2" => Some(Self::Ptu),
            "r3" => Some(Self::Rain),
            "r5" => Some(Self::Status),
            _ => None,
        }
    }

    /// Message code on the wire
    pub fn code(&self) -> &'static str {
        match self {
            Self::Wind => "r1",
            Self::Ptu => "r2",
            Self::Rain => "r3",
            Self::Status => "r5",
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Wind => "Wind",
            Self::Ptu => "PTU",
            Self::Rain => "Rain",
            Self::Status => "Status",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Average with lower and upper limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Averaged {
    /// Average over the averaging period
    pub average: UnitValue,
    /// `[minimum, maximum]`
    pub limits: [UnitValue; 2],
}

/// `r1` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WindReading {
    /// `Sm`, `Sn`, `Sx`
    pub speed: Averaged,
    /// `Dm`, `Dn`, `Dx`
    pub direction: Averaged,
}

/// Ambient and internal temperature
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Temperatures {
    /// `Ta`
    pub ambient: UnitValue,
    /// `Tp`
    pub internal: UnitValue,
}

/// `r2` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PtuReading {
    /// `Ta`, `Tp`
    pub temperature: Temperatures,
    /// `Ua`
    pub humidity: UnitValue,
    /// `Pa`
    pub pressure: UnitValue,
}

/// Rain or hail figures
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Precipitation {
    /// `Ri` / `Hi`
    pub intensity: UnitValue,
    /// `Rp` / `Hp`
    pub peak: UnitValue,
    /// `Rc` / `Hc`
    pub accumulation: UnitValue,
    /// `Rd` / `Hd`
    pub duration: UnitValue,
}

/// `r3` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RainReading {
    /// `R*` fields
    pub rain: Precipitation,
    /// `H*` fields
    pub hail: Precipitation,
}

/// Supply, reference and heating voltages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Voltages {
    /// `Vs`
    pub supply: UnitValue,
    /// `Vr`
    pub reference: UnitValue,
    /// Magnitude of `Vh`, in volts
    pub heating: UnitValue,
}

/// Heater state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Heating {
    /// `Th`
    pub temperature: UnitValue,
    /// Unit character of `Vh`, either a heating status or invalid
    pub status: Unit,
}

/// `r5` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusReading {
    /// `Vs`, `Vr`, `Vh`
    pub voltages: Voltages,
    /// `Th`, `Vh`
    pub heating: Heating,
}

/// Decoded payload, one variant per message type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadingData {
    /// `r1`
    Wind(WindReading),
    /// `r2`
    Ptu(PtuReading),
    /// `r3`
    Rain(RainReading),
    /// `r5`
    Status(StatusReading),
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Address of the device that sent the frame
    pub address: char,
    /// Typed payload
    pub data: ReadingData,
}

/// A leaf of a [`Reading`] for line-oriented output
#[derive(Debug, Clone, PartialEq)]
pub struct FlatField {
    /// Dotted path, e.g. `Speed.average`
    pub path: String,
    /// Magnitude, absent for status-only leaves
    pub value: Option<f64>,
    /// Unit or status text
    pub unit: Option<&'static str>,
}

impl Reading {
    /// Message type of the payload
    pub fn message_type(&self) -> MessageType {
        match self.data {
            ReadingData::Wind(_) => MessageType::Wind,
            ReadingData::Ptu(_) => MessageType::Ptu,
            ReadingData::Rain(_) => MessageType::Rain,
            ReadingData::Status(_) => MessageType::Status,
        }
    }

    /// Leaves of the reading in a fixed order
    pub fn flatten(&self) -> Vec<FlatField> {
        let mut out = Vec::new();
        let mut push = |path: &str, v: &UnitValue| {
            out.push(FlatField {
                path: path.to_string(),
                value: Some(v.value()),
                unit: v.unit().as_str(),
            });
        };

        match &self.data {
            ReadingData::Wind(w) => {
                for (name, a) in [("Speed", &w.speed), ("Direction", &w.direction)] {
                    push(&format!("{name}.average"), &a.average);
                    push(&format!("{name}.minimum"), &a.limits[0]);
                    push(&format!("{name}.maximum"), &a.limits[1]);
                }
            }
            ReadingData::Ptu(p) => {
                push("Temperature.Ambient", &p.temperature.ambient);
                push("Temperature.Internal", &p.temperature.internal);
                push("Humidity", &p.humidity);
                push("Pressure", &p.pressure);
            }
            ReadingData::Rain(r) => {
                for (name, p) in [("Rain", &r.rain), ("Hail", &r.hail)] {
                    push(&format!("{name}.Intensity"), &p.intensity);
                    push(&format!("{name}.Peak"), &p.peak);
                    push(&format!("{name}.Accumulation"), &p.accumulation);
                    push(&format!("{name}.Duration"), &p.duration);
                }
            }
            ReadingData::Status(s) => {
                push("Voltages.Supply", &s.voltages.supply);
                push("Voltages.Reference", &s.voltages.reference);
                push("Voltages.Heating", &s.voltages.heating);
                push("Heating.Temperature", &s.heating.temperature);
                out.push(FlatField {
                    path: "Heating.Status".to_string(),
                    value: None,
                    unit: s.heating.status.as_str(),
                });
            }
        }

        out
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.message_type();
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("Type", kind.name())?;
        map.serialize_entry("Address", &self.address)?;
        map.serialize_entry(kind.name(), &self.data)?;
        map.end()
    }
}

/// Raw values of one frame, resolved on demand
struct Fields<'a> {
    message: MessageType,
    raw: HashMap<&'a str, &'a str>,
}

impl Fields<'_> {
    fn get(&self, label: &'static str) -> Result<UnitValue, DecodeError> {
        let raw = self.raw.get(label).ok_or(DecodeError::MissingField {
            message: self.message.name(),
            label,
        })?;
        resolve(label, raw)
    }

    fn averaged(&self, avg: &'static str, min: &'static str, max: &'static str) -> Result<Averaged, DecodeError> {
        Ok(Averaged {
            average: self.get(avg)?,
            limits: [self.get(min)?, self.get(max)?],
        })
    }

    fn precipitation(&self, labels: [&'static str; 4]) -> Result<Precipitation, DecodeError> {
        let [intensity, peak, accumulation, duration] = labels;
        Ok(Precipitation {
            intensity: self.get(intensity)?,
            peak: self.get(peak)?,
            accumulation: self.get(accumulation)?,
            duration: self.get(duration)?,
        })
    }
}

/// Decode a tokenized frame. `Ok(None)` means the message code is not one
/// this crate decodes.
pub fn decode(frame: &Frame) -> Result<Option<Reading>, DecodeError> {
    let Some(message) = frame.message_type() else {
        debug!("Ignoring message with code {:?}", frame.header.code);
        return Ok(None);
    };

    let fields = Fields {
        message,
        raw: frame.fields(),
    };

    let data = match message {
        MessageType::Wind => ReadingData::Wind(WindReading {
            speed: fields.averaged("Sm", "Sn", "Sx")?,
            direction: fields.averaged("Dm", "Dn", "Dx")?,
        }),
        MessageType::Ptu => ReadingData::Ptu(PtuReading {
            temperature: Temperatures {
                ambient: fields.get("Ta")?,
                internal: fields.get("Tp")?,
            },
            humidity: fields.get("Ua")?,
            pressure: fields.get("Pa")?,
        }),
        MessageType::Rain => ReadingData::Rain(RainReading {
            rain: fields.precipitation(["Ri", "Rp", "Rc", "Rd"])?,
            hail: fields.precipitation(["Hi", "Hp", "Hc", "Hd"])?,
        }),
        MessageType::Status => {
            let vh = fields.get("Vh")?;
            ReadingData::Status(StatusReading {
                voltages: Voltages {
                    supply: fields.get("Vs")?,
                    reference: fields.get("Vr")?,
                    heating: vh.as_volts(),
                },
                heating: Heating {
                    temperature: fields.get("Th")?,
                    status: vh.unit(),
                },
            })
        }
    };

    Ok(Some(Reading {
        address: frame.header.address,
        data,
    }))
}

/// Tokenize and decode a line whose checksum the caller already verified
pub fn decode_line(line: &[u8]) -> Result<Option<Reading>, DecodeError> {
    decode(&tokenize(line)?)
}
