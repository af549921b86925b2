//! Event log data model and wire representation.
//!
//! `LogEntry` is immutable once committed; the serde names below are the wire
//! contract consumed by the API layer outside this crate. `details` and
//! `tools` are omitted entirely when empty, `serial` and `workorder` when
//! absent.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Event classification. The integer tags are persisted and exposed on the
/// wire; they are stable forever. A new variant must take a previously unused
/// tag — existing tags are never reused or renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogType {
    LoadUnloadCycle = 1,
    MachineCycle = 2,
    PartMark = 6,
    Inspection = 7,
    OrderAssignment = 10,
    GeneralMessage = 100,
    PalletCycle = 101,
    FinalizeWorkorder = 102,
    InspectionResult = 103,
    Wash = 104,
    AddToQueue = 105,
    RemoveFromQueue = 106,
    InspectionForce = 107,
    PalletOnRotaryInbound = 108,
    PalletInStocker = 110,
    SignalQuarantine = 111,
    InvalidateCycle = 112,
    SwapMaterialOnPallet = 113,
}

impl LogType {
    pub fn tag(self) -> i64 {
        self as i64
    }

    pub fn from_tag(tag: i64) -> Option<LogType> {
        match tag {
            1 => Some(LogType::LoadUnloadCycle),
            2 => Some(LogType::MachineCycle),
            6 => Some(LogType::PartMark),
            7 => Some(LogType::Inspection),
            10 => Some(LogType::OrderAssignment),
            100 => Some(LogType::GeneralMessage),
            101 => Some(LogType::PalletCycle),
            102 => Some(LogType::FinalizeWorkorder),
            103 => Some(LogType::InspectionResult),
            104 => Some(LogType::Wash),
            105 => Some(LogType::AddToQueue),
            106 => Some(LogType::RemoveFromQueue),
            107 => Some(LogType::InspectionForce),
            108 => Some(LogType::PalletOnRotaryInbound),
            110 => Some(LogType::PalletInStocker),
            111 => Some(LogType::SignalQuarantine),
            112 => Some(LogType::InvalidateCycle),
            113 => Some(LogType::SwapMaterialOnPallet),
            _ => None,
        }
    }
}

impl Serialize for LogType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(self.tag())
    }
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let tag = i64::deserialize(d)?;
        LogType::from_tag(tag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown log type tag {tag}")))
    }
}

/// Durations cross the wire as integer milliseconds.
pub mod duration_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        i64::deserialize(d).map(Duration::milliseconds)
    }
}

/// Tool usage recorded against one machine cycle, keyed by tool name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUse {
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    #[serde(with = "duration_millis")]
    pub active: Duration,
}

/// One material identity referenced by a log entry. `material_id` is assigned
/// once by the allocator and carried unchanged on every event referencing the
/// same physical part; sharing it across entries is how a part's full history
/// is reconstructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMaterial {
    #[serde(rename = "id")]
    pub material_id: i64,
    #[serde(rename = "uniq")]
    pub job_unique: String,
    #[serde(rename = "part")]
    pub part_name: String,
    /// 1-based process number.
    #[serde(rename = "proc")]
    pub process: i32,
    #[serde(rename = "numproc")]
    pub num_processes: i32,
    pub face: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub workorder: Option<String>,
}

/// A committed event log entry. `counter` is the sole total-order key:
/// strictly increasing and globally unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub counter: i64,
    pub material: Vec<LogMaterial>,
    #[serde(rename = "type")]
    pub log_type: LogType,
    #[serde(rename = "startofcycle")]
    pub start_of_cycle: bool,
    #[serde(rename = "endUTC")]
    pub end_time: DateTime<Utc>,
    #[serde(rename = "loc")]
    pub location_name: String,
    #[serde(rename = "locnum")]
    pub location_num: i32,
    #[serde(rename = "pal")]
    pub pallet: String,
    pub program: String,
    pub result: String,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    #[serde(with = "duration_millis")]
    pub active: Duration,
    #[serde(
        rename = "details",
        skip_serializing_if = "BTreeMap::is_empty",
        default
    )]
    pub program_details: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub tools: BTreeMap<String, ToolUse>,
}

/// Input to `Store::append`: a `LogEntry` minus the counter, which the log
/// assigns at commit time.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub material: Vec<LogMaterial>,
    pub log_type: LogType,
    pub start_of_cycle: bool,
    pub end_time: DateTime<Utc>,
    pub location_name: String,
    pub location_num: i32,
    pub pallet: String,
    pub program: String,
    pub result: String,
    pub elapsed: Duration,
    pub active: Duration,
    pub program_details: BTreeMap<String, String>,
    pub tools: BTreeMap<String, ToolUse>,
}

impl NewLogEntry {
    pub(crate) fn into_entry(self, counter: i64) -> LogEntry {
        LogEntry {
            counter,
            material: self.material,
            log_type: self.log_type,
            start_of_cycle: self.start_of_cycle,
            end_time: self.end_time,
            location_name: self.location_name,
            location_num: self.location_num,
            pallet: self.pallet,
            program: self.program,
            result: self.result,
            elapsed: self.elapsed,
            active: self.active,
            program_details: self.program_details,
            tools: self.tools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_type_tags_are_stable() {
        let expected: &[(LogType, i64)] = &[
            (LogType::LoadUnloadCycle, 1),
            (LogType::MachineCycle, 2),
            (LogType::PartMark, 6),
            (LogType::Inspection, 7),
            (LogType::OrderAssignment, 10),
            (LogType::GeneralMessage, 100),
            (LogType::PalletCycle, 101),
            (LogType::FinalizeWorkorder, 102),
            (LogType::InspectionResult, 103),
            (LogType::Wash, 104),
            (LogType::AddToQueue, 105),
            (LogType::RemoveFromQueue, 106),
            (LogType::InspectionForce, 107),
            (LogType::PalletOnRotaryInbound, 108),
            (LogType::PalletInStocker, 110),
            (LogType::SignalQuarantine, 111),
            (LogType::InvalidateCycle, 112),
            (LogType::SwapMaterialOnPallet, 113),
        ];
        for (ty, tag) in expected {
            assert_eq!(ty.tag(), *tag);
            assert_eq!(LogType::from_tag(*tag), Some(*ty));
        }
        assert_eq!(LogType::from_tag(109), None);
        assert_eq!(LogType::from_tag(0), None);
    }

    #[test]
    fn test_wire_shape_omits_empty_optionals() {
        let entry = LogEntry {
            counter: 7,
            material: vec![LogMaterial {
                material_id: 101,
                job_unique: "J1".to_string(),
                part_name: "widget".to_string(),
                process: 1,
                num_processes: 2,
                face: "1".to_string(),
                serial: None,
                workorder: None,
            }],
            log_type: LogType::MachineCycle,
            start_of_cycle: false,
            end_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            location_name: "MC".to_string(),
            location_num: 3,
            pallet: "P1".to_string(),
            program: "prog".to_string(),
            result: "".to_string(),
            elapsed: Duration::seconds(90),
            active: Duration::seconds(60),
            program_details: BTreeMap::new(),
            tools: BTreeMap::new(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["counter"], 7);
        assert_eq!(json["type"], 2);
        assert_eq!(json["startofcycle"], false);
        assert_eq!(json["loc"], "MC");
        assert_eq!(json["locnum"], 3);
        assert_eq!(json["pal"], "P1");
        assert_eq!(json["elapsed"], 90_000);
        assert_eq!(json["active"], 60_000);
        assert!(json.get("details").is_none());
        assert!(json.get("tools").is_none());

        let mat = &json["material"][0];
        assert_eq!(mat["id"], 101);
        assert_eq!(mat["uniq"], "J1");
        assert_eq!(mat["part"], "widget");
        assert_eq!(mat["proc"], 1);
        assert_eq!(mat["numproc"], 2);
        assert!(mat.get("serial").is_none());
        assert!(mat.get("workorder").is_none());
    }

    #[test]
    fn test_wire_shape_includes_populated_optionals() {
        let mut tools = BTreeMap::new();
        tools.insert(
            "drill".to_string(),
            ToolUse {
                elapsed: Duration::seconds(5),
                active: Duration::seconds(4),
            },
        );
        let mut details = BTreeMap::new();
        details.insert("rev".to_string(), "4".to_string());

        let entry = LogEntry {
            counter: 1,
            material: vec![],
            log_type: LogType::Wash,
            start_of_cycle: true,
            end_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            location_name: "Wash".to_string(),
            location_num: 1,
            pallet: "".to_string(),
            program: "".to_string(),
            result: "".to_string(),
            elapsed: Duration::zero(),
            active: Duration::zero(),
            program_details: details,
            tools,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["details"]["rev"], "4");
        assert_eq!(json["tools"]["drill"]["elapsed"], 5_000);

        let back: LogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
