//! Deserializers accepting either the enum's name or its legacy integer code,
//! matching "enum values accepted by name or by integer" for every config
//! section. One small function per enum rather than a shared generic: each
//! enum's integer mapping is its own fixed convention, not a derivable rule.

use meshplan_core::enums::{DeviceType, LoggerLevel, RedundancyLevel, TopologyRouting};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NameOrInt {
    Name(String),
    Int(i64),
}

pub fn device_type<'de, D: Deserializer<'de>>(d: D) -> Result<DeviceType, D::Error> {
    match NameOrInt::deserialize(d)? {
        NameOrInt::Name(s) => match s.to_ascii_uppercase().as_str() {
            "DN" => Ok(DeviceType::Dn),
            "CN" => Ok(DeviceType::Cn),
            other => Err(serde::de::Error::custom(format!("unknown device_type '{other}'"))),
        },
        NameOrInt::Int(0) => Ok(DeviceType::Dn),
        NameOrInt::Int(1) => Ok(DeviceType::Cn),
        NameOrInt::Int(n) => Err(serde::de::Error::custom(format!("unknown device_type code {n}"))),
    }
}

pub fn redundancy_level<'de, D: Deserializer<'de>>(d: D) -> Result<RedundancyLevel, D::Error> {
    match NameOrInt::deserialize(d)? {
        NameOrInt::Name(s) => match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(RedundancyLevel::None),
            "LOW" => Ok(RedundancyLevel::Low),
            "MEDIUM" => Ok(RedundancyLevel::Medium),
            "HIGH" => Ok(RedundancyLevel::High),
            other => Err(serde::de::Error::custom(format!("unknown redundancy_level '{other}'"))),
        },
        NameOrInt::Int(0) => Ok(RedundancyLevel::None),
        NameOrInt::Int(1) => Ok(RedundancyLevel::Low),
        NameOrInt::Int(2) => Ok(RedundancyLevel::Medium),
        NameOrInt::Int(3) => Ok(RedundancyLevel::High),
        NameOrInt::Int(n) => Err(serde::de::Error::custom(format!("unknown redundancy_level code {n}"))),
    }
}

pub fn topology_routing<'de, D: Deserializer<'de>>(d: D) -> Result<TopologyRouting, D::Error> {
    match NameOrInt::deserialize(d)? {
        NameOrInt::Name(s) => match s.to_ascii_uppercase().as_str() {
            "SHORTEST_PATH" => Ok(TopologyRouting::ShortestPath),
            "MCS_COST_PATH" => Ok(TopologyRouting::McsCostPath),
            "DPA_PATH" => Ok(TopologyRouting::DpaPath),
            other => Err(serde::de::Error::custom(format!("unknown topology_routing '{other}'"))),
        },
        NameOrInt::Int(0) => Ok(TopologyRouting::ShortestPath),
        NameOrInt::Int(1) => Ok(TopologyRouting::McsCostPath),
        NameOrInt::Int(2) => Ok(TopologyRouting::DpaPath),
        NameOrInt::Int(n) => Err(serde::de::Error::custom(format!("unknown topology_routing code {n}"))),
    }
}

pub fn logger_level<'de, D: Deserializer<'de>>(d: D) -> Result<LoggerLevel, D::Error> {
    match NameOrInt::deserialize(d)? {
        NameOrInt::Name(s) => match s.to_ascii_uppercase().as_str() {
            "NOTSET" => Ok(LoggerLevel::NotSet),
            "DEBUG" => Ok(LoggerLevel::Debug),
            "INFO" => Ok(LoggerLevel::Info),
            "WARNING" => Ok(LoggerLevel::Warning),
            "ERROR" => Ok(LoggerLevel::Error),
            "CRITICAL" => Ok(LoggerLevel::Critical),
            other => Err(serde::de::Error::custom(format!("unknown logger_level '{other}'"))),
        },
        // Python logging convention: 0, 10, 20, 30, 40, 50.
        NameOrInt::Int(0) => Ok(LoggerLevel::NotSet),
        NameOrInt::Int(10) => Ok(LoggerLevel::Debug),
        NameOrInt::Int(20) => Ok(LoggerLevel::Info),
        NameOrInt::Int(30) => Ok(LoggerLevel::Warning),
        NameOrInt::Int(40) => Ok(LoggerLevel::Error),
        NameOrInt::Int(50) => Ok(LoggerLevel::Critical),
        NameOrInt::Int(n) => Err(serde::de::Error::custom(format!("unknown logger_level code {n}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_level_accepts_name_or_code() {
        assert_eq!(logger_level(serde_json::Value::String("DEBUG".into())).unwrap(), LoggerLevel::Debug);
        assert_eq!(logger_level(serde_json::Value::from(40)).unwrap(), LoggerLevel::Error);
        assert!(logger_level(serde_json::Value::String("LOUD".into())).is_err());
    }

    #[test]
    fn device_type_accepts_name_or_code() {
        assert_eq!(device_type(serde_json::Value::String("cn".into())).unwrap(), DeviceType::Cn);
        assert_eq!(device_type(serde_json::Value::from(0)).unwrap(), DeviceType::Dn);
    }
}
