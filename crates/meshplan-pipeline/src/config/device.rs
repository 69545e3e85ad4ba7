//! `device_list`: one record per device SKU.

use super::enum_helpers;
use super::error::{ConfigError, Result};
use super::sector_params::SectorParamsConfig;
use meshplan_core::enums::DeviceType;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub sku: String,
    #[serde(default)]
    pub sector_params: SectorParamsConfig,
    pub node_capex: f64,
    pub number_of_nodes_per_site: u32,
    #[serde(deserialize_with = "enum_helpers::device_type")]
    pub device_type: DeviceType,
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<()> {
        self.sector_params.validate()?;
        if self.device_type == DeviceType::Cn && self.number_of_nodes_per_site != 1 {
            return Err(ConfigError::OutOfRange {
                section: "device_list",
                field: "number_of_nodes_per_site",
                constraint: "exactly 1 for CN devices",
                value: self.number_of_nodes_per_site.to_string(),
            });
        }
        let coverage_deg = self.sector_params.horizontal_scan_range_deg * self.sector_params.number_sectors_per_node as f64;
        if coverage_deg > 360.0 + meshplan_core::constants::EPSILON {
            return Err(ConfigError::OutOfRange {
                section: "device_list",
                field: "number_sectors_per_node * horizontal_scan_range_deg",
                constraint: "at most 360 degrees of total coverage",
                value: coverage_deg.to_string(),
            });
        }
        Ok(())
    }
}

pub fn validate_device_list(devices: &[DeviceConfig]) -> Result<()> {
    if devices.is_empty() {
        return Err(ConfigError::EmptyDeviceList);
    }
    let mut seen = std::collections::HashSet::new();
    for device in devices {
        device.validate()?;
        if !seen.insert(device.sku.clone()) {
            return Err(ConfigError::DuplicateSku(device.sku.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(sku: &str, device_type: DeviceType, nodes: u32) -> DeviceConfig {
        DeviceConfig { sku: sku.into(), sector_params: SectorParamsConfig::default(), node_capex: 500.0, number_of_nodes_per_site: nodes, device_type }
    }

    #[test]
    fn cn_with_multiple_nodes_rejected() {
        let d = device("cn-1", DeviceType::Cn, 2);
        assert!(d.validate().is_err());
    }

    #[test]
    fn duplicate_sku_rejected() {
        let list = vec![device("sku-a", DeviceType::Dn, 1), device("sku-a", DeviceType::Cn, 1)];
        assert!(validate_device_list(&list).is_err());
    }

    #[test]
    fn empty_list_rejected() {
        assert!(validate_device_list(&[]).is_err());
    }
}
