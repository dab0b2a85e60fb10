//! Display model for system info

use super::types::SystemInfo;
use serde::Serialize;
use std::fmt;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Bytes to whole megabytes, rounded to nearest
pub fn bytes_to_mb(bytes: u64) -> u64 {
    (bytes as f64 / BYTES_PER_MB).round() as u64
}

/// One network interface section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceView {
    pub name: String,
    pub addresses: Vec<String>,
}

/// System info as shown on screen
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfoView {
    pub cpu_usage: f64,
    pub used_memory_mb: u64,
    pub free_memory_mb: u64,
    pub total_memory_mb: u64,
    pub interfaces: Vec<InterfaceView>,
}

impl From<&SystemInfo> for SystemInfoView {
    fn from(info: &SystemInfo) -> Self {
        Self {
            cpu_usage: info.cpu_usage,
            used_memory_mb: bytes_to_mb(info.used_memory),
            free_memory_mb: bytes_to_mb(info.free_memory),
            total_memory_mb: bytes_to_mb(info.total_memory),
            interfaces: info
                .network_info
                .iter()
                .map(|(name, addresses)| InterfaceView {
                    name: name.clone(),
                    addresses: addresses.clone(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for SystemInfoView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "System Information")?;
        writeln!(f, "CPU Usage: {}", self.cpu_usage)?;
        writeln!(f, "Used Memory: {} MB", self.used_memory_mb)?;
        writeln!(f, "Free Memory: {} MB", self.free_memory_mb)?;
        writeln!(f, "Total Memory: {} MB", self.total_memory_mb)?;
        write!(f, "Network Information")?;
        for interface in &self.interfaces {
            write!(f, "\n  {}", interface.name)?;
            for address in &interface.addresses {
                write!(f, "\n    {}", address)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_info;

    #[test]
    fn renders_sample_reading() {
        let view = SystemInfoView::from(&sample_info());
        assert_eq!(view.used_memory_mb, 1024);
        assert_eq!(view.free_memory_mb, 1024);
        assert_eq!(view.total_memory_mb, 2048);
        assert_eq!(
            view.interfaces,
            vec![InterfaceView {
                name: "eth0".to_string(),
                addresses: vec!["192.168.1.5".to_string()],
            }]
        );

        assert_eq!(
            view.to_string(),
            "System Information\n\
             CPU Usage: 12\n\
             Used Memory: 1024 MB\n\
             Free Memory: 1024 MB\n\
             Total Memory: 2048 MB\n\
             Network Information\n  eth0\n    192.168.1.5"
        );
    }

    #[test]
    fn rounds_to_nearest_megabyte() {
        assert_eq!(bytes_to_mb(0), 0);
        assert_eq!(bytes_to_mb(524_287), 0);
        assert_eq!(bytes_to_mb(524_288), 1);
        assert_eq!(bytes_to_mb(1_572_864), 2);
    }

    #[test]
    fn lists_every_interface() {
        let mut info = sample_info();
        info.network_info
            .insert("lo".to_string(), vec!["127.0.0.1".to_string(), "::1".to_string()]);
        let view = SystemInfoView::from(&info);
        let names: Vec<&str> = view.interfaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["eth0", "lo"]);
        assert_eq!(view.interfaces[1].addresses.len(), 2);
    }
}
