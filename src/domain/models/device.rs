use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hardware backend a model session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    #[default]
    Cpu,
    CoreMl,
    Cuda,
}

impl ComputeDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeDevice::Cpu => "cpu",
            ComputeDevice::CoreMl => "coreml",
            ComputeDevice::Cuda => "cuda",
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which device the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Best accelerator available on this host, else CPU.
    #[default]
    Auto,
    Only(ComputeDevice),
}

impl DevicePreference {
    /// Devices to try in order. CPU is always the last resort.
    pub fn candidates(&self) -> Vec<ComputeDevice> {
        match self {
            DevicePreference::Auto => {
                let mut devices = Vec::with_capacity(3);
                if cfg!(target_os = "macos") {
                    devices.push(ComputeDevice::CoreMl);
                }
                devices.push(ComputeDevice::Cuda);
                devices.push(ComputeDevice::Cpu);
                devices
            }
            DevicePreference::Only(ComputeDevice::Cpu) => vec![ComputeDevice::Cpu],
            DevicePreference::Only(device) => vec![*device, ComputeDevice::Cpu],
        }
    }

    pub fn requested(&self) -> ComputeDevice {
        match self {
            DevicePreference::Auto => self.candidates()[0],
            DevicePreference::Only(device) => *device,
        }
    }
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Only(ComputeDevice::Cpu)),
            "coreml" | "mps" | "metal" => Ok(DevicePreference::Only(ComputeDevice::CoreMl)),
            "cuda" | "gpu" => Ok(DevicePreference::Only(ComputeDevice::Cuda)),
            other => Err(format!(
                "unknown device '{}', expected one of: auto, cpu, coreml, cuda",
                other
            )),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevicePreference::Auto => f.write_str("auto"),
            DevicePreference::Only(device) => device.fmt(f),
        }
    }
}

/// Outcome of placing a model on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementReport {
    requested: ComputeDevice,
    effective: ComputeDevice,
    errors: Vec<String>,
}

impl PlacementReport {
    pub fn new(requested: ComputeDevice, effective: ComputeDevice, errors: Vec<String>) -> Self {
        Self {
            requested,
            effective,
            errors,
        }
    }

    pub fn cpu() -> Self {
        Self::new(ComputeDevice::Cpu, ComputeDevice::Cpu, Vec::new())
    }

    pub fn requested(&self) -> ComputeDevice {
        self.requested
    }

    pub fn effective(&self) -> ComputeDevice {
        self.effective
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn fell_back(&self) -> bool {
        self.requested != self.effective
    }

    pub fn summary(&self) -> String {
        if self.errors.is_empty() {
            format!("running on {}", self.effective)
        } else {
            format!(
                "running on {} (requested {}; {})",
                self.effective,
                self.requested,
                self.errors.join("; ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preference() {
        assert_eq!("auto".parse::<DevicePreference>(), Ok(DevicePreference::Auto));
        assert_eq!(
            "CPU".parse::<DevicePreference>(),
            Ok(DevicePreference::Only(ComputeDevice::Cpu))
        );
        assert_eq!(
            "mps".parse::<DevicePreference>(),
            Ok(DevicePreference::Only(ComputeDevice::CoreMl))
        );
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_candidates_end_with_cpu() {
        for pref in [
            DevicePreference::Auto,
            DevicePreference::Only(ComputeDevice::Cuda),
            DevicePreference::Only(ComputeDevice::CoreMl),
            DevicePreference::Only(ComputeDevice::Cpu),
        ] {
            assert_eq!(pref.candidates().last(), Some(&ComputeDevice::Cpu));
        }
        assert_eq!(
            DevicePreference::Only(ComputeDevice::Cpu).candidates(),
            vec![ComputeDevice::Cpu]
        );
    }

    #[test]
    fn test_report_summary() {
        let report = PlacementReport::new(
            ComputeDevice::Cuda,
            ComputeDevice::Cpu,
            vec!["cuda: not available".to_string()],
        );
        assert!(report.fell_back());
        assert_eq!(
            report.summary(),
            "running on cpu (requested cuda; cuda: not available)"
        );
        assert!(!PlacementReport::cpu().fell_back());
    }
}
