use anyhow::Result;

use crate::domain::{ComputeDevice, DevicePreference};
use crate::OrtTranscriber;

use super::super::Container;

pub struct DevicesController<'a> {
    container: &'a Container,
}

impl<'a> DevicesController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn devices(&self) -> Result<String> {
        let probes = tokio::task::spawn_blocking(OrtTranscriber::available_devices).await?;
        Ok(self.format_devices(&probes, self.container.device_preference()))
    }

    fn format_devices(
        &self,
        probes: &[(ComputeDevice, Result<(), String>)],
        preference: DevicePreference,
    ) -> String {
        let mut output = String::from("ONNX Runtime execution providers\n================================");

        for (device, status) in probes {
            match status {
                Ok(()) => output.push_str(&format!("\n  {:<8} available", device.as_str())),
                Err(e) => output.push_str(&format!("\n  {:<8} unavailable ({})", device.as_str(), e)),
            }
        }

        let order: Vec<&str> = preference
            .candidates()
            .iter()
            .map(|device| device.as_str())
            .collect();
        output.push_str(&format!(
            "\nDevice preference: {} (tries {})",
            preference,
            order.join(" -> ")
        ));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::api::ContainerConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_format_devices() {
        let dir = tempdir().unwrap();
        let container = Container::new(ContainerConfig {
            output_dir: dir.path().to_path_buf(),
            model_path: None,
            model_repo: None,
            model_file: "model.onnx".to_string(),
            device: DevicePreference::Only(ComputeDevice::Cuda),
            mock_model: true,
        })
        .await
        .unwrap();
        let controller = DevicesController::new(&container);

        let output = controller.format_devices(
            &[
                (ComputeDevice::Cuda, Err("execution provider not available".to_string())),
                (ComputeDevice::Cpu, Ok(())),
            ],
            container.device_preference(),
        );

        assert!(output.contains("cuda     unavailable (execution provider not available)"));
        assert!(output.contains("cpu      available"));
        assert!(output.ends_with("Device preference: cuda (tries cuda -> cpu)"));
    }
}
