use tracing::{debug, info, warn};

use crate::domain::{ComputeDevice, DevicePreference, DomainError, PlacementReport};

/// Tries each candidate device for `preference` in order and keeps the first
/// one `attempt` succeeds on. Failed attempts are collected as diagnostics.
pub fn place_on_device<T, F>(
    preference: DevicePreference,
    mut attempt: F,
) -> Result<(T, PlacementReport), DomainError>
where
    F: FnMut(ComputeDevice) -> Result<T, String>,
{
    let requested = preference.requested();
    let mut errors = Vec::new();

    for device in preference.candidates() {
        debug!("Trying to place model on {}", device);
        match attempt(device) {
            Ok(value) => {
                let report = PlacementReport::new(requested, device, errors);
                if report.fell_back() {
                    warn!(
                        "Could not place model on {}, falling back to {}: {}",
                        requested,
                        device,
                        report.errors().join("; ")
                    );
                } else {
                    info!("Model placed on {}", device);
                }
                return Ok((value, report));
            }
            Err(e) => {
                debug!("Placement on {} failed: {}", device, e);
                errors.push(format!("{}: {}", device, e));
            }
        }
    }

    Err(DomainError::model(format!(
        "Could not place model on any device ({})",
        errors.join("; ")
    )))
}
