//! Maps `Box<dyn Error>` from trait boundaries to typed `EscapementError`.
//!
//! With the `hardware-errors` feature the backend's `HwError` is downcast for a
//! precise mapping; otherwise the message text decides.

use crate::error::EscapementError;

/// Map a trait-boundary error to a typed `EscapementError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> EscapementError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<escapement_hardware::error::HwError>() {
            return match hw {
                escapement_hardware::error::HwError::Timeout => EscapementError::Timeout,
                other => EscapementError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        EscapementError::Timeout
    } else {
        EscapementError::Hardware(s)
    }
}
