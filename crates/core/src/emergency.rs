use crate::types::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyOrder {
    Shutdown,
    Rollback,
    SurgeProtection,
    MaintenanceMode,
}

impl EmergencyOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyOrder::Shutdown => "shutdown",
            EmergencyOrder::Rollback => "rollback",
            EmergencyOrder::SurgeProtection => "surge_protection",
            EmergencyOrder::MaintenanceMode => "maintenance_mode",
        }
    }
}

impl fmt::Display for EmergencyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmergencyOrder {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "shutdown" => Ok(EmergencyOrder::Shutdown),
            "rollback" => Ok(EmergencyOrder::Rollback),
            "surge_protection" => Ok(EmergencyOrder::SurgeProtection),
            "maintenance_mode" | "maintenance" => Ok(EmergencyOrder::MaintenanceMode),
            other => Err(ParseEnumError {
                kind: "emergency order",
                value: other.to_string(),
            }),
        }
    }
}

/// Process-wide flags flipped by emergency orders.
pub struct EmergencyState {
    shutdown: AtomicBool,
    rollback: AtomicBool,
    surge_protection: AtomicBool,
    maintenance_mode: AtomicBool,
}

impl EmergencyState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn flag(&self, order: EmergencyOrder) -> &AtomicBool {
        match order {
            EmergencyOrder::Shutdown => &self.shutdown,
            EmergencyOrder::Rollback => &self.rollback,
            EmergencyOrder::SurgeProtection => &self.surge_protection,
            EmergencyOrder::MaintenanceMode => &self.maintenance_mode,
        }
    }

    /// Returns whether the flag was already set.
    pub fn apply(&self, order: EmergencyOrder) -> bool {
        self.flag(order).swap(true, Ordering::SeqCst)
    }

    /// Returns whether the flag was set before lifting.
    pub fn lift(&self, order: EmergencyOrder) -> bool {
        self.flag(order).swap(false, Ordering::SeqCst)
    }

    pub fn is_active(&self, order: EmergencyOrder) -> bool {
        self.flag(order).load(Ordering::SeqCst)
    }

    /// Reason new work must be refused, if any.
    pub fn admission_block(&self) -> Option<&'static str> {
        if self.is_active(EmergencyOrder::Shutdown) {
            Some("System is shut down by emergency order")
        } else if self.is_active(EmergencyOrder::MaintenanceMode) {
            Some("System is in maintenance mode, try again later")
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> EmergencySnapshot {
        EmergencySnapshot {
            shutdown: self.is_active(EmergencyOrder::Shutdown),
            rollback: self.is_active(EmergencyOrder::Rollback),
            surge_protection: self.is_active(EmergencyOrder::SurgeProtection),
            maintenance_mode: self.is_active(EmergencyOrder::MaintenanceMode),
        }
    }
}

impl Default for EmergencyState {
    fn default() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            rollback: AtomicBool::new(false),
            surge_protection: AtomicBool::new(false),
            maintenance_mode: AtomicBool::new(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencySnapshot {
    pub shutdown: bool,
    pub rollback: bool,
    pub surge_protection: bool,
    pub maintenance_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_and_lift() {
        let state = EmergencyState::new();
        assert!(state.admission_block().is_none());

        assert!(!state.apply(EmergencyOrder::MaintenanceMode));
        assert!(state.apply(EmergencyOrder::MaintenanceMode));
        assert!(state.admission_block().is_some());

        assert!(state.lift(EmergencyOrder::MaintenanceMode));
        assert!(state.admission_block().is_none());
    }

    #[test]
    fn test_surge_and_rollback_do_not_block_admission() {
        let state = EmergencyState::new();
        state.apply(EmergencyOrder::SurgeProtection);
        state.apply(EmergencyOrder::Rollback);
        assert!(state.admission_block().is_none());
        let snapshot = state.snapshot();
        assert!(snapshot.surge_protection && snapshot.rollback);
    }

    #[test]
    fn test_order_parsing() {
        assert_eq!(
            "surge-protection".parse::<EmergencyOrder>(),
            Ok(EmergencyOrder::SurgeProtection)
        );
        assert_eq!(
            "maintenance_mode".parse::<EmergencyOrder>(),
            Ok(EmergencyOrder::MaintenanceMode)
        );
        assert!("panic".parse::<EmergencyOrder>().is_err());
    }
}
