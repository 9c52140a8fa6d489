//! Shield dispatcher: maps threat-level changes to protective withdrawals.
//!
//! WARNING pulls a configured slice of the position out; CRITICAL pulls
//! everything. SAFE and WATCH are informational only. Write failures are
//! absorbed into the outcome record so one stuck transaction can never
//! take the monitoring loop down with it.

use std::sync::Arc;

use ethers::types::Address;
use tracing::{info, warn};

use vigil_chainio::{ChainWriter, ThreatChangeEvent, ThreatLevel};

use crate::config::ShieldConfig;
use crate::types::{ShieldAction, ShieldOutcome};

pub struct ShieldDispatcher {
    writer: Arc<dyn ChainWriter>,
    config: ShieldConfig,
    vault: Address,
}

impl ShieldDispatcher {
    pub fn new(writer: Arc<dyn ChainWriter>, config: ShieldConfig, vault: Address) -> Self {
        Self {
            writer,
            config,
            vault,
        }
    }

    /// Act on one threat-level change. At most one write per call.
    pub async fn dispatch(&self, event: &ThreatChangeEvent) -> ShieldOutcome {
        match event.level {
            ThreatLevel::Safe | ThreatLevel::Watch => {
                info!(
                    adapter = %event.protocol,
                    level = event.level.label(),
                    old_score = event.old_score,
                    new_score = event.new_score,
                    "threat level below action threshold, no shield action"
                );
                ShieldOutcome {
                    action: ShieldAction::None,
                    adapter: event.protocol,
                    reason: String::new(),
                    level: event.level,
                    success: true,
                    message: "no action required".to_string(),
                }
            }
            ThreatLevel::Warning => {
                let reason = format!(
                    "risk score rose {} -> {} (WARNING)",
                    event.old_score, event.new_score
                );
                warn!(
                    adapter = %event.protocol,
                    withdraw_bps = self.config.warning_withdraw_bps,
                    %reason,
                    "dispatching partial withdraw"
                );
                let outcome = self
                    .writer
                    .partial_withdraw(
                        self.vault,
                        event.protocol,
                        self.config.warning_withdraw_bps,
                        &reason,
                    )
                    .await;
                ShieldOutcome {
                    action: ShieldAction::PartialWithdraw,
                    adapter: event.protocol,
                    reason,
                    level: event.level,
                    success: outcome.success,
                    message: outcome.message,
                }
            }
            ThreatLevel::Critical => {
                let reason = format!(
                    "risk score rose {} -> {} (CRITICAL)",
                    event.old_score, event.new_score
                );
                warn!(
                    adapter = %event.protocol,
                    %reason,
                    "dispatching emergency withdraw"
                );
                let outcome = self
                    .writer
                    .emergency_withdraw(self.vault, event.protocol, &reason)
                    .await;
                ShieldOutcome {
                    action: ShieldAction::EmergencyWithdraw,
                    adapter: event.protocol,
                    reason,
                    level: event.level,
                    success: outcome.success,
                    message: outcome.message,
                }
            }
        }
    }
}
