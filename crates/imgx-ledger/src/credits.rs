//! Credit ledger: balance checks and atomic deduction.
//!
//! The only balance-mutating path is [`CreditLedger::deduct_and_record`],
//! which calls a stored procedure that checks the balance, decrements it,
//! and inserts the usage row in one database transaction. Two concurrent
//! deductions for the same user therefore serialize in the database; the
//! read-only check in [`CreditLedger::check_and_reserve`] is a fast-fail
//! courtesy for callers, not the guard.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use imgx_models::{NewUsageRecord, UsageRecord};

use crate::client::SupabaseClient;
use crate::error::{LedgerError, LedgerResult};

/// Stored procedure performing the combined check/decrement/insert.
const DEDUCT_FUNCTION: &str = "deduct_credits_and_log_usage";

/// Error tag raised by the stored procedure on a short balance.
const INSUFFICIENT_TAG: &str = "insufficient_credits";

/// Outcome of a balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditCheck {
    /// Whether the balance covers the requested cost
    pub ok: bool,
    /// Credits available at the time of the check
    pub available: u32,
}

/// Repository for credit account operations.
pub struct CreditLedger {
    client: SupabaseClient,
}

impl CreditLedger {
    /// Create a new credit ledger.
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Current available credits for a user.
    ///
    /// A user without a profile row has no prepaid balance; that reads as
    /// zero rather than an error.
    pub async fn available(&self, user_id: &str) -> LedgerResult<u32> {
        let row = self
            .client
            .select_one("profiles", "user_id", user_id, "credits")
            .await?;

        match row {
            Some(profile) => {
                let credits = profile
                    .get("credits")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| {
                        LedgerError::invalid_response("profile row has no numeric credits field")
                    })?;
                Ok(credits as u32)
            }
            None => {
                debug!(user_id = %user_id, "No profile row, treating balance as zero");
                Ok(0)
            }
        }
    }

    /// Check that the user's balance covers `required` credits.
    ///
    /// Read-only; a `true` result can still be invalidated by a concurrent
    /// deduction, which [`Self::deduct_and_record`] resolves atomically.
    pub async fn check_and_reserve(
        &self,
        user_id: &str,
        required: u32,
    ) -> LedgerResult<CreditCheck> {
        let available = self.available(user_id).await?;
        Ok(CreditCheck {
            ok: available >= required,
            available,
        })
    }

    /// Atomically deduct `cost` credits and insert the usage record.
    ///
    /// Both writes happen in one stored-procedure transaction: either the
    /// balance drops and the row exists, or neither happened. A balance
    /// that fell short in the meantime surfaces as
    /// [`LedgerError::InsufficientCredits`].
    pub async fn deduct_and_record(
        &self,
        user_id: &str,
        cost: u32,
        usage: &NewUsageRecord,
    ) -> LedgerResult<UsageRecord> {
        let args = json!({
            "p_user_id": user_id,
            "p_cost": cost,
            "p_service_name": usage.service_name,
            "p_job_id": usage.job_id,
            "p_prompt": usage.prompt,
        });

        let row = match self.client.rpc(DEDUCT_FUNCTION, &args).await {
            Ok(row) => row,
            Err(e) => return Err(Self::map_deduct_error(e)),
        };

        let record: UsageRecord = serde_json::from_value(row)
            .map_err(|e| LedgerError::invalid_response(format!("bad usage row from rpc: {e}")))?;

        info!(
            user_id = %user_id,
            credits = cost,
            usage_id = %record.id,
            "Deducted credits and recorded usage"
        );
        Ok(record)
    }

    /// Turn the stored procedure's raised exception into a typed error.
    fn map_deduct_error(error: LedgerError) -> LedgerError {
        let LedgerError::RequestFailed { status, body } = &error else {
            return error;
        };

        let Ok(payload) = serde_json::from_str::<Value>(body) else {
            return error;
        };

        let message = payload.get("message").and_then(Value::as_str).unwrap_or("");
        if message != INSUFFICIENT_TAG {
            return error;
        }

        // The procedure reports the remaining balance in the error detail.
        let available = payload
            .get("details")
            .and_then(Value::as_str)
            .and_then(|d| d.parse().ok())
            .unwrap_or(0);

        warn!(status = *status, available = available, "Deduction raced a short balance");
        LedgerError::InsufficientCredits { available }
    }
}
