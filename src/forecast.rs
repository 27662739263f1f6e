//! Tree update parameter forecast.
//!
//! Measures deposit/withdrawal throughput over `[from_block, head]`, then
//! projects the leaf counts a proposal submitted now should start from once it
//! executes `proposal_days` later, and the batch step to use.
//!
//! The counter snapshot is read at the current head, independently of the log
//! window, so a block landing between the reads skews the forecast slightly.
//! That skew is reported (`ForecastReport::window.to_block`) but not corrected.
//! Log queries end at that resolved head, never at `latest`.

use alloy_primitives::Address;
use alloy_rpc_types_eth::BlockNumberOrTag;
use futures_util::future::try_join_all;
use serde::Serialize;

use crate::chain::{event_filter, BlockHeader, BlockLogReader, TreesStateReader};
use crate::config::ForecastConfig;
use crate::error::OpsError;
use crate::namehash::event_topic;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Inputs of one forecast run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastParams {
    pub from_block: u64,
    pub instances: Vec<Address>,
    pub proposal_days: u64,
    pub step_divisor: u64,
    pub deposit_event: String,
    pub withdrawal_event: String,
}

impl From<&ForecastConfig> for ForecastParams {
    fn from(cfg: &ForecastConfig) -> Self {
        Self {
            from_block: cfg.from_block,
            instances: cfg.instances.clone(),
            proposal_days: cfg.proposal_days,
            step_divisor: cfg.step_divisor,
            deposit_event: cfg.deposit_event.clone(),
            withdrawal_event: cfg.withdrawal_event.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityWindow {
    pub from_block: u64,
    /// Head block number at the time the window was resolved.
    pub to_block: u64,
    pub from_timestamp: u64,
    pub to_timestamp: u64,
    pub span_days: f64,
}

impl ActivityWindow {
    /// Fails unless the head is strictly later than the start block.
    pub fn from_headers(from: BlockHeader, head: BlockHeader) -> Result<Self, OpsError> {
        if head.timestamp <= from.timestamp {
            return Err(OpsError::NonPositiveSpan {
                from_timestamp: from.timestamp,
                to_timestamp: head.timestamp,
            });
        }
        Ok(Self {
            from_block: from.number,
            to_block: head.number,
            from_timestamp: from.timestamp,
            to_timestamp: head.timestamp,
            span_days: (head.timestamp - from.timestamp) as f64 / SECONDS_PER_DAY,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCount {
    pub event_signature: String,
    /// One entry per instance, in configuration order.
    pub per_instance_counts: Vec<u64>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedCounters {
    pub processed_deposits: u64,
    pub processed_withdrawals: u64,
    pub unprocessed_deposits: u64,
    pub unprocessed_withdrawals: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rates {
    pub deposits_per_day: u64,
    pub withdrawals_per_day: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    pub deposits_from: u64,
    pub deposits_step: u64,
    pub withdrawals_from: u64,
    pub withdrawals_step: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
    pub window: ActivityWindow,
    pub deposits: EventCount,
    pub withdrawals: EventCount,
    pub rates: Rates,
    pub counters: ProcessedCounters,
    pub proposal_days: u64,
    pub step_divisor: u64,
    pub result: ForecastResult,
}

pub async fn resolve_window<R>(reader: &R, from_block: u64) -> Result<ActivityWindow, OpsError>
where
    R: BlockLogReader + ?Sized,
{
    let from = reader
        .block(BlockNumberOrTag::Number(from_block))
        .await
        .map_err(OpsError::data_source(format!("eth_getBlockByNumber({})", from_block)))?;
    let head = reader
        .block(BlockNumberOrTag::Latest)
        .await
        .map_err(OpsError::data_source("eth_getBlockByNumber(latest)"))?;
    ActivityWindow::from_headers(from, head)
}

/// Counts logs of one event across all instances over `[from_block, to_block]`.
///
/// Every per-instance query is in flight at once; the counts are summed only
/// after all of them succeed. The first failure aborts the whole count.
pub async fn count_events<R>(
    reader: &R,
    instances: &[Address],
    event_signature: &str,
    from_block: u64,
    to_block: u64,
) -> Result<EventCount, OpsError>
where
    R: BlockLogReader + ?Sized,
{
    let topic = event_topic(event_signature);
    let queries = instances.iter().map(|address| {
        let filter = event_filter(*address, topic, from_block, to_block);
        async move {
            let logs = reader.logs(&filter).await.map_err(OpsError::data_source(format!(
                "eth_getLogs({} blocks {}..={} at {})",
                event_signature, from_block, to_block, address
            )))?;
            tracing::debug!(instance = %address, event = event_signature, count = logs.len(), "instance logs");
            Ok::<u64, OpsError>(logs.len() as u64)
        }
    });

    let per_instance_counts = try_join_all(queries).await?;
    let total = per_instance_counts.iter().sum();
    Ok(EventCount {
        event_signature: event_signature.to_string(),
        per_instance_counts,
        total,
    })
}

pub async fn read_counters<S>(state: &S) -> Result<ProcessedCounters, OpsError>
where
    S: TreesStateReader + ?Sized,
{
    let (processed_deposits, processed_withdrawals, unprocessed_deposits, unprocessed_withdrawals) = tokio::try_join!(
        async {
            state
                .last_processed_deposit_leaf()
                .await
                .map_err(OpsError::data_source("lastProcessedDepositLeaf()"))
        },
        async {
            state
                .last_processed_withdrawal_leaf()
                .await
                .map_err(OpsError::data_source("lastProcessedWithdrawalLeaf()"))
        },
        async {
            state
                .registered_deposits_len()
                .await
                .map_err(OpsError::data_source("getRegisteredDeposits()"))
        },
        async {
            state
                .registered_withdrawals_len()
                .await
                .map_err(OpsError::data_source("getRegisteredWithdrawals()"))
        },
    )?;

    Ok(ProcessedCounters {
        processed_deposits,
        processed_withdrawals,
        unprocessed_deposits,
        unprocessed_withdrawals,
    })
}

/// `round(count / span_days)`, half away from zero.
pub fn per_day(count: u64, span_days: f64) -> Result<u64, OpsError> {
    if !(span_days.is_finite() && span_days > 0.0) {
        return Err(OpsError::Configuration(format!(
            "cannot derive a daily rate over a span of {} days",
            span_days
        )));
    }
    Ok((count as f64 / span_days).round() as u64)
}

pub fn compute_forecast(
    counters: &ProcessedCounters,
    rates: &Rates,
    proposal_days: u64,
    step_divisor: u64,
) -> Result<ForecastResult, OpsError> {
    if step_divisor == 0 {
        return Err(OpsError::Configuration(
            "step_divisor must be at least 1".to_string(),
        ));
    }
    let step = |per_day: u64| (per_day as f64 / step_divisor as f64).round() as u64;
    let from = |processed: u64, unprocessed: u64, per_day: u64| {
        processed
            .saturating_add(unprocessed)
            .saturating_add(per_day.saturating_mul(proposal_days))
    };

    Ok(ForecastResult {
        deposits_from: from(
            counters.processed_deposits,
            counters.unprocessed_deposits,
            rates.deposits_per_day,
        ),
        deposits_step: step(rates.deposits_per_day),
        withdrawals_from: from(
            counters.processed_withdrawals,
            counters.unprocessed_withdrawals,
            rates.withdrawals_per_day,
        ),
        withdrawals_step: step(rates.withdrawals_per_day),
    })
}

/// Full forecast run: window, both event counts, rates, snapshot, result.
pub async fn run<R, S>(reader: &R, state: &S, params: &ForecastParams) -> Result<ForecastReport, OpsError>
where
    R: BlockLogReader + ?Sized,
    S: TreesStateReader + ?Sized,
{
    if params.instances.is_empty() {
        tracing::warn!("no instances configured; assuming zero growth (likely misconfiguration)");
    }

    let window = resolve_window(reader, params.from_block).await?;
    tracing::info!(
        from_block = window.from_block,
        head = window.to_block,
        span_days = window.span_days,
        "Resolved observation window"
    );

    let (from_block, to_block) = (window.from_block, window.to_block);
    let deposits = count_events(reader, &params.instances, &params.deposit_event, from_block, to_block).await?;
    tracing::info!(count = deposits.total, event = %deposits.event_signature, "Counted deposits");
    let withdrawals =
        count_events(reader, &params.instances, &params.withdrawal_event, from_block, to_block).await?;
    tracing::info!(count = withdrawals.total, event = %withdrawals.event_signature, "Counted withdrawals");

    let rates = Rates {
        deposits_per_day: per_day(deposits.total, window.span_days)?,
        withdrawals_per_day: per_day(withdrawals.total, window.span_days)?,
    };

    let counters = read_counters(state).await?;
    tracing::debug!(
        window_head = window.to_block,
        "counter snapshot read at current head, not pinned to the log window"
    );

    let result = compute_forecast(&counters, &rates, params.proposal_days, params.step_divisor)?;

    Ok(ForecastReport {
        window,
        deposits,
        withdrawals,
        rates,
        counters,
        proposal_days: params.proposal_days,
        step_divisor: params.step_divisor,
        result,
    })
}
