#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use ulid::Ulid;

pub const MS_PER_DAY: i64 = 86_400_000;

/// Hard ceiling on federated trust lifetime: seven days, enforced at
/// every write regardless of configuration.
pub const MAX_FEDERATION_TTL_MS: i64 = 7 * MS_PER_DAY;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum GovernanceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("immutability violation: {0}")]
    Immutability(String),
    #[error("concurrency conflict: {0}")]
    Conflict(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("replay error: {0}")]
    Replay(String),
}

// ---------------------------------------------------------------------------
// Time helpers. All engine timestamps are epoch milliseconds, UTC.
// ---------------------------------------------------------------------------

#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Parses an RFC3339 timestamp and requires UTC (`Z`) offset, returning
/// epoch milliseconds.
///
/// # Errors
/// Returns [`GovernanceError::Validation`] when parsing fails or the
/// timestamp is not UTC.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_rfc3339_ms(value: &str) -> Result<i64, GovernanceError> {
    let parsed = OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|err| GovernanceError::Validation(format!("invalid RFC3339 timestamp: {err}")))?;

    if parsed.offset() != UtcOffset::UTC {
        return Err(GovernanceError::Validation(
            "timestamp MUST use UTC offset Z".to_string(),
        ));
    }

    Ok((parsed.unix_timestamp_nanos() / 1_000_000) as i64)
}

/// Formats epoch milliseconds as an RFC3339 UTC string.
///
/// # Errors
/// Returns [`GovernanceError::Validation`] when the value is outside the
/// representable range.
pub fn format_ms_rfc3339(epoch_ms: i64) -> Result<String, GovernanceError> {
    let nanos = i128::from(epoch_ms) * 1_000_000;
    let value = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|err| GovernanceError::Validation(format!("invalid epoch ms value: {err}")))?;
    value
        .format(&Rfc3339)
        .map_err(|err| GovernanceError::Validation(format!("failed to format timestamp: {err}")))
}

// ---------------------------------------------------------------------------
// Hashing. SHA-256 over stable serde_json serialization, hex-encoded.
// ---------------------------------------------------------------------------

#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash a JSON value with stable `serde_json` serialization + SHA-256.
///
/// # Errors
/// Returns [`GovernanceError::Validation`] if JSON serialization fails.
pub fn hash_json(value: &Value) -> Result<String, GovernanceError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|err| GovernanceError::Validation(format!("failed to serialize JSON: {err}")))?;
    Ok(hash_bytes(&bytes))
}

/// Ensure a string field is non-empty after trimming.
///
/// # Errors
/// Returns [`GovernanceError::Validation`] when the value is empty or
/// whitespace.
pub fn ensure_non_empty(field_name: &str, value: &str) -> Result<(), GovernanceError> {
    if value.trim().is_empty() {
        return Err(GovernanceError::Validation(format!(
            "{field_name} MUST be non-empty"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Governance key: one installed capability action.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CapabilityKey {
    pub capability_id: String,
    pub action_id: String,
}

impl CapabilityKey {
    /// Builds a validated key from caller-supplied opaque identifiers.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] when either component is
    /// empty or contains the `:` separator.
    pub fn new(capability_id: &str, action_id: &str) -> Result<Self, GovernanceError> {
        ensure_non_empty("capability_id", capability_id)?;
        ensure_non_empty("action_id", action_id)?;
        if capability_id.contains(':') || action_id.contains(':') {
            return Err(GovernanceError::Validation(
                "capability_id and action_id MUST NOT contain ':'".to_string(),
            ));
        }
        Ok(Self {
            capability_id: capability_id.to_string(),
            action_id: action_id.to_string(),
        })
    }
}

impl Display for CapabilityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.capability_id, self.action_id)
    }
}

// ---------------------------------------------------------------------------
// Ruleset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GovernanceRuleset {
    pub ruleset_version: u32,
    /// Consecutive successes promoting EARNING to STABLE.
    pub promote_successes: u32,
    /// Consecutive successes recovering DEGRADING to STABLE.
    pub recover_successes: u32,
    /// Consecutive failures forcing any state to DEGRADING.
    pub degrade_failures: u32,
    /// Risk scores strictly below this classify as LOW.
    pub tier_low_max: f64,
    /// Risk scores strictly below this (and >= `tier_low_max`) classify
    /// as MEDIUM; everything else is HIGH.
    pub tier_med_max: f64,
    /// When true, PROMOTE decisions carry `review_level = NONE` and
    /// execute without human approval.
    pub autonomous_promotion: bool,
    /// Executions left `running` past this are reaped to `failed`.
    pub running_timeout_ms: i64,
}

impl GovernanceRuleset {
    #[must_use]
    pub fn v1() -> Self {
        Self {
            ruleset_version: 1,
            promote_successes: 5,
            recover_successes: 3,
            degrade_failures: 3,
            tier_low_max: 0.4,
            tier_med_max: 0.7,
            autonomous_promotion: false,
            running_timeout_ms: 300_000,
        }
    }

    /// Validates ruleset bounds.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Configuration`] when one or more fields
    /// are outside allowed bounds.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.ruleset_version == 0 {
            return Err(GovernanceError::Configuration(
                "ruleset_version MUST be >= 1".to_string(),
            ));
        }

        for (name, value) in [
            ("promote_successes", self.promote_successes),
            ("recover_successes", self.recover_successes),
            ("degrade_failures", self.degrade_failures),
        ] {
            if value == 0 {
                return Err(GovernanceError::Configuration(format!(
                    "{name} MUST be >= 1"
                )));
            }
        }

        for (name, value) in [
            ("tier_low_max", self.tier_low_max),
            ("tier_med_max", self.tier_med_max),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GovernanceError::Configuration(format!(
                    "{name} MUST be in [0.0, 1.0]"
                )));
            }
        }

        if self.tier_low_max >= self.tier_med_max {
            return Err(GovernanceError::Configuration(
                "tier_low_max MUST be strictly below tier_med_max".to_string(),
            ));
        }

        if self.running_timeout_ms <= 0 {
            return Err(GovernanceError::Configuration(
                "running_timeout_ms MUST be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Decodes and validates a ruleset from JSON.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Configuration`] when decoding fails or
    /// decoded values violate constraints.
    pub fn from_json(value: &Value) -> Result<Self, GovernanceError> {
        let ruleset: Self = serde_json::from_value(value.clone()).map_err(|err| {
            GovernanceError::Configuration(format!("invalid ruleset JSON payload: {err}"))
        })?;
        ruleset.validate()?;
        Ok(ruleset)
    }
}

// ---------------------------------------------------------------------------
// Trajectory state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Trajectory {
    Earning,
    Stable,
    Degrading,
}

impl Trajectory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Earning => "earning",
            Self::Stable => "stable",
            Self::Degrading => "degrading",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "earning" => Some(Self::Earning),
            "stable" => Some(Self::Stable),
            "degrading" => Some(Self::Degrading),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Failure,
    PolicyRejection,
    HighRisk,
}

impl OutcomeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::PolicyRejection => "policy_rejection",
            Self::HighRisk => "high_risk",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "policy_rejection" => Some(Self::PolicyRejection),
            "high_risk" => Some(Self::HighRisk),
            _ => None,
        }
    }
}

/// Risk/policy context attached to an outcome event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskContext {
    pub risk_score: Option<f64>,
    pub policy_id: Option<String>,
    pub note: Option<String>,
}

impl RiskContext {
    /// Validates the optional risk score bound.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] when `risk_score` is
    /// outside `[0.0, 1.0]`.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if let Some(score) = self.risk_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(GovernanceError::Validation(
                    "risk_score MUST be in [0.0, 1.0]".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Live behavioral trend for one capability action. One record per key,
/// mutated in place by the trajectory engine; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustState {
    pub key: CapabilityKey,
    pub trajectory: Trajectory,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub policy_rejections: u32,
    pub high_risk_events: u32,
    pub state_entered_at: i64,
    pub last_event_at: i64,
}

impl TrustState {
    #[must_use]
    pub fn new(key: CapabilityKey, now_ms: i64) -> Self {
        Self {
            key,
            trajectory: Trajectory::Earning,
            consecutive_successes: 0,
            consecutive_failures: 0,
            policy_rejections: 0,
            high_risk_events: 0,
            state_entered_at: now_ms,
            last_event_at: now_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustTransition {
    pub key: CapabilityKey,
    pub old_state: Trajectory,
    pub new_state: Trajectory,
    pub trigger_event: OutcomeKind,
    pub event_id: String,
    pub explain: String,
    pub risk_score: Option<f64>,
    pub policy_id: Option<String>,
    pub occurred_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeApplication {
    pub state: TrustState,
    pub transition: Option<TrustTransition>,
}

/// Applies one outcome event to a trust state.
///
/// Pure: returns the updated state and, if the trajectory actually
/// changed, the transition record to append. `state_entered_at` moves
/// only on a change; `last_event_at` moves on every applied event.
#[must_use]
pub fn apply_outcome(
    state: &TrustState,
    event_id: &str,
    outcome: OutcomeKind,
    context: &RiskContext,
    ruleset: &GovernanceRuleset,
    occurred_at: i64,
) -> OutcomeApplication {
    let mut next = state.clone();
    next.last_event_at = occurred_at;

    let change: Option<(Trajectory, String)> = match outcome {
        OutcomeKind::Success => {
            next.consecutive_successes = next.consecutive_successes.saturating_add(1);
            next.consecutive_failures = 0;
            match state.trajectory {
                Trajectory::Earning
                    if next.consecutive_successes >= ruleset.promote_successes =>
                {
                    Some((
                        Trajectory::Stable,
                        format!(
                            "{} consecutive successes met promotion threshold {}",
                            next.consecutive_successes, ruleset.promote_successes
                        ),
                    ))
                }
                Trajectory::Degrading
                    if next.consecutive_successes >= ruleset.recover_successes =>
                {
                    Some((
                        Trajectory::Stable,
                        format!(
                            "{} consecutive successes met recovery threshold {}",
                            next.consecutive_successes, ruleset.recover_successes
                        ),
                    ))
                }
                _ => None,
            }
        }
        OutcomeKind::Failure => {
            next.consecutive_failures = next.consecutive_failures.saturating_add(1);
            next.consecutive_successes = 0;
            if next.consecutive_failures >= ruleset.degrade_failures
                && state.trajectory != Trajectory::Degrading
            {
                Some((
                    Trajectory::Degrading,
                    format!(
                        "{} consecutive failures met degrade threshold {}",
                        next.consecutive_failures, ruleset.degrade_failures
                    ),
                ))
            } else {
                None
            }
        }
        OutcomeKind::PolicyRejection => {
            // Policy violations are never absorbed by thresholds.
            next.policy_rejections = next.policy_rejections.saturating_add(1);
            next.consecutive_successes = 0;
            if state.trajectory == Trajectory::Degrading {
                None
            } else {
                Some((
                    Trajectory::Degrading,
                    format!(
                        "policy_rejection@{} forces degrading",
                        occurred_at
                    ),
                ))
            }
        }
        OutcomeKind::HighRisk => {
            next.high_risk_events = next.high_risk_events.saturating_add(1);
            if state.trajectory == Trajectory::Stable {
                Some((
                    Trajectory::Degrading,
                    format!("high_risk@{occurred_at} forces degrading from stable"),
                ))
            } else {
                None
            }
        }
    };

    let transition = change.map(|(new_state, explain)| {
        next.trajectory = new_state;
        next.state_entered_at = occurred_at;
        TrustTransition {
            key: state.key.clone(),
            old_state: state.trajectory,
            new_state,
            trigger_event: outcome,
            event_id: event_id.to_string(),
            explain,
            risk_score: context.risk_score,
            policy_id: context.policy_id.clone(),
            occurred_at,
        }
    });

    OutcomeApplication {
        state: next,
        transition,
    }
}

// ---------------------------------------------------------------------------
// Risk & tier classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Low,
    Medium,
    High,
}

impl TrustTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Current tier projection for one key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustTierRecord {
    pub key: CapabilityKey,
    pub tier: TrustTier,
    pub risk_score: f64,
    pub reason: String,
    pub updated_at: i64,
}

/// Appended whenever the computed tier differs from the cached one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustTierChange {
    pub key: CapabilityKey,
    pub old_tier: Option<TrustTier>,
    pub new_tier: TrustTier,
    pub risk_score: f64,
    pub reason: String,
    pub occurred_at: i64,
}

/// Maps a risk score to a discrete trust tier.
///
/// # Errors
/// Returns [`GovernanceError::Validation`] when the score is outside
/// `[0.0, 1.0]`.
pub fn classify_tier(
    risk_score: f64,
    ruleset: &GovernanceRuleset,
) -> Result<TrustTier, GovernanceError> {
    if !(0.0..=1.0).contains(&risk_score) {
        return Err(GovernanceError::Validation(
            "risk_score MUST be in [0.0, 1.0]".to_string(),
        ));
    }

    if risk_score < ruleset.tier_low_max {
        Ok(TrustTier::Low)
    } else if risk_score < ruleset.tier_med_max {
        Ok(TrustTier::Medium)
    } else {
        Ok(TrustTier::High)
    }
}

// ---------------------------------------------------------------------------
// Evolution decision engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionAction {
    Promote,
    Freeze,
    Revoke,
    None,
}

impl EvolutionAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::Freeze => "freeze",
            Self::Revoke => "revoke",
            Self::None => "none",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "promote" => Some(Self::Promote),
            "freeze" => Some(Self::Freeze),
            "revoke" => Some(Self::Revoke),
            "none" => Some(Self::None),
            _ => None,
        }
    }

}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReviewLevel {
    None,
    Standard,
    HighPriority,
    Critical,
}

impl ReviewLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Standard => "standard",
            Self::HighPriority => "high_priority",
            Self::Critical => "critical",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "standard" => Some(Self::Standard),
            "high_priority" => Some(Self::HighPriority),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Proposed,
    Approved,
    Rejected,
    Executed,
}

impl DecisionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Executed => "executed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "proposed" => Some(Self::Proposed),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "executed" => Some(Self::Executed),
            _ => None,
        }
    }

    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Proposed, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Executed)
        )
    }
}

/// Inputs to the decision engine, snapshotted by value so decisions
/// remain interpretable after the underlying state moves on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionInputs {
    pub key: CapabilityKey,
    pub tier: TrustTier,
    pub trajectory: Trajectory,
    pub risk_score: f64,
    pub consecutive_failures: u32,
    pub policy_rejections: u32,
    pub prior_tier: Option<TrustTier>,
    pub outstanding_restriction: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvolutionDecision {
    pub decision_id: Ulid,
    pub key: CapabilityKey,
    pub action: EvolutionAction,
    pub risk_score: f64,
    pub trust_tier: TrustTier,
    pub trust_trajectory: Trajectory,
    pub explanation: String,
    pub causal_chain: Vec<String>,
    pub review_level: ReviewLevel,
    pub requires_review: bool,
    pub status: DecisionStatus,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

struct RuleVerdict {
    action: EvolutionAction,
    review_level: ReviewLevel,
    causal_chain: Vec<String>,
    explanation: String,
}

type DecisionRule = fn(&DecisionInputs, &GovernanceRuleset) -> Option<RuleVerdict>;

/// Ordered rule table: first match wins.
const DECISION_RULES: &[(&str, DecisionRule)] = &[
    ("revoke_degrading_high_tier_violation", rule_revoke),
    ("freeze_degrading", rule_freeze),
    ("promote_stable_tier_improved", rule_promote),
];

fn rule_revoke(inputs: &DecisionInputs, _ruleset: &GovernanceRuleset) -> Option<RuleVerdict> {
    if inputs.trajectory == Trajectory::Degrading
        && inputs.tier == TrustTier::High
        && inputs.policy_rejections > 0
    {
        Some(RuleVerdict {
            action: EvolutionAction::Revoke,
            review_level: ReviewLevel::Critical,
            causal_chain: signal_chain(inputs),
            explanation: format!(
                "degrading trajectory at high tier with {} policy rejections requires revocation",
                inputs.policy_rejections
            ),
        })
    } else {
        None
    }
}

fn rule_freeze(inputs: &DecisionInputs, _ruleset: &GovernanceRuleset) -> Option<RuleVerdict> {
    if inputs.trajectory == Trajectory::Degrading {
        let review_level = if inputs.tier == TrustTier::Low {
            ReviewLevel::Standard
        } else {
            ReviewLevel::HighPriority
        };
        Some(RuleVerdict {
            action: EvolutionAction::Freeze,
            review_level,
            causal_chain: signal_chain(inputs),
            explanation: "degrading trajectory freezes the capability pending review".to_string(),
        })
    } else {
        None
    }
}

fn rule_promote(inputs: &DecisionInputs, ruleset: &GovernanceRuleset) -> Option<RuleVerdict> {
    // Tiers classify risk, so improvement means moving toward LOW.
    let improved = inputs
        .prior_tier
        .is_some_and(|prior| inputs.tier < prior);
    if inputs.trajectory == Trajectory::Stable && improved && !inputs.outstanding_restriction {
        let review_level = if ruleset.autonomous_promotion {
            ReviewLevel::None
        } else {
            ReviewLevel::Standard
        };
        Some(RuleVerdict {
            action: EvolutionAction::Promote,
            review_level,
            causal_chain: signal_chain(inputs),
            explanation: "stable trajectory with improved tier qualifies for promotion".to_string(),
        })
    } else {
        None
    }
}

fn signal_chain(inputs: &DecisionInputs) -> Vec<String> {
    let mut chain = Vec::new();
    chain.push(format!("trajectory={}", inputs.trajectory.as_str()));
    if inputs.consecutive_failures > 0 {
        chain.push(format!(
            "{} consecutive failures",
            inputs.consecutive_failures
        ));
    }
    if inputs.policy_rejections > 0 {
        chain.push(format!("{} policy rejections", inputs.policy_rejections));
    }
    chain.push(format!("tier={}", inputs.tier.as_str()));
    chain.push(format!("risk_score={}", inputs.risk_score));
    if let Some(prior) = inputs.prior_tier {
        chain.push(format!("prior_tier={}", prior.as_str()));
    }
    chain
}

/// Pure decision engine: ordered rules, first match wins.
///
/// REVOKE/FREEZE verdicts are born effective (fail closed); PROMOTE
/// waits in `Proposed` for approval (fail open only after review).
#[must_use]
pub fn decide(
    inputs: &DecisionInputs,
    ruleset: &GovernanceRuleset,
    now_ms: i64,
) -> EvolutionDecision {
    let verdict = DECISION_RULES
        .iter()
        .find_map(|(_, rule)| rule(inputs, ruleset));

    let (action, review_level, causal_chain, explanation) = match verdict {
        Some(v) => (v.action, v.review_level, v.causal_chain, v.explanation),
        None => (
            EvolutionAction::None,
            ReviewLevel::None,
            Vec::new(),
            "no evolution rule matched".to_string(),
        ),
    };

    let requires_review = matches!(
        review_level,
        ReviewLevel::HighPriority | ReviewLevel::Critical
    ) || matches!(action, EvolutionAction::Freeze | EvolutionAction::Revoke);

    // Restrictive actions stay proposed but are effective immediately;
    // review, where required, is post-hoc. Autonomous promotions and
    // no-op verdicts have nothing left to review.
    let status = match action {
        EvolutionAction::None => DecisionStatus::Executed,
        EvolutionAction::Promote if review_level == ReviewLevel::None => DecisionStatus::Executed,
        EvolutionAction::Promote | EvolutionAction::Freeze | EvolutionAction::Revoke => {
            DecisionStatus::Proposed
        }
    };

    EvolutionDecision {
        decision_id: Ulid::new(),
        key: inputs.key.clone(),
        action,
        risk_score: inputs.risk_score,
        trust_tier: inputs.tier,
        trust_trajectory: inputs.trajectory,
        explanation,
        causal_chain,
        review_level,
        requires_review,
        status,
        created_at: now_ms,
        expires_at: None,
    }
}

/// Canonical replayable projection of a decision: everything the rule
/// engine determines, nothing the clock or id generator adds.
#[must_use]
pub fn decision_outcome_value(decision: &EvolutionDecision) -> Value {
    json!({
        "action": decision.action.as_str(),
        "review_level": decision.review_level.as_str(),
        "requires_review": decision.requires_review,
        "causal_chain": decision.causal_chain,
        "explanation": decision.explanation,
    })
}

// ---------------------------------------------------------------------------
// Execution authorization gate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationScope {
    User,
    Session,
    Global,
}

impl AuthorizationScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Session => "session",
            Self::Global => "global",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "session" => Some(Self::Session),
            "global" => Some(Self::Global),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Active,
    Revoked,
    Expired,
}

impl AuthorizationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Authorization {
    pub authorization_id: Ulid,
    pub key: CapabilityKey,
    pub scope: AuthorizationScope,
    pub scope_id: Option<String>,
    pub expires_at: Option<i64>,
    pub max_executions: Option<u32>,
    pub execution_count: u32,
    pub status: AuthorizationStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct InvocationContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NoActiveAuthorization,
    Expired,
    ExecutionBudgetExhausted,
    DecisionFreeze,
    DecisionRevoke,
}

impl DenyReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoActiveAuthorization => "no_active_authorization",
            Self::Expired => "expired",
            Self::ExecutionBudgetExhausted => "execution_budget_exhausted",
            Self::DecisionFreeze => "decision_freeze",
            Self::DecisionRevoke => "decision_revoke",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "no_active_authorization" => Some(Self::NoActiveAuthorization),
            "expired" => Some(Self::Expired),
            "execution_budget_exhausted" => Some(Self::ExecutionBudgetExhausted),
            "decision_freeze" => Some(Self::DecisionFreeze),
            "decision_revoke" => Some(Self::DecisionRevoke),
            _ => None,
        }
    }

    /// Trajectory feedback for a blocked attempt: decision-driven blocks
    /// are policy violations; operational blocks are plain failures.
    #[must_use]
    pub fn blocked_outcome(self) -> OutcomeKind {
        match self {
            Self::DecisionFreeze | Self::DecisionRevoke => OutcomeKind::PolicyRejection,
            Self::NoActiveAuthorization | Self::Expired | Self::ExecutionBudgetExhausted => {
                OutcomeKind::Failure
            }
        }
    }
}

#[must_use]
pub fn scope_matches(authorization: &Authorization, context: &InvocationContext) -> bool {
    match authorization.scope {
        AuthorizationScope::Global => true,
        AuthorizationScope::User => {
            authorization.scope_id.is_some() && authorization.scope_id == context.user_id
        }
        AuthorizationScope::Session => {
            authorization.scope_id.is_some() && authorization.scope_id == context.session_id
        }
    }
}

/// Gate checks for a single candidate authorization: active status,
/// expiry, then budget. Candidate selection and the standing
/// REVOKE/FREEZE check are applied by the caller across the key.
///
/// # Errors
/// Returns the first failing [`DenyReason`].
pub fn check_authorization(
    authorization: &Authorization,
    now_ms: i64,
) -> Result<(), DenyReason> {
    if authorization.status != AuthorizationStatus::Active {
        return Err(DenyReason::NoActiveAuthorization);
    }

    if let Some(expires_at) = authorization.expires_at {
        if now_ms >= expires_at {
            return Err(DenyReason::Expired);
        }
    }

    if let Some(max) = authorization.max_executions {
        if authorization.execution_count >= max {
            return Err(DenyReason::ExecutionBudgetExhausted);
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Blocked,
}

impl ExecutionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRecord {
    pub execution_id: Ulid,
    pub authorization_id: Option<Ulid>,
    pub key: CapabilityKey,
    pub status: ExecutionStatus,
    pub blocked_reason: Option<DenyReason>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

// ---------------------------------------------------------------------------
// Federated trust lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FederationLevel {
    Minimal,
    Limited,
    Standard,
}

impl FederationLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Limited => "limited",
            Self::Standard => "standard",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "minimal" => Some(Self::Minimal),
            "limited" => Some(Self::Limited),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FederationStatus {
    Active,
    Expired,
    Revoked,
    Degraded,
}

impl FederationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Degraded => "degraded",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            "degraded" => Some(Self::Degraded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FederationAction {
    Establish,
    Renew,
    Revoke,
    Downgrade,
    Expire,
}

impl FederationAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Establish => "establish",
            Self::Renew => "renew",
            Self::Revoke => "revoke",
            Self::Downgrade => "downgrade",
            Self::Expire => "expire",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "establish" => Some(Self::Establish),
            "renew" => Some(Self::Renew),
            "revoke" => Some(Self::Revoke),
            "downgrade" => Some(Self::Downgrade),
            "expire" => Some(Self::Expire),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FederationHistoryRecord {
    pub remote_system_id: String,
    pub action: FederationAction,
    pub description: String,
    pub old_expires_at: Option<i64>,
    pub new_expires_at: Option<i64>,
    pub old_level: Option<FederationLevel>,
    pub new_level: Option<FederationLevel>,
    pub occurred_at: i64,
}

/// Time-bound, revocable, downgrade-only trust grant to a remote system.
///
/// `remote_system_id` and `established_at` are immutable after creation:
/// the fields are private and no setter exists. Every mutation returns
/// the history record that MUST be persisted with it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FederatedTrust {
    remote_system_id: String,
    established_at: i64,
    expires_at: i64,
    trust_level: FederationLevel,
    status: FederationStatus,
    can_revoke: bool,
    revoke_reason: Option<String>,
}

impl FederatedTrust {
    /// Establishes a new time-bound grant.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] when the remote id is
    /// empty, the TTL is missing/non-positive, or the TTL exceeds the
    /// seven-day ceiling.
    pub fn establish(
        remote_system_id: &str,
        trust_level: FederationLevel,
        ttl_ms: i64,
        can_revoke: bool,
        now_ms: i64,
    ) -> Result<(Self, FederationHistoryRecord), GovernanceError> {
        ensure_non_empty("remote_system_id", remote_system_id)?;

        if ttl_ms <= 0 {
            return Err(GovernanceError::Validation(
                "ttl_ms MUST be positive: unlimited trust is not grantable".to_string(),
            ));
        }
        if ttl_ms > MAX_FEDERATION_TTL_MS {
            return Err(GovernanceError::Validation(format!(
                "ttl_ms MUST NOT exceed {MAX_FEDERATION_TTL_MS} (7 days)"
            )));
        }

        let trust = Self {
            remote_system_id: remote_system_id.to_string(),
            established_at: now_ms,
            expires_at: now_ms + ttl_ms,
            trust_level,
            status: FederationStatus::Active,
            can_revoke,
            revoke_reason: None,
        };
        let history = FederationHistoryRecord {
            remote_system_id: trust.remote_system_id.clone(),
            action: FederationAction::Establish,
            description: format!(
                "established {} trust expiring at {}",
                trust_level.as_str(),
                trust.expires_at
            ),
            old_expires_at: None,
            new_expires_at: Some(trust.expires_at),
            old_level: None,
            new_level: Some(trust_level),
            occurred_at: now_ms,
        };
        Ok((trust, history))
    }

    /// Rehydrates a stored grant, re-checking every write-time invariant.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] when the stored fields
    /// violate the federation invariants.
    pub fn restore(
        remote_system_id: String,
        established_at: i64,
        expires_at: i64,
        trust_level: FederationLevel,
        status: FederationStatus,
        can_revoke: bool,
        revoke_reason: Option<String>,
    ) -> Result<Self, GovernanceError> {
        ensure_non_empty("remote_system_id", &remote_system_id)?;
        if expires_at <= established_at {
            return Err(GovernanceError::Validation(
                "expires_at MUST be after established_at".to_string(),
            ));
        }
        if expires_at - established_at > MAX_FEDERATION_TTL_MS {
            return Err(GovernanceError::Validation(
                "stored grant exceeds the 7 day TTL ceiling".to_string(),
            ));
        }
        Ok(Self {
            remote_system_id,
            established_at,
            expires_at,
            trust_level,
            status,
            can_revoke,
            revoke_reason,
        })
    }

    #[must_use]
    pub fn remote_system_id(&self) -> &str {
        &self.remote_system_id
    }

    #[must_use]
    pub fn established_at(&self) -> i64 {
        self.established_at
    }

    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    #[must_use]
    pub fn trust_level(&self) -> FederationLevel {
        self.trust_level
    }

    #[must_use]
    pub fn stored_status(&self) -> FederationStatus {
        self.status
    }

    #[must_use]
    pub fn can_revoke(&self) -> bool {
        self.can_revoke
    }

    #[must_use]
    pub fn revoke_reason(&self) -> Option<&str> {
        self.revoke_reason.as_deref()
    }

    /// Lazy expiry: classification happens whenever the status is read,
    /// never via a background sweep.
    #[must_use]
    pub fn effective_status(&self, now_ms: i64) -> FederationStatus {
        if self.status == FederationStatus::Revoked {
            return FederationStatus::Revoked;
        }
        if now_ms > self.expires_at {
            return FederationStatus::Expired;
        }
        self.status
    }

    /// Extends the grant from its current expiry.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] when the grant is revoked
    /// or expired, the extension is non-positive, or the new expiry would
    /// exceed seven days from establishment.
    pub fn renew(
        &mut self,
        extend_ms: i64,
        now_ms: i64,
    ) -> Result<FederationHistoryRecord, GovernanceError> {
        match self.effective_status(now_ms) {
            FederationStatus::Revoked => {
                return Err(GovernanceError::Validation(
                    "revoked trust cannot be renewed; re-establish instead".to_string(),
                ));
            }
            FederationStatus::Expired => {
                return Err(GovernanceError::Validation(
                    "expired trust cannot be renewed; re-establish instead".to_string(),
                ));
            }
            FederationStatus::Active | FederationStatus::Degraded => {}
        }

        if extend_ms <= 0 {
            return Err(GovernanceError::Validation(
                "extend_ms MUST be positive".to_string(),
            ));
        }

        let new_expires_at = self.expires_at + extend_ms;
        if new_expires_at - self.established_at > MAX_FEDERATION_TTL_MS {
            return Err(GovernanceError::Validation(
                "renewal would exceed the 7 day ceiling from establishment".to_string(),
            ));
        }

        let old_expires_at = self.expires_at;
        self.expires_at = new_expires_at;
        Ok(FederationHistoryRecord {
            remote_system_id: self.remote_system_id.clone(),
            action: FederationAction::Renew,
            description: format!("renewed: expiry {old_expires_at} -> {new_expires_at}"),
            old_expires_at: Some(old_expires_at),
            new_expires_at: Some(new_expires_at),
            old_level: None,
            new_level: None,
            occurred_at: now_ms,
        })
    }

    /// Lowers the trust level in place. Trust levels only ever move
    /// downward; escalation requires a brand-new grant.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] when the grant is not
    /// usable or the target level is not strictly lower.
    pub fn downgrade(
        &mut self,
        to_level: FederationLevel,
        reason: &str,
        now_ms: i64,
    ) -> Result<FederationHistoryRecord, GovernanceError> {
        match self.effective_status(now_ms) {
            FederationStatus::Revoked | FederationStatus::Expired => {
                return Err(GovernanceError::Validation(
                    "only active trust can be downgraded".to_string(),
                ));
            }
            FederationStatus::Active | FederationStatus::Degraded => {}
        }

        if to_level >= self.trust_level {
            return Err(GovernanceError::Validation(format!(
                "trust_level only moves downward: {} -> {} is not a downgrade",
                self.trust_level.as_str(),
                to_level.as_str()
            )));
        }

        ensure_non_empty("reason", reason)?;
        let old_level = self.trust_level;
        self.trust_level = to_level;
        self.status = FederationStatus::Degraded;
        Ok(FederationHistoryRecord {
            remote_system_id: self.remote_system_id.clone(),
            action: FederationAction::Downgrade,
            description: format!(
                "downgraded {} -> {}: {reason}",
                old_level.as_str(),
                to_level.as_str()
            ),
            old_expires_at: None,
            new_expires_at: None,
            old_level: Some(old_level),
            new_level: Some(to_level),
            occurred_at: now_ms,
        })
    }

    /// Revokes the grant. Terminal: the grant can never be renewed and
    /// the remote system has no path to reverse this.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] when the grant is already
    /// revoked or was established with revocation disabled.
    pub fn revoke(
        &mut self,
        reason: &str,
        now_ms: i64,
    ) -> Result<FederationHistoryRecord, GovernanceError> {
        if self.status == FederationStatus::Revoked {
            return Err(GovernanceError::Validation(
                "trust is already revoked".to_string(),
            ));
        }
        if !self.can_revoke {
            return Err(GovernanceError::Validation(
                "grant was established with revocation disabled".to_string(),
            ));
        }
        ensure_non_empty("reason", reason)?;

        self.status = FederationStatus::Revoked;
        self.revoke_reason = Some(reason.to_string());
        Ok(FederationHistoryRecord {
            remote_system_id: self.remote_system_id.clone(),
            action: FederationAction::Revoke,
            description: format!("revoked: {reason}"),
            old_expires_at: None,
            new_expires_at: None,
            old_level: None,
            new_level: None,
            occurred_at: now_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// Evidence & replay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    OutcomeRecorded,
    TierChanged,
    EvolutionDecided,
    AuthorizationGranted,
    AuthorizationRevoked,
    AuthorizationChecked,
    ExecutionClosed,
    FederationChanged,
}

impl OperationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutcomeRecorded => "outcome_recorded",
            Self::TierChanged => "tier_changed",
            Self::EvolutionDecided => "evolution_decided",
            Self::AuthorizationGranted => "authorization_granted",
            Self::AuthorizationRevoked => "authorization_revoked",
            Self::AuthorizationChecked => "authorization_checked",
            Self::ExecutionClosed => "execution_closed",
            Self::FederationChanged => "federation_changed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "outcome_recorded" => Some(Self::OutcomeRecorded),
            "tier_changed" => Some(Self::TierChanged),
            "evolution_decided" => Some(Self::EvolutionDecided),
            "authorization_granted" => Some(Self::AuthorizationGranted),
            "authorization_revoked" => Some(Self::AuthorizationRevoked),
            "authorization_checked" => Some(Self::AuthorizationChecked),
            "execution_closed" => Some(Self::ExecutionClosed),
            "federation_changed" => Some(Self::FederationChanged),
            _ => None,
        }
    }
}

/// Immutable, integrity-hashed record of one governance operation.
///
/// `input_snapshot` carries the sanitized operation inputs (never raw
/// secrets); `input_hash`/`output_hash` summarize both sides; the
/// `integrity_hash` covers every other field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceRecord {
    pub evidence_id: Ulid,
    pub operation_type: OperationType,
    pub operation_id: String,
    pub input_snapshot: Value,
    pub input_hash: String,
    pub output_hash: String,
    pub declared_effects: Vec<String>,
    pub actual_effects: Vec<String>,
    pub recorded_at: i64,
    pub integrity_hash: String,
    pub signature: Option<String>,
}

fn evidence_body_value(record: &EvidenceRecord) -> Value {
    json!({
        "evidence_id": record.evidence_id.to_string(),
        "operation_type": record.operation_type.as_str(),
        "operation_id": record.operation_id,
        "input_snapshot": record.input_snapshot,
        "input_hash": record.input_hash,
        "output_hash": record.output_hash,
        "declared_effects": record.declared_effects,
        "actual_effects": record.actual_effects,
        "recorded_at": record.recorded_at,
        "signature": record.signature,
    })
}

/// Builds an evidence record, hashing inputs/outputs and sealing the
/// record with an integrity hash.
///
/// # Errors
/// Returns [`GovernanceError::Validation`] when serialization fails or
/// `operation_id` is empty.
#[allow(clippy::too_many_arguments)]
pub fn build_evidence(
    operation_type: OperationType,
    operation_id: &str,
    input_snapshot: Value,
    output_summary: &Value,
    declared_effects: Vec<String>,
    actual_effects: Vec<String>,
    signature: Option<String>,
    now_ms: i64,
) -> Result<EvidenceRecord, GovernanceError> {
    ensure_non_empty("operation_id", operation_id)?;

    let input_hash = hash_json(&input_snapshot)?;
    let output_hash = hash_json(output_summary)?;
    let mut record = EvidenceRecord {
        evidence_id: Ulid::new(),
        operation_type,
        operation_id: operation_id.to_string(),
        input_snapshot,
        input_hash,
        output_hash,
        declared_effects,
        actual_effects,
        recorded_at: now_ms,
        integrity_hash: String::new(),
        signature,
    };
    record.integrity_hash = hash_json(&evidence_body_value(&record))?;
    Ok(record)
}

/// Recomputes the integrity hash and compares it with the stored one.
///
/// # Errors
/// Returns [`GovernanceError::Immutability`] when the record has been
/// tampered with.
pub fn verify_evidence(record: &EvidenceRecord) -> Result<(), GovernanceError> {
    let recomputed = hash_json(&evidence_body_value(record))?;
    if recomputed != record.integrity_hash {
        return Err(GovernanceError::Immutability(format!(
            "evidence {} failed integrity verification",
            record.evidence_id
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    ReadOnly,
    Validate,
}

impl ReplayMode {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read_only" => Some(Self::ReadOnly),
            "validate" => Some(Self::Validate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMatch {
    Matches,
    Differs,
    NotCompared,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signoff {
    pub decision_id: Ulid,
    pub signed_by: String,
    pub note: String,
    pub signed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayReport {
    pub evidence_id: Ulid,
    pub mode: ReplayMode,
    pub matches: ReplayMatch,
    pub recorded_output_hash: String,
    pub recomputed_output_hash: Option<String>,
    pub diff: Vec<String>,
    pub world_diff: Option<Value>,
    pub signoff: Option<Signoff>,
}
