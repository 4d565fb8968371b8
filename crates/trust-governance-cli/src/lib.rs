#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use trust_governance_core::{
    format_ms_rfc3339, now_ms, parse_rfc3339_ms, Authorization, AuthorizationScope,
    CapabilityKey, DecisionStatus, EvolutionDecision, ExecutionRecord, FederationLevel,
    OperationType, OutcomeKind, ReplayMode, RiskContext, TrustState, TrustTransition,
};
use trust_governance_store_sqlite::{FederationSnapshot, GateOutcome, SqliteGovernanceStore};
use ulid::Ulid;

#[derive(Debug, Parser)]
#[command(name = "tg", about = "Trust and governance decision engine", version)]
pub struct Cli {
    /// Path to the governance database.
    #[arg(long, global = true, default_value = "governance.db")]
    pub db: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record and inspect behavioral outcomes.
    #[command(subcommand)]
    Outcome(OutcomeCommand),
    /// Risk scoring and trust tiers.
    #[command(subcommand)]
    Risk(RiskCommand),
    /// Evolution decisions and their review lifecycle.
    #[command(subcommand)]
    Evolution(EvolutionCommand),
    /// Execution authorizations and the gate.
    #[command(subcommand)]
    Gate(GateCommand),
    /// Federated trust grants.
    #[command(subcommand)]
    Federation(FederationCommand),
    /// Evidence ledger, replay, and signoffs.
    #[command(subcommand)]
    Evidence(EvidenceCommand),
    /// Ruleset inspection and versioning.
    #[command(subcommand)]
    Ruleset(RulesetCommand),
}

#[derive(Debug, Subcommand)]
pub enum OutcomeCommand {
    /// Append one outcome event for a capability action.
    Record {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
        /// Caller-supplied idempotency key for the event.
        #[arg(long)]
        event_id: String,
        #[arg(long, value_enum)]
        outcome: OutcomeArg,
        #[arg(long)]
        risk_score: Option<f64>,
        #[arg(long)]
        policy_id: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// RFC3339 UTC timestamp; defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Show the current trust state.
    State {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
    },
    /// List trajectory transitions, oldest first.
    Transitions {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum RiskCommand {
    /// Classify a risk score into a trust tier.
    Assess {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        score: f64,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Show the cached tier.
    Tier {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
    },
    /// List tier changes, oldest first.
    History {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum EvolutionCommand {
    /// Run the evolution rules and record the decision.
    Evaluate {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// List decisions for a key.
    List {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
    },
    /// Show one decision.
    Show {
        #[arg(long)]
        decision_id: String,
    },
    /// Approve or reject a decision.
    SetStatus {
        #[arg(long)]
        decision_id: String,
        #[arg(long, value_enum)]
        status: DecisionStatusArg,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum GateCommand {
    /// Grant an execution authorization.
    Grant {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
        #[arg(long, value_enum)]
        scope: ScopeArg,
        #[arg(long)]
        scope_id: Option<String>,
        /// RFC3339 UTC expiry; omitted means no time bound.
        #[arg(long)]
        expires_at: Option<String>,
        #[arg(long)]
        max_executions: Option<u32>,
        #[arg(long)]
        at: Option<String>,
    },
    /// Revoke an authorization.
    Revoke {
        #[arg(long)]
        authorization_id: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Run the gate for one invocation.
    Check {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long)]
        at: Option<String>,
    },
    /// Close a running execution.
    Complete {
        #[arg(long)]
        execution_id: String,
        #[arg(long, value_enum)]
        result: ExecutionResultArg,
        #[arg(long)]
        at: Option<String>,
    },
    /// Fail executions left running past the timeout.
    Reap {
        #[arg(long)]
        at: Option<String>,
    },
    /// List execution records for a key.
    Executions {
        #[arg(long)]
        capability: String,
        #[arg(long)]
        action: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum FederationCommand {
    /// Establish a time-bound trust grant with a remote system.
    Establish {
        #[arg(long)]
        remote: String,
        #[arg(long, value_enum)]
        level: LevelArg,
        /// Lifetime in milliseconds; capped at 7 days.
        #[arg(long)]
        ttl_ms: i64,
        /// Establish the grant without a revocation path.
        #[arg(long)]
        no_revoke: bool,
        #[arg(long)]
        at: Option<String>,
    },
    /// Extend an active grant.
    Renew {
        #[arg(long)]
        remote: String,
        #[arg(long)]
        extend_ms: i64,
        #[arg(long)]
        at: Option<String>,
    },
    /// Lower the trust level of a grant.
    Downgrade {
        #[arg(long)]
        remote: String,
        #[arg(long, value_enum)]
        level: LevelArg,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Terminally revoke a grant.
    Revoke {
        #[arg(long)]
        remote: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Show a grant and its effective status.
    Show {
        #[arg(long)]
        remote: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Full audit history for a grant.
    History {
        #[arg(long)]
        remote: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum EvidenceCommand {
    /// List evidence records, newest first.
    List {
        #[arg(long, value_enum)]
        operation_type: Option<OperationTypeArg>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Show one evidence record.
    Show {
        #[arg(long)]
        evidence_id: String,
    },
    /// Replay an evidence record.
    Replay {
        #[arg(long)]
        evidence_id: String,
        #[arg(long, value_enum, default_value_t = ReplayModeArg::ReadOnly)]
        mode: ReplayModeArg,
    },
    /// Record a human signoff for a decision.
    Signoff {
        #[arg(long)]
        decision_id: String,
        #[arg(long)]
        signed_by: String,
        #[arg(long)]
        note: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Show the evidence gap counter.
    Gaps,
}

#[derive(Debug, Subcommand)]
pub enum RulesetCommand {
    /// Show the active ruleset.
    Show,
    /// Append a new ruleset version from a JSON file.
    Put {
        #[arg(long)]
        file: String,
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutcomeArg {
    Success,
    Failure,
    PolicyRejection,
    HighRisk,
}

impl From<OutcomeArg> for OutcomeKind {
    fn from(value: OutcomeArg) -> Self {
        match value {
            OutcomeArg::Success => Self::Success,
            OutcomeArg::Failure => Self::Failure,
            OutcomeArg::PolicyRejection => Self::PolicyRejection,
            OutcomeArg::HighRisk => Self::HighRisk,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DecisionStatusArg {
    Approved,
    Rejected,
    Executed,
}

impl From<DecisionStatusArg> for DecisionStatus {
    fn from(value: DecisionStatusArg) -> Self {
        match value {
            DecisionStatusArg::Approved => Self::Approved,
            DecisionStatusArg::Rejected => Self::Rejected,
            DecisionStatusArg::Executed => Self::Executed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    User,
    Session,
    Global,
}

impl From<ScopeArg> for AuthorizationScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::User => Self::User,
            ScopeArg::Session => Self::Session,
            ScopeArg::Global => Self::Global,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExecutionResultArg {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LevelArg {
    Minimal,
    Limited,
    Standard,
}

impl From<LevelArg> for FederationLevel {
    fn from(value: LevelArg) -> Self {
        match value {
            LevelArg::Minimal => Self::Minimal,
            LevelArg::Limited => Self::Limited,
            LevelArg::Standard => Self::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OperationTypeArg {
    OutcomeRecorded,
    TierChanged,
    EvolutionDecided,
    AuthorizationGranted,
    AuthorizationRevoked,
    AuthorizationChecked,
    ExecutionClosed,
    FederationChanged,
}

impl From<OperationTypeArg> for OperationType {
    fn from(value: OperationTypeArg) -> Self {
        match value {
            OperationTypeArg::OutcomeRecorded => Self::OutcomeRecorded,
            OperationTypeArg::TierChanged => Self::TierChanged,
            OperationTypeArg::EvolutionDecided => Self::EvolutionDecided,
            OperationTypeArg::AuthorizationGranted => Self::AuthorizationGranted,
            OperationTypeArg::AuthorizationRevoked => Self::AuthorizationRevoked,
            OperationTypeArg::AuthorizationChecked => Self::AuthorizationChecked,
            OperationTypeArg::ExecutionClosed => Self::ExecutionClosed,
            OperationTypeArg::FederationChanged => Self::FederationChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReplayModeArg {
    ReadOnly,
    Validate,
}

impl From<ReplayModeArg> for ReplayMode {
    fn from(value: ReplayModeArg) -> Self {
        match value {
            ReplayModeArg::ReadOnly => Self::ReadOnly,
            ReplayModeArg::Validate => Self::Validate,
        }
    }
}

/// Runs a parsed command against the configured database and returns
/// the JSON payload that `main` prints.
///
/// # Errors
/// Returns an error for invalid input or storage failures.
pub fn run_cli(cli: Cli) -> Result<Value> {
    let mut store = SqliteGovernanceStore::open(&cli.db)?;
    run_command(&mut store, cli.command)
}

/// Embed API: run one command against an already-open store.
///
/// # Errors
/// Returns an error for invalid input or storage failures.
pub fn run_command(store: &mut SqliteGovernanceStore, command: Command) -> Result<Value> {
    match command {
        Command::Outcome(command) => run_outcome(store, command),
        Command::Risk(command) => run_risk(store, command),
        Command::Evolution(command) => run_evolution(store, command),
        Command::Gate(command) => run_gate(store, command),
        Command::Federation(command) => run_federation(store, command),
        Command::Evidence(command) => run_evidence(store, command),
        Command::Ruleset(command) => run_ruleset(store, command),
    }
}

fn run_outcome(store: &mut SqliteGovernanceStore, command: OutcomeCommand) -> Result<Value> {
    match command {
        OutcomeCommand::Record {
            capability,
            action,
            event_id,
            outcome,
            risk_score,
            policy_id,
            note,
            at,
        } => {
            let key = CapabilityKey::new(&capability, &action)?;
            let context = RiskContext {
                risk_score,
                policy_id,
                note,
            };
            let recorded = store.record_outcome(
                &key,
                &event_id,
                outcome.into(),
                &context,
                resolve_at(at.as_deref())?,
            )?;
            Ok(json!({
                "deduplicated": recorded.deduplicated,
                "state": state_value(&recorded.state)?,
                "transition": recorded
                    .transition
                    .as_ref()
                    .map(transition_value)
                    .transpose()?,
            }))
        }
        OutcomeCommand::State { capability, action } => {
            let key = CapabilityKey::new(&capability, &action)?;
            match store.get_trust_state(&key)? {
                Some(state) => state_value(&state),
                None => Ok(Value::Null),
            }
        }
        OutcomeCommand::Transitions { capability, action } => {
            let key = CapabilityKey::new(&capability, &action)?;
            let transitions = store.list_transitions(&key)?;
            let values: Result<Vec<Value>> =
                transitions.iter().map(transition_value).collect();
            Ok(Value::Array(values?))
        }
    }
}

fn run_risk(store: &mut SqliteGovernanceStore, command: RiskCommand) -> Result<Value> {
    match command {
        RiskCommand::Assess {
            capability,
            action,
            score,
            reason,
            at,
        } => {
            let key = CapabilityKey::new(&capability, &action)?;
            let assessment = store.assess_risk(&key, score, &reason, resolve_at(at.as_deref())?)?;
            Ok(json!({
                "tier": assessment.record.tier.as_str(),
                "risk_score": assessment.record.risk_score,
                "reason": assessment.record.reason,
                "changed": assessment.change.is_some(),
                "old_tier": assessment
                    .change
                    .as_ref()
                    .and_then(|change| change.old_tier.map(|t| t.as_str())),
            }))
        }
        RiskCommand::Tier { capability, action } => {
            let key = CapabilityKey::new(&capability, &action)?;
            match store.get_tier(&key)? {
                Some(record) => Ok(json!({
                    "key": record.key.to_string(),
                    "tier": record.tier.as_str(),
                    "risk_score": record.risk_score,
                    "reason": record.reason,
                    "updated_at": record.updated_at,
                })),
                None => Ok(Value::Null),
            }
        }
        RiskCommand::History { capability, action } => {
            let key = CapabilityKey::new(&capability, &action)?;
            let history = store.list_tier_history(&key)?;
            let values: Vec<Value> = history
                .iter()
                .map(|change| {
                    json!({
                        "old_tier": change.old_tier.map(|t| t.as_str()),
                        "new_tier": change.new_tier.as_str(),
                        "risk_score": change.risk_score,
                        "reason": change.reason,
                        "occurred_at": change.occurred_at,
                    })
                })
                .collect();
            Ok(Value::Array(values))
        }
    }
}

fn run_evolution(store: &mut SqliteGovernanceStore, command: EvolutionCommand) -> Result<Value> {
    match command {
        EvolutionCommand::Evaluate {
            capability,
            action,
            at,
        } => {
            let key = CapabilityKey::new(&capability, &action)?;
            let decision = store.evaluate_evolution(&key, resolve_at(at.as_deref())?)?;
            decision_value(&decision)
        }
        EvolutionCommand::List { capability, action } => {
            let key = CapabilityKey::new(&capability, &action)?;
            let decisions = store.list_decisions(&key)?;
            let values: Result<Vec<Value>> = decisions.iter().map(decision_value).collect();
            Ok(Value::Array(values?))
        }
        EvolutionCommand::Show { decision_id } => {
            let decision = store.get_decision(parse_ulid(&decision_id)?)?;
            decision_value(&decision)
        }
        EvolutionCommand::SetStatus {
            decision_id,
            status,
            actor,
            note,
            at,
        } => {
            let decision = store.set_decision_status(
                parse_ulid(&decision_id)?,
                status.into(),
                &actor,
                note.as_deref(),
                resolve_at(at.as_deref())?,
            )?;
            decision_value(&decision)
        }
    }
}

fn run_gate(store: &mut SqliteGovernanceStore, command: GateCommand) -> Result<Value> {
    match command {
        GateCommand::Grant {
            capability,
            action,
            scope,
            scope_id,
            expires_at,
            max_executions,
            at,
        } => {
            let key = CapabilityKey::new(&capability, &action)?;
            let expires_at = expires_at
                .as_deref()
                .map(parse_rfc3339_ms)
                .transpose()?;
            let authorization = store.grant_authorization(
                &key,
                scope.into(),
                scope_id.as_deref(),
                expires_at,
                max_executions,
                resolve_at(at.as_deref())?,
            )?;
            authorization_value(&authorization)
        }
        GateCommand::Revoke { authorization_id, at } => {
            store.revoke_authorization(parse_ulid(&authorization_id)?, resolve_at(at.as_deref())?)?;
            Ok(json!({ "revoked": true }))
        }
        GateCommand::Check {
            capability,
            action,
            user_id,
            session_id,
            at,
        } => {
            let key = CapabilityKey::new(&capability, &action)?;
            let context = trust_governance_core::InvocationContext {
                user_id,
                session_id,
            };
            let outcome = store.authorize_execution(&key, &context, resolve_at(at.as_deref())?)?;
            gate_value(&outcome)
        }
        GateCommand::Complete {
            execution_id,
            result,
            at,
        } => {
            let record = store.complete_execution(
                parse_ulid(&execution_id)?,
                matches!(result, ExecutionResultArg::Success),
                resolve_at(at.as_deref())?,
            )?;
            execution_value(&record)
        }
        GateCommand::Reap { at } => {
            let reaped = store.reap_stale_executions(resolve_at(at.as_deref())?)?;
            let values: Result<Vec<Value>> = reaped.iter().map(execution_value).collect();
            Ok(json!({ "reaped": values? }))
        }
        GateCommand::Executions { capability, action } => {
            let key = CapabilityKey::new(&capability, &action)?;
            let records = store.list_executions(&key)?;
            let values: Result<Vec<Value>> = records.iter().map(execution_value).collect();
            Ok(Value::Array(values?))
        }
    }
}

fn run_federation(store: &mut SqliteGovernanceStore, command: FederationCommand) -> Result<Value> {
    match command {
        FederationCommand::Establish {
            remote,
            level,
            ttl_ms,
            no_revoke,
            at,
        } => {
            let snapshot = store.establish_federation(
                &remote,
                level.into(),
                ttl_ms,
                !no_revoke,
                resolve_at(at.as_deref())?,
            )?;
            federation_value(&snapshot)
        }
        FederationCommand::Renew {
            remote,
            extend_ms,
            at,
        } => {
            let snapshot =
                store.renew_federation(&remote, extend_ms, resolve_at(at.as_deref())?)?;
            federation_value(&snapshot)
        }
        FederationCommand::Downgrade {
            remote,
            level,
            reason,
            at,
        } => {
            let snapshot = store.downgrade_federation(
                &remote,
                level.into(),
                &reason,
                resolve_at(at.as_deref())?,
            )?;
            federation_value(&snapshot)
        }
        FederationCommand::Revoke { remote, reason, at } => {
            let snapshot =
                store.revoke_federation(&remote, &reason, resolve_at(at.as_deref())?)?;
            federation_value(&snapshot)
        }
        FederationCommand::Show { remote, at } => {
            match store.get_federation(&remote, resolve_at(at.as_deref())?)? {
                Some(snapshot) => federation_value(&snapshot),
                None => Ok(Value::Null),
            }
        }
        FederationCommand::History { remote } => {
            let history = store.list_federation_history(&remote)?;
            let values: Vec<Value> = history
                .iter()
                .map(|record| {
                    json!({
                        "action": record.action.as_str(),
                        "description": record.description,
                        "old_expires_at": record.old_expires_at,
                        "new_expires_at": record.new_expires_at,
                        "old_level": record.old_level.map(|l| l.as_str()),
                        "new_level": record.new_level.map(|l| l.as_str()),
                        "occurred_at": record.occurred_at,
                    })
                })
                .collect();
            Ok(Value::Array(values))
        }
    }
}

fn run_evidence(store: &mut SqliteGovernanceStore, command: EvidenceCommand) -> Result<Value> {
    match command {
        EvidenceCommand::List {
            operation_type,
            limit,
        } => {
            let records = store.list_evidence(operation_type.map(Into::into), limit)?;
            let values: Result<Vec<Value>> = records
                .iter()
                .map(|record| serde_json::to_value(record).context("failed to encode evidence"))
                .collect();
            Ok(Value::Array(values?))
        }
        EvidenceCommand::Show { evidence_id } => {
            match store.get_evidence(parse_ulid(&evidence_id)?)? {
                Some(record) => {
                    serde_json::to_value(&record).context("failed to encode evidence")
                }
                None => Ok(Value::Null),
            }
        }
        EvidenceCommand::Replay { evidence_id, mode } => {
            let report = store.replay(parse_ulid(&evidence_id)?, mode.into())?;
            serde_json::to_value(&report).context("failed to encode replay report")
        }
        EvidenceCommand::Signoff {
            decision_id,
            signed_by,
            note,
            at,
        } => {
            let signoff = store.signoff_decision(
                parse_ulid(&decision_id)?,
                &signed_by,
                &note,
                resolve_at(at.as_deref())?,
            )?;
            serde_json::to_value(&signoff).context("failed to encode signoff")
        }
        EvidenceCommand::Gaps => Ok(json!({ "evidence_gap_count": store.evidence_gap_count()? })),
    }
}

fn run_ruleset(store: &mut SqliteGovernanceStore, command: RulesetCommand) -> Result<Value> {
    match command {
        RulesetCommand::Show => {
            let ruleset = store.current_ruleset()?;
            serde_json::to_value(&ruleset).context("failed to encode ruleset")
        }
        RulesetCommand::Put { file, at } => {
            let payload = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read ruleset file {file}"))?;
            let value: Value =
                serde_json::from_str(&payload).context("ruleset file is not valid JSON")?;
            let ruleset = store.put_ruleset(&value, resolve_at(at.as_deref())?)?;
            serde_json::to_value(&ruleset).context("failed to encode ruleset")
        }
    }
}

fn resolve_at(at: Option<&str>) -> Result<i64> {
    match at {
        Some(raw) => Ok(parse_rfc3339_ms(raw)?),
        None => Ok(now_ms()),
    }
}

fn parse_ulid(raw: &str) -> Result<Ulid> {
    Ulid::from_string(raw).with_context(|| format!("invalid id: {raw}"))
}

fn state_value(state: &TrustState) -> Result<Value> {
    Ok(json!({
        "key": state.key.to_string(),
        "trajectory": state.trajectory.as_str(),
        "consecutive_successes": state.consecutive_successes,
        "consecutive_failures": state.consecutive_failures,
        "policy_rejections": state.policy_rejections,
        "high_risk_events": state.high_risk_events,
        "state_entered_at": format_ms_rfc3339(state.state_entered_at)?,
        "last_event_at": format_ms_rfc3339(state.last_event_at)?,
    }))
}

fn transition_value(transition: &TrustTransition) -> Result<Value> {
    Ok(json!({
        "event_id": transition.event_id,
        "old_state": transition.old_state.as_str(),
        "new_state": transition.new_state.as_str(),
        "trigger_event": transition.trigger_event.as_str(),
        "explain": transition.explain,
        "risk_score": transition.risk_score,
        "policy_id": transition.policy_id,
        "occurred_at": format_ms_rfc3339(transition.occurred_at)?,
    }))
}

fn decision_value(decision: &EvolutionDecision) -> Result<Value> {
    Ok(json!({
        "decision_id": decision.decision_id.to_string(),
        "key": decision.key.to_string(),
        "action": decision.action.as_str(),
        "risk_score": decision.risk_score,
        "trust_tier": decision.trust_tier.as_str(),
        "trust_trajectory": decision.trust_trajectory.as_str(),
        "explanation": decision.explanation,
        "causal_chain": decision.causal_chain,
        "review_level": decision.review_level.as_str(),
        "requires_review": decision.requires_review,
        "status": decision.status.as_str(),
        "created_at": format_ms_rfc3339(decision.created_at)?,
    }))
}

fn authorization_value(authorization: &Authorization) -> Result<Value> {
    Ok(json!({
        "authorization_id": authorization.authorization_id.to_string(),
        "key": authorization.key.to_string(),
        "scope": authorization.scope.as_str(),
        "scope_id": authorization.scope_id,
        "expires_at": authorization
            .expires_at
            .map(format_ms_rfc3339)
            .transpose()?,
        "max_executions": authorization.max_executions,
        "execution_count": authorization.execution_count,
        "status": authorization.status.as_str(),
    }))
}

fn execution_value(record: &ExecutionRecord) -> Result<Value> {
    Ok(json!({
        "execution_id": record.execution_id.to_string(),
        "authorization_id": record.authorization_id.map(|id| id.to_string()),
        "key": record.key.to_string(),
        "status": record.status.as_str(),
        "blocked_reason": record.blocked_reason.map(|reason| reason.as_str()),
        "started_at": format_ms_rfc3339(record.started_at)?,
        "completed_at": record.completed_at.map(format_ms_rfc3339).transpose()?,
    }))
}

fn gate_value(outcome: &GateOutcome) -> Result<Value> {
    Ok(json!({
        "allowed": outcome.allowed,
        "deny_reason": outcome.deny_reason.map(|reason| reason.as_str()),
        "authorization": outcome
            .authorization
            .as_ref()
            .map(authorization_value)
            .transpose()?,
        "execution": execution_value(&outcome.execution)?,
    }))
}

fn federation_value(snapshot: &FederationSnapshot) -> Result<Value> {
    Ok(json!({
        "remote_system_id": snapshot.trust.remote_system_id(),
        "trust_level": snapshot.trust.trust_level().as_str(),
        "status": snapshot.effective_status.as_str(),
        "established_at": format_ms_rfc3339(snapshot.trust.established_at())?,
        "expires_at": format_ms_rfc3339(snapshot.trust.expires_at())?,
        "can_revoke": snapshot.trust.can_revoke(),
        "revoke_reason": snapshot.trust.revoke_reason(),
    }))
}
