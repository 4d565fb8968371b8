#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use trust_governance_core::{
    apply_outcome, build_evidence, check_authorization, classify_tier, decide,
    decision_outcome_value, ensure_non_empty, hash_json, scope_matches, verify_evidence,
    Authorization, AuthorizationScope, AuthorizationStatus, CapabilityKey, DecisionInputs,
    DecisionStatus, DenyReason, EvidenceRecord, EvolutionAction, EvolutionDecision,
    ExecutionRecord, ExecutionStatus, FederatedTrust, FederationAction, FederationHistoryRecord,
    FederationLevel, FederationStatus, GovernanceError, GovernanceRuleset, OperationType,
    OutcomeKind, ReplayMatch, ReplayMode, ReplayReport, ReviewLevel, RiskContext, Signoff,
    Trajectory, TrustState, TrustTier, TrustTierChange, TrustTierRecord, TrustTransition,
};
use ulid::Ulid;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA_GOVERNANCE_V1: &str = r"
CREATE TABLE IF NOT EXISTS governance_rulesets (
    ruleset_version INTEGER PRIMARY KEY,
    payload_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS governance_rulesets_no_update
BEFORE UPDATE ON governance_rulesets
BEGIN
    SELECT RAISE(FAIL, 'governance_rulesets is append-only');
END;

CREATE TRIGGER IF NOT EXISTS governance_rulesets_no_delete
BEFORE DELETE ON governance_rulesets
BEGIN
    SELECT RAISE(FAIL, 'governance_rulesets is append-only');
END;

CREATE TABLE IF NOT EXISTS trust_states (
    capability_id TEXT NOT NULL,
    action_id TEXT NOT NULL,
    trajectory TEXT NOT NULL,
    consecutive_successes INTEGER NOT NULL,
    consecutive_failures INTEGER NOT NULL,
    policy_rejections INTEGER NOT NULL,
    high_risk_events INTEGER NOT NULL,
    state_entered_at INTEGER NOT NULL,
    last_event_at INTEGER NOT NULL,
    PRIMARY KEY (capability_id, action_id)
);

CREATE TRIGGER IF NOT EXISTS trust_states_no_delete
BEFORE DELETE ON trust_states
BEGIN
    SELECT RAISE(FAIL, 'trust_states is never deleted');
END;

CREATE TABLE IF NOT EXISTS outcome_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL UNIQUE,
    capability_id TEXT NOT NULL,
    action_id TEXT NOT NULL,
    outcome TEXT NOT NULL,
    risk_score REAL,
    policy_id TEXT,
    note TEXT,
    occurred_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_outcome_events_key
ON outcome_events (capability_id, action_id, occurred_at);

CREATE TRIGGER IF NOT EXISTS outcome_events_no_update
BEFORE UPDATE ON outcome_events
BEGIN
    SELECT RAISE(FAIL, 'outcome_events is append-only');
END;

CREATE TRIGGER IF NOT EXISTS outcome_events_no_delete
BEFORE DELETE ON outcome_events
BEGIN
    SELECT RAISE(FAIL, 'outcome_events is append-only');
END;

CREATE TABLE IF NOT EXISTS trust_transitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL,
    capability_id TEXT NOT NULL,
    action_id TEXT NOT NULL,
    old_state TEXT NOT NULL,
    new_state TEXT NOT NULL,
    trigger_event TEXT NOT NULL,
    explain TEXT NOT NULL,
    risk_score REAL,
    policy_id TEXT,
    occurred_at INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS trust_transitions_no_update
BEFORE UPDATE ON trust_transitions
BEGIN
    SELECT RAISE(FAIL, 'trust_transitions is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trust_transitions_no_delete
BEFORE DELETE ON trust_transitions
BEGIN
    SELECT RAISE(FAIL, 'trust_transitions is append-only');
END;

CREATE TABLE IF NOT EXISTS trust_tiers (
    capability_id TEXT NOT NULL,
    action_id TEXT NOT NULL,
    tier TEXT NOT NULL,
    risk_score REAL NOT NULL,
    reason TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (capability_id, action_id)
);

CREATE TABLE IF NOT EXISTS trust_tier_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    capability_id TEXT NOT NULL,
    action_id TEXT NOT NULL,
    old_tier TEXT,
    new_tier TEXT NOT NULL,
    risk_score REAL NOT NULL,
    reason TEXT NOT NULL,
    occurred_at INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS trust_tier_history_no_update
BEFORE UPDATE ON trust_tier_history
BEGIN
    SELECT RAISE(FAIL, 'trust_tier_history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trust_tier_history_no_delete
BEFORE DELETE ON trust_tier_history
BEGIN
    SELECT RAISE(FAIL, 'trust_tier_history is append-only');
END;

CREATE TABLE IF NOT EXISTS evolution_decisions (
    decision_id TEXT PRIMARY KEY,
    capability_id TEXT NOT NULL,
    action_id TEXT NOT NULL,
    action TEXT NOT NULL,
    risk_score REAL NOT NULL,
    trust_tier TEXT NOT NULL,
    trust_trajectory TEXT NOT NULL,
    explanation TEXT NOT NULL,
    causal_chain_json TEXT NOT NULL,
    review_level TEXT NOT NULL,
    requires_review INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER
);

CREATE TRIGGER IF NOT EXISTS evolution_decisions_immutable_cols
BEFORE UPDATE ON evolution_decisions
WHEN OLD.decision_id != NEW.decision_id
    OR OLD.capability_id != NEW.capability_id
    OR OLD.action_id != NEW.action_id
    OR OLD.action != NEW.action
    OR OLD.causal_chain_json != NEW.causal_chain_json
    OR OLD.created_at != NEW.created_at
BEGIN
    SELECT RAISE(FAIL, 'only decision status may change');
END;

CREATE TRIGGER IF NOT EXISTS evolution_decisions_no_delete
BEFORE DELETE ON evolution_decisions
BEGIN
    SELECT RAISE(FAIL, 'evolution_decisions is never deleted');
END;

CREATE TABLE IF NOT EXISTS decision_status_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    decision_id TEXT NOT NULL,
    old_status TEXT,
    new_status TEXT NOT NULL,
    actor TEXT,
    note TEXT,
    occurred_at INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS decision_status_history_no_update
BEFORE UPDATE ON decision_status_history
BEGIN
    SELECT RAISE(FAIL, 'decision_status_history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS decision_status_history_no_delete
BEFORE DELETE ON decision_status_history
BEGIN
    SELECT RAISE(FAIL, 'decision_status_history is append-only');
END;

CREATE TABLE IF NOT EXISTS authorizations (
    authorization_id TEXT PRIMARY KEY,
    capability_id TEXT NOT NULL,
    action_id TEXT NOT NULL,
    scope TEXT NOT NULL,
    scope_id TEXT,
    expires_at INTEGER,
    max_executions INTEGER,
    execution_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS authorizations_no_delete
BEFORE DELETE ON authorizations
BEGIN
    SELECT RAISE(FAIL, 'authorizations are revoked, never deleted');
END;

CREATE TABLE IF NOT EXISTS execution_records (
    execution_id TEXT PRIMARY KEY,
    authorization_id TEXT,
    capability_id TEXT NOT NULL,
    action_id TEXT NOT NULL,
    status TEXT NOT NULL,
    blocked_reason TEXT,
    started_at INTEGER NOT NULL,
    completed_at INTEGER
);

CREATE TRIGGER IF NOT EXISTS execution_records_immutable_cols
BEFORE UPDATE ON execution_records
WHEN OLD.execution_id != NEW.execution_id
    OR OLD.capability_id != NEW.capability_id
    OR OLD.action_id != NEW.action_id
    OR OLD.started_at != NEW.started_at
BEGIN
    SELECT RAISE(FAIL, 'only execution status may change');
END;

CREATE TRIGGER IF NOT EXISTS execution_records_no_delete
BEFORE DELETE ON execution_records
BEGIN
    SELECT RAISE(FAIL, 'execution_records is never deleted');
END;

CREATE TABLE IF NOT EXISTS evidence_records (
    evidence_id TEXT PRIMARY KEY,
    operation_type TEXT NOT NULL,
    operation_id TEXT NOT NULL,
    input_snapshot_json TEXT NOT NULL,
    input_hash TEXT NOT NULL,
    output_hash TEXT NOT NULL,
    declared_effects_json TEXT NOT NULL,
    actual_effects_json TEXT NOT NULL,
    recorded_at INTEGER NOT NULL,
    integrity_hash TEXT NOT NULL,
    signature TEXT
);

CREATE INDEX IF NOT EXISTS idx_evidence_records_operation
ON evidence_records (operation_type, operation_id);

CREATE TRIGGER IF NOT EXISTS evidence_records_no_update
BEFORE UPDATE ON evidence_records
BEGIN
    SELECT RAISE(FAIL, 'evidence_records is append-only');
END;

CREATE TRIGGER IF NOT EXISTS evidence_records_no_delete
BEFORE DELETE ON evidence_records
BEGIN
    SELECT RAISE(FAIL, 'evidence_records is append-only');
END;

CREATE TABLE IF NOT EXISTS evidence_signoffs (
    decision_id TEXT PRIMARY KEY,
    signed_by TEXT NOT NULL,
    note TEXT NOT NULL,
    signed_at INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS evidence_signoffs_no_update
BEFORE UPDATE ON evidence_signoffs
BEGIN
    SELECT RAISE(FAIL, 'evidence_signoffs is append-only');
END;

CREATE TRIGGER IF NOT EXISTS evidence_signoffs_no_delete
BEFORE DELETE ON evidence_signoffs
BEGIN
    SELECT RAISE(FAIL, 'evidence_signoffs is append-only');
END;

CREATE TABLE IF NOT EXISTS federated_trusts (
    remote_system_id TEXT PRIMARY KEY,
    established_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    trust_level TEXT NOT NULL,
    status TEXT NOT NULL,
    can_revoke INTEGER NOT NULL,
    revoke_reason TEXT
);

CREATE TRIGGER IF NOT EXISTS federated_trusts_immutable_cols
BEFORE UPDATE ON federated_trusts
WHEN OLD.remote_system_id != NEW.remote_system_id
    OR OLD.established_at != NEW.established_at
BEGIN
    SELECT RAISE(FAIL, 'remote_system_id and established_at are immutable');
END;

CREATE TABLE IF NOT EXISTS federated_trust_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    remote_system_id TEXT NOT NULL,
    action TEXT NOT NULL,
    description TEXT NOT NULL,
    old_expires_at INTEGER,
    new_expires_at INTEGER,
    old_level TEXT,
    new_level TEXT,
    occurred_at INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS federated_trust_history_no_update
BEFORE UPDATE ON federated_trust_history
BEGIN
    SELECT RAISE(FAIL, 'federated_trust_history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS federated_trust_history_no_delete
BEFORE DELETE ON federated_trust_history
BEGIN
    SELECT RAISE(FAIL, 'federated_trust_history is append-only');
END;

CREATE TABLE IF NOT EXISTS governance_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Result of recording one outcome event.
#[derive(Debug, Clone)]
pub struct OutcomeRecorded {
    pub state: TrustState,
    pub transition: Option<TrustTransition>,
    /// True when the event_id was already recorded and nothing changed.
    pub deduplicated: bool,
}

#[derive(Debug, Clone)]
pub struct TierAssessment {
    pub record: TrustTierRecord,
    pub change: Option<TrustTierChange>,
}

#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub allowed: bool,
    pub deny_reason: Option<DenyReason>,
    pub authorization: Option<Authorization>,
    pub execution: ExecutionRecord,
}

#[derive(Debug, Clone)]
pub struct FederationSnapshot {
    pub trust: FederatedTrust,
    pub effective_status: FederationStatus,
}

pub struct SqliteGovernanceStore {
    conn: Connection,
}

impl SqliteGovernanceStore {
    /// Opens (and migrates) a governance store at the given path.
    /// `:memory:` yields an ephemeral store.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or migrated.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open governance db at {db_path}"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        conn.pragma_update(None, "busy_timeout", 5_000)
            .context("failed to set busy timeout")?;

        let mut store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction().context("failed to begin migration")?;
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );",
        )
        .context("failed to create schema_migrations")?;

        let applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![SCHEMA_VERSION],
                |row| row.get(0),
            )
            .optional()
            .context("failed to read schema_migrations")?;

        if applied.is_none() {
            tx.execute_batch(SCHEMA_GOVERNANCE_V1)
                .context("failed to apply governance schema v1")?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                params![SCHEMA_VERSION, trust_governance_core::now_ms()],
            )
            .context("failed to record migration")?;
        }

        let rulesets: i64 = tx
            .query_row("SELECT COUNT(*) FROM governance_rulesets", [], |row| {
                row.get(0)
            })
            .context("failed to count rulesets")?;
        if rulesets == 0 {
            let v1 = GovernanceRuleset::v1();
            tx.execute(
                "INSERT INTO governance_rulesets (ruleset_version, payload_json, created_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    i64::from(v1.ruleset_version),
                    serde_json::to_string(&v1).context("failed to serialize ruleset v1")?,
                    trust_governance_core::now_ms(),
                ],
            )
            .context("failed to seed ruleset v1")?;
        }

        tx.execute(
            "INSERT OR IGNORE INTO governance_meta (key, value)
             VALUES ('evidence_gap_count', '0')",
            [],
        )
        .context("failed to seed evidence gap counter")?;

        tx.commit().context("failed to commit migration")
    }

    /// Latest active ruleset.
    ///
    /// # Errors
    /// Returns an error when no ruleset is stored or decoding fails.
    pub fn current_ruleset(&self) -> Result<GovernanceRuleset> {
        load_ruleset(&self.conn)
    }

    /// Appends a new ruleset version. Prior versions are retained so
    /// historical decisions stay interpretable.
    ///
    /// # Errors
    /// Returns an error when validation fails or the version is not
    /// strictly newer than the latest stored one.
    pub fn put_ruleset(&mut self, payload: &Value, now: i64) -> Result<GovernanceRuleset> {
        let ruleset = GovernanceRuleset::from_json(payload)?;
        let current = load_ruleset(&self.conn)?;
        if ruleset.ruleset_version <= current.ruleset_version {
            bail!(GovernanceError::Configuration(format!(
                "ruleset_version MUST be > {}",
                current.ruleset_version
            )));
        }
        self.conn
            .execute(
                "INSERT INTO governance_rulesets (ruleset_version, payload_json, created_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    i64::from(ruleset.ruleset_version),
                    serde_json::to_string(&ruleset).context("failed to serialize ruleset")?,
                    now,
                ],
            )
            .context("failed to append ruleset")?;
        Ok(ruleset)
    }

    /// Records one outcome event, projecting it into the trust state.
    /// A repeated `event_id` is a deduplicated no-op.
    ///
    /// # Errors
    /// Returns an error on invalid input or storage failure.
    pub fn record_outcome(
        &mut self,
        key: &CapabilityKey,
        event_id: &str,
        outcome: OutcomeKind,
        context: &RiskContext,
        occurred_at: i64,
    ) -> Result<OutcomeRecorded> {
        let tx = self.conn.transaction().context("failed to begin txn")?;
        let recorded = record_outcome_tx(&tx, key, event_id, outcome, context, occurred_at)?;
        tx.commit().context("failed to commit outcome")?;
        Ok(recorded)
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub fn get_trust_state(&self, key: &CapabilityKey) -> Result<Option<TrustState>> {
        load_state(&self.conn, key)
    }

    /// All trajectory transitions for a key, oldest first.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn list_transitions(&self, key: &CapabilityKey) -> Result<Vec<TrustTransition>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT event_id, capability_id, action_id, old_state, new_state,
                        trigger_event, explain, risk_score, policy_id, occurred_at
                 FROM trust_transitions
                 WHERE capability_id = ?1 AND action_id = ?2
                 ORDER BY id ASC",
            )
            .context("failed to prepare transitions query")?;
        let rows = stmt
            .query_map(params![key.capability_id, key.action_id], parse_transition_row)
            .context("failed to query transitions")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read transition rows")
    }

    /// Classifies a fresh risk score into a tier, updating the cached
    /// tier and appending a history row when the tier changed.
    ///
    /// # Errors
    /// Returns an error when the score is out of bounds or storage fails.
    pub fn assess_risk(
        &mut self,
        key: &CapabilityKey,
        risk_score: f64,
        reason: &str,
        now: i64,
    ) -> Result<TierAssessment> {
        ensure_non_empty("reason", reason)?;
        let tx = self.conn.transaction().context("failed to begin txn")?;

        let ruleset = load_ruleset(&tx)?;
        let tier = classify_tier(risk_score, &ruleset)?;
        let old_tier = load_tier(&tx, key)?.map(|record| record.tier);

        tx.execute(
            "INSERT INTO trust_tiers (capability_id, action_id, tier, risk_score, reason, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (capability_id, action_id) DO UPDATE SET
                tier = excluded.tier,
                risk_score = excluded.risk_score,
                reason = excluded.reason,
                updated_at = excluded.updated_at",
            params![
                key.capability_id,
                key.action_id,
                tier.as_str(),
                risk_score,
                reason,
                now
            ],
        )
        .context("failed to upsert trust tier")?;

        let change = if old_tier == Some(tier) {
            None
        } else {
            tx.execute(
                "INSERT INTO trust_tier_history
                    (capability_id, action_id, old_tier, new_tier, risk_score, reason, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    key.capability_id,
                    key.action_id,
                    old_tier.map(TrustTier::as_str),
                    tier.as_str(),
                    risk_score,
                    reason,
                    now
                ],
            )
            .context("failed to append tier history")?;

            let change = TrustTierChange {
                key: key.clone(),
                old_tier,
                new_tier: tier,
                risk_score,
                reason: reason.to_string(),
                occurred_at: now,
            };
            emit_evidence(
                &tx,
                build_evidence(
                    OperationType::TierChanged,
                    &key.to_string(),
                    json!({
                        "key": key,
                        "risk_score": risk_score,
                        "reason": reason,
                        "ruleset_version": ruleset.ruleset_version,
                    }),
                    &json!({
                        "old_tier": old_tier.map(TrustTier::as_str),
                        "new_tier": tier.as_str(),
                    }),
                    vec!["tier_updated".to_string(), "tier_history_appended".to_string()],
                    vec!["tier_updated".to_string(), "tier_history_appended".to_string()],
                    None,
                    now,
                ),
            )?;
            Some(change)
        };

        tx.commit().context("failed to commit risk assessment")?;
        Ok(TierAssessment {
            record: TrustTierRecord {
                key: key.clone(),
                tier,
                risk_score,
                reason: reason.to_string(),
                updated_at: now,
            },
            change,
        })
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub fn get_tier(&self, key: &CapabilityKey) -> Result<Option<TrustTierRecord>> {
        load_tier(&self.conn, key)
    }

    /// Tier changes for a key, oldest first.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn list_tier_history(&self, key: &CapabilityKey) -> Result<Vec<TrustTierChange>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT capability_id, action_id, old_tier, new_tier, risk_score, reason,
                        occurred_at
                 FROM trust_tier_history
                 WHERE capability_id = ?1 AND action_id = ?2
                 ORDER BY id ASC",
            )
            .context("failed to prepare tier history query")?;
        let rows = stmt
            .query_map(params![key.capability_id, key.action_id], |row| {
                let old_tier: Option<String> = row.get(2)?;
                let new_tier: String = row.get(3)?;
                let old_tier = match old_tier {
                    Some(raw) => Some(parse_enum_column(2, &raw, TrustTier::parse)?),
                    None => None,
                };
                Ok(TrustTierChange {
                    key: parse_key_columns(row, 0)?,
                    old_tier,
                    new_tier: parse_enum_column(3, &new_tier, TrustTier::parse)?,
                    risk_score: row.get(4)?,
                    reason: row.get(5)?,
                    occurred_at: row.get(6)?,
                })
            })
            .context("failed to query tier history")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read tier history rows")
    }

    /// Runs the evolution rules against the current state and records
    /// the resulting decision.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] when the key has no trust
    /// state or no risk assessment yet.
    pub fn evaluate_evolution(&mut self, key: &CapabilityKey, now: i64) -> Result<EvolutionDecision> {
        let tx = self.conn.transaction().context("failed to begin txn")?;

        let state = load_state(&tx, key)?.ok_or_else(|| {
            GovernanceError::Validation(format!("no trust state recorded for {key}"))
        })?;
        let tier = load_tier(&tx, key)?.ok_or_else(|| {
            GovernanceError::Validation(format!("no risk assessment recorded for {key}"))
        })?;
        let ruleset = load_ruleset(&tx)?;

        let prior_tier: Option<TrustTier> = {
            let raw: Option<String> = tx
                .query_row(
                    "SELECT trust_tier FROM evolution_decisions
                     WHERE capability_id = ?1 AND action_id = ?2
                     ORDER BY created_at DESC, decision_id DESC LIMIT 1",
                    params![key.capability_id, key.action_id],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to read prior decision tier")?;
            match raw {
                Some(text) => Some(TrustTier::parse(&text).ok_or_else(|| {
                    GovernanceError::Validation(format!("invalid stored tier: {text}"))
                })?),
                None => None,
            }
        };

        let outstanding_restriction: bool = tx
            .query_row(
                "SELECT EXISTS (
                    SELECT 1 FROM evolution_decisions
                    WHERE capability_id = ?1 AND action_id = ?2
                      AND action IN ('freeze', 'revoke')
                      AND status != 'rejected'
                 )",
                params![key.capability_id, key.action_id],
                |row| row.get(0),
            )
            .context("failed to check outstanding restrictions")?;

        let inputs = DecisionInputs {
            key: key.clone(),
            tier: tier.tier,
            trajectory: state.trajectory,
            risk_score: tier.risk_score,
            consecutive_failures: state.consecutive_failures,
            policy_rejections: state.policy_rejections,
            prior_tier,
            outstanding_restriction,
        };
        let decision = decide(&inputs, &ruleset, now);

        tx.execute(
            "INSERT INTO evolution_decisions
                (decision_id, capability_id, action_id, action, risk_score, trust_tier,
                 trust_trajectory, explanation, causal_chain_json, review_level,
                 requires_review, status, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                decision.decision_id.to_string(),
                key.capability_id,
                key.action_id,
                decision.action.as_str(),
                decision.risk_score,
                decision.trust_tier.as_str(),
                decision.trust_trajectory.as_str(),
                decision.explanation,
                serde_json::to_string(&decision.causal_chain)
                    .context("failed to serialize causal chain")?,
                decision.review_level.as_str(),
                i64::from(decision.requires_review),
                decision.status.as_str(),
                decision.created_at,
                decision.expires_at,
            ],
        )
        .context("failed to insert evolution decision")?;

        append_status_history(
            &tx,
            decision.decision_id,
            None,
            decision.status,
            None,
            Some("decided by evolution rules"),
            now,
        )?;

        emit_evidence(
            &tx,
            build_evidence(
                OperationType::EvolutionDecided,
                &decision.decision_id.to_string(),
                json!({ "inputs": inputs, "ruleset": ruleset }),
                &decision_outcome_value(&decision),
                vec![
                    "decision_appended".to_string(),
                    "status_history_appended".to_string(),
                ],
                vec![
                    "decision_appended".to_string(),
                    "status_history_appended".to_string(),
                ],
                None,
                now,
            ),
        )?;

        tx.commit().context("failed to commit decision")?;
        Ok(decision)
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub fn list_decisions(&self, key: &CapabilityKey) -> Result<Vec<EvolutionDecision>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT decision_id, capability_id, action_id, action, risk_score, trust_tier,
                        trust_trajectory, explanation, causal_chain_json, review_level,
                        requires_review, status, created_at, expires_at
                 FROM evolution_decisions
                 WHERE capability_id = ?1 AND action_id = ?2
                 ORDER BY created_at ASC, decision_id ASC",
            )
            .context("failed to prepare decisions query")?;
        let rows = stmt
            .query_map(params![key.capability_id, key.action_id], parse_decision_row)
            .context("failed to query decisions")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read decision rows")
    }

    /// # Errors
    /// Returns an error when the decision does not exist.
    pub fn get_decision(&self, decision_id: Ulid) -> Result<EvolutionDecision> {
        load_decision(&self.conn, decision_id)?.ok_or_else(|| {
            GovernanceError::Validation(format!("unknown decision: {decision_id}")).into()
        })
    }

    /// Moves a decision through its review lifecycle. Approving a
    /// PROMOTE also marks it executed: the promotion applies the moment
    /// a reviewer signs it off.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] on an illegal transition
    /// and [`GovernanceError::Conflict`] when the stored status moved
    /// under the caller.
    pub fn set_decision_status(
        &mut self,
        decision_id: Ulid,
        new_status: DecisionStatus,
        actor: &str,
        note: Option<&str>,
        now: i64,
    ) -> Result<EvolutionDecision> {
        ensure_non_empty("actor", actor)?;
        let tx = self.conn.transaction().context("failed to begin txn")?;

        let decision = load_decision(&tx, decision_id)?.ok_or_else(|| {
            GovernanceError::Validation(format!("unknown decision: {decision_id}"))
        })?;

        if !decision.status.can_transition(new_status) {
            bail!(GovernanceError::Validation(format!(
                "illegal decision transition {} -> {}",
                decision.status.as_str(),
                new_status.as_str()
            )));
        }

        update_decision_status(&tx, decision_id, decision.status, new_status)?;
        append_status_history(
            &tx,
            decision_id,
            Some(decision.status),
            new_status,
            Some(actor),
            note,
            now,
        )?;

        let mut final_status = new_status;
        if new_status == DecisionStatus::Approved && decision.action == EvolutionAction::Promote {
            update_decision_status(&tx, decision_id, DecisionStatus::Approved, DecisionStatus::Executed)?;
            append_status_history(
                &tx,
                decision_id,
                Some(DecisionStatus::Approved),
                DecisionStatus::Executed,
                Some(actor),
                Some("promotion applied on approval"),
                now,
            )?;
            final_status = DecisionStatus::Executed;
        }

        tx.commit().context("failed to commit status change")?;
        let mut updated = decision;
        updated.status = final_status;
        Ok(updated)
    }

    /// Grants an execution authorization for a key.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Validation`] when a user/session scope
    /// is missing its id or the expiry is in the past.
    pub fn grant_authorization(
        &mut self,
        key: &CapabilityKey,
        scope: AuthorizationScope,
        scope_id: Option<&str>,
        expires_at: Option<i64>,
        max_executions: Option<u32>,
        now: i64,
    ) -> Result<Authorization> {
        match scope {
            AuthorizationScope::Global => {}
            AuthorizationScope::User | AuthorizationScope::Session => {
                let id = scope_id.unwrap_or("");
                ensure_non_empty("scope_id", id)?;
            }
        }
        if let Some(expiry) = expires_at {
            if expiry <= now {
                bail!(GovernanceError::Validation(
                    "expires_at MUST be in the future".to_string()
                ));
            }
        }
        if max_executions == Some(0) {
            bail!(GovernanceError::Validation(
                "max_executions MUST be >= 1 when set".to_string()
            ));
        }

        let authorization = Authorization {
            authorization_id: Ulid::new(),
            key: key.clone(),
            scope,
            scope_id: scope_id.map(str::to_string),
            expires_at,
            max_executions,
            execution_count: 0,
            status: AuthorizationStatus::Active,
            created_at: now,
        };
        let tx = self.conn.transaction().context("failed to begin txn")?;
        tx.execute(
            "INSERT INTO authorizations
                (authorization_id, capability_id, action_id, scope, scope_id,
                 expires_at, max_executions, execution_count, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9)",
            params![
                authorization.authorization_id.to_string(),
                key.capability_id,
                key.action_id,
                scope.as_str(),
                authorization.scope_id,
                expires_at,
                max_executions.map(i64::from),
                AuthorizationStatus::Active.as_str(),
                now,
            ],
        )
        .context("failed to insert authorization")?;
        emit_evidence(
            &tx,
            build_evidence(
                OperationType::AuthorizationGranted,
                &authorization.authorization_id.to_string(),
                json!({
                    "key": key,
                    "scope": scope.as_str(),
                    "scope_id": authorization.scope_id,
                    "expires_at": expires_at,
                    "max_executions": max_executions,
                }),
                &json!({ "status": AuthorizationStatus::Active.as_str() }),
                vec!["authorization_inserted".to_string()],
                vec!["authorization_inserted".to_string()],
                None,
                now,
            ),
        )?;
        tx.commit().context("failed to commit authorization grant")?;
        Ok(authorization)
    }

    /// # Errors
    /// Returns [`GovernanceError::Conflict`] when the authorization is
    /// not currently active.
    pub fn revoke_authorization(&mut self, authorization_id: Ulid, now: i64) -> Result<()> {
        let tx = self.conn.transaction().context("failed to begin txn")?;
        let updated = tx
            .execute(
                "UPDATE authorizations SET status = 'revoked'
                 WHERE authorization_id = ?1 AND status = 'active'",
                params![authorization_id.to_string()],
            )
            .context("failed to revoke authorization")?;
        if updated == 0 {
            bail!(GovernanceError::Conflict(format!(
                "authorization {authorization_id} is not active"
            )));
        }
        emit_evidence(
            &tx,
            build_evidence(
                OperationType::AuthorizationRevoked,
                &authorization_id.to_string(),
                json!({ "authorization_id": authorization_id.to_string() }),
                &json!({ "status": AuthorizationStatus::Revoked.as_str() }),
                vec!["authorization_revoked".to_string()],
                vec!["authorization_revoked".to_string()],
                None,
                now,
            ),
        )?;
        tx.commit().context("failed to commit authorization revoke")?;
        Ok(())
    }

    /// The execution gate. Checks, in order: an active scope-matching
    /// authorization exists, it is unexpired, budget remains, and no
    /// REVOKE/FREEZE decision stands against the key. Allowed attempts
    /// atomically consume budget; denied attempts leave a blocked
    /// execution record and feed the trajectory engine.
    ///
    /// # Errors
    /// Returns an error on storage failure. A denial is a normal
    /// [`GateOutcome`], not an error.
    pub fn authorize_execution(
        &mut self,
        key: &CapabilityKey,
        context: &trust_governance_core::InvocationContext,
        now: i64,
    ) -> Result<GateOutcome> {
        let tx = self.conn.transaction().context("failed to begin txn")?;

        let candidates = load_active_authorizations(&tx, key)?;
        let scoped: Vec<&Authorization> = candidates
            .iter()
            .filter(|auth| scope_matches(auth, context))
            .collect();

        let mut deny: Option<DenyReason> = None;
        let mut granted: Option<Authorization> = None;

        if scoped.is_empty() {
            deny = Some(DenyReason::NoActiveAuthorization);
        } else {
            for candidate in &scoped {
                match check_authorization(candidate, now) {
                    Ok(()) => {
                        granted = Some((*candidate).clone());
                        break;
                    }
                    Err(reason) => {
                        if deny.is_none() {
                            deny = Some(reason);
                        }
                    }
                }
            }
        }

        if granted.is_some() {
            if let Some(reason) = standing_restriction(&tx, key)? {
                deny = Some(reason);
                granted = None;
            }
        }

        let outcome = if let Some(mut authorization) = granted {
            let consumed = tx
                .execute(
                    "UPDATE authorizations
                     SET execution_count = execution_count + 1
                     WHERE authorization_id = ?1 AND status = 'active'
                       AND (max_executions IS NULL OR execution_count < max_executions)",
                    params![authorization.authorization_id.to_string()],
                )
                .context("failed to consume execution budget")?;
            if consumed == 0 {
                // Budget raced away between the read and the guarded write.
                deny_execution(&tx, key, None, DenyReason::ExecutionBudgetExhausted, context, now)?
            } else {
                authorization.execution_count += 1;
                let execution = ExecutionRecord {
                    execution_id: Ulid::new(),
                    authorization_id: Some(authorization.authorization_id),
                    key: key.clone(),
                    status: ExecutionStatus::Running,
                    blocked_reason: None,
                    started_at: now,
                    completed_at: None,
                };
                insert_execution(&tx, &execution)?;
                emit_gate_evidence(&tx, key, context, None, now)?;
                GateOutcome {
                    allowed: true,
                    deny_reason: None,
                    authorization: Some(authorization),
                    execution,
                }
            }
        } else {
            let reason = deny.unwrap_or(DenyReason::NoActiveAuthorization);
            deny_execution(&tx, key, None, reason, context, now)?
        };

        tx.commit().context("failed to commit gate outcome")?;
        Ok(outcome)
    }

    /// Closes a running execution and feeds its outcome back into the
    /// trajectory engine.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Conflict`] when the execution is not
    /// currently running.
    pub fn complete_execution(
        &mut self,
        execution_id: Ulid,
        success: bool,
        now: i64,
    ) -> Result<ExecutionRecord> {
        let tx = self.conn.transaction().context("failed to begin txn")?;
        let record = close_execution(&tx, execution_id, success, now)?;
        tx.commit().context("failed to commit execution close")?;
        Ok(record)
    }

    /// Fails every execution left running past the configured timeout.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn reap_stale_executions(&mut self, now: i64) -> Result<Vec<ExecutionRecord>> {
        let tx = self.conn.transaction().context("failed to begin txn")?;
        let ruleset = load_ruleset(&tx)?;

        let stale_ids: Vec<Ulid> = {
            let mut stmt = tx
                .prepare(
                    "SELECT execution_id FROM execution_records
                     WHERE status = 'running' AND started_at + ?1 <= ?2
                     ORDER BY started_at ASC",
                )
                .context("failed to prepare stale query")?;
            let rows = stmt
                .query_map(params![ruleset.running_timeout_ms, now], |row| {
                    let raw: String = row.get(0)?;
                    parse_ulid_column(0, &raw)
                })
                .context("failed to query stale executions")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to read stale execution ids")?
        };

        let mut reaped = Vec::with_capacity(stale_ids.len());
        for execution_id in stale_ids {
            reaped.push(close_execution(&tx, execution_id, false, now)?);
        }

        tx.commit().context("failed to commit reap")?;
        Ok(reaped)
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub fn list_executions(&self, key: &CapabilityKey) -> Result<Vec<ExecutionRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT execution_id, authorization_id, capability_id, action_id, status,
                        blocked_reason, started_at, completed_at
                 FROM execution_records
                 WHERE capability_id = ?1 AND action_id = ?2
                 ORDER BY started_at ASC, execution_id ASC",
            )
            .context("failed to prepare executions query")?;
        let rows = stmt
            .query_map(params![key.capability_id, key.action_id], parse_execution_row)
            .context("failed to query executions")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read execution rows")
    }

    /// Establishes (or re-establishes) federated trust with a remote
    /// system. Re-establishment is only possible once the prior grant is
    /// expired or revoked.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Conflict`] when a usable grant already
    /// exists, or a validation error from the TTL rules.
    pub fn establish_federation(
        &mut self,
        remote_system_id: &str,
        trust_level: FederationLevel,
        ttl_ms: i64,
        can_revoke: bool,
        now: i64,
    ) -> Result<FederationSnapshot> {
        let tx = self.conn.transaction().context("failed to begin txn")?;

        if let Some(existing) = load_federation(&tx, remote_system_id)? {
            match existing.effective_status(now) {
                FederationStatus::Active | FederationStatus::Degraded => {
                    bail!(GovernanceError::Conflict(format!(
                        "trust with {remote_system_id} is still usable; revoke it first"
                    )));
                }
                FederationStatus::Expired | FederationStatus::Revoked => {
                    // established_at is immutable, so replacement means a
                    // fresh row; the history table keeps the old grant's
                    // full audit trail.
                    tx.execute(
                        "DELETE FROM federated_trusts WHERE remote_system_id = ?1",
                        params![remote_system_id],
                    )
                    .context("failed to clear terminal trust row")?;
                }
            }
        }

        let (trust, history) =
            FederatedTrust::establish(remote_system_id, trust_level, ttl_ms, can_revoke, now)?;
        tx.execute(
            "INSERT INTO federated_trusts
                (remote_system_id, established_at, expires_at, trust_level, status,
                 can_revoke, revoke_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
            params![
                trust.remote_system_id(),
                trust.established_at(),
                trust.expires_at(),
                trust.trust_level().as_str(),
                trust.stored_status().as_str(),
                i64::from(trust.can_revoke()),
            ],
        )
        .context("failed to insert federated trust")?;
        append_federation_history(&tx, &history)?;
        emit_federation_evidence(&tx, &history, now)?;

        tx.commit().context("failed to commit federation establish")?;
        Ok(FederationSnapshot {
            effective_status: trust.effective_status(now),
            trust,
        })
    }

    /// # Errors
    /// Returns a validation error when the grant is missing, expired,
    /// revoked, or the extension breaks the TTL ceiling.
    pub fn renew_federation(
        &mut self,
        remote_system_id: &str,
        extend_ms: i64,
        now: i64,
    ) -> Result<FederationSnapshot> {
        let tx = self.conn.transaction().context("failed to begin txn")?;
        let mut trust = require_federation(&tx, remote_system_id)?;
        let history = trust.renew(extend_ms, now)?;
        tx.execute(
            "UPDATE federated_trusts SET expires_at = ?2 WHERE remote_system_id = ?1",
            params![remote_system_id, trust.expires_at()],
        )
        .context("failed to persist renewal")?;
        append_federation_history(&tx, &history)?;
        emit_federation_evidence(&tx, &history, now)?;
        tx.commit().context("failed to commit renewal")?;
        Ok(FederationSnapshot {
            effective_status: trust.effective_status(now),
            trust,
        })
    }

    /// # Errors
    /// Returns a validation error when the grant is unusable or the
    /// target level is not strictly lower.
    pub fn downgrade_federation(
        &mut self,
        remote_system_id: &str,
        to_level: FederationLevel,
        reason: &str,
        now: i64,
    ) -> Result<FederationSnapshot> {
        let tx = self.conn.transaction().context("failed to begin txn")?;
        let mut trust = require_federation(&tx, remote_system_id)?;
        let history = trust.downgrade(to_level, reason, now)?;
        tx.execute(
            "UPDATE federated_trusts SET trust_level = ?2, status = ?3
             WHERE remote_system_id = ?1",
            params![
                remote_system_id,
                trust.trust_level().as_str(),
                trust.stored_status().as_str()
            ],
        )
        .context("failed to persist downgrade")?;
        append_federation_history(&tx, &history)?;
        emit_federation_evidence(&tx, &history, now)?;
        tx.commit().context("failed to commit downgrade")?;
        Ok(FederationSnapshot {
            effective_status: trust.effective_status(now),
            trust,
        })
    }

    /// Terminal revocation of a grant.
    ///
    /// # Errors
    /// Returns a validation error when the grant is missing, already
    /// revoked, or was established with revocation disabled.
    pub fn revoke_federation(
        &mut self,
        remote_system_id: &str,
        reason: &str,
        now: i64,
    ) -> Result<FederationSnapshot> {
        let tx = self.conn.transaction().context("failed to begin txn")?;
        let mut trust = require_federation(&tx, remote_system_id)?;
        let history = trust.revoke(reason, now)?;
        tx.execute(
            "UPDATE federated_trusts SET status = 'revoked', revoke_reason = ?2
             WHERE remote_system_id = ?1",
            params![remote_system_id, reason],
        )
        .context("failed to persist revocation")?;
        append_federation_history(&tx, &history)?;
        emit_federation_evidence(&tx, &history, now)?;
        tx.commit().context("failed to commit revocation")?;
        Ok(FederationSnapshot {
            effective_status: trust.effective_status(now),
            trust,
        })
    }

    /// Reads a grant, classifying expiry lazily. The first read past
    /// the expiry persists the `expired` status and its history row.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn get_federation(
        &mut self,
        remote_system_id: &str,
        now: i64,
    ) -> Result<Option<FederationSnapshot>> {
        let tx = self.conn.transaction().context("failed to begin txn")?;
        let Some(trust) = load_federation(&tx, remote_system_id)? else {
            return Ok(None);
        };

        let effective = trust.effective_status(now);
        if effective == FederationStatus::Expired
            && trust.stored_status() != FederationStatus::Expired
        {
            tx.execute(
                "UPDATE federated_trusts SET status = 'expired' WHERE remote_system_id = ?1",
                params![remote_system_id],
            )
            .context("failed to persist expiry")?;
            let history = FederationHistoryRecord {
                remote_system_id: remote_system_id.to_string(),
                action: FederationAction::Expire,
                description: format!("expired at {} (observed at {now})", trust.expires_at()),
                old_expires_at: Some(trust.expires_at()),
                new_expires_at: Some(trust.expires_at()),
                old_level: None,
                new_level: None,
                occurred_at: now,
            };
            append_federation_history(&tx, &history)?;
            emit_federation_evidence(&tx, &history, now)?;
        }

        tx.commit().context("failed to commit federation read")?;
        Ok(Some(FederationSnapshot {
            trust,
            effective_status: effective,
        }))
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub fn list_federation_history(
        &self,
        remote_system_id: &str,
    ) -> Result<Vec<FederationHistoryRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT remote_system_id, action, description, old_expires_at, new_expires_at,
                        old_level, new_level, occurred_at
                 FROM federated_trust_history
                 WHERE remote_system_id = ?1
                 ORDER BY id ASC",
            )
            .context("failed to prepare federation history query")?;
        let rows = stmt
            .query_map(params![remote_system_id], parse_federation_history_row)
            .context("failed to query federation history")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read federation history rows")
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub fn get_evidence(&self, evidence_id: Ulid) -> Result<Option<EvidenceRecord>> {
        self.conn
            .query_row(
                "SELECT evidence_id, operation_type, operation_id, input_snapshot_json,
                        input_hash, output_hash, declared_effects_json, actual_effects_json,
                        recorded_at, integrity_hash, signature
                 FROM evidence_records WHERE evidence_id = ?1",
                params![evidence_id.to_string()],
                parse_evidence_row,
            )
            .optional()
            .context("failed to read evidence record")
    }

    /// Newest-first evidence listing, optionally filtered by operation
    /// type.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn list_evidence(
        &self,
        operation_type: Option<OperationType>,
        limit: u32,
    ) -> Result<Vec<EvidenceRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT evidence_id, operation_type, operation_id, input_snapshot_json,
                        input_hash, output_hash, declared_effects_json, actual_effects_json,
                        recorded_at, integrity_hash, signature
                 FROM evidence_records
                 WHERE (?1 IS NULL OR operation_type = ?1)
                 ORDER BY recorded_at DESC, evidence_id DESC
                 LIMIT ?2",
            )
            .context("failed to prepare evidence query")?;
        let rows = stmt
            .query_map(
                params![operation_type.map(OperationType::as_str), i64::from(limit)],
                parse_evidence_row,
            )
            .context("failed to query evidence")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read evidence rows")
    }

    /// Count of governance operations whose evidence could not be
    /// written. Non-zero means the audit trail has holes.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn evidence_gap_count(&self) -> Result<i64> {
        let raw: String = self
            .conn
            .query_row(
                "SELECT value FROM governance_meta WHERE key = 'evidence_gap_count'",
                [],
                |row| row.get(0),
            )
            .context("failed to read evidence gap counter")?;
        raw.parse::<i64>()
            .context("evidence gap counter is not an integer")
    }

    /// Replays an evidence record. `validate` mode re-runs the decision
    /// rules against the recorded inputs and compares output hashes;
    /// `read_only` mode only verifies integrity.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Replay`] when the record is missing
    /// and [`GovernanceError::Immutability`] when it fails integrity
    /// verification.
    pub fn replay(&self, evidence_id: Ulid, mode: ReplayMode) -> Result<ReplayReport> {
        let record = self.get_evidence(evidence_id)?.ok_or_else(|| {
            GovernanceError::Replay(format!("unknown evidence record: {evidence_id}"))
        })?;
        verify_evidence(&record)?;

        let mut report = ReplayReport {
            evidence_id,
            mode,
            matches: ReplayMatch::NotCompared,
            recorded_output_hash: record.output_hash.clone(),
            recomputed_output_hash: None,
            diff: Vec::new(),
            world_diff: None,
            signoff: None,
        };

        if record.operation_type == OperationType::EvolutionDecided {
            if let Ok(decision_id) = Ulid::from_string(&record.operation_id) {
                report.signoff = self.get_signoff(decision_id)?;
            }
        }

        if mode == ReplayMode::ReadOnly {
            return Ok(report);
        }

        if record.operation_type != OperationType::EvolutionDecided {
            report
                .diff
                .push(format!(
                    "{} operations are not re-computable; integrity verified only",
                    record.operation_type.as_str()
                ));
            return Ok(report);
        }

        let inputs: DecisionInputs =
            serde_json::from_value(record.input_snapshot["inputs"].clone()).map_err(|err| {
                GovernanceError::Replay(format!("evidence input snapshot is not replayable: {err}"))
            })?;
        let ruleset = GovernanceRuleset::from_json(&record.input_snapshot["ruleset"])?;

        let recomputed = decide(&inputs, &ruleset, record.recorded_at);
        let recomputed_value = decision_outcome_value(&recomputed);
        let recomputed_hash = hash_json(&recomputed_value)?;

        if recomputed_hash == record.output_hash {
            report.matches = ReplayMatch::Matches;
        } else {
            report.matches = ReplayMatch::Differs;
            report.diff.push(format!(
                "output hash {} != recorded {}",
                recomputed_hash, record.output_hash
            ));
        }
        report.recomputed_output_hash = Some(recomputed_hash);

        // Then-vs-now: the world the decision saw against the world today.
        let now_state = load_state(&self.conn, &inputs.key)?;
        let now_tier = load_tier(&self.conn, &inputs.key)?;
        report.world_diff = Some(json!({
            "then": {
                "trajectory": inputs.trajectory.as_str(),
                "tier": inputs.tier.as_str(),
                "risk_score": inputs.risk_score,
            },
            "now": {
                "trajectory": now_state.map(|state| state.trajectory.as_str()),
                "tier": now_tier.as_ref().map(|tier| tier.tier.as_str()),
                "risk_score": now_tier.map(|tier| tier.risk_score),
            },
        }));
        Ok(report)
    }

    /// Records a human signoff for a decision. At most one signoff per
    /// decision; conflicting reviews belong in the decision status
    /// history, not here.
    ///
    /// # Errors
    /// Returns [`GovernanceError::Conflict`] when a signoff already
    /// exists and [`GovernanceError::Validation`] for unknown decisions.
    pub fn signoff_decision(
        &mut self,
        decision_id: Ulid,
        signed_by: &str,
        note: &str,
        now: i64,
    ) -> Result<Signoff> {
        ensure_non_empty("signed_by", signed_by)?;
        ensure_non_empty("note", note)?;
        let tx = self.conn.transaction().context("failed to begin txn")?;

        if load_decision(&tx, decision_id)?.is_none() {
            bail!(GovernanceError::Validation(format!(
                "unknown decision: {decision_id}"
            )));
        }
        let existing: Option<String> = tx
            .query_row(
                "SELECT signed_by FROM evidence_signoffs WHERE decision_id = ?1",
                params![decision_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .context("failed to check existing signoff")?;
        if let Some(signer) = existing {
            bail!(GovernanceError::Conflict(format!(
                "decision {decision_id} was already signed off by {signer}"
            )));
        }

        tx.execute(
            "INSERT INTO evidence_signoffs (decision_id, signed_by, note, signed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![decision_id.to_string(), signed_by, note, now],
        )
        .context("failed to insert signoff")?;
        tx.commit().context("failed to commit signoff")?;

        Ok(Signoff {
            decision_id,
            signed_by: signed_by.to_string(),
            note: note.to_string(),
            signed_at: now,
        })
    }

    /// # Errors
    /// Returns an error on storage failure.
    pub fn get_signoff(&self, decision_id: Ulid) -> Result<Option<Signoff>> {
        self.conn
            .query_row(
                "SELECT decision_id, signed_by, note, signed_at
                 FROM evidence_signoffs WHERE decision_id = ?1",
                params![decision_id.to_string()],
                |row| {
                    let raw: String = row.get(0)?;
                    Ok(Signoff {
                        decision_id: parse_ulid_column(0, &raw)?,
                        signed_by: row.get(1)?,
                        note: row.get(2)?,
                        signed_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("failed to read signoff")
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn load_ruleset(conn: &Connection) -> Result<GovernanceRuleset> {
    let payload: String = conn
        .query_row(
            "SELECT payload_json FROM governance_rulesets
             ORDER BY ruleset_version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .context("no governance ruleset is stored")?;
    let value: Value =
        serde_json::from_str(&payload).context("stored ruleset is not valid JSON")?;
    Ok(GovernanceRuleset::from_json(&value)?)
}

fn load_state(conn: &Connection, key: &CapabilityKey) -> Result<Option<TrustState>> {
    conn.query_row(
        "SELECT capability_id, action_id, trajectory, consecutive_successes,
                consecutive_failures, policy_rejections, high_risk_events,
                state_entered_at, last_event_at
         FROM trust_states WHERE capability_id = ?1 AND action_id = ?2",
        params![key.capability_id, key.action_id],
        parse_state_row,
    )
    .optional()
    .context("failed to read trust state")
}

fn load_tier(conn: &Connection, key: &CapabilityKey) -> Result<Option<TrustTierRecord>> {
    conn.query_row(
        "SELECT capability_id, action_id, tier, risk_score, reason, updated_at
         FROM trust_tiers WHERE capability_id = ?1 AND action_id = ?2",
        params![key.capability_id, key.action_id],
        parse_tier_row,
    )
    .optional()
    .context("failed to read trust tier")
}

fn load_decision(conn: &Connection, decision_id: Ulid) -> Result<Option<EvolutionDecision>> {
    conn.query_row(
        "SELECT decision_id, capability_id, action_id, action, risk_score, trust_tier,
                trust_trajectory, explanation, causal_chain_json, review_level,
                requires_review, status, created_at, expires_at
         FROM evolution_decisions WHERE decision_id = ?1",
        params![decision_id.to_string()],
        parse_decision_row,
    )
    .optional()
    .context("failed to read decision")
}

fn load_federation(conn: &Connection, remote_system_id: &str) -> Result<Option<FederatedTrust>> {
    let row = conn
        .query_row(
            "SELECT remote_system_id, established_at, expires_at, trust_level, status,
                    can_revoke, revoke_reason
             FROM federated_trusts WHERE remote_system_id = ?1",
            params![remote_system_id],
            |row| {
                let remote: String = row.get(0)?;
                let established_at: i64 = row.get(1)?;
                let expires_at: i64 = row.get(2)?;
                let level: String = row.get(3)?;
                let status: String = row.get(4)?;
                let can_revoke: bool = row.get(5)?;
                let revoke_reason: Option<String> = row.get(6)?;
                Ok((
                    remote,
                    established_at,
                    expires_at,
                    level,
                    status,
                    can_revoke,
                    revoke_reason,
                ))
            },
        )
        .optional()
        .context("failed to read federated trust")?;

    let Some((remote, established_at, expires_at, level, status, can_revoke, revoke_reason)) = row
    else {
        return Ok(None);
    };

    let level = FederationLevel::parse(&level)
        .ok_or_else(|| GovernanceError::Validation(format!("invalid stored level: {level}")))?;
    let status = FederationStatus::parse(&status)
        .ok_or_else(|| GovernanceError::Validation(format!("invalid stored status: {status}")))?;
    Ok(Some(FederatedTrust::restore(
        remote,
        established_at,
        expires_at,
        level,
        status,
        can_revoke,
        revoke_reason,
    )?))
}

fn require_federation(conn: &Connection, remote_system_id: &str) -> Result<FederatedTrust> {
    load_federation(conn, remote_system_id)?.ok_or_else(|| {
        GovernanceError::Validation(format!("no federated trust with {remote_system_id}")).into()
    })
}

fn load_active_authorizations(
    conn: &Connection,
    key: &CapabilityKey,
) -> Result<Vec<Authorization>> {
    let mut stmt = conn
        .prepare(
            "SELECT authorization_id, capability_id, action_id, scope, scope_id,
                    expires_at, max_executions, execution_count, status, created_at
             FROM authorizations
             WHERE capability_id = ?1 AND action_id = ?2 AND status = 'active'
             ORDER BY created_at DESC, authorization_id DESC",
        )
        .context("failed to prepare authorization query")?;
    let rows = stmt
        .query_map(params![key.capability_id, key.action_id], parse_authorization_row)
        .context("failed to query authorizations")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to read authorization rows")
}

/// An unrejected REVOKE outranks an unrejected FREEZE.
fn standing_restriction(conn: &Connection, key: &CapabilityKey) -> Result<Option<DenyReason>> {
    let action: Option<String> = conn
        .query_row(
            "SELECT action FROM evolution_decisions
             WHERE capability_id = ?1 AND action_id = ?2
               AND action IN ('freeze', 'revoke')
               AND status != 'rejected'
             ORDER BY CASE action WHEN 'revoke' THEN 0 ELSE 1 END
             LIMIT 1",
            params![key.capability_id, key.action_id],
            |row| row.get(0),
        )
        .optional()
        .context("failed to check standing restrictions")?;

    Ok(action.map(|raw| {
        if raw == "revoke" {
            DenyReason::DecisionRevoke
        } else {
            DenyReason::DecisionFreeze
        }
    }))
}

fn record_outcome_tx(
    conn: &Connection,
    key: &CapabilityKey,
    event_id: &str,
    outcome: OutcomeKind,
    context: &RiskContext,
    occurred_at: i64,
) -> Result<OutcomeRecorded> {
    ensure_non_empty("event_id", event_id)?;
    context.validate()?;

    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO outcome_events
                (event_id, capability_id, action_id, outcome, risk_score, policy_id,
                 note, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event_id,
                key.capability_id,
                key.action_id,
                outcome.as_str(),
                context.risk_score,
                context.policy_id,
                context.note,
                occurred_at,
            ],
        )
        .context("failed to append outcome event")?;

    if inserted == 0 {
        let state = load_state(conn, key)?.ok_or_else(|| {
            GovernanceError::Conflict(format!(
                "event {event_id} exists but {key} has no trust state"
            ))
        })?;
        return Ok(OutcomeRecorded {
            state,
            transition: None,
            deduplicated: true,
        });
    }

    let current = match load_state(conn, key)? {
        Some(state) => state,
        None => TrustState::new(key.clone(), occurred_at),
    };
    let ruleset = load_ruleset(conn)?;
    let applied = apply_outcome(&current, event_id, outcome, context, &ruleset, occurred_at);

    conn.execute(
        "INSERT INTO trust_states
            (capability_id, action_id, trajectory, consecutive_successes,
             consecutive_failures, policy_rejections, high_risk_events,
             state_entered_at, last_event_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (capability_id, action_id) DO UPDATE SET
            trajectory = excluded.trajectory,
            consecutive_successes = excluded.consecutive_successes,
            consecutive_failures = excluded.consecutive_failures,
            policy_rejections = excluded.policy_rejections,
            high_risk_events = excluded.high_risk_events,
            state_entered_at = excluded.state_entered_at,
            last_event_at = excluded.last_event_at",
        params![
            key.capability_id,
            key.action_id,
            applied.state.trajectory.as_str(),
            i64::from(applied.state.consecutive_successes),
            i64::from(applied.state.consecutive_failures),
            i64::from(applied.state.policy_rejections),
            i64::from(applied.state.high_risk_events),
            applied.state.state_entered_at,
            applied.state.last_event_at,
        ],
    )
    .context("failed to project trust state")?;

    if let Some(transition) = &applied.transition {
        conn.execute(
            "INSERT INTO trust_transitions
                (event_id, capability_id, action_id, old_state, new_state, trigger_event,
                 explain, risk_score, policy_id, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                transition.event_id,
                key.capability_id,
                key.action_id,
                transition.old_state.as_str(),
                transition.new_state.as_str(),
                transition.trigger_event.as_str(),
                transition.explain,
                transition.risk_score,
                transition.policy_id,
                transition.occurred_at,
            ],
        )
        .context("failed to append trust transition")?;
    }

    let mut effects = vec!["event_appended".to_string(), "state_updated".to_string()];
    if applied.transition.is_some() {
        effects.push("transition_appended".to_string());
    }
    emit_evidence(
        conn,
        build_evidence(
            OperationType::OutcomeRecorded,
            event_id,
            json!({
                "key": key,
                "outcome": outcome.as_str(),
                "context": context,
                "occurred_at": occurred_at,
            }),
            &json!({
                "trajectory": applied.state.trajectory.as_str(),
                "transition": applied.transition.as_ref().map(|t| t.new_state.as_str()),
            }),
            effects.clone(),
            effects,
            None,
            occurred_at,
        ),
    )?;

    Ok(OutcomeRecorded {
        state: applied.state,
        transition: applied.transition,
        deduplicated: false,
    })
}

fn insert_execution(conn: &Connection, execution: &ExecutionRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO execution_records
            (execution_id, authorization_id, capability_id, action_id, status,
             blocked_reason, started_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            execution.execution_id.to_string(),
            execution.authorization_id.map(|id| id.to_string()),
            execution.key.capability_id,
            execution.key.action_id,
            execution.status.as_str(),
            execution.blocked_reason.map(DenyReason::as_str),
            execution.started_at,
            execution.completed_at,
        ],
    )
    .context("failed to insert execution record")?;
    Ok(())
}

/// Writes the blocked execution record, feeds the denial back into the
/// trajectory engine, and emits gate evidence.
fn deny_execution(
    conn: &Connection,
    key: &CapabilityKey,
    authorization_id: Option<Ulid>,
    reason: DenyReason,
    context: &trust_governance_core::InvocationContext,
    now: i64,
) -> Result<GateOutcome> {
    let execution = ExecutionRecord {
        execution_id: Ulid::new(),
        authorization_id,
        key: key.clone(),
        status: ExecutionStatus::Blocked,
        blocked_reason: Some(reason),
        started_at: now,
        completed_at: Some(now),
    };
    insert_execution(conn, &execution)?;

    let feedback = RiskContext {
        risk_score: None,
        policy_id: None,
        note: Some(format!("execution blocked: {}", reason.as_str())),
    };
    record_outcome_tx(
        conn,
        key,
        &format!("gate-{}", execution.execution_id),
        reason.blocked_outcome(),
        &feedback,
        now,
    )?;

    emit_gate_evidence(conn, key, context, Some(reason), now)?;
    Ok(GateOutcome {
        allowed: false,
        deny_reason: Some(reason),
        authorization: None,
        execution,
    })
}

fn emit_gate_evidence(
    conn: &Connection,
    key: &CapabilityKey,
    context: &trust_governance_core::InvocationContext,
    deny_reason: Option<DenyReason>,
    now: i64,
) -> Result<()> {
    emit_evidence(
        conn,
        build_evidence(
            OperationType::AuthorizationChecked,
            &key.to_string(),
            json!({ "key": key, "context": context }),
            &json!({
                "allowed": deny_reason.is_none(),
                "deny_reason": deny_reason.map(DenyReason::as_str),
            }),
            vec!["execution_recorded".to_string()],
            vec!["execution_recorded".to_string()],
            None,
            now,
        ),
    )
}

fn close_execution(
    conn: &Connection,
    execution_id: Ulid,
    success: bool,
    now: i64,
) -> Result<ExecutionRecord> {
    let status = if success {
        ExecutionStatus::Success
    } else {
        ExecutionStatus::Failed
    };
    let updated = conn
        .execute(
            "UPDATE execution_records SET status = ?2, completed_at = ?3
             WHERE execution_id = ?1 AND status = 'running'",
            params![execution_id.to_string(), status.as_str(), now],
        )
        .context("failed to close execution")?;
    if updated == 0 {
        bail!(GovernanceError::Conflict(format!(
            "execution {execution_id} is not running"
        )));
    }

    let record = conn
        .query_row(
            "SELECT execution_id, authorization_id, capability_id, action_id, status,
                    blocked_reason, started_at, completed_at
             FROM execution_records WHERE execution_id = ?1",
            params![execution_id.to_string()],
            parse_execution_row,
        )
        .context("failed to reload execution record")?;

    let feedback = RiskContext {
        risk_score: None,
        policy_id: None,
        note: Some(format!("execution {}", status.as_str())),
    };
    record_outcome_tx(
        conn,
        &record.key,
        &format!("exec-{execution_id}"),
        if success {
            OutcomeKind::Success
        } else {
            OutcomeKind::Failure
        },
        &feedback,
        now,
    )?;

    emit_evidence(
        conn,
        build_evidence(
            OperationType::ExecutionClosed,
            &execution_id.to_string(),
            json!({ "execution_id": execution_id.to_string(), "success": success }),
            &json!({ "status": status.as_str() }),
            vec!["execution_closed".to_string(), "outcome_fed_back".to_string()],
            vec!["execution_closed".to_string(), "outcome_fed_back".to_string()],
            None,
            now,
        ),
    )?;
    Ok(record)
}

fn append_status_history(
    conn: &Connection,
    decision_id: Ulid,
    old_status: Option<DecisionStatus>,
    new_status: DecisionStatus,
    actor: Option<&str>,
    note: Option<&str>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO decision_status_history
            (decision_id, old_status, new_status, actor, note, occurred_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            decision_id.to_string(),
            old_status.map(DecisionStatus::as_str),
            new_status.as_str(),
            actor,
            note,
            now,
        ],
    )
    .context("failed to append decision status history")?;
    Ok(())
}

fn update_decision_status(
    conn: &Connection,
    decision_id: Ulid,
    expected: DecisionStatus,
    new_status: DecisionStatus,
) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE evolution_decisions SET status = ?3
             WHERE decision_id = ?1 AND status = ?2",
            params![
                decision_id.to_string(),
                expected.as_str(),
                new_status.as_str()
            ],
        )
        .context("failed to update decision status")?;
    if updated == 0 {
        bail!(GovernanceError::Conflict(format!(
            "decision {decision_id} is no longer {}",
            expected.as_str()
        )));
    }
    Ok(())
}

fn append_federation_history(
    conn: &Connection,
    history: &FederationHistoryRecord,
) -> Result<()> {
    conn.execute(
        "INSERT INTO federated_trust_history
            (remote_system_id, action, description, old_expires_at, new_expires_at,
             old_level, new_level, occurred_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            history.remote_system_id,
            history.action.as_str(),
            history.description,
            history.old_expires_at,
            history.new_expires_at,
            history.old_level.map(FederationLevel::as_str),
            history.new_level.map(FederationLevel::as_str),
            history.occurred_at,
        ],
    )
    .context("failed to append federation history")?;
    Ok(())
}

fn emit_federation_evidence(
    conn: &Connection,
    history: &FederationHistoryRecord,
    now: i64,
) -> Result<()> {
    emit_evidence(
        conn,
        build_evidence(
            OperationType::FederationChanged,
            &history.remote_system_id,
            json!({ "action": history.action.as_str(), "remote_system_id": history.remote_system_id }),
            &json!({ "description": history.description }),
            vec!["trust_updated".to_string(), "history_appended".to_string()],
            vec!["trust_updated".to_string(), "history_appended".to_string()],
            None,
            now,
        ),
    )
}

/// Best-effort evidence write. A failed build or insert never fails the
/// governed operation; instead the persistent gap counter moves so
/// operators can see the audit trail has holes.
fn emit_evidence(
    conn: &Connection,
    record: Result<EvidenceRecord, GovernanceError>,
) -> Result<()> {
    let Ok(record) = record else {
        return bump_evidence_gap(conn);
    };
    let (Ok(declared_json), Ok(actual_json)) = (
        serde_json::to_string(&record.declared_effects),
        serde_json::to_string(&record.actual_effects),
    ) else {
        return bump_evidence_gap(conn);
    };

    let inserted = conn.execute(
        "INSERT INTO evidence_records
            (evidence_id, operation_type, operation_id, input_snapshot_json, input_hash,
             output_hash, declared_effects_json, actual_effects_json, recorded_at,
             integrity_hash, signature)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.evidence_id.to_string(),
            record.operation_type.as_str(),
            record.operation_id,
            record.input_snapshot.to_string(),
            record.input_hash,
            record.output_hash,
            declared_json,
            actual_json,
            record.recorded_at,
            record.integrity_hash,
            record.signature,
        ],
    );

    match inserted {
        Ok(_) => Ok(()),
        Err(_) => bump_evidence_gap(conn),
    }
}

fn bump_evidence_gap(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO governance_meta (key, value) VALUES ('evidence_gap_count', '1')
         ON CONFLICT (key) DO UPDATE SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT)",
        [],
    )
    .context("failed to bump evidence gap counter")?;
    Ok(())
}

fn parse_ulid_column(idx: usize, raw: &str) -> rusqlite::Result<Ulid> {
    Ulid::from_string(raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
    })
}

fn parse_enum_column<T>(
    idx: usize,
    raw: &str,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(GovernanceError::Validation(format!(
                "unknown stored value: {raw}"
            ))),
        )
    })
}

fn parse_key_columns(row: &rusqlite::Row<'_>, cap_idx: usize) -> rusqlite::Result<CapabilityKey> {
    let capability_id: String = row.get(cap_idx)?;
    let action_id: String = row.get(cap_idx + 1)?;
    Ok(CapabilityKey {
        capability_id,
        action_id,
    })
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn parse_state_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrustState> {
    let trajectory: String = row.get(2)?;
    Ok(TrustState {
        key: parse_key_columns(row, 0)?,
        trajectory: parse_enum_column(2, &trajectory, Trajectory::parse)?,
        consecutive_successes: row.get::<_, i64>(3)? as u32,
        consecutive_failures: row.get::<_, i64>(4)? as u32,
        policy_rejections: row.get::<_, i64>(5)? as u32,
        high_risk_events: row.get::<_, i64>(6)? as u32,
        state_entered_at: row.get(7)?,
        last_event_at: row.get(8)?,
    })
}

fn parse_transition_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrustTransition> {
    let old_state: String = row.get(3)?;
    let new_state: String = row.get(4)?;
    let trigger: String = row.get(5)?;
    Ok(TrustTransition {
        event_id: row.get(0)?,
        key: parse_key_columns(row, 1)?,
        old_state: parse_enum_column(3, &old_state, Trajectory::parse)?,
        new_state: parse_enum_column(4, &new_state, Trajectory::parse)?,
        trigger_event: parse_enum_column(5, &trigger, OutcomeKind::parse)?,
        explain: row.get(6)?,
        risk_score: row.get(7)?,
        policy_id: row.get(8)?,
        occurred_at: row.get(9)?,
    })
}

fn parse_tier_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrustTierRecord> {
    let tier: String = row.get(2)?;
    Ok(TrustTierRecord {
        key: parse_key_columns(row, 0)?,
        tier: parse_enum_column(2, &tier, TrustTier::parse)?,
        risk_score: row.get(3)?,
        reason: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn parse_decision_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EvolutionDecision> {
    let decision_id: String = row.get(0)?;
    let action: String = row.get(3)?;
    let tier: String = row.get(5)?;
    let trajectory: String = row.get(6)?;
    let chain_json: String = row.get(8)?;
    let review: String = row.get(9)?;
    let status: String = row.get(11)?;
    let causal_chain: Vec<String> = serde_json::from_str(&chain_json).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(err))
    })?;
    Ok(EvolutionDecision {
        decision_id: parse_ulid_column(0, &decision_id)?,
        key: parse_key_columns(row, 1)?,
        action: parse_enum_column(3, &action, EvolutionAction::parse)?,
        risk_score: row.get(4)?,
        trust_tier: parse_enum_column(5, &tier, TrustTier::parse)?,
        trust_trajectory: parse_enum_column(6, &trajectory, Trajectory::parse)?,
        explanation: row.get(7)?,
        causal_chain,
        review_level: parse_enum_column(9, &review, ReviewLevel::parse)?,
        requires_review: row.get(10)?,
        status: parse_enum_column(11, &status, DecisionStatus::parse)?,
        created_at: row.get(12)?,
        expires_at: row.get(13)?,
    })
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn parse_authorization_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Authorization> {
    let authorization_id: String = row.get(0)?;
    let scope: String = row.get(3)?;
    let status: String = row.get(8)?;
    Ok(Authorization {
        authorization_id: parse_ulid_column(0, &authorization_id)?,
        key: parse_key_columns(row, 1)?,
        scope: parse_enum_column(3, &scope, AuthorizationScope::parse)?,
        scope_id: row.get(4)?,
        expires_at: row.get(5)?,
        max_executions: row.get::<_, Option<i64>>(6)?.map(|v| v as u32),
        execution_count: row.get::<_, i64>(7)? as u32,
        status: parse_enum_column(8, &status, AuthorizationStatus::parse)?,
        created_at: row.get(9)?,
    })
}

fn parse_execution_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    let execution_id: String = row.get(0)?;
    let authorization_id: Option<String> = row.get(1)?;
    let status: String = row.get(4)?;
    let blocked: Option<String> = row.get(5)?;
    let authorization_id = match authorization_id {
        Some(raw) => Some(parse_ulid_column(1, &raw)?),
        None => None,
    };
    let blocked_reason = match blocked {
        Some(raw) => Some(parse_enum_column(5, &raw, DenyReason::parse)?),
        None => None,
    };
    Ok(ExecutionRecord {
        execution_id: parse_ulid_column(0, &execution_id)?,
        authorization_id,
        key: parse_key_columns(row, 2)?,
        status: parse_enum_column(4, &status, ExecutionStatus::parse)?,
        blocked_reason,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

fn parse_federation_history_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<FederationHistoryRecord> {
    let action: String = row.get(1)?;
    let old_level: Option<String> = row.get(5)?;
    let new_level: Option<String> = row.get(6)?;
    let old_level = match old_level {
        Some(raw) => Some(parse_enum_column(5, &raw, FederationLevel::parse)?),
        None => None,
    };
    let new_level = match new_level {
        Some(raw) => Some(parse_enum_column(6, &raw, FederationLevel::parse)?),
        None => None,
    };
    Ok(FederationHistoryRecord {
        remote_system_id: row.get(0)?,
        action: parse_enum_column(1, &action, FederationAction::parse)?,
        description: row.get(2)?,
        old_expires_at: row.get(3)?,
        new_expires_at: row.get(4)?,
        old_level,
        new_level,
        occurred_at: row.get(7)?,
    })
}

fn parse_evidence_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EvidenceRecord> {
    let evidence_id: String = row.get(0)?;
    let operation_type: String = row.get(1)?;
    let snapshot_json: String = row.get(3)?;
    let declared_json: String = row.get(6)?;
    let actual_json: String = row.get(7)?;

    let input_snapshot: Value = serde_json::from_str(&snapshot_json).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err))
    })?;
    let declared_effects: Vec<String> = serde_json::from_str(&declared_json).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(err))
    })?;
    let actual_effects: Vec<String> = serde_json::from_str(&actual_json).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(err))
    })?;

    Ok(EvidenceRecord {
        evidence_id: parse_ulid_column(0, &evidence_id)?,
        operation_type: parse_enum_column(1, &operation_type, OperationType::parse)?,
        operation_id: row.get(2)?,
        input_snapshot,
        input_hash: row.get(4)?,
        output_hash: row.get(5)?,
        declared_effects,
        actual_effects,
        recorded_at: row.get(8)?,
        integrity_hash: row.get(9)?,
        signature: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use trust_governance_core::InvocationContext;

    fn must<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn must_some<T>(value: Option<T>) -> T {
        match value {
            Some(inner) => inner,
            None => panic!("expected Some(..), got None"),
        }
    }

    fn fixture_store() -> SqliteGovernanceStore {
        must(SqliteGovernanceStore::open(":memory:"))
    }

    fn fixture_key() -> CapabilityKey {
        must(CapabilityKey::new("cap-weather", "fetch_forecast"))
    }

    fn record_many(
        store: &mut SqliteGovernanceStore,
        key: &CapabilityKey,
        outcome: OutcomeKind,
        count: usize,
        start_at: i64,
    ) {
        for index in 0..count {
            must(store.record_outcome(
                key,
                &format!("{}-{}-{index}", outcome.as_str(), start_at),
                outcome,
                &RiskContext::default(),
                start_at + index as i64,
            ));
        }
    }

    #[test]
    fn consistent_success_promotes_exactly_once() {
        let mut store = fixture_store();
        let key = fixture_key();
        record_many(&mut store, &key, OutcomeKind::Success, 10, 1_000);

        let state = must_some(must(store.get_trust_state(&key)));
        assert_eq!(state.trajectory, Trajectory::Stable);
        assert_eq!(state.consecutive_successes, 10);

        let transitions = must(store.list_transitions(&key));
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].old_state, Trajectory::Earning);
        assert_eq!(transitions[0].new_state, Trajectory::Stable);
    }

    #[test]
    fn duplicate_event_id_is_a_noop() {
        let mut store = fixture_store();
        let key = fixture_key();
        let first = must(store.record_outcome(
            &key,
            "evt-1",
            OutcomeKind::Success,
            &RiskContext::default(),
            1_000,
        ));
        assert!(!first.deduplicated);

        let second = must(store.record_outcome(
            &key,
            "evt-1",
            OutcomeKind::Failure,
            &RiskContext::default(),
            2_000,
        ));
        assert!(second.deduplicated);
        assert_eq!(second.state.consecutive_successes, 1);
        assert_eq!(second.state.consecutive_failures, 0);
    }

    #[test]
    fn tier_history_is_appended_only_on_change() {
        let mut store = fixture_store();
        let key = fixture_key();

        let first = must(store.assess_risk(&key, 0.2, "baseline scan", 1_000));
        assert_eq!(first.record.tier, TrustTier::Low);
        assert!(must_some(first.change).old_tier.is_none());

        let same = must(store.assess_risk(&key, 0.3, "re-scan", 2_000));
        assert!(same.change.is_none());

        let raised = must(store.assess_risk(&key, 0.9, "privilege widened", 3_000));
        let change = must_some(raised.change);
        assert_eq!(change.old_tier, Some(TrustTier::Low));
        assert_eq!(change.new_tier, TrustTier::High);

        let history = must(store.list_tier_history(&key));
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].new_tier, TrustTier::High);
    }

    #[test]
    fn violation_at_high_tier_revokes_and_gate_blocks() {
        let mut store = fixture_store();
        let key = fixture_key();

        must(store.assess_risk(&key, 0.9, "handles credentials", 500));
        record_many(&mut store, &key, OutcomeKind::Failure, 3, 1_000);
        must(store.record_outcome(
            &key,
            "evt-violation",
            OutcomeKind::PolicyRejection,
            &RiskContext {
                risk_score: None,
                policy_id: Some("pol-7".to_string()),
                note: None,
            },
            2_000,
        ));

        let decision = must(store.evaluate_evolution(&key, 3_000));
        assert_eq!(decision.action, EvolutionAction::Revoke);
        assert_eq!(decision.review_level, ReviewLevel::Critical);
        assert_eq!(decision.status, DecisionStatus::Proposed);
        assert!(decision.requires_review);

        // The unapproved revoke already blocks execution: fail closed.
        must(store.grant_authorization(&key, AuthorizationScope::Global, None, None, None, 3_100));
        let before = must_some(must(store.get_trust_state(&key))).policy_rejections;
        let gate = must(store.authorize_execution(&key, &InvocationContext::default(), 3_200));
        assert!(!gate.allowed);
        assert_eq!(gate.deny_reason, Some(DenyReason::DecisionRevoke));
        assert_eq!(gate.execution.status, ExecutionStatus::Blocked);

        let after = must_some(must(store.get_trust_state(&key))).policy_rejections;
        assert_eq!(after, before + 1);
    }

    #[test]
    fn promote_requires_approval_then_executes() {
        let mut store = fixture_store();
        let key = fixture_key();

        record_many(&mut store, &key, OutcomeKind::Success, 5, 1_000);
        must(store.assess_risk(&key, 0.5, "broad surface", 2_000));
        let baseline = must(store.evaluate_evolution(&key, 2_100));
        assert_eq!(baseline.action, EvolutionAction::None);

        must(store.assess_risk(&key, 0.2, "surface narrowed", 3_000));
        let decision = must(store.evaluate_evolution(&key, 3_100));
        assert_eq!(decision.action, EvolutionAction::Promote);
        assert_eq!(decision.status, DecisionStatus::Proposed);

        let approved = must(store.set_decision_status(
            decision.decision_id,
            DecisionStatus::Approved,
            "reviewer-1",
            Some("looks safe"),
            3_200,
        ));
        assert_eq!(approved.status, DecisionStatus::Executed);
    }

    #[test]
    fn rejected_freeze_no_longer_blocks_the_gate() {
        let mut store = fixture_store();
        let key = fixture_key();

        must(store.assess_risk(&key, 0.5, "baseline", 500));
        record_many(&mut store, &key, OutcomeKind::Failure, 3, 1_000);
        let freeze = must(store.evaluate_evolution(&key, 2_000));
        assert_eq!(freeze.action, EvolutionAction::Freeze);

        must(store.grant_authorization(&key, AuthorizationScope::Global, None, None, None, 2_100));
        let blocked = must(store.authorize_execution(&key, &InvocationContext::default(), 2_200));
        assert_eq!(blocked.deny_reason, Some(DenyReason::DecisionFreeze));

        must(store.set_decision_status(
            freeze.decision_id,
            DecisionStatus::Rejected,
            "reviewer-1",
            Some("false alarm"),
            2_300,
        ));
        let allowed = must(store.authorize_execution(&key, &InvocationContext::default(), 2_400));
        assert!(allowed.allowed);
    }

    #[test]
    fn execution_budget_is_never_exceeded() {
        let mut store = fixture_store();
        let key = fixture_key();
        let auth = must(store.grant_authorization(
            &key,
            AuthorizationScope::Global,
            None,
            None,
            Some(2),
            1_000,
        ));

        let first = must(store.authorize_execution(&key, &InvocationContext::default(), 1_100));
        let second = must(store.authorize_execution(&key, &InvocationContext::default(), 1_200));
        let third = must(store.authorize_execution(&key, &InvocationContext::default(), 1_300));
        assert!(first.allowed);
        assert!(second.allowed);
        assert!(!third.allowed);
        assert_eq!(third.deny_reason, Some(DenyReason::ExecutionBudgetExhausted));

        let count: i64 = must(store.connection().query_row(
            "SELECT execution_count FROM authorizations WHERE authorization_id = ?1",
            params![auth.authorization_id.to_string()],
            |row| row.get(0),
        ));
        assert_eq!(count, 2);
    }

    #[test]
    fn concurrent_gate_checks_never_exceed_the_budget() {
        let path = std::env::temp_dir()
            .join(format!("tg-store-test-{}.db", Ulid::new()))
            .to_string_lossy()
            .into_owned();
        let key = fixture_key();
        {
            let mut store = must(SqliteGovernanceStore::open(&path));
            must(store.grant_authorization(
                &key,
                AuthorizationScope::Global,
                None,
                None,
                Some(3),
                1_000,
            ));
        }

        let mut workers = Vec::new();
        for _ in 0..6 {
            let path = path.clone();
            let key = key.clone();
            workers.push(std::thread::spawn(move || {
                let Ok(mut store) = SqliteGovernanceStore::open(&path) else {
                    return 0u32;
                };
                let mut allowed = 0u32;
                for _ in 0..4 {
                    // A busy/conflicted attempt counts as denied; the
                    // property under test is the cap, not liveness.
                    if let Ok(gate) =
                        store.authorize_execution(&key, &InvocationContext::default(), 2_000)
                    {
                        if gate.allowed {
                            allowed += 1;
                        }
                    }
                }
                allowed
            }));
        }
        let total: u32 = workers
            .into_iter()
            .map(|worker| match worker.join() {
                Ok(allowed) => allowed,
                Err(_) => panic!("gate worker panicked"),
            })
            .sum();
        assert!(total <= 3);

        let store = must(SqliteGovernanceStore::open(&path));
        let count: i64 = must(store.connection().query_row(
            "SELECT execution_count FROM authorizations",
            [],
            |row| row.get(0),
        ));
        assert!(count <= 3);
        assert_eq!(count, i64::from(total));
    }

    #[test]
    fn authorization_changes_leave_evidence() {
        let mut store = fixture_store();
        let key = fixture_key();
        let auth = must(store.grant_authorization(
            &key,
            AuthorizationScope::Global,
            None,
            None,
            Some(2),
            1_000,
        ));
        must(store.revoke_authorization(auth.authorization_id, 2_000));

        let granted = must(store.list_evidence(Some(OperationType::AuthorizationGranted), 10));
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].operation_id, auth.authorization_id.to_string());

        let revoked = must(store.list_evidence(Some(OperationType::AuthorizationRevoked), 10));
        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].operation_id, auth.authorization_id.to_string());
    }

    #[test]
    fn evidence_write_failure_bumps_the_gap_counter_without_failing_the_write() {
        let mut store = fixture_store();
        let key = fixture_key();
        must(store.connection().execute("DROP TABLE evidence_records", []));

        let recorded = must(store.record_outcome(
            &key,
            "evt-1",
            OutcomeKind::Success,
            &RiskContext::default(),
            1_000,
        ));
        assert!(!recorded.deduplicated);
        assert_eq!(recorded.state.consecutive_successes, 1);
        assert_eq!(must(store.evidence_gap_count()), 1);
    }

    #[test]
    fn expired_authorization_denies_with_expired_reason() {
        let mut store = fixture_store();
        let key = fixture_key();
        must(store.grant_authorization(
            &key,
            AuthorizationScope::Global,
            None,
            Some(5_000),
            None,
            1_000,
        ));

        let gate = must(store.authorize_execution(&key, &InvocationContext::default(), 5_000));
        assert!(!gate.allowed);
        assert_eq!(gate.deny_reason, Some(DenyReason::Expired));
        assert_eq!(gate.execution.blocked_reason, Some(DenyReason::Expired));
    }

    #[test]
    fn scoped_authorization_requires_matching_context() {
        let mut store = fixture_store();
        let key = fixture_key();
        must(store.grant_authorization(
            &key,
            AuthorizationScope::User,
            Some("user-1"),
            None,
            None,
            1_000,
        ));

        let wrong_user = InvocationContext {
            user_id: Some("user-2".to_string()),
            session_id: None,
        };
        let denied = must(store.authorize_execution(&key, &wrong_user, 1_100));
        assert_eq!(denied.deny_reason, Some(DenyReason::NoActiveAuthorization));

        let right_user = InvocationContext {
            user_id: Some("user-1".to_string()),
            session_id: None,
        };
        let allowed = must(store.authorize_execution(&key, &right_user, 1_200));
        assert!(allowed.allowed);
    }

    #[test]
    fn completing_an_execution_feeds_the_trajectory() {
        let mut store = fixture_store();
        let key = fixture_key();
        must(store.grant_authorization(&key, AuthorizationScope::Global, None, None, None, 1_000));

        let gate = must(store.authorize_execution(&key, &InvocationContext::default(), 1_100));
        let record = must(store.complete_execution(gate.execution.execution_id, true, 1_200));
        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.completed_at, Some(1_200));

        let state = must_some(must(store.get_trust_state(&key)));
        assert_eq!(state.consecutive_successes, 1);

        // Closing twice is a conflict.
        assert!(store
            .complete_execution(gate.execution.execution_id, true, 1_300)
            .is_err());
    }

    #[test]
    fn stale_running_executions_are_reaped_as_failures() {
        let mut store = fixture_store();
        let key = fixture_key();
        must(store.grant_authorization(&key, AuthorizationScope::Global, None, None, None, 1_000));
        let gate = must(store.authorize_execution(&key, &InvocationContext::default(), 1_100));

        assert!(must(store.reap_stale_executions(2_000)).is_empty());

        let reaped = must(store.reap_stale_executions(1_100 + 300_000));
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].execution_id, gate.execution.execution_id);
        assert_eq!(reaped[0].status, ExecutionStatus::Failed);

        let state = must_some(must(store.get_trust_state(&key)));
        assert_eq!(state.consecutive_failures, 1);
    }

    #[test]
    fn federation_lifecycle_expires_lazily() {
        let mut store = fixture_store();
        must(store.establish_federation("node-42", FederationLevel::Limited, 1_000, true, 1_000));

        let at_boundary = must_some(must(store.get_federation("node-42", 2_000)));
        assert_eq!(at_boundary.effective_status, FederationStatus::Active);

        let past = must_some(must(store.get_federation("node-42", 2_001)));
        assert_eq!(past.effective_status, FederationStatus::Expired);
        assert!(store.renew_federation("node-42", 1_000, 2_002).is_err());

        let history = must(store.list_federation_history("node-42"));
        let actions: Vec<FederationAction> = history.iter().map(|h| h.action).collect();
        assert_eq!(
            actions,
            vec![FederationAction::Establish, FederationAction::Expire]
        );

        // Terminal grants can be replaced by a fresh establish.
        let fresh =
            must(store.establish_federation("node-42", FederationLevel::Minimal, 5_000, true, 3_000));
        assert_eq!(fresh.trust.established_at(), 3_000);
    }

    #[test]
    fn revoked_federation_is_terminal_and_not_renewable() {
        let mut store = fixture_store();
        must(store.establish_federation(
            "node-42",
            FederationLevel::Standard,
            86_400_000,
            true,
            1_000,
        ));
        let revoked = must(store.revoke_federation("node-42", "remote misbehavior", 2_000));
        assert_eq!(revoked.effective_status, FederationStatus::Revoked);
        assert_eq!(revoked.trust.revoke_reason(), Some("remote misbehavior"));

        assert!(store.renew_federation("node-42", 1_000, 3_000).is_err());
        assert!(store
            .revoke_federation("node-42", "again", 3_000)
            .is_err());

        let reloaded = must_some(must(store.get_federation("node-42", 9_999_999_999)));
        assert_eq!(reloaded.effective_status, FederationStatus::Revoked);
    }

    #[test]
    fn federation_downgrade_moves_only_downward() {
        let mut store = fixture_store();
        must(store.establish_federation(
            "node-42",
            FederationLevel::Standard,
            86_400_000,
            true,
            1_000,
        ));
        let snapshot = must(store.downgrade_federation(
            "node-42",
            FederationLevel::Minimal,
            "behavioral anomalies",
            2_000,
        ));
        assert_eq!(snapshot.trust.trust_level(), FederationLevel::Minimal);
        assert_eq!(snapshot.effective_status, FederationStatus::Degraded);

        assert!(store
            .downgrade_federation("node-42", FederationLevel::Standard, "upgrade", 3_000)
            .is_err());

        // Degraded grants can still be renewed within the ceiling.
        assert!(store.renew_federation("node-42", 1_000, 4_000).is_ok());
    }

    #[test]
    fn establish_rejects_double_grant_and_bad_ttl() {
        let mut store = fixture_store();
        must(store.establish_federation("node-42", FederationLevel::Limited, 5_000, true, 1_000));
        assert!(store
            .establish_federation("node-42", FederationLevel::Limited, 5_000, true, 2_000)
            .is_err());
        assert!(store
            .establish_federation("node-43", FederationLevel::Limited, 0, true, 1_000)
            .is_err());
        assert!(store
            .establish_federation(
                "node-44",
                FederationLevel::Limited,
                trust_governance_core::MAX_FEDERATION_TTL_MS + 1,
                true,
                1_000
            )
            .is_err());
    }

    #[test]
    fn decision_replay_matches_recorded_output() {
        let mut store = fixture_store();
        let key = fixture_key();

        must(store.assess_risk(&key, 0.5, "baseline", 500));
        record_many(&mut store, &key, OutcomeKind::Failure, 3, 1_000);
        let decision = must(store.evaluate_evolution(&key, 2_000));

        let evidence = must(store.list_evidence(Some(OperationType::EvolutionDecided), 10));
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].operation_id, decision.decision_id.to_string());

        let read_only = must(store.replay(evidence[0].evidence_id, ReplayMode::ReadOnly));
        assert_eq!(read_only.matches, ReplayMatch::NotCompared);
        assert!(read_only.recomputed_output_hash.is_none());

        let validated = must(store.replay(evidence[0].evidence_id, ReplayMode::Validate));
        assert_eq!(validated.matches, ReplayMatch::Matches);
        assert_eq!(
            validated.recomputed_output_hash.as_deref(),
            Some(validated.recorded_output_hash.as_str())
        );
    }

    #[test]
    fn signoff_is_single_use_and_surfaces_in_replay() {
        let mut store = fixture_store();
        let key = fixture_key();

        must(store.assess_risk(&key, 0.5, "baseline", 500));
        record_many(&mut store, &key, OutcomeKind::Failure, 3, 1_000);
        let decision = must(store.evaluate_evolution(&key, 2_000));

        must(store.signoff_decision(decision.decision_id, "reviewer-1", "confirmed", 3_000));
        assert!(store
            .signoff_decision(decision.decision_id, "reviewer-2", "me too", 3_100)
            .is_err());

        let evidence = must(store.list_evidence(Some(OperationType::EvolutionDecided), 10));
        let report = must(store.replay(evidence[0].evidence_id, ReplayMode::ReadOnly));
        let signoff = must_some(report.signoff);
        assert_eq!(signoff.signed_by, "reviewer-1");
    }

    #[test]
    fn append_only_tables_reject_updates_and_deletes() {
        let mut store = fixture_store();
        let key = fixture_key();
        must(store.record_outcome(
            &key,
            "evt-1",
            OutcomeKind::Success,
            &RiskContext::default(),
            1_000,
        ));

        let update = store.connection().execute(
            "UPDATE outcome_events SET outcome = 'failure' WHERE event_id = 'evt-1'",
            [],
        );
        let message = match update {
            Err(err) => err.to_string(),
            Ok(_) => panic!("update should have been rejected"),
        };
        assert!(message.contains("append-only"));

        let delete = store
            .connection()
            .execute("DELETE FROM evidence_records", []);
        assert!(delete.is_err());

        must(store.establish_federation("node-42", FederationLevel::Limited, 5_000, true, 1_000));
        let mutate = store.connection().execute(
            "UPDATE federated_trusts SET established_at = 99 WHERE remote_system_id = 'node-42'",
            [],
        );
        assert!(mutate.is_err());
    }

    #[test]
    fn evidence_gap_counter_stays_zero_under_normal_operation() {
        let mut store = fixture_store();
        let key = fixture_key();
        must(store.assess_risk(&key, 0.9, "baseline", 500));
        record_many(&mut store, &key, OutcomeKind::Success, 3, 1_000);
        assert_eq!(must(store.evidence_gap_count()), 0);
    }

    #[test]
    fn ruleset_versions_are_append_only_and_monotonic() {
        let mut store = fixture_store();
        let current = must(store.current_ruleset());
        assert_eq!(current.ruleset_version, 1);

        let mut next = GovernanceRuleset::v1();
        next.ruleset_version = 2;
        next.promote_successes = 7;
        let payload = must(serde_json::to_value(&next));
        must(store.put_ruleset(&payload, 2_000));
        assert_eq!(must(store.current_ruleset()).promote_successes, 7);

        // Re-posting an old version is rejected.
        let stale = must(serde_json::to_value(GovernanceRuleset::v1()));
        assert!(store.put_ruleset(&stale, 3_000).is_err());
    }

    proptest! {
        #[test]
        fn budget_cap_is_respected_for_any_sequence(
            max_executions in 1u32..6,
            attempts in 1usize..20,
        ) {
            let mut store = fixture_store();
            let key = fixture_key();
            must(store.grant_authorization(
                &key,
                AuthorizationScope::Global,
                None,
                None,
                Some(max_executions),
                1_000,
            ));

            let mut allowed = 0u32;
            for index in 0..attempts {
                let gate = must(store.authorize_execution(
                    &key,
                    &InvocationContext::default(),
                    2_000 + index as i64,
                ));
                if gate.allowed {
                    allowed += 1;
                }
            }
            prop_assert!(allowed <= max_executions);
            prop_assert_eq!(allowed, max_executions.min(attempts as u32));
        }

        #[test]
        fn streak_counters_stay_mutually_exclusive(
            outcomes in proptest::collection::vec(0u8..4, 1..40),
        ) {
            let mut store = fixture_store();
            let key = fixture_key();
            for (index, raw) in outcomes.iter().enumerate() {
                let outcome = match raw {
                    0 => OutcomeKind::Success,
                    1 => OutcomeKind::Failure,
                    2 => OutcomeKind::PolicyRejection,
                    _ => OutcomeKind::HighRisk,
                };
                let recorded = must(store.record_outcome(
                    &key,
                    &format!("evt-{index}"),
                    outcome,
                    &RiskContext::default(),
                    1_000 + index as i64,
                ));
                prop_assert!(
                    recorded.state.consecutive_successes == 0
                        || recorded.state.consecutive_failures == 0
                );
            }
        }
    }
}
