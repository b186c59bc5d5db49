//! Orchestrator for the medication workflows.
//!
//! `MedicationBoard` ties the window table, the injected facility clock,
//! and the persistence gateway together, and keeps the in-memory session
//! registry and query cache. Everything stateful lives here; the modules
//! underneath stay pure.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::FacilityClock;
use crate::dispense::{self, DispenseAction, DispenseState, DispenseValidation};
use crate::models::{
    AdministrationRecord, DispensableItem, DispenseCommand, LabelContext, LabelSpec, PauseCommand,
    PausePrescription, Prescription, ResumeCommand,
};
use crate::pause::{self, PauseError, PauseInput};
use crate::schedule::{MarRow, SlotTable};

/// The persistence layer seam. Implementations forward commands to the
/// external record store; failures come back as one opaque error and the
/// board neither inspects nor retries them.
#[async_trait]
pub trait DispenseGateway: Send + Sync {
    async fn submit_dispense(&self, command: DispenseCommand) -> Result<()>;
    async fn submit_pause(&self, prescription_id: &str, command: PauseCommand) -> Result<()>;
    async fn submit_resume(&self, prescription_id: &str, command: ResumeCommand) -> Result<()>;
}

/// Outcome of a dispense submission attempt. Field-level problems block the
/// batch and come back as values; only the gateway can actually fail.
#[derive(Debug)]
pub enum DispenseSubmission {
    Completed { labels: Vec<LabelSpec> },
    Blocked { validation: DispenseValidation },
}

/// Outcome of a pause submission attempt.
#[derive(Debug)]
pub enum PauseSubmission {
    Completed { pause: PausePrescription },
    Blocked { error: PauseError },
}

pub struct MedicationBoard {
    slots: SlotTable,
    clock: Arc<dyn FacilityClock>,
    gateway: Arc<dyn DispenseGateway>,
    sessions: DashMap<Uuid, DispenseState>,
    cache: DashMap<String, serde_json::Value>,
}

impl MedicationBoard {
    /// The window table must already be validated; `SlotTable::new` is the
    /// fail-fast step and should run at application startup.
    pub fn new(
        slots: SlotTable,
        clock: Arc<dyn FacilityClock>,
        gateway: Arc<dyn DispenseGateway>,
    ) -> Self {
        Self {
            slots,
            clock,
            gateway,
            sessions: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    pub fn with_default_slots(
        clock: Arc<dyn FacilityClock>,
        gateway: Arc<dyn DispenseGateway>,
    ) -> Self {
        Self::new(SlotTable::default_table().clone(), clock, gateway)
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    // ===== MAR grid =====

    pub fn mar_row(&self, records: &[AdministrationRecord]) -> MarRow {
        self.slots.map_to_windows(records)
    }

    /// Index of the window to highlight for `selected_date`, from the
    /// facility clock. `None` whenever the viewed date is not today.
    pub fn current_slot_index(&self, selected_date: NaiveDate) -> Option<usize> {
        let now = self.clock.facility_now();
        self.slots
            .slots()
            .iter()
            .find(|slot| self.slots.is_current_slot(slot, now, selected_date))
            .map(|slot| slot.index)
    }

    // ===== Dispense sessions =====

    #[instrument(skip(self, rows), fields(items = rows.len()))]
    pub fn open_dispense_session(&self, rows: Vec<DispensableItem>) -> Uuid {
        let session_id = Uuid::new_v4();
        let state = dispense::initialize(rows);
        info!(session = %session_id, "dispense session opened");
        self.sessions.insert(session_id, state);
        session_id
    }

    pub fn session(&self, session_id: Uuid) -> Option<DispenseState> {
        self.sessions.get(&session_id).map(|state| state.clone())
    }

    #[instrument(skip(self, action), fields(session = %session_id))]
    pub fn dispatch(&self, session_id: Uuid, action: DispenseAction) -> Result<DispenseState> {
        let mut entry = self
            .sessions
            .get_mut(&session_id)
            .context("unknown dispense session")?;
        let next = dispense::reduce(entry.value().clone(), action);
        *entry.value_mut() = next.clone();
        Ok(next)
    }

    pub fn validate_session(
        &self,
        session_id: Uuid,
        dispensed_by_id: Option<&str>,
    ) -> Result<DispenseValidation> {
        let state = self
            .sessions
            .get(&session_id)
            .context("unknown dispense session")?;
        Ok(dispense::validate(&state, dispensed_by_id))
    }

    /// Drops the session wholesale. Nothing was written, so nothing needs
    /// rolling back.
    #[instrument(skip(self), fields(session = %session_id))]
    pub fn cancel_session(&self, session_id: Uuid) {
        if self.sessions.remove(&session_id).is_some() {
            info!("dispense session cancelled");
        }
    }

    /// Validates, emits the batch command through the gateway, and on
    /// confirmed persistence derives the label specs, drops the session,
    /// and invalidates the facility's cached queries. A gateway failure
    /// leaves the session intact and surfaces as one aggregate error.
    #[instrument(skip(self, label_context), fields(session = %session_id, facility = facility_id))]
    pub async fn submit_session(
        &self,
        session_id: Uuid,
        dispensed_by_id: &str,
        facility_id: &str,
        label_context: &LabelContext,
    ) -> Result<DispenseSubmission> {
        let state = self
            .sessions
            .get(&session_id)
            .context("unknown dispense session")?
            .clone();

        let validation = dispense::validate(&state, Some(dispensed_by_id));
        if !validation.is_valid {
            warn!(problems = validation.problems.len(), "dispense submission blocked");
            return Ok(DispenseSubmission::Blocked { validation });
        }

        let command = dispense::build_command(&state, dispensed_by_id, facility_id);
        let item_count = command.items.len();
        self.gateway
            .submit_dispense(command)
            .await
            .context("dispense submission failed")?;

        let labels = dispense::build_labels(&state, label_context);
        self.sessions.remove(&session_id);
        self.invalidate_dispensable_list(facility_id);
        info!(items = item_count, "dispense batch persisted");
        Ok(DispenseSubmission::Completed { labels })
    }

    // ===== Pause / resume =====

    /// Builds and submits a pause. The end-date rule is evaluated against
    /// the facility clock here, at submission time, because the
    /// prescription is owned externally and may have changed since the
    /// dialog opened.
    #[instrument(skip(self, prescription, active_pause, input), fields(prescription_id = %prescription.id))]
    pub async fn submit_pause(
        &self,
        prescription: &Prescription,
        active_pause: Option<&PausePrescription>,
        input: &PauseInput,
    ) -> Result<PauseSubmission> {
        let now = self.clock.facility_now();
        let record = match pause::pause(prescription, active_pause, input, now) {
            Ok(record) => record,
            Err(error) => {
                warn!(%error, "pause blocked");
                return Ok(PauseSubmission::Blocked { error });
            }
        };
        self.gateway
            .submit_pause(&prescription.id, PauseCommand::from(&record))
            .await
            .context("pause submission failed")?;
        info!("prescription paused");
        Ok(PauseSubmission::Completed { pause: record })
    }

    /// Idempotent: returns `false` without touching the gateway when no
    /// active pause exists.
    #[instrument(skip(self, active_pause), fields(prescription_id = prescription_id))]
    pub async fn submit_resume(
        &self,
        prescription_id: &str,
        active_pause: Option<&PausePrescription>,
    ) -> Result<bool> {
        match pause::resume(active_pause) {
            Some(command) => {
                self.gateway
                    .submit_resume(prescription_id, command)
                    .await
                    .context("resume submission failed")?;
                info!("prescription resumed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ===== Query cache =====

    pub fn cache_dispensable_list(&self, facility_id: &str, payload: serde_json::Value) {
        self.cache.insert(dispensable_key(facility_id), payload);
    }

    pub fn cached_dispensable_list(&self, facility_id: &str) -> Option<serde_json::Value> {
        self.cache
            .get(&dispensable_key(facility_id))
            .map(|entry| entry.clone())
    }

    fn invalidate_dispensable_list(&self, facility_id: &str) {
        self.cache.remove(&dispensable_key(facility_id));
    }
}

fn dispensable_key(facility_id: &str) -> String {
    format!("dispensable:{}", facility_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FrozenClock;
    use crate::models::{PauseTimeUnit, StockSnapshot};
    use chrono::{NaiveDate, NaiveDateTime};
    use tokio::sync::Mutex;

    struct MockGateway {
        fail: bool,
        dispenses: Mutex<Vec<DispenseCommand>>,
        pauses: Mutex<Vec<(String, PauseCommand)>>,
        resumes: Mutex<Vec<String>>,
    }

    impl MockGateway {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                dispenses: Mutex::new(Vec::new()),
                pauses: Mutex::new(Vec::new()),
                resumes: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DispenseGateway for MockGateway {
        async fn submit_dispense(&self, command: DispenseCommand) -> Result<()> {
            if self.fail {
                anyhow::bail!("record store unavailable");
            }
            self.dispenses.lock().await.push(command);
            Ok(())
        }

        async fn submit_pause(&self, prescription_id: &str, command: PauseCommand) -> Result<()> {
            if self.fail {
                anyhow::bail!("record store unavailable");
            }
            self.pauses
                .lock()
                .await
                .push((prescription_id.to_string(), command));
            Ok(())
        }

        async fn submit_resume(&self, prescription_id: &str, _command: ResumeCommand) -> Result<()> {
            if self.fail {
                anyhow::bail!("record store unavailable");
            }
            self.resumes.lock().await.push(prescription_id.to_string());
            Ok(())
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn board(gateway: Arc<MockGateway>) -> MedicationBoard {
        MedicationBoard::with_default_slots(Arc::new(FrozenClock(noon())), gateway)
    }

    fn prescription(id: &str) -> Prescription {
        Prescription {
            id: id.to_string(),
            frequency: Some("Daily".to_string()),
            route: Some("oral".to_string()),
            dose_amount: Some(2.0),
            units: Some("mg".to_string()),
            is_variable_dose: false,
            duration_value: None,
            duration_unit: None,
            indication: None,
            notes: None,
            is_prn: false,
            is_ongoing: true,
            is_discharge: false,
            discontinued: false,
            end_date: None,
            repeats: 2,
            quantity: None,
            last_ordered_at: None,
        }
    }

    fn row(id: &str) -> DispensableItem {
        DispensableItem {
            prescription: prescription(id),
            medication_name: "Amoxicillin 250mg capsules".to_string(),
            prescriber_name: None,
            quantity: None,
            instructions: None,
            stock: Some(StockSnapshot { quantity: 12 }),
        }
    }

    fn label_context() -> LabelContext {
        LabelContext {
            patient_name: "Alex Smith".to_string(),
            facility_name: "Eastside Clinic".to_string(),
            request_number: "D-2041".to_string(),
        }
    }

    #[test]
    fn test_current_slot_index_follows_clock_and_date() {
        let board = board(MockGateway::new(false));
        // 12:30 falls in the 12:00-14:00 window.
        assert_eq!(
            board.current_slot_index(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            Some(6)
        );
        assert_eq!(
            board.current_slot_index(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()),
            None
        );
    }

    #[tokio::test]
    async fn test_submit_session_persists_batch_and_drops_session() {
        let gateway = MockGateway::new(false);
        let board = board(gateway.clone());
        board.cache_dispensable_list("facility-9", serde_json::json!({"rows": 2}));

        let session = board.open_dispense_session(vec![row("rx-1"), row("rx-2")]);
        let outcome = board
            .submit_session(session, "user-1", "facility-9", &label_context())
            .await
            .unwrap();

        let labels = match outcome {
            DispenseSubmission::Completed { labels } => labels,
            DispenseSubmission::Blocked { .. } => panic!("submission should not be blocked"),
        };
        assert_eq!(labels.len(), 2);
        assert!(board.session(session).is_none());
        assert!(board.cached_dispensable_list("facility-9").is_none());

        let submitted = gateway.dispenses.lock().await;
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].items.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_session_blocked_leaves_session_and_gateway_untouched() {
        let gateway = MockGateway::new(false);
        let board = board(gateway.clone());

        let session = board.open_dispense_session(vec![row("rx-1")]);
        board
            .dispatch(
                session,
                DispenseAction::SetQuantity {
                    prescription_id: "rx-1".to_string(),
                    quantity: 0,
                },
            )
            .unwrap();

        let outcome = board
            .submit_session(session, "user-1", "facility-9", &label_context())
            .await
            .unwrap();
        assert!(matches!(outcome, DispenseSubmission::Blocked { .. }));
        assert!(board.session(session).is_some());
        assert!(gateway.dispenses.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_session_for_retry_by_caller() {
        let board = board(MockGateway::new(true));
        let session = board.open_dispense_session(vec![row("rx-1")]);

        let result = board
            .submit_session(session, "user-1", "facility-9", &label_context())
            .await;
        assert!(result.is_err());
        assert!(board.session(session).is_some());
    }

    #[tokio::test]
    async fn test_cancel_session_discards_state() {
        let board = board(MockGateway::new(false));
        let session = board.open_dispense_session(vec![row("rx-1")]);
        board.cancel_session(session);
        assert!(board.session(session).is_none());
    }

    #[tokio::test]
    async fn test_submit_pause_roundtrip() {
        let gateway = MockGateway::new(false);
        let board = board(gateway.clone());
        let rx = prescription("rx-1");
        let input = PauseInput {
            duration: 2,
            unit: PauseTimeUnit::Days,
            notes: None,
        };

        let outcome = board.submit_pause(&rx, None, &input).await.unwrap();
        let record = match outcome {
            PauseSubmission::Completed { pause } => pause,
            PauseSubmission::Blocked { error } => panic!("pause blocked: {error}"),
        };
        assert_eq!(record.pause_start_date, noon());

        // Pausing again while the first pause is active is rejected.
        let outcome = board.submit_pause(&rx, Some(&record), &input).await.unwrap();
        assert!(matches!(
            outcome,
            PauseSubmission::Blocked {
                error: PauseError::AlreadyPaused
            }
        ));
        assert_eq!(gateway.pauses.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_resume_is_idempotent() {
        let gateway = MockGateway::new(false);
        let board = board(gateway.clone());
        let rx = prescription("rx-1");
        let input = PauseInput {
            duration: 1,
            unit: PauseTimeUnit::Hours,
            notes: None,
        };

        let record = match board.submit_pause(&rx, None, &input).await.unwrap() {
            PauseSubmission::Completed { pause } => pause,
            PauseSubmission::Blocked { error } => panic!("pause blocked: {error}"),
        };

        assert!(board.submit_resume("rx-1", Some(&record)).await.unwrap());
        assert!(!board.submit_resume("rx-1", None).await.unwrap());
        assert_eq!(gateway.resumes.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mar_row_through_board() {
        let board = board(MockGateway::new(false));
        let record = AdministrationRecord {
            id: "mar-1".to_string(),
            prescription_id: "rx-1".to_string(),
            due_at: noon(),
            status: "Due".to_string(),
        };

        let row = board.mar_row(&[record]);
        assert_eq!(row.windows[6].as_ref().unwrap().id, "mar-1");
        assert!(row.displaced.is_empty());
    }
}
