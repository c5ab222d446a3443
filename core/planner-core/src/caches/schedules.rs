//! Schedules owned by the signed-in user.
//!
//! Create and duplicate responses carry the server's `owner` id; it is
//! published on the identity bus before the schedule is cached, so the
//! identity is already corrected by the time a caller sees the new entry.

use std::sync::Arc;

use planner_protocol::{
    CreateScheduleRequest, DeleteScheduleRequest, DuplicateScheduleRequest, Endpoint, Empty,
    Schedule, ScheduleResponse, ScheduleSectionRequest,
};

use super::{apply_full_fetch, ResourceList};
use crate::error::{PlannerError, Result};
use crate::events::IdentityEvents;
use crate::identity::IdentityManager;
use crate::session::SessionManager;
use crate::status::OperationStatus;
use crate::transport::ApiClient;

pub struct ScheduleCache {
    api: ApiClient,
    session: Arc<SessionManager>,
    identity: Arc<IdentityManager>,
    events: Arc<IdentityEvents>,
    schedules: ResourceList<Schedule>,
    status: OperationStatus,
}

impl ScheduleCache {
    pub fn new(
        api: ApiClient,
        session: Arc<SessionManager>,
        identity: Arc<IdentityManager>,
        events: Arc<IdentityEvents>,
    ) -> Self {
        Self {
            api,
            session,
            identity,
            events,
            schedules: ResourceList::new(),
            status: OperationStatus::new(),
        }
    }

    pub fn schedules(&self) -> Vec<Schedule> {
        self.schedules.snapshot()
    }

    pub fn get(&self, schedule_id: &str) -> Option<Schedule> {
        self.schedules.get(schedule_id)
    }

    pub fn count(&self) -> usize {
        self.schedules.len()
    }

    /// Schedules owned by whoever the identity says is signed in right now.
    pub fn user_schedules(&self) -> Vec<Schedule> {
        let Some(user_id) = self.identity.current_user_id() else {
            return Vec::new();
        };
        self.schedules.filter(|schedule| schedule.owner == user_id)
    }

    pub fn status(&self) -> &OperationStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.status.last_error()
    }

    pub fn clear_error(&self) {
        self.status.clear_error();
    }

    fn user_id(&self) -> Result<String> {
        self.identity
            .current_user_id()
            .ok_or(PlannerError::NotAuthenticated)
    }

    pub async fn fetch_all(&self) -> Result<()> {
        self.status
            .track("fetch schedules", async {
                let value = self
                    .api
                    .call_value(&self.session.context(), Endpoint::GetAllSchedules, &Empty {})
                    .await?;
                apply_full_fetch(&self.schedules, &self.status, Endpoint::GetAllSchedules, value);
                Ok(())
            })
            .await
    }

    pub async fn create(&self, name: &str) -> Result<Schedule> {
        self.status
            .track("create schedule", async {
                let request = CreateScheduleRequest {
                    user_id: self.user_id()?,
                    name: name.to_string(),
                };
                let response: ScheduleResponse = self
                    .api
                    .call(&self.session.context(), Endpoint::CreateSchedule, &request)
                    .await?;
                Ok(self.install(response.s))
            })
            .await
    }

    pub async fn duplicate(&self, source_schedule_id: &str, new_name: &str) -> Result<Schedule> {
        self.status
            .track("duplicate schedule", async {
                let request = DuplicateScheduleRequest {
                    user_id: self.user_id()?,
                    source_schedule_id: source_schedule_id.to_string(),
                    new_name: new_name.to_string(),
                };
                let response: ScheduleResponse = self
                    .api
                    .call(&self.session.context(), Endpoint::DuplicateSchedule, &request)
                    .await?;
                Ok(self.install(response.s))
            })
            .await
    }

    fn install(&self, schedule: Schedule) -> Schedule {
        self.events.owner_observed(&schedule.owner);
        tracing::info!(schedule_id = %schedule.id, owner = %schedule.owner, "Schedule cached");
        self.schedules.upsert(schedule.clone());
        schedule
    }

    pub async fn delete(&self, schedule_id: &str) -> Result<()> {
        self.status
            .track("delete schedule", async {
                let request = DeleteScheduleRequest {
                    user_id: self.user_id()?,
                    schedule_id: schedule_id.to_string(),
                };
                self.api
                    .call_ack(&self.session.context(), Endpoint::DeleteSchedule, &request)
                    .await?;
                self.schedules.remove(schedule_id);
                Ok(())
            })
            .await
    }

    pub async fn add_section(&self, schedule_id: &str, section_id: &str) -> Result<()> {
        self.status
            .track("add section to schedule", async {
                let request = self.link_request(schedule_id, section_id)?;
                self.api
                    .call_ack(&self.session.context(), Endpoint::AddSection, &request)
                    .await?;
                self.schedules.update(schedule_id, |schedule| {
                    if !schedule.section_ids.iter().any(|id| id == section_id) {
                        schedule.section_ids.push(section_id.to_string());
                    }
                });
                Ok(())
            })
            .await
    }

    pub async fn remove_section(&self, schedule_id: &str, section_id: &str) -> Result<()> {
        self.status
            .track("remove section from schedule", async {
                let request = self.link_request(schedule_id, section_id)?;
                self.api
                    .call_ack(&self.session.context(), Endpoint::RemoveSection, &request)
                    .await?;
                self.schedules.update(schedule_id, |schedule| {
                    schedule.section_ids.retain(|id| id != section_id);
                });
                Ok(())
            })
            .await
    }

    fn link_request(&self, schedule_id: &str, section_id: &str) -> Result<ScheduleSectionRequest> {
        Ok(ScheduleSectionRequest {
            user_id: self.user_id()?,
            schedule_id: schedule_id.to_string(),
            section_id: section_id.to_string(),
        })
    }
}
