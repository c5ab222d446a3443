use std::collections::BTreeMap;
use std::sync::Arc;

use planner_protocol::{
    CreateSectionRequest, EditSectionRequest, Empty, Endpoint, GetSectionRequest, Section,
    SectionResponse, SectionUpdates,
};

use super::{apply_full_fetch, decode_list, ResourceList};
use crate::error::Result;
use crate::session::SessionManager;
use crate::status::OperationStatus;
use crate::transport::ApiClient;

pub struct SectionCache {
    api: ApiClient,
    session: Arc<SessionManager>,
    sections: ResourceList<Section>,
    status: OperationStatus,
}

impl SectionCache {
    pub fn new(api: ApiClient, session: Arc<SessionManager>) -> Self {
        Self {
            api,
            session,
            sections: ResourceList::new(),
            status: OperationStatus::new(),
        }
    }

    pub fn sections(&self) -> Vec<Section> {
        self.sections.snapshot()
    }

    pub fn get(&self, section_id: &str) -> Option<Section> {
        self.sections.get(section_id)
    }

    pub fn count(&self) -> usize {
        self.sections.len()
    }

    pub fn by_course(&self, course_id: &str) -> Vec<Section> {
        self.sections
            .filter(|section| section.course_id == course_id)
    }

    pub fn grouped_by_course(&self) -> BTreeMap<String, Vec<Section>> {
        let mut groups: BTreeMap<String, Vec<Section>> = BTreeMap::new();
        for section in self.sections.snapshot() {
            groups
                .entry(section.course_id.clone())
                .or_default()
                .push(section);
        }
        groups
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

    pub async fn fetch_all(&self) -> Result<()> {
        self.status
            .track("fetch sections", async {
                let value = self
                    .api
                    .call_value(&self.session.context(), Endpoint::GetAllSections, &Empty {})
                    .await?;
                apply_full_fetch(&self.sections, &self.status, Endpoint::GetAllSections, value);
                Ok(())
            })
            .await
    }

    /// Looks a section up remotely without caching it. The endpoint answers
    /// with a list; only its first element is used.
    pub async fn fetch_one(&self, section_id: &str) -> Result<Option<Section>> {
        self.status
            .track("fetch section", async {
                let request = GetSectionRequest {
                    section_id: section_id.to_string(),
                };
                let value = self
                    .api
                    .call_value(&self.session.context(), Endpoint::GetSection, &request)
                    .await?;
                let sections: Vec<Section> = decode_list(Endpoint::GetSection, value)?;
                Ok(sections.into_iter().next())
            })
            .await
    }

    pub async fn create(&self, request: &CreateSectionRequest) -> Result<Section> {
        self.status
            .track("create section", async {
                let response: SectionResponse = self
                    .api
                    .call(&self.session.context(), Endpoint::CreateSection, request)
                    .await?;
                self.sections.upsert(response.s.clone());
                Ok(response.s)
            })
            .await
    }

    /// Applies `updates` remotely; a cached copy is replaced in place, an
    /// uncached section stays uncached.
    pub async fn edit(&self, section_id: &str, updates: SectionUpdates) -> Result<Section> {
        self.status
            .track("edit section", async {
                let request = EditSectionRequest {
                    section_id: section_id.to_string(),
                    updates,
                };
                let response: SectionResponse = self
                    .api
                    .call(&self.session.context(), Endpoint::EditSection, &request)
                    .await?;
                let edited = response.s;
                self.sections
                    .update(section_id, |cached| *cached = edited.clone());
                Ok(edited)
            })
            .await
    }
}
