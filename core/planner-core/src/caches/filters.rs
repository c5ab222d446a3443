//! Server-side course filtering.
//!
//! The server owns the active tag set; the client only asks it to add,
//! remove or clear tags. After a successful change both the filtered course
//! list and the active tags are refetched concurrently. A failed refetch is
//! recorded in the status slot; the change itself still reports success,
//! since the server has already applied it.

use std::collections::BTreeMap;
use std::sync::Arc;

use planner_protocol::{
    ActiveTagsResponse, AlternativesResponse, Empty, Endpoint, FilteredCourse,
    FilteredCoursesResponse, SuccessResponse, SuggestAlternativesRequest, SuggestionVariant, Tag,
    TagRequest,
};

use super::{apply_enveloped_fetch, decode_enveloped, ResourceList};
use crate::error::Result;
use crate::session::SessionManager;
use crate::status::OperationStatus;
use crate::transport::ApiClient;

pub struct FilterCache {
    api: ApiClient,
    session: Arc<SessionManager>,
    filtered: ResourceList<FilteredCourse>,
    tags: ResourceList<Tag>,
    status: OperationStatus,
}

impl FilterCache {
    pub fn new(api: ApiClient, session: Arc<SessionManager>) -> Self {
        Self {
            api,
            session,
            filtered: ResourceList::new(),
            tags: ResourceList::new(),
            status: OperationStatus::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────

    pub fn filtered_courses(&self) -> Vec<FilteredCourse> {
        self.filtered.snapshot()
    }

    pub fn active_tags(&self) -> Vec<Tag> {
        self.tags.snapshot()
    }

    pub fn filtered_course_count(&self) -> usize {
        self.filtered.len()
    }

    pub fn active_tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn courses_by_tag(&self, tag_id: &str) -> Vec<FilteredCourse> {
        self.filtered
            .filter(|course| course.tags.iter().any(|tag| tag.id == tag_id))
    }

    pub fn courses_by_category(&self, category: &str) -> Vec<FilteredCourse> {
        self.filtered
            .filter(|course| course.tags.iter().any(|tag| tag.category == category))
    }

    /// Filtered courses indexed by every tag they carry.
    pub fn grouped_by_tag(&self) -> BTreeMap<String, Vec<FilteredCourse>> {
        let mut groups: BTreeMap<String, Vec<FilteredCourse>> = BTreeMap::new();
        for course in self.filtered.snapshot() {
            for tag in &course.tags {
                groups.entry(tag.id.clone()).or_default().push(course.clone());
            }
        }
        groups
    }

    /// Distinct tags across the filtered courses, in first-seen order.
    pub fn available_tags(&self) -> Vec<Tag> {
        let mut seen: Vec<Tag> = Vec::new();
        for course in self.filtered.snapshot() {
            for tag in course.tags {
                if !seen.iter().any(|known| known.id == tag.id) {
                    seen.push(tag);
                }
            }
        }
        seen
    }

    /// Case-insensitive substring match on title, course code and professor.
    pub fn search(&self, query: &str) -> Vec<FilteredCourse> {
        let query = query.to_lowercase();
        self.filtered.filter(|course| {
            course.title.to_lowercase().contains(&query)
                || course.course_code.to_lowercase().contains(&query)
                || course.professor.to_lowercase().contains(&query)
        })
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

    // ─────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────

    pub async fn fetch_filtered_courses(&self) -> Result<()> {
        self.status
            .track("fetch filtered courses", self.load_filtered())
            .await
    }

    pub async fn fetch_active_tags(&self) -> Result<()> {
        self.status
            .track("fetch active tags", self.load_tags())
            .await
    }

    pub async fn add_tag(&self, tag_id: &str, category: &str) -> Result<SuccessResponse> {
        let request = TagRequest {
            id: tag_id.to_string(),
            category: category.to_string(),
        };
        self.status
            .track("add tag", self.change_tags(Endpoint::AddTag, &request))
            .await
    }

    pub async fn remove_tag(&self, tag_id: &str, category: &str) -> Result<SuccessResponse> {
        let request = TagRequest {
            id: tag_id.to_string(),
            category: category.to_string(),
        };
        self.status
            .track("remove tag", self.change_tags(Endpoint::RemoveTag, &request))
            .await
    }

    pub async fn clear_tags(&self) -> Result<SuccessResponse> {
        self.status
            .track("clear tags", self.change_tags(Endpoint::ClearTags, &Empty {}))
            .await
    }

    /// Asks the server for courses similar to `course`. Nothing is cached.
    pub async fn suggest_alternatives(
        &self,
        course: &FilteredCourse,
        variant: SuggestionVariant,
    ) -> Result<Vec<FilteredCourse>> {
        self.status
            .track("suggest alternatives", async {
                let request = SuggestAlternativesRequest {
                    course: course.clone(),
                    variant,
                };
                let value = self
                    .api
                    .call_value(&self.session.context(), Endpoint::SuggestAlternatives, &request)
                    .await?;
                decode_enveloped::<FilteredCourse, AlternativesResponse>(
                    Endpoint::SuggestAlternatives,
                    value,
                )
            })
            .await
    }

    async fn change_tags<Req>(&self, endpoint: Endpoint, request: &Req) -> Result<SuccessResponse>
    where
        Req: serde::Serialize + Sync,
    {
        let response: SuccessResponse = self
            .api
            .call(&self.session.context(), endpoint, request)
            .await?;
        if response.success {
            let (filtered, tags) = futures::join!(self.load_filtered(), self.load_tags());
            for refresh in [filtered, tags] {
                if let Err(err) = refresh {
                    tracing::warn!(error = %err, endpoint = %endpoint, "Refresh after tag change failed");
                    self.status.set_error(err.to_string());
                }
            }
        } else {
            tracing::debug!(endpoint = %endpoint, "Tag change not applied by server");
        }
        Ok(response)
    }

    async fn load_filtered(&self) -> Result<()> {
        let value = self
            .api
            .call_value(&self.session.context(), Endpoint::GetFilteredCourses, &Empty {})
            .await?;
        apply_enveloped_fetch::<_, FilteredCoursesResponse>(
            &self.filtered,
            &self.status,
            Endpoint::GetFilteredCourses,
            value,
        );
        Ok(())
    }

    async fn load_tags(&self) -> Result<()> {
        let value = self
            .api
            .call_value(&self.session.context(), Endpoint::GetActiveTags, &Empty {})
            .await?;
        apply_enveloped_fetch::<_, ActiveTagsResponse>(
            &self.tags,
            &self.status,
            Endpoint::GetActiveTags,
            value,
        );
        Ok(())
    }
}
