use std::collections::BTreeMap;
use std::sync::Arc;

use planner_protocol::{
    Course, CreateCourseRequest, CreateCourseResponse, Empty, Endpoint, GetCourseRequest,
};

use super::{apply_full_fetch, decode_list, ResourceList};
use crate::error::Result;
use crate::session::SessionManager;
use crate::status::OperationStatus;
use crate::transport::ApiClient;

pub struct CourseCache {
    api: ApiClient,
    session: Arc<SessionManager>,
    courses: ResourceList<Course>,
    status: OperationStatus,
}

impl CourseCache {
    pub fn new(api: ApiClient, session: Arc<SessionManager>) -> Self {
        Self {
            api,
            session,
            courses: ResourceList::new(),
            status: OperationStatus::new(),
        }
    }

    pub fn courses(&self) -> Vec<Course> {
        self.courses.snapshot()
    }

    pub fn get(&self, course_id: &str) -> Option<Course> {
        self.courses.get(course_id)
    }

    pub fn count(&self) -> usize {
        self.courses.len()
    }

    pub fn by_department(&self, department: &str) -> Vec<Course> {
        self.courses
            .filter(|course| course.department == department)
    }

    pub fn grouped_by_department(&self) -> BTreeMap<String, Vec<Course>> {
        let mut groups: BTreeMap<String, Vec<Course>> = BTreeMap::new();
        for course in self.courses.snapshot() {
            groups
                .entry(course.department.clone())
                .or_default()
                .push(course);
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
            .track("fetch courses", async {
                let value = self
                    .api
                    .call_value(&self.session.context(), Endpoint::GetAllCourses, &Empty {})
                    .await?;
                apply_full_fetch(&self.courses, &self.status, Endpoint::GetAllCourses, value);
                Ok(())
            })
            .await
    }

    /// Remote lookup; the result is not cached. Like `getSection`, the
    /// endpoint answers with a list.
    pub async fn fetch_one(&self, course_id: &str) -> Result<Option<Course>> {
        self.status
            .track("fetch course", async {
                let request = GetCourseRequest {
                    course_id: course_id.to_string(),
                };
                let value = self
                    .api
                    .call_value(&self.session.context(), Endpoint::GetCourse, &request)
                    .await?;
                let courses: Vec<Course> = decode_list(Endpoint::GetCourse, value)?;
                Ok(courses.into_iter().next())
            })
            .await
    }

    pub async fn create(&self, request: &CreateCourseRequest) -> Result<Course> {
        self.status
            .track("create course", async {
                let response: CreateCourseResponse = self
                    .api
                    .call(&self.session.context(), Endpoint::CreateCourse, request)
                    .await?;
                self.courses.upsert(response.c.clone());
                Ok(response.c)
            })
            .await
    }
}
