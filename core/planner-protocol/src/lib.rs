//! Wire types for the course planner API.
//!
//! This crate is shared by every client to prevent schema drift. The server
//! remains the authority on validation; clients reuse the same types to build
//! requests and to decode responses.
//!
//! Field names follow the server's JSON exactly (a mix of camelCase,
//! snake_case and Mongo-style `_id`), so most structs carry explicit renames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

// ═══════════════════════════════════════════════════════════════════════════════
// Endpoints
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    CourseScheduling,
    CourseFiltering,
    UserAuth,
    Session,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::CourseScheduling => "CourseScheduling",
            Service::CourseFiltering => "CourseFiltering",
            Service::UserAuth => "UserAuth",
            Service::Session => "Session",
        }
    }
}

/// Every remote action the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    // CourseScheduling
    CreateCourse,
    GetCourse,
    GetAllCourses,
    CreateSection,
    GetSection,
    GetAllSections,
    EditSection,
    CreateSchedule,
    GetAllSchedules,
    DeleteSchedule,
    DuplicateSchedule,
    AddSection,
    RemoveSection,
    // CourseFiltering
    AddTag,
    RemoveTag,
    ClearTags,
    GetFilteredCourses,
    GetActiveTags,
    SuggestAlternatives,
    // UserAuth
    Register,
    Authenticate,
    Confirm,
    // Session
    StartSession,
    EndSession,
    UseSession,
    ExtendSession,
    ExpireSessions,
}

impl Endpoint {
    pub fn service(&self) -> Service {
        use Endpoint::*;
        match self {
            CreateCourse | GetCourse | GetAllCourses | CreateSection | GetSection
            | GetAllSections | EditSection | CreateSchedule | GetAllSchedules
            | DeleteSchedule | DuplicateSchedule | AddSection | RemoveSection => {
                Service::CourseScheduling
            }
            AddTag | RemoveTag | ClearTags | GetFilteredCourses | GetActiveTags
            | SuggestAlternatives => Service::CourseFiltering,
            Register | Authenticate | Confirm => Service::UserAuth,
            StartSession | EndSession | UseSession | ExtendSession | ExpireSessions => {
                Service::Session
            }
        }
    }

    pub fn action(&self) -> &'static str {
        use Endpoint::*;
        match self {
            CreateCourse => "createCourse",
            GetCourse => "getCourse",
            GetAllCourses => "getAllCourses",
            CreateSection => "createSection",
            GetSection => "getSection",
            GetAllSections => "getAllSections",
            EditSection => "editSection",
            CreateSchedule => "createSchedule",
            GetAllSchedules => "getAllSchedules",
            DeleteSchedule => "deleteSchedule",
            DuplicateSchedule => "duplicateSchedule",
            AddSection => "addSection",
            RemoveSection => "removeSection",
            AddTag => "addTag",
            RemoveTag => "removeTag",
            ClearTags => "clearTags",
            GetFilteredCourses => "getFilteredCourses",
            GetActiveTags => "getActiveTags",
            SuggestAlternatives => "suggestAlternatives",
            Register => "register",
            Authenticate => "authenticate",
            Confirm => "confirm",
            StartSession => "startSession",
            EndSession => "endSession",
            UseSession => "useSession",
            ExtendSession => "extendSession",
            ExpireSessions => "expireSessions",
        }
    }

    /// Path relative to the API base URL, e.g. `Session/useSession`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.service().as_str(), self.action())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Returns the application error carried by a response body, if any.
///
/// Any JSON object with an `error` key is a failure regardless of the HTTP
/// status it arrived with.
pub fn error_message(body: &Value) -> Option<String> {
    let error = body.as_object()?.get("error")?;
    Some(match error {
        Value::String(message) => message.clone(),
        Value::Null => "Unknown error".to_string(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Entities
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub days: Vec<String>,
    /// `HH:mm`
    pub start_time: String,
    /// `HH:mm`
    pub end_time: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub course_id: String,
    pub section_number: String,
    pub instructor: String,
    pub capacity: u32,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub section_ids: Vec<String>,
    pub owner: String,
}

/// Filter tag. Tags have no server id; `id` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredCourse {
    pub course_code: String,
    pub section: String,
    pub title: String,
    pub professor: String,
    pub meeting_time: String,
    pub current_enrollment: u32,
    pub seats_available: i64,
    pub seats_total: u32,
    pub distribution: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl FilteredCourse {
    /// Course code plus section number; unique within a filtered listing.
    pub fn key(&self) -> String {
        format!("{}-{}", self.course_code, self.section)
    }
}

/// Locally cached identity. `id` is provisional until an owned resource
/// reveals the server's canonical user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub confirmed: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CourseScheduling requests / responses
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    pub id: String,
    pub title: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCourseResponse {
    pub c: Course,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCourseRequest {
    pub course_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSectionRequest {
    pub course_id: String,
    pub section_number: String,
    pub instructor: String,
    pub capacity: u32,
    pub time_slots: Vec<TimeSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
}

/// Shared by createSection, editSection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionResponse {
    pub s: Section,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSectionRequest {
    pub section_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionUpdates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slots: Option<Vec<TimeSlot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
}

impl SectionUpdates {
    pub fn is_empty(&self) -> bool {
        *self == SectionUpdates::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSectionRequest {
    pub section_id: String,
    pub updates: SectionUpdates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub user_id: String,
    pub name: String,
}

/// Shared by createSchedule, duplicateSchedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub s: Schedule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteScheduleRequest {
    pub user_id: String,
    pub schedule_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateScheduleRequest {
    pub user_id: String,
    pub source_schedule_id: String,
    pub new_name: String,
}

/// Shared by addSection, removeSection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSectionRequest {
    pub user_id: String,
    pub schedule_id: String,
    pub section_id: String,
}

/// Body-less acknowledgement (`{}`); unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

// ═══════════════════════════════════════════════════════════════════════════════
// CourseFiltering requests / responses
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared by addTag, removeTag.
pub type TagRequest = Tag;

/// Shared by addTag, removeTag, clearTags, endSession, useSession,
/// expireSessions, confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// `getFilteredCourses` wraps its list as `{courses: [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredCoursesResponse {
    pub courses: Vec<FilteredCourse>,
}

impl From<FilteredCoursesResponse> for Vec<FilteredCourse> {
    fn from(response: FilteredCoursesResponse) -> Self {
        response.courses
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTagsResponse {
    pub tags: Vec<Tag>,
}

impl From<ActiveTagsResponse> for Vec<Tag> {
    fn from(response: ActiveTagsResponse) -> Self {
        response.tags
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativesResponse {
    pub alternatives: Vec<FilteredCourse>,
}

impl From<AlternativesResponse> for Vec<FilteredCourse> {
    fn from(response: AlternativesResponse) -> Self {
        response.alternatives
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionVariant {
    #[default]
    Base,
    TimeFocused,
    TopicFocused,
}

impl std::str::FromStr for SuggestionVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(SuggestionVariant::Base),
            "timeFocused" | "time-focused" => Ok(SuggestionVariant::TimeFocused),
            "topicFocused" | "topic-focused" => Ok(SuggestionVariant::TopicFocused),
            other => Err(format!("unknown suggestion variant: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestAlternativesRequest {
    pub course: FilteredCourse,
    pub variant: SuggestionVariant,
}

// ═══════════════════════════════════════════════════════════════════════════════
// UserAuth requests / responses
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub username: String,
    pub password: String,
}

/// The authenticate endpoint returns a session identifier, never a user id.
/// Older servers label the same value `user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    #[serde(alias = "user")]
    pub session: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub username: String,
    pub token: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session requests / responses
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub u: String,
}

/// Shared by endSession, useSession, extendSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdRequest {
    pub s: String,
}

/// Shared by startSession, extendSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_paths_join_service_and_action() {
        assert_eq!(Endpoint::UseSession.path(), "Session/useSession");
        assert_eq!(
            Endpoint::GetAllSchedules.path(),
            "CourseScheduling/getAllSchedules"
        );
        assert_eq!(Endpoint::Authenticate.path(), "UserAuth/authenticate");
        assert_eq!(Endpoint::ClearTags.path(), "CourseFiltering/clearTags");
    }

    #[test]
    fn error_field_marks_failure() {
        assert_eq!(
            error_message(&json!({"error": "User not found"})),
            Some("User not found".to_string())
        );
        assert_eq!(
            error_message(&json!({"error": {"code": 7}})),
            Some("{\"code\":7}".to_string())
        );
        assert_eq!(error_message(&json!({"success": true})), None);
        assert_eq!(error_message(&json!([{"error": "nested"}])), None);
    }

    #[test]
    fn user_snapshot_uses_mongo_id() {
        let snapshot: UserSnapshot = serde_json::from_value(json!({
            "_id": "user-42",
            "username": "alice",
            "email": "a@example.edu",
            "confirmed": true
        }))
        .unwrap();
        assert_eq!(snapshot.id, "user-42");

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["_id"], "user-42");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn authenticate_response_accepts_legacy_field() {
        let current: AuthenticateResponse =
            serde_json::from_value(json!({"session": "sess-1"})).unwrap();
        let legacy: AuthenticateResponse =
            serde_json::from_value(json!({"user": "sess-1"})).unwrap();
        assert_eq!(current, legacy);
    }

    #[test]
    fn schedule_decodes_camel_case() {
        let schedule: Schedule = serde_json::from_value(json!({
            "id": "sch-1",
            "name": "Fall",
            "sectionIds": ["sec-1"],
            "owner": "user-42"
        }))
        .unwrap();
        assert_eq!(schedule.section_ids, vec!["sec-1".to_string()]);
    }

    #[test]
    fn section_updates_skip_unset_fields() {
        let updates = SectionUpdates {
            instructor: Some("Dr. Smith".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&updates).unwrap(),
            json!({"instructor": "Dr. Smith"})
        );
        assert!(SectionUpdates::default().is_empty());
    }

    #[test]
    fn suggestion_variant_wire_names() {
        assert_eq!(
            serde_json::to_value(SuggestionVariant::TimeFocused).unwrap(),
            json!("timeFocused")
        );
        assert_eq!(
            "topic-focused".parse::<SuggestionVariant>(),
            Ok(SuggestionVariant::TopicFocused)
        );
        assert!("sideways".parse::<SuggestionVariant>().is_err());
    }
}
