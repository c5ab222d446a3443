//! Subcommand handlers. Each prints its result as JSON on stdout.

use planner_core::{GuardDecision, PlannerClient, RouteAccess};
use planner_protocol::{
    AuthenticateRequest, ConfirmRequest, CreateCourseRequest, CreateSectionRequest,
    RegisterRequest, SectionUpdates, TimeSlot,
};
use serde::Serialize;
use serde_json::json;

use crate::{
    Commands, CourseCommand, FilterCommand, ScheduleCommand, SectionCommand, SessionCommand,
};

pub async fn dispatch(client: &PlannerClient, command: Commands) -> Result<(), String> {
    match command {
        Commands::Register {
            username,
            password,
            email,
        } => {
            if !admit(client, RouteAccess::RequiresGuest)? {
                return Ok(());
            }
            let request = RegisterRequest {
                username,
                password,
                email,
            };
            let response = client.identity().register(&request).await?;
            print_json(&json!({"user": response.user}))
        }
        Commands::Login { username, password } => {
            if !admit(client, RouteAccess::RequiresGuest)? {
                return Ok(());
            }
            let request = AuthenticateRequest { username, password };
            let response = client.identity().authenticate(&request).await?;
            print_json(&json!({"session": response.session}))
        }
        Commands::Confirm { username, token } => {
            let request = ConfirmRequest { username, token };
            let confirmed = client.identity().confirm_email(&request).await?;
            print_json(&json!({"confirmed": confirmed}))
        }
        Commands::Logout => {
            // The identity is forgotten even if the server call fails.
            client.sign_out().await?;
            print_json(&json!({"signedOut": true}))
        }
        Commands::Whoami => whoami(client),
        Commands::Session(command) => session(client, command).await,
        Commands::Courses(command) => courses(client, command).await,
        Commands::Sections(command) => sections(client, command).await,
        Commands::Schedules(command) => {
            if !admit(client, RouteAccess::RequiresAuth)? {
                return Ok(());
            }
            schedules(client, command).await
        }
        Commands::Filters(command) => filters(client, command).await,
    }
}

/// Runs the navigation guard for a command. Guest-only commands are skipped
/// (Ok(false)) when already signed in; auth-only commands fail.
fn admit(client: &PlannerClient, access: RouteAccess) -> Result<bool, String> {
    match client.navigate(access) {
        GuardDecision::Allow => Ok(true),
        GuardDecision::Redirect(_) if access == RouteAccess::RequiresGuest => {
            let user = client.identity().current_user();
            tracing::info!("Already signed in, nothing to do");
            print_json(&json!({"alreadySignedIn": user}))?;
            Ok(false)
        }
        GuardDecision::Redirect(path) => Err(format!(
            "Not signed in; run `planner login` first (redirect to {})",
            path
        )),
    }
}

fn whoami(client: &PlannerClient) -> Result<(), String> {
    let session = client.session();
    print_json(&json!({
        "authenticated": client.is_authenticated(),
        "user": client.identity().current_user(),
        "sessionId": session.session_id(),
        "sessionState": format!("{:?}", session.state()),
        "session": session.current_session(),
    }))
}

async fn session(client: &PlannerClient, command: SessionCommand) -> Result<(), String> {
    let session = client.session();
    match command {
        SessionCommand::Probe => {
            let valid = session.probe().await;
            print_json(&json!({"valid": valid}))
        }
        SessionCommand::Extend => {
            let rotated = session.extend().await?;
            print_json(&json!({"session": rotated}))
        }
        SessionCommand::End => {
            session.end().await?;
            print_json(&json!({"ended": true}))
        }
        SessionCommand::ExpireAll => {
            let success = session.expire_all().await?;
            print_json(&json!({"success": success}))
        }
    }
}

async fn courses(client: &PlannerClient, command: CourseCommand) -> Result<(), String> {
    let cache = client.courses();
    match command {
        CourseCommand::List {
            department,
            grouped,
        } => {
            cache.fetch_all().await?;
            warn_on_stale(cache.last_error());
            if grouped {
                return print_json(&cache.grouped_by_department());
            }
            match department {
                Some(department) => print_json(&cache.by_department(&department)),
                None => print_json(&cache.courses()),
            }
        }
        CourseCommand::Show { id } => {
            let course = cache
                .fetch_one(&id)
                .await?
                .ok_or_else(|| format!("Course not found: {}", id))?;
            print_json(&course)
        }
        CourseCommand::Create {
            id,
            title,
            department,
        } => {
            let request = CreateCourseRequest {
                id,
                title,
                department,
            };
            print_json(&cache.create(&request).await?)
        }
    }
}

async fn sections(client: &PlannerClient, command: SectionCommand) -> Result<(), String> {
    let cache = client.sections();
    match command {
        SectionCommand::List { course, grouped } => {
            cache.fetch_all().await?;
            warn_on_stale(cache.last_error());
            if grouped {
                return print_json(&cache.grouped_by_course());
            }
            match course {
                Some(course) => print_json(&cache.by_course(&course)),
                None => print_json(&cache.sections()),
            }
        }
        SectionCommand::Show { id } => {
            let section = cache
                .fetch_one(&id)
                .await?
                .ok_or_else(|| format!("Section not found: {}", id))?;
            print_json(&section)
        }
        SectionCommand::Create {
            course,
            number,
            instructor,
            capacity,
            time_slots,
            distribution,
        } => {
            let request = CreateSectionRequest {
                course_id: course,
                section_number: number,
                instructor,
                capacity,
                time_slots: parse_time_slots(&time_slots)?,
                distribution,
            };
            print_json(&cache.create(&request).await?)
        }
        SectionCommand::Edit {
            id,
            number,
            instructor,
            capacity,
            time_slots,
            distribution,
        } => {
            let updates = SectionUpdates {
                section_number: number,
                instructor,
                capacity,
                time_slots: time_slots.as_deref().map(parse_time_slots).transpose()?,
                distribution,
            };
            if updates.is_empty() {
                return Err("Nothing to update; pass at least one field".to_string());
            }
            print_json(&cache.edit(&id, updates).await?)
        }
    }
}

async fn schedules(client: &PlannerClient, command: ScheduleCommand) -> Result<(), String> {
    let cache = client.schedules();
    match command {
        ScheduleCommand::List => {
            cache.fetch_all().await?;
            warn_on_stale(cache.last_error());
            print_json(&cache.schedules())
        }
        ScheduleCommand::Mine => {
            cache.fetch_all().await?;
            warn_on_stale(cache.last_error());
            print_json(&cache.user_schedules())
        }
        ScheduleCommand::Create { name } => print_json(&cache.create(&name).await?),
        ScheduleCommand::Delete { id } => {
            cache.delete(&id).await?;
            print_json(&json!({"deleted": id}))
        }
        ScheduleCommand::Duplicate { id, new_name } => {
            print_json(&cache.duplicate(&id, &new_name).await?)
        }
        ScheduleCommand::AddSection { schedule, section } => {
            cache.add_section(&schedule, &section).await?;
            print_json(&json!({"schedule": schedule, "added": section}))
        }
        ScheduleCommand::RemoveSection { schedule, section } => {
            cache.remove_section(&schedule, &section).await?;
            print_json(&json!({"schedule": schedule, "removed": section}))
        }
    }
}

async fn filters(client: &PlannerClient, command: FilterCommand) -> Result<(), String> {
    let cache = client.filters();
    match command {
        FilterCommand::Courses { tag, category } => {
            cache.fetch_filtered_courses().await?;
            warn_on_stale(cache.last_error());
            match (tag, category) {
                (Some(tag), _) => print_json(&cache.courses_by_tag(&tag)),
                (None, Some(category)) => print_json(&cache.courses_by_category(&category)),
                (None, None) => print_json(&cache.filtered_courses()),
            }
        }
        FilterCommand::Tags { available } => {
            if available {
                cache.fetch_filtered_courses().await?;
                warn_on_stale(cache.last_error());
                return print_json(&cache.available_tags());
            }
            cache.fetch_active_tags().await?;
            warn_on_stale(cache.last_error());
            print_json(&cache.active_tags())
        }
        FilterCommand::AddTag { id, category } => {
            let response = cache.add_tag(&id, &category).await?;
            warn_on_stale(cache.last_error());
            print_json(&json!({"success": response.success, "activeTags": cache.active_tags()}))
        }
        FilterCommand::RemoveTag { id, category } => {
            let response = cache.remove_tag(&id, &category).await?;
            warn_on_stale(cache.last_error());
            print_json(&json!({"success": response.success, "activeTags": cache.active_tags()}))
        }
        FilterCommand::Clear => {
            let response = cache.clear_tags().await?;
            warn_on_stale(cache.last_error());
            print_json(&json!({"success": response.success}))
        }
        FilterCommand::Search { query } => {
            cache.fetch_filtered_courses().await?;
            warn_on_stale(cache.last_error());
            print_json(&cache.search(&query))
        }
        FilterCommand::Suggest { key, variant } => {
            cache.fetch_filtered_courses().await?;
            let course = cache
                .filtered_courses()
                .into_iter()
                .find(|course| course.key() == key)
                .ok_or_else(|| format!("No filtered course with key {}", key))?;
            print_json(&cache.suggest_alternatives(&course, variant).await?)
        }
    }
}

fn parse_time_slots(raw: &str) -> Result<Vec<TimeSlot>, String> {
    serde_json::from_str(raw).map_err(|e| format!("Invalid --time-slots JSON: {}", e))
}

/// A fetch that degraded to an empty list still succeeds; say so on stderr.
fn warn_on_stale(last_error: Option<String>) {
    if let Some(error) = last_error {
        tracing::warn!(error = %error, "Server returned an unexpected list; showing nothing");
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to render output: {}", e))?;
    println!("{}", rendered);
    Ok(())
}
