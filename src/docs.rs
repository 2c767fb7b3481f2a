use crate::api::{
    asset::{AssignAsset, CreateAsset, ReturnAsset, UpdateAsset},
    assignment::{AssignResult, AssignTags},
    attendance::ManualAttendance,
    attendance_record::{CreateRecord, UpdateRecord},
    breaks::{BreakSummary, StartBreak},
    employee::{CreateEmployee, UpdateEmployee},
    flowace::{ManualMatch, ReconcileRequest},
    issue::{CreateIssue, UpdateIssueStatus},
    tag::{CreateTag, UpdateTag},
    warning::CreateWarning,
    work_log::{LogEntry, SubmitLogs, UpdateLog},
};
use crate::error::FieldError;
use crate::model::{
    asset::{Asset, AssetAssignment, AssetStatus, ReturnCondition},
    assignment::Assignment,
    attendance::{Attendance, AttendanceStatus},
    attendance_record::{AttendanceRecord, RecordSource},
    breaks::{Break, BreakType},
    dashboard::{DashboardSummary, LastUpload, MyDashboard, StatusCount},
    employee::Employee,
    flowace::{FlowaceRecord, MatchMethod},
    issue::{Issue, IssueCategory, IssuePriority, IssueStatus},
    tag::Tag,
    upload::{FileType, UploadHistory, UploadStatus},
    warning::{Warning, WarningSeverity},
    work_log::{WorkLog, WorkLogSummary},
};
use crate::service::{
    SkippedLine,
    import::{FlowaceImportSummary, ImportSummary},
    reconcile::ReconcileSummary,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Employee Tracker API",
        version = "1.0.0",
        description = r#"
## Employee Tracker

Day-to-day tracking of employees: attendance, breaks, work logs, issues,
warnings and company assets.

### Key features
- **Attendance**: self check-in/check-out, plus SRP and CSV report imports
- **Flowace**: productivity imports matched to employees by name and folded into attendance
- **Work logs**: per-tag counts turned into minutes
- **Assets**: assignment and return with full history

### Security
Every endpoint needs a **JWT Bearer** token. HR and Admin see everyone;
employees see their own records.

### Response format
`{ "success", "data", "error", "message" }`, with `details` on validation errors.
"#,
    ),
    paths(
        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,
        crate::api::attendance::create_attendance,

        crate::api::attendance_record::list_records,
        crate::api::attendance_record::get_record,
        crate::api::attendance_record::create_record,
        crate::api::attendance_record::update_record,
        crate::api::attendance_record::delete_record,
        crate::api::attendance_record::upload_srp,
        crate::api::attendance_record::upload_csv,

        crate::api::breaks::start_break,
        crate::api::breaks::end_break,
        crate::api::breaks::list_breaks,
        crate::api::breaks::break_summary,

        crate::api::tag::create_tag,
        crate::api::tag::list_tags,
        crate::api::tag::get_tag,
        crate::api::tag::update_tag,
        crate::api::tag::delete_tag,

        crate::api::assignment::assign_tags,
        crate::api::assignment::list_assignments,
        crate::api::assignment::delete_assignment,

        crate::api::work_log::submit_logs,
        crate::api::work_log::list_logs,
        crate::api::work_log::update_log,
        crate::api::work_log::delete_log,
        crate::api::work_log::log_summary,

        crate::api::issue::create_issue,
        crate::api::issue::list_issues,
        crate::api::issue::get_issue,
        crate::api::issue::update_issue_status,

        crate::api::warning::create_warning,
        crate::api::warning::list_warnings,
        crate::api::warning::get_warning,
        crate::api::warning::dismiss_warning,

        crate::api::asset::create_asset,
        crate::api::asset::list_assets,
        crate::api::asset::get_asset,
        crate::api::asset::update_asset,
        crate::api::asset::delete_asset,
        crate::api::asset::assign_asset,
        crate::api::asset::return_asset,
        crate::api::asset::asset_history,
        crate::api::asset::list_asset_assignments,

        crate::api::flowace::upload_flowace,
        crate::api::flowace::list_flowace,
        crate::api::flowace::match_flowace,
        crate::api::flowace::reconcile_flowace,

        crate::api::upload::list_uploads,
        crate::api::upload::get_upload,

        crate::api::dashboard::summary,
        crate::api::dashboard::my_dashboard
    ),
    components(
        schemas(
            FieldError,
            Employee, CreateEmployee, UpdateEmployee,
            Attendance, AttendanceStatus, ManualAttendance,
            AttendanceRecord, RecordSource, CreateRecord, UpdateRecord,
            ImportSummary, FlowaceImportSummary, SkippedLine,
            Break, BreakType, StartBreak, BreakSummary,
            Tag, CreateTag, UpdateTag,
            Assignment, AssignTags, AssignResult,
            WorkLog, WorkLogSummary, LogEntry, SubmitLogs, UpdateLog,
            Issue, IssueStatus, IssuePriority, IssueCategory, CreateIssue, UpdateIssueStatus,
            Warning, WarningSeverity, CreateWarning,
            Asset, AssetStatus, AssetAssignment, ReturnCondition,
            CreateAsset, UpdateAsset, AssignAsset, ReturnAsset,
            FlowaceRecord, MatchMethod, ManualMatch, ReconcileRequest, ReconcileSummary,
            UploadHistory, FileType, UploadStatus,
            DashboardSummary, StatusCount, LastUpload, MyDashboard
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Employees", description = "Employee directory"),
        (name = "Attendance", description = "Self check-in and check-out"),
        (name = "Attendance Records", description = "Imported and manual daily attendance"),
        (name = "Breaks", description = "Break tracking"),
        (name = "Tags", description = "Work categories with expected minutes"),
        (name = "Assignments", description = "Tags assigned to employees"),
        (name = "Work Logs", description = "Daily per-tag work counts"),
        (name = "Issues", description = "Employee-raised issues"),
        (name = "Warnings", description = "Warnings issued by HR"),
        (name = "Assets", description = "Company assets and their assignments"),
        (name = "Flowace", description = "Productivity imports and reconciliation"),
        (name = "Uploads", description = "Import history"),
        (name = "Dashboard", description = "Summaries"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
