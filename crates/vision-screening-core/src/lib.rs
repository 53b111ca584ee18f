//! Vision Screening Core Library
//!
//! Analytics core for school vision-screening programs: students move from
//! being indicated for screening through examination and diagnosis to
//! receiving glasses.
//!
//! # Architecture
//!
//! ```text
//!   Schools / Students / Exams / Flag tables (SQLite)
//!                        │
//!                 Snapshot (TTL cache)
//!                        │
//!        Filter: region → school → date range
//!                        │
//!        Critical classification + anchor exam per student
//!                        │
//!        Stage reconciliation (persisted flags + unsaved edits)
//!                        │
//!          ┌─────────────┼──────────────┐
//!          ▼             ▼              ▼
//!       Funnel /      Regional /     Overview
//!      conversion     ranking /        KPIs
//!                     series
//!                        │
//!        User edits ──► Flag Sync (versioned upsert) ──► Flag tables
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite storage for schools, students, exams and flags
//! - [`models`]: Domain types (School, Student, Exam, ScreeningRecord, etc.)
//! - [`screening`]: Filter, classifier, anchor selector, reconciler and pipeline
//! - [`metrics`]: Funnel, ratios, regional stack, ranking, time series, exports
//! - [`sync`]: Flag persistence and legacy flag migration
//! - [`cache`]: Snapshot TTL cache
//! - [`config`]: TOML configuration

pub mod cache;
pub mod config;
pub mod db;
pub mod metrics;
pub mod models;
pub mod screening;
pub mod sync;

// Re-export commonly used types
pub use cache::{SnapshotCache, SnapshotSource};
pub use config::ScreeningConfig;
pub use db::Database;
pub use metrics::{MetricsEngine, OverviewMetrics, ScreeningMetrics};
pub use models::{
    CriticalStatus, Exam, School, ScreeningRecord, Snapshot, Stage, StageFlags, StageOverride,
    Student, StudentKey,
};
pub use screening::{Dashboard, EditSession, FilterSelection, Pipeline};
pub use sync::{FlagMigrator, FlagSync, SyncReceipt};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use models::{Address, EyeMeasurements, NewExam, NewSchool, NewStudent};
use screening::DateRange;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ScreeningError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for ScreeningError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(_) => ScreeningError::NotFound(e.to_string()),
            db::DbError::Invalid(_) | db::DbError::Constraint(_) => {
                ScreeningError::InvalidInput(e.to_string())
            }
            db::DbError::Sqlite(_) => ScreeningError::DatabaseError(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ScreeningError {
    fn from(e: serde_json::Error) -> Self {
        ScreeningError::SerializationError(e.to_string())
    }
}

impl From<config::ConfigError> for ScreeningError {
    fn from(e: config::ConfigError) -> Self {
        ScreeningError::ConfigError(e.to_string())
    }
}

impl From<screening::PipelineError> for ScreeningError {
    fn from(e: screening::PipelineError) -> Self {
        match e {
            screening::PipelineError::UnknownStudent(_) => ScreeningError::NotFound(e.to_string()),
            screening::PipelineError::InvalidDateRange { .. } => {
                ScreeningError::InvalidInput(e.to_string())
            }
        }
    }
}

impl From<sync::SyncError> for ScreeningError {
    fn from(e: sync::SyncError) -> Self {
        match e {
            sync::SyncError::Database(inner) => inner.into(),
            sync::SyncError::Conflict { .. } => ScreeningError::Conflict(e.to_string()),
        }
    }
}

impl From<sync::MigrationError> for ScreeningError {
    fn from(e: sync::MigrationError) -> Self {
        match e {
            sync::MigrationError::Database(inner) => inner.into(),
            sync::MigrationError::Sync(inner) => inner.into(),
            sync::MigrationError::Ambiguous(_) => ScreeningError::Conflict(e.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for ScreeningError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ScreeningError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path. `config_toml` overrides the
/// default configuration.
#[uniffi::export]
pub fn open_database(
    path: String,
    config_toml: Option<String>,
) -> Result<Arc<ScreeningCore>, ScreeningError> {
    let config = match config_toml {
        Some(source) => ScreeningConfig::from_toml_str(&source)?,
        None => ScreeningConfig::default(),
    };
    let db = Database::open(&path)?;
    tracing::info!(path = %path, "screening database opened");
    Ok(Arc::new(ScreeningCore::new(db, config)))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ScreeningCore>, ScreeningError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(ScreeningCore::new(db, ScreeningConfig::default())))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Mutable state behind the API object.
struct CoreState {
    config: ScreeningConfig,
    cache: SnapshotCache,
    session: EditSession,
}

/// Thread-safe screening API for FFI. Locks are always taken db first,
/// then state.
#[derive(uniffi::Object)]
pub struct ScreeningCore {
    db: Arc<Mutex<Database>>,
    state: Mutex<CoreState>,
}

impl ScreeningCore {
    pub fn new(db: Database, config: ScreeningConfig) -> Self {
        let cache = SnapshotCache::new(config.cache_ttl());
        Self {
            db: Arc::new(Mutex::new(db)),
            state: Mutex::new(CoreState {
                config,
                cache,
                session: EditSession::new(),
            }),
        }
    }

    /// Run the pipeline for a host filter.
    fn run(&self, filter: &FfiFilter) -> Result<Dashboard, ScreeningError> {
        let db = self.db.lock()?;
        let mut state = self.state.lock()?;
        let snapshot = state.cache.get_or_load(&*db)?;
        let selection = filter.to_selection(&snapshot, &state.config.no_region_label)?;
        let overrides = state.session.overrides();
        Ok(Pipeline::new(&state.config).run(&snapshot, &selection, &overrides)?)
    }

    /// Pipeline over every region and date.
    fn run_everything(db: &Database, state: &mut CoreState) -> Result<Dashboard, ScreeningError> {
        let snapshot = state.cache.get_or_load(db)?;
        let selection = FilterSelection::all_regions(&snapshot, &state.config.no_region_label);
        let overrides = state.session.overrides();
        Ok(Pipeline::new(&state.config).run(&snapshot, &selection, &overrides)?)
    }

    fn invalidate(&self, db: &Database) -> Result<(), ScreeningError> {
        self.state.lock()?.cache.invalidate(db.source_key());
        Ok(())
    }
}

#[uniffi::export]
impl ScreeningCore {
    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a new school.
    pub fn register_school(&self, school: FfiNewSchool) -> Result<FfiSchool, ScreeningError> {
        let db = self.db.lock()?;
        let created = db.insert_school(&school.into())?;
        self.invalidate(&db)?;
        Ok(created.into())
    }

    /// Edit a school. Returns false when it does not exist.
    pub fn update_school(&self, school: FfiSchool) -> Result<bool, ScreeningError> {
        let db = self.db.lock()?;
        let updated = db.update_school(&school.into())?;
        self.invalidate(&db)?;
        Ok(updated)
    }

    /// Delete a school. Fails while students still reference it.
    pub fn delete_school(&self, school_id: i64) -> Result<bool, ScreeningError> {
        let db = self.db.lock()?;
        let deleted = db.delete_school(school_id)?;
        self.invalidate(&db)?;
        Ok(deleted)
    }

    pub fn list_schools(&self) -> Result<Vec<FfiSchool>, ScreeningError> {
        let db = self.db.lock()?;
        Ok(db.list_schools()?.into_iter().map(Into::into).collect())
    }

    /// Register a new student.
    pub fn register_student(&self, student: FfiNewStudent) -> Result<FfiStudent, ScreeningError> {
        let db = self.db.lock()?;
        let created = db.insert_student(&student.try_into()?)?;
        self.invalidate(&db)?;
        Ok(created.into())
    }

    /// Submit an exam.
    pub fn submit_exam(&self, exam: FfiNewExam) -> Result<FfiExamSummary, ScreeningError> {
        let db = self.db.lock()?;
        let created = db.insert_exam(&exam.try_into()?)?;
        self.invalidate(&db)?;
        Ok(created.into())
    }

    // =========================================================================
    // Filter Options
    // =========================================================================

    /// Region labels available for filtering.
    pub fn regions(&self) -> Result<Vec<String>, ScreeningError> {
        let db = self.db.lock()?;
        let mut state = self.state.lock()?;
        let snapshot = state.cache.get_or_load(&*db)?;
        Ok(snapshot.regions(&state.config.no_region_label))
    }

    /// School names available for filtering.
    pub fn school_names(&self) -> Result<Vec<String>, ScreeningError> {
        let db = self.db.lock()?;
        let mut state = self.state.lock()?;
        Ok(state.cache.get_or_load(&*db)?.school_names())
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// Compute the dashboard for a filter, unsaved edits included.
    pub fn dashboard(&self, filter: FfiFilter) -> Result<FfiDashboard, ScreeningError> {
        Ok(self.run(&filter)?.into())
    }

    /// Full dashboard (series and overview included) as JSON.
    pub fn dashboard_json(&self, filter: FfiFilter) -> Result<String, ScreeningError> {
        Ok(serde_json::to_string_pretty(&self.run(&filter)?)?)
    }

    /// Record-level metrics as JSON.
    pub fn export_metrics_json(&self, filter: FfiFilter) -> Result<String, ScreeningError> {
        Ok(self.run(&filter)?.metrics.to_json()?)
    }

    /// Screening records as CSV.
    pub fn export_records_csv(&self, filter: FfiFilter) -> Result<String, ScreeningError> {
        let dashboard = self.run(&filter)?;
        let state = self.state.lock()?;
        Ok(metrics::records_csv(&dashboard.records, &state.config.no_region_label))
    }

    /// Delivery-rate ranking as CSV.
    pub fn export_ranking_csv(&self, filter: FfiFilter) -> Result<String, ScreeningError> {
        Ok(metrics::ranking_csv(&self.run(&filter)?.metrics.ranking))
    }

    // =========================================================================
    // Stage Edits
    // =========================================================================

    /// Set one stage of a student. The edit stays pending until
    /// [`save_flags`](Self::save_flags).
    pub fn set_stage(
        &self,
        student_id: i64,
        stage: FfiStage,
        value: bool,
    ) -> Result<FfiStageFlags, ScreeningError> {
        let db = self.db.lock()?;
        let mut state = self.state.lock()?;
        let dashboard = Self::run_everything(&db, &mut state)?;
        let stages = state
            .session
            .set_stage(&dashboard.base_records, student_id, stage.into(), value)?;
        Ok(stages.into())
    }

    pub fn pending_edit_count(&self) -> Result<u32, ScreeningError> {
        Ok(self.state.lock()?.session.len() as u32)
    }

    /// Drop every unsaved edit.
    pub fn discard_edits(&self) -> Result<(), ScreeningError> {
        let db = self.db.lock()?;
        let mut state = self.state.lock()?;
        state.session.clear();
        state.cache.invalidate(db.source_key());
        Ok(())
    }

    /// Persist the edited records. On a version conflict nothing is written,
    /// the edits are kept and the next run reloads the stored versions.
    pub fn save_flags(&self) -> Result<FfiSyncReceipt, ScreeningError> {
        let db = self.db.lock()?;
        let mut state = self.state.lock()?;
        let dashboard = Self::run_everything(&db, &mut state)?;
        let edited: Vec<ScreeningRecord> = state
            .session
            .touched(&dashboard.records)
            .into_iter()
            .cloned()
            .collect();

        let saved = FlagSync::new(&db).save(&edited);
        state.cache.invalidate(db.source_key());
        let receipt = saved?;
        state.session.clear();
        Ok(receipt.into())
    }

    /// Re-key legacy name-keyed flags to student ids.
    pub fn migrate_legacy_flags(&self) -> Result<FfiMigrationReport, ScreeningError> {
        let db = self.db.lock()?;
        let report = FlagMigrator::new(&db).run()?;
        self.invalidate(&db)?;
        Ok(report.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ScreeningError> {
    NaiveDate::parse_from_str(raw.trim(), db::DATE_FORMAT)
        .map_err(|_| ScreeningError::InvalidInput(format!("{field}: expected YYYY-MM-DD, got {raw:?}")))
}

/// FFI-safe filter. `regions: None` selects every region; an empty list
/// selects nothing. Dates are `YYYY-MM-DD` and must be given together.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiFilter {
    pub regions: Option<Vec<String>>,
    pub schools: Option<Vec<String>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl FfiFilter {
    fn to_selection(
        &self,
        snapshot: &Snapshot,
        no_region_label: &str,
    ) -> Result<FilterSelection, ScreeningError> {
        let mut selection = match &self.regions {
            Some(regions) => FilterSelection {
                regions: regions.clone(),
                ..FilterSelection::default()
            },
            None => FilterSelection::all_regions(snapshot, no_region_label),
        };
        if let Some(schools) = &self.schools {
            selection = selection.with_schools(schools.iter().cloned());
        }
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => {
                let range = DateRange::new(
                    parse_date(start, "start_date")?,
                    parse_date(end, "end_date")?,
                )?;
                selection = selection.with_date_range(range);
            }
            (None, None) => {}
            _ => {
                return Err(ScreeningError::InvalidInput(
                    "start_date and end_date must be given together".into(),
                ))
            }
        }
        Ok(selection)
    }
}

/// FFI-safe new school.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewSchool {
    pub name: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<FfiNewSchool> for NewSchool {
    fn from(school: FfiNewSchool) -> Self {
        NewSchool {
            name: school.name,
            address: Address {
                street: school.street,
                number: school.number,
                complement: school.complement,
                district: school.district,
                city: school.city,
                state: school.state,
                postal_code: school.postal_code,
            },
            region: school.region,
            latitude: school.latitude,
            longitude: school.longitude,
        }
    }
}

/// FFI-safe school.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSchool {
    pub id: i64,
    pub name: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total_students: u32,
}

impl From<School> for FfiSchool {
    fn from(school: School) -> Self {
        Self {
            id: school.id,
            name: school.name,
            street: school.address.street,
            number: school.address.number,
            complement: school.address.complement,
            district: school.address.district,
            city: school.address.city,
            state: school.address.state,
            postal_code: school.address.postal_code,
            region: school.region,
            latitude: school.latitude,
            longitude: school.longitude,
            total_students: school.total_students,
        }
    }
}

impl From<FfiSchool> for School {
    fn from(school: FfiSchool) -> Self {
        School {
            id: school.id,
            name: school.name,
            address: Address {
                street: school.street,
                number: school.number,
                complement: school.complement,
                district: school.district,
                city: school.city,
                state: school.state,
                postal_code: school.postal_code,
            },
            region: school.region,
            latitude: school.latitude,
            longitude: school.longitude,
            total_students: school.total_students,
        }
    }
}

/// FFI-safe new student. `birth_date` is `YYYY-MM-DD`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewStudent {
    pub name: String,
    pub birth_date: String,
    pub sex: String,
    pub school_id: i64,
    pub region: String,
}

impl TryFrom<FfiNewStudent> for NewStudent {
    type Error = ScreeningError;

    fn try_from(student: FfiNewStudent) -> Result<Self, Self::Error> {
        Ok(NewStudent {
            birth_date: parse_date(&student.birth_date, "birth_date")?,
            name: student.name,
            sex: student.sex,
            school_id: student.school_id,
            region: student.region,
        })
    }
}

/// FFI-safe student.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStudent {
    pub id: i64,
    pub name: String,
    pub birth_date: String,
    pub sex: String,
    pub school_id: Option<i64>,
    pub region: Option<String>,
}

impl From<Student> for FfiStudent {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            name: student.name,
            birth_date: student.birth_date.format(db::DATE_FORMAT).to_string(),
            sex: student.sex,
            school_id: student.school_id,
            region: student.region,
        }
    }
}

/// FFI-safe refraction readings for one eye.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiEyeMeasurements {
    pub spherical: Option<f64>,
    pub cylindrical: Option<f64>,
    pub dioptric_cylinder: Option<f64>,
    pub axis: Option<i32>,
    pub corneal_radius_mm: Option<f64>,
    pub kerato_steep_axis: Option<f64>,
    pub kerato_flat_axis: Option<f64>,
}

impl From<FfiEyeMeasurements> for EyeMeasurements {
    fn from(eye: FfiEyeMeasurements) -> Self {
        EyeMeasurements {
            spherical: eye.spherical,
            cylindrical: eye.cylindrical,
            dioptric_cylinder: eye.dioptric_cylinder,
            axis: eye.axis,
            corneal_radius_mm: eye.corneal_radius_mm,
            kerato_steep_axis: eye.kerato_steep_axis,
            kerato_flat_axis: eye.kerato_flat_axis,
        }
    }
}

/// FFI-safe exam submission. `taken_at` is `YYYY-MM-DD HH:MM:SS` or a
/// plain date.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewExam {
    pub student_id: i64,
    pub taken_at: Option<String>,
    pub right: FfiEyeMeasurements,
    pub left: FfiEyeMeasurements,
    pub interpupillary_distance_mm: Option<f64>,
}

impl TryFrom<FfiNewExam> for NewExam {
    type Error = ScreeningError;

    fn try_from(exam: FfiNewExam) -> Result<Self, Self::Error> {
        let taken_at = match exam.taken_at.as_deref() {
            Some(raw) => Some(db::parse_timestamp(raw).ok_or_else(|| {
                ScreeningError::InvalidInput(format!("taken_at: unrecognized timestamp {raw:?}"))
            })?),
            None => None,
        };
        Ok(NewExam {
            student_id: exam.student_id,
            taken_at,
            right: exam.right.into(),
            left: exam.left.into(),
            interpupillary_distance_mm: exam.interpupillary_distance_mm,
        })
    }
}

/// FFI-safe exam summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExamSummary {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub taken_at: Option<String>,
    pub spherical_od: Option<f64>,
    pub cylindrical_od: Option<f64>,
}

impl From<Exam> for FfiExamSummary {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            student_id: exam.student_id,
            student_name: exam.student_name,
            taken_at: exam
                .taken_at
                .map(|t| t.format(db::TIMESTAMP_FORMAT).to_string()),
            spherical_od: exam.right.spherical,
            cylindrical_od: exam.right.cylindrical,
        }
    }
}

/// FFI-safe workflow stage.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiStage {
    ExamDone,
    NeedsGlasses,
    OtherPathology,
    Delivered,
}

impl From<FfiStage> for Stage {
    fn from(stage: FfiStage) -> Self {
        match stage {
            FfiStage::ExamDone => Stage::ExamDone,
            FfiStage::NeedsGlasses => Stage::NeedsGlasses,
            FfiStage::OtherPathology => Stage::OtherPathology,
            FfiStage::Delivered => Stage::Delivered,
        }
    }
}

/// FFI-safe stage booleans.
#[derive(Debug, Clone, Copy, uniffi::Record)]
pub struct FfiStageFlags {
    pub exam_done: bool,
    pub needs_glasses: bool,
    pub other_pathology: bool,
    pub delivered: bool,
}

impl From<StageFlags> for FfiStageFlags {
    fn from(stages: StageFlags) -> Self {
        Self {
            exam_done: stages.exam_done,
            needs_glasses: stages.needs_glasses,
            other_pathology: stages.other_pathology,
            delivered: stages.delivered,
        }
    }
}

/// FFI-safe screening record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiScreeningRecord {
    pub student_id: i64,
    pub student_name: String,
    pub anchor_exam_id: i64,
    pub anchor_date: String,
    pub school_id: i64,
    pub school_name: String,
    pub region: Option<String>,
    pub critical: bool,
    pub stages: FfiStageFlags,
}

impl From<ScreeningRecord> for FfiScreeningRecord {
    fn from(record: ScreeningRecord) -> Self {
        let anchor_date = record.anchor_date().format(db::DATE_FORMAT).to_string();
        Self {
            student_id: record.student_id,
            student_name: record.student_name,
            anchor_exam_id: record.anchor_exam_id,
            anchor_date,
            school_id: record.school_id,
            school_name: record.school_name,
            region: record.region,
            critical: record.critical.is_critical(),
            stages: record.stages.into(),
        }
    }
}

/// FFI-safe regional row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegionalRow {
    pub region: String,
    pub exam_done: u32,
    pub needs_glasses: u32,
    pub delivered: u32,
}

impl From<metrics::RegionalRow> for FfiRegionalRow {
    fn from(row: metrics::RegionalRow) -> Self {
        Self {
            region: row.region,
            exam_done: row.exam_done as u32,
            needs_glasses: row.needs_glasses as u32,
            delivered: row.delivered as u32,
        }
    }
}

/// FFI-safe ranking row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSchoolDelivery {
    pub school_id: i64,
    pub school_name: String,
    pub needs_glasses: u32,
    pub delivered: u32,
    pub rate: f64,
}

impl From<metrics::SchoolDelivery> for FfiSchoolDelivery {
    fn from(school: metrics::SchoolDelivery) -> Self {
        Self {
            school_id: school.school_id,
            school_name: school.school_name,
            needs_glasses: school.needs_glasses as u32,
            delivered: school.delivered as u32,
            rate: school.rate,
        }
    }
}

/// FFI-safe data-quality counters.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDataQuality {
    pub exams_missing_timestamp: u32,
    pub exams_unparseable_timestamp: u32,
    pub exams_without_student: u32,
    pub students_without_school: u32,
}

impl From<screening::DataQuality> for FfiDataQuality {
    fn from(quality: screening::DataQuality) -> Self {
        Self {
            exams_missing_timestamp: quality.exams_missing_timestamp as u32,
            exams_unparseable_timestamp: quality.exams_unparseable_timestamp as u32,
            exams_without_student: quality.exams_without_student as u32,
            students_without_school: quality.students_without_school as u32,
        }
    }
}

/// FFI-safe dashboard. Series and overview distributions are available
/// through `dashboard_json`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDashboard {
    pub total_students: u64,
    pub total_exams: u32,
    pub distinct_schools: u32,
    pub indicated: u32,
    pub examined: u32,
    pub needs_glasses: u32,
    pub delivered: u32,
    pub examined_rate: String,
    pub needs_glasses_rate: String,
    pub delivered_rate: String,
    pub donut_examined: u32,
    pub donut_needs_glasses: u32,
    pub donut_other_pathology: u32,
    pub regional: Vec<FfiRegionalRow>,
    pub ranking: Vec<FfiSchoolDelivery>,
    pub records: Vec<FfiScreeningRecord>,
    pub quality: FfiDataQuality,
}

impl From<Dashboard> for FfiDashboard {
    fn from(dashboard: Dashboard) -> Self {
        let quality = dashboard.quality().into();
        let totals = dashboard.overview.totals;
        let m = dashboard.metrics;
        Self {
            total_students: totals.total_students,
            total_exams: totals.total_exams as u32,
            distinct_schools: totals.distinct_schools as u32,
            indicated: m.funnel.indicated as u32,
            examined: m.funnel.examined as u32,
            needs_glasses: m.funnel.needs_glasses as u32,
            delivered: m.funnel.delivered as u32,
            examined_rate: m.conversion.examined_of_indicated.label,
            needs_glasses_rate: m.conversion.needs_glasses_of_examined.label,
            delivered_rate: m.conversion.delivered_of_needs_glasses.label,
            donut_examined: m.donut.examined as u32,
            donut_needs_glasses: m.donut.needs_glasses as u32,
            donut_other_pathology: m.donut.other_pathology as u32,
            regional: m.regional.into_iter().map(Into::into).collect(),
            ranking: m.ranking.into_iter().map(Into::into).collect(),
            records: dashboard.records.into_iter().map(Into::into).collect(),
            quality,
        }
    }
}

/// FFI-safe sync receipt.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSyncReceipt {
    pub sync_id: String,
    pub mode: String,
    pub students: u32,
    pub rows_written: u32,
    pub digest: String,
    pub synced_at: String,
}

impl From<SyncReceipt> for FfiSyncReceipt {
    fn from(receipt: SyncReceipt) -> Self {
        Self {
            sync_id: receipt.sync_id,
            mode: receipt.mode.as_str().to_string(),
            students: receipt.students,
            rows_written: receipt.rows_written,
            digest: receipt.digest,
            synced_at: receipt.synced_at,
        }
    }
}

/// FFI-safe unresolved legacy name.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUnresolvedName {
    pub name: String,
    pub suggestions: Vec<String>,
}

/// FFI-safe migration report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMigrationReport {
    pub receipt: FfiSyncReceipt,
    pub migrated_students: u32,
    pub skipped_rows: u32,
    pub unresolved: Vec<FfiUnresolvedName>,
}

impl From<sync::MigrationReport> for FfiMigrationReport {
    fn from(report: sync::MigrationReport) -> Self {
        Self {
            receipt: report.receipt.into(),
            migrated_students: report.migrated.len() as u32,
            skipped_rows: report.skipped.len() as u32,
            unresolved: report
                .unresolved
                .into_iter()
                .map(|u| FfiUnresolvedName {
                    name: u.name,
                    suggestions: u.suggestions,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_with_students() -> Arc<ScreeningCore> {
        let core = open_database_in_memory().unwrap();
        seed_students(&core);
        core
    }

    fn seed_students(core: &ScreeningCore) {
        let school = core
            .register_school(FfiNewSchool {
                name: "EC 01".into(),
                street: "Rua 1".into(),
                number: "10".into(),
                complement: None,
                district: "Centro".into(),
                city: "Brasília".into(),
                state: "DF".into(),
                postal_code: "70000-000".into(),
                region: "Norte".into(),
                latitude: Some(-15.8),
                longitude: Some(-47.9),
            })
            .unwrap();
        for (name, sph) in [("Ana", 5.0), ("Bruno", 1.0)] {
            let student = core
                .register_student(FfiNewStudent {
                    name: name.into(),
                    birth_date: "2015-04-01".into(),
                    sex: "F".into(),
                    school_id: school.id,
                    region: "Norte".into(),
                })
                .unwrap();
            core.submit_exam(FfiNewExam {
                student_id: student.id,
                taken_at: Some("2024-03-10 09:00:00".into()),
                right: FfiEyeMeasurements {
                    spherical: Some(sph),
                    ..FfiEyeMeasurements::default()
                },
                left: FfiEyeMeasurements::default(),
                interpupillary_distance_mm: None,
            })
            .unwrap();
        }
    }

    fn student_id(core: &ScreeningCore, name: &str) -> i64 {
        core.dashboard(FfiFilter::default())
            .unwrap()
            .records
            .into_iter()
            .find(|r| r.student_name == name)
            .unwrap()
            .student_id
    }

    #[test]
    fn test_dashboard_over_everything() {
        let core = core_with_students();
        let dashboard = core.dashboard(FfiFilter::default()).unwrap();
        assert_eq!(dashboard.records.len(), 2);
        assert_eq!(dashboard.indicated, 1);
        assert_eq!(dashboard.examined_rate, "0.0%");
        assert_eq!(dashboard.total_exams, 2);
    }

    #[test]
    fn test_empty_region_list_selects_nothing() {
        let core = core_with_students();
        let filter = FfiFilter {
            regions: Some(Vec::new()),
            ..FfiFilter::default()
        };
        let dashboard = core.dashboard(filter).unwrap();
        assert!(dashboard.records.is_empty());
        assert_eq!(dashboard.examined_rate, "0.0%");
    }

    #[test]
    fn test_edit_then_save() {
        let core = core_with_students();
        let ana = core.dashboard(FfiFilter::default()).unwrap().records[0].student_id;

        let stages = core.set_stage(ana, FfiStage::ExamDone, true).unwrap();
        assert!(stages.exam_done);
        assert_eq!(core.pending_edit_count().unwrap(), 1);
        assert_eq!(core.dashboard(FfiFilter::default()).unwrap().examined, 1);

        let receipt = core.save_flags().unwrap();
        assert_eq!(receipt.mode, "upsert");
        assert_eq!(receipt.students, 1);
        assert_eq!(core.pending_edit_count().unwrap(), 0);

        // persisted state survives without pending edits
        assert_eq!(core.dashboard(FfiFilter::default()).unwrap().examined, 1);

        // a second edit saves against the new version
        core.set_stage(ana, FfiStage::Delivered, true).unwrap();
        core.save_flags().unwrap();
        assert_eq!(core.dashboard(FfiFilter::default()).unwrap().delivered, 1);
    }

    #[test]
    fn test_set_stage_unknown_student() {
        let core = core_with_students();
        let err = core.set_stage(999, FfiStage::ExamDone, true).unwrap_err();
        assert!(matches!(err, ScreeningError::NotFound(_)));
    }

    #[test]
    fn test_one_sided_date_range_rejected() {
        let core = core_with_students();
        let filter = FfiFilter {
            start_date: Some("2024-01-01".into()),
            ..FfiFilter::default()
        };
        assert!(matches!(
            core.dashboard(filter),
            Err(ScreeningError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_bad_config_rejected() {
        let result = open_database(":memory:".into(), Some("ranking_limit = 0".into()));
        assert!(matches!(result, Err(ScreeningError::ConfigError(_))));
    }

    #[test]
    fn test_conflict_then_discard_sees_other_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screening.db").to_string_lossy().into_owned();
        let first = open_database(path.clone(), None).unwrap();
        seed_students(&first);
        let second = open_database(path, None).unwrap();
        let ana = student_id(&first, "Ana");

        second.set_stage(ana, FfiStage::ExamDone, true).unwrap();
        second.save_flags().unwrap();

        first.set_stage(ana, FfiStage::Delivered, true).unwrap();
        let err = first.save_flags().unwrap_err();
        assert!(matches!(err, ScreeningError::Conflict(_)));
        assert_eq!(first.pending_edit_count().unwrap(), 1);

        first.discard_edits().unwrap();
        assert_eq!(first.dashboard(FfiFilter::default()).unwrap().examined, 1);

        first.set_stage(ana, FfiStage::Delivered, true).unwrap();
        first.save_flags().unwrap();
        let dashboard = second.dashboard(FfiFilter::default()).unwrap();
        assert_eq!(dashboard.examined, 1);
        assert_eq!(dashboard.delivered, 1);
    }

    #[test]
    fn test_retry_after_conflict_uses_stored_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screening.db").to_string_lossy().into_owned();
        let first = open_database(path.clone(), None).unwrap();
        seed_students(&first);
        let second = open_database(path, None).unwrap();
        let bruno = student_id(&first, "Bruno");

        second.set_stage(bruno, FfiStage::ExamDone, true).unwrap();
        second.save_flags().unwrap();

        first.set_stage(bruno, FfiStage::NeedsGlasses, true).unwrap();
        assert!(first.save_flags().is_err());

        let receipt = first.save_flags().unwrap();
        assert_eq!(receipt.students, 1);
        assert_eq!(first.pending_edit_count().unwrap(), 0);
    }

    #[test]
    fn test_csv_exports() {
        let core = core_with_students();
        let csv = core.export_records_csv(FfiFilter::default()).unwrap();
        assert_eq!(csv.lines().count(), 3);
        let ranking = core.export_ranking_csv(FfiFilter::default()).unwrap();
        assert!(ranking.starts_with("rank,school_id"));
    }
}
