pub mod config;
pub mod period;
pub mod preprocess;
pub mod report;
pub mod row;
pub mod schema;
pub mod session;
pub mod sheet;
pub mod summary;
pub mod validate;

pub use config::{ConfigError, Settings};
pub use period::{McmPeriod, PeriodError, PeriodIndex, PeriodKey, PeriodResources};
pub use preprocess::PreprocessOutcome;
pub use report::{AuditFinding, Category, ExtractionResult, ReportHeader};
pub use row::{FlattenedRow, HEADER_ONLY_HEADING, flatten};
pub use schema::dar;
pub use session::{AuthError, Credentials, PendingUpload, Role, SessionContext};
pub use sheet::{HeaderCheck, SHEET_COLUMNS, SheetError, SheetRow};
pub use summary::{GroupSummary, summarize};
pub use validate::validate_rows;
