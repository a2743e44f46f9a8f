//! Meeting rows: CSV import, grouping into occurrences and recurrence rules.

mod calendar_grouping;
mod calendar_import;
mod calendar_recurrence;
mod calendar_types;
mod calendar_validation;

pub use calendar_grouping::*;
pub use calendar_import::*;
pub use calendar_recurrence::*;
pub use calendar_types::*;
pub use calendar_validation::*;

use log::info;
use std::path::Path;

/// Import the CSV at `path` and group its rows into meetings.
pub fn load_meetings(
    path: &Path,
    import: &ImportOptions,
    grouping: &GroupingOptions,
) -> Result<MeetingGroups, ImportError> {
    let rows = import_csv(path, import)?;
    let row_count = rows.len();
    let groups = group_rows(rows, grouping)?;
    info!("Grouped {} rows into {} meetings", row_count, groups.len());
    Ok(groups)
}
