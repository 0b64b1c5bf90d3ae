pub mod csv_source;
pub mod gradebook;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::roster::RosterRow;

pub use csv_source::CsvRosterSource;
pub use gradebook::GradebookRosterSource;

/// A batch import source of roster rows.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<RosterRow>>;
    fn source_name(&self) -> &str;
}
