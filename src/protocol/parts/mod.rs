mod column_metadata;
mod section;
mod sql_value;
mod sqlca;

pub use column_metadata::{ColumnDefinition, ColumnMetaData, ParamDesc, RowDesc, TypeId};
pub use sql_value::SqlValue;
pub use sqlca::Sqlca;

pub(crate) use section::{Section, SectionPool};
