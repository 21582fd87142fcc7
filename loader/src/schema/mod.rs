mod field;
mod table;

pub use field::{DataType, FieldSpec, ForeignKey, Kind};
pub use table::{OnConflict, TableSpec};
