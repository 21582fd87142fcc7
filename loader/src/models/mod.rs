mod value;

pub use value::{FlatTuple, Scalar, TIMESTAMP_FORMAT};
