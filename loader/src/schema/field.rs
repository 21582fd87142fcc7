use std::fmt;

/// Semantic family of a column, used to coerce flattened values before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Integer,
    Text,
    Boolean,
    Decimal,
    Timestamp,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    BigInt,
    Integer,
    Boolean,
    Text,
    Varchar(u32),
    Numeric(u8, u8),
    Timestamp,
    Json,
}

impl DataType {
    pub fn kind(&self) -> Kind {
        match self {
            DataType::BigInt | DataType::Integer => Kind::Integer,
            DataType::Boolean => Kind::Boolean,
            DataType::Text | DataType::Varchar(_) => Kind::Text,
            DataType::Numeric(..) => Kind::Decimal,
            DataType::Timestamp => Kind::Timestamp,
            DataType::Json => Kind::Json,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Varchar(len) => write!(f, "VARCHAR({})", len),
            DataType::Numeric(precision, scale) => write!(f, "NUMERIC({},{})", precision, scale),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Json => write!(f, "JSON"),
        }
    }
}

/// A column of another table. Only handed out by `TableSpec::reference`,
/// so the table and the field are always set together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    table: String,
    field: String,
}

impl ForeignKey {
    pub(crate) fn new(table: &str, field: &str) -> Self {
        Self {
            table: table.to_string(),
            field: field.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub datatype: DataType,
    pub is_primary_key: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl FieldSpec {
    pub fn new(name: &str, datatype: DataType) -> Self {
        Self {
            name: name.to_string(),
            datatype,
            is_primary_key: false,
            foreign_key: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn references(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    pub(crate) fn column_clause(&self) -> String {
        format!("{} {}", self.name, self.datatype)
    }

    pub(crate) fn foreign_key_clause(&self) -> Option<String> {
        self.foreign_key.as_ref().map(|fk| {
            format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                self.name, fk.table, fk.field
            )
        })
    }
}
