pub mod csv;
pub mod geometry;
pub mod json;
pub mod time;

pub use self::csv::load_csv;
pub use self::geometry::{GeometryParser, TextGeometryParser};
pub use self::json::load_json;
pub use self::time::{DefaultTimeParser, TimeParser};

use std::borrow::Cow;
use std::fmt;

use anyhow::Result;
use serde_json::{json, Number, Value};

use crate::core::DisplayOptions;
use crate::error::DataError;

/// One raw record: a JSON array addressed by column index, or an object addressed by key
pub type Row = Value;

/// Name given to rows when no entity discriminator is supplied
pub const DEFAULT_ENTITY_NAME: &str = "entity";

/// Where a value lives inside a [`Row`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Index(usize),
    Name(String),
    /// Two fields read together as a `{"lat", "lng"}` point
    LatLng {
        lat: Box<FieldRef>,
        lng: Box<FieldRef>,
    },
}

impl FieldRef {
    pub const DEFAULT_TIME: FieldRef = FieldRef::Index(0);
    pub const DEFAULT_GEOMETRY: FieldRef = FieldRef::Index(1);

    pub fn lat_lng(lat: impl Into<FieldRef>, lng: impl Into<FieldRef>) -> Self {
        FieldRef::LatLng {
            lat: Box::new(lat.into()),
            lng: Box::new(lng.into()),
        }
    }

    pub fn get<'a>(&self, row: &'a Row) -> Option<Cow<'a, Value>> {
        match (self, row) {
            (FieldRef::Index(idx), Value::Array(cells)) => cells.get(*idx).map(Cow::Borrowed),
            (FieldRef::Name(name), Value::Object(fields)) => fields.get(name).map(Cow::Borrowed),
            (FieldRef::LatLng { lat, lng }, _) => {
                let lat = coordinate(lat.get(row)?);
                let lng = coordinate(lng.get(row)?);
                Some(Cow::Owned(json!({ "lat": lat, "lng": lng })))
            }
            _ => None,
        }
    }

    fn require<'a>(&self, row: &'a Row) -> Result<Cow<'a, Value>, DataError> {
        self.get(row)
            .ok_or_else(|| DataError::MissingField(self.to_string()))
    }
}

/// Numeric text becomes a number; anything else is passed through for the parser to reject
fn coordinate(value: Cow<'_, Value>) -> Value {
    let parsed = value
        .as_str()
        .and_then(|txt| txt.trim().parse::<f64>().ok())
        .and_then(Number::from_f64);
    match parsed {
        Some(number) => Value::Number(number),
        None => value.into_owned(),
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Index(idx) => write!(f, "#{idx}"),
            FieldRef::Name(name) => write!(f, "{name:?}"),
            FieldRef::LatLng { lat, lng } => write!(f, "({lat}, {lng})"),
        }
    }
}

impl From<usize> for FieldRef {
    fn from(idx: usize) -> Self {
        FieldRef::Index(idx)
    }
}

impl From<&str> for FieldRef {
    fn from(name: &str) -> Self {
        FieldRef::Name(name.to_string())
    }
}

/// How rows are assigned to entities
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntityKey {
    /// Every row belongs to this entity
    Named(String),
    /// Each row names its entity in this field
    Column(FieldRef),
    /// Every row belongs to [`DEFAULT_ENTITY_NAME`]
    #[default]
    Default,
}

impl EntityKey {
    pub fn resolve(&self, row: &Row) -> Result<String, DataError> {
        match self {
            EntityKey::Named(name) => Ok(name.clone()),
            EntityKey::Default => Ok(DEFAULT_ENTITY_NAME.to_string()),
            EntityKey::Column(field) => match field.require(row)?.as_ref() {
                Value::String(name) => Ok(name.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(DataError::MissingEntity(field.to_string())),
            },
        }
    }
}

/// Everything needed to ingest one batch of rows besides the rows themselves
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSpec {
    pub entity: EntityKey,
    pub time_field: FieldRef,
    pub geometry_field: FieldRef,
    /// Applied to entities this batch creates
    pub display: Option<DisplayOptions>,
}

impl Default for IngestSpec {
    fn default() -> Self {
        Self {
            entity: EntityKey::Default,
            time_field: FieldRef::DEFAULT_TIME,
            geometry_field: FieldRef::DEFAULT_GEOMETRY,
            display: None,
        }
    }
}

impl IngestSpec {
    pub fn new(entity: EntityKey) -> Self {
        Self {
            entity,
            ..Self::default()
        }
    }

    pub fn fields(mut self, time: impl Into<FieldRef>, geometry: impl Into<FieldRef>) -> Self {
        self.time_field = time.into();
        self.geometry_field = geometry.into();
        self
    }

    pub fn display(mut self, display: DisplayOptions) -> Self {
        self.display = Some(display);
        self
    }

    pub(crate) fn time_of<'a>(&self, row: &'a Row) -> Result<Cow<'a, Value>, DataError> {
        self.time_field.require(row)
    }

    pub(crate) fn geometry_of<'a>(&self, row: &'a Row) -> Result<Cow<'a, Value>, DataError> {
        self.geometry_field.require(row)
    }
}

/// The parsing collaborators used during ingestion
pub struct Parsers {
    pub time: Box<dyn TimeParser>,
    pub geometry: Box<dyn GeometryParser>,
}

impl Default for Parsers {
    fn default() -> Self {
        Self {
            time: Box::new(DefaultTimeParser),
            geometry: Box::new(TextGeometryParser),
        }
    }
}

/// Rows read from a file plus how to ingest them
#[derive(Debug, Clone)]
pub struct LoadedRows {
    pub rows: Vec<Row>,
    pub spec: IngestSpec,
}

/// Input format detection result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
    Unknown,
}

/// Detect the format of an input file from its first bytes
pub fn detect_format(data: &[u8]) -> InputFormat {
    let sample = match std::str::from_utf8(&data[..data.len().min(500)]) {
        Ok(text) => text,
        // The cut may land inside a multi-byte character
        Err(err) => match std::str::from_utf8(&data[..err.valid_up_to()]) {
            Ok(text) => text,
            Err(_) => return InputFormat::Unknown,
        },
    };

    let trimmed = sample.trim_start();
    if trimmed.starts_with('[') {
        return InputFormat::Json;
    }
    if trimmed.lines().take(5).any(|line| line.contains(',')) {
        return InputFormat::Csv;
    }
    InputFormat::Unknown
}

/// Load rows from a file, auto-detecting format
pub fn load_file(path: &str) -> Result<LoadedRows> {
    let data = std::fs::read(path)?;

    match detect_format(&data) {
        InputFormat::Csv => load_csv(path),
        InputFormat::Json => load_json(path),
        InputFormat::Unknown => anyhow::bail!("Unknown input format for {path}"),
    }
}
