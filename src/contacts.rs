use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use ulid::Ulid;

use crate::model::{Contact, Ms};

/// One parsed CSV row, not yet stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub info: Option<String>,
    pub consent_status: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub booking_count: u32,
    pub original_created_at: Option<String>,
}

impl ContactDraft {
    pub fn into_contact(self, id: Ulid, created_at: Ms) -> Contact {
        Contact {
            id,
            name: self.name,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            email: self.email,
            info: self.info,
            consent_status: self.consent_status,
            gender: self.gender,
            language: self.language,
            booking_count: self.booking_count,
            original_created_at: self.original_created_at,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub success: usize,
    pub failed: usize,
    /// `Batch <n>: <reason>`, one per failed batch.
    pub errors: Vec<String>,
}

#[derive(Debug)]
pub enum ImportError {
    Csv(String),
    NoRows,
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Csv(e) => write!(f, "malformed CSV: {e}"),
            ImportError::NoRows => write!(f, "no valid rows found in CSV"),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<csv::Error> for ImportError {
    fn from(e: csv::Error) -> Self {
        ImportError::Csv(e.to_string())
    }
}

/// Column positions resolved from the header row. German export headers.
#[derive(Debug, Default)]
struct Columns {
    name: Option<usize>,
    first_name: Option<usize>,
    last_name: Option<usize>,
    phone: Option<usize>,
    email: Option<usize>,
    info: Option<usize>,
    consent_status: Option<usize>,
    gender: Option<usize>,
    language: Option<usize>,
    booking_count: Option<usize>,
    created: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.replace('"', "").trim().to_lowercase())
            .collect();
        let exact = |name: &str| normalized.iter().position(|h| h == name);
        let containing = |part: &str| normalized.iter().position(|h| h.contains(part));

        Columns {
            name: exact("name"),
            first_name: exact("vorname"),
            last_name: exact("nachname"),
            phone: exact("telefon"),
            email: exact("email"),
            info: exact("info"),
            consent_status: containing("einwilligung"),
            gender: exact("geschlecht"),
            language: exact("sprache"),
            booking_count: containing("buchung"),
            created: exact("erstellt"),
        }
    }
}

fn field(record: &StringRecord, column: Option<usize>) -> Option<String> {
    let value = record.get(column?)?.replace('"', "");
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Leading digits as a count; anything else is 0.
fn parse_count(value: Option<String>) -> u32 {
    let Some(value) = value else { return 0 };
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Parse a contact export. Rows without a name are skipped.
pub fn parse_contacts_csv(text: &str) -> Result<Vec<ContactDraft>, ImportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.trim().as_bytes());

    let columns = Columns::from_headers(reader.headers()?);
    let mut drafts = Vec::new();

    for record in reader.records() {
        let record = record?;
        let Some(name) = field(&record, columns.name) else {
            continue;
        };
        drafts.push(ContactDraft {
            name,
            first_name: field(&record, columns.first_name),
            last_name: field(&record, columns.last_name),
            phone: field(&record, columns.phone),
            email: field(&record, columns.email),
            info: field(&record, columns.info),
            consent_status: field(&record, columns.consent_status),
            gender: field(&record, columns.gender),
            language: field(&record, columns.language),
            booking_count: parse_count(field(&record, columns.booking_count)),
            original_created_at: field(&record, columns.created),
        });
    }

    if drafts.is_empty() {
        return Err(ImportError::NoRows);
    }
    Ok(drafts)
}
