use chrono::{DateTime, Utc};

use crate::domain::errors::DomainError;

/// Statistics record kept by the metadata index for one object key.
///
/// Records outlive the object: deletion only sets `remove_date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub filename: String,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
    pub remove_date: Option<DateTime<Utc>>,
    pub download_count: u64,
}

impl ObjectMetadata {
    /// Fresh record for a just-committed object
    pub fn uploaded(filename: impl Into<String>, size: u64, upload_date: DateTime<Utc>) -> Self {
        Self {
            filename: filename.into(),
            size,
            upload_date,
            remove_date: None,
            download_count: 0,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.remove_date.is_some()
    }

    /// Flat field map as stored in the index. Dates are Unix epoch seconds.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("filename", self.filename.clone()),
            ("size", self.size.to_string()),
            ("download_count", self.download_count.to_string()),
            ("upload_date", self.upload_date.timestamp().to_string()),
        ];

        if let Some(removed) = self.remove_date {
            fields.push(("remove_date", removed.timestamp().to_string()));
        }

        fields
    }

    /// Parse the flat field map read back from the index.
    ///
    /// Unknown fields are rejected so schema drift is noticed instead of
    /// silently dropped.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filename = None;
        let mut size = 0u64;
        let mut download_count = 0u64;
        let mut upload_date = None;
        let mut remove_date = None;

        for (field, value) in fields {
            let (field, value) = (field.as_ref(), value.as_ref());
            match field {
                "filename" => filename = Some(value.to_string()),
                "size" => size = parse_number(field, value)?,
                "download_count" => download_count = parse_number(field, value)?,
                "upload_date" => upload_date = Some(parse_timestamp(field, value)?),
                "remove_date" => remove_date = Some(parse_timestamp(field, value)?),
                other => {
                    return Err(DomainError::InvalidMetadataField {
                        field: other.to_string(),
                        reason: "unknown field".to_string(),
                    })
                }
            }
        }

        Ok(Self {
            filename: filename.ok_or_else(|| missing("filename"))?,
            size,
            upload_date: upload_date.ok_or_else(|| missing("upload_date"))?,
            remove_date,
            download_count,
        })
    }
}

fn missing(field: &str) -> DomainError {
    DomainError::InvalidMetadataField {
        field: field.to_string(),
        reason: "missing".to_string(),
    }
}

fn parse_number(field: &str, value: &str) -> Result<u64, DomainError> {
    value
        .parse::<u64>()
        .map_err(|e| DomainError::InvalidMetadataField {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, DomainError> {
    let secs = value
        .parse::<i64>()
        .map_err(|e| DomainError::InvalidMetadataField {
            field: field.to_string(),
            reason: e.to_string(),
        })?;

    DateTime::from_timestamp(secs, 0).ok_or_else(|| DomainError::InvalidMetadataField {
        field: field.to_string(),
        reason: format!("timestamp {} out of range", secs),
    })
}
