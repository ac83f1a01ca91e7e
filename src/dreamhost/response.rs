use std::collections::HashMap;

use super::ApiError;

const STATUS_SUCCESS: &str = "success";

/// One data row of a tab-separated API response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    /// Value of `field`, if the row carried one.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Number of fields present in this row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let fields = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { fields }
    }
}

/// Parsed reply of a single API command.
///
/// The layout of the raw reply is:
///
/// ```text
/// success|error
/// <error message> | <tab separated header>
/// <tab separated row>*
/// ```
///
/// An `error` reply is not an [`Err`]: it is kept as a [Response] with
/// [`success`](Self::success) set to `false` so the caller decides what to do
/// with it. See [`ensure_success`](Self::ensure_success).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    cmd: String,
    success: bool,
    error: Option<String>,
    records: Vec<Record>,
}

impl Response {
    /// Parse the raw reply `body` of the API command `cmd`.
    ///
    /// Rows shorter than the header leave their trailing fields absent,
    /// surplus values are dropped. Blank rows are ignored.
    pub fn parse(cmd: &str, body: &str) -> Result<Self, ApiError> {
        let mut lines = body.lines().map(str::trim);
        let malformed = || ApiError::Malformed {
            cmd: cmd.to_string(),
        };

        let status = lines.next().ok_or_else(malformed)?;
        let second = lines.next().ok_or_else(malformed)?;

        if status != STATUS_SUCCESS {
            log::debug!(target: "dreamhost::response", "{cmd} answered with status '{status}': {second}");
            return Ok(Self {
                cmd: cmd.to_string(),
                success: false,
                error: Some(second.to_string()),
                records: Vec::new(),
            });
        }

        let header: Vec<&str> = second.split('\t').collect();
        let records: Vec<Record> = lines
            .filter(|line| !line.is_empty())
            .map(|line| {
                let values: Vec<&str> = line.split('\t').collect();
                if values.len() < header.len() {
                    log::trace!(target: "dreamhost::response", "{cmd}: short row: {line}");
                }
                header.iter().copied().zip(values).collect::<Record>()
            })
            .collect();

        Ok(Self {
            cmd: cmd.to_string(),
            success: true,
            error: None,
            records,
        })
    }

    /// The API command this response answers.
    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Error message of an unsuccessful response.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Fails with [`ApiError::Remote`] if the API answered with an error.
    pub fn ensure_success(&self) -> Result<&Self, ApiError> {
        if self.success {
            Ok(self)
        } else {
            Err(ApiError::Remote {
                cmd: self.cmd.clone(),
                message: self.error.clone().unwrap_or_default(),
            })
        }
    }

    /// All values of `field`, in row order.
    pub fn column<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.records.iter().filter_map(move |record| record.get(field))
    }

    /// All records whose `field` equals `value`.
    pub fn list<'a>(&'a self, field: &'a str, value: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records
            .iter()
            .filter(move |record| record.get(field) == Some(value))
    }

    /// `return_field` of every record whose `field` equals `value`.
    pub fn list_field<'a>(
        &'a self,
        field: &'a str,
        value: &'a str,
        return_field: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.list(field, value)
            .filter_map(move |record| record.get(return_field))
    }

    /// First record whose `field` equals `value`.
    pub fn find(&self, field: &str, value: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|record| record.get(field) == Some(value))
    }

    /// `return_field` of the first record whose `field` equals `value`.
    pub fn find_field(&self, field: &str, value: &str, return_field: &str) -> Option<&str> {
        self.find(field, value)
            .and_then(|record| record.get(return_field))
    }
}
