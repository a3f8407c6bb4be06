use std::io::Read;
use std::path::Path;

use crate::error::Error;

/// One row of input data: field name to value, in column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    /// Sets `field`, replacing an existing value in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Value of `field`, or `""` when the record has no such field.
    pub fn get(&self, field: &str) -> &str {
        self.fields
            .iter()
            .find(|(k, _)| k == field)
            .map_or("", |(_, v)| v.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == field)
    }

    pub fn first_value(&self) -> Option<&str> {
        self.fields.first().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Ordered header plus the records read under it.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub header: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn from_csv_path(path: &Path) -> Result<Dataset, Error> {
        let file = std::fs::File::open(path)?;
        Dataset::from_csv_reader(file)
    }

    /// Reads a headed CSV source. Short rows are padded with empty values;
    /// cells beyond the header are dropped.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Dataset, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let header: Vec<String> = reader
            .headers()?
            .iter()
            .map(std::string::ToString::to_string)
            .collect();

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row?;
            if row.iter().all(str::is_empty) {
                continue;
            }
            if row.len() > header.len() {
                log::warn!(
                    "row {} has {} cells but the header has {}; extra cells ignored",
                    index + 1,
                    row.len(),
                    header.len()
                );
            }
            let record: Record = header
                .iter()
                .enumerate()
                .map(|(i, field)| (field.clone(), row.get(i).unwrap_or("").to_string()))
                .collect();
            records.push(record);
        }

        if records.is_empty() {
            return Err(Error::NoRecords);
        }
        log::debug!("read {} records with {} fields", records.len(), header.len());
        Ok(Dataset { header, records })
    }
}
