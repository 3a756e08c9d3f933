use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, SourceError};
use crate::hierarchy::build;
use crate::model::{AttrValue, Attributes, RawRecord, RecordId, Tree};

/// Loads records, picking the decoder from the file extension.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, SourceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let open = || {
        std::fs::File::open(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    let records = match ext.as_deref() {
        Some("json") => from_json(std::io::BufReader::new(open()?))?,
        Some("csv") => from_csv(open()?)?,
        _ => return Err(SourceError::UnknownFormat(path.to_path_buf())),
    };
    tracing::debug!(path = %path.display(), records = records.len(), "records loaded");
    Ok(records)
}

/// [`load_records`] followed by [`build`].
pub fn load_tree(path: &Path) -> Result<Tree> {
    let records = load_records(path)?;
    Ok(build(&records)?)
}

/// A JSON array of records.
pub fn from_json(r: impl Read) -> Result<Vec<RawRecord>, SourceError> {
    Ok(serde_json::from_reader(r)?)
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "location_id")]
    id: String,
    #[serde(default, alias = "parentId", alias = "parent_location_id")]
    parent_id: Option<String>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default, alias = "location_name", alias = "name")]
    label: Option<String>,
    #[serde(default, alias = "type")]
    category: Option<String>,
    #[serde(default)]
    attribution: Option<f64>,
    #[serde(default)]
    attribution_fill: Option<String>,
}

impl From<CsvRow> for RawRecord {
    fn from(row: CsvRow) -> Self {
        let nonempty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        RawRecord {
            id: RecordId(row.id),
            parent_id: nonempty(row.parent_id).map(RecordId),
            value: row.value.unwrap_or(0.0),
            attributes: Attributes {
                label: nonempty(row.label),
                category: nonempty(row.category).map(|c| match c.parse::<f64>() {
                    Ok(n) => AttrValue::Number(n),
                    Err(_) => AttrValue::Text(c),
                }),
                attribution: row.attribution,
                attribution_fill: nonempty(row.attribution_fill),
            },
        }
    }
}

/// CSV with a header row; only `id` is required.
pub fn from_csv(r: impl Read) -> Result<Vec<RawRecord>, SourceError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(r);
    let mut out = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        out.push(row?.into());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn json_accepts_population_export_fields() {
        let json = r#"[
            {"location_id": 1, "parent_location_id": null, "location_name": "Global", "value": 0, "type": 0},
            {"location_id": 2, "parent_location_id": 1, "location_name": "Asia", "value": 4.5e9, "type": 1, "attribution": 0.4},
            {"id": "3", "parentId": "1", "name": "Europe", "value": 7.4e8}
        ]"#;
        let records = from_json(json.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, RecordId::from("1"));
        assert_eq!(records[0].parent_id, None);
        assert_eq!(records[1].parent_id, Some(RecordId::from("1")));
        assert_eq!(records[1].attributes.label.as_deref(), Some("Asia"));
        assert_eq!(records[1].attributes.category, Some(AttrValue::Number(1.0)));
        assert_eq!(records[1].attributes.attribution, Some(0.4));
        assert_eq!(records[2].parent_id, Some(RecordId::from("1")));
        assert_eq!(records[2].value, 7.4e8);
    }

    #[test]
    fn csv_blank_parent_is_root() {
        let csv = "id,parent_id,value,label,type\n1,,0,World,\n2,1,10,North,region\n";
        let records = from_csv(csv.as_bytes()).unwrap();
        assert_eq!(records[0].parent_id, None);
        assert_eq!(records[0].attributes.category, None);
        assert_eq!(records[1].parent_id, Some(RecordId::from("1")));
        assert_eq!(records[1].attributes.category, Some(AttrValue::from("region")));
        assert_eq!(records[1].value, 10.0);
    }

    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "id,parent_id,value\nr,,0\na,r,2").unwrap();
        assert_eq!(load_records(&path).unwrap().len(), 2);

        let other = dir.path().join("data.txt");
        std::fs::write(&other, "").unwrap();
        assert!(matches!(
            load_records(&other),
            Err(SourceError::UnknownFormat(_))
        ));
    }

    #[test]
    fn load_tree_reports_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orphan.json");
        std::fs::write(&path, r#"[{"id": 1}, {"id": 2, "parent_id": 9, "value": 3}]"#).unwrap();
        let err = load_tree(&path).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Hierarchy(crate::error::HierarchyError::OrphanParent { .. })
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            from_json("[{\"value\": 1}]".as_bytes()),
            Err(SourceError::Json(_))
        ));
    }
}
