use std::collections::BTreeSet;

use crate::animate::TransitionDescriptor;
use crate::model::RecordId;
use crate::view::FrameCell;

/// One row per cell; columns are `id`, `index`, then every datum key in order.
pub fn frame_to_csv(frame: &[FrameCell], mut w: impl std::io::Write) -> csv::Result<()> {
    let keys: BTreeSet<&str> = frame
        .iter()
        .flat_map(|c| c.datum.keys().map(String::as_str))
        .collect();
    let mut writer = csv::Writer::from_writer(&mut w);
    writer.write_record(["id", "index"].into_iter().chain(keys.iter().copied()))?;
    for cell in frame {
        let mut row = vec![cell.id.to_string(), cell.index.to_string()];
        row.extend(keys.iter().map(|k| {
            cell.datum
                .get(*k)
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn frame_to_json(frame: &[FrameCell]) -> serde_json::Value {
    serde_json::json!({
        "cells": frame,
    })
}

/// Per-cell descriptors for one phase, keyed by id in paint order.
pub fn transitions_to_json(phase: &str, entries: &[(RecordId, TransitionDescriptor)]) -> serde_json::Value {
    serde_json::json!({
        "phase": phase,
        "cells": entries.iter().map(|(id, d)| serde_json::json!({
            "id": id,
            "descriptor": d,
        })).collect::<Vec<_>>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animate::ProcessedDatum;
    use crate::model::AttrValue;

    fn cell(id: &str, index: usize, width: f64, label: Option<&str>) -> FrameCell {
        let mut datum = ProcessedDatum::new();
        datum.insert("width".into(), AttrValue::Number(width));
        if let Some(l) = label {
            datum.insert("label".into(), AttrValue::from(l));
        }
        FrameCell {
            id: id.into(),
            index,
            datum,
        }
    }

    #[test]
    fn csv_has_union_of_keys() {
        let frame = [cell("3", 0, 300.0, Some("Asia")), cell("2", 1, 100.0, None)];
        let mut out = Vec::new();
        frame_to_csv(&frame, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["id,index,label,width", "3,0,Asia,300", "2,1,,100"]);
    }

    #[test]
    fn json_flattens_datum() {
        let v = frame_to_json(&[cell("7", 0, 12.5, Some("Oceania"))]);
        assert_eq!(v["cells"][0]["id"], "7");
        assert_eq!(v["cells"][0]["width"], 12.5);
        assert_eq!(v["cells"][0]["label"], "Oceania");
    }
}
