use std::io::Write;

use serde_json::Value;

use crate::category::Category;
use crate::error::AppError;
use crate::sink::ResultSink;
use crate::store::KeyValueStore;

const COMMON_COLUMNS: &[&str] = &[
    "title",
    "description",
    "event_link",
    "price",
    "display_photo",
    "photos",
    "time_zone",
    "hosts",
    "sponsors",
    "address_line_1",
    "city",
    "province_state",
    "postal_zip_code",
    "country",
    "lat",
    "lng",
    "contact_email",
    "contact_website",
    "contact_primary_phone",
];

/// Output columns for a category, in order.
pub fn columns(category: Category) -> Vec<&'static str> {
    let extra: &[&str] = match category {
        Category::Event => &["time_slots"],
        Category::Festival => &["start_date", "end_date"],
        Category::Sport => &["sport_type", "venue", "time_slots"],
    };
    COMMON_COLUMNS.iter().chain(extra).copied().collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        // lists and nested objects are kept as JSON text
        Some(other) => other.to_string(),
    }
}

/// Write records as CSV. Returns the number of data rows written.
pub fn write_csv<W: Write>(
    category: Category,
    records: &[Value],
    writer: W,
) -> Result<usize, AppError> {
    let columns = columns(category);
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&columns)?;
    for record in records {
        csv.write_record(columns.iter().map(|c| cell(record.get(*c))))?;
    }
    csv.flush()
        .map_err(|e| AppError::IngestError(format!("failed to flush CSV output: {e}")))?;
    Ok(records.len())
}

/// Export every stored record of a category.
pub async fn export_csv<S: KeyValueStore, W: Write>(
    sink: &ResultSink<S>,
    category: Category,
    writer: W,
) -> Result<usize, AppError> {
    let records = sink.all(category).await?;
    let written = write_csv(category, &records, writer)?;
    tracing::info!(%category, rows = written, "Exported records");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn columns_depend_on_category() {
        let festival = columns(Category::Festival);
        assert_eq!(festival[0], "title");
        assert_eq!(&festival[festival.len() - 2..], ["start_date", "end_date"]);
        assert_eq!(columns(Category::Sport).last(), Some(&"time_slots"));
    }

    #[tokio::test]
    async fn exports_stored_records() {
        let sink = ResultSink::new(MemoryStore::new());
        sink.append(
            Category::Event,
            &json!({
                "title": "Jazz, live",
                "event_link": "https://x.io/jazz",
                "photos": ["a.jpg", "b.jpg"],
                "lat": 50.5,
                "time_slots": ["2025-07-01 19:00"]
            }),
        )
        .await
        .unwrap();

        let mut out = Vec::new();
        let rows = export_csv(&sink, Category::Event, &mut out).await.unwrap();
        assert_eq!(rows, 1);

        let text = String::from_utf8(out).unwrap();
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), COMMON_COLUMNS.len() + 1);

        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "Jazz, live");
        assert_eq!(&row[1], "");
        assert_eq!(&row[5], r#"["a.jpg","b.jpg"]"#);
        assert_eq!(&row[14], "50.5");
        assert_eq!(&row[19], r#"["2025-07-01 19:00"]"#);
    }
}
