//! CSV export of listing records.
//!
//! Same layout as the browser viewer's export: fixed column order, every
//! field quoted, embedded quotes doubled.

use std::io::Write;

use crate::types::ListingRecord;

pub const CSV_COLUMNS: [&str; 8] = [
    "query", "name", "address", "phone", "website", "rating", "reviews", "mapsUrl",
];

fn row(record: &ListingRecord) -> [&str; 8] {
    [
        record.query.as_str(),
        record.name.as_deref().unwrap_or_default(),
        record.address.as_deref().unwrap_or_default(),
        record.phone.as_deref().unwrap_or_default(),
        record.website.as_deref().unwrap_or_default(),
        record.rating.as_deref().unwrap_or_default(),
        record.reviews.as_deref().unwrap_or_default(),
        record.maps_url.as_str(),
    ]
}

/// Write a bare header line, then one fully quoted line per record
pub fn write_csv<W: Write>(mut w: W, records: &[ListingRecord]) -> csv::Result<()> {
    writeln!(w, "{}", CSV_COLUMNS.join(","))?;

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(w);

    for record in records {
        writer.write_record(row(record))?;
    }
    writer.flush()?;
    Ok(())
}
