use csv::{QuoteStyle, WriterBuilder};

/// UTF-8 byte order mark so spreadsheet apps detect the encoding.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn needs_formula_guard(value: &str) -> bool {
    matches!(value.chars().next(), Some('=' | '+' | '-' | '@'))
}

/// Flattens line breaks and prefixes formula-looking cells with a quote.
pub fn sanitize_cell(value: &str) -> String {
    let mut sanitized = value.replace("\r\n", " ").replace(['\r', '\n'], " ");
    if needs_formula_guard(&sanitized) {
        sanitized.insert(0, '\'');
    }
    sanitized
}

/// Renders a BOM-prefixed CSV document where every cell is quoted.
pub fn write_csv<I, R>(header: &[&str], rows: I) -> anyhow::Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(UTF8_BOM.to_vec());

    writer.write_record(header)?;
    for row in rows {
        let cells: Vec<String> = row.into_iter().map(|cell| sanitize_cell(&cell)).collect();
        writer.write_record(&cells)?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))
}
