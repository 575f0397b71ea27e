use std::fmt::Write;

use html_escape::{encode_double_quoted_attribute, encode_text};

use super::types::StatRecord;

/// Sort by `metric_value`, best first, and keep the top `top_n`.
///
/// The sort is stable, so equal values keep their upstream order.
pub fn rank(mut records: Vec<StatRecord>, top_n: usize) -> Vec<StatRecord> {
    records.sort_by(|a, b| b.metric_value.total_cmp(&a.metric_value));
    records.truncate(top_n);
    records
}

/// One line of HTML per record, numbered from 1.
pub fn format_record(rank: usize, record: &StatRecord) -> String {
    let mut line = format!(
        "{}. {} — {:.2}%",
        rank,
        encode_text(&record.name),
        record.metric_value
    );

    if let Some(secondary) = record.secondary_value {
        let _ = write!(line, " | 📈 {:.2}%", secondary);
    }

    if let Some(image_url) = &record.image_url {
        let _ = write!(
            line,
            " <a href=\"{}\">🖼</a>",
            encode_double_quoted_attribute(image_url)
        );
    }

    line
}

pub fn rank_and_format(records: Vec<StatRecord>, top_n: usize) -> Vec<String> {
    rank(records, top_n)
        .iter()
        .enumerate()
        .map(|(i, record)| format_record(i + 1, record))
        .collect()
}
