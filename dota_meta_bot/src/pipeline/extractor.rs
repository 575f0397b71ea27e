//! Turns raw upstream bodies into [`StatRecord`]s.
//!
//! Upstream markup changes without notice, so nothing in here indexes
//! blindly: every cell and field is looked up with a checked accessor,
//! and a bad row only costs that row.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use url::Url;

use super::{
    types::{ContentKind, ExtractError, Payload, StatRecord},
    Mode,
};
use crate::config::STATS_API_IMAGE_BASE;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.sortable").expect("Selector will always be valid"));
static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("Selector will always be valid"));
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("Selector will always be valid"));
static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("Selector will always be valid"));

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Stats API entries need strictly more picks than this to count,
    /// so entries with zero picks never count.
    pub min_picks: u64,
    /// Relative image links in HTML get resolved against this.
    pub base_url: Option<Url>,
}

/// Which cells of a table row hold what.
#[derive(Debug, Clone, Copy)]
struct RowLayout {
    name: usize,
    metric: usize,
    secondary: Option<usize>,
}

impl RowLayout {
    fn for_mode(mode: Mode) -> Option<Self> {
        match mode {
            // Icon, hero, win rate, pick rate.
            Mode::Leaderboard => Some(Self {
                name: 1,
                metric: 2,
                secondary: Some(3),
            }),
            // Icon, item, matches played, win rate.
            Mode::ItemBuild => Some(Self {
                name: 1,
                metric: 3,
                secondary: None,
            }),
            Mode::ApiHeroStats => None,
        }
    }

    fn min_cells(&self) -> usize {
        self.name.max(self.metric).max(self.secondary.unwrap_or(0)) + 1
    }
}

pub fn extract(
    payload: &Payload,
    mode: Mode,
    options: &ExtractOptions,
) -> Result<Vec<StatRecord>, ExtractError> {
    let records = match (mode, payload.kind) {
        (Mode::Leaderboard | Mode::ItemBuild, ContentKind::Html) => {
            let Some(layout) = RowLayout::for_mode(mode) else {
                return Err(ExtractError::MarkupChanged);
            };
            extract_table(&payload.body, layout, options.base_url.as_ref())?
        }
        (Mode::ApiHeroStats, ContentKind::Json) => {
            extract_hero_stats(&payload.body, options.min_picks)?
        }
        // Got the wrong kind of document altogether.
        _ => return Err(ExtractError::MarkupChanged),
    };

    if records.is_empty() {
        return Err(ExtractError::EmptyResult);
    }

    Ok(records)
}

fn extract_table(
    html: &str,
    layout: RowLayout,
    base_url: Option<&Url>,
) -> Result<Vec<StatRecord>, ExtractError> {
    let document = Html::parse_document(html);

    let Some(table) = document.select(&TABLE).next() else {
        return Err(ExtractError::MarkupChanged);
    };

    let mut records = Vec::new();

    for row in table.select(&ROW) {
        let cells: Vec<ElementRef> = row.select(&CELL).collect();

        // Header rows are all <th>, so they land here too.
        if cells.len() < layout.min_cells() {
            continue;
        }

        match parse_row(&row, &cells, layout, base_url) {
            Ok(record) => records.push(record),
            Err(e) => log::debug!("Skipping a row: {}", e),
        }
    }

    Ok(records)
}

fn parse_row(
    row: &ElementRef,
    cells: &[ElementRef],
    layout: RowLayout,
    base_url: Option<&Url>,
) -> Result<StatRecord, ExtractError> {
    let name = cells
        .get(layout.name)
        .map(cell_text)
        .filter(|x| !x.is_empty())
        .ok_or_else(|| ExtractError::MalformedField("empty name".to_string()))?;

    let metric_value = cells
        .get(layout.metric)
        .map(cell_text)
        .ok_or_else(|| ExtractError::MalformedField("no metric cell".to_string()))
        .and_then(|x| parse_number(&x))?;

    // Popularity is nice to have. An unreadable one doesn't sink the row.
    let secondary_value = layout
        .secondary
        .and_then(|i| cells.get(i))
        .map(cell_text)
        .and_then(|x| parse_number(&x).ok());

    let image_url = row
        .select(&IMAGE)
        .next()
        .and_then(|img| {
            let value = img.value();
            value.attr("data-src").or_else(|| value.attr("src"))
        })
        .and_then(|src| resolve(src, base_url));

    Ok(StatRecord {
        name,
        metric_value,
        secondary_value,
        image_url,
    })
}

/// All text inside a cell with whitespace collapsed.
fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads things like `"52.34%"` or `"1,234"`.
fn parse_number(text: &str) -> Result<f64, ExtractError> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '%' | ',') && !c.is_whitespace())
        .collect();

    match cleaned.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(ExtractError::MalformedField(format!(
            "{:?} is not a number",
            text
        ))),
    }
}

fn resolve(src: &str, base_url: Option<&Url>) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    match Url::parse(src) {
        Ok(url) => Some(url.into()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base_url.and_then(|base| base.join(src).ok()).map(Into::into)
        }
        Err(_) => None,
    }
}

#[derive(Debug, Deserialize)]
struct HeroStatsEntry {
    localized_name: String,
    #[serde(default)]
    pro_win: Option<u64>,
    #[serde(default)]
    pro_pick: Option<u64>,
    #[serde(default)]
    img: Option<String>,
}

fn extract_hero_stats(body: &str, min_picks: u64) -> Result<Vec<StatRecord>, ExtractError> {
    let Ok(serde_json::Value::Array(entries)) = serde_json::from_str::<serde_json::Value>(body) else {
        return Err(ExtractError::MarkupChanged);
    };

    let image_base = Url::parse(STATS_API_IMAGE_BASE).ok();

    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let entry: HeroStatsEntry = match serde_json::from_value(entry) {
            Ok(x) => x,
            Err(e) => {
                log::debug!("Skipping a hero stats entry: {}", e);
                continue;
            }
        };

        let picks = entry.pro_pick.unwrap_or(0);
        let wins = entry.pro_win.unwrap_or(0);

        // Zero picks has no meaningful rate. Leave it out instead of dividing.
        if picks <= min_picks {
            continue;
        }

        let rate = wins as f64 / picks as f64 * 100.0;

        records.push(StatRecord {
            name: entry.localized_name,
            metric_value: (rate * 100.0).round() / 100.0,
            secondary_value: None,
            image_url: entry
                .img
                .as_deref()
                .map(|x| x.trim_end_matches('?'))
                .and_then(|x| resolve(x, image_base.as_ref())),
        });
    }

    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use url::Url;

    use super::{extract, parse_number, ExtractOptions};
    use crate::pipeline::{
        types::{ExtractError, Payload},
        Mode,
    };

    /// A leaderboard page with a header row and `rows` rows of
    /// `(name, win rate, pick rate)`.
    pub(crate) fn leaderboard_html(rows: &[(&str, &str, &str)]) -> String {
        let mut html = String::from(concat!(
            "<html><body><h1>Meta</h1>",
            "<table class=\"sortable\"><thead><tr>",
            "<th></th><th>Hero</th><th>Win Rate</th><th>Pick Rate</th>",
            "</tr></thead><tbody>"
        ));
        for (name, win, pick) in rows {
            html.push_str(&format!(
                concat!(
                    "<tr><td><img src=\"/assets/heroes/{}.jpg\"></td>",
                    "<td><a href=\"/heroes/x\">{}</a></td><td>{}</td><td>{}</td></tr>"
                ),
                name.to_lowercase(),
                name,
                win,
                pick
            ));
        }
        html.push_str("</tbody></table></body></html>");
        html
    }

    pub(crate) fn ten_heroes() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("Sven", "51.20%", "10.1%"),
            ("Lion", "48.05%", "12.0%"),
            ("Invoker", "55.90%", "8.5%"),
            ("Pudge", "49.99%", "20.3%"),
            ("Axe", "53.10%", "9.9%"),
            ("Lina", "47.00%", "7.7%"),
            ("Tiny", "50.50%", "6.2%"),
            ("Zeus", "54.40%", "5.5%"),
            ("Ursa", "52.00%", "4.4%"),
            ("Slark", "46.60%", "11.1%"),
        ]
    }

    fn options() -> ExtractOptions {
        ExtractOptions {
            min_picks: 20,
            base_url: Some(Url::parse("https://www.dotabuff.com/heroes/meta").unwrap()),
        }
    }

    #[test]
    fn leaderboard() {
        let payload = Payload::html(leaderboard_html(&ten_heroes()));
        let records = extract(&payload, Mode::Leaderboard, &options()).unwrap();

        assert_eq!(records.len(), 10);
        assert_eq!(records[0].name, "Sven");
        assert_eq!(records[0].metric_value, 51.2);
        assert_eq!(records[0].secondary_value, Some(10.1));
        assert_eq!(
            records[0].image_url.as_deref(),
            Some("https://www.dotabuff.com/assets/heroes/sven.jpg")
        );
        // Upstream order is kept.
        assert_eq!(records[9].name, "Slark");
    }

    #[test]
    fn leaderboard_skips_bad_rows() {
        let mut html = leaderboard_html(&[
            ("Sven", "51.20%", "10.1%"),
            ("Lion", "n/a", "12.0%"),
            ("Axe", "53.10%", "??"),
        ]);
        // A short row, as if someone put an ad in the table.
        html = html.replace(
            "</tbody>",
            "<tr><td colspan=\"4\">Sponsored</td></tr></tbody>",
        );

        let records = extract(&Payload::html(html), Mode::Leaderboard, &options()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Sven");
        assert_eq!(records[1].name, "Axe");
        assert_eq!(records[1].secondary_value, None);
    }

    #[test]
    fn missing_table() {
        let html = "<html><body><p>We moved things around, sorry!</p></body></html>";
        assert_eq!(
            extract(&Payload::html(html), Mode::Leaderboard, &options()),
            Err(ExtractError::MarkupChanged)
        );
        assert_eq!(
            extract(&Payload::html(html), Mode::ItemBuild, &options()),
            Err(ExtractError::MarkupChanged)
        );
    }

    #[test]
    fn empty_table() {
        let html = leaderboard_html(&[]);
        assert_eq!(
            extract(&Payload::html(html), Mode::Leaderboard, &options()),
            Err(ExtractError::EmptyResult)
        );

        let html = leaderboard_html(&[("Sven", "soon", "")]);
        assert_eq!(
            extract(&Payload::html(html), Mode::Leaderboard, &options()),
            Err(ExtractError::EmptyResult)
        );
    }

    #[test]
    fn item_build() {
        let html = concat!(
            "<table class=\"sortable\">",
            "<tr><th></th><th>Item</th><th>Matches</th><th>Win Rate</th></tr>",
            "<tr><td><img src=\"https://cdn.example/blink.png\"></td><td>Blink Dagger</td>",
            "<td>1,204,335</td><td>54.12%</td></tr>",
            "<tr><td></td><td>Black King Bar</td><td>998,001</td><td>56.01%</td></tr>",
            "<tr><td></td><td>Tango</td><td>2,000,000</td></tr>",
            "</table>"
        );

        let records = extract(&Payload::html(html), Mode::ItemBuild, &options()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Blink Dagger");
        assert_eq!(records[0].metric_value, 54.12);
        assert_eq!(records[0].secondary_value, None);
        assert_eq!(
            records[0].image_url.as_deref(),
            Some("https://cdn.example/blink.png")
        );
        assert_eq!(records[1].image_url, None);
    }

    #[test]
    fn hero_stats() {
        let json = r#"[
            {"localized_name":"Sven","pro_win":40,"pro_pick":100,"img":"/apps/dota2/images/dota_react/heroes/sven.png?"},
            {"localized_name":"Lion","pro_win":10,"pro_pick":100}
        ]"#;

        let records = extract(&Payload::json(json), Mode::ApiHeroStats, &options()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Sven");
        assert_eq!(records[0].metric_value, 40.0);
        assert_eq!(
            records[0].image_url.as_deref(),
            Some("https://cdn.cloudflare.steamstatic.com/apps/dota2/images/dota_react/heroes/sven.png")
        );
        assert_eq!(records[1].name, "Lion");
        assert_eq!(records[1].metric_value, 10.0);
    }

    #[test]
    fn hero_stats_threshold_and_rounding() {
        let json = r#"[
            {"localized_name":"Sven","pro_win":1,"pro_pick":3},
            {"localized_name":"Lion","pro_win":7,"pro_pick":30},
            {"localized_name":"Axe","pro_win":null,"pro_pick":null},
            {"localized_name":"Broken","pro_win":"many","pro_pick":40},
            {"name":"no localized name","pro_win":1,"pro_pick":40}
        ]"#;

        let records = extract(&Payload::json(json), Mode::ApiHeroStats, &options()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Lion");
        assert_eq!(records[0].metric_value, 23.33);

        let lenient = ExtractOptions {
            min_picks: 0,
            ..options()
        };
        let records = extract(&Payload::json(json), Mode::ApiHeroStats, &lenient).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metric_value, 33.33);
    }

    #[test]
    fn hero_stats_threshold_is_exclusive() {
        let json = r#"[
            {"localized_name":"Sven","pro_win":10,"pro_pick":20},
            {"localized_name":"Lion","pro_win":7,"pro_pick":21}
        ]"#;

        let records = extract(&Payload::json(json), Mode::ApiHeroStats, &options()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Lion");
        assert_eq!(records[0].metric_value, 33.33);

        let only_sven = r#"[{"localized_name":"Sven","pro_win":10,"pro_pick":20}]"#;
        assert_eq!(
            extract(&Payload::json(only_sven), Mode::ApiHeroStats, &options()),
            Err(ExtractError::EmptyResult)
        );
    }

    #[test]
    fn hero_stats_zero_picks() {
        let json = r#"[
            {"localized_name":"Sven","pro_win":0,"pro_pick":0},
            {"localized_name":"Lion","pro_win":5,"pro_pick":0}
        ]"#;
        let lenient = ExtractOptions {
            min_picks: 0,
            ..options()
        };
        assert_eq!(
            extract(&Payload::json(json), Mode::ApiHeroStats, &lenient),
            Err(ExtractError::EmptyResult)
        );
        assert_eq!(
            extract(&Payload::json("[]"), Mode::ApiHeroStats, &lenient),
            Err(ExtractError::EmptyResult)
        );
    }

    #[test]
    fn hero_stats_wrong_shape() {
        for body in ["{\"error\":\"rate limited\"}", "<html></html>", ""] {
            assert_eq!(
                extract(&Payload::json(body), Mode::ApiHeroStats, &options()),
                Err(ExtractError::MarkupChanged)
            );
        }
    }

    #[test]
    fn wrong_payload_kind() {
        assert_eq!(
            extract(&Payload::json("[]"), Mode::Leaderboard, &options()),
            Err(ExtractError::MarkupChanged)
        );
        assert_eq!(
            extract(&Payload::html("[]"), Mode::ApiHeroStats, &options()),
            Err(ExtractError::MarkupChanged)
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("52.34%").unwrap(), 52.34);
        assert_eq!(parse_number(" 1,234 ").unwrap(), 1234.0);
        assert!(parse_number("NaN").is_err());
        assert!(parse_number("inf%").is_err());
        assert!(parse_number("").is_err());
    }
}
