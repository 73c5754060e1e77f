//! Extraction rules
//!
//! One rule per source markup shape. Rules only locate and lift text out of
//! the document; normalization and keying happen afterwards. A rule fails
//! with structural drift when the container it expects is missing entirely —
//! zero candidates from a present container is a separate, downstream call.

use crate::parse::ParseError;
use scraper::{ElementRef, Html, Selector};

/// Raw field texts lifted from the document, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawCandidate {
    pub name: Option<String>,
    pub venue: Option<String>,
    pub dates: Option<String>,
    pub buy_in: Option<String>,
    pub game_type: Option<String>,

    /// Snapshot of the element's text for the audit payload
    pub raw_text: String,
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn select_first_text(element: ElementRef, selectors: &str) -> Option<String> {
    let selector = Selector::parse(selectors).ok()?;
    element
        .select(&selector)
        .next()
        .map(element_text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Extracts candidates from `<table>` rows
///
/// A row qualifies when it has at least two cells and a dollar amount
/// somewhere in its text. The name is the longest mostly-alphabetic cell,
/// the date the first cell a date can be read from.
pub fn extract_table_rows(html: &str) -> Result<Vec<RawCandidate>, ParseError> {
    let document = Html::parse_document(html);

    let table_selector = Selector::parse("table")
        .map_err(|e| ParseError::Malformed(format!("selector: {}", e)))?;
    let row_selector = Selector::parse("tbody tr, table > tr")
        .map_err(|e| ParseError::Malformed(format!("selector: {}", e)))?;
    let cell_selector = Selector::parse("td")
        .map_err(|e| ParseError::Malformed(format!("selector: {}", e)))?;

    if document.select(&table_selector).next().is_none() {
        return Err(ParseError::StructuralDrift(
            "no schedule table in document".to_string(),
        ));
    }

    let mut candidates = Vec::new();

    for row in document.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| element_text(cell).trim().to_string())
            .collect();
        if cells.len() < 2 {
            continue;
        }

        let row_text = cells.join(" | ");
        if !row_text.contains('$') {
            continue;
        }

        let name = cells
            .iter()
            .filter(|text| !looks_like_date(text))
            .filter(|text| text.chars().filter(|c| c.is_alphabetic()).count() >= 4)
            .max_by_key(|text| text.len())
            .cloned();

        let dates = cells
            .iter()
            .find(|text| looks_like_date(text))
            .cloned();

        let buy_in = cells.iter().find(|text| text.contains('$')).cloned();

        candidates.push(RawCandidate {
            name,
            venue: None,
            dates,
            buy_in,
            game_type: None,
            raw_text: row_text,
        });
    }

    Ok(candidates)
}

/// Extracts candidates from repeated card/list elements
pub fn extract_cards(html: &str) -> Result<Vec<RawCandidate>, ParseError> {
    let document = Html::parse_document(html);

    let card_selector = Selector::parse(
        ".event-card, .tour-stop, .series-card, .tournament, li.event, article.event",
    )
    .map_err(|e| ParseError::Malformed(format!("selector: {}", e)))?;

    let cards: Vec<ElementRef> = document.select(&card_selector).collect();
    if cards.is_empty() {
        return Err(ParseError::StructuralDrift(
            "no event cards in document".to_string(),
        ));
    }

    let mut candidates = Vec::new();

    for card in cards {
        let text = element_text(card);
        let raw_text = text.trim().to_string();
        // Cards shorter than this are navigation or decoration
        if raw_text.len() < 20 {
            continue;
        }

        candidates.push(RawCandidate {
            name: select_first_text(card, "h2, h3, h4, .title, .name"),
            venue: select_first_text(card, ".venue, .location, .casino"),
            dates: select_first_text(card, ".dates, .date, .date-range"),
            buy_in: select_first_text(card, ".buy-in, .buyin, .price"),
            game_type: select_first_text(card, ".game, .game-type"),
            raw_text,
        });
    }

    Ok(candidates)
}

/// Extracts candidates from a JSON block embedded in the page
///
/// Looks for `<script type="application/ld+json">` and
/// `<script type="application/json">` blocks holding either an array of
/// event objects or an object with an `events` array.
pub fn extract_embedded_json(html: &str) -> Result<Vec<RawCandidate>, ParseError> {
    let document = Html::parse_document(html);

    let script_selector =
        Selector::parse("script[type=\"application/ld+json\"], script[type=\"application/json\"]")
            .map_err(|e| ParseError::Malformed(format!("selector: {}", e)))?;

    let blocks: Vec<String> = document
        .select(&script_selector)
        .map(|el| el.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect();

    if blocks.is_empty() {
        return Err(ParseError::StructuralDrift(
            "no embedded JSON block in document".to_string(),
        ));
    }

    let mut candidates = Vec::new();
    let mut parse_failures = 0;

    for block in &blocks {
        let value: serde_json::Value = match serde_json::from_str(block.trim()) {
            Ok(value) => value,
            Err(_) => {
                parse_failures += 1;
                continue;
            }
        };

        let items: Vec<&serde_json::Value> = match &value {
            serde_json::Value::Array(items) => items.iter().collect(),
            serde_json::Value::Object(map) => match map.get("events") {
                Some(serde_json::Value::Array(items)) => items.iter().collect(),
                _ => vec![&value],
            },
            _ => continue,
        };

        for item in items {
            if let Some(candidate) = json_candidate(item) {
                candidates.push(candidate);
            }
        }
    }

    if candidates.is_empty() && parse_failures == blocks.len() {
        return Err(ParseError::Malformed(
            "embedded JSON blocks were unreadable".to_string(),
        ));
    }

    Ok(candidates)
}

fn json_candidate(item: &serde_json::Value) -> Option<RawCandidate> {
    let object = item.as_object()?;

    let string_of = |keys: &[&str]| -> Option<String> {
        keys.iter().find_map(|key| {
            object.get(*key).and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Object(nested) => nested
                    .get("name")
                    .and_then(|n| n.as_str())
                    .map(str::to_string),
                _ => None,
            })
        })
    };

    Some(RawCandidate {
        name: string_of(&["name", "title", "eventName"]),
        venue: string_of(&["venue", "location", "casino"]),
        dates: string_of(&["startDate", "start_date", "date"]),
        buy_in: string_of(&["buyIn", "buy_in", "price", "offers"]),
        game_type: string_of(&["gameType", "game_type", "game"]),
        raw_text: item.to_string(),
    })
}

fn looks_like_date(text: &str) -> bool {
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    if !has_digit || text.contains('$') {
        return false;
    }
    let months = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = text.to_lowercase();
    text.contains('/') || text.contains('-') || months.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_HTML: &str = r#"
        <html><body>
        <table>
          <tbody>
            <tr><td>Jun 3</td><td>$600 Deepstack Opener</td><td>$600</td></tr>
            <tr><td>Jun 5</td><td>$1,100 Main Event</td><td>$1,100</td></tr>
            <tr><td colspan="3">Schedule subject to change</td></tr>
          </tbody>
        </table>
        </body></html>"#;

    #[test]
    fn test_table_rows_extracted() {
        let candidates = extract_table_rows(TABLE_HTML).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name.as_deref(), Some("$600 Deepstack Opener"));
        assert_eq!(candidates[0].dates.as_deref(), Some("Jun 3"));
        assert_eq!(candidates[1].buy_in.as_deref(), Some("$1,100 Main Event"));
    }

    #[test]
    fn test_table_missing_is_drift() {
        let error = extract_table_rows("<html><body><p>moved!</p></body></html>").unwrap_err();
        assert!(matches!(error, ParseError::StructuralDrift(_)));
    }

    #[test]
    fn test_empty_table_is_not_drift() {
        let html = "<html><body><table><tbody></tbody></table></body></html>";
        let candidates = extract_table_rows(html).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_rows_without_buy_in_skipped() {
        let html = r#"
            <table><tbody>
              <tr><td>Jun 3</td><td>Satellite qualifier day</td><td>free</td></tr>
            </tbody></table>"#;
        let candidates = extract_table_rows(html).unwrap();
        assert!(candidates.is_empty());
    }

    const CARDS_HTML: &str = r#"
        <html><body>
        <div class="event-card">
          <h3>RunGood Kansas City</h3>
          <span class="venue">Harrah's North Kansas City</span>
          <span class="dates">Jan 5 - Jan 11, 2026</span>
          <span class="buy-in">$675</span>
        </div>
        <div class="event-card">
          <h3>RunGood Tulsa</h3>
          <span class="venue">Hard Rock Tulsa</span>
          <span class="dates">Feb 2 - Feb 8, 2026</span>
          <span class="buy-in">$675</span>
        </div>
        </body></html>"#;

    #[test]
    fn test_cards_extracted() {
        let candidates = extract_cards(CARDS_HTML).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name.as_deref(), Some("RunGood Kansas City"));
        assert_eq!(
            candidates[0].venue.as_deref(),
            Some("Harrah's North Kansas City")
        );
        assert_eq!(candidates[1].dates.as_deref(), Some("Feb 2 - Feb 8, 2026"));
    }

    #[test]
    fn test_cards_missing_is_drift() {
        let error = extract_cards("<html><body><div>redesigned</div></body></html>").unwrap_err();
        assert!(matches!(error, ParseError::StructuralDrift(_)));
    }

    const JSON_HTML: &str = r#"
        <html><head>
        <script type="application/json">
        {"events": [
          {"name": "WPT Choctaw Championship", "venue": "Choctaw Durant",
           "startDate": "2026-01-09", "buyIn": 3800, "gameType": "No Limit Hold'em"},
          {"name": "WPT Prime Choctaw", "venue": "Choctaw Durant",
           "startDate": "2026-01-02", "buyIn": 1100}
        ]}
        </script>
        </head><body></body></html>"#;

    #[test]
    fn test_embedded_json_extracted() {
        let candidates = extract_embedded_json(JSON_HTML).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(
            candidates[0].name.as_deref(),
            Some("WPT Choctaw Championship")
        );
        assert_eq!(candidates[0].buy_in.as_deref(), Some("3800"));
        assert_eq!(candidates[1].dates.as_deref(), Some("2026-01-02"));
    }

    #[test]
    fn test_embedded_json_missing_is_drift() {
        let error = extract_embedded_json("<html><body></body></html>").unwrap_err();
        assert!(matches!(error, ParseError::StructuralDrift(_)));
    }

    #[test]
    fn test_embedded_json_unreadable_is_malformed() {
        let html = r#"<script type="application/json">{broken json</script>"#;
        let error = extract_embedded_json(html).unwrap_err();
        assert!(matches!(error, ParseError::Malformed(_)));
    }

    #[test]
    fn test_looks_like_date() {
        assert!(looks_like_date("Jun 3"));
        assert!(looks_like_date("06/03/2026"));
        assert!(looks_like_date("2026-06-03"));
        assert!(!looks_like_date("$1,100"));
        assert!(!looks_like_date("Main Event"));
    }
}
