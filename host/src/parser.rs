//! ==============================================================================
//! parser.rs - field frame parser
//! ==============================================================================
//!
//! purpose:
//!     turns one raw frame (text relayed by the radio gateway) into readings.
//!
//! frame shape:
//!
//! ```text
//!     Nodo: nodo-07
//!     RSSI: -81 dBm
//!     Datos: Lat=4.60971 Lon=-74.08175 Sat=7 Msg=Bat: 3.95 Temp: 21.5 pH: 7.1 EC: 0.45 DO: 8.2
//!     ----------------------
//!     Nodo: nodo-08
//!     ...
//! ```
//!
//! fault isolation:
//!     every section is parsed on its own. a section is DROPPED when:
//!     - its label has no digits (no node id)
//!     - it has no `Datos:` line
//!     - its `Msg=` segment is missing or blank
//!     inside a kept section, a field that is missing or not a number becomes
//!     None (measurements) or 0 (gps). nothing here ever fails the whole frame.
//!
//! ==============================================================================

use crate::domain::{NodeId, Reading};

/// keyword that opens every node section
pub const SECTION_KEYWORD: &str = "Nodo:";
/// marker of the content line that carries gps and the message
pub const PAYLOAD_MARKER: &str = "Datos:";
/// start of the free-text message inside the content line
pub const MESSAGE_MARKER: &str = "Msg=";

/// parse a raw frame into one reading per usable section
pub fn parse(raw: &str) -> Vec<Reading> {
    raw.split(SECTION_KEYWORD)
        .filter(|chunk| !chunk.trim().is_empty())
        .filter_map(parse_section)
        .collect()
}

/// parse one section (the text after a `Nodo:` keyword)
fn parse_section(chunk: &str) -> Option<Reading> {
    let mut lines = chunk.trim().lines();
    let node = NodeId::normalize(lines.next()?.trim())?;

    let content = lines.find(|l| l.contains(PAYLOAD_MARKER))?;
    let (gps_part, message) = split_message(content);
    let message = message?;
    if message.trim().is_empty() {
        return None;
    }

    // battery 0 means a broken sense line, not an empty cell
    let battery_voltage = labelled_number(message, "bat:").filter(|v| *v != 0.0);

    Some(Reading {
        node,
        battery_voltage,
        temperature: labelled_number(message, "temp:"),
        ph: labelled_number(message, "ph:"),
        conductivity: labelled_number(message, "ec:"),
        dissolved_oxygen: labelled_number(message, "do:"),
        latitude: keyed_signed(gps_part, "Lat=").unwrap_or(0.0),
        longitude: keyed_signed(gps_part, "Lon=").unwrap_or(0.0),
        satellites: keyed_count(gps_part, "Sat=").unwrap_or(0),
    })
}

/// split a content line into (text before `Msg=`, message after it)
fn split_message(line: &str) -> (&str, Option<&str>) {
    match line.find(MESSAGE_MARKER) {
        Some(at) => (&line[..at], Some(&line[at + MESSAGE_MARKER.len()..])),
        None => (line, None),
    }
}

/// does this frame carry at least one non-blank message?
///
/// used at the transport boundary so gateways that relay keep-alive frames
/// (`Msg=` with nothing after it) never reach the aggregator.
pub fn has_message(raw: &str) -> bool {
    raw.lines()
        .filter_map(|l| split_message(l).1)
        .any(|msg| !msg.trim().is_empty())
}

// ==============================================================================
// token extraction
// ==============================================================================

/// case-insensitive `label` followed by optional whitespace and an unsigned
/// decimal. the first occurrence that is followed by a number wins.
fn labelled_number(message: &str, label: &str) -> Option<f64> {
    // ascii lowercasing keeps byte offsets intact
    let haystack = message.to_ascii_lowercase();
    let mut from = 0;

    while let Some(pos) = haystack[from..].find(label) {
        let start = from + pos + label.len();
        let rest = message[start..].trim_start();
        let token = leading_run(rest, |c| c.is_ascii_digit() || c == '.');
        if !token.is_empty() {
            return leading_decimal(token);
        }
        from = start;
    }
    None
}

/// case-sensitive `key` immediately followed by a signed decimal
fn keyed_signed(line: &str, key: &str) -> Option<f64> {
    let at = line.find(key)?;
    let rest = &line[at + key.len()..];
    let token = leading_run(rest, |c| c.is_ascii_digit() || c == '.' || c == '-');
    let (negative, unsigned) = match token.strip_prefix('-') {
        Some(tail) => (true, tail),
        None => (false, token),
    };
    let value = leading_decimal(unsigned)?;
    Some(if negative { -value } else { value })
}

/// case-sensitive `key` immediately followed by a non-negative integer
fn keyed_count(line: &str, key: &str) -> Option<u32> {
    let at = line.find(key)?;
    let token = leading_run(&line[at + key.len()..], |c| c.is_ascii_digit());
    token.parse().ok()
}

fn leading_run(s: &str, accept: impl Fn(char) -> bool) -> &str {
    let end = s.find(|c: char| !accept(c)).unwrap_or(s.len());
    &s[..end]
}

/// longest `digits[.digits]` prefix of `token` as a number
///
/// `"3.7.1"` reads as 3.7, `".5"` as 0.5, `"."` as nothing.
fn leading_decimal(token: &str) -> Option<f64> {
    let int_len = leading_run(token, |c| c.is_ascii_digit()).len();
    let mut end = int_len;
    if token[int_len..].starts_with('.') {
        let frac_len = leading_run(&token[int_len + 1..], |c| c.is_ascii_digit()).len();
        if frac_len > 0 {
            end = int_len + 1 + frac_len;
        }
    }
    if end == 0 {
        return None;
    }
    token[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "Nodo: nodo-07\n\
        RSSI: -81 dBm\n\
        Datos: Lat=4.60971 Lon=-74.08175 Sat=7 Msg=Bat: 3.95 Temp: 21.5 pH: 7.1 EC: 0.45 DO: 8.2\n\
        ----------------------\n";

    #[test]
    fn parses_full_section() {
        let readings = parse(FULL);
        assert_eq!(readings.len(), 1);
        let r = &readings[0];
        assert_eq!(r.node.as_str(), "NODE07");
        assert_eq!(r.battery_voltage, Some(3.95));
        assert_eq!(r.temperature, Some(21.5));
        assert_eq!(r.ph, Some(7.1));
        assert_eq!(r.conductivity, Some(0.45));
        assert_eq!(r.dissolved_oxygen, Some(8.2));
        assert_eq!(r.latitude, 4.60971);
        assert_eq!(r.longitude, -74.08175);
        assert_eq!(r.satellites, 7);
    }

    #[test]
    fn empty_message_section_is_dropped_but_sibling_survives() {
        let frame = format!(
            "{FULL}Nodo: nodo 8\nDatos: Lat=1.0 Lon=2.0 Sat=3 Msg=   \n----------------------\n"
        );
        let readings = parse(&frame);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].node.as_str(), "NODE07");
    }

    #[test]
    fn partial_message_leaves_missing_fields_none() {
        let readings = parse("Nodo: 3\nDatos: Msg=temp:19.25 PH: 6.8\n");
        assert_eq!(readings.len(), 1);
        let r = &readings[0];
        assert_eq!(r.temperature, Some(19.25));
        assert_eq!(r.ph, Some(6.8));
        assert_eq!(r.battery_voltage, None);
        assert_eq!(r.conductivity, None);
        assert_eq!(r.dissolved_oxygen, None);
        assert_eq!((r.latitude, r.longitude, r.satellites), (0.0, 0.0, 0));
    }

    #[test]
    fn zero_battery_is_absent() {
        let r = &parse("Nodo: 5\nDatos: Msg=Bat: 0.00 Temp: 20")[0];
        assert_eq!(r.battery_voltage, None);
        assert_eq!(r.temperature, Some(20.0));
    }

    #[test]
    fn non_numeric_value_is_none() {
        let r = &parse("Nodo: 5\nDatos: Msg=Bat: low Temp: err pH: 7")[0];
        assert_eq!(r.battery_voltage, None);
        assert_eq!(r.temperature, None);
        assert_eq!(r.ph, Some(7.0));
    }

    #[test]
    fn sections_without_usable_label_or_payload_are_skipped() {
        let frame = "Nodo: gateway\nDatos: Msg=Temp: 1\n\
            Nodo: 9\nRSSI: -70\n\
            Nodo: 10\nDatos: Lat=1 Sat=2\n\
            Nodo: 11\nDatos: Msg=DO: 7.5\n";
        let readings = parse(frame);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].node.as_str(), "NODE11");
        assert_eq!(readings[0].dissolved_oxygen, Some(7.5));
    }

    #[test]
    fn gps_is_read_from_content_line_only() {
        let r = &parse("Nodo: 2\nDatos: Sat=4 Msg=Temp: 20 Lat=9.9 Sat=12")[0];
        assert_eq!(r.latitude, 0.0);
        assert_eq!(r.satellites, 4);
    }

    #[test]
    fn malformed_gps_defaults_to_zero() {
        let r = &parse("Nodo: 2\nDatos: Lat=- Lon=abc Sat=x Msg=Temp: 20")[0];
        assert_eq!((r.latitude, r.longitude, r.satellites), (0.0, 0.0, 0));
    }

    #[test]
    fn decimal_prefix_rules() {
        assert_eq!(leading_decimal("3.7.1"), Some(3.7));
        assert_eq!(leading_decimal(".5"), Some(0.5));
        assert_eq!(leading_decimal("12."), Some(12.0));
        assert_eq!(leading_decimal("."), None);
        assert_eq!(leading_decimal(""), None);
    }

    #[test]
    fn later_label_occurrence_is_used_when_first_has_no_number() {
        assert_eq!(labelled_number("DO: -- do: 6.4", "do:"), Some(6.4));
    }

    #[test]
    fn has_message_detects_blank_payloads() {
        assert!(has_message(FULL));
        assert!(!has_message("Nodo: 1\nDatos: Lat=1 Msg=  \n"));
        assert!(!has_message("Nodo: 1\nDatos: Lat=1\n"));
    }
}
