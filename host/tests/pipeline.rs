//! frame in, history out, through the public api only

use chrono::{Local, TimeZone};
use field_hub::query::TimeWindow;
use field_hub::record::LOG_HEADER;
use field_hub::{LogFlusher, QueryEngine, StateAggregator};

const FRAME: &str = "Nodo: nodo-07!!\n\
    RSSI: -81 dBm\n\
    Datos: Lat=4.60971 Lon=-74.08175 Sat=7 Msg=Bat: 4.20 Temp: 21.5 pH: 7.1 EC: 0.45 DO: 8.2\n\
    ----------------------\n\
    Nodo: NODO 12\n\
    Datos: Lat=0 Lon=0 Sat=0 Msg=\n\
    ----------------------\n";

#[tokio::test]
async fn frame_to_log_to_query() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("datos_sensores.txt");

    let aggregator = StateAggregator::new(16);
    let flusher = LogFlusher::new(&path, aggregator.clone());
    let engine = QueryEngine::new(&path);

    let merged = aggregator.ingest_frame(FRAME).await;
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].battery_percent, Some(100));

    // a temperature-only update keeps the rest of the node's state
    aggregator
        .ingest_frame("Nodo: nodo 07\nDatos: Msg=Temp: 22.0\n")
        .await;

    let noon = Local.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
    assert_eq!(flusher.tick_at(noon).await, 1);
    // nothing new since the last tick
    assert_eq!(flusher.tick_at(noon).await, 0);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().next(), Some(LOG_HEADER));
    assert_eq!(content.lines().count(), 2);

    assert_eq!(engine.nodes(), vec!["NODE07"]);
    let points = engine.history("NODE07", "18/10/2026", TimeWindow::whole_day());
    assert_eq!(points.len(), 1);
    let p = &points[0];
    assert_eq!(p.time, "12:00");
    assert_eq!(p.battery, Some(4.2));
    assert_eq!(p.temperature, Some(22.0));
    assert_eq!(p.ph, Some(7.1));
    assert_eq!(p.conductivity, Some(0.45));
    assert_eq!(p.dissolved_oxygen, Some(8.2));

    assert!(engine.query("NODE07", "18/10/2026", "12:01", "23:59").is_empty());
    assert!(engine.query("NODE07", "19/10/2026", "00:00", "23:59").is_empty());
}
