use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::models::{MeasurementSummary, NewMeasurement, RawReading, ScanEntry};

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementInsert {
    Inserted(i32),
    Duplicate,
}

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let mut attempt = 1;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(err) if attempt < CONNECT_ATTEMPTS => {
                log::warn!(
                    "database connection failed (attempt {attempt} of {CONNECT_ATTEMPTS}): {err}"
                );
                tokio::time::sleep(CONNECT_DELAY).await;
                attempt += 1;
            }
            Err(err) => {
                log::error!("database connection failed after {CONNECT_ATTEMPTS} attempts: {err}");
                return Err(err).context("failed to connect to Postgres");
            }
        }
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let rooms = [
        ("A-101", -42, -67, -81),
        ("A-102", -71, -44, -77),
        ("B-201", -84, -73, -46),
    ];
    let routers = [
        ("00:1a:2b:3c:4d:01", "eduroam"),
        ("00:1a:2b:3c:4d:02", "eduroam"),
        ("00:1a:2b:3c:4d:03", "campus-guest"),
    ];

    let mut inserted = 0usize;
    for (room_index, (room_name, first, second, third)) in rooms.iter().enumerate() {
        for sample in 0..3i32 {
            let jitter = sample * 2 - 2;
            let measurement = NewMeasurement {
                room_name: room_name.to_string(),
                device_id: "seed-device".to_string(),
                timestamp: 1_767_225_600 + (room_index as i64) * 60 + i64::from(sample),
                routers: routers
                    .iter()
                    .zip([*first, *second, *third])
                    .map(|((bssid, ssid), signal)| ScanEntry {
                        bssid: bssid.to_string(),
                        ssid: ssid.to_string(),
                        signal_strength: signal + jitter,
                    })
                    .collect(),
            };

            if let MeasurementInsert::Inserted(_) = add_measurement(pool, &measurement).await? {
                inserted += 1;
            }
        }
    }

    Ok(inserted)
}

pub async fn add_measurement(
    pool: &PgPool,
    measurement: &NewMeasurement,
) -> anyhow::Result<MeasurementInsert> {
    if measurement.room_name.trim().is_empty()
        || measurement.device_id.trim().is_empty()
        || measurement.timestamp <= 0
        || measurement.routers.is_empty()
    {
        anyhow::bail!("measurement is missing room_name, device_id, timestamp or routers");
    }

    let timestamp: NaiveDateTime = DateTime::from_timestamp(measurement.timestamp, 0)
        .context("timestamp out of range")?
        .naive_utc();

    let mut tx = pool.begin().await?;

    let room_id: i32 = sqlx::query(
        r#"
        INSERT INTO room_locator.rooms (room_name)
        VALUES ($1)
        ON CONFLICT (room_name) DO UPDATE SET room_name = EXCLUDED.room_name
        RETURNING room_id
        "#,
    )
    .bind(&measurement.room_name)
    .fetch_one(&mut *tx)
    .await?
    .get("room_id");

    let measurement_id: Option<i32> = sqlx::query(
        r#"
        INSERT INTO room_locator.measurements (timestamp, device_id, room_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (device_id, timestamp) DO NOTHING
        RETURNING measurement_id
        "#,
    )
    .bind(timestamp)
    .bind(&measurement.device_id)
    .bind(room_id)
    .fetch_optional(&mut *tx)
    .await?
    .map(|row| row.get("measurement_id"));

    let Some(measurement_id) = measurement_id else {
        tx.rollback().await?;
        log::info!(
            "measurement from {} at {} already exists",
            measurement.device_id,
            timestamp
        );
        return Ok(MeasurementInsert::Duplicate);
    };

    for router in &measurement.routers {
        if router.bssid.trim().is_empty() {
            continue;
        }

        let router_id: i32 = sqlx::query(
            r#"
            INSERT INTO room_locator.routers (bssid, ssid)
            VALUES ($1, $2)
            ON CONFLICT (bssid) DO UPDATE SET bssid = EXCLUDED.bssid
            RETURNING router_id
            "#,
        )
        .bind(&router.bssid)
        .bind(&router.ssid)
        .fetch_one(&mut *tx)
        .await?
        .get("router_id");

        sqlx::query(
            r#"
            INSERT INTO room_locator.measurement_router (measurement_id, router_id, signal_strength)
            VALUES ($1, $2, $3)
            ON CONFLICT (measurement_id, router_id) DO UPDATE
            SET signal_strength = GREATEST(room_locator.measurement_router.signal_strength, EXCLUDED.signal_strength)
            "#,
        )
        .bind(measurement_id)
        .bind(router_id)
        .bind(router.signal_strength)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    log::info!("stored measurement {measurement_id} for room {}", measurement.room_name);
    Ok(MeasurementInsert::Inserted(measurement_id))
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = reader
        .deserialize::<CsvRow>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse {}", csv_path.display()))?;
    let measurements = group_csv_rows(rows)
        .with_context(|| format!("inconsistent measurements in {}", csv_path.display()))?;

    let mut inserted = 0usize;
    for measurement in measurements.iter() {
        if let MeasurementInsert::Inserted(_) = add_measurement(pool, measurement).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    room_name: String,
    device_id: String,
    timestamp: i64,
    bssid: String,
    ssid: String,
    signal_strength: i32,
}

/// One measurement per `(device_id, timestamp)`. Rows of one measurement must
/// agree on the room.
fn group_csv_rows(rows: Vec<CsvRow>) -> anyhow::Result<Vec<NewMeasurement>> {
    let mut measurements: BTreeMap<(String, i64), NewMeasurement> = BTreeMap::new();

    for (index, row) in rows.into_iter().enumerate() {
        let measurement = measurements
            .entry((row.device_id.clone(), row.timestamp))
            .or_insert_with(|| NewMeasurement {
                room_name: row.room_name.clone(),
                device_id: row.device_id.clone(),
                timestamp: row.timestamp,
                routers: Vec::new(),
            });
        if measurement.room_name != row.room_name {
            // header is line 1
            anyhow::bail!(
                "line {}: bssid {} of device {} at {} is in room {}, earlier rows say {}",
                index + 2,
                row.bssid,
                row.device_id,
                row.timestamp,
                row.room_name,
                measurement.room_name
            );
        }
        measurement.routers.push(ScanEntry {
            bssid: row.bssid,
            ssid: row.ssid,
            signal_strength: row.signal_strength,
        });
    }

    Ok(measurements.into_values().collect())
}

/// Every stored reading, flattened across measurements and routers.
pub async fn fetch_readings(pool: &PgPool) -> anyhow::Result<Vec<RawReading>> {
    let rows = sqlx::query(
        "SELECT m.measurement_id, m.room_id, r.bssid, r.ssid, mr.signal_strength \
         FROM room_locator.measurement_router mr \
         JOIN room_locator.measurements m ON m.measurement_id = mr.measurement_id \
         JOIN room_locator.routers r ON r.router_id = mr.router_id \
         WHERE mr.signal_strength IS NOT NULL \
         ORDER BY m.measurement_id, r.bssid",
    )
    .fetch_all(pool)
    .await?;

    let mut readings = Vec::with_capacity(rows.len());
    for row in rows {
        readings.push(RawReading {
            measurement_id: row.get("measurement_id"),
            room_id: row.get("room_id"),
            bssid: row.get("bssid"),
            ssid: row.get("ssid"),
            signal_strength: row.get("signal_strength"),
        });
    }

    Ok(readings)
}

pub async fn fetch_room_name(pool: &PgPool, room_id: i32) -> anyhow::Result<Option<String>> {
    let row = sqlx::query("SELECT room_name FROM room_locator.rooms WHERE room_id = $1")
        .bind(room_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get("room_name")))
}

pub async fn fetch_room_names(pool: &PgPool) -> anyhow::Result<HashMap<i32, String>> {
    let rows = sqlx::query("SELECT room_id, room_name FROM room_locator.rooms")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("room_id"), row.get("room_name")))
        .collect())
}

pub async fn list_measurements(
    pool: &PgPool,
    room_name: Option<&str>,
) -> anyhow::Result<Vec<MeasurementSummary>> {
    let mut query = String::from(
        "SELECT m.measurement_id, m.timestamp, m.device_id, m.room_id, ro.room_name, \
         r.bssid, r.ssid, mr.signal_strength \
         FROM room_locator.measurements m \
         JOIN room_locator.rooms ro ON ro.room_id = m.room_id \
         LEFT JOIN room_locator.measurement_router mr ON mr.measurement_id = m.measurement_id \
         LEFT JOIN room_locator.routers r ON r.router_id = mr.router_id",
    );
    if room_name.is_some() {
        query.push_str(" WHERE ro.room_name = $1");
    }
    query.push_str(" ORDER BY m.measurement_id, r.bssid");

    let mut rows = sqlx::query(&query);
    if let Some(value) = room_name {
        rows = rows.bind(value);
    }

    let mut summaries: Vec<MeasurementSummary> = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let measurement_id: i32 = row.get("measurement_id");
        if summaries.last().map(|s| s.measurement_id) != Some(measurement_id) {
            summaries.push(MeasurementSummary {
                measurement_id,
                timestamp: row.get("timestamp"),
                device_id: row.get("device_id"),
                room_id: row.get("room_id"),
                room_name: row.get("room_name"),
                routers: Vec::new(),
            });
        }

        let bssid: Option<String> = row.get("bssid");
        let signal_strength: Option<i32> = row.get("signal_strength");
        if let (Some(bssid), Some(signal_strength), Some(summary)) =
            (bssid, signal_strength, summaries.last_mut())
        {
            summary.routers.push(ScanEntry {
                bssid,
                ssid: row.get::<Option<String>, _>("ssid").unwrap_or_default(),
                signal_strength,
            });
        }
    }

    Ok(summaries)
}
