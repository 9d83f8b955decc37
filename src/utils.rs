use crate::point::Point;

// mean earth radius
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// https://en.wikipedia.org/wiki/Haversine_formula
pub fn haversine_distance_km(a: &Point, b: &Point) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // clamp against rounding pushing `h` slightly above 1 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

pub fn format_distance_km(distance_km: f64) -> String {
    format!("Total Distance: {:.2} km", distance_km)
}

pub mod db {
    use anyhow::Result;
    use rusqlite::{OptionalExtension, Transaction};

    pub fn init_metadata_and_get_version(tx: &Transaction) -> Result<i32> {
        let create_db_metadata_sql = "
        CREATE TABLE IF NOT EXISTS `db_metadata` (
            `key`   TEXT NOT NULL,
            `value` TEXT,
            PRIMARY KEY(`key`)
        )";
        tx.execute(create_db_metadata_sql, ())?;

        let version_str: Option<String> = tx
            .query_row(
                "SELECT `value` FROM `db_metadata` WHERE key='version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match version_str {
            None => Ok(0),
            Some(s) => Ok(s.parse()?),
        }
    }

    pub fn set_version_in_metadata(tx: &Transaction, version: i32) -> Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO `db_metadata` (key, value) VALUES (?1, ?2)",
            ("version", version.to_string()),
        )?;
        Ok(())
    }
}
