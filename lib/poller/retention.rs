use chrono::NaiveDateTime;

use super::error::Error;
use super::windows::{cutoff, sql_literal, Windows, TIMESTAMP_WIDTH};
use crate::db::CallStore;

/// Resolved calls leave the master set on the next cycle.
pub const DELETE_RESOLVED: &str = "DELETE FROM jc_hc_curent WHERE xdts IS NOT NULL";

/// Open calls created strictly before `cutoff`, compared on the 14-digit
/// prefix of `ad_ts`.
pub fn delete_expired_statement(cutoff: &str) -> String {
    format!(
        "DELETE FROM jc_hc_curent WHERE SUBSTR(ad_ts, 1, {TIMESTAMP_WIDTH}) < {}",
        sql_literal(cutoff)
    )
}

pub async fn delete_resolved(store: &dyn CallStore) -> Result<usize, Error> {
    Ok(store.execute(DELETE_RESOLVED).await?)
}

pub async fn delete_expired(
    store: &dyn CallStore,
    now: NaiveDateTime,
    windows: &Windows,
) -> Result<usize, Error> {
    let before = cutoff(now, windows.retention, "retention")?;
    Ok(store.execute(&delete_expired_statement(&before)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite_test::SqliteStore;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn stamp(at: NaiveDateTime) -> String {
        // Upstream stamps carry two trailing digits past the seconds.
        format!("{}00", at.format("%Y%m%d%H%M%S"))
    }

    async fn seed_call(store: &SqliteStore, eid: i64, ad_ts: &str, xdts: Option<&str>) {
        let xdts = xdts.map_or("NULL".to_string(), sql_literal);
        store
            .seed(&format!(
                "INSERT INTO jc_hc_curent (eid, ag_id, ad_ts, xdts, num_1) \
                 VALUES ({eid}, 'SO', '{ad_ts}', {xdts}, 'P{eid}');"
            ))
            .await;
    }

    #[tokio::test]
    async fn expiry_boundary_is_two_hours() {
        let store = SqliteStore::open();
        let old = stamp(now() - Duration::hours(2) - Duration::seconds(1));
        let exact = stamp(now() - Duration::hours(2));
        let recent = stamp(now() - Duration::hours(1) - Duration::minutes(59));
        seed_call(&store, 1, &old, None).await;
        seed_call(&store, 2, &exact, None).await;
        seed_call(&store, 3, &recent, None).await;

        let deleted = delete_expired(&store, now(), &Windows::default())
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        let remaining: Vec<i64> = store.current_calls().await.iter().map(|c| c.eid).collect();
        assert_eq!(remaining, vec![2, 3]);
    }

    #[tokio::test]
    async fn resolved_calls_are_deleted_regardless_of_age() {
        let store = SqliteStore::open();
        let fresh = stamp(now() - Duration::minutes(1));
        let stale = stamp(now() - Duration::hours(5));
        seed_call(&store, 1, &fresh, Some("20240301115930")).await;
        seed_call(&store, 2, &fresh, None).await;
        seed_call(&store, 3, &stale, None).await;

        let deleted = delete_resolved(&store).await.unwrap();

        assert_eq!(deleted, 1);
        let remaining: Vec<i64> = store.current_calls().await.iter().map(|c| c.eid).collect();
        assert_eq!(remaining, vec![2, 3]);
    }

    #[test]
    fn expired_statement_compares_fixed_width_prefix() {
        assert_eq!(
            delete_expired_statement("20240301100000"),
            "DELETE FROM jc_hc_curent WHERE SUBSTR(ad_ts, 1, 14) < '20240301100000'"
        );
    }
}
