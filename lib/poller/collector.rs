use chrono::NaiveDateTime;
use log::debug;

use super::comments;
use super::error::Error;
use super::windows::{cutoff, sql_literal, Windows};
use crate::db::CallStore;

/// Open events created after `cutoff`, joined to their current address record.
pub fn calls_statement(cutoff: &str) -> String {
    format!(
        "INSERT INTO hc_curent_temp \
         (eid, ag_id, tycod, sub_tycod, ad_ts, udts, xdts, num_1, \
          estnum, edirpre, efeanme, efeatyp, xstreet1, xstreet2, esz) \
         SELECT DISTINCT a.eid, a.ag_id, a.tycod, a.sub_tycod, a.ad_ts, a.udts, a.xdts, a.num_1, \
          e.estnum, e.edirpre, e.efeanme, e.efeatyp, e.xstreet1, e.xstreet2, a.esz \
         FROM aeven a JOIN event e ON a.eid = e.eid \
         WHERE a.ad_ts > {} AND a.open_and_curent = 'T' AND e.curent = 'T'",
        sql_literal(cutoff)
    )
}

/// Comment lines of open events created after `cutoff`, in creation order.
pub fn comment_lines_statement(cutoff: &str) -> String {
    format!(
        "SELECT a.eid, a.num_1, a.ad_ts, e.comm \
         FROM aeven a JOIN evcom e ON a.eid = e.eid \
         WHERE a.ad_ts > {} AND a.open_and_curent = 'T' AND e.comm_key = 0 \
         ORDER BY a.eid, a.num_1, a.ad_ts, e.cdts, e.lin_grp, e.lin_ord",
        sql_literal(cutoff)
    )
}

/// Distinct arrived units per open event created after `cutoff`.
pub fn counts_statement(cutoff: &str) -> String {
    format!(
        "INSERT INTO hc_unitcount_temp (eid, num_1, ag_id, ad_ts, unit_count) \
         SELECT a.eid, a.num_1, a.ag_id, a.ad_ts, COUNT(DISTINCT u.unid) \
         FROM aeven a JOIN un_hi u \
          ON a.eid = u.eid AND a.num_1 = u.num_1 AND a.ag_id = u.ag_id \
         WHERE a.open_and_curent = 'T' AND a.ad_ts > {} AND u.unit_status = 'AR' \
         GROUP BY a.eid, a.num_1, a.ag_id, a.ad_ts",
        sql_literal(cutoff)
    )
}

pub async fn collect_calls(
    store: &dyn CallStore,
    now: NaiveDateTime,
    windows: &Windows,
) -> Result<usize, Error> {
    let since = cutoff(now, windows.calls, "calls")?;
    Ok(store.execute(&calls_statement(&since)).await?)
}

/// Filtering and concatenation happen in-process so the exclusion patterns
/// behave the same on every backend.
pub async fn collect_comments(
    store: &dyn CallStore,
    now: NaiveDateTime,
    windows: &Windows,
) -> Result<usize, Error> {
    let since = cutoff(now, windows.calls, "comments")?;
    let lines = store
        .load_comment_lines(&comment_lines_statement(&since))
        .await?;
    let fetched = lines.len();
    let staged = comments::assemble(lines, windows.comment_max_chars);
    debug!(
        "Assembled {} comment strings from {} lines",
        staged.len(),
        fetched
    );
    Ok(store.stage_comments(&staged).await?)
}

pub async fn collect_counts(
    store: &dyn CallStore,
    now: NaiveDateTime,
    windows: &Windows,
) -> Result<usize, Error> {
    let since = cutoff(now, windows.counts, "counts")?;
    Ok(store.execute(&counts_statement(&since)).await?)
}
