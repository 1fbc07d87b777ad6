use super::error::Error;
use crate::db::CallStore;

/// Upserts staged calls on (eid, ad_ts, num_1). The only statement that
/// creates master rows.
///
/// Staging can hold several rows per key when an event has more than one
/// current address record. Postgres rejects an upsert that touches the same
/// row twice, so only the most recently updated row per key is merged.
/// `udts` is coalesced so both backends order nulls the same way.
pub const MERGE_CALLS: &str = "\
INSERT INTO jc_hc_curent \
 (eid, ag_id, tycod, sub_tycod, ad_ts, udts, xdts, num_1, \
  estnum, edirpre, efeanme, efeatyp, xstreet1, xstreet2, esz) \
SELECT eid, ag_id, tycod, sub_tycod, ad_ts, udts, xdts, num_1, \
  estnum, edirpre, efeanme, efeatyp, xstreet1, xstreet2, esz \
FROM (\
 SELECT *, ROW_NUMBER() OVER (\
  PARTITION BY eid, ad_ts, num_1 \
  ORDER BY COALESCE(udts, '') DESC, COALESCE(efeanme, ''), COALESCE(estnum, '')\
 ) AS key_rank \
 FROM hc_curent_temp\
) AS staged \
WHERE key_rank = 1 \
ON CONFLICT (eid, ad_ts, num_1) DO UPDATE SET \
 udts = excluded.udts, \
 xdts = excluded.xdts, \
 ag_id = excluded.ag_id, \
 tycod = excluded.tycod, \
 sub_tycod = excluded.sub_tycod, \
 estnum = excluded.estnum, \
 edirpre = excluded.edirpre, \
 efeanme = excluded.efeanme, \
 efeatyp = excluded.efeatyp, \
 xstreet1 = excluded.xstreet1, \
 xstreet2 = excluded.xstreet2, \
 esz = excluded.esz";

/// Copies staged comment strings onto matching master rows; unmatched
/// staging rows are left for the purge.
pub const MERGE_COMMENTS: &str = "\
UPDATE jc_hc_curent AS j SET comments = c.comments \
FROM (SELECT DISTINCT eid, num_1, ad_ts, comments FROM hc_comment_temp) AS c \
WHERE j.eid = c.eid AND j.ad_ts = c.ad_ts AND j.num_1 = c.num_1";

/// Copies staged unit counts onto master rows matching the key and agency.
pub const MERGE_COUNTS: &str = "\
UPDATE jc_hc_curent AS j SET unit_count = u.unit_count \
FROM (SELECT DISTINCT eid, ad_ts, num_1, ag_id, unit_count FROM hc_unitcount_temp) AS u \
WHERE j.eid = u.eid AND j.ad_ts = u.ad_ts AND j.num_1 = u.num_1 AND j.ag_id = u.ag_id";

pub async fn merge_calls(store: &dyn CallStore) -> Result<usize, Error> {
    Ok(store.execute(MERGE_CALLS).await?)
}

pub async fn merge_comments(store: &dyn CallStore) -> Result<usize, Error> {
    Ok(store.execute(MERGE_COMMENTS).await?)
}

pub async fn merge_counts(store: &dyn CallStore) -> Result<usize, Error> {
    Ok(store.execute(MERGE_COUNTS).await?)
}
