use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text};

/// One row of the master "current calls" snapshot.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = super::schema::jc_hc_curent)]
pub struct CurrentCallRecord {
    pub eid: i64,
    pub ag_id: String,
    pub tycod: Option<String>,
    pub sub_tycod: Option<String>,
    pub ad_ts: String,
    pub udts: Option<String>,
    pub xdts: Option<String>,
    pub num_1: String,
    pub estnum: Option<String>,
    pub edirpre: Option<String>,
    pub efeanme: Option<String>,
    pub efeatyp: Option<String>,
    pub xstreet1: Option<String>,
    pub xstreet2: Option<String>,
    pub esz: Option<i64>,
    pub comments: Option<String>,
    pub unit_count: Option<i64>,
}

/// A single upstream comment line, in event creation order.
#[derive(QueryableByName, Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    #[diesel(sql_type = BigInt)]
    pub eid: i64,
    #[diesel(sql_type = Text)]
    pub num_1: String,
    #[diesel(sql_type = Text)]
    pub ad_ts: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub comm: Option<String>,
}

/// The assembled comment string for one event key.
#[derive(Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = super::schema::hc_comment_temp)]
pub struct StagedComment {
    pub eid: i64,
    pub num_1: String,
    pub ad_ts: String,
    pub comments: Option<String>,
}
