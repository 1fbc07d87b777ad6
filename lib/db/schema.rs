// Tables owned by the poller. Upstream tables (`aeven`, `event`, `evcom`,
// `un_hi`) are only read through raw statements and are not declared here.

diesel::table! {
    hc_curent_temp (eid, ad_ts, num_1) {
        eid -> Int8,
        ag_id -> Text,
        tycod -> Nullable<Text>,
        sub_tycod -> Nullable<Text>,
        ad_ts -> Text,
        udts -> Nullable<Text>,
        xdts -> Nullable<Text>,
        num_1 -> Text,
        estnum -> Nullable<Text>,
        edirpre -> Nullable<Text>,
        efeanme -> Nullable<Text>,
        efeatyp -> Nullable<Text>,
        xstreet1 -> Nullable<Text>,
        xstreet2 -> Nullable<Text>,
        esz -> Nullable<Int8>,
    }
}

diesel::table! {
    hc_comment_temp (eid, num_1, ad_ts) {
        eid -> Int8,
        num_1 -> Text,
        ad_ts -> Text,
        comments -> Nullable<Text>,
    }
}

diesel::table! {
    hc_unitcount_temp (eid, num_1, ag_id, ad_ts) {
        eid -> Int8,
        num_1 -> Text,
        ag_id -> Text,
        ad_ts -> Text,
        unit_count -> Int8,
    }
}

diesel::table! {
    jc_hc_curent (eid, ad_ts, num_1) {
        eid -> Int8,
        ag_id -> Text,
        tycod -> Nullable<Text>,
        sub_tycod -> Nullable<Text>,
        ad_ts -> Text,
        udts -> Nullable<Text>,
        xdts -> Nullable<Text>,
        num_1 -> Text,
        estnum -> Nullable<Text>,
        edirpre -> Nullable<Text>,
        efeanme -> Nullable<Text>,
        efeatyp -> Nullable<Text>,
        xstreet1 -> Nullable<Text>,
        xstreet2 -> Nullable<Text>,
        esz -> Nullable<Int8>,
        comments -> Nullable<Text>,
        unit_count -> Nullable<Int8>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    hc_curent_temp,
    hc_comment_temp,
    hc_unitcount_temp,
    jc_hc_curent,
);
