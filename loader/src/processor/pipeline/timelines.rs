use super::{Pipeline, RecordSource};
use crate::processor::extract::JsonPath;
use crate::processor::flatten::{ExtractionPlan, Param, Scope, TableMapping};
use crate::processor::normalize::Normalizer::{self, Identity, JsonEmbed, TextClean, TimestampParse};
use crate::schema::{DataType, FieldSpec, TableSpec};
use common::Result;

use DataType::{BigInt, Boolean, Json, Timestamp, Varchar};

enum Column {
    Path(&'static str, Normalizer),
    Param(Param),
}

use Column::{Param as P, Path};

// `user` is reserved in Postgres.
const USER_COLUMN: &str = "\"user\"";

/// One wide table per tweet, keeping whole sub-objects as JSON next to a
/// selection of their most used attributes.
fn columns() -> Vec<(&'static str, DataType, Column)> {
    vec![
        ("tweetId", BigInt, Path("id", Identity)),
        ("user_timeline_collected_at", Varchar(64), P(Param::CollectedAt)),
        ("user_timeline_collected_ts", Timestamp, P(Param::CollectedTs)),
        ("created_at", Varchar(64), Path("created_at", Identity)),
        ("created_ts", Timestamp, Path("created_at", TimestampParse)),
        ("lang", Varchar(20), Path("lang", Identity)),
        ("text", Varchar(500), Path("text", TextClean)),
        ("contributors", Json, Path("contributors", JsonEmbed)),
        ("entities", Json, Path("entities", JsonEmbed)),
        ("expanded_url", Varchar(256), Path("entities.urls.0.expanded_url", Identity)),
        ("filter_level", Varchar(80), Path("filter_level", Identity)),
        ("coordinates", Json, Path("coordinates", JsonEmbed)),
        ("place", Json, Path("place", JsonEmbed)),
        ("possibly_sensitive", Boolean, Path("possibly_sensitive", Identity)),
        (USER_COLUMN, Json, Path("user", JsonEmbed)),
        ("user_id", BigInt, Path("user.id", Identity)),
        ("user_screen_name", Varchar(140), Path("user.screen_name", Identity)),
        ("user_follower_count", BigInt, Path("user.followers_count", Identity)),
        ("user_friends_count", BigInt, Path("user.friends_count", Identity)),
        ("user_statuses_count", BigInt, Path("user.statuses_count", Identity)),
        ("user_favorites_count", BigInt, Path("user.favourites_count", Identity)),
        ("user_geo_enabled", Boolean, Path("user.geo_enabled", Identity)),
        ("user_time_zone", Varchar(100), Path("user.time_zone", Identity)),
        ("user_description", Varchar(512), Path("user.description", TextClean)),
        ("user_location", Varchar(512), Path("user.location", TextClean)),
        ("user_created_at", Varchar(64), Path("user.created_at", Identity)),
        ("user_created_ts", Timestamp, Path("user.created_at", TimestampParse)),
        ("user_lang", Varchar(8), Path("user.lang", Identity)),
        ("user_listed_count", BigInt, Path("user.listed_count", Identity)),
        ("user_name", Varchar(140), Path("user.name", TextClean)),
        ("user_url", Varchar(512), Path("user.url", Identity)),
        ("user_utc_offset", BigInt, Path("user.utc_offset", Identity)),
        ("user_verified", Boolean, Path("user.verified", Identity)),
        (
            "user_profile_use_background_image",
            Boolean,
            Path("user.profile_use_background_image", Identity),
        ),
        ("user_default_profile_image", Boolean, Path("user.default_profile_image", Identity)),
        (
            "user_profile_sidebar_fill_color",
            Varchar(26),
            Path("user.profile_sidebar_fill_color", Identity),
        ),
        ("user_profile_text_color", Varchar(16), Path("user.profile_text_color", Identity)),
        (
            "user_profile_sidebar_border_color",
            Varchar(16),
            Path("user.profile_sidebar_border_color", Identity),
        ),
        (
            "user_profile_background_color",
            Varchar(16),
            Path("user.profile_background_color", Identity),
        ),
        ("user_profile_link_color", Varchar(16), Path("user.profile_link_color", Identity)),
        ("user_profile_image_url", Varchar(256), Path("user.profile_image_url", Identity)),
        ("user_profile_banner_url", Varchar(256), Path("user.profile_banner_url", Identity)),
        (
            "user_profile_background_image_url",
            Varchar(256),
            Path("user.profile_background_image_url", Identity),
        ),
        (
            "user_profile_background_tile",
            Boolean,
            Path("user.profile_background_tile", Identity),
        ),
        ("user_contributors_enabled", Boolean, Path("user.contributors_enabled", Identity)),
        ("user_default_profile", Boolean, Path("user.default_profile", Identity)),
        ("user_id_translator", Boolean, Path("user.is_translator", Identity)),
        ("retweet_count", BigInt, Path("retweet_count", Identity)),
        ("favorite_count", BigInt, Path("favorite_count", Identity)),
        ("retweeted_status", Json, Path("retweeted_status", JsonEmbed)),
        ("retweeted_status_id", BigInt, Path("retweeted_status.id", Identity)),
        (
            "retweeted_status_user_screen_name",
            Varchar(80),
            Path("retweeted_status.user.screen_name", Identity),
        ),
        (
            "retweeted_status_retweet_count",
            BigInt,
            Path("retweeted_status.retweet_count", Identity),
        ),
        ("retweeted_status_user_id", BigInt, Path("retweeted_status.user.id", Identity)),
        (
            "retweeted_status_user_time_zone",
            Varchar(100),
            Path("retweeted_status.user.time_zone", Identity),
        ),
        (
            "retweeted_status_user_friends_count",
            BigInt,
            Path("retweeted_status.user.friends_count", Identity),
        ),
        (
            "retweeted_status_user_statuses_count",
            BigInt,
            Path("retweeted_status.user.statuses_count", Identity),
        ),
        (
            "retweeted_status_user_followers_count",
            BigInt,
            Path("retweeted_status.user.followers_count", Identity),
        ),
        ("source", Varchar(500), Path("source", Identity)),
        ("in_reply_to_screen_name", Varchar(500), Path("in_reply_to_screen_name", Identity)),
        ("in_reply_to_status_id", BigInt, Path("in_reply_to_status_id", Identity)),
        ("in_reply_to_user_id", BigInt, Path("in_reply_to_user_id", Identity)),
        ("quoted_status_id", BigInt, Path("quoted_status_id", Identity)),
        ("quoted_status", Json, Path("quoted_status", JsonEmbed)),
        ("truncated", Boolean, Path("truncated", Identity)),
    ]
}

impl Pipeline {
    /// Single flat table named `table_name`. There is no processed marker;
    /// re-runs are expected to drop the table first.
    pub fn timelines(table_name: &str) -> Result<Self> {
        let mut fields = Vec::new();
        let mut plan = ExtractionPlan::new();

        for (index, (name, datatype, column)) in columns().into_iter().enumerate() {
            let field = FieldSpec::new(name, datatype);
            fields.push(if index == 0 { field.primary_key() } else { field });

            plan = match column {
                Path(path, normalizer) => plan.path(name, path, normalizer),
                P(param) => plan.param(name, param),
            };
        }

        let table = TableSpec::new(table_name, fields)?;
        Ok(Pipeline::new(
            "timelines",
            RecordSource::Each(JsonPath::parse("historic_tweets")),
            vec![TableMapping::new(table, Scope::Record, plan)?],
        ))
    }
}
